use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use csv::WriterBuilder;
use tracing::info;

use crate::error::ExportError;
use crate::reconcile::ExportRow;

/// Column order of the export file. Part of the file's contract.
pub const HEADERS: [&str; 6] = ["首饰名称", "最新价格", "单位", "纯度", "更新日期", "爬取时间"];

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// Spreadsheet apps need the BOM to read the Chinese headers as UTF-8
const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

impl ExportRow {
    fn to_record(&self) -> [String; 6] {
        [
            self.name.clone(),
            self.latest_price.clone(),
            self.unit.clone(),
            self.purity.clone(),
            self.update_date.clone(),
            self.scraped_at.format(TIMESTAMP_FORMAT).to_string(),
        ]
    }
}

/// Overwrite `path` with the header plus `rows`. Returns the data row count.
pub fn write_rows(rows: &[ExportRow], path: &Path) -> Result<usize, ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut file = File::create(path)?;
    file.write_all(UTF8_BOM)?;

    let mut writer = WriterBuilder::new().has_headers(false).from_writer(file);
    writer.write_record(HEADERS)?;
    for row in rows {
        writer.write_record(row.to_record())?;
    }
    writer.flush()?;

    info!(path = %path.display(), rows = rows.len(), "Wrote export");
    Ok(rows.len())
}
