pub mod blocks;
pub mod dates;
pub mod encoding;
pub mod fields;
pub mod table;

use chrono::NaiveDate;
use scraper::Html;
use tracing::{debug, info};

use crate::db::RawRecord;
use crate::error::CycleError;
use fields::FieldSet;

/// Parse the decoded page. html5ever accepts almost anything, so only a body
/// with no markup at all is rejected.
pub fn parse_document(html: &str) -> Result<Html, CycleError> {
    if html.trim().is_empty() {
        return Err(CycleError::Parse("page body is empty".into()));
    }
    if !html.contains('<') {
        return Err(CycleError::Parse("page body contains no markup".into()));
    }
    Ok(Html::parse_document(html))
}

/// Tables first; text blocks only when no table produced a record.
pub fn extract(doc: &Html, fields: &FieldSet, today: NaiveDate) -> Vec<RawRecord> {
    let records = table::extract_tables(doc, fields);
    if !records.is_empty() {
        debug!("{} records from tables", records.len());
        return records;
    }
    info!("No table rows matched, falling back to text blocks");
    blocks::extract_blocks(doc, today)
}

/// Two-pass pipeline: html → records → records with page date back-filled.
pub fn process_page(
    html: &str,
    fields: &FieldSet,
    today: NaiveDate,
) -> Result<Vec<RawRecord>, CycleError> {
    let doc = parse_document(html)?;
    let records = extract(&doc, fields, today);
    let page_text: String = doc.root_element().text().collect();
    Ok(dates::backfill_dates(records, &page_text))
}

// ── Tests ──
