use std::path::Path;

use chrono::{Local, NaiveDateTime};
use reqwest::Client;
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db;
use crate::error::{CycleError, ExportError};
use crate::export;
use crate::fetch;
use crate::parser;
use crate::parser::fields::FieldSet;
use crate::reconcile::{reconcile, ExportRow};
use crate::settings::Settings;

/// Counts reported after one fetch → extract → persist → export cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleResult {
    pub records_extracted: usize,
    pub records_persisted: usize,
    pub export_row_count: usize,
}

/// Run one full cycle against the configured page.
pub async fn run_cycle(
    client: &Client,
    conn: &Connection,
    settings: &Settings,
) -> Result<CycleResult, CycleError> {
    let page = fetch::fetch_page(client, &settings.url).await?;
    let html = fetch::decode_body(&page);
    let scraped_at = Local::now().naive_local();
    ingest(conn, &html, &settings.fields, &settings.export_path, scraped_at)
}

/// Everything after the fetch: extract, persist, reconcile, export.
pub fn ingest(
    conn: &Connection,
    html: &str,
    fields: &FieldSet,
    export_path: &Path,
    scraped_at: NaiveDateTime,
) -> Result<CycleResult, CycleError> {
    let records = parser::process_page(html, fields, scraped_at.date())?;
    info!("Extracted {} records", records.len());
    if records.is_empty() {
        warn!("No price records on the page this cycle");
        return Ok(CycleResult::default());
    }

    let stored = db::append(conn, &records, scraped_at).map_err(|e| {
        warn!("Batch of {} records lost: {}", records.len(), e);
        CycleError::Persistence(e)
    })?;
    info!("Persisted {} records", stored.len());

    let export_row_count = re_export(conn, export_path)?;

    Ok(CycleResult {
        records_extracted: records.len(),
        records_persisted: stored.len(),
        export_row_count,
    })
}

/// Rebuild the export from stored history. An empty history writes nothing
/// and reports zero rows.
pub fn re_export(conn: &Connection, export_path: &Path) -> Result<usize, ExportError> {
    let rows = export_rows(conn)?;
    if rows.is_empty() {
        info!("History is empty, nothing to export");
        return Ok(0);
    }
    export::write_rows(&rows, export_path)
}

pub fn export_rows(conn: &Connection) -> Result<Vec<ExportRow>, ExportError> {
    let history = db::read_all(conn).map_err(ExportError::History)?;
    Ok(reconcile(&history))
}

/// Most recently scraped export rows first.
pub fn recent_rows(conn: &Connection, limit: usize) -> Result<Vec<ExportRow>, ExportError> {
    let mut rows = export_rows(conn)?;
    rows.sort_by(|a, b| b.scraped_at.cmp(&a.scraped_at));
    rows.truncate(limit);
    Ok(rows)
}
