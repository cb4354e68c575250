use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::parser::fields::Field;

pub fn connect(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }
    let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS price_records (
            sequence_id  INTEGER PRIMARY KEY AUTOINCREMENT,
            name         TEXT NOT NULL DEFAULT '',
            latest_price TEXT NOT NULL DEFAULT '',
            unit         TEXT NOT NULL DEFAULT '',
            purity       TEXT NOT NULL DEFAULT '',
            labor_fee    TEXT NOT NULL DEFAULT '',
            update_date  TEXT NOT NULL DEFAULT '',
            scraped_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_price_records_key ON price_records(name, update_date);
        CREATE INDEX IF NOT EXISTS idx_price_records_scraped ON price_records(scraped_at);
        ",
    )?;
    Ok(())
}

// ── Records ──

/// One scraped item. Empty string means the page did not supply the value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    pub name: String,
    pub latest_price: String,
    pub unit: String,
    pub purity: String,
    pub labor_fee: String,
    pub update_date: String,
}

impl RawRecord {
    /// Records with neither a name nor a price are noise.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() || !self.latest_price.is_empty()
    }

    pub fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Name => &mut self.name,
            Field::LatestPrice => &mut self.latest_price,
            Field::Unit => &mut self.unit,
            Field::Purity => &mut self.purity,
            Field::LaborFee => &mut self.labor_fee,
            Field::UpdateDate => &mut self.update_date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub sequence_id: i64,
    pub scraped_at: NaiveDateTime,
    pub record: RawRecord,
}

// ── Append-only history ──

/// Append one cycle's batch. Every row shares `scraped_at`; sequence ids come
/// from SQLite and only ever grow.
pub fn append(
    conn: &Connection,
    records: &[RawRecord],
    scraped_at: NaiveDateTime,
) -> rusqlite::Result<Vec<StoredRecord>> {
    let tx = conn.unchecked_transaction()?;
    let mut stored = Vec::with_capacity(records.len());
    {
        let mut stmt = tx.prepare(
            "INSERT INTO price_records
             (name, latest_price, unit, purity, labor_fee, update_date, scraped_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )?;
        for r in records {
            stmt.execute(rusqlite::params![
                r.name, r.latest_price, r.unit, r.purity, r.labor_fee, r.update_date, scraped_at,
            ])?;
            stored.push(StoredRecord {
                sequence_id: tx.last_insert_rowid(),
                scraped_at,
                record: r.clone(),
            });
        }
    }
    tx.commit()?;
    Ok(stored)
}

pub fn read_all(conn: &Connection) -> rusqlite::Result<Vec<StoredRecord>> {
    let mut stmt = conn.prepare(
        "SELECT sequence_id, scraped_at, name, latest_price, unit, purity, labor_fee, update_date
         FROM price_records
         ORDER BY sequence_id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StoredRecord {
                sequence_id: row.get(0)?,
                scraped_at: row.get(1)?,
                record: RawRecord {
                    name: row.get(2)?,
                    latest_price: row.get(3)?,
                    unit: row.get(4)?,
                    purity: row.get(5)?,
                    labor_fee: row.get(6)?,
                    update_date: row.get(7)?,
                },
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub records: usize,
    pub distinct_items: usize,
    pub cycles: usize,
    pub last_scraped_at: Option<NaiveDateTime>,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let records: usize = conn.query_row("SELECT COUNT(*) FROM price_records", [], |r| r.get(0))?;
    let distinct_items: usize = conn.query_row(
        "SELECT COUNT(*) FROM (SELECT DISTINCT name, update_date FROM price_records)",
        [],
        |r| r.get(0),
    )?;
    let cycles: usize = conn.query_row(
        "SELECT COUNT(DISTINCT scraped_at) FROM price_records",
        [],
        |r| r.get(0),
    )?;
    let last_scraped_at: Option<NaiveDateTime> =
        conn.query_row("SELECT MAX(scraped_at) FROM price_records", [], |r| r.get(0))?;
    Ok(Stats {
        records,
        distinct_items,
        cycles,
        last_scraped_at,
    })
}

#[cfg(test)]
pub(crate) fn memory() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    init_schema(&conn).unwrap();
    conn
}
