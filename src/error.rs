use std::io;

use thiserror::Error;

/// Why a cycle stopped. "No data" is not in here: an empty page is a
/// successful cycle with zero counts.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("page could not be parsed: {0}")]
    Parse(String),
    #[error("persisting batch failed: {0}")]
    Persistence(#[from] rusqlite::Error),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
}

impl CycleError {
    pub fn kind(&self) -> &'static str {
        match self {
            CycleError::Fetch(_) => "FetchError",
            CycleError::Parse(_) => "ParseError",
            CycleError::Persistence(_) => "PersistenceError",
            CycleError::Export(_) => "ExportError",
        }
    }
}

/// Export failures never touch stored history; re-running `export` is safe.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("reading history: {0}")]
    History(#[source] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}
