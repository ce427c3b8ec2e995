// src/error.rs
//! Error kinds surfaced by the store, exports and backups.

use thiserror::Error;

use crate::models::{FicheId, ValidationErrors};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before any write; carries every failing field.
    #[error("invalid fiche: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("fiche {0} not found")]
    NotFound(FicheId),

    /// The SQLite substrate failed; nothing from the operation was committed.
    #[error("storage failure: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv export failed: {0}")]
    Csv(#[from] csv::Error),

    /// A feature switched off in configuration.
    #[error("{0} is disabled in configuration")]
    Disabled(&'static str),
}
