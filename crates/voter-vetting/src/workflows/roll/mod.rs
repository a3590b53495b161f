//! External voter roll: CSV ingestion, snapshot diffing, and upload history.
//!
//! An upload is read into canonical rows, staged into validated entries, diffed against the
//! active snapshot, and committed to the [`RollStore`] as a single changeset.

mod domain;
mod import;
mod mapping;
mod memory;
mod normalizer;
mod parser;
mod repository;
mod router;

use chrono::NaiveDate;

use crate::workflows::RepositoryError;

pub use domain::{
    BatchId, BatchStatus, BirthKey, ImportBatch, ImportCounts, JurisdictionId, NaturalKey,
    RollEntry, RollRecord, RollRecordId, RollStatus, RowError,
};
pub use import::{ImportPreview, ImportProcessor, ImportRequest, RevetHook};
pub use memory::{InMemoryRollStore, StaticJurisdictions};
pub use normalizer::{is_ambiguous_dob, normalize_name, parse_date};
pub use parser::{read_rows, RollRow, RowReadError};
pub use repository::{
    CommitOutcome, JurisdictionDirectory, JurisdictionFilter, NameFilter, RollChangeset,
    RollFilter, RollStore, RollUpdate,
};
pub use router::{roll_router, RollApi};

/// Failure that aborts an upload as a whole.
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("roll file could not be read: {0}")]
    Io(#[from] std::io::Error),
    #[error("roll file is not valid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("list date {requested} is older than the latest imported list ({latest})")]
    StaleListDate {
        requested: NaiveDate,
        latest: NaiveDate,
    },
    #[error("upload contains no valid roll rows")]
    EmptyUpload,
    #[error("roll file is missing the required '{0}' column")]
    MissingColumn(&'static str),
}

impl ImportError {
    /// True when the caller supplied bad input rather than the infrastructure failing.
    pub fn is_invalid_input(&self) -> bool {
        match self {
            ImportError::Csv(err) => !err.is_io_error(),
            ImportError::StaleListDate { .. }
            | ImportError::EmptyUpload
            | ImportError::MissingColumn(_) => true,
            ImportError::Io(_) | ImportError::Repository(_) => false,
        }
    }
}
