use chrono::NaiveDate;

use super::domain::{
    BatchId, ImportBatch, ImportCounts, JurisdictionId, RollEntry, RollRecord, RollRecordId,
};
use super::normalizer::normalize_name;
use crate::workflows::matching::similarity::trigram_similarity;
use crate::workflows::RepositoryError;

/// Storage abstraction for the current roll snapshot and its upload history.
pub trait RollStore: Send + Sync {
    /// Number of active records; zero means no roll has been loaded.
    fn active_count(&self) -> Result<usize, RepositoryError>;
    /// Every active record, used as the prior snapshot when diffing an upload.
    fn active_records(&self) -> Result<Vec<RollRecord>, RepositoryError>;
    /// Every active record matching `filter`; similar-name results come best first.
    fn find_active(&self, filter: &RollFilter) -> Result<Vec<RollRecord>, RepositoryError>;
    fn fetch(&self, id: RollRecordId) -> Result<Option<RollRecord>, RepositoryError>;

    /// Registers a pending batch at upload start.
    fn begin_batch(
        &self,
        list_date: NaiveDate,
        source_filename: Option<String>,
    ) -> Result<ImportBatch, RepositoryError>;
    /// Persists batch status without touching roll records (processing, failed).
    fn save_batch(&self, batch: &ImportBatch) -> Result<(), RepositoryError>;
    /// Applies a changeset and stores the completed batch as one unit of work.
    ///
    /// Inserts are keyed on natural identity: an insert whose identity already has an active
    /// record is applied to that record instead, so concurrent uploads cannot duplicate it.
    fn commit(
        &self,
        batch: &ImportBatch,
        changeset: RollChangeset,
    ) -> Result<CommitOutcome, RepositoryError>;
    fn attach_revet_count(&self, batch_id: BatchId, re_vetted: usize)
        -> Result<(), RepositoryError>;
    fn batch(&self, id: BatchId) -> Result<Option<ImportBatch>, RepositoryError>;
    /// Upload history, newest first.
    fn batches(&self) -> Result<Vec<ImportBatch>, RepositoryError>;
    fn latest_completed_list_date(&self) -> Result<Option<NaiveDate>, RepositoryError>;
}

/// Name lookup for jurisdictions referenced by roll rows and supporter records.
pub trait JurisdictionDirectory: Send + Sync {
    /// Case-insensitive lookup by name.
    fn resolve(&self, name: &str) -> Option<JurisdictionId>;
    fn name_of(&self, id: JurisdictionId) -> Option<String>;
}

/// Diff result computed by the importer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollChangeset {
    pub inserts: Vec<RollEntry>,
    pub updates: Vec<RollUpdate>,
    pub removals: Vec<RollRecordId>,
}

impl RollChangeset {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty() && self.removals.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollUpdate {
    pub id: RollRecordId,
    pub entry: RollEntry,
}

/// Rows actually written by a commit, after keyed-upsert reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOutcome {
    pub inserted: usize,
    pub updated: usize,
    /// Updates that moved a record to another jurisdiction; a subset of `updated`.
    pub transferred: usize,
    pub removed: usize,
}

impl CommitOutcome {
    /// Overwrites the write counters with what the store actually applied.
    pub fn apply_to(&self, counts: &mut ImportCounts) {
        counts.new = self.inserted;
        counts.updated = self.updated;
        counts.transferred = self.transferred;
        counts.removed = self.removed;
    }
}

/// Predicate over active roll records, composed by the matcher one strategy at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RollFilter {
    pub name: Option<NameFilter>,
    pub dob: Option<NaiveDate>,
    pub birth_year: Option<i32>,
    pub jurisdiction: Option<JurisdictionFilter>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NameFilter {
    /// Case-insensitive equality on both names; values are stored normalized.
    Exact { first: String, last: String },
    /// Trigram similarity above `threshold` on both first and last name.
    Similar {
        first: String,
        last: String,
        threshold: f32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JurisdictionFilter {
    Within(String),
    Outside(String),
}

impl RollFilter {
    pub fn exact_name(first: &str, last: &str) -> Self {
        Self {
            name: Some(NameFilter::Exact {
                first: normalize_name(first),
                last: normalize_name(last),
            }),
            ..Self::default()
        }
    }

    pub fn similar_name(first: &str, last: &str, threshold: f32) -> Self {
        Self {
            name: Some(NameFilter::Similar {
                first: normalize_name(first),
                last: normalize_name(last),
                threshold,
            }),
            ..Self::default()
        }
    }

    pub fn with_dob(mut self, dob: NaiveDate) -> Self {
        self.dob = Some(dob);
        self
    }

    pub fn with_birth_year(mut self, year: i32) -> Self {
        self.birth_year = Some(year);
        self
    }

    pub fn within(mut self, jurisdiction: &str) -> Self {
        self.jurisdiction = Some(JurisdictionFilter::Within(normalize_name(jurisdiction)));
        self
    }

    pub fn outside(mut self, jurisdiction: &str) -> Self {
        self.jurisdiction = Some(JurisdictionFilter::Outside(normalize_name(jurisdiction)));
        self
    }

    /// Evaluates every predicate against one record. Status is not checked.
    pub fn matches(&self, record: &RollRecord) -> bool {
        if let Some(dob) = self.dob {
            if record.dob != Some(dob) {
                return false;
            }
        }

        if let Some(year) = self.birth_year {
            if record.birth_year != Some(year) {
                return false;
            }
        }

        if let Some(jurisdiction) = &self.jurisdiction {
            let record_jurisdiction = normalize_name(&record.jurisdiction_name);
            let same = match jurisdiction {
                JurisdictionFilter::Within(name) | JurisdictionFilter::Outside(name) => {
                    &record_jurisdiction == name
                }
            };
            let wanted = matches!(jurisdiction, JurisdictionFilter::Within(_));
            if same != wanted {
                return false;
            }
        }

        match &self.name {
            None => true,
            Some(NameFilter::Exact { first, last }) => {
                &normalize_name(&record.first_name) == first
                    && &normalize_name(&record.last_name) == last
            }
            Some(NameFilter::Similar {
                first,
                last,
                threshold,
            }) => {
                trigram_similarity(first, &record.first_name) > *threshold
                    && trigram_similarity(last, &record.last_name) > *threshold
            }
        }
    }

    /// Similarity of the record's last name to the filter's, used to rank fuzzy results.
    pub fn last_name_similarity(&self, record: &RollRecord) -> Option<f32> {
        match &self.name {
            Some(NameFilter::Similar { last, .. }) => {
                Some(trigram_similarity(last, &record.last_name))
            }
            _ => None,
        }
    }
}
