use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::normalizer::normalize_name;

/// Store-assigned identifier for a roll entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RollRecordId(pub u64);

/// Identifier for one roll upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BatchId(pub u64);

/// Identifier of a resolved jurisdiction (village, precinct, district).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JurisdictionId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollStatus {
    Active,
    Removed,
}

impl RollStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RollStatus::Active => "active",
            RollStatus::Removed => "removed",
        }
    }
}

/// Birth component of a natural identity: the full date when known, else the year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BirthKey {
    Dob(NaiveDate),
    Year(i32),
    Unknown,
}

impl BirthKey {
    pub fn from_parts(dob: Option<NaiveDate>, birth_year: Option<i32>) -> Self {
        match (dob, birth_year) {
            (Some(dob), _) => BirthKey::Dob(dob),
            (None, Some(year)) => BirthKey::Year(year),
            (None, None) => BirthKey::Unknown,
        }
    }
}

/// Correlates a roll entry across imports in the absence of a stable external id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NaturalKey {
    pub first_name: String,
    pub last_name: String,
    pub birth: BirthKey,
}

impl NaturalKey {
    pub fn new(
        first_name: &str,
        last_name: &str,
        dob: Option<NaiveDate>,
        birth_year: Option<i32>,
    ) -> Self {
        Self {
            first_name: normalize_name(first_name),
            last_name: normalize_name(last_name),
            birth: BirthKey::from_parts(dob, birth_year),
        }
    }
}

/// A validated roll row, ready to be diffed against the stored snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollEntry {
    pub first_name: String,
    pub last_name: String,
    pub dob: Option<NaiveDate>,
    pub birth_year: Option<i32>,
    pub jurisdiction_name: String,
    pub jurisdiction_id: Option<JurisdictionId>,
    pub registration_number: Option<String>,
    pub ambiguous_dob: bool,
}

impl RollEntry {
    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(&self.first_name, &self.last_name, self.dob, self.birth_year)
    }

    pub fn effective_birth_year(&self) -> Option<i32> {
        self.birth_year.or_else(|| self.dob.map(|dob| dob.year()))
    }

    /// True when applying this entry to `record` would change any stored field.
    pub fn differs_from(&self, record: &RollRecord) -> bool {
        self.first_name != record.first_name
            || self.last_name != record.last_name
            || self.dob != record.dob
            || self.effective_birth_year() != record.birth_year
            || self.jurisdiction_name != record.jurisdiction_name
            || self.jurisdiction_id != record.jurisdiction_id
            || self.registration_number != record.registration_number
    }

    /// Jurisdiction changes are compared on the normalized name so casing fixes are not transfers.
    pub fn transfers_from(&self, record: &RollRecord) -> bool {
        normalize_name(&self.jurisdiction_name) != normalize_name(&record.jurisdiction_name)
    }
}

/// External voter entry held by the roll store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollRecord {
    pub id: RollRecordId,
    pub first_name: String,
    pub last_name: String,
    pub dob: Option<NaiveDate>,
    pub birth_year: Option<i32>,
    pub jurisdiction_name: String,
    pub jurisdiction_id: Option<JurisdictionId>,
    pub registration_number: Option<String>,
    pub status: RollStatus,
    pub ambiguous_dob: bool,
    pub list_date: NaiveDate,
    pub previous_jurisdiction_name: Option<String>,
    pub removed_at: Option<DateTime<Utc>>,
    pub batch_id: BatchId,
    pub removed_in_batch: Option<BatchId>,
}

impl RollRecord {
    pub fn from_entry(
        id: RollRecordId,
        entry: RollEntry,
        list_date: NaiveDate,
        batch_id: BatchId,
    ) -> Self {
        let birth_year = entry.effective_birth_year();
        Self {
            id,
            first_name: entry.first_name,
            last_name: entry.last_name,
            dob: entry.dob,
            birth_year,
            jurisdiction_name: entry.jurisdiction_name,
            jurisdiction_id: entry.jurisdiction_id,
            registration_number: entry.registration_number,
            status: RollStatus::Active,
            ambiguous_dob: entry.ambiguous_dob,
            list_date,
            previous_jurisdiction_name: None,
            removed_at: None,
            batch_id,
            removed_in_batch: None,
        }
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey::new(&self.first_name, &self.last_name, self.dob, self.birth_year)
    }

    pub fn is_active(&self) -> bool {
        self.status == RollStatus::Active
    }

    /// Overwrites the roll-owned fields with a newer entry for the same identity.
    pub fn apply(&mut self, entry: RollEntry, list_date: NaiveDate, batch_id: BatchId) {
        if entry.transfers_from(self) {
            self.previous_jurisdiction_name = Some(self.jurisdiction_name.clone());
        }
        self.birth_year = entry.effective_birth_year();
        self.first_name = entry.first_name;
        self.last_name = entry.last_name;
        self.dob = entry.dob;
        self.jurisdiction_name = entry.jurisdiction_name;
        self.jurisdiction_id = entry.jurisdiction_id;
        self.registration_number = entry.registration_number;
        self.ambiguous_dob = entry.ambiguous_dob;
        self.list_date = list_date;
        self.batch_id = batch_id;
    }

    pub fn mark_removed(&mut self, at: DateTime<Utc>, batch_id: BatchId) {
        self.status = RollStatus::Removed;
        self.removed_at = Some(at);
        self.removed_in_batch = Some(batch_id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl BatchStatus {
    pub const fn label(self) -> &'static str {
        match self {
            BatchStatus::Pending => "pending",
            BatchStatus::Processing => "processing",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
        }
    }
}

/// Change summary for one upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportCounts {
    pub total: usize,
    pub new: usize,
    pub updated: usize,
    pub removed: usize,
    pub transferred: usize,
    pub ambiguous_dob: usize,
    pub re_vetted: usize,
    pub skipped: usize,
    pub unresolved_jurisdiction: usize,
}

/// Row-level problem recorded against a batch; `row` is the 1-based data row number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub reason: String,
}

/// One roll upload and its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBatch {
    pub id: BatchId,
    pub list_date: NaiveDate,
    pub source_filename: Option<String>,
    pub status: BatchStatus,
    pub counts: ImportCounts,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure: Option<String>,
    pub row_errors: Vec<RowError>,
}

impl ImportBatch {
    pub fn pending(
        id: BatchId,
        list_date: NaiveDate,
        source_filename: Option<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            list_date,
            source_filename,
            status: BatchStatus::Pending,
            counts: ImportCounts::default(),
            started_at,
            completed_at: None,
            failure: None,
            row_errors: Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == BatchStatus::Completed
    }

    pub fn fail(&mut self, reason: impl Into<String>, at: DateTime<Utc>) {
        self.status = BatchStatus::Failed;
        self.failure = Some(reason.into());
        self.completed_at = Some(at);
    }
}
