use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{
    BatchId, BatchStatus, ImportBatch, ImportCounts, NaturalKey, RollEntry, RollRecord, RowError,
};
use super::normalizer::{is_ambiguous_dob, non_blank, parse_birth};
use super::parser::{read_rows, RollRow, RowReadError};
use super::repository::{JurisdictionDirectory, RollChangeset, RollStore, RollUpdate};
use super::ImportError;
use crate::config::ReconciliationConfig;

/// Metadata declared by the operator for one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRequest {
    pub list_date: NaiveDate,
    #[serde(default)]
    pub source_filename: Option<String>,
}

/// Dry-run result: what an upload would contain, with nothing written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportPreview {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub ambiguous_dob: usize,
    pub unresolved_jurisdiction: usize,
    pub sample: Vec<RollEntry>,
    pub errors: Vec<RowError>,
}

/// Runs after a batch commits; returns how many supporters were re-vetted.
pub trait RevetHook: Send + Sync {
    fn after_commit(&self, batch: &ImportBatch) -> Result<usize, Box<dyn Error + Send + Sync>>;
}

/// Rows that survived validation, plus what was learned while reading them.
struct StagedRows {
    entries: Vec<RollEntry>,
    errors: Vec<RowError>,
    counts: ImportCounts,
}

pub struct ImportProcessor<S> {
    store: Arc<S>,
    jurisdictions: Arc<dyn JurisdictionDirectory>,
    config: ReconciliationConfig,
    revet: Option<Arc<dyn RevetHook>>,
}

impl<S> ImportProcessor<S>
where
    S: RollStore + 'static,
{
    pub fn new(
        store: Arc<S>,
        jurisdictions: Arc<dyn JurisdictionDirectory>,
        config: ReconciliationConfig,
    ) -> Self {
        Self {
            store,
            jurisdictions,
            config,
            revet: None,
        }
    }

    pub fn with_revet_hook(mut self, hook: Arc<dyn RevetHook>) -> Self {
        self.revet = Some(hook);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn jurisdictions(&self) -> &Arc<dyn JurisdictionDirectory> {
        &self.jurisdictions
    }

    pub fn import_file(
        &self,
        path: &Path,
        list_date: NaiveDate,
    ) -> Result<ImportBatch, ImportError> {
        let file = File::open(path)?;
        let request = ImportRequest {
            list_date,
            source_filename: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned()),
        };
        self.import_reader(request, file)
    }

    /// Imports a CSV upload. The batch is opened before the header is read, so an upload
    /// rejected for its header still leaves a failed batch in the history.
    pub fn import_reader<R: Read>(
        &self,
        request: ImportRequest,
        reader: R,
    ) -> Result<ImportBatch, ImportError> {
        let mut batch = self.open_batch(request)?;
        let processed = read_rows(reader).and_then(|rows| self.process(&mut batch, rows));
        self.settle(batch, processed)
    }

    /// Diffs an upload against the active snapshot and commits the result.
    ///
    /// Roll records are only touched by the final commit, so a failed batch leaves the
    /// snapshot exactly as it was.
    pub fn import<I>(&self, request: ImportRequest, rows: I) -> Result<ImportBatch, ImportError>
    where
        I: IntoIterator<Item = Result<RollRow, RowReadError>>,
    {
        let mut batch = self.open_batch(request)?;
        let processed = self.process(&mut batch, rows);
        self.settle(batch, processed)
    }

    /// Rejects stale list dates, then registers the batch as processing.
    fn open_batch(&self, request: ImportRequest) -> Result<ImportBatch, ImportError> {
        if let Some(latest) = self.store.latest_completed_list_date()? {
            if request.list_date < latest {
                return Err(ImportError::StaleListDate {
                    requested: request.list_date,
                    latest,
                });
            }
        }

        let mut batch = self
            .store
            .begin_batch(request.list_date, request.source_filename)?;
        batch.status = BatchStatus::Processing;
        self.store.save_batch(&batch)?;
        info!(batch_id = batch.id.0, list_date = %batch.list_date, "roll import started");
        Ok(batch)
    }

    fn settle(
        &self,
        mut batch: ImportBatch,
        processed: Result<(), ImportError>,
    ) -> Result<ImportBatch, ImportError> {
        if let Err(err) = processed {
            warn!(batch_id = batch.id.0, error = %err, "roll import failed");
            batch.fail(err.to_string(), Utc::now());
            if let Err(save_err) = self.store.save_batch(&batch) {
                warn!(batch_id = batch.id.0, error = %save_err, "could not record failed batch");
            }
            return Err(err);
        }

        self.run_revet(&mut batch);
        Ok(batch)
    }

    pub fn preview_reader<R: Read>(&self, reader: R) -> Result<ImportPreview, ImportError> {
        let rows = read_rows(reader)?;
        self.preview(rows)
    }

    pub fn preview_file(&self, path: &Path) -> Result<ImportPreview, ImportError> {
        self.preview_reader(File::open(path)?)
    }

    /// Parses and validates an upload without touching the store.
    pub fn preview<I>(&self, rows: I) -> Result<ImportPreview, ImportError>
    where
        I: IntoIterator<Item = Result<RollRow, RowReadError>>,
    {
        let staged = self.stage(rows)?;
        Ok(ImportPreview {
            total_rows: staged.counts.total,
            valid_rows: staged.entries.len(),
            ambiguous_dob: staged.counts.ambiguous_dob,
            unresolved_jurisdiction: staged.counts.unresolved_jurisdiction,
            sample: staged
                .entries
                .into_iter()
                .take(self.config.preview_rows)
                .collect(),
            errors: staged.errors,
        })
    }

    pub fn batches(&self) -> Result<Vec<ImportBatch>, ImportError> {
        Ok(self.store.batches()?)
    }

    pub fn batch(&self, id: BatchId) -> Result<Option<ImportBatch>, ImportError> {
        Ok(self.store.batch(id)?)
    }

    fn process<I>(&self, batch: &mut ImportBatch, rows: I) -> Result<(), ImportError>
    where
        I: IntoIterator<Item = Result<RollRow, RowReadError>>,
    {
        let staged = self.stage(rows)?;
        if staged.entries.is_empty() {
            batch.counts = staged.counts;
            batch.row_errors = staged.errors;
            return Err(ImportError::EmptyUpload);
        }

        let prior = self.store.active_records()?;
        let changeset = diff_snapshot(&prior, staged.entries);
        debug!(
            batch_id = batch.id.0,
            inserts = changeset.inserts.len(),
            updates = changeset.updates.len(),
            removals = changeset.removals.len(),
            "roll diff computed"
        );

        batch.counts = staged.counts;
        batch.row_errors = staged.errors;
        batch.status = BatchStatus::Completed;
        batch.completed_at = Some(Utc::now());

        let outcome = self.store.commit(batch, changeset)?;
        outcome.apply_to(&mut batch.counts);

        info!(
            batch_id = batch.id.0,
            total = batch.counts.total,
            new = batch.counts.new,
            updated = batch.counts.updated,
            removed = batch.counts.removed,
            transferred = batch.counts.transferred,
            skipped = batch.counts.skipped,
            "roll import completed"
        );
        Ok(())
    }

    fn run_revet(&self, batch: &mut ImportBatch) {
        let Some(hook) = &self.revet else {
            return;
        };
        match hook.after_commit(batch) {
            Ok(re_vetted) => {
                batch.counts.re_vetted = re_vetted;
                if let Err(err) = self.store.attach_revet_count(batch.id, re_vetted) {
                    warn!(batch_id = batch.id.0, error = %err, "could not attach re-vet count");
                }
            }
            Err(err) => {
                warn!(batch_id = batch.id.0, error = %err, "post-import re-vet failed");
            }
        }
    }

    fn stage<I>(&self, rows: I) -> Result<StagedRows, ImportError>
    where
        I: IntoIterator<Item = Result<RollRow, RowReadError>>,
    {
        let mut staged = StagedRows {
            entries: Vec::new(),
            errors: Vec::new(),
            counts: ImportCounts::default(),
        };
        let mut seen: HashSet<NaturalKey> = HashSet::new();

        for (index, row) in rows.into_iter().enumerate() {
            let row_number = index + 1;
            staged.counts.total += 1;

            let parsed = match row {
                Ok(row) => self.entry_from_row(&row),
                Err(RowReadError::Rejected(reason)) => Err(reason),
                Err(RowReadError::Fatal(err)) => return Err(ImportError::Csv(err)),
            };

            let entry = match parsed {
                Ok(entry) if !seen.insert(entry.natural_key()) => {
                    Err("duplicate row in upload".to_string())
                }
                other => other,
            };

            match entry {
                Ok(entry) => {
                    if entry.ambiguous_dob {
                        staged.counts.ambiguous_dob += 1;
                        if let Some(dob) = entry.dob {
                            warn!(row = row_number, %dob, "ambiguous date of birth");
                        }
                    }
                    if entry.jurisdiction_id.is_none() {
                        staged.counts.unresolved_jurisdiction += 1;
                        debug!(
                            row = row_number,
                            jurisdiction = %entry.jurisdiction_name,
                            "jurisdiction not resolved"
                        );
                    }
                    staged.entries.push(entry);
                }
                Err(reason) => {
                    staged.counts.skipped += 1;
                    staged.errors.push(RowError {
                        row: row_number,
                        reason,
                    });
                }
            }
        }

        Ok(staged)
    }

    fn entry_from_row(&self, row: &RollRow) -> Result<RollEntry, String> {
        let first_name =
            non_blank(row.first_name.as_deref()).ok_or("missing first name")?;
        let last_name = non_blank(row.last_name.as_deref()).ok_or("missing last name")?;
        let jurisdiction_name =
            non_blank(row.jurisdiction_name.as_deref()).ok_or("missing jurisdiction")?;
        let birth = parse_birth(row.dob.as_deref(), row.birth_year.as_deref())?;

        Ok(RollEntry {
            jurisdiction_id: self.jurisdictions.resolve(&jurisdiction_name),
            first_name,
            last_name,
            dob: birth.dob,
            birth_year: birth.birth_year,
            jurisdiction_name,
            registration_number: non_blank(row.registration_number.as_deref()),
            ambiguous_dob: birth.dob.map(is_ambiguous_dob).unwrap_or(false),
        })
    }
}

/// Splits staged entries into inserts and updates, and lists the active records the upload omits.
fn diff_snapshot(prior: &[RollRecord], entries: Vec<RollEntry>) -> RollChangeset {
    let by_key: HashMap<NaturalKey, &RollRecord> = prior
        .iter()
        .map(|record| (record.natural_key(), record))
        .collect();
    let mut seen = HashSet::new();
    let mut changeset = RollChangeset::default();

    for entry in entries {
        match by_key.get(&entry.natural_key()) {
            Some(record) => {
                seen.insert(record.id);
                if !entry.differs_from(record) {
                    continue;
                }
                changeset.updates.push(RollUpdate {
                    id: record.id,
                    entry,
                });
            }
            None => changeset.inserts.push(entry),
        }
    }

    changeset.removals = prior
        .iter()
        .filter(|record| !seen.contains(&record.id))
        .map(|record| record.id)
        .collect();
    changeset
}
