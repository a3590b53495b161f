use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};

use chrono::{NaiveDate, Utc};

use super::domain::{
    BatchId, BatchStatus, ImportBatch, JurisdictionId, NaturalKey, RollEntry, RollRecord,
    RollRecordId,
};
use super::normalizer::normalize_name;
use super::repository::{
    CommitOutcome, JurisdictionDirectory, NameFilter, RollChangeset, RollFilter, RollStore,
};
use crate::workflows::RepositoryError;

/// Roll store kept behind a single mutex so each commit is applied as one unit.
///
/// Active records are indexed by natural key, by normalized name, and by birth year; every
/// commit maintains the indexes. Exact-name lookups resolve through the name index and fuzzy
/// lookups scan only the queried birth year.
#[derive(Default, Clone)]
pub struct InMemoryRollStore {
    state: Arc<Mutex<RollState>>,
}

type NameKey = (String, String);

#[derive(Default)]
struct RollState {
    records: BTreeMap<RollRecordId, RollRecord>,
    batches: BTreeMap<BatchId, ImportBatch>,
    by_key: HashMap<NaturalKey, RollRecordId>,
    by_name: HashMap<NameKey, BTreeSet<RollRecordId>>,
    by_birth_year: HashMap<Option<i32>, BTreeSet<RollRecordId>>,
    active: usize,
    next_record: u64,
    next_batch: u64,
}

fn name_key(first: &str, last: &str) -> NameKey {
    (normalize_name(first), normalize_name(last))
}

impl RollState {
    fn allocate_record_id(&mut self) -> RollRecordId {
        self.next_record += 1;
        RollRecordId(self.next_record)
    }

    fn index(&mut self, record: &RollRecord) {
        self.active += 1;
        self.by_key.insert(record.natural_key(), record.id);
        self.by_name
            .entry(name_key(&record.first_name, &record.last_name))
            .or_default()
            .insert(record.id);
        self.by_birth_year
            .entry(record.birth_year)
            .or_default()
            .insert(record.id);
    }

    fn unindex(&mut self, record: &RollRecord) {
        self.active = self.active.saturating_sub(1);
        if self.by_key.get(&record.natural_key()) == Some(&record.id) {
            self.by_key.remove(&record.natural_key());
        }
        let name = name_key(&record.first_name, &record.last_name);
        if let Some(ids) = self.by_name.get_mut(&name) {
            ids.remove(&record.id);
            if ids.is_empty() {
                self.by_name.remove(&name);
            }
        }
        if let Some(ids) = self.by_birth_year.get_mut(&record.birth_year) {
            ids.remove(&record.id);
            if ids.is_empty() {
                self.by_birth_year.remove(&record.birth_year);
            }
        }
    }

    /// Applies `entry` to an active record, keeping the indexes in step.
    fn apply(&mut self, id: RollRecordId, entry: RollEntry, batch: &ImportBatch) -> Applied {
        let Some(record) = self.records.get(&id) else {
            return Applied::Unchanged;
        };
        if !entry.differs_from(record) {
            return Applied::Unchanged;
        }
        let transfer = entry.transfers_from(record);
        let before = record.clone();
        self.unindex(&before);

        let mut record = before;
        record.apply(entry, batch.list_date, batch.id);
        self.index(&record);
        self.records.insert(id, record);

        if transfer {
            Applied::Transferred
        } else {
            Applied::Updated
        }
    }

    /// Ids of active records that can satisfy `filter`, narrowed by the best index available.
    fn candidate_ids(&self, filter: &RollFilter) -> Vec<RollRecordId> {
        let indexed = match (&filter.name, filter.birth_year) {
            (Some(NameFilter::Exact { first, last }), _) => {
                self.by_name.get(&(first.clone(), last.clone()))
            }
            (_, Some(year)) => self.by_birth_year.get(&Some(year)),
            _ => {
                return self
                    .records
                    .values()
                    .filter(|record| record.is_active())
                    .map(|record| record.id)
                    .collect()
            }
        };
        indexed
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }
}

enum Applied {
    Unchanged,
    Updated,
    Transferred,
}

impl CommitOutcome {
    fn record(&mut self, applied: Applied) {
        match applied {
            Applied::Unchanged => {}
            Applied::Updated => self.updated += 1,
            Applied::Transferred => {
                self.updated += 1;
                self.transferred += 1;
            }
        }
    }
}

impl InMemoryRollStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored record including removed history, in id order.
    pub fn all_records(&self) -> Result<Vec<RollRecord>, RepositoryError> {
        let state = self.state.lock()?;
        Ok(state.records.values().cloned().collect())
    }
}

impl RollStore for InMemoryRollStore {
    fn active_count(&self) -> Result<usize, RepositoryError> {
        let state = self.state.lock()?;
        Ok(state.active)
    }

    fn active_records(&self) -> Result<Vec<RollRecord>, RepositoryError> {
        let state = self.state.lock()?;
        Ok(state
            .records
            .values()
            .filter(|record| record.is_active())
            .cloned()
            .collect())
    }

    fn find_active(&self, filter: &RollFilter) -> Result<Vec<RollRecord>, RepositoryError> {
        let state = self.state.lock()?;
        let mut found: Vec<RollRecord> = state
            .candidate_ids(filter)
            .into_iter()
            .filter_map(|id| state.records.get(&id))
            .filter(|record| record.is_active() && filter.matches(record))
            .cloned()
            .collect();

        if matches!(filter.name, Some(NameFilter::Similar { .. })) {
            found.sort_by(|a, b| {
                let a_score = filter.last_name_similarity(a).unwrap_or_default();
                let b_score = filter.last_name_similarity(b).unwrap_or_default();
                b_score.total_cmp(&a_score).then(a.id.cmp(&b.id))
            });
        }
        Ok(found)
    }

    fn fetch(&self, id: RollRecordId) -> Result<Option<RollRecord>, RepositoryError> {
        let state = self.state.lock()?;
        Ok(state.records.get(&id).cloned())
    }

    fn begin_batch(
        &self,
        list_date: NaiveDate,
        source_filename: Option<String>,
    ) -> Result<ImportBatch, RepositoryError> {
        let mut state = self.state.lock()?;
        state.next_batch += 1;
        let batch = ImportBatch::pending(
            BatchId(state.next_batch),
            list_date,
            source_filename,
            Utc::now(),
        );
        state.batches.insert(batch.id, batch.clone());
        Ok(batch)
    }

    fn save_batch(&self, batch: &ImportBatch) -> Result<(), RepositoryError> {
        let mut state = self.state.lock()?;
        match state.batches.get_mut(&batch.id) {
            Some(existing) if existing.is_completed() => Err(RepositoryError::Conflict),
            Some(existing) => {
                *existing = batch.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    fn commit(
        &self,
        batch: &ImportBatch,
        changeset: RollChangeset,
    ) -> Result<CommitOutcome, RepositoryError> {
        let mut guard = self.state.lock()?;
        let state = &mut *guard;
        match state.batches.get(&batch.id) {
            Some(existing) if existing.is_completed() => return Err(RepositoryError::Conflict),
            Some(_) => {}
            None => return Err(RepositoryError::NotFound),
        }

        let now = Utc::now();
        let mut outcome = CommitOutcome::default();
        let mut inserts = changeset.inserts;

        for update in changeset.updates {
            let active = state
                .records
                .get(&update.id)
                .is_some_and(RollRecord::is_active);
            if !active {
                // Removed by a concurrent upload since the diff was taken.
                inserts.push(update.entry);
                continue;
            }
            outcome.record(state.apply(update.id, update.entry, batch));
        }

        for entry in inserts {
            match state.by_key.get(&entry.natural_key()).copied() {
                Some(id) => outcome.record(state.apply(id, entry, batch)),
                None => {
                    let id = state.allocate_record_id();
                    let record = RollRecord::from_entry(id, entry, batch.list_date, batch.id);
                    state.index(&record);
                    state.records.insert(id, record);
                    outcome.inserted += 1;
                }
            }
        }

        for id in changeset.removals {
            let Some(record) = state.records.get(&id).filter(|record| record.is_active()) else {
                continue;
            };
            let mut record = record.clone();
            state.unindex(&record);
            record.mark_removed(now, batch.id);
            state.records.insert(id, record);
            outcome.removed += 1;
        }

        let mut stored = batch.clone();
        outcome.apply_to(&mut stored.counts);
        stored.status = BatchStatus::Completed;
        stored.completed_at.get_or_insert(now);
        state.batches.insert(stored.id, stored);

        Ok(outcome)
    }

    fn attach_revet_count(&self, batch_id: BatchId, re_vetted: usize) -> Result<(), RepositoryError> {
        let mut state = self.state.lock()?;
        let batch = state
            .batches
            .get_mut(&batch_id)
            .ok_or(RepositoryError::NotFound)?;
        batch.counts.re_vetted = re_vetted;
        Ok(())
    }

    fn batch(&self, id: BatchId) -> Result<Option<ImportBatch>, RepositoryError> {
        let state = self.state.lock()?;
        Ok(state.batches.get(&id).cloned())
    }

    fn batches(&self) -> Result<Vec<ImportBatch>, RepositoryError> {
        let state = self.state.lock()?;
        Ok(state.batches.values().rev().cloned().collect())
    }

    fn latest_completed_list_date(&self) -> Result<Option<NaiveDate>, RepositoryError> {
        let state = self.state.lock()?;
        Ok(state
            .batches
            .values()
            .filter(|batch| batch.is_completed())
            .map(|batch| batch.list_date)
            .max())
    }
}

/// Fixed jurisdiction list, typically seeded at start-up.
#[derive(Debug, Clone, Default)]
pub struct StaticJurisdictions {
    by_name: HashMap<String, JurisdictionId>,
    names: BTreeMap<JurisdictionId, String>,
}

impl StaticJurisdictions {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (JurisdictionId, S)>,
        S: Into<String>,
    {
        let mut directory = Self::default();
        for (id, name) in entries {
            let name = name.into();
            directory.by_name.insert(normalize_name(&name), id);
            directory.names.insert(id, name);
        }
        directory
    }

    /// Numbers the names from 1 in the order given.
    pub fn from_names(names: &[&str]) -> Self {
        Self::new(
            names
                .iter()
                .enumerate()
                .map(|(index, name)| (JurisdictionId(index as u32 + 1), *name)),
        )
    }

    pub fn entries(&self) -> impl Iterator<Item = (JurisdictionId, &str)> {
        self.names.iter().map(|(id, name)| (*id, name.as_str()))
    }
}

impl JurisdictionDirectory for StaticJurisdictions {
    fn resolve(&self, name: &str) -> Option<JurisdictionId> {
        self.by_name.get(&normalize_name(name)).copied()
    }

    fn name_of(&self, id: JurisdictionId) -> Option<String> {
        self.names.get(&id).cloned()
    }
}
