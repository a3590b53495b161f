use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{Supporter, SupporterId};
use super::repository::{DuplicateFlags, DuplicateKey, SupporterFilter, SupporterRepository};
use crate::config::ReconciliationConfig;
use crate::workflows::{RepositoryError, StopSignal};

/// Totals for one bulk duplicate pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanSummary {
    pub scanned: usize,
    pub flagged: usize,
    pub cleared: usize,
    pub failed: usize,
    pub stopped: bool,
}

pub struct DuplicateDetector<R> {
    repository: Arc<R>,
    chunk_size: usize,
}

impl<R> DuplicateDetector<R>
where
    R: SupporterRepository + 'static,
{
    pub fn new(repository: Arc<R>, config: &ReconciliationConfig) -> Self {
        Self {
            repository,
            chunk_size: config.duplicate_chunk_size.max(1),
        }
    }

    /// Other active supporters sharing a phone, an email, or a name within the same jurisdiction.
    pub fn find_duplicates(&self, supporter: &Supporter) -> Result<Vec<Supporter>, RepositoryError> {
        let mut found = BTreeMap::new();
        for key in DuplicateKey::for_supporter(supporter) {
            for other in self.repository.find_by_key(&key)? {
                if other.id != supporter.id && other.is_active() {
                    found.insert(other.id, other);
                }
            }
        }
        Ok(found.into_values().collect())
    }

    /// Flags a new record against its current matches, refreshes those partners, and returns
    /// the matches.
    pub fn check(&self, supporter: &Supporter) -> Result<Vec<Supporter>, RepositoryError> {
        self.check_after_edit(supporter, &[])
    }

    /// Like [`check`](Self::check), but also refreshes `former` partners the edited record
    /// may no longer match, so their `duplicate_of_id` does not keep pointing at it.
    ///
    /// Only the edited record's own flag write is fatal; a partner that cannot be refreshed is
    /// logged and left for the next [`scan_all`](Self::scan_all).
    pub fn check_after_edit(
        &self,
        supporter: &Supporter,
        former: &[SupporterId],
    ) -> Result<Vec<Supporter>, RepositoryError> {
        let checked_at = Utc::now();
        let duplicates = self.find_duplicates(supporter)?;
        self.repository
            .record_duplicate_flags(supporter.id, &flags_for(&duplicates, checked_at))?;

        let partners: BTreeSet<SupporterId> = duplicates
            .iter()
            .map(|other| other.id)
            .chain(former.iter().copied())
            .filter(|id| *id != supporter.id)
            .collect();
        for id in partners {
            if let Err(err) = self.refresh(id, checked_at) {
                warn!(supporter_id = id.0, error = %err, "duplicate partner refresh failed");
            }
        }

        Ok(duplicates)
    }

    fn refresh(&self, id: SupporterId, checked_at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let Some(partner) = self.repository.fetch(id)? else {
            return Ok(());
        };
        if !partner.is_active() {
            return Ok(());
        }
        let duplicates = self.find_duplicates(&partner)?;
        self.repository
            .record_duplicate_flags(id, &flags_for(&duplicates, checked_at))
    }

    /// Recomputes duplicate flags for every active record.
    ///
    /// The key index is built from a chunked read of the table before anything is written, so
    /// every record is judged against the same snapshot. A failed write is counted and skipped.
    pub fn scan_all(&self, stop: &StopSignal) -> Result<ScanSummary, RepositoryError> {
        let mut summary = ScanSummary::default();
        let mut keys_by_record: Vec<(SupporterId, Vec<DuplicateKey>)> = Vec::new();
        let mut records_by_key: HashMap<DuplicateKey, BTreeSet<SupporterId>> = HashMap::new();

        let filter = SupporterFilter::default();
        let mut after = None;
        loop {
            if stop.is_stopped() {
                summary.stopped = true;
                return Ok(summary);
            }
            let chunk = self.repository.find(&filter, after, self.chunk_size)?;
            let Some(last) = chunk.last() else {
                break;
            };
            after = Some(last.id);

            for supporter in &chunk {
                let keys = DuplicateKey::for_supporter(supporter);
                for key in &keys {
                    records_by_key
                        .entry(key.clone())
                        .or_default()
                        .insert(supporter.id);
                }
                keys_by_record.push((supporter.id, keys));
            }

            if chunk.len() < self.chunk_size {
                break;
            }
        }

        let checked_at = Utc::now();
        for chunk in keys_by_record.chunks(self.chunk_size) {
            if stop.is_stopped() {
                summary.stopped = true;
                break;
            }

            for (id, keys) in chunk {
                let lowest_match = keys
                    .iter()
                    .filter_map(|key| records_by_key.get(key))
                    .flat_map(|ids| ids.iter().copied())
                    .filter(|other| other != id)
                    .min();

                let flags = DuplicateFlags {
                    potential_duplicate: lowest_match.is_some(),
                    duplicate_of_id: lowest_match,
                    checked_at,
                };

                summary.scanned += 1;
                match self.repository.record_duplicate_flags(*id, &flags) {
                    Ok(()) if flags.potential_duplicate => summary.flagged += 1,
                    Ok(()) => summary.cleared += 1,
                    Err(err) => {
                        summary.failed += 1;
                        warn!(supporter_id = id.0, error = %err, "duplicate flag write failed");
                    }
                }
            }
        }

        info!(
            scanned = summary.scanned,
            flagged = summary.flagged,
            cleared = summary.cleared,
            failed = summary.failed,
            stopped = summary.stopped,
            "duplicate scan finished"
        );
        Ok(summary)
    }
}

/// Flags for a record whose matches, lowest id first, are `duplicates`.
fn flags_for(duplicates: &[Supporter], checked_at: DateTime<Utc>) -> DuplicateFlags {
    DuplicateFlags {
        potential_duplicate: !duplicates.is_empty(),
        duplicate_of_id: duplicates.first().map(|other| other.id),
        checked_at,
    }
}
