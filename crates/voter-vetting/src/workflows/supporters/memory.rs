use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::sync::{Arc, Mutex};

use super::domain::{Supporter, SupporterId};
use super::repository::{
    DuplicateFlags, DuplicateKey, ReviewError, ReviewItem, ReviewQueue, SupporterFilter,
    SupporterRepository, VettingUpdate,
};
use crate::workflows::{AuditSubject, RepositoryError};

/// Supporter records plus a duplicate-key index kept in step with every identity write.
#[derive(Default, Clone)]
pub struct InMemorySupporterRepository {
    state: Arc<Mutex<SupporterState>>,
}

#[derive(Default)]
struct SupporterState {
    records: BTreeMap<SupporterId, Supporter>,
    by_key: HashMap<DuplicateKey, BTreeSet<SupporterId>>,
    next_id: u64,
}

impl SupporterState {
    fn index(&mut self, supporter: &Supporter) {
        for key in DuplicateKey::for_supporter(supporter) {
            self.by_key.entry(key).or_default().insert(supporter.id);
        }
    }

    fn unindex(&mut self, supporter: &Supporter) {
        for key in DuplicateKey::for_supporter(supporter) {
            if let Some(ids) = self.by_key.get_mut(&key) {
                ids.remove(&supporter.id);
                if ids.is_empty() {
                    self.by_key.remove(&key);
                }
            }
        }
    }
}

impl InMemorySupporterRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_record<F>(&self, id: SupporterId, apply: F) -> Result<(), RepositoryError>
    where
        F: FnOnce(&mut Supporter),
    {
        let mut state = self.state.lock()?;
        let record = state.records.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        apply(record);
        Ok(())
    }
}

impl SupporterRepository for InMemorySupporterRepository {
    fn insert(&self, mut supporter: Supporter) -> Result<Supporter, RepositoryError> {
        let mut state = self.state.lock()?;
        state.next_id += 1;
        supporter.id = SupporterId(state.next_id);
        state.index(&supporter);
        state.records.insert(supporter.id, supporter.clone());
        Ok(supporter)
    }

    fn save_identity(&self, supporter: &Supporter) -> Result<(), RepositoryError> {
        let mut state = self.state.lock()?;
        let mut record = state
            .records
            .get(&supporter.id)
            .cloned()
            .ok_or(RepositoryError::NotFound)?;
        state.unindex(&record);

        record.first_name = supporter.first_name.clone();
        record.last_name = supporter.last_name.clone();
        record.dob = supporter.dob;
        record.birth_year = supporter.birth_year;
        record.phone = supporter.phone.clone();
        record.email = supporter.email.clone();
        record.jurisdiction_id = supporter.jurisdiction_id;
        record.normalized_phone = supporter.normalized_phone.clone();
        record.updated_at = supporter.updated_at;

        state.index(&record);
        state.records.insert(record.id, record);
        Ok(())
    }

    fn record_vetting(
        &self,
        id: SupporterId,
        update: &VettingUpdate,
    ) -> Result<(), RepositoryError> {
        self.with_record(id, |record| update.apply_to(record))
    }

    fn record_duplicate_flags(
        &self,
        id: SupporterId,
        flags: &DuplicateFlags,
    ) -> Result<(), RepositoryError> {
        self.with_record(id, |record| flags.apply_to(record))
    }

    fn fetch(&self, id: SupporterId) -> Result<Option<Supporter>, RepositoryError> {
        let state = self.state.lock()?;
        Ok(state.records.get(&id).cloned())
    }

    fn find(
        &self,
        filter: &SupporterFilter,
        after: Option<SupporterId>,
        limit: usize,
    ) -> Result<Vec<Supporter>, RepositoryError> {
        let state = self.state.lock()?;
        let lower = after.map_or(Bound::Unbounded, Bound::Excluded);
        Ok(state
            .records
            .range((lower, Bound::Unbounded))
            .map(|(_, supporter)| supporter)
            .filter(|supporter| filter.matches(supporter))
            .take(limit)
            .cloned()
            .collect())
    }

    fn find_by_key(&self, key: &DuplicateKey) -> Result<Vec<Supporter>, RepositoryError> {
        let state = self.state.lock()?;
        let Some(ids) = state.by_key.get(key) else {
            return Ok(Vec::new());
        };
        Ok(ids
            .iter()
            .filter_map(|id| state.records.get(id))
            .filter(|supporter| supporter.is_active())
            .cloned()
            .collect())
    }
}

/// Review queue held in memory so operators can list pending items.
///
/// Holds at most one item per subject, in the order subjects first entered the queue.
#[derive(Default, Clone)]
pub struct InMemoryReviewQueue {
    items: Arc<Mutex<Vec<ReviewItem>>>,
}

impl InMemoryReviewQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn items(&self) -> Result<Vec<ReviewItem>, RepositoryError> {
        Ok(self.items.lock()?.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<ReviewItem>>, ReviewError> {
        self.items
            .lock()
            .map_err(|_| ReviewError::Transport("review queue lock poisoned".to_string()))
    }
}

impl ReviewQueue for InMemoryReviewQueue {
    fn submit(&self, item: ReviewItem) -> Result<(), ReviewError> {
        let mut items = self.lock()?;
        match items.iter_mut().find(|pending| pending.subject == item.subject) {
            Some(pending) => *pending = item,
            None => items.push(item),
        }
        Ok(())
    }

    fn withdraw(&self, subject: &AuditSubject) -> Result<(), ReviewError> {
        self.lock()?.retain(|pending| pending.subject != *subject);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::roll::JurisdictionId;
    use crate::workflows::supporters::SupporterSubmission;
    use chrono::Utc;

    fn supporter(first: &str, phone: &str) -> Supporter {
        let submission = SupporterSubmission {
            first_name: first.to_string(),
            last_name: "Cruz".to_string(),
            phone: Some(phone.to_string()),
            jurisdiction_id: Some(JurisdictionId(1)),
            ..SupporterSubmission::default()
        };
        Supporter::from_submission(submission, Some(phone.to_string()), Utc::now())
    }

    fn ids(found: Vec<Supporter>) -> Vec<u64> {
        found.into_iter().map(|supporter| supporter.id.0).collect()
    }

    #[test]
    fn key_index_follows_identity_edits() {
        let repository = InMemorySupporterRepository::new();
        let juan = repository
            .insert(supporter("Juan", "6715551234"))
            .expect("insert");
        repository
            .insert(supporter("Jose", "6715551234"))
            .expect("insert");

        let phone = DuplicateKey::Phone("6715551234".to_string());
        assert_eq!(ids(repository.find_by_key(&phone).expect("lookup")), vec![1, 2]);

        let mut edited = juan.clone();
        edited.first_name = "Juanito".to_string();
        edited.phone = Some("6715559999".to_string());
        edited.normalized_phone = Some("6715559999".to_string());
        repository.save_identity(&edited).expect("save");

        assert_eq!(ids(repository.find_by_key(&phone).expect("lookup")), vec![2]);
        let new_phone = DuplicateKey::Phone("6715559999".to_string());
        assert_eq!(ids(repository.find_by_key(&new_phone).expect("lookup")), vec![1]);

        let old_name = DuplicateKey::NameInJurisdiction {
            first_name: "juan".to_string(),
            last_name: "cruz".to_string(),
            jurisdiction_id: JurisdictionId(1),
        };
        assert!(repository.find_by_key(&old_name).expect("lookup").is_empty());
    }

    #[test]
    fn queue_keeps_one_item_per_subject() {
        let queue = InMemoryReviewQueue::new();
        let item = |id: u64, reason: &str| ReviewItem {
            subject: AuditSubject::Supporter(SupporterId(id)),
            reason: reason.to_string(),
            tier: None,
            candidates: Vec::new(),
        };

        queue.submit(item(1, "first pass")).expect("submit");
        queue.submit(item(2, "other")).expect("submit");
        queue.submit(item(1, "second pass")).expect("submit");

        let items = queue.items().expect("items");
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].reason, "second pass");

        queue
            .withdraw(&AuditSubject::Supporter(SupporterId(1)))
            .expect("withdraw");
        let items = queue.items().expect("items");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].subject, AuditSubject::Supporter(SupporterId(2)));
    }
}
