use std::collections::HashSet;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;

use crate::config::ReconciliationConfig;
use crate::workflows::matching::Matcher;
use crate::workflows::roll::{
    ImportProcessor, ImportRequest, InMemoryRollStore, JurisdictionId, StaticJurisdictions,
};
use crate::workflows::supporters::{
    DuplicateFlags, DuplicateKey, InMemoryReviewQueue, InMemorySupporterRepository, ReviewError,
    ReviewItem, ReviewQueue, Supporter, SupporterFilter, SupporterId, SupporterRepository,
    SupporterService, SupporterSubmission, VettingUpdate,
};
use crate::workflows::RepositoryError;

pub(super) const BARRIGADA: JurisdictionId = JurisdictionId(1);
pub(super) const DEDEDO: JurisdictionId = JurisdictionId(2);
pub(super) const YIGO: JurisdictionId = JurisdictionId(3);

pub(super) fn directory() -> Arc<StaticJurisdictions> {
    Arc::new(StaticJurisdictions::from_names(&["Barrigada", "Dededo", "Yigo"]))
}

/// Roll store loaded from CSV body lines under a fixed header.
pub(super) fn roll(rows: &str) -> Arc<InMemoryRollStore> {
    let store = Arc::new(InMemoryRollStore::new());
    if rows.is_empty() {
        return store;
    }
    let importer = ImportProcessor::new(store.clone(), directory(), ReconciliationConfig::default());
    importer
        .import_reader(
            ImportRequest {
                list_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"),
                source_filename: None,
            },
            Cursor::new(format!(
                "first_name,last_name,dob,birth_year,jurisdiction_name,registration_number\n{rows}"
            )),
        )
        .expect("seed import");
    store
}

pub(super) type TestService =
    SupporterService<InMemoryRollStore, InMemorySupporterRepository, InMemoryReviewQueue>;

pub(super) fn build_service(
    store: Arc<InMemoryRollStore>,
    config: &ReconciliationConfig,
) -> (
    TestService,
    Arc<InMemorySupporterRepository>,
    Arc<InMemoryReviewQueue>,
) {
    let repository = Arc::new(InMemorySupporterRepository::new());
    let queue = Arc::new(InMemoryReviewQueue::new());
    let service = SupporterService::new(
        Arc::new(Matcher::new(store, config.clone())),
        directory(),
        repository.clone(),
        queue.clone(),
        config,
    );
    (service, repository, queue)
}

pub(super) fn juan_cruz_roll() -> Arc<InMemoryRollStore> {
    roll("Juan,Cruz,1985-03-15,,Barrigada,R-100\nAna,Santos,1990-05-20,,Dededo,R-200\n")
}

pub(super) fn submission(
    first: &str,
    last: &str,
    jurisdiction_id: Option<JurisdictionId>,
) -> SupporterSubmission {
    SupporterSubmission {
        first_name: first.to_string(),
        last_name: last.to_string(),
        jurisdiction_id,
        ..SupporterSubmission::default()
    }
}

pub(super) fn with_dob(mut submission: SupporterSubmission, y: i32, m: u32, d: u32) -> SupporterSubmission {
    submission.dob = NaiveDate::from_ymd_opt(y, m, d);
    submission
}

pub(super) fn with_phone(mut submission: SupporterSubmission, phone: &str) -> SupporterSubmission {
    submission.phone = Some(phone.to_string());
    submission
}

pub(super) fn with_email(mut submission: SupporterSubmission, email: &str) -> SupporterSubmission {
    submission.email = Some(email.to_string());
    submission
}

pub(super) fn fetch(repository: &InMemorySupporterRepository, id: SupporterId) -> Supporter {
    repository
        .fetch(id)
        .expect("fetch succeeds")
        .expect("record present")
}

/// Delegates to an in-memory repository but refuses duplicate-flag writes for chosen ids.
#[derive(Default)]
pub(super) struct FlakyFlagRepository {
    pub(super) inner: InMemorySupporterRepository,
    pub(super) failing: Mutex<HashSet<SupporterId>>,
}

impl FlakyFlagRepository {
    pub(super) fn fail_for(&self, id: SupporterId) {
        self.failing.lock().expect("flaky mutex poisoned").insert(id);
    }
}

impl SupporterRepository for FlakyFlagRepository {
    fn insert(&self, supporter: Supporter) -> Result<Supporter, RepositoryError> {
        self.inner.insert(supporter)
    }

    fn save_identity(&self, supporter: &Supporter) -> Result<(), RepositoryError> {
        self.inner.save_identity(supporter)
    }

    fn record_vetting(
        &self,
        id: SupporterId,
        update: &VettingUpdate,
    ) -> Result<(), RepositoryError> {
        self.inner.record_vetting(id, update)
    }

    fn record_duplicate_flags(
        &self,
        id: SupporterId,
        flags: &DuplicateFlags,
    ) -> Result<(), RepositoryError> {
        if self.failing.lock().expect("flaky mutex poisoned").contains(&id) {
            return Err(RepositoryError::Unavailable("write rejected".to_string()));
        }
        self.inner.record_duplicate_flags(id, flags)
    }

    fn fetch(&self, id: SupporterId) -> Result<Option<Supporter>, RepositoryError> {
        self.inner.fetch(id)
    }

    fn find(
        &self,
        filter: &SupporterFilter,
        after: Option<SupporterId>,
        limit: usize,
    ) -> Result<Vec<Supporter>, RepositoryError> {
        self.inner.find(filter, after, limit)
    }

    fn find_by_key(&self, key: &DuplicateKey) -> Result<Vec<Supporter>, RepositoryError> {
        self.inner.find_by_key(key)
    }
}

pub(super) struct UnavailableRepository;

impl SupporterRepository for UnavailableRepository {
    fn insert(&self, _supporter: Supporter) -> Result<Supporter, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn save_identity(&self, _supporter: &Supporter) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn record_vetting(
        &self,
        _id: SupporterId,
        _update: &VettingUpdate,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn record_duplicate_flags(
        &self,
        _id: SupporterId,
        _flags: &DuplicateFlags,
    ) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: SupporterId) -> Result<Option<Supporter>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find(
        &self,
        _filter: &SupporterFilter,
        _after: Option<SupporterId>,
        _limit: usize,
    ) -> Result<Vec<Supporter>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn find_by_key(&self, _key: &DuplicateKey) -> Result<Vec<Supporter>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) struct FailingReviewQueue;

impl ReviewQueue for FailingReviewQueue {
    fn submit(&self, _item: ReviewItem) -> Result<(), ReviewError> {
        Err(ReviewError::Transport("queue offline".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
