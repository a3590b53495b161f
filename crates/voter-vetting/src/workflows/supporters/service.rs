use std::error::Error;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use super::domain::{Supporter, SupporterId, SupporterSubmission};
use super::duplicates::{DuplicateDetector, ScanSummary};
use super::phone::PhoneNormalizer;
use super::repository::{ReviewError, ReviewQueue, SupporterFilter, SupporterRepository};
use super::vetting::{VettingEngine, VettingOutcome, VettingReport};
use crate::config::ReconciliationConfig;
use crate::workflows::matching::Matcher;
use crate::workflows::roll::{ImportBatch, JurisdictionDirectory, RevetHook, RollStore};
use crate::workflows::{RepositoryError, StopSignal};

/// Supporter record after a create or update, with what the engine concluded about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupporterReport {
    pub supporter: Supporter,
    /// Absent when an update left the matcher inputs unchanged.
    pub vetting: Option<VettingReport>,
    pub duplicates: Vec<SupporterId>,
}

/// Aggregate counts for a bulk re-vet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RevetSummary {
    pub processed: usize,
    pub auto_verified: usize,
    pub referral: usize,
    pub unregistered: usize,
    pub skipped: usize,
    pub needs_review: usize,
    pub failed: usize,
    pub stopped: bool,
}

impl RevetSummary {
    fn record(&mut self, outcome: VettingOutcome) {
        self.processed += 1;
        match outcome {
            VettingOutcome::AutoVerified => self.auto_verified += 1,
            VettingOutcome::Referral => self.referral += 1,
            VettingOutcome::Unregistered => self.unregistered += 1,
            VettingOutcome::Skipped => self.skipped += 1,
            VettingOutcome::NeedsReview => self.needs_review += 1,
        }
    }

    /// Records whose registration fields were actually evaluated.
    pub fn vetted(&self) -> usize {
        self.processed - self.skipped
    }
}

/// Service composing the supporter repository, the vetting engine, and the duplicate detector.
pub struct SupporterService<S, R, Q> {
    repository: Arc<R>,
    engine: VettingEngine<S, R, Q>,
    detector: DuplicateDetector<R>,
    phones: PhoneNormalizer,
    revet_chunk_size: usize,
}

impl<S, R, Q> SupporterService<S, R, Q>
where
    S: RollStore + 'static,
    R: SupporterRepository + 'static,
    Q: ReviewQueue + 'static,
{
    pub fn new(
        matcher: Arc<Matcher<S>>,
        jurisdictions: Arc<dyn JurisdictionDirectory>,
        repository: Arc<R>,
        review: Arc<Q>,
        config: &ReconciliationConfig,
    ) -> Self {
        Self {
            engine: VettingEngine::new(matcher, jurisdictions, repository.clone(), review),
            detector: DuplicateDetector::new(repository.clone(), config),
            phones: PhoneNormalizer::new(config),
            revet_chunk_size: config.revet_chunk_size.max(1),
            repository,
        }
    }

    /// Stores a new supporter, then flags duplicates and vets it.
    pub fn create(
        &self,
        submission: SupporterSubmission,
    ) -> Result<SupporterReport, SupporterServiceError> {
        validate(&submission)?;
        let phone = self.phones.normalize(submission.phone.as_deref());
        let supporter = self
            .repository
            .insert(Supporter::from_submission(submission, phone, Utc::now()))?;

        let duplicates = self.detector.check(&supporter)?;
        let vetting = self.engine.vet(&supporter)?;
        self.report(supporter.id, Some(vetting), duplicates)
    }

    /// Saves edited identity fields; re-vets only when a matcher input changed.
    pub fn update(
        &self,
        id: SupporterId,
        submission: SupporterSubmission,
    ) -> Result<SupporterReport, SupporterServiceError> {
        validate(&submission)?;
        let mut supporter = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;

        let identity_changed = supporter.identity_changed(&submission);
        let former: Vec<SupporterId> = self
            .detector
            .find_duplicates(&supporter)?
            .into_iter()
            .map(|other| other.id)
            .collect();
        let phone = self.phones.normalize(submission.phone.as_deref());
        supporter.apply_identity(submission, phone, Utc::now());
        self.repository.save_identity(&supporter)?;

        let duplicates = self.detector.check_after_edit(&supporter, &former)?;
        let vetting = if identity_changed {
            Some(self.engine.vet(&supporter)?)
        } else {
            None
        };
        self.report(id, vetting, duplicates)
    }

    pub fn get(&self, id: SupporterId) -> Result<Supporter, SupporterServiceError> {
        let supporter = self
            .repository
            .fetch(id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(supporter)
    }

    pub fn duplicates_for(&self, id: SupporterId) -> Result<Vec<Supporter>, SupporterServiceError> {
        let supporter = self.get(id)?;
        Ok(self.detector.find_duplicates(&supporter)?)
    }

    /// Vets every record selected by `filter`, chunk by chunk.
    ///
    /// A failure on one record is counted and the pass continues.
    pub fn revet(
        &self,
        filter: &SupporterFilter,
        stop: &StopSignal,
    ) -> Result<RevetSummary, SupporterServiceError> {
        let mut summary = RevetSummary::default();
        let mut after = None;

        loop {
            if stop.is_stopped() {
                summary.stopped = true;
                break;
            }

            let chunk = self
                .repository
                .find(filter, after, self.revet_chunk_size)?;
            let Some(last) = chunk.last() else {
                break;
            };
            after = Some(last.id);

            for supporter in &chunk {
                match self.engine.vet(supporter) {
                    Ok(report) => summary.record(report.outcome),
                    Err(err) => {
                        summary.failed += 1;
                        warn!(supporter_id = supporter.id.0, error = %err, "re-vet failed");
                    }
                }
            }

            if chunk.len() < self.revet_chunk_size {
                break;
            }
        }

        info!(
            processed = summary.processed,
            auto_verified = summary.auto_verified,
            referral = summary.referral,
            unregistered = summary.unregistered,
            needs_review = summary.needs_review,
            failed = summary.failed,
            stopped = summary.stopped,
            "bulk re-vet finished"
        );
        Ok(summary)
    }

    pub fn scan_duplicates(&self, stop: &StopSignal) -> Result<ScanSummary, SupporterServiceError> {
        Ok(self.detector.scan_all(stop)?)
    }

    fn report(
        &self,
        id: SupporterId,
        vetting: Option<VettingReport>,
        duplicates: Vec<Supporter>,
    ) -> Result<SupporterReport, SupporterServiceError> {
        Ok(SupporterReport {
            supporter: self.get(id)?,
            vetting,
            duplicates: duplicates.into_iter().map(|other| other.id).collect(),
        })
    }
}

fn validate(submission: &SupporterSubmission) -> Result<(), SupporterServiceError> {
    if submission.first_name.trim().is_empty() || submission.last_name.trim().is_empty() {
        return Err(SupporterServiceError::Invalid(
            "first_name and last_name are required".to_string(),
        ));
    }
    Ok(())
}

/// Re-vets supporters after a roll import commits.
pub struct PostImportRevet<S, R, Q> {
    service: Arc<SupporterService<S, R, Q>>,
    filter: SupporterFilter,
    stop: StopSignal,
}

impl<S, R, Q> PostImportRevet<S, R, Q> {
    pub fn new(service: Arc<SupporterService<S, R, Q>>, stop: StopSignal) -> Self {
        Self {
            service,
            filter: SupporterFilter::default(),
            stop,
        }
    }

    pub fn with_filter(mut self, filter: SupporterFilter) -> Self {
        self.filter = filter;
        self
    }
}

impl<S, R, Q> RevetHook for PostImportRevet<S, R, Q>
where
    S: RollStore + 'static,
    R: SupporterRepository + 'static,
    Q: ReviewQueue + 'static,
{
    fn after_commit(&self, batch: &ImportBatch) -> Result<usize, Box<dyn Error + Send + Sync>> {
        let summary = self.service.revet(&self.filter, &self.stop)?;
        info!(batch_id = batch.id.0, re_vetted = summary.vetted(), "post-import re-vet finished");
        Ok(summary.vetted())
    }
}

/// Error raised by the supporter service.
#[derive(Debug, thiserror::Error)]
pub enum SupporterServiceError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Review(#[from] ReviewError),
    #[error("invalid supporter: {0}")]
    Invalid(String),
}
