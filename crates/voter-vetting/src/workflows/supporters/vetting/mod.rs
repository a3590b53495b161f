mod policy;

pub use policy::VettingOutcome;

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::debug;

use super::domain::{Supporter, SupporterId, VerificationStatus};
use super::repository::{ReviewItem, ReviewQueue, SupporterRepository, VettingUpdate};
use super::service::SupporterServiceError;
use crate::workflows::matching::{MatchResult, Matcher};
use crate::workflows::roll::{JurisdictionDirectory, RollStore};
use crate::workflows::AuditSubject;
use policy::{decide_outcome, Decision};

/// Outcome of one vetting pass, with the match evidence behind it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VettingReport {
    pub supporter_id: SupporterId,
    pub outcome: VettingOutcome,
    #[serde(rename = "match")]
    pub match_result: MatchResult,
}

/// Applies the vetting policy to matcher output and records the result.
pub struct VettingEngine<S, R, Q> {
    matcher: Arc<Matcher<S>>,
    jurisdictions: Arc<dyn JurisdictionDirectory>,
    repository: Arc<R>,
    review: Arc<Q>,
}

impl<S, R, Q> VettingEngine<S, R, Q>
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
    ) -> Self {
        Self {
            matcher,
            jurisdictions,
            repository,
            review,
        }
    }

    /// Matches `supporter` against the roll and writes the registration fields.
    ///
    /// Nothing is written when no roll has been loaded.
    pub fn vet(&self, supporter: &Supporter) -> Result<VettingReport, SupporterServiceError> {
        let roll_loaded = self.matcher.store().active_count()? > 0;
        let match_result = if roll_loaded {
            let jurisdiction_name = supporter
                .jurisdiction_id
                .and_then(|id| self.jurisdictions.name_of(id));
            self.matcher
                .find_candidates(&supporter.match_query(jurisdiction_name))?
        } else {
            MatchResult::empty()
        };

        let decision = decide_outcome(roll_loaded, &match_result);
        let outcome = decision.outcome();
        let now = Utc::now();
        let subject = AuditSubject::Supporter(supporter.id);

        let update = match decision {
            Decision::Skip => None,
            Decision::Unregistered => Some(VettingUpdate {
                registered_voter: false,
                verification_status: VerificationStatus::Unverified,
                referred_from_jurisdiction_id: None,
                vetted_at: now,
            }),
            Decision::Referral { from } => Some(VettingUpdate {
                registered_voter: true,
                verification_status: VerificationStatus::Flagged,
                referred_from_jurisdiction_id: from,
                vetted_at: now,
            }),
            Decision::Verify => Some(VettingUpdate {
                registered_voter: true,
                verification_status: VerificationStatus::Verified,
                referred_from_jurisdiction_id: None,
                vetted_at: now,
            }),
            Decision::Review { reason } => {
                self.review.submit(ReviewItem {
                    subject,
                    reason,
                    tier: match_result.tier,
                    candidates: match_result.candidates.clone(),
                })?;
                Some(VettingUpdate::unchanged(supporter, now))
            }
        };

        if let Some(update) = update {
            self.repository.record_vetting(supporter.id, &update)?;
        }
        if outcome.settles() {
            self.review.withdraw(&subject)?;
        }

        debug!(
            supporter_id = supporter.id.0,
            outcome = outcome.label(),
            candidates = match_result.match_count(),
            "supporter vetted"
        );

        Ok(VettingReport {
            supporter_id: supporter.id,
            outcome,
            match_result,
        })
    }
}

