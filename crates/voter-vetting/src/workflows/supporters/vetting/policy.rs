use serde::{Deserialize, Serialize};

use crate::workflows::matching::{Confidence, MatchResult, MatchType};
use crate::workflows::roll::JurisdictionId;

/// Result of vetting one supporter against the roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VettingOutcome {
    AutoVerified,
    Referral,
    Unregistered,
    Skipped,
    NeedsReview,
}

impl VettingOutcome {
    pub const fn label(self) -> &'static str {
        match self {
            VettingOutcome::AutoVerified => "auto_verified",
            VettingOutcome::Referral => "referral",
            VettingOutcome::Unregistered => "unregistered",
            VettingOutcome::Skipped => "skipped",
            VettingOutcome::NeedsReview => "needs_review",
        }
    }

    /// True when the outcome leaves nothing for a reviewer to decide.
    pub const fn settles(self) -> bool {
        !matches!(self, VettingOutcome::Skipped | VettingOutcome::NeedsReview)
    }
}

/// What the engine should write for a decided outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Decision {
    Skip,
    Unregistered,
    Referral { from: Option<JurisdictionId> },
    Verify,
    Review { reason: String },
}

impl Decision {
    pub(crate) fn outcome(&self) -> VettingOutcome {
        match self {
            Decision::Skip => VettingOutcome::Skipped,
            Decision::Unregistered => VettingOutcome::Unregistered,
            Decision::Referral { .. } => VettingOutcome::Referral,
            Decision::Verify => VettingOutcome::AutoVerified,
            Decision::Review { .. } => VettingOutcome::NeedsReview,
        }
    }
}

pub(crate) fn decide_outcome(roll_loaded: bool, result: &MatchResult) -> Decision {
    if !roll_loaded {
        return Decision::Skip;
    }

    let Some(best) = result.best() else {
        return Decision::Unregistered;
    };

    if best.match_type == MatchType::DifferentJurisdiction {
        return Decision::Referral {
            from: best.record.jurisdiction_id,
        };
    }

    if best.confidence == Confidence::Exact {
        if best.match_count == 1 {
            return Decision::Verify;
        }
        return Decision::Review {
            reason: format!("{} exact roll matches", best.match_count),
        };
    }

    Decision::Review {
        reason: format!(
            "{} confidence match across {} candidate(s)",
            best.confidence.label(),
            best.match_count
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::matching::{Candidate, MatchTier};
    use crate::workflows::roll::{BatchId, RollRecord, RollRecordId, RollStatus};
    use chrono::NaiveDate;

    fn record(id: u64, jurisdiction: u32) -> RollRecord {
        RollRecord {
            id: RollRecordId(id),
            first_name: "Juan".to_string(),
            last_name: "Cruz".to_string(),
            dob: NaiveDate::from_ymd_opt(1985, 3, 15),
            birth_year: Some(1985),
            jurisdiction_name: "Barrigada".to_string(),
            jurisdiction_id: Some(JurisdictionId(jurisdiction)),
            registration_number: None,
            status: RollStatus::Active,
            ambiguous_dob: false,
            list_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"),
            previous_jurisdiction_name: None,
            removed_at: None,
            batch_id: BatchId(1),
            removed_in_batch: None,
        }
    }

    fn result(tier: MatchTier, records: Vec<RollRecord>) -> MatchResult {
        let match_count = records.len();
        MatchResult {
            tier: Some(tier),
            candidates: records
                .into_iter()
                .map(|record| Candidate {
                    record,
                    confidence: tier.grade(match_count),
                    match_type: tier.match_type(),
                    match_count,
                    similarity: None,
                })
                .collect(),
        }
    }

    #[test]
    fn empty_roll_always_skips() {
        let exact = result(MatchTier::DobSameJurisdiction, vec![record(1, 1)]);
        assert_eq!(decide_outcome(false, &exact), Decision::Skip);
        assert_eq!(decide_outcome(false, &MatchResult::empty()), Decision::Skip);
    }

    #[test]
    fn no_candidates_is_unregistered() {
        assert_eq!(
            decide_outcome(true, &MatchResult::empty()),
            Decision::Unregistered
        );
    }

    #[test]
    fn single_exact_candidate_verifies() {
        let exact = result(MatchTier::DobSameJurisdiction, vec![record(1, 1)]);
        assert_eq!(decide_outcome(true, &exact), Decision::Verify);
    }

    #[test]
    fn several_exact_candidates_need_review() {
        let exact = result(
            MatchTier::DobSameJurisdiction,
            vec![record(1, 1), record(2, 1)],
        );
        let decision = decide_outcome(true, &exact);
        assert_eq!(decision.outcome(), VettingOutcome::NeedsReview);
    }

    #[test]
    fn other_jurisdiction_refers_from_the_best_candidate() {
        let elsewhere = result(MatchTier::DobOtherJurisdiction, vec![record(7, 4)]);
        assert_eq!(
            decide_outcome(true, &elsewhere),
            Decision::Referral {
                from: Some(JurisdictionId(4))
            }
        );
    }
}
