use serde::{Deserialize, Serialize};

use super::{Confidence, MatchQuery, MatchType};
use crate::config::ReconciliationConfig;
use crate::workflows::roll::RollFilter;

/// Search strategies in the order they are attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    DobSameJurisdiction,
    DobOtherJurisdiction,
    BirthYearSameJurisdiction,
    BirthYearOtherJurisdiction,
    BirthYearAnyJurisdiction,
    FuzzyNameBirthYear,
    NameAndJurisdiction,
}

impl MatchTier {
    pub const ORDER: [MatchTier; 7] = [
        MatchTier::DobSameJurisdiction,
        MatchTier::DobOtherJurisdiction,
        MatchTier::BirthYearSameJurisdiction,
        MatchTier::BirthYearOtherJurisdiction,
        MatchTier::BirthYearAnyJurisdiction,
        MatchTier::FuzzyNameBirthYear,
        MatchTier::NameAndJurisdiction,
    ];

    /// 1-based position in the search order.
    pub const fn number(self) -> u8 {
        match self {
            MatchTier::DobSameJurisdiction => 1,
            MatchTier::DobOtherJurisdiction => 2,
            MatchTier::BirthYearSameJurisdiction => 3,
            MatchTier::BirthYearOtherJurisdiction => 4,
            MatchTier::BirthYearAnyJurisdiction => 5,
            MatchTier::FuzzyNameBirthYear => 6,
            MatchTier::NameAndJurisdiction => 7,
        }
    }

    pub const fn match_type(self) -> MatchType {
        match self {
            MatchTier::DobSameJurisdiction => MatchType::ExactDob,
            MatchTier::DobOtherJurisdiction | MatchTier::BirthYearOtherJurisdiction => {
                MatchType::DifferentJurisdiction
            }
            MatchTier::BirthYearSameJurisdiction | MatchTier::BirthYearAnyJurisdiction => {
                MatchType::BirthYear
            }
            MatchTier::FuzzyNameBirthYear => MatchType::FuzzyName,
            MatchTier::NameAndJurisdiction => MatchType::NameOnly,
        }
    }

    /// Confidence for a tier that produced `count` candidates.
    pub const fn grade(self, count: usize) -> Confidence {
        match self {
            MatchTier::DobSameJurisdiction => Confidence::Exact,
            MatchTier::DobOtherJurisdiction | MatchTier::BirthYearOtherJurisdiction => {
                Confidence::High
            }
            MatchTier::BirthYearSameJurisdiction => match count {
                0 | 1 => Confidence::Exact,
                2..=3 => Confidence::High,
                _ => Confidence::Medium,
            },
            MatchTier::BirthYearAnyJurisdiction | MatchTier::FuzzyNameBirthYear => {
                Confidence::Medium
            }
            MatchTier::NameAndJurisdiction => Confidence::Low,
        }
    }

    /// Most candidates the tier reports; the full set is still counted for grading.
    pub(crate) fn candidate_limit(self, config: &ReconciliationConfig) -> Option<usize> {
        match self {
            MatchTier::FuzzyNameBirthYear => Some(config.fuzzy_limit),
            _ => None,
        }
    }

    /// Builds the roll query for this tier, or `None` when the inputs it needs are missing.
    pub(crate) fn filter(
        self,
        query: &MatchQuery,
        config: &ReconciliationConfig,
    ) -> Option<RollFilter> {
        let exact = || RollFilter::exact_name(&query.first_name, &query.last_name);
        let jurisdiction = query.jurisdiction();
        let birth_year = query.effective_birth_year();

        match self {
            MatchTier::DobSameJurisdiction => {
                Some(exact().with_dob(query.dob?).within(jurisdiction?))
            }
            MatchTier::DobOtherJurisdiction => {
                Some(exact().with_dob(query.dob?).outside(jurisdiction?))
            }
            MatchTier::BirthYearSameJurisdiction => {
                Some(exact().with_birth_year(birth_year?).within(jurisdiction?))
            }
            MatchTier::BirthYearOtherJurisdiction => {
                Some(exact().with_birth_year(birth_year?).outside(jurisdiction?))
            }
            MatchTier::BirthYearAnyJurisdiction => Some(exact().with_birth_year(birth_year?)),
            MatchTier::FuzzyNameBirthYear => Some(
                RollFilter::similar_name(
                    &query.first_name,
                    &query.last_name,
                    config.fuzzy_threshold,
                )
                .with_birth_year(birth_year?),
            ),
            MatchTier::NameAndJurisdiction => {
                if birth_year.is_some() {
                    return None;
                }
                Some(exact().within(jurisdiction?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query() -> MatchQuery {
        MatchQuery {
            first_name: "Juan".to_string(),
            last_name: "Cruz".to_string(),
            dob: None,
            birth_year: Some(1985),
            jurisdiction_name: None,
        }
    }

    #[test]
    fn birth_year_same_jurisdiction_grades_by_count() {
        let tier = MatchTier::BirthYearSameJurisdiction;
        assert_eq!(tier.grade(1), Confidence::Exact);
        assert_eq!(tier.grade(2), Confidence::High);
        assert_eq!(tier.grade(3), Confidence::High);
        assert_eq!(tier.grade(4), Confidence::Medium);
        assert_eq!(tier.grade(12), Confidence::Medium);
    }

    #[test]
    fn tiers_without_their_inputs_are_skipped() {
        let config = ReconciliationConfig::default();
        let query = query();
        let runnable: Vec<u8> = MatchTier::ORDER
            .into_iter()
            .filter(|tier| tier.filter(&query, &config).is_some())
            .map(MatchTier::number)
            .collect();
        assert_eq!(runnable, vec![5, 6]);
    }

    #[test]
    fn name_and_jurisdiction_runs_only_without_birth_info() {
        let config = ReconciliationConfig::default();
        let mut query = query();
        query.jurisdiction_name = Some("Barrigada".to_string());
        assert!(MatchTier::NameAndJurisdiction.filter(&query, &config).is_none());

        query.birth_year = None;
        let runnable: Vec<u8> = MatchTier::ORDER
            .into_iter()
            .filter(|tier| tier.filter(&query, &config).is_some())
            .map(MatchTier::number)
            .collect();
        assert_eq!(runnable, vec![7]);
    }
}
