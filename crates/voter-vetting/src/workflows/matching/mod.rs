//! Tiered candidate search of the active roll for a partially known person.

pub mod similarity;
mod strategy;

use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ReconciliationConfig;
use crate::workflows::roll::{RollRecord, RollStore};
use crate::workflows::RepositoryError;

pub use strategy::MatchTier;

/// Identity fields a caller knows about the person being looked up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchQuery {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub birth_year: Option<i32>,
    #[serde(default)]
    pub jurisdiction_name: Option<String>,
}

impl MatchQuery {
    pub fn effective_birth_year(&self) -> Option<i32> {
        self.birth_year.or_else(|| self.dob.map(|dob| dob.year()))
    }

    fn jurisdiction(&self) -> Option<&str> {
        self.jurisdiction_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Exact,
    High,
    Medium,
    Low,
}

impl Confidence {
    pub const fn label(self) -> &'static str {
        match self {
            Confidence::Exact => "exact",
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    ExactDob,
    BirthYear,
    FuzzyName,
    NameOnly,
    DifferentJurisdiction,
}

/// One roll record proposed for a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    pub record: RollRecord,
    pub confidence: Confidence,
    pub match_type: MatchType,
    /// Size of the winning tier's candidate set, counted before any fuzzy cap.
    pub match_count: usize,
    /// Last-name trigram similarity, only for fuzzy matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// Tier that produced the candidates; `None` when nothing matched.
    pub tier: Option<MatchTier>,
    pub candidates: Vec<Candidate>,
}

impl MatchResult {
    pub fn empty() -> Self {
        Self {
            tier: None,
            candidates: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    /// Size of the winning tier's candidate set, which may exceed `candidates.len()`.
    pub fn match_count(&self) -> usize {
        self.best().map_or(0, |candidate| candidate.match_count)
    }
}

pub struct Matcher<S> {
    store: Arc<S>,
    config: ReconciliationConfig,
}

impl<S> Matcher<S>
where
    S: RollStore + 'static,
{
    pub fn new(store: Arc<S>, config: ReconciliationConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Runs the tiers in order and returns the first non-empty candidate set.
    ///
    /// An empty result is a normal outcome, not an error.
    pub fn find_candidates(&self, query: &MatchQuery) -> Result<MatchResult, RepositoryError> {
        for tier in MatchTier::ORDER {
            let Some(filter) = tier.filter(query, &self.config) else {
                continue;
            };

            let records = self.store.find_active(&filter)?;
            if records.is_empty() {
                continue;
            }

            let match_count = records.len();
            let confidence = tier.grade(match_count);
            let shown = tier.candidate_limit(&self.config).unwrap_or(match_count);
            debug!(
                tier = tier.number(),
                match_count,
                confidence = confidence.label(),
                "roll match found"
            );

            let candidates = records
                .into_iter()
                .take(shown)
                .map(|record| Candidate {
                    similarity: filter.last_name_similarity(&record),
                    record,
                    confidence,
                    match_type: tier.match_type(),
                    match_count,
                })
                .collect();

            return Ok(MatchResult {
                tier: Some(tier),
                candidates,
            });
        }

        Ok(MatchResult::empty())
    }
}
