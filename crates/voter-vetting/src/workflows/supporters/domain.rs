use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::workflows::matching::MatchQuery;
use crate::workflows::roll::{normalize_name, JurisdictionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupporterId(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Unverified,
    Verified,
    Flagged,
    Rejected,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationStatus::Unverified => "unverified",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Flagged => "flagged",
            VerificationStatus::Rejected => "rejected",
        }
    }
}

/// Identity fields supplied when a supporter is created or edited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupporterSubmission {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub dob: Option<NaiveDate>,
    #[serde(default)]
    pub birth_year: Option<i32>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub jurisdiction_id: Option<JurisdictionId>,
}

/// Internally collected supporter record.
///
/// Field ownership is split: identity fields belong to the record-lifecycle caller, the
/// registration fields to the vetting engine, and the duplicate fields to the detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supporter {
    pub id: SupporterId,
    pub first_name: String,
    pub last_name: String,
    pub dob: Option<NaiveDate>,
    pub birth_year: Option<i32>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub jurisdiction_id: Option<JurisdictionId>,

    pub registered_voter: bool,
    pub verification_status: VerificationStatus,
    pub referred_from_jurisdiction_id: Option<JurisdictionId>,
    pub vetted_at: Option<DateTime<Utc>>,

    pub normalized_phone: Option<String>,
    pub potential_duplicate: bool,
    pub duplicate_of_id: Option<SupporterId>,
    pub duplicate_checked_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub removed_at: Option<DateTime<Utc>>,
}

impl Supporter {
    /// Builds an unsaved record; the repository assigns the id on insert.
    pub fn from_submission(
        submission: SupporterSubmission,
        normalized_phone: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut supporter = Self {
            id: SupporterId(0),
            first_name: String::new(),
            last_name: String::new(),
            dob: None,
            birth_year: None,
            phone: None,
            email: None,
            jurisdiction_id: None,
            registered_voter: false,
            verification_status: VerificationStatus::Unverified,
            referred_from_jurisdiction_id: None,
            vetted_at: None,
            normalized_phone: None,
            potential_duplicate: false,
            duplicate_of_id: None,
            duplicate_checked_at: None,
            created_at: now,
            updated_at: now,
            removed_at: None,
        };
        supporter.apply_identity(submission, normalized_phone, now);
        supporter
    }

    pub fn is_active(&self) -> bool {
        self.removed_at.is_none()
    }

    pub fn effective_birth_year(&self) -> Option<i32> {
        self.birth_year.or_else(|| self.dob.map(|dob| dob.year()))
    }

    /// True when the submission changes a field the matcher looks at.
    pub fn identity_changed(&self, submission: &SupporterSubmission) -> bool {
        normalize_name(&self.first_name) != normalize_name(&submission.first_name)
            || normalize_name(&self.last_name) != normalize_name(&submission.last_name)
            || self.dob != submission.dob
            || self.birth_year != submission.birth_year
            || self.jurisdiction_id != submission.jurisdiction_id
    }

    pub fn apply_identity(
        &mut self,
        submission: SupporterSubmission,
        normalized_phone: Option<String>,
        now: DateTime<Utc>,
    ) {
        self.first_name = submission.first_name.trim().to_string();
        self.last_name = submission.last_name.trim().to_string();
        self.dob = submission.dob;
        self.birth_year = submission.birth_year;
        self.phone = submission.phone.filter(|phone| !phone.trim().is_empty());
        self.email = submission
            .email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty());
        self.jurisdiction_id = submission.jurisdiction_id;
        self.normalized_phone = normalized_phone;
        self.updated_at = now;
    }

    pub fn match_query(&self, jurisdiction_name: Option<String>) -> MatchQuery {
        MatchQuery {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            dob: self.dob,
            birth_year: self.effective_birth_year(),
            jurisdiction_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission() -> SupporterSubmission {
        SupporterSubmission {
            first_name: " Juan ".to_string(),
            last_name: "Cruz".to_string(),
            dob: NaiveDate::from_ymd_opt(1985, 3, 15),
            birth_year: None,
            phone: Some("  ".to_string()),
            email: Some(" Juan@Example.com ".to_string()),
            jurisdiction_id: Some(JurisdictionId(1)),
        }
    }

    #[test]
    fn submission_is_trimmed_and_blank_contacts_dropped() {
        let supporter = Supporter::from_submission(submission(), None, Utc::now());
        assert_eq!(supporter.first_name, "Juan");
        assert_eq!(supporter.phone, None);
        assert_eq!(supporter.email.as_deref(), Some("Juan@Example.com"));
        assert_eq!(supporter.verification_status, VerificationStatus::Unverified);
        assert_eq!(supporter.effective_birth_year(), Some(1985));
    }

    #[test]
    fn only_matcher_inputs_count_as_identity_changes() {
        let supporter = Supporter::from_submission(submission(), None, Utc::now());

        let mut phone_only = submission();
        phone_only.phone = Some("671-555-0100".to_string());
        phone_only.first_name = "JUAN".to_string();
        assert!(!supporter.identity_changed(&phone_only));

        let mut moved = submission();
        moved.jurisdiction_id = Some(JurisdictionId(2));
        assert!(supporter.identity_changed(&moved));
    }
}
