use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{Supporter, SupporterId, VerificationStatus};
use crate::workflows::matching::{Candidate, MatchTier};
use crate::workflows::roll::{normalize_name, JurisdictionId};
use crate::workflows::{AuditSubject, RepositoryError};

/// Storage abstraction for supporter records.
///
/// Vetting and duplicate detection write through separate calls so neither overwrites the
/// other's fields.
pub trait SupporterRepository: Send + Sync {
    /// Stores a new record and returns it with its assigned id.
    fn insert(&self, supporter: Supporter) -> Result<Supporter, RepositoryError>;
    /// Persists identity fields (names, birth info, contacts, jurisdiction, normalized phone).
    fn save_identity(&self, supporter: &Supporter) -> Result<(), RepositoryError>;
    fn record_vetting(
        &self,
        id: SupporterId,
        update: &VettingUpdate,
    ) -> Result<(), RepositoryError>;
    fn record_duplicate_flags(
        &self,
        id: SupporterId,
        flags: &DuplicateFlags,
    ) -> Result<(), RepositoryError>;
    fn fetch(&self, id: SupporterId) -> Result<Option<Supporter>, RepositoryError>;
    /// Records matching `filter` with ids greater than `after`, in id order.
    fn find(
        &self,
        filter: &SupporterFilter,
        after: Option<SupporterId>,
        limit: usize,
    ) -> Result<Vec<Supporter>, RepositoryError>;
    /// Active records sharing `key`.
    fn find_by_key(&self, key: &DuplicateKey) -> Result<Vec<Supporter>, RepositoryError>;
}

/// Registration fields written by the vetting engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VettingUpdate {
    pub registered_voter: bool,
    pub verification_status: VerificationStatus,
    pub referred_from_jurisdiction_id: Option<JurisdictionId>,
    pub vetted_at: DateTime<Utc>,
}

impl VettingUpdate {
    /// Current registration fields, restamped.
    pub fn unchanged(supporter: &Supporter, at: DateTime<Utc>) -> Self {
        Self {
            registered_voter: supporter.registered_voter,
            verification_status: supporter.verification_status,
            referred_from_jurisdiction_id: supporter.referred_from_jurisdiction_id,
            vetted_at: at,
        }
    }

    pub fn apply_to(&self, supporter: &mut Supporter) {
        supporter.registered_voter = self.registered_voter;
        supporter.verification_status = self.verification_status;
        supporter.referred_from_jurisdiction_id = self.referred_from_jurisdiction_id;
        supporter.vetted_at = Some(self.vetted_at);
    }
}

/// Duplicate fields written by the duplicate detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateFlags {
    pub potential_duplicate: bool,
    pub duplicate_of_id: Option<SupporterId>,
    pub checked_at: DateTime<Utc>,
}

impl DuplicateFlags {
    pub fn apply_to(&self, supporter: &mut Supporter) {
        supporter.potential_duplicate = self.potential_duplicate;
        supporter.duplicate_of_id = self.duplicate_of_id;
        supporter.duplicate_checked_at = Some(self.checked_at);
    }
}

/// Selects supporters for bulk operations. The default selects every active record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupporterFilter {
    #[serde(default)]
    pub verification_status: Option<VerificationStatus>,
    #[serde(default)]
    pub jurisdiction_id: Option<JurisdictionId>,
    #[serde(default)]
    pub include_removed: bool,
}

impl SupporterFilter {
    pub fn unverified() -> Self {
        Self {
            verification_status: Some(VerificationStatus::Unverified),
            ..Self::default()
        }
    }

    pub fn matches(&self, supporter: &Supporter) -> bool {
        (self.include_removed || supporter.is_active())
            && self
                .verification_status
                .map_or(true, |status| supporter.verification_status == status)
            && self
                .jurisdiction_id
                .map_or(true, |id| supporter.jurisdiction_id == Some(id))
    }
}

/// One identity signal two supporters can share. Values are stored normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DuplicateKey {
    Phone(String),
    Email(String),
    NameInJurisdiction {
        first_name: String,
        last_name: String,
        jurisdiction_id: JurisdictionId,
    },
}

impl DuplicateKey {
    /// Every key the record carries; empty when it has no comparable identity data.
    pub fn for_supporter(supporter: &Supporter) -> Vec<DuplicateKey> {
        let mut keys = Vec::new();

        if let Some(phone) = supporter.normalized_phone.as_deref() {
            if !phone.is_empty() {
                keys.push(DuplicateKey::Phone(phone.to_string()));
            }
        }

        if let Some(email) = supporter.email.as_deref() {
            let email = email.trim().to_lowercase();
            if !email.is_empty() {
                keys.push(DuplicateKey::Email(email));
            }
        }

        let first_name = normalize_name(&supporter.first_name);
        let last_name = normalize_name(&supporter.last_name);
        if let Some(jurisdiction_id) = supporter.jurisdiction_id {
            if !first_name.is_empty() && !last_name.is_empty() {
                keys.push(DuplicateKey::NameInJurisdiction {
                    first_name,
                    last_name,
                    jurisdiction_id,
                });
            }
        }

        keys
    }

    pub fn matches(&self, supporter: &Supporter) -> bool {
        DuplicateKey::for_supporter(supporter).contains(self)
    }
}

/// Outbound hook for matches that need a human decision.
pub trait ReviewQueue: Send + Sync {
    /// Queues `item`, replacing any item already pending for the same subject.
    fn submit(&self, item: ReviewItem) -> Result<(), ReviewError>;

    /// Drops the pending item for `subject` once a later pass settles it.
    fn withdraw(&self, _subject: &AuditSubject) -> Result<(), ReviewError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewItem {
    pub subject: AuditSubject,
    pub reason: String,
    pub tier: Option<MatchTier>,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("review queue unavailable: {0}")]
    Transport(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::domain::SupporterSubmission;

    fn supporter(phone: Option<&str>, email: Option<&str>, jurisdiction: Option<u32>) -> Supporter {
        Supporter::from_submission(
            SupporterSubmission {
                first_name: "Ana".to_string(),
                last_name: "Santos".to_string(),
                email: email.map(str::to_string),
                jurisdiction_id: jurisdiction.map(JurisdictionId),
                ..SupporterSubmission::default()
            },
            phone.map(str::to_string),
            Utc::now(),
        )
    }

    #[test]
    fn keys_cover_phone_email_and_name_in_jurisdiction() {
        let keys = DuplicateKey::for_supporter(&supporter(
            Some("6715550100"),
            Some("Ana@Example.com"),
            Some(3),
        ));
        assert_eq!(
            keys,
            vec![
                DuplicateKey::Phone("6715550100".to_string()),
                DuplicateKey::Email("ana@example.com".to_string()),
                DuplicateKey::NameInJurisdiction {
                    first_name: "ana".to_string(),
                    last_name: "santos".to_string(),
                    jurisdiction_id: JurisdictionId(3),
                },
            ]
        );
    }

    #[test]
    fn name_without_jurisdiction_is_not_a_key() {
        assert!(DuplicateKey::for_supporter(&supporter(None, None, None)).is_empty());
    }

    #[test]
    fn default_filter_excludes_removed_records() {
        let mut removed = supporter(None, None, None);
        removed.removed_at = Some(Utc::now());
        assert!(!SupporterFilter::default().matches(&removed));
        assert!(SupporterFilter {
            include_removed: true,
            ..SupporterFilter::default()
        }
        .matches(&removed));
    }
}
