//! Internal supporter records: lifecycle, vetting against the roll, and duplicate detection.

pub mod domain;
mod duplicates;
mod memory;
mod phone;
pub mod repository;
pub mod router;
pub mod service;
mod vetting;

#[cfg(test)]
mod tests;

pub use domain::{Supporter, SupporterId, SupporterSubmission, VerificationStatus};
pub use duplicates::{DuplicateDetector, ScanSummary};
pub use memory::{InMemoryReviewQueue, InMemorySupporterRepository};
pub use phone::PhoneNormalizer;
pub use repository::{
    DuplicateFlags, DuplicateKey, ReviewError, ReviewItem, ReviewQueue, SupporterFilter,
    SupporterRepository, VettingUpdate,
};
pub use router::{supporter_router, SupporterApi};
pub use service::{
    PostImportRevet, RevetSummary, SupporterReport, SupporterService, SupporterServiceError,
};
pub use vetting::{VettingEngine, VettingOutcome, VettingReport};
