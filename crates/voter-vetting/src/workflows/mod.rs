pub mod matching;
pub mod roll;
pub mod supporters;

mod audit;
mod control;
mod repository;

pub use audit::AuditSubject;
pub use control::StopSignal;
pub use repository::RepositoryError;
