//! Reconciliation engine for an external voter roll and internally collected supporter records.
//!
//! `workflows::roll` imports and diffs roll snapshots, `workflows::matching` searches the roll for
//! candidates, and `workflows::supporters` turns match results into registration status and flags
//! duplicate supporter records.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
