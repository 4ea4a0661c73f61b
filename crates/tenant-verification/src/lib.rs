//! Tenant verification wizard: step gating, resumable drafts, and claim submission.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
