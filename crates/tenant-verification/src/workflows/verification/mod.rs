//! Tenant verification wizard.
//!
//! A tenant claims a tenancy by walking three steps (property, agent/landlord, tenancy).
//! [`WizardController`] gates each step on its [`StepValidators`] entry, keeps the draft in a
//! [`DraftPersistence`] store so a reload can resume, and hands the finished draft to a
//! [`SubmissionGateway`].

pub mod controller;
pub mod domain;
pub mod gateway;
pub mod persistence;
pub mod router;
pub mod sessions;
pub mod validators;
pub mod wire;

#[cfg(test)]
mod tests;

pub use controller::{
    Navigation, SubmitOutcome, SubmitRejection, WizardController, WizardError, WizardPhase,
    WizardSnapshot,
};
pub use domain::{
    DraftUpdate, ProofError, ProofSummary, TenancyProof, VerificationDraft, VerificationMethod,
    WizardSessionId, MAX_PROOF_BYTES,
};
pub use gateway::{GatewayError, HttpSubmissionGateway, SubmissionGateway, SubmissionResult};
pub use persistence::{
    DraftPersistence, DraftStore, EphemeralDrafts, FileDraftStore, InMemoryDraftStore,
    PersistenceError,
};
pub use router::verification_router;
pub use sessions::WizardSessions;
pub use validators::{StepValidator, StepValidators, WizardStep};
