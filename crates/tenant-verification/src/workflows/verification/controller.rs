use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{DraftUpdate, ProofSummary, VerificationDraft, WizardSessionId};
use super::gateway::{SubmissionGateway, SubmissionResult};
use super::persistence::DraftPersistence;
use super::validators::{StepValidators, WizardStep};

/// Drives one tenant through the verification steps and owns the draft for that session.
///
/// All methods take `&self`; state sits behind a lock that is released before the gateway is
/// awaited, so a controller can be shared (`Arc`) between request handlers.
pub struct WizardController<P, G> {
    session_id: WizardSessionId,
    validators: StepValidators,
    persistence: Arc<P>,
    gateway: Arc<G>,
    state: Arc<Mutex<WizardState>>,
}

const SUBMISSION_INTERRUPTED: &str = "The submission was interrupted. Please try again.";

#[derive(Debug)]
struct WizardState {
    step: WizardStep,
    draft: VerificationDraft,
    phase: WizardPhase,
    is_submitting: bool,
    notice: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardPhase {
    Active,
    Complete,
    Unmounted,
}

/// Result of a `next`/`back` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Moved { from: WizardStep, to: WizardStep },
    Stayed(WizardStep),
    /// `back` from the first step: the caller should leave the wizard.
    Abandon,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Completed,
    Failed { error: String },
    Rejected(SubmitRejection),
    /// The wizard was unmounted while the gateway was working; its answer was dropped.
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SubmitRejection {
    #[error("a submission is already in progress")]
    InFlight,
    #[error("submission is only available from the {} step", WizardStep::TERMINAL)]
    NotAtTerminalStep,
    #[error("the {0} step is incomplete")]
    Incomplete(WizardStep),
    #[error("the wizard is no longer active")]
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WizardError {
    #[error("the draft is locked while a submission is in progress")]
    SubmissionInFlight,
    #[error("the wizard is no longer active")]
    Closed,
}

/// Read-only view of a wizard, suitable for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WizardSnapshot {
    pub session_id: WizardSessionId,
    pub current_step: u8,
    pub total_steps: u8,
    pub step: WizardStep,
    pub phase: WizardPhase,
    pub can_advance: bool,
    pub is_submitting: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
    pub draft: VerificationDraft,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenancy_proof: Option<ProofSummary>,
}

impl<P, G> WizardController<P, G>
where
    P: DraftPersistence,
    G: SubmissionGateway,
{
    /// Start at the first step, rehydrating any draft saved under `session_id`.
    pub fn initialize(session_id: WizardSessionId, persistence: Arc<P>, gateway: Arc<G>) -> Self {
        Self::with_validators(session_id, persistence, gateway, StepValidators::standard())
    }

    pub fn with_validators(
        session_id: WizardSessionId,
        persistence: Arc<P>,
        gateway: Arc<G>,
        validators: StepValidators,
    ) -> Self {
        let draft = match persistence.load(&session_id) {
            Ok(Some(draft)) => {
                info!(session = %session_id, "resuming saved verification draft");
                draft
            }
            Ok(None) => VerificationDraft::default(),
            Err(err) => {
                warn!(session = %session_id, error = %err, "saved draft unavailable; starting fresh");
                VerificationDraft::default()
            }
        };

        Self {
            session_id,
            validators,
            persistence,
            gateway,
            state: Arc::new(Mutex::new(WizardState {
                step: WizardStep::FIRST,
                draft,
                phase: WizardPhase::Active,
                is_submitting: false,
                notice: None,
            })),
        }
    }

    pub fn session_id(&self) -> &WizardSessionId {
        &self.session_id
    }

    pub fn current_step(&self) -> WizardStep {
        self.lock().step
    }

    pub fn draft(&self) -> VerificationDraft {
        self.lock().draft.clone()
    }

    pub fn phase(&self) -> WizardPhase {
        self.lock().phase
    }

    pub fn is_submitting(&self) -> bool {
        self.lock().is_submitting
    }

    pub fn notice(&self) -> Option<String> {
        self.lock().notice.clone()
    }

    /// Whether the current step's validator passes; drives the "Next"/"Submit" button.
    pub fn can_advance(&self) -> bool {
        let state = self.lock();
        state.phase == WizardPhase::Active
            && !state.is_submitting
            && self.validators.allows(state.step, &state.draft)
    }

    pub fn snapshot(&self) -> WizardSnapshot {
        let state = self.lock();
        WizardSnapshot {
            session_id: self.session_id.clone(),
            current_step: state.step.number(),
            total_steps: WizardStep::COUNT,
            step: state.step,
            phase: state.phase,
            can_advance: state.phase == WizardPhase::Active
                && !state.is_submitting
                && self.validators.allows(state.step, &state.draft),
            is_submitting: state.is_submitting,
            notice: state.notice.clone(),
            draft: state.draft.clone(),
            tenancy_proof: state.draft.tenancy_proof.as_ref().map(|proof| proof.summary()),
        }
    }

    /// Shallow-merge `update` into the draft and persist the result.
    pub fn update_form_data(&self, update: DraftUpdate) -> Result<(), WizardError> {
        let mut state = self.lock();
        Self::ensure_editable(&state)?;
        state.draft.apply(update);
        self.persist(&state.draft);
        Ok(())
    }

    pub fn next(&self) -> Navigation {
        let mut state = self.lock();
        let from = state.step;
        if state.phase != WizardPhase::Active || state.is_submitting {
            return Navigation::Stayed(from);
        }
        if !self.validators.allows(from, &state.draft) {
            debug!(session = %self.session_id, step = %from, "next blocked by validator");
            return Navigation::Stayed(from);
        }
        match from.next() {
            Some(to) => {
                state.step = to;
                Navigation::Moved { from, to }
            }
            None => Navigation::Stayed(from),
        }
    }

    pub fn back(&self) -> Navigation {
        let mut state = self.lock();
        let from = state.step;
        if state.phase != WizardPhase::Active || state.is_submitting {
            return Navigation::Stayed(from);
        }
        match from.previous() {
            Some(to) => {
                state.step = to;
                Navigation::Moved { from, to }
            }
            None => Navigation::Abandon,
        }
    }

    pub fn dismiss_notice(&self) {
        self.lock().notice = None;
    }

    /// Send the draft to the gateway. At most one submission is in flight per wizard.
    ///
    /// The gateway call runs on its own task: dropping the returned future stops waiting for the
    /// answer but not the submission, and the wizard stays locked until the gateway replies.
    pub async fn submit(&self) -> SubmitOutcome
    where
        P: 'static,
        G: 'static,
    {
        let draft = {
            let mut state = self.lock();
            if let Err(rejection) = self.check_submittable(&state) {
                debug!(session = %self.session_id, %rejection, "submit refused");
                return SubmitOutcome::Rejected(rejection);
            }
            state.is_submitting = true;
            state.notice = None;
            state.draft.clone()
        };

        info!(session = %self.session_id, "submitting verification claim");
        let submission = tokio::spawn(settle_submission(
            self.session_id.clone(),
            draft,
            self.state.clone(),
            self.persistence.clone(),
            self.gateway.clone(),
        ));

        match submission.await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(session = %self.session_id, error = %err, "submission task ended without an answer");
                let mut state = self.lock();
                if state.phase != WizardPhase::Active {
                    return SubmitOutcome::Detached;
                }
                state.notice = Some(SUBMISSION_INTERRUPTED.to_string());
                SubmitOutcome::Failed {
                    error: SUBMISSION_INTERRUPTED.to_string(),
                }
            }
        }
    }

    /// Detach from the client. The saved draft is kept so the session can be resumed.
    pub fn unmount(&self) {
        let mut state = self.lock();
        if state.phase == WizardPhase::Active {
            state.phase = WizardPhase::Unmounted;
        }
    }

    /// Leave the wizard for good, discarding the saved draft.
    pub fn abandon(&self) {
        {
            let mut state = self.lock();
            state.phase = WizardPhase::Unmounted;
            state.draft = VerificationDraft::default();
        }
        if let Err(err) = self.persistence.clear(&self.session_id) {
            warn!(session = %self.session_id, error = %err, "unable to clear abandoned draft");
        }
    }

    fn check_submittable(&self, state: &WizardState) -> Result<(), SubmitRejection> {
        if state.phase != WizardPhase::Active {
            return Err(SubmitRejection::Closed);
        }
        if state.is_submitting {
            return Err(SubmitRejection::InFlight);
        }
        if !state.step.is_terminal() {
            return Err(SubmitRejection::NotAtTerminalStep);
        }
        if !self.validators.allows(state.step, &state.draft) {
            return Err(SubmitRejection::Incomplete(state.step));
        }
        Ok(())
    }

    fn ensure_editable(state: &WizardState) -> Result<(), WizardError> {
        if state.phase != WizardPhase::Active {
            return Err(WizardError::Closed);
        }
        if state.is_submitting {
            return Err(WizardError::SubmissionInFlight);
        }
        Ok(())
    }

    fn persist(&self, draft: &VerificationDraft) {
        if let Err(err) = self.persistence.save(&self.session_id, draft) {
            warn!(session = %self.session_id, error = %err, "draft not saved");
        }
    }
}

impl<P, G> WizardController<P, G> {
    fn lock(&self) -> MutexGuard<'_, WizardState> {
        lock_state(&self.state)
    }
}

fn lock_state(state: &Mutex<WizardState>) -> MutexGuard<'_, WizardState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Awaits the gateway and folds its answer into the wizard state.
async fn settle_submission<P, G>(
    session_id: WizardSessionId,
    draft: VerificationDraft,
    state: Arc<Mutex<WizardState>>,
    persistence: Arc<P>,
    gateway: Arc<G>,
) -> SubmitOutcome
where
    P: DraftPersistence,
    G: SubmissionGateway,
{
    let mut in_flight = InFlight {
        state: state.clone(),
        armed: true,
    };
    let result = gateway.submit(&draft).await;
    in_flight.armed = false;

    let mut state = lock_state(&state);
    state.is_submitting = false;
    if state.phase == WizardPhase::Unmounted {
        debug!(session = %session_id, "wizard unmounted; ignoring gateway result");
        // Accepted claims never stay resumable.
        if result.is_accepted() {
            if let Err(err) = persistence.clear(&session_id) {
                warn!(session = %session_id, error = %err, "unable to clear submitted draft");
            }
        }
        return SubmitOutcome::Detached;
    }

    match result {
        SubmissionResult::Accepted => {
            state.phase = WizardPhase::Complete;
            state.draft = VerificationDraft::default();
            if let Err(err) = persistence.clear(&session_id) {
                warn!(session = %session_id, error = %err, "unable to clear submitted draft");
            }
            info!(session = %session_id, "verification submitted");
            SubmitOutcome::Completed
        }
        SubmissionResult::Rejected { error } => {
            warn!(session = %session_id, %error, "verification submission failed");
            state.notice = Some(error.clone());
            SubmitOutcome::Failed { error }
        }
    }
}

/// Clears `is_submitting` if the submission task is torn down before the gateway answers.
struct InFlight {
    state: Arc<Mutex<WizardState>>,
    armed: bool,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.armed {
            lock_state(&self.state).is_submitting = false;
        }
    }
}
