use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::controller::{SubmitOutcome, WizardController, WizardPhase};
use super::domain::WizardSessionId;
use super::gateway::SubmissionGateway;
use super::persistence::DraftPersistence;

/// Idle time after which a live wizard is detached when no timeout is configured.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

struct LiveSession<P, G> {
    controller: Arc<WizardController<P, G>>,
    last_touched: Instant,
}

/// Live wizards keyed by session id. Each controller owns its draft; only the collaborators
/// are shared.
///
/// Completed wizards leave the registry, and wizards idle for longer than the idle timeout are
/// detached the next time a session is opened. Detaching keeps the saved draft, so an evicted
/// session can still be resumed by id.
pub struct WizardSessions<P, G> {
    persistence: Arc<P>,
    gateway: Arc<G>,
    idle_timeout: Duration,
    active: Mutex<HashMap<WizardSessionId, LiveSession<P, G>>>,
}

impl<P, G> WizardSessions<P, G>
where
    P: DraftPersistence,
    G: SubmissionGateway,
{
    pub fn new(persistence: Arc<P>, gateway: Arc<G>) -> Self {
        Self {
            persistence,
            gateway,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            active: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Reattach to a live wizard, rehydrate a saved one, or start a new session.
    ///
    /// A live controller that is no longer active (completed or unmounted) is replaced by a
    /// fresh wizard under the same id.
    pub fn open(&self, resume: Option<WizardSessionId>) -> Arc<WizardController<P, G>> {
        let session_id = resume.unwrap_or_else(WizardSessionId::generate);
        let mut active = self.lock();
        self.release_stale(&mut active);

        if let Some(existing) = active.get_mut(&session_id) {
            if existing.controller.phase() == WizardPhase::Active {
                existing.last_touched = Instant::now();
                return existing.controller.clone();
            }
        }

        let controller = Arc::new(WizardController::initialize(
            session_id.clone(),
            self.persistence.clone(),
            self.gateway.clone(),
        ));
        active.insert(
            session_id.clone(),
            LiveSession {
                controller: controller.clone(),
                last_touched: Instant::now(),
            },
        );
        info!(session = %session_id, live = active.len(), "verification session opened");
        controller
    }

    pub fn get(&self, session_id: &WizardSessionId) -> Option<Arc<WizardController<P, G>>> {
        let mut active = self.lock();
        let live = active.get_mut(session_id)?;
        live.last_touched = Instant::now();
        Some(live.controller.clone())
    }

    /// Submit `controller`; once the claim is accepted the wizard leaves the registry.
    pub async fn submit(
        &self,
        controller: &Arc<WizardController<P, G>>,
    ) -> SubmitOutcome
    where
        P: 'static,
        G: 'static,
    {
        let outcome = controller.submit().await;
        if outcome == SubmitOutcome::Completed {
            let mut active = self.lock();
            let session_id = controller.session_id();
            let registered = active
                .get(session_id)
                .is_some_and(|live| Arc::ptr_eq(&live.controller, controller));
            if registered {
                active.remove(session_id);
                debug!(session = %session_id, live = active.len(), "completed session released");
            }
        }
        outcome
    }

    /// Drop the live controller but keep its saved draft for a later `open`.
    pub fn detach(&self, session_id: &WizardSessionId) -> bool {
        match self.lock().remove(session_id) {
            Some(live) => {
                live.controller.unmount();
                true
            }
            None => false,
        }
    }

    /// Drop the live controller and its saved draft. Returns whether a live session existed.
    pub fn abandon(&self, session_id: &WizardSessionId) -> bool {
        match self.lock().remove(session_id) {
            Some(live) => {
                live.controller.abandon();
                info!(session = %session_id, "verification session abandoned");
                true
            }
            None => {
                if let Err(err) = self.persistence.clear(session_id) {
                    warn!(session = %session_id, error = %err, "unable to clear saved draft");
                }
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forgets finished wizards and unmounts those idle past the timeout. Wizards with a
    /// submission in flight stay until the gateway answers.
    fn release_stale(&self, active: &mut HashMap<WizardSessionId, LiveSession<P, G>>) {
        let before = active.len();
        active.retain(|session_id, live| {
            if live.controller.is_submitting() {
                return true;
            }
            if live.controller.phase() != WizardPhase::Active {
                return false;
            }
            if live.last_touched.elapsed() < self.idle_timeout {
                return true;
            }
            debug!(session = %session_id, "detaching idle verification session");
            live.controller.unmount();
            false
        });
        let evicted = before - active.len();
        if evicted > 0 {
            info!(evicted, live = active.len(), "stale verification sessions released");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<WizardSessionId, LiveSession<P, G>>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
