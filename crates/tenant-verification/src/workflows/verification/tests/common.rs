use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::Notify;

use crate::workflows::verification::domain::{DraftUpdate, VerificationDraft, WizardSessionId};
use crate::workflows::verification::gateway::{SubmissionGateway, SubmissionResult};
use crate::workflows::verification::persistence::{
    DraftPersistence, InMemoryDraftStore, PersistenceError,
};
use crate::workflows::verification::{verification_router, WizardController, WizardSessions};

pub(super) fn move_in() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date")
}

pub(super) fn session(name: &str) -> WizardSessionId {
    WizardSessionId::unchecked(format!("session-{name}"))
}

pub(super) fn property_step() -> DraftUpdate {
    DraftUpdate::default()
        .tenant_full_name("Jane Doe")
        .property_address("1 Main St")
        .tenant_email("jane@example.com")
}

pub(super) fn landlord_step() -> DraftUpdate {
    DraftUpdate::default()
        .agent_landlord_name("Acme Lettings")
        .agent_landlord_phone("020 7946 0000")
}

pub(super) fn tenancy_step() -> DraftUpdate {
    DraftUpdate::default().move_in_date(move_in())
}

/// Gateway answering from a script; once the script runs out it accepts.
#[derive(Default)]
pub(super) struct ScriptedGateway {
    script: Mutex<VecDeque<SubmissionResult>>,
    received: Mutex<Vec<VerificationDraft>>,
}

impl ScriptedGateway {
    pub(super) fn answering(results: Vec<SubmissionResult>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            received: Mutex::new(Vec::new()),
        }
    }

    pub(super) fn received(&self) -> Vec<VerificationDraft> {
        self.received.lock().expect("gateway mutex poisoned").clone()
    }
}

#[async_trait]
impl SubmissionGateway for ScriptedGateway {
    async fn submit(&self, draft: &VerificationDraft) -> SubmissionResult {
        self.received
            .lock()
            .expect("gateway mutex poisoned")
            .push(draft.clone());
        self.script
            .lock()
            .expect("gateway mutex poisoned")
            .pop_front()
            .unwrap_or(SubmissionResult::Accepted)
    }
}

/// Gateway that parks every call until the test releases it.
pub(super) struct GatedGateway {
    calls: AtomicUsize,
    entered: Notify,
    release: Notify,
    result: SubmissionResult,
}

impl GatedGateway {
    pub(super) fn new(result: SubmissionResult) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            entered: Notify::new(),
            release: Notify::new(),
            result,
        }
    }

    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(super) async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }

    pub(super) fn release(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl SubmissionGateway for GatedGateway {
    async fn submit(&self, _draft: &VerificationDraft) -> SubmissionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        self.release.notified().await;
        self.result.clone()
    }
}

fn disk_full() -> PersistenceError {
    PersistenceError::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
}

/// Store whose every operation fails.
pub(super) struct BrokenStore;

impl DraftPersistence for BrokenStore {
    fn save(
        &self,
        _session: &WizardSessionId,
        _draft: &VerificationDraft,
    ) -> Result<(), PersistenceError> {
        Err(disk_full())
    }

    fn load(
        &self,
        _session: &WizardSessionId,
    ) -> Result<Option<VerificationDraft>, PersistenceError> {
        Err(disk_full())
    }

    fn clear(&self, _session: &WizardSessionId) -> Result<(), PersistenceError> {
        Err(disk_full())
    }
}

pub(super) fn controller_with<G: SubmissionGateway>(
    store: Arc<InMemoryDraftStore>,
    gateway: Arc<G>,
) -> WizardController<InMemoryDraftStore, G> {
    WizardController::initialize(session("jane"), store, gateway)
}

/// Controller filled in and parked on the terminal step.
pub(super) fn controller_at_terminal<G: SubmissionGateway>(
    store: Arc<InMemoryDraftStore>,
    gateway: Arc<G>,
) -> WizardController<InMemoryDraftStore, G> {
    let controller = controller_with(store, gateway);
    controller
        .update_form_data(property_step())
        .expect("step one editable");
    controller.next();
    controller
        .update_form_data(landlord_step())
        .expect("step two editable");
    controller.next();
    controller
        .update_form_data(tenancy_step())
        .expect("step three editable");
    controller
}

pub(super) fn router_with(
    store: Arc<InMemoryDraftStore>,
    gateway: Arc<ScriptedGateway>,
) -> (
    axum::Router,
    Arc<WizardSessions<InMemoryDraftStore, ScriptedGateway>>,
) {
    let sessions = Arc::new(WizardSessions::new(store, gateway));
    (verification_router(sessions.clone()), sessions)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
