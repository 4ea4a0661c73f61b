use super::common::*;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::workflows::verification::domain::{DraftUpdate, TenancyProof, VerificationDraft};
use crate::workflows::verification::gateway::SubmissionResult;
use crate::workflows::verification::persistence::{DraftPersistence, InMemoryDraftStore};
use crate::workflows::verification::{
    Navigation, SubmitOutcome, SubmitRejection, WizardController, WizardError, WizardPhase,
    WizardStep,
};

#[test]
fn initialize_starts_on_first_step_with_default_draft() {
    let controller = controller_with(
        Arc::new(InMemoryDraftStore::default()),
        Arc::new(ScriptedGateway::default()),
    );

    assert_eq!(controller.current_step(), WizardStep::PropertyDetails);
    assert_eq!(controller.draft(), VerificationDraft::default());
    assert_eq!(controller.phase(), WizardPhase::Active);
    assert!(!controller.is_submitting());
    assert!(!controller.can_advance());
}

#[test]
fn next_is_a_no_op_while_name_or_address_is_blank() {
    let controller = controller_with(
        Arc::new(InMemoryDraftStore::default()),
        Arc::new(ScriptedGateway::default()),
    );

    let blank_cases = [
        DraftUpdate::default().tenant_full_name("Jane Doe"),
        DraftUpdate::default()
            .tenant_full_name("   ")
            .property_address("1 Main St"),
        DraftUpdate::default()
            .tenant_full_name("Jane Doe")
            .property_address("\t"),
    ];

    for update in blank_cases {
        controller
            .update_form_data(update)
            .expect("draft editable");
        assert_eq!(
            controller.next(),
            Navigation::Stayed(WizardStep::PropertyDetails)
        );
        assert_eq!(controller.current_step(), WizardStep::PropertyDetails);
    }
}

#[test]
fn next_advances_exactly_one_step_and_never_past_the_end() {
    let controller = controller_at_terminal(
        Arc::new(InMemoryDraftStore::default()),
        Arc::new(ScriptedGateway::default()),
    );

    assert_eq!(controller.current_step(), WizardStep::TenancyDetails);
    assert_eq!(
        controller.next(),
        Navigation::Stayed(WizardStep::TenancyDetails)
    );
    assert_eq!(controller.current_step(), WizardStep::TenancyDetails);
}

#[test]
fn updates_accumulate_as_an_ordered_shallow_merge() {
    let controller = controller_with(
        Arc::new(InMemoryDraftStore::default()),
        Arc::new(ScriptedGateway::default()),
    );

    let updates = vec![
        DraftUpdate::default()
            .tenant_full_name("J. Doe")
            .tenant_phone("07700 900000"),
        DraftUpdate::default().property_address("1 Main St"),
        DraftUpdate::default()
            .tenant_full_name("Jane Doe")
            .monthly_rent(Decimal::from(1200)),
        DraftUpdate::default(),
        DraftUpdate::default().monthly_rent(Decimal::new(125050, 2)),
    ];

    let mut expected = VerificationDraft::default();
    for update in updates {
        expected.apply(update.clone());
        controller
            .update_form_data(update)
            .expect("draft editable");
    }

    let draft = controller.draft();
    assert_eq!(draft, expected);
    assert_eq!(draft.tenant_full_name, "Jane Doe");
    assert_eq!(draft.tenant_phone.as_deref(), Some("07700 900000"));
    assert_eq!(draft.property_address.as_deref(), Some("1 Main St"));
    assert_eq!(draft.monthly_rent, Some(Decimal::new(125050, 2)));
}

#[test]
fn back_then_next_round_trips_without_touching_the_draft() {
    let controller = controller_at_terminal(
        Arc::new(InMemoryDraftStore::default()),
        Arc::new(ScriptedGateway::default()),
    );
    let before = controller.draft();

    assert_eq!(
        controller.back(),
        Navigation::Moved {
            from: WizardStep::TenancyDetails,
            to: WizardStep::LandlordDetails,
        }
    );
    assert_eq!(
        controller.next(),
        Navigation::Moved {
            from: WizardStep::LandlordDetails,
            to: WizardStep::TenancyDetails,
        }
    );
    assert_eq!(controller.current_step(), WizardStep::TenancyDetails);
    assert_eq!(controller.draft(), before);
}

#[test]
fn back_from_first_step_signals_abandon() {
    let controller = controller_with(
        Arc::new(InMemoryDraftStore::default()),
        Arc::new(ScriptedGateway::default()),
    );

    assert_eq!(controller.back(), Navigation::Abandon);
    assert_eq!(controller.current_step(), WizardStep::PropertyDetails);
    assert_eq!(controller.phase(), WizardPhase::Active);
}

#[test]
fn later_step_fields_survive_back_navigation() {
    let controller = controller_with(
        Arc::new(InMemoryDraftStore::default()),
        Arc::new(ScriptedGateway::default()),
    );
    controller
        .update_form_data(property_step())
        .expect("editable");
    controller.next();
    controller
        .update_form_data(landlord_step())
        .expect("editable");

    assert!(matches!(controller.back(), Navigation::Moved { .. }));
    assert_eq!(controller.current_step(), WizardStep::PropertyDetails);
    controller
        .update_form_data(DraftUpdate::default().property_code("HX-42"))
        .expect("editable");

    let draft = controller.draft();
    assert_eq!(draft.agent_landlord_name.as_deref(), Some("Acme Lettings"));
    assert_eq!(draft.property_code.as_deref(), Some("HX-42"));
}

#[test]
fn every_update_is_saved_to_the_store() {
    let store = Arc::new(InMemoryDraftStore::default());
    let controller = controller_with(store.clone(), Arc::new(ScriptedGateway::default()));

    controller
        .update_form_data(property_step())
        .expect("editable");

    let saved = store
        .load(controller.session_id())
        .expect("store readable")
        .expect("draft saved");
    assert_eq!(saved, controller.draft());
}

#[test]
fn initialize_rehydrates_a_saved_draft() {
    let store = Arc::new(InMemoryDraftStore::default());
    let gateway = Arc::new(ScriptedGateway::default());
    {
        let first = controller_with(store.clone(), gateway.clone());
        first
            .update_form_data(property_step())
            .expect("editable");
        first.next();
        first
            .update_form_data(landlord_step())
            .expect("editable");
        first.unmount();
    }

    let resumed = controller_with(store, gateway);
    assert_eq!(resumed.current_step(), WizardStep::PropertyDetails);
    let draft = resumed.draft();
    assert_eq!(draft.tenant_full_name, "Jane Doe");
    assert_eq!(draft.agent_landlord_name.as_deref(), Some("Acme Lettings"));
}

#[test]
fn store_failures_never_block_the_wizard() {
    let controller = WizardController::initialize(
        session("broken"),
        Arc::new(BrokenStore),
        Arc::new(ScriptedGateway::default()),
    );

    controller
        .update_form_data(property_step())
        .expect("in-memory draft still updates");
    assert_eq!(
        controller.next(),
        Navigation::Moved {
            from: WizardStep::PropertyDetails,
            to: WizardStep::LandlordDetails,
        }
    );
}

#[tokio::test]
async fn submit_refuses_before_the_terminal_step() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller_with(Arc::new(InMemoryDraftStore::default()), gateway.clone());
    controller
        .update_form_data(property_step().agent_landlord_name("Acme").move_in_date(move_in()))
        .expect("editable");

    assert_eq!(
        controller.submit().await,
        SubmitOutcome::Rejected(SubmitRejection::NotAtTerminalStep)
    );
    assert!(gateway.received().is_empty());
}

#[tokio::test]
async fn submit_refuses_an_incomplete_terminal_step() {
    let gateway = Arc::new(ScriptedGateway::default());
    let controller =
        controller_at_terminal(Arc::new(InMemoryDraftStore::default()), gateway.clone());
    controller
        .update_form_data(DraftUpdate::default().clear_move_in_date())
        .expect("editable");

    assert_eq!(
        controller.submit().await,
        SubmitOutcome::Rejected(SubmitRejection::Incomplete(WizardStep::TenancyDetails))
    );
    assert!(gateway.received().is_empty());
}

#[tokio::test]
async fn successful_submission_completes_and_discards_the_draft() {
    let store = Arc::new(InMemoryDraftStore::default());
    let gateway = Arc::new(ScriptedGateway::default());
    let controller = controller_at_terminal(store.clone(), gateway.clone());
    let submitted = controller.draft();

    assert_eq!(controller.submit().await, SubmitOutcome::Completed);

    assert_eq!(controller.phase(), WizardPhase::Complete);
    assert!(!controller.is_submitting());
    assert_eq!(controller.draft(), VerificationDraft::default());
    assert!(store
        .load(controller.session_id())
        .expect("store readable")
        .is_none());
    assert_eq!(gateway.received(), vec![submitted]);

    assert_eq!(
        controller.update_form_data(property_step()),
        Err(WizardError::Closed)
    );
    assert_eq!(
        controller.submit().await,
        SubmitOutcome::Rejected(SubmitRejection::Closed)
    );
}

#[tokio::test]
async fn failed_submission_keeps_everything_and_allows_a_retry() {
    let store = Arc::new(InMemoryDraftStore::default());
    let gateway = Arc::new(ScriptedGateway::answering(vec![
        SubmissionResult::rejected("Network error"),
    ]));
    let controller = controller_at_terminal(store.clone(), gateway.clone());
    let before = controller.draft();

    assert_eq!(
        controller.submit().await,
        SubmitOutcome::Failed {
            error: "Network error".to_string(),
        }
    );
    assert_eq!(controller.current_step(), WizardStep::TenancyDetails);
    assert_eq!(controller.draft(), before);
    assert!(!controller.is_submitting());
    assert_eq!(controller.notice().as_deref(), Some("Network error"));
    assert!(store
        .load(controller.session_id())
        .expect("store readable")
        .is_some());

    controller.dismiss_notice();
    assert!(controller.notice().is_none());

    assert_eq!(controller.submit().await, SubmitOutcome::Completed);
    assert_eq!(gateway.received().len(), 2);
}

#[tokio::test]
async fn concurrent_submits_reach_the_gateway_once() {
    let gateway = Arc::new(GatedGateway::new(SubmissionResult::Accepted));
    let controller = Arc::new(controller_at_terminal(
        Arc::new(InMemoryDraftStore::default()),
        gateway.clone(),
    ));

    let first = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit().await }
    });
    gateway.wait_until_entered().await;

    assert!(controller.is_submitting());
    assert!(!controller.can_advance());
    assert_eq!(
        controller.submit().await,
        SubmitOutcome::Rejected(SubmitRejection::InFlight)
    );
    assert_eq!(
        controller.update_form_data(DraftUpdate::default().tenant_phone("0")),
        Err(WizardError::SubmissionInFlight)
    );
    assert_eq!(
        controller.back(),
        Navigation::Stayed(WizardStep::TenancyDetails)
    );

    gateway.release();
    assert_eq!(first.await.expect("task joins"), SubmitOutcome::Completed);
    assert_eq!(gateway.calls(), 1);
}

#[tokio::test]
async fn late_gateway_answer_after_unmount_is_ignored() {
    let store = Arc::new(InMemoryDraftStore::default());
    let gateway = Arc::new(GatedGateway::new(SubmissionResult::rejected("timeout")));
    let controller = Arc::new(controller_at_terminal(store, gateway.clone()));
    let before = controller.draft();

    let pending = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit().await }
    });
    gateway.wait_until_entered().await;
    controller.unmount();
    gateway.release();

    assert_eq!(pending.await.expect("task joins"), SubmitOutcome::Detached);
    assert_eq!(controller.phase(), WizardPhase::Unmounted);
    assert!(controller.notice().is_none());
    assert_eq!(controller.draft(), before);
}

#[tokio::test]
async fn accepted_answer_after_unmount_clears_the_saved_draft() {
    let store = Arc::new(InMemoryDraftStore::default());
    let gateway = Arc::new(GatedGateway::new(SubmissionResult::Accepted));
    let controller = Arc::new(controller_at_terminal(store.clone(), gateway.clone()));

    let pending = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit().await }
    });
    gateway.wait_until_entered().await;
    controller.unmount();
    gateway.release();

    assert_eq!(pending.await.expect("task joins"), SubmitOutcome::Detached);
    assert!(store.is_empty());
}

#[tokio::test]
async fn dropped_caller_does_not_cancel_the_submission() {
    let store = Arc::new(InMemoryDraftStore::default());
    let gateway = Arc::new(GatedGateway::new(SubmissionResult::Accepted));
    let controller = Arc::new(controller_at_terminal(store.clone(), gateway.clone()));

    let pending = tokio::spawn({
        let controller = controller.clone();
        async move { controller.submit().await }
    });
    gateway.wait_until_entered().await;
    pending.abort();
    assert!(pending.await.is_err());

    assert!(controller.is_submitting());
    assert_eq!(
        controller.submit().await,
        SubmitOutcome::Rejected(SubmitRejection::InFlight)
    );

    gateway.release();
    while controller.is_submitting() {
        tokio::task::yield_now().await;
    }

    assert_eq!(gateway.calls(), 1);
    assert_eq!(controller.phase(), WizardPhase::Complete);
    assert!(store.is_empty());
}

#[test]
fn abandon_discards_the_saved_draft() {
    let store = Arc::new(InMemoryDraftStore::default());
    let controller = controller_with(store.clone(), Arc::new(ScriptedGateway::default()));
    controller
        .update_form_data(property_step())
        .expect("editable");
    assert_eq!(store.len(), 1);

    controller.abandon();

    assert!(store.is_empty());
    assert_eq!(controller.phase(), WizardPhase::Unmounted);
    assert_eq!(controller.next(), Navigation::Stayed(WizardStep::PropertyDetails));
}

#[test]
fn snapshot_summarises_the_attached_proof() {
    let controller = controller_with(
        Arc::new(InMemoryDraftStore::default()),
        Arc::new(ScriptedGateway::default()),
    );
    let proof = TenancyProof::new("lease.pdf", vec![0; 2048]).expect("valid proof");
    controller
        .update_form_data(property_step().tenancy_proof(proof))
        .expect("editable");

    let snapshot = controller.snapshot();
    assert_eq!(snapshot.current_step, 1);
    assert_eq!(snapshot.total_steps, 3);
    assert!(snapshot.can_advance);
    let summary = snapshot.tenancy_proof.expect("proof summarised");
    assert_eq!(summary.file_name, "lease.pdf");
    assert_eq!(summary.content_type, "application/pdf");
    assert_eq!(summary.size, 2048);
}
