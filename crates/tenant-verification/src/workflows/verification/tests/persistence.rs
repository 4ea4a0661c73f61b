use super::common::*;

use std::path::PathBuf;

use crate::config::{DraftBackend, DraftStoreConfig};
use crate::workflows::verification::domain::{
    TenancyProof, VerificationDraft, WizardSessionId,
};
use crate::workflows::verification::persistence::{
    DraftPersistence, DraftStore, EphemeralDrafts, FileDraftStore, InMemoryDraftStore,
    PersistenceError,
};

fn sample_draft() -> VerificationDraft {
    let proof = TenancyProof::new("lease.pdf", b"%PDF-1.7".to_vec()).expect("valid proof");
    VerificationDraft::default()
        .merged(property_step())
        .merged(landlord_step())
        .merged(tenancy_step().tenancy_proof(proof))
}

#[test]
fn memory_store_round_trips_including_the_proof() {
    let store = InMemoryDraftStore::default();
    let id = session("memory");
    let draft = sample_draft();

    store.save(&id, &draft).expect("save");
    assert_eq!(store.load(&id).expect("load"), Some(draft));

    store.clear(&id).expect("clear");
    assert_eq!(store.load(&id).expect("load"), None);
    store.clear(&id).expect("clearing twice is fine");
}

#[test]
fn file_store_round_trips_without_the_proof() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileDraftStore::open(dir.path().join("drafts")).expect("open store");
    let id = session("file");
    let draft = sample_draft();

    store.save(&id, &draft).expect("save");
    let path = store.directory().join("session-file.json");
    let on_disk = std::fs::read_to_string(&path).expect("draft file written");
    assert!(on_disk.contains("\"tenantFullName\": \"Jane Doe\""));
    assert!(!on_disk.contains("PDF"));

    let restored = store.load(&id).expect("load").expect("draft present");
    assert!(restored.tenancy_proof.is_none());
    assert_eq!(
        restored,
        VerificationDraft {
            tenancy_proof: None,
            ..draft
        }
    );

    store.clear(&id).expect("clear");
    assert!(!path.exists());
    assert_eq!(store.load(&id).expect("load"), None);
}

#[test]
fn file_store_missing_entries_are_not_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileDraftStore::open(dir.path()).expect("open store");

    assert_eq!(store.load(&session("unknown")).expect("load"), None);
    store.clear(&session("unknown")).expect("clear");
}

#[test]
fn file_store_keys_stay_inside_the_directory() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileDraftStore::open(dir.path()).expect("open store");
    assert!(WizardSessionId::parse("../outside").is_none());
    assert!(serde_json::from_str::<WizardSessionId>("\"../outside\"").is_err());

    let id = WizardSessionId::parse("tenant_42").expect("valid id");
    store
        .save(&id, &VerificationDraft::default())
        .expect("save");

    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .expect("list store")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("tenant_42.json")]);
}

#[test]
fn file_store_reports_corrupt_documents() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = FileDraftStore::open(dir.path()).expect("open store");
    std::fs::write(dir.path().join("session-bad.json"), b"{not json").expect("write");

    assert!(matches!(
        store.load(&session("bad")),
        Err(PersistenceError::Corrupt(_))
    ));
}

#[test]
fn ephemeral_store_forgets_everything() {
    let store = EphemeralDrafts;
    let id = session("ephemeral");

    store.save(&id, &sample_draft()).expect("save");
    assert_eq!(store.load(&id).expect("load"), None);
}

#[test]
fn draft_store_follows_configured_backend() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = |backend| DraftStoreConfig {
        backend,
        directory: PathBuf::from(dir.path()),
    };

    let memory = DraftStore::from_config(&config(DraftBackend::Memory)).expect("memory");
    assert_eq!(memory.label(), "memory");
    let id = session("configured");
    memory.save(&id, &sample_draft()).expect("save");
    assert!(memory.load(&id).expect("load").is_some());

    let file = DraftStore::from_config(&config(DraftBackend::File)).expect("file");
    assert_eq!(file.label(), "file");
    file.save(&id, &sample_draft()).expect("save");
    assert!(dir.path().join("session-configured.json").exists());

    let disabled = DraftStore::from_config(&config(DraftBackend::Disabled)).expect("none");
    assert_eq!(disabled.label(), "none");
    assert_eq!(disabled.load(&id).expect("load"), None);
}
