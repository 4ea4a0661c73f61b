use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::debug;

use super::domain::{VerificationDraft, WizardSessionId};
use crate::config::{DraftBackend, DraftStoreConfig};

/// Storage for in-progress drafts so a wizard survives a reload of the client.
pub trait DraftPersistence: Send + Sync {
    fn save(
        &self,
        session: &WizardSessionId,
        draft: &VerificationDraft,
    ) -> Result<(), PersistenceError>;
    fn load(&self, session: &WizardSessionId) -> Result<Option<VerificationDraft>, PersistenceError>;
    fn clear(&self, session: &WizardSessionId) -> Result<(), PersistenceError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("draft store io failure: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored draft could not be decoded: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Process-local store; keeps attachments since nothing leaves memory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDraftStore {
    drafts: Arc<Mutex<HashMap<WizardSessionId, VerificationDraft>>>,
}

impl InMemoryDraftStore {
    pub fn len(&self) -> usize {
        self.drafts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DraftPersistence for InMemoryDraftStore {
    fn save(
        &self,
        session: &WizardSessionId,
        draft: &VerificationDraft,
    ) -> Result<(), PersistenceError> {
        let mut guard = self.drafts.lock().unwrap_or_else(PoisonError::into_inner);
        guard.insert(session.clone(), draft.clone());
        Ok(())
    }

    fn load(&self, session: &WizardSessionId) -> Result<Option<VerificationDraft>, PersistenceError> {
        let guard = self.drafts.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(session).cloned())
    }

    fn clear(&self, session: &WizardSessionId) -> Result<(), PersistenceError> {
        let mut guard = self.drafts.lock().unwrap_or_else(PoisonError::into_inner);
        guard.remove(session);
        Ok(())
    }
}

/// One JSON document per session. Proof bytes are skipped by the draft's serde
/// representation, so a rehydrated draft comes back without its attachment.
#[derive(Debug, Clone)]
pub struct FileDraftStore {
    directory: PathBuf,
}

impl FileDraftStore {
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, session: &WizardSessionId) -> PathBuf {
        self.directory.join(format!("{}.json", session.as_str()))
    }
}

impl DraftPersistence for FileDraftStore {
    fn save(
        &self,
        session: &WizardSessionId,
        draft: &VerificationDraft,
    ) -> Result<(), PersistenceError> {
        let path = self.path_for(session);
        let staging = path.with_extension("json.tmp");
        let payload = serde_json::to_vec_pretty(draft)?;
        fs::write(&staging, payload)?;
        fs::rename(&staging, &path)?;
        debug!(session = %session, path = %path.display(), "draft written");
        Ok(())
    }

    fn load(&self, session: &WizardSessionId) -> Result<Option<VerificationDraft>, PersistenceError> {
        let path = self.path_for(session);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn clear(&self, session: &WizardSessionId) -> Result<(), PersistenceError> {
        let path = self.path_for(session);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// Keeps nothing: a reload starts the wizard from scratch.
#[derive(Debug, Default, Clone, Copy)]
pub struct EphemeralDrafts;

impl DraftPersistence for EphemeralDrafts {
    fn save(
        &self,
        _session: &WizardSessionId,
        _draft: &VerificationDraft,
    ) -> Result<(), PersistenceError> {
        Ok(())
    }

    fn load(
        &self,
        _session: &WizardSessionId,
    ) -> Result<Option<VerificationDraft>, PersistenceError> {
        Ok(None)
    }

    fn clear(&self, _session: &WizardSessionId) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// Store chosen at startup from `VERIFY_DRAFT_STORE`.
#[derive(Debug, Clone)]
pub enum DraftStore {
    Memory(InMemoryDraftStore),
    File(FileDraftStore),
    Ephemeral(EphemeralDrafts),
}

impl DraftStore {
    pub fn from_config(config: &DraftStoreConfig) -> Result<Self, PersistenceError> {
        Ok(match config.backend {
            DraftBackend::Memory => Self::Memory(InMemoryDraftStore::default()),
            DraftBackend::File => Self::File(FileDraftStore::open(&config.directory)?),
            DraftBackend::Disabled => Self::Ephemeral(EphemeralDrafts),
        })
    }

    pub const fn label(&self) -> &'static str {
        match self {
            DraftStore::Memory(_) => "memory",
            DraftStore::File(_) => "file",
            DraftStore::Ephemeral(_) => "none",
        }
    }

    fn inner(&self) -> &dyn DraftPersistence {
        match self {
            DraftStore::Memory(store) => store,
            DraftStore::File(store) => store,
            DraftStore::Ephemeral(store) => store,
        }
    }
}

impl DraftPersistence for DraftStore {
    fn save(
        &self,
        session: &WizardSessionId,
        draft: &VerificationDraft,
    ) -> Result<(), PersistenceError> {
        self.inner().save(session, draft)
    }

    fn load(&self, session: &WizardSessionId) -> Result<Option<VerificationDraft>, PersistenceError> {
        self.inner().load(session)
    }

    fn clear(&self, session: &WizardSessionId) -> Result<(), PersistenceError> {
        self.inner().clear(session)
    }
}
