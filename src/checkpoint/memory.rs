//! `InMemoryCheckpointer` — the only `Checkpointer` backend this crate ships
//! (spec §4.8); external backends (Redis, Postgres) are a deployment concern.

use super::{Checkpointer, Snapshot};
use crate::error::{Error, Result};
use crate::ids::{CheckpointId, SessionId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct InMemoryCheckpointer {
    // Ordered oldest-to-newest per session; `save` appends, `load_latest`
    // reads the tail.
    sessions: Mutex<HashMap<String, Vec<Snapshot>>>,
}

impl InMemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    /// All session ids with at least one checkpoint. Not part of the
    /// `Checkpointer` trait: a remote backend may not want to support an
    /// unbounded full scan, but the background sweep needs it for this one.
    pub fn session_ids(&self) -> Vec<String> {
        let sessions = self.sessions.lock().expect("checkpoint lock poisoned");
        sessions.keys().cloned().collect()
    }
}

#[async_trait]
impl Checkpointer for InMemoryCheckpointer {
    async fn save(&self, snapshot: Snapshot) -> Result<()> {
        let mut sessions = self.sessions.lock().expect("checkpoint lock poisoned");
        sessions
            .entry(snapshot.session_id.as_str().to_string())
            .or_default()
            .push(snapshot);
        Ok(())
    }

    async fn load_latest(&self, session_id: &SessionId) -> Result<Option<Snapshot>> {
        let sessions = self.sessions.lock().expect("checkpoint lock poisoned");
        Ok(sessions.get(session_id.as_str()).and_then(|v| v.last().cloned()))
    }

    async fn list(&self, session_id: &SessionId) -> Result<Vec<CheckpointId>> {
        let sessions = self.sessions.lock().expect("checkpoint lock poisoned");
        Ok(sessions
            .get(session_id.as_str())
            .map(|v| v.iter().map(|s| s.checkpoint_id.clone()).collect())
            .unwrap_or_default())
    }

    async fn rewind(&self, session_id: &SessionId, checkpoint_id: &CheckpointId) -> Result<Snapshot> {
        let mut sessions = self.sessions.lock().expect("checkpoint lock poisoned");
        let history = sessions
            .get_mut(session_id.as_str())
            .ok_or_else(|| Error::not_found(format!("no checkpoints for session {session_id}")))?;
        let idx = history
            .iter()
            .position(|s| &s.checkpoint_id == checkpoint_id)
            .ok_or_else(|| Error::not_found(format!("checkpoint {checkpoint_id} not found")))?;
        history.truncate(idx + 1);
        Ok(history[idx].clone())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<()> {
        let mut sessions = self.sessions.lock().expect("checkpoint lock poisoned");
        sessions.remove(session_id.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::DialogueState;

    #[tokio::test]
    async fn save_then_load_latest_roundtrips() {
        let cp = InMemoryCheckpointer::new();
        let session_id = SessionId::new();
        let snap = Snapshot::new(session_id.clone(), DialogueState::new(), None);
        let id = snap.checkpoint_id.clone();
        cp.save(snap).await.unwrap();
        let loaded = cp.load_latest(&session_id).await.unwrap().unwrap();
        assert_eq!(loaded.checkpoint_id, id);
    }

    #[tokio::test]
    async fn rewind_truncates_later_checkpoints() {
        let cp = InMemoryCheckpointer::new();
        let session_id = SessionId::new();
        let first = Snapshot::new(session_id.clone(), DialogueState::new(), None);
        let first_id = first.checkpoint_id.clone();
        cp.save(first).await.unwrap();
        let second = Snapshot::new(session_id.clone(), DialogueState::new(), Some(first_id.clone()));
        cp.save(second).await.unwrap();
        assert_eq!(cp.list(&session_id).await.unwrap().len(), 2);

        cp.rewind(&session_id, &first_id).await.unwrap();
        assert_eq!(cp.list(&session_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_all_history() {
        let cp = InMemoryCheckpointer::new();
        let session_id = SessionId::new();
        cp.save(Snapshot::new(session_id.clone(), DialogueState::new(), None)).await.unwrap();
        cp.delete(&session_id).await.unwrap();
        assert!(cp.load_latest(&session_id).await.unwrap().is_none());
    }
}
