//! Checkpointing (spec §4.8): persist a `DialogueState` snapshot per session
//! so a turn can resume exactly where the graph suspended it.

pub mod memory;

pub use memory::InMemoryCheckpointer;

use crate::graph::PendingInterrupt;
use crate::ids::{CheckpointId, SessionId};
use crate::state::DialogueState;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single persisted point in a session's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub checkpoint_id: CheckpointId,
    pub parent_id: Option<CheckpointId>,
    pub session_id: SessionId,
    pub state: DialogueState,
    pub next_nodes: Vec<String>,
    pub pending_interrupts: Vec<PendingInterrupt>,
    pub created_at: f64,
}

impl Snapshot {
    pub fn new(session_id: SessionId, state: DialogueState, parent_id: Option<CheckpointId>) -> Self {
        Self {
            checkpoint_id: CheckpointId::new(),
            parent_id,
            session_id,
            state,
            next_nodes: Vec::new(),
            pending_interrupts: Vec::new(),
            created_at: crate::clock::now_seconds(),
        }
    }
}

/// The backend contract: load/save/list/rewind/delete. Only `InMemoryCheckpointer`
/// ships in this crate (spec §4.8's other backends are external collaborators).
#[async_trait]
pub trait Checkpointer: Send + Sync {
    async fn save(&self, snapshot: Snapshot) -> crate::error::Result<()>;
    async fn load_latest(&self, session_id: &SessionId) -> crate::error::Result<Option<Snapshot>>;
    async fn list(&self, session_id: &SessionId) -> crate::error::Result<Vec<CheckpointId>>;
    /// Roll a session back to a prior checkpoint, discarding anything after it.
    async fn rewind(&self, session_id: &SessionId, checkpoint_id: &CheckpointId) -> crate::error::Result<Snapshot>;
    async fn delete(&self, session_id: &SessionId) -> crate::error::Result<()>;
}
