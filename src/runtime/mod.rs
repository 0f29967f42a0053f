//! The runtime loop (spec §4.7): load a session's checkpoint, run one turn of
//! the graph, persist the result. Grounded on the teacher's
//! `kernel::orchestrator::Orchestrator` for the session-scoped, one-turn-at-
//! a-time shape, adapted from its `Instruction`/`WaitInterrupt` vocabulary to
//! this crate's `TurnOutcome`/`PendingInterrupt`.

pub mod cleanup;
pub mod session_lock;

pub use cleanup::{CleanupConfig, CleanupService};
pub use session_lock::SessionLockTable;

use crate::checkpoint::{Checkpointer, Snapshot};
use crate::context::RuntimeContext;
use crate::error::Result;
use crate::graph::{self, TurnOutcome};
use crate::ids::SessionId;
use crate::state::DialogueState;
use std::sync::Arc;
use tracing::instrument;

/// What a single `RuntimeLoop::process_message` call produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnResult {
    pub response: String,
    pub waiting_for_slot: Option<String>,
    pub outcome: TurnOutcome,
}

/// Ties a `RuntimeContext`, a `Checkpointer` backend and per-session locking
/// together into the one entry point a transport (CLI, HTTP handler, ...)
/// calls per inbound message.
#[derive(Debug)]
pub struct RuntimeLoop {
    runtime: Arc<RuntimeContext>,
    checkpointer: Arc<dyn Checkpointer>,
    session_locks: Arc<SessionLockTable>,
}

impl RuntimeLoop {
    pub fn new(runtime: Arc<RuntimeContext>, checkpointer: Arc<dyn Checkpointer>) -> Self {
        Self {
            runtime,
            checkpointer,
            session_locks: Arc::new(SessionLockTable::new()),
        }
    }

    pub fn runtime(&self) -> &Arc<RuntimeContext> {
        &self.runtime
    }

    pub fn session_locks(&self) -> &Arc<SessionLockTable> {
        &self.session_locks
    }

    /// Process one inbound message for `session_id`: load the latest
    /// checkpoint (or start fresh), run one turn, save the result back.
    ///
    /// Fails fast with `Error::SessionBusy` if another call for the same
    /// session is already in flight, per spec §4.7's at-most-one-turn rule.
    #[instrument(skip(self, user_message), fields(session_id = %session_id))]
    pub async fn process_message(&self, session_id: &SessionId, user_message: String) -> Result<TurnResult> {
        let _guard = self.session_locks.try_acquire(session_id.as_str())?;

        let latest = self.checkpointer.load_latest(session_id).await?;
        let (mut state, parent_id) = match latest {
            Some(snapshot) => (snapshot.state, Some(snapshot.checkpoint_id)),
            None => (DialogueState::new(), None),
        };

        state.user_message = user_message;

        let message_timeout = self.runtime.config.session.message_timeout;
        let outcome = match tokio::time::timeout(message_timeout, graph::run_turn(&mut state, &self.runtime)).await {
            Ok(result) => result?,
            Err(_) => {
                // Per-message deadline hit: the in-flight node is abandoned and
                // the checkpoint loaded above stays the authoritative state,
                // so nothing is saved here.
                return Ok(TurnResult {
                    response: "request timed out".to_string(),
                    waiting_for_slot: None,
                    outcome: TurnOutcome::Responded,
                });
            }
        };

        state.check_invariants(self.runtime.config.flow_management.max_stack_depth)?;

        let waiting_for_slot = state.waiting_for_slot.clone();
        let response = state.last_response.clone();

        let snapshot = Snapshot::new(session_id.clone(), state, parent_id);
        self.checkpointer.save(snapshot).await?;

        Ok(TurnResult {
            response,
            waiting_for_slot,
            outcome,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::InMemoryCheckpointer;
    use crate::command::Command;
    use crate::config::RuntimeConfig;
    use crate::context::RuntimeContextBuilder;
    use crate::flow::definition::{FlowDefinition, FlowDefinitionRegistry, SlotDef, Step};
    use crate::nlu::{NluAdapter, NluInput, NluOutput};
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct ScriptedNlu(Vec<Command>);

    #[async_trait]
    impl NluAdapter for ScriptedNlu {
        async fn predict(&self, _input: NluInput) -> crate::error::Result<NluOutput> {
            Ok(NluOutput {
                commands: self.0.clone(),
                entities: Vec::new(),
                confidence: 1.0,
                reasoning: "scripted".to_string(),
            })
        }
    }

    fn booking_flow() -> FlowDefinition {
        FlowDefinition {
            name: "book_flight".to_string(),
            description: String::new(),
            triggers: Default::default(),
            metadata: Default::default(),
            slots: vec![SlotDef {
                name: "origin".to_string(),
                slot_type: "string".to_string(),
                validator: None,
                normalizer: None,
                prompt: "Where from?".to_string(),
            }],
            steps: vec![
                Step::Collect {
                    id: "collect_origin".to_string(),
                    slot: "origin".to_string(),
                    optional: false,
                },
                Step::Say {
                    id: "thanks".to_string(),
                    text: "Booked!".to_string(),
                },
            ],
        }
    }

    fn make_loop(commands: Vec<Command>) -> RuntimeLoop {
        let mut defs = FlowDefinitionRegistry::new();
        defs.register(booking_flow());
        let runtime = Arc::new(
            RuntimeContextBuilder::new(RuntimeConfig::default())
                .flow_defs(defs)
                .nlu_adapter(Arc::new(ScriptedNlu(commands)))
                .build()
                .unwrap(),
        );
        RuntimeLoop::new(runtime, Arc::new(InMemoryCheckpointer::new()))
    }

    #[tokio::test]
    async fn first_message_starts_a_flow_and_persists_a_checkpoint() {
        let rt_loop = make_loop(vec![Command::StartFlow {
            flow_name: "book_flight".to_string(),
            slots: HashMap::new(),
        }]);
        let session_id = SessionId::new();

        let result = rt_loop
            .process_message(&session_id, "book a flight".to_string())
            .await
            .unwrap();

        assert!(matches!(result.outcome, TurnOutcome::Interrupted(_)));
        assert_eq!(result.waiting_for_slot.as_deref(), Some("origin"));
    }

    #[tokio::test]
    async fn second_message_resumes_from_the_saved_checkpoint() {
        let session_id = SessionId::new();

        let starter = make_loop(vec![Command::StartFlow {
            flow_name: "book_flight".to_string(),
            slots: HashMap::new(),
        }]);
        starter.process_message(&session_id, "book a flight".to_string()).await.unwrap();

        // A second loop with a different scripted NLU, sharing only the
        // checkpoint it wrote, the way a fresh process resumes a session.
        let checkpointer = Arc::new(InMemoryCheckpointer::new());
        let snapshot = starter.checkpointer.load_latest(&session_id).await.unwrap().unwrap();
        checkpointer.save(snapshot).await.unwrap();

        let mut defs = FlowDefinitionRegistry::new();
        defs.register(booking_flow());
        let runtime = Arc::new(
            RuntimeContextBuilder::new(RuntimeConfig::default())
                .flow_defs(defs)
                .nlu_adapter(Arc::new(ScriptedNlu(vec![Command::SetSlot {
                    slot_name: "origin".to_string(),
                    value: serde_json::Value::from("NYC"),
                    confidence: 1.0,
                }])))
                .build()
                .unwrap(),
        );
        let resumer = RuntimeLoop::new(runtime, checkpointer);

        let result = resumer.process_message(&session_id, "NYC".to_string()).await.unwrap();
        assert_eq!(result.outcome, TurnOutcome::Responded);
        assert_eq!(result.response, "Booked!");
    }

    #[tokio::test]
    async fn concurrent_calls_for_the_same_session_are_rejected() {
        let rt_loop = make_loop(vec![Command::StartFlow {
            flow_name: "book_flight".to_string(),
            slots: HashMap::new(),
        }]);
        let session_id = SessionId::new();
        let _guard = rt_loop.session_locks.try_acquire(session_id.as_str()).unwrap();

        let err = rt_loop
            .process_message(&session_id, "book a flight".to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::error::Error::SessionBusy(_)));
    }
}
