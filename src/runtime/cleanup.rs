//! Background sweep for PAUSED flows stuck past `abandon_timeout` (spec §5).
//!
//! Grounded on the teacher's `kernel::cleanup::CleanupService`: a config
//! struct, a `start`/`stop` pair driving a ticking `tokio::spawn`ed loop, and
//! a synchronous cycle function the tests can drive without waiting on a
//! timer.

use crate::checkpoint::{InMemoryCheckpointer, Snapshot};
use crate::context::RuntimeContext;
use crate::runtime::session_lock::SessionLockTable;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Duration as TokioDuration};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CleanupStats {
    pub sessions_swept: usize,
    pub flows_abandoned: usize,
}

#[derive(Debug)]
pub struct CleanupService {
    runtime: Arc<RuntimeContext>,
    checkpointer: Arc<InMemoryCheckpointer>,
    session_locks: Arc<SessionLockTable>,
    config: CleanupConfig,
    stop_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl CleanupService {
    pub fn new(
        runtime: Arc<RuntimeContext>,
        checkpointer: Arc<InMemoryCheckpointer>,
        session_locks: Arc<SessionLockTable>,
        config: CleanupConfig,
    ) -> Self {
        Self {
            runtime,
            checkpointer,
            session_locks,
            config,
            stop_tx: None,
        }
    }

    /// Start the sweep loop in the background. Returns immediately.
    pub fn start(&mut self) -> tokio::task::JoinHandle<()> {
        let runtime = self.runtime.clone();
        let checkpointer = self.checkpointer.clone();
        let session_locks = self.session_locks.clone();
        let (stop_tx, mut stop_rx) = tokio::sync::oneshot::channel();
        self.stop_tx = Some(stop_tx);
        let period = self.config.interval;

        tokio::spawn(async move {
            let mut ticker = interval(TokioDuration::from_secs(period.as_secs().max(1)));
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let stats = Self::run_cycle(&runtime, &checkpointer, &session_locks).await;
                        tracing::debug!(
                            sessions_swept = stats.sessions_swept,
                            flows_abandoned = stats.flows_abandoned,
                            "cleanup_cycle_completed"
                        );
                    }
                    _ = &mut stop_rx => {
                        tracing::info!("cleanup_service_stopped");
                        break;
                    }
                }
            }
        })
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
    }

    /// Run a single sweep cycle. Exposed separately from `start` so tests can
    /// drive it without a timer.
    pub async fn run_cycle(
        runtime: &RuntimeContext,
        checkpointer: &InMemoryCheckpointer,
        session_locks: &SessionLockTable,
    ) -> CleanupStats {
        let mut stats = CleanupStats::default();
        for session_id_str in checkpointer.session_ids() {
            let Ok(session_id) = crate::ids::SessionId::from_string(session_id_str.clone()) else {
                continue;
            };
            let Ok(Some(mut snapshot)) = checkpointer.load_latest(&session_id).await else {
                continue;
            };
            let before = snapshot.state.flow_stack.len();
            runtime.flow_manager.expire_paused_flows(&mut snapshot.state);
            let abandoned = before.saturating_sub(snapshot.state.flow_stack.len());
            stats.sessions_swept += 1;
            stats.flows_abandoned += abandoned;

            if abandoned > 0 {
                let parent = snapshot.checkpoint_id.clone();
                let next = Snapshot::new(session_id.clone(), snapshot.state, Some(parent));
                let _ = checkpointer.save(next).await;
            }

            session_locks.evict_if_unused(session_id.as_str());
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::context::RuntimeContextBuilder;
    use crate::nlu::{NluAdapter, NluInput, NluOutput};
    use crate::state::DialogueState;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct NoOpNlu;

    #[async_trait]
    impl NluAdapter for NoOpNlu {
        async fn predict(&self, _input: NluInput) -> crate::error::Result<NluOutput> {
            Ok(NluOutput {
                commands: Vec::new(),
                entities: Vec::new(),
                confidence: 1.0,
                reasoning: String::new(),
            })
        }
    }

    fn runtime() -> Arc<RuntimeContext> {
        Arc::new(
            RuntimeContextBuilder::new(RuntimeConfig::default())
                .nlu_adapter(Arc::new(NoOpNlu))
                .build()
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn sweep_abandons_stale_paused_flows_and_resaves() {
        let rt = runtime();
        let checkpointer = Arc::new(InMemoryCheckpointer::new());
        let locks = Arc::new(SessionLockTable::new());

        let session_id = crate::ids::SessionId::new();
        let mut state = DialogueState::new();
        rt.flow_manager.push_flow(&mut state, "a", HashMap::new(), None).unwrap();
        rt.flow_manager.push_flow(&mut state, "b", HashMap::new(), None).unwrap();
        state.flow_stack[0].paused_at = Some(0.0);
        checkpointer.save(Snapshot::new(session_id.clone(), state, None)).await.unwrap();

        let stats = CleanupService::run_cycle(&rt, &checkpointer, &locks).await;
        assert_eq!(stats.sessions_swept, 1);
        assert_eq!(stats.flows_abandoned, 1);

        let latest = checkpointer.load_latest(&session_id).await.unwrap().unwrap();
        assert_eq!(latest.state.flow_stack.len(), 1);
    }

    #[tokio::test]
    async fn sweep_is_a_noop_when_nothing_is_stale() {
        let rt = runtime();
        let checkpointer = Arc::new(InMemoryCheckpointer::new());
        let locks = Arc::new(SessionLockTable::new());

        let session_id = crate::ids::SessionId::new();
        let mut state = DialogueState::new();
        rt.flow_manager.push_flow(&mut state, "a", HashMap::new(), None).unwrap();
        checkpointer.save(Snapshot::new(session_id.clone(), state, None)).await.unwrap();

        let stats = CleanupService::run_cycle(&rt, &checkpointer, &locks).await;
        assert_eq!(stats.sessions_swept, 1);
        assert_eq!(stats.flows_abandoned, 0);
    }
}
