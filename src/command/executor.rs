//! `CommandExecutor` (spec §4.4): sequential dispatch of an NLU turn's
//! commands against the handler registry, with command logging, short-circuit
//! on cancellation, and later-wins semantics for contradictory commands in
//! the same turn.

use crate::clock::now_seconds;
use crate::command::Command;
use crate::context::RuntimeContext;
use crate::state::{CommandLogEntry, ConversationState, DialogueState};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Control signals a handler can't express by mutating `state` alone.
///
/// Per-field state merging (scalar replace, `messages`/`trace`/`command_log`
/// append, `flow_slots` deep-merge per `flow_id`, `flow_stack` wholesale
/// replace) is realized by handlers mutating the canonical `DialogueState`
/// directly through `FlowManager`, rather than by returning independent
/// partial states the executor would need to reconcile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateUpdate {
    /// Text fragment contributed toward `last_response`, if any.
    #[serde(default)]
    pub response_fragment: Option<String>,
    /// When set, remaining commands in this turn are skipped.
    #[serde(default)]
    pub short_circuit: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Completed,
    SkippedAfterCancel,
    Failed,
}

pub struct CommandExecutor;

impl CommandExecutor {
    /// Run every command in `commands` in order against `state`.
    ///
    /// On a handler failure: `metadata.error` is set, `conversation_state`
    /// becomes `ERROR`, the command is still logged, and execution stops
    /// (spec §4.4 point 5). After a `CancelFlow`, subsequent commands in the
    /// same turn are logged with `result_status = "skipped_after_cancel"`
    /// and not dispatched (spec §4.4 point 4).
    pub async fn execute(
        commands: &[Command],
        state: &mut DialogueState,
        runtime: &RuntimeContext,
    ) -> ExecutionOutcome {
        let mut cancelled = false;
        let mut response_fragments = Vec::new();

        for command in commands {
            let type_name = command.type_name();
            let args = serde_json::to_value(command).unwrap_or(serde_json::Value::Null);

            if cancelled {
                state.command_log.push(CommandLogEntry {
                    command_type: type_name.to_string(),
                    args,
                    result_status: "skipped_after_cancel".to_string(),
                    timestamp: now_seconds(),
                });
                continue;
            }

            let handler = match runtime.handler_registry.get(type_name) {
                Some(h) => h,
                None => {
                    warn!(command = type_name, "no handler registered for command type");
                    state.command_log.push(CommandLogEntry {
                        command_type: type_name.to_string(),
                        args,
                        result_status: "no_handler".to_string(),
                        timestamp: now_seconds(),
                    });
                    continue;
                }
            };

            match handler.execute(command, state, runtime).await {
                Ok(update) => {
                    state.command_log.push(CommandLogEntry {
                        command_type: type_name.to_string(),
                        args,
                        result_status: "ok".to_string(),
                        timestamp: now_seconds(),
                    });
                    if let Some(fragment) = update.response_fragment {
                        response_fragments.push(fragment);
                    }
                    if matches!(command, Command::CancelFlow { .. }) || update.short_circuit {
                        cancelled = true;
                    }
                }
                Err(err) => {
                    state.command_log.push(CommandLogEntry {
                        command_type: type_name.to_string(),
                        args,
                        result_status: "error".to_string(),
                        timestamp: now_seconds(),
                    });
                    state.metadata.error = Some(err.to_string());
                    state.conversation_state = ConversationState::Error;
                    info!(command = type_name, error = %err, "command handler failed, stopping turn");
                    return ExecutionOutcome::Failed;
                }
            }
        }

        if !response_fragments.is_empty() {
            if state.last_response.is_empty() {
                state.last_response = response_fragments.join(" ");
            } else {
                state.last_response = format!("{} {}", state.last_response, response_fragments.join(" "));
            }
        }

        if cancelled {
            ExecutionOutcome::SkippedAfterCancel
        } else {
            ExecutionOutcome::Completed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::context::RuntimeContextBuilder;
    use crate::nlu::{DialogueContext, NluAdapter, NluInput, NluOutput};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StubNlu;
    #[async_trait]
    impl NluAdapter for StubNlu {
        async fn predict(&self, _input: NluInput) -> crate::error::Result<NluOutput> {
            Ok(NluOutput::empty("stub"))
        }
    }

    async fn runtime() -> RuntimeContext {
        RuntimeContextBuilder::new(RuntimeConfig::default())
            .nlu_adapter(Arc::new(StubNlu))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn unknown_command_type_is_logged_and_skipped() {
        let rt = runtime().await;
        let mut state = DialogueState::new();
        let commands = vec![Command::ChitChat { hint: None }];
        let outcome = CommandExecutor::execute(&commands, &mut state, &rt).await;
        assert_eq!(outcome, ExecutionOutcome::Completed);
        assert_eq!(state.command_log.len(), 1);
    }

    #[tokio::test]
    async fn cancel_flow_short_circuits_remaining_commands() {
        let rt = runtime().await;
        let mut state = DialogueState::new();
        let commands = vec![
            Command::CancelFlow { reason: None },
            Command::ChitChat { hint: None },
        ];
        let outcome = CommandExecutor::execute(&commands, &mut state, &rt).await;
        assert_eq!(outcome, ExecutionOutcome::SkippedAfterCancel);
        assert_eq!(state.command_log[1].result_status, "skipped_after_cancel");
    }
}

