//! Graph nodes (spec §4.6): pure-ish functions of `(state, runtime)` that
//! either continue the walk or suspend via `interrupt`.

use crate::context::RuntimeContext;
use crate::error::{Error, Result};
use crate::flow::definition::Step;
use crate::flow::step::AdvanceResult;
use crate::graph::interrupt::{interrupt, NodeOutcome, PendingInterrupt};
use crate::nlu::{DialogueContext, HistoryMessage, NluInput};
use crate::state::{ConversationState, DialogueState, Message, Role, TraceEvent};
use serde_json::Value;

/// What one call to `run_current_step` accomplished.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The step acted on (or the step it advanced to) still needs more work
    /// in a later call; keep looping.
    Advanced,
    /// The active flow ran off the end of its step sequence.
    FlowComplete,
    /// Suspend the turn here.
    Interrupted(PendingInterrupt),
}

/// Run the NLU adapter over the current turn and record its commands onto
/// `state.nlu_result`, returning them for `execute_commands`.
pub async fn understand(state: &mut DialogueState, runtime: &RuntimeContext) -> Result<Vec<crate::command::Command>> {
    state.conversation_state = ConversationState::Understanding;
    state.messages.push(Message {
        role: Role::User,
        content: state.user_message.clone(),
        timestamp: crate::clock::now_seconds(),
    });

    let history = state
        .messages
        .iter()
        .map(|m| HistoryMessage {
            role: match m.role {
                Role::User => "user".to_string(),
                Role::Assistant => "assistant".to_string(),
            },
            content: m.content.clone(),
        })
        .collect();

    let current_slots = state
        .active_flow()
        .and_then(|f| state.flow_slots.get(&f.flow_id))
        .cloned()
        .unwrap_or_default();

    let eligible_flows = runtime
        .scope_manager
        .eligible_flows(runtime.flow_defs.names().into_iter(), state)
        .into_iter()
        .map(String::from)
        .collect();

    let input = NluInput {
        user_message: state.user_message.clone(),
        conversation_history: history,
        dialogue_context: DialogueContext {
            current_slots,
            available_flows: eligible_flows,
            current_flow: state.active_flow().map(|f| f.flow_name.clone()),
            waiting_for_slot: state.waiting_for_slot.clone(),
            recent_commands: state
                .command_log
                .iter()
                .rev()
                .take(5)
                .map(|c| c.command_type.clone())
                .collect(),
        },
        now: crate::clock::now_seconds(),
    };

    let output = match runtime.nlu_adapter.predict(input).await {
        Ok(output) => output,
        Err(e) => {
            tracing::warn!(error = %e, "nlu adapter failed, falling back to a recovery command");
            nlu_fallback(state)
        }
    };

    state.nlu_result = Some(serde_json::json!({
        "entities": output.entities,
        "confidence": output.confidence,
        "reasoning": output.reasoning,
    }));
    state.last_nlu_call = Some(crate::clock::now_seconds());

    Ok(output.commands)
}

/// Recovery path for `Error::NluAdapter` (spec §7): when the adapter is down,
/// a user answering a pending slot prompt still needs to get somewhere, so
/// their raw message is taken as a low-confidence slot value; otherwise there
/// is nothing to do but say so.
fn nlu_fallback(state: &DialogueState) -> crate::nlu::NluOutput {
    match &state.waiting_for_slot {
        Some(slot_name) => crate::nlu::NluOutput {
            commands: vec![crate::command::Command::SetSlot {
                slot_name: slot_name.clone(),
                value: Value::String(state.user_message.clone()),
                confidence: 0.3,
            }],
            entities: Vec::new(),
            confidence: 0.3,
            reasoning: "nlu_adapter_error: raw message taken as slot value".to_string(),
        },
        None => crate::nlu::NluOutput {
            commands: vec![crate::command::Command::ChitChat {
                hint: Some("I didn't understand that.".to_string()),
            }],
            entities: Vec::new(),
            confidence: 0.0,
            reasoning: "nlu_adapter_error: no active slot to fall back onto".to_string(),
        },
    }
}

/// Dispatch `commands` through the executor, updating `state` in place.
pub async fn execute_commands(
    commands: &[crate::command::Command],
    state: &mut DialogueState,
    runtime: &RuntimeContext,
) -> crate::command::executor::ExecutionOutcome {
    crate::command::CommandExecutor::execute(commands, state, runtime).await
}

/// Advance through every already-satisfied step, then act on whatever step
/// `state.current_step` lands on. Call repeatedly (e.g. after an action
/// dispatch) until it stops returning `Advanced`.
pub async fn run_current_step(state: &mut DialogueState, runtime: &RuntimeContext) -> Result<StepOutcome> {
    let flow_id = match state.active_flow() {
        Some(f) => f.flow_id.clone(),
        None => return Ok(StepOutcome::FlowComplete),
    };
    let flow_name = state.active_flow().unwrap().flow_name.clone();
    let def = runtime
        .flow_defs
        .get(&flow_name)
        .ok_or_else(|| Error::configuration(format!("unknown flow definition: {flow_name}")))?;

    let evaluator = crate::patterns::DefaultPredicateEvaluator;
    let advance = runtime
        .flow_step_manager
        .advance_through_completed_steps(state, &flow_id, def, &evaluator)?;

    if advance == AdvanceResult::FlowComplete {
        return Ok(StepOutcome::FlowComplete);
    }

    let step_id = state.current_step.clone().expect("AwaitingStep always sets current_step");
    let step = def
        .step_at(&step_id)
        .cloned()
        .ok_or_else(|| Error::state_invariant_violation(format!("current_step {step_id} not found in flow {flow_name}")))?;

    let outcome = match &step {
        Step::Collect { slot, .. } => collect_next_slot(state, runtime, &flow_id, slot, def).await?,
        Step::Action { .. } => execute_action(state, runtime, &flow_id, &step).await?,
        Step::Say { text, .. } => {
            generate_response(state, text);
            NodeOutcome::Continue
        }
        Step::Confirm { summary, .. } => confirm_step(state, summary)?,
        Step::Branch { .. } => NodeOutcome::Continue,
    };

    Ok(match outcome {
        NodeOutcome::Continue => StepOutcome::Advanced,
        NodeOutcome::Interrupt(p) => StepOutcome::Interrupted(p),
    })
}

async fn collect_next_slot(
    state: &mut DialogueState,
    runtime: &RuntimeContext,
    flow_id: &str,
    slot_name: &str,
    def: &crate::flow::definition::FlowDefinition,
) -> Result<NodeOutcome> {
    if let Some(value) = state.flow_slots.get(flow_id).and_then(|s| s.get(slot_name)).cloned() {
        if let Some(slot_def) = def.slot(slot_name) {
            if let Some(validator) = &slot_def.validator {
                if let Err(e) = runtime.validator_registry.validate(validator, &value) {
                    state.trace.push(TraceEvent::error("validation", "validate_slot", crate::clock::now_seconds()));
                    state.waiting_for_slot = Some(slot_name.to_string());
                    state.conversation_state = ConversationState::WaitingForSlot;
                    return Ok(interrupt(
                        "collect_next_slot",
                        Value::String(format!("{}: {}", slot_def.prompt, e)),
                    ));
                }
            }
        }
        return Ok(NodeOutcome::Continue);
    }

    let prompt = def
        .slot(slot_name)
        .map(|s| s.prompt.clone())
        .unwrap_or_else(|| format!("Please provide {slot_name}."));
    state.waiting_for_slot = Some(slot_name.to_string());
    state.conversation_state = ConversationState::WaitingForSlot;
    Ok(interrupt("collect_next_slot", Value::String(prompt)))
}

async fn execute_action(
    state: &mut DialogueState,
    runtime: &RuntimeContext,
    flow_id: &str,
    step: &Step,
) -> Result<NodeOutcome> {
    let Step::Action { call, inputs, outputs, .. } = step else {
        return Ok(NodeOutcome::Continue);
    };
    state.conversation_state = ConversationState::ExecutingAction;

    let slots = state.flow_slots.get(flow_id).cloned().unwrap_or_default();
    let mut action_inputs = std::collections::HashMap::new();
    for (input_name, slot_name) in inputs {
        if let Some(v) = slots.get(slot_name) {
            action_inputs.insert(input_name.clone(), v.clone());
        }
    }

    let result = runtime.action_registry.dispatch(call, action_inputs).await;
    match result {
        Ok(action_outputs) => {
            let entry = state.flow_slots.entry(flow_id.to_string()).or_default();
            for (output_name, slot_name) in outputs {
                if let Some(v) = action_outputs.get(output_name) {
                    entry.insert(slot_name.clone(), v.clone());
                }
            }
            Ok(NodeOutcome::Continue)
        }
        Err(e) => {
            state.metadata.error = Some(e.to_string());
            state.conversation_state = ConversationState::Error;
            state.trace.push(TraceEvent::error(e.kind_tag(), "execute_action", crate::clock::now_seconds()));
            Err(e)
        }
    }
}

fn generate_response(state: &mut DialogueState, text: &str) {
    if state.last_response.is_empty() {
        state.last_response = text.to_string();
    } else {
        state.last_response = format!("{} {}", state.last_response, text);
    }
    state.messages.push(Message {
        role: Role::Assistant,
        content: text.to_string(),
        timestamp: crate::clock::now_seconds(),
    });
}

fn confirm_step(state: &mut DialogueState, summary: &str) -> Result<NodeOutcome> {
    if state.conversation_state == ConversationState::Confirming {
        return Ok(NodeOutcome::Continue);
    }
    state.conversation_state = ConversationState::Confirming;
    Ok(interrupt("run_current_step", Value::String(summary.to_string())))
}

/// Turn `metadata.error` into a safe, user-facing response and leave a clean
/// trail for debugging (spec §7).
pub fn handle_error(state: &mut DialogueState) {
    let message = state
        .metadata
        .error
        .clone()
        .unwrap_or_else(|| "Something went wrong.".to_string());
    state.last_response = "I ran into a problem handling that. Let's try again.".to_string();
    state.trace.push(
        TraceEvent::new("error_handled", crate::clock::now_seconds())
            .with_data("detail", Value::String(message)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::config::RuntimeConfig;
    use crate::context::RuntimeContextBuilder;
    use crate::flow::definition::{FlowDefinition, FlowDefinitionRegistry};
    use crate::nlu::{NluAdapter, NluInput, NluOutput};
    use async_trait::async_trait;

    struct FailingNlu;

    #[async_trait]
    impl NluAdapter for FailingNlu {
        async fn predict(&self, _input: NluInput) -> Result<NluOutput> {
            Err(Error::nlu_adapter("upstream unavailable"))
        }
    }

    async fn runtime_with_failing_nlu() -> RuntimeContext {
        let mut defs = FlowDefinitionRegistry::new();
        defs.register(FlowDefinition::minimal("book_flight"));
        RuntimeContextBuilder::new(RuntimeConfig::default())
            .flow_defs(defs)
            .nlu_adapter(std::sync::Arc::new(FailingNlu))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn understand_falls_back_to_set_slot_when_waiting_for_a_slot() {
        let rt = runtime_with_failing_nlu().await;
        let mut state = DialogueState::new();
        state.waiting_for_slot = Some("origin".to_string());
        state.user_message = "Boston".to_string();

        let commands = understand(&mut state, &rt).await.unwrap();
        assert_eq!(
            commands,
            vec![Command::SetSlot {
                slot_name: "origin".to_string(),
                value: Value::String("Boston".to_string()),
                confidence: 0.3,
            }]
        );
    }

    #[tokio::test]
    async fn understand_falls_back_to_chit_chat_with_no_pending_slot() {
        let rt = runtime_with_failing_nlu().await;
        let mut state = DialogueState::new();
        state.user_message = "hello".to_string();

        let commands = understand(&mut state, &rt).await.unwrap();
        assert!(matches!(commands.as_slice(), [Command::ChitChat { .. }]));
    }

    #[tokio::test]
    async fn understand_excludes_disabled_flows_from_eligible_flows() {
        let mut defs = FlowDefinitionRegistry::new();
        defs.register(FlowDefinition::minimal("book_flight"));
        defs.register(FlowDefinition::minimal("beta_flow"));
        let mut scope = crate::registry::ScopeManager::new();
        scope.disable_flow("beta_flow");

        struct CapturingNlu;
        #[async_trait]
        impl NluAdapter for CapturingNlu {
            async fn predict(&self, input: NluInput) -> Result<NluOutput> {
                assert!(input.dialogue_context.available_flows.contains(&"book_flight".to_string()));
                assert!(!input.dialogue_context.available_flows.contains(&"beta_flow".to_string()));
                Ok(NluOutput::empty("ok"))
            }
        }

        let rt = RuntimeContextBuilder::new(RuntimeConfig::default())
            .flow_defs(defs)
            .scope_manager(scope)
            .nlu_adapter(std::sync::Arc::new(CapturingNlu))
            .build()
            .unwrap();
        let mut state = DialogueState::new();
        state.user_message = "hi".to_string();
        understand(&mut state, &rt).await.unwrap();
    }
}
