//! Built-in `CommandHandler` implementations, one per `Command` variant
//! (spec §4.3). Each mutates `DialogueState` through `FlowManager` rather
//! than returning an independent partial state (see `executor::StateUpdate`).

use crate::command::executor::StateUpdate;
use crate::command::Command;
use crate::config::OnMaxRetries;
use crate::context::RuntimeContext;
use crate::error::{Error, Result};
use crate::flow::definition::Step;
use crate::flow::manager::PopResult;
use crate::registry::{CommandHandler, HandlerRegistry};
use crate::state::{ConversationState, DialogueState, TraceEvent};
use async_trait::async_trait;
use std::sync::Arc;

pub fn default_handler_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.register("StartFlow", Arc::new(StartFlowHandler));
    registry.register("SetSlot", Arc::new(SetSlotHandler));
    registry.register("CorrectSlot", Arc::new(CorrectSlotHandler));
    registry.register("CancelFlow", Arc::new(CancelFlowHandler));
    registry.register("Clarify", Arc::new(ClarifyHandler));
    registry.register("AffirmConfirmation", Arc::new(AffirmConfirmationHandler));
    registry.register("DenyConfirmation", Arc::new(DenyConfirmationHandler));
    registry.register("HumanHandoff", Arc::new(HumanHandoffHandler));
    registry.register("ChitChat", Arc::new(ChitChatHandler));
    registry.register("OutOfScope", Arc::new(OutOfScopeHandler));
    registry
}

pub struct StartFlowHandler;

#[async_trait]
impl CommandHandler for StartFlowHandler {
    async fn execute(&self, command: &Command, state: &mut DialogueState, runtime: &RuntimeContext) -> Result<StateUpdate> {
        let Command::StartFlow { flow_name, slots } = command else {
            return Err(Error::validation("StartFlowHandler given a non-StartFlow command"));
        };
        if runtime.flow_defs.get(flow_name).is_none() {
            return Err(Error::configuration(format!("unknown flow: {flow_name}")));
        }
        let flow_id = runtime.flow_manager.push_flow(state, flow_name, slots.clone(), None)?;
        if let Some(def) = runtime.flow_defs.get(flow_name) {
            state.current_step = def.first_step().map(|s| s.id().to_string());
        }
        state.conversation_state = ConversationState::Understanding;
        state.trace.push(TraceEvent::new("flow_started", crate::clock::now_seconds()).with_data(
            "flow_id",
            serde_json::Value::String(flow_id),
        ));
        Ok(StateUpdate::default())
    }
}

pub struct SetSlotHandler;

#[async_trait]
impl CommandHandler for SetSlotHandler {
    async fn execute(&self, command: &Command, state: &mut DialogueState, runtime: &RuntimeContext) -> Result<StateUpdate> {
        let Command::SetSlot { slot_name, value, .. } = command else {
            return Err(Error::validation("SetSlotHandler given a non-SetSlot command"));
        };
        let normalized = runtime.normalizer_registry.apply(slot_name, value.clone());
        runtime.flow_manager.set_slot(state, slot_name, normalized)?;
        Ok(StateUpdate::default())
    }
}

pub struct CorrectSlotHandler;

#[async_trait]
impl CommandHandler for CorrectSlotHandler {
    async fn execute(&self, command: &Command, state: &mut DialogueState, runtime: &RuntimeContext) -> Result<StateUpdate> {
        let Command::CorrectSlot { slot_name, new_value } = command else {
            return Err(Error::validation("CorrectSlotHandler given a non-CorrectSlot command"));
        };
        if !runtime.config.conversation_patterns.correction.enabled {
            return Ok(StateUpdate::default());
        }
        let normalized = runtime.normalizer_registry.apply(slot_name, new_value.clone());
        runtime.flow_manager.set_slot(state, slot_name, normalized)?;
        state.trace.push(
            TraceEvent::new("slot_corrected", crate::clock::now_seconds())
                .with_data("slot", serde_json::Value::String(slot_name.clone())),
        );

        if runtime.config.conversation_patterns.correction.revalidate_dependents {
            revalidate_dependents(state, runtime, slot_name);
        }

        Ok(StateUpdate {
            response_fragment: Some(format!("Got it, {slot_name} updated.")),
            short_circuit: false,
        })
    }
}

/// Slots collected by steps after `corrected_slot`'s in the active flow's
/// step order may no longer hold valid values; clear any that now fail their
/// own validator so `collect_next_slot` re-prompts for them (spec §4.5
/// "re-validate dependents").
fn revalidate_dependents(state: &mut DialogueState, runtime: &RuntimeContext, corrected_slot: &str) {
    let Some(active) = state.active_flow() else { return };
    let flow_id = active.flow_id.clone();
    let flow_name = active.flow_name.clone();
    let Some(def) = runtime.flow_defs.get(&flow_name) else { return };

    let Some(corrected_pos) = def
        .steps
        .iter()
        .position(|s| matches!(s, Step::Collect { slot, .. } if slot == corrected_slot))
    else {
        return;
    };

    let dependents: Vec<&str> = def.steps[corrected_pos + 1..]
        .iter()
        .filter_map(|s| match s {
            Step::Collect { slot, .. } => Some(slot.as_str()),
            _ => None,
        })
        .collect();

    for dependent in dependents {
        let Some(slot_def) = def.slot(dependent) else { continue };
        let Some(validator) = &slot_def.validator else { continue };
        let Some(value) = state.flow_slots.get(&flow_id).and_then(|s| s.get(dependent)).cloned() else {
            continue;
        };
        if runtime.validator_registry.validate(validator, &value).is_err() {
            if let Some(slots) = state.flow_slots.get_mut(&flow_id) {
                slots.remove(dependent);
            }
            state.trace.push(
                TraceEvent::new("dependent_slot_invalidated", crate::clock::now_seconds())
                    .with_data("slot", serde_json::Value::String(dependent.to_string())),
            );
        }
    }
}

pub struct CancelFlowHandler;

#[async_trait]
impl CommandHandler for CancelFlowHandler {
    async fn execute(&self, _command: &Command, state: &mut DialogueState, runtime: &RuntimeContext) -> Result<StateUpdate> {
        if state.active_flow().is_none() {
            return Err(Error::no_active_flow("CancelFlow with no active flow"));
        }
        if runtime.patterns.cancellation_requires_confirmation() && state.conversation_state != ConversationState::Confirming {
            state.pending_cancellation = true;
            state.conversation_state = ConversationState::Confirming;
            state.waiting_for_slot = None;
            return Ok(StateUpdate {
                response_fragment: Some("Are you sure you want to cancel?".to_string()),
                short_circuit: true,
            });
        }
        cancel_active_flow(state, runtime)
    }
}

/// Pop the active flow as CANCELLED, shared by `CancelFlowHandler`'s
/// immediate path and `AffirmConfirmationHandler`'s pending-cancellation path.
fn cancel_active_flow(state: &mut DialogueState, runtime: &RuntimeContext) -> Result<StateUpdate> {
    if state.active_flow().is_none() {
        return Err(Error::no_active_flow("cancel_active_flow with no active flow"));
    }
    runtime.flow_manager.pop_flow(state, Default::default(), PopResult::Cancelled);
    state.pending_cancellation = false;
    if state.flow_stack.is_empty() {
        state.conversation_state = ConversationState::Idle;
        state.waiting_for_slot = None;
        state.current_step = None;
        return Ok(StateUpdate {
            response_fragment: Some("OK, cancelled. How else can I help?".to_string()),
            short_circuit: true,
        });
    }
    state.conversation_state = ConversationState::WaitingForSlot;
    Ok(StateUpdate::default())
}

pub struct ClarifyHandler;

#[async_trait]
impl CommandHandler for ClarifyHandler {
    async fn execute(&self, command: &Command, state: &mut DialogueState, _runtime: &RuntimeContext) -> Result<StateUpdate> {
        let Command::Clarify { topic } = command else {
            return Err(Error::validation("ClarifyHandler given a non-Clarify command"));
        };
        state.digression_depth += 1;
        state.last_digression_type = Some(topic.clone());
        Ok(StateUpdate::default())
    }
}

pub struct AffirmConfirmationHandler;

#[async_trait]
impl CommandHandler for AffirmConfirmationHandler {
    async fn execute(&self, _command: &Command, state: &mut DialogueState, runtime: &RuntimeContext) -> Result<StateUpdate> {
        if state.conversation_state != ConversationState::Confirming {
            return Err(Error::validation("AffirmConfirmation received outside CONFIRMING"));
        }
        state.confirmation_retries = 0;
        if state.pending_cancellation {
            return cancel_active_flow(state, runtime);
        }
        state.conversation_state = ConversationState::ExecutingAction;
        Ok(StateUpdate::default())
    }
}

pub struct DenyConfirmationHandler;

#[async_trait]
impl CommandHandler for DenyConfirmationHandler {
    async fn execute(&self, command: &Command, state: &mut DialogueState, runtime: &RuntimeContext) -> Result<StateUpdate> {
        let Command::DenyConfirmation { slot_to_change } = command else {
            return Err(Error::validation("DenyConfirmationHandler given a non-DenyConfirmation command"));
        };
        if state.conversation_state != ConversationState::Confirming {
            return Err(Error::validation("DenyConfirmation received outside CONFIRMING"));
        }

        if state.pending_cancellation {
            state.pending_cancellation = false;
            state.confirmation_retries = 0;
            state.conversation_state = ConversationState::WaitingForSlot;
            return Ok(StateUpdate {
                response_fragment: Some("OK, let's continue.".to_string()),
                short_circuit: false,
            });
        }

        state.confirmation_retries += 1;
        if runtime.patterns.confirmation_retries_exhausted(state.confirmation_retries) {
            state.confirmation_retries = 0;
            return match runtime.config.conversation_patterns.confirmation.on_max_retries {
                OnMaxRetries::Cancel => cancel_active_flow(state, runtime),
                OnMaxRetries::HumanHandoff => {
                    let action_name = &runtime.config.conversation_patterns.human_handoff.action;
                    runtime
                        .action_registry
                        .dispatch(action_name, std::collections::HashMap::new())
                        .await?;
                    state.conversation_state = ConversationState::Completed;
                    Ok(StateUpdate {
                        response_fragment: Some("Connecting you with a human agent.".to_string()),
                        short_circuit: true,
                    })
                }
            };
        }

        if let Some(slot_name) = slot_to_change {
            let flow_id = state
                .active_flow()
                .map(|f| f.flow_id.clone())
                .ok_or_else(|| Error::no_active_flow("DenyConfirmation with no active flow"))?;
            if let Some(slots) = state.flow_slots.get_mut(&flow_id) {
                slots.remove(slot_name);
            }
            state.waiting_for_slot = Some(slot_name.clone());
        }
        state.conversation_state = ConversationState::WaitingForSlot;
        Ok(StateUpdate::default())
    }
}

pub struct HumanHandoffHandler;

#[async_trait]
impl CommandHandler for HumanHandoffHandler {
    async fn execute(&self, command: &Command, state: &mut DialogueState, runtime: &RuntimeContext) -> Result<StateUpdate> {
        let Command::HumanHandoff { reason } = command else {
            return Err(Error::validation("HumanHandoffHandler given a non-HumanHandoff command"));
        };
        let action_name = &runtime.config.conversation_patterns.human_handoff.action;
        let mut inputs = std::collections::HashMap::new();
        inputs.insert(
            "reason".to_string(),
            serde_json::Value::String(reason.clone().unwrap_or_default()),
        );
        runtime.action_registry.dispatch(action_name, inputs).await?;
        state.conversation_state = ConversationState::Completed;
        state.metadata.error = None;
        Ok(StateUpdate {
            response_fragment: Some("Connecting you with a human agent.".to_string()),
            short_circuit: true,
        })
    }
}

pub struct ChitChatHandler;

#[async_trait]
impl CommandHandler for ChitChatHandler {
    async fn execute(&self, command: &Command, _state: &mut DialogueState, _runtime: &RuntimeContext) -> Result<StateUpdate> {
        let Command::ChitChat { hint } = command else {
            return Err(Error::validation("ChitChatHandler given a non-ChitChat command"));
        };
        Ok(StateUpdate {
            response_fragment: Some(hint.clone().unwrap_or_else(|| "Happy to chat.".to_string())),
            short_circuit: false,
        })
    }
}

pub struct OutOfScopeHandler;

#[async_trait]
impl CommandHandler for OutOfScopeHandler {
    async fn execute(&self, command: &Command, _state: &mut DialogueState, _runtime: &RuntimeContext) -> Result<StateUpdate> {
        let Command::OutOfScope { topic } = command else {
            return Err(Error::validation("OutOfScopeHandler given a non-OutOfScope command"));
        };
        Ok(StateUpdate {
            response_fragment: Some(format!("I can't help with {topic} here.")),
            short_circuit: false,
        })
    }
}
