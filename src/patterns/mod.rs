//! Conversation pattern overlay (spec §4.5): Correction, Clarification,
//! Cancellation, Human Handoff, Confirmation. These patterns don't own state
//! transitions themselves — they decide *when* a transition should happen,
//! by evaluating configured trigger conditions against a snapshot of
//! `DialogueState` through the pluggable predicate grammar.

pub mod predicate;

pub use predicate::{DefaultPredicateEvaluator, PredicateEvaluator};

use crate::config::ConversationPatternsConfig;
use crate::state::DialogueState;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub struct ConversationPatterns {
    pub config: ConversationPatternsConfig,
    evaluator: Arc<dyn PredicateEvaluator>,
}

impl std::fmt::Debug for ConversationPatterns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationPatterns")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ConversationPatterns {
    pub fn new(config: ConversationPatternsConfig) -> Self {
        Self {
            config,
            evaluator: Arc::new(DefaultPredicateEvaluator),
        }
    }

    pub fn with_evaluator(config: ConversationPatternsConfig, evaluator: Arc<dyn PredicateEvaluator>) -> Self {
        Self { config, evaluator }
    }

    /// The evaluation context trigger conditions are checked against:
    /// `clarification_depth`, `validation_failures`, `explicit_request`, plus
    /// anything a caller has stashed in `metadata.extra`.
    fn trigger_context(&self, state: &DialogueState) -> HashMap<String, Value> {
        let mut ctx = HashMap::new();
        ctx.insert("clarification_depth".to_string(), Value::from(state.digression_depth));
        ctx.insert(
            "validation_failures".to_string(),
            state
                .metadata
                .extra
                .get("validation_failures")
                .cloned()
                .unwrap_or_else(|| Value::from(0)),
        );
        ctx.insert(
            "explicit_request".to_string(),
            state
                .metadata
                .extra
                .get("explicit_request")
                .cloned()
                .unwrap_or(Value::Bool(false)),
        );
        for (k, v) in &state.metadata.extra {
            ctx.entry(k.clone()).or_insert_with(|| v.clone());
        }
        ctx
    }

    /// True once `digression_depth` exceeds `clarification.max_depth`,
    /// independent of `human_handoff.trigger_conditions`.
    pub fn clarification_depth_exceeded(&self, state: &DialogueState) -> bool {
        self.config.clarification.enabled && state.digression_depth > self.config.clarification.max_depth
    }

    /// Any configured `human_handoff.trigger_conditions` predicate matches.
    pub fn should_hand_off(&self, state: &DialogueState) -> bool {
        if !self.config.human_handoff.enabled {
            return false;
        }
        let ctx = self.trigger_context(state);
        self.config
            .human_handoff
            .trigger_conditions
            .iter()
            .any(|predicate| self.evaluator.evaluate(predicate, &ctx))
    }

    pub fn correction_enabled(&self) -> bool {
        self.config.correction.enabled
    }

    pub fn cancellation_requires_confirmation(&self) -> bool {
        self.config.cancellation.enabled && self.config.cancellation.confirm_before_cancel
    }

    /// Whether `retries` has reached `confirmation.max_retries`, and what to
    /// do about it per `on_max_retries`.
    pub fn confirmation_retries_exhausted(&self, retries: u32) -> bool {
        self.config.confirmation.enabled && retries >= self.config.confirmation.max_retries
    }
}
