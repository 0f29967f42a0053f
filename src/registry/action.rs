//! `ActionRegistry` — named action handlers with declared I/O schemas (spec §4, §6).

use crate::error::{ActionErrorKind, Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// The action contract of spec §6: `action(inputs: map) → map`, a total
/// function returning either a map or a typed error.
#[async_trait]
pub trait Action: Send + Sync {
    /// Unique action name, matched against a flow step's `call`.
    fn name(&self) -> &str;

    /// JSON Schema the action dispatcher validates `inputs` against before
    /// calling `execute`. `None` means no validation is performed.
    fn input_schema(&self) -> Option<Value> {
        None
    }

    /// JSON Schema the action dispatcher validates the returned map against.
    fn output_schema(&self) -> Option<Value> {
        None
    }

    async fn execute(&self, inputs: HashMap<String, Value>) -> Result<HashMap<String, Value>>;
}

#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
    /// Per-action deadline enforced around `execute` (spec §5/§6). `None`
    /// (the default for a bare `ActionRegistry::new()`) means unbounded,
    /// which `RuntimeContextBuilder` overrides from `session.action_timeout`.
    action_timeout: Option<Duration>,
}

impl std::fmt::Debug for dyn Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Action({})", self.name())
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: Arc<dyn Action>) {
        self.actions.insert(action.name().to_string(), action);
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = Some(timeout);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    /// Dispatch an action call, validating inputs/outputs against their
    /// declared schemas when present.
    pub async fn dispatch(
        &self,
        name: &str,
        inputs: HashMap<String, Value>,
    ) -> Result<HashMap<String, Value>> {
        let action = self
            .get(name)
            .ok_or_else(|| Error::action_not_found(name))?;

        if let Some(schema) = action.input_schema() {
            let value = serde_json::to_value(&inputs)?;
            validate_against_schema(&schema, &value)
                .map_err(|e| Error::Action(ActionErrorKind::BadInputs(e)))?;
        }

        let outputs = match self.action_timeout {
            Some(timeout) => tokio::time::timeout(timeout, action.execute(inputs))
                .await
                .map_err(|_| Error::action_timeout())??,
            None => action.execute(inputs).await?,
        };

        if let Some(schema) = action.output_schema() {
            let value = serde_json::to_value(&outputs)?;
            validate_against_schema(&schema, &value)
                .map_err(|e| Error::Action(ActionErrorKind::Internal(e)))?;
        }

        Ok(outputs)
    }

    pub fn names(&self) -> Vec<&str> {
        self.actions.keys().map(|s| s.as_str()).collect()
    }
}

fn validate_against_schema(schema: &Value, instance: &Value) -> std::result::Result<(), String> {
    let compiled = jsonschema::validator_for(schema).map_err(|e| e.to_string())?;
    let errors: Vec<String> = compiled
        .iter_errors(instance)
        .map(|e| e.to_string())
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Action for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn execute(&self, inputs: HashMap<String, Value>) -> Result<HashMap<String, Value>> {
            Ok(inputs)
        }
    }

    #[tokio::test]
    async fn dispatch_unknown_action_errors() {
        let registry = ActionRegistry::new();
        let err = registry.dispatch("missing", HashMap::new()).await.unwrap_err();
        assert!(matches!(err, Error::Action(ActionErrorKind::NotFound(_))));
    }

    #[tokio::test]
    async fn dispatch_calls_registered_action() {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(Echo));
        let mut inputs = HashMap::new();
        inputs.insert("x".to_string(), Value::from(1));
        let outputs = registry.dispatch("echo", inputs.clone()).await.unwrap();
        assert_eq!(outputs, inputs);
    }

    struct Slow;

    #[async_trait]
    impl Action for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn execute(&self, inputs: HashMap<String, Value>) -> Result<HashMap<String, Value>> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(inputs)
        }
    }

    #[tokio::test]
    async fn dispatch_times_out_slow_actions() {
        let mut registry = ActionRegistry::new().with_timeout(Duration::from_millis(20));
        registry.register(Arc::new(Slow));
        let err = registry.dispatch("slow", HashMap::new()).await.unwrap_err();
        assert!(matches!(err, Error::Action(ActionErrorKind::Timeout)));
    }

    #[tokio::test]
    async fn dispatch_without_timeout_configured_never_times_out() {
        let mut registry = ActionRegistry::new();
        registry.register(Arc::new(Echo));
        assert!(registry.dispatch("echo", HashMap::new()).await.is_ok());
    }
}
