//! `ValidatorRegistry` — named slot validators (spec §6 "Validator contract").

use crate::error::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// `validator(value) → bool | ValidationError` (spec §6). Implementations are
/// plain synchronous predicates; validators never perform I/O.
pub trait Validator: Send + Sync {
    fn name(&self) -> &str;
    fn validate(&self, value: &Value) -> std::result::Result<(), String>;
}

impl std::fmt::Debug for dyn Validator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Validator({})", self.name())
    }
}

#[derive(Debug, Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, Arc<dyn Validator>>,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, validator: Arc<dyn Validator>) {
        self.validators.insert(validator.name().to_string(), validator);
    }

    /// Run panic-isolated validation via `crate::recovery::with_recovery`,
    /// since validators are arbitrary user-supplied callbacks.
    pub fn validate(&self, name: &str, value: &Value) -> Result<()> {
        let validator = match self.validators.get(name) {
            Some(v) => v.clone(),
            None => return Ok(()), // no validator registered: anything passes.
        };
        let value = value.clone();
        crate::recovery::with_recovery(
            move || {
                validator
                    .validate(&value)
                    .map_err(crate::error::Error::validation)
            },
            name,
        )
    }
}
