//! `Normalizer` — named slot value normalizers (spec §6, slot `normalizer?`).

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub trait Normalizer: Send + Sync {
    fn name(&self) -> &str;
    fn normalize(&self, value: Value) -> Value;
}

impl std::fmt::Debug for dyn Normalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Normalizer({})", self.name())
    }
}

#[derive(Debug, Default)]
pub struct NormalizerRegistry {
    normalizers: HashMap<String, Arc<dyn Normalizer>>,
}

impl NormalizerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, normalizer: Arc<dyn Normalizer>) {
        self.normalizers
            .insert(normalizer.name().to_string(), normalizer);
    }

    /// Identity if no normalizer is registered under `name`.
    pub fn apply(&self, name: &str, value: Value) -> Value {
        match self.normalizers.get(name) {
            Some(n) => n.normalize(value),
            None => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Trim;
    impl Normalizer for Trim {
        fn name(&self) -> &str {
            "trim"
        }
        fn normalize(&self, value: Value) -> Value {
            match value.as_str() {
                Some(s) => Value::from(s.trim().to_string()),
                None => value,
            }
        }
    }

    #[test]
    fn apply_falls_back_to_identity() {
        let registry = NormalizerRegistry::new();
        let v = Value::from("  hi  ");
        assert_eq!(registry.apply("missing", v.clone()), v);
    }

    #[test]
    fn apply_runs_registered_normalizer() {
        let mut registry = NormalizerRegistry::new();
        registry.register(Arc::new(Trim));
        assert_eq!(registry.apply("trim", Value::from("  hi  ")), Value::from("hi"));
    }
}
