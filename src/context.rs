//! `RuntimeContext` — the injected runtime every graph node, command handler,
//! and pattern handler reads through (spec §2, §4.3 "execute(command, state,
//! runtime)"). Assembled once at startup from configuration and the
//! action/validator/handler modules, then frozen (spec §9 "Global state").

use crate::config::RuntimeConfig;
use crate::flow::definition::FlowDefinitionRegistry;
use crate::flow::manager::FlowManager;
use crate::flow::step::FlowStepManager;
use crate::nlu::NluAdapter;
use crate::patterns::ConversationPatterns;
use crate::registry::{ActionRegistry, HandlerRegistry, NormalizerRegistry, ScopeManager, ValidatorRegistry};
use std::sync::Arc;

pub struct RuntimeContext {
    pub config: RuntimeConfig,
    pub flow_manager: FlowManager,
    pub flow_step_manager: FlowStepManager,
    pub flow_defs: FlowDefinitionRegistry,
    pub action_registry: ActionRegistry,
    pub validator_registry: ValidatorRegistry,
    pub normalizer_registry: NormalizerRegistry,
    pub scope_manager: ScopeManager,
    pub handler_registry: HandlerRegistry,
    pub patterns: ConversationPatterns,
    pub nlu_adapter: Arc<dyn NluAdapter>,
}

impl std::fmt::Debug for RuntimeContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

pub struct RuntimeContextBuilder {
    config: RuntimeConfig,
    action_registry: ActionRegistry,
    validator_registry: ValidatorRegistry,
    normalizer_registry: NormalizerRegistry,
    scope_manager: ScopeManager,
    flow_defs: FlowDefinitionRegistry,
    handler_registry: Option<HandlerRegistry>,
    nlu_adapter: Option<Arc<dyn NluAdapter>>,
}

impl RuntimeContextBuilder {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            action_registry: ActionRegistry::new(),
            validator_registry: ValidatorRegistry::new(),
            normalizer_registry: NormalizerRegistry::new(),
            scope_manager: ScopeManager::new(),
            flow_defs: FlowDefinitionRegistry::new(),
            handler_registry: None,
            nlu_adapter: None,
        }
    }

    pub fn action_registry(mut self, registry: ActionRegistry) -> Self {
        self.action_registry = registry;
        self
    }

    pub fn validator_registry(mut self, registry: ValidatorRegistry) -> Self {
        self.validator_registry = registry;
        self
    }

    pub fn normalizer_registry(mut self, registry: NormalizerRegistry) -> Self {
        self.normalizer_registry = registry;
        self
    }

    pub fn scope_manager(mut self, scope: ScopeManager) -> Self {
        self.scope_manager = scope;
        self
    }

    pub fn flow_defs(mut self, defs: FlowDefinitionRegistry) -> Self {
        self.flow_defs = defs;
        self
    }

    pub fn nlu_adapter(mut self, adapter: Arc<dyn NluAdapter>) -> Self {
        self.nlu_adapter = Some(adapter);
        self
    }

    pub fn build(self) -> Result<RuntimeContext, crate::error::Error> {
        let nlu_adapter = self
            .nlu_adapter
            .ok_or_else(|| crate::error::Error::configuration("no NLU adapter registered"))?;

        let flow_manager = FlowManager::new(
            self.config.flow_management.clone(),
            self.config.memory_management.clone(),
        );
        let flow_step_manager = FlowStepManager::new();
        let patterns = ConversationPatterns::new(self.config.conversation_patterns.clone());
        let handler_registry = self.handler_registry.unwrap_or_else(crate::command::handlers::default_handler_registry);
        let action_registry = self.action_registry.with_timeout(self.config.session.action_timeout);

        Ok(RuntimeContext {
            config: self.config,
            flow_manager,
            flow_step_manager,
            flow_defs: self.flow_defs,
            action_registry,
            validator_registry: self.validator_registry,
            normalizer_registry: self.normalizer_registry,
            scope_manager: self.scope_manager,
            handler_registry,
            patterns,
            nlu_adapter,
        })
    }
}
