//! Layered runtime configuration.
//!
//! Every level is independently `#[serde(default)]`, following the teacher's
//! nested-config-struct idiom, so a config file only needs to override the
//! options it cares about. This is the closed option set of spec §6.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration document, e.g. loaded from a TOML file at the path
/// given to `run --config <path>`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub flow_management: FlowManagementConfig,
    #[serde(default)]
    pub memory_management: MemoryManagementConfig,
    #[serde(default)]
    pub conversation_patterns: ConversationPatternsConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Checkpoint backend connection string. Overridden by `SESSION_STORE_URL`.
    #[serde(default = "default_checkpoint_backend")]
    pub checkpoint_backend: String,
}

fn default_checkpoint_backend() -> String {
    "memory://".to_string()
}

impl RuntimeConfig {
    /// Apply the environment variable overrides named in spec §6.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("SESSION_STORE_URL") {
            self.checkpoint_backend = url;
        }
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.observability.log_level = level;
        }
    }
}

/// `on_limit_reached` policy for `FlowManager::push_flow` (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnLimitReached {
    #[default]
    CancelOldest,
    RejectNew,
    AskUser,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowManagementConfig {
    pub max_stack_depth: usize,
    pub on_limit_reached: OnLimitReached,
    #[serde(with = "humantime_serde")]
    pub abandon_timeout: Duration,
}

impl Default for FlowManagementConfig {
    fn default() -> Self {
        Self {
            max_stack_depth: 3,
            on_limit_reached: OnLimitReached::CancelOldest,
            abandon_timeout: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryManagementConfig {
    pub max_history_messages: usize,
    pub max_trace_events: usize,
    pub archive_completed_flows_after: usize,
    pub max_command_log: usize,
}

impl Default for MemoryManagementConfig {
    fn default() -> Self {
        Self {
            max_history_messages: 50,
            max_trace_events: 100,
            archive_completed_flows_after: 10,
            max_command_log: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionConfig {
    pub enabled: bool,
    pub revalidate_dependents: bool,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            revalidate_dependents: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationConfig {
    pub enabled: bool,
    pub max_depth: u32,
    pub fallback: String,
}

impl Default for ClarificationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_depth: 3,
            fallback: "human_handoff".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancellationConfig {
    pub enabled: bool,
    pub confirm_before_cancel: bool,
}

impl Default for CancellationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            confirm_before_cancel: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HumanHandoffConfig {
    pub enabled: bool,
    pub trigger_conditions: Vec<String>,
    pub action: String,
}

impl Default for HumanHandoffConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_conditions: vec![
                "clarification_depth > 3".to_string(),
                "validation_failures > 5".to_string(),
                "explicit_request".to_string(),
            ],
            action: "handoff_to_agent".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OnMaxRetries {
    #[default]
    Cancel,
    HumanHandoff,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationConfig {
    pub enabled: bool,
    pub max_retries: u32,
    pub on_max_retries: OnMaxRetries,
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            on_max_retries: OnMaxRetries::Cancel,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConversationPatternsConfig {
    #[serde(default)]
    pub correction: CorrectionConfig,
    #[serde(default)]
    pub clarification: ClarificationConfig,
    #[serde(default)]
    pub cancellation: CancellationConfig,
    #[serde(default)]
    pub human_handoff: HumanHandoffConfig,
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(with = "humantime_serde")]
    pub message_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub action_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            message_timeout: Duration::from_secs(30),
            action_timeout: Duration::from_secs(10),
        }
    }
}

/// Observability configuration, following the teacher's `types::config::ObservabilityConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
