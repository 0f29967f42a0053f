//! Application error types.
//!
//! All errors use `thiserror` for automatic `Error` trait derivation. Variants
//! mirror the error kind taxonomy of the dialogue runtime one-to-one; none of
//! them reference a wire transport.

use thiserror::Error;

/// Application result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Subtypes of `Error::Action`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionErrorKind {
    #[error("action not found: {0}")]
    NotFound(String),
    #[error("bad inputs: {0}")]
    BadInputs(String),
    #[error("timed out")]
    Timeout,
    #[error("unavailable: {0}")]
    Unavailable(String),
    #[error("internal: {0}")]
    Internal(String),
}

/// Main error enum for the dialogue runtime.
#[derive(Error, Debug)]
pub enum Error {
    /// Unresolvable flow/action/validator references; fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Slot value rejected; recovered by re-prompt in the same session.
    #[error("validation error: {0}")]
    Validation(String),

    /// Action dispatch failed.
    #[error("action error: {0}")]
    Action(#[from] ActionErrorKind),

    /// An invariant in §3 was violated; fatal within a session.
    #[error("state invariant violation: {0}")]
    StateInvariantViolation(String),

    /// `flow_stack` would exceed `max_stack_depth`.
    #[error("stack depth exceeded: {0}")]
    StackDepthExceeded(String),

    /// Concurrent message on the same session id.
    #[error("session busy: {0}")]
    SessionBusy(String),

    /// Pruning failed to shrink state below the configured size budget.
    #[error("state too large: {0}")]
    StateTooLarge(String),

    /// The NLU adapter failed or returned something unusable.
    #[error("nlu adapter error: {0}")]
    NluAdapter(String),

    /// No active flow when one was required (e.g. `get_slot`/`set_slot`).
    #[error("no active flow: {0}")]
    NoActiveFlow(String),

    /// Requested checkpoint/session was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization errors.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// Convenience constructors, mirroring the teacher's `Error::validation(..)` idiom.
impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn action_not_found(msg: impl Into<String>) -> Self {
        Self::Action(ActionErrorKind::NotFound(msg.into()))
    }

    pub fn action_bad_inputs(msg: impl Into<String>) -> Self {
        Self::Action(ActionErrorKind::BadInputs(msg.into()))
    }

    pub fn action_timeout() -> Self {
        Self::Action(ActionErrorKind::Timeout)
    }

    pub fn action_unavailable(msg: impl Into<String>) -> Self {
        Self::Action(ActionErrorKind::Unavailable(msg.into()))
    }

    pub fn action_internal(msg: impl Into<String>) -> Self {
        Self::Action(ActionErrorKind::Internal(msg.into()))
    }

    pub fn state_invariant_violation(msg: impl Into<String>) -> Self {
        Self::StateInvariantViolation(msg.into())
    }

    pub fn stack_depth_exceeded(msg: impl Into<String>) -> Self {
        Self::StackDepthExceeded(msg.into())
    }

    pub fn session_busy(msg: impl Into<String>) -> Self {
        Self::SessionBusy(msg.into())
    }

    pub fn state_too_large(msg: impl Into<String>) -> Self {
        Self::StateTooLarge(msg.into())
    }

    pub fn nlu_adapter(msg: impl Into<String>) -> Self {
        Self::NluAdapter(msg.into())
    }

    pub fn no_active_flow(msg: impl Into<String>) -> Self {
        Self::NoActiveFlow(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// The error kind tag recorded in `trace` (`{event: error, kind, where}`).
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Error::Configuration(_) => "configuration",
            Error::Validation(_) => "validation",
            Error::Action(_) => "action",
            Error::StateInvariantViolation(_) => "state_invariant_violation",
            Error::StackDepthExceeded(_) => "stack_depth_exceeded",
            Error::SessionBusy(_) => "session_busy",
            Error::StateTooLarge(_) => "state_too_large",
            Error::NluAdapter(_) => "nlu_adapter",
            Error::NoActiveFlow(_) => "no_active_flow",
            Error::NotFound(_) => "not_found",
            Error::Serialization(_) => "serialization",
            Error::Io(_) => "io",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_error_kind_tag() {
        let err = Error::action_timeout();
        assert_eq!(err.kind_tag(), "action");
    }

    #[test]
    fn constructors_wrap_messages() {
        let err = Error::validation("bad date");
        assert_eq!(err.to_string(), "validation error: bad date");
    }
}
