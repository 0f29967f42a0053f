//! Strongly-typed identifiers.
//!
//! All IDs are validated at construction time and implement common traits.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro to define a strongly-typed ID newtype wrapper.
///
/// Generates: struct, `from_string()`, `as_str()`, Display, Serialize, Deserialize.
/// Optionally generates `new()` (UUID v4) and `Default` if `uuid` flag is passed.
macro_rules! define_id {
    ($name:ident, uuid) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn from_string(s: String) -> Result<Self, &'static str> {
                if s.is_empty() {
                    return Err(concat!(stringify!($name), " cannot be empty"));
                }
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            pub fn from_string(s: String) -> Result<Self, &'static str> {
                if s.is_empty() {
                    return Err(concat!(stringify!($name), " cannot be empty"));
                }
                Ok(Self(s))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(SessionId, uuid);
define_id!(FlowId, uuid);
define_id!(CheckpointId, uuid);

/// A flow instance id is not a random UUID but `<flow_name>_<short-rand>` per
/// §4.1; this helper builds one while keeping the `FlowId` newtype.
pub fn new_flow_id(flow_name: &str) -> FlowId {
    let short = uuid::Uuid::new_v4().simple().to_string();
    let short = &short[..8];
    FlowId::from_string(format!("{flow_name}_{short}")).unwrap_or_else(|_| FlowId::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_roundtrip() {
        let id = SessionId::new();
        let s = id.as_str().to_string();
        let parsed = SessionId::from_string(s.clone()).unwrap();
        assert_eq!(parsed.as_str(), s);
    }

    #[test]
    fn from_string_rejects_empty() {
        assert!(SessionId::from_string(String::new()).is_err());
    }

    #[test]
    fn flow_id_carries_flow_name_prefix() {
        let id = new_flow_id("book_flight");
        assert!(id.as_str().starts_with("book_flight_"));
    }
}
