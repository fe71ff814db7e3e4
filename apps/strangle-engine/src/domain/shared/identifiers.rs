//! Strongly-typed identifiers.
//!
//! Keep position IDs and broker order IDs from being swapped.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create an identifier from a string.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Generate a fresh UUID v4 identifier.
            #[must_use]
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

define_id!(PositionId, "Unique identifier for a strangle position.");
define_id!(OrderId, "Broker-assigned identifier for an order.");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_position_ids_are_unique() {
        assert_ne!(PositionId::generate(), PositionId::generate());
    }

    #[test]
    fn order_id_serializes_transparently() {
        let id = OrderId::new("ord-123");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"ord-123\"");
        let parsed: OrderId = serde_json::from_str("\"ord-123\"").unwrap();
        assert_eq!(parsed, id);
        assert_eq!(id.to_string(), "ord-123");
    }
}
