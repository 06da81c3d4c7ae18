//! Typed entity identifiers.
//!
//! Every collection gets its own newtype so a driver id can never be passed
//! where a bus id is expected. All ids serialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates an id from any string-like value.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Borrows the raw id.
            #[inline]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

entity_id!(
    /// Identifier of a bus document.
    BusId
);
entity_id!(
    /// Identifier of a driver document.
    DriverId
);
entity_id!(
    /// Identifier of a route document, or a human-readable route alias.
    RouteId
);
entity_id!(
    /// Identifier of a student document.
    StudentId
);
entity_id!(
    /// Identifier of a stop within a route.
    StopId
);
entity_id!(
    /// Identifier of a committed (or rolled back) reassignment operation.
    OperationId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display_and_ordering() {
        let a = BusId::new("bus-1");
        let b = BusId::from("bus-2");
        assert_eq!(a.to_string(), "bus-1");
        assert!(a < b);
        assert_eq!(b.as_str(), "bus-2");
    }

    #[test]
    fn test_id_serializes_transparently() {
        let id = DriverId::new("D1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"D1\"");
        let back: DriverId = serde_json::from_str("\"D1\"").unwrap();
        assert_eq!(back, id);
    }
}
