//! Identifier newtypes.
//!
//! All identifiers are database-assigned integers. Each wraps an `i64` so a
//! service id can never be passed where a dependency id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! integer_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Create an identifier from its raw value.
            pub fn new(raw: i64) -> Self {
                Self(raw)
            }

            /// Get the raw integer value.
            pub fn get(&self) -> i64 {
                self.0
            }

            /// Whether this is a usable (positive) identifier.
            pub fn is_valid(&self) -> bool {
                self.0 > 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

integer_id!(
    /// Project that owns a service graph.
    ProjectId
);
integer_id!(
    /// Service (graph node) identifier.
    ServiceId
);
integer_id!(
    /// Dependency (graph edge) identifier.
    DependencyId
);
integer_id!(
    /// Snapshot identifier.
    SnapshotId
);
integer_id!(
    /// Acting user identity, resolved by the caller.
    UserId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&ServiceId::new(42)).unwrap();
        assert_eq!(json, "42");

        let parsed: DependencyId = serde_json::from_str("7").unwrap();
        assert_eq!(parsed, DependencyId(7));
    }

    #[test]
    fn test_zero_is_not_valid() {
        assert!(!ServiceId::default().is_valid());
        assert!(ServiceId::new(1).is_valid());
    }
}
