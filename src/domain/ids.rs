//! Type-safe identifiers for the domain.
//!
//! Allocation sources, users, and instances are all named by externally
//! assigned string identifiers. Each gets a newtype wrapper so the three
//! cannot be confused with each other or with arbitrary strings.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier of an allocation source.
///
/// Assigned by the allocation authority (or the event producer), not by
/// this service. Used as the dictionary key in the snapshot store, the
/// event log entity discriminator, and the WebSocket subscription target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

/// Username of a registered user, unique service-wide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

/// Provider-assigned identifier of a virtual-machine instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            /// Wraps an externally assigned identifier.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the wrapper and returns the inner [`String`].
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
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

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(SourceId);
string_id!(Username);
string_id!(InstanceId);

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_inner() {
        let id = SourceId::new("37623");
        assert_eq!(format!("{id}"), "37623");
        assert_eq!(id.as_str(), "37623");
    }

    #[test]
    fn serde_is_transparent() {
        let id = SourceId::new("37623");
        let json = serde_json::to_string(&id).unwrap_or_default();
        assert_eq!(json, "\"37623\"");
        let back: Option<SourceId> = serde_json::from_str(&json).ok();
        assert_eq!(back, Some(id));
    }

    #[test]
    fn hash_works_in_hashmap() {
        use std::collections::HashMap;
        let id = Username::new("sgregory");
        let mut map = HashMap::new();
        map.insert(id.clone(), "test");
        assert_eq!(map.get(&id), Some(&"test"));
    }

    #[test]
    fn ids_of_different_kinds_are_distinct_types() {
        // Compile-time property; exercised by constructing both from the
        // same text and comparing within each type only.
        let source = SourceId::new("abc");
        let instance = InstanceId::new("abc");
        assert_eq!(source.as_str(), instance.as_str());
    }

    #[test]
    fn ordering_is_lexicographic() {
        let a = Username::new("alice");
        let b = Username::new("bob");
        assert!(a < b);
    }
}
