use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::document::Value;
use crate::error::TypeError;

/// Identifier of a persisted document (UUID v7 for time-ordering).
///
/// Stencil never interprets the identifier beyond equality and display; it is
/// handed back to the persistence backend for lookups and removal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(uuid::Uuid);

impl DocumentId {
    /// Generate a new time-ordered identifier.
    pub fn new() -> Self {
        Self(uuid::Uuid::now_v7())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Short representation (first 8 characters of the UUID).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }

    /// The identifier as a JSON string value, for embedding in documents.
    pub fn to_value(&self) -> Value {
        Value::String(self.0.to_string())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({})", self.short_id())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DocumentId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidId(format!("{s}: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn new_ids_are_unique() {
        let a = DocumentId::new();
        let b = DocumentId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn ids_are_time_ordered() {
        let first = DocumentId::new();
        let second = DocumentId::new();
        assert!(first < second);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<DocumentId>().unwrap_err();
        assert!(matches!(err, TypeError::InvalidId(_)));
    }

    #[test]
    fn to_value_is_display_string() {
        let id = DocumentId::new();
        assert_eq!(id.to_value(), Value::String(id.to_string()));
    }

    #[test]
    fn debug_uses_short_form() {
        let id = DocumentId::new();
        let debug = format!("{id:?}");
        assert!(debug.starts_with("DocumentId("));
        assert_eq!(debug.len(), "DocumentId()".len() + 8);
    }

    proptest! {
        #[test]
        fn display_parse_roundtrip(bytes in any::<[u8; 16]>()) {
            let id = DocumentId::from_uuid(uuid::Uuid::from_bytes(bytes));
            let parsed: DocumentId = id.to_string().parse().unwrap();
            prop_assert_eq!(parsed, id);
        }
    }
}
