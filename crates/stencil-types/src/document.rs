//! Static document representation.

use serde_json::Map;

use crate::error::TypeError;

pub use serde_json::Value;

/// A fully resolved document: an insertion-ordered map of field name to
/// static value. Contains no generators.
pub type Document = Map<String, Value>;

/// Name under which a blueprint's unnamed document is registered.
pub const DEFAULT_DOCUMENT: &str = "default";

/// Field under which persistence backends record a document's identifier.
pub const ID_FIELD: &str = "_id";

/// Short JSON type name, used in diagnostics.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Convert a JSON value into a [`Document`], rejecting non-objects.
pub fn into_document(value: Value) -> Result<Document, TypeError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(TypeError::NotAnObject(type_name(&other))),
    }
}
