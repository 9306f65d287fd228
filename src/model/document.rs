//! Normalized CSDL JSON document

use serde_json::{Map, Value};

use crate::edm::names::split_qualified;

/// The converted document
///
/// Root members are `$Version`, `$EntityContainer`, `$Reference` and one object per
/// schema, keyed by namespace.
#[derive(Debug, Clone, PartialEq)]
pub struct CsdlDocument {
    root: Map<String, Value>,
}

impl Default for CsdlDocument {
    fn default() -> Self {
        let mut root = Map::new();
        root.insert("$Version".to_string(), Value::String("4.0".to_string()));
        Self { root }
    }
}

impl CsdlDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(root: Map<String, Value>) -> Self {
        Self { root }
    }

    pub fn version(&self) -> Option<&str> {
        self.root.get("$Version").and_then(Value::as_str)
    }

    /// Qualified name of the entity container, if the document has one.
    pub fn entity_container(&self) -> Option<&str> {
        self.root.get("$EntityContainer").and_then(Value::as_str)
    }

    pub fn references(&self) -> Option<&Map<String, Value>> {
        self.root.get("$Reference").and_then(Value::as_object)
    }

    /// Schema by namespace or by its alias.
    pub fn schema(&self, namespace: &str) -> Option<&Map<String, Value>> {
        if let Some(schema) = self
            .root
            .get(namespace)
            .filter(|_| !is_reserved(namespace))
            .and_then(Value::as_object)
        {
            return Some(schema);
        }
        self.schemas()
            .find(|(_, schema)| schema.get("$Alias").and_then(Value::as_str) == Some(namespace))
            .map(|(_, schema)| schema)
    }

    /// All schemas in document order.
    pub fn schemas(&self) -> impl Iterator<Item = (&str, &Map<String, Value>)> {
        self.root
            .iter()
            .filter(|(key, _)| !is_reserved(key))
            .filter_map(|(key, value)| value.as_object().map(|schema| (key.as_str(), schema)))
    }

    /// Schema member by qualified name; the namespace part may be an alias.
    pub fn lookup(&self, qualified_name: &str) -> Option<&Value> {
        let (namespace, name) = split_qualified(qualified_name)?;
        if is_reserved(name) {
            return None;
        }
        self.schema(namespace)?.get(name)
    }

    /// Member of a structured type, enumeration or container.
    pub fn member(&self, qualified_name: &str, member: &str) -> Option<&Value> {
        if is_reserved(member) {
            return None;
        }
        self.lookup(qualified_name)?.as_object()?.get(member)
    }

    /// Named members of an element, without `$` keywords and annotations.
    pub fn members(&self, qualified_name: &str) -> Vec<(&str, &Value)> {
        self.lookup(qualified_name)
            .and_then(Value::as_object)
            .map(|object| {
                object
                    .iter()
                    .filter(|(key, _)| !is_reserved(key) && !key.contains('@'))
                    .map(|(key, value)| (key.as_str(), value))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn as_json(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn into_json(self) -> Value {
        Value::Object(self.root)
    }

    pub fn to_json_string(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(&self.root)
        } else {
            serde_json::to_string(&self.root)
        }
    }
}

/// `$`-keywords and `@`-annotations are never names of model elements.
fn is_reserved(key: &str) -> bool {
    key.starts_with('$') || key.starts_with('@')
}
