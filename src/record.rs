use serde_json::Value;
use std::collections::HashMap;

/// A single attribute value as returned by the feature service, resolved
/// once at decode time.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Number(f64),
    Bool(bool),
    Null,
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => AttributeValue::Null,
            Value::Bool(b) => AttributeValue::Bool(b),
            Value::Number(n) => match n.as_f64() {
                Some(f) => AttributeValue::Number(f),
                None => AttributeValue::Text(n.to_string()),
            },
            Value::String(s) => AttributeValue::Text(s),
            other => AttributeValue::Text(other.to_string()),
        }
    }
}

/// One foreclosure filing: field name to value. Immutable once decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeRecord(HashMap<String, AttributeValue>);

impl AttributeRecord {
    pub fn get(&self, field: &str) -> Option<&AttributeValue> {
        self.0.get(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<serde_json::Map<String, Value>> for AttributeRecord {
    fn from(attributes: serde_json::Map<String, Value>) -> Self {
        Self(
            attributes
                .into_iter()
                .map(|(field, value)| (field, AttributeValue::from(value)))
                .collect(),
        )
    }
}

impl<K: Into<String>> FromIterator<(K, AttributeValue)> for AttributeRecord {
    fn from_iter<I: IntoIterator<Item = (K, AttributeValue)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}
