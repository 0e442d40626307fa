//! Raw prediction input as supplied by a caller

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Mapping from feature name to a caller-supplied scalar.
///
/// Values stay untyped until they are projected through the feature schema,
/// so a record may carry numbers, numeric strings, or keys the model never
/// looks at.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

/// Outcome of coercing one raw value to a float
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced {
    Number(f64),
    /// Absent or JSON `null`
    Missing,
    Invalid,
}

impl RawRecord {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Add a value, replacing any previous one for the same feature
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Coerce the value for `name` to a finite float
    pub fn coerce(&self, name: &str) -> Coerced {
        match self.0.get(name) {
            None | Some(Value::Null) => Coerced::Missing,
            Some(value) => coerce_value(value)
                .filter(|v| v.is_finite())
                .map(Coerced::Number)
                .unwrap_or(Coerced::Invalid),
        }
    }
}

fn coerce_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

impl From<Map<String, Value>> for RawRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
