use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::CoreError;

/// A snapshot of one row, keyed by camelCase field name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowImage(Map<String, Value>);

impl RowImage {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Build an image from any serializable row; it must serialize to an object.
    pub fn from_row<T: Serialize>(row: &T) -> Result<Self, CoreError> {
        match serde_json::to_value(row).map_err(|e| CoreError::Serialization(e.to_string()))? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(CoreError::InvalidData(format!(
                "row image must be an object, got {other}"
            ))),
        }
    }

    pub fn to_row<T: DeserializeOwned>(&self) -> Result<T, CoreError> {
        serde_json::from_value(Value::Object(self.0.clone()))
            .map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn id(&self) -> Option<&str> {
        self.get_str("id")
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(field.into(), value.into())
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(field, value);
        self
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for RowImage {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
