//! Row representation: an identity plus insertion-ordered named fields

use super::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub type Fields = IndexMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Row identity, a number or a string
    pub id: Value,
    pub fields: Fields,
}

impl Row {
    pub fn new(id: impl Into<Value>) -> Self {
        Self {
            id: id.into(),
            fields: Fields::new(),
        }
    }

    pub fn with_fields(id: impl Into<Value>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    /// Builder form of [`Row::insert`]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value.into());
        self
    }

    /// Object view including the id, used when rendering results
    pub fn to_value(&self) -> Value {
        let mut map = IndexMap::with_capacity(self.fields.len() + 1);
        map.insert("id".to_string(), self.id.clone());
        for (k, v) in &self.fields {
            if k != "id" {
                map.insert(k.clone(), v.clone());
            }
        }
        Value::Object(map)
    }
}
