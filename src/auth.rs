//! Access token bookkeeping
//!
//! Tokens are generated and tracked in memory. Nothing checks them when
//! statements run.

use crate::error::{Result, SproutError};
use crate::types::Value;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenRecord {
    pub name: String,
    pub token: String,
    pub config: Value,
    pub created: DateTime<Utc>,
    pub enabled: bool,
}

pub struct TokenBook {
    tokens: DashMap<String, TokenRecord>,
    prefix: String,
}

impl TokenBook {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            tokens: DashMap::new(),
            prefix: prefix.into(),
        }
    }

    pub fn create(&self, name: &str, config: Value) -> Result<TokenRecord> {
        use dashmap::mapref::entry::Entry;

        match self.tokens.entry(name.to_string()) {
            Entry::Occupied(_) => Err(SproutError::InvalidArgument(format!(
                "Token '{}' already exists",
                name
            ))),
            Entry::Vacant(slot) => {
                let record = TokenRecord {
                    name: name.to_string(),
                    token: format!("{}{:032x}", self.prefix, rand::random::<u128>()),
                    config,
                    created: Utc::now(),
                    enabled: true,
                };
                slot.insert(record.clone());
                Ok(record)
            }
        }
    }

    /// Remove a token; `false` if it was unknown
    pub fn revoke(&self, name: &str) -> bool {
        self.tokens.remove(name).is_some()
    }

    /// Enable or disable a token; `false` if it was unknown
    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        match self.tokens.get_mut(name) {
            Some(mut record) => {
                record.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<TokenRecord> {
        self.tokens.get(name).map(|r| r.clone())
    }

    /// All tokens, oldest first
    pub fn list(&self) -> Vec<TokenRecord> {
        let mut records: Vec<_> = self.tokens.iter().map(|r| r.value().clone()).collect();
        records.sort_by(|a, b| a.created.cmp(&b.created).then_with(|| a.name.cmp(&b.name)));
        records
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
