//! Engine configuration and per-statement execution context

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Engine-wide configuration
///
/// ```
/// use sproutdb::EngineConfig;
///
/// let config = EngineConfig::from_json_str(r#"{ "default_database": "app" }"#).unwrap();
/// assert_eq!(config.default_database.as_deref(), Some("app"));
/// assert_eq!(config.commit_id_len, 12);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Database created and selected when the engine starts
    pub default_database: Option<String>,

    /// Default soft cap on rows fetched by a query's base scan
    pub max_rows: Option<usize>,

    /// Prefix of generated access tokens
    pub token_prefix: String,

    /// Number of hex characters in a commit id
    pub commit_id_len: usize,

    /// Branch statements run against when the context names none
    pub default_branch: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_database: None,
            max_rows: None,
            token_prefix: "pat_".to_string(),
            commit_id_len: 12,
            default_branch: "main".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    /// Context carrying this config's defaults
    pub fn context(&self) -> ExecutionContext {
        ExecutionContext {
            branch: self.default_branch.clone(),
            max_rows: self.max_rows,
            ..ExecutionContext::default()
        }
    }
}

/// Per-statement execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionContext {
    /// Caller identity, used for logging only
    pub user: Option<String>,

    /// Branch the statement targets, used for logging only
    pub branch: String,

    /// Validate and describe mutations without applying them
    pub dry_run: bool,

    /// Soft cap on rows fetched by the base scan; joins and grouping are
    /// not limited
    pub max_rows: Option<usize>,

    /// Accepted for API compatibility; statements always run to completion
    pub timeout: Option<Duration>,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            user: None,
            branch: "main".to_string(),
            dry_run: false,
            max_rows: None,
            timeout: None,
        }
    }
}

impl ExecutionContext {
    pub fn dry_run() -> Self {
        Self {
            dry_run: true,
            ..Self::default()
        }
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.token_prefix, "pat_");
        assert_eq!(config.commit_id_len, 12);
        assert!(config.default_database.is_none());

        let ctx = ExecutionContext::default();
        assert_eq!(ctx.branch, "main");
        assert!(!ctx.dry_run);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "default_database": "testdb", "max_rows": 500 }}"#).unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.default_database.as_deref(), Some("testdb"));
        assert_eq!(config.max_rows, Some(500));
        assert_eq!(config.context().max_rows, Some(500));
    }

    #[test]
    fn test_invalid_json_is_serialization_error() {
        let err = EngineConfig::from_json_str("{ nope").unwrap_err();
        assert!(matches!(err, crate::error::SproutError::Serialization(_)));
    }
}
