/// Registry of in-memory databases with an explicit current selection
use crate::error::{Result, SproutError};
use crate::storage::Database;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// Database registry
///
/// Databases are kept in creation order. The current database is tracked
/// explicitly; until something is selected it resolves to the first
/// database created.
pub struct Registry {
    databases: RwLock<IndexMap<String, Arc<Database>>>,
    current: RwLock<Option<String>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            databases: RwLock::new(IndexMap::new()),
            current: RwLock::new(None),
        }
    }

    /// Create a database; it becomes current when nothing is selected yet
    pub fn create_database(&self, name: &str) -> Result<Arc<Database>> {
        let mut databases = self.databases.write();
        if databases.contains_key(name) {
            return Err(SproutError::DatabaseExists(name.to_string()));
        }

        let database = Arc::new(Database::new(name));
        databases.insert(name.to_string(), Arc::clone(&database));

        let mut current = self.current.write();
        if current.is_none() {
            *current = Some(name.to_string());
        }

        info!(database = name, "database created");
        Ok(database)
    }

    /// Select the database later statements run against
    pub fn use_database(&self, name: &str) -> Result<()> {
        if !self.databases.read().contains_key(name) {
            return Err(SproutError::DatabaseNotFound(name.to_string()));
        }
        *self.current.write() = Some(name.to_string());
        Ok(())
    }

    pub fn current_database(&self) -> Option<Arc<Database>> {
        let databases = self.databases.read();
        let current = self.current.read();
        current
            .as_ref()
            .and_then(|name| databases.get(name))
            .or_else(|| databases.values().next())
            .cloned()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Database>> {
        self.databases.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.databases.read().contains_key(name)
    }

    pub fn list_databases(&self) -> Vec<String> {
        self.databases.read().keys().cloned().collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
