//! Store configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default SQLite busy timeout in milliseconds.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Default name of the row identifier column.
pub const DEFAULT_ID_COLUMN: &str = "_id";

/// Default name of the display title column.
pub const DEFAULT_TITLE_COLUMN: &str = "title";

/// Configuration for a [`RelationStore`](crate::store::RelationStore).
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,

    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,

    /// Row identifier column present on every user table.
    pub id_column: String,

    /// Display title column present on every user table.
    pub title_column: String,

    /// Create the field catalog tables when the store is opened.
    pub install_catalog: bool,
}

impl StoreConfig {
    /// Create a configuration for an on-disk database.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::in_memory()
        }
    }

    /// Create a configuration for an in-memory database.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
            id_column: DEFAULT_ID_COLUMN.to_string(),
            title_column: DEFAULT_TITLE_COLUMN.to_string(),
            install_catalog: true,
        }
    }

    /// Set the busy timeout.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Set the row identifier column.
    pub fn with_id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    /// Set the display title column.
    pub fn with_title_column(mut self, column: impl Into<String>) -> Self {
        self.title_column = column.into();
        self
    }

    /// Skip catalog installation (the caller manages the catalog tables).
    pub fn without_catalog(mut self) -> Self {
        self.install_catalog = false;
        self
    }

    /// Database path, if on disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Check if the store is in-memory.
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StoreConfig::default();
        assert!(config.is_in_memory());
        assert_eq!(config.id_column, "_id");
        assert_eq!(config.title_column, "title");
        assert_eq!(
            config.busy_timeout,
            Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS)
        );
        assert!(config.install_catalog);
    }

    #[test]
    fn test_config_builder() {
        let config = StoreConfig::new("/var/lib/linkdb/space.db")
            .with_busy_timeout(Duration::from_secs(1))
            .with_id_column("rowid_")
            .with_title_column("name")
            .without_catalog();

        assert_eq!(config.path(), Some(Path::new("/var/lib/linkdb/space.db")));
        assert_eq!(config.busy_timeout, Duration::from_secs(1));
        assert_eq!(config.id_column, "rowid_");
        assert_eq!(config.title_column, "name");
        assert!(!config.install_catalog);
    }
}
