// src/config.rs

use std::path::{Path, PathBuf};

/// Store file created inside the base directory unless overridden.
pub const DEFAULT_DB_FILENAME: &str = "josaa.db";

/// Round files carry this extension.
pub const DEFAULT_EXTENSION: &str = "psv";

/// Field separator; values may contain commas, so `#` is used instead.
pub const DEFAULT_DELIMITER: u8 = b'#';

/// Where to read round files from and where the store lives.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub base_dir: PathBuf,
    pub db_path: PathBuf,
    pub extension: String,
    pub delimiter: u8,
}

impl IngestConfig {
    /// Defaults rooted at `base_dir`, with the store placed inside it.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let db_path = base_dir.join(DEFAULT_DB_FILENAME);
        Self {
            base_dir,
            db_path,
            extension: DEFAULT_EXTENSION.to_string(),
            delimiter: DEFAULT_DELIMITER,
        }
    }

    pub fn with_db_path(mut self, db_path: impl Into<PathBuf>) -> Self {
        self.db_path = db_path.into();
        self
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.extension = extension.trim_start_matches('.').to_string();
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
