// src/report.rs

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::path::PathBuf;
use thiserror::Error;

use crate::schema::FIELD_COUNT;

/// Why a single data row was left out of the store.
#[derive(Debug, Error, Serialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RowRejection {
    #[error("row has {fields} fields, expected at least {}", FIELD_COUNT)]
    Malformed { fields: usize },

    #[error("row has no values in its first {} fields", FIELD_COUNT)]
    Blank,

    #[error("`{field}` value {value:?} is not a number")]
    InvalidRank { field: &'static str, value: String },

    #[error("`{column}` holds only a space")]
    WhitespaceValue { column: &'static str },

    #[error("row produced {got} values, expected {expected}")]
    ColumnCount { expected: usize, got: usize },
}

/// Why a whole round file was skipped or abandoned.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("file not found")]
    NotFound,

    #[error("file has no rows")]
    Empty,

    #[error("header {found:?} does not match declared fields {expected:?}")]
    HeaderMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("reading file: {0}")]
    Read(#[from] std::io::Error),

    #[error("parsing delimited rows: {0}")]
    Csv(#[from] csv::Error),

    #[error("store: {0}")]
    Store(#[from] duckdb::Error),
}

/// A rejected row and its 1-based line number in the source file.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Rejection {
    pub line: usize,
    pub reason: RowRejection,
}

/// Outcome of ingesting one round file.
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub year: i32,
    pub round: i32,
    pub inserted: u64,
    pub skipped: u64,
    pub rejections: Vec<Rejection>,
    #[serde(serialize_with = "display_opt")]
    pub error: Option<FileError>,
}

impl FileReport {
    pub fn new(path: impl Into<PathBuf>, year: i32, round: i32) -> Self {
        Self {
            path: path.into(),
            year,
            round,
            inserted: 0,
            skipped: 0,
            rejections: Vec::new(),
            error: None,
        }
    }

    /// Data rows read from the file (header excluded).
    pub fn data_rows(&self) -> u64 {
        self.inserted + self.skipped
    }

    pub fn reject(&mut self, line: usize, reason: RowRejection) {
        self.skipped += 1;
        self.rejections.push(Rejection { line, reason });
    }

    pub fn is_clean(&self) -> bool {
        self.error.is_none()
    }
}

/// A file found during discovery that never reached parsing.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Everything one ingestion run did, aggregated from per-file reports.
#[derive(Debug, Serialize)]
pub struct IngestSummary {
    pub db_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub years: Vec<i32>,
    pub files: Vec<FileReport>,
    pub skipped_files: Vec<SkippedFile>,
}

impl IngestSummary {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            started_at: Utc::now(),
            finished_at: None,
            years: Vec::new(),
            files: Vec::new(),
            skipped_files: Vec::new(),
        }
    }

    pub fn total_inserted(&self) -> u64 {
        self.files.iter().map(|f| f.inserted).sum()
    }

    pub fn total_skipped(&self) -> u64 {
        self.files.iter().map(|f| f.skipped).sum()
    }

    /// Files that were skipped or abandoned at the file level.
    pub fn failed_files(&self) -> usize {
        self.files.iter().filter(|f| !f.is_clean()).count()
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

fn display_opt<S: Serializer>(err: &Option<FileError>, s: S) -> Result<S::Ok, S::Error> {
    match err {
        Some(e) => s.serialize_some(&e.to_string()),
        None => s.serialize_none(),
    }
}
