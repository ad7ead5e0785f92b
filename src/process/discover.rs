// src/process/discover.rs

use anyhow::{Context, Result};
use glob::{glob, Pattern};
use once_cell::sync::Lazy;
use regex::Regex;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::trace;

static ROUND_STEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^round(\d+)$").expect("round stem regex should be valid"));

/// What a round file's stem says about its round ordinal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundName {
    Round(i32),
    /// Stem is not `round<digits>`.
    NoMatch,
    /// Stem matched but the digits are not a usable ordinal.
    BadNumber(String),
}

/// Extract the round ordinal from a stem such as `round3` or `ROUND12`.
pub fn parse_round(stem: &str) -> RoundName {
    let digits = match ROUND_STEM.captures(stem).and_then(|c| c.get(1)) {
        Some(m) => m.as_str(),
        None => return RoundName::NoMatch,
    };
    match digits.parse::<i32>() {
        Ok(n) if n >= 1 => RoundName::Round(n),
        _ => RoundName::BadNumber(digits.to_string()),
    }
}

/// A directory name is a year when it is exactly four ASCII digits.
pub fn parse_year(name: &str) -> Option<i32> {
    if name.len() == 4 && name.bytes().all(|b| b.is_ascii_digit()) {
        name.parse().ok()
    } else {
        None
    }
}

/// Direct child directories of `base` named like a year, sorted by year.
/// Anything else under `base` is ignored.
pub fn year_dirs(base: &Path) -> Result<Vec<(i32, PathBuf)>> {
    let entries =
        fs::read_dir(base).with_context(|| format!("reading base directory {}", base.display()))?;

    let mut years = Vec::new();
    for entry in entries.filter_map(Result::ok) {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let year = match path.file_name().and_then(|n| n.to_str()).and_then(parse_year) {
            Some(y) => y,
            None => {
                trace!(path = %path.display(), "not a year directory");
                continue;
            }
        };
        years.push((year, path));
    }
    years.sort();
    Ok(years)
}

/// Files directly inside `dir` ending in `.<extension>`, sorted by path.
pub fn round_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!(
        "{}/*.{}",
        Pattern::escape(&dir.to_string_lossy()),
        Pattern::escape(extension)
    );
    let mut files: Vec<PathBuf> = glob(&pattern)
        .with_context(|| format!("Failed to read glob pattern '{}'", pattern))?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    files.sort();
    Ok(files)
}
