// src/schema/fields.rs

use anyhow::{anyhow, Result};
use std::collections::HashSet;
use tracing::debug;

use super::types::Field;

/// Table holding every ingested record.
pub const TABLE_NAME: &str = "josaa_rankings";

/// Column filled from the four-digit year directory.
pub const YEAR_COLUMN: &str = "year";

/// Column filled from the `round<N>` file stem.
pub const ROUND_COLUMN: &str = "round";

/// Declared source fields, in the positional order of every round file.
pub const FIELDS: [Field; 7] = [
    Field::text("Institute", "institute"),
    Field::text("Academic Program Name", "academic_program_name"),
    Field::text("Quota", "quota"),
    Field::text("Seat Type", "seat_type"),
    Field::text("Gender", "gender"),
    Field::rank("Opening Rank", "opening_rank"),
    Field::rank("Closing Rank", "closing_rank"),
];

pub const FIELD_COUNT: usize = FIELDS.len();

/// Values bound per inserted row: every field plus year and round.
pub const VALUE_COUNT: usize = FIELD_COUNT + 2;

/// Lowercase a header label and turn spaces, hyphens and dots into underscores.
pub fn normalize_identifier(label: &str) -> String {
    label
        .trim()
        .trim_start_matches('\u{feff}')
        .to_lowercase()
        .chars()
        .map(|c| match c {
            ' ' | '-' | '.' => '_',
            other => other,
        })
        .collect()
}

/// Check a field declaration before any store work happens:
///  - `ident` must be the normalized `label`
///  - a field is a rank field exactly when its ident mentions "rank"
///  - identifiers are unique and never collide with the derived columns
pub fn validate_fields(fields: &[Field]) -> Result<()> {
    if fields.is_empty() {
        return Err(anyhow!("validate_fields: no fields declared"));
    }

    let mut seen = HashSet::with_capacity(fields.len());
    for field in fields {
        let normalized = normalize_identifier(field.label);
        if normalized != field.ident {
            return Err(anyhow!(
                "validate_fields: `{}` normalizes to `{}`, declared as `{}`",
                field.label,
                normalized,
                field.ident
            ));
        }

        if field.ident.contains("rank") != field.is_rank() {
            return Err(anyhow!(
                "validate_fields: `{}` is declared {:?} but its identifier says otherwise",
                field.ident,
                field.kind
            ));
        }

        if field.ident == "id" || field.ident == YEAR_COLUMN || field.ident == ROUND_COLUMN {
            return Err(anyhow!(
                "validate_fields: `{}` clashes with a derived column",
                field.ident
            ));
        }

        if !seen.insert(field.ident) {
            return Err(anyhow!("validate_fields: duplicate field `{}`", field.ident));
        }
    }

    debug!(fields = fields.len(), "field declaration ok");
    Ok(())
}
