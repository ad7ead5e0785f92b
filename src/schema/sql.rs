// src/schema/sql.rs

use anyhow::{anyhow, Result};

use super::fields::{FIELDS, ROUND_COLUMN, VALUE_COUNT, YEAR_COLUMN};

/// Feeds the synthetic `id` column; DuckDB has no AUTOINCREMENT.
pub const CREATE_SEQUENCE_SQL: &str = "CREATE SEQUENCE IF NOT EXISTS josaa_rankings_id_seq START 1;";

pub const CREATE_TABLE_SQL: &str = r#"CREATE TABLE IF NOT EXISTS josaa_rankings (
    "id" BIGINT PRIMARY KEY DEFAULT nextval('josaa_rankings_id_seq'),
    "institute" VARCHAR,
    "academic_program_name" VARCHAR,
    "quota" VARCHAR,
    "seat_type" VARCHAR,
    "gender" VARCHAR,
    "opening_rank" DOUBLE,
    "closing_rank" DOUBLE,
    "year" INTEGER,
    "round" INTEGER
);"#;

pub const INSERT_SQL: &str = r#"INSERT INTO josaa_rankings (
    "institute", "academic_program_name", "quota", "seat_type", "gender",
    "opening_rank", "closing_rank", "year", "round"
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?);"#;

/// Column name → DuckDB type, in table order, as implied by the field declaration.
pub fn expected_columns() -> Vec<(&'static str, &'static str)> {
    let mut cols = Vec::with_capacity(VALUE_COUNT + 1);
    cols.push(("id", "BIGINT"));
    cols.extend(FIELDS.iter().map(|f| (f.ident, f.kind.sql_type())));
    cols.push((YEAR_COLUMN, "INTEGER"));
    cols.push((ROUND_COLUMN, "INTEGER"));
    cols
}

/// Confirm the literal statements above agree with `FIELDS`.
///
/// Runs once at startup, before the store is touched.
pub fn verify_statements() -> Result<()> {
    let mut cursor = 0;
    for (name, ty) in expected_columns() {
        let needle = format!("\"{}\" {}", name, ty);
        match CREATE_TABLE_SQL[cursor..].find(&needle) {
            Some(pos) => cursor += pos + needle.len(),
            None => {
                return Err(anyhow!(
                    "verify_statements: table definition is missing `{}` in position",
                    needle
                ))
            }
        }
    }

    let (head, tail) = INSERT_SQL
        .split_once("VALUES")
        .ok_or_else(|| anyhow!("verify_statements: insert has no VALUES clause"))?;
    let listed: Vec<&str> = head
        .split_once('(')
        .map(|(_, cols)| cols)
        .unwrap_or("")
        .split(',')
        .map(|c| c.trim().trim_end_matches(')').trim().trim_matches('"'))
        .collect();
    let wanted: Vec<&str> = expected_columns()
        .into_iter()
        .skip(1)
        .map(|(name, _)| name)
        .collect();
    if listed != wanted {
        return Err(anyhow!(
            "verify_statements: insert columns {:?} do not match {:?}",
            listed,
            wanted
        ));
    }

    let placeholders = tail.matches('?').count();
    if placeholders != VALUE_COUNT {
        return Err(anyhow!(
            "verify_statements: insert binds {} values, expected {}",
            placeholders,
            VALUE_COUNT
        ));
    }

    Ok(())
}
