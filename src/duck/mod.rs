use anyhow::{Context, Result};
use duckdb::Connection;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::schema::{
    expected_columns, validate_fields, verify_statements, CREATE_SEQUENCE_SQL, CREATE_TABLE_SQL,
    FIELDS, TABLE_NAME,
};

/// Open a DuckDB database on disk at `path`, creating the file if it doesn't exist.
pub fn open_disk_db<P: AsRef<Path>>(path: P) -> Result<Connection> {
    let path = path.as_ref();
    Connection::open(path).with_context(|| format!("opening store {}", path.display()))
}

/// Open a DuckDB in‐memory database
pub fn open_mem_db() -> Result<Connection> {
    Connection::open_in_memory().context("opening in-memory store")
}

/// Create the id sequence and rankings table if they don't exist.
///
/// An existing table is never dropped or altered; if its columns differ from
/// the declaration the difference is logged and ingestion carries on.
pub fn ensure_table(conn: &Connection) -> Result<()> {
    validate_fields(&FIELDS)?;
    verify_statements()?;

    debug!(sql = CREATE_TABLE_SQL, "creating table if absent");
    conn.execute_batch(&format!("{}\n{}", CREATE_SEQUENCE_SQL, CREATE_TABLE_SQL))
        .with_context(|| format!("creating table {}", TABLE_NAME))?;

    let drift = schema_drift(conn)?;
    if drift.is_empty() {
        info!(table = TABLE_NAME, "store table checked/created");
    } else {
        for d in &drift {
            warn!(table = TABLE_NAME, "schema drift: {}", d);
        }
    }
    Ok(())
}

/// `(column_name, data_type)` for the rankings table, in table order.
pub fn table_columns(conn: &Connection) -> Result<Vec<(String, String)>> {
    let mut stmt = conn.prepare(
        "SELECT column_name, data_type FROM information_schema.columns \
         WHERE table_name = ? ORDER BY ordinal_position;",
    )?;
    let rows = stmt.query_map([TABLE_NAME], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
    })?;
    rows.collect::<Result<Vec<_>, _>>()
        .context("reading table columns")
}

/// Describe every way the stored table differs from the declared one.
pub fn schema_drift(conn: &Connection) -> Result<Vec<String>> {
    let actual = table_columns(conn)?;
    let expected = expected_columns();
    let mut drift = Vec::new();

    if actual.len() != expected.len() {
        drift.push(format!(
            "table has {} columns, declaration has {}",
            actual.len(),
            expected.len()
        ));
    }
    for (i, ((name, ty), (want_name, want_ty))) in actual.iter().zip(&expected).enumerate() {
        if name != want_name || !ty.eq_ignore_ascii_case(want_ty) {
            drift.push(format!(
                "column {} is `{} {}`, declared `{} {}`",
                i, name, ty, want_name, want_ty
            ));
        }
    }
    Ok(drift)
}

pub fn count_rows(conn: &Connection) -> Result<i64> {
    let n = conn.query_row(&format!("SELECT COUNT(*) FROM {};", TABLE_NAME), [], |r| {
        r.get(0)
    })?;
    Ok(n)
}

/// One row read back from the rankings table. Text cells can be NULL when
/// the row was written by something other than this crate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    pub id: i64,
    pub institute: Option<String>,
    pub academic_program_name: Option<String>,
    pub quota: Option<String>,
    pub seat_type: Option<String>,
    pub gender: Option<String>,
    pub opening_rank: Option<f64>,
    pub closing_rank: Option<f64>,
    pub year: i32,
    pub round: i32,
}

/// Bulk read of the whole table in insertion order.
pub fn read_records(conn: &Connection) -> Result<Vec<StoredRecord>> {
    let mut stmt = conn.prepare(&format!(
        r#"SELECT "id", "institute", "academic_program_name", "quota", "seat_type", "gender",
                  "opening_rank", "closing_rank", "year", "round"
           FROM {} ORDER BY "id";"#,
        TABLE_NAME
    ))?;
    let rows = stmt.query_map([], |r| {
        Ok(StoredRecord {
            id: r.get(0)?,
            institute: r.get(1)?,
            academic_program_name: r.get(2)?,
            quota: r.get(3)?,
            seat_type: r.get(4)?,
            gender: r.get(5)?,
            opening_rank: r.get(6)?,
            closing_rank: r.get(7)?,
            year: r.get(8)?,
            round: r.get(9)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>()
        .context("reading stored records")
}

/// Row counts per `(year, round)`, ordered by year then round.
pub fn round_counts(conn: &Connection) -> Result<Vec<(i32, i32, i64)>> {
    let mut stmt = conn.prepare(&format!(
        r#"SELECT "year", "round", COUNT(*) FROM {}
           GROUP BY "year", "round" ORDER BY "year", "round";"#,
        TABLE_NAME
    ))?;
    let rows = stmt.query_map([], |r| {
        Ok((
            r.get::<_, i32>(0)?,
            r.get::<_, i32>(1)?,
            r.get::<_, i64>(2)?,
        ))
    })?;
    rows.collect::<Result<Vec<_>, _>>()
        .context("counting rows per round")
}
