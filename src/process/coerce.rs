// src/process/coerce.rs

use csv::StringRecord;
use duckdb::{types::ToSqlOutput, ToSql};

use crate::report::RowRejection;
use crate::schema::{Field, FIELDS, FIELD_COUNT, ROUND_COLUMN, VALUE_COUNT, YEAR_COLUMN};

/// Rank cell meaning "no separate rank for this category".
pub const GENDER_NEUTRAL: &str = "Gender-Neutral";

/// Stored in place of a `Gender-Neutral` rank.
pub const GENDER_NEUTRAL_RANK: f64 = -1.0;

/// One coerced value, bound positionally into the insert statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Text(String),
    Rank(Option<f64>),
    Int(i32),
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> duckdb::Result<ToSqlOutput<'_>> {
        match self {
            SqlValue::Text(s) => s.to_sql(),
            SqlValue::Rank(r) => r.to_sql(),
            SqlValue::Int(i) => i.to_sql(),
        }
    }
}

/// Rank cell policy: sentinel → -1, empty → null, anything else must be a number.
pub fn coerce_rank(field: &Field, cell: &str) -> Result<Option<f64>, RowRejection> {
    let v = cell.trim();
    if v == GENDER_NEUTRAL {
        return Ok(Some(GENDER_NEUTRAL_RANK));
    }
    if v.is_empty() {
        return Ok(None);
    }
    v.parse::<f64>()
        .map(Some)
        .map_err(|_| RowRejection::InvalidRank {
            field: field.ident,
            value: v.to_string(),
        })
}

fn column_name(idx: usize) -> &'static str {
    match idx {
        i if i < FIELD_COUNT => FIELDS[i].ident,
        i if i == FIELD_COUNT => YEAR_COLUMN,
        _ => ROUND_COLUMN,
    }
}

/// Turn one parsed data row into the values for a single insert.
///
/// Fields are taken by position; extra trailing cells are ignored.
pub fn coerce_row(
    record: &StringRecord,
    year: i32,
    round: i32,
) -> Result<Vec<SqlValue>, RowRejection> {
    if record.len() < FIELD_COUNT {
        return Err(RowRejection::Malformed {
            fields: record.len(),
        });
    }
    if record.iter().take(FIELD_COUNT).all(|c| c.trim().is_empty()) {
        return Err(RowRejection::Blank);
    }

    let mut values = Vec::with_capacity(VALUE_COUNT);
    for (field, cell) in FIELDS.iter().zip(record.iter()) {
        let value = if field.is_rank() {
            SqlValue::Rank(coerce_rank(field, cell)?)
        } else {
            SqlValue::Text(cell.trim().to_string())
        };
        values.push(value);
    }
    values.push(SqlValue::Int(year));
    values.push(SqlValue::Int(round));

    if let Some(idx) = values
        .iter()
        .position(|v| matches!(v, SqlValue::Text(s) if s == " "))
    {
        return Err(RowRejection::WhitespaceValue {
            column: column_name(idx),
        });
    }

    if values.len() != VALUE_COUNT {
        return Err(RowRejection::ColumnCount {
            expected: VALUE_COUNT,
            got: values.len(),
        });
    }

    Ok(values)
}
