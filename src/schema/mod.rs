pub mod fields;
pub mod sql;
pub mod types;

pub use fields::{
    normalize_identifier, validate_fields, FIELDS, FIELD_COUNT, ROUND_COLUMN, TABLE_NAME,
    VALUE_COUNT, YEAR_COLUMN,
};
pub use sql::{
    expected_columns, verify_statements, CREATE_SEQUENCE_SQL, CREATE_TABLE_SQL, INSERT_SQL,
};
pub use types::{Field, FieldKind};
