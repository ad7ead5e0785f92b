// src/schema/types.rs

use serde::Serialize;

/// Semantic type of a declared source field.
#[derive(Debug, Serialize, PartialEq, Clone, Copy, Eq, Hash)]
pub enum FieldKind {
    /// Stored as-is after trimming.
    Text,
    /// Numeric rank with the `Gender-Neutral` sentinel and empty-as-null policy.
    Rank,
}

impl FieldKind {
    /// DuckDB column type for this kind.
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldKind::Text => "VARCHAR",
            FieldKind::Rank => "DOUBLE",
        }
    }
}

/// One declared source attribute: the label printed in the file header, the
/// column identifier it lands in, and how its values are coerced.
#[derive(Debug, Serialize, PartialEq, Clone, Copy, Eq, Hash)]
pub struct Field {
    pub label: &'static str,
    pub ident: &'static str,
    pub kind: FieldKind,
}

impl Field {
    pub const fn text(label: &'static str, ident: &'static str) -> Self {
        Self {
            label,
            ident,
            kind: FieldKind::Text,
        }
    }

    pub const fn rank(label: &'static str, ident: &'static str) -> Self {
        Self {
            label,
            ident,
            kind: FieldKind::Rank,
        }
    }

    pub fn is_rank(&self) -> bool {
        self.kind == FieldKind::Rank
    }
}
