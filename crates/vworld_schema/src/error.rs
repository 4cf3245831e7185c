//! # Schema Error Types
//!
//! Every rejection the schema layer can report. All of them are returned
//! synchronously to the caller with the offending record and field named.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while validating or mutating world records.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    /// A field's type, enumerated domain or pattern constraint is violated.
    #[error("schema violation on {record}.{field}: {rule}")]
    SchemaViolation {
        /// Record type being validated (e.g. `accessor`, `metadata`, `presence`).
        record: &'static str,
        /// Dotted path of the offending field.
        field: String,
        /// The rule that was broken.
        rule: String,
    },

    /// A reference points to a missing or cross-world entity, or forms a cycle.
    #[error("referential violation on {record}.{field}: {reason}")]
    ReferentialViolation {
        /// Record type being validated.
        record: &'static str,
        /// Dotted path of the offending field.
        field: String,
        /// Why the reference is rejected.
        reason: String,
    },

    /// An update tried to change an identity field.
    #[error("immutable field {field} of record {record} cannot change")]
    ImmutableFieldViolation {
        /// Record whose identity was touched.
        record: Uuid,
        /// The immutable field.
        field: &'static str,
    },

    /// The caller's expected version is stale.
    #[error("concurrent modification of {record}: expected version {expected}, found {actual}")]
    ConcurrentModification {
        /// Record being updated.
        record: Uuid,
        /// Version the caller based its change on.
        expected: DateTime<Utc>,
        /// Version currently held.
        actual: DateTime<Utc>,
    },

    /// A mutation name outside the taxonomy.
    #[error("unknown mutation operation: {0}")]
    UnknownOperation(String),

    /// The storage collaborator holds no record with this id.
    #[error("no record {uuid} in {table}")]
    NotFound {
        /// Table that was searched.
        table: &'static str,
        /// The missing id.
        uuid: Uuid,
    },
}

impl SchemaError {
    /// Builds a `SchemaViolation`.
    pub fn schema(record: &'static str, field: impl Into<String>, rule: impl Into<String>) -> Self {
        Self::SchemaViolation {
            record,
            field: field.into(),
            rule: rule.into(),
        }
    }

    /// Builds a `ReferentialViolation`.
    pub fn referential(
        record: &'static str,
        field: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::ReferentialViolation {
            record,
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// The offending field, when the error names one.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::SchemaViolation { field, .. } | Self::ReferentialViolation { field, .. } => {
                Some(field)
            }
            Self::ImmutableFieldViolation { field, .. } => Some(field),
            Self::ConcurrentModification { .. } => Some("updatedAt"),
            Self::UnknownOperation(_) | Self::NotFound { .. } => None,
        }
    }

    /// True for `SchemaViolation`.
    #[must_use]
    pub const fn is_schema_violation(&self) -> bool {
        matches!(self, Self::SchemaViolation { .. })
    }

    /// True for `ReferentialViolation`.
    #[must_use]
    pub const fn is_referential_violation(&self) -> bool {
        matches!(self, Self::ReferentialViolation { .. })
    }
}

/// Result type for schema operations.
pub type SchemaResult<T> = Result<T, SchemaError>;
