//! # Metadata Store
//!
//! Typed key/value attachments on any entity. Each entity kind has its own
//! `<table>_metadata` table with the columns:
//!
//! ```text
//! metadata_id | parent_id | key | values_text[] | values_numeric[]
//!             |           |     | values_boolean[] | values_timestamp[]
//!             |           |     | created_at | updated_at
//! ```
//!
//! Exactly one of the four value columns is populated per row. A parent may
//! hold any number of rows under the same key.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::catalog::{EntityKind, Row};
use crate::error::{SchemaError, SchemaResult};
use crate::fields::{parse_timestamp, Fields};
use crate::identity::{check_version, version_step};

const RECORD: &str = "metadata";

const COLUMNS: [&str; 9] = [
    "metadata_id",
    "parent_id",
    "key",
    "values_text",
    "values_numeric",
    "values_boolean",
    "values_timestamp",
    "created_at",
    "updated_at",
];

crate::closed_label! {
    /// Ordering of records sharing a key.
    pub enum SortOrder {
        /// Oldest first
        Ascending => "ascending",
        /// Newest first
        Descending => "descending",
    }
}

/// The single populated value array of a metadata record.
#[derive(Clone, Debug, PartialEq)]
pub enum MetadataValues {
    /// `values_text`
    Text(Vec<String>),
    /// `values_numeric`
    Numeric(Vec<f64>),
    /// `values_boolean`
    Boolean(Vec<bool>),
    /// `values_timestamp`
    Timestamp(Vec<DateTime<Utc>>),
}

impl MetadataValues {
    /// Column this variant is stored in.
    #[must_use]
    pub const fn column(&self) -> &'static str {
        match self {
            Self::Text(_) => "values_text",
            Self::Numeric(_) => "values_numeric",
            Self::Boolean(_) => "values_boolean",
            Self::Timestamp(_) => "values_timestamp",
        }
    }

    /// Number of values.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(v) => v.len(),
            Self::Numeric(v) => v.len(),
            Self::Boolean(v) => v.len(),
            Self::Timestamp(v) => v.len(),
        }
    }

    /// True when the array holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Builds from the four optional columns.
    ///
    /// # Errors
    ///
    /// `SchemaViolation` unless exactly one column is non-empty.
    pub fn from_columns(
        text: Option<Vec<String>>,
        numeric: Option<Vec<f64>>,
        boolean: Option<Vec<bool>>,
        timestamp: Option<Vec<DateTime<Utc>>>,
    ) -> SchemaResult<Self> {
        let candidates = [
            text.filter(|v| !v.is_empty()).map(Self::Text),
            numeric.filter(|v| !v.is_empty()).map(Self::Numeric),
            boolean.filter(|v| !v.is_empty()).map(Self::Boolean),
            timestamp.filter(|v| !v.is_empty()).map(Self::Timestamp),
        ];
        let mut populated = candidates.into_iter().flatten();
        match (populated.next(), populated.next()) {
            (Some(values), None) => Ok(values),
            (None, _) => Err(SchemaError::schema(
                RECORD,
                "values",
                "exactly one typed array must be non-empty, found none",
            )),
            (Some(first), Some(second)) => Err(SchemaError::schema(
                RECORD,
                "values",
                format!(
                    "exactly one typed array must be non-empty, found {} and {}",
                    first.column(),
                    second.column()
                ),
            )),
        }
    }

    fn check(&self, max_values: usize) -> SchemaResult<()> {
        if self.is_empty() {
            return Err(SchemaError::schema(RECORD, self.column(), "must not be empty"));
        }
        if self.len() > max_values {
            return Err(SchemaError::schema(
                RECORD,
                self.column(),
                format!("holds {} values, limit is {max_values}", self.len()),
            ));
        }
        if let Self::Numeric(values) = self {
            if values.iter().any(|v| !v.is_finite()) {
                return Err(SchemaError::schema(RECORD, self.column(), "must hold finite numbers"));
            }
        }
        Ok(())
    }
}

/// One metadata row.
#[derive(Clone, Debug, PartialEq)]
pub struct MetadataRecord {
    /// Row id
    pub metadata_id: Uuid,
    /// Entity the row is attached to
    pub parent_id: Uuid,
    /// Kind of the parent; selects the table
    pub parent_kind: EntityKind,
    /// Key; not unique per parent
    pub key: String,
    /// The typed values
    pub values: MetadataValues,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last accepted change
    pub updated_at: DateTime<Utc>,
}

/// Wire form of a metadata row.
#[derive(Serialize)]
struct MetadataRow {
    metadata_id: Uuid,
    parent_id: Uuid,
    key: String,
    values_text: Vec<String>,
    values_numeric: Vec<f64>,
    values_boolean: Vec<bool>,
    values_timestamp: Vec<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MetadataRecord {
    /// Builds a new record for `parent_id`.
    ///
    /// # Errors
    ///
    /// `SchemaViolation` on a blank key, an empty array, or more than
    /// `max_values` values.
    pub fn attach(
        parent_kind: EntityKind,
        parent_id: Uuid,
        key: impl Into<String>,
        values: MetadataValues,
        now: DateTime<Utc>,
        max_values: usize,
    ) -> SchemaResult<Self> {
        let key = key.into();
        check_key(&key)?;
        values.check(max_values)?;
        Ok(Self {
            metadata_id: Uuid::new_v4(),
            parent_id,
            parent_kind,
            key,
            values,
            created_at: now,
            updated_at: now,
        })
    }

    /// Replaces the values, moving `updated_at` strictly forward.
    ///
    /// # Errors
    ///
    /// As [`Self::attach`]; the record is unchanged on error.
    pub fn replace_values(
        &mut self,
        values: MetadataValues,
        now: DateTime<Utc>,
        max_values: usize,
    ) -> SchemaResult<()> {
        values.check(max_values)?;
        self.values = values;
        self.updated_at = now.max(self.updated_at + version_step());
        Ok(())
    }

    /// Rejects a write based on an older `updated_at`.
    ///
    /// # Errors
    ///
    /// `ConcurrentModification` when `expected` is not the current version.
    pub fn check_expected(&self, expected: DateTime<Utc>) -> SchemaResult<()> {
        check_version(self.metadata_id, expected, self.updated_at)
    }

    /// Validates a row of `<parent_kind>_metadata`.
    ///
    /// # Errors
    ///
    /// `SchemaViolation` naming the offending column.
    pub fn from_row(parent_kind: EntityKind, row: &Row) -> SchemaResult<Self> {
        let f = Fields::new(RECORD, row);
        if let Some(unknown) = f.keys().find(|key| !COLUMNS.contains(key)) {
            return Err(f.violation(unknown, "is not a metadata column"));
        }
        let timestamps = match f.opt_str_list("values_timestamp")? {
            None => None,
            Some(raw) => Some(
                raw.iter()
                    .map(|s| parse_timestamp(s))
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| {
                        f.violation("values_timestamp", "must be an array of ISO-8601 timestamps")
                    })?,
            ),
        };
        let booleans = f
            .values("values_boolean", false)?
            .iter()
            .map(serde_json::Value::as_bool)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| f.violation("values_boolean", "must be an array of booleans"))?;
        let values = MetadataValues::from_columns(
            f.opt_str_list("values_text")?,
            f.opt_numbers("values_numeric", None)?,
            Some(booleans),
            timestamps,
        )?;

        let key = f.req_str("key")?;
        check_key(&key)?;
        let record = Self {
            metadata_id: f.req_uuid("metadata_id")?,
            parent_id: f.req_uuid("parent_id")?,
            parent_kind,
            key,
            values,
            created_at: f.req_timestamp("created_at")?,
            updated_at: f.req_timestamp("updated_at")?,
        };
        if record.updated_at < record.created_at {
            return Err(f.violation("updated_at", "must not precede created_at"));
        }
        Ok(record)
    }

    /// Serializes to a table row; unused value columns are empty arrays.
    #[must_use]
    pub fn to_row(&self) -> Row {
        let mut row = MetadataRow {
            metadata_id: self.metadata_id,
            parent_id: self.parent_id,
            key: self.key.clone(),
            values_text: Vec::new(),
            values_numeric: Vec::new(),
            values_boolean: Vec::new(),
            values_timestamp: Vec::new(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        match &self.values {
            MetadataValues::Text(v) => row.values_text = v.clone(),
            MetadataValues::Numeric(v) => row.values_numeric = v.clone(),
            MetadataValues::Boolean(v) => row.values_boolean = v.clone(),
            MetadataValues::Timestamp(v) => row.values_timestamp = v.clone(),
        }
        match serde_json::to_value(row) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => Row::new(),
        }
    }

    /// Table the row belongs to.
    #[must_use]
    pub const fn table(&self) -> &'static str {
        self.parent_kind.metadata_table()
    }
}

fn check_key(key: &str) -> SchemaResult<()> {
    if key.trim().is_empty() {
        return Err(SchemaError::schema(RECORD, "key", "must not be blank"));
    }
    Ok(())
}

/// Lazy, restartable walk over one parent's records.
///
/// Borrows the parent's rows (already sorted by `created_at`) and yields
/// those matching the key filter in the requested order. Cloning the query,
/// or calling [`MetadataQuery::restart`], starts over from the beginning.
#[derive(Clone, Debug)]
pub struct MetadataQuery<'a> {
    rows: &'a [MetadataRecord],
    remaining: &'a [MetadataRecord],
    key: Option<&'a str>,
    order: SortOrder,
}

impl<'a> MetadataQuery<'a> {
    /// Query over `rows`, which must be sorted by `created_at` ascending.
    #[must_use]
    pub fn new(rows: &'a [MetadataRecord], key: Option<&'a str>, order: SortOrder) -> Self {
        Self {
            rows,
            remaining: rows,
            key,
            order,
        }
    }

    /// A fresh query over the same rows.
    #[must_use]
    pub fn restart(&self) -> Self {
        Self::new(self.rows, self.key, self.order)
    }

    fn matches(&self, record: &MetadataRecord) -> bool {
        self.key.map_or(true, |key| record.key == key)
    }
}

impl<'a> Iterator for MetadataQuery<'a> {
    type Item = &'a MetadataRecord;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let remaining: &'a [MetadataRecord] = self.remaining;
            let (record, rest) = match self.order {
                SortOrder::Ascending => remaining.split_first()?,
                SortOrder::Descending => remaining.split_last()?,
            };
            self.remaining = rest;
            if self.matches(record) {
                return Some(record);
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 1, 9, 0, 0).unwrap()
    }

    fn text(values: &[&str]) -> MetadataValues {
        MetadataValues::Text(values.iter().map(|s| (*s).to_string()).collect())
    }

    #[test]
    fn test_exactly_one_column() {
        let err = MetadataValues::from_columns(None, None, None, None).unwrap_err();
        assert!(err.is_schema_violation());

        let err = MetadataValues::from_columns(
            Some(vec!["a".into()]),
            Some(vec![1.0]),
            None,
            None,
        )
        .unwrap_err();
        assert!(err.to_string().contains("values_text and values_numeric"));

        let ok = MetadataValues::from_columns(Some(vec![]), Some(vec![2.5]), Some(vec![]), None)
            .unwrap();
        assert_eq!(ok, MetadataValues::Numeric(vec![2.5]));
    }

    #[test]
    fn test_attach_limits() {
        let parent = Uuid::new_v4();
        let err = MetadataRecord::attach(EntityKind::Node, parent, "tag", text(&[]), t0(), 8)
            .unwrap_err();
        assert_eq!(err.field(), Some("values_text"));

        let err = MetadataRecord::attach(EntityKind::Node, parent, "tag", text(&["a"; 9]), t0(), 8)
            .unwrap_err();
        assert_eq!(err.field(), Some("values_text"));

        let err = MetadataRecord::attach(EntityKind::Node, parent, " ", text(&["a"]), t0(), 8)
            .unwrap_err();
        assert_eq!(err.field(), Some("key"));
    }

    #[test]
    fn test_row_round_trip() {
        let record = MetadataRecord::attach(
            EntityKind::Mesh,
            Uuid::new_v4(),
            "baked",
            MetadataValues::Timestamp(vec![t0(), t0() + Duration::milliseconds(1500)]),
            t0(),
            16,
        )
        .unwrap();
        let row = record.to_row();
        assert_eq!(row["values_text"], json!([]));
        assert_eq!(record.table(), "meshes_metadata");
        assert_eq!(MetadataRecord::from_row(EntityKind::Mesh, &row).unwrap(), record);
    }

    #[test]
    fn test_row_with_two_columns_rejected() {
        let row = json!({
            "metadata_id": Uuid::new_v4(),
            "parent_id": Uuid::new_v4(),
            "key": "flags",
            "values_boolean": [true],
            "values_text": ["x"],
            "created_at": "2024-04-01T09:00:00Z",
            "updated_at": "2024-04-01T09:00:00Z"
        });
        let serde_json::Value::Object(row) = row else { unreachable!() };
        let err = MetadataRecord::from_row(EntityKind::Node, &row).unwrap_err();
        assert!(err.is_schema_violation());
    }

    #[test]
    fn test_replace_values_bumps_version() {
        let parent = Uuid::new_v4();
        let mut record =
            MetadataRecord::attach(EntityKind::Node, parent, "tag", text(&["a"]), t0(), 8).unwrap();
        record.replace_values(text(&["b"]), t0(), 8).unwrap();
        assert!(record.updated_at > record.created_at);
        assert!(record.replace_values(text(&[]), t0(), 8).is_err());
        assert_eq!(record.values, text(&["b"]));
    }

    #[test]
    fn test_query_is_lazy_and_restartable() {
        let parent = Uuid::new_v4();
        let rows: Vec<_> = ["tag", "color", "tag"]
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let at = t0() + Duration::seconds(i as i64);
                MetadataRecord::attach(EntityKind::Node, parent, *key, text(&[*key]), at, 8)
                    .unwrap()
            })
            .collect();

        let query = MetadataQuery::new(&rows, Some("tag"), SortOrder::Ascending);
        let first: Vec<_> = query.clone().map(|r| r.created_at).collect();
        assert_eq!(first, vec![t0(), t0() + Duration::seconds(2)]);

        let mut desc = MetadataQuery::new(&rows, None, SortOrder::Descending);
        assert_eq!(desc.next().map(|r| r.key.as_str()), Some("tag"));
        assert_eq!(desc.next().map(|r| r.key.as_str()), Some("color"));
        assert_eq!(desc.restart().count(), 3);
    }
}
