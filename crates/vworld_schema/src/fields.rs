//! Field-level reader for candidate records.
//!
//! Records arrive as JSON objects (table rows, tool output, client drafts).
//! Every accessor here reports a failure as a `SchemaViolation` carrying the
//! dotted path of the field, so callers never see a bare parse error.
//!
//! `opt_*` accessors treat an absent or `null` field as `None`; `req_*`
//! accessors reject it with "is required".

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{SchemaError, SchemaResult};
use crate::label::Label;

/// Read-only view over one JSON object of a record.
pub struct Fields<'a> {
    record: &'static str,
    prefix: String,
    obj: &'a Map<String, Value>,
}

impl<'a> Fields<'a> {
    /// Top-level view.
    #[must_use]
    pub fn new(record: &'static str, obj: &'a Map<String, Value>) -> Self {
        Self {
            record,
            prefix: String::new(),
            obj,
        }
    }

    /// Top-level view over a message that must be a JSON object.
    ///
    /// # Errors
    ///
    /// `SchemaViolation` on field `$` for any other JSON value.
    pub fn root(record: &'static str, value: &'a Value) -> SchemaResult<Self> {
        match value {
            Value::Object(obj) => Ok(Self::new(record, obj)),
            _ => Err(SchemaError::schema(record, "$", "must be a JSON object")),
        }
    }

    /// View over a nested object found at `path`.
    ///
    /// # Errors
    ///
    /// `SchemaViolation` on `path` when `value` is not an object.
    pub fn object(record: &'static str, path: &str, value: &'a Value) -> SchemaResult<Self> {
        match value {
            Value::Object(obj) => Ok(Self {
                record,
                prefix: format!("{path}."),
                obj,
            }),
            _ => Err(SchemaError::schema(record, path, "must be an object")),
        }
    }

    /// Record type this view reports errors against.
    pub fn record(&self) -> &'static str {
        self.record
    }

    /// Dotted path of a field in this view.
    pub fn path(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }

    /// Builds a `SchemaViolation` for `name`.
    pub fn violation(&self, name: &str, rule: impl Into<String>) -> SchemaError {
        SchemaError::schema(self.record, self.path(name), rule)
    }

    /// Raw value; JSON `null` counts as absent.
    pub fn get(&self, name: &str) -> Option<&'a Value> {
        self.obj.get(name).filter(|v| !v.is_null())
    }

    /// Nested object view, if present.
    pub fn nested(&self, name: &str) -> SchemaResult<Option<Fields<'a>>> {
        self.get(name)
            .map(|v| Fields::object(self.record, &self.path(name), v))
            .transpose()
    }

    /// Every key present in this object.
    pub fn keys(&self) -> impl Iterator<Item = &'a str> {
        let obj: &'a Map<String, Value> = self.obj;
        obj.keys().map(String::as_str)
    }

    /// Keys of this object not listed in `known`.
    pub fn rest(&self, known: &[&str]) -> Map<String, Value> {
        self.obj
            .iter()
            .filter(|(k, _)| !known.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    // ------------------------------------------------------------------
    // Strings & labels
    // ------------------------------------------------------------------

    /// Optional string.
    pub fn opt_str(&self, name: &str) -> SchemaResult<Option<String>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.violation(name, "must be a string")),
        }
    }

    /// Required string.
    pub fn req_str(&self, name: &str) -> SchemaResult<String> {
        self.opt_str(name)?
            .ok_or_else(|| self.violation(name, "is required"))
    }

    /// Required string with at least one non-whitespace character.
    pub fn req_non_blank(&self, name: &str) -> SchemaResult<String> {
        let value = self.req_str(name)?;
        if value.trim().is_empty() {
            return Err(self.violation(name, "must not be blank"));
        }
        Ok(value)
    }

    /// Optional array of strings.
    pub fn opt_str_list(&self, name: &str) -> SchemaResult<Option<Vec<String>>> {
        self.opt_list(name, "strings", |v| v.as_str().map(str::to_string))
    }

    /// Optional member of a closed label set.
    pub fn opt_label<T: Label>(&self, name: &str) -> SchemaResult<Option<T>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => T::from_label(s)
                .map(Some)
                .ok_or_else(|| self.violation(name, format!("must be one of {}", T::expected()))),
            Some(_) => Err(self.violation(name, format!("must be one of {}", T::expected()))),
        }
    }

    /// Required member of a closed label set.
    pub fn req_label<T: Label>(&self, name: &str) -> SchemaResult<T> {
        self.opt_label(name)?
            .ok_or_else(|| self.violation(name, "is required"))
    }

    // ------------------------------------------------------------------
    // Identifiers & timestamps
    // ------------------------------------------------------------------

    /// Optional uuid string.
    pub fn opt_uuid(&self, name: &str) -> SchemaResult<Option<Uuid>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Uuid::parse_str(s)
                .map(Some)
                .map_err(|_| self.violation(name, "must be a uuid")),
            Some(_) => Err(self.violation(name, "must be a uuid")),
        }
    }

    /// Required uuid string.
    pub fn req_uuid(&self, name: &str) -> SchemaResult<Uuid> {
        self.opt_uuid(name)?
            .ok_or_else(|| self.violation(name, "is required"))
    }

    /// List of uuids; absent means empty.
    pub fn uuid_list(&self, name: &str) -> SchemaResult<Vec<Uuid>> {
        Ok(self
            .opt_list(name, "uuids", |v| v.as_str().and_then(|s| Uuid::parse_str(s).ok()))?
            .unwrap_or_default())
    }

    /// Optional RFC 3339 timestamp, normalized to UTC.
    pub fn opt_timestamp(&self, name: &str) -> SchemaResult<Option<DateTime<Utc>>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => parse_timestamp(s)
                .map(Some)
                .ok_or_else(|| self.violation(name, "must be an ISO-8601 timestamp")),
            Some(_) => Err(self.violation(name, "must be an ISO-8601 timestamp")),
        }
    }

    /// Required RFC 3339 timestamp, normalized to UTC.
    pub fn req_timestamp(&self, name: &str) -> SchemaResult<DateTime<Utc>> {
        self.opt_timestamp(name)?
            .ok_or_else(|| self.violation(name, "is required"))
    }

    // ------------------------------------------------------------------
    // Scalars
    // ------------------------------------------------------------------

    /// Optional boolean.
    pub fn opt_bool(&self, name: &str) -> SchemaResult<Option<bool>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(self.violation(name, "must be a boolean")),
        }
    }

    /// Optional number.
    pub fn opt_f64(&self, name: &str) -> SchemaResult<Option<f64>> {
        match self.get(name) {
            None => Ok(None),
            Some(v) => v
                .as_f64()
                .map(Some)
                .ok_or_else(|| self.violation(name, "must be a number")),
        }
    }

    /// Optional number that must not be negative.
    pub fn opt_non_negative(&self, name: &str) -> SchemaResult<Option<f64>> {
        match self.opt_f64(name)? {
            Some(n) if n < 0.0 => Err(self.violation(name, "must be >= 0")),
            other => Ok(other),
        }
    }

    /// Optional non-negative integer.
    pub fn opt_u64(&self, name: &str) -> SchemaResult<Option<u64>> {
        match self.get(name) {
            None => Ok(None),
            Some(v) => v
                .as_u64()
                .map(Some)
                .ok_or_else(|| self.violation(name, "must be a non-negative integer")),
        }
    }

    /// Required non-negative integer.
    pub fn req_u64(&self, name: &str) -> SchemaResult<u64> {
        self.opt_u64(name)?
            .ok_or_else(|| self.violation(name, "is required"))
    }

    /// Optional non-negative integer that fits in 32 bits.
    pub fn opt_u32(&self, name: &str) -> SchemaResult<Option<u32>> {
        match self.opt_u64(name)? {
            None => Ok(None),
            Some(n) => u32::try_from(n)
                .map(Some)
                .map_err(|_| self.violation(name, "is out of range")),
        }
    }

    /// Optional integer restricted to an explicit set of codes.
    pub fn opt_code(&self, name: &str, allowed: &[u32]) -> SchemaResult<Option<u32>> {
        match self.opt_u32(name) {
            Ok(Some(code)) if allowed.contains(&code) => Ok(Some(code)),
            Ok(None) => Ok(None),
            _ => Err(self.violation(name, format!("must be one of {allowed:?}"))),
        }
    }

    // ------------------------------------------------------------------
    // Arrays & passthrough
    // ------------------------------------------------------------------

    /// Numeric array, optionally with an exact length.
    pub fn opt_numbers(&self, name: &str, len: Option<usize>) -> SchemaResult<Option<Vec<f64>>> {
        let numbers = self.opt_list(name, "numbers", Value::as_f64)?;
        match (&numbers, len) {
            (Some(values), Some(expected)) if values.len() != expected => Err(self.violation(
                name,
                format!("must have exactly {expected} numbers, found {}", values.len()),
            )),
            _ => Ok(numbers),
        }
    }

    /// Fixed-size numeric array (vectors, quaternions, matrices).
    pub fn opt_array<const N: usize>(&self, name: &str) -> SchemaResult<Option<[f64; N]>> {
        self.opt_numbers(name, Some(N))?
            .map(|values| {
                <[f64; N]>::try_from(values)
                    .map_err(|_| self.violation(name, format!("must have exactly {N} numbers")))
            })
            .transpose()
    }

    /// Raw JSON array; `required` rejects absent or empty arrays.
    pub fn values(&self, name: &str, required: bool) -> SchemaResult<Vec<Value>> {
        let values = match self.get(name) {
            None => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(_) => return Err(self.violation(name, "must be an array")),
        };
        if required && values.is_empty() {
            return Err(self.violation(name, "must be a non-empty array"));
        }
        Ok(values)
    }

    /// Raw value, cloned.
    pub fn opt_value(&self, name: &str) -> Option<Value> {
        self.get(name).cloned()
    }

    /// Optional JSON object, cloned.
    pub fn opt_map(&self, name: &str) -> SchemaResult<Option<Map<String, Value>>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Object(obj)) => Ok(Some(obj.clone())),
            Some(_) => Err(self.violation(name, "must be an object")),
        }
    }

    /// Byte array encoded as a JSON array of integers.
    pub fn opt_bytes(&self, name: &str) -> SchemaResult<Option<Vec<u8>>> {
        self.opt_list(name, "bytes", |v| v.as_u64().and_then(|n| u8::try_from(n).ok()))
    }

    /// Deserializes a small typed structure (colors, vectors, scripts).
    /// `shape` completes the rule "must be ..." on failure.
    pub fn opt_typed<T: DeserializeOwned>(
        &self,
        name: &str,
        shape: &str,
    ) -> SchemaResult<Option<T>> {
        self.get(name)
            .map(|v| {
                serde_json::from_value(v.clone())
                    .map_err(|_| self.violation(name, format!("must be {shape}")))
            })
            .transpose()
    }

    /// Required variant of [`Self::opt_typed`].
    pub fn req_typed<T: DeserializeOwned>(&self, name: &str, shape: &str) -> SchemaResult<T> {
        self.opt_typed(name, shape)?
            .ok_or_else(|| self.violation(name, "is required"))
    }

    fn opt_list<T>(
        &self,
        name: &str,
        what: &str,
        item: impl Fn(&Value) -> Option<T>,
    ) -> SchemaResult<Option<Vec<T>>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Array(items)) => items
                .iter()
                .map(&item)
                .collect::<Option<Vec<T>>>()
                .map(Some)
                .ok_or_else(|| self.violation(name, format!("must be an array of {what}"))),
            Some(_) => Err(self.violation(name, format!("must be an array of {what}"))),
        }
    }
}

/// Parses an ISO-8601 / RFC 3339 timestamp into UTC.
pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
