//! Agent profiles (`agent_profiles`).
//!
//! Profiles describe the people behind agents. They live beside the world
//! tables but belong to no world and take no metadata.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;
use vworld_shared::AgentRole;

use super::Row;
use crate::error::SchemaResult;
use crate::fields::Fields;

const RECORD: &str = "agent_profile";
const KEYS: [&str; 6] = ["id", "username", "fullName", "role", "createdAt", "updatedAt"];

/// A registered agent's profile.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentProfile {
    /// Agent id
    pub id: Uuid,
    /// Unique login name
    pub username: String,
    /// Display name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// Authorization role
    pub role: AgentRole,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last accepted change; also the concurrency token
    pub updated_at: DateTime<Utc>,
}

impl AgentProfile {
    /// Validates a persisted row.
    ///
    /// # Errors
    ///
    /// `SchemaViolation` naming the first offending field.
    pub fn from_row(row: &Row) -> SchemaResult<Self> {
        let f = Fields::new(RECORD, row);
        if let Some(unknown) = f.keys().find(|key| !KEYS.contains(key)) {
            return Err(f.violation(unknown, "is not a known field"));
        }

        let username = f.req_non_blank("username")?;
        let role = match f.opt_str("role")? {
            None => AgentRole::default(),
            Some(label) => label
                .parse()
                .map_err(|e: vworld_shared::ParseLabelError| f.violation("role", e.to_string()))?,
        };

        let profile = Self {
            id: f.req_uuid("id")?,
            username,
            full_name: f.opt_str("fullName")?,
            role,
            created_at: f.req_timestamp("createdAt")?,
            updated_at: f.req_timestamp("updatedAt")?,
        };
        if profile.updated_at < profile.created_at {
            return Err(f.violation("updatedAt", "must not precede createdAt"));
        }
        Ok(profile)
    }

    /// Validates a draft, assigning an id if missing and stamping both
    /// timestamps with `now`.
    ///
    /// # Errors
    ///
    /// As [`Self::from_row`].
    pub fn draft(mut candidate: Row, now: DateTime<Utc>) -> SchemaResult<Self> {
        if candidate.get("id").map_or(true, Value::is_null) {
            candidate.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        let stamp = Value::String(now.to_rfc3339_opts(SecondsFormat::AutoSi, true));
        candidate.insert("createdAt".into(), stamp.clone());
        candidate.insert("updatedAt".into(), stamp);
        Self::from_row(&candidate)
    }

    /// Serializes to a table row.
    #[must_use]
    pub fn to_row(&self) -> Row {
        match serde_json::to_value(self) {
            Ok(Value::Object(row)) => row,
            _ => Row::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn row(value: Value) -> Row {
        let Value::Object(row) = value else { unreachable!() };
        row
    }

    #[test]
    fn test_profile_draft_defaults_to_guest() {
        let now = Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap();
        let profile = AgentProfile::draft(row(json!({"username": "ada"})), now).unwrap();
        assert_eq!(profile.role, AgentRole::Guest);
        assert_eq!(profile.created_at, now);
        assert_eq!(AgentProfile::from_row(&profile.to_row()).unwrap(), profile);
    }

    #[test]
    fn test_profile_role_domain() {
        let now = Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap();
        let err = AgentProfile::draft(row(json!({"username": "ada", "role": "owner"})), now)
            .unwrap_err();
        assert_eq!(err.field(), Some("role"));

        let err = AgentProfile::draft(row(json!({"username": "  "})), now).unwrap_err();
        assert_eq!(err.field(), Some("username"));
    }
}
