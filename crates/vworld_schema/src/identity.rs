//! # Identity & Versioning
//!
//! Every record carries a uuid that never changes, the owning world (except
//! the World itself), an optional schema version tag and a pair of
//! timestamps. `updatedAt` doubles as the optimistic concurrency token: an
//! update names the version it was based on and is rejected if the record
//! has moved on since.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SchemaError, SchemaResult};
use crate::fields::Fields;

/// Source of "now" for stamping records.
pub trait Clock: Send + Sync {
    /// Current time in UTC.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used by tests and replay tools.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Jumps to an arbitrary instant (may go backwards).
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Smallest step between two versions of the same record.
#[must_use]
pub fn version_step() -> Duration {
    Duration::microseconds(1)
}

/// Rejects a write to `record` based on version `expected` when the stored
/// version is `actual`.
///
/// # Errors
///
/// `ConcurrentModification` when the two differ.
pub fn check_version(
    record: Uuid,
    expected: DateTime<Utc>,
    actual: DateTime<Utc>,
) -> SchemaResult<()> {
    if expected != actual {
        return Err(SchemaError::ConcurrentModification {
            record,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Identity fields shared by every world record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Globally unique id, immutable after creation.
    pub uuid: Uuid,
    /// Owning World; `None` only on the World itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_uuid: Option<Uuid>,
    /// Schema revision the record was written against.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last accepted mutation; also the optimistic concurrency token.
    pub updated_at: DateTime<Utc>,
}

impl Identity {
    /// Fresh identity for a World.
    #[must_use]
    pub fn new_world(now: DateTime<Utc>) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            world_uuid: None,
            schema_version: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fresh identity for an entity owned by `world_uuid`.
    #[must_use]
    pub fn new_in(world_uuid: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            world_uuid: Some(world_uuid),
            ..Self::new_world(now)
        }
    }

    /// Sets the schema version tag.
    #[must_use]
    pub fn with_schema_version(mut self, version: impl Into<String>) -> Self {
        self.schema_version = Some(version.into());
        self
    }

    /// Reads identity columns. `owned` is false only for Worlds.
    pub(crate) fn parse(fields: &Fields<'_>, owned: bool) -> SchemaResult<Self> {
        let world_uuid = fields.opt_uuid("worldUuid")?;
        match (owned, world_uuid) {
            (true, None) => return Err(fields.violation("worldUuid", "is required")),
            (false, Some(_)) => {
                return Err(fields.violation("worldUuid", "must be absent on a world"))
            }
            _ => {}
        }

        let identity = Self {
            uuid: fields.req_uuid("uuid")?,
            world_uuid,
            schema_version: fields.opt_str("schemaVersion")?,
            created_at: fields.req_timestamp("createdAt")?,
            updated_at: fields.req_timestamp("updatedAt")?,
        };
        identity.check_timestamps(fields.record())?;
        Ok(identity)
    }

    /// `updatedAt` may never precede `createdAt`.
    pub fn check_timestamps(&self, record: &'static str) -> SchemaResult<()> {
        if self.updated_at < self.created_at {
            return Err(SchemaError::schema(
                record,
                "updatedAt",
                "must not precede createdAt",
            ));
        }
        Ok(())
    }

    /// Rejects changes to `uuid`, `worldUuid` or `createdAt`.
    pub fn check_immutable(&self, next: &Self) -> SchemaResult<()> {
        if self.uuid != next.uuid {
            return Err(SchemaError::ImmutableFieldViolation {
                record: self.uuid,
                field: "uuid",
            });
        }
        if self.world_uuid != next.world_uuid {
            return Err(SchemaError::ImmutableFieldViolation {
                record: self.uuid,
                field: "worldUuid",
            });
        }
        if self.created_at != next.created_at {
            return Err(SchemaError::ImmutableFieldViolation {
                record: self.uuid,
                field: "createdAt",
            });
        }
        Ok(())
    }

    /// Rejects an update based on a stale version.
    pub fn check_expected(&self, expected: Option<DateTime<Utc>>) -> SchemaResult<()> {
        match expected {
            Some(expected) => check_version(self.uuid, expected, self.updated_at),
            None => Ok(()),
        }
    }

    /// Next version stamp: strictly after the current one even when the
    /// clock stalls or steps backwards.
    #[must_use]
    pub fn next_version(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.max(self.updated_at + version_step())
    }

    /// Stamps creation time on both timestamps.
    pub fn stamp_created(&mut self, now: DateTime<Utc>) {
        self.created_at = now;
        self.updated_at = now;
    }

    /// Stamps an accepted mutation.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = self.next_version(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_next_version_strictly_increases() {
        let id = Identity::new_in(Uuid::new_v4(), t0());

        // Stalled clock still moves the version forward
        assert!(id.next_version(t0()) > id.updated_at);

        // Clock stepping backwards too
        let earlier = t0() - Duration::seconds(5);
        assert_eq!(id.next_version(earlier), t0() + version_step());

        let later = t0() + Duration::seconds(5);
        assert_eq!(id.next_version(later), later);
    }

    #[test]
    fn test_immutable_fields() {
        let id = Identity::new_in(Uuid::new_v4(), t0());

        let mut moved = id.clone();
        moved.world_uuid = Some(Uuid::new_v4());
        let err = id.check_immutable(&moved).unwrap_err();
        assert!(matches!(err, SchemaError::ImmutableFieldViolation { field: "worldUuid", .. }));

        let mut renamed = id.clone();
        renamed.uuid = Uuid::new_v4();
        let err = id.check_immutable(&renamed).unwrap_err();
        assert!(matches!(err, SchemaError::ImmutableFieldViolation { field: "uuid", .. }));

        let mut backdated = id.clone();
        backdated.created_at = t0() - Duration::days(1);
        let err = id.check_immutable(&backdated).unwrap_err();
        assert!(matches!(err, SchemaError::ImmutableFieldViolation { field: "createdAt", .. }));
    }

    #[test]
    fn test_stale_expected_version() {
        let mut id = Identity::new_world(t0());
        let seen = id.updated_at;
        id.touch(t0() + Duration::seconds(1));

        assert!(id.check_expected(None).is_ok());
        assert!(id.check_expected(Some(id.updated_at)).is_ok());
        assert!(matches!(
            id.check_expected(Some(seen)),
            Err(SchemaError::ConcurrentModification { .. })
        ));
    }

    #[test]
    fn test_updated_before_created_rejected() {
        let mut id = Identity::new_world(t0());
        id.updated_at = t0() - Duration::milliseconds(1);
        let err = id.check_timestamps("world").unwrap_err();
        assert_eq!(err.field(), Some("updatedAt"));
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(t0());
        clock.advance(Duration::seconds(2));
        assert_eq!(clock.now(), t0() + Duration::seconds(2));
        clock.set(t0());
        assert_eq!(clock.now(), t0());
    }
}
