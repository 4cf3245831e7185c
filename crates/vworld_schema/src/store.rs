//! # World Store
//!
//! [`WorldStore`] is the storage collaborator contract: every write goes
//! through one of its methods under a [`MutationOp`] name, and every write
//! is validated before it lands.
//!
//! [`MemoryStore`] is the in-process reference collaborator used by tools
//! and tests. A database-backed store must behave the same way.
//!
//! ## Write path
//!
//! ```text
//! candidate row ──► field rules ──► references ──► version stamp ──► commit
//!                   (catalog)       (integrity)    (identity)
//! ```

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use crate::catalog::{AgentProfile, Detach, Entity, EntityKind, Row};
use crate::config::SchemaConfig;
use crate::error::{SchemaError, SchemaResult};
use crate::identity::{check_version, version_step, Clock, SystemClock};
use crate::integrity::{check_references, EntityResolver};
use crate::metadata::{MetadataQuery, MetadataRecord, MetadataValues, SortOrder};
use crate::mutation::{MutationAction, MutationOp, MutationTarget};

const PROFILES: &str = "agent_profiles";
const METADATA: &str = "metadata";

/// What to do with dependents when deleting an entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Fail while metadata or referrers remain.
    Restrict,
    /// Remove metadata, detach referrers, and delete referrers that lose a
    /// required reference (and everything a deleted World owns).
    Cascade,
}

/// Everything a delete touched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeleteReport {
    /// Deleted entities, the requested one first.
    pub deleted: Vec<(EntityKind, Uuid)>,
    /// Surviving entities whose references were cleared.
    pub detached: Vec<Uuid>,
    /// Metadata rows removed with their parents.
    pub metadata_removed: usize,
}

/// One accepted write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuditEntry {
    /// Operation name
    pub op: MutationOp,
    /// Record written
    pub record: Uuid,
    /// When it was accepted
    pub at: DateTime<Utc>,
}

/// Storage collaborator contract.
pub trait WorldStore {
    /// `create_<noun>`: validates a draft, assigns identity, persists it.
    ///
    /// # Errors
    ///
    /// `SchemaViolation` or `ReferentialViolation`.
    fn create(&mut self, kind: EntityKind, candidate: Row) -> SchemaResult<Entity>;

    /// `update_<noun>`: replaces the entity stored under `uuid`. The
    /// candidate's `updatedAt` is the version it was based on; its `uuid`,
    /// `worldUuid` and `createdAt` must match the stored ones.
    ///
    /// # Errors
    ///
    /// `NotFound`, `ImmutableFieldViolation`, `ConcurrentModification`,
    /// `SchemaViolation` or `ReferentialViolation`.
    fn update(&mut self, uuid: Uuid, candidate: Entity) -> SchemaResult<Entity>;

    /// `delete_<noun>`.
    ///
    /// # Errors
    ///
    /// `NotFound`, or `ReferentialViolation` under [`DeletePolicy::Restrict`].
    fn delete(
        &mut self,
        kind: EntityKind,
        uuid: Uuid,
        policy: DeletePolicy,
    ) -> SchemaResult<DeleteReport>;

    /// Stored entity by uuid.
    fn get(&self, uuid: Uuid) -> Option<&Entity>;

    /// `create_<noun>_metadata`.
    ///
    /// # Errors
    ///
    /// `ReferentialViolation` for an unknown parent, `SchemaViolation` for
    /// bad values.
    fn attach_metadata(
        &mut self,
        parent_id: Uuid,
        key: &str,
        values: MetadataValues,
    ) -> SchemaResult<MetadataRecord>;

    /// `update_<noun>_metadata`: replaces a record's values.
    /// `expected_updated_at` is the version the write was based on.
    ///
    /// # Errors
    ///
    /// `NotFound`, `ConcurrentModification` or `SchemaViolation`.
    fn update_metadata(
        &mut self,
        metadata_id: Uuid,
        expected_updated_at: DateTime<Utc>,
        values: MetadataValues,
    ) -> SchemaResult<MetadataRecord>;

    /// `delete_<noun>_metadata`.
    ///
    /// # Errors
    ///
    /// `NotFound`.
    fn delete_metadata(&mut self, metadata_id: Uuid) -> SchemaResult<MetadataRecord>;

    /// Records attached to `parent_id`, optionally filtered by key.
    /// `order` falls back to the configured default.
    fn query_metadata<'a>(
        &'a self,
        parent_id: Uuid,
        key: Option<&'a str>,
        order: Option<SortOrder>,
    ) -> MetadataQuery<'a>;

    /// `create_agent_profile`.
    ///
    /// # Errors
    ///
    /// `SchemaViolation`, including a taken id or username.
    fn create_agent_profile(&mut self, candidate: Row) -> SchemaResult<AgentProfile>;

    /// `update_agent_profile`: replaces the profile stored under `id`;
    /// `updatedAt` is the expected version.
    ///
    /// # Errors
    ///
    /// `NotFound`, `ImmutableFieldViolation`, `ConcurrentModification` or
    /// `SchemaViolation`.
    fn update_agent_profile(
        &mut self,
        id: Uuid,
        candidate: AgentProfile,
    ) -> SchemaResult<AgentProfile>;

    /// `delete_agent_profile`.
    ///
    /// # Errors
    ///
    /// `NotFound`.
    fn delete_agent_profile(&mut self, id: Uuid) -> SchemaResult<AgentProfile>;
}

/// In-memory [`WorldStore`].
#[derive(Debug)]
pub struct MemoryStore<C: Clock = SystemClock> {
    config: SchemaConfig,
    clock: C,
    entities: HashMap<Uuid, Entity>,
    /// Metadata by parent, each list sorted by `created_at`.
    metadata: HashMap<Uuid, Vec<MetadataRecord>>,
    metadata_parent: HashMap<Uuid, Uuid>,
    profiles: HashMap<Uuid, AgentProfile>,
    audit: Vec<AuditEntry>,
}

impl MemoryStore<SystemClock> {
    /// Store on the wall clock.
    #[must_use]
    pub fn new(config: SchemaConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> MemoryStore<C> {
    /// Store on an explicit clock.
    #[must_use]
    pub fn with_clock(config: SchemaConfig, clock: C) -> Self {
        Self {
            config,
            clock,
            entities: HashMap::new(),
            metadata: HashMap::new(),
            metadata_parent: HashMap::new(),
            profiles: HashMap::new(),
            audit: Vec::new(),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    /// Number of stored entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// True when no entities are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entities owned by `world`, excluding the World itself.
    pub fn entities_in(&self, world: Uuid) -> impl Iterator<Item = &Entity> {
        self.entities
            .values()
            .filter(move |entity| entity.world_uuid() == Some(world))
    }

    /// Stored agent profile.
    #[must_use]
    pub fn profile(&self, id: Uuid) -> Option<&AgentProfile> {
        self.profiles.get(&id)
    }

    /// Accepted writes, oldest first.
    #[must_use]
    pub fn audit_log(&self) -> &[AuditEntry] {
        &self.audit
    }

    fn record(&mut self, op: MutationOp, record: Uuid, at: DateTime<Utc>) {
        debug!("{} accepted for {}", op, record);
        self.audit.push(AuditEntry { op, record, at });
    }

    fn stored(&self, kind: EntityKind, uuid: Uuid) -> SchemaResult<&Entity> {
        self.entities
            .get(&uuid)
            .filter(|entity| entity.kind() == kind)
            .ok_or(SchemaError::NotFound {
                table: kind.table(),
                uuid,
            })
    }

    /// Entities holding a reference to `target`, or owned by it.
    fn dependents(&self, target: Uuid) -> Vec<(&Entity, String)> {
        self.entities
            .values()
            .filter(|entity| entity.uuid() != target)
            .filter_map(|entity| {
                if entity.world_uuid() == Some(target) {
                    return Some((entity, "worldUuid".to_string()));
                }
                entity
                    .references()
                    .into_iter()
                    .find(|reference| reference.uuid == target)
                    .map(|reference| (entity, reference.field))
            })
            .collect()
    }

    fn restrict(&self, kind: EntityKind, uuid: Uuid) -> SchemaResult<()> {
        let attached = self.metadata.get(&uuid).map_or(0, Vec::len);
        if attached > 0 {
            return Err(SchemaError::referential(
                kind.noun(),
                "uuid",
                format!("{attached} metadata rows still attached; delete them or cascade"),
            ));
        }
        if let Some((referrer, field)) = self.dependents(uuid).first() {
            return Err(SchemaError::referential(
                kind.noun(),
                "uuid",
                format!(
                    "still referenced by {} {} ({field}); detach it or cascade",
                    referrer.kind(),
                    referrer.uuid()
                ),
            ));
        }
        Ok(())
    }

    fn cascade(&mut self, root: Uuid) -> DeleteReport {
        let now = self.clock.now();
        let mut doomed: Vec<Uuid> = Vec::new();
        let mut seen = HashSet::new();
        let mut detached = HashSet::new();
        let mut queue = VecDeque::from([root]);

        while let Some(target) = queue.pop_front() {
            if !seen.insert(target) {
                continue;
            }
            doomed.push(target);
            let owns = matches!(
                self.entities.get(&target).map(Entity::kind),
                Some(EntityKind::World)
            );

            for (id, entity) in &mut self.entities {
                if seen.contains(id) {
                    continue;
                }
                if owns && entity.world_uuid() == Some(target) {
                    queue.push_back(*id);
                    continue;
                }
                match entity.detach(target) {
                    Detach::Untouched => {}
                    Detach::Detached => {
                        entity.common_mut().identity.touch(now);
                        detached.insert(*id);
                    }
                    Detach::RequiredLost => queue.push_back(*id),
                }
            }
        }

        let mut report = DeleteReport::default();
        for uuid in &doomed {
            let Some(entity) = self.entities.remove(uuid) else {
                continue;
            };
            let kind = entity.kind();
            report.deleted.push((kind, *uuid));
            for row in self.metadata.remove(uuid).unwrap_or_default() {
                self.metadata_parent.remove(&row.metadata_id);
                report.metadata_removed += 1;
                self.record(
                    MutationOp::metadata(MutationAction::Delete, kind),
                    row.metadata_id,
                    now,
                );
            }
            self.record(MutationOp::entity(MutationAction::Delete, kind), *uuid, now);
        }

        report.detached = detached.into_iter().filter(|id| !seen.contains(id)).collect();
        report.detached.sort();
        for id in &report.detached {
            if let Some(kind) = self.entities.get(id).map(Entity::kind) {
                self.record(MutationOp::entity(MutationAction::Update, kind), *id, now);
            }
        }

        info!(
            "cascade delete of {}: {} entities, {} metadata rows, {} referrers detached",
            root,
            report.deleted.len(),
            report.metadata_removed,
            report.detached.len()
        );
        report
    }

    fn check_username(&self, profile: &AgentProfile) -> SchemaResult<()> {
        let taken = self
            .profiles
            .values()
            .any(|other| other.id != profile.id && other.username == profile.username);
        if taken {
            return Err(SchemaError::schema("agent_profile", "username", "is already taken"));
        }
        Ok(())
    }
}

impl<C: Clock> EntityResolver for MemoryStore<C> {
    fn resolve(&self, uuid: Uuid) -> Option<(EntityKind, Option<Uuid>)> {
        self.entities
            .get(&uuid)
            .map(|entity| (entity.kind(), entity.world_uuid()))
    }

    fn node_children(&self, uuid: Uuid) -> Option<Vec<Uuid>> {
        match self.entities.get(&uuid) {
            Some(Entity::Node(node)) => Some(node.children.clone()),
            _ => None,
        }
    }

    fn node_parents(&self, child: Uuid) -> Vec<Uuid> {
        self.entities
            .values()
            .filter_map(|entity| match entity {
                Entity::Node(node) if node.children.contains(&child) => Some(entity.uuid()),
                _ => None,
            })
            .collect()
    }
}

impl<C: Clock> WorldStore for MemoryStore<C> {
    fn create(&mut self, kind: EntityKind, candidate: Row) -> SchemaResult<Entity> {
        let now = self.clock.now();
        let entity = Entity::draft(kind, candidate, now, &self.config.schema_version)?;
        if self.entities.contains_key(&entity.uuid()) {
            return Err(SchemaError::schema(kind.noun(), "uuid", "is already taken"));
        }
        check_references(&entity, &*self, self.config.validation.max_scene_depth)?;

        let uuid = entity.uuid();
        self.entities.insert(uuid, entity.clone());
        self.record(MutationOp::entity(MutationAction::Create, kind), uuid, now);
        Ok(entity)
    }

    fn update(&mut self, uuid: Uuid, candidate: Entity) -> SchemaResult<Entity> {
        let kind = candidate.kind();
        let stored = self.stored(kind, uuid)?;
        stored.identity().check_immutable(candidate.identity())?;
        stored
            .identity()
            .check_expected(Some(candidate.updated_at()))?;

        // Public fields may have been edited into an invalid state
        let mut entity = Entity::from_row(kind, &candidate.to_row())?;
        check_references(&entity, &*self, self.config.validation.max_scene_depth)?;

        let now = self.clock.now();
        entity.common_mut().identity.touch(now);

        self.entities.insert(uuid, entity.clone());
        self.record(MutationOp::entity(MutationAction::Update, kind), uuid, now);
        Ok(entity)
    }

    fn delete(
        &mut self,
        kind: EntityKind,
        uuid: Uuid,
        policy: DeletePolicy,
    ) -> SchemaResult<DeleteReport> {
        self.stored(kind, uuid)?;
        match policy {
            DeletePolicy::Restrict => {
                self.restrict(kind, uuid)?;
                let now = self.clock.now();
                self.entities.remove(&uuid);
                self.record(MutationOp::entity(MutationAction::Delete, kind), uuid, now);
                Ok(DeleteReport {
                    deleted: vec![(kind, uuid)],
                    ..DeleteReport::default()
                })
            }
            DeletePolicy::Cascade => Ok(self.cascade(uuid)),
        }
    }

    fn get(&self, uuid: Uuid) -> Option<&Entity> {
        self.entities.get(&uuid)
    }

    fn attach_metadata(
        &mut self,
        parent_id: Uuid,
        key: &str,
        values: MetadataValues,
    ) -> SchemaResult<MetadataRecord> {
        let parent_kind = self
            .entities
            .get(&parent_id)
            .map(Entity::kind)
            .ok_or_else(|| {
                SchemaError::referential(
                    METADATA,
                    "parent_id",
                    format!("entity {parent_id} does not exist"),
                )
            })?;
        let now = self.clock.now();
        let record = MetadataRecord::attach(
            parent_kind,
            parent_id,
            key,
            values,
            now,
            self.config.metadata.max_values_per_record,
        )?;

        let rows = self.metadata.entry(parent_id).or_default();
        let at = rows.partition_point(|row| row.created_at <= record.created_at);
        rows.insert(at, record.clone());
        self.metadata_parent.insert(record.metadata_id, parent_id);
        self.record(
            MutationOp::metadata(MutationAction::Create, parent_kind),
            record.metadata_id,
            now,
        );
        Ok(record)
    }

    fn update_metadata(
        &mut self,
        metadata_id: Uuid,
        expected_updated_at: DateTime<Utc>,
        values: MetadataValues,
    ) -> SchemaResult<MetadataRecord> {
        let not_found = SchemaError::NotFound {
            table: METADATA,
            uuid: metadata_id,
        };
        let parent = *self.metadata_parent.get(&metadata_id).ok_or(not_found.clone())?;
        let now = self.clock.now();
        let max_values = self.config.metadata.max_values_per_record;

        let record = self
            .metadata
            .get_mut(&parent)
            .and_then(|rows| rows.iter_mut().find(|row| row.metadata_id == metadata_id))
            .ok_or(not_found)?;
        record.check_expected(expected_updated_at)?;
        record.replace_values(values, now, max_values)?;
        let record = record.clone();

        self.record(
            MutationOp::metadata(MutationAction::Update, record.parent_kind),
            metadata_id,
            now,
        );
        Ok(record)
    }

    fn delete_metadata(&mut self, metadata_id: Uuid) -> SchemaResult<MetadataRecord> {
        let not_found = SchemaError::NotFound {
            table: METADATA,
            uuid: metadata_id,
        };
        let parent = self.metadata_parent.remove(&metadata_id).ok_or(not_found.clone())?;
        let rows = self.metadata.get_mut(&parent).ok_or(not_found.clone())?;
        let index = rows
            .iter()
            .position(|row| row.metadata_id == metadata_id)
            .ok_or(not_found)?;
        let record = rows.remove(index);
        if rows.is_empty() {
            self.metadata.remove(&parent);
        }

        let now = self.clock.now();
        self.record(
            MutationOp::metadata(MutationAction::Delete, record.parent_kind),
            metadata_id,
            now,
        );
        Ok(record)
    }

    fn query_metadata<'a>(
        &'a self,
        parent_id: Uuid,
        key: Option<&'a str>,
        order: Option<SortOrder>,
    ) -> MetadataQuery<'a> {
        let rows = self.metadata.get(&parent_id).map_or(&[][..], Vec::as_slice);
        MetadataQuery::new(rows, key, order.unwrap_or(self.config.metadata.default_order))
    }

    fn create_agent_profile(&mut self, candidate: Row) -> SchemaResult<AgentProfile> {
        let now = self.clock.now();
        let profile = AgentProfile::draft(candidate, now)?;
        if self.profiles.contains_key(&profile.id) {
            return Err(SchemaError::schema("agent_profile", "id", "is already taken"));
        }
        self.check_username(&profile)?;

        self.profiles.insert(profile.id, profile.clone());
        self.record(
            MutationOp::new(MutationAction::Create, MutationTarget::AgentProfile),
            profile.id,
            now,
        );
        Ok(profile)
    }

    fn update_agent_profile(
        &mut self,
        id: Uuid,
        candidate: AgentProfile,
    ) -> SchemaResult<AgentProfile> {
        let stored = self.profiles.get(&id).ok_or(SchemaError::NotFound {
            table: PROFILES,
            uuid: id,
        })?;
        for (field, changed) in [
            ("id", candidate.id != stored.id),
            ("createdAt", candidate.created_at != stored.created_at),
        ] {
            if changed {
                return Err(SchemaError::ImmutableFieldViolation { record: id, field });
            }
        }
        check_version(id, candidate.updated_at, stored.updated_at)?;
        let previous = stored.updated_at;

        let mut profile = AgentProfile::from_row(&candidate.to_row())?;
        self.check_username(&profile)?;

        let now = self.clock.now();
        profile.updated_at = now.max(previous + version_step());

        self.profiles.insert(profile.id, profile.clone());
        self.record(
            MutationOp::new(MutationAction::Update, MutationTarget::AgentProfile),
            profile.id,
            now,
        );
        Ok(profile)
    }

    fn delete_agent_profile(&mut self, id: Uuid) -> SchemaResult<AgentProfile> {
        let profile = self.profiles.remove(&id).ok_or(SchemaError::NotFound {
            table: PROFILES,
            uuid: id,
        })?;
        let now = self.clock.now();
        self.record(
            MutationOp::new(MutationAction::Delete, MutationTarget::AgentProfile),
            id,
            now,
        );
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ManualClock;
    use chrono::{Duration, TimeZone};
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn row(value: Value) -> Row {
        let Value::Object(row) = value else { unreachable!() };
        row
    }

    fn store() -> (MemoryStore<Arc<ManualClock>>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()));
        (MemoryStore::with_clock(SchemaConfig::default(), Arc::clone(&clock)), clock)
    }

    fn world(store: &mut MemoryStore<Arc<ManualClock>>) -> Uuid {
        store
            .create(EntityKind::World, row(json!({"asset": {"version": "2.0"}})))
            .unwrap()
            .uuid()
    }

    #[test]
    fn test_create_and_audit() {
        let (mut store, _) = store();
        let w = world(&mut store);
        let scene = store
            .create(EntityKind::Scene, row(json!({"worldUuid": w, "nodes": []})))
            .unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.entities_in(w).count(), 1);
        assert_eq!(scene.identity().schema_version.as_deref(), Some("1.0.0"));

        let ops: Vec<String> = store.audit_log().iter().map(|e| e.op.to_string()).collect();
        assert_eq!(ops, vec!["create_world_gltf", "create_scene"]);
    }

    #[test]
    fn test_duplicate_uuid_rejected() {
        let (mut store, _) = store();
        let w = world(&mut store);
        let err = store
            .create(EntityKind::World, row(json!({"uuid": w, "asset": {"version": "2.0"}})))
            .unwrap_err();
        assert_eq!(err.field(), Some("uuid"));
    }

    #[test]
    fn test_update_stamps_and_keeps_created_at() {
        let (mut store, clock) = store();
        let w = world(&mut store);
        let mut node = store
            .create(EntityKind::Node, row(json!({"worldUuid": w})))
            .unwrap();
        let created = node.identity().created_at;

        clock.advance(Duration::seconds(3));
        node.common_mut().name = Some("lamp".into());
        let updated = store.update(node.uuid(), node).unwrap();

        assert_eq!(updated.identity().created_at, created);
        assert_eq!(updated.updated_at(), created + Duration::seconds(3));
        assert_eq!(updated.common().name.as_deref(), Some("lamp"));
    }

    #[test]
    fn test_update_rejects_backdated_created_at() {
        let (mut store, _) = store();
        let w = world(&mut store);
        let mut node = store
            .create(EntityKind::Node, row(json!({"worldUuid": w})))
            .unwrap();
        let created = node.identity().created_at;

        // Later than updatedAt, which would also fail the timestamp rule
        node.common_mut().identity.created_at = created + Duration::days(1);
        let err = store.update(node.uuid(), node).unwrap_err();
        assert!(matches!(
            err,
            SchemaError::ImmutableFieldViolation { field: "createdAt", .. }
        ));
    }

    #[test]
    fn test_update_revalidates_fields() {
        let (mut store, _) = store();
        let w = world(&mut store);
        let mut node = store
            .create(EntityKind::Node, row(json!({"worldUuid": w, "scale": [1, 1, 1]})))
            .unwrap();
        if let Entity::Node(n) = &mut node {
            n.matrix = Some([0.0; 16]);
        }
        let err = store.update(node.uuid(), node).unwrap_err();
        assert_eq!(err.field(), Some("matrix"));
    }

    #[test]
    fn test_restrict_delete_with_metadata() {
        let (mut store, _) = store();
        let w = world(&mut store);
        let node = store.create(EntityKind::Node, row(json!({"worldUuid": w}))).unwrap();
        let meta = store
            .attach_metadata(node.uuid(), "tag", MetadataValues::Text(vec!["x".into()]))
            .unwrap();

        let err = store
            .delete(EntityKind::Node, node.uuid(), DeletePolicy::Restrict)
            .unwrap_err();
        assert!(err.is_referential_violation());

        store.delete_metadata(meta.metadata_id).unwrap();
        let report = store
            .delete(EntityKind::Node, node.uuid(), DeletePolicy::Restrict)
            .unwrap();
        assert_eq!(report.deleted, vec![(EntityKind::Node, node.uuid())]);
    }

    #[test]
    fn test_delete_wrong_kind_not_found() {
        let (mut store, _) = store();
        let w = world(&mut store);
        let err = store
            .delete(EntityKind::Scene, w, DeletePolicy::Cascade)
            .unwrap_err();
        assert_eq!(err, SchemaError::NotFound { table: "scenes", uuid: w });
    }

    #[test]
    fn test_metadata_update_and_missing() {
        let (mut store, clock) = store();
        let w = world(&mut store);
        let meta = store
            .attach_metadata(w, "visits", MetadataValues::Numeric(vec![1.0]))
            .unwrap();
        clock.advance(Duration::seconds(1));
        let updated = store
            .update_metadata(
                meta.metadata_id,
                meta.updated_at,
                MetadataValues::Numeric(vec![2.0]),
            )
            .unwrap();
        assert!(updated.updated_at > meta.updated_at);
        assert_eq!(meta.table(), "world_gltf_metadata");

        let missing = Uuid::new_v4();
        assert!(matches!(
            store.delete_metadata(missing),
            Err(SchemaError::NotFound { table: "metadata", .. })
        ));
        assert!(store
            .attach_metadata(missing, "tag", MetadataValues::Boolean(vec![true]))
            .unwrap_err()
            .is_referential_violation());
    }

    #[test]
    fn test_profiles() {
        let (mut store, clock) = store();
        let ada = store
            .create_agent_profile(row(json!({"username": "ada", "role": "admin"})))
            .unwrap();
        let err = store
            .create_agent_profile(row(json!({"username": "ada"})))
            .unwrap_err();
        assert_eq!(err.field(), Some("username"));

        clock.advance(Duration::seconds(1));
        let mut edited = ada.clone();
        edited.full_name = Some("Ada L.".into());
        let updated = store.update_agent_profile(ada.id, edited).unwrap();
        assert!(updated.updated_at > ada.updated_at);

        let err = store.update_agent_profile(ada.id, ada.clone()).unwrap_err();
        assert!(matches!(err, SchemaError::ConcurrentModification { .. }));

        let mut renamed = updated.clone();
        renamed.id = Uuid::new_v4();
        let err = store.update_agent_profile(ada.id, renamed).unwrap_err();
        assert!(matches!(err, SchemaError::ImmutableFieldViolation { field: "id", .. }));

        store.delete_agent_profile(ada.id).unwrap();
        assert!(store.profile(ada.id).is_none());
        let ops: Vec<String> = store.audit_log().iter().map(|e| e.op.to_string()).collect();
        assert_eq!(
            ops,
            vec!["create_agent_profile", "update_agent_profile", "delete_agent_profile"]
        );
    }
}
