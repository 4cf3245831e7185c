//! Delete policies: restrict, detach and cascade.

use serde_json::{json, Value};
use uuid::Uuid;
use vworld_schema::{
    DeletePolicy, Entity, EntityKind, MemoryStore, MetadataValues, Row, SchemaConfig, SchemaError,
    WorldStore,
};

fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => unreachable!(),
    }
}

fn create(store: &mut MemoryStore, kind: EntityKind, value: Value) -> Uuid {
    store.create(kind, row(value)).unwrap().uuid()
}

/// World with a small mesh pipeline: buffer -> view -> accessor, plus a
/// node using a mesh.
struct Fixture {
    store: MemoryStore,
    world: Uuid,
    buffer: Uuid,
    view: Uuid,
    accessor: Uuid,
    mesh: Uuid,
    node: Uuid,
    scene: Uuid,
}

fn fixture() -> Fixture {
    let mut store = MemoryStore::new(SchemaConfig::default());
    let world = create(&mut store, EntityKind::World, json!({"asset": {"version": "2.0"}}));
    let buffer = create(
        &mut store,
        EntityKind::Buffer,
        json!({"worldUuid": world, "byteLength": 64}),
    );
    let view = create(
        &mut store,
        EntityKind::BufferView,
        json!({"worldUuid": world, "buffer": buffer, "byteLength": 64}),
    );
    let accessor = create(
        &mut store,
        EntityKind::Accessor,
        json!({"worldUuid": world, "bufferView": view, "byteOffset": 4,
               "componentType": 5126, "count": 4, "type": "VEC3"}),
    );
    let mesh = create(
        &mut store,
        EntityKind::Mesh,
        json!({"worldUuid": world, "primitives": [{"attributes": {"POSITION": 0}}]}),
    );
    let node = create(&mut store, EntityKind::Node, json!({"worldUuid": world, "mesh": mesh}));
    let scene = create(&mut store, EntityKind::Scene, json!({"worldUuid": world, "nodes": [node]}));
    Fixture { store, world, buffer, view, accessor, mesh, node, scene }
}

#[test]
fn test_restrict_refuses_referenced_entity() {
    let Fixture { mut store, mesh, node, .. } = fixture();

    let err = store
        .delete(EntityKind::Mesh, mesh, DeletePolicy::Restrict)
        .unwrap_err();
    assert!(err.is_referential_violation());
    assert!(store.get(mesh).is_some());
    assert!(store.get(node).is_some());
}

#[test]
fn test_restrict_refuses_populated_world() {
    let Fixture { mut store, world, .. } = fixture();
    let err = store
        .delete(EntityKind::World, world, DeletePolicy::Restrict)
        .unwrap_err();
    assert!(err.is_referential_violation());
    assert_eq!(store.len(), 7);
}

#[test]
fn test_cascade_detaches_optional_references() {
    let Fixture { mut store, mesh, node, .. } = fixture();
    let before = store.get(node).unwrap().updated_at();
    store
        .attach_metadata(mesh, "lod", MetadataValues::Numeric(vec![0.5]))
        .unwrap();

    let report = store
        .delete(EntityKind::Mesh, mesh, DeletePolicy::Cascade)
        .unwrap();
    assert_eq!(report.deleted, vec![(EntityKind::Mesh, mesh)]);
    assert_eq!(report.detached, vec![node]);
    assert_eq!(report.metadata_removed, 1);

    let Some(Entity::Node(lamp)) = store.get(node) else { panic!("node survives") };
    assert_eq!(lamp.mesh, None);
    assert!(lamp.common.identity.updated_at > before);
    assert_eq!(store.query_metadata(mesh, None, None).count(), 0);
}

#[test]
fn test_cascade_follows_required_references() {
    let Fixture { mut store, buffer, view, accessor, .. } = fixture();

    let report = store
        .delete(EntityKind::Buffer, buffer, DeletePolicy::Cascade)
        .unwrap();
    assert_eq!(
        report.deleted,
        vec![(EntityKind::Buffer, buffer), (EntityKind::BufferView, view)]
    );
    assert_eq!(report.detached, vec![accessor]);

    let Some(Entity::Accessor(positions)) = store.get(accessor) else {
        panic!("accessor survives")
    };
    assert_eq!(positions.buffer_view, None);
    assert_eq!(positions.byte_offset, None);
}

#[test]
fn test_cascade_world_removes_everything_it_owns() {
    let Fixture { mut store, world, node, scene, .. } = fixture();
    store
        .attach_metadata(node, "tag", MetadataValues::Text(vec!["lamp".into()]))
        .unwrap();
    store
        .attach_metadata(world, "owner", MetadataValues::Text(vec!["ops".into()]))
        .unwrap();
    let other = create(&mut store, EntityKind::World, json!({"asset": {"version": "2.0"}}));

    let report = store
        .delete(EntityKind::World, world, DeletePolicy::Cascade)
        .unwrap();
    assert_eq!(report.deleted.len(), 7);
    assert_eq!(report.deleted[0], (EntityKind::World, world));
    assert!(report.detached.is_empty());
    assert_eq!(report.metadata_removed, 2);

    assert_eq!(store.len(), 1);
    assert!(store.get(other).is_some());
    assert!(store.get(scene).is_none());
}

#[test]
fn test_delete_unknown_entity() {
    let Fixture { mut store, .. } = fixture();
    let ghost = Uuid::new_v4();
    let err = store
        .delete(EntityKind::Node, ghost, DeletePolicy::Cascade)
        .unwrap_err();
    assert_eq!(err, SchemaError::NotFound { table: "nodes", uuid: ghost });
}
