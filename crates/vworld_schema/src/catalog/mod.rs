//! # Entity Catalog
//!
//! The fourteen world entity kinds, mirroring glTF 2.0, each stored as one
//! row of its own table. Every kind embeds [`Common`] (identity, name,
//! extras, extensions) and adds its glTF fields on top.
//!
//! ## Row format
//!
//! Rows are JSON objects keyed by glTF camelCase names. References between
//! entities are uuids rather than glTF array indices:
//!
//! ```text
//! { "uuid": "...", "worldUuid": "...", "createdAt": "...", "updatedAt": "...",
//!   "name": "door", "mesh": "<mesh uuid>", "children": ["<node uuid>"],
//!   "extras": { "vircadia": { "lod": { "mode": "distance" } } } }
//! ```
//!
//! [`Entity::from_row`] validates every field and fails with a
//! `SchemaViolation` naming the first offending one. [`Entity::to_row`] is
//! its exact inverse.

mod animation;
mod buffer;
mod mesh;
mod node;
mod profile;
mod world;

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::SchemaResult;
use crate::extension::{EngineHints, Extras};
use crate::fields::Fields;
use crate::identity::Identity;

pub use animation::{Animation, Camera, CameraType, Skin};
pub use buffer::{
    Accessor, AccessorSparse, AccessorType, Buffer, BufferView, ComponentType, SparseIndices,
    SparseValues,
};
pub use mesh::{AlphaMode, Image, ImageMimeType, Material, Mesh, Sampler, Texture};
pub use node::Node;
pub use profile::AgentProfile;
pub use world::{Asset, Scene, SceneHints, WorldGltf};

/// One persisted table row.
pub type Row = Map<String, Value>;

/// Every world entity kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    /// Root container (`world_gltf`)
    World,
    /// Scene
    Scene,
    /// Scene-graph node
    Node,
    /// Mesh
    Mesh,
    /// Material
    Material,
    /// Texture
    Texture,
    /// Image
    Image,
    /// Texture sampler
    Sampler,
    /// Animation
    Animation,
    /// Skin
    Skin,
    /// Camera
    Camera,
    /// Binary buffer
    Buffer,
    /// Slice of a buffer
    BufferView,
    /// Typed view over a buffer view
    Accessor,
}

impl EntityKind {
    /// All kinds, World first.
    pub const ALL: [Self; 14] = [
        Self::World,
        Self::Scene,
        Self::Node,
        Self::Mesh,
        Self::Material,
        Self::Texture,
        Self::Image,
        Self::Sampler,
        Self::Animation,
        Self::Skin,
        Self::Camera,
        Self::Buffer,
        Self::BufferView,
        Self::Accessor,
    ];

    /// Table holding this kind.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::World => "world_gltf",
            Self::Scene => "scenes",
            Self::Node => "nodes",
            Self::Mesh => "meshes",
            Self::Material => "materials",
            Self::Texture => "textures",
            Self::Image => "images",
            Self::Sampler => "samplers",
            Self::Animation => "animations",
            Self::Skin => "skins",
            Self::Camera => "cameras",
            Self::Buffer => "buffers",
            Self::BufferView => "buffer_views",
            Self::Accessor => "accessors",
        }
    }

    /// Table holding metadata attached to this kind.
    #[must_use]
    pub const fn metadata_table(self) -> &'static str {
        match self {
            Self::World => "world_gltf_metadata",
            Self::Scene => "scenes_metadata",
            Self::Node => "nodes_metadata",
            Self::Mesh => "meshes_metadata",
            Self::Material => "materials_metadata",
            Self::Texture => "textures_metadata",
            Self::Image => "images_metadata",
            Self::Sampler => "samplers_metadata",
            Self::Animation => "animations_metadata",
            Self::Skin => "skins_metadata",
            Self::Camera => "cameras_metadata",
            Self::Buffer => "buffers_metadata",
            Self::BufferView => "buffer_views_metadata",
            Self::Accessor => "accessors_metadata",
        }
    }

    /// Singular name used in operation names and error messages.
    #[must_use]
    pub const fn noun(self) -> &'static str {
        match self {
            Self::World => "world_gltf",
            Self::Scene => "scene",
            Self::Node => "node",
            Self::Mesh => "mesh",
            Self::Material => "material",
            Self::Texture => "texture",
            Self::Image => "image",
            Self::Sampler => "sampler",
            Self::Animation => "animation",
            Self::Skin => "skin",
            Self::Camera => "camera",
            Self::Buffer => "buffer",
            Self::BufferView => "buffer_view",
            Self::Accessor => "accessor",
        }
    }

    /// Inverse of [`Self::noun`].
    #[must_use]
    pub fn from_noun(noun: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.noun() == noun)
    }

    /// Inverse of [`Self::table`].
    #[must_use]
    pub fn from_table(table: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.table() == table)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.noun())
    }
}

/// Properties every entity shares.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Common {
    /// Identity and version
    #[serde(flatten)]
    pub identity: Identity,
    /// Display label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// glTF extras, including engine hints
    #[serde(skip_serializing_if = "Extras::is_empty")]
    pub extras: Extras,
    /// glTF extensions, passed through
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub extensions: Map<String, Value>,
}

impl Common {
    const KEYS: [&'static str; 8] = [
        "uuid",
        "worldUuid",
        "schemaVersion",
        "createdAt",
        "updatedAt",
        "name",
        "extras",
        "extensions",
    ];

    /// Unnamed, hint-free properties around an identity.
    #[must_use]
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            name: None,
            extras: Extras::default(),
            extensions: Map::new(),
        }
    }

    fn parse(f: &Fields<'_>, owned: bool) -> SchemaResult<Self> {
        Ok(Self {
            identity: Identity::parse(f, owned)?,
            name: f.opt_str("name")?,
            extras: Extras::parse(f)?,
            extensions: f.opt_map("extensions")?.unwrap_or_default(),
        })
    }
}

/// An outgoing reference from one entity to another.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reference {
    /// Field holding the reference (`children[2]`, `sparse.indices.bufferView`).
    pub field: String,
    /// Kind the reference must resolve to.
    pub target: EntityKind,
    /// Referenced uuid.
    pub uuid: Uuid,
    /// Whether the referrer is invalid without it.
    pub required: bool,
}

/// Outcome of removing a deleted entity from a referrer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Detach {
    /// The referrer never pointed at it.
    Untouched,
    /// Optional or list references were cleared.
    Detached,
    /// A required reference was lost; the referrer must go too.
    RequiredLost,
}

impl Detach {
    fn changed(changed: bool) -> Self {
        if changed {
            Self::Detached
        } else {
            Self::Untouched
        }
    }
}

/// Reference collector used by each kind.
#[derive(Default)]
struct Refs(Vec<Reference>);

impl Refs {
    fn opt(self, field: &str, target: EntityKind, uuid: Option<Uuid>) -> Self {
        match uuid {
            Some(uuid) => self.push(field.to_string(), target, uuid, false),
            None => self,
        }
    }

    fn req(self, field: &str, target: EntityKind, uuid: Uuid) -> Self {
        self.push(field.to_string(), target, uuid, true)
    }

    fn list(self, field: &str, target: EntityKind, uuids: &[Uuid]) -> Self {
        uuids.iter().enumerate().fold(self, |refs, (i, uuid)| {
            refs.push(format!("{field}[{i}]"), target, *uuid, false)
        })
    }

    fn push(mut self, field: String, target: EntityKind, uuid: Uuid, required: bool) -> Self {
        self.0.push(Reference {
            field,
            target,
            uuid,
            required,
        });
        self
    }
}

/// Clears an optional reference to `target`.
fn clear(slot: &mut Option<Uuid>, target: Uuid) -> bool {
    if *slot == Some(target) {
        *slot = None;
        true
    } else {
        false
    }
}

/// Drops every occurrence of `target` from a reference list.
fn prune(list: &mut Vec<Uuid>, target: Uuid) -> bool {
    let before = list.len();
    list.retain(|uuid| *uuid != target);
    list.len() != before
}

/// Rejects a reference list naming the same entity twice.
fn no_repeats(f: &Fields<'_>, name: &str, list: &[Uuid]) -> SchemaResult<()> {
    let mut seen = HashSet::with_capacity(list.len());
    match list.iter().position(|uuid| !seen.insert(*uuid)) {
        Some(i) => Err(f.violation(&format!("{name}[{i}]"), "must not repeat an earlier entry")),
        None => Ok(()),
    }
}

/// Per-kind parsing and reference handling.
trait Record: Serialize + Sized {
    const KIND: EntityKind;

    /// glTF fields beyond [`Common::KEYS`].
    const FIELDS: &'static [&'static str];

    fn parse(common: Common, f: &Fields<'_>) -> SchemaResult<Self>;

    fn references(&self) -> Refs {
        Refs::default()
    }

    fn detach(&mut self, _target: Uuid) -> Detach {
        Detach::Untouched
    }
}

fn parse_record<R: Record>(f: &Fields<'_>) -> SchemaResult<R> {
    if let Some(unknown) = f
        .keys()
        .find(|key| !Common::KEYS.contains(key) && !R::FIELDS.contains(key))
    {
        return Err(f.violation(unknown, "is not a known field; use extras or extensions"));
    }
    let common = Common::parse(f, R::KIND != EntityKind::World)?;
    R::parse(common, f)
}

/// A validated world entity of any kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Entity {
    /// World
    World(WorldGltf),
    /// Scene
    Scene(Scene),
    /// Node
    Node(Node),
    /// Mesh
    Mesh(Mesh),
    /// Material
    Material(Material),
    /// Texture
    Texture(Texture),
    /// Image
    Image(Image),
    /// Sampler
    Sampler(Sampler),
    /// Animation
    Animation(Animation),
    /// Skin
    Skin(Skin),
    /// Camera
    Camera(Camera),
    /// Buffer
    Buffer(Buffer),
    /// Buffer view
    BufferView(BufferView),
    /// Accessor
    Accessor(Accessor),
}

macro_rules! dispatch {
    ($entity:expr, $inner:ident => $body:expr) => {
        match $entity {
            Entity::World($inner) => $body,
            Entity::Scene($inner) => $body,
            Entity::Node($inner) => $body,
            Entity::Mesh($inner) => $body,
            Entity::Material($inner) => $body,
            Entity::Texture($inner) => $body,
            Entity::Image($inner) => $body,
            Entity::Sampler($inner) => $body,
            Entity::Animation($inner) => $body,
            Entity::Skin($inner) => $body,
            Entity::Camera($inner) => $body,
            Entity::Buffer($inner) => $body,
            Entity::BufferView($inner) => $body,
            Entity::Accessor($inner) => $body,
        }
    };
}

macro_rules! entity_from {
    ($($variant:ident($ty:ty)),+ $(,)?) => {
        $(
            impl From<$ty> for Entity {
                fn from(record: $ty) -> Self {
                    Self::$variant(record)
                }
            }
        )+
    };
}

entity_from! {
    World(WorldGltf),
    Scene(Scene),
    Node(Node),
    Mesh(Mesh),
    Material(Material),
    Texture(Texture),
    Image(Image),
    Sampler(Sampler),
    Animation(Animation),
    Skin(Skin),
    Camera(Camera),
    Buffer(Buffer),
    BufferView(BufferView),
    Accessor(Accessor),
}

impl Entity {
    /// Validates a persisted row of the given kind.
    ///
    /// # Errors
    ///
    /// `SchemaViolation` naming the first offending field.
    pub fn from_row(kind: EntityKind, row: &Row) -> SchemaResult<Self> {
        let f = Fields::new(kind.noun(), row);
        match kind {
            EntityKind::World => parse_record(&f).map(Self::World),
            EntityKind::Scene => parse_record(&f).map(Self::Scene),
            EntityKind::Node => parse_record(&f).map(Self::Node),
            EntityKind::Mesh => parse_record(&f).map(Self::Mesh),
            EntityKind::Material => parse_record(&f).map(Self::Material),
            EntityKind::Texture => parse_record(&f).map(Self::Texture),
            EntityKind::Image => parse_record(&f).map(Self::Image),
            EntityKind::Sampler => parse_record(&f).map(Self::Sampler),
            EntityKind::Animation => parse_record(&f).map(Self::Animation),
            EntityKind::Skin => parse_record(&f).map(Self::Skin),
            EntityKind::Camera => parse_record(&f).map(Self::Camera),
            EntityKind::Buffer => parse_record(&f).map(Self::Buffer),
            EntityKind::BufferView => parse_record(&f).map(Self::BufferView),
            EntityKind::Accessor => parse_record(&f).map(Self::Accessor),
        }
    }

    /// Validates a client draft for creation.
    ///
    /// Assigns a uuid when the draft has none, stamps both timestamps with
    /// `now` and fills in `schema_version` when the draft carries no tag.
    ///
    /// # Errors
    ///
    /// As [`Self::from_row`].
    pub fn draft(
        kind: EntityKind,
        mut candidate: Row,
        now: DateTime<Utc>,
        schema_version: &str,
    ) -> SchemaResult<Self> {
        if is_absent(&candidate, "uuid") {
            candidate.insert("uuid".into(), Value::String(Uuid::new_v4().to_string()));
        }
        if is_absent(&candidate, "schemaVersion") {
            candidate.insert("schemaVersion".into(), Value::String(schema_version.into()));
        }
        let stamp = Value::String(now.to_rfc3339_opts(SecondsFormat::AutoSi, true));
        candidate.insert("createdAt".into(), stamp.clone());
        candidate.insert("updatedAt".into(), stamp);
        Self::from_row(kind, &candidate)
    }

    /// Serializes to a table row.
    #[must_use]
    pub fn to_row(&self) -> Row {
        match dispatch!(self, e => serde_json::to_value(e)) {
            Ok(Value::Object(row)) => row,
            _ => Row::new(),
        }
    }

    /// Kind of this entity.
    #[must_use]
    pub const fn kind(&self) -> EntityKind {
        match self {
            Self::World(_) => EntityKind::World,
            Self::Scene(_) => EntityKind::Scene,
            Self::Node(_) => EntityKind::Node,
            Self::Mesh(_) => EntityKind::Mesh,
            Self::Material(_) => EntityKind::Material,
            Self::Texture(_) => EntityKind::Texture,
            Self::Image(_) => EntityKind::Image,
            Self::Sampler(_) => EntityKind::Sampler,
            Self::Animation(_) => EntityKind::Animation,
            Self::Skin(_) => EntityKind::Skin,
            Self::Camera(_) => EntityKind::Camera,
            Self::Buffer(_) => EntityKind::Buffer,
            Self::BufferView(_) => EntityKind::BufferView,
            Self::Accessor(_) => EntityKind::Accessor,
        }
    }

    /// Shared properties.
    #[must_use]
    pub fn common(&self) -> &Common {
        dispatch!(self, e => &e.common)
    }

    /// Shared properties, mutably.
    pub fn common_mut(&mut self) -> &mut Common {
        dispatch!(self, e => &mut e.common)
    }

    /// Identity and version.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.common().identity
    }

    /// Entity uuid.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.identity().uuid
    }

    /// Owning world; `None` for a World.
    #[must_use]
    pub fn world_uuid(&self) -> Option<Uuid> {
        self.identity().world_uuid
    }

    /// The world this entity belongs to (its own uuid for a World).
    #[must_use]
    pub fn owner(&self) -> Uuid {
        self.world_uuid().unwrap_or_else(|| self.uuid())
    }

    /// Current version token.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.identity().updated_at
    }

    /// Engine hints attached to this entity.
    #[must_use]
    pub fn hints(&self) -> Option<&EngineHints> {
        self.common().extras.hints()
    }

    /// Outgoing references to other entities.
    #[must_use]
    pub fn references(&self) -> Vec<Reference> {
        dispatch!(self, e => e.references().0)
    }

    /// Removes every reference to `target`.
    pub fn detach(&mut self, target: Uuid) -> Detach {
        dispatch!(self, e => e.detach(target))
    }
}

fn is_absent(row: &Row, key: &str) -> bool {
    row.get(key).map_or(true, Value::is_null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_names_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_noun(kind.noun()), Some(kind));
            assert_eq!(EntityKind::from_table(kind.table()), Some(kind));
            assert_eq!(kind.metadata_table(), format!("{}_metadata", kind.table()));
        }
    }

    #[test]
    fn test_draft_stamps_identity() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let candidate = row(json!({"asset": {"version": "2.0"}}));
        let world = Entity::draft(EntityKind::World, candidate, now, "1.0.0").unwrap();
        assert_eq!(world.identity().created_at, now);
        assert_eq!(world.identity().updated_at, now);
        assert_eq!(world.identity().schema_version.as_deref(), Some("1.0.0"));
        assert_eq!(world.world_uuid(), None);
        assert_eq!(world.owner(), world.uuid());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let err = Entity::draft(
            EntityKind::Node,
            row(json!({"worldUuid": Uuid::new_v4(), "vircadia_babylonjs_lod_mode": "distance"})),
            now,
            "1.0.0",
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("vircadia_babylonjs_lod_mode"));
    }

    #[test]
    fn test_world_must_not_belong_to_world() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let err = Entity::draft(
            EntityKind::World,
            row(json!({"worldUuid": Uuid::new_v4(), "asset": {"version": "2.0"}})),
            now,
            "1.0.0",
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("worldUuid"));

        let err = Entity::draft(EntityKind::Scene, row(json!({})), now, "1.0.0").unwrap_err();
        assert_eq!(err.field(), Some("worldUuid"));
    }
}
