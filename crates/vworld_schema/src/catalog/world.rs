//! World and Scene records.

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;
use vworld_shared::{Color3, Vector3};

use super::{clear, no_repeats, prune, Common, Detach, EntityKind, Record, Refs};
use crate::error::SchemaResult;
use crate::fields::Fields;

/// glTF `asset` block.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    /// glTF version, `<major>.<minor>`
    pub version: String,
    /// Minimum glTF version a loader must support
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
    /// Tool that produced the asset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    /// Copyright notice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    /// Anything else in the block
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Asset {
    /// Asset block declaring glTF `version`.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            min_version: None,
            generator: None,
            copyright: None,
            extra: Map::new(),
        }
    }

    fn parse(f: &Fields<'_>) -> SchemaResult<Self> {
        let version = f.req_str("version")?;
        if !is_major_minor(&version) {
            return Err(f.violation("version", "must match <major>.<minor>"));
        }
        let min_version = f.opt_str("minVersion")?;
        if min_version.as_deref().is_some_and(|v| !is_major_minor(v)) {
            return Err(f.violation("minVersion", "must match <major>.<minor>"));
        }
        Ok(Self {
            version,
            min_version,
            generator: f.opt_str("generator")?,
            copyright: f.opt_str("copyright")?,
            extra: f.rest(&["version", "minVersion", "generator", "copyright"]),
        })
    }
}

fn is_major_minor(version: &str) -> bool {
    let mut parts = version.split('.');
    let numeric = |part: Option<&str>| {
        part.is_some_and(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
    };
    numeric(parts.next()) && numeric(parts.next()) && parts.next().is_none()
}

/// Root container of a world.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldGltf {
    /// Shared properties
    #[serde(flatten)]
    pub common: Common,
    /// glTF asset block
    pub asset: Asset,
    /// Free-form world metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    /// Scene shown on load
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_scene: Option<Uuid>,
    /// Extensions used anywhere in the world
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extensions_used: Vec<String>,
    /// Extensions a loader must support
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extensions_required: Vec<String>,
}

impl Record for WorldGltf {
    const KIND: EntityKind = EntityKind::World;
    const FIELDS: &'static [&'static str] = &[
        "asset",
        "metadata",
        "defaultScene",
        "extensionsUsed",
        "extensionsRequired",
    ];

    fn parse(common: Common, f: &Fields<'_>) -> SchemaResult<Self> {
        let asset = f
            .nested("asset")?
            .ok_or_else(|| f.violation("asset", "is required"))?;
        let extensions_used = f.opt_str_list("extensionsUsed")?.unwrap_or_default();
        let extensions_required = f.opt_str_list("extensionsRequired")?.unwrap_or_default();

        for (i, name) in extensions_used.iter().enumerate() {
            if extensions_used[..i].contains(name) {
                return Err(f.violation(&format!("extensionsUsed[{i}]"), "must not repeat"));
            }
        }
        if let Some(i) = extensions_required
            .iter()
            .position(|name| !extensions_used.contains(name))
        {
            return Err(f.violation(
                &format!("extensionsRequired[{i}]"),
                "must also appear in extensionsUsed",
            ));
        }

        Ok(Self {
            common,
            asset: Asset::parse(&asset)?,
            metadata: f.opt_value("metadata"),
            default_scene: f.opt_uuid("defaultScene")?,
            extensions_used,
            extensions_required,
        })
    }

    fn references(&self) -> Refs {
        Refs::default().opt("defaultScene", EntityKind::Scene, self.default_scene)
    }

    fn detach(&mut self, target: Uuid) -> Detach {
        Detach::changed(clear(&mut self.default_scene, target))
    }
}

/// Renderer settings carried by a Scene.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneHints {
    /// Background color
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clear_color: Option<Color3>,
    /// Ambient light color
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ambient_color: Option<Color3>,
    /// Scene gravity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gravity: Option<Vector3>,
    /// Camera rendered by default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_camera: Option<Uuid>,
    /// Collision detection on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collisions_enabled: Option<bool>,
    /// Physics on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physics_enabled: Option<bool>,
    /// Gravity used by the physics engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physics_gravity: Option<Vector3>,
    /// Physics engine name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physics_engine: Option<String>,
    /// Start animations on load
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_animate: Option<bool>,
    /// First frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_animate_from: Option<f64>,
    /// Last frame
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_animate_to: Option<f64>,
    /// Loop the range
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_animate_loop: Option<bool>,
    /// Playback speed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_animate_speed: Option<f64>,
}

impl SceneHints {
    #[cfg(test)]
    const KEYS: [&'static str; 13] = [
        "clearColor",
        "ambientColor",
        "gravity",
        "activeCamera",
        "collisionsEnabled",
        "physicsEnabled",
        "physicsGravity",
        "physicsEngine",
        "autoAnimate",
        "autoAnimateFrom",
        "autoAnimateTo",
        "autoAnimateLoop",
        "autoAnimateSpeed",
    ];

    fn parse(f: &Fields<'_>) -> SchemaResult<Self> {
        let hints = Self {
            clear_color: color(f, "clearColor")?,
            ambient_color: color(f, "ambientColor")?,
            gravity: f.opt_typed("gravity", "an {x, y, z} vector")?,
            active_camera: f.opt_uuid("activeCamera")?,
            collisions_enabled: f.opt_bool("collisionsEnabled")?,
            physics_enabled: f.opt_bool("physicsEnabled")?,
            physics_gravity: f.opt_typed("physicsGravity", "an {x, y, z} vector")?,
            physics_engine: f.opt_str("physicsEngine")?,
            auto_animate: f.opt_bool("autoAnimate")?,
            auto_animate_from: f.opt_f64("autoAnimateFrom")?,
            auto_animate_to: f.opt_f64("autoAnimateTo")?,
            auto_animate_loop: f.opt_bool("autoAnimateLoop")?,
            auto_animate_speed: f.opt_non_negative("autoAnimateSpeed")?,
        };
        if let (Some(from), Some(to)) = (hints.auto_animate_from, hints.auto_animate_to) {
            if to < from {
                return Err(f.violation("autoAnimateTo", "must not precede autoAnimateFrom"));
            }
        }
        Ok(hints)
    }
}

fn color(f: &Fields<'_>, name: &str) -> SchemaResult<Option<Color3>> {
    match f.opt_typed::<Color3>(name, "an {r, g, b} color")? {
        Some(c) if !c.is_normalized() => Err(f.violation(name, "components must lie in [0, 1]")),
        other => Ok(other),
    }
}

/// A set of root nodes.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    /// Shared properties
    #[serde(flatten)]
    pub common: Common,
    /// Root nodes, in order
    pub nodes: Vec<Uuid>,
    /// Renderer settings
    #[serde(flatten)]
    pub hints: SceneHints,
}

impl Record for Scene {
    const KIND: EntityKind = EntityKind::Scene;
    const FIELDS: &'static [&'static str] = &[
        "nodes",
        "clearColor",
        "ambientColor",
        "gravity",
        "activeCamera",
        "collisionsEnabled",
        "physicsEnabled",
        "physicsGravity",
        "physicsEngine",
        "autoAnimate",
        "autoAnimateFrom",
        "autoAnimateTo",
        "autoAnimateLoop",
        "autoAnimateSpeed",
    ];

    fn parse(common: Common, f: &Fields<'_>) -> SchemaResult<Self> {
        let nodes = f.uuid_list("nodes")?;
        no_repeats(f, "nodes", &nodes)?;
        Ok(Self {
            common,
            nodes,
            hints: SceneHints::parse(f)?,
        })
    }

    fn references(&self) -> Refs {
        Refs::default()
            .list("nodes", EntityKind::Node, &self.nodes)
            .opt("activeCamera", EntityKind::Camera, self.hints.active_camera)
    }

    fn detach(&mut self, target: Uuid) -> Detach {
        let nodes = prune(&mut self.nodes, target);
        let camera = clear(&mut self.hints.active_camera, target);
        Detach::changed(nodes || camera)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Entity, Row};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn draft(kind: EntityKind, value: Value) -> SchemaResult<Entity> {
        let Value::Object(row) = value else { unreachable!() };
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        Entity::draft(kind, row, now, "1.0.0")
    }

    #[test]
    fn test_scene_hint_keys_match_fields() {
        for key in SceneHints::KEYS {
            assert!(Scene::FIELDS.contains(&key), "{key}");
        }
    }

    #[test]
    fn test_asset_version_pattern() {
        assert!(is_major_minor("2.0"));
        assert!(is_major_minor("10.12"));
        assert!(!is_major_minor("2"));
        assert!(!is_major_minor("2.0.1"));
        assert!(!is_major_minor("v2.0"));

        let err = draft(EntityKind::World, json!({"asset": {"version": "two"}})).unwrap_err();
        assert_eq!(err.field(), Some("asset.version"));
        let err = draft(EntityKind::World, json!({})).unwrap_err();
        assert_eq!(err.field(), Some("asset"));
    }

    #[test]
    fn test_required_extensions_must_be_used() {
        let err = draft(
            EntityKind::World,
            json!({
                "asset": {"version": "2.0"},
                "extensionsUsed": ["KHR_lights_punctual"],
                "extensionsRequired": ["KHR_draco_mesh_compression"]
            }),
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("extensionsRequired[0]"));
    }

    #[test]
    fn test_scene_hints() {
        let world = Uuid::new_v4();
        let scene = draft(
            EntityKind::Scene,
            json!({
                "worldUuid": world,
                "nodes": [],
                "clearColor": {"r": 0.1, "g": 0.2, "b": 0.3},
                "gravity": {"x": 0, "y": -9.81, "z": 0},
                "autoAnimateFrom": 0, "autoAnimateTo": 120, "autoAnimateSpeed": 1.5
            }),
        )
        .unwrap();
        let Entity::Scene(scene) = scene else { unreachable!() };
        assert_eq!(scene.hints.gravity, Some(Vector3::new(0.0, -9.81, 0.0)));
        assert_eq!(scene.hints.physics_enabled, None);

        let err = draft(
            EntityKind::Scene,
            json!({"worldUuid": world, "autoAnimateFrom": 10, "autoAnimateTo": 5}),
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("autoAnimateTo"));

        let err = draft(
            EntityKind::Scene,
            json!({"worldUuid": world, "ambientColor": {"r": 2.0, "g": 0, "b": 0}}),
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("ambientColor"));
    }

    #[test]
    fn test_scene_detach() {
        let world = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut scene =
            draft(EntityKind::Scene, json!({"worldUuid": world, "nodes": [a, b]})).unwrap();
        assert_eq!(scene.detach(a), Detach::Detached);
        assert_eq!(scene.detach(a), Detach::Untouched);
        let row: Row = scene.to_row();
        assert_eq!(row["nodes"], json!([b]));
    }
}
