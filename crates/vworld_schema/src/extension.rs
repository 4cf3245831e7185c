//! # Engine Hints - Extension Namespace
//!
//! Renderer-specific hints that may ride on *any* entity without touching its
//! glTF fields. They live in the entity's `extras` under the `vircadia` key:
//!
//! ```text
//! extras
//! ├── vircadia
//! │   ├── lod        { mode, auto, distance, size, hide }
//! │   ├── billboard  { mode }
//! │   ├── light      { lightmap, level, colorSpace, texcoord, useAsShadowmap, mode }
//! │   ├── script     { agentScripts, persistentScripts }
//! │   └── ...        unknown keys, kept verbatim
//! └── ...            other glTF extras, kept verbatim
//! ```
//!
//! Every hint is optional. `None` means "renderer default", which is not the
//! same thing as an explicit `false` or `0`.

use std::ops::BitOr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SchemaError, SchemaResult};
use crate::fields::Fields;

crate::closed_label! {
    /// How an LOD level is selected.
    pub enum LodMode {
        /// Camera distance
        Distance => "distance",
        /// Projected screen size
        Size => "size",
    }
}

crate::closed_label! {
    /// Color space of a lightmap texture.
    pub enum ColorSpace {
        /// Linear
        Linear => "linear",
        /// sRGB
        Srgb => "sRGB",
        /// Gamma
        Gamma => "gamma",
    }
}

crate::closed_label! {
    /// How a lightmap contributes to shading.
    pub enum LightMode {
        /// Full lightmap contribution
        Default => "default",
        /// Shadows only
        ShadowsOnly => "shadowsOnly",
        /// Specular only
        Specular => "specular",
    }
}

/// Axes that always face the viewer.
///
/// A bitmask over `X = 1`, `Y = 2`, `Z = 4`; only `NONE`, the three single
/// axes and `ALL` are valid values.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct BillboardMode(u8);

impl BillboardMode {
    /// No billboarding
    pub const NONE: Self = Self(0);
    /// Rotate around X
    pub const X: Self = Self(1);
    /// Rotate around Y
    pub const Y: Self = Self(2);
    /// Rotate around Z
    pub const Z: Self = Self(4);
    /// Fully face the viewer
    pub const ALL: Self = Self(7);

    const VALID: [u8; 5] = [0, 1, 2, 4, 7];

    /// Accepts only the five valid bit patterns.
    #[must_use]
    pub fn from_bits(bits: u8) -> Option<Self> {
        Self::VALID.contains(&bits).then_some(Self(bits))
    }

    /// Raw bits
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// True if every axis of `axis` is set.
    #[must_use]
    pub const fn contains(self, axis: Self) -> bool {
        self.0 & axis.0 == axis.0
    }

    /// Bitwise union, if the result is itself a valid mode.
    #[must_use]
    pub fn combine(self, other: Self) -> Option<Self> {
        Self::from_bits(self.0 | other.0)
    }
}

impl BitOr for BillboardMode {
    type Output = Option<Self>;

    fn bitor(self, rhs: Self) -> Option<Self> {
        self.combine(rhs)
    }
}

impl TryFrom<u8> for BillboardMode {
    type Error = SchemaError;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        Self::from_bits(bits)
            .ok_or_else(|| SchemaError::schema("billboard", "mode", "must be one of 0|1|2|4|7"))
    }
}

impl From<BillboardMode> for u8 {
    fn from(mode: BillboardMode) -> Self {
        mode.0
    }
}

/// Script run by each connected agent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentScript {
    /// Script reference
    pub script: String,
    /// Unit test reference
    pub unit_test: String,
}

/// Script run by one designated agent for the lifetime of the world.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistentScript {
    /// Agent responsible for running the script
    pub runner_agent_id: String,
    /// Script reference
    pub script: String,
    /// Unit test reference
    pub unit_test: String,
}

/// Level-of-detail hints.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LodHints {
    /// Selection mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<LodMode>,
    /// Let the renderer generate levels
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto: Option<bool>,
    /// Switch distance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    /// Switch screen size
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    /// Hide beyond this threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hide: Option<f64>,
    /// Unknown keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LodHints {
    fn parse(f: &Fields<'_>) -> SchemaResult<Self> {
        Ok(Self {
            mode: f.opt_label("mode")?,
            auto: f.opt_bool("auto")?,
            distance: f.opt_non_negative("distance")?,
            size: f.opt_non_negative("size")?,
            hide: f.opt_non_negative("hide")?,
            extra: f.rest(&["mode", "auto", "distance", "size", "hide"]),
        })
    }

    fn merge(&mut self, overlay: Self) {
        set(&mut self.mode, overlay.mode);
        set(&mut self.auto, overlay.auto);
        set(&mut self.distance, overlay.distance);
        set(&mut self.size, overlay.size);
        set(&mut self.hide, overlay.hide);
        self.extra.extend(overlay.extra);
    }
}

/// Billboard hints.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BillboardHints {
    /// Axis mask
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<BillboardMode>,
    /// Unknown keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BillboardHints {
    fn parse(f: &Fields<'_>) -> SchemaResult<Self> {
        let mode = match f.get("mode") {
            None => None,
            Some(v) => Some(
                v.as_u64()
                    .and_then(|bits| u8::try_from(bits).ok())
                    .and_then(BillboardMode::from_bits)
                    .ok_or_else(|| f.violation("mode", "must be one of 0|1|2|4|7"))?,
            ),
        };
        Ok(Self {
            mode,
            extra: f.rest(&["mode"]),
        })
    }
}

/// Lightmap hints.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LightHints {
    /// Lightmap texture reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lightmap: Option<String>,
    /// Intensity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
    /// Texture color space
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_space: Option<ColorSpace>,
    /// UV set used for the lightmap
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texcoord: Option<u32>,
    /// Treat the lightmap as a shadow map
    #[serde(skip_serializing_if = "Option::is_none")]
    pub use_as_shadowmap: Option<bool>,
    /// Shading contribution
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<LightMode>,
    /// Unknown keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LightHints {
    fn parse(f: &Fields<'_>) -> SchemaResult<Self> {
        Ok(Self {
            lightmap: f.opt_str("lightmap")?,
            level: f.opt_non_negative("level")?,
            color_space: f.opt_label("colorSpace")?,
            texcoord: f.opt_u32("texcoord")?,
            use_as_shadowmap: f.opt_bool("useAsShadowmap")?,
            mode: f.opt_label("mode")?,
            extra: f.rest(&[
                "lightmap",
                "level",
                "colorSpace",
                "texcoord",
                "useAsShadowmap",
                "mode",
            ]),
        })
    }

    fn merge(&mut self, overlay: Self) {
        set(&mut self.lightmap, overlay.lightmap);
        set(&mut self.level, overlay.level);
        set(&mut self.color_space, overlay.color_space);
        set(&mut self.texcoord, overlay.texcoord);
        set(&mut self.use_as_shadowmap, overlay.use_as_shadowmap);
        set(&mut self.mode, overlay.mode);
        self.extra.extend(overlay.extra);
    }
}

/// Attached scripts.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptHints {
    /// Scripts every agent runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_scripts: Option<Vec<AgentScript>>,
    /// Scripts one runner agent keeps alive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_scripts: Option<Vec<PersistentScript>>,
    /// Unknown keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScriptHints {
    fn parse(f: &Fields<'_>) -> SchemaResult<Self> {
        Ok(Self {
            agent_scripts: f.opt_typed("agentScripts", "an array of {script, unitTest}")?,
            persistent_scripts: f.opt_typed(
                "persistentScripts",
                "an array of {runnerAgentId, script, unitTest}",
            )?,
            extra: f.rest(&["agentScripts", "persistentScripts"]),
        })
    }

    fn merge(&mut self, overlay: Self) {
        set(&mut self.agent_scripts, overlay.agent_scripts);
        set(&mut self.persistent_scripts, overlay.persistent_scripts);
        self.extra.extend(overlay.extra);
    }
}

/// The validated `extras.vircadia` record.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EngineHints {
    /// Level of detail
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lod: Option<LodHints>,
    /// Billboarding
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billboard: Option<BillboardHints>,
    /// Lightmapping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub light: Option<LightHints>,
    /// Attached scripts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<ScriptHints>,
    /// Unknown keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EngineHints {
    pub(crate) fn parse(f: &Fields<'_>) -> SchemaResult<Self> {
        Ok(Self {
            lod: f.nested("lod")?.map(|g| LodHints::parse(&g)).transpose()?,
            billboard: f
                .nested("billboard")?
                .map(|g| BillboardHints::parse(&g))
                .transpose()?,
            light: f.nested("light")?.map(|g| LightHints::parse(&g)).transpose()?,
            script: f.nested("script")?.map(|g| ScriptHints::parse(&g)).transpose()?,
            extra: f.rest(&["lod", "billboard", "light", "script"]),
        })
    }

    /// Overlays every hint that `overlay` sets; hints it leaves unset are kept.
    pub fn merge(&mut self, overlay: Self) {
        merge_group(&mut self.lod, overlay.lod, LodHints::merge);
        merge_group(&mut self.billboard, overlay.billboard, |dst, src| {
            set(&mut dst.mode, src.mode);
            dst.extra.extend(src.extra);
        });
        merge_group(&mut self.light, overlay.light, LightHints::merge);
        merge_group(&mut self.script, overlay.script, ScriptHints::merge);
        self.extra.extend(overlay.extra);
    }

    /// True when nothing is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lod.is_none()
            && self.billboard.is_none()
            && self.light.is_none()
            && self.script.is_none()
            && self.extra.is_empty()
    }

    /// `lodMode`
    #[must_use]
    pub fn lod_mode(&self) -> Option<LodMode> {
        self.lod.as_ref().and_then(|g| g.mode)
    }

    /// `lodAuto`
    #[must_use]
    pub fn lod_auto(&self) -> Option<bool> {
        self.lod.as_ref().and_then(|g| g.auto)
    }

    /// `lodDistance`
    #[must_use]
    pub fn lod_distance(&self) -> Option<f64> {
        self.lod.as_ref().and_then(|g| g.distance)
    }

    /// `lodSize`
    #[must_use]
    pub fn lod_size(&self) -> Option<f64> {
        self.lod.as_ref().and_then(|g| g.size)
    }

    /// `lodHide`
    #[must_use]
    pub fn lod_hide(&self) -> Option<f64> {
        self.lod.as_ref().and_then(|g| g.hide)
    }

    /// `billboardMode`
    #[must_use]
    pub fn billboard_mode(&self) -> Option<BillboardMode> {
        self.billboard.as_ref().and_then(|g| g.mode)
    }

    /// `lightLightmap`
    #[must_use]
    pub fn light_lightmap(&self) -> Option<&str> {
        self.light.as_ref().and_then(|g| g.lightmap.as_deref())
    }

    /// `lightLevel`
    #[must_use]
    pub fn light_level(&self) -> Option<f64> {
        self.light.as_ref().and_then(|g| g.level)
    }

    /// `lightColorSpace`
    #[must_use]
    pub fn light_color_space(&self) -> Option<ColorSpace> {
        self.light.as_ref().and_then(|g| g.color_space)
    }

    /// `lightTexcoord`
    #[must_use]
    pub fn light_texcoord(&self) -> Option<u32> {
        self.light.as_ref().and_then(|g| g.texcoord)
    }

    /// `lightUseAsShadowmap`
    #[must_use]
    pub fn light_use_as_shadowmap(&self) -> Option<bool> {
        self.light.as_ref().and_then(|g| g.use_as_shadowmap)
    }

    /// `lightMode`
    #[must_use]
    pub fn light_mode(&self) -> Option<LightMode> {
        self.light.as_ref().and_then(|g| g.mode)
    }

    /// `scriptAgentScripts`
    #[must_use]
    pub fn agent_scripts(&self) -> Option<&[AgentScript]> {
        self.script.as_ref().and_then(|g| g.agent_scripts.as_deref())
    }

    /// `scriptPersistentScripts`
    #[must_use]
    pub fn persistent_scripts(&self) -> Option<&[PersistentScript]> {
        self.script
            .as_ref()
            .and_then(|g| g.persistent_scripts.as_deref())
    }
}

/// glTF `extras` with the engine hints split out.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Extras {
    /// Engine hints
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vircadia: Option<EngineHints>,
    /// Everything else, passed through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Extras {
    /// Reads `extras` from a record view.
    pub(crate) fn parse(record: &Fields<'_>) -> SchemaResult<Self> {
        let Some(f) = record.nested("extras")? else {
            return Ok(Self::default());
        };
        Ok(Self {
            vircadia: f
                .nested("vircadia")?
                .map(|g| EngineHints::parse(&g))
                .transpose()?,
            extra: f.rest(&["vircadia"]),
        })
    }

    /// True when there is nothing to persist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vircadia.is_none() && self.extra.is_empty()
    }

    /// Engine hints, if any are attached.
    #[must_use]
    pub fn hints(&self) -> Option<&EngineHints> {
        self.vircadia.as_ref()
    }

    /// Merges hints into whatever is already attached.
    pub fn merge_hints(&mut self, overlay: EngineHints) {
        self.vircadia.get_or_insert_with(EngineHints::default).merge(overlay);
    }
}

fn set<T>(dst: &mut Option<T>, src: Option<T>) {
    if src.is_some() {
        *dst = src;
    }
}

fn merge_group<T>(dst: &mut Option<T>, src: Option<T>, merge: impl FnOnce(&mut T, T)) {
    match (dst.as_mut(), src) {
        (Some(existing), Some(overlay)) => merge(existing, overlay),
        (None, Some(overlay)) => *dst = Some(overlay),
        (_, None) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(extras: Value) -> SchemaResult<Extras> {
        let row = json!({ "extras": extras });
        let Value::Object(obj) = &row else { unreachable!() };
        Extras::parse(&Fields::new("node", obj))
    }

    #[test]
    fn test_billboard_domain() {
        for bits in [0u8, 1, 2, 4, 7] {
            assert!(BillboardMode::from_bits(bits).is_some());
        }
        for bits in [3u8, 5, 6, 8, 255] {
            assert!(BillboardMode::from_bits(bits).is_none());
        }
    }

    #[test]
    fn test_billboard_combine() {
        assert_eq!(BillboardMode::X | BillboardMode::NONE, Some(BillboardMode::X));
        assert_eq!(BillboardMode::X | BillboardMode::Y, None);
        assert_eq!(BillboardMode::ALL | BillboardMode::Z, Some(BillboardMode::ALL));
        assert!(BillboardMode::ALL.contains(BillboardMode::Y));
        assert!(!BillboardMode::X.contains(BillboardMode::Z));
    }

    #[test]
    fn test_billboard_serde_rejects_invalid() {
        assert!(serde_json::from_value::<BillboardMode>(json!(3)).is_err());
        let mode: BillboardMode = serde_json::from_value(json!(4)).unwrap();
        assert_eq!(mode, BillboardMode::Z);
    }

    #[test]
    fn test_invalid_billboard_names_field() {
        let err = parse(json!({"vircadia": {"billboard": {"mode": 3}}})).unwrap_err();
        assert!(err.is_schema_violation());
        assert_eq!(err.field(), Some("extras.vircadia.billboard.mode"));
    }

    #[test]
    fn test_closed_enums() {
        let err = parse(json!({"vircadia": {"lod": {"mode": "angle"}}})).unwrap_err();
        assert_eq!(err.field(), Some("extras.vircadia.lod.mode"));

        let err = parse(json!({"vircadia": {"light": {"colorSpace": "SRGB"}}})).unwrap_err();
        assert_eq!(err.field(), Some("extras.vircadia.light.colorSpace"));

        let err = parse(json!({"vircadia": {"light": {"mode": "bright"}}})).unwrap_err();
        assert_eq!(err.field(), Some("extras.vircadia.light.mode"));
    }

    #[test]
    fn test_absent_is_not_off() {
        let extras = parse(json!({"vircadia": {"lod": {"auto": false}}})).unwrap();
        let hints = extras.hints().unwrap();
        assert_eq!(hints.lod_auto(), Some(false));
        assert_eq!(hints.lod_distance(), None);
        assert_eq!(hints.billboard_mode(), None);
    }

    #[test]
    fn test_unknown_keys_pass_through() {
        let extras = parse(json!({
            "author": "atelier",
            "vircadia": {"physics": {"mass": 2}, "light": {"level": 0.5, "bakedBy": "tool"}}
        }))
        .unwrap();
        assert_eq!(extras.extra["author"], json!("atelier"));
        let hints = extras.hints().unwrap();
        assert_eq!(hints.extra["physics"], json!({"mass": 2}));
        assert_eq!(hints.light.as_ref().unwrap().extra["bakedBy"], json!("tool"));

        let back = serde_json::to_value(&extras).unwrap();
        assert_eq!(back["vircadia"]["light"], json!({"level": 0.5, "bakedBy": "tool"}));
    }

    #[test]
    fn test_merge_keeps_unset_hints() {
        let mut extras =
            parse(json!({"vircadia": {"lod": {"mode": "distance", "distance": 50.0}}})).unwrap();
        extras.merge_hints(EngineHints {
            lod: Some(LodHints {
                distance: Some(80.0),
                ..LodHints::default()
            }),
            billboard: Some(BillboardHints {
                mode: Some(BillboardMode::Y),
                ..BillboardHints::default()
            }),
            ..EngineHints::default()
        });

        let hints = extras.hints().unwrap();
        assert_eq!(hints.lod_mode(), Some(LodMode::Distance));
        assert_eq!(hints.lod_distance(), Some(80.0));
        assert_eq!(hints.billboard_mode(), Some(BillboardMode::Y));
    }

    #[test]
    fn test_scripts() {
        let extras = parse(json!({"vircadia": {"script": {
            "agentScripts": [{"script": "door.js", "unitTest": "door.test.js"}],
            "persistentScripts": [
                {"runnerAgentId": "a-1", "script": "tide.js", "unitTest": "tide.test.js"}
            ]
        }}}))
        .unwrap();
        let hints = extras.hints().unwrap();
        assert_eq!(hints.agent_scripts().unwrap()[0].script, "door.js");
        assert_eq!(hints.persistent_scripts().unwrap()[0].runner_agent_id, "a-1");

        let err =
            parse(json!({"vircadia": {"script": {"agentScripts": ["door.js"]}}})).unwrap_err();
        assert_eq!(err.field(), Some("extras.vircadia.script.agentScripts"));
    }
}
