//! Geometry and surface records: meshes, materials, textures, images and
//! samplers.

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{clear, Common, Detach, EntityKind, Record, Refs};
use crate::error::SchemaResult;
use crate::fields::Fields;

crate::closed_label! {
    /// Alpha blending mode of a material.
    pub enum AlphaMode {
        /// Fully opaque
        Opaque => "OPAQUE",
        /// Alpha-tested against `alphaCutoff`
        Mask => "MASK",
        /// Alpha-blended
        Blend => "BLEND",
    }
}

crate::closed_label! {
    /// Encodings an image may use.
    pub enum ImageMimeType {
        /// JPEG
        Jpeg => "image/jpeg",
        /// PNG
        Png => "image/png",
    }
}

/// Geometry to be rendered.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mesh {
    /// Shared properties
    #[serde(flatten)]
    pub common: Common,
    /// Primitives, each with an `attributes` object
    pub primitives: Vec<Value>,
    /// Default morph target weights
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
}

impl Record for Mesh {
    const KIND: EntityKind = EntityKind::Mesh;
    const FIELDS: &'static [&'static str] = &["primitives", "weights"];

    fn parse(common: Common, f: &Fields<'_>) -> SchemaResult<Self> {
        let primitives = f.values("primitives", true)?;
        for (i, primitive) in primitives.iter().enumerate() {
            let p = Fields::object(f.record(), &f.path(&format!("primitives[{i}]")), primitive)?;
            match p.opt_map("attributes")? {
                Some(attributes) if !attributes.is_empty() => {}
                _ => return Err(p.violation("attributes", "must be a non-empty object")),
            }
            if p.opt_u32("mode")?.is_some_and(|mode| mode > 6) {
                return Err(p.violation("mode", "must be a primitive topology in 0..=6"));
            }
        }
        Ok(Self {
            common,
            primitives,
            weights: f.opt_numbers("weights", None)?,
        })
    }
}

/// Surface appearance.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Material {
    /// Shared properties
    #[serde(flatten)]
    pub common: Common,
    /// Metallic-roughness parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pbr_metallic_roughness: Option<Map<String, Value>>,
    /// Tangent-space normal map
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normal_texture: Option<Map<String, Value>>,
    /// Occlusion map
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occlusion_texture: Option<Map<String, Value>>,
    /// Emissive map
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emissive_texture: Option<Map<String, Value>>,
    /// Emissive RGB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub emissive_factor: Option<[f64; 3]>,
    /// Alpha blending mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha_mode: Option<AlphaMode>,
    /// Alpha test threshold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alpha_cutoff: Option<f64>,
    /// Disable back-face culling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub double_sided: Option<bool>,
}

impl Record for Material {
    const KIND: EntityKind = EntityKind::Material;
    const FIELDS: &'static [&'static str] = &[
        "pbrMetallicRoughness",
        "normalTexture",
        "occlusionTexture",
        "emissiveTexture",
        "emissiveFactor",
        "alphaMode",
        "alphaCutoff",
        "doubleSided",
    ];

    fn parse(common: Common, f: &Fields<'_>) -> SchemaResult<Self> {
        if let Some(pbr) = f.nested("pbrMetallicRoughness")? {
            unit_range(&pbr, "baseColorFactor", pbr.opt_numbers("baseColorFactor", Some(4))?)?;
            unit_range(&pbr, "metallicFactor", pbr.opt_f64("metallicFactor")?.map(|v| vec![v]))?;
            unit_range(&pbr, "roughnessFactor", pbr.opt_f64("roughnessFactor")?.map(|v| vec![v]))?;
        }
        let emissive_factor = f.opt_array::<3>("emissiveFactor")?;
        unit_range(f, "emissiveFactor", emissive_factor.map(Vec::from))?;

        Ok(Self {
            common,
            pbr_metallic_roughness: f.opt_map("pbrMetallicRoughness")?,
            normal_texture: f.opt_map("normalTexture")?,
            occlusion_texture: f.opt_map("occlusionTexture")?,
            emissive_texture: f.opt_map("emissiveTexture")?,
            emissive_factor,
            alpha_mode: f.opt_label("alphaMode")?,
            alpha_cutoff: f.opt_non_negative("alphaCutoff")?,
            double_sided: f.opt_bool("doubleSided")?,
        })
    }
}

fn unit_range(f: &Fields<'_>, name: &str, values: Option<Vec<f64>>) -> SchemaResult<()> {
    match values {
        Some(values) if values.iter().any(|v| !(0.0..=1.0).contains(v)) => {
            Err(f.violation(name, "values must lie in [0, 1]"))
        }
        _ => Ok(()),
    }
}

/// An image paired with a sampler.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Texture {
    /// Shared properties
    #[serde(flatten)]
    pub common: Common,
    /// Sampler; renderer default when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sampler: Option<Uuid>,
    /// Source image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<Uuid>,
}

impl Record for Texture {
    const KIND: EntityKind = EntityKind::Texture;
    const FIELDS: &'static [&'static str] = &["sampler", "source"];

    fn parse(common: Common, f: &Fields<'_>) -> SchemaResult<Self> {
        Ok(Self {
            common,
            sampler: f.opt_uuid("sampler")?,
            source: f.opt_uuid("source")?,
        })
    }

    fn references(&self) -> Refs {
        Refs::default()
            .opt("sampler", EntityKind::Sampler, self.sampler)
            .opt("source", EntityKind::Image, self.source)
    }

    fn detach(&mut self, target: Uuid) -> Detach {
        let sampler = clear(&mut self.sampler, target);
        let source = clear(&mut self.source, target);
        Detach::changed(sampler || source)
    }
}

/// Image data, by URI or embedded in a buffer view.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    /// Shared properties
    #[serde(flatten)]
    pub common: Common,
    /// External or data URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Encoding; required with `bufferView`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<ImageMimeType>,
    /// Buffer view holding the encoded image
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<Uuid>,
}

impl Record for Image {
    const KIND: EntityKind = EntityKind::Image;
    const FIELDS: &'static [&'static str] = &["uri", "mimeType", "bufferView"];

    fn parse(common: Common, f: &Fields<'_>) -> SchemaResult<Self> {
        let image = Self {
            common,
            uri: f.opt_str("uri")?,
            mime_type: f.opt_label("mimeType")?,
            buffer_view: f.opt_uuid("bufferView")?,
        };
        if image.buffer_view.is_some() {
            if image.uri.is_some() {
                return Err(f.violation("uri", "must not be combined with bufferView"));
            }
            if image.mime_type.is_none() {
                return Err(f.violation("mimeType", "is required with bufferView"));
            }
        }
        Ok(image)
    }

    fn references(&self) -> Refs {
        Refs::default().opt("bufferView", EntityKind::BufferView, self.buffer_view)
    }

    fn detach(&mut self, target: Uuid) -> Detach {
        Detach::changed(clear(&mut self.buffer_view, target))
    }
}

/// Texture filtering and wrapping.
///
/// Values are the WebGL enums glTF uses.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sampler {
    /// Shared properties
    #[serde(flatten)]
    pub common: Common,
    /// Magnification filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mag_filter: Option<u32>,
    /// Minification filter
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_filter: Option<u32>,
    /// S wrapping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap_s: Option<u32>,
    /// T wrapping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wrap_t: Option<u32>,
}

impl Sampler {
    /// `NEAREST`, `LINEAR`
    pub const MAG_FILTERS: [u32; 2] = [9728, 9729];
    /// `NEAREST`, `LINEAR` and the four mipmap variants
    pub const MIN_FILTERS: [u32; 6] = [9728, 9729, 9984, 9985, 9986, 9987];
    /// `CLAMP_TO_EDGE`, `MIRRORED_REPEAT`, `REPEAT`
    pub const WRAP_MODES: [u32; 3] = [33071, 33648, 10497];
}

impl Record for Sampler {
    const KIND: EntityKind = EntityKind::Sampler;
    const FIELDS: &'static [&'static str] = &["magFilter", "minFilter", "wrapS", "wrapT"];

    fn parse(common: Common, f: &Fields<'_>) -> SchemaResult<Self> {
        Ok(Self {
            common,
            mag_filter: f.opt_code("magFilter", &Self::MAG_FILTERS)?,
            min_filter: f.opt_code("minFilter", &Self::MIN_FILTERS)?,
            wrap_s: f.opt_code("wrapS", &Self::WRAP_MODES)?,
            wrap_t: f.opt_code("wrapT", &Self::WRAP_MODES)?,
        })
    }
}
