//! Animations, skins and cameras.

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{clear, no_repeats, prune, Common, Detach, EntityKind, Record, Refs};
use crate::error::SchemaResult;
use crate::fields::Fields;

crate::closed_label! {
    /// Camera projection.
    pub enum CameraType {
        /// Perspective projection
        Perspective => "perspective",
        /// Orthographic projection
        Orthographic => "orthographic",
    }
}

crate::closed_label! {
    /// Property an animation channel drives.
    enum TargetPath {
        /// Node translation
        Translation => "translation",
        /// Node rotation
        Rotation => "rotation",
        /// Node scale
        Scale => "scale",
        /// Morph target weights
        Weights => "weights",
    }
}

crate::closed_label! {
    /// Keyframe interpolation.
    enum Interpolation {
        /// Linear
        Linear => "LINEAR",
        /// Step
        Step => "STEP",
        /// Cubic spline
        CubicSpline => "CUBICSPLINE",
    }
}

/// Keyframe animation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Animation {
    /// Shared properties
    #[serde(flatten)]
    pub common: Common,
    /// Channels: which sampler drives which property
    pub channels: Vec<Value>,
    /// Samplers: keyframe inputs and outputs
    pub samplers: Vec<Value>,
}

impl Record for Animation {
    const KIND: EntityKind = EntityKind::Animation;
    const FIELDS: &'static [&'static str] = &["channels", "samplers"];

    fn parse(common: Common, f: &Fields<'_>) -> SchemaResult<Self> {
        let channels = f.values("channels", true)?;
        for (i, channel) in channels.iter().enumerate() {
            let c = Fields::object(f.record(), &f.path(&format!("channels[{i}]")), channel)?;
            if c.get("sampler").is_none() {
                return Err(c.violation("sampler", "is required"));
            }
            let target = c
                .nested("target")?
                .ok_or_else(|| c.violation("target", "is required"))?;
            target.req_label::<TargetPath>("path")?;
        }

        let samplers = f.values("samplers", true)?;
        for (i, sampler) in samplers.iter().enumerate() {
            let s = Fields::object(f.record(), &f.path(&format!("samplers[{i}]")), sampler)?;
            for required in ["input", "output"] {
                if s.get(required).is_none() {
                    return Err(s.violation(required, "is required"));
                }
            }
            s.opt_label::<Interpolation>("interpolation")?;
        }

        Ok(Self {
            common,
            channels,
            samplers,
        })
    }
}

/// Joints and inverse bind matrices for vertex skinning.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Skin {
    /// Shared properties
    #[serde(flatten)]
    pub common: Common,
    /// Accessor of 4x4 inverse bind matrices
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inverse_bind_matrices: Option<Uuid>,
    /// Skeleton root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skeleton: Option<Uuid>,
    /// Joint nodes
    pub joints: Vec<Uuid>,
}

impl Record for Skin {
    const KIND: EntityKind = EntityKind::Skin;
    const FIELDS: &'static [&'static str] = &["inverseBindMatrices", "skeleton", "joints"];

    fn parse(common: Common, f: &Fields<'_>) -> SchemaResult<Self> {
        let joints = f.uuid_list("joints")?;
        if joints.is_empty() {
            return Err(f.violation("joints", "must be a non-empty array"));
        }
        no_repeats(f, "joints", &joints)?;
        Ok(Self {
            common,
            inverse_bind_matrices: f.opt_uuid("inverseBindMatrices")?,
            skeleton: f.opt_uuid("skeleton")?,
            joints,
        })
    }

    fn references(&self) -> Refs {
        Refs::default()
            .opt("inverseBindMatrices", EntityKind::Accessor, self.inverse_bind_matrices)
            .opt("skeleton", EntityKind::Node, self.skeleton)
            .list("joints", EntityKind::Node, &self.joints)
    }

    fn detach(&mut self, target: Uuid) -> Detach {
        let matrices = clear(&mut self.inverse_bind_matrices, target);
        let skeleton = clear(&mut self.skeleton, target);
        let joints = prune(&mut self.joints, target);
        if self.joints.is_empty() {
            return Detach::RequiredLost;
        }
        Detach::changed(matrices || skeleton || joints)
    }
}

/// A camera's projection.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Camera {
    /// Shared properties
    #[serde(flatten)]
    pub common: Common,
    /// Projection type
    #[serde(rename = "type")]
    pub camera_type: CameraType,
    /// Orthographic parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orthographic: Option<Map<String, Value>>,
    /// Perspective parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub perspective: Option<Map<String, Value>>,
}

impl Record for Camera {
    const KIND: EntityKind = EntityKind::Camera;
    const FIELDS: &'static [&'static str] = &["type", "orthographic", "perspective"];

    fn parse(common: Common, f: &Fields<'_>) -> SchemaResult<Self> {
        let camera_type: CameraType = f.req_label("type")?;
        let (own, other) = match camera_type {
            CameraType::Perspective => ("perspective", "orthographic"),
            CameraType::Orthographic => ("orthographic", "perspective"),
        };
        if f.get(other).is_some() {
            return Err(f.violation(other, format!("must be absent on a {camera_type} camera")));
        }
        let projection = f
            .nested(own)?
            .ok_or_else(|| f.violation(own, format!("is required on a {camera_type} camera")))?;
        match camera_type {
            CameraType::Perspective => check_perspective(&projection)?,
            CameraType::Orthographic => check_orthographic(&projection)?,
        }

        Ok(Self {
            common,
            camera_type,
            orthographic: f.opt_map("orthographic")?,
            perspective: f.opt_map("perspective")?,
        })
    }
}

fn positive(p: &Fields<'_>, name: &str, required: bool) -> SchemaResult<Option<f64>> {
    match p.opt_f64(name)? {
        Some(v) if v <= 0.0 => Err(p.violation(name, "must be > 0")),
        None if required => Err(p.violation(name, "is required")),
        other => Ok(other),
    }
}

fn check_perspective(p: &Fields<'_>) -> SchemaResult<()> {
    positive(p, "yfov", true)?;
    positive(p, "aspectRatio", false)?;
    let znear = positive(p, "znear", true)?;
    let zfar = positive(p, "zfar", false)?;
    if let (Some(near), Some(far)) = (znear, zfar) {
        if far <= near {
            return Err(p.violation("zfar", "must be greater than znear"));
        }
    }
    Ok(())
}

fn check_orthographic(p: &Fields<'_>) -> SchemaResult<()> {
    for mag in ["xmag", "ymag"] {
        match p.opt_f64(mag)? {
            None => return Err(p.violation(mag, "is required")),
            Some(v) if v == 0.0 => return Err(p.violation(mag, "must not be zero")),
            Some(_) => {}
        }
    }
    let near = p
        .opt_non_negative("znear")?
        .ok_or_else(|| p.violation("znear", "is required"))?;
    let far = positive(p, "zfar", true)?.unwrap_or_default();
    if far <= near {
        return Err(p.violation("zfar", "must be greater than znear"));
    }
    Ok(())
}
