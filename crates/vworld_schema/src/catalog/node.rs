//! Scene-graph nodes.

use serde::Serialize;
use uuid::Uuid;

use super::{clear, no_repeats, prune, Common, Detach, EntityKind, Record, Refs};
use crate::error::SchemaResult;
use crate::fields::Fields;

/// A node in the scene graph.
///
/// The transform is either a column-major `matrix` or any combination of
/// `rotation` (unit quaternion `x, y, z, w`), `scale` and `translation`,
/// never both.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Shared properties
    #[serde(flatten)]
    pub common: Common,
    /// Attached camera
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera: Option<Uuid>,
    /// Child nodes; the relation is acyclic
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Uuid>,
    /// Skin deforming the attached mesh
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skin: Option<Uuid>,
    /// Attached mesh
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mesh: Option<Uuid>,
    /// Local transform as a 4x4 matrix
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<[f64; 16]>,
    /// Local rotation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<[f64; 4]>,
    /// Local scale
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<[f64; 3]>,
    /// Local translation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<[f64; 3]>,
    /// Morph target weights
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weights: Option<Vec<f64>>,
}

impl Node {
    /// True if the node carries any transform.
    #[must_use]
    pub fn has_transform(&self) -> bool {
        self.matrix.is_some()
            || self.rotation.is_some()
            || self.scale.is_some()
            || self.translation.is_some()
    }
}

impl Record for Node {
    const KIND: EntityKind = EntityKind::Node;
    const FIELDS: &'static [&'static str] = &[
        "camera",
        "children",
        "skin",
        "mesh",
        "matrix",
        "rotation",
        "scale",
        "translation",
        "weights",
    ];

    fn parse(common: Common, f: &Fields<'_>) -> SchemaResult<Self> {
        let children = f.uuid_list("children")?;
        no_repeats(f, "children", &children)?;

        let node = Self {
            common,
            camera: f.opt_uuid("camera")?,
            children,
            skin: f.opt_uuid("skin")?,
            mesh: f.opt_uuid("mesh")?,
            matrix: f.opt_array("matrix")?,
            rotation: f.opt_array("rotation")?,
            scale: f.opt_array("scale")?,
            translation: f.opt_array("translation")?,
            weights: f.opt_numbers("weights", None)?,
        };

        if node.matrix.is_some()
            && (node.rotation.is_some() || node.scale.is_some() || node.translation.is_some())
        {
            return Err(f.violation(
                "matrix",
                "must not be combined with rotation, scale or translation",
            ));
        }
        if node.skin.is_some() && node.mesh.is_none() {
            return Err(f.violation("skin", "requires a mesh"));
        }
        Ok(node)
    }

    fn references(&self) -> Refs {
        Refs::default()
            .opt("camera", EntityKind::Camera, self.camera)
            .opt("mesh", EntityKind::Mesh, self.mesh)
            .opt("skin", EntityKind::Skin, self.skin)
            .list("children", EntityKind::Node, &self.children)
    }

    fn detach(&mut self, target: Uuid) -> Detach {
        let camera = clear(&mut self.camera, target);
        let mesh = clear(&mut self.mesh, target);
        let children = prune(&mut self.children, target);
        // A skin is meaningless without its mesh
        let skin = if mesh { self.skin.take().is_some() } else { clear(&mut self.skin, target) };
        Detach::changed(camera || mesh || skin || children)
    }
}
