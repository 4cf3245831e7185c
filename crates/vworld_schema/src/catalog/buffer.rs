//! Binary data: buffers, buffer views and accessors.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{clear, Common, Detach, EntityKind, Record, Refs};
use crate::error::{SchemaError, SchemaResult};
use crate::fields::Fields;

const COMPONENT_TYPES: &str = "must be one of 5120|5121|5122|5123|5125|5126";

crate::closed_label! {
    /// Shape of one accessor element.
    pub enum AccessorType {
        /// Scalar
        Scalar => "SCALAR",
        /// 2-vector
        Vec2 => "VEC2",
        /// 3-vector
        Vec3 => "VEC3",
        /// 4-vector
        Vec4 => "VEC4",
        /// 2x2 matrix
        Mat2 => "MAT2",
        /// 3x3 matrix
        Mat3 => "MAT3",
        /// 4x4 matrix
        Mat4 => "MAT4",
    }
}

impl AccessorType {
    /// Number of components per element.
    #[must_use]
    pub const fn components(self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Vec2 => 2,
            Self::Vec3 => 3,
            Self::Vec4 | Self::Mat2 => 4,
            Self::Mat3 => 9,
            Self::Mat4 => 16,
        }
    }
}

/// Storage type of accessor components, serialized as its GL enum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ComponentType {
    /// `i8`
    Byte,
    /// `u8`
    UnsignedByte,
    /// `i16`
    Short,
    /// `u16`
    UnsignedShort,
    /// `u32`
    UnsignedInt,
    /// `f32`
    Float,
}

impl ComponentType {
    /// All component types.
    pub const ALL: [Self; 6] = [
        Self::Byte,
        Self::UnsignedByte,
        Self::Short,
        Self::UnsignedShort,
        Self::UnsignedInt,
        Self::Float,
    ];

    /// GL enum value.
    #[must_use]
    pub const fn code(self) -> u32 {
        match self {
            Self::Byte => 5120,
            Self::UnsignedByte => 5121,
            Self::Short => 5122,
            Self::UnsignedShort => 5123,
            Self::UnsignedInt => 5125,
            Self::Float => 5126,
        }
    }

    /// Looks up a GL enum value.
    #[must_use]
    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|ty| ty.code() == code)
    }

    /// Size of one component in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        match self {
            Self::Byte | Self::UnsignedByte => 1,
            Self::Short | Self::UnsignedShort => 2,
            Self::UnsignedInt | Self::Float => 4,
        }
    }

    /// True for the types sparse indices may use.
    #[must_use]
    pub const fn is_index(self) -> bool {
        matches!(self, Self::UnsignedByte | Self::UnsignedShort | Self::UnsignedInt)
    }
}

impl TryFrom<u32> for ComponentType {
    type Error = SchemaError;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        Self::from_code(code).ok_or_else(|| {
            SchemaError::schema("accessor", "componentType", COMPONENT_TYPES)
        })
    }
}

impl From<ComponentType> for u32 {
    fn from(ty: ComponentType) -> Self {
        ty.code()
    }
}

/// Raw binary data.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Buffer {
    /// Shared properties
    #[serde(flatten)]
    pub common: Common,
    /// External or data URI
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    /// Length in bytes
    pub byte_length: u64,
    /// Inline bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

impl Record for Buffer {
    const KIND: EntityKind = EntityKind::Buffer;
    const FIELDS: &'static [&'static str] = &["uri", "byteLength", "data"];

    fn parse(common: Common, f: &Fields<'_>) -> SchemaResult<Self> {
        let byte_length = at_least_one(f, "byteLength")?;
        let data = f.opt_bytes("data")?;
        if let Some(data) = &data {
            if data.len() as u64 != byte_length {
                return Err(f.violation(
                    "data",
                    format!("holds {} bytes but byteLength is {byte_length}", data.len()),
                ));
            }
        }
        Ok(Self {
            common,
            uri: f.opt_str("uri")?,
            byte_length,
            data,
        })
    }
}

/// A slice of a buffer.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferView {
    /// Shared properties
    #[serde(flatten)]
    pub common: Common,
    /// Source buffer
    pub buffer: Uuid,
    /// Offset into the buffer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_offset: Option<u64>,
    /// Length in bytes
    pub byte_length: u64,
    /// Distance between interleaved elements
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_stride: Option<u32>,
    /// GPU binding hint
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
}

impl BufferView {
    /// `ARRAY_BUFFER`, `ELEMENT_ARRAY_BUFFER`
    pub const TARGETS: [u32; 2] = [34962, 34963];
}

impl Record for BufferView {
    const KIND: EntityKind = EntityKind::BufferView;
    const FIELDS: &'static [&'static str] =
        &["buffer", "byteOffset", "byteLength", "byteStride", "target"];

    fn parse(common: Common, f: &Fields<'_>) -> SchemaResult<Self> {
        let byte_stride = f.opt_u32("byteStride")?;
        if byte_stride.is_some_and(|s| !(4..=252).contains(&s) || s % 4 != 0) {
            return Err(f.violation("byteStride", "must be a multiple of 4 in [4, 252]"));
        }
        Ok(Self {
            common,
            buffer: f.req_uuid("buffer")?,
            byte_offset: f.opt_u64("byteOffset")?,
            byte_length: at_least_one(f, "byteLength")?,
            byte_stride,
            target: f.opt_code("target", &Self::TARGETS)?,
        })
    }

    fn references(&self) -> Refs {
        Refs::default().req("buffer", EntityKind::Buffer, self.buffer)
    }

    fn detach(&mut self, target: Uuid) -> Detach {
        if self.buffer == target {
            Detach::RequiredLost
        } else {
            Detach::Untouched
        }
    }
}

/// Indices of the sparse elements.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseIndices {
    /// View holding the indices
    pub buffer_view: Uuid,
    /// Offset into the view
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_offset: Option<u64>,
    /// Index storage type
    pub component_type: ComponentType,
}

/// Replacement values of the sparse elements.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SparseValues {
    /// View holding the values
    pub buffer_view: Uuid,
    /// Offset into the view
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_offset: Option<u64>,
}

/// Sparse overrides on top of an accessor's dense data.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AccessorSparse {
    /// Number of overridden elements
    pub count: u64,
    /// Where the overrides go
    pub indices: SparseIndices,
    /// The overriding values
    pub values: SparseValues,
}

impl AccessorSparse {
    fn parse(s: &Fields<'_>, dense_count: u64) -> SchemaResult<Self> {
        let count = at_least_one(s, "count")?;
        if count > dense_count {
            return Err(s.violation("count", "must not exceed the accessor count"));
        }

        let i = s
            .nested("indices")?
            .ok_or_else(|| s.violation("indices", "is required"))?;
        let component_type = component_type(&i)?;
        if !component_type.is_index() {
            return Err(i.violation("componentType", "must be one of 5121|5123|5125"));
        }

        let v = s
            .nested("values")?
            .ok_or_else(|| s.violation("values", "is required"))?;

        Ok(Self {
            count,
            indices: SparseIndices {
                buffer_view: i.req_uuid("bufferView")?,
                byte_offset: i.opt_u64("byteOffset")?,
                component_type,
            },
            values: SparseValues {
                buffer_view: v.req_uuid("bufferView")?,
                byte_offset: v.opt_u64("byteOffset")?,
            },
        })
    }
}

/// A typed view into a buffer view.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Accessor {
    /// Shared properties
    #[serde(flatten)]
    pub common: Common,
    /// Source view; all zeros when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_view: Option<Uuid>,
    /// Offset into the view
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_offset: Option<u64>,
    /// Component storage type
    pub component_type: ComponentType,
    /// Integers map to [0, 1] or [-1, 1]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<bool>,
    /// Number of elements
    pub count: u64,
    /// Element shape
    #[serde(rename = "type")]
    pub accessor_type: AccessorType,
    /// Per-component maximum
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Vec<f64>>,
    /// Per-component minimum
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Vec<f64>>,
    /// Sparse overrides
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sparse: Option<AccessorSparse>,
}

impl Record for Accessor {
    const KIND: EntityKind = EntityKind::Accessor;
    const FIELDS: &'static [&'static str] = &[
        "bufferView",
        "byteOffset",
        "componentType",
        "normalized",
        "count",
        "type",
        "max",
        "min",
        "sparse",
    ];

    fn parse(common: Common, f: &Fields<'_>) -> SchemaResult<Self> {
        let accessor_type: AccessorType = f.req_label("type")?;
        let component_type = component_type(f)?;
        let count = at_least_one(f, "count")?;
        let components = Some(accessor_type.components());

        let buffer_view = f.opt_uuid("bufferView")?;
        let byte_offset = f.opt_u64("byteOffset")?;
        if byte_offset.is_some() && buffer_view.is_none() {
            return Err(f.violation("byteOffset", "requires bufferView"));
        }
        let normalized = f.opt_bool("normalized")?;
        if normalized == Some(true)
            && matches!(component_type, ComponentType::Float | ComponentType::UnsignedInt)
        {
            return Err(f.violation("normalized", "is not allowed for FLOAT or UNSIGNED_INT"));
        }

        Ok(Self {
            common,
            buffer_view,
            byte_offset,
            component_type,
            normalized,
            count,
            accessor_type,
            max: f.opt_numbers("max", components)?,
            min: f.opt_numbers("min", components)?,
            sparse: f
                .nested("sparse")?
                .map(|s| AccessorSparse::parse(&s, count))
                .transpose()?,
        })
    }

    fn references(&self) -> Refs {
        let refs = Refs::default().opt("bufferView", EntityKind::BufferView, self.buffer_view);
        match &self.sparse {
            Some(sparse) => refs
                .req(
                    "sparse.indices.bufferView",
                    EntityKind::BufferView,
                    sparse.indices.buffer_view,
                )
                .req(
                    "sparse.values.bufferView",
                    EntityKind::BufferView,
                    sparse.values.buffer_view,
                ),
            None => refs,
        }
    }

    fn detach(&mut self, target: Uuid) -> Detach {
        let sparse_lost = self.sparse.as_ref().is_some_and(|s| {
            s.indices.buffer_view == target || s.values.buffer_view == target
        });
        if sparse_lost {
            return Detach::RequiredLost;
        }
        if clear(&mut self.buffer_view, target) {
            // Offsets are meaningless once the view is gone
            self.byte_offset = None;
            return Detach::Detached;
        }
        Detach::Untouched
    }
}

fn component_type(f: &Fields<'_>) -> SchemaResult<ComponentType> {
    let code = f
        .opt_u32("componentType")
        .ok()
        .flatten()
        .and_then(ComponentType::from_code);
    match code {
        Some(ty) => Ok(ty),
        None if f.get("componentType").is_none() => {
            Err(f.violation("componentType", "is required"))
        }
        None => Err(f.violation("componentType", COMPONENT_TYPES)),
    }
}

fn at_least_one(f: &Fields<'_>, name: &str) -> SchemaResult<u64> {
    match f.req_u64(name)? {
        0 => Err(f.violation(name, "must be >= 1")),
        n => Ok(n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Entity;
    use chrono::{TimeZone, Utc};
    use serde_json::{json, Value};

    fn draft(kind: EntityKind, value: Value) -> SchemaResult<Entity> {
        let Value::Object(mut row) = value else { unreachable!() };
        row.insert("worldUuid".into(), json!(Uuid::new_v4()));
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        Entity::draft(kind, row, now, "1.0.0")
    }

    #[test]
    fn test_accessor_type_pattern() {
        let err = draft(
            EntityKind::Accessor,
            json!({"componentType": 5126, "count": 3, "type": "VEC5"}),
        )
        .unwrap_err();
        assert!(err.is_schema_violation());
        assert_eq!(err.field(), Some("type"));
    }

    #[test]
    fn test_accessor_bounds_match_type() {
        let err = draft(
            EntityKind::Accessor,
            json!({"componentType": 5126, "count": 3, "type": "VEC3", "min": [0, 0]}),
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("min"));

        let ok = draft(
            EntityKind::Accessor,
            json!({
                "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0, 0, 0], "max": [1, 1, 1]
            }),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_component_type_codes() {
        let err = draft(
            EntityKind::Accessor,
            json!({"componentType": 5124, "count": 1, "type": "SCALAR"}),
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("componentType"));
        assert_eq!(ComponentType::from_code(5123), Some(ComponentType::UnsignedShort));
        assert_eq!(ComponentType::Float.size(), 4);
        assert_eq!(serde_json::to_value(ComponentType::Byte).unwrap(), json!(5120));
    }

    #[test]
    fn test_sparse_indices_type() {
        let view = Uuid::new_v4();
        let err = draft(
            EntityKind::Accessor,
            json!({
                "componentType": 5126, "count": 10, "type": "SCALAR",
                "sparse": {
                    "count": 2,
                    "indices": {"bufferView": view, "componentType": 5126},
                    "values": {"bufferView": view}
                }
            }),
        )
        .unwrap_err();
        assert_eq!(err.field(), Some("sparse.indices.componentType"));
    }

    #[test]
    fn test_buffer_view_stride() {
        let buffer = Uuid::new_v4();
        for stride in [2, 6, 256] {
            let err = draft(
                EntityKind::BufferView,
                json!({"buffer": buffer, "byteLength": 64, "byteStride": stride}),
            )
            .unwrap_err();
            assert_eq!(err.field(), Some("byteStride"));
        }
        let ok = draft(
            EntityKind::BufferView,
            json!({"buffer": buffer, "byteLength": 64, "byteStride": 12}),
        );
        assert!(ok.is_ok());
    }

    #[test]
    fn test_buffer_data_length() {
        let err =
            draft(EntityKind::Buffer, json!({"byteLength": 4, "data": [1, 2, 3]})).unwrap_err();
        assert_eq!(err.field(), Some("data"));
        let err = draft(EntityKind::Buffer, json!({"byteLength": 0})).unwrap_err();
        assert_eq!(err.field(), Some("byteLength"));
    }

    #[test]
    fn test_view_loses_buffer() {
        let buffer = Uuid::new_v4();
        let mut view =
            draft(EntityKind::BufferView, json!({"buffer": buffer, "byteLength": 8})).unwrap();
        assert_eq!(view.detach(Uuid::new_v4()), Detach::Untouched);
        assert_eq!(view.detach(buffer), Detach::RequiredLost);
    }
}
