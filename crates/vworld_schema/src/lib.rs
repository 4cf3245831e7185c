//! # VWORLD Schema
//!
//! The canonical data model of a persisted, multi-user 3D world.
//!
//! ## Design Principles
//!
//! 1. **glTF-shaped** - World content is the fourteen glTF 2.0 entity kinds,
//!    one table each, linked by uuid instead of array index
//! 2. **Namespaced hints** - Renderer behaviour lives under
//!    `extras.vircadia`, never beside glTF fields
//! 3. **Typed metadata** - Key/value attachments hold exactly one typed array
//! 4. **Closed writes** - Every mutation has a name in [`MutationOp`]
//! 5. **Optimistic versioning** - `updatedAt` is the concurrency token
//!
//! ## Thread Safety
//!
//! Validation is pure. [`MemoryStore`] takes `&mut self` for writes; wrap
//! it in a lock to share it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use vworld_schema::{EntityKind, MemoryStore, SchemaConfig, WorldStore};
//!
//! let mut store = MemoryStore::new(SchemaConfig::load("config/schema.toml")?);
//! let world = store.create(EntityKind::World, row(json!({"asset": {"version": "2.0"}})))?;
//! let scene = store.create(EntityKind::Scene, row(json!({"worldUuid": world.uuid()})))?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod extension;
pub mod identity;
pub mod integrity;
pub mod label;
pub mod metadata;
pub mod mutation;
pub mod store;

mod fields;

pub use catalog::{
    Accessor, AccessorSparse, AccessorType, AgentProfile, AlphaMode, Animation, Asset, Buffer,
    BufferView, Camera, CameraType, Common, ComponentType, Detach, Entity, EntityKind, Image,
    ImageMimeType, Material, Mesh, Node, Reference, Row, Sampler, Scene, SceneHints, Skin,
    SparseIndices, SparseValues, Texture, WorldGltf,
};
pub use config::{ConfigError, MetadataConfig, SchemaConfig, ValidationConfig};
pub use error::{SchemaError, SchemaResult};
pub use extension::{
    AgentScript, BillboardHints, BillboardMode, ColorSpace, EngineHints, Extras, LightHints,
    LightMode, LodHints, LodMode, PersistentScript, ScriptHints,
};
pub use fields::Fields;
pub use identity::{Clock, Identity, ManualClock, SystemClock};
pub use integrity::{check_references, EntityResolver};
pub use label::Label;
pub use metadata::{MetadataQuery, MetadataRecord, MetadataValues, SortOrder};
pub use mutation::{MutationAction, MutationOp, MutationTarget};
pub use store::{AuditEntry, DeletePolicy, DeleteReport, MemoryStore, WorldStore};
