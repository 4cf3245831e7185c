//! # VWORLD Shared
//!
//! Value types and constants used by every other crate in the workspace.
//!
//! ## CRITICAL RULE
//!
//! This crate must stay free of storage, transport and logging concerns.
//! If a type needs a uuid, a timestamp or a validation error, it belongs in
//! `vworld_schema`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod primitives;
pub mod roles;

pub use constants::{
    PannerOptions, DistanceModel, PanningModel, DEFAULT_PANNER_OPTIONS, DEFAULT_SCHEMA_VERSION,
    LIGHTMAP_DATA_MESH_NAME,
};
pub use primitives::{Color3, Vector3};
pub use roles::{AgentRole, LodLevel, ParseLabelError};
