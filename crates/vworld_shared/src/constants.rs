//! # World Constants
//!
//! Immutable configuration data baked into every build.
//!
//! **CRITICAL:** Clients and the world server must agree on these values.
//! Changing one is a schema change.

use serde::{Deserialize, Serialize};

// =============================================================================
// SCHEMA
// =============================================================================

/// Schema version stamped on records that are created without one.
pub const DEFAULT_SCHEMA_VERSION: &str = "1.0.0";

/// Name of the mesh that carries baked lightmap data inside a glTF world.
pub const LIGHTMAP_DATA_MESH_NAME: &str = "vircadia_lightmapData";

// =============================================================================
// AUDIO
// =============================================================================

/// Spatialization algorithm for agent voice audio.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PanningModel {
    /// Head-related transfer function
    #[serde(rename = "HRTF")]
    Hrtf,
    /// Equal-power panning
    #[serde(rename = "equalpower")]
    EqualPower,
}

/// Attenuation curve as a source moves away from the listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceModel {
    /// Linear falloff
    Linear,
    /// Inverse distance falloff
    Inverse,
    /// Exponential falloff
    Exponential,
}

/// Panner node options applied to every remote agent's audio stream.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PannerOptions {
    /// Panning algorithm
    pub panning_model: PanningModel,
    /// Distance attenuation curve
    pub distance_model: DistanceModel,
    /// Distance at which attenuation starts
    pub ref_distance: f64,
    /// Distance beyond which no further attenuation is applied
    pub max_distance: f64,
}

/// Default panner options for agent voice audio.
pub const DEFAULT_PANNER_OPTIONS: PannerOptions = PannerOptions {
    panning_model: PanningModel::Hrtf,
    distance_model: DistanceModel::Inverse,
    ref_distance: 1.0,
    max_distance: 10_000.0,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panner_wire_names() {
        let json = serde_json::to_value(DEFAULT_PANNER_OPTIONS).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "panningModel": "HRTF",
                "distanceModel": "inverse",
                "refDistance": 1.0,
                "maxDistance": 10000.0,
            })
        );
    }
}
