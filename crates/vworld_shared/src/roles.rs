//! Closed label sets shared across the workspace.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A string did not name any member of a closed label set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{value}' is not one of {expected}")]
pub struct ParseLabelError {
    /// The rejected input.
    pub value: String,
    /// Human-readable list of accepted labels.
    pub expected: &'static str,
}

/// Role of an agent, consumed by the authorization collaborator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Anonymous visitor
    #[default]
    Guest,
    /// Registered member
    Member,
    /// World administrator
    Admin,
}

impl AgentRole {
    /// Wire label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Member => "member",
            Self::Admin => "admin",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(Self::Guest),
            "member" => Ok(Self::Member),
            "admin" => Ok(Self::Admin),
            _ => Err(ParseLabelError {
                value: s.to_string(),
                expected: "guest|member|admin",
            }),
        }
    }
}

/// Level-of-detail slot labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LodLevel {
    /// Full detail
    #[serde(rename = "LOD0")]
    Lod0,
    /// First reduction
    #[serde(rename = "LOD1")]
    Lod1,
    /// Second reduction
    #[serde(rename = "LOD2")]
    Lod2,
    /// Third reduction
    #[serde(rename = "LOD3")]
    Lod3,
    /// Lowest detail
    #[serde(rename = "LOD4")]
    Lod4,
}

impl LodLevel {
    /// All levels, most detailed first.
    pub const ALL: [Self; 5] = [Self::Lod0, Self::Lod1, Self::Lod2, Self::Lod3, Self::Lod4];

    /// Numeric index (0 = full detail)
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Wire label
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lod0 => "LOD0",
            Self::Lod1 => "LOD1",
            Self::Lod2 => "LOD2",
            Self::Lod3 => "LOD3",
            Self::Lod4 => "LOD4",
        }
    }
}

impl FromStr for LodLevel {
    type Err = ParseLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| ParseLabelError {
                value: s.to_string(),
                expected: "LOD0|LOD1|LOD2|LOD3|LOD4",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!("admin".parse::<AgentRole>().unwrap(), AgentRole::Admin);
        assert_eq!(AgentRole::Member.to_string(), "member");
        assert!("root".parse::<AgentRole>().is_err());
    }

    #[test]
    fn test_lod_level_order() {
        assert!(LodLevel::Lod0 < LodLevel::Lod4);
        assert_eq!("LOD3".parse::<LodLevel>().unwrap().index(), 3);
        assert!("LOD5".parse::<LodLevel>().is_err());
    }
}
