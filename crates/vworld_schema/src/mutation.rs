//! # Mutation Taxonomy
//!
//! The closed set of write operations. Authorization and audit collaborators
//! treat it as the exhaustive permission list:
//!
//! - `{create,update,delete}_<noun>` for every entity kind
//! - `{create,update,delete}_agent_profile`
//! - `{create,update,delete}_<noun>_metadata` for every entity kind
//!
//! Any other name is an [`SchemaError::UnknownOperation`].

use std::fmt;
use std::str::FromStr;

use crate::catalog::EntityKind;
use crate::error::{SchemaError, SchemaResult};
use crate::label::Label;

crate::closed_label! {
    /// Verb of an operation.
    pub enum MutationAction {
        /// Insert a record
        Create => "create",
        /// Change a record
        Update => "update",
        /// Remove a record
        Delete => "delete",
    }
}

/// What an operation writes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MutationTarget {
    /// An entity table
    Entity(EntityKind),
    /// `agent_profiles`
    AgentProfile,
    /// The metadata table of an entity kind
    Metadata(EntityKind),
}

impl MutationTarget {
    /// Table written by operations on this target.
    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Entity(kind) => kind.table(),
            Self::AgentProfile => "agent_profiles",
            Self::Metadata(kind) => kind.metadata_table(),
        }
    }
}

/// One named write operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MutationOp {
    /// Verb
    pub action: MutationAction,
    /// Table family
    pub target: MutationTarget,
}

impl MutationOp {
    /// Number of operations in the taxonomy.
    pub const COUNT: usize = (EntityKind::ALL.len() * 2 + 1) * 3;

    /// Pairs an action with a target.
    #[must_use]
    pub const fn new(action: MutationAction, target: MutationTarget) -> Self {
        Self { action, target }
    }

    /// `create_<noun>` etc. for an entity kind.
    #[must_use]
    pub const fn entity(action: MutationAction, kind: EntityKind) -> Self {
        Self::new(action, MutationTarget::Entity(kind))
    }

    /// `create_<noun>_metadata` etc. for an entity kind.
    #[must_use]
    pub const fn metadata(action: MutationAction, kind: EntityKind) -> Self {
        Self::new(action, MutationTarget::Metadata(kind))
    }

    /// Every operation, entity triples first, then agent profiles, then
    /// metadata triples.
    pub fn all() -> impl Iterator<Item = Self> {
        let entities = EntityKind::ALL.into_iter().map(MutationTarget::Entity);
        let metadata = EntityKind::ALL.into_iter().map(MutationTarget::Metadata);
        entities
            .chain(std::iter::once(MutationTarget::AgentProfile))
            .chain(metadata)
            .flat_map(|target| {
                MutationAction::all()
                    .iter()
                    .map(move |action| Self::new(*action, target))
            })
    }

    /// Looks up an operation by name.
    ///
    /// # Errors
    ///
    /// `UnknownOperation` for anything outside the taxonomy.
    pub fn parse(name: &str) -> SchemaResult<Self> {
        let unknown = || SchemaError::UnknownOperation(name.to_string());
        let (verb, rest) = name.split_once('_').ok_or_else(unknown)?;
        let action = MutationAction::from_label(verb).ok_or_else(unknown)?;

        let target = if rest == "agent_profile" {
            MutationTarget::AgentProfile
        } else if let Some(noun) = rest.strip_suffix("_metadata") {
            MutationTarget::Metadata(EntityKind::from_noun(noun).ok_or_else(unknown)?)
        } else {
            MutationTarget::Entity(EntityKind::from_noun(rest).ok_or_else(unknown)?)
        };
        Ok(Self::new(action, target))
    }
}

impl fmt::Display for MutationOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target {
            MutationTarget::Entity(kind) => write!(f, "{}_{}", self.action, kind.noun()),
            MutationTarget::AgentProfile => write!(f, "{}_agent_profile", self.action),
            MutationTarget::Metadata(kind) => {
                write!(f, "{}_{}_metadata", self.action, kind.noun())
            }
        }
    }
}

impl FromStr for MutationOp {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_taxonomy_is_closed_and_complete() {
        let names: HashSet<String> = MutationOp::all().map(|op| op.to_string()).collect();
        assert_eq!(names.len(), MutationOp::COUNT);
        assert_eq!(MutationOp::COUNT, 87);

        for name in [
            "create_world_gltf",
            "update_scene",
            "delete_buffer_view",
            "create_agent_profile",
            "delete_accessor_metadata",
            "update_world_gltf_metadata",
        ] {
            assert!(names.contains(name), "{name}");
        }
    }

    #[test]
    fn test_parse_inverts_display() {
        for op in MutationOp::all() {
            assert_eq!(op.to_string().parse::<MutationOp>().unwrap(), op);
        }
    }

    #[test]
    fn test_unknown_operations() {
        for name in [
            "drop_world_gltf",
            "create_worlds",
            "create_nodes",
            "create_agent_profile_metadata",
            "create",
            "",
            "update_scene_metadata_metadata",
        ] {
            let err = MutationOp::parse(name).unwrap_err();
            assert_eq!(err, SchemaError::UnknownOperation(name.to_string()));
        }
    }

    #[test]
    fn test_targets_map_to_tables() {
        let op = MutationOp::parse("delete_buffer_view_metadata").unwrap();
        assert_eq!(op.target.table(), "buffer_views_metadata");
        let profile = MutationOp::parse("update_agent_profile").unwrap();
        assert_eq!(profile.target.table(), "agent_profiles");
    }
}
