//! Referential integrity.
//!
//! Field-level validation happens when a record is parsed; everything that
//! needs other records (owning world, reference targets, the node tree) is
//! checked here against an [`EntityResolver`].

use std::collections::HashSet;

use uuid::Uuid;

use crate::catalog::{Entity, EntityKind};
use crate::error::{SchemaError, SchemaResult};

/// Read access to already-persisted entities.
pub trait EntityResolver {
    /// Kind and owning world of a stored entity.
    fn resolve(&self, uuid: Uuid) -> Option<(EntityKind, Option<Uuid>)>;

    /// Children of a stored node; `None` if `uuid` is not a stored node.
    fn node_children(&self, uuid: Uuid) -> Option<Vec<Uuid>>;

    /// Stored nodes listing `child` among their children.
    fn node_parents(&self, child: Uuid) -> Vec<Uuid>;

    /// True if `uuid` is a stored World.
    fn world_exists(&self, uuid: Uuid) -> bool {
        matches!(self.resolve(uuid), Some((EntityKind::World, _)))
    }
}

/// Checks every reference `entity` holds.
///
/// - `worldUuid` names an existing World
/// - each reference resolves to an entity of the expected kind in the same world
/// - a Node's children have no other parent, stay acyclic, and no chain is
///   deeper than `max_depth`
///
/// # Errors
///
/// `ReferentialViolation` naming the first offending field.
pub fn check_references(
    entity: &Entity,
    resolver: &impl EntityResolver,
    max_depth: usize,
) -> SchemaResult<()> {
    let record = entity.kind().noun();

    if let Some(world) = entity.world_uuid() {
        if !resolver.world_exists(world) {
            return Err(SchemaError::referential(
                record,
                "worldUuid",
                format!("world {world} does not exist"),
            ));
        }
    }

    let owner = entity.owner();
    for reference in entity.references() {
        if reference.uuid == entity.uuid() && reference.target == entity.kind() {
            return Err(SchemaError::referential(
                record,
                reference.field,
                "must not reference the record itself",
            ));
        }
        match resolver.resolve(reference.uuid) {
            None => {
                return Err(SchemaError::referential(
                    record,
                    reference.field,
                    format!("{} {} does not exist", reference.target, reference.uuid),
                ))
            }
            Some((kind, _)) if kind != reference.target => {
                return Err(SchemaError::referential(
                    record,
                    reference.field,
                    format!("{} is a {kind}, expected a {}", reference.uuid, reference.target),
                ))
            }
            Some((_, world)) if world != Some(owner) => {
                return Err(SchemaError::referential(
                    record,
                    reference.field,
                    format!("{} {} belongs to another world", reference.target, reference.uuid),
                ))
            }
            Some(_) => {}
        }
    }

    if let Entity::Node(node) = entity {
        check_single_parent(entity.uuid(), &node.children, resolver)?;
        check_acyclic(entity.uuid(), &node.children, resolver, max_depth)?;
    }
    Ok(())
}

/// Node children form a tree: a child already held by another node cannot
/// be adopted.
fn check_single_parent(
    parent: Uuid,
    children: &[Uuid],
    resolver: &impl EntityResolver,
) -> SchemaResult<()> {
    for (i, child) in children.iter().enumerate() {
        if let Some(other) = resolver
            .node_parents(*child)
            .into_iter()
            .find(|holder| *holder != parent)
        {
            return Err(SchemaError::referential(
                "node",
                format!("children[{i}]"),
                format!("node {child} is already a child of node {other}"),
            ));
        }
    }
    Ok(())
}

/// Walks down from `children` and fails if `root` is reachable again.
///
/// `root`'s stored children are ignored in favour of the candidate list, so
/// the check is valid for both creates and updates.
fn check_acyclic(
    root: Uuid,
    children: &[Uuid],
    resolver: &impl EntityResolver,
    max_depth: usize,
) -> SchemaResult<()> {
    let mut visited = HashSet::new();
    let mut stack: Vec<(Uuid, usize)> = children.iter().map(|child| (*child, 1)).collect();

    while let Some((node, depth)) = stack.pop() {
        if node == root {
            return Err(SchemaError::referential(
                "node",
                "children",
                format!("node {root} would become its own descendant"),
            ));
        }
        if depth > max_depth {
            return Err(SchemaError::referential(
                "node",
                "children",
                format!("hierarchy deeper than {max_depth} levels"),
            ));
        }
        if !visited.insert(node) {
            continue;
        }
        if let Some(grandchildren) = resolver.node_children(node) {
            stack.extend(grandchildren.into_iter().map(|child| (child, depth + 1)));
        }
    }
    Ok(())
}
