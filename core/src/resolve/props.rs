//! Top-down propagation of effective properties.

use crate::schema::Schema;
use crate::statement::{NodeId, StatementKind, StatementTree, Status};

/// Obsolete always wins; deprecated only overrides a current parent.
pub(crate) fn assign_status(schema: &mut Schema) {
    for root in schema.unit_roots() {
        status_subtree(&mut schema.tree, root, Status::Current);
    }
}

fn status_subtree(tree: &mut StatementTree, node: NodeId, inherited: Status) {
    let status = match tree.child_argument(node, StatementKind::Status).and_then(Status::from_argument) {
        Some(Status::Obsolete) => Status::Obsolete,
        Some(Status::Deprecated) if inherited == Status::Current => Status::Deprecated,
        _ => inherited,
    };
    tree.node_mut(node).effective.status = status;
    for child in tree.children(node).to_vec() {
        status_subtree(tree, child, status);
    }
}

/// Every statement gets the namespace of the unit tree it currently sits
/// in. Content later moved by an augment keeps the namespace stamped here.
pub(crate) fn assign_namespaces(schema: &mut Schema) {
    let units: Vec<_> = schema.registry.all().iter().map(|u| (u.id(), u.root())).collect();
    for (unit, root) in units {
        let namespace = schema.unit_namespace(unit);
        for node in schema.tree.descendants(root) {
            schema.tree.node_mut(node).effective.namespace = namespace.clone();
        }
    }
}

pub(crate) fn assign_conformance(schema: &mut Schema) {
    let units: Vec<_> = schema
        .registry
        .all()
        .iter()
        .map(|u| (u.conformance(), u.root()))
        .collect();
    for (conformance, root) in units {
        for node in schema.tree.descendants(root) {
            schema.tree.node_mut(node).effective.conformance = Some(conformance);
        }
    }
}

/// An explicit `config` only counts while the parent is still `true`.
/// Operations and notifications are never configuration.
pub(crate) fn assign_config(schema: &mut Schema) {
    for root in schema.unit_roots() {
        config_subtree(&mut schema.tree, root, true);
    }
}

fn config_subtree(tree: &mut StatementTree, node: NodeId, inherited: bool) {
    let mut config = inherited;
    if config {
        if let Some(explicit) = tree.child_argument(node, StatementKind::Config) {
            config = explicit != "false";
        }
    }
    if matches!(
        tree.node(node).kind(),
        StatementKind::Action | StatementKind::Rpc | StatementKind::Notification
    ) {
        config = false;
    }
    tree.node_mut(node).effective.config = config;
    for child in tree.children(node).to_vec() {
        config_subtree(tree, child, config);
    }
}
