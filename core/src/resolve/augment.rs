//! Resolution of top-level `augment` statements.
//!
//! An augment may target nodes that another augment has yet to merge in,
//! so the pass retries whatever is left until a sweep makes no progress.

use tracing::{debug, warn};

use crate::error::Result;
use crate::finding::FindingType;
use crate::schema::Schema;
use crate::statement::{AppDataKind, NodeId, StatementKind, Status, child_rules};

use super::path::find_schema_node;
use super::{AUGMENTED_KINDS, inject_cases, location};

use StatementKind as K;

/// Kinds an augment may target.
const AUGMENTABLE: &[StatementKind] = &[
    K::Container,
    K::List,
    K::Choice,
    K::Case,
    K::Input,
    K::Output,
    K::Notification,
];

pub(crate) fn resolve_augments(schema: &mut Schema) -> Result<()> {
    let mut pending: Vec<NodeId> = schema
        .unit_roots()
        .into_iter()
        .flat_map(|root| schema.tree.children_of_kind(root, K::Augment))
        .collect();

    let mut progress = true;
    while progress && !pending.is_empty() {
        progress = false;
        let mut remaining = Vec::with_capacity(pending.len());
        for augment in pending {
            match resolve_augment(schema, augment) {
                Ok(true) => progress = true,
                Ok(false) => remaining.push(augment),
                Err(err) => {
                    warn!(error = %err, "augment could not be applied");
                    remaining.push(augment);
                }
            }
        }
        pending = remaining;
    }

    for augment in pending {
        let path = schema.tree.node(augment).identifier().to_string();
        schema.report(
            augment,
            FindingType::UnresolvablePath,
            format!("Path to schema node '{path}', part of 'augment' statement, cannot be resolved."),
        );
    }
    Ok(())
}

/// Returns `false` when the target does not exist yet.
fn resolve_augment(schema: &mut Schema, augment: NodeId) -> Result<bool> {
    let path = schema.tree.node(augment).identifier().to_string();
    if path.is_empty() {
        return Ok(true);
    }
    let Some(target) = find_schema_node(schema, augment, &path) else {
        return Ok(false);
    };
    if schema.tree.node(augment).unit() == schema.tree.node(target).unit() {
        schema.report(
            augment,
            FindingType::AugmentTargetNodeInSameModule,
            "Both 'augment' and it's target node sit in the same (sub-)module.",
        );
    }

    let target_kind = schema.tree.node(target).kind();
    if !AUGMENTABLE.contains(&target_kind) {
        let allowed = AUGMENTABLE
            .iter()
            .map(|k| format!("'{k}'"))
            .collect::<Vec<_>>()
            .join(", ");
        schema.report(
            augment,
            FindingType::TargetNodeCannotBeAugmented,
            format!("Statement '{target_kind}' pointed to by '{path}' cannot be augmented (only statements [{allowed}])."),
        );
        return Ok(true);
    }

    if target_kind == K::Choice {
        inject_cases(&mut schema.tree, augment)?;
    }
    // Extensions under the augment stay with the augment.
    let moved = schema.tree.children_of_kinds(augment, AUGMENTED_KINDS);

    let rules = child_rules(target_kind);
    for child in &moved {
        let kind = schema.tree.node(*child).kind();
        if !rules.optional_multiple.contains(&kind) {
            schema.report(
                *child,
                FindingType::TargetNodeCannotBeAugmented,
                format!("Statement '{kind}' is not allowed under '{target_kind}' and therefore cannot be augmented-in."),
            );
            return Ok(true);
        }
    }

    inherit_when_and_if_feature(schema, augment, &moved);
    inherit_status(schema, augment, &moved);

    let note = format!("statement augmented-in by 'augment' in {}", location(schema, augment));
    for child in &moved {
        schema.tree.add_app_data(*child, AppDataKind::AugmentedIn, note.clone());
    }
    schema.tree.move_children_to(&moved, target);

    debug!(path = %path, nodes = moved.len(), "resolved augment");
    Ok(true)
}

/// Clones the augment's `when` and `if-feature` statements onto every
/// moved child. A child keeps any `when` of its own next to the inherited
/// one.
fn inherit_when_and_if_feature(schema: &mut Schema, augment: NodeId, moved: &[NodeId]) {
    if let Some(when) = schema.tree.child_of_kind(augment, K::When) {
        let note = format!(
            "This 'when' statement has been inherited from the 'when' statement that sits under the augment in {}",
            location(schema, when)
        );
        for child in moved {
            let clone = schema.tree.deep_clone(when, Some(*child));
            schema.tree.add_app_data(clone, AppDataKind::AugmentedIn, note.clone());
        }
    }
    for if_feature in schema.tree.children_of_kind(augment, K::IfFeature) {
        let note = format!(
            "This 'if-feature' statement has been inherited from the 'if-feature' statement that sits under the augment in {}",
            location(schema, if_feature)
        );
        for child in moved {
            let clone = schema.tree.deep_clone(if_feature, Some(*child));
            schema.tree.add_app_data(clone, AppDataKind::AugmentedIn, note.clone());
        }
    }
}

/// Pushes the augment's `status` onto moved children whose own status is
/// less severe.
fn inherit_status(schema: &mut Schema, augment: NodeId, moved: &[NodeId]) {
    let Some(source) = schema.tree.child_of_kind(augment, K::Status) else {
        return;
    };
    let status = Status::from_argument(schema.tree.node(source).identifier()).unwrap_or_default();
    let note = format!(
        "This 'status' statement has been inherited from the 'status' statement that sits under the augment in {}",
        location(schema, source)
    );
    for child in moved {
        let explicit = schema.tree.child_of_kind(*child, K::Status);
        let explicit_status = explicit
            .and_then(|e| Status::from_argument(schema.tree.node(e).identifier()))
            .unwrap_or_default();
        if explicit.is_some() && explicit_status >= status {
            continue;
        }
        if let Some(explicit) = explicit {
            schema.tree.detach(explicit);
        }
        let clone = schema.tree.deep_clone(source, Some(*child));
        schema.tree.add_app_data(clone, AppDataKind::AugmentedIn, note.clone());
    }
}
