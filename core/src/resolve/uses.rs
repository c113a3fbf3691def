//! Resolution of `uses`.
//!
//! Each `uses` is replaced by a copy of the data definitions of its
//! grouping, after the copy has been refined and augmented as the `uses`
//! asks. Groupings containing further `uses` wait until those are resolved,
//! so nesting unwinds from the inside out over several sweeps.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::error::{ResolveError, Result};
use crate::finding::FindingType;
use crate::schema::Schema;
use crate::statement::{AppDataKind, NodeId, StatementKind, Status};

use super::path::{find_definition, find_schema_node};
use super::types::statements_in_schema;
use super::{AUGMENTED_KINDS, inject_cases, location, settle};

use StatementKind as K;

const MAX_SWEEPS: u32 = 10;

/// Children of a grouping copied into the place of the `uses`.
const SPLICED_KINDS: &[StatementKind] = &[
    K::Action,
    K::Anyxml,
    K::Anydata,
    K::Choice,
    K::Container,
    K::Leaf,
    K::LeafList,
    K::List,
    K::Notification,
];

/// Targets an `augment` under a `uses` may point at.
const USES_AUGMENT_TARGETS: &[StatementKind] = &[
    K::Container,
    K::List,
    K::Choice,
    K::Case,
    K::Input,
    K::Output,
    K::Notification,
];

struct RefineRule {
    kind: StatementKind,
    /// Target kinds the statement may refine; `None` for any.
    targets: Option<&'static [StatementKind]>,
    multiple: bool,
    replaces: bool,
}

const REFINE_RULES: &[RefineRule] = &[
    RefineRule { kind: K::Description, targets: None, multiple: false, replaces: true },
    RefineRule { kind: K::Reference, targets: None, multiple: false, replaces: true },
    RefineRule { kind: K::Config, targets: None, multiple: false, replaces: true },
    RefineRule {
        kind: K::Default,
        targets: Some(&[K::Leaf, K::LeafList, K::Choice]),
        multiple: true,
        replaces: true,
    },
    RefineRule {
        kind: K::Mandatory,
        targets: Some(&[K::Leaf, K::Anydata, K::Anyxml, K::Choice]),
        multiple: false,
        replaces: true,
    },
    RefineRule { kind: K::Presence, targets: Some(&[K::Container]), multiple: false, replaces: true },
    RefineRule {
        kind: K::Must,
        targets: Some(&[K::Leaf, K::LeafList, K::List, K::Container, K::Anydata, K::Anyxml]),
        multiple: true,
        replaces: false,
    },
    RefineRule {
        kind: K::MinElements,
        targets: Some(&[K::LeafList, K::List]),
        multiple: false,
        replaces: true,
    },
    RefineRule {
        kind: K::MaxElements,
        targets: Some(&[K::LeafList, K::List]),
        multiple: false,
        replaces: true,
    },
    RefineRule {
        kind: K::IfFeature,
        targets: Some(&[
            K::Leaf,
            K::LeafList,
            K::List,
            K::Container,
            K::Choice,
            K::Case,
            K::Anydata,
            K::Anyxml,
        ]),
        multiple: true,
        replaces: false,
    },
];

#[derive(Debug, Default)]
struct UsesState {
    unresolvable: HashSet<NodeId>,
    /// Keyed by the original grouping, so copies count towards it.
    usage: HashMap<NodeId, u32>,
}

pub(crate) fn resolve_uses(schema: &mut Schema) -> Result<()> {
    let mut state = UsesState::default();
    let mut remaining = MAX_SWEEPS;
    let mut progress = true;
    while remaining > 0 && progress {
        progress = false;
        remaining -= 1;
        for uses in uses_to_consider(schema, &state) {
            let outcome = resolve_one(schema, &mut state, uses);
            progress |= settle(&mut state.unresolvable, uses, outcome);
        }
        if remaining == MAX_SWEEPS - 3 {
            for uses in uses_to_consider(schema, &state) {
                schema.report(
                    uses,
                    FindingType::ExcessiveUsesDepth,
                    "'uses' statement refers to 'grouping' with nesting depth > 3.",
                );
            }
        }
    }

    for uses in uses_to_consider(schema, &state) {
        schema.report(
            uses,
            FindingType::CircularUsesReferences,
            "Likely circular references between 'uses' and 'grouping'. Use the quoted file and line number as starting point for investigation.",
        );
    }

    for grouping in statements_in_schema(schema, K::Grouping) {
        if schema.tree.node(grouping).origin() != grouping {
            continue;
        }
        let name = schema.tree.node(grouping).identifier().to_string();
        match state.usage.get(&grouping).copied().unwrap_or(0) {
            0 => schema.report(
                grouping,
                FindingType::GroupingNotUsed,
                format!("grouping statement '{name}' not used."),
            ),
            1 => schema.report(
                grouping,
                FindingType::GroupingUsedOnceOnly,
                format!("grouping statement '{name}' used only once; consider inlining."),
            ),
            _ => {}
        }
    }
    Ok(())
}

fn uses_to_consider(schema: &Schema, state: &UsesState) -> Vec<NodeId> {
    statements_in_schema(schema, K::Uses)
        .into_iter()
        .filter(|uses| !state.unresolvable.contains(uses))
        .collect()
}

fn resolve_one(schema: &mut Schema, state: &mut UsesState, uses: NodeId) -> Result<bool> {
    let name = schema.tree.node(uses).identifier().to_string();
    if name.is_empty() {
        state.unresolvable.insert(uses);
        return Ok(false);
    }
    let Some(grouping) = find_definition(schema, uses, K::Grouping, &name) else {
        state.unresolvable.insert(uses);
        schema.report(
            uses,
            FindingType::UnresolvableGrouping,
            format!("Cannot resolve grouping '{name}'."),
        );
        return Ok(false);
    };
    if has_nested_uses(schema, state, uses, grouping, &name) {
        return Ok(false);
    }
    let origin = schema.tree.node(grouping).origin();
    *state.usage.entry(origin).or_default() += 1;

    let copy = schema.tree.deep_clone(grouping, None);
    let placed = format!(
        "statement placed here by 'uses' in {} of grouping '{name}' from {}",
        location(schema, uses),
        location(schema, grouping)
    );
    for child in schema.tree.children(copy).to_vec() {
        schema.tree.add_app_data(child, AppDataKind::UsesResolution, placed.clone());
    }

    inherit_status(schema, uses, copy);
    apply_refines(schema, uses, copy, &name);
    for augment in schema.tree.children_of_kind(uses, K::Augment) {
        apply_augment(schema, augment, copy, &name, uses)?;
    }

    let spliced = schema.tree.children_of_kinds(copy, SPLICED_KINDS);
    for if_feature in schema.tree.children_of_kind(uses, K::IfFeature) {
        for child in &spliced {
            schema.tree.deep_clone(if_feature, Some(*child));
        }
    }
    if let Some(when) = schema.tree.child_of_kind(uses, K::When) {
        for child in &spliced {
            schema.tree.deep_clone(when, Some(*child));
        }
    }

    let parent = schema.tree.node(uses).parent().ok_or(ResolveError::Detached(uses))?;
    let position = schema
        .tree
        .position_in_parent(uses)
        .ok_or(ResolveError::Detached(uses))?;
    for (offset, child) in spliced.iter().enumerate() {
        schema.tree.insert_child(parent, position + offset, *child);
    }
    schema.tree.detach(uses);

    debug!(grouping = %name, nodes = spliced.len(), "resolved uses");
    Ok(true)
}

/// Returns `true` if the grouping still contains `uses` and must wait.
fn has_nested_uses(
    schema: &mut Schema,
    state: &mut UsesState,
    uses: NodeId,
    grouping: NodeId,
    name: &str,
) -> bool {
    let nested = schema.tree.find_in_subtree(grouping, K::Uses);
    let mut unresolvable = false;
    for inner in &nested {
        if state.unresolvable.contains(inner) {
            unresolvable = true;
            let name_value = schema.tree.node(*inner).name_value();
            schema.report(
                uses,
                FindingType::NestedUsesNotResolvable,
                format!("Referenced grouping '{name}' has nested unresolvable 'uses' statement {name_value}."),
            );
        }
    }
    if unresolvable {
        state.unresolvable.insert(uses);
    }
    !nested.is_empty()
}

fn status_of(schema: &Schema, status: NodeId) -> Status {
    Status::from_argument(schema.tree.node(status).identifier()).unwrap_or_default()
}

/// Pushes the more severe of the `uses` and grouping status down onto
/// every copied child that is not already at least as severe.
fn inherit_status(schema: &mut Schema, uses: NodeId, copy: NodeId) {
    let on_uses = schema.tree.child_of_kind(uses, K::Status);
    let on_grouping = schema.tree.child_of_kind(copy, K::Status);
    let source = match (on_uses, on_grouping) {
        (Some(u), Some(g)) => {
            if status_of(schema, u) > status_of(schema, g) {
                u
            } else {
                g
            }
        }
        (Some(s), None) | (None, Some(s)) => s,
        (None, None) => return,
    };
    let status = status_of(schema, source);

    for child in schema.tree.children(copy).to_vec() {
        if !schema.tree.node(child).kind().defines_schema_node() {
            continue;
        }
        let explicit = schema.tree.child_of_kind(child, K::Status);
        if explicit.is_some_and(|e| status_of(schema, e) >= status) {
            continue;
        }
        if let Some(explicit) = explicit {
            schema.tree.detach(explicit);
        }
        let inherited = schema.tree.deep_clone(source, Some(child));
        schema.tree.add_app_data(
            inherited,
            AppDataKind::UsesResolution,
            "This 'status' statement has been inherited from the 'uses'/'grouping' statement.",
        );
    }
}

fn apply_refines(schema: &mut Schema, uses: NodeId, copy: NodeId, grouping: &str) {
    for refine in schema.tree.children_of_kind(uses, K::Refine) {
        let path = schema.tree.node(refine).identifier().to_string();
        if path.is_empty() || path.starts_with('/') {
            continue;
        }
        let Some(target) = find_schema_node(schema, copy, &path) else {
            schema.report(
                refine,
                FindingType::UnresolvablePath,
                format!("Cannot find schema node with path '{path}' for refine of grouping '{grouping}'."),
            );
            continue;
        };
        refine_statements(schema, uses, refine, target);
        refine_extensions(schema, refine, target);
    }
}

fn refine_statements(schema: &mut Schema, uses: NodeId, refine: NodeId, target: NodeId) {
    let report_on = schema.tree.node(uses).parent().unwrap_or(uses);
    let target_kind = schema.tree.node(target).kind();

    for rule in REFINE_RULES {
        let mut statements = schema.tree.children_of_kind(refine, rule.kind);
        if !rule.multiple {
            statements.truncate(1);
        }
        if statements.is_empty() {
            continue;
        }
        if rule.targets.is_some_and(|allowed| !allowed.contains(&target_kind)) {
            schema.report(
                report_on,
                FindingType::InvalidRefineTargetNode,
                format!(
                    "Statement '{}' cannot be used to refine a '{}'.",
                    rule.kind,
                    schema.tree.node(target).keyword()
                ),
            );
            continue;
        }
        if rule.kind == K::Default
            && statements.len() > 1
            && matches!(target_kind, K::Leaf | K::Choice)
        {
            let refine_name = schema.tree.node(refine).name_value();
            schema.report(
                report_on,
                FindingType::InvalidSyntaxInDocument,
                format!(
                    "There can only be a single instance of 'default' under {refine_name} as the refine's target node is a leaf or choice."
                ),
            );
            continue;
        }

        if rule.replaces {
            for previous in schema.tree.children_of_kind(target, rule.kind) {
                let name_value = schema.tree.node(previous).name_value();
                schema.tree.add_app_data(
                    target,
                    AppDataKind::UsesResolution,
                    format!("previous statement {name_value} removed as it has been refined by 'uses'."),
                );
            }
        }
        for statement in &statements {
            schema.tree.add_app_data(
                *statement,
                AppDataKind::UsesResolution,
                "refines previous statement(s).",
            );
        }
        if rule.replaces {
            schema.tree.replace_children_of_same_kind(target, &statements);
        } else {
            schema.tree.move_children_to(&statements, target);
        }
    }
}

/// Module name and extension name of an extension usage.
fn extension_key(schema: &Schema, node: NodeId) -> Option<(String, String)> {
    let (prefix, name) = schema.tree.node(node).extension_parts()?;
    let module = schema.module_for_prefix(node, prefix)?;
    Some((module.name, name.to_string()))
}

/// Extension usages under a `refine` replace usages of the same extension
/// on the target.
fn refine_extensions(schema: &mut Schema, refine: NodeId, target: NodeId) {
    let refining = schema.tree.children_of_kind(refine, K::ExtensionUsage);
    if refining.is_empty() {
        return;
    }
    let keys: HashSet<(String, String)> = refining
        .iter()
        .filter_map(|ext| extension_key(schema, *ext))
        .collect();
    for ext in &refining {
        schema.tree.add_app_data(
            *ext,
            AppDataKind::UsesResolution,
            "refines previous extension statement(s) of the same type.",
        );
    }
    for existing in schema.tree.children_of_kind(target, K::ExtensionUsage) {
        if extension_key(schema, existing).is_some_and(|key| keys.contains(&key)) {
            let name_value = schema.tree.node(existing).name_value();
            schema.tree.add_app_data(
                target,
                AppDataKind::UsesResolution,
                format!("previous extension statement {name_value} removed as it has been refined by 'uses'."),
            );
            schema.tree.detach(existing);
        }
    }
    schema.tree.move_children_to(&refining, target);
}

/// Applies an `augment` nested in a `uses` to the grouping copy. Only
/// relative paths are honoured.
fn apply_augment(
    schema: &mut Schema,
    augment: NodeId,
    copy: NodeId,
    grouping: &str,
    uses: NodeId,
) -> Result<()> {
    let path = schema.tree.node(augment).identifier().to_string();
    if path.is_empty() || path.starts_with('/') {
        return Ok(());
    }
    let status = schema
        .tree
        .child_argument(augment, K::Status)
        .and_then(Status::from_argument)
        .unwrap_or_default();
    if status == Status::Obsolete {
        schema.tree.add_app_data(
            augment,
            AppDataKind::General,
            "'augment' not applied to grouping as the augment is marked as OBSOLETE.",
        );
        return Ok(());
    }

    let Some(target) = find_schema_node(schema, copy, &path) else {
        schema.report(
            augment,
            FindingType::UnresolvablePath,
            format!("Cannot find schema node with path '{path}' relative to the 'uses' statement."),
        );
        return Ok(());
    };
    let target_kind = schema.tree.node(target).kind();
    if !USES_AUGMENT_TARGETS.contains(&target_kind) {
        schema.report(
            augment,
            FindingType::InvalidUsesAugmentTargetNode,
            format!("Statement '{target_kind}' pointed to by '{path}' cannot be augmented."),
        );
        return Ok(());
    }

    let note = format!(
        "augmented-in into used grouping '{grouping}' by 'uses' statement in {}",
        location(schema, uses)
    );
    for child in schema.tree.children_of_kinds(augment, AUGMENTED_KINDS) {
        schema.tree.add_app_data(child, AppDataKind::AugmentedIn, note.clone());
    }
    if target_kind == K::Choice {
        inject_cases(&mut schema.tree, augment)?;
    }
    let moved = schema.tree.children_of_kinds(augment, AUGMENTED_KINDS);

    if let Some(when) = schema.tree.child_of_kind(augment, K::When) {
        for child in &moved {
            schema.tree.deep_clone(when, Some(*child));
        }
    }
    for if_feature in schema.tree.children_of_kind(augment, K::IfFeature) {
        for child in &moved {
            schema.tree.deep_clone(if_feature, Some(*child));
        }
    }
    if status == Status::Deprecated {
        if let Some(source) = schema.tree.child_of_kind(augment, K::Status) {
            for child in &moved {
                if !schema.tree.has_child_of_kind(*child, K::Status) {
                    schema.tree.deep_clone(source, Some(*child));
                }
            }
        }
    }
    schema.tree.move_children_to(&moved, target);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResolverConfig;
    use crate::input::{ParsedStatement, UnitInput};
    use crate::unit::ConformanceType;

    fn p(keyword: &str, argument: &str) -> ParsedStatement {
        ParsedStatement::new(keyword, argument)
    }

    fn resolve(body: Vec<ParsedStatement>) -> Schema {
        let module = p("module", "acme")
            .with_children([p("namespace", "urn:acme"), p("prefix", "ac")])
            .with_children(body);
        let mut schema = Schema::new(ResolverConfig::default());
        schema
            .parse_into_schema(vec![UnitInput::new("acme.yang", ConformanceType::Implement, module)])
            .unwrap();
        schema
    }

    fn count(schema: &Schema, ty: FindingType) -> usize {
        schema.findings().of_type(ty).count()
    }

    fn endpoint_grouping() -> ParsedStatement {
        p("grouping", "endpoint").with_children([
            p("leaf", "address").with_child(p("type", "string")),
            p("leaf", "port").with_children([p("type", "uint16"), p("default", "80")]),
            p("container", "options"),
        ])
    }

    #[test]
    fn test_uses_spliced_in_place() {
        let schema = resolve(vec![
            endpoint_grouping(),
            p("container", "server").with_children([
                p("leaf", "first").with_child(p("type", "string")),
                p("uses", "endpoint"),
                p("leaf", "last").with_child(p("type", "string")),
            ]),
        ]);
        let server = schema.lookup("acme", "server").unwrap();
        let names: Vec<&str> = schema
            .tree()
            .children(server)
            .iter()
            .map(|c| schema.tree().node(*c).identifier())
            .collect();
        assert_eq!(names, vec!["first", "address", "port", "options", "last"]);
        assert!(!schema.tree().has_child_of_kind(server, K::Uses));
        assert_eq!(count(&schema, FindingType::GroupingUsedOnceOnly), 1);
    }

    #[test]
    fn test_nested_groupings_resolve_innermost_first() {
        let schema = resolve(vec![
            endpoint_grouping(),
            p("grouping", "server").with_child(
                p("container", "server").with_child(p("uses", "endpoint")),
            ),
            p("uses", "server"),
        ]);
        assert!(schema.lookup("acme", "server/port").is_some());
        assert_eq!(count(&schema, FindingType::CircularUsesReferences), 0);
    }

    #[test]
    fn test_refine_replaces_and_adds() {
        let schema = resolve(vec![
            endpoint_grouping(),
            p("container", "web").with_child(p("uses", "endpoint").with_children([
                p("refine", "port").with_children([p("default", "443"), p("must", ". > 0")]),
                p("refine", "options").with_child(p("presence", "enables options")),
                p("refine", "address").with_child(p("presence", "nope")),
                p("refine", "missing").with_child(p("description", "x")),
            ])),
        ]);
        let port = schema.lookup("acme", "web/port").unwrap();
        let tree = schema.tree();
        assert_eq!(tree.child_argument(port, K::Default), Some("443"));
        assert_eq!(tree.children_of_kind(port, K::Default).len(), 1);
        assert!(tree.has_child_of_kind(port, K::Must));
        let options = schema.lookup("acme", "web/options").unwrap();
        assert_eq!(tree.child_argument(options, K::Presence), Some("enables options"));

        let invalid = schema
            .findings()
            .of_type(FindingType::InvalidRefineTargetNode)
            .next()
            .unwrap();
        assert_eq!(invalid.message, "Statement 'presence' cannot be used to refine a 'leaf'.");
        assert_eq!(count(&schema, FindingType::UnresolvablePath), 1);
    }

    #[test]
    fn test_uses_augment_and_if_feature_propagation() {
        let schema = resolve(vec![
            endpoint_grouping(),
            p("feature", "tls"),
            p("container", "svc").with_child(p("uses", "endpoint").with_children([
                p("if-feature", "tls"),
                p("augment", "options").with_child(p("leaf", "verbose").with_child(p("type", "boolean"))),
                p("augment", "/absolute").with_child(p("leaf", "ignored")),
                p("augment", "address").with_child(p("leaf", "bad")),
            ])),
        ]);
        let verbose = schema.lookup("acme", "svc/options/verbose").unwrap();
        assert!(schema
            .tree()
            .node(verbose)
            .app_data()
            .iter()
            .any(|d| d.kind == AppDataKind::AugmentedIn));
        for child in ["address", "port", "options"] {
            let node = schema.lookup("acme", &format!("svc/{child}")).unwrap();
            assert_eq!(schema.tree().child_argument(node, K::IfFeature), Some("tls"));
        }
        let invalid = schema
            .findings()
            .of_type(FindingType::InvalidUsesAugmentTargetNode)
            .next()
            .unwrap();
        assert_eq!(invalid.message, "Statement 'leaf' pointed to by 'address' cannot be augmented.");
    }

    #[test]
    fn test_status_inherited_from_uses() {
        let schema = resolve(vec![
            endpoint_grouping(),
            p("container", "old").with_child(p("uses", "endpoint").with_child(p("status", "deprecated"))),
        ]);
        let port = schema.lookup("acme", "old/port").unwrap();
        assert_eq!(schema.tree().child_argument(port, K::Status), Some("deprecated"));
        assert_eq!(schema.tree().node(port).effective.status, Status::Deprecated);
    }

    #[test]
    fn test_unresolvable_and_circular_groupings() {
        let schema = resolve(vec![
            p("grouping", "a").with_child(p("uses", "b")),
            p("grouping", "b").with_child(p("uses", "a")),
            p("container", "x").with_child(p("uses", "a")),
            p("container", "y").with_child(p("uses", "ghost")),
        ]);
        assert_eq!(count(&schema, FindingType::UnresolvableGrouping), 1);
        assert_eq!(count(&schema, FindingType::CircularUsesReferences), 3);
    }
}
