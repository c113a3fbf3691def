//! Resolution of top-level `deviation` statements.
//!
//! All deviations are applied in four sweeps, one per deviate operation:
//! `add`, then `replace`, then `delete`, then `not-supported`. Removing
//! nodes last lets the other operations still find their targets.

use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use crate::error::Result;
use crate::finding::FindingType;
use crate::schema::Schema;
use crate::statement::{AppDataKind, NodeId, StatementKind, child_rules};

use super::location;
use super::path::{absolute_start, find_child_schema_node, find_schema_node, split_prefix};

use StatementKind as K;

/// Properties every target implicitly has, so `replace` needs no
/// explicit statement to replace.
const ALWAYS_PRESENT: &[StatementKind] =
    &[K::Config, K::Mandatory, K::Type, K::MaxElements, K::MinElements];

const ADDABLE: &[StatementKind] = &[
    K::Config,
    K::Mandatory,
    K::MaxElements,
    K::MinElements,
    K::Type,
    K::Units,
    K::Default,
    K::Must,
    K::Unique,
];

const REPLACEABLE: &[StatementKind] = &[
    K::Config,
    K::Default,
    K::Mandatory,
    K::MaxElements,
    K::MinElements,
    K::Must,
    K::Type,
    K::Unique,
    K::Units,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DeviateOp {
    Add,
    Replace,
    Delete,
    NotSupported,
}

impl DeviateOp {
    const ORDER: [DeviateOp; 4] = [Self::Add, Self::Replace, Self::Delete, Self::NotSupported];

    fn from_argument(argument: &str) -> Option<Self> {
        match argument {
            "add" => Some(Self::Add),
            "replace" => Some(Self::Replace),
            "delete" => Some(Self::Delete),
            "not-supported" => Some(Self::NotSupported),
            _ => None,
        }
    }
}

/// What earlier deviates did, for detecting overlapping operations.
#[derive(Debug, Default)]
struct DeviationHistory {
    added: HashSet<NodeId>,
    replaced: HashSet<NodeId>,
    /// Identifiers of children removed by `not-supported`, per parent.
    not_supported: HashMap<NodeId, Vec<String>>,
}

pub(crate) fn resolve_deviations(schema: &mut Schema) -> Result<()> {
    let deviations: Vec<NodeId> = schema
        .unit_roots()
        .into_iter()
        .flat_map(|root| schema.tree.children_of_kind(root, K::Deviation))
        .collect();

    let mut history = DeviationHistory::default();
    for op in DeviateOp::ORDER {
        for deviation in &deviations {
            resolve_deviation(schema, &mut history, *deviation, op);
        }
    }
    Ok(())
}

fn resolve_deviation(
    schema: &mut Schema,
    history: &mut DeviationHistory,
    deviation: NodeId,
    op: DeviateOp,
) {
    let path = schema.tree.node(deviation).identifier().to_string();
    if !path.starts_with('/') {
        return;
    }
    let Some(target) = find_schema_node(schema, deviation, &path) else {
        if op != DeviateOp::NotSupported || !previously_removed(schema, history, deviation, &path) {
            schema.report(
                deviation,
                FindingType::UnresolvablePath,
                format!("Path to schema node '{path}', part of 'deviation' statement, cannot be resolved."),
            );
        }
        return;
    };
    if schema.tree.node(deviation).unit() == schema.tree.node(target).unit() {
        schema.report(
            deviation,
            FindingType::DeviationTargetNodeInSameModule,
            "Both 'deviation' and it's target node sit in the same (sub-)module.",
        );
    }

    for deviate in schema.tree.children_of_kind(deviation, K::Deviate) {
        let argument = schema.tree.node(deviate).identifier();
        if DeviateOp::from_argument(argument) == Some(op) {
            apply_deviate(schema, history, deviate, op, target);
        }
    }
}

/// Whether the path breaks off at a node a `not-supported` deviate has
/// already removed.
fn previously_removed(
    schema: &mut Schema,
    history: &DeviationHistory,
    deviation: NodeId,
    path: &str,
) -> bool {
    let steps: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    let first = steps.first().copied().unwrap_or_default();
    let Some(mut current) = absolute_start(schema, deviation, first) else {
        return false;
    };
    for step in steps {
        match find_child_schema_node(schema, current, step, deviation) {
            Some(child) => current = child,
            None => {
                let (_, name) = split_prefix(step);
                return history
                    .not_supported
                    .get(&current)
                    .is_some_and(|removed| removed.iter().any(|r| r == name));
            }
        }
    }
    false
}

fn apply_deviate(
    schema: &mut Schema,
    history: &mut DeviationHistory,
    deviate: NodeId,
    op: DeviateOp,
    target: NodeId,
) {
    if matches!(op, DeviateOp::Add | DeviateOp::Replace) && !children_allowed(schema, deviate, target) {
        schema.tree.add_app_data(
            deviate,
            AppDataKind::Deviation,
            "'deviate' has not been applied due to findings.",
        );
        return;
    }
    match op {
        DeviateOp::NotSupported => not_supported(schema, history, deviate, target),
        DeviateOp::Add => add(schema, history, deviate, target),
        DeviateOp::Delete => delete(schema, history, deviate, target),
        DeviateOp::Replace => replace(schema, history, deviate, target),
    }
    schema.tree.add_app_data(deviate, AppDataKind::Deviation, "'deviate' has been applied.");
    debug!(deviate = ?op, target = %schema.tree.node(target).name_value(), "applied deviate");
}

fn children_allowed(schema: &mut Schema, deviate: NodeId, target: NodeId) -> bool {
    let target_kind = schema.tree.node(target).kind();
    let rules = child_rules(target_kind);
    let mut allowed = true;
    for child in schema.tree.children(deviate).to_vec() {
        let kind = schema.tree.node(child).kind();
        if kind != K::ExtensionUsage && !rules.allows(kind) {
            allowed = false;
            schema.report(
                child,
                FindingType::IllegalChildStatement,
                format!("Statement '{kind}' not a valid child statement of deviated statement '{target_kind}'."),
            );
        }
    }
    allowed
}

/// `(module, name)` of an extension usage, falling back to the raw keyword
/// when the prefix does not resolve.
fn extension_key(schema: &Schema, node: NodeId) -> (String, String) {
    let statement = schema.tree.node(node);
    statement
        .extension_parts()
        .and_then(|(prefix, name)| {
            let module = schema.module_for_prefix(node, prefix)?;
            Some((module.name, name.to_string()))
        })
        .unwrap_or_else(|| (String::new(), statement.keyword().to_string()))
}

/// Children of `parent` of the same statement type as `like`.
fn children_like(schema: &Schema, parent: NodeId, like: NodeId) -> Vec<NodeId> {
    let kind = schema.tree.node(like).kind();
    let children = schema.tree.children_of_kind(parent, kind);
    if kind != K::ExtensionUsage {
        return children;
    }
    let key = extension_key(schema, like);
    children
        .into_iter()
        .filter(|c| extension_key(schema, *c) == key)
        .collect()
}

/// The extension usages under `deviate`, grouped by extension.
fn extension_groups(schema: &Schema, deviate: NodeId) -> Vec<Vec<NodeId>> {
    let mut groups: Vec<((String, String), Vec<NodeId>)> = Vec::new();
    for ext in schema.tree.children_of_kind(deviate, K::ExtensionUsage) {
        let key = extension_key(schema, ext);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(ext),
            None => groups.push((key, vec![ext])),
        }
    }
    groups.into_iter().map(|(_, members)| members).collect()
}

fn not_supported(schema: &mut Schema, history: &mut DeviationHistory, deviate: NodeId, target: NodeId) {
    let Some(parent) = schema.tree.node(target).parent() else {
        return;
    };
    let note = format!(
        "Statement {} in {} marked as 'not-supported' by deviation in {} and thus removed.",
        schema.tree.node(target).name_value(),
        location(schema, target),
        location(schema, deviate)
    );
    schema.tree.add_app_data(parent, AppDataKind::Deviation, note);
    history
        .not_supported
        .entry(parent)
        .or_default()
        .push(schema.tree.node(target).identifier().to_string());
    schema.tree.detach(target);
}

fn add(schema: &mut Schema, history: &mut DeviationHistory, deviate: NodeId, target: NodeId) {
    let target_kind = schema.tree.node(target).kind();
    for kind in ADDABLE {
        let statements = schema.tree.children_of_kind(deviate, *kind);
        let multiple = child_rules(target_kind).allows_multiple(*kind);
        add_statements(schema, history, target, &statements, multiple);
    }
    for statements in extension_groups(schema, deviate) {
        add_statements(schema, history, target, &statements, true);
    }
}

fn add_statements(
    schema: &mut Schema,
    history: &mut DeviationHistory,
    target: NodeId,
    statements: &[NodeId],
    multiple: bool,
) {
    let Some(first) = statements.first().copied() else {
        return;
    };
    let existing = children_like(schema, target, first);
    if !existing.is_empty() && !multiple {
        for statement in statements {
            let keyword = schema.tree.node(*statement).keyword().to_string();
            schema.report(
                *statement,
                FindingType::InvalidDeviateOperation,
                format!(
                    "Cannot 'deviate add' statement '{keyword}' as it already exists under the deviated statement. Use a 'deviate replace' instead."
                ),
            );
        }
        return;
    }
    if statements.len() + existing.len() > 1 && !multiple {
        let message = format!(
            "Cannot 'deviate add' this statement as at most one '{}' statement is allowed under '{}'.",
            schema.tree.node(first).keyword(),
            schema.tree.node(target).keyword()
        );
        schema.report(first, FindingType::DeviateCardinalityViolation, message);
        return;
    }
    for statement in statements {
        let note = format!("statement added by 'deviate add' in {}", location(schema, *statement));
        let clone = schema.tree.deep_clone(*statement, Some(target));
        schema.tree.add_app_data(clone, AppDataKind::Deviation, note);
        history.added.insert(clone);
    }
}

fn delete(schema: &mut Schema, history: &mut DeviationHistory, deviate: NodeId, target: NodeId) {
    for statement in schema.tree.children(deviate).to_vec() {
        delete_statement(schema, history, deviate, statement, target);
    }
}

fn delete_statement(
    schema: &mut Schema,
    history: &mut DeviationHistory,
    deviate: NodeId,
    statement: NodeId,
    target: NodeId,
) {
    let candidates = children_like(schema, target, statement);
    let value = schema.tree.node(statement).argument().map(str::to_string);
    let Some(existing) = candidates
        .iter()
        .copied()
        .find(|c| schema.tree.node(*c).argument().map(str::to_string) == value)
    else {
        schema.report(
            statement,
            FindingType::InvalidDeviateOperation,
            "Cannot 'deviate delete' this statement as the statement does not exist under the deviated statement.",
        );
        return;
    };

    let kind = schema.tree.node(statement).kind();
    let keyword = schema.tree.node(statement).keyword().to_string();
    let target_kind = schema.tree.node(target).kind();
    if candidates.len() == 1 && kind != K::ExtensionUsage && child_rules(target_kind).requires(kind) {
        schema.report(
            statement,
            FindingType::DeviateCardinalityViolation,
            format!(
                "Cannot 'deviate delete' this statement as at least a single '{keyword}' statement is required under deviated statement '{target_kind}'."
            ),
        );
        return;
    }
    if history.added.contains(&existing) {
        schema.report(
            statement,
            FindingType::DeviateDeleteOfDeviated,
            format!("Deletes a '{keyword}' statement that was previously added by a separate 'deviate add' operation."),
        );
    } else if history.replaced.contains(&existing) {
        schema.report(
            statement,
            FindingType::DeviateDeleteOfDeviated,
            format!("Deletes a '{keyword}' statement that was previously replaced by a separate 'deviate replace' operation."),
        );
    }

    let note = format!(
        "statement {} in {} deleted by 'deviate delete' in {}",
        schema.tree.node(existing).name_value(),
        location(schema, existing),
        location(schema, deviate)
    );
    schema.tree.add_app_data(target, AppDataKind::Deviation, note);
    schema.tree.detach(existing);
}

fn replace(schema: &mut Schema, history: &mut DeviationHistory, deviate: NodeId, target: NodeId) {
    check_narrowed_elements(schema, deviate, target);
    check_changed_data_type(schema, deviate, target);
    for kind in REPLACEABLE {
        let statements = schema.tree.children_of_kind(deviate, *kind);
        replace_statements(schema, history, deviate, target, &statements);
    }
    for statements in extension_groups(schema, deviate) {
        replace_statements(schema, history, deviate, target, &statements);
    }
}

fn replace_statements(
    schema: &mut Schema,
    history: &mut DeviationHistory,
    deviate: NodeId,
    target: NodeId,
    statements: &[NodeId],
) {
    let Some(first) = statements.first().copied() else {
        return;
    };
    let kind = schema.tree.node(first).kind();
    let keyword = schema.tree.node(first).keyword().to_string();
    let existing = children_like(schema, target, first);
    if existing.is_empty() && !ALWAYS_PRESENT.contains(&kind) {
        schema.report(
            first,
            FindingType::InvalidDeviateOperation,
            format!("Cannot 'deviate replace' statement '{keyword}' as it does not exist under the deviated statement."),
        );
        return;
    }
    let target_kind = schema.tree.node(target).kind();
    if kind != K::ExtensionUsage && statements.len() > 1 && !child_rules(target_kind).allows_multiple(kind) {
        schema.report(
            first,
            FindingType::DeviateCardinalityViolation,
            format!(
                "Cannot 'deviate replace' this statement as at most one '{keyword}' statement is allowed under '{target_kind}'."
            ),
        );
        return;
    }

    let replacing_replaced = existing.iter().any(|e| history.replaced.contains(e));
    let replacing_added = existing.iter().any(|e| history.added.contains(e));
    for old in &existing {
        let note = format!(
            "Previous statement/property {} in {} replaced by 'deviate replace' in {}",
            schema.tree.node(*old).name_value(),
            location(schema, target),
            location(schema, deviate)
        );
        schema.tree.add_app_data(target, AppDataKind::Deviation, note);
        schema.tree.detach(*old);
    }

    for statement in statements {
        if replacing_replaced {
            schema.report(
                *statement,
                FindingType::AmbiguousDeviateReplace,
                format!("Replaces another '{keyword}' statement that has replaced the original statement by a separate 'deviate replace' operation."),
            );
        } else if replacing_added {
            schema.report(
                *statement,
                FindingType::DeviateReplaceOfDeviateAdded,
                format!("Replaces another '{keyword}' statement that has been previously added by a separate 'deviate add' operation."),
            );
        }
        let note = format!(
            "Replacement for previous statement or (possibly implicit) property, replaced by 'deviate replace' in {}",
            location(schema, *statement)
        );
        let clone = schema.tree.deep_clone(*statement, Some(target));
        schema.tree.add_app_data(clone, AppDataKind::Deviation, note);
        history.replaced.insert(clone);
    }
}

/// `None` for `unbounded` or an absent statement.
fn max_elements(schema: &Schema, node: Option<NodeId>) -> Option<u64> {
    node.and_then(|n| schema.tree.node(n).identifier().parse().ok())
}

fn min_elements(schema: &Schema, node: Option<NodeId>) -> u64 {
    node.and_then(|n| schema.tree.node(n).identifier().parse().ok())
        .unwrap_or(0)
}

fn check_narrowed_elements(schema: &mut Schema, deviate: NodeId, target: NodeId) {
    if let Some(new_min) = schema.tree.child_of_kind(deviate, K::MinElements) {
        let old = min_elements(schema, schema.tree.child_of_kind(target, K::MinElements));
        let new = min_elements(schema, Some(new_min));
        if new > old {
            schema.report(
                new_min,
                FindingType::ConstraintNarrowed,
                format!("Replacement raises min-elements boundary from '{old}' to '{new}'."),
            );
        }
    }
    if let Some(new_max) = schema.tree.child_of_kind(deviate, K::MaxElements) {
        let old = max_elements(schema, schema.tree.child_of_kind(target, K::MaxElements));
        let new = max_elements(schema, Some(new_max));
        let message = match (old, new) {
            (None, Some(new)) => {
                Some(format!("Replacement lowers max-elements boundary from 'unbounded' to '{new}'."))
            }
            (Some(old), Some(new)) if new < old => {
                Some(format!("Replacement lowers max-elements boundary from '{old}' to '{new}'."))
            }
            _ => None,
        };
        if let Some(message) = message {
            schema.report(new_max, FindingType::ConstraintNarrowed, message);
        }
    }
}

fn collect_data_types(schema: &Schema, ty: NodeId, into: &mut BTreeSet<String>) {
    let name = schema.tree.node(ty).identifier();
    if name == "union" {
        for member in schema.tree.children_of_kind(ty, K::Type) {
            collect_data_types(schema, member, into);
        }
    } else {
        into.insert(name.to_string());
    }
}

fn check_changed_data_type(schema: &mut Schema, deviate: NodeId, target: NodeId) {
    let (Some(new_type), Some(old_type)) = (
        schema.tree.child_of_kind(deviate, K::Type),
        schema.tree.child_of_kind(target, K::Type),
    ) else {
        return;
    };
    let mut old = BTreeSet::new();
    let mut new = BTreeSet::new();
    collect_data_types(schema, old_type, &mut old);
    collect_data_types(schema, new_type, &mut new);
    if old != new {
        let list = |set: &BTreeSet<String>| set.iter().cloned().collect::<Vec<_>>().join(", ");
        schema.report(
            new_type,
            FindingType::DataTypeChanged,
            format!("Data type has changed from [{}] to [{}].", list(&old), list(&new)),
        );
    }
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

    fn base_module() -> UnitInput {
        let module = p("module", "base").with_children([
            p("namespace", "urn:base"),
            p("prefix", "b"),
            p("container", "system").with_children([
                p("leaf", "hostname").with_children([
                    p("type", "string"),
                    p("default", "localhost"),
                    p("must", "string-length(.) > 0"),
                ]),
                p("leaf-list", "servers").with_children([p("type", "string"), p("max-elements", "8")]),
                p("container", "legacy"),
            ]),
        ]);
        UnitInput::new("base.yang", ConformanceType::Implement, module)
    }

    fn resolve(deviations: Vec<ParsedStatement>) -> Schema {
        let module = p("module", "dev")
            .with_children([
                p("namespace", "urn:dev"),
                p("prefix", "d"),
                p("import", "base").with_child(p("prefix", "b")),
            ])
            .with_children(deviations);
        let mut schema = Schema::new(ResolverConfig::default());
        schema
            .parse_into_schema(vec![
                base_module(),
                UnitInput::new("dev.yang", ConformanceType::Implement, module),
            ])
            .unwrap();
        schema
    }

    fn deviation(path: &str, deviates: Vec<ParsedStatement>) -> ParsedStatement {
        p("deviation", path).with_children(deviates)
    }

    fn messages(schema: &Schema, ty: FindingType) -> Vec<String> {
        schema.findings().of_type(ty).map(|f| f.message.clone()).collect()
    }

    #[test]
    fn test_not_supported_removes_target() {
        let schema = resolve(vec![
            deviation("/b:system/b:legacy", vec![p("deviate", "not-supported")]),
            deviation("/b:system/b:legacy", vec![p("deviate", "not-supported")]),
        ]);
        assert!(schema.lookup("base", "system/legacy").is_none());
        let system = schema.lookup("base", "system").unwrap();
        assert!(schema.tree().node(system).app_data().iter().any(|d| d.kind == AppDataKind::Deviation));
        // The second deviation targets a node the first already removed.
        assert!(messages(&schema, FindingType::UnresolvablePath).is_empty());
    }

    #[test]
    fn test_add_replace_delete() {
        let schema = resolve(vec![deviation(
            "/b:system/b:hostname",
            vec![
                p("deviate", "add").with_child(p("units", "chars")),
                p("deviate", "replace").with_child(p("default", "router")),
                p("deviate", "delete").with_child(p("must", "string-length(.) > 0")),
            ],
        )]);
        let hostname = schema.lookup("base", "system/hostname").unwrap();
        let tree = schema.tree();
        assert_eq!(tree.child_argument(hostname, K::Units), Some("chars"));
        assert_eq!(tree.child_argument(hostname, K::Default), Some("router"));
        assert!(!tree.has_child_of_kind(hostname, K::Must));
        assert!(schema.findings().is_empty(), "{:?}", schema.findings().findings());
    }

    #[test]
    fn test_invalid_operations() {
        let schema = resolve(vec![deviation(
            "/b:system/b:hostname",
            vec![
                p("deviate", "add").with_child(p("default", "again")),
                p("deviate", "replace").with_child(p("units", "bytes")),
                p("deviate", "delete").with_child(p("must", "true()")),
                p("deviate", "delete").with_child(p("type", "string")),
            ],
        )]);
        let invalid = messages(&schema, FindingType::InvalidDeviateOperation);
        assert!(invalid.contains(&"Cannot 'deviate add' statement 'default' as it already exists under the deviated statement. Use a 'deviate replace' instead.".to_string()));
        assert!(invalid.contains(&"Cannot 'deviate replace' statement 'units' as it does not exist under the deviated statement.".to_string()));
        assert!(invalid.contains(&"Cannot 'deviate delete' this statement as the statement does not exist under the deviated statement.".to_string()));
        assert_eq!(messages(&schema, FindingType::DeviateCardinalityViolation).len(), 1);
    }

    #[test]
    fn test_replace_checks_narrowing_and_type_change() {
        let schema = resolve(vec![
            deviation(
                "/b:system/b:servers",
                vec![p("deviate", "replace").with_children([p("max-elements", "4"), p("min-elements", "1")])],
            ),
            deviation(
                "/b:system/b:hostname",
                vec![p("deviate", "replace").with_child(p("type", "union").with_children([
                    p("type", "string"),
                    p("type", "int32"),
                ]))],
            ),
        ]);
        let narrowed = messages(&schema, FindingType::ConstraintNarrowed);
        assert!(narrowed.contains(&"Replacement lowers max-elements boundary from '8' to '4'.".to_string()));
        assert!(narrowed.contains(&"Replacement raises min-elements boundary from '0' to '1'.".to_string()));
        assert_eq!(
            messages(&schema, FindingType::DataTypeChanged),
            vec!["Data type has changed from [string] to [int32, string].".to_string()]
        );
    }

    #[test]
    fn test_overlapping_deviates() {
        let schema = resolve(vec![
            deviation("/b:system/b:hostname", vec![p("deviate", "add").with_child(p("units", "chars"))]),
            deviation("/b:system/b:hostname", vec![p("deviate", "replace").with_child(p("units", "bytes"))]),
            deviation("/b:system/b:hostname", vec![p("deviate", "delete").with_child(p("units", "bytes"))]),
        ]);
        assert_eq!(messages(&schema, FindingType::DeviateReplaceOfDeviateAdded).len(), 1);
        assert_eq!(messages(&schema, FindingType::DeviateDeleteOfDeviated).len(), 1);
    }

    #[test]
    fn test_illegal_child_blocks_deviate() {
        let schema = resolve(vec![deviation(
            "/b:system/b:legacy",
            vec![p("deviate", "add").with_child(p("units", "x"))],
        )]);
        assert_eq!(
            messages(&schema, FindingType::IllegalChildStatement),
            vec!["Statement 'units' not a valid child statement of deviated statement 'container'.".to_string()]
        );
        let legacy = schema.lookup("base", "system/legacy").unwrap();
        assert!(!schema.tree().has_child_of_kind(legacy, K::Units));
    }

    #[test]
    fn test_unresolvable_target() {
        let schema = resolve(vec![deviation("/b:system/b:ghost", vec![p("deviate", "not-supported")])]);
        assert_eq!(
            messages(&schema, FindingType::UnresolvablePath),
            vec!["Path to schema node '/b:system/b:ghost', part of 'deviation' statement, cannot be resolved.".to_string()]
        );
    }
}
