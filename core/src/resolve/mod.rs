//! The resolution passes.
//!
//! [`run_passes`] applies every pass in a fixed order. Later passes rely on
//! the tree shape earlier ones leave behind: augments and deviations need
//! `uses` already expanded, import-only pruning needs conformance stamped,
//! and status is assigned twice because expansion moves nodes around.

mod augment;
mod deviation;
mod feature;
mod path;
mod props;
mod registries;
mod types;
mod uses;

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::schema::{HookPhase, Schema};
use crate::statement::{AppDataKind, NodeId, StatementKind, StatementTree};
use crate::unit::ConformanceType;

use StatementKind as K;

/// Kinds moved into the target of an `augment`.
pub(crate) const AUGMENTED_KINDS: &[StatementKind] = &[
    K::Action,
    K::Anydata,
    K::Anyxml,
    K::Case,
    K::Choice,
    K::Container,
    K::LeafList,
    K::Leaf,
    K::List,
    K::Notification,
];

/// Top-level kinds a submodule contributes to its module, in merge order.
const MERGED_KINDS: &[StatementKind] = &[
    K::Anydata,
    K::Anyxml,
    K::Augment,
    K::Choice,
    K::Container,
    K::Deviation,
    K::Extension,
    K::Feature,
    K::Grouping,
    K::Identity,
    K::LeafList,
    K::Leaf,
    K::List,
    K::Notification,
    K::Rpc,
    K::Typedef,
    K::Uses,
];

/// Kinds an import-only module must not contribute to the schema.
const PROTOCOL_ACCESSIBLE: &[StatementKind] = &[
    K::Anydata,
    K::Anyxml,
    K::Augment,
    K::Choice,
    K::Container,
    K::Deviation,
    K::Leaf,
    K::LeafList,
    K::List,
    K::Notification,
    K::Rpc,
    K::Uses,
];

pub(crate) fn run_passes(schema: &mut Schema) -> Result<()> {
    let config = schema.config().clone();

    if config.merge_submodules {
        merge_submodules(schema);
    }
    fixup_omitted_cases(schema)?;
    fixup_missing_input_output(schema);
    props::assign_status(schema);

    if config.resolve_derived_types_and_groupings {
        types::resolve_derived_types(schema)?;
        uses::resolve_uses(schema)?;
    }
    props::assign_namespaces(schema);
    props::assign_conformance(schema);

    if config.resolve_augments {
        augment::resolve_augments(schema)?;
    }
    if config.resolve_deviations {
        deviation::resolve_deviations(schema)?;
    }
    if config.ignore_imported_protocol_accessible_objects {
        for root in schema.unit_roots() {
            remove_protocol_accessible_objects(&mut schema.tree, root);
        }
    }
    props::assign_status(schema);
    props::assign_config(schema);

    if config.remove_if_feature_gated_nodes {
        feature::remove_if_feature_gated_nodes(schema);
    }
    if config.suppress_findings_on_unused_nodes {
        remove_findings_on_unused_nodes(schema);
    }
    registries::build_identity_registry(schema);
    registries::build_annotation_registry(schema);

    schema.run_hooks(HookPhase::Post);
    info!(
        units = schema.registry.len(),
        findings = schema.findings.len(),
        "schema resolved"
    );
    Ok(())
}

/// Progress made by one attempt at resolving `node`. A failed attempt is
/// logged and `node` is set aside, so the rest of the pass still runs.
pub(crate) fn settle(unresolvable: &mut HashSet<NodeId>, node: NodeId, outcome: Result<bool>) -> bool {
    match outcome {
        Ok(progress) => progress,
        Err(err) => {
            warn!(error = %err, node = node.index(), "statement could not be resolved");
            unresolvable.insert(node);
            false
        }
    }
}

/// `module 'x' (line n)` or `submodule 'x' (line n)` for the unit `node`
/// was written in.
pub(crate) fn location(schema: &Schema, node: NodeId) -> String {
    let unit = schema.unit_of(node);
    let kind = if unit.is_submodule() { "submodule" } else { "module" };
    format!("{kind} '{}' (line {})", unit.name(), schema.tree.node(node).line())
}

/// Wraps every shorthand child of `parent` in a `case` of the same name,
/// placed where the shorthand was.
pub(crate) fn inject_cases(tree: &mut StatementTree, parent: NodeId) -> Result<()> {
    let shorthands: Vec<NodeId> = tree
        .children(parent)
        .iter()
        .copied()
        .filter(|c| tree.node(*c).kind().is_case_shorthand())
        .collect();
    for child in shorthands {
        let statement = tree.node(child);
        let (name, line, unit) = (statement.identifier().to_string(), statement.line(), statement.unit());
        let effective = statement.effective.clone();

        let case = tree.create(K::Case, K::Case.keyword(), Some(name), line, unit);
        tree.node_mut(case).effective = effective;
        tree.replace_in_place(child, case)?;
        tree.append_child(case, child);
        for if_feature in tree.children_of_kind(child, K::IfFeature) {
            tree.deep_clone(if_feature, Some(case));
        }
        tree.add_app_data(
            case,
            AppDataKind::General,
            "originally omitted 'case' statement inserted for readability.",
        );
    }
    Ok(())
}

fn statements_anywhere(schema: &Schema, kinds: &[StatementKind]) -> Vec<NodeId> {
    schema
        .unit_roots()
        .into_iter()
        .flat_map(|root| schema.tree.descendants(root))
        .filter(|n| kinds.contains(&schema.tree.node(*n).kind()))
        .collect()
}

/// Moves the top-level content of each submodule into its owning module.
fn merge_submodules(schema: &mut Schema) {
    let pairs: Vec<(NodeId, NodeId)> = schema
        .registry
        .all()
        .iter()
        .filter(|u| u.is_submodule())
        .filter_map(|sub| {
            let belongs_to = sub.belongs_to()?;
            match schema.registry.by_name(&belongs_to.module).as_slice() {
                [owner] if schema.registry.get(*owner).is_module() => {
                    Some((sub.root(), schema.registry.get(*owner).root()))
                }
                _ => None,
            }
        })
        .collect();
    for (submodule, module) in pairs {
        for kind in MERGED_KINDS {
            let moved = schema.tree.children_of_kind(submodule, *kind);
            schema.tree.move_children_to(&moved, module);
        }
        debug!(submodule = %schema.tree.node(submodule).identifier(), "merged submodule");
    }
}

fn fixup_omitted_cases(schema: &mut Schema) -> Result<()> {
    for choice in statements_anywhere(schema, &[K::Choice]) {
        inject_cases(&mut schema.tree, choice)?;
    }
    Ok(())
}

/// Gives every `action` and `rpc` an `input` and an `output`, so that
/// augments can always target them.
fn fixup_missing_input_output(schema: &mut Schema) {
    for operation in statements_anywhere(schema, &[K::Action, K::Rpc]) {
        for kind in [K::Input, K::Output] {
            if schema.tree.has_child_of_kind(operation, kind) {
                continue;
            }
            let statement = schema.tree.node(operation);
            let (line, unit, effective) = (statement.line(), statement.unit(), statement.effective.clone());
            let io = schema.tree.create(kind, kind.keyword(), None, line, unit);
            schema.tree.node_mut(io).effective = effective;
            schema.tree.append_child(operation, io);
        }
    }
}

fn remove_protocol_accessible_objects(tree: &mut StatementTree, parent: NodeId) {
    for child in tree.children(parent).to_vec() {
        let statement = tree.node(child);
        if statement.kind() == K::ExtensionUsage {
            continue;
        }
        if statement.effective.conformance == Some(ConformanceType::Import)
            && PROTOCOL_ACCESSIBLE.contains(&statement.kind())
        {
            tree.detach(child);
        } else if statement.kind().defines_schema_node() {
            remove_protocol_accessible_objects(tree, child);
        }
    }
}

/// Drops findings on statements of the input that no longer take part in
/// the schema. Groupings and typedefs count as used as a whole.
fn remove_findings_on_unused_nodes(schema: &mut Schema) {
    let mut used = HashSet::new();
    let mut stack = schema.unit_roots();
    while let Some(node) = stack.pop() {
        used.insert(schema.tree.node(node).origin());
        if matches!(schema.tree.node(node).kind(), K::Grouping | K::Typedef) {
            continue;
        }
        stack.extend(schema.tree.children(node).iter().copied());
    }
    let unused: HashSet<NodeId> = schema
        .tree
        .ids()
        .filter(|id| !used.contains(&schema.tree.node(*id).origin()))
        .collect();
    let removed = schema.findings.remove_findings_on_nodes(&unused);
    debug!(removed, "removed findings on unused nodes");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResolverConfig;
    use crate::error::ResolveError;
    use crate::finding::FindingType;
    use crate::input::{ParsedStatement, UnitInput};

    fn p(keyword: &str, argument: &str) -> ParsedStatement {
        ParsedStatement::new(keyword, argument)
    }

    fn resolve(config: ResolverConfig, inputs: Vec<UnitInput>) -> Schema {
        let mut schema = Schema::new(config);
        schema.parse_into_schema(inputs).unwrap();
        schema
    }

    #[test]
    fn test_submodule_content_merged() {
        let module = p("module", "acme").with_children([
            p("namespace", "urn:acme"),
            p("prefix", "ac"),
            p("include", "acme-types"),
            p("container", "system"),
        ]);
        let submodule = p("submodule", "acme-types").with_children([
            p("belongs-to", "acme").with_child(p("prefix", "ac")),
            p("typedef", "name").with_child(p("type", "string")),
            p("container", "extras").with_child(p("leaf", "label").with_child(p("type", "ac:name"))),
        ]);
        let schema = resolve(
            ResolverConfig::default(),
            vec![
                UnitInput::new("acme.yang", ConformanceType::Implement, module),
                UnitInput::new("acme-types.yang", ConformanceType::Implement, submodule),
            ],
        );
        let label = schema.lookup("acme", "extras/label").unwrap();
        let tree = schema.tree();
        assert_eq!(tree.child_argument(label, K::Type), Some("string"));
        assert_eq!(tree.node(label).effective.namespace.as_deref(), Some("urn:acme"));
        assert!(schema.lookup("acme-types", "extras").is_none());
    }

    #[test]
    fn test_shorthand_cases_and_io_injected() {
        let module = p("module", "acme").with_children([
            p("namespace", "urn:acme"),
            p("prefix", "ac"),
            p("choice", "proto").with_children([
                p("leaf", "tcp").with_children([p("type", "empty"), p("if-feature", "tcp")]),
                p("case", "udp").with_child(p("leaf", "udp").with_child(p("type", "empty"))),
            ]),
            p("rpc", "ping").with_child(ParsedStatement::bare("input")),
        ]);
        let schema = resolve(
            ResolverConfig::default(),
            vec![UnitInput::new("acme.yang", ConformanceType::Implement, module)],
        );
        let case = schema.lookup("acme", "proto/tcp").unwrap();
        let tree = schema.tree();
        assert_eq!(tree.node(case).kind(), K::Case);
        assert_eq!(tree.child_argument(case, K::IfFeature), Some("tcp"));
        assert!(tree.node(case).app_data().iter().any(|d| d.kind == AppDataKind::General));
        let proto = schema.lookup("acme", "proto").unwrap();
        assert_eq!(tree.position_in_parent(case), Some(tree.children(proto).len() - 2));
        assert!(schema.lookup("acme", "ping/input").is_some());
        assert!(schema.lookup("acme", "ping/output").is_some());
    }

    #[test]
    fn test_import_only_objects_pruned() {
        let imported = p("module", "lib").with_children([
            p("namespace", "urn:lib"),
            p("prefix", "l"),
            p("container", "data"),
            p("identity", "kept"),
        ]);
        let main = p("module", "main").with_children([
            p("namespace", "urn:main"),
            p("prefix", "m"),
            p("import", "lib").with_child(p("prefix", "l")),
            p("container", "top"),
        ]);
        let schema = resolve(
            ResolverConfig::default(),
            vec![
                UnitInput::new("lib.yang", ConformanceType::Import, imported),
                UnitInput::new("main.yang", ConformanceType::Implement, main),
            ],
        );
        assert!(schema.lookup("lib", "data").is_none());
        assert!(schema.lookup("main", "top").is_some());
        assert_eq!(schema.identity_registry().len(), 1);
    }

    #[test]
    fn test_findings_on_unused_groupings_suppressed() {
        let module = p("module", "acme").with_children([
            p("namespace", "urn:acme"),
            p("prefix", "ac"),
            p("container", "top").with_child(p("uses", "missing")),
        ]);
        let config = ResolverConfig {
            suppress_findings_on_unused_nodes: true,
            ..Default::default()
        };
        let schema = resolve(config, vec![UnitInput::new("acme.yang", ConformanceType::Implement, module)]);
        // The unresolved `uses` stays in the tree, so its finding survives.
        assert!(schema.findings().has_finding_of_type(FindingType::UnresolvableGrouping));

        let module = p("module", "acme").with_children([
            p("namespace", "urn:acme"),
            p("prefix", "ac"),
            p("container", "gone").with_children([
                p("if-feature", "never"),
                p("leaf", "bad").with_child(p("type", "no-such-type")),
            ]),
        ]);
        let config = ResolverConfig {
            suppress_findings_on_unused_nodes: true,
            remove_if_feature_gated_nodes: true,
            supported_features: Some(Vec::new()),
            ..Default::default()
        };
        let schema = resolve(config, vec![UnitInput::new("acme.yang", ConformanceType::Implement, module)]);
        assert!(schema.lookup("acme", "gone").is_none());
        assert!(!schema.findings().has_finding_of_type(FindingType::UnresolvableDerivedType));
    }

    #[test]
    fn test_failed_statement_is_set_aside() {
        let module = p("module", "acme").with_children([
            p("namespace", "urn:acme"),
            p("prefix", "ac"),
            p("container", "top"),
        ]);
        let schema = resolve(
            ResolverConfig::default(),
            vec![UnitInput::new("acme.yang", ConformanceType::Implement, module)],
        );
        let top = schema.lookup("acme", "top").unwrap();

        let mut unresolvable = HashSet::new();
        assert!(settle(&mut unresolvable, top, Ok(true)));
        assert!(!settle(&mut unresolvable, top, Ok(false)));
        assert!(unresolvable.is_empty());

        assert!(!settle(&mut unresolvable, top, Err(ResolveError::Detached(top))));
        assert!(unresolvable.contains(&top));
    }
}
