//! Removal of statements whose `if-feature` conditions are not satisfied.

use crate::finding::{Finding, FindingType};
use crate::if_feature::{evaluate, tokenize, validate};
use crate::schema::Schema;
use crate::statement::{AppData, AppDataKind, NodeId, StatementKind};
use crate::unit::YangFeature;

use super::path::split_prefix;

pub(crate) fn remove_if_feature_gated_nodes(schema: &mut Schema) {
    if schema.config().supported_features.is_none() {
        schema.findings.add_finding(Finding::general(
            FindingType::UnspecifiedError,
            "Cannot remove schema nodes whose if-feature is not satisfied, as information about the features supported has not been supplied.",
        ));
        return;
    }
    check_features_constrained_by_if_features(schema);
    for root in schema.unit_roots() {
        prune(schema, root);
    }
}

/// A feature listed as supported must not itself be disabled by its own
/// `if-feature`.
fn check_features_constrained_by_if_features(schema: &mut Schema) {
    let units: Vec<_> = schema.registry.all().iter().map(|u| (u.id(), u.root())).collect();
    for (unit, root) in units {
        for feature in schema.tree.children_of_kind(root, StatementKind::Feature) {
            if if_features_satisfied(schema, feature) {
                continue;
            }
            let name = schema.tree.node(feature).identifier().to_string();
            let declared = yang_feature(schema, schema.unit_namespace(unit), &name);
            if declared.is_some_and(|f| schema.config().supports(&f.module, &f.name)) {
                schema.report(
                    feature,
                    FindingType::FeatureCannotBeSupported,
                    format!("Feature '{name}' has been supplied as supported, but it's 'if-feature' statement evaluates to false."),
                );
            }
        }
    }
}

fn prune(schema: &mut Schema, parent: NodeId) {
    for child in schema.tree.children(parent).to_vec() {
        let is_feature = schema.tree.node(child).kind() == StatementKind::Feature;
        if is_feature || if_features_satisfied(schema, child) {
            prune(schema, child);
            continue;
        }
        let statement = schema.tree.node(child);
        let identifier = statement.identifier().to_string();
        let data = AppData {
            kind: AppDataKind::IfFeatureRemoval,
            text: format!(
                "Child statement {} removed as it's if-feature condition evaluated to false.",
                statement.name_value()
            ),
            removed: if identifier.is_empty() { Vec::new() } else { vec![identifier] },
        };
        schema.tree.push_app_data(parent, data);
        schema.tree.detach(child);
    }
}

/// All `if-feature` children of `node` must hold.
fn if_features_satisfied(schema: &mut Schema, node: NodeId) -> bool {
    schema
        .tree
        .children_of_kind(node, StatementKind::IfFeature)
        .into_iter()
        .all(|if_feature| if_feature_satisfied(schema, if_feature))
}

fn if_feature_satisfied(schema: &mut Schema, if_feature: NodeId) -> bool {
    let tokens = tokenize(schema.tree.node(if_feature).identifier());
    if let Err(message) = validate(&tokens) {
        schema.report(if_feature, FindingType::IllegalIfFeatureSyntax, message);
        return false;
    }
    evaluate(&tokens, |name| feature_supported(schema, if_feature, name))
}

fn feature_supported(schema: &mut Schema, if_feature: NodeId, qname: &str) -> bool {
    let (prefix, name) = split_prefix(qname);
    let namespace = match prefix {
        Some(prefix) => {
            let Some(module) = schema.module_for_prefix(if_feature, prefix) else {
                schema.report(
                    if_feature,
                    FindingType::UnresolvablePrefix,
                    format!("Unresolvable prefix '{prefix}'."),
                );
                return false;
            };
            let Some(unit) = schema.registry.find(&module) else {
                schema.report(
                    if_feature,
                    FindingType::UnresolvableImport,
                    format!("Cannot find '{module}' in input."),
                );
                return false;
            };
            schema.unit_namespace(unit)
        }
        None => schema.unit_namespace(schema.tree.node(if_feature).unit()),
    };
    yang_feature(schema, namespace, name).is_some_and(|f| schema.config().supports(&f.module, &f.name))
}

/// Identifies feature `name` of the module registered for `namespace`.
fn yang_feature(schema: &Schema, namespace: Option<String>, name: &str) -> Option<YangFeature> {
    let namespace = namespace?;
    let module = schema.resolver.module_for_namespace(&namespace)?.to_string();
    Some(YangFeature::new(namespace, module, name))
}
