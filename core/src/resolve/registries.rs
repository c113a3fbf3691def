//! Population of the identity and annotation registries from the resolved
//! unit trees.

use tracing::debug;

use crate::registry::{YangAnnotation, YangIdentity};
use crate::schema::Schema;
use crate::statement::StatementKind;
use crate::unit::UnitId;

use super::path::split_prefix;

const METADATA_MODULE: &str = "ietf-yang-metadata";

/// Namespace of `unit` and the module name registered for it.
fn unit_namespace_and_module(schema: &Schema, unit: UnitId) -> (Option<String>, Option<String>) {
    let namespace = schema.unit_namespace(unit);
    let module = namespace
        .as_deref()
        .and_then(|ns| schema.resolver.module_for_namespace(ns))
        .map(str::to_string);
    (namespace, module)
}

/// Rebuilds the identity registry: all top-level identities first, then
/// their `base` links.
pub(crate) fn build_identity_registry(schema: &mut Schema) {
    schema.identities.clear();
    let units: Vec<_> = schema.registry.all().iter().map(|u| (u.id(), u.root())).collect();

    for (unit, root) in &units {
        let (namespace, module) = unit_namespace_and_module(schema, *unit);
        for identity in schema.tree.children_of_kind(*root, StatementKind::Identity) {
            let name = schema.tree.node(identity).identifier();
            schema
                .identities
                .add_identity(YangIdentity::new(namespace.clone(), module.clone(), name));
        }
    }

    for (unit, root) in &units {
        let (namespace, module) = unit_namespace_and_module(schema, *unit);
        for identity in schema.tree.children_of_kind(*root, StatementKind::Identity) {
            let derived = YangIdentity::new(
                namespace.clone(),
                module.clone(),
                schema.tree.node(identity).identifier(),
            );
            for base in schema.tree.children_of_kind(identity, StatementKind::Base) {
                let reference = schema.tree.node(base).identifier();
                if reference.is_empty() {
                    continue;
                }
                let (prefix, name) = split_prefix(reference);
                let base_namespace = match prefix {
                    Some(prefix) => schema
                        .module_for_prefix(identity, prefix)
                        .and_then(|m| schema.registry.find(&m))
                        .and_then(|u| schema.unit_namespace(u)),
                    None => namespace.clone(),
                };
                let base_module = base_namespace
                    .as_deref()
                    .and_then(|ns| schema.resolver.module_for_namespace(ns))
                    .map(str::to_string);
                let base = YangIdentity::new(base_namespace, base_module, name);
                schema.identities.add_base_identity(&derived, &base);
            }
        }
    }
    debug!(identities = schema.identities.len(), "built identity registry");
}

/// Records every top-level `annotation` extension of the metadata module.
pub(crate) fn build_annotation_registry(schema: &mut Schema) {
    schema.annotations.clear();
    let units: Vec<_> = schema.registry.all().iter().map(|u| (u.id(), u.root())).collect();
    for (unit, root) in units {
        let namespace = schema.unit_namespace(unit);
        let owner = schema.registry.get(unit);
        let module = match owner.owner() {
            Some(id) if owner.is_submodule() => schema.registry.get(id).name().to_string(),
            _ => owner.name().to_string(),
        };
        for ext in schema.tree.children_of_kind(root, StatementKind::ExtensionUsage) {
            let Some((prefix, name)) = schema.tree.node(ext).extension_parts() else {
                continue;
            };
            if name != "annotation" {
                continue;
            }
            let defining = schema.module_for_prefix(ext, prefix);
            if defining.is_some_and(|m| m.name == METADATA_MODULE) {
                schema.annotations.add_annotation(YangAnnotation {
                    namespace: namespace.clone(),
                    module: module.clone(),
                    name: schema.tree.node(ext).identifier().to_string(),
                });
            }
        }
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

    fn identity(module: &str, ns: &str, name: &str) -> YangIdentity {
        YangIdentity::new(Some(ns), Some(module), name)
    }

    #[test]
    fn test_identities_across_modules() {
        let base = p("module", "if-types").with_children([
            p("namespace", "urn:if"),
            p("prefix", "if"),
            p("identity", "interface-type"),
            p("identity", "ethernet").with_child(p("base", "interface-type")),
        ]);
        let vendor = p("module", "vendor").with_children([
            p("namespace", "urn:vendor"),
            p("prefix", "v"),
            p("import", "if-types").with_child(p("prefix", "if")),
            p("identity", "fast-ethernet").with_child(p("base", "if:ethernet")),
        ]);
        let mut schema = Schema::new(ResolverConfig::default());
        schema
            .parse_into_schema(vec![
                UnitInput::new("if-types.yang", ConformanceType::Implement, base),
                UnitInput::new("vendor.yang", ConformanceType::Implement, vendor),
            ])
            .unwrap();

        let registry = schema.identity_registry();
        assert_eq!(registry.len(), 3);
        let closure = registry.identity_and_derived_recursively(&identity("if-types", "urn:if", "interface-type"));
        assert!(closure.contains(&identity("vendor", "urn:vendor", "fast-ethernet")));
        assert_eq!(closure.len(), 3);
    }

    #[test]
    fn test_annotations_from_metadata_module() {
        let md = p("module", "ietf-yang-metadata").with_children([
            p("namespace", "urn:ietf:params:xml:ns:yang:ietf-yang-metadata"),
            p("prefix", "md"),
            p("extension", "annotation").with_child(p("argument", "name")),
        ]);
        let user = p("module", "acme").with_children([
            p("namespace", "urn:acme"),
            p("prefix", "ac"),
            p("import", "ietf-yang-metadata").with_child(p("prefix", "md")),
            p("md:annotation", "last-modified").with_child(p("type", "string")),
            p("md:other", "ignored"),
        ]);
        let mut schema = Schema::new(ResolverConfig::default());
        schema
            .parse_into_schema(vec![
                UnitInput::new("md.yang", ConformanceType::Import, md),
                UnitInput::new("acme.yang", ConformanceType::Implement, user),
            ])
            .unwrap();
        assert_eq!(
            schema.annotation_registry().annotations(),
            &[YangAnnotation {
                namespace: Some("urn:acme".into()),
                module: "acme".into(),
                name: "last-modified".into(),
            }]
        );
    }
}
