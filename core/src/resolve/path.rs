//! Lookup of schema nodes by path and of typedefs and groupings by name.

use crate::finding::FindingType;
use crate::schema::Schema;
use crate::statement::{NodeId, StatementKind};
use crate::unit::UnitId;

/// Splits `prefix:name` into its parts.
pub(crate) fn split_prefix(qname: &str) -> (Option<&str>, &str) {
    match qname.split_once(':') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, qname),
    }
}

/// Resolves a schema node identifier as written on `origin`.
///
/// Absolute paths start at the root of the module named by the first
/// step's prefix (the tree `origin` lives in when unprefixed); relative
/// paths start at `origin` itself.
pub(crate) fn find_schema_node(schema: &mut Schema, origin: NodeId, path: &str) -> Option<NodeId> {
    let path = path.trim();
    let (absolute, relative) = match path.strip_prefix('/') {
        Some(rest) => (true, rest),
        None => (false, path),
    };
    let steps: Vec<&str> = relative.split('/').collect();
    let first = steps.first().copied().unwrap_or_default();

    let mut current = if absolute {
        absolute_start(schema, origin, first)?
    } else {
        origin
    };
    for step in steps {
        current = find_child_schema_node(schema, current, step, origin)?;
    }
    Some(current)
}

pub(crate) fn absolute_start(schema: &mut Schema, origin: NodeId, first: &str) -> Option<NodeId> {
    let (Some(prefix), _) = split_prefix(first) else {
        return Some(schema.tree.root_of(origin));
    };
    let Some(module) = schema.module_for_prefix(origin, prefix) else {
        schema.report(
            origin,
            FindingType::UnresolvablePrefix,
            format!("Prefix '{prefix}' part of path '{first}' cannot be resolved."),
        );
        return None;
    };
    let unit = schema.registry.find(&module)?;
    Some(schema.registry.get(unit).root())
}

/// Finds the child of `parent` that defines a schema node named by `step`.
///
/// A prefixed step only matches children carrying the prefix's namespace;
/// children not yet stamped with a namespace match any.
pub(crate) fn find_child_schema_node(
    schema: &mut Schema,
    parent: NodeId,
    step: &str,
    origin: NodeId,
) -> Option<NodeId> {
    let step = step.trim();
    let (prefix, name) = split_prefix(step);
    let namespace = match prefix {
        Some(prefix) => {
            let Some(module) = schema.module_for_prefix(origin, prefix) else {
                schema.report(
                    origin,
                    FindingType::UnresolvablePrefix,
                    format!("Prefix '{prefix}' part of path '{step}' cannot be resolved."),
                );
                return None;
            };
            schema
                .registry
                .find(&module)
                .and_then(|unit| schema.unit_namespace(unit))
        }
        None => None,
    };

    let tree = &schema.tree;
    tree.children(parent).iter().copied().find(|child| {
        let stmt = tree.node(*child);
        if !stmt.kind().defines_schema_node() || stmt.schema_node_name() != name {
            return false;
        }
        match (&namespace, &stmt.effective.namespace) {
            (Some(sought), Some(actual)) => sought == actual,
            _ => true,
        }
    })
}

/// Finds the typedef or grouping `reference` as used on `origin`.
///
/// Unprefixed and own-prefixed names are looked up in the enclosing
/// statements first, then at the top level of the module and its
/// submodules. Names with a foreign prefix are looked up at the top level
/// of the imported module.
pub(crate) fn find_definition(
    schema: &mut Schema,
    origin: NodeId,
    kind: StatementKind,
    reference: &str,
) -> Option<NodeId> {
    let (prefix, name) = split_prefix(reference.trim());
    let own = schema.unit_of(origin).default_module();
    let sought = match prefix {
        Some(prefix) => match schema.module_for_prefix(origin, prefix) {
            Some(module) => module,
            None => {
                schema.report(
                    origin,
                    FindingType::UnresolvablePrefix,
                    format!("Prefix '{prefix}' not resolvable to a (sub-)module name."),
                );
                return None;
            }
        },
        None => own.clone(),
    };

    if sought.name == own.name {
        let tree = &schema.tree;
        for ancestor in tree.ancestors(origin) {
            if schema.unit_of(ancestor).default_module().name != own.name {
                continue;
            }
            let found = tree.children(ancestor).iter().copied().find(|child| {
                let stmt = tree.node(*child);
                stmt.kind() == kind && stmt.identifier() == name
            });
            if found.is_some() {
                return found;
            }
        }
        let unit = schema.unit_of(origin).id();
        return find_at_module_top(schema, unit, kind, name);
    }

    let Some(unit) = schema.registry.find(&sought) else {
        schema.report(
            origin,
            FindingType::UnresolvablePrefix,
            format!(
                "Prefix '{}' resolves to '{sought}' but this is either not found in the input or is ambiguous.",
                prefix.unwrap_or_default()
            ),
        );
        return None;
    };
    find_at_module_top(schema, unit, kind, name)
}

fn find_at_module_top(schema: &Schema, unit: UnitId, kind: StatementKind, name: &str) -> Option<NodeId> {
    let module = {
        let unit = schema.registry.get(unit);
        if unit.is_module() {
            unit.id()
        } else {
            unit.owner().unwrap_or(unit.id())
        }
    };
    let mut scopes = vec![module];
    scopes.extend(schema.owned_submodules(module));
    scopes.into_iter().find_map(|scope| {
        let root = schema.registry.get(scope).root();
        schema.tree.children(root).iter().copied().find(|child| {
            let stmt = schema.tree.node(*child);
            stmt.kind() == kind && stmt.identifier() == name
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{ParsedStatement, UnitInput};
    use crate::unit::ConformanceType;
    use crate::ResolverConfig;

    fn schema() -> Schema {
        let types = ParsedStatement::new("module", "types").with_children([
            ParsedStatement::new("namespace", "urn:types"),
            ParsedStatement::new("prefix", "t"),
            ParsedStatement::new("typedef", "percent")
                .with_child(ParsedStatement::new("type", "uint8")),
        ]);
        let acme = ParsedStatement::new("module", "acme").with_children([
            ParsedStatement::new("namespace", "urn:acme"),
            ParsedStatement::new("prefix", "ac"),
            ParsedStatement::new("import", "types").with_child(ParsedStatement::new("prefix", "t")),
            ParsedStatement::new("container", "system").with_children([
                ParsedStatement::new("typedef", "local").with_child(ParsedStatement::new("type", "string")),
                ParsedStatement::new("leaf", "name").with_child(ParsedStatement::new("type", "local")),
            ]),
        ]);
        let config = ResolverConfig {
            stop_after_initial_parse: true,
            ..Default::default()
        };
        let mut schema = Schema::new(config);
        schema
            .parse_into_schema(vec![
                UnitInput::new("types.yang", ConformanceType::Import, types),
                UnitInput::new("acme.yang", ConformanceType::Implement, acme),
            ])
            .unwrap();
        schema
    }

    #[test]
    fn test_find_schema_node_absolute_and_relative() {
        let mut schema = schema();
        let root = schema.module("acme").unwrap().root();
        let system = find_schema_node(&mut schema, root, "/ac:system").unwrap();
        assert_eq!(schema.tree.node(system).identifier(), "system");
        let name = find_schema_node(&mut schema, system, "name").unwrap();
        assert_eq!(schema.tree.node(name).identifier(), "name");
        assert!(find_schema_node(&mut schema, root, "/ac:system/typedef").is_none());
    }

    #[test]
    fn test_unresolvable_prefix_reported() {
        let mut schema = schema();
        let root = schema.module("acme").unwrap().root();
        assert!(find_schema_node(&mut schema, root, "/zz:system").is_none());
        assert_eq!(schema.findings.of_type(FindingType::UnresolvablePrefix).count(), 1);
    }

    #[test]
    fn test_find_definition_local_then_imported() {
        let mut schema = schema();
        let leaf = schema.lookup("acme", "system/name").unwrap();
        let ty = schema.tree.child_of_kind(leaf, StatementKind::Type).unwrap();
        let local = find_definition(&mut schema, ty, StatementKind::Typedef, "local").unwrap();
        assert_eq!(schema.tree.node(local).identifier(), "local");

        let imported = find_definition(&mut schema, ty, StatementKind::Typedef, "t:percent").unwrap();
        assert_eq!(schema.unit_of(imported).name(), "types");
        assert!(find_definition(&mut schema, ty, StatementKind::Typedef, "missing").is_none());
    }
}
