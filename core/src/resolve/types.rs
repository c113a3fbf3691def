//! Resolution of derived types.
//!
//! Every `type` naming a typedef is replaced by a copy of the typedef's own
//! `type`, with the restrictions of the using statement applied to the copy.
//! Typedefs built on other typedefs resolve over several sweeps, innermost
//! first.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::boundary::{NumericDomain, fits_within, parse_length, parse_range, validate_boundaries};
use crate::error::Result;
use crate::finding::FindingType;
use crate::schema::Schema;
use crate::statement::{AppDataKind, NodeId, StatementKind, StatementTree};

use super::path::find_definition;
use super::settle;

const MAX_SWEEPS: u32 = 10;

const BUILTIN_TYPES: &[&str] = &[
    "binary",
    "bits",
    "boolean",
    "decimal64",
    "empty",
    "enumeration",
    "identityref",
    "instance-identifier",
    "int8",
    "int16",
    "int32",
    "int64",
    "leafref",
    "string",
    "uint8",
    "uint16",
    "uint32",
    "uint64",
    "union",
];

pub(crate) fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

#[derive(Debug, Default)]
struct TypeState {
    unresolvable: HashSet<NodeId>,
    /// Keyed by the original typedef, so copies count towards it.
    usage: HashMap<NodeId, u32>,
}

pub(crate) fn resolve_derived_types(schema: &mut Schema) -> Result<()> {
    let mut state = TypeState::default();
    let mut remaining = MAX_SWEEPS;
    let mut progress = true;
    while remaining > 0 && progress {
        progress = false;
        remaining -= 1;
        for ty in types_to_consider(schema, &state) {
            let outcome = resolve_type(schema, &mut state, ty);
            progress |= settle(&mut state.unresolvable, ty, outcome);
        }
        if remaining == MAX_SWEEPS - 3 {
            if let Some(deep) = types_to_consider(schema, &state).first() {
                schema.report(
                    *deep,
                    FindingType::ExcessiveTypedefDepth,
                    "Statement refers to 'typedef' with nesting depth > 3.",
                );
            }
        }
    }

    for ty in types_to_consider(schema, &state) {
        schema.report(
            ty,
            FindingType::CircularTypedefReferences,
            "Likely circular references between 'type' and 'typedef'. Use the quoted file and line number as starting point for investigation.",
        );
    }

    for typedef in statements_in_schema(schema, StatementKind::Typedef) {
        if schema.tree.node(typedef).origin() != typedef {
            continue;
        }
        let name = schema.tree.node(typedef).identifier().to_string();
        match state.usage.get(&typedef).copied().unwrap_or(0) {
            0 => schema.report(
                typedef,
                FindingType::TypedefNotUsed,
                format!("typedef statement '{name}' not used."),
            ),
            1 => schema.report(
                typedef,
                FindingType::TypedefUsedOnceOnly,
                format!("typedef statement '{name}' used only once; consider inlining."),
            ),
            _ => {}
        }
    }

    loop {
        let mut changed = false;
        for ty in statements_in_schema(schema, StatementKind::Type) {
            changed |= flatten_union(&mut schema.tree, ty);
        }
        if !changed {
            break;
        }
    }
    Ok(())
}

/// Every statement of `kind` reachable from a unit root.
pub(crate) fn statements_in_schema(schema: &Schema, kind: StatementKind) -> Vec<NodeId> {
    schema
        .unit_roots()
        .into_iter()
        .flat_map(|root| schema.tree.find_in_subtree(root, kind))
        .collect()
}

fn types_to_consider(schema: &Schema, state: &TypeState) -> Vec<NodeId> {
    statements_in_schema(schema, StatementKind::Type)
        .into_iter()
        .filter(|ty| !is_builtin_type(schema.tree.node(*ty).identifier()))
        .filter(|ty| !state.unresolvable.contains(ty))
        .collect()
}

fn resolve_type(schema: &mut Schema, state: &mut TypeState, ty: NodeId) -> Result<bool> {
    let name = schema.tree.node(ty).identifier().to_string();
    if name.is_empty() {
        state.unresolvable.insert(ty);
        return Ok(false);
    }

    let typedef = find_definition(schema, ty, StatementKind::Typedef, &name);
    let Some((typedef, base)) =
        typedef.and_then(|td| schema.tree.child_of_kind(td, StatementKind::Type).map(|b| (td, b)))
    else {
        state.unresolvable.insert(ty);
        schema.report(
            ty,
            FindingType::UnresolvableDerivedType,
            format!("Cannot resolve typedef '{name}'."),
        );
        return Ok(false);
    };

    if has_nested_derived_type(schema, state, ty, base, &name) {
        return Ok(false);
    }
    let origin = schema.tree.node(typedef).origin();
    *state.usage.entry(origin).or_default() += 1;

    let copy = schema.tree.deep_clone(base, None);
    restrict_patterns(schema, ty, copy);
    restrict_length(schema, ty, copy);
    restrict_range(schema, ty, copy);
    restrict_bits(schema, ty, copy);
    restrict_enums(schema, ty, copy);
    copy_default(&mut schema.tree, typedef, ty);

    schema.tree.replace_in_place(ty, copy)?;
    let module = schema.unit_of(typedef).name().to_string();
    schema.tree.add_app_data(
        copy,
        AppDataKind::DerivedType,
        format!("Resolved from typedef '{name}' of module '{module}'."),
    );
    validate_copied_boundaries(schema, copy);

    debug!(typedef = %name, module = %module, "resolved derived type");
    Ok(true)
}

/// Checks the typedef's own type and its union members. Returns `true` if
/// resolution must wait for a nested typedef to resolve first.
fn has_nested_derived_type(
    schema: &mut Schema,
    state: &mut TypeState,
    ty: NodeId,
    base: NodeId,
    name: &str,
) -> bool {
    let mut members = vec![base];
    members.extend(schema.tree.children_of_kind(base, StatementKind::Type));

    let mut unresolvable = false;
    let mut derived = false;
    for member in members {
        if state.unresolvable.contains(&member) {
            unresolvable = true;
            let name_value = schema.tree.node(member).name_value();
            schema.report(
                ty,
                FindingType::NestedDerivedTypeNotResolvable,
                format!("Referenced typedef '{name}' has nested unresolvable 'type' statement {name_value}."),
            );
        }
        if !is_builtin_type(schema.tree.node(member).identifier()) {
            derived = true;
        }
    }
    if unresolvable {
        state.unresolvable.insert(ty);
    }
    derived
}

fn illegal_restriction(schema: &mut Schema, ty: NodeId, message: &str) {
    let target = schema.tree.node(ty).parent().unwrap_or(ty);
    schema.report(target, FindingType::IllegalDataTypeRestriction, message);
}

fn restrict_patterns(schema: &mut Schema, ty: NodeId, copy: NodeId) {
    let patterns = schema.tree.children_of_kind(ty, StatementKind::Pattern);
    if patterns.is_empty() {
        return;
    }
    if schema.tree.node(copy).identifier() != "string" {
        illegal_restriction(
            schema,
            ty,
            "Base type of derived type is not 'string'; hence cannot use 'pattern' as substatement to restrict the type.",
        );
        return;
    }
    schema.tree.move_children_to(&patterns, copy);
}

fn restrict_length(schema: &mut Schema, ty: NodeId, copy: NodeId) {
    let Some(length) = schema.tree.child_of_kind(ty, StatementKind::Length) else {
        return;
    };
    if !matches!(schema.tree.node(copy).identifier(), "string" | "binary") {
        illegal_restriction(
            schema,
            ty,
            "Base type of derived type is not 'string' or 'binary'; hence cannot use 'length' as substatement to restrict the type.",
        );
        return;
    }
    if let Some(allowed) = schema.tree.child_argument(copy, StatementKind::Length) {
        let allowed = parse_length(allowed);
        let restriction = parse_length(schema.tree.node(length).identifier());
        if !fits_within(&restriction, &allowed) {
            schema.report(
                length,
                FindingType::IllegalDataTypeRestriction,
                "When using a derived type and specifying 'length', the allowed length can only become more restrictive, not wider.",
            );
        }
    }
    schema.tree.replace_children_of_same_kind(copy, &[length]);
}

fn numeric_domain(tree: &StatementTree, ty: NodeId) -> Option<NumericDomain> {
    let fraction_digits = tree
        .child_argument(ty, StatementKind::FractionDigits)
        .and_then(|fd| fd.parse().ok());
    NumericDomain::from_type_name(tree.node(ty).identifier(), fraction_digits)
}

fn restrict_range(schema: &mut Schema, ty: NodeId, copy: NodeId) {
    let Some(range) = schema.tree.child_of_kind(ty, StatementKind::Range) else {
        return;
    };
    if !NumericDomain::is_numeric_type(schema.tree.node(copy).identifier()) {
        illegal_restriction(
            schema,
            ty,
            "Base type of derived type is not a numeric type; hence cannot use 'range' as substatement to restrict the type.",
        );
        return;
    }
    let domain = numeric_domain(&schema.tree, copy);
    let allowed = schema.tree.child_argument(copy, StatementKind::Range);
    if let (Some(domain), Some(allowed)) = (domain, allowed) {
        let allowed = parse_range(allowed, domain);
        let restriction = parse_range(schema.tree.node(range).identifier(), domain);
        if !fits_within(&restriction, &allowed) {
            schema.report(
                range,
                FindingType::IllegalDataTypeRestriction,
                "When using a derived type and specifying 'range', the allowed range can only become more restrictive, not wider.",
            );
        }
    }
    schema.tree.replace_children_of_same_kind(copy, &[range]);
}

/// Numeric value of each `bit`/`enum` under `ty`: the explicit
/// `position`/`value`, or one more than the previous member.
fn member_values(
    tree: &StatementTree,
    ty: NodeId,
    member: StatementKind,
    value: StatementKind,
) -> HashMap<String, i64> {
    let mut result = HashMap::new();
    let mut next = 0i64;
    for node in tree.children_of_kind(ty, member) {
        let current = tree
            .child_argument(node, value)
            .and_then(|v| v.parse().ok())
            .unwrap_or(next);
        result.insert(tree.node(node).identifier().to_string(), current);
        next = current.saturating_add(1);
    }
    result
}

struct MemberRules {
    member: StatementKind,
    value: StatementKind,
    base_type: &'static str,
    wrong_base: &'static str,
    label: &'static str,
    value_label: &'static str,
}

const BIT_RULES: MemberRules = MemberRules {
    member: StatementKind::Bit,
    value: StatementKind::Position,
    base_type: "bits",
    wrong_base: "Base type of derived type is not 'bits'; hence cannot use 'bit' as substatement to restrict the type.",
    label: "Bit",
    value_label: "position",
};

const ENUM_RULES: MemberRules = MemberRules {
    member: StatementKind::Enum,
    value: StatementKind::Value,
    base_type: "enumeration",
    wrong_base: "Base type of derived type is not 'enumeration'; hence cannot use 'enum' as substatement to restrict the type.",
    label: "Enum",
    value_label: "value",
};

fn restrict_bits(schema: &mut Schema, ty: NodeId, copy: NodeId) {
    restrict_members(schema, ty, copy, &BIT_RULES);
}

fn restrict_enums(schema: &mut Schema, ty: NodeId, copy: NodeId) {
    restrict_members(schema, ty, copy, &ENUM_RULES);
}

fn restrict_members(schema: &mut Schema, ty: NodeId, copy: NodeId, rules: &MemberRules) {
    let members = schema.tree.children_of_kind(ty, rules.member);
    if members.is_empty() {
        return;
    }
    if schema.tree.node(copy).identifier() != rules.base_type {
        illegal_restriction(schema, ty, rules.wrong_base);
        return;
    }

    let in_base = member_values(&schema.tree, copy, rules.member, rules.value);
    for member in &members {
        if schema.tree.has_child_of_kind(*member, rules.value) {
            continue;
        }
        let name = schema.tree.node(*member).identifier();
        let value = in_base.get(name).copied().unwrap_or(0);
        let line = schema.tree.node(*member).line();
        schema.tree.add_child(*member, rules.value, Some(value.to_string()), line);
    }

    let in_restriction = member_values(&schema.tree, ty, rules.member, rules.value);
    for member in &members {
        let name = schema.tree.node(*member).identifier().to_string();
        let label = rules.label;
        match (in_base.get(&name), in_restriction.get(&name)) {
            (None, _) => schema.report(
                *member,
                FindingType::IllegalDataTypeRestriction,
                format!("{label} '{name}' does not exist in derived type."),
            ),
            (Some(base), Some(used)) if base != used => schema.report(
                *member,
                FindingType::IllegalDataTypeRestriction,
                format!(
                    "'{}' mismatch for {} '{name}'. In derived type: '{base}'; in type using the derived type: '{used}'.",
                    rules.value_label,
                    label.to_lowercase()
                ),
            ),
            _ => {}
        }
    }
    schema.tree.replace_children_of_same_kind(copy, &members);
}

/// Gives the leaf, leaf-list or typedef using the typedef its default, if it
/// has none of its own.
fn copy_default(tree: &mut StatementTree, typedef: NodeId, ty: NodeId) {
    let Some(default) = tree.child_of_kind(typedef, StatementKind::Default) else {
        return;
    };
    let mut parent = tree.node(ty).parent();
    if let Some(p) = parent.filter(|p| tree.node(*p).kind() == StatementKind::Type) {
        parent = tree.node(p).parent();
    }
    let Some(parent) = parent else {
        return;
    };
    let takes_default = matches!(
        tree.node(parent).kind(),
        StatementKind::Leaf | StatementKind::LeafList | StatementKind::Typedef
    );
    if takes_default && !tree.has_child_of_kind(parent, StatementKind::Default) {
        tree.deep_clone(default, Some(parent));
    }
}

fn validate_copied_boundaries(schema: &mut Schema, copy: NodeId) {
    if let (Some(range), Some(domain)) = (
        schema.tree.child_of_kind(copy, StatementKind::Range),
        numeric_domain(&schema.tree, copy),
    ) {
        let text = schema.tree.node(range).identifier().to_string();
        if !validate_boundaries(&parse_range(&text, domain), domain) {
            schema.report(
                range,
                FindingType::InvalidValue,
                format!("value '{text}' not valid for range."),
            );
        }
    }
    if let Some(length) = schema.tree.child_of_kind(copy, StatementKind::Length) {
        let text = schema.tree.node(length).identifier().to_string();
        let pairs = parse_length(&text);
        if pairs.is_empty() {
            schema.report(
                length,
                FindingType::InvalidValue,
                format!("value '{text}' not valid for length."),
            );
        } else if !validate_boundaries(&pairs, NumericDomain::Length) {
            schema.report(
                length,
                FindingType::InvalidValue,
                format!("value '{text}' not valid for 'length'."),
            );
        }
    }
}

/// Lifts the members of a union nested directly in a union. Returns `true`
/// if anything changed.
fn flatten_union(tree: &mut StatementTree, ty: NodeId) -> bool {
    let is_union = |tree: &StatementTree, n: NodeId| tree.node(n).identifier() == "union";
    if !is_union(tree, ty) {
        return false;
    }
    let members = tree.children_of_kind(ty, StatementKind::Type);
    if !members.iter().any(|m| is_union(tree, *m)) {
        return false;
    }
    let mut flattened = Vec::new();
    for member in &members {
        if is_union(tree, *member) {
            flattened.extend(tree.children_of_kind(*member, StatementKind::Type));
        } else {
            flattened.push(*member);
        }
    }
    for member in &members {
        tree.detach(*member);
    }
    tree.move_children_to(&flattened, ty);
    true
}
