//! Cross-module relationship checks.
//!
//! Runs once over the registered units before any tree is modified. Every
//! check only reports findings.

use std::collections::HashSet;

use tracing::debug;

use crate::finding::{Finding, FindingType, FindingsManager};
use crate::registry::ModuleRegistry;
use crate::statement::{NodeId, StatementTree};
use crate::unit::{ConformanceType, Unit};

fn on_node(tree: &StatementTree, unit: &Unit, node: NodeId, ty: FindingType, msg: String) -> Finding {
    Finding::on_node(unit.source(), tree.node(node).line(), node, ty, msg)
}

/// Runs every relationship check in order.
pub(crate) fn perform_checks(
    registry: &ModuleRegistry,
    tree: &StatementTree,
    findings: &mut FindingsManager,
) {
    check_prefixes_unique(registry, tree, findings);
    check_imports_unique(registry, tree, findings);
    check_imports_satisfied(registry, tree, findings);
    check_includes_satisfied(registry, tree, findings);
    check_belongs_tos_satisfied(registry, tree, findings);
    check_for_duplicate_modules(registry, findings);
    check_for_duplicate_revisions(registry, findings);
    check_implements_and_imports(registry, tree, findings);
    debug!(units = registry.len(), findings = findings.len(), "relationship checks done");
}

fn check_prefixes_unique(registry: &ModuleRegistry, tree: &StatementTree, findings: &mut FindingsManager) {
    for unit in registry.all() {
        let mut seen: HashSet<&str> = HashSet::new();
        if let Some(own) = unit.prefix() {
            seen.insert(own);
        }
        for import in unit.imports() {
            let Some(prefix) = import.prefix.as_deref() else {
                continue;
            };
            if !seen.insert(prefix) {
                findings.add_finding(on_node(
                    tree,
                    unit,
                    import.node,
                    FindingType::PrefixNotUnique,
                    format!("Prefix '{prefix}' not unique in document."),
                ));
            }
        }
    }
}

fn check_imports_unique(registry: &ModuleRegistry, tree: &StatementTree, findings: &mut FindingsManager) {
    for unit in registry.all() {
        let mut with_revision: HashSet<&str> = HashSet::new();
        let mut without_revision: HashSet<&str> = HashSet::new();
        let mut name_and_revision: HashSet<String> = HashSet::new();

        for import in unit.imports() {
            let name = import.module.as_str();
            if name.is_empty() {
                continue;
            }
            let mut report = |msg: String| {
                findings.add_finding(on_node(
                    tree,
                    unit,
                    import.node,
                    FindingType::ModuleImportedMultipleTimes,
                    msg,
                ));
            };
            let mixed = format!(
                "Module '{name}' imported more than once - once without revision, once with explicit revision."
            );
            match import.revision.as_deref() {
                None => {
                    if with_revision.contains(name) {
                        report(mixed);
                    }
                    if without_revision.contains(name) {
                        report(format!("Module '{name}' imported multiple times without revision."));
                    }
                    without_revision.insert(name);
                }
                Some(revision) => {
                    if without_revision.contains(name) {
                        report(mixed);
                    }
                    let key = format!("{name}/{revision}");
                    if name_and_revision.contains(&key) {
                        report(format!("Module '{key}' imported more than once."));
                    }
                    with_revision.insert(name);
                    name_and_revision.insert(key);
                }
            }
        }
    }
}

fn check_imports_satisfied(registry: &ModuleRegistry, tree: &StatementTree, findings: &mut FindingsManager) {
    for unit in registry.all() {
        for import in unit.imports() {
            let name = import.module.as_str();
            if name.is_empty() {
                continue;
            }
            let finding = |ty, msg| on_node(tree, unit, import.node, ty, msg);

            if unit.name() == name {
                findings.add_finding(finding(
                    FindingType::UnresolvableImport,
                    format!("Module '{name}' imports itself."),
                ));
                continue;
            }

            match import.revision.as_deref() {
                None => match registry.by_name(name).len() {
                    0 => findings.add_finding(finding(
                        FindingType::UnresolvableImport,
                        format!("Module '{name}' not found in input."),
                    )),
                    1 => {}
                    _ => findings.add_finding(finding(
                        FindingType::AmbiguousImport,
                        format!(
                            "Module '{name}' has multiple revisions in the input, but desired exact revision not specified in the 'import' statement."
                        ),
                    )),
                },
                Some(revision) => {
                    if registry.exact_match(name, Some(revision)).is_some() {
                        continue;
                    }
                    let msg = match registry.by_name(name).first() {
                        None => format!("Module '{name}' with revision '{revision}' not found in input."),
                        Some(other) => format!(
                            "Module '{name}' with revision '{revision}' not found in input, but a module with that name and revision '{}' has been found.",
                            registry.get(*other).revision().unwrap_or("null")
                        ),
                    };
                    findings.add_finding(finding(FindingType::UnresolvableImport, msg));
                }
            }
        }
    }
}

fn check_includes_satisfied(registry: &ModuleRegistry, tree: &StatementTree, findings: &mut FindingsManager) {
    for unit in registry.all().iter().filter(|u| u.is_module()) {
        for include in unit.includes() {
            let name = include.submodule.as_str();
            if name.is_empty() {
                continue;
            }
            let finding = |ty, msg| on_node(tree, unit, include.node, ty, msg);

            let included = match include.revision.as_deref() {
                None => {
                    let candidates = registry.by_name(name);
                    match candidates.as_slice() {
                        [] => {
                            findings.add_finding(finding(
                                FindingType::UnresolvableInclude,
                                format!("Submodule {name} not found in input."),
                            ));
                            None
                        }
                        [one] => Some(*one),
                        _ => {
                            findings.add_finding(finding(
                                FindingType::AmbiguousInclude,
                                format!("Multiple revisions of submodule {name} found in input."),
                            ));
                            None
                        }
                    }
                }
                Some(revision) => match registry.exact_match(name, Some(revision)) {
                    Some(found) => Some(found),
                    None => {
                        let msg = match registry.by_name(name).first() {
                            None => format!("Submodule {name}/{revision} not found in input."),
                            Some(other) => format!(
                                "Submodule {name}/{revision} not found in the input, but a submodule with that name and with revision '{}' is in the input.",
                                registry.get(*other).revision().unwrap_or("null")
                            ),
                        };
                        findings.add_finding(finding(FindingType::UnresolvableInclude, msg));
                        None
                    }
                },
            };

            let Some(included) = included else {
                continue;
            };
            let submodule = registry.get(included);
            if !submodule.is_submodule() {
                findings.add_finding(finding(
                    FindingType::NotASubmodule,
                    format!(
                        "'{}' is not a submodule and can therefore not be included.",
                        submodule.name()
                    ),
                ));
                continue;
            }
            if submodule.yang_version() != unit.yang_version() {
                findings.add_finding(finding(
                    FindingType::DifferentYangVersions,
                    "The yang versions differ between module and submodule(s).".to_string(),
                ));
            }
            if let Some(belongs_to) = submodule.belongs_to() {
                if !belongs_to.module.is_empty() && belongs_to.module != unit.name() {
                    findings.add_finding(finding(
                        FindingType::SubmoduleOwnershipMismatch,
                        format!(
                            "The referenced submodule belongs to '{}', not this module here.",
                            belongs_to.module
                        ),
                    ));
                }
            }
        }
    }
}

fn check_belongs_tos_satisfied(registry: &ModuleRegistry, tree: &StatementTree, findings: &mut FindingsManager) {
    for unit in registry.all().iter().filter(|u| u.is_submodule()) {
        let Some(belongs_to) = unit.belongs_to() else {
            continue;
        };
        if belongs_to.module.is_empty() {
            continue;
        }
        let Some(owner) = registry.by_name(&belongs_to.module).first().map(|id| registry.get(*id)) else {
            findings.add_finding(on_node(
                tree,
                unit,
                belongs_to.node,
                FindingType::UnresolvableBelongsTo,
                format!("Owning module '{}' not found in input.", belongs_to.module),
            ));
            continue;
        };
        if !owner.is_module() {
            findings.add_finding(on_node(
                tree,
                unit,
                belongs_to.node,
                FindingType::NotAModule,
                format!("'{}' is not a module.", belongs_to.module),
            ));
        } else if !owner.includes().iter().any(|i| i.submodule == unit.name()) {
            findings.add_finding(Finding::on_input(
                unit.source(),
                FindingType::OrphanSubmodule,
                format!("Owning module '{}' does not 'include' this submodule.", owner.name()),
            ));
        }
    }
}

fn check_for_duplicate_modules(registry: &ModuleRegistry, findings: &mut FindingsManager) {
    let mut implementing: HashSet<&str> = HashSet::new();
    let mut imported: HashSet<&str> = HashSet::new();
    let both = |name: &str| {
        format!(
            "Module '{name}' multiple times in the input, with both conformance types IMPLEMENT and IMPORT."
        )
    };

    for unit in registry.all() {
        let name = unit.name();
        match unit.conformance() {
            ConformanceType::Implement => {
                if implementing.contains(name) {
                    findings.add_finding(Finding::on_input(
                        unit.source(),
                        FindingType::SameModuleImplementsMoreThanOnce,
                        format!("Module '{name}' multiple times in the input with conformance type IMPLEMENT."),
                    ));
                }
                if imported.contains(name) {
                    findings.add_finding(Finding::on_input(
                        unit.source(),
                        FindingType::SameModuleImplementsAndImports,
                        both(name),
                    ));
                }
                implementing.insert(name);
            }
            ConformanceType::Import => {
                if implementing.contains(name) {
                    findings.add_finding(Finding::on_input(
                        unit.source(),
                        FindingType::SameModuleImplementsAndImports,
                        both(name),
                    ));
                }
                imported.insert(name);
            }
        }
    }
}

fn check_for_duplicate_revisions(registry: &ModuleRegistry, findings: &mut FindingsManager) {
    for unit in registry.all() {
        let mut seen: HashSet<&str> = HashSet::new();
        for (revision, _) in &unit.revisions {
            if seen.insert(revision.as_str()) {
                continue;
            }
            let finding = if Some(revision.as_str()) == unit.revision() {
                Finding::on_input(
                    unit.source(),
                    FindingType::DuplicateLatestRevision,
                    format!("Latest revision '{revision}' exists more than once in the (sub-)module."),
                )
            } else {
                Finding::on_input(
                    unit.source(),
                    FindingType::DuplicateRevision,
                    format!("Prior revision '{revision}' exists more than once in the (sub-)module."),
                )
            };
            findings.add_finding(finding);
        }
    }
}

fn check_implements_and_imports(registry: &ModuleRegistry, tree: &StatementTree, findings: &mut FindingsManager) {
    let mut implementing = 0usize;

    for unit in registry.all() {
        if unit.conformance() == ConformanceType::Implement {
            implementing += 1;
        }
        if !unit.is_submodule() {
            continue;
        }
        let Some(belongs_to) = unit.belongs_to() else {
            continue;
        };
        if let Some(owner) = registry.by_name(&belongs_to.module).first().map(|id| registry.get(*id)) {
            if owner.conformance() != unit.conformance() {
                findings.add_finding(on_node(
                    tree,
                    unit,
                    belongs_to.node,
                    FindingType::ImplementImportMismatch,
                    format!(
                        "Submodule is {} but owning module is {}",
                        unit.conformance(),
                        owner.conformance()
                    ),
                ));
            }
        }
    }

    if implementing == 0 {
        findings.add_finding(Finding::general(
            FindingType::NoImplements,
            "Need at least a single module that IMPLEMENTs.",
        ));
    }
}
