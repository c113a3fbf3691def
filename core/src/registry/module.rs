use crate::finding::{Finding, FindingType, FindingsManager};
use crate::unit::{ConformanceType, ModuleIdentity, Unit, UnitId};

/// Catalogue of every registered module and submodule.
///
/// Units are stored in registration order and addressed by [`UnitId`].
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    units: Vec<Unit>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The id the next added unit will receive.
    pub(crate) fn next_id(&self) -> UnitId {
        UnitId::new(self.units.len())
    }

    /// Registers `unit`, reporting duplicates.
    ///
    /// The same name with the same revision (or both without revision) is a
    /// duplicate input. Different revisions of the same name are legal as
    /// long as at most one of them is IMPLEMENT.
    pub fn add(&mut self, findings: &mut FindingsManager, unit: Unit) -> UnitId {
        let name = unit.name().to_string();
        let revision = unit.revision().map(str::to_string);

        for existing in self.units.iter().filter(|u| u.name() == name) {
            match (existing.revision(), revision.as_deref()) {
                (None, None) => findings.add_finding(Finding::on_input(
                    unit.source(),
                    FindingType::DuplicateInput,
                    format!("Same module '{name}' provided twice as input. Remove the duplicate."),
                )),
                (Some(a), Some(b)) if a == b => findings.add_finding(Finding::on_input(
                    unit.source(),
                    FindingType::DuplicateInput,
                    format!("Same module '{name}/{b}' provided twice as input. Remove the duplicate."),
                )),
                _ => {
                    let implements = self
                        .units
                        .iter()
                        .filter(|u| u.name() == name)
                        .chain(std::iter::once(&unit))
                        .filter(|u| u.conformance() == ConformanceType::Implement)
                        .count();
                    if implements > 1 {
                        findings.add_finding(Finding::on_input(
                            unit.source(),
                            FindingType::SameModuleDuplicateImplements,
                            "(Sub-)Module with different revisions supplied multiple times as conformance IMPLEMENTS.",
                        ));
                    }
                }
            }
        }

        let id = self.next_id();
        let mut unit = unit;
        unit.id = id;
        self.units.push(unit);
        id
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Returns the unit for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this registry.
    pub fn get(&self, id: UnitId) -> &Unit {
        &self.units[id.index()]
    }

    pub(crate) fn get_mut(&mut self, id: UnitId) -> &mut Unit {
        &mut self.units[id.index()]
    }

    pub fn all(&self) -> &[Unit] {
        &self.units
    }

    pub fn ids(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.units.iter().map(|u| u.id())
    }

    /// Every unit with the given name, in registration order.
    pub fn by_name(&self, name: &str) -> Vec<UnitId> {
        self.units
            .iter()
            .filter(|u| u.name() == name)
            .map(|u| u.id())
            .collect()
    }

    /// The unit whose revision equals `revision` exactly. A `None` revision
    /// only matches units that declare no revision.
    pub fn exact_match(&self, name: &str, revision: Option<&str>) -> Option<UnitId> {
        self.units
            .iter()
            .find(|u| u.name() == name && u.revision() == revision)
            .map(|u| u.id())
    }

    /// Like [`exact_match`](Self::exact_match), but the
    /// [`UNKNOWN_REVISION`](crate::UNKNOWN_REVISION) sentinel returns the
    /// first registered unit of that name.
    pub fn find(&self, identity: &ModuleIdentity) -> Option<UnitId> {
        if identity.is_unknown_revision() {
            return self.by_name(&identity.name).first().copied();
        }
        self.exact_match(&identity.name, identity.revision.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::ParsedStatement;
    use crate::statement::StatementTree;

    fn unit(
        tree: &mut StatementTree,
        name: &str,
        revision: Option<&str>,
        conformance: ConformanceType,
    ) -> Unit {
        let mut root = ParsedStatement::new("module", name);
        if let Some(rev) = revision {
            root = root.with_child(ParsedStatement::new("revision", rev));
        }
        let id = UnitId::new(tree.len());
        let node = root.insert_into(tree, id).unwrap();
        Unit::from_tree(id, format!("{name}.yang"), conformance, tree, node).unwrap()
    }

    #[test]
    fn test_same_name_and_revision_is_duplicate() {
        let mut tree = StatementTree::new();
        let mut registry = ModuleRegistry::new();
        let mut findings = FindingsManager::new();
        let a = unit(&mut tree, "m", Some("2020-01-01"), ConformanceType::Implement);
        let b = unit(&mut tree, "m", Some("2020-01-01"), ConformanceType::Import);
        registry.add(&mut findings, a);
        registry.add(&mut findings, b);
        assert_eq!(findings.of_type(FindingType::DuplicateInput).count(), 1);
    }

    #[test]
    fn test_different_revisions_are_legal() {
        let mut tree = StatementTree::new();
        let mut registry = ModuleRegistry::new();
        let mut findings = FindingsManager::new();
        let a = unit(&mut tree, "m", Some("2020-01-01"), ConformanceType::Implement);
        let b = unit(&mut tree, "m", Some("2021-01-01"), ConformanceType::Import);
        registry.add(&mut findings, a);
        registry.add(&mut findings, b);
        assert!(findings.is_empty());
        assert_eq!(registry.by_name("m").len(), 2);
    }

    #[test]
    fn test_two_implements_reported() {
        let mut tree = StatementTree::new();
        let mut registry = ModuleRegistry::new();
        let mut findings = FindingsManager::new();
        let a = unit(&mut tree, "m", Some("2020-01-01"), ConformanceType::Implement);
        let b = unit(&mut tree, "m", Some("2021-01-01"), ConformanceType::Implement);
        registry.add(&mut findings, a);
        registry.add(&mut findings, b);
        assert!(findings.has_finding_of_type(FindingType::SameModuleDuplicateImplements));
    }

    #[test]
    fn test_lookup_semantics() {
        let mut tree = StatementTree::new();
        let mut registry = ModuleRegistry::new();
        let mut findings = FindingsManager::new();
        let a = registry.add(
            &mut findings,
            unit(&mut tree, "m", None, ConformanceType::Implement),
        );
        let b = registry.add(
            &mut findings,
            unit(&mut tree, "n", Some("2020-01-01"), ConformanceType::Implement),
        );
        assert_eq!(registry.exact_match("m", None), Some(a));
        assert_eq!(registry.exact_match("n", None), None);
        assert_eq!(registry.exact_match("n", Some("2020-01-01")), Some(b));
        assert_eq!(registry.find(&ModuleIdentity::any_revision("n")), Some(b));
        assert_eq!(registry.find(&ModuleIdentity::new("n", Some("1999-01-01"))), None);
        assert_eq!(registry.get(b).id(), b);
    }
}
