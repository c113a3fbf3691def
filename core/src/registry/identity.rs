use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// A declared identity: namespace, owning module name and local name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct YangIdentity {
    pub namespace: Option<String>,
    pub module: Option<String>,
    pub name: String,
}

impl YangIdentity {
    pub fn new(
        namespace: Option<impl Into<String>>,
        module: Option<impl Into<String>>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.map(Into::into),
            module: module.map(Into::into),
            name: name.into(),
        }
    }
}

impl fmt::Display for YangIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.module {
            Some(module) => write!(f, "{module}:{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Derivation graph over declared identities.
///
/// Rebuilt from scratch on every run.
#[derive(Debug, Clone, Default)]
pub struct IdentityRegistry {
    bases: BTreeMap<YangIdentity, BTreeSet<YangIdentity>>,
    derived: BTreeMap<YangIdentity, BTreeSet<YangIdentity>>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.bases.clear();
        self.derived.clear();
    }

    /// Registers `identity` with no bases and no derivatives.
    pub fn add_identity(&mut self, identity: YangIdentity) {
        self.bases.insert(identity.clone(), BTreeSet::new());
        self.derived.insert(identity, BTreeSet::new());
    }

    /// Records that `derived` has `base` as a base identity.
    ///
    /// Does nothing unless both identities are registered.
    pub fn add_base_identity(&mut self, derived: &YangIdentity, base: &YangIdentity) {
        if !self.bases.contains_key(derived) || !self.derived.contains_key(base) {
            return;
        }
        if let Some(bases) = self.bases.get_mut(derived) {
            bases.insert(base.clone());
        }
        if let Some(derivatives) = self.derived.get_mut(base) {
            derivatives.insert(derived.clone());
        }
    }

    pub fn identities(&self) -> impl Iterator<Item = &YangIdentity> {
        self.bases.keys()
    }

    pub fn len(&self) -> usize {
        self.bases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bases.is_empty()
    }

    pub fn bases_of(&self, identity: &YangIdentity) -> Option<&BTreeSet<YangIdentity>> {
        self.bases.get(identity)
    }

    pub fn derivatives_of(&self, identity: &YangIdentity) -> Option<&BTreeSet<YangIdentity>> {
        self.derived.get(identity)
    }

    /// Returns `identity` and everything transitively derived from it.
    ///
    /// Empty if `identity` is not registered. Cycles in the graph are
    /// tolerated.
    ///
    /// # Examples
    ///
    /// ```
    /// use yang_resolver_core::{IdentityRegistry, YangIdentity};
    ///
    /// let id = |n: &str| YangIdentity::new(Some("urn:x"), Some("x"), n);
    /// let mut registry = IdentityRegistry::new();
    /// for name in ["a", "b", "c"] {
    ///     registry.add_identity(id(name));
    /// }
    /// registry.add_base_identity(&id("b"), &id("a"));
    /// registry.add_base_identity(&id("c"), &id("b"));
    ///
    /// let closure = registry.identity_and_derived_recursively(&id("a"));
    /// assert_eq!(closure.len(), 3);
    /// ```
    pub fn identity_and_derived_recursively(&self, identity: &YangIdentity) -> BTreeSet<YangIdentity> {
        let mut result = BTreeSet::new();
        if !self.derived.contains_key(identity) {
            return result;
        }
        let mut stack = vec![identity];
        while let Some(current) = stack.pop() {
            if !result.insert(current.clone()) {
                continue;
            }
            if let Some(derivatives) = self.derived.get(current) {
                stack.extend(derivatives.iter().filter(|d| !result.contains(*d)));
            }
        }
        result
    }
}
