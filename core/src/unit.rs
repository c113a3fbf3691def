//! Units (modules and submodules) and their identities.
//!
//! A [`Unit`] is one parsed input document. Its header (name, revision,
//! prefix, imports, includes, belongs-to) is extracted once when the unit is
//! registered; the body lives in the shared
//! [`StatementTree`](crate::StatementTree).

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, Result};
use crate::statement::{NodeId, StatementKind, StatementTree};

/// Revision sentinel meaning "any revision of this name".
pub const UNKNOWN_REVISION: &str = "__UNKNOWN__";

/// Handle of a unit in the [`ModuleRegistry`](crate::ModuleRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(usize);

impl UnitId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0
    }
}

/// Whether a unit's content must be supported, or is only referenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConformanceType {
    #[default]
    Implement,
    Import,
}

impl fmt::Display for ConformanceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Implement => f.write_str("IMPLEMENT"),
            Self::Import => f.write_str("IMPORT"),
        }
    }
}

/// Name and optional revision of a unit.
///
/// A `None` revision means the unit declares no revision. The
/// [`UNKNOWN_REVISION`] sentinel is only used for lookups and means "any".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleIdentity {
    pub name: String,
    pub revision: Option<String>,
}

impl ModuleIdentity {
    pub fn new(name: impl Into<String>, revision: Option<&str>) -> Self {
        Self {
            name: name.into(),
            revision: revision.map(str::to_string),
        }
    }

    /// An identity matching any revision of `name`.
    pub fn any_revision(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            revision: Some(UNKNOWN_REVISION.to_string()),
        }
    }

    pub fn is_unknown_revision(&self) -> bool {
        self.revision.as_deref() == Some(UNKNOWN_REVISION)
    }
}

impl fmt::Display for ModuleIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(rev) if rev != UNKNOWN_REVISION => write!(f, "{}/{}", self.name, rev),
            _ => f.write_str(&self.name),
        }
    }
}

/// A conditional-compilation flag, identified by namespace and module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct YangFeature {
    pub namespace: String,
    pub module: String,
    pub name: String,
}

impl YangFeature {
    pub fn new(
        namespace: impl Into<String>,
        module: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            module: module.into(),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Module,
    Submodule,
}

/// An `import` statement of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRef {
    pub module: String,
    pub prefix: Option<String>,
    pub revision: Option<String>,
    pub node: NodeId,
}

/// An `include` statement of a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeRef {
    pub submodule: String,
    pub revision: Option<String>,
    pub node: NodeId,
}

/// The `belongs-to` statement of a submodule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BelongsToRef {
    pub module: String,
    pub prefix: Option<String>,
    pub node: NodeId,
}

/// A registered module or submodule.
#[derive(Debug, Clone)]
pub struct Unit {
    pub(crate) id: UnitId,
    pub(crate) source: String,
    pub(crate) identity: ModuleIdentity,
    pub(crate) kind: UnitKind,
    pub(crate) conformance: ConformanceType,
    pub(crate) root: NodeId,
    pub(crate) namespace: Option<String>,
    pub(crate) prefix: Option<String>,
    pub(crate) yang_version: String,
    pub(crate) imports: Vec<ImportRef>,
    pub(crate) includes: Vec<IncludeRef>,
    pub(crate) belongs_to: Option<BelongsToRef>,
    pub(crate) revisions: Vec<(String, NodeId)>,
    pub(crate) owner: Option<UnitId>,
}

impl Unit {
    /// Reads the header statements of the tree rooted at `root`.
    pub(crate) fn from_tree(
        id: UnitId,
        source: impl Into<String>,
        conformance: ConformanceType,
        tree: &StatementTree,
        root: NodeId,
    ) -> Result<Self> {
        let source = source.into();
        let root_stmt = tree.node(root);
        let kind = match root_stmt.kind() {
            StatementKind::Module => UnitKind::Module,
            StatementKind::Submodule => UnitKind::Submodule,
            other => {
                return Err(ResolveError::InvalidInput(format!(
                    "'{source}': root statement must be 'module' or 'submodule', found '{other}'"
                )));
            }
        };
        let name = root_stmt.identifier();
        if name.is_empty() {
            return Err(ResolveError::InvalidInput(format!(
                "'{source}': (sub-)module has no name"
            )));
        }

        let revisions: Vec<(String, NodeId)> = tree
            .children_of_kind(root, StatementKind::Revision)
            .into_iter()
            .map(|n| (tree.node(n).identifier().to_string(), n))
            .collect();
        let latest = revisions.iter().map(|(rev, _)| rev.as_str()).max();

        let imports = tree
            .children_of_kind(root, StatementKind::Import)
            .into_iter()
            .map(|n| ImportRef {
                module: tree.node(n).identifier().to_string(),
                prefix: tree.child_argument(n, StatementKind::Prefix).map(str::to_string),
                revision: tree
                    .child_argument(n, StatementKind::RevisionDate)
                    .map(str::to_string),
                node: n,
            })
            .collect();
        let includes = tree
            .children_of_kind(root, StatementKind::Include)
            .into_iter()
            .map(|n| IncludeRef {
                submodule: tree.node(n).identifier().to_string(),
                revision: tree
                    .child_argument(n, StatementKind::RevisionDate)
                    .map(str::to_string),
                node: n,
            })
            .collect();
        let belongs_to = tree
            .child_of_kind(root, StatementKind::BelongsTo)
            .map(|n| BelongsToRef {
                module: tree.node(n).identifier().to_string(),
                prefix: tree.child_argument(n, StatementKind::Prefix).map(str::to_string),
                node: n,
            });

        let (namespace, prefix) = match kind {
            UnitKind::Module => (
                tree.child_argument(root, StatementKind::Namespace)
                    .map(str::to_string),
                tree.child_argument(root, StatementKind::Prefix)
                    .map(str::to_string),
            ),
            UnitKind::Submodule => (None, belongs_to.as_ref().and_then(|b| b.prefix.clone())),
        };

        Ok(Self {
            id,
            identity: ModuleIdentity::new(name, latest),
            source,
            kind,
            conformance,
            root,
            namespace,
            prefix,
            yang_version: tree
                .child_argument(root, StatementKind::YangVersion)
                .unwrap_or("1")
                .to_string(),
            imports,
            includes,
            belongs_to,
            revisions,
            owner: None,
        })
    }

    pub fn id(&self) -> UnitId {
        self.id
    }

    /// Name of the input this unit was read from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn identity(&self) -> &ModuleIdentity {
        &self.identity
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn revision(&self) -> Option<&str> {
        self.identity.revision.as_deref()
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    pub fn is_module(&self) -> bool {
        self.kind == UnitKind::Module
    }

    pub fn is_submodule(&self) -> bool {
        self.kind == UnitKind::Submodule
    }

    pub fn conformance(&self) -> ConformanceType {
        self.conformance
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The unit's own `namespace`. Submodules have none.
    pub fn declared_namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn yang_version(&self) -> &str {
        &self.yang_version
    }

    pub fn imports(&self) -> &[ImportRef] {
        &self.imports
    }

    pub fn includes(&self) -> &[IncludeRef] {
        &self.includes
    }

    pub fn belongs_to(&self) -> Option<&BelongsToRef> {
        self.belongs_to.as_ref()
    }

    /// Owning module of a submodule, once linked.
    pub fn owner(&self) -> Option<UnitId> {
        self.owner
    }

    /// Maps each prefix usable inside this unit to the unit it denotes.
    ///
    /// The own prefix maps to this module, or to the owning module (by name)
    /// for a submodule. Imports without `revision-date` map to
    /// [`ModuleIdentity::any_revision`].
    pub fn prefix_map(&self) -> HashMap<String, ModuleIdentity> {
        let mut map = HashMap::new();
        for import in &self.imports {
            if let Some(prefix) = &import.prefix {
                let identity = match &import.revision {
                    Some(rev) => ModuleIdentity::new(&import.module, Some(rev)),
                    None => ModuleIdentity::any_revision(&import.module),
                };
                map.insert(prefix.clone(), identity);
            }
        }
        if let Some(own) = &self.prefix {
            map.insert(own.clone(), self.default_module());
        }
        map
    }

    /// Resolves a single prefix without building the whole map.
    pub fn module_for_prefix(&self, prefix: &str) -> Option<ModuleIdentity> {
        if self.prefix.as_deref() == Some(prefix) {
            return Some(self.default_module());
        }
        self.imports
            .iter()
            .rev()
            .find(|import| import.prefix.as_deref() == Some(prefix))
            .map(|import| match &import.revision {
                Some(rev) => ModuleIdentity::new(&import.module, Some(rev)),
                None => ModuleIdentity::any_revision(&import.module),
            })
    }

    /// The module that unprefixed names inside this unit refer to.
    pub fn default_module(&self) -> ModuleIdentity {
        match (&self.kind, &self.belongs_to) {
            (UnitKind::Submodule, Some(b)) => ModuleIdentity::any_revision(&b.module),
            _ => self.identity.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(kind: StatementKind, name: &str) -> (StatementTree, NodeId) {
        let mut tree = StatementTree::new();
        let root = tree.create(kind, kind.keyword(), Some(name.into()), 1, UnitId::new(0));
        (tree, root)
    }

    #[test]
    fn test_module_header_extraction() {
        let (mut tree, root) = build(StatementKind::Module, "acme");
        tree.add_child(root, StatementKind::Namespace, Some("urn:acme".into()), 2);
        tree.add_child(root, StatementKind::Prefix, Some("ac".into()), 3);
        tree.add_child(root, StatementKind::Revision, Some("2020-01-01".into()), 4);
        tree.add_child(root, StatementKind::Revision, Some("2023-06-30".into()), 5);
        let imp = tree.add_child(root, StatementKind::Import, Some("types".into()), 6);
        tree.add_child(imp, StatementKind::Prefix, Some("t".into()), 7);

        let unit = Unit::from_tree(
            UnitId::new(0),
            "acme.yang",
            ConformanceType::Implement,
            &tree,
            root,
        )
        .unwrap();
        assert_eq!(unit.identity(), &ModuleIdentity::new("acme", Some("2023-06-30")));
        assert_eq!(unit.declared_namespace(), Some("urn:acme"));
        assert_eq!(unit.yang_version(), "1");
        let prefixes = unit.prefix_map();
        assert_eq!(prefixes["ac"].name, "acme");
        assert!(prefixes["t"].is_unknown_revision());
        assert_eq!(unit.module_for_prefix("t"), Some(prefixes["t"].clone()));
        assert_eq!(unit.module_for_prefix("ac").map(|m| m.name), Some("acme".to_string()));
        assert_eq!(unit.module_for_prefix("zz"), None);
    }

    #[test]
    fn test_submodule_prefix_maps_to_owner() {
        let (mut tree, root) = build(StatementKind::Submodule, "acme-sub");
        let bt = tree.add_child(root, StatementKind::BelongsTo, Some("acme".into()), 2);
        tree.add_child(bt, StatementKind::Prefix, Some("ac".into()), 3);

        let unit = Unit::from_tree(
            UnitId::new(0),
            "acme-sub.yang",
            ConformanceType::Implement,
            &tree,
            root,
        )
        .unwrap();
        assert!(unit.is_submodule());
        assert_eq!(unit.revision(), None);
        assert_eq!(unit.prefix_map()["ac"], ModuleIdentity::any_revision("acme"));
    }

    #[test]
    fn test_rejects_non_module_root() {
        let (tree, root) = build(StatementKind::Container, "oops");
        let err = Unit::from_tree(
            UnitId::new(0),
            "bad.yang",
            ConformanceType::Implement,
            &tree,
            root,
        )
        .unwrap_err();
        assert!(matches!(err, ResolveError::InvalidInput(_)));
    }

    #[test]
    fn test_identity_display() {
        assert_eq!(ModuleIdentity::new("a", Some("2020-01-01")).to_string(), "a/2020-01-01");
        assert_eq!(ModuleIdentity::new("a", None).to_string(), "a");
        assert_eq!(ModuleIdentity::any_revision("a").to_string(), "a");
    }
}
