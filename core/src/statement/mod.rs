//! Statement arena shared by every unit of a schema.
//!
//! All nodes of all units live in one [`StatementTree`] and are addressed by
//! [`NodeId`]. Parent and child links are indices, so moving a subtree from a
//! submodule into its module, or from an `augment` into its target, is an
//! edge rewrite. Removed nodes stay in the arena but are detached; only nodes
//! reachable from a unit root are part of the schema.

mod grammar;
mod kind;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, Result};
use crate::unit::{ConformanceType, UnitId};

pub use grammar::{ChildRules, child_rules};
pub use kind::StatementKind;

/// Handle of a node in a [`StatementTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Returns the arena index of this node.
    pub fn index(self) -> usize {
        self.0
    }
}

/// Lifecycle status of a statement, ordered by severity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Current,
    Deprecated,
    Obsolete,
}

impl Status {
    /// Parses a `status` argument. Unknown values yield `None`.
    pub fn from_argument(argument: &str) -> Option<Self> {
        match argument.trim() {
            "current" => Some(Self::Current),
            "deprecated" => Some(Self::Deprecated),
            "obsolete" => Some(Self::Obsolete),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Current => "current",
            Self::Deprecated => "deprecated",
            Self::Obsolete => "obsolete",
        }
    }

    /// Severity order: current < deprecated < obsolete.
    pub fn order(self) -> u8 {
        match self {
            Self::Current => 0,
            Self::Deprecated => 1,
            Self::Obsolete => 2,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Properties computed by the resolution passes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct EffectiveProperties {
    pub namespace: Option<String>,
    pub status: Status,
    pub config: bool,
    pub conformance: Option<ConformanceType>,
}

/// Category of a note left on a node by a resolution pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum AppDataKind {
    /// A child was removed because its if-feature evaluated to false.
    IfFeatureRemoval,
    /// Content moved here by an `augment`.
    AugmentedIn,
    /// Content changed by a `deviate`.
    Deviation,
    /// Content placed here by `uses`, or refined by it.
    UsesResolution,
    /// A `type` that replaced a reference to a typedef.
    DerivedType,
    /// Anything else worth recording.
    General,
}

/// A provenance note attached to a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppData {
    pub kind: AppDataKind,
    pub text: String,
    /// Identifiers of removed children, for [`AppDataKind::IfFeatureRemoval`].
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub removed: Vec<String>,
}

/// One statement in the arena.
#[derive(Debug, Clone)]
pub struct Statement {
    kind: StatementKind,
    keyword: String,
    argument: Option<String>,
    line: u32,
    unit: UnitId,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    origin: NodeId,
    pub effective: EffectiveProperties,
    app_data: Vec<AppData>,
}

impl Statement {
    pub fn kind(&self) -> StatementKind {
        self.kind
    }

    /// The keyword as written, including any extension prefix.
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// The trimmed argument, or `""` when there is none.
    pub fn identifier(&self) -> &str {
        self.argument.as_deref().map(str::trim).unwrap_or("")
    }

    /// The name a path step uses for this node: the keyword for `input`
    /// and `output`, the identifier otherwise.
    pub fn schema_node_name(&self) -> &str {
        match self.kind {
            StatementKind::Input | StatementKind::Output => &self.keyword,
            _ => self.identifier(),
        }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    /// The unit this statement was written in. Moves and clones keep it.
    pub fn unit(&self) -> UnitId {
        self.unit
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The original node this one was cloned from (itself when not a clone).
    pub fn origin(&self) -> NodeId {
        self.origin
    }

    /// For extension usages, the `(prefix, name)` pair of the keyword.
    pub fn extension_parts(&self) -> Option<(&str, &str)> {
        if self.kind != StatementKind::ExtensionUsage {
            return None;
        }
        self.keyword.split_once(':')
    }

    pub fn app_data(&self) -> &[AppData] {
        &self.app_data
    }

    /// `keyword 'argument'` for use in messages.
    pub fn name_value(&self) -> String {
        match &self.argument {
            Some(arg) => format!("'{} {}'", self.keyword, arg),
            None => format!("'{}'", self.keyword),
        }
    }
}

/// Arena holding the statements of all units.
#[derive(Debug, Clone, Default)]
pub struct StatementTree {
    nodes: Vec<Statement>,
}

impl StatementTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the statement for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this tree.
    pub fn node(&self, id: NodeId) -> &Statement {
        &self.nodes[id.0]
    }

    /// Mutable access to the statement for `id`.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not issued by this tree.
    pub fn node_mut(&mut self, id: NodeId) -> &mut Statement {
        &mut self.nodes[id.0]
    }

    /// Returns the statement for `id`, or an error for a foreign handle.
    pub fn get(&self, id: NodeId) -> Result<&Statement> {
        self.nodes.get(id.0).ok_or(ResolveError::UnknownNode(id))
    }

    /// Creates a detached node.
    pub fn create(
        &mut self,
        kind: StatementKind,
        keyword: impl Into<String>,
        argument: Option<String>,
        line: u32,
        unit: UnitId,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Statement {
            kind,
            keyword: keyword.into(),
            argument,
            line,
            unit,
            parent: None,
            children: Vec::new(),
            origin: id,
            effective: EffectiveProperties {
                config: true,
                ..Default::default()
            },
            app_data: Vec::new(),
        });
        id
    }

    /// Creates a core statement as the last child of `parent`.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        kind: StatementKind,
        argument: Option<String>,
        line: u32,
    ) -> NodeId {
        let unit = self.node(parent).unit;
        let id = self.create(kind, kind.keyword(), argument, line, unit);
        self.append_child(parent, id);
        id
    }

    /// Appends `child` to `parent`, detaching it from its current parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Inserts `child` under `parent` at `index` (clamped to the child count).
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let children = &mut self.nodes[parent.0].children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Inserts `child` directly after `anchor` under `anchor`'s parent.
    pub fn insert_child_after(&mut self, anchor: NodeId, child: NodeId) -> Result<()> {
        let parent = self.nodes[anchor.0].parent.ok_or(ResolveError::Detached(anchor))?;
        self.detach(child);
        let index = self
            .position_in_parent(anchor)
            .ok_or(ResolveError::Detached(anchor))?;
        self.insert_child(parent, index + 1, child);
        Ok(())
    }

    /// Moves `children`, in order, to the end of `new_parent`.
    pub fn move_children_to(&mut self, children: &[NodeId], new_parent: NodeId) {
        for child in children {
            self.append_child(new_parent, *child);
        }
    }

    /// Detaches every child of `parent` that has the kind of one of
    /// `replacements`, then appends `replacements`.
    pub fn replace_children_of_same_kind(&mut self, parent: NodeId, replacements: &[NodeId]) {
        let kinds: Vec<StatementKind> = replacements.iter().map(|r| self.nodes[r.0].kind).collect();
        for old in self.children_of_kinds(parent, &kinds) {
            if !replacements.contains(&old) {
                self.detach(old);
            }
        }
        self.move_children_to(replacements, parent);
    }

    /// Removes `node` from its parent. The subtree stays intact.
    pub fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.nodes[node.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != node);
        }
    }

    /// Puts `new` at the position of `old` under `old`'s parent and detaches
    /// `old`.
    pub fn replace_in_place(&mut self, old: NodeId, new: NodeId) -> Result<()> {
        let parent = self.nodes[old.0].parent.ok_or(ResolveError::Detached(old))?;
        let index = self.position_in_parent(old).ok_or(ResolveError::Detached(old))?;
        self.detach(old);
        self.insert_child(parent, index, new);
        Ok(())
    }

    /// Position of `node` among its parent's children.
    pub fn position_in_parent(&self, node: NodeId) -> Option<usize> {
        let parent = self.nodes[node.0].parent?;
        self.nodes[parent.0].children.iter().position(|c| *c == node)
    }

    /// Deep-copies the subtree rooted at `source` and attaches the copy under
    /// `parent` (or leaves it detached). Copies keep the origin and unit of
    /// the statements they were cloned from.
    pub fn deep_clone(&mut self, source: NodeId, parent: Option<NodeId>) -> NodeId {
        let root = self.clone_single(source);
        let mut stack = vec![(source, root)];
        while let Some((from, to)) = stack.pop() {
            let children = self.nodes[from.0].children.clone();
            for child in children {
                let copy = self.clone_single(child);
                self.nodes[copy.0].parent = Some(to);
                self.nodes[to.0].children.push(copy);
                stack.push((child, copy));
            }
        }
        if let Some(parent) = parent {
            self.append_child(parent, root);
        }
        root
    }

    fn clone_single(&mut self, source: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len());
        let src = &self.nodes[source.0];
        let copy = Statement {
            kind: src.kind,
            keyword: src.keyword.clone(),
            argument: src.argument.clone(),
            line: src.line,
            unit: src.unit,
            parent: None,
            children: Vec::new(),
            origin: src.origin,
            effective: src.effective.clone(),
            app_data: src.app_data.clone(),
        };
        self.nodes.push(copy);
        id
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0].children
    }

    /// Children of `node` of the given kind, in document order.
    pub fn children_of_kind(&self, node: NodeId, kind: StatementKind) -> Vec<NodeId> {
        self.nodes[node.0]
            .children
            .iter()
            .copied()
            .filter(|c| self.nodes[c.0].kind == kind)
            .collect()
    }

    /// Children of `node` whose kind is in `kinds`, in document order.
    pub fn children_of_kinds(&self, node: NodeId, kinds: &[StatementKind]) -> Vec<NodeId> {
        self.nodes[node.0]
            .children
            .iter()
            .copied()
            .filter(|c| kinds.contains(&self.nodes[c.0].kind))
            .collect()
    }

    /// First child of `node` of the given kind.
    pub fn child_of_kind(&self, node: NodeId, kind: StatementKind) -> Option<NodeId> {
        self.nodes[node.0]
            .children
            .iter()
            .copied()
            .find(|c| self.nodes[c.0].kind == kind)
    }

    /// Trimmed argument of the first child of the given kind.
    pub fn child_argument(&self, node: NodeId, kind: StatementKind) -> Option<&str> {
        self.child_of_kind(node, kind)
            .map(|c| self.nodes[c.0].identifier())
    }

    pub fn has_child_of_kind(&self, node: NodeId, kind: StatementKind) -> bool {
        self.child_of_kind(node, kind).is_some()
    }

    /// `node` and every node below it, in pre-order.
    pub fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            result.push(current);
            stack.extend(self.nodes[current.0].children.iter().rev().copied());
        }
        result
    }

    /// All nodes of the given kind in the subtree rooted at `node`.
    pub fn find_in_subtree(&self, node: NodeId, kind: StatementKind) -> Vec<NodeId> {
        self.descendants(node)
            .into_iter()
            .filter(|n| self.nodes[n.0].kind == kind)
            .collect()
    }

    /// Walks up from `node`'s parent to the root.
    pub fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut result = Vec::new();
        let mut current = self.nodes[node.0].parent;
        while let Some(parent) = current {
            result.push(parent);
            current = self.nodes[parent.0].parent;
        }
        result
    }

    /// The topmost ancestor of `node` (itself if it has no parent).
    pub fn root_of(&self, node: NodeId) -> NodeId {
        self.ancestors(node).last().copied().unwrap_or(node)
    }

    /// Records a note on `node`. Identical notes are kept once.
    pub fn add_app_data(&mut self, node: NodeId, kind: AppDataKind, text: impl Into<String>) {
        self.push_app_data(
            node,
            AppData {
                kind,
                text: text.into(),
                removed: Vec::new(),
            },
        );
    }

    pub(crate) fn push_app_data(&mut self, node: NodeId, data: AppData) {
        let notes = &mut self.nodes[node.0].app_data;
        if !notes.contains(&data) {
            notes.push(data);
        }
    }

    /// Iterates every node ever created, attached or not.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }
}
