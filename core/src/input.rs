//! Serializable form of already-parsed units.
//!
//! Text parsing of the modeling language happens elsewhere; this module only
//! defines the tree shape a parser hands over, plus JSON/YAML loading.
//!
//! # Example
//!
//! ```
//! use yang_resolver_core::{ConformanceType, ParsedStatement, UnitInput};
//!
//! let root = ParsedStatement::new("module", "acme")
//!     .with_child(ParsedStatement::new("namespace", "urn:acme"))
//!     .with_child(ParsedStatement::new("prefix", "ac"))
//!     .with_child(
//!         ParsedStatement::new("container", "system")
//!             .with_child(ParsedStatement::new("leaf", "hostname")
//!                 .with_child(ParsedStatement::new("type", "string"))),
//!     );
//! let input = UnitInput::new("acme.yang", ConformanceType::Implement, root);
//! assert_eq!(input.root.children.len(), 3);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, Result};
use crate::statement::{NodeId, StatementKind, StatementTree};
use crate::unit::{ConformanceType, UnitId};

/// One statement as produced by a parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedStatement {
    pub keyword: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub argument: Option<String>,
    #[serde(default)]
    pub line: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ParsedStatement>,
}

impl ParsedStatement {
    pub fn new(keyword: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            argument: Some(argument.into()),
            line: 0,
            children: Vec::new(),
        }
    }

    /// A statement without argument (`input`, `output`).
    pub fn bare(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            argument: None,
            line: 0,
            children: Vec::new(),
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    pub fn with_child(mut self, child: ParsedStatement) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = ParsedStatement>) -> Self {
        self.children.extend(children);
        self
    }

    /// Copies this tree into `tree` as a detached subtree owned by `unit`.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidInput`](ResolveError::InvalidInput) for an unknown
    /// unprefixed keyword.
    pub(crate) fn insert_into(&self, tree: &mut StatementTree, unit: UnitId) -> Result<NodeId> {
        let root = create_node(tree, self, unit)?;
        let mut stack = vec![(self, root)];
        while let Some((parsed, node)) = stack.pop() {
            for child in &parsed.children {
                let id = create_node(tree, child, unit)?;
                tree.append_child(node, id);
                stack.push((child, id));
            }
        }
        Ok(root)
    }
}

fn create_node(tree: &mut StatementTree, parsed: &ParsedStatement, unit: UnitId) -> Result<NodeId> {
    let kind = StatementKind::from_keyword(&parsed.keyword).ok_or_else(|| {
        ResolveError::InvalidInput(format!(
            "unknown statement '{}' at line {}",
            parsed.keyword, parsed.line
        ))
    })?;
    Ok(tree.create(
        kind,
        parsed.keyword.clone(),
        parsed.argument.clone(),
        parsed.line,
        unit,
    ))
}

/// One parsed unit handed to [`Schema::parse_into_schema`](crate::Schema::parse_into_schema).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitInput {
    /// Name of the input (usually a file name); duplicates are rejected.
    pub source: String,
    #[serde(default)]
    pub conformance: ConformanceType,
    pub root: ParsedStatement,
}

impl UnitInput {
    pub fn new(source: impl Into<String>, conformance: ConformanceType, root: ParsedStatement) -> Self {
        Self {
            source: source.into(),
            conformance,
            root,
        }
    }

    /// Loads a unit from a `.json`, `.yaml` or `.yml` file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](ResolveError::Io) if the file cannot be read, or
    /// [`Json`](ResolveError::Json) / [`Yaml`](ResolveError::Yaml) if parsing
    /// fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let input = if is_json {
            serde_json::from_str(&raw)?
        } else {
            serde_yaml::from_str(&raw)?
        };
        Ok(input)
    }
}
