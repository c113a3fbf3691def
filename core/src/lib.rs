//! Semantic resolution of parsed YANG-style module trees.
//!
//! This crate takes modules whose statements have already been parsed and
//! turns them into one resolved schema:
//!
//! - [`ModuleRegistry`] holds every supplied (sub-)module; the relationship
//!   checks validate imports, includes, `belongs-to` and revisions.
//! - [`Schema::parse_into_schema`] registers the inputs and runs the
//!   resolution passes: submodule merge, `case` and `input`/`output`
//!   fix-ups, typedef and grouping expansion, augments, deviations,
//!   import-only pruning, if-feature pruning and property propagation.
//! - [`IdentityRegistry`] and [`AnnotationRegistry`] are filled from the
//!   resolved trees.
//!
//! Problems with the modules are never errors. They are recorded as
//! [`Finding`]s in the [`FindingsManager`] and resolution carries on.
//!
//! # Example
//!
//! ```
//! use yang_resolver_core::*;
//!
//! let module = ParsedStatement::new("module", "acme").with_children([
//!     ParsedStatement::new("namespace", "urn:acme"),
//!     ParsedStatement::new("prefix", "ac"),
//!     ParsedStatement::new("typedef", "percent")
//!         .with_child(ParsedStatement::new("type", "uint8")),
//!     ParsedStatement::new("container", "cpu").with_child(
//!         ParsedStatement::new("leaf", "load")
//!             .with_child(ParsedStatement::new("type", "percent")),
//!     ),
//! ]);
//!
//! let mut schema = Schema::new(ResolverConfig::default());
//! schema
//!     .parse_into_schema([UnitInput::new("acme.yang", ConformanceType::Implement, module)])
//!     .unwrap();
//!
//! let load = schema.lookup("acme", "cpu/load").unwrap();
//! let ty = schema.tree().child_argument(load, StatementKind::Type);
//! assert_eq!(ty, Some("uint8"));
//! ```

pub mod boundary;
mod check;
mod config;
mod error;
mod finding;
pub mod if_feature;
mod input;
mod registry;
mod resolve;
mod schema;
mod statement;
mod unit;

pub use config::{FeatureRef, ResolverConfig};
pub use error::{ResolveError, Result};
pub use finding::{FAIL_FAST, Finding, FindingFilter, FindingType, FindingsManager, NON_SUPPRESSIBLE};
pub use input::{ParsedStatement, UnitInput};
pub use registry::{
    AnnotationRegistry, IdentityRegistry, ModuleAndNamespaceResolver, ModuleRegistry,
    YangAnnotation, YangIdentity,
};
pub use schema::{HookResult, Schema, SchemaHook};
pub use statement::{
    AppData, AppDataKind, ChildRules, EffectiveProperties, NodeId, Statement, StatementKind,
    StatementTree, Status, child_rules,
};
pub use unit::{
    BelongsToRef, ConformanceType, ImportRef, IncludeRef, ModuleIdentity, UNKNOWN_REVISION, Unit,
    UnitId, UnitKind, YangFeature,
};
