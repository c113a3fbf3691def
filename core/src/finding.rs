//! Diagnostics emitted during resolution.
//!
//! Every expected, data-dependent problem becomes a [`Finding`] of a closed
//! [`FindingType`]. Findings are collected by a [`FindingsManager`], which
//! applies the configured suppression before storing them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::statement::NodeId;

macro_rules! finding_types {
    ($($variant:ident => $code:literal,)+) => {
        /// Closed vocabulary of diagnostic kinds.
        ///
        /// The string form is the stable code name used in configuration
        /// files and output.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum FindingType {
            $($variant,)+
        }

        impl FindingType {
            /// Every finding type, in code order.
            pub const ALL: &'static [FindingType] = &[$(FindingType::$variant,)+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(FindingType::$variant => $code,)+
                }
            }
        }

        impl FromStr for FindingType {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($code => Ok(FindingType::$variant),)+
                    other => Err(format!("unknown finding type '{other}'")),
                }
            }
        }
    };
}

finding_types! {
    UnspecifiedError => "P000_UNSPECIFIED_ERROR",
    BasicFileReadError => "P001_BASIC_FILE_READ_ERROR",
    DuplicateInput => "P003_DUPLICATE_INPUT",
    SameModuleDuplicateImplements => "P004_SAME_MODULE_DUPLICATE_IMPLEMENTS",
    NoImplements => "P005_NO_IMPLEMENTS",
    ImplementImportMismatch => "P006_IMPLEMENT_IMPORT_MISMATCH",
    FailFast => "P009_FAIL_FAST",
    InvalidSyntaxAtDocumentRoot => "P013_INVALID_SYNTAX_AT_DOCUMENT_ROOT",
    InvalidSyntaxAtDocumentEnd => "P014_INVALID_SYNTAX_AT_DOCUMENT_END",
    InvalidSyntaxInDocument => "P015_INVALID_SYNTAX_IN_DOCUMENT",
    IllegalChildStatement => "P018_ILLEGAL_CHILD_STATEMENT",
    PrefixNotUnique => "P031_PREFIX_NOT_UNIQUE",
    MissingRevision => "P032_MISSING_REVISION",
    UnresolvablePrefix => "P033_UNRESOLVEABLE_PREFIX",
    UnresolvableImport => "P034_UNRESOLVABLE_IMPORT",
    AmbiguousImport => "P035_AMBIGUOUS_IMPORT",
    ModuleImportedMultipleTimes => "P036_MODULE_IMPORTED_MULTIPLE_TIMES",
    UnresolvableInclude => "P037_UNRESOLVABLE_INCLUDE",
    AmbiguousInclude => "P038_AMBIGUOUS_INCLUDE",
    UnresolvableBelongsTo => "P039_UNRESOLVABLE_BELONGS_TO",
    CircularIncludeReferences => "P040_CIRCULAR_INCLUDE_REFERENCES",
    DifferentYangVersions => "P041_DIFFERENT_YANG_VERSIONS_BETWEEN_MODULE_AND_SUBMODULES",
    SameModuleImplementsMoreThanOnce => "P043_SAME_MODULE_IMPLEMENTS_MORE_THAN_ONCE",
    SameModuleImplementsAndImports => "P044_SAME_MODULE_IMPLEMENTS_AND_IMPORTS",
    NotASubmodule => "P045_NOT_A_SUBMODULE",
    NotAModule => "P046_NOT_A_MODULE",
    SubmoduleOwnershipMismatch => "P047_SUBMODULE_OWNERSHIP_MISMATCH",
    OrphanSubmodule => "P048_ORPHAN_SUBMODULE",
    DuplicateRevision => "P049_DUPLICATE_REVISION",
    DuplicateLatestRevision => "P050_DUPLICATE_LATEST_REVISION",
    InvalidValue => "P053_INVALID_VALUE",
    UnresolvablePath => "P054_UNRESOLVABLE_PATH",
    ConstraintNarrowed => "P056_CONSTRAINT_NARROWED",
    DataTypeChanged => "P057_DATA_TYPE_CHANGED",
    FeatureCannotBeSupported => "P086_FEATURE_CANNOT_BE_SUPPORTED",
    IllegalIfFeatureSyntax => "P103_ILLEGAL_IF_FEATURE_SYNTAX",
    CircularTypedefReferences => "P111_CIRCULAR_TYPEDEF_REFERENCES",
    ExcessiveTypedefDepth => "P112_EXCESSIVE_TYPEDEF_DEPTH",
    UnresolvableDerivedType => "P113_UNRESOLVABLE_DERIVED_TYPE",
    TypedefNotUsed => "P114_TYPEDEF_NOT_USED",
    TypedefUsedOnceOnly => "P115_TYPEDEF_USED_ONCE_ONLY",
    NestedDerivedTypeNotResolvable => "P116_NESTED_DERIVED_TYPE_NOT_RESOLVABLE",
    IllegalDataTypeRestriction => "P117_ILLEGAL_DATA_TYPE_RESTRICTION",
    CircularUsesReferences => "P121_CIRCULAR_USES_REFERENCES",
    ExcessiveUsesDepth => "P122_EXCESSIVE_USES_DEPTH",
    InvalidUsesAugmentTargetNode => "P123_INVALID_USES_AUGMENT_TARGET_NODE",
    InvalidRefineTargetNode => "P124_INVALID_REFINE_TARGET_NODE",
    UnresolvableGrouping => "P131_UNRESOLVABLE_GROUPING",
    GroupingNotUsed => "P132_GROUPING_NOT_USED",
    GroupingUsedOnceOnly => "P133_GROUPING_USED_ONCE_ONLY",
    NestedUsesNotResolvable => "P134_NESTED_USES_NOT_RESOLVABLE",
    TargetNodeCannotBeAugmented => "P151_TARGET_NODE_CANNOT_BE_AUGMENTED",
    AugmentTargetNodeInSameModule => "P152_AUGMENT_TARGET_NODE_IN_SAME_MODULE",
    InvalidDeviateOperation => "P161_INVALID_DEVIATE_OPERATION",
    DeviationTargetNodeInSameModule => "P162_DEVIATION_TARGET_NODE_IN_SAME_MODULE",
    AmbiguousDeviateReplace => "P163_AMBIGUOUS_DEVIATE_REPLACE_OF_SAME_STATEMENT",
    DeviateReplaceOfDeviateAdded => "P164_DEVIATE_REPLACE_OF_DEVIATE_ADDED_STATEMENT",
    DeviateDeleteOfDeviated => "P165_DEVIATE_DELETE_OF_DEVIATED_STATEMENT",
    DeviateCardinalityViolation => "P166_DEVIATE_RESULTS_IN_CHILD_CARDINALITY_VIOLATION",
}

impl fmt::Display for FindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for FindingType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FindingType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Finding types that are never filtered out.
pub const NON_SUPPRESSIBLE: &[FindingType] = &[
    FindingType::UnspecifiedError,
    FindingType::BasicFileReadError,
    FindingType::InvalidSyntaxAtDocumentRoot,
    FindingType::InvalidSyntaxAtDocumentEnd,
];

/// Finding types that abort the run after relationship validation when fail-fast is enabled.
pub const FAIL_FAST: &[FindingType] = &[
    FindingType::UnspecifiedError,
    FindingType::BasicFileReadError,
    FindingType::DuplicateInput,
    FindingType::SameModuleDuplicateImplements,
    FindingType::NoImplements,
    FindingType::ImplementImportMismatch,
    FindingType::InvalidSyntaxAtDocumentRoot,
    FindingType::InvalidSyntaxAtDocumentEnd,
    FindingType::PrefixNotUnique,
    FindingType::MissingRevision,
    FindingType::AmbiguousImport,
    FindingType::ModuleImportedMultipleTimes,
    FindingType::UnresolvableInclude,
    FindingType::AmbiguousInclude,
    FindingType::UnresolvableBelongsTo,
    FindingType::CircularIncludeReferences,
    FindingType::DifferentYangVersions,
    FindingType::SameModuleImplementsMoreThanOnce,
    FindingType::SameModuleImplementsAndImports,
    FindingType::NotASubmodule,
    FindingType::NotAModule,
    FindingType::SubmoduleOwnershipMismatch,
    FindingType::OrphanSubmodule,
    FindingType::DuplicateLatestRevision,
];

/// One diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Finding {
    pub finding_type: FindingType,
    pub message: String,
    /// Input the finding relates to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
    /// Statement the finding was reported on, if any.
    #[serde(skip)]
    pub node: Option<NodeId>,
}

impl Finding {
    /// A finding not tied to any input.
    pub fn general(finding_type: FindingType, message: impl Into<String>) -> Self {
        Self {
            finding_type,
            message: message.into(),
            source: None,
            line: None,
            node: None,
        }
    }

    /// A finding about a whole input.
    pub fn on_input(
        source: impl Into<String>,
        finding_type: FindingType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: Some(source.into()),
            ..Self::general(finding_type, message)
        }
    }

    /// A finding about one statement.
    pub fn on_node(
        source: impl Into<String>,
        line: u32,
        node: NodeId,
        finding_type: FindingType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: Some(source.into()),
            line: Some(line),
            node: Some(node),
            ..Self::general(finding_type, message)
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.source, self.line) {
            (Some(source), Some(line)) => write!(f, "{source}:{line} ")?,
            (Some(source), None) => write!(f, "{source} ")?,
            _ => {}
        }
        write!(f, "[{}] {}", self.finding_type, self.message)
    }
}

/// Predicate deciding whether a finding should be dropped.
pub trait FindingFilter {
    fn suppress(&self, finding: &Finding) -> bool;
}

impl<F> FindingFilter for F
where
    F: Fn(&Finding) -> bool,
{
    fn suppress(&self, finding: &Finding) -> bool {
        self(finding)
    }
}

/// Collects findings, applying suppression on the way in.
#[derive(Default)]
pub struct FindingsManager {
    findings: Vec<Finding>,
    suppress_all: bool,
    suppressed_types: Vec<FindingType>,
    filters: Vec<Box<dyn FindingFilter>>,
    non_suppressible: Vec<FindingType>,
}

impl fmt::Debug for FindingsManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FindingsManager")
            .field("findings", &self.findings.len())
            .field("suppress_all", &self.suppress_all)
            .field("suppressed_types", &self.suppressed_types)
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl FindingsManager {
    /// A manager with the default non-suppressible types.
    pub fn new() -> Self {
        Self {
            non_suppressible: NON_SUPPRESSIBLE.to_vec(),
            ..Default::default()
        }
    }

    pub fn set_suppress_all(&mut self, value: bool) {
        self.suppress_all = value;
    }

    pub fn suppress_type(&mut self, finding_type: FindingType) {
        if !self.suppressed_types.contains(&finding_type) {
            self.suppressed_types.push(finding_type);
        }
    }

    pub fn add_filter(&mut self, filter: impl FindingFilter + 'static) {
        self.filters.push(Box::new(filter));
    }

    pub fn add_non_suppressible_type(&mut self, finding_type: FindingType) {
        if !self.non_suppressible.contains(&finding_type) {
            self.non_suppressible.push(finding_type);
        }
    }

    /// Returns `true` if findings of this type are dropped regardless of content.
    pub fn is_type_suppressed(&self, finding_type: FindingType) -> bool {
        !self.non_suppressible.contains(&finding_type)
            && (self.suppress_all || self.suppressed_types.contains(&finding_type))
    }

    fn should_suppress(&self, finding: &Finding) -> bool {
        self.suppress_all
            || self.suppressed_types.contains(&finding.finding_type)
            || self.filters.iter().any(|f| f.suppress(finding))
    }

    /// Stores `finding` unless it is filtered out or already present.
    pub fn add_finding(&mut self, finding: Finding) {
        if !self.non_suppressible.contains(&finding.finding_type) && self.should_suppress(&finding) {
            return;
        }
        if !self.findings.contains(&finding) {
            self.findings.push(finding);
        }
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn clear(&mut self) {
        self.findings.clear();
    }

    /// Drops every finding whose type is not in `types`.
    pub fn retain_finding_types(&mut self, types: &[FindingType]) {
        self.findings.retain(|f| types.contains(&f.finding_type));
    }

    pub fn has_finding_of_type(&self, finding_type: FindingType) -> bool {
        self.findings.iter().any(|f| f.finding_type == finding_type)
    }

    pub fn has_finding_of_any(&self, types: &[FindingType]) -> bool {
        self.findings.iter().any(|f| types.contains(&f.finding_type))
    }

    /// Removes findings reported on any of `nodes`. Returns how many were removed.
    pub fn remove_findings_on_nodes(&mut self, nodes: &std::collections::HashSet<NodeId>) -> usize {
        let before = self.findings.len();
        self.findings
            .retain(|f| !f.node.is_some_and(|n| nodes.contains(&n)));
        before - self.findings.len()
    }

    /// Findings of the given type, in insertion order.
    pub fn of_type(&self, finding_type: FindingType) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(move |f| f.finding_type == finding_type)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_code_roundtrip() {
        for ty in FindingType::ALL {
            assert_eq!(ty.as_str().parse::<FindingType>().unwrap(), *ty);
        }
        assert!("P999_NOPE".parse::<FindingType>().is_err());
    }

    #[test]
    fn test_serde_uses_code_name() {
        let json = serde_json::to_string(&FindingType::UnresolvableImport).unwrap();
        assert_eq!(json, "\"P034_UNRESOLVABLE_IMPORT\"");
        let back: FindingType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, FindingType::UnresolvableImport);
    }

    #[test]
    fn test_duplicates_stored_once() {
        let mut manager = FindingsManager::new();
        manager.add_finding(Finding::on_input("a.yang", FindingType::DuplicateInput, "x"));
        manager.add_finding(Finding::on_input("a.yang", FindingType::DuplicateInput, "x"));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_suppress_all_spares_non_suppressible() {
        let mut manager = FindingsManager::new();
        manager.set_suppress_all(true);
        manager.add_finding(Finding::general(FindingType::GroupingNotUsed, "unused"));
        manager.add_finding(Finding::general(FindingType::UnspecifiedError, "boom"));
        assert_eq!(manager.len(), 1);
        assert!(manager.has_finding_of_type(FindingType::UnspecifiedError));
        assert!(manager.is_type_suppressed(FindingType::GroupingNotUsed));
        assert!(!manager.is_type_suppressed(FindingType::UnspecifiedError));
    }

    #[test]
    fn test_custom_filter() {
        let mut manager = FindingsManager::new();
        manager.add_filter(|f: &Finding| f.source.as_deref() == Some("vendor.yang"));
        manager.add_finding(Finding::on_input("vendor.yang", FindingType::TypedefNotUsed, "t"));
        manager.add_finding(Finding::on_input("own.yang", FindingType::TypedefNotUsed, "t"));
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.findings()[0].source.as_deref(), Some("own.yang"));
    }

    #[test]
    fn test_retain_and_remove() {
        let mut manager = FindingsManager::new();
        let mut tree = crate::statement::StatementTree::new();
        let node = tree.create(
            crate::statement::StatementKind::Grouping,
            "grouping",
            Some("g".into()),
            3,
            crate::unit::UnitId::new(0),
        );
        manager.add_finding(Finding::on_node("m.yang", 3, node, FindingType::GroupingNotUsed, "g"));
        manager.add_finding(Finding::general(FindingType::NoImplements, "none"));
        assert_eq!(manager.remove_findings_on_nodes(&HashSet::from([node])), 1);
        manager.add_finding(Finding::general(FindingType::DuplicateInput, "dup"));
        manager.retain_finding_types(&[FindingType::NoImplements]);
        assert_eq!(manager.len(), 1);
    }
}
