//! The closed vocabulary of statement kinds.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Every statement keyword the engine understands.
///
/// Prefixed keywords (`md:annotation`, `ext:foo`) are usages of extensions
/// declared by some module and map to [`StatementKind::ExtensionUsage`]; the
/// raw keyword is kept on the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatementKind {
    Action,
    Anydata,
    Anyxml,
    Argument,
    Augment,
    Base,
    BelongsTo,
    Bit,
    Case,
    Choice,
    Config,
    Contact,
    Container,
    Default,
    Description,
    Deviate,
    Deviation,
    Enum,
    ErrorAppTag,
    ErrorMessage,
    Extension,
    ExtensionUsage,
    Feature,
    FractionDigits,
    Grouping,
    Identity,
    IfFeature,
    Import,
    Include,
    Input,
    Key,
    Leaf,
    LeafList,
    Length,
    List,
    Mandatory,
    MaxElements,
    MinElements,
    Modifier,
    Module,
    Must,
    Namespace,
    Notification,
    OrderedBy,
    Organization,
    Output,
    Path,
    Pattern,
    Position,
    Prefix,
    Presence,
    Range,
    Reference,
    Refine,
    RequireInstance,
    Revision,
    RevisionDate,
    Rpc,
    Status,
    Submodule,
    Type,
    Typedef,
    Unique,
    Units,
    Uses,
    Value,
    When,
    YangVersion,
    YinElement,
}

const KEYWORDS: &[(StatementKind, &str)] = &[
    (StatementKind::Action, "action"),
    (StatementKind::Anydata, "anydata"),
    (StatementKind::Anyxml, "anyxml"),
    (StatementKind::Argument, "argument"),
    (StatementKind::Augment, "augment"),
    (StatementKind::Base, "base"),
    (StatementKind::BelongsTo, "belongs-to"),
    (StatementKind::Bit, "bit"),
    (StatementKind::Case, "case"),
    (StatementKind::Choice, "choice"),
    (StatementKind::Config, "config"),
    (StatementKind::Contact, "contact"),
    (StatementKind::Container, "container"),
    (StatementKind::Default, "default"),
    (StatementKind::Description, "description"),
    (StatementKind::Deviate, "deviate"),
    (StatementKind::Deviation, "deviation"),
    (StatementKind::Enum, "enum"),
    (StatementKind::ErrorAppTag, "error-app-tag"),
    (StatementKind::ErrorMessage, "error-message"),
    (StatementKind::Extension, "extension"),
    (StatementKind::Feature, "feature"),
    (StatementKind::FractionDigits, "fraction-digits"),
    (StatementKind::Grouping, "grouping"),
    (StatementKind::Identity, "identity"),
    (StatementKind::IfFeature, "if-feature"),
    (StatementKind::Import, "import"),
    (StatementKind::Include, "include"),
    (StatementKind::Input, "input"),
    (StatementKind::Key, "key"),
    (StatementKind::Leaf, "leaf"),
    (StatementKind::LeafList, "leaf-list"),
    (StatementKind::Length, "length"),
    (StatementKind::List, "list"),
    (StatementKind::Mandatory, "mandatory"),
    (StatementKind::MaxElements, "max-elements"),
    (StatementKind::MinElements, "min-elements"),
    (StatementKind::Modifier, "modifier"),
    (StatementKind::Module, "module"),
    (StatementKind::Must, "must"),
    (StatementKind::Namespace, "namespace"),
    (StatementKind::Notification, "notification"),
    (StatementKind::OrderedBy, "ordered-by"),
    (StatementKind::Organization, "organization"),
    (StatementKind::Output, "output"),
    (StatementKind::Path, "path"),
    (StatementKind::Pattern, "pattern"),
    (StatementKind::Position, "position"),
    (StatementKind::Prefix, "prefix"),
    (StatementKind::Presence, "presence"),
    (StatementKind::Range, "range"),
    (StatementKind::Reference, "reference"),
    (StatementKind::Refine, "refine"),
    (StatementKind::RequireInstance, "require-instance"),
    (StatementKind::Revision, "revision"),
    (StatementKind::RevisionDate, "revision-date"),
    (StatementKind::Rpc, "rpc"),
    (StatementKind::Status, "status"),
    (StatementKind::Submodule, "submodule"),
    (StatementKind::Type, "type"),
    (StatementKind::Typedef, "typedef"),
    (StatementKind::Unique, "unique"),
    (StatementKind::Units, "units"),
    (StatementKind::Uses, "uses"),
    (StatementKind::Value, "value"),
    (StatementKind::When, "when"),
    (StatementKind::YangVersion, "yang-version"),
    (StatementKind::YinElement, "yin-element"),
];

impl StatementKind {
    /// Maps a keyword to its kind.
    ///
    /// Any keyword containing a `:` is an extension usage. Unknown unprefixed
    /// keywords return `None`.
    ///
    /// # Examples
    ///
    /// ```
    /// use yang_resolver_core::StatementKind;
    ///
    /// assert_eq!(StatementKind::from_keyword("leaf-list"), Some(StatementKind::LeafList));
    /// assert_eq!(StatementKind::from_keyword("md:annotation"), Some(StatementKind::ExtensionUsage));
    /// assert_eq!(StatementKind::from_keyword("bogus"), None);
    /// ```
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        if keyword.contains(':') {
            return Some(Self::ExtensionUsage);
        }
        KEYWORDS
            .iter()
            .find(|(_, kw)| *kw == keyword)
            .map(|(kind, _)| *kind)
    }

    /// Returns the keyword of a core statement kind.
    ///
    /// Extension usages have no fixed keyword and return `"extension-usage"`;
    /// the actual keyword lives on the node.
    pub fn keyword(self) -> &'static str {
        KEYWORDS
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, kw)| *kw)
            .unwrap_or("extension-usage")
    }

    /// Statements that are nodes of the schema tree.
    pub fn defines_schema_node(self) -> bool {
        matches!(
            self,
            Self::Action
                | Self::Anydata
                | Self::Anyxml
                | Self::Case
                | Self::Choice
                | Self::Container
                | Self::Input
                | Self::Leaf
                | Self::LeafList
                | Self::List
                | Self::Notification
                | Self::Output
                | Self::Rpc
        )
    }

    /// Statements that are nodes of the data tree.
    pub fn defines_data_node(self) -> bool {
        matches!(
            self,
            Self::Anydata | Self::Anyxml | Self::Container | Self::Leaf | Self::LeafList | Self::List
        )
    }

    /// Statements that may appear directly under a `choice` as shorthand for
    /// a `case` of the same name.
    pub fn is_case_shorthand(self) -> bool {
        matches!(
            self,
            Self::Anydata
                | Self::Anyxml
                | Self::Choice
                | Self::Container
                | Self::Leaf
                | Self::LeafList
                | Self::List
        )
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_table_is_bijective() {
        for (kind, keyword) in KEYWORDS {
            assert_eq!(StatementKind::from_keyword(keyword), Some(*kind));
            assert_eq!(kind.keyword(), *keyword);
        }
    }

    #[test]
    fn test_prefixed_keyword_is_extension_usage() {
        assert_eq!(
            StatementKind::from_keyword("ext:my-marker"),
            Some(StatementKind::ExtensionUsage)
        );
        assert_eq!(StatementKind::ExtensionUsage.keyword(), "extension-usage");
    }

    #[test]
    fn test_data_nodes_are_schema_nodes() {
        for (kind, _) in KEYWORDS {
            if kind.defines_data_node() {
                assert!(kind.defines_schema_node(), "{kind} must be a schema node");
            }
        }
        assert!(StatementKind::Case.defines_schema_node());
        assert!(!StatementKind::Case.defines_data_node());
        assert!(!StatementKind::Grouping.defines_schema_node());
    }
}
