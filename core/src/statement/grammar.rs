//! Per-kind child statement rules.
//!
//! Static lookup built once on first use. Only the parent kinds the
//! resolution passes consult are listed; every other kind reports no rules,
//! which [`ChildRules::allows`] treats as "anything goes".

use std::collections::HashMap;
use std::sync::LazyLock;

use super::StatementKind;
use StatementKind as K;

/// Which child kinds are legal under a parent kind, and how often.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChildRules {
    pub mandatory_single: &'static [StatementKind],
    pub mandatory_multiple: &'static [StatementKind],
    pub optional_single: &'static [StatementKind],
    pub optional_multiple: &'static [StatementKind],
}

impl ChildRules {
    /// Returns `true` if `child` may appear under the parent at all.
    pub fn allows(&self, child: StatementKind) -> bool {
        if child == K::ExtensionUsage || self.is_empty() {
            return true;
        }
        self.mandatory_single.contains(&child)
            || self.mandatory_multiple.contains(&child)
            || self.optional_single.contains(&child)
            || self.optional_multiple.contains(&child)
    }

    /// Returns `true` if `child` may appear more than once under the parent.
    pub fn allows_multiple(&self, child: StatementKind) -> bool {
        child == K::ExtensionUsage
            || self.mandatory_multiple.contains(&child)
            || self.optional_multiple.contains(&child)
    }

    /// Returns `true` if at least one `child` must be present.
    pub fn requires(&self, child: StatementKind) -> bool {
        self.mandatory_single.contains(&child) || self.mandatory_multiple.contains(&child)
    }

    fn is_empty(&self) -> bool {
        self.mandatory_single.is_empty()
            && self.mandatory_multiple.is_empty()
            && self.optional_single.is_empty()
            && self.optional_multiple.is_empty()
    }
}

static GRAMMAR: LazyLock<HashMap<StatementKind, ChildRules>> = LazyLock::new(|| {
    let mut table = HashMap::new();

    let module_body: &'static [StatementKind] = &[
        K::Anydata,
        K::Anyxml,
        K::Augment,
        K::Choice,
        K::Container,
        K::Deviation,
        K::Extension,
        K::Feature,
        K::Grouping,
        K::Identity,
        K::Import,
        K::Include,
        K::Leaf,
        K::LeafList,
        K::List,
        K::Notification,
        K::Revision,
        K::Rpc,
        K::Typedef,
        K::Uses,
    ];
    table.insert(
        K::Module,
        ChildRules {
            mandatory_single: &[K::Namespace, K::Prefix],
            optional_single: &[
                K::Contact,
                K::Description,
                K::Organization,
                K::Reference,
                K::YangVersion,
            ],
            optional_multiple: module_body,
            ..Default::default()
        },
    );
    table.insert(
        K::Submodule,
        ChildRules {
            mandatory_single: &[K::BelongsTo],
            optional_single: &[
                K::Contact,
                K::Description,
                K::Organization,
                K::Reference,
                K::YangVersion,
            ],
            optional_multiple: module_body,
            ..Default::default()
        },
    );
    table.insert(
        K::Container,
        ChildRules {
            optional_single: &[
                K::Config,
                K::Description,
                K::Presence,
                K::Reference,
                K::Status,
                K::When,
            ],
            optional_multiple: &[
                K::Action,
                K::Anydata,
                K::Anyxml,
                K::Choice,
                K::Container,
                K::Grouping,
                K::IfFeature,
                K::Leaf,
                K::LeafList,
                K::List,
                K::Must,
                K::Notification,
                K::Typedef,
                K::Uses,
            ],
            ..Default::default()
        },
    );
    table.insert(
        K::List,
        ChildRules {
            optional_single: &[
                K::Config,
                K::Description,
                K::Key,
                K::MaxElements,
                K::MinElements,
                K::OrderedBy,
                K::Reference,
                K::Status,
                K::When,
            ],
            optional_multiple: &[
                K::Action,
                K::Anydata,
                K::Anyxml,
                K::Choice,
                K::Container,
                K::Grouping,
                K::IfFeature,
                K::Leaf,
                K::LeafList,
                K::List,
                K::Must,
                K::Notification,
                K::Typedef,
                K::Unique,
                K::Uses,
            ],
            ..Default::default()
        },
    );
    table.insert(
        K::Leaf,
        ChildRules {
            mandatory_single: &[K::Type],
            optional_single: &[
                K::Config,
                K::Default,
                K::Description,
                K::Mandatory,
                K::Reference,
                K::Status,
                K::Units,
                K::When,
            ],
            optional_multiple: &[K::IfFeature, K::Must],
            ..Default::default()
        },
    );
    table.insert(
        K::LeafList,
        ChildRules {
            mandatory_single: &[K::Type],
            optional_single: &[
                K::Config,
                K::Description,
                K::MaxElements,
                K::MinElements,
                K::OrderedBy,
                K::Reference,
                K::Status,
                K::Units,
                K::When,
            ],
            optional_multiple: &[K::Default, K::IfFeature, K::Must],
            ..Default::default()
        },
    );
    table.insert(
        K::Choice,
        ChildRules {
            optional_single: &[
                K::Config,
                K::Default,
                K::Description,
                K::Mandatory,
                K::Reference,
                K::Status,
                K::When,
            ],
            optional_multiple: &[
                K::Anydata,
                K::Anyxml,
                K::Case,
                K::Choice,
                K::Container,
                K::IfFeature,
                K::Leaf,
                K::LeafList,
                K::List,
            ],
            ..Default::default()
        },
    );
    table.insert(
        K::Case,
        ChildRules {
            optional_single: &[K::Description, K::Reference, K::Status, K::When],
            optional_multiple: &[
                K::Anydata,
                K::Anyxml,
                K::Choice,
                K::Container,
                K::IfFeature,
                K::Leaf,
                K::LeafList,
                K::List,
                K::Uses,
            ],
            ..Default::default()
        },
    );
    let any_rules = ChildRules {
        optional_single: &[
            K::Config,
            K::Description,
            K::Mandatory,
            K::Reference,
            K::Status,
            K::When,
        ],
        optional_multiple: &[K::IfFeature, K::Must],
        ..Default::default()
    };
    table.insert(K::Anydata, any_rules);
    table.insert(K::Anyxml, any_rules);
    let io_rules = ChildRules {
        optional_multiple: &[
            K::Anydata,
            K::Anyxml,
            K::Choice,
            K::Container,
            K::Grouping,
            K::Leaf,
            K::LeafList,
            K::List,
            K::Must,
            K::Typedef,
            K::Uses,
        ],
        ..Default::default()
    };
    table.insert(K::Input, io_rules);
    table.insert(K::Output, io_rules);
    table.insert(
        K::Notification,
        ChildRules {
            optional_single: &[K::Description, K::Reference, K::Status],
            optional_multiple: &[
                K::Anydata,
                K::Anyxml,
                K::Choice,
                K::Container,
                K::Grouping,
                K::IfFeature,
                K::Leaf,
                K::LeafList,
                K::List,
                K::Must,
                K::Typedef,
                K::Uses,
            ],
            ..Default::default()
        },
    );
    let operation_rules = ChildRules {
        optional_single: &[K::Description, K::Input, K::Output, K::Reference, K::Status],
        optional_multiple: &[K::Grouping, K::IfFeature, K::Typedef],
        ..Default::default()
    };
    table.insert(K::Rpc, operation_rules);
    table.insert(K::Action, operation_rules);
    table.insert(
        K::Grouping,
        ChildRules {
            optional_single: &[K::Description, K::Reference, K::Status],
            optional_multiple: &[
                K::Action,
                K::Anydata,
                K::Anyxml,
                K::Choice,
                K::Container,
                K::Grouping,
                K::Leaf,
                K::LeafList,
                K::List,
                K::Notification,
                K::Typedef,
                K::Uses,
            ],
            ..Default::default()
        },
    );
    table.insert(
        K::Augment,
        ChildRules {
            optional_single: &[K::Description, K::Reference, K::Status, K::When],
            optional_multiple: &[
                K::Action,
                K::Anydata,
                K::Anyxml,
                K::Case,
                K::Choice,
                K::Container,
                K::IfFeature,
                K::Leaf,
                K::LeafList,
                K::List,
                K::Notification,
                K::Uses,
            ],
            ..Default::default()
        },
    );
    table.insert(
        K::Typedef,
        ChildRules {
            mandatory_single: &[K::Type],
            optional_single: &[K::Default, K::Description, K::Reference, K::Status, K::Units],
            ..Default::default()
        },
    );
    table.insert(
        K::Type,
        ChildRules {
            optional_single: &[
                K::FractionDigits,
                K::Length,
                K::Path,
                K::Range,
                K::RequireInstance,
            ],
            optional_multiple: &[K::Base, K::Bit, K::Enum, K::Pattern, K::Type],
            ..Default::default()
        },
    );
    table
});

/// Returns the child rules for `parent`, or empty rules if the kind is not
/// tabulated.
///
/// # Examples
///
/// ```
/// use yang_resolver_core::{StatementKind, child_rules};
///
/// let leaf = child_rules(StatementKind::Leaf);
/// assert!(leaf.requires(StatementKind::Type));
/// assert!(leaf.allows(StatementKind::Must));
/// assert!(!leaf.allows(StatementKind::Container));
/// ```
pub fn child_rules(parent: StatementKind) -> ChildRules {
    GRAMMAR.get(&parent).copied().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_container_children() {
        let rules = child_rules(K::Container);
        assert!(rules.allows(K::Leaf));
        assert!(rules.allows_multiple(K::Leaf));
        assert!(rules.allows(K::Config));
        assert!(!rules.allows_multiple(K::Config));
        assert!(!rules.allows(K::Type));
    }

    #[test]
    fn test_extensions_always_allowed() {
        assert!(child_rules(K::Leaf).allows(K::ExtensionUsage));
        assert!(child_rules(K::Leaf).allows_multiple(K::ExtensionUsage));
    }

    #[test]
    fn test_untabulated_kind_allows_everything() {
        let rules = child_rules(K::Description);
        assert!(rules.allows(K::Container));
        assert!(!rules.requires(K::Type));
    }

    #[test]
    fn test_leaf_list_default_is_multiple() {
        let rules = child_rules(K::LeafList);
        assert!(rules.allows_multiple(K::Default));
        assert!(!child_rules(K::Leaf).allows_multiple(K::Default));
    }
}
