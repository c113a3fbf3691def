//! Resolver configuration.
//!
//! Controls which resolution passes run, how findings are filtered, and which
//! features the target system supports.
//!
//! # Example YAML
//!
//! ```yaml
//! merge_submodules: true
//! resolve_derived_types_and_groupings: true
//! resolve_augments: true
//! resolve_deviations: true
//! remove_if_feature_gated_nodes: true
//! ignore_imported_protocol_accessible_objects: true
//! suppress_findings_on_unused_nodes: false
//! stop_after_initial_parse: false
//! fail_fast: true
//! supported_features:
//!   - module: acme-system
//!     feature: ntp
//! suppressed_finding_types:
//!   - P133_GROUPING_USED_ONCE_ONLY
//! suppress_all: false
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::finding::FindingType;

/// A supported feature, named by the module declaring it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureRef {
    pub module: String,
    pub feature: String,
}

impl FeatureRef {
    pub fn new(module: impl Into<String>, feature: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            feature: feature.into(),
        }
    }
}

/// Switches for one resolution run.
///
/// # Examples
///
/// ```
/// use yang_resolver_core::{FeatureRef, ResolverConfig};
///
/// let config = ResolverConfig {
///     remove_if_feature_gated_nodes: true,
///     supported_features: Some(vec![FeatureRef::new("acme", "ntp")]),
///     ..Default::default()
/// };
/// assert!(config.fail_fast);
/// assert!(config.merge_submodules);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Move submodule content into the owning module.
    pub merge_submodules: bool,
    /// Expand typedef references and `uses` of groupings.
    pub resolve_derived_types_and_groupings: bool,
    pub resolve_augments: bool,
    pub resolve_deviations: bool,
    /// Remove schema nodes whose if-feature evaluates to false. Requires
    /// [`supported_features`](Self::supported_features).
    pub remove_if_feature_gated_nodes: bool,
    /// Remove data nodes, rpcs and notifications of IMPORT-conformance modules.
    pub ignore_imported_protocol_accessible_objects: bool,
    /// Drop findings reported on statements no longer part of the schema.
    pub suppress_findings_on_unused_nodes: bool,
    /// Register and validate the inputs, but do not run any resolution pass.
    pub stop_after_initial_parse: bool,
    /// Abort after validation if the inputs are seriously broken.
    pub fail_fast: bool,
    /// Features supported by the target system. `None` means unknown.
    pub supported_features: Option<Vec<FeatureRef>>,
    pub suppressed_finding_types: Vec<FindingType>,
    pub suppress_all: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            merge_submodules: true,
            resolve_derived_types_and_groupings: true,
            resolve_augments: true,
            resolve_deviations: true,
            remove_if_feature_gated_nodes: false,
            ignore_imported_protocol_accessible_objects: true,
            suppress_findings_on_unused_nodes: false,
            stop_after_initial_parse: false,
            fail_fast: true,
            supported_features: None,
            suppressed_finding_types: Vec::new(),
            suppress_all: false,
        }
    }
}

impl ResolverConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::ResolveError::Io) if the file cannot be read, or
    /// [`Yaml`](crate::ResolveError::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::ResolveError::Io) if the file cannot be written,
    /// or [`Yaml`](crate::ResolveError::Yaml) if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Returns `true` if `feature` of `module` is listed as supported.
    ///
    /// Always `false` when the supported features are unknown.
    pub fn supports(&self, module: &str, feature: &str) -> bool {
        self.supported_features
            .as_ref()
            .is_some_and(|features| {
                features
                    .iter()
                    .any(|f| f.module == module && f.feature == feature)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ResolverConfig::default();
        assert!(config.merge_submodules);
        assert!(!config.remove_if_feature_gated_nodes);
        assert!(config.ignore_imported_protocol_accessible_objects);
        assert!(config.fail_fast);
        assert!(config.supported_features.is_none());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: ResolverConfig = serde_yaml::from_str(
            "fail_fast: false\nsuppressed_finding_types: [P114_TYPEDEF_NOT_USED]\n",
        )
        .unwrap();
        assert!(!config.fail_fast);
        assert!(config.resolve_augments);
        assert_eq!(
            config.suppressed_finding_types,
            vec![FindingType::TypedefNotUsed]
        );
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resolver.yaml");
        let config = ResolverConfig {
            supported_features: Some(vec![FeatureRef::new("acme", "ntp")]),
            ..Default::default()
        };
        config.save(&path).unwrap();
        let loaded = ResolverConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(loaded.supports("acme", "ntp"));
        assert!(!loaded.supports("acme", "dns"));
    }

    #[test]
    fn test_unknown_finding_type_rejected() {
        let result: std::result::Result<ResolverConfig, _> =
            serde_yaml::from_str("suppressed_finding_types: [P999_BOGUS]\n");
        assert!(result.is_err());
    }
}
