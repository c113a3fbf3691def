//! Output formatting for resolution results.

use serde::Serialize;
use yang_resolver_core::{
    ConformanceType, Finding, Schema, UnitKind, YangAnnotation, YangIdentity,
};

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Table,
}

/// Summary of one registered unit.
#[derive(Debug, Serialize)]
pub struct UnitSummary {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    pub kind: UnitKind,
    pub conformance: ConformanceType,
    pub source: String,
}

/// Everything `resolve` prints.
#[derive(Debug, Serialize)]
pub struct ResolveReport {
    pub units: Vec<UnitSummary>,
    pub identities: usize,
    pub annotations: Vec<YangAnnotation>,
    pub findings: Vec<Finding>,
}

impl ResolveReport {
    pub fn from_schema(schema: &Schema) -> Self {
        let units = schema
            .module_registry()
            .all()
            .iter()
            .map(|unit| UnitSummary {
                name: unit.name().to_string(),
                revision: unit.revision().map(str::to_string),
                kind: unit.kind(),
                conformance: unit.conformance(),
                source: unit.source().to_string(),
            })
            .collect();
        Self {
            units,
            identities: schema.identity_registry().len(),
            annotations: schema.annotation_registry().annotations().to_vec(),
            findings: schema.findings().findings().to_vec(),
        }
    }
}

/// Formats a resolve report in the requested output format.
pub fn format_report(report: &ResolveReport, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        OutputFormat::Yaml => {
            serde_yaml::to_string(report).map_err(|e| format!("YAML serialization failed: {e}"))
        }
        OutputFormat::Table => Ok(report_to_table(report)),
    }
}

/// Formats an identity closure in the requested output format.
pub fn format_identities(
    identities: &[YangIdentity],
    format: OutputFormat,
) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(identities)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        OutputFormat::Yaml => serde_yaml::to_string(identities)
            .map_err(|e| format!("YAML serialization failed: {e}")),
        OutputFormat::Table => {
            let mut out = String::new();
            for identity in identities {
                out.push_str(&format!(
                    "{:<40} {}\n",
                    identity.to_string(),
                    identity.namespace.as_deref().unwrap_or("-")
                ));
            }
            Ok(out)
        }
    }
}

fn report_to_table(report: &ResolveReport) -> String {
    let mut out = String::new();
    for unit in &report.units {
        out.push_str(&format!(
            "{:<30} {:<10} {:<10} {}\n",
            unit.name,
            unit.revision.as_deref().unwrap_or("-"),
            format!("{:?}", unit.kind),
            unit.conformance,
        ));
    }
    out.push('\n');

    if report.findings.is_empty() {
        out.push_str("No findings.\n");
        return out;
    }
    for finding in &report.findings {
        let location = match (&finding.source, finding.line) {
            (Some(source), Some(line)) => format!("{source}:{line}"),
            (Some(source), None) => source.clone(),
            _ => "-".to_string(),
        };
        out.push_str(&format!(
            "{:<52} {:<24} {}\n",
            finding.finding_type.as_str(),
            location,
            finding.message
        ));
    }
    out.push_str(&format!("\n{} finding(s).\n", report.findings.len()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use yang_resolver_core::FindingType;

    fn sample_report() -> ResolveReport {
        ResolveReport {
            units: vec![UnitSummary {
                name: "acme".to_string(),
                revision: Some("2024-01-01".to_string()),
                kind: UnitKind::Module,
                conformance: ConformanceType::Implement,
                source: "acme.yang".to_string(),
            }],
            identities: 0,
            annotations: Vec::new(),
            findings: vec![Finding::on_input(
                "acme.yang",
                FindingType::GroupingNotUsed,
                "Grouping 'g' is not used.",
            )],
        }
    }

    #[test]
    fn test_format_report_json() {
        let raw = format_report(&sample_report(), OutputFormat::Json).unwrap();
        assert!(raw.contains("\"finding_type\": \"P132_GROUPING_NOT_USED\""));
        assert!(raw.contains("\"kind\": \"module\""));
    }

    #[test]
    fn test_format_report_yaml() {
        let raw = format_report(&sample_report(), OutputFormat::Yaml).unwrap();
        assert!(raw.contains("name: acme"));
        assert!(raw.contains("conformance: IMPLEMENT"));
    }

    #[test]
    fn test_format_report_table() {
        let raw = format_report(&sample_report(), OutputFormat::Table).unwrap();
        assert!(raw.contains("acme.yang"));
        assert!(raw.contains("P132_GROUPING_NOT_USED"));
        assert!(raw.contains("1 finding(s)."));
    }

    #[test]
    fn test_format_empty_table() {
        let mut report = sample_report();
        report.findings.clear();
        let raw = format_report(&report, OutputFormat::Table).unwrap();
        assert!(raw.contains("No findings."));
    }

    #[test]
    fn test_format_identities_table() {
        let ids = vec![YangIdentity::new(Some("urn:acme"), Some("acme"), "crypto")];
        let raw = format_identities(&ids, OutputFormat::Table).unwrap();
        assert!(raw.starts_with("acme:crypto"));
        assert!(raw.contains("urn:acme"));
    }
}
