//! SARIF 2.1.0 report

use std::io::Write;

use serde::Serialize;

use spectre_lib::{Finding, FindingKind, ReportData, ScanError, Severity};

use crate::errors::CliError;

const SARIF_SCHEMA: &str =
    "https://raw.githubusercontent.com/oasis-tcs/sarif-spec/main/sarif-2.1/schema/sarif-schema-2.1.0.json";
const SARIF_VERSION: &str = "2.1.0";

#[derive(Serialize)]
struct SarifReport {
    #[serde(rename = "$schema")]
    schema: &'static str,
    version: &'static str,
    runs: Vec<SarifRun>,
}

#[derive(Serialize)]
struct SarifRun {
    tool: SarifTool,
    results: Vec<SarifResult>,
}

#[derive(Serialize)]
struct SarifTool {
    driver: SarifDriver,
}

#[derive(Serialize)]
struct SarifDriver {
    name: String,
    version: String,
    rules: Vec<SarifRule>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    notifications: Vec<SarifNotification>,
}

#[derive(Serialize)]
struct SarifRule {
    id: &'static str,
    #[serde(rename = "shortDescription")]
    short_description: SarifMessage,
    #[serde(rename = "defaultConfiguration")]
    default_configuration: SarifLevel,
}

#[derive(Serialize)]
struct SarifLevel {
    level: &'static str,
}

#[derive(Serialize)]
struct SarifMessage {
    text: String,
}

#[derive(Serialize)]
struct SarifNotification {
    id: String,
    message: SarifMessage,
    level: &'static str,
}

#[derive(Serialize)]
struct SarifResult {
    #[serde(rename = "ruleId")]
    rule_id: String,
    level: &'static str,
    message: SarifMessage,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    locations: Vec<SarifLocation>,
    properties: SarifProperties,
}

#[derive(Serialize)]
struct SarifLocation {
    #[serde(rename = "physicalLocation")]
    physical_location: SarifPhysical,
}

#[derive(Serialize)]
struct SarifPhysical {
    #[serde(rename = "artifactLocation")]
    artifact_location: SarifArtifact,
}

#[derive(Serialize)]
struct SarifArtifact {
    uri: String,
}

#[derive(Serialize)]
struct SarifProperties {
    #[serde(rename = "resourceName", skip_serializing_if = "Option::is_none")]
    resource_name: Option<String>,
    #[serde(rename = "estimatedMonthlyWaste")]
    estimated_monthly_waste: f64,
    metadata: serde_json::Value,
}

pub fn write<W: Write>(data: &ReportData, mut w: W) -> Result<(), CliError> {
    let results = data.findings.iter().map(to_result).collect::<Result<_, _>>()?;

    let report = SarifReport {
        schema: SARIF_SCHEMA,
        version: SARIF_VERSION,
        runs: vec![SarifRun {
            tool: SarifTool {
                driver: SarifDriver {
                    name: data.tool.clone(),
                    version: data.version.clone(),
                    rules: rules(),
                    notifications: notifications(&data.errors),
                },
            },
            results,
        }],
    };

    serde_json::to_writer_pretty(&mut w, &report)?;
    writeln!(w)?;
    Ok(())
}

fn to_result(finding: &Finding) -> Result<SarifResult, CliError> {
    let uri = match &finding.zone {
        Some(zone) => format!(
            "gcp://{}/{}/{}/{}",
            finding.project, zone, finding.resource_kind, finding.resource_id
        ),
        None => format!(
            "gcp://{}/{}/{}",
            finding.project, finding.resource_kind, finding.resource_id
        ),
    };

    Ok(SarifResult {
        rule_id: finding.kind.to_string(),
        level: level(finding.severity),
        message: SarifMessage {
            text: finding.message.clone(),
        },
        locations: vec![SarifLocation {
            physical_location: SarifPhysical {
                artifact_location: SarifArtifact { uri },
            },
        }],
        properties: SarifProperties {
            resource_name: finding.resource_name.clone(),
            estimated_monthly_waste: finding.estimated_monthly_waste,
            metadata: serde_json::to_value(&finding.metadata)?,
        },
    })
}

/// Severity to SARIF level: high=error, medium=warning, low=note.
fn level(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "error",
        Severity::Medium => "warning",
        Severity::Low => "note",
    }
}

fn notifications(errors: &[ScanError]) -> Vec<SarifNotification> {
    errors
        .iter()
        .enumerate()
        .map(|(i, err)| SarifNotification {
            id: format!("scanner-error-{i}"),
            message: SarifMessage {
                text: err.to_string(),
            },
            level: if err.recoverable { "warning" } else { "error" },
        })
        .collect()
}

fn rules() -> Vec<SarifRule> {
    fn rule(kind: FindingKind, text: &str, level: &'static str) -> SarifRule {
        SarifRule {
            id: kind.as_str(),
            short_description: SarifMessage {
                text: text.to_string(),
            },
            default_configuration: SarifLevel { level },
        }
    }

    vec![
        rule(FindingKind::IdleInstance, "Idle compute instance", "error"),
        rule(FindingKind::StoppedInstance, "Stopped compute instance", "error"),
        rule(FindingKind::DetachedDisk, "Detached persistent disk", "error"),
        rule(FindingKind::UnusedAddress, "Unused static IP", "warning"),
        rule(FindingKind::StaleSnapshot, "Stale snapshot", "warning"),
        rule(FindingKind::EmptyInstanceGroup, "Empty instance group", "warning"),
        rule(FindingKind::IdleCloudSql, "Idle Cloud SQL instance", "error"),
        rule(FindingKind::UnusedFirewall, "Unused firewall rule", "note"),
        rule(FindingKind::NatIdle, "Idle Cloud NAT gateway", "warning"),
        rule(FindingKind::NatLowTraffic, "Low-traffic Cloud NAT gateway", "note"),
        rule(FindingKind::FunctionIdle, "Idle Cloud Function", "warning"),
        rule(FindingKind::LbIdle, "Idle load balancer", "warning"),
        rule(FindingKind::LbUnhealthy, "Load balancer with unhealthy backends", "error"),
        rule(FindingKind::LbNoBackends, "Load balancer with no backends", "error"),
        rule(FindingKind::PubsubTopicIdle, "Idle Pub/Sub topic", "warning"),
        rule(FindingKind::PubsubTopicNoSubs, "Pub/Sub topic without subscriptions", "warning"),
        rule(FindingKind::PubsubSubscriptionIdle, "Idle Pub/Sub subscription", "warning"),
        rule(
            FindingKind::PubsubSubscriptionBacklog,
            "Pub/Sub subscription with growing backlog",
            "error",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectre_lib::analyzer::AnalysisResult;
    use spectre_lib::{ResourceKind, Summary};
    use std::collections::BTreeMap;

    fn report_with_finding() -> ReportData {
        let finding = Finding {
            kind: FindingKind::IdleInstance,
            severity: Severity::High,
            resource_kind: ResourceKind::ComputeInstance,
            resource_id: "1".to_string(),
            resource_name: Some("web-1".to_string()),
            project: "demo".to_string(),
            zone: Some("us-central1-a".to_string()),
            message: "CPU 2.0% over 7 days".to_string(),
            estimated_monthly_waste: 24.455,
            metadata: BTreeMap::new(),
        };
        let analysis = AnalysisResult {
            findings: vec![finding],
            summary: Summary::default(),
            errors: vec!["demo/persistent_disk: quota".to_string()],
        };
        ReportData::build("gcpspectre", "0.0.0-test", &["demo".to_string()], 7, 90, 1.0, analysis)
    }

    #[test]
    fn test_sarif_shape() {
        let mut buf = Vec::new();
        write(&report_with_finding(), &mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();

        assert_eq!(value["version"], "2.1.0");
        assert!(value["$schema"].as_str().unwrap().contains("sarif-2.1"));

        let run = &value["runs"][0];
        assert_eq!(run["tool"]["driver"]["name"], "gcpspectre");
        assert_eq!(run["tool"]["driver"]["rules"].as_array().unwrap().len(), 18);

        let result = &run["results"][0];
        assert_eq!(result["ruleId"], "IDLE_INSTANCE");
        assert_eq!(result["level"], "error");
        assert_eq!(
            result["locations"][0]["physicalLocation"]["artifactLocation"]["uri"],
            "gcp://demo/us-central1-a/compute_instance/1"
        );

        let notifications = run["tool"]["driver"]["notifications"].as_array().unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0]["level"], "warning");
    }

    #[test]
    fn test_level_mapping() {
        assert_eq!(level(Severity::High), "error");
        assert_eq!(level(Severity::Medium), "warning");
        assert_eq!(level(Severity::Low), "note");
    }
}
