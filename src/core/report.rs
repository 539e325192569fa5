// src/core/report.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

use crate::core::classifier::Classifier;
use crate::core::enumerator::{EnumerationResult, StrategyReport};
use crate::core::models::{DiscoveredAsset, ScanHost, VulnerabilityFinding};
use crate::core::target::TargetKind;

// --- Port Scan Report ---

#[derive(Debug, Clone, Serialize)]
pub struct ScanMetadata {
    pub target: String,
    pub target_kind: TargetKind,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ScanSummary {
    pub total_hosts: usize,
    pub hosts_up: usize,
    pub total_ports: usize,
    pub vulnerability_count: usize,
}

/// How a scan with no responsive hosts should be read by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Availability {
    Responsive,
    /// A single-address target that did not answer.
    HostUnreachable,
    NoActiveHostsInSubnet,
}

/// Normalized hosts of one scan with their classification.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub metadata: ScanMetadata,
    pub summary: ScanSummary,
    pub hosts: Vec<ScanHost>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vulnerabilities: Vec<VulnerabilityFinding>,
}

impl ScanReport {
    /// Classifies `hosts` and assembles the report for `target`.
    ///
    /// # Arguments
    ///
    /// * `target` - The scanned host, address or subnet as the user gave it.
    /// * `hosts` - Normalized hosts from the scan document.
    /// * `classifier` - Classifier applied to every port of every host.
    ///
    /// # Returns
    ///
    /// A report holding the host counts and the ordered findings.
    pub fn build(target: &str, hosts: Vec<ScanHost>, classifier: &Classifier) -> Self {
        let classification = classifier.classify(&hosts);
        let summary = ScanSummary {
            total_hosts: hosts.len(),
            hosts_up: hosts.iter().filter(|h| h.is_up()).count(),
            total_ports: hosts.iter().map(|h| h.ports.len()).sum(),
            vulnerability_count: classification.total,
        };
        Self {
            metadata: ScanMetadata {
                target: target.to_string(),
                target_kind: TargetKind::classify(target),
                generated_at: Utc::now(),
            },
            summary,
            hosts,
            vulnerabilities: classification.findings,
        }
    }

    /// Tells a responsive scan apart from one where nothing answered.
    pub fn availability(&self) -> Availability {
        if self.summary.hosts_up > 0 {
            return Availability::Responsive;
        }
        match self.metadata.target_kind {
            TargetKind::Subnet => Availability::NoActiveHostsInSubnet,
            TargetKind::SingleAddress => Availability::HostUnreachable,
        }
    }
}

// --- Subdomain Enumeration Report ---

/// Where the assets of an enumeration report came from.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum EnumerationMethod {
    /// Parsed from the external enumeration tool's output.
    ToolOutput,
    /// Produced by the built-in multi-source enumerator.
    MultiSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnumerationReport {
    pub domain: String,
    pub method: EnumerationMethod,
    pub generated_at: DateTime<Utc>,
    pub assets: Vec<DiscoveredAsset>,
    pub ip_addresses: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub strategies: Vec<StrategyReport>,
}

impl EnumerationReport {
    /// Wraps an enumeration result, recording which path produced it.
    pub fn from_result(result: EnumerationResult, method: EnumerationMethod) -> Self {
        Self {
            domain: result.domain,
            method,
            generated_at: Utc::now(),
            assets: result.assets,
            ip_addresses: result.ip_addresses,
            strategies: result.strategies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{HostAddress, Protocol, ScanPort, ServiceDetail, StateInfo};

    fn up_host() -> ScanHost {
        ScanHost {
            status: StateInfo { state: Some("up".into()), ..Default::default() },
            addresses: vec![HostAddress { addr_type: "ipv4".into(), value: "10.0.0.1".into(), vendor: None }],
            hostnames: vec![],
            ports: vec![ScanPort {
                id: 21,
                protocol: Protocol::Tcp,
                state: StateInfo::default(),
                service: ServiceDetail {
                    name: Some("ftp".into()),
                    product: Some("vsftpd".into()),
                    version: Some("2.3.4".into()),
                    ..Default::default()
                },
                scripts: vec![],
            }],
        }
    }

    #[test]
    fn summary_counts_hosts_ports_and_findings() {
        let report = ScanReport::build("10.0.0.1", vec![up_host(), ScanHost::default()], &Classifier::default());
        assert_eq!(
            report.summary,
            ScanSummary { total_hosts: 2, hosts_up: 1, total_ports: 1, vulnerability_count: 1 }
        );
        assert_eq!(report.vulnerabilities[0].identifier, "potential-vsftp-2.");
        assert_eq!(report.availability(), Availability::Responsive);
    }

    #[test]
    fn no_hosts_up_depends_on_target_kind() {
        let single = ScanReport::build("10.0.0.1", vec![], &Classifier::default());
        assert_eq!(single.availability(), Availability::HostUnreachable);

        let subnet = ScanReport::build("10.0.0.0/24", vec![ScanHost::default()], &Classifier::default());
        assert_eq!(subnet.availability(), Availability::NoActiveHostsInSubnet);
        assert_eq!(subnet.summary.total_hosts, 1);
    }

    #[test]
    fn empty_findings_are_omitted_from_json() {
        let report = ScanReport::build("10.0.0.1", vec![], &Classifier::default());
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("vulnerabilities").is_none());
        assert_eq!(json["metadata"]["target_kind"], "single-address");
    }
}
