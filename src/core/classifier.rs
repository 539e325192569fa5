// src/core/classifier.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::core::knowledge_base::{is_vulnerability_enumeration_script, VersionSignatureTable};
use crate::core::models::{FindingKind, ScanHost, ScanPort, VulnerabilityFinding};

static RE_CVE: Lazy<Regex> = Lazy::new(|| Regex::new(r"CVE-\d{4}-\d+").unwrap());

/// Findings for one scan plus the count reported as `vulnerability_count`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Classification {
    pub findings: Vec<VulnerabilityFinding>,
    pub total: usize,
}

/// Flags suspected vulnerabilities from script output and service versions.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    signatures: VersionSignatureTable,
}

impl Classifier {
    /// Creates a classifier that matches versions against `signatures`.
    pub fn new(signatures: VersionSignatureTable) -> Self {
        Self { signatures }
    }

    /// Runs both detection strategies over every port of every host.
    pub fn classify(&self, hosts: &[ScanHost]) -> Classification {
        let mut findings = Vec::new();

        for host in hosts {
            let host_address = host.primary_address();
            for port in &host.ports {
                self.classify_scripts(host_address, port, &mut findings);
                self.classify_version(host_address, port, &mut findings);
            }
        }

        let total = findings.len();
        info!(total, hosts = hosts.len(), "Vulnerability classification finished.");
        Classification { findings, total }
    }

    fn classify_scripts(&self, host: Option<&str>, port: &ScanPort, findings: &mut Vec<VulnerabilityFinding>) {
        // CVE ids already reported on this port.
        let mut seen: HashSet<&str> = HashSet::new();

        for script in &port.scripts {
            if script.id.is_empty() {
                continue;
            }

            if is_vulnerability_enumeration_script(&script.id) {
                for cve in RE_CVE.find_iter(&script.raw_output).map(|m| m.as_str()) {
                    if !seen.insert(cve) {
                        continue;
                    }
                    let severity = score_near(&script.raw_output, cve);
                    debug!(cve, port = port.id, ?severity, "CVE reported by script.");
                    findings.push(VulnerabilityFinding {
                        identifier: cve.to_string(),
                        host: host.map(String::from),
                        port: Some(port.id),
                        service_name: port.service.name.clone(),
                        kind: FindingKind::Cve,
                        severity,
                        detail: evidence_line(&script.raw_output, cve),
                        script: Some(script.id.clone()),
                    });
                }
            } else if script.id.contains("vuln") {
                debug!(script = %script.id, port = port.id, "Vulnerability script produced output.");
                findings.push(VulnerabilityFinding {
                    identifier: script.id.clone(),
                    host: host.map(String::from),
                    port: Some(port.id),
                    service_name: port.service.name.clone(),
                    kind: FindingKind::Script,
                    severity: None,
                    detail: script.raw_output.trim().to_string(),
                    script: Some(script.id.clone()),
                });
            }
        }
    }

    fn classify_version(&self, host: Option<&str>, port: &ScanPort, findings: &mut Vec<VulnerabilityFinding>) {
        let (Some(product), Some(version)) = (
            port.service.product.as_deref().filter(|p| !p.is_empty()),
            port.service.version.as_deref().filter(|v| !v.is_empty()),
        ) else {
            return;
        };

        for matched in self.signatures.matches(product, version) {
            debug!(product, version, prefix = %matched.prefix, "Version matches a vulnerable signature.");
            findings.push(VulnerabilityFinding {
                identifier: format!("potential-{}-{}", matched.product, matched.prefix),
                host: host.map(String::from),
                port: Some(port.id),
                service_name: port.service.name.clone(),
                kind: FindingKind::VersionHeuristic,
                severity: None,
                detail: format!("Potentially vulnerable {product} version {version}"),
                script: None,
            });
        }
    }
}

/// First decimal score following the CVE id on the same line, if any.
fn score_near(output: &str, cve: &str) -> Option<f64> {
    let pattern = format!(r"{}.*?(\d+\.\d+)", regex::escape(cve));
    let re = Regex::new(&pattern).ok()?;
    re.captures(output)?.get(1)?.as_str().parse().ok()
}

/// The line of script output that first mentions the CVE.
fn evidence_line(output: &str, cve: &str) -> String {
    output
        .lines()
        .find(|line| line.contains(cve))
        .map(|line| line.trim().to_string())
        .unwrap_or_else(|| cve.to_string())
}
