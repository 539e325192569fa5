// src/core/enumerator/tool_output.rs

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AssetCollector, EnumerationResult, Enumerator};
use crate::core::error::{EnumerationError, ToolFailure};
use crate::core::models::{AssetAddress, DiscoveredAsset, Discovery};
use crate::core::report::{EnumerationMethod, EnumerationReport};
use crate::core::target::normalize_domain;

/// Source recorded for tool lines that do not name their own sources.
pub const DEFAULT_TOOL_SOURCE: &str = "amass";

#[derive(Debug, Deserialize)]
struct ToolLine {
    #[serde(default)]
    name: String,
    #[serde(default)]
    sources: Vec<String>,
    #[serde(default)]
    addresses: Vec<ToolAddress>,
}

#[derive(Debug, Deserialize)]
struct ToolAddress {
    #[serde(default)]
    ip: String,
}

/// Parses JSON-lines output of an external enumeration tool.
///
/// Blank lines, lines that are not JSON and records without a name are
/// skipped. An asset named on several lines is merged.
pub fn parse_enumeration_output(output: &str, domain: &str) -> Discovery {
    let mut assets = Vec::new();
    let mut ips = Vec::new();
    let mut skipped = 0usize;

    for (number, line) in output.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: ToolLine = match serde_json::from_str(line) {
            Ok(record) => record,
            Err(e) => {
                warn!(line = number + 1, error = %e, "Skipping invalid tool output line.");
                skipped += 1;
                continue;
            }
        };
        if record.name.is_empty() {
            skipped += 1;
            continue;
        }

        let mut asset = DiscoveredAsset::new(record.name, domain, DEFAULT_TOOL_SOURCE);
        if !record.sources.is_empty() {
            asset.sources = record.sources.into_iter().collect();
        }
        for address in record.addresses.into_iter().filter(|a| !a.ip.is_empty()) {
            ips.push(address.ip.clone());
            asset.add_address(AssetAddress::new(address.ip));
        }
        assets.push(asset);
    }

    let mut collector = AssetCollector::new();
    collector.merge(Discovery { assets, ips });
    let (assets, ips) = collector.into_parts();
    debug!(assets = assets.len(), ips = ips.len(), skipped, "Parsed tool output.");
    Discovery { assets, ips }
}

/// Turns the result of running the external tool into an enumeration report.
///
/// Tool output is used as-is when the tool ran, even when it found nothing.
/// Any tool failure falls back to the built-in multi-source enumerator.
pub async fn ingest_tool_output(
    tool_result: Result<String, ToolFailure>,
    target: &str,
    enumerator: &Enumerator,
    cancel: &CancellationToken,
) -> Result<EnumerationReport, EnumerationError> {
    match tool_result {
        Ok(output) => {
            let domain = normalize_domain(target);
            let discovery = parse_enumeration_output(&output, &domain);
            info!(domain = %domain, assets = discovery.assets.len(), "Using external tool output.");
            let result = EnumerationResult {
                domain,
                assets: discovery.assets,
                ip_addresses: discovery.ips,
                strategies: Vec::new(),
            };
            Ok(EnumerationReport::from_result(result, EnumerationMethod::ToolOutput))
        }
        Err(failure) => {
            warn!(target, error = %failure, "External tool failed, falling back to multi-source enumeration.");
            let result = enumerator.enumerate(target, cancel).await?;
            Ok(EnumerationReport::from_result(result, EnumerationMethod::MultiSource))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = r#"{"name":"api.example.com","domain":"example.com","addresses":[{"ip":"10.0.0.1","cidr":"10.0.0.0/24","asn":64500}],"tag":"cert","sources":["CertSpotter","DNS"]}
this is not json
{"name":"","sources":["DNS"]}

{"name":"www.example.com"}
{"name":"api.example.com","addresses":[{"ip":"10.0.0.2"},{"ip":""}],"sources":["Brute Forcing"]}
"#;

    #[test]
    fn parses_lines_and_skips_garbage() {
        let discovery = parse_enumeration_output(OUTPUT, "example.com");
        assert_eq!(discovery.assets.len(), 2);

        let api = &discovery.assets[0];
        assert_eq!(api.name, "api.example.com");
        assert_eq!(api.domain, "example.com");
        assert_eq!(api.sources.len(), 3);
        assert_eq!(api.addresses.len(), 2);

        let www = &discovery.assets[1];
        assert!(www.sources.contains(DEFAULT_TOOL_SOURCE));
        assert!(www.addresses.is_empty());

        assert_eq!(discovery.ips, vec!["10.0.0.1", "10.0.0.2"]);
    }

    #[test]
    fn empty_output_is_empty_discovery() {
        assert!(parse_enumeration_output("", "example.com").is_empty());
        assert!(parse_enumeration_output("\n\n", "example.com").is_empty());
    }

    #[tokio::test]
    async fn successful_tool_run_is_used_even_when_empty() {
        let enumerator = Enumerator::new(vec![]);
        let report = ingest_tool_output(Ok(String::new()), "https://www.example.com", &enumerator, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.method, EnumerationMethod::ToolOutput);
        assert_eq!(report.domain, "example.com");
        assert!(report.assets.is_empty());
    }
}
