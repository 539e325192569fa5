// src/core/enumerator/crtsh_strategy.rs

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{certificate_name_candidate, DiscoveryStrategy};
use crate::core::error::StrategyError;
use crate::core::models::{DiscoveredAsset, Discovery};

const SOURCE: &str = "crt.sh";

#[derive(Debug, Deserialize)]
struct CertificateEntry {
    #[serde(default)]
    name_value: String,
}

/// Certificate transparency log search.
pub struct CrtShStrategy {
    client: reqwest::Client,
    base_url: String,
}

impl CrtShStrategy {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client, base_url: "https://crt.sh/".to_string() }
    }

    async fn fetch(&self, domain: &str) -> Result<String, StrategyError> {
        let url = format!("{}?q=%25.{}&output=json", self.base_url, domain);
        debug!(url = %url, "Querying certificate transparency logs.");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            warn!(status = %response.status(), "crt.sh returned an error status.");
            return Err(StrategyError::HttpStatus(response.status().as_u16()));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl DiscoveryStrategy for CrtShStrategy {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn discover(&self, domain: &str, cancel: &CancellationToken) -> Result<Discovery, StrategyError> {
        info!(domain, "Starting certificate transparency discovery.");
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StrategyError::Cancelled),
            body = self.fetch(domain) => body?,
        };
        let discovery = parse_crtsh_response(&body, domain)?;
        info!(assets = discovery.assets.len(), "Certificate transparency discovery finished.");
        Ok(discovery)
    }
}

/// Extracts subdomains from a crt.sh JSON answer.
///
/// Each entry's `name_value` may hold several names separated by commas or
/// newlines. Names are lowercased and wildcards unwrapped before filtering.
pub fn parse_crtsh_response(body: &str, domain: &str) -> Result<Discovery, StrategyError> {
    let entries: Vec<CertificateEntry> =
        serde_json::from_str(body).map_err(|e| StrategyError::Payload(e.to_string()))?;

    let names: BTreeSet<String> = entries
        .iter()
        .flat_map(|entry| entry.name_value.split([',', '\n']))
        .filter_map(|raw| certificate_name_candidate(&raw.to_lowercase(), domain))
        .collect();

    debug!(entries = entries.len(), unique = names.len(), "Parsed crt.sh entries.");
    Ok(Discovery {
        assets: names.into_iter().map(|name| DiscoveredAsset::new(name, domain, SOURCE)).collect(),
        ips: Vec::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_unwraps_and_dedupes_names() {
        let body = r#"[
            {"name_value": "*.example.com\nexample.com"},
            {"name_value": "API.example.com,dev.example.com"},
            {"name_value": "api.example.com"},
            {"name_value": "mail.other.org"},
            {"issuer_name": "no names here"}
        ]"#;
        let discovery = parse_crtsh_response(body, "example.com").unwrap();
        let names: Vec<_> = discovery.assets.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["api.example.com", "dev.example.com"]);
        assert!(discovery.assets.iter().all(|a| a.sources.contains("crt.sh") && a.addresses.is_empty()));
        assert!(discovery.ips.is_empty());
    }

    #[test]
    fn empty_array_is_empty_discovery() {
        assert!(parse_crtsh_response("[]", "example.com").unwrap().is_empty());
    }

    #[test]
    fn non_json_body_is_a_payload_error() {
        let result = parse_crtsh_response("<html>rate limited</html>", "example.com");
        assert!(matches!(result, Err(StrategyError::Payload(_))));
    }
}
