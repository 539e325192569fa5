// src/core/enumerator/scrape_strategy.rs

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::USER_AGENT;
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::DiscoveryStrategy;
use crate::core::error::StrategyError;
use crate::core::models::{DiscoveredAsset, Discovery};

/// Some public pages refuse non-browser agents.
const BROWSER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Fetches a public web page about the domain and scrapes hostnames out of it.
pub struct PageScrapeStrategy {
    name: &'static str,
    client: reqwest::Client,
    url_template: &'static str,
}

impl PageScrapeStrategy {
    pub fn security_trails(client: reqwest::Client) -> Self {
        Self { name: "securitytrails", client, url_template: "https://securitytrails.com/domain/{domain}/dns" }
    }

    pub fn censys(client: reqwest::Client) -> Self {
        Self {
            name: "censys",
            client,
            url_template: "https://search.censys.io/certificates/_search?q=%2540raw.names%253A{domain}",
        }
    }

    fn url_for(&self, domain: &str) -> String {
        self.url_template.replace("{domain}", domain)
    }

    async fn fetch(&self, domain: &str) -> Result<String, StrategyError> {
        let url = self.url_for(domain);
        debug!(source = self.name, url = %url, "Fetching page.");

        let response = self.client.get(&url).header(USER_AGENT, BROWSER_AGENT).send().await?;
        if !response.status().is_success() {
            warn!(source = self.name, status = %response.status(), "Page returned an error status.");
            return Err(StrategyError::HttpStatus(response.status().as_u16()));
        }
        let body = response.text().await?;
        debug!(source = self.name, bytes = body.len(), "Page body received.");
        Ok(body)
    }
}

#[async_trait]
impl DiscoveryStrategy for PageScrapeStrategy {
    fn name(&self) -> &str {
        self.name
    }

    async fn discover(&self, domain: &str, cancel: &CancellationToken) -> Result<Discovery, StrategyError> {
        info!(source = self.name, domain, "Starting page scrape discovery.");
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StrategyError::Cancelled),
            body = self.fetch(domain) => body?,
        };

        let assets: Vec<DiscoveredAsset> = extract_subdomains(&body, domain)
            .into_iter()
            .map(|name| DiscoveredAsset::new(name, domain, self.name))
            .collect();
        info!(source = self.name, assets = assets.len(), "Page scrape discovery finished.");
        Ok(Discovery { assets, ips: Vec::new() })
    }
}

/// Every `<label>.<domain>` occurrence in `text`, one level below the domain.
pub fn extract_subdomains(text: &str, domain: &str) -> BTreeSet<String> {
    let pattern = format!(r"([a-zA-Z0-9][-a-zA-Z0-9]*)\.{}\b", regex::escape(domain));
    let Ok(re) = Regex::new(&pattern) else {
        warn!(domain, "Could not build subdomain pattern.");
        return BTreeSet::new();
    };
    re.captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|label| format!("{}.{}", label.as_str(), domain))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scrapes_labels_from_markup() {
        let html = r#"<td><a href="/domain/api.example.com">api.example.com</a></td>
            <td>mail-01.example.com</td><td>example.com</td><td>cdn.example.org</td>
            <td>deep.shop.example.com</td>"#;
        let found = extract_subdomains(html, "example.com");
        let found: Vec<_> = found.iter().map(String::as_str).collect();
        assert_eq!(found, vec!["api.example.com", "mail-01.example.com", "shop.example.com"]);
    }

    #[test]
    fn dots_in_the_domain_are_literal() {
        assert!(extract_subdomains("www.exampleXcom", "example.com").is_empty());
    }

    #[test]
    fn builds_source_urls() {
        let client = reqwest::Client::new();
        assert_eq!(
            PageScrapeStrategy::security_trails(client.clone()).url_for("example.com"),
            "https://securitytrails.com/domain/example.com/dns"
        );
        let censys = PageScrapeStrategy::censys(client);
        assert_eq!(censys.name(), "censys");
        assert!(censys.url_for("example.com").ends_with("%253Aexample.com"));
    }
}
