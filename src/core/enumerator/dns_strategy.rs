// src/core/enumerator/dns_strategy.rs

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::TokioAsyncResolver;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::DiscoveryStrategy;
use crate::core::error::StrategyError;
use crate::core::models::{AssetAddress, DiscoveredAsset, Discovery};

/// Labels probed under the target domain.
pub const COMMON_SUBDOMAINS: &[&str] = &[
    "www", "mail", "ftp", "webmail", "blog", "m", "mobile", "api", "dev", "staging", "test", "admin", "shop",
    "store", "app", "support", "portal", "cdn", "media", "news", "forum",
];

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Queries nameservers, mail exchangers and a list of common labels.
pub struct DnsStrategy {
    resolver: TokioAsyncResolver,
}

impl DnsStrategy {
    pub fn new() -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = LOOKUP_TIMEOUT;
        opts.attempts = 1;
        Self::with_resolver(TokioAsyncResolver::tokio(ResolverConfig::default(), opts))
    }

    /// Uses a caller-built resolver, e.g. one pointed at specific nameservers.
    pub fn with_resolver(resolver: TokioAsyncResolver) -> Self {
        Self { resolver }
    }

    async fn lookup_all(&self, domain: &str) -> Result<Discovery, StrategyError> {
        let (ns, mx, common) = tokio::join!(
            lookup_nameservers(&self.resolver, domain),
            lookup_mail_exchangers(&self.resolver, domain),
            lookup_common(&self.resolver, domain),
        );

        let mut discovery = Discovery::default();
        let mut errors = Vec::new();

        for result in [ns, mx] {
            match result {
                Ok(assets) => discovery.assets.extend(assets),
                Err(e) => errors.push(e),
            }
        }
        let (common_assets, common_errors) = common;
        let probed = common_assets.len() + common_errors.len();
        for asset in common_assets.into_iter().flatten() {
            discovery.ips.extend(asset.addresses.iter().map(|a| a.ip.clone()));
            discovery.assets.push(asset);
        }

        // Every single query failing means the resolver itself is unusable.
        if errors.len() == 2 && common_errors.len() == probed {
            let first = errors.into_iter().next().map(|e| e.to_string()).unwrap_or_default();
            return Err(StrategyError::Dns(first));
        }

        discovery.ips.sort();
        discovery.ips.dedup();
        Ok(discovery)
    }
}

impl Default for DnsStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DiscoveryStrategy for DnsStrategy {
    fn name(&self) -> &str {
        "dns"
    }

    async fn discover(&self, domain: &str, cancel: &CancellationToken) -> Result<Discovery, StrategyError> {
        info!(domain, "Starting DNS subdomain discovery.");
        let discovery = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StrategyError::Cancelled),
            result = self.lookup_all(domain) => result?,
        };
        info!(assets = discovery.assets.len(), ips = discovery.ips.len(), "DNS discovery finished.");
        Ok(discovery)
    }
}

/// Strips the trailing root dot and keeps the name only when it sits under `domain`.
pub fn subdomain_of(name: &str, domain: &str) -> Option<String> {
    let name = name.trim_end_matches('.');
    name.ends_with(&format!(".{domain}")).then(|| name.to_string())
}

fn no_records(e: &ResolveError) -> bool {
    matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. })
}

async fn lookup_nameservers(resolver: &TokioAsyncResolver, domain: &str) -> Result<Vec<DiscoveredAsset>, ResolveError> {
    debug!(domain, "Looking up NS records.");
    match resolver.ns_lookup(domain).await {
        Ok(records) => Ok(records
            .iter()
            .filter_map(|ns| subdomain_of(&ns.to_utf8(), domain))
            .map(|name| DiscoveredAsset::new(name, domain, "dns-ns"))
            .collect()),
        Err(e) if no_records(&e) => Ok(Vec::new()),
        Err(e) => {
            warn!(domain, error = %e, "NS lookup failed.");
            Err(e)
        }
    }
}

async fn lookup_mail_exchangers(
    resolver: &TokioAsyncResolver,
    domain: &str,
) -> Result<Vec<DiscoveredAsset>, ResolveError> {
    debug!(domain, "Looking up MX records.");
    match resolver.mx_lookup(domain).await {
        Ok(records) => Ok(records
            .iter()
            .filter_map(|mx| subdomain_of(&mx.exchange().to_utf8(), domain))
            .map(|name| DiscoveredAsset::new(name, domain, "dns-mx"))
            .collect()),
        Err(e) if no_records(&e) => Ok(Vec::new()),
        Err(e) => {
            warn!(domain, error = %e, "MX lookup failed.");
            Err(e)
        }
    }
}

/// Resolves every common label concurrently. Returns one entry per label that
/// resolved (None when it had no A records) and the hard failures.
async fn lookup_common(
    resolver: &TokioAsyncResolver,
    domain: &str,
) -> (Vec<Option<DiscoveredAsset>>, Vec<ResolveError>) {
    let mut lookups = JoinSet::new();
    for label in COMMON_SUBDOMAINS {
        let resolver = resolver.clone();
        let name = format!("{label}.{domain}");
        let domain = domain.to_string();
        lookups.spawn(async move {
            let result = resolver.ipv4_lookup(name.as_str()).await;
            (name, domain, result)
        });
    }

    let mut found = Vec::new();
    let mut errors = Vec::new();
    while let Some(joined) = lookups.join_next().await {
        let Ok((name, domain, result)) = joined else { continue };
        match result {
            Ok(records) => {
                let asset = records.iter().fold(DiscoveredAsset::new(&name, &domain, "dns-common"), |asset, a| {
                    asset.with_address(AssetAddress::ipv4(a.to_string()))
                });
                debug!(name = %name, addresses = asset.addresses.len(), "Common label resolved.");
                found.push((!asset.addresses.is_empty()).then_some(asset));
            }
            Err(e) if no_records(&e) => found.push(None),
            Err(e) => {
                debug!(name = %name, error = %e, "Common label lookup failed.");
                errors.push(e);
            }
        }
    }
    (found, errors)
}
