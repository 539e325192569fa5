// src/core/enumerator/mod.rs

// Subdomain discovery strategies and the orchestrator that fans out to them.
pub mod cert_strategy;
pub mod crtsh_strategy;
pub mod dns_strategy;
pub mod scrape_strategy;
pub mod tool_output;

use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{ReconConfig, StrategyKind};
use crate::core::error::{EnumerationError, StrategyError};
use crate::core::models::{DiscoveredAsset, Discovery};
use crate::core::target::normalize_domain;
use self::cert_strategy::CertificateSanStrategy;
use self::crtsh_strategy::CrtShStrategy;
use self::dns_strategy::DnsStrategy;
use self::scrape_strategy::PageScrapeStrategy;

/// Default per-strategy time budget.
pub const DEFAULT_STRATEGY_TIMEOUT: Duration = Duration::from_secs(15);

/// One independent way of discovering subdomains of a domain.
///
/// Implementations should stop early once `cancel` fires. The enumerator does
/// not rely on it: a strategy still running when its time budget expires is
/// dropped and its result discarded, even if work it started keeps going.
#[async_trait]
pub trait DiscoveryStrategy: Send + Sync {
    fn name(&self) -> &str;

    async fn discover(&self, domain: &str, cancel: &CancellationToken) -> Result<Discovery, StrategyError>;
}

/// How one strategy ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum StrategyOutcome {
    Completed { assets: usize, ips: usize },
    Failed { error: String },
    TimedOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct StrategyReport {
    pub strategy: String,
    #[serde(flatten)]
    pub outcome: StrategyOutcome,
    pub elapsed_ms: u64,
}

/// Merged output of one enumeration run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EnumerationResult {
    pub domain: String,
    pub assets: Vec<DiscoveredAsset>,
    pub ip_addresses: Vec<String>,
    pub strategies: Vec<StrategyReport>,
}

impl EnumerationResult {
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty() && self.ip_addresses.is_empty()
    }

    /// True when strategies ran and none of them completed.
    pub fn all_strategies_failed(&self) -> bool {
        !self.strategies.is_empty()
            && self
                .strategies
                .iter()
                .all(|s| !matches!(s.outcome, StrategyOutcome::Completed { .. }))
    }
}

/// Accumulates strategy output, keyed by exact asset name.
///
/// Merging is a set union on sources, addresses (by ip) and ips, so the
/// order in which discoveries arrive does not change the result.
#[derive(Debug, Clone, Default)]
pub struct AssetCollector {
    assets: BTreeMap<String, DiscoveredAsset>,
    ips: BTreeSet<String>,
}

impl AssetCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one strategy's discovery into the collection.
    ///
    /// An asset whose name is already present absorbs the new sources and
    /// addresses instead of being added twice.
    pub fn merge(&mut self, discovery: Discovery) {
        for asset in discovery.assets {
            match self.assets.get_mut(&asset.name) {
                Some(existing) => existing.absorb(asset),
                None => {
                    self.assets.insert(asset.name.clone(), asset);
                }
            }
        }
        self.ips.extend(discovery.ips);
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty() && self.ips.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&DiscoveredAsset> {
        self.assets.get(name)
    }

    /// Assets sorted by name and the sorted unique ip list.
    pub fn into_parts(self) -> (Vec<DiscoveredAsset>, Vec<String>) {
        (self.assets.into_values().collect(), self.ips.into_iter().collect())
    }
}

/// What became of one strategy run, as seen by its worker.
enum WorkerResult {
    Finished(Result<Discovery, StrategyError>),
    TimedOut,
}

/// Message a strategy worker hands to the collector.
struct WorkerReport {
    index: usize,
    elapsed: Duration,
    result: WorkerResult,
}

/// Runs `strategy` on its own task and waits at most `limit` for it.
///
/// The strategy gets a separate task so that one blocking inside a poll
/// cannot hold back the deadline. A result that only arrives after `limit`
/// is still reported as a timeout. Dropping the inner `JoinSet` aborts a
/// strategy that is still running.
async fn run_with_budget(
    strategy: Arc<dyn DiscoveryStrategy>,
    domain: String,
    token: CancellationToken,
    limit: Duration,
) -> WorkerResult {
    let started = Instant::now();
    let mut running = JoinSet::new();
    running.spawn(async move { strategy.discover(&domain, &token).await });

    match tokio::time::timeout(limit, running.join_next()).await {
        Ok(_) if started.elapsed() > limit => WorkerResult::TimedOut,
        Ok(Some(Ok(result))) => WorkerResult::Finished(result),
        Ok(Some(Err(e))) => WorkerResult::Finished(Err(StrategyError::Other(format!("strategy task failed: {e}")))),
        Ok(None) => WorkerResult::Finished(Err(StrategyError::Other("strategy task vanished".to_string()))),
        Err(_) => WorkerResult::TimedOut,
    }
}

/// Runs a fixed list of strategies concurrently and merges what they find.
pub struct Enumerator {
    strategies: Vec<Arc<dyn DiscoveryStrategy>>,
    strategy_timeout: Duration,
}

impl Enumerator {
    /// Creates an enumerator over `strategies` with the default time budget.
    ///
    /// # Arguments
    ///
    /// * `strategies` - Strategies to run, in reporting order.
    pub fn new(strategies: Vec<Arc<dyn DiscoveryStrategy>>) -> Self {
        Self { strategies, strategy_timeout: DEFAULT_STRATEGY_TIMEOUT }
    }

    /// Replaces the time budget each strategy gets.
    pub fn with_timeout(mut self, strategy_timeout: Duration) -> Self {
        self.strategy_timeout = strategy_timeout;
        self
    }

    /// Builds the strategies enabled in `config`, in configuration order.
    pub fn from_config(config: &ReconConfig) -> Result<Self, StrategyError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.http_timeout)
            .build()?;

        let strategies = config
            .strategies
            .iter()
            .map(|kind| -> Arc<dyn DiscoveryStrategy> {
                match kind {
                    StrategyKind::Dns => Arc::new(DnsStrategy::new()),
                    StrategyKind::CrtSh => Arc::new(CrtShStrategy::new(client.clone())),
                    StrategyKind::CertSan => Arc::new(CertificateSanStrategy::new()),
                    StrategyKind::SecurityTrails => Arc::new(PageScrapeStrategy::security_trails(client.clone())),
                    StrategyKind::Censys => Arc::new(PageScrapeStrategy::censys(client.clone())),
                }
            })
            .collect();

        Ok(Self::new(strategies).with_timeout(config.strategy_timeout))
    }

    /// Names of the configured strategies, in reporting order.
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Enumerates subdomains of `target` with every configured strategy.
    ///
    /// Each strategy runs on its own task under the per-strategy timeout.
    /// Failures and timeouts contribute nothing and are only recorded in the
    /// per-strategy reports. Returns once every strategy has finished or
    /// timed out. If `cancel` fires first, all workers are stopped and
    /// nothing collected so far is returned.
    pub async fn enumerate(
        &self,
        target: &str,
        cancel: &CancellationToken,
    ) -> Result<EnumerationResult, EnumerationError> {
        let domain = normalize_domain(target);
        info!(domain = %domain, strategies = ?self.strategy_names(), "Starting subdomain enumeration.");

        let (tx, mut rx) = mpsc::channel::<WorkerReport>(self.strategies.len().max(1));
        let mut workers = JoinSet::new();

        for (index, strategy) in self.strategies.iter().enumerate() {
            let strategy = Arc::clone(strategy);
            let tx = tx.clone();
            let domain = domain.clone();
            let token = cancel.child_token();
            let limit = self.strategy_timeout;

            workers.spawn(async move {
                let started = Instant::now();
                let result = tokio::select! {
                    _ = token.cancelled() => return,
                    result = run_with_budget(strategy, domain, token.clone(), limit) => result,
                };
                // Tell a strategy that outlived its budget to stop whatever it left running.
                token.cancel();
                let _ = tx.send(WorkerReport { index, elapsed: started.elapsed(), result }).await;
            });
        }
        drop(tx);

        let mut collector = AssetCollector::new();
        let mut reports: Vec<Option<StrategyReport>> = vec![None; self.strategies.len()];

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    workers.abort_all();
                    warn!(domain = %domain, "Enumeration cancelled, discarding partial results.");
                    return Err(EnumerationError::Cancelled);
                }
                message = rx.recv() => {
                    let Some(report) = message else { break };
                    let name = self.strategies[report.index].name().to_string();
                    let outcome = match report.result {
                        WorkerResult::Finished(Ok(discovery)) => {
                            let outcome = StrategyOutcome::Completed {
                                assets: discovery.assets.len(),
                                ips: discovery.ips.len(),
                            };
                            debug!(strategy = %name, ?outcome, "Strategy completed.");
                            collector.merge(discovery);
                            outcome
                        }
                        WorkerResult::Finished(Err(e)) => {
                            warn!(strategy = %name, error = %e, "Strategy failed.");
                            StrategyOutcome::Failed { error: e.to_string() }
                        }
                        WorkerResult::TimedOut => {
                            warn!(strategy = %name, timeout = ?self.strategy_timeout, "Strategy timed out, result discarded.");
                            StrategyOutcome::TimedOut
                        }
                    };
                    reports[report.index] = Some(StrategyReport {
                        strategy: name,
                        outcome,
                        elapsed_ms: u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
                    });
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "Strategy worker did not finish cleanly.");
            }
        }

        // A worker that panicked never reported back.
        let strategies = reports
            .into_iter()
            .enumerate()
            .map(|(index, report)| {
                report.unwrap_or_else(|| StrategyReport {
                    strategy: self.strategies[index].name().to_string(),
                    outcome: StrategyOutcome::Failed { error: "strategy task aborted".to_string() },
                    elapsed_ms: 0,
                })
            })
            .collect();

        let (assets, ip_addresses) = collector.into_parts();
        info!(domain = %domain, assets = assets.len(), ips = ip_addresses.len(), "Subdomain enumeration finished.");

        Ok(EnumerationResult { domain, assets, ip_addresses, strategies })
    }
}

/// Turns a name found in a certificate into a subdomain of `domain`.
///
/// A leading `*.` is dropped. The root domain itself and names outside it
/// are rejected.
pub fn certificate_name_candidate(raw: &str, domain: &str) -> Option<String> {
    let name = raw.trim();
    let name = name.strip_prefix("*.").unwrap_or(name);
    if name == domain || !name.ends_with(&format!(".{domain}")) {
        return None;
    }
    Some(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::AssetAddress;

    struct FixedStrategy {
        name: &'static str,
        discovery: Discovery,
    }

    #[async_trait]
    impl DiscoveryStrategy for FixedStrategy {
        fn name(&self) -> &str {
            self.name
        }

        async fn discover(&self, _domain: &str, _cancel: &CancellationToken) -> Result<Discovery, StrategyError> {
            Ok(self.discovery.clone())
        }
    }

    struct FailingStrategy;

    #[async_trait]
    impl DiscoveryStrategy for FailingStrategy {
        fn name(&self) -> &str {
            "failing"
        }

        async fn discover(&self, _domain: &str, _cancel: &CancellationToken) -> Result<Discovery, StrategyError> {
            Err(StrategyError::Other("boom".into()))
        }
    }

    fn asset(name: &str, source: &str, ips: &[&str]) -> DiscoveredAsset {
        ips.iter().fold(DiscoveredAsset::new(name, "example.com", source), |a, ip| {
            a.with_address(AssetAddress::new(*ip))
        })
    }

    fn discovery(assets: Vec<DiscoveredAsset>, ips: &[&str]) -> Discovery {
        Discovery { assets, ips: ips.iter().map(|s| s.to_string()).collect() }
    }

    type Shape = Vec<(String, BTreeSet<String>, BTreeSet<String>)>;

    fn shape(collector: AssetCollector) -> (Shape, Vec<String>) {
        let (assets, ips) = collector.into_parts();
        let shape = assets
            .into_iter()
            .map(|a| {
                let addr = a.ips().into_iter().map(String::from).collect();
                (a.name, a.sources, addr)
            })
            .collect();
        (shape, ips)
    }

    fn sample() -> Vec<Discovery> {
        vec![
            discovery(vec![asset("api.example.com", "dns-common", &["10.0.0.1"])], &["10.0.0.1"]),
            discovery(vec![asset("api.example.com", "crt.sh", &[]), asset("mx.example.com", "crt.sh", &[])], &[]),
            discovery(
                vec![asset("api.example.com", "amass", &["10.0.0.2"]), asset("mx.example.com", "dns-mx", &["10.0.0.3"])],
                &["10.0.0.2", "10.0.0.3"],
            ),
        ]
    }

    #[test]
    fn merge_unions_sources_and_addresses() {
        let mut collector = AssetCollector::new();
        for d in sample() {
            collector.merge(d);
        }
        let api = collector.get("api.example.com").unwrap();
        assert_eq!(api.sources.len(), 3);
        assert_eq!(api.ips(), BTreeSet::from(["10.0.0.1", "10.0.0.2"]));
        assert_eq!(collector.len(), 2);
    }

    #[test]
    fn merge_order_does_not_matter() {
        let all = sample();

        let mut forward = AssetCollector::new();
        for d in all.clone() {
            forward.merge(d);
        }

        let mut backward = AssetCollector::new();
        for d in all.clone().into_iter().rev() {
            backward.merge(d);
        }

        // Group A = first discovery, group B = the rest, merged into separate collectors first.
        let mut group_b = AssetCollector::new();
        for d in all[1..].iter().cloned() {
            group_b.merge(d);
        }
        let (b_assets, b_ips) = group_b.into_parts();
        let mut grouped = AssetCollector::new();
        grouped.merge(Discovery { assets: b_assets, ips: b_ips });
        grouped.merge(all[0].clone());

        let expected = shape(forward);
        assert_eq!(shape(backward), expected);
        assert_eq!(shape(grouped), expected);
    }

    #[test]
    fn re_merging_is_idempotent() {
        let mut once = AssetCollector::new();
        let mut twice = AssetCollector::new();
        for d in sample() {
            once.merge(d.clone());
            twice.merge(d.clone());
            twice.merge(d);
        }
        assert_eq!(shape(once), shape(twice));
    }

    #[test]
    fn first_writer_keeps_address_type() {
        let mut collector = AssetCollector::new();
        collector.merge(discovery(
            vec![DiscoveredAsset::new("a.example.com", "example.com", "dns").with_address(AssetAddress::ipv4("10.0.0.1"))],
            &[],
        ));
        collector.merge(discovery(vec![asset("a.example.com", "amass", &["10.0.0.1"])], &[]));
        let a = collector.get("a.example.com").unwrap();
        assert_eq!(a.addresses.len(), 1);
        assert_eq!(a.addresses[0].kind.as_deref(), Some("IPv4"));
    }

    #[test]
    fn names_differing_in_case_stay_distinct() {
        // Merge keys are exact; DNS case-insensitivity is not applied.
        let mut collector = AssetCollector::new();
        collector.merge(discovery(vec![asset("API.example.com", "crt.sh", &[])], &[]));
        collector.merge(discovery(vec![asset("api.example.com", "dns", &[])], &[]));
        assert_eq!(collector.len(), 2);
    }

    #[test]
    fn certificate_names_are_filtered() {
        assert_eq!(certificate_name_candidate("*.example.com", "example.com"), None);
        assert_eq!(certificate_name_candidate("example.com", "example.com"), None);
        assert_eq!(certificate_name_candidate("*.dev.example.com", "example.com").as_deref(), Some("dev.example.com"));
        assert_eq!(certificate_name_candidate(" www.example.com ", "example.com").as_deref(), Some("www.example.com"));
        assert_eq!(certificate_name_candidate("example.com.evil.net", "example.com"), None);
        assert_eq!(certificate_name_candidate("notexample.com", "example.com"), None);
    }

    #[tokio::test]
    async fn failures_contribute_nothing() {
        let enumerator = Enumerator::new(vec![
            Arc::new(FixedStrategy {
                name: "fixed",
                discovery: discovery(vec![asset("a.example.com", "fixed", &["10.0.0.9"])], &["10.0.0.9"]),
            }),
            Arc::new(FailingStrategy),
        ]);
        let result = enumerator.enumerate("https://www.example.com/", &CancellationToken::new()).await.unwrap();

        assert_eq!(result.domain, "example.com");
        assert_eq!(result.assets.len(), 1);
        assert_eq!(result.ip_addresses, vec!["10.0.0.9"]);
        assert_eq!(result.strategies[0].outcome, StrategyOutcome::Completed { assets: 1, ips: 1 });
        assert!(matches!(result.strategies[1].outcome, StrategyOutcome::Failed { .. }));
        assert!(!result.all_strategies_failed());
    }

    #[tokio::test]
    async fn all_failures_is_an_empty_success() {
        let enumerator = Enumerator::new(vec![Arc::new(FailingStrategy), Arc::new(FailingStrategy)]);
        let result = enumerator.enumerate("example.com", &CancellationToken::new()).await.unwrap();
        assert!(result.is_empty());
        assert!(result.all_strategies_failed());
    }

    #[tokio::test]
    async fn no_strategies_yields_empty_result() {
        let result = Enumerator::new(vec![]).enumerate("example.com", &CancellationToken::new()).await.unwrap();
        assert!(result.is_empty());
        assert!(!result.all_strategies_failed());
    }
}
