// src/core/enumerator/cert_strategy.rs

use async_trait::async_trait;
use native_tls::TlsConnector;
use std::collections::BTreeSet;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::*;

use super::{certificate_name_candidate, DiscoveryStrategy};
use crate::core::error::StrategyError;
use crate::core::models::{DiscoveredAsset, Discovery};

const SOURCE: &str = "cert-san";
const IO_TIMEOUT: Duration = Duration::from_secs(5);

/// Reads the names listed in the certificate the domain serves on port 443.
#[derive(Debug, Default)]
pub struct CertificateSanStrategy;

impl CertificateSanStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DiscoveryStrategy for CertificateSanStrategy {
    fn name(&self) -> &str {
        SOURCE
    }

    async fn discover(&self, domain: &str, cancel: &CancellationToken) -> Result<Discovery, StrategyError> {
        info!(domain, "Starting certificate name discovery.");
        if cancel.is_cancelled() {
            return Err(StrategyError::Cancelled);
        }
        let target = domain.to_string();

        debug!("Spawning blocking task for TLS connection.");
        let handshake = spawn_blocking(move || fetch_certificate_names(&target));

        // The blocking task cannot be interrupted; its IO timeouts bound it.
        let names = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StrategyError::Cancelled),
            joined = handshake => joined.unwrap_or_else(|e| {
                error!(panic = %e, "Blocking certificate task panicked!");
                Err(StrategyError::Tls(format!("task panicked: {e}")))
            })?,
        };

        let discovery = discovery_from_names(names.iter().map(String::as_str), domain);
        info!(assets = discovery.assets.len(), "Certificate name discovery finished.");
        Ok(discovery)
    }
}

/// Keeps certificate names that are proper subdomains of `domain`.
pub fn discovery_from_names<'a>(names: impl IntoIterator<Item = &'a str>, domain: &str) -> Discovery {
    let unique: BTreeSet<String> = names
        .into_iter()
        .filter_map(|name| certificate_name_candidate(&name.to_lowercase(), domain))
        .collect();
    Discovery {
        assets: unique.into_iter().map(|name| DiscoveredAsset::new(name, domain, SOURCE)).collect(),
        ips: Vec::new(),
    }
}

fn fetch_certificate_names(target: &str) -> Result<Vec<String>, StrategyError> {
    // Only the names are wanted, so certificates that would not validate are still read.
    let connector = TlsConnector::builder()
        .danger_accept_invalid_certs(true)
        .danger_accept_invalid_hostnames(true)
        .build()
        .map_err(|e| StrategyError::Tls(format!("connector: {e}")))?;

    let address = (target, 443)
        .to_socket_addrs()
        .map_err(|e| StrategyError::Dns(e.to_string()))?
        .next()
        .ok_or_else(|| StrategyError::Dns(format!("no address for {target}")))?;

    debug!(target, %address, "Connecting TCP stream to port 443.");
    let stream = TcpStream::connect_timeout(&address, IO_TIMEOUT)
        .map_err(|e| StrategyError::Tls(format!("TCP connection: {e}")))?;
    stream
        .set_read_timeout(Some(IO_TIMEOUT))
        .and_then(|_| stream.set_write_timeout(Some(IO_TIMEOUT)))
        .map_err(|e| StrategyError::Tls(e.to_string()))?;

    debug!(target, "Performing TLS handshake.");
    let stream = connector
        .connect(target, stream)
        .map_err(|e| StrategyError::Tls(format!("handshake: {e}")))?;

    let Some(cert) = stream.peer_certificate().map_err(|e| StrategyError::Tls(e.to_string()))? else {
        debug!(target, "TLS connection successful, but no peer certificate provided.");
        return Ok(Vec::new());
    };
    let der = cert.to_der().map_err(|e| StrategyError::Tls(e.to_string()))?;
    let (_, x509) = parse_x509_certificate(&der).map_err(|e| StrategyError::Tls(format!("X.509 parse: {e}")))?;

    let mut names: Vec<String> = x509
        .subject()
        .iter_common_name()
        .filter_map(|cn| cn.as_str().ok())
        .map(String::from)
        .collect();

    if let Ok(Some(san)) = x509.subject_alternative_name() {
        names.extend(san.value.general_names.iter().filter_map(|name| match name {
            GeneralName::DNSName(dns) => Some(dns.to_string()),
            _ => None,
        }));
    }

    info!(subject = %x509.subject(), names = names.len(), "Parsed certificate names.");
    Ok(names)
}
