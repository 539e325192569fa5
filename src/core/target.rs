// src/core/target.rs

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, warn};
use url::Url;

static RE_SUBNET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,3}\.){3}\d{1,3}/\d{1,2}$").unwrap());

/// Reduces user input to a bare domain before enumeration.
///
/// Strips the scheme, path, query, port, a leading `www.` label and the
/// trailing root dot. Input that cannot be reduced is returned unchanged;
/// this never fails.
pub fn normalize_domain(input: &str) -> String {
    match reduce_to_domain(input) {
        Some(domain) => {
            debug!(input, domain = %domain, "Normalized domain.");
            domain
        }
        None => {
            warn!(input, "Could not normalize domain, using input as-is.");
            input.to_string()
        }
    }
}

fn reduce_to_domain(input: &str) -> Option<String> {
    let trimmed = input.trim();
    let lowered = trimmed.to_ascii_lowercase();
    let host = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        Url::parse(trimmed).ok()?.host_str()?.to_string()
    } else {
        let authority = trimmed.split(['/', '?', '#']).next()?;
        match authority.strip_prefix('[') {
            // IPv6 literal: any port follows the closing bracket.
            Some(rest) => {
                let (address, _) = rest.split_once(']')?;
                if address.is_empty() {
                    return None;
                }
                format!("[{address}]")
            }
            None => authority.split(':').next()?.to_string(),
        }
    };
    let domain = host.strip_prefix("www.").unwrap_or(&host);
    let domain = domain.strip_suffix('.').unwrap_or(domain);
    if domain.is_empty() {
        None
    } else {
        Some(domain.to_string())
    }
}

/// Shape of a port scan target: a CIDR block or a single address/host.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum TargetKind {
    Subnet,
    SingleAddress,
}

impl TargetKind {
    pub fn classify(target: &str) -> Self {
        if RE_SUBNET.is_match(target.trim()) {
            TargetKind::Subnet
        } else {
            TargetKind::SingleAddress
        }
    }
}
