// src/core/models.rs

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use strum::{Display, EnumString};

// --- Enumeration Models ---

/// A single IP address observed for a discovered asset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AssetAddress {
    pub ip: String,
    /// Address family label as reported by the source (e.g. "IPv4"), if any.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl AssetAddress {
    pub fn new(ip: impl Into<String>) -> Self {
        Self { ip: ip.into(), kind: None }
    }

    pub fn ipv4(ip: impl Into<String>) -> Self {
        Self { ip: ip.into(), kind: Some("IPv4".to_string()) }
    }
}

/// A subdomain or hostname found while enumerating a root domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiscoveredAsset {
    pub name: String,
    pub domain: String,
    pub addresses: Vec<AssetAddress>,
    /// Every method that independently reported this asset.
    pub sources: BTreeSet<String>,
}

impl DiscoveredAsset {
    pub fn new(name: impl Into<String>, domain: impl Into<String>, source: &str) -> Self {
        Self {
            name: name.into(),
            domain: domain.into(),
            addresses: Vec::new(),
            sources: BTreeSet::from([source.to_string()]),
        }
    }

    pub fn with_address(mut self, address: AssetAddress) -> Self {
        self.add_address(address);
        self
    }

    /// Adds an address unless one with the same ip is already known.
    pub fn add_address(&mut self, address: AssetAddress) {
        if !self.addresses.iter().any(|a| a.ip == address.ip) {
            self.addresses.push(address);
        }
    }

    /// Folds another report of the same asset into this one.
    ///
    /// Sources and addresses are unioned; everything else keeps the value of
    /// whoever reported the asset first.
    pub fn absorb(&mut self, other: DiscoveredAsset) {
        self.sources.extend(other.sources);
        for address in other.addresses {
            self.add_address(address);
        }
    }

    pub fn ips(&self) -> BTreeSet<&str> {
        self.addresses.iter().map(|a| a.ip.as_str()).collect()
    }
}

/// Raw output of one discovery strategy before merging.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub assets: Vec<DiscoveredAsset>,
    pub ips: Vec<String>,
}

impl Discovery {
    pub fn is_empty(&self) -> bool {
        self.assets.is_empty() && self.ips.is_empty()
    }
}

// --- Port Scanner Models ---

/// A `{state, reason}` pair as reported for hosts and ports.
///
/// All fields are optional: a host without a status element is kept with an
/// empty `StateInfo` rather than dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateInfo {
    pub state: Option<String>,
    pub reason: Option<String>,
    pub reason_ttl: Option<String>,
}

impl StateInfo {
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.reason.is_none() && self.reason_ttl.is_none()
    }

    pub fn is(&self, state: &str) -> bool {
        self.state.as_deref() == Some(state)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostAddress {
    #[serde(rename = "type")]
    pub addr_type: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hostname {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

/// Transport protocol of a scanned port.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
    Ip,
}

/// Service/version detection detail. Every field is optional and a port
/// without service detection carries the empty value.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceDetail {
    pub name: Option<String>,
    pub product: Option<String>,
    pub version: Option<String>,
    pub extra_info: Option<String>,
    pub os_type: Option<String>,
    pub detection_method: Option<String>,
    pub confidence: Option<u8>,
}

impl ServiceDetail {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScriptOutput {
    pub id: String,
    pub raw_output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanPort {
    pub id: u16,
    pub protocol: Protocol,
    pub state: StateInfo,
    pub service: ServiceDetail,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scripts: Vec<ScriptOutput>,
}

impl ScanPort {
    pub fn has_scripts(&self) -> bool {
        !self.scripts.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanHost {
    pub status: StateInfo,
    pub addresses: Vec<HostAddress>,
    pub hostnames: Vec<Hostname>,
    pub ports: Vec<ScanPort>,
}

impl ScanHost {
    pub fn is_up(&self) -> bool {
        self.status.is("up")
    }

    /// The address findings are attributed to: first IPv4, else the first of any family.
    pub fn primary_address(&self) -> Option<&str> {
        self.addresses
            .iter()
            .find(|a| a.addr_type.eq_ignore_ascii_case("ipv4"))
            .or_else(|| self.addresses.first())
            .map(|a| a.value.as_str())
    }
}

// --- Vulnerability Models ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum FindingKind {
    Cve,
    Script,
    VersionHeuristic,
}

/// One suspected vulnerability produced by the classifier.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VulnerabilityFinding {
    /// CVE id, script id, or a synthetic `potential-<product>-<version>` id.
    pub identifier: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub service_name: Option<String>,
    pub kind: FindingKind,
    /// Numeric score, only when one could be read from the evidence.
    pub severity: Option<f64>,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
}

// --- Risk Models ---

/// Risk rolled up over the targets of one project. Never persisted.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RiskSummary {
    pub average_risk: f64,
    pub max_risk: f64,
    pub target_count: usize,
    pub high_risk_target_count: usize,
}
