// src/core/normalizer.rs

use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;
use tracing::{debug, info};

use crate::core::error::ParseError;
use crate::core::models::{
    HostAddress, Hostname, Protocol, ScanHost, ScanPort, ScriptOutput, ServiceDetail, StateInfo,
};

// --- Scanner XML Schema ---
// Only the parts of the nmap document the model keeps. Unknown elements
// (times, os, traceroute, ...) are skipped by the deserializer.

#[derive(Debug, Deserialize)]
struct RawRun {
    #[serde(rename = "host", default)]
    hosts: Vec<RawHost>,
}

#[derive(Debug, Deserialize)]
struct RawHost {
    status: Option<RawState>,
    #[serde(rename = "address", default)]
    addresses: Vec<RawAddress>,
    hostnames: Option<RawHostnames>,
    ports: Option<RawPorts>,
}

#[derive(Debug, Deserialize)]
struct RawState {
    #[serde(rename = "@state", default)]
    state: Option<String>,
    #[serde(rename = "@reason", default)]
    reason: Option<String>,
    #[serde(rename = "@reason_ttl", default)]
    reason_ttl: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAddress {
    #[serde(rename = "@addr", default)]
    addr: String,
    #[serde(rename = "@addrtype", default)]
    addr_type: Option<String>,
    #[serde(rename = "@vendor", default)]
    vendor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawHostnames {
    #[serde(rename = "hostname", default)]
    entries: Vec<RawHostname>,
}

#[derive(Debug, Deserialize)]
struct RawHostname {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "@type", default)]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawPorts {
    #[serde(rename = "port", default)]
    ports: Vec<RawPort>,
}

#[derive(Debug, Deserialize)]
struct RawPort {
    #[serde(rename = "@protocol")]
    protocol: String,
    #[serde(rename = "@portid")]
    portid: u16,
    state: Option<RawState>,
    service: Option<RawService>,
    #[serde(rename = "script", default)]
    scripts: Vec<RawScript>,
}

#[derive(Debug, Deserialize)]
struct RawService {
    #[serde(rename = "@name", default)]
    name: Option<String>,
    #[serde(rename = "@product", default)]
    product: Option<String>,
    #[serde(rename = "@version", default)]
    version: Option<String>,
    #[serde(rename = "@extrainfo", default)]
    extra_info: Option<String>,
    #[serde(rename = "@ostype", default)]
    os_type: Option<String>,
    #[serde(rename = "@method", default)]
    method: Option<String>,
    #[serde(rename = "@conf", default)]
    conf: Option<u8>,
}

#[derive(Debug, Deserialize)]
struct RawScript {
    #[serde(rename = "@id", default)]
    id: String,
    #[serde(rename = "@output", default)]
    output: String,
}

/// Parses one port scanner XML document into the host model.
///
/// Structure problems are hard errors. An empty host list is a valid result:
/// whether that means "nothing answered" is for the caller to decide.
pub fn normalize_scan_output(document: &str) -> Result<Vec<ScanHost>, ParseError> {
    let document = document.trim();
    if document.is_empty() {
        return Err(ParseError::Empty);
    }

    let root = root_element(document)?;
    if root != "nmaprun" {
        return Err(ParseError::UnexpectedRoot(root));
    }

    debug!(bytes = document.len(), "Deserializing scan document.");
    let run: RawRun = quick_xml::de::from_str(document)?;

    let hosts = run
        .hosts
        .into_iter()
        .map(convert_host)
        .collect::<Result<Vec<_>, _>>()?;

    info!(hosts = hosts.len(), "Normalized scan output.");
    Ok(hosts)
}

/// Name of the first element in the document.
fn root_element(document: &str) -> Result<String, ParseError> {
    let mut reader = Reader::from_str(document);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.name().as_ref()).into_owned());
            }
            Ok(Event::Eof) => return Err(ParseError::NotXml),
            Ok(_) => {}
            Err(e) => return Err(ParseError::Syntax(e.to_string())),
        }
    }
}

fn convert_state(raw: Option<RawState>) -> StateInfo {
    raw.map(|s| StateInfo { state: s.state, reason: s.reason, reason_ttl: s.reason_ttl })
        .unwrap_or_default()
}

fn convert_host(raw: RawHost) -> Result<ScanHost, ParseError> {
    let addresses = raw
        .addresses
        .into_iter()
        .map(|a| HostAddress {
            // nmap omits addrtype when it is the default.
            addr_type: a.addr_type.unwrap_or_else(|| "ipv4".to_string()),
            value: a.addr,
            vendor: a.vendor,
        })
        .collect();

    let hostnames = raw
        .hostnames
        .map(|h| h.entries)
        .unwrap_or_default()
        .into_iter()
        .map(|h| Hostname { name: h.name, kind: h.kind })
        .collect();

    let ports = raw
        .ports
        .map(|p| p.ports)
        .unwrap_or_default()
        .into_iter()
        .map(convert_port)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ScanHost { status: convert_state(raw.status), addresses, hostnames, ports })
}

fn convert_port(raw: RawPort) -> Result<ScanPort, ParseError> {
    let protocol: Protocol = raw.protocol.parse().map_err(|_| ParseError::UnknownProtocol {
        port: raw.portid,
        protocol: raw.protocol.clone(),
    })?;

    let service = raw
        .service
        .map(|s| ServiceDetail {
            name: s.name,
            product: s.product,
            version: s.version,
            extra_info: s.extra_info,
            os_type: s.os_type,
            detection_method: s.method,
            confidence: s.conf,
        })
        .unwrap_or_default();

    let scripts = raw
        .scripts
        .into_iter()
        .map(|s| ScriptOutput { id: s.id, raw_output: s.output })
        .collect();

    Ok(ScanPort {
        id: raw.portid,
        protocol,
        state: convert_state(raw.state),
        service,
        scripts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCAN: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<nmaprun scanner="nmap" args="nmap -oX - -sV 10.0.0.5" version="7.94">
<scaninfo type="syn" protocol="tcp" numservices="1000" services="1-1000"/>
<host starttime="1700000000" endtime="1700000010">
<status state="up" reason="echo-reply" reason_ttl="63"/>
<address addr="10.0.0.5" addrtype="ipv4"/>
<address addr="00:11:22:33:44:55" addrtype="mac" vendor="Acme"/>
<hostnames>
<hostname name="web.example.com" type="PTR"/>
</hostnames>
<ports>
<extraports state="closed" count="997"/>
<port protocol="tcp" portid="22"><state state="open" reason="syn-ack" reason_ttl="63"/><service name="ssh" product="OpenSSH" version="6.6.1p1" extrainfo="Ubuntu" ostype="Linux" method="probed" conf="10"><cpe>cpe:/a:openbsd:openssh:6.6.1p1</cpe></service></port>
<port protocol="tcp" portid="80"><state state="open" reason="syn-ack" reason_ttl="63"/><service name="http" product="Apache httpd" version="2.4.1" method="probed" conf="10"/><script id="vulners" output="&#xa;  cpe:/a:apache:http_server:2.4.1: &#xa;    CVE-2012-0053  4.3  https://vulners.com/cve/CVE-2012-0053"><table key="cpe:/a:apache:http_server:2.4.1"></table></script><script id="http-title" output="It works"/></port>
<port protocol="udp" portid="161"><state state="open|filtered" reason="no-response" reason_ttl="0"/></port>
</ports>
<times srtt="100" rttvar="50" to="100000"/>
</host>
<host><address addr="10.0.0.6" addrtype="ipv4"/></host>
<runstats><finished time="1700000010"/><hosts up="1" down="1" total="2"/></runstats>
</nmaprun>"#;

    #[test]
    fn normalizes_hosts_ports_and_services() {
        let hosts = normalize_scan_output(SCAN).unwrap();
        assert_eq!(hosts.len(), 2);

        let web = &hosts[0];
        assert!(web.is_up());
        assert_eq!(web.status.reason.as_deref(), Some("echo-reply"));
        assert_eq!(web.addresses.len(), 2);
        assert_eq!(web.addresses[1].vendor.as_deref(), Some("Acme"));
        assert_eq!(web.primary_address(), Some("10.0.0.5"));
        assert_eq!(web.hostnames[0].name, "web.example.com");
        assert_eq!(web.ports.len(), 3);

        let ssh = &web.ports[0];
        assert_eq!(ssh.id, 22);
        assert_eq!(ssh.protocol, Protocol::Tcp);
        assert_eq!(ssh.service.product.as_deref(), Some("OpenSSH"));
        assert_eq!(ssh.service.confidence, Some(10));
        assert!(!ssh.has_scripts());

        let http = &web.ports[1];
        assert_eq!(http.scripts.len(), 2);
        assert_eq!(http.scripts[0].id, "vulners");
        assert!(http.scripts[0].raw_output.contains("CVE-2012-0053"));
    }

    #[test]
    fn port_without_service_gets_empty_service() {
        let hosts = normalize_scan_output(SCAN).unwrap();
        let snmp = &hosts[0].ports[2];
        assert_eq!(snmp.protocol, Protocol::Udp);
        assert!(snmp.service.is_empty());
        assert!(snmp.state.is("open|filtered"));
    }

    #[test]
    fn host_without_status_is_kept_with_empty_status() {
        let hosts = normalize_scan_output(SCAN).unwrap();
        let bare = &hosts[1];
        assert!(bare.status.is_empty());
        assert!(!bare.is_up());
        assert!(bare.ports.is_empty());
        assert!(bare.hostnames.is_empty());
    }

    #[test]
    fn missing_addrtype_defaults_to_ipv4() {
        let hosts = normalize_scan_output(r#"<nmaprun><host><address addr="10.1.1.1"/></host></nmaprun>"#).unwrap();
        assert_eq!(hosts[0].addresses[0].addr_type, "ipv4");
    }

    #[test]
    fn empty_scan_is_a_valid_result() {
        let hosts = normalize_scan_output(r#"<?xml version="1.0"?><nmaprun args="nmap -sn 10.9.9.0/24"><runstats><hosts up="0" down="256" total="256"/></runstats></nmaprun>"#).unwrap();
        assert!(hosts.is_empty());
    }

    #[test]
    fn malformed_input_is_a_parse_error() {
        assert!(matches!(normalize_scan_output(""), Err(ParseError::Empty)));
        assert!(matches!(normalize_scan_output("   \n"), Err(ParseError::Empty)));
        assert!(matches!(normalize_scan_output("Starting Nmap 7.94"), Err(ParseError::NotXml)));
        assert!(matches!(
            normalize_scan_output("<html><body/></html>"),
            Err(ParseError::UnexpectedRoot(root)) if root == "html"
        ));
        assert!(normalize_scan_output("<nmaprun><host></ports></nmaprun>").is_err());
    }

    #[test]
    fn unknown_protocol_is_rejected() {
        let doc = r#"<nmaprun><host><ports><port protocol="quic" portid="443"/></ports></host></nmaprun>"#;
        assert!(matches!(
            normalize_scan_output(doc),
            Err(ParseError::UnknownProtocol { port: 443, .. })
        ));
    }
}
