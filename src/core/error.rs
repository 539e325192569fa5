// src/core/error.rs

use thiserror::Error;

/// Raised when a port scanner document cannot be turned into hosts.
///
/// This is always fatal for the one document being normalized: downstream
/// classification depends on the host/port structure being intact.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("scan output is empty")]
    Empty,
    #[error("scan output is not an XML document")]
    NotXml,
    #[error("unexpected root element <{0}>, expected <nmaprun>")]
    UnexpectedRoot(String),
    #[error("XML syntax error: {0}")]
    Syntax(String),
    #[error("malformed scan document: {0}")]
    Malformed(#[from] quick_xml::DeError),
    #[error("unknown protocol '{protocol}' on port {port}")]
    UnknownProtocol { port: u16, protocol: String },
}

/// Failure of a single discovery strategy. Never escapes the enumerator.
#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("DNS lookup failed: {0}")]
    Dns(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    HttpStatus(u16),
    #[error("invalid response payload: {0}")]
    Payload(String),
    #[error("TLS error: {0}")]
    Tls(String),
    #[error("strategy cancelled")]
    Cancelled,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum EnumerationError {
    #[error("enumeration cancelled by caller")]
    Cancelled,
}

/// Signal from the external tool runner that no usable output was produced.
#[derive(Debug, Error)]
pub enum ToolFailure {
    #[error("tool failed to start: {0}")]
    FailedToStart(String),
    #[error("tool exited with status {code}: {stderr}")]
    NonZeroExit { code: i32, stderr: String },
    #[error("tool produced no output")]
    MissingOutput,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown discovery strategy '{0}'")]
    UnknownStrategy(String),
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}
