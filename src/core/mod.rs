// src/core/mod.rs

/// Data structures shared by every stage: discovered assets, normalized
/// scan hosts and ports, vulnerability findings and risk summaries.
pub mod models;

/// Error types returned by the library.
pub mod error;

/// Target input handling: domain normalization and subnet detection.
pub mod target;

/// Multi-source subdomain enumeration and external tool output ingestion.
pub mod enumerator;

/// Port scanner XML to the host/port model.
pub mod normalizer;

/// Known-vulnerable version signatures and script classification rules.
pub mod knowledge_base;

/// Turns normalized hosts into vulnerability findings.
pub mod classifier;

/// Project level risk rollups.
pub mod risk;

/// Serializable scan and enumeration reports.
pub mod report;
