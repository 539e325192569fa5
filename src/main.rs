// src/main.rs

use color_eyre::eyre::{bail, eyre, Result};
use std::env;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use vanguard_recon::config::ReconConfig;
use vanguard_recon::core::classifier::Classifier;
use vanguard_recon::core::enumerator::tool_output::ingest_tool_output;
use vanguard_recon::core::enumerator::Enumerator;
use vanguard_recon::core::error::ToolFailure;
use vanguard_recon::core::normalizer::normalize_scan_output;
use vanguard_recon::core::report::{Availability, EnumerationMethod, EnumerationReport, ScanReport};
use vanguard_recon::logging::Logging;

const USAGE: &str = "usage:
  vanguard-recon enum <domain> [tool-output.jsonl]
  vanguard-recon nmap <target> <scan.xml>";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let logging = Logging::initialize()?;
    info!(log = %logging.log_path.display(), "Logging initialized.");

    let args: Vec<String> = env::args().skip(1).collect();
    match args.iter().map(String::as_str).collect::<Vec<_>>().as_slice() {
        ["enum", domain] => run_enumeration(domain, None).await,
        ["enum", domain, tool_output] => run_enumeration(domain, Some(*tool_output)).await,
        ["nmap", target, file] => run_scan_report(target, file).await,
        _ => bail!("{USAGE}"),
    }
}

async fn run_enumeration(domain: &str, tool_output: Option<&str>) -> Result<()> {
    let config = ReconConfig::from_env()?;
    let enumerator = Enumerator::from_config(&config)?;

    // Ctrl-C abandons the run without printing partial results.
    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling enumeration.");
            on_interrupt.cancel();
        }
    });

    let report = match tool_output {
        Some(path) => {
            let output = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ToolFailure::FailedToStart(format!("{path}: {e}")));
            ingest_tool_output(output, domain, &enumerator, &cancel).await?
        }
        None => {
            let result = enumerator.enumerate(domain, &cancel).await?;
            if result.all_strategies_failed() {
                warn!(domain = %result.domain, "Every discovery strategy failed.");
            }
            EnumerationReport::from_result(result, EnumerationMethod::MultiSource)
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn run_scan_report(target: &str, file: &str) -> Result<()> {
    let document = tokio::fs::read_to_string(file)
        .await
        .map_err(|e| eyre!("cannot read {file}: {e}"))?;
    let hosts = normalize_scan_output(&document)?;
    let report = ScanReport::build(target, hosts, &Classifier::default());

    match report.availability() {
        Availability::Responsive => {}
        other => warn!(target, availability = %other, "No responsive hosts in scan."),
    }

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
