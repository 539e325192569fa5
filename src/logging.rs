// src/logging.rs

use color_eyre::eyre::{eyre, Result};
use directories::ProjectDirs;
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use time::macros::format_description;
use tracing_error::ErrorLayer;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::{self, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase().to_string();
    pub static ref LOG_ENV: String = format!("{}_LOGLEVEL", PROJECT_NAME.clone());
    pub static ref LOG_FILE: String = format!("{}.log", env!("CARGO_PKG_NAME"));
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "vanguard-rs", env!("CARGO_PKG_NAME"))
}

pub fn get_data_dir() -> PathBuf {
    if let Some(proj_dirs) = project_directory() {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    }
}

/// Filter directive: `RUST_LOG`, then the crate's own level variable, then `info` for this crate.
pub fn filter_directive<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    set("RUST_LOG")
        .or_else(|| set(LOG_ENV.as_str()))
        .unwrap_or_else(|| format!("{}=info", env!("CARGO_CRATE_NAME")))
}

/// Handle to the installed file logger.
#[derive(Debug)]
pub struct Logging {
    pub log_path: PathBuf,
}

impl Logging {
    /// Logs to a file in the platform data directory.
    pub fn initialize() -> Result<Self> {
        Self::initialize_in(&get_data_dir())
    }

    /// Logs to `LOG_FILE` inside `directory`, truncating any previous log.
    pub fn initialize_in(directory: &Path) -> Result<Self> {
        std::fs::create_dir_all(directory)?;
        let log_path = directory.join(LOG_FILE.as_str());
        let log_file = std::fs::File::create(&log_path)?;

        let directive = filter_directive(|key| std::env::var(key).ok());
        let timer = LocalTime::new(format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]"));

        let file_subscriber = tracing_subscriber::fmt::layer()
            .with_writer(log_file)
            .with_timer(timer)
            .with_target(false)
            .with_ansi(false)
            .with_filter(EnvFilter::new(directive));

        tracing_subscriber::registry()
            .with(file_subscriber)
            .with(ErrorLayer::default())
            .try_init()
            .map_err(|e| eyre!("failed to install log subscriber: {e}"))?;

        Ok(Self { log_path })
    }
}
