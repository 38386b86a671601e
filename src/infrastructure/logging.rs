//! Logging system configuration and initialization
//!
//! - Console and file output, each optional (at least one required)
//! - Structured JSON file logs (optional)
//! - Log files stored next to the executable unless a directory is given
//! - KST (Korea Standard Time) timestamps
//! - Previous run's log is renamed with its timestamp, old files pruned

#![allow(clippy::uninlined_format_args)]

use anyhow::{Result, anyhow};
use chrono::{DateTime, FixedOffset, Utc};
use lazy_static::lazy_static;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

const KST_OFFSET_SECS: i32 = 9 * 3600;

// Global guard to keep the log file writer alive
lazy_static! {
    static ref LOG_GUARDS: Mutex<Vec<tracing_appender::non_blocking::WorkerGuard>> = Mutex::new(Vec::new());
}

fn kst() -> Result<FixedOffset> {
    FixedOffset::east_opt(KST_OFFSET_SECS).ok_or_else(|| anyhow!("invalid KST offset"))
}

/// Custom time formatter for KST (Korea Standard Time, UTC+9)
struct KstTimeFormatter;

impl FormatTime for KstTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        let offset = FixedOffset::east_opt(KST_OFFSET_SECS).ok_or(std::fmt::Error)?;
        let kst_time = Utc::now().with_timezone(&offset);
        write!(w, "{}", kst_time.format("%Y-%m-%d %H:%M:%S%.3f %Z"))
    }
}

/// Get the log directory relative to the executable location
pub fn get_log_directory() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    exe_dir.join("logs")
}

/// Rename the previous run's log file with its timestamp
fn rotate_existing_log_file(log_dir: &Path, log_file_name: &str) -> Result<()> {
    let log_file_path = log_dir.join(log_file_name);
    if !log_file_path.exists() {
        return Ok(());
    }

    let metadata = std::fs::metadata(&log_file_path).map_err(|e| anyhow!("Failed to get log file metadata: {}", e))?;
    let file_time = metadata
        .modified()
        .or_else(|_| metadata.created())
        .unwrap_or_else(|_| std::time::SystemTime::now());

    let datetime: DateTime<Utc> = file_time.into();
    let kst_datetime = datetime.with_timezone(&kst()?);

    let file_stem = log_file_name.trim_end_matches(".log");
    let timestamped_name = format!("{}.{}.log", file_stem, kst_datetime.format("%Y%m%dT%H%M%S"));
    let timestamped_path = log_dir.join(&timestamped_name);

    std::fs::rename(&log_file_path, &timestamped_path).map_err(|e| {
        anyhow!(
            "Failed to rotate log file {} to {}: {}",
            log_file_path.display(),
            timestamped_path.display(),
            e
        )
    })?;

    Ok(())
}

/// Default filter: the configured level, with noisy dependencies held back unless tracing
fn build_env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(level).map_err(|e| anyhow!("Invalid log level '{}': {}", level, e))?;
    if level.to_lowercase().contains("trace") {
        return Ok(filter);
    }

    let quiet = [
        "sqlx::query=warn",
        "sqlx::sqlite=warn",
        "reqwest=info",
        "hyper=warn",
        "h2=warn",
        "tokio=info",
        "runtime=warn",
        "chromiumoxide=warn",
        "tungstenite=warn",
        "calamine=warn",
    ];
    for directive in quiet {
        filter = filter.add_directive(directive.parse()?);
    }
    Ok(filter.add_directive(format!("truck_data_pipeline={}", level).parse()?))
}

/// Initialize logging with custom configuration
///
/// `RUST_LOG` overrides the configured level and dependency filters:
/// ```bash
/// RUST_LOG="debug,sqlx::query=debug" truck-pipeline faq
/// ```
pub fn init_logging_with_config(config: &LoggingConfig, log_dir: Option<&Path>) -> Result<()> {
    let log_dir = log_dir.map_or_else(get_log_directory, Path::to_path_buf);
    let env_filter = build_env_filter(&config.level)?;
    let registry = Registry::default().with(env_filter);

    if config.file_output {
        std::fs::create_dir_all(&log_dir).map_err(|e| anyhow!("Failed to create log directory {:?}: {}", log_dir, e))?;
        rotate_existing_log_file(&log_dir, &config.file_name)?;
        if config.auto_cleanup_logs {
            cleanup_old_logs(&log_dir, config.max_files)?;
        }
    }

    fn console_layer<S>() -> fmt::Layer<
        S,
        fmt::format::DefaultFields,
        fmt::format::Format<fmt::format::Full, KstTimeFormatter>,
        fn() -> std::io::Stdout,
    > {
        let stdout: fn() -> std::io::Stdout = std::io::stdout;
        fmt::Layer::new()
            .with_writer(stdout)
            .with_timer(KstTimeFormatter)
            .with_target(false)
    }

    let init_result = match (config.file_output, config.console_output) {
        (true, console) => {
            let file_appender = rolling::never(&log_dir, &config.file_name);
            let (file_writer, file_guard) = non_blocking(file_appender);
            LOG_GUARDS
                .lock()
                .map_err(|_| anyhow!("log guard registry poisoned"))?
                .push(file_guard);

            // Option<Layer> is itself a layer, so console output can be switched off in place
            if config.json_format {
                let file_layer = fmt::Layer::new()
                    .json()
                    .with_writer(file_writer)
                    .with_timer(KstTimeFormatter)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_ansi(false);
                registry.with(file_layer).with(console.then(console_layer)).try_init()
            } else {
                let file_layer = fmt::Layer::new()
                    .with_writer(file_writer)
                    .with_timer(KstTimeFormatter)
                    .with_target(false)
                    .with_ansi(false);
                registry.with(file_layer).with(console.then(console_layer)).try_init()
            }
        }
        (false, true) => registry.with(console_layer()).try_init(),
        (false, false) => {
            return Err(anyhow!("No logging output configured"));
        }
    };
    init_result.map_err(|e| anyhow!("Failed to install tracing subscriber: {}", e))?;

    info!("Logging system initialized");
    info!("Log directory: {:?}", log_dir);
    info!("Log level: {}", config.level);
    info!("JSON format: {}", config.json_format);
    info!("Console output: {}", config.console_output);
    info!("File output: {}", config.file_output);
    if config.level.to_lowercase().contains("trace") {
        info!("TRACE level active - SQL and browser protocol logs will be shown");
    }

    Ok(())
}

/// Log system information for diagnostics
pub fn log_system_info() {
    info!("=== Truck Data Pipeline System Information ===");
    info!("Application version: {}", env!("CARGO_PKG_VERSION"));
    info!("Operating system: {}", std::env::consts::OS);
    info!("Architecture: {}", std::env::consts::ARCH);

    if let Ok(current_dir) = std::env::current_dir() {
        info!("Working directory: {:?}", current_dir);
    }

    info!("==============================================");
}

/// Keep the newest `max_files` log files
fn cleanup_old_logs(log_dir: &Path, max_files: u32) -> Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let mut log_files = Vec::new();
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log = path.extension().and_then(|e| e.to_str()) == Some("log");
        if path.is_file() && is_log {
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                log_files.push((path, modified));
            }
        }
    }

    // newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(max_files as usize) {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove old log file {:?}: {}", path, e);
        } else {
            removed += 1;
        }
    }
    Ok(removed)
}
