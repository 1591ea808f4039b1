use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result, anyhow};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::paths::DataDir;

static INIT: OnceLock<()> = OnceLock::new();
static GUARD: OnceLock<WorkerGuard> = OnceLock::new();

/// Rotate when the log exceeds 10 MiB; keep three rotated files.
const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_ROTATED: u32 = 3;

/// Initialize JSON file logging under the data directory.
///
/// Log level comes from `ORANGE_LOG_LEVEL` (error|warn|info|debug), default
/// info. Output is one JSON object per line with timestamp, level, target
/// (the component) and message plus structured fields.
pub fn init(data: &DataDir) -> Result<()> {
    if INIT.get().is_some() {
        return Ok(());
    }

    init_inner(data)?;
    let _ = INIT.set(());
    Ok(())
}

fn init_inner(data: &DataDir) -> Result<()> {
    let log_path = data.log_file();
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory at {}", parent.display()))?;
    }

    rotate_if_needed(&log_path)?;

    let (directory, file_name) = split_path(&log_path)?;
    let file_appender = rolling::never(directory, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .json()
                .flatten_event(true)
                .with_writer(non_blocking)
                .with_ansi(false),
        )
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}

fn env_filter() -> EnvFilter {
    let level = std::env::var("ORANGE_LOG_LEVEL").unwrap_or_default();
    let level = match level.as_str() {
        "error" | "warn" | "info" | "debug" => level,
        _ => "info".to_string(),
    };
    EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Size-based rotation: orange.log -> .1 -> .2 -> .3, oldest dropped.
fn rotate_if_needed(log_path: &Path) -> Result<()> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(()),
    };
    if size < MAX_LOG_BYTES {
        return Ok(());
    }

    for n in (1..KEEP_ROTATED).rev() {
        let from = rotated_name(log_path, n);
        let to = rotated_name(log_path, n + 1);
        if from.exists() {
            let _ = fs::rename(&from, &to);
        }
    }
    fs::rename(log_path, rotated_name(log_path, 1))
        .with_context(|| format!("Failed to rotate log file {}", log_path.display()))?;
    Ok(())
}

/// All log files, current first, for the `log` command.
pub fn log_files(data: &DataDir) -> Vec<PathBuf> {
    let current = data.log_file();
    let mut files = vec![current.clone()];
    for n in 1..=KEEP_ROTATED {
        files.push(rotated_name(&current, n));
    }
    files.retain(|p| p.exists());
    files
}

fn rotated_name(log_path: &Path, n: u32) -> PathBuf {
    let mut name = log_path.as_os_str().to_os_string();
    name.push(format!(".{}", n));
    PathBuf::from(name)
}

fn split_path(path: &Path) -> Result<(PathBuf, &str)> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("Invalid log file name"))?;

    let dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    Ok((dir, file_name))
}
