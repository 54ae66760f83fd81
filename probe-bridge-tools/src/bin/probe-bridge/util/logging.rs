use anyhow::Context;
use probe_bridge::SwdLogLevel;
use serde::{Deserialize, Serialize};
use std::{
    cmp::Reverse,
    fs::{self, File},
    path::{Path, PathBuf},
};
use time::OffsetDateTime;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Log files kept in a log folder, newest first.
const MAX_LOG_FILES: usize = 20;

/// Keeps the file writer alive until the program ends.
pub struct FileLoggerGuard {
    _worker: WorkerGuard,
    path: PathBuf,
}

impl Drop for FileLoggerGuard {
    fn drop(&mut self) {
        tracing::info!("Wrote log to {}", self.path.display());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[clap(rename_all = "UPPER")]
#[serde(rename_all = "UPPERCASE")]
pub enum LevelFilter {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LevelFilter> for tracing::level_filters::LevelFilter {
    fn from(level: LevelFilter) -> Self {
        match level {
            LevelFilter::Off => Self::OFF,
            LevelFilter::Error => Self::ERROR,
            LevelFilter::Warn => Self::WARN,
            LevelFilter::Info => Self::INFO,
            LevelFilter::Debug => Self::DEBUG,
            LevelFilter::Trace => Self::TRACE,
        }
    }
}

/// Where the log file goes.
///
/// `--log-file` wins over `--log-to-folder`, which wins over the configured `log_file`. A
/// configured path naming an existing directory is used like a log folder.
pub fn log_file_location(
    explicit: Option<&Path>,
    to_folder: bool,
    configured: Option<&Path>,
) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        return Ok(Some(path.to_path_buf()));
    }

    let folder = match configured {
        _ if to_folder => default_log_folder()?,
        Some(path) if path.is_dir() => path.to_path_buf(),
        Some(path) => return Ok(Some(path.to_path_buf())),
        None => return Ok(None),
    };

    let path = timestamped_log_file(&folder)?;
    prune_logs(&folder, MAX_LOG_FILES)?;
    Ok(Some(path))
}

fn default_log_folder() -> anyhow::Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("rs", "probe-bridge", "probe-bridge")
        .context("The application storage directory could not be determined.")?;
    Ok(project_dirs.data_dir().join("logs"))
}

/// A new log file path in `folder`, named after the current time in milliseconds.
fn timestamped_log_file(folder: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(folder)
        .with_context(|| format!("{} could not be created", folder.display()))?;

    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    Ok(folder.join(format!("{millis}.log")))
}

/// Deletes all but the `keep` most recent `.log` files in `folder`.
fn prune_logs(folder: &Path, keep: usize) -> anyhow::Result<()> {
    let mut logs: Vec<_> = fs::read_dir(folder)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            if path.extension().is_some_and(|e| e == "log") {
                let modified = fs::metadata(&path).ok()?.modified().ok()?;
                Some((path, modified))
            } else {
                None
            }
        })
        .collect();

    logs.sort_unstable_by_key(|(_, modified)| Reverse(*modified));

    for (path, _) in logs.iter().skip(keep) {
        fs::remove_file(path)?;
    }
    Ok(())
}

/// The filter for console output.
///
/// An explicit level from the command line or the configuration wins over `RUST_LOG`.
fn console_filter(level: Option<LevelFilter>) -> EnvFilter {
    match level {
        Some(level) => EnvFilter::builder()
            .with_default_directive(tracing::level_filters::LevelFilter::from(level).into())
            .parse_lossy(""),
        None => EnvFilter::builder()
            .with_default_directive(tracing::level_filters::LevelFilter::WARN.into())
            .from_env_lossy(),
    }
}

/// Installs the console logger and, with a `log_path`, a JSON file logger.
///
/// The file receives everything down to TRACE. The SWD transport takes its log level
/// from the most verbose destination when it is selected, so writing a log file
/// always records the SWD payload.
pub fn setup_logging(
    log_path: Option<PathBuf>,
    console_level: Option<LevelFilter>,
) -> anyhow::Result<Option<FileLoggerGuard>> {
    let console = tracing_subscriber::fmt::layer()
        .compact()
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(console_filter(console_level));

    let guard = match log_path {
        Some(path) => {
            let file = File::create(&path).with_context(|| {
                format!("The log file {} could not be created.", path.display())
            })?;
            let (writer, worker) = tracing_appender::non_blocking::NonBlockingBuilder::default()
                .lossy(false)
                .finish(file);

            let file_layer = tracing_subscriber::fmt::layer()
                .json()
                .with_file(true)
                .with_line_number(true)
                .with_writer(writer)
                .with_filter(tracing::level_filters::LevelFilter::TRACE);

            tracing_subscriber::registry()
                .with(console)
                .with(file_layer)
                .init();

            tracing::info!("Writing log to {}", path.display());
            Some(FileLoggerGuard {
                _worker: worker,
                path,
            })
        }
        None => {
            tracing_subscriber::registry().with(console).init();
            None
        }
    };

    tracing::debug!(
        "SWD transports selected from now on log at level '{}'",
        SwdLogLevel::inherited()
    );

    Ok(guard)
}
