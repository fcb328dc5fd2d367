//! Process-wide log sink for repository diagnostics.
//!
//! # Responsibility
//! - Route `log` records from the repository layer into size-rotated files.
//! - Capture panics as single-line, metadata-only records.
//!
//! # Invariants
//! - At most one sink per process; a second call with the same level and
//!   directory is a no-op, any other combination is rejected.
//! - Setup failures come back as `Err`, never as a panic.
//! - Records carry identifiers and counts only, never bound values.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::panic::PanicHookInfo;
use std::path::{Path, PathBuf};

const LOG_BASENAME: &str = "repokit";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 5;
const PANIC_PAYLOAD_LIMIT: usize = 160;

static ACTIVE_SINK: OnceCell<ActiveSink> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct ActiveSink {
    target: SinkTarget,
    _handle: LoggerHandle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct SinkTarget {
    level: &'static str,
    dir: PathBuf,
}

impl SinkTarget {
    fn parse(level: &str, dir: &Path) -> Result<Self, String> {
        Ok(Self {
            level: parse_level(level)?,
            dir: parse_dir(dir)?,
        })
    }

    fn conflict_with(&self, requested: &SinkTarget) -> Option<String> {
        if self.dir != requested.dir {
            return Some(format!(
                "log sink already writes to `{}`; refusing to switch to `{}`",
                self.dir.display(),
                requested.dir.display()
            ));
        }
        if self.level != requested.level {
            return Some(format!(
                "log sink already runs at `{}`; refusing to switch to `{}`",
                self.level, requested.level
            ));
        }
        None
    }

    fn start(&self) -> Result<LoggerHandle, String> {
        std::fs::create_dir_all(&self.dir).map_err(|err| {
            format!("cannot create log directory `{}`: {err}", self.dir.display())
        })?;

        Logger::try_with_str(self.level)
            .map_err(|err| format!("invalid log level `{}`: {err}", self.level))?
            .log_to_file(
                FileSpec::default()
                    .directory(self.dir.as_path())
                    .basename(LOG_BASENAME),
            )
            .rotate(
                Criterion::Size(ROTATE_AT_BYTES),
                Naming::Numbers,
                Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
            )
            .write_mode(WriteMode::BufferAndFlush)
            .append()
            .format_for_files(flexi_logger::detailed_format)
            .start()
            .map_err(|err| format!("cannot start log sink: {err}"))
    }
}

/// Starts file logging at `level` under the absolute directory `log_dir`.
///
/// # Errors
/// - Unknown level, relative or empty directory, or an uncreatable directory.
/// - A sink is already active with a different level or directory.
pub fn init_logging(level: &str, log_dir: impl AsRef<Path>) -> Result<(), String> {
    let requested = SinkTarget::parse(level, log_dir.as_ref())?;

    let sink = ACTIVE_SINK.get_or_try_init(|| -> Result<ActiveSink, String> {
        let handle = requested.start()?;
        install_panic_hook();
        info!(
            "event=logging_init module=logging status=ok level={} log_dir={} version={} build={}",
            requested.level,
            requested.dir.display(),
            env!("CARGO_PKG_VERSION"),
            if cfg!(debug_assertions) { "debug" } else { "release" }
        );
        Ok(ActiveSink {
            target: requested.clone(),
            _handle: handle,
        })
    })?;

    match sink.target.conflict_with(&requested) {
        Some(conflict) => Err(conflict),
        None => Ok(()),
    }
}

/// `(level, directory)` of the active sink, if any.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE_SINK
        .get()
        .map(|sink| (sink.target.level, sink.target.dir.clone()))
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn parse_level(level: &str) -> Result<&'static str, String> {
    let level = level.trim().to_ascii_lowercase();
    ["trace", "debug", "info", "warn", "error"]
        .into_iter()
        .find(|known| *known == level)
        .or((level == "warning").then_some("warn"))
        .ok_or_else(|| format!("unknown log level `{level}`"))
}

fn parse_dir(dir: &Path) -> Result<PathBuf, String> {
    if dir.as_os_str().is_empty() {
        return Err("log directory is empty".to_string());
    }
    if !dir.is_absolute() {
        return Err(format!(
            "log directory must be absolute, got `{}`",
            dir.display()
        ));
    }
    Ok(dir.to_path_buf())
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let location = panic
            .location()
            .map(|at| format!("{}:{}", at.file(), at.line()))
            .unwrap_or_else(|| "unknown".to_string());
        error!(
            "event=panic_captured module=logging status=error location={} payload={}",
            location,
            panic_summary(panic)
        );
        previous(panic);
    }));
}

fn panic_summary(panic: &PanicHookInfo<'_>) -> String {
    let payload = panic.payload();
    let text = payload
        .downcast_ref::<&str>()
        .map(|text| (*text).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    single_line(&text, PANIC_PAYLOAD_LIMIT)
}

/// Flattens line breaks and caps the result at `limit` characters.
fn single_line(text: &str, limit: usize) -> String {
    let flat = text.replace(['\n', '\r'], " ");
    let mut capped: String = flat.chars().take(limit).collect();
    if flat.chars().count() > limit {
        capped.push_str("...");
    }
    capped
}
