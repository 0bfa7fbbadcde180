use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;

use crate::error::LoadError;

use super::sniff::FormatTag;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (operation failed).
    Error,
    /// Critical error (transport or filesystem failures).
    Critical,
}

impl LoadSeverity {
    /// Severity of a failed load: transport/I-O failures are critical, the rest are errors.
    pub fn for_error(error: &LoadError) -> Self {
        if error.is_transport() {
            Self::Critical
        } else {
            Self::Error
        }
    }
}

/// Context about a load attempt.
#[derive(Debug, Clone)]
pub struct LoadContext {
    /// The source URI as supplied by the caller.
    pub uri: String,
    /// Sniffed format, once known. `None` if the load failed before sniffing.
    pub format: Option<FormatTag>,
    /// Local artifact, once fetched.
    pub artifact: Option<PathBuf>,
}

impl LoadContext {
    fn format_label(&self) -> String {
        self.format.map_or_else(|| "unknown".to_string(), |f| f.to_string())
    }

    fn artifact_label(&self) -> String {
        self.artifact
            .as_ref()
            .map_or_else(|| "-".to_string(), |p| p.display().to_string())
    }
}

/// Minimal stats reported on a successful load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadStats {
    pub rows: usize,
    pub columns: usize,
    pub bytes: u64,
    /// Sheet read, for workbook formats.
    pub sheet: Option<String>,
}

/// Observer interface for load outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait LoadObserver: Send + Sync {
    /// Called when a load succeeds.
    fn on_success(&self, _ctx: &LoadContext, _stats: &LoadStats) {}

    /// Called when a load fails.
    fn on_failure(&self, _ctx: &LoadContext, _severity: LoadSeverity, _error: &LoadError) {}

    /// Called when a load failure meets an alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &LoadError) {
        self.on_failure(ctx, severity, error)
    }
}

/// An observer that fans out callbacks to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn LoadObserver>>,
}

impl CompositeObserver {
    /// Create a new composite observer from a list of observers.
    pub fn new(observers: Vec<Arc<dyn LoadObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl LoadObserver for CompositeObserver {
    fn on_success(&self, ctx: &LoadContext, stats: &LoadStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &LoadContext, severity: LoadSeverity, error: &LoadError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &LoadError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Forwards load events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl LoadObserver for TracingObserver {
    fn on_success(&self, ctx: &LoadContext, stats: &LoadStats) {
        tracing::info!(
            uri = %ctx.uri,
            format = %ctx.format_label(),
            rows = stats.rows,
            columns = stats.columns,
            bytes = stats.bytes,
            sheet = stats.sheet.as_deref().unwrap_or("-"),
            "load ok"
        );
    }

    fn on_failure(&self, ctx: &LoadContext, severity: LoadSeverity, error: &LoadError) {
        tracing::warn!(
            uri = %ctx.uri,
            format = %ctx.format_label(),
            ?severity,
            err = %error,
            "load failed"
        );
    }

    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &LoadError) {
        tracing::error!(
            uri = %ctx.uri,
            format = %ctx.format_label(),
            artifact = %ctx.artifact_label(),
            ?severity,
            err = %error,
            "load alert"
        );
    }
}

/// Appends load events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open/write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl LoadObserver for FileObserver {
    fn on_success(&self, ctx: &LoadContext, stats: &LoadStats) {
        self.append_line(&format!(
            "{} ok format={} uri={} artifact={} rows={} columns={} sheet={}",
            unix_ts(),
            ctx.format_label(),
            ctx.uri,
            ctx.artifact_label(),
            stats.rows,
            stats.columns,
            stats.sheet.as_deref().unwrap_or("-"),
        ));
    }

    fn on_failure(&self, ctx: &LoadContext, severity: LoadSeverity, error: &LoadError) {
        self.append_line(&format!(
            "{} fail severity={:?} format={} uri={} err={}",
            unix_ts(),
            severity,
            ctx.format_label(),
            ctx.uri,
            error
        ));
    }

    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &LoadError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} format={} uri={} err={}",
            unix_ts(),
            severity,
            ctx.format_label(),
            ctx.uri,
            error
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
