//! Observability hooks for load passes.
//!
//! Implementors can record metrics, logs, or trigger alerts while a source
//! is being loaded into a container.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::MprError;

/// Severity classification used for observer callbacks and alerting
/// thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LoadSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (the load failed).
    Error,
    /// Critical error (typically I/O or other infrastructure failures).
    Critical,
}

/// Context about one load.
#[derive(Debug, Clone)]
pub struct LoadContext {
    /// Destination container path, when loading to a file.
    pub dest: Option<PathBuf>,
}

impl LoadContext {
    fn dest_display(&self) -> String {
        self.dest
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<writer>".to_owned())
    }
}

/// Stats reported on successful load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadStats {
    /// Rows written to the container.
    pub rows: u64,
    /// Wall-clock seconds the load took.
    pub secs: f64,
}

/// Observer interface for load outcomes and progress.
pub trait LoadObserver: Send + Sync {
    /// Called when a named pass (`"intuit_rows"`, `"load"`, ...) begins.
    fn on_pass_started(&self, _ctx: &LoadContext, _pass: &str) {}

    /// Called periodically (per flushed block) with the running row count.
    fn on_rows_loaded(&self, _ctx: &LoadContext, _rows: u64) {}

    /// Called when the load succeeds.
    fn on_success(&self, _ctx: &LoadContext, _stats: LoadStats) {}

    /// Called when the load fails.
    fn on_failure(&self, _ctx: &LoadContext, _severity: LoadSeverity, _error: &MprError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &MprError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Map an error to the severity reported to observers.
pub(crate) fn severity_for_error(e: &MprError) -> LoadSeverity {
    match e {
        MprError::Io(_) => LoadSeverity::Critical,
        MprError::Csv(err) => match err.kind() {
            csv::ErrorKind::Io(_) => LoadSeverity::Critical,
            _ => LoadSeverity::Error,
        },
        MprError::CorruptContainer { .. }
        | MprError::SchemaMismatch { .. }
        | MprError::InsufficientSample { .. }
        | MprError::MetaEncode(_) => LoadSeverity::Error,
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
    fn on_pass_started(&self, ctx: &LoadContext, pass: &str) {
        for o in &self.observers {
            o.on_pass_started(ctx, pass);
        }
    }

    fn on_rows_loaded(&self, ctx: &LoadContext, rows: u64) {
        for o in &self.observers {
            o.on_rows_loaded(ctx, rows);
        }
    }

    fn on_success(&self, ctx: &LoadContext, stats: LoadStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &LoadContext, severity: LoadSeverity, error: &MprError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &MprError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Logs load events to stderr.
#[derive(Debug, Default)]
pub struct StdErrObserver;

impl LoadObserver for StdErrObserver {
    fn on_pass_started(&self, ctx: &LoadContext, pass: &str) {
        eprintln!("[load][pass] dest={} pass={}", ctx.dest_display(), pass);
    }

    fn on_success(&self, ctx: &LoadContext, stats: LoadStats) {
        eprintln!(
            "[load][ok] dest={} rows={} secs={:.3}",
            ctx.dest_display(),
            stats.rows,
            stats.secs
        );
    }

    fn on_failure(&self, ctx: &LoadContext, severity: LoadSeverity, error: &MprError) {
        eprintln!(
            "[load][{severity:?}] dest={} err={error}",
            ctx.dest_display()
        );
    }

    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &MprError) {
        eprintln!(
            "[ALERT][load][{severity:?}] dest={} err={error}",
            ctx.dest_display()
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
    /// Writes are best-effort; failures to open/write the log file are
    /// ignored.
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
    fn on_pass_started(&self, ctx: &LoadContext, pass: &str) {
        self.append_line(&format!(
            "{} pass dest={} pass={}",
            unix_ts(),
            ctx.dest_display(),
            pass
        ));
    }

    fn on_success(&self, ctx: &LoadContext, stats: LoadStats) {
        self.append_line(&format!(
            "{} ok dest={} rows={} secs={:.3}",
            unix_ts(),
            ctx.dest_display(),
            stats.rows,
            stats.secs
        ));
    }

    fn on_failure(&self, ctx: &LoadContext, severity: LoadSeverity, error: &MprError) {
        self.append_line(&format!(
            "{} fail severity={severity:?} dest={} err={error}",
            unix_ts(),
            ctx.dest_display()
        ));
    }

    fn on_alert(&self, ctx: &LoadContext, severity: LoadSeverity, error: &MprError) {
        self.append_line(&format!(
            "{} ALERT severity={severity:?} dest={} err={error}",
            unix_ts(),
            ctx.dest_display()
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
