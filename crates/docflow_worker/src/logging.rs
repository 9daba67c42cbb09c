//! Log sink behind the `log` facade.
//!
//! `log` records are bridged into a `tracing` subscriber whose fmt layers
//! write through `tracing-appender` background workers: one to a
//! size-rotated file, one to stdout. The process entry point owns the
//! [`LogHandle`] and calls [`LogHandle::shutdown`] so queued lines reach disk
//! before exit.

use std::error::Error;
use std::fmt::{self, Display};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use log::{LevelFilter, error};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::field::{Field, Visit};
use tracing::{Dispatch, Event, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};
use tracing_subscriber::filter::LevelFilter as TraceLevel;
use tracing_subscriber::fmt::format::{DefaultFields, Writer};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, Layer as FmtLayer};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use docflow_core::{DocflowError, DocflowResult};

const DEFAULT_LOG_FILE: &str = "docflow.log";
const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_BACKUPS: u32 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LevelFilter,
    /// `None` disables the file target.
    pub file: Option<PathBuf>,
    /// Rotate once the file has grown past this size; 0 never rotates.
    pub max_bytes: u64,
    pub backups: u32,
    pub console: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: LevelFilter::Debug,
            file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
            max_bytes: DEFAULT_MAX_BYTES,
            backups: DEFAULT_BACKUPS,
            console: true,
        }
    }
}

impl LogSettings {
    pub fn from_env() -> DocflowResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> DocflowResult<Self> {
        let mut settings = Self::default();
        if let Some(raw) = lookup("DOCFLOW_LOG_LEVEL").filter(|raw| !raw.trim().is_empty()) {
            settings.level = LevelFilter::from_str(raw.trim()).map_err(|_| {
                DocflowError::config(format!("DOCFLOW_LOG_LEVEL is not a log level: '{raw}'"))
            })?;
        }
        if let Some(raw) = lookup("DOCFLOW_LOG_FILE") {
            let raw = raw.trim();
            settings.file = (!raw.is_empty()).then(|| PathBuf::from(raw));
        }
        if let Some(raw) = lookup("DOCFLOW_LOG_MAX_BYTES").filter(|raw| !raw.trim().is_empty()) {
            settings.max_bytes = parse_setting("DOCFLOW_LOG_MAX_BYTES", &raw)?;
        }
        if let Some(raw) = lookup("DOCFLOW_LOG_BACKUPS").filter(|raw| !raw.trim().is_empty()) {
            settings.backups = parse_setting("DOCFLOW_LOG_BACKUPS", &raw)?;
        }
        if let Some(raw) = lookup("DOCFLOW_LOG_CONSOLE").filter(|raw| !raw.trim().is_empty()) {
            settings.console = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(DocflowError::config(format!(
                        "DOCFLOW_LOG_CONSOLE must be a boolean, got '{raw}'"
                    )));
                }
            };
        }
        Ok(settings)
    }
}

fn parse_setting<T: FromStr>(key: &str, raw: &str) -> DocflowResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| DocflowError::config(format!("{key} must be a number, got '{raw}'")))
}

/// Owns the background writers behind the installed subscriber.
///
/// Dropping the handle flushes too; `shutdown` makes the point explicit.
pub struct LogHandle {
    guards: Vec<WorkerGuard>,
}

impl LogHandle {
    /// Build the sink and install it as the global `tracing` subscriber,
    /// bridging `log` records into it.
    pub fn init(settings: LogSettings) -> DocflowResult<Self> {
        let level = settings.level;
        let (handle, dispatch) = Self::start(settings)?;
        dispatch
            .try_init()
            .map_err(|err| DocflowError::config(format!("logger already installed: {err}")))?;
        log::set_max_level(level);
        Ok(handle)
    }

    /// Build the sink without touching any global state.
    pub fn start(settings: LogSettings) -> DocflowResult<(Self, Dispatch)> {
        let mut guards = Vec::new();
        let file_layer = match &settings.file {
            Some(path) => {
                let file = rotating_file(path, settings.max_bytes, settings.backups)
                    .map_err(|err| DocflowError::config(format!("open log file: {err}")))?;
                let (writer, guard) = queued(file);
                guards.push(guard);
                Some(line_layer(writer))
            }
            None => None,
        };
        let console_layer = settings.console.then(|| {
            let (writer, guard) = queued(io::stdout());
            guards.push(guard);
            line_layer(writer)
        });
        let subscriber = tracing_subscriber::registry()
            .with(trace_level(settings.level))
            .with(file_layer)
            .with(console_layer);
        Ok((Self { guards }, Dispatch::new(subscriber)))
    }

    /// Drain queued lines and flush every target.
    pub fn shutdown(self) {
        drop(self.guards);
    }
}

/// Lines wait for the writer instead of being dropped when the queue fills.
fn queued<W: io::Write + Send + 'static>(writer: W) -> (NonBlocking, WorkerGuard) {
    NonBlockingBuilder::default().lossy(false).finish(writer)
}

fn line_layer<S>(writer: NonBlocking) -> FmtLayer<S, DefaultFields, LineFormat, NonBlocking>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .event_format(LineFormat)
        .with_writer(writer)
}

/// `docflow.log` rotates to `docflow.log.1`, `.1` to `.2`, and the oldest
/// backup past `backups` is removed. A line is never split across files.
fn rotating_file(
    path: &Path,
    max_bytes: u64,
    backups: u32,
) -> io::Result<FileRotate<AppendCount>> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let limit = match usize::try_from(max_bytes) {
        Ok(0) | Err(_) => ContentLimit::None,
        Ok(bytes) => ContentLimit::BytesSurpassed(bytes),
    };
    // A rotation needs somewhere to go.
    let backups = usize::try_from(backups.max(1)).unwrap_or(usize::MAX);
    Ok(FileRotate::new(
        path,
        AppendCount::new(backups),
        limit,
        Compression::None,
        #[cfg(unix)]
        None,
    ))
}

fn trace_level(level: LevelFilter) -> TraceLevel {
    match level {
        LevelFilter::Off => TraceLevel::OFF,
        LevelFilter::Error => TraceLevel::ERROR,
        LevelFilter::Warn => TraceLevel::WARN,
        LevelFilter::Info => TraceLevel::INFO,
        LevelFilter::Debug => TraceLevel::DEBUG,
        LevelFilter::Trace => TraceLevel::TRACE,
    }
}

/// Event formatter producing [`format_line`] output.
struct LineFormat;

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut message = MessageField::default();
        event.record(&mut message);
        let line = format_line(
            OffsetDateTime::now_utc(),
            event.metadata().level(),
            &message.0,
        );
        writeln!(writer, "{line}")
    }
}

/// Collects the `message` field; bridged `log.*` metadata fields are skipped.
#[derive(Default)]
struct MessageField(String);

impl Visit for MessageField {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.0 = value.to_string();
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.0 = format!("{value:?}");
        }
    }
}

/// `<rfc3339> - <LEVEL> - <message>`
pub fn format_line(at: OffsetDateTime, level: impl Display, message: &str) -> String {
    let stamp = at
        .format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string());
    format!("{stamp} - {level} - {message}")
}

/// Log `err` at error level together with its `source()` chain.
pub fn log_error(context: &str, err: &dyn Error) {
    let mut message = format!("{context}: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(&format!("\n  caused by: {cause}"));
        source = cause.source();
    }
    error!("{message}");
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;
    use time::macros::datetime;

    use super::*;

    fn backup(path: &Path, index: u32) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    #[test]
    fn formats_timestamp_level_and_message() {
        let line = format_line(
            datetime!(2026-03-01 12:30:00 UTC),
            tracing::Level::WARN,
            "disk low",
        );
        assert_eq!(line, "2026-03-01T12:30:00Z - WARN - disk low");
        let line = format_line(datetime!(2026-03-01 12:30:00 UTC), log::Level::Warn, "disk low");
        assert_eq!(line, "2026-03-01T12:30:00Z - WARN - disk low");
    }

    #[test]
    fn reads_settings_from_lookup() {
        let settings = LogSettings::from_lookup(|key| match key {
            "DOCFLOW_LOG_LEVEL" => Some("info".to_string()),
            "DOCFLOW_LOG_FILE" => Some(String::new()),
            "DOCFLOW_LOG_CONSOLE" => Some("false".to_string()),
            _ => None,
        })
        .expect("settings");
        assert_eq!(settings.level, LevelFilter::Info);
        assert_eq!(settings.file, None);
        assert!(!settings.console);
        assert!(LogSettings::from_lookup(|_| Some("loud".to_string())).is_err());
    }

    #[test]
    fn maps_log_levels_onto_tracing_filters() {
        assert_eq!(trace_level(LevelFilter::Off), TraceLevel::OFF);
        assert_eq!(trace_level(LevelFilter::Warn), TraceLevel::WARN);
        assert_eq!(trace_level(LevelFilter::Debug), TraceLevel::DEBUG);
    }

    #[test]
    fn shutdown_drains_queued_lines_and_filters_level() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("logs").join("worker.log");
        let (handle, dispatch) = LogHandle::start(LogSettings {
            level: LevelFilter::Info,
            file: Some(path.clone()),
            max_bytes: 0,
            backups: 0,
            console: false,
        })
        .expect("start");
        tracing::dispatcher::with_default(&dispatch, || {
            tracing::info!("first");
            tracing::debug!("hidden");
            tracing::error!(attempt = 3, "second");
        });
        handle.shutdown();

        let contents = fs::read_to_string(&path).expect("read log");
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" - INFO - first"));
        assert!(lines[1].ends_with(" - ERROR - second"));
    }

    #[test]
    fn rotates_by_size_and_keeps_configured_backups() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("worker.log");
        let (handle, dispatch) = LogHandle::start(LogSettings {
            level: LevelFilter::Debug,
            file: Some(path.clone()),
            max_bytes: 120,
            backups: 2,
            console: false,
        })
        .expect("start");
        tracing::dispatcher::with_default(&dispatch, || {
            for index in 0..12 {
                tracing::info!("line number {index}");
            }
        });
        handle.shutdown();

        assert!(path.exists());
        assert!(backup(&path, 1).exists());
        assert!(backup(&path, 2).exists());
        assert!(!backup(&path, 3).exists());
        let current = fs::read_to_string(&path).expect("read log");
        assert!(current.contains("line number 11"));
        for line in current.lines() {
            assert!(line.contains(" - INFO - line number "), "split line: {line}");
        }
    }
}
