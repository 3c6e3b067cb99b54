//! # Host log bridge.
//!
//! Internal code logs with `tracing`. [`LogBridge`] forwards those records to
//! an optional host [`LogSink`] (Logcat, os_log, ...) filtered by a minimum
//! [`LogLevel`]. Without a sink every record is dropped.
//!
//! ```text
//! tracing::warn!(..) ──► HostLayer::on_event ──► level >= min? ──► LogSink::log(level, msg)
//! ```
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use hy2core::logging::{LogBridge, LogLevel};
//!
//! let bridge = Arc::new(LogBridge::new());
//! bridge.set_sink(Some(Arc::new(|level: LogLevel, msg: &str| {
//!     eprintln!("[{level}] {msg}");
//! })));
//! bridge.set_level(LogLevel::Debug);
//! let _installed = hy2core::logging::install(&bridge);
//! ```

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, RwLock};

use tracing::field::{Field, Visit};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;

/// Host-visible log severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum LogLevel {
    Debug = 10,
    Info = 20,
    Warn = 30,
    Error = 40,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parses `"debug" | "info" | "warn" | "error"`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0..=10 => LogLevel::Debug,
            11..=20 => LogLevel::Info,
            21..=30 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }

    /// `TRACE` has no host counterpart and maps to `None`.
    fn from_tracing(level: &tracing::Level) -> Option<Self> {
        match *level {
            tracing::Level::ERROR => Some(LogLevel::Error),
            tracing::Level::WARN => Some(LogLevel::Warn),
            tracing::Level::INFO => Some(LogLevel::Info),
            tracing::Level::DEBUG => Some(LogLevel::Debug),
            _ => None,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver of leveled log lines, implemented by the host platform.
pub trait LogSink: Send + Sync + 'static {
    fn log(&self, level: LogLevel, msg: &str);
}

impl<F> LogSink for F
where
    F: Fn(LogLevel, &str) + Send + Sync + 'static,
{
    fn log(&self, level: LogLevel, msg: &str) {
        self(level, msg)
    }
}

/// Optional host sink plus a minimum level.
pub struct LogBridge {
    sink: RwLock<Option<Arc<dyn LogSink>>>,
    min: AtomicU8,
}

impl Default for LogBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl LogBridge {
    /// Bridge with no sink and minimum level `info`.
    pub fn new() -> Self {
        Self {
            sink: RwLock::new(None),
            min: AtomicU8::new(LogLevel::Info as u8),
        }
    }

    /// Registers (or clears with `None`) the host sink.
    pub fn set_sink(&self, sink: Option<Arc<dyn LogSink>>) {
        let mut guard = self.sink.write().unwrap_or_else(|p| p.into_inner());
        *guard = sink;
    }

    pub fn set_level(&self, level: LogLevel) {
        self.min.store(level as u8, Ordering::Relaxed);
    }

    /// Applies a level given as text; unknown names are ignored.
    pub fn set_level_str(&self, raw: &str) -> bool {
        match LogLevel::parse(raw) {
            Some(level) => {
                self.set_level(level);
                true
            }
            None => false,
        }
    }

    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.min.load(Ordering::Relaxed))
    }

    /// Whether a record at `level` would reach the sink.
    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.level()
    }

    /// Delivers one line to the sink if the level passes the filter.
    pub fn log(&self, level: LogLevel, msg: &str) {
        if !self.enabled(level) {
            return;
        }
        let sink = {
            let guard = self.sink.read().unwrap_or_else(|p| p.into_inner());
            guard.clone()
        };
        if let Some(sink) = sink {
            // Sink panics are swallowed.
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                sink.log(level, msg)
            }));
        }
    }

    /// A `tracing` layer forwarding records into this bridge.
    pub fn layer(self: &Arc<Self>) -> HostLayer {
        HostLayer {
            bridge: Arc::clone(self),
        }
    }
}

/// `tracing_subscriber` layer backed by a [`LogBridge`].
pub struct HostLayer {
    bridge: Arc<LogBridge>,
}

impl<S> Layer<S> for HostLayer
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let Some(level) = LogLevel::from_tracing(event.metadata().level()) else {
            return;
        };
        if !self.bridge.enabled(level) {
            return;
        }
        let mut visitor = LineVisitor::default();
        event.record(&mut visitor);
        self.bridge.log(level, &visitor.finish());
    }
}

/// Renders `message key=value ...`.
#[derive(Default)]
struct LineVisitor {
    message: String,
    fields: String,
}

impl LineVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            self.message + &self.fields
        }
    }
}

impl Visit for LineVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

/// Installs the bridge as the process-wide `tracing` subscriber.
///
/// Returns `false` if a global subscriber was already set.
pub fn install(bridge: &Arc<LogBridge>) -> bool {
    tracing_subscriber::registry()
        .with(bridge.layer())
        .try_init()
        .is_ok()
}
