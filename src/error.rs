//! Error types used by the SDK surface, the configuration layer and transports.
//!
//! - [`ConfigError`] payload parsing and validation failures.
//! - [`TransportError`] dial/handshake/probe failures inside a transport (transient).
//! - [`SdkError`] what the host sees from `start` / `reload`.
//! - [`ErrorCode`] stable numeric codes for bindings that prefer integers to strings.
//! - [`TaskPanic`] a panic caught at a background task boundary.
//!
//! Every enum exposes `as_label()` with a short stable snake_case string for logs.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

/// # Invalid configuration payload.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Payload is not well-formed JSON.
    #[error("malformed json: {0}")]
    Parse(#[from] serde_json::Error),

    /// Payload is valid JSON but not an object.
    #[error("config must be a json object")]
    NotAnObject,

    /// `server` is missing or not `host:port`.
    #[error("server must be host:port")]
    Server,

    /// `password` is empty.
    #[error("password required")]
    Password,

    /// `engine` names a backend this build does not know.
    #[error("unknown engine {0:?}")]
    UnknownEngine(String),
}

impl ConfigError {
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Parse(_) => "config_parse",
            ConfigError::NotAnObject => "config_not_object",
            ConfigError::Server => "config_server",
            ConfigError::Password => "config_password",
            ConfigError::UnknownEngine(_) => "config_unknown_engine",
        }
    }
}

/// # Errors produced by a transport session.
///
/// All of these are transient from the supervisor's point of view: they are
/// retried with backoff and surface only as telemetry.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransportError {
    /// Socket acquisition or connection setup failed.
    #[error("dial failed: {error}")]
    Dial {
        /// The underlying error message.
        error: String,
    },

    /// Connected, but the tunnel handshake (TLS/QUIC/auth) failed.
    #[error("handshake failed: {error}")]
    Handshake {
        /// The underlying error message.
        error: String,
    },

    /// The host refused to protect a socket from the VPN routing table.
    #[error("protect failed for fd {fd}")]
    Protect {
        /// Descriptor that could not be protected.
        fd: i32,
    },

    /// Operation exceeded its deadline.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// Cancelled by the owning context.
    #[error("context cancelled")]
    Canceled,
}

impl TransportError {
    pub fn dial(error: impl std::fmt::Display) -> Self {
        TransportError::Dial {
            error: error.to_string(),
        }
    }

    pub fn handshake(error: impl std::fmt::Display) -> Self {
        TransportError::Handshake {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs and events.
    ///
    /// # Example
    /// ```
    /// use hy2core::TransportError;
    ///
    /// assert_eq!(TransportError::dial("refused").as_label(), "dial_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Dial { .. } => "dial_failed",
            TransportError::Handshake { .. } => "handshake_failed",
            TransportError::Protect { .. } => "protect_failed",
            TransportError::Timeout { .. } => "timeout",
            TransportError::Canceled => "canceled",
        }
    }

    /// Whether the supervisor should keep retrying after this error.
    ///
    /// Everything except cancellation is retryable.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, TransportError::Canceled)
    }
}

/// # Errors returned to the host by lifecycle operations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SdkError {
    /// Payload rejected before any state was touched.
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),

    /// No usable transport could be built for the selected engine.
    #[error("engine {engine} init failed: {error}")]
    EngineInitFailed {
        /// Engine id (`sing`, `hc`).
        engine: &'static str,
        /// The underlying error message.
        error: String,
    },

    /// Idempotency signal: a session is already running.
    #[error("already running")]
    AlreadyRunning,

    /// Idempotency signal: no session is running.
    #[error("not running")]
    NotRunning,
}

impl SdkError {
    pub fn code(&self) -> ErrorCode {
        match self {
            SdkError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            SdkError::EngineInitFailed { .. } => ErrorCode::EngineInitFailed,
            SdkError::AlreadyRunning => ErrorCode::AlreadyRunning,
            SdkError::NotRunning => ErrorCode::NotRunning,
        }
    }

    pub fn as_label(&self) -> &'static str {
        self.code().as_str()
    }
}

/// Stable numeric error codes for host bindings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "i32")]
pub enum ErrorCode {
    Ok = 0,
    AlreadyRunning = 1,
    InvalidConfig = 2,
    EngineInitFailed = 3,
    NotRunning = 4,
}

impl From<ErrorCode> for i32 {
    fn from(code: ErrorCode) -> Self {
        code as i32
    }
}

impl ErrorCode {
    /// Snake-case name of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Ok => "ok",
            ErrorCode::AlreadyRunning => "already_running",
            ErrorCode::InvalidConfig => "invalid_config",
            ErrorCode::EngineInitFailed => "engine_init_failed",
            ErrorCode::NotRunning => "not_running",
        }
    }

    /// Maps a raw integer back to a code, if known.
    pub fn from_i32(raw: i32) -> Option<Self> {
        match raw {
            0 => Some(ErrorCode::Ok),
            1 => Some(ErrorCode::AlreadyRunning),
            2 => Some(ErrorCode::InvalidConfig),
            3 => Some(ErrorCode::EngineInitFailed),
            4 => Some(ErrorCode::NotRunning),
            _ => None,
        }
    }

    /// Serializes `{"code":N,"name":"...","message":"..."}` (message omitted when empty).
    pub fn to_json(&self, message: &str) -> String {
        #[derive(Serialize)]
        struct Wire<'a> {
            code: ErrorCode,
            name: &'static str,
            #[serde(skip_serializing_if = "str::is_empty")]
            message: &'a str,
        }
        let wire = Wire {
            code: *self,
            name: self.as_str(),
            message,
        };
        serde_json::to_string(&wire).unwrap_or_default()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A panic caught at a supervised task boundary.
#[derive(Error, Debug, Clone)]
#[error("task {task} panicked: {message}")]
pub struct TaskPanic {
    /// Name the task was spawned with.
    pub task: String,
    /// Panic payload rendered as text.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_names() {
        let cases = [
            (ErrorCode::Ok, "ok"),
            (ErrorCode::AlreadyRunning, "already_running"),
            (ErrorCode::InvalidConfig, "invalid_config"),
            (ErrorCode::EngineInitFailed, "engine_init_failed"),
            (ErrorCode::NotRunning, "not_running"),
        ];
        for (code, want) in cases {
            assert_eq!(code.as_str(), want);
            assert_eq!(ErrorCode::from_i32(code as i32), Some(code));
        }
        assert_eq!(ErrorCode::from_i32(999), None);
    }

    #[test]
    fn test_error_code_json() {
        let raw = ErrorCode::InvalidConfig.to_json("bad json");
        let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(v["code"], 2);
        assert_eq!(v["name"], "invalid_config");
        assert_eq!(v["message"], "bad json");

        let bare: serde_json::Value =
            serde_json::from_str(&ErrorCode::Ok.to_json("")).unwrap();
        assert!(bare.get("message").is_none());
    }

    #[test]
    fn test_sdk_error_codes() {
        assert_eq!(
            SdkError::from(ConfigError::Password).code(),
            ErrorCode::InvalidConfig
        );
        let init = SdkError::EngineInitFailed {
            engine: "hc",
            error: "no connector".into(),
        };
        assert_eq!(init.as_label(), "engine_init_failed");
        assert_eq!(init.to_string(), "engine hc init failed: no connector");
    }

    #[test]
    fn test_transport_error_retryable() {
        assert!(TransportError::dial("refused").is_retryable());
        assert!(TransportError::Protect { fd: 3 }.is_retryable());
        assert!(!TransportError::Canceled.is_retryable());
        assert_eq!(TransportError::handshake("x").as_label(), "handshake_failed");
    }
}
