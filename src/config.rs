//! # Host configuration payloads.
//!
//! The host hands the SDK a JSON object. Only a handful of fields matter to the
//! lifecycle engine; everything else is carried along untouched.
//!
//! ```text
//! ConfigPayload::parse(json)
//!   ├─ not json / not an object            → ConfigError
//!   ├─ has "server" or "password"          → Session(SessionConfig)  (must fully validate)
//!   └─ otherwise                           → Settings                (no session effect)
//! ```
//!
//! `SessionConfig::defaults` fills `alpn=["h3"]`, `mode="tun2socks"`, `engine="sing"`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ConfigError;
use crate::logging::LogLevel;

/// Transport backend selected by the `engine` field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum EngineKind {
    /// sing-box style client fed a protected UDP packet socket (default).
    #[default]
    Sing,
    /// hysteria core client fed a protected dialer.
    Hc,
}

impl EngineKind {
    /// Stable engine id reported in health and errors.
    pub fn id(&self) -> &'static str {
        match self {
            EngineKind::Sing => "sing",
            EngineKind::Hc => "hc",
        }
    }

    /// Parses the `engine` field; empty selects the default.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim() {
            "" | "sing" => Ok(EngineKind::Sing),
            "hc" | "hysteria_core" => Ok(EngineKind::Hc),
            other => Err(ConfigError::UnknownEngine(other.to_string())),
        }
    }
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Typed view of a session-defining payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// `"sing"` (default) | `"hc"` | `"hysteria_core"`.
    pub engine: String,
    /// `host:port` of the server.
    pub server: String,
    /// Password / PSK.
    pub password: String,
    pub sni: String,
    pub alpn: Vec<String>,
    pub up_mbps: u32,
    pub down_mbps: u32,
    pub idle_timeout_s: u32,
    pub mode: String,
}

impl SessionConfig {
    /// Parses, applies defaults and validates.
    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(json)?;
        let obj = value.as_object().ok_or(ConfigError::NotAnObject)?;
        Self::from_object(obj)
    }

    fn from_object(obj: &Map<String, Value>) -> Result<Self, ConfigError> {
        let mut cfg: SessionConfig = serde_json::from_value(Value::Object(obj.clone()))?;
        cfg.defaults();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn defaults(&mut self) {
        if self.alpn.is_empty() {
            self.alpn = vec!["h3".to_string()];
        }
        if self.mode.is_empty() {
            self.mode = "tun2socks".to_string();
        }
        if self.engine.is_empty() {
            self.engine = EngineKind::Sing.id().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_host_port(&self.server) {
            return Err(ConfigError::Server);
        }
        if self.password.is_empty() {
            return Err(ConfigError::Password);
        }
        EngineKind::parse(&self.engine)?;
        Ok(())
    }

    /// Selected engine (validated).
    pub fn engine_kind(&self) -> EngineKind {
        EngineKind::parse(&self.engine).unwrap_or_default()
    }

    /// First ALPN entry, `"h3"` when none is configured.
    pub fn primary_alpn(&self) -> &str {
        self.alpn.first().map(String::as_str).unwrap_or("h3")
    }
}

fn is_host_port(s: &str) -> bool {
    match s.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok_and(|p| p > 0),
        None => false,
    }
}

/// Classification of a host payload.
#[derive(Clone, Debug, PartialEq)]
pub enum PayloadKind {
    /// Materially defines a session.
    Session(SessionConfig),
    /// Settings only; the running transport is left alone.
    Settings,
}

/// A validated host payload together with its raw text.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigPayload {
    raw: String,
    kind: PayloadKind,
    log_level: Option<LogLevel>,
}

impl ConfigPayload {
    /// Keys whose presence makes a payload session-defining.
    const SESSION_KEYS: [&'static str; 2] = ["server", "password"];

    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(json)?;
        let obj = value.as_object().ok_or(ConfigError::NotAnObject)?;

        let kind = if Self::SESSION_KEYS.iter().any(|k| obj.contains_key(*k)) {
            PayloadKind::Session(SessionConfig::from_object(obj)?)
        } else {
            PayloadKind::Settings
        };
        let log_level = obj
            .get("log_level")
            .and_then(Value::as_str)
            .and_then(LogLevel::parse);

        Ok(Self {
            raw: json.to_string(),
            kind,
            log_level,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn kind(&self) -> &PayloadKind {
        &self.kind
    }

    /// Session part, if the payload defines one.
    pub fn session(&self) -> Option<&SessionConfig> {
        match &self.kind {
            PayloadKind::Session(cfg) => Some(cfg),
            PayloadKind::Settings => None,
        }
    }

    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level
    }
}
