//! Bridge configuration
//!
//! [`BridgeConfig`] collects the static parameters of a bridge: how the engine
//! is brought up, which delivery path carries events to the host and what
//! happens to pending events on shutdown. Defaults match a plain UDP user
//! agent on port 5060 with queue delivery.
//!
//! # Examples
//!
//! ```rust
//! use rvoip_bridge_core::config::{BridgeConfig, DeliveryMode, TransportKind};
//!
//! let config = BridgeConfig::new()
//!     .with_transport(TransportKind::Tcp, 5080)
//!     .with_delivery(DeliveryMode::Rendezvous);
//! assert!(config.validate().is_ok());
//!
//! let from_file: BridgeConfig = BridgeConfig::from_toml_str(r#"
//!     delivery = "queue"
//!     shutdown = "discard"
//!
//!     [transport]
//!     kind = "udp"
//!     port = 5062
//! "#).unwrap();
//! assert_eq!(from_file.transport.port, 5062);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::enums::TRANSPORT_TYPES;
use crate::error::{BridgeError, BridgeResult};
use crate::handler::PanicPolicy;

/// SIP transport protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Udp,
    Tcp,
    Tls,
}

impl TransportKind {
    /// Symbolic name in the engine's transport table
    pub fn table_name(&self) -> &'static str {
        match self {
            TransportKind::Udp => "UDP",
            TransportKind::Tcp => "TCP",
            TransportKind::Tls => "TLS",
        }
    }

    /// Engine code for this transport
    pub fn engine_id(&self) -> BridgeResult<i32> {
        TRANSPORT_TYPES.name_to_id(self.table_name())
    }
}

/// Transport the engine listens on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportSettings {
    pub kind: TransportKind,
    pub port: u16,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            kind: TransportKind::Udp,
            port: 5060,
        }
    }
}

/// How events travel from callback threads to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Queue events and drain them from the host's event loop
    Queue,
    /// Suspend the host thread and run the handler on the callback thread
    Rendezvous,
}

/// What happens to undelivered events on stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// Deliver everything already queued, then stop
    Drain,
    /// Drop queued events; request events get the engine default
    Discard,
}

/// Complete bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub transport: TransportSettings,
    /// Engine console log level, 0 (fatal only) to 6
    pub console_log_level: u8,
    pub delivery: DeliveryMode,
    pub shutdown: ShutdownPolicy,
    /// Status used by `answer_call` when none is given
    pub default_answer_code: u16,
    /// Status used by `hangup_call` when none is given; 0 lets the engine choose
    pub default_hangup_code: u16,
    /// Abort the process when the event handler panics
    pub fatal_on_handler_panic: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            transport: TransportSettings::default(),
            console_log_level: 1,
            delivery: DeliveryMode::Queue,
            shutdown: ShutdownPolicy::Drain,
            default_answer_code: 200,
            default_hangup_code: 0,
            fatal_on_handler_panic: true,
        }
    }
}

/// Status codes `answer_call` accepts
pub const ANSWER_CODES: std::ops::RangeInclusive<u16> = 100..=699;

/// Whether `code` is acceptable for `hangup_call`
pub fn is_hangup_code(code: u16) -> bool {
    code == 0 || ANSWER_CODES.contains(&code)
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(text: &str) -> BridgeResult<Self> {
        let config: Self = toml::from_str(text)
            .map_err(|e| BridgeError::configuration("toml", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> BridgeResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            BridgeError::configuration("path", format!("{}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> BridgeResult<String> {
        toml::to_string_pretty(self).map_err(|e| BridgeError::configuration("toml", e.to_string()))
    }

    pub fn with_transport(mut self, kind: TransportKind, port: u16) -> Self {
        self.transport = TransportSettings { kind, port };
        self
    }

    pub fn with_console_log_level(mut self, level: u8) -> Self {
        self.console_log_level = level;
        self
    }

    pub fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn with_shutdown(mut self, shutdown: ShutdownPolicy) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn with_default_answer_code(mut self, code: u16) -> Self {
        self.default_answer_code = code;
        self
    }

    pub fn with_default_hangup_code(mut self, code: u16) -> Self {
        self.default_hangup_code = code;
        self
    }

    pub fn with_fatal_handler_panics(mut self, fatal: bool) -> Self {
        self.fatal_on_handler_panic = fatal;
        self
    }

    pub fn panic_policy(&self) -> PanicPolicy {
        if self.fatal_on_handler_panic {
            PanicPolicy::Abort
        } else {
            PanicPolicy::Propagate
        }
    }

    /// Check value ranges
    pub fn validate(&self) -> BridgeResult<()> {
        if self.console_log_level > 6 {
            return Err(BridgeError::configuration(
                "console_log_level",
                format!("must be between 0 and 6, got {}", self.console_log_level),
            ));
        }
        if !ANSWER_CODES.contains(&self.default_answer_code) {
            return Err(BridgeError::configuration(
                "default_answer_code",
                format!("must be a SIP status code, got {}", self.default_answer_code),
            ));
        }
        if !is_hangup_code(self.default_hangup_code) {
            return Err(BridgeError::configuration(
                "default_hangup_code",
                format!("must be 0 or a SIP status code, got {}", self.default_hangup_code),
            ));
        }
        self.transport.kind.engine_id()?;
        Ok(())
    }
}
