//! Bridge-core: embedding a callback-driven SIP engine into a single-threaded host
//!
//! The engine calls back from threads it owns, whenever it likes. The host
//! (an event-loop program with a single execution context) must only ever
//! run its handler on one thread at a time. This crate sits between the two.
//!
//! ## Layers
//! ```text
//! host program ──► Bridge ──► Gateway ──► Engine (foreign)
//!      ▲              │                      │
//!      │         EventHandler          EngineCallbacks (engine threads)
//!      │              ▲                      │
//!      └──── queue drain loop / rendezvous ◄─┘  capture: Event
//! ```
//!
//! Two delivery paths are provided:
//! - **queue** ([`queue`]): callbacks enqueue a captured [`Event`]; a drain
//!   loop on the host's `LocalSet` hands events to the handler one at a time.
//!   Request events block the callback thread until the handler's reply is
//!   relayed back through a [`ResponseSlot`].
//! - **rendezvous** ([`rendezvous`]): the callback thread wakes the host,
//!   the host suspends, the handler runs on the callback thread while the
//!   host is parked, and the host resumes afterwards.
//!
//! Everything an event carries is snapshotted on the callback thread before
//! the callback returns, so the handler never sees engine memory.

pub mod bridge;
pub mod config;
pub mod engine;
pub mod enums;
pub mod error;
pub mod events;
pub mod gateway;
pub mod handler;
pub mod info;
pub mod logging;
pub mod queue;
pub mod rendezvous;

// Public API exports
pub use bridge::{Bridge, BridgeStats};
pub use config::{BridgeConfig, DeliveryMode, ShutdownPolicy, TransportKind, TransportSettings};
pub use engine::simulated::SimulatedEngine;
pub use engine::{
    AccountId, BuddyId, CallId, Engine, EngineCallbacks, EngineStatus, MessageData, StatusReply,
};
pub use enums::{EnumMap, CALL_STATES, MEDIA_STATUSES, SUBSCRIPTION_STATES, TRANSPORT_TYPES};
pub use error::{BridgeError, BridgeResult};
pub use events::{Event, EventKind, EventPayload, ResponseSlot};
pub use gateway::Gateway;
pub use handler::{EventHandler, PanicPolicy, Reply};
pub use info::{AccountInfo, BuddyInfo, CallInfo, CallRole};
pub use logging::{setup_logging, LoggingConfig};
pub use queue::QueueStats;
pub use rendezvous::{Rendezvous, RendezvousStats, WakeSignal};

/// Bridge-core version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
