//! The host's event handler
//!
//! The host registers exactly one handler. It receives every event as
//! `(name, payload)` and may answer with a [`Reply`]; the reply only matters
//! for kinds that expect one (see [`EventKind::default_reply`]).
//!
//! Handlers only need to be `Send`, not `Sync`: both delivery paths guarantee
//! that at most one thread runs the handler at a time.
//!
//! # Examples
//!
//! ```rust
//! use rvoip_bridge_core::handler::{EventHandler, Reply};
//! use serde_json::Value;
//!
//! let handler = |name: &str, _payload: &Value| match name {
//!     "transfer_request" => Reply::Status(603),
//!     _ => Reply::None,
//! };
//! assert_eq!(handler.handle("transfer_request", &Value::Null), Reply::Status(603));
//! ```

use std::panic::{self, AssertUnwindSafe};

use serde_json::Value;
use tracing::error;

use crate::events::{Event, EventKind};

/// The handler's answer to one event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Reply {
    /// No decision; the engine default applies
    #[default]
    None,
    /// A SIP status code
    Status(u16),
    /// A SIP status code with reason phrase
    Reason { code: u16, reason: String },
    /// Continuation flag
    Continue(bool),
}

impl Reply {
    /// Interpret as a status code
    ///
    /// Codes are passed through unchanged, including 0.
    pub fn status_or(&self, default: u16) -> u16 {
        match self {
            Reply::Status(code) | Reply::Reason { code, .. } => *code,
            Reply::Continue(_) | Reply::None => default,
        }
    }

    /// Interpret as a continuation flag; a status code counts as true unless zero
    pub fn continue_or(&self, default: bool) -> bool {
        match self {
            Reply::Continue(flag) => *flag,
            Reply::Status(code) | Reply::Reason { code, .. } => *code != 0,
            Reply::None => default,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Reply::Reason { reason, .. } => Some(reason),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Reply::None)
    }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self {
        Reply::None
    }
}

impl From<u16> for Reply {
    fn from(code: u16) -> Self {
        Reply::Status(code)
    }
}

impl From<bool> for Reply {
    fn from(flag: bool) -> Self {
        Reply::Continue(flag)
    }
}

/// Receives every delivered event
pub trait EventHandler: Send + 'static {
    fn handle(&self, name: &str, payload: &Value) -> Reply;

    /// Typed entry point; the default renders the payload and calls [`handle`](Self::handle)
    fn handle_event(&self, event: &Event) -> Reply {
        self.handle(event.name(), &event.payload_value())
    }
}

impl<F> EventHandler for F
where
    F: Fn(&str, &Value) -> Reply + Send + 'static,
{
    fn handle(&self, name: &str, payload: &Value) -> Reply {
        self(name, payload)
    }
}

/// What happens when the handler panics during delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanicPolicy {
    /// Log and abort the process
    Abort,
    /// Let the panic unwind into the delivery path
    Propagate,
}

/// The registered handler together with its failure policy
pub struct HandlerRuntime {
    handler: Box<dyn EventHandler>,
    policy: PanicPolicy,
}

impl HandlerRuntime {
    pub fn new(handler: Box<dyn EventHandler>, policy: PanicPolicy) -> Self {
        Self { handler, policy }
    }

    pub fn policy(&self) -> PanicPolicy {
        self.policy
    }

    /// Run the handler for one event and relay the reply into its slot
    pub fn dispatch(&self, event: &mut Event) -> Reply {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.handler.handle_event(event)));
        let reply = match outcome {
            Ok(reply) => reply,
            Err(cause) => {
                let message = panic_message(cause.as_ref());
                match self.policy {
                    PanicPolicy::Abort => {
                        error!(
                            "Event handler panicked while handling {} (seq {}): {}; aborting",
                            event.name(),
                            event.seq(),
                            message
                        );
                        std::process::abort();
                    }
                    PanicPolicy::Propagate => {
                        error!(
                            "Event handler panicked while handling {} (seq {}): {}",
                            event.name(),
                            event.seq(),
                            message
                        );
                        // Unblock a waiting callback thread before unwinding.
                        event.respond(Reply::None);
                        panic::resume_unwind(cause);
                    }
                }
            }
        };
        if event.kind().expects_reply() {
            event.respond(reply.clone());
        }
        reply
    }
}

impl std::fmt::Debug for HandlerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRuntime")
            .field("handler", &"<event handler>")
            .field("policy", &self.policy)
            .finish()
    }
}

fn panic_message(cause: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = cause.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = cause.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Engine decision for a reply to an event of `kind`
pub(crate) fn decision_status(kind: EventKind, reply: &Reply) -> u16 {
    let default = kind
        .default_reply()
        .map(|reply| reply.status_or(0))
        .unwrap_or(0);
    reply.status_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MockEngine, RawCallInfo};
    use crate::events::EventPayload;
    use std::cell::Cell;

    fn transfer_event() -> Event {
        let mut engine = MockEngine::new();
        engine
            .expect_call_get_info()
            .returning(|id| Ok(RawCallInfo { id, ..Default::default() }));
        Event::new(9, EventPayload::transfer_request(&engine, 0, "sip:carol@example.com").unwrap())
    }

    #[test]
    fn test_status_passthrough_including_boundaries() {
        for code in [0u16, 202, 603, 699, u16::MAX] {
            assert_eq!(Reply::Status(code).status_or(202), code);
        }
        assert_eq!(Reply::None.status_or(202), 202);
    }

    #[test]
    fn test_continue_interpretation() {
        assert!(!Reply::Continue(false).continue_or(true));
        assert!(!Reply::Status(0).continue_or(true));
        assert!(Reply::Status(1).continue_or(false));
        assert!(Reply::None.continue_or(true));
    }

    #[test]
    fn test_dispatch_relays_reply_into_slot() {
        let runtime = HandlerRuntime::new(
            Box::new(|_: &str, _: &Value| Reply::Status(486)),
            PanicPolicy::Propagate,
        );
        let mut event = transfer_event();
        let slot = event.reply_slot().unwrap();
        assert_eq!(runtime.dispatch(&mut event), Reply::Status(486));
        assert_eq!(slot.wait(), Reply::Status(486));
    }

    #[test]
    fn test_stateful_handler_needs_only_send() {
        struct Counting {
            seen: Cell<u32>,
        }
        impl EventHandler for Counting {
            fn handle(&self, _name: &str, _payload: &Value) -> Reply {
                self.seen.set(self.seen.get() + 1);
                Reply::None
            }
        }

        let runtime = HandlerRuntime::new(Box::new(Counting { seen: Cell::new(0) }), PanicPolicy::Propagate);
        runtime.dispatch(&mut transfer_event());
        runtime.dispatch(&mut transfer_event());
    }

    #[test]
    fn test_propagated_panic_still_answers_the_slot() {
        let runtime = HandlerRuntime::new(
            Box::new(|_: &str, _: &Value| -> Reply { panic!("handler bug") }),
            PanicPolicy::Propagate,
        );
        let mut event = transfer_event();
        let slot = event.reply_slot().unwrap();
        let result = panic::catch_unwind(AssertUnwindSafe(|| runtime.dispatch(&mut event)));
        assert!(result.is_err());
        assert_eq!(slot.wait(), Reply::None);
    }

    #[test]
    fn test_decision_status_uses_kind_default() {
        assert_eq!(decision_status(EventKind::TransferRequest, &Reply::None), 202);
        assert_eq!(decision_status(EventKind::IncomingSubscribe, &Reply::None), 200);
        assert_eq!(decision_status(EventKind::TransferRequest, &Reply::Status(0)), 0);
    }
}
