//! The bridge context
//!
//! [`Bridge`] is the one object that owns everything the host and the
//! engine share: the gateway, the registered handler, and whichever delivery
//! path carries events between them. There are no process-wide statics; a
//! host can run several bridges against several engines.
//!
//! # Lifecycle
//!
//! ```text
//! Bridge::new ──► start(handler) ──► ... events delivered ... ──► stop().await
//!   create          init + transport      queue: drain loop          close delivery
//!                   + start engine        rendezvous: serve          drain or discard
//!                   spawn pump                                       destroy engine
//! ```
//!
//! `start` spawns the pump with `spawn_local`, so it has to be called from
//! inside a `tokio::task::LocalSet` on the host thread.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rvoip_bridge_core::{Bridge, BridgeConfig, Reply, SimulatedEngine};
//! use serde_json::Value;
//!
//! # async fn run() -> rvoip_bridge_core::BridgeResult<()> {
//! let local = tokio::task::LocalSet::new();
//! local.run_until(async {
//!     let bridge = Bridge::try_new(Arc::new(SimulatedEngine::new()), BridgeConfig::default())?;
//!     bridge.start(|name: &str, payload: &Value| {
//!         println!("got event {} {}", name, payload);
//!         Reply::None
//!     })?;
//!
//!     let account = bridge.gateway().add_account("2002", "192.168.2.2", "1234")?;
//!     bridge.gateway().make_call(account, "sip:2001@192.168.2.2")?;
//!
//!     bridge.stop().await
//! }).await
//! # }
//! ```

use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::{BridgeConfig, DeliveryMode, ShutdownPolicy};
use crate::engine::{
    AccountId, BuddyId, CallId, Engine, EngineCallbacks, MwiView, NatDetectView, PagerStatusView,
    PagerView, RegInfoView, RxData, StatusReply, TransactionView, TransportView, TypingView,
};
use crate::error::{BridgeError, BridgeResult};
use crate::events::{Event, EventKind, EventPayload};
use crate::gateway::Gateway;
use crate::handler::{decision_status, EventHandler, HandlerRuntime, Reply};
use crate::queue::{event_queue, DrainHandle, DrainLoop, EventSender, QueueStats};
use crate::rendezvous::{wake_channel, Rendezvous, RendezvousStats};

/// Where captured events go
enum Delivery {
    /// Not started; events are dropped
    Idle,
    Queue(EventSender),
    Rendezvous(Arc<Rendezvous<HandlerRuntime>>),
    /// Stopped; events are dropped
    Stopped,
}

impl Delivery {
    fn name(&self) -> &'static str {
        match self {
            Delivery::Idle => "idle",
            Delivery::Queue(_) => "queue",
            Delivery::Rendezvous(_) => "rendezvous",
            Delivery::Stopped => "stopped",
        }
    }
}

/// State shared between the bridge and the callback sink
struct Shared {
    engine: Arc<dyn Engine>,
    delivery: RwLock<Delivery>,
    host: ThreadId,
    seq: AtomicU64,
    capture_failures: AtomicU64,
    dropped: AtomicU64,
}

/// Counters describing bridge traffic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Events captured so far
    pub captured: u64,
    /// Callbacks whose snapshot could not be taken
    pub capture_failures: u64,
    /// Captured events that had nowhere to go
    pub dropped: u64,
    pub queue: Option<QueueStats>,
    pub rendezvous: Option<RendezvousStats>,
}

/// The task that moves events to the handler, once spawned
enum PumpHandle {
    Queue(DrainHandle),
    Rendezvous(tokio::task::JoinHandle<BridgeResult<()>>),
}

impl PumpHandle {
    async fn finished(self) {
        match self {
            PumpHandle::Queue(handle) => match handle.finished().await {
                Some(summary) => debug!("Drain loop delivered {} events", summary.delivered),
                None => warn!("Drain loop ended without finishing"),
            },
            PumpHandle::Rendezvous(handle) => match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Rendezvous serve failed: {}", e),
                Err(e) => warn!("Rendezvous serve task failed: {}", e),
            },
        }
    }
}

/// Explicit context owning the engine, the handler and the delivery path
pub struct Bridge {
    gateway: Gateway,
    config: BridgeConfig,
    shared: Arc<Shared>,
    pump: Mutex<Option<PumpHandle>>,
}

impl Bridge {
    /// Validate `config` and create the engine instance
    pub fn try_new(engine: Arc<dyn Engine>, config: BridgeConfig) -> BridgeResult<Self> {
        config.validate()?;
        let gateway = Gateway::new(engine.clone(), &config);
        gateway.create_engine()?;

        info!("Bridge created with {:?} delivery", config.delivery);
        Ok(Self {
            gateway,
            config,
            shared: Arc::new(Shared {
                engine,
                delivery: RwLock::new(Delivery::Idle),
                host: thread::current().id(),
                seq: AtomicU64::new(0),
                capture_failures: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
            pump: Mutex::new(None),
        })
    }

    /// Like [`try_new`](Self::try_new), but aborts the process on failure
    ///
    /// No handler exists yet that could be told about the failure.
    pub fn new(engine: Arc<dyn Engine>, config: BridgeConfig) -> Self {
        match Self::try_new(engine, config) {
            Ok(bridge) => bridge,
            Err(e) => {
                error!("Fatal error creating bridge: {}", e);
                std::process::abort();
            }
        }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Thread the bridge was created on
    pub fn host_thread(&self) -> ThreadId {
        self.shared.host
    }

    pub fn is_running(&self) -> bool {
        matches!(
            *self.shared.delivery.read(),
            Delivery::Queue(_) | Delivery::Rendezvous(_)
        )
    }

    /// Register `handler`, start the engine and spawn the pump
    ///
    /// Must be called on the host thread, inside a `LocalSet`.
    pub fn start(&self, handler: impl EventHandler) -> BridgeResult<()> {
        if thread::current().id() != self.shared.host {
            return Err(BridgeError::invalid_state("bridge must be started on its host thread"));
        }
        {
            let delivery = self.shared.delivery.read();
            if !matches!(*delivery, Delivery::Idle) {
                return Err(BridgeError::invalid_state(format!(
                    "cannot start a bridge that is {}",
                    delivery.name()
                )));
            }
        }

        let runtime = HandlerRuntime::new(Box::new(handler), self.config.panic_policy());
        let pump = match self.config.delivery {
            DeliveryMode::Queue => {
                let (sender, receiver) = event_queue();
                *self.shared.delivery.write() = Delivery::Queue(sender);
                PumpHandle::Queue(DrainLoop::new(receiver, runtime).spawn())
            }
            DeliveryMode::Rendezvous => {
                let (waker, wakes) = wake_channel();
                let rendezvous = Arc::new(Rendezvous::new(runtime, waker));
                *self.shared.delivery.write() = Delivery::Rendezvous(rendezvous.clone());
                PumpHandle::Rendezvous(tokio::task::spawn_local(async move {
                    rendezvous.serve(wakes).await
                }))
            }
        };
        *self.pump.lock() = Some(pump);

        let sink = Arc::new(CallbackSink {
            shared: self.shared.clone(),
        });
        if let Err(e) = self.gateway.start_engine(sink) {
            error!("Failed to start engine: {}", e);
            self.close_delivery(Delivery::Idle);
            self.pump.lock().take();
            return Err(e);
        }

        info!("Bridge started");
        Ok(())
    }

    /// Stop delivery and destroy the engine
    ///
    /// Pending events are drained or discarded per the configured
    /// [`ShutdownPolicy`]. Calling `stop` again is a no-op.
    pub async fn stop(&self) -> BridgeResult<()> {
        if matches!(*self.shared.delivery.read(), Delivery::Stopped) {
            return Ok(());
        }
        self.close_delivery(Delivery::Stopped);

        let pump = self.pump.lock().take();
        if let Some(pump) = pump {
            pump.finished().await;
        }

        self.gateway.shutdown_engine()?;
        info!("Bridge stopped");
        Ok(())
    }

    /// Swap in `next` and shut the previous delivery path down
    fn close_delivery(&self, next: Delivery) {
        let previous = mem::replace(&mut *self.shared.delivery.write(), next);
        match previous {
            Delivery::Queue(sender) => {
                sender.close();
                if self.config.shutdown == ShutdownPolicy::Discard {
                    let discarded = sender.discard_pending();
                    info!("Discarded {} undelivered events", discarded);
                }
            }
            Delivery::Rendezvous(rendezvous) => rendezvous.stop(),
            Delivery::Idle | Delivery::Stopped => {}
        }
    }

    pub fn stats(&self) -> BridgeStats {
        let (queue, rendezvous) = match &*self.shared.delivery.read() {
            Delivery::Queue(sender) => (Some(sender.stats()), None),
            Delivery::Rendezvous(rendezvous) => (None, Some(rendezvous.stats())),
            Delivery::Idle | Delivery::Stopped => (None, None),
        };
        BridgeStats {
            captured: self.shared.seq.load(Ordering::Relaxed),
            capture_failures: self.shared.capture_failures.load(Ordering::Relaxed),
            dropped: self.shared.dropped.load(Ordering::Relaxed),
            queue,
            rendezvous,
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        if matches!(*self.shared.delivery.read(), Delivery::Stopped) {
            return;
        }
        warn!("Bridge dropped without stop; destroying engine");
        self.close_delivery(Delivery::Stopped);
        if let Err(e) = self.gateway.shutdown_engine() {
            warn!("{}", e);
        }
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("delivery", &self.shared.delivery.read().name())
            .field("config", &self.config)
            .finish()
    }
}

// ===== CALLBACK SINK =====

/// Target of every engine callback
///
/// Each callback captures its event on the calling thread, then hands it to
/// the delivery path. Request callbacks block until the handler decided.
struct CallbackSink {
    shared: Arc<Shared>,
}

impl CallbackSink {
    fn engine(&self) -> &dyn Engine {
        self.shared.engine.as_ref()
    }

    fn notify(&self, kind: EventKind, captured: BridgeResult<EventPayload>) {
        self.deliver(kind, captured);
    }

    /// Deliver a request event and return the handler's reply, or `Reply::None`
    fn request(&self, kind: EventKind, captured: BridgeResult<EventPayload>) -> Reply {
        self.deliver(kind, captured).unwrap_or_default()
    }

    fn deliver(&self, kind: EventKind, captured: BridgeResult<EventPayload>) -> Option<Reply> {
        let payload = match captured {
            Ok(payload) => payload,
            Err(e) => {
                self.shared.capture_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Dropping {} event, capture failed: {}", kind, e);
                return None;
            }
        };
        let seq = self.shared.seq.fetch_add(1, Ordering::Relaxed) + 1;
        let mut event = Event::new(seq, payload);

        enum Route {
            Queue(EventSender),
            Rendezvous(Arc<Rendezvous<HandlerRuntime>>),
            Nowhere(&'static str),
        }
        // Never block while holding the delivery lock.
        let route = match &*self.shared.delivery.read() {
            Delivery::Queue(sender) => Route::Queue(sender.clone()),
            Delivery::Rendezvous(rendezvous) => Route::Rendezvous(rendezvous.clone()),
            other => Route::Nowhere(other.name()),
        };

        match route {
            Route::Queue(sender) => {
                let slot = event.reply_slot();
                if let Err(rejected) = sender.enqueue(event) {
                    self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!("Queue closed, dropping {} (seq {})", kind, rejected.0.seq());
                    return None;
                }
                let slot = slot?;
                if thread::current().id() == self.shared.host {
                    // The drain loop runs on this very thread; waiting would deadlock.
                    warn!(
                        "{} raised on the host thread in queue mode; answering with the default",
                        kind
                    );
                    return None;
                }
                Some(slot.wait())
            }
            Route::Rendezvous(rendezvous) => match rendezvous.lock() {
                Ok(lock) => Some(lock.in_context(|runtime| runtime.dispatch(&mut event))),
                Err(e) => {
                    self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                    debug!("Dropping {} (seq {}): {}", kind, seq, e);
                    None
                }
            },
            Route::Nowhere(state) => {
                self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Bridge is {}, dropping {} (seq {})", state, kind, seq);
                None
            }
        }
    }

    fn status_reply(kind: EventKind, reply: &Reply) -> StatusReply {
        StatusReply {
            code: decision_status(kind, reply),
            reason: reply.reason().map(str::to_string),
        }
    }
}

impl EngineCallbacks for CallbackSink {
    fn on_call_state(&self, call_id: CallId) {
        self.notify(EventKind::CallState, EventPayload::call_state(self.engine(), call_id));
    }

    fn on_incoming_call(&self, acc_id: AccountId, call_id: CallId, rdata: &RxData<'_>) {
        self.notify(
            EventKind::IncomingCall,
            EventPayload::incoming_call(self.engine(), acc_id, call_id, rdata),
        );
    }

    fn on_call_tsx_state(&self, call_id: CallId, tsx: &TransactionView<'_>) {
        self.notify(EventKind::TsxState, EventPayload::tsx_state(self.engine(), call_id, tsx));
    }

    fn on_call_media_state(&self, call_id: CallId) {
        self.notify(EventKind::MediaState, EventPayload::media_state(self.engine(), call_id));
    }

    fn on_stream_created(&self, call_id: CallId, stream_idx: u32) {
        self.notify(
            EventKind::StreamCreated,
            EventPayload::stream_created(self.engine(), call_id, stream_idx),
        );
    }

    fn on_stream_destroyed(&self, call_id: CallId, stream_idx: u32) {
        self.notify(
            EventKind::StreamDestroyed,
            EventPayload::stream_destroyed(self.engine(), call_id, stream_idx),
        );
    }

    fn on_dtmf_digit(&self, call_id: CallId, digit: i32) {
        self.notify(EventKind::DtmfDigit, EventPayload::dtmf_digit(self.engine(), call_id, digit));
    }

    fn on_call_transfer_request(&self, call_id: CallId, dst: &str) -> u16 {
        let kind = EventKind::TransferRequest;
        let reply = self.request(kind, EventPayload::transfer_request(self.engine(), call_id, dst));
        decision_status(kind, &reply)
    }

    fn on_call_transfer_status(&self, call_id: CallId, st_code: i32, st_text: &str, is_final: bool) -> bool {
        let reply = self.request(
            EventKind::TransferStatus,
            EventPayload::transfer_status(self.engine(), call_id, st_code, st_text, is_final),
        );
        reply.continue_or(true)
    }

    fn on_call_replace_request(&self, call_id: CallId, rdata: &RxData<'_>) -> StatusReply {
        let kind = EventKind::CallReplaceRequest;
        let reply = self.request(kind, EventPayload::call_replace_request(self.engine(), call_id, rdata));
        Self::status_reply(kind, &reply)
    }

    fn on_call_replaced(&self, old_call_id: CallId, new_call_id: CallId) {
        self.notify(
            EventKind::CallReplaced,
            EventPayload::call_replaced(self.engine(), old_call_id, new_call_id),
        );
    }

    fn on_reg_state(&self, acc_id: AccountId) {
        self.notify(EventKind::RegState, EventPayload::reg_state(self.engine(), acc_id));
    }

    fn on_reg_state2(&self, acc_id: AccountId, info: &RegInfoView<'_>) {
        self.notify(EventKind::RegState2, EventPayload::reg_state2(self.engine(), acc_id, info));
    }

    fn on_incoming_subscribe(
        &self,
        acc_id: AccountId,
        buddy_id: BuddyId,
        from: &str,
        rdata: &RxData<'_>,
    ) -> StatusReply {
        let kind = EventKind::IncomingSubscribe;
        let reply = self.request(
            kind,
            EventPayload::incoming_subscribe(self.engine(), acc_id, buddy_id, from, rdata),
        );
        Self::status_reply(kind, &reply)
    }

    fn on_srv_subscribe_state(&self, acc_id: AccountId, remote_uri: &str, state: i32, event: Option<&str>) {
        self.notify(
            EventKind::SrvSubscribeState,
            EventPayload::srv_subscribe_state(self.engine(), acc_id, remote_uri, state, event),
        );
    }

    fn on_buddy_state(&self, buddy_id: BuddyId) {
        self.notify(EventKind::BuddyState, EventPayload::buddy_state(self.engine(), buddy_id));
    }

    fn on_buddy_evsub_state(&self, buddy_id: BuddyId, event: Option<&str>) {
        self.notify(
            EventKind::BuddyEvsubState,
            EventPayload::buddy_evsub_state(self.engine(), buddy_id, event),
        );
    }

    fn on_pager(&self, call_id: CallId, message: &PagerView<'_>) {
        self.notify(EventKind::Pager, EventPayload::pager(self.engine(), call_id, message));
    }

    fn on_pager2(&self, call_id: CallId, message: &PagerView<'_>, rdata: &RxData<'_>, acc_id: AccountId) {
        self.notify(
            EventKind::Pager2,
            EventPayload::pager2(self.engine(), call_id, message, rdata, acc_id),
        );
    }

    fn on_pager_status(&self, call_id: CallId, status: &PagerStatusView<'_>) {
        self.notify(
            EventKind::PagerStatus,
            EventPayload::pager_status(self.engine(), call_id, status),
        );
    }

    fn on_pager_status2(&self, call_id: CallId, status: &PagerStatusView<'_>, acc_id: AccountId) {
        self.notify(
            EventKind::PagerStatus2,
            EventPayload::pager_status2(self.engine(), call_id, status, acc_id),
        );
    }

    fn on_typing(&self, call_id: CallId, typing: &TypingView<'_>) {
        self.notify(EventKind::Typing, EventPayload::typing(self.engine(), call_id, typing));
    }

    fn on_typing2(&self, call_id: CallId, typing: &TypingView<'_>, rdata: &RxData<'_>, acc_id: AccountId) {
        self.notify(
            EventKind::Typing2,
            EventPayload::typing2(self.engine(), call_id, typing, rdata, acc_id),
        );
    }

    fn on_nat_detect(&self, result: &NatDetectView<'_>) {
        self.notify(EventKind::NatDetect, Ok(EventPayload::nat_detect(result)));
    }

    fn on_mwi_info(&self, acc_id: AccountId, info: &MwiView<'_>) {
        self.notify(EventKind::MwiInfo, EventPayload::mwi_info(self.engine(), acc_id, info));
    }

    fn on_transport_state(&self, transport: &TransportView<'_>, state: i32, status: i32) {
        self.notify(
            EventKind::TransportState,
            Ok(EventPayload::transport_state(transport, state, status)),
        );
    }

    fn on_ice_transport_error(&self, index: i32, op: i32, status: i32) {
        self.notify(
            EventKind::IceTransportError,
            Ok(EventPayload::ice_transport_error(index, op, status)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::simulated::{Operation, SimulatedEngine};
    use crate::engine::EngineStatus;
    use serde_json::Value;
    use tokio::task::LocalSet;

    fn quiet_config() -> BridgeConfig {
        BridgeConfig::default().with_fatal_handler_panics(false)
    }

    fn ignore(_: &str, _: &Value) -> Reply {
        Reply::None
    }

    #[test]
    fn test_create_failure_is_reported() {
        let engine = SimulatedEngine::new();
        engine.fail_with(Operation::Create, EngineStatus::EBUSY);
        let error = Bridge::try_new(Arc::new(engine.clone()), quiet_config()).unwrap_err();
        assert_eq!(error.to_string(), "Error creating engine: Object is busy");
        assert_eq!(engine.count(Operation::Init), 0);
    }

    #[test]
    fn test_invalid_config_rejected_before_engine() {
        let engine = SimulatedEngine::new();
        let config = quiet_config().with_console_log_level(9);
        assert!(Bridge::try_new(Arc::new(engine.clone()), config).is_err());
        assert!(engine.invocations().is_empty());
    }

    #[tokio::test]
    async fn test_start_twice_rejected() {
        let engine = SimulatedEngine::new();
        let bridge = Bridge::try_new(Arc::new(engine), quiet_config()).unwrap();
        LocalSet::new()
            .run_until(async {
                bridge.start(ignore).unwrap();
                assert!(matches!(bridge.start(ignore), Err(BridgeError::InvalidState { .. })));
                bridge.stop().await.unwrap();
                assert!(bridge.start(ignore).is_err());
            })
            .await;
    }

    #[tokio::test]
    async fn test_failed_engine_start_resets_delivery() {
        let engine = SimulatedEngine::new();
        engine.fail_with(Operation::Start, EngineStatus::EINVALIDOP);
        let bridge = Bridge::try_new(Arc::new(engine), quiet_config()).unwrap();
        LocalSet::new()
            .run_until(async {
                let error = bridge.start(ignore).unwrap_err();
                assert_eq!(error.to_string(), "Error starting engine: Invalid operation");
                assert!(!bridge.is_running());
            })
            .await;
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_and_destroys_engine() {
        let engine = SimulatedEngine::new();
        let bridge = Bridge::try_new(Arc::new(engine.clone()), quiet_config()).unwrap();
        LocalSet::new()
            .run_until(async {
                bridge.start(ignore).unwrap();
                bridge.stop().await.unwrap();
                bridge.stop().await.unwrap();
            })
            .await;
        assert!(engine.is_destroyed());
        assert_eq!(engine.count(Operation::Destroy), 1);
        assert!(engine.callbacks().is_none());
    }

    #[tokio::test]
    async fn test_request_on_host_thread_gets_default_in_queue_mode() {
        let engine = SimulatedEngine::new();
        let bridge = Bridge::try_new(Arc::new(engine.clone()), quiet_config()).unwrap();
        LocalSet::new()
            .run_until(async {
                bridge.start(|_: &str, _: &Value| Reply::Status(603)).unwrap();
                let account = bridge.gateway().add_account("2002", "example.com", "secret").unwrap();
                let call = bridge.gateway().make_call(account, "sip:bob@example.com").unwrap();

                let callbacks = engine.callbacks().unwrap();
                assert_eq!(callbacks.on_call_transfer_request(call, "sip:carol@example.com"), 202);
                assert_eq!(bridge.stats().queue.map(|queue| queue.enqueued > 0), Some(true));
                bridge.stop().await.unwrap();
            })
            .await;
    }

    #[test]
    fn test_capture_failure_answers_with_default() {
        let engine = SimulatedEngine::new();
        let bridge = Bridge::try_new(Arc::new(engine.clone()), quiet_config()).unwrap();
        let sink = CallbackSink {
            shared: bridge.shared.clone(),
        };
        // Call 42 does not exist, so the snapshot cannot be taken.
        assert_eq!(sink.on_call_transfer_request(42, "sip:carol@example.com"), 202);
        assert!(sink.on_call_transfer_status(42, 200, "OK", true));
        assert_eq!(bridge.stats().capture_failures, 2);
        assert_eq!(bridge.stats().captured, 0);
    }

    #[test]
    fn test_events_before_start_are_dropped() {
        let engine = SimulatedEngine::new();
        let bridge = Bridge::try_new(Arc::new(engine), quiet_config()).unwrap();
        let sink = CallbackSink {
            shared: bridge.shared.clone(),
        };
        sink.on_ice_transport_error(0, 1, 70004);
        let stats = bridge.stats();
        assert_eq!(stats.captured, 1);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn test_status_reply_keeps_reason() {
        let reply = Reply::Reason {
            code: 488,
            reason: "Not Here".to_string(),
        };
        let status = CallbackSink::status_reply(EventKind::CallReplaceRequest, &reply);
        assert_eq!(status.code, 488);
        assert_eq!(status.reason.as_deref(), Some("Not Here"));
        assert_eq!(
            CallbackSink::status_reply(EventKind::IncomingSubscribe, &Reply::None),
            StatusReply::new(200)
        );
    }
}
