//! Event queue and drain loop
//!
//! Callback threads push captured events into an unbounded FIFO; a single
//! consumer on the host thread pulls them out one at a time. Pushing takes the
//! queue lock for the duration of one `VecDeque::push_back` and never waits for
//! the consumer.
//!
//! The [`DrainLoop`] is the consumer as a cooperative task: it waits for one
//! event, hands it to the handler, relays the reply for request kinds, then
//! schedules itself again with `spawn_local` instead of looping, so the host
//! thread gets to run other pending work between events.
//!
//! ```text
//! callback thread ─┐
//! callback thread ─┼─► EventSender::enqueue ─► [ VecDeque ] ─► EventReceiver::drain_once ─► handler
//! callback thread ─┘        (lock, push, signal)                  (one event per task run)
//! ```

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use thiserror::Error;
use tokio::sync::{oneshot, Notify};
use tracing::{debug, info};

use crate::events::Event;
use crate::handler::HandlerRuntime;

/// Returned by [`EventSender::enqueue`] once the queue is closed; carries the rejected event
#[derive(Debug, Error)]
#[error("event queue is closed")]
pub struct EnqueueError(pub Event);

/// Counters describing queue traffic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub delivered: u64,
    pub discarded: u64,
    pub depth: usize,
}

struct QueueState {
    events: VecDeque<Event>,
    closed: bool,
}

struct Shared {
    state: Mutex<QueueState>,
    /// Wakes a consumer blocked in `blocking_drain_once`
    not_empty: Condvar,
    /// Wakes a consumer awaiting in `drain_once`
    notify: Notify,
    enqueued: AtomicU64,
    delivered: AtomicU64,
    discarded: AtomicU64,
}

/// Create a queue, returning the producer and consumer halves
pub fn event_queue() -> (EventSender, EventReceiver) {
    let shared = Arc::new(Shared {
        state: Mutex::new(QueueState {
            events: VecDeque::new(),
            closed: false,
        }),
        not_empty: Condvar::new(),
        notify: Notify::new(),
        enqueued: AtomicU64::new(0),
        delivered: AtomicU64::new(0),
        discarded: AtomicU64::new(0),
    });
    (
        EventSender {
            shared: shared.clone(),
        },
        EventReceiver { shared },
    )
}

/// Producer half, cloned into every callback stub
#[derive(Clone)]
pub struct EventSender {
    shared: Arc<Shared>,
}

impl EventSender {
    /// Append an event and wake the consumer
    pub fn enqueue(&self, event: Event) -> Result<(), EnqueueError> {
        let seq = event.seq();
        let name = event.name();
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(EnqueueError(event));
            }
            state.events.push_back(event);
            self.shared.enqueued.fetch_add(1, Ordering::Relaxed);
            self.shared.not_empty.notify_one();
        }
        self.shared.notify.notify_one();
        debug!("Enqueued event {} (seq {})", name, seq);
        Ok(())
    }

    /// Stop accepting events; already queued events remain drainable
    pub fn close(&self) {
        close(&self.shared);
    }

    /// Drop every queued event, returning how many were dropped
    ///
    /// Dropping a request event answers its callback thread with the default.
    pub fn discard_pending(&self) -> usize {
        discard_pending(&self.shared)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    pub fn stats(&self) -> QueueStats {
        stats(&self.shared)
    }
}

/// Consumer half; there is exactly one
pub struct EventReceiver {
    shared: Arc<Shared>,
}

impl EventReceiver {
    fn pop(&self) -> Option<Event> {
        let event = self.shared.state.lock().events.pop_front();
        if event.is_some() {
            self.shared.delivered.fetch_add(1, Ordering::Relaxed);
        }
        event
    }

    /// Take the next event without waiting
    pub fn try_drain(&mut self) -> Option<Event> {
        self.pop()
    }

    /// Wait for the next event
    ///
    /// Returns `None` once the queue is closed and empty.
    pub async fn drain_once(&mut self) -> Option<Event> {
        loop {
            {
                let mut state = self.shared.state.lock();
                if let Some(event) = state.events.pop_front() {
                    self.shared.delivered.fetch_add(1, Ordering::Relaxed);
                    return Some(event);
                }
                if state.closed {
                    return None;
                }
            }
            // notify_one stores a permit when nobody waits, so a push between the
            // check above and this await is not lost.
            self.shared.notify.notified().await;
        }
    }

    /// Blocking variant of [`drain_once`](Self::drain_once) for consumers outside a runtime
    pub fn blocking_drain_once(&mut self) -> Option<Event> {
        let mut state = self.shared.state.lock();
        loop {
            if let Some(event) = state.events.pop_front() {
                self.shared.delivered.fetch_add(1, Ordering::Relaxed);
                return Some(event);
            }
            if state.closed {
                return None;
            }
            self.shared.not_empty.wait(&mut state);
        }
    }

    pub fn close(&self) {
        close(&self.shared);
    }

    pub fn discard_pending(&self) -> usize {
        discard_pending(&self.shared)
    }

    pub fn stats(&self) -> QueueStats {
        stats(&self.shared)
    }
}

/// Without a consumer nothing would ever answer queued request events
impl Drop for EventReceiver {
    fn drop(&mut self) {
        close(&self.shared);
        discard_pending(&self.shared);
    }
}

fn close(shared: &Shared) {
    let mut state = shared.state.lock();
    if !state.closed {
        state.closed = true;
        shared.not_empty.notify_all();
        drop(state);
        shared.notify.notify_one();
        info!("Event queue closed");
    }
}

fn discard_pending(shared: &Shared) -> usize {
    let dropped: Vec<Event> = shared.state.lock().events.drain(..).collect();
    let count = dropped.len();
    shared.discarded.fetch_add(count as u64, Ordering::Relaxed);
    // Dropped outside the lock: request events wake their callback threads here.
    drop(dropped);
    if count > 0 {
        info!("Discarded {} pending events", count);
    }
    count
}

fn stats(shared: &Shared) -> QueueStats {
    QueueStats {
        enqueued: shared.enqueued.load(Ordering::Relaxed),
        delivered: shared.delivered.load(Ordering::Relaxed),
        discarded: shared.discarded.load(Ordering::Relaxed),
        depth: shared.state.lock().events.len(),
    }
}

/// Summary reported when a drain loop finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainSummary {
    pub delivered: u64,
}

/// Cooperative consumer that delivers one event per scheduled run
pub struct DrainLoop {
    receiver: EventReceiver,
    runtime: HandlerRuntime,
    delivered: u64,
    done: Option<oneshot::Sender<DrainSummary>>,
}

/// Completion handle of a spawned [`DrainLoop`]
pub struct DrainHandle {
    done: oneshot::Receiver<DrainSummary>,
}

impl DrainHandle {
    /// Wait until the loop has seen the queue closed and empty
    ///
    /// Returns `None` if the loop died without finishing (the handler panicked
    /// under [`PanicPolicy::Propagate`](crate::handler::PanicPolicy::Propagate)).
    pub async fn finished(self) -> Option<DrainSummary> {
        self.done.await.ok()
    }
}

impl DrainLoop {
    pub fn new(receiver: EventReceiver, runtime: HandlerRuntime) -> Self {
        Self {
            receiver,
            runtime,
            delivered: 0,
            done: None,
        }
    }

    /// Schedule the loop on the current `LocalSet`
    ///
    /// Must be called from within a `LocalSet` context.
    pub fn spawn(mut self) -> DrainHandle {
        let (tx, rx) = oneshot::channel();
        self.done = Some(tx);
        self.schedule();
        DrainHandle { done: rx }
    }

    fn schedule(self) {
        tokio::task::spawn_local(self.run_once());
    }

    async fn run_once(mut self) {
        match self.receiver.drain_once().await {
            Some(event) => {
                self.deliver(event);
                self.schedule();
            }
            None => {
                info!("Drain loop finished after {} events", self.delivered);
                if let Some(done) = self.done.take() {
                    let _ = done.send(DrainSummary {
                        delivered: self.delivered,
                    });
                }
            }
        }
    }

    /// Deliver a single event to the handler
    pub fn deliver(&mut self, mut event: Event) {
        debug!("Delivering event {} (seq {})", event.name(), event.seq());
        self.runtime.dispatch(&mut event);
        self.delivered += 1;
    }

    /// Deliver everything currently queued without yielding; returns the count
    pub fn deliver_pending(&mut self) -> usize {
        let mut count = 0;
        while let Some(event) = self.receiver.try_drain() {
            self.deliver(event);
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventPayload;
    use crate::handler::{PanicPolicy, Reply};
    use serde_json::Value;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn event(seq: u64) -> Event {
        Event::new(seq, EventPayload::ice_transport_error(seq as i32, 0, 0))
    }

    fn recording_runtime() -> (HandlerRuntime, mpsc::Receiver<(String, Value)>) {
        let (tx, rx) = mpsc::channel();
        let handler = move |name: &str, payload: &Value| {
            let _ = tx.send((name.to_string(), payload.clone()));
            Reply::None
        };
        (HandlerRuntime::new(Box::new(handler), PanicPolicy::Propagate), rx)
    }

    #[test]
    fn test_fifo_single_producer() {
        let (tx, mut rx) = event_queue();
        for seq in 0..5 {
            tx.enqueue(event(seq)).unwrap();
        }
        let order: Vec<u64> = std::iter::from_fn(|| rx.try_drain()).map(|e| e.seq()).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_enqueue_after_close_returns_event() {
        let (tx, mut rx) = event_queue();
        tx.enqueue(event(1)).unwrap();
        tx.close();
        let rejected = tx.enqueue(event(2)).unwrap_err();
        assert_eq!(rejected.0.seq(), 2);
        // Closing keeps what was queued before.
        assert_eq!(rx.blocking_drain_once().map(|e| e.seq()), Some(1));
        assert!(rx.blocking_drain_once().is_none());
    }

    #[test]
    fn test_blocking_consumer_wakes_on_push() {
        let (tx, mut rx) = event_queue();
        let consumer = thread::spawn(move || rx.blocking_drain_once().map(|e| e.seq()));
        thread::sleep(Duration::from_millis(20));
        tx.enqueue(event(42)).unwrap();
        assert_eq!(consumer.join().unwrap(), Some(42));
    }

    #[test]
    fn test_discard_counts_and_stats() {
        let (tx, mut rx) = event_queue();
        for seq in 0..3 {
            tx.enqueue(event(seq)).unwrap();
        }
        rx.try_drain();
        assert_eq!(tx.discard_pending(), 2);
        assert_eq!(
            tx.stats(),
            QueueStats {
                enqueued: 3,
                delivered: 1,
                discarded: 2,
                depth: 0,
            }
        );
    }

    #[test]
    fn test_dropped_receiver_releases_request_waiters() {
        use crate::engine::{MockEngine, RawCallInfo};

        let mut engine = MockEngine::new();
        engine.expect_call_get_info().returning(|call_id| {
            Ok(RawCallInfo {
                id: call_id,
                ..Default::default()
            })
        });
        let payload = EventPayload::transfer_request(&engine, 3, "sip:carol@example.com").unwrap();
        let request = Event::new(1, payload);
        let slot = request.reply_slot().unwrap();

        let (tx, rx) = event_queue();
        tx.enqueue(request).unwrap();
        drop(rx);

        assert_eq!(slot.wait_timeout(Duration::from_secs(1)), Some(Reply::None));
        assert!(tx.is_closed());
        assert_eq!(tx.stats().discarded, 1);
    }

    #[tokio::test]
    async fn test_async_drain_waits_for_producer_thread() {
        let (tx, mut rx) = event_queue();
        let producer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            tx.enqueue(event(7)).unwrap();
            tx.close();
        });
        assert_eq!(rx.drain_once().await.map(|e| e.seq()), Some(7));
        assert!(rx.drain_once().await.is_none());
        producer.join().unwrap();
    }

    #[tokio::test]
    async fn test_drain_loop_delivers_and_finishes() {
        let (tx, rx) = event_queue();
        let (runtime, seen) = recording_runtime();
        let local = tokio::task::LocalSet::new();

        let summary = local
            .run_until(async move {
                let handle = DrainLoop::new(rx, runtime).spawn();
                for seq in 0..3 {
                    tx.enqueue(event(seq)).unwrap();
                }
                tx.close();
                handle.finished().await
            })
            .await;

        assert_eq!(summary, Some(DrainSummary { delivered: 3 }));
        let names: Vec<String> = seen.try_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["ice_transport_error"; 3]);
    }

    #[tokio::test]
    async fn test_drain_loop_yields_between_events() {
        let (tx, rx) = event_queue();
        let (runtime, _seen) = recording_runtime();
        let local = tokio::task::LocalSet::new();
        let ticks = std::rc::Rc::new(std::cell::Cell::new(0u32));

        local
            .run_until(async {
                for seq in 0..50 {
                    tx.enqueue(event(seq)).unwrap();
                }
                tx.close();
                let handle = DrainLoop::new(rx, runtime).spawn();
                let observer = {
                    let ticks = ticks.clone();
                    tokio::task::spawn_local(async move {
                        loop {
                            ticks.set(ticks.get() + 1);
                            tokio::task::yield_now().await;
                        }
                    })
                };
                handle.finished().await;
                observer.abort();
            })
            .await;

        // Another local task ran while the 50 events were being delivered.
        assert!(ticks.get() > 1);
    }
}
