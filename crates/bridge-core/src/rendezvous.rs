//! Thread rendezvous
//!
//! A [`Rendezvous`] lets a thread the engine owns take exclusive control of
//! state that belongs to the host's single worker thread. The worker thread
//! holds the state's execution rights while it runs; a callback thread that
//! needs the state asks the worker to suspend, waits until it has, takes the
//! rights over, and gives them back when its [`Lock`] is dropped.
//!
//! # Hand-off
//!
//! ```text
//! callback thread                          worker thread (event loop)
//! ───────────────                          ──────────────────────────
//! lock()
//!   take gate
//!   waker.wake()  ───────────────────────► serve() receives wake
//!   wait "proceed"                           suspend():
//!                                              store ExecutionContext
//!                                              release execution rights
//!                 ◄───────────────────────     raise "proceed"
//!   acquire execution rights                   wait "complete"
//!   take ExecutionContext                          │
//!   ... run handler ...                            │ (blocked)
//! drop(Lock)                                       │
//!   drop ExecutionContext                          │
//!   release execution rights                       │
//!   raise "complete"  ───────────────────────► reacquire execution rights
//!   release gate                             back to the event loop
//! ```
//!
//! The gate admits one callback thread at a time, so every wake is paired
//! with exactly one suspension. Both signals are flag-based: a raise that
//! happens before the matching wait is not lost.
//!
//! Calls made on the worker thread itself (the engine calling back
//! synchronously from inside an engine operation) find the worker already
//! holding the execution rights. They reenter without a hand-off.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rvoip_bridge_core::rendezvous::{wake_channel, Rendezvous};
//!
//! # async fn run() {
//! let (waker, wakes) = wake_channel();
//! let rendezvous = Arc::new(Rendezvous::new(Vec::<String>::new(), waker));
//!
//! let remote = rendezvous.clone();
//! std::thread::spawn(move || {
//!     if let Ok(state) = remote.lock() {
//!         println!("worker is parked, {} entries", state.len());
//!     }
//!     remote.stop();
//! });
//!
//! let local = tokio::task::LocalSet::new();
//! local.run_until(rendezvous.serve(wakes)).await.unwrap();
//! # }
//! ```

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard, ReentrantMutex, ReentrantMutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info, Span};

use crate::error::{BridgeError, BridgeResult};

/// Capability to wake the worker thread's event loop
pub trait WakeSignal: Send + Sync {
    fn wake(&self);
}

/// [`WakeSignal`] backed by a channel the worker's event loop listens on
#[derive(Clone)]
pub struct ChannelWake {
    tx: mpsc::UnboundedSender<()>,
}

impl WakeSignal for ChannelWake {
    fn wake(&self) {
        // The receiver only goes away once the worker stopped serving.
        let _ = self.tx.send(());
    }
}

/// Worker-side end of a [`wake_channel`]
pub struct WakeReceiver {
    rx: mpsc::UnboundedReceiver<()>,
}

impl WakeReceiver {
    pub async fn recv(&mut self) -> Option<()> {
        self.rx.recv().await
    }
}

/// Create a wake signal and the receiver [`Rendezvous::serve`] consumes
pub fn wake_channel() -> (ChannelWake, WakeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelWake { tx }, WakeReceiver { rx })
}

/// What the worker thread was doing when it suspended
///
/// Handed to the callback thread for the duration of its [`Lock`] and dropped
/// with it.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    scope: String,
    span: Span,
    suspended_at: Instant,
}

impl ExecutionContext {
    fn capture(scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
            span: Span::current(),
            suspended_at: Instant::now(),
        }
    }

    /// Label the worker suspended under
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// The tracing span that was current on the worker thread
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn suspended_for(&self) -> Duration {
        self.suspended_at.elapsed()
    }
}

/// Binary signal; raising an already raised signal is a no-op
struct Signal {
    raised: Mutex<bool>,
    cond: Condvar,
}

impl Signal {
    fn new() -> Self {
        Self {
            raised: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    fn raise(&self) {
        let mut raised = self.raised.lock();
        *raised = true;
        self.cond.notify_one();
    }

    /// Wait for the signal and consume it
    fn wait(&self) {
        let mut raised = self.raised.lock();
        while !*raised {
            self.cond.wait(&mut raised);
        }
        *raised = false;
    }
}

/// Counters describing rendezvous traffic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RendezvousStats {
    /// Completed cross-thread hand-offs
    pub handoffs: u64,
    /// Acquisitions on the worker thread that skipped the hand-off
    pub reentrant: u64,
    /// Total time the worker spent suspended
    pub suspended: Duration,
}

/// Hand-off lock between the worker thread and callback threads
pub struct Rendezvous<S> {
    worker: ThreadId,
    runtime: ReentrantMutex<S>,
    gate: Mutex<()>,
    context: Mutex<Option<ExecutionContext>>,
    proceed: Signal,
    complete: Signal,
    waker: Box<dyn WakeSignal>,
    stopped: AtomicBool,
    handoffs: AtomicU64,
    reentrant: AtomicU64,
    suspended_nanos: AtomicU64,
}

impl<S> Rendezvous<S> {
    /// Create a rendezvous owned by the calling thread
    pub fn new(state: S, waker: impl WakeSignal + 'static) -> Self {
        Self {
            worker: thread::current().id(),
            runtime: ReentrantMutex::new(state),
            gate: Mutex::new(()),
            context: Mutex::new(None),
            proceed: Signal::new(),
            complete: Signal::new(),
            waker: Box::new(waker),
            stopped: AtomicBool::new(false),
            handoffs: AtomicU64::new(0),
            reentrant: AtomicU64::new(0),
            suspended_nanos: AtomicU64::new(0),
        }
    }

    pub fn worker(&self) -> ThreadId {
        self.worker
    }

    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.worker
    }

    /// Take the execution rights as the worker thread
    pub fn enter(&self) -> BridgeResult<WorkerGuard<'_, S>> {
        if !self.is_worker_thread() {
            return Err(BridgeError::invalid_state(
                "rendezvous can only be entered from its worker thread",
            ));
        }
        Ok(WorkerGuard {
            rendezvous: self,
            guard: self.runtime.lock(),
        })
    }

    /// Acquire the worker's state from any thread
    ///
    /// On a foreign thread this blocks until the worker has suspended; there
    /// is no timeout. On the worker thread it returns immediately.
    pub fn lock(&self) -> BridgeResult<Lock<'_, S>> {
        if self.is_worker_thread() {
            self.reentrant.fetch_add(1, Ordering::Relaxed);
            return Ok(Lock {
                rendezvous: self,
                context: None,
                runtime: Some(self.runtime.lock()),
                gate: None,
            });
        }

        let gate = self.gate.lock();
        if self.is_stopped() {
            return Err(BridgeError::rendezvous_stopped("worker is no longer serving"));
        }

        debug!("Requesting worker suspension from {:?}", thread::current().id());
        self.waker.wake();
        self.proceed.wait();

        if self.is_stopped() {
            // The worker may have suspended for us before seeing the stop.
            self.complete.raise();
            return Err(BridgeError::rendezvous_stopped("stopped while waiting for the worker"));
        }

        let runtime = self.runtime.lock();
        let context = self.context.lock().take();
        Ok(Lock {
            rendezvous: self,
            context,
            runtime: Some(runtime),
            gate: Some(gate),
        })
    }

    /// Stop serving hand-offs
    ///
    /// Waiting and future [`lock`](Self::lock) calls from foreign threads fail
    /// with [`BridgeError::RendezvousStopped`]; [`serve`](Self::serve) returns.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Stopping rendezvous");
        self.proceed.raise();
        self.waker.wake();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Suspend on every wake until stopped
    ///
    /// Runs on the worker thread, typically as a `spawn_local` task. Other
    /// tasks on the same thread must not hold a [`Lock`] across an await,
    /// or the suspension cannot release the execution rights.
    pub async fn serve(&self, mut wakes: WakeReceiver) -> BridgeResult<()> {
        let mut guard = self.enter()?;
        info!("Rendezvous serving on {:?}", self.worker);
        while wakes.recv().await.is_some() {
            if self.is_stopped() {
                break;
            }
            guard.suspend("serve");
        }
        info!("Rendezvous finished after {} hand-offs", self.stats().handoffs);
        Ok(())
    }

    pub fn stats(&self) -> RendezvousStats {
        RendezvousStats {
            handoffs: self.handoffs.load(Ordering::Relaxed),
            reentrant: self.reentrant.load(Ordering::Relaxed),
            suspended: Duration::from_nanos(self.suspended_nanos.load(Ordering::Relaxed)),
        }
    }
}

impl<S> fmt::Debug for Rendezvous<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rendezvous")
            .field("worker", &self.worker)
            .field("stopped", &self.is_stopped())
            .field("stats", &self.stats())
            .finish()
    }
}

/// The worker thread's hold on the execution rights
pub struct WorkerGuard<'a, S> {
    rendezvous: &'a Rendezvous<S>,
    guard: ReentrantMutexGuard<'a, S>,
}

impl<S> WorkerGuard<'_, S> {
    /// Park this thread while one callback thread holds the state
    ///
    /// Must only be called after a wake; returns how long the thread was
    /// suspended.
    pub fn suspend(&mut self, scope: &str) -> Duration {
        let rendezvous = self.rendezvous;
        if rendezvous.is_stopped() {
            return Duration::ZERO;
        }

        let started = Instant::now();
        *rendezvous.context.lock() = Some(ExecutionContext::capture(scope));
        ReentrantMutexGuard::unlocked(&mut self.guard, || {
            rendezvous.proceed.raise();
            rendezvous.complete.wait();
        });
        // Left behind if the waiting thread bailed out on stop.
        rendezvous.context.lock().take();

        let elapsed = started.elapsed();
        rendezvous
            .suspended_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        debug!("Worker resumed after {:?} in {}", elapsed, scope);
        elapsed
    }
}

impl<S> Deref for WorkerGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.guard
    }
}

/// A thread's exclusive hold on the worker's state
///
/// Dropping it releases the captured context, then the execution rights, and
/// then resumes the worker without waiting for it.
pub struct Lock<'a, S> {
    rendezvous: &'a Rendezvous<S>,
    context: Option<ExecutionContext>,
    runtime: Option<ReentrantMutexGuard<'a, S>>,
    gate: Option<MutexGuard<'a, ()>>,
}

impl<S> Lock<'_, S> {
    /// Context the worker suspended with; `None` for a reentrant lock
    pub fn context(&self) -> Option<&ExecutionContext> {
        self.context.as_ref()
    }

    pub fn is_reentrant(&self) -> bool {
        self.gate.is_none()
    }

    /// Run `f` inside the worker's tracing span
    pub fn in_context<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        match &self.context {
            Some(context) => context.span.in_scope(|| f(&**self)),
            None => f(&**self),
        }
    }
}

impl<S> Deref for Lock<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        match &self.runtime {
            Some(runtime) => runtime,
            None => unreachable!("runtime guard is only released on drop"),
        }
    }
}

impl<S> Drop for Lock<'_, S> {
    fn drop(&mut self) {
        self.context.take();
        self.runtime.take();
        if let Some(gate) = self.gate.take() {
            self.rendezvous.handoffs.fetch_add(1, Ordering::Relaxed);
            self.rendezvous.complete.raise();
            drop(gate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::{mpsc as std_mpsc, Arc};

    #[derive(Default, Clone)]
    struct CountingWake {
        count: Arc<AtomicUsize>,
    }

    impl WakeSignal for CountingWake {
        fn wake(&self) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_worker_thread_reenters_without_handoff() {
        let waker = CountingWake::default();
        let rendezvous = Rendezvous::new(5u32, waker.clone());

        let outer = rendezvous.enter().unwrap();
        let inner = rendezvous.lock().unwrap();
        assert!(inner.is_reentrant());
        assert!(inner.context().is_none());
        assert_eq!(*inner, 5);
        drop(inner);
        drop(outer);

        assert_eq!(waker.count.load(Ordering::SeqCst), 0);
        assert_eq!(rendezvous.stats().reentrant, 1);
        assert_eq!(rendezvous.stats().handoffs, 0);
    }

    #[test]
    fn test_enter_rejected_off_worker_thread() {
        let rendezvous = Arc::new(Rendezvous::new((), CountingWake::default()));
        let remote = rendezvous.clone();
        let result = thread::spawn(move || remote.enter().map(|_| ()))
            .join()
            .unwrap();
        assert!(matches!(result, Err(BridgeError::InvalidState { .. })));
    }

    #[tokio::test]
    async fn test_worker_is_parked_while_lock_is_held() {
        let (waker, wakes) = wake_channel();
        let rendezvous = Arc::new(Rendezvous::new(String::from("host state"), waker));
        let held = Arc::new(AtomicBool::new(false));
        let violations = Arc::new(AtomicUsize::new(0));

        let remote = rendezvous.clone();
        let remote_held = held.clone();
        let callback = thread::spawn(move || {
            let lock = remote.lock().unwrap();
            remote_held.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            let scope = lock.context().map(|context| context.scope().to_string());
            let state = (*lock).clone();
            remote_held.store(false, Ordering::SeqCst);
            drop(lock);
            remote.stop();
            (scope, state)
        });

        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let ticker = {
                    let held = held.clone();
                    let violations = violations.clone();
                    tokio::task::spawn_local(async move {
                        loop {
                            if held.load(Ordering::SeqCst) {
                                violations.fetch_add(1, Ordering::SeqCst);
                            }
                            tokio::task::yield_now().await;
                        }
                    })
                };
                rendezvous.serve(wakes).await.unwrap();
                ticker.abort();
            })
            .await;

        let (scope, state) = callback.join().unwrap();
        assert_eq!(scope.as_deref(), Some("serve"));
        assert_eq!(state, "host state");
        assert_eq!(violations.load(Ordering::SeqCst), 0);

        let stats = rendezvous.stats();
        assert_eq!(stats.handoffs, 1);
        assert!(stats.suspended >= Duration::from_millis(50));
        assert!(rendezvous.context.lock().is_none());
    }

    #[tokio::test]
    async fn test_callback_threads_are_serialized() {
        let (waker, wakes) = wake_channel();
        let rendezvous = Arc::new(Rendezvous::new(AtomicUsize::new(0), waker));
        let inside = Arc::new(AtomicUsize::new(0));

        let callbacks: Vec<_> = (0..4)
            .map(|_| {
                let remote = rendezvous.clone();
                let inside = inside.clone();
                thread::spawn(move || {
                    let lock = remote.lock().unwrap();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    lock.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(5));
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();

        let stopper = {
            let remote = rendezvous.clone();
            thread::spawn(move || {
                for callback in callbacks {
                    callback.join().unwrap();
                }
                remote.stop();
            })
        };

        let local = tokio::task::LocalSet::new();
        local.run_until(rendezvous.serve(wakes)).await.unwrap();
        stopper.join().unwrap();

        assert_eq!(rendezvous.enter().unwrap().load(Ordering::SeqCst), 4);
        assert_eq!(rendezvous.stats().handoffs, 4);
    }

    #[test]
    fn test_stalled_worker_detected_and_released_by_stop() {
        // Nobody serves wakes: the callback thread waits forever until stopped.
        let rendezvous = Arc::new(Rendezvous::new((), CountingWake::default()));
        let (tx, rx) = std_mpsc::channel();

        let remote = rendezvous.clone();
        let callback = thread::spawn(move || {
            let outcome = remote.lock().map(|_| ());
            let _ = tx.send(outcome);
        });

        assert_eq!(
            rx.recv_timeout(Duration::from_millis(100)),
            Err(std_mpsc::RecvTimeoutError::Timeout)
        );

        rendezvous.stop();
        let outcome = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(outcome, Err(BridgeError::RendezvousStopped { .. })));
        callback.join().unwrap();
    }

    #[test]
    fn test_lock_after_stop_fails_fast() {
        let rendezvous = Arc::new(Rendezvous::new((), CountingWake::default()));
        rendezvous.stop();
        rendezvous.stop();

        let remote = rendezvous.clone();
        let outcome = thread::spawn(move || remote.lock().map(|_| ())).join().unwrap();
        assert!(matches!(outcome, Err(BridgeError::RendezvousStopped { .. })));
    }
}
