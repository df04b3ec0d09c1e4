//! Shared helpers for the bridge integration tests
#![allow(dead_code)]

use std::thread::{self, ThreadId};
use std::time::Duration;

use rvoip_bridge_core::{EventHandler, Reply};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// How long a test waits for an event before failing
pub const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// One delivery as the handler saw it
#[derive(Debug, Clone)]
pub struct Recorded {
    pub name: String,
    pub payload: Value,
    pub thread: ThreadId,
}

/// A handler that forwards every delivery to a channel and answers with `reply`
pub fn recorder(
    reply: impl Fn(&str, &Value) -> Reply + Send + 'static,
) -> (impl EventHandler, mpsc::UnboundedReceiver<Recorded>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handler = move |name: &str, payload: &Value| {
        let _ = tx.send(Recorded {
            name: name.to_string(),
            payload: payload.clone(),
            thread: thread::current().id(),
        });
        reply(name, payload)
    };
    (handler, rx)
}

/// Wait for the next delivery named `name`, skipping others
pub async fn next_named(rx: &mut mpsc::UnboundedReceiver<Recorded>, name: &str) -> Recorded {
    loop {
        let recorded = timeout(EVENT_TIMEOUT, rx.recv())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {}", name))
            .expect("handler channel closed");
        if recorded.name == name {
            return recorded;
        }
    }
}

/// Everything delivered so far, without waiting
pub fn drain_recorded(rx: &mut mpsc::UnboundedReceiver<Recorded>) -> Vec<Recorded> {
    let mut recorded = Vec::new();
    while let Ok(next) = rx.try_recv() {
        recorded.push(next);
    }
    recorded
}

/// Join an engine callback thread without blocking the host's event loop
pub async fn join_callback<T: Send + 'static>(handle: thread::JoinHandle<T>) -> T {
    let joined = tokio::task::spawn_blocking(move || handle.join());
    timeout(EVENT_TIMEOUT, joined)
        .await
        .expect("callback thread did not finish")
        .expect("join task failed")
        .expect("callback thread panicked")
}
