//! Rendezvous delivery integration tests
//!
//! In rendezvous mode the host thread is parked while the handler runs on
//! the engine's callback thread. These tests never block the host on a
//! callback thread directly: every wait goes through the event loop so the
//! rendezvous can be served.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rvoip_bridge_core::{Bridge, BridgeConfig, DeliveryMode, Reply, SimulatedEngine, StatusReply};
use serde_json::Value;
use tokio::task::LocalSet;

use common::{join_callback, next_named, recorder};

fn rendezvous_config() -> BridgeConfig {
    BridgeConfig::default()
        .with_delivery(DeliveryMode::Rendezvous)
        .with_fatal_handler_panics(false)
}

#[tokio::test]
async fn test_handler_runs_on_callback_thread() {
    let engine = SimulatedEngine::new();
    let bridge = Bridge::try_new(Arc::new(engine.clone()), rendezvous_config()).unwrap();
    let host = thread::current().id();
    let (handler, mut rx) = recorder(|name: &str, _: &Value| match name {
        "transfer_request" => Reply::Status(603),
        _ => Reply::None,
    });

    LocalSet::new()
        .run_until(async {
            bridge.start(handler).unwrap();
            let account = bridge.gateway().add_account("2002", "example.com", "secret").unwrap();

            let registered = next_named(&mut rx, "reg_state").await;
            assert_ne!(registered.thread, host);
            assert_eq!(registered.payload["id"], account);

            let call = bridge.gateway().make_call(account, "sip:bob@example.com").unwrap();
            let transfer = engine.simulate_transfer_request(call, "sip:carol@example.com").unwrap();
            assert_eq!(join_callback(transfer).await, 603);

            let stats = bridge.stats().rendezvous.unwrap();
            assert!(stats.handoffs >= 2);
            bridge.stop().await.unwrap();
        })
        .await;
    assert!(engine.is_destroyed());
}

#[tokio::test]
async fn test_concurrent_callbacks_are_serialized() {
    let engine = SimulatedEngine::new();
    let bridge = Bridge::try_new(Arc::new(engine.clone()), rendezvous_config()).unwrap();
    let active = Arc::new(AtomicUsize::new(0));
    let overlaps = Arc::new(AtomicUsize::new(0));
    let (in_handler, overlapped) = (active.clone(), overlaps.clone());
    let (handler, mut rx) = recorder(move |name: &str, _: &Value| {
        if name == "dtmf_digit" {
            if in_handler.fetch_add(1, Ordering::SeqCst) != 0 {
                overlapped.fetch_add(1, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_millis(5));
            in_handler.fetch_sub(1, Ordering::SeqCst);
        }
        Reply::None
    });

    LocalSet::new()
        .run_until(async {
            bridge.start(handler).unwrap();
            let account = bridge.gateway().add_account("2002", "example.com", "secret").unwrap();
            let call = engine.simulate_incoming_call(account, "sip:alice@example.com").unwrap();
            for digit in "0123456789".chars() {
                engine.simulate_dtmf(call, digit).unwrap();
            }
            for _ in 0..10 {
                next_named(&mut rx, "dtmf_digit").await;
            }
            assert_eq!(overlaps.load(Ordering::SeqCst), 0);
            bridge.stop().await.unwrap();
        })
        .await;
}

#[tokio::test]
async fn test_status_replies_with_reason() {
    let engine = SimulatedEngine::new();
    let bridge = Bridge::try_new(Arc::new(engine.clone()), rendezvous_config()).unwrap();
    let (handler, _rx) = recorder(|name: &str, _: &Value| match name {
        "incoming_subscribe" => Reply::Reason {
            code: 403,
            reason: "Not Allowed".to_string(),
        },
        _ => Reply::None,
    });

    LocalSet::new()
        .run_until(async {
            bridge.start(handler).unwrap();
            let account = bridge.gateway().add_account("2002", "example.com", "secret").unwrap();
            let subscribe = engine.simulate_incoming_subscribe(account, "sip:erin@example.com").unwrap();
            assert_eq!(
                join_callback(subscribe).await,
                StatusReply {
                    code: 403,
                    reason: Some("Not Allowed".to_string()),
                }
            );
            bridge.stop().await.unwrap();
        })
        .await;
}

#[tokio::test]
async fn test_gateway_usable_between_handoffs() {
    let engine = SimulatedEngine::new();
    let bridge = Bridge::try_new(Arc::new(engine.clone()), rendezvous_config()).unwrap();
    let (handler, mut rx) = recorder(|_: &str, _: &Value| Reply::None);

    LocalSet::new()
        .run_until(async {
            bridge.start(handler).unwrap();
            let account = bridge.gateway().add_account("2002", "example.com", "secret").unwrap();
            let call = engine.simulate_incoming_call(account, "sip:alice@example.com").unwrap();
            let incoming = next_named(&mut rx, "incoming_call").await;
            assert_eq!(incoming.payload[1]["id"], call);

            bridge.gateway().answer_call(call, Some(180)).unwrap();
            bridge.gateway().hangup_call(call, None).unwrap();
            loop {
                let state = next_named(&mut rx, "call_state").await;
                if state.payload["state_text"] == "DISCONNECTED" {
                    break;
                }
            }
            bridge.stop().await.unwrap();
        })
        .await;
}
