//! The foreign engine seam
//!
//! [`Engine`] is the primitive call-in surface of the external telephony
//! engine; [`EngineCallbacks`] is what the engine calls back into, from
//! threads the engine owns. Everything the engine hands to a callback is
//! borrowed for the duration of that callback only, which is why the view
//! types below carry a lifetime: the event model copies what it needs before
//! the callback returns.
//!
//! A real binding implements [`Engine`] over the native library. The crate
//! ships [`SimulatedEngine`](simulated::SimulatedEngine), an in-process
//! stand-in used by the tests and the console.

pub mod simulated;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Engine call identifier
pub type CallId = i32;

/// Engine account identifier
pub type AccountId = i32;

/// Engine buddy (presence subscription) identifier
pub type BuddyId = i32;

/// Identifier value the engine uses for "no call / no account"
pub const INVALID_ID: i32 = -1;

/// Raw status code returned by every engine operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EngineStatus(pub i32);

impl EngineStatus {
    pub const SUCCESS: EngineStatus = EngineStatus(0);
    /// Invalid argument
    pub const EINVAL: EngineStatus = EngineStatus(70004);
    /// Object not found
    pub const ENOTFOUND: EngineStatus = EngineStatus(70006);
    /// Operation is invalid in the current state
    pub const EINVALIDOP: EngineStatus = EngineStatus(70013);
    /// Object is busy
    pub const EBUSY: EngineStatus = EngineStatus(70011);
    /// Invalid SIP URI
    pub const EINVALIDURI: EngineStatus = EngineStatus(171039);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// Convert into a `Result`, keeping the status as the error
    pub fn into_result(self) -> Result<(), EngineStatus> {
        if self.is_success() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for EngineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {}", self.0)
    }
}

/// Seconds plus milliseconds, as the engine reports durations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeVal {
    pub sec: i64,
    pub msec: i64,
}

impl TimeVal {
    pub fn as_secs_f64(&self) -> f64 {
        self.sec as f64 + self.msec as f64 * 0.001
    }
}

/// Role of the local endpoint in a dialog
pub const ROLE_UAC: i32 = 0;
pub const ROLE_UAS: i32 = 1;

/// Engine-side call record as returned by `call_get_info`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawCallInfo {
    pub id: CallId,
    pub role: i32,
    pub acc_id: AccountId,
    pub local_info: String,
    pub local_contact: String,
    pub remote_info: String,
    pub remote_contact: String,
    pub call_id: String,
    pub state: i32,
    pub state_text: String,
    pub last_status: i32,
    pub last_status_text: String,
    pub media_status: i32,
    pub media_dir: i32,
    pub conf_slot: i32,
    pub connect_duration: TimeVal,
    pub total_duration: TimeVal,
}

/// Rich presence fields attached to accounts and buddies
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPresence {
    pub kind: i32,
    pub id: String,
    pub activity: i32,
    pub note: String,
}

/// Engine-side account record as returned by `acc_get_info`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawAccountInfo {
    pub id: AccountId,
    pub is_default: bool,
    pub acc_uri: String,
    pub has_registration: bool,
    pub expires: i32,
    pub status: i32,
    pub reg_last_err: i32,
    pub status_text: String,
    pub online_status: bool,
    pub online_status_text: String,
    pub rpid: RawPresence,
}

/// Engine-side buddy record as returned by `buddy_get_info`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBuddyInfo {
    pub id: BuddyId,
    pub uri: String,
    pub contact: String,
    pub status: i32,
    pub status_text: String,
    pub monitor_pres: bool,
    pub sub_state: i32,
    pub sub_term_reason: String,
    pub rpid: RawPresence,
}

/// Credential attached to an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub realm: String,
    pub scheme: String,
    pub username: String,
    pub password: String,
}

/// Account parameters handed to `acc_add`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountConfig {
    pub id: String,
    pub reg_uri: String,
    pub credentials: Vec<Credential>,
}

/// Extra headers and an optional body attached to an outgoing request or response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageData {
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl MessageData {
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.content_type.is_none() && self.body.is_none()
    }
}

/// Status line and extras for answering or hanging up a call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallResponse {
    pub code: u16,
    pub reason: Option<String>,
    pub msg_data: MessageData,
}

/// Decision returned by callbacks that answer a request with a status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReply {
    pub code: u16,
    pub reason: Option<String>,
}

impl StatusReply {
    pub fn new(code: u16) -> Self {
        Self { code, reason: None }
    }
}

// ===== CALLBACK ARGUMENT VIEWS =====

/// Summary of a received message
#[derive(Debug, Clone, Copy)]
pub struct RxData<'a> {
    /// Start line, e.g. `"INVITE sip:alice@example.com SIP/2.0"`
    pub info: &'a str,
    /// Source address the message came from
    pub src_addr: &'a str,
}

/// A transaction of a call
#[derive(Debug, Clone, Copy)]
pub struct TransactionView<'a> {
    pub method: &'a str,
    pub role: i32,
    pub state: i32,
    pub status_code: i32,
    pub status_text: &'a str,
}

/// Registration outcome passed to `on_reg_state2`
#[derive(Debug, Clone, Copy)]
pub struct RegInfoView<'a> {
    pub code: i32,
    pub reason: &'a str,
    pub expiration: u32,
    pub renew: bool,
}

/// An instant message
#[derive(Debug, Clone, Copy)]
pub struct PagerView<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub contact: &'a str,
    pub mime_type: &'a str,
    pub body: &'a str,
}

/// Delivery status of an instant message
#[derive(Debug, Clone, Copy)]
pub struct PagerStatusView<'a> {
    pub to: &'a str,
    pub body: &'a str,
    pub status: u16,
    pub reason: &'a str,
}

/// Typing indication
#[derive(Debug, Clone, Copy)]
pub struct TypingView<'a> {
    pub from: &'a str,
    pub to: &'a str,
    pub contact: &'a str,
    pub is_typing: bool,
}

/// NAT type detection result
#[derive(Debug, Clone, Copy)]
pub struct NatDetectView<'a> {
    pub status: i32,
    pub status_text: &'a str,
    pub nat_type: i32,
    pub nat_type_name: &'a str,
}

/// Message waiting indication
#[derive(Debug, Clone, Copy)]
pub struct MwiView<'a> {
    pub state: i32,
    pub mime_type: &'a str,
    pub body: &'a str,
}

/// A transport whose state changed
#[derive(Debug, Clone, Copy)]
pub struct TransportView<'a> {
    pub type_name: &'a str,
    pub local_name: &'a str,
    pub remote_name: &'a str,
}

/// Callbacks the engine invokes from its own threads
///
/// Methods that return a value answer the engine synchronously: the engine
/// acts on the returned decision as soon as the method returns. Every method
/// has a default that ignores the notification or gives the engine's own
/// default decision.
pub trait EngineCallbacks: Send + Sync {
    fn on_call_state(&self, _call_id: CallId) {}
    fn on_incoming_call(&self, _acc_id: AccountId, _call_id: CallId, _rdata: &RxData<'_>) {}
    fn on_call_tsx_state(&self, _call_id: CallId, _tsx: &TransactionView<'_>) {}
    fn on_call_media_state(&self, _call_id: CallId) {}
    fn on_stream_created(&self, _call_id: CallId, _stream_idx: u32) {}
    fn on_stream_destroyed(&self, _call_id: CallId, _stream_idx: u32) {}
    fn on_dtmf_digit(&self, _call_id: CallId, _digit: i32) {}

    /// Returns the status code to answer the REFER with
    fn on_call_transfer_request(&self, _call_id: CallId, _dst: &str) -> u16 {
        202
    }

    /// Returns whether to keep receiving transfer progress notifications
    fn on_call_transfer_status(&self, _call_id: CallId, _st_code: i32, _st_text: &str, _is_final: bool) -> bool {
        true
    }

    fn on_call_replace_request(&self, _call_id: CallId, _rdata: &RxData<'_>) -> StatusReply {
        StatusReply::new(200)
    }

    fn on_call_replaced(&self, _old_call_id: CallId, _new_call_id: CallId) {}
    fn on_reg_state(&self, _acc_id: AccountId) {}
    fn on_reg_state2(&self, _acc_id: AccountId, _info: &RegInfoView<'_>) {}

    fn on_incoming_subscribe(
        &self,
        _acc_id: AccountId,
        _buddy_id: BuddyId,
        _from: &str,
        _rdata: &RxData<'_>,
    ) -> StatusReply {
        StatusReply::new(200)
    }

    fn on_srv_subscribe_state(&self, _acc_id: AccountId, _remote_uri: &str, _state: i32, _event: Option<&str>) {}
    fn on_buddy_state(&self, _buddy_id: BuddyId) {}
    fn on_buddy_evsub_state(&self, _buddy_id: BuddyId, _event: Option<&str>) {}
    fn on_pager(&self, _call_id: CallId, _message: &PagerView<'_>) {}
    fn on_pager2(&self, _call_id: CallId, _message: &PagerView<'_>, _rdata: &RxData<'_>, _acc_id: AccountId) {}
    fn on_pager_status(&self, _call_id: CallId, _status: &PagerStatusView<'_>) {}
    fn on_pager_status2(&self, _call_id: CallId, _status: &PagerStatusView<'_>, _acc_id: AccountId) {}
    fn on_typing(&self, _call_id: CallId, _typing: &TypingView<'_>) {}
    fn on_typing2(&self, _call_id: CallId, _typing: &TypingView<'_>, _rdata: &RxData<'_>, _acc_id: AccountId) {}
    fn on_nat_detect(&self, _result: &NatDetectView<'_>) {}
    fn on_mwi_info(&self, _acc_id: AccountId, _info: &MwiView<'_>) {}
    fn on_transport_state(&self, _transport: &TransportView<'_>, _state: i32, _status: i32) {}
    fn on_ice_transport_error(&self, _index: i32, _op: i32, _status: i32) {}
}

/// Primitive operations of the foreign engine
///
/// Every method performs exactly one engine call. None of them may be invoked
/// from inside an [`EngineCallbacks`] method.
#[cfg_attr(test, mockall::automock)]
pub trait Engine: Send + Sync {
    /// Create the engine instance; must precede every other call
    fn create(&self) -> EngineStatus;

    /// Register callbacks and logging configuration
    fn init(&self, callbacks: Arc<dyn EngineCallbacks>, console_level: u8) -> EngineStatus;

    fn create_transport(&self, kind: i32, port: u16) -> EngineStatus;

    fn start(&self) -> EngineStatus;

    fn acc_add(&self, config: &AccountConfig, make_default: bool) -> Result<AccountId, EngineStatus>;

    fn call_answer(&self, call_id: CallId, response: &CallResponse) -> EngineStatus;

    fn call_hangup(&self, call_id: CallId, response: &CallResponse) -> EngineStatus;

    fn call_make_call(
        &self,
        acc_id: AccountId,
        dst_uri: &str,
        msg_data: &MessageData,
    ) -> Result<CallId, EngineStatus>;

    fn call_get_info(&self, call_id: CallId) -> Result<RawCallInfo, EngineStatus>;

    fn acc_get_info(&self, acc_id: AccountId) -> Result<RawAccountInfo, EngineStatus>;

    fn buddy_get_info(&self, buddy_id: BuddyId) -> Result<RawBuddyInfo, EngineStatus>;

    /// Human-readable text for a status code
    fn strerror(&self, status: EngineStatus) -> String;

    /// Tear down the engine; drops the registered callbacks
    fn destroy(&self) -> EngineStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeval_to_seconds() {
        let tv = TimeVal { sec: 12, msec: 250 };
        assert!((tv.as_secs_f64() - 12.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_status_into_result() {
        assert_eq!(EngineStatus::SUCCESS.into_result(), Ok(()));
        assert_eq!(EngineStatus::EBUSY.into_result(), Err(EngineStatus::EBUSY));
    }
}
