//! Event capture model
//!
//! Every engine callback becomes exactly one [`Event`]. The event is built on
//! the callback thread, inside the callback, and copies everything it needs
//! out of the engine before the callback returns: the engine is free to reuse
//! or invalidate the call and account it referred to afterwards. Once built,
//! an event is a plain value that can cross threads and outlive the engine.
//!
//! # Event Kinds
//!
//! The set of kinds is closed and mirrors the engine's callback table
//! ([`EventKind::ALL`]). Four kinds ask the host for a decision:
//!
//! | kind | reply meaning | default |
//! |------|---------------|---------|
//! | `transfer_request` | status code for the REFER | 202 |
//! | `transfer_status` | keep receiving progress | `true` |
//! | `call_replace_request` | status code (+ reason) | 200 |
//! | `incoming_subscribe` | status code (+ reason) | 200 |
//!
//! Those events carry a [`ResponseSlot`]. The delivery path fills it with the
//! handler's [`Reply`]; the callback stub waits on it before answering the
//! engine. Dropping an unanswered event fills the slot with [`Reply::None`],
//! so a waiting callback thread always gets an answer.
//!
//! # Payload Shape
//!
//! [`Event::payload_value`] renders what the handler receives: single
//! argument kinds render as the one record, multi argument kinds as a JSON
//! array in the order of the callback's own argument list.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::engine::{
    AccountId, BuddyId, CallId, Engine, MwiView, NatDetectView, PagerStatusView, PagerView,
    RegInfoView, RxData, TransactionView, TransportView, TypingView, INVALID_ID,
};
use crate::enums::SUBSCRIPTION_STATES;
use crate::error::BridgeResult;
use crate::handler::Reply;
use crate::info::{AccountInfo, BuddyInfo, CallInfo};

/// The closed set of event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    CallState,
    IncomingCall,
    TsxState,
    MediaState,
    StreamCreated,
    StreamDestroyed,
    DtmfDigit,
    TransferRequest,
    TransferStatus,
    CallReplaceRequest,
    CallReplaced,
    RegState,
    RegState2,
    IncomingSubscribe,
    SrvSubscribeState,
    BuddyState,
    BuddyEvsubState,
    Pager,
    Pager2,
    PagerStatus,
    PagerStatus2,
    Typing,
    Typing2,
    NatDetect,
    MwiInfo,
    TransportState,
    IceTransportError,
}

impl EventKind {
    pub const ALL: [EventKind; 27] = [
        EventKind::CallState,
        EventKind::IncomingCall,
        EventKind::TsxState,
        EventKind::MediaState,
        EventKind::StreamCreated,
        EventKind::StreamDestroyed,
        EventKind::DtmfDigit,
        EventKind::TransferRequest,
        EventKind::TransferStatus,
        EventKind::CallReplaceRequest,
        EventKind::CallReplaced,
        EventKind::RegState,
        EventKind::RegState2,
        EventKind::IncomingSubscribe,
        EventKind::SrvSubscribeState,
        EventKind::BuddyState,
        EventKind::BuddyEvsubState,
        EventKind::Pager,
        EventKind::Pager2,
        EventKind::PagerStatus,
        EventKind::PagerStatus2,
        EventKind::Typing,
        EventKind::Typing2,
        EventKind::NatDetect,
        EventKind::MwiInfo,
        EventKind::TransportState,
        EventKind::IceTransportError,
    ];

    /// Event name as delivered to the handler
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::CallState => "call_state",
            EventKind::IncomingCall => "incoming_call",
            EventKind::TsxState => "tsx_state",
            EventKind::MediaState => "media_state",
            EventKind::StreamCreated => "stream_created",
            EventKind::StreamDestroyed => "stream_destroyed",
            EventKind::DtmfDigit => "dtmf_digit",
            EventKind::TransferRequest => "transfer_request",
            EventKind::TransferStatus => "transfer_status",
            EventKind::CallReplaceRequest => "call_replace_request",
            EventKind::CallReplaced => "call_replaced",
            EventKind::RegState => "reg_state",
            EventKind::RegState2 => "reg_state2",
            EventKind::IncomingSubscribe => "incoming_subscribe",
            EventKind::SrvSubscribeState => "srv_subscribe_state",
            EventKind::BuddyState => "buddy_state",
            EventKind::BuddyEvsubState => "buddy_evsub_state",
            EventKind::Pager => "pager",
            EventKind::Pager2 => "pager2",
            EventKind::PagerStatus => "pager_status",
            EventKind::PagerStatus2 => "pager_status2",
            EventKind::Typing => "typing",
            EventKind::Typing2 => "typing2",
            EventKind::NatDetect => "nat_detect",
            EventKind::MwiInfo => "mwi_info",
            EventKind::TransportState => "transport_state",
            EventKind::IceTransportError => "ice_transport_error",
        }
    }

    /// Reply assumed when the handler gives none, for kinds that expect one
    pub fn default_reply(&self) -> Option<Reply> {
        match self {
            EventKind::TransferRequest => Some(Reply::Status(202)),
            EventKind::TransferStatus => Some(Reply::Continue(true)),
            EventKind::CallReplaceRequest | EventKind::IncomingSubscribe => Some(Reply::Status(200)),
            _ => None,
        }
    }

    pub fn expects_reply(&self) -> bool {
        self.default_reply().is_some()
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ===== CAPTURED ARGUMENT RECORDS =====

/// Start line and source of a received message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RxSummary {
    pub info: String,
    pub src_addr: String,
}

impl From<&RxData<'_>> for RxSummary {
    fn from(rdata: &RxData<'_>) -> Self {
        Self {
            info: rdata.info.to_string(),
            src_addr: rdata.src_addr.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInfo {
    pub method: String,
    pub role: i32,
    pub state: i32,
    pub status_code: i32,
    pub status_text: String,
}

impl From<&TransactionView<'_>> for TransactionInfo {
    fn from(tsx: &TransactionView<'_>) -> Self {
        Self {
            method: tsx.method.to_string(),
            role: tsx.role,
            state: tsx.state,
            status_code: tsx.status_code,
            status_text: tsx.status_text.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegInfo {
    pub code: i32,
    pub reason: String,
    pub expiration: u32,
    pub renew: bool,
}

impl From<&RegInfoView<'_>> for RegInfo {
    fn from(info: &RegInfoView<'_>) -> Self {
        Self {
            code: info.code,
            reason: info.reason.to_string(),
            expiration: info.expiration,
            renew: info.renew,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagerMessage {
    pub from: String,
    pub to: String,
    pub contact: String,
    pub mime_type: String,
    pub body: String,
}

impl From<&PagerView<'_>> for PagerMessage {
    fn from(message: &PagerView<'_>) -> Self {
        Self {
            from: message.from.to_string(),
            to: message.to.to_string(),
            contact: message.contact.to_string(),
            mime_type: message.mime_type.to_string(),
            body: message.body.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagerStatus {
    pub to: String,
    pub body: String,
    pub status: u16,
    pub reason: String,
}

impl From<&PagerStatusView<'_>> for PagerStatus {
    fn from(status: &PagerStatusView<'_>) -> Self {
        Self {
            to: status.to.to_string(),
            body: status.body.to_string(),
            status: status.status,
            reason: status.reason.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingInfo {
    pub from: String,
    pub to: String,
    pub contact: String,
    pub is_typing: bool,
}

impl From<&TypingView<'_>> for TypingInfo {
    fn from(typing: &TypingView<'_>) -> Self {
        Self {
            from: typing.from.to_string(),
            to: typing.to.to_string(),
            contact: typing.contact.to_string(),
            is_typing: typing.is_typing,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NatDetectResult {
    pub status: i32,
    pub status_text: String,
    pub nat_type: i32,
    pub nat_type_name: String,
}

impl From<&NatDetectView<'_>> for NatDetectResult {
    fn from(result: &NatDetectView<'_>) -> Self {
        Self {
            status: result.status,
            status_text: result.status_text.to_string(),
            nat_type: result.nat_type,
            nat_type_name: result.nat_type_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MwiInfo {
    pub state: i32,
    pub state_name: String,
    pub mime_type: String,
    pub body: String,
}

impl From<&MwiView<'_>> for MwiInfo {
    fn from(info: &MwiView<'_>) -> Self {
        Self {
            state: info.state,
            state_name: SUBSCRIPTION_STATES.id_to_name(info.state).to_string(),
            mime_type: info.mime_type.to_string(),
            body: info.body.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportStateInfo {
    pub type_name: String,
    pub local_name: String,
    pub remote_name: String,
    pub state: i32,
    pub status: i32,
}

// ===== PAYLOAD =====

/// Captured data of one event, one variant per [`EventKind`]
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    CallState { call: CallInfo },
    IncomingCall { account: AccountInfo, call: CallInfo, rdata: RxSummary },
    TsxState { call: CallInfo, tsx: TransactionInfo },
    MediaState { call: CallInfo },
    StreamCreated { call: CallInfo, stream_idx: u32 },
    StreamDestroyed { call: CallInfo, stream_idx: u32 },
    DtmfDigit { call: CallInfo, digit: i32 },
    TransferRequest { call: CallInfo, dst: String },
    TransferStatus { call: CallInfo, st_code: i32, st_text: String, is_final: bool },
    CallReplaceRequest { call: CallInfo, rdata: RxSummary },
    CallReplaced { old_call: CallInfo, new_call: CallInfo },
    RegState { account: AccountInfo },
    RegState2 { account: AccountInfo, info: RegInfo },
    IncomingSubscribe {
        account: AccountInfo,
        buddy_id: Option<BuddyId>,
        from: String,
        rdata: RxSummary,
    },
    SrvSubscribeState {
        account: AccountInfo,
        remote_uri: String,
        state: i32,
        event: Option<String>,
    },
    BuddyState { buddy: BuddyInfo },
    BuddyEvsubState { buddy: BuddyInfo, event: Option<String> },
    Pager { call: Option<CallInfo>, message: PagerMessage },
    Pager2 {
        call: Option<CallInfo>,
        message: PagerMessage,
        rdata: RxSummary,
        account: Option<AccountInfo>,
    },
    PagerStatus { call: Option<CallInfo>, status: PagerStatus },
    PagerStatus2 {
        call: Option<CallInfo>,
        status: PagerStatus,
        account: Option<AccountInfo>,
    },
    Typing { call: Option<CallInfo>, typing: TypingInfo },
    Typing2 {
        call: Option<CallInfo>,
        typing: TypingInfo,
        rdata: RxSummary,
        account: Option<AccountInfo>,
    },
    NatDetect { result: NatDetectResult },
    MwiInfo { account: AccountInfo, info: MwiInfo },
    TransportState { transport: TransportStateInfo },
    IceTransportError { index: i32, op: i32, status: i32 },
}

fn optional_call(engine: &dyn Engine, call_id: CallId) -> BridgeResult<Option<CallInfo>> {
    if call_id == INVALID_ID {
        return Ok(None);
    }
    CallInfo::capture(engine, call_id).map(Some)
}

fn optional_account(engine: &dyn Engine, acc_id: AccountId) -> BridgeResult<Option<AccountInfo>> {
    if acc_id == INVALID_ID {
        return Ok(None);
    }
    AccountInfo::capture(engine, acc_id).map(Some)
}

/// Capture constructors, one per callback
///
/// Each must run on the callback thread before the callback returns.
impl EventPayload {
    pub fn call_state(engine: &dyn Engine, call_id: CallId) -> BridgeResult<Self> {
        Ok(Self::CallState {
            call: CallInfo::capture(engine, call_id)?,
        })
    }

    pub fn incoming_call(
        engine: &dyn Engine,
        acc_id: AccountId,
        call_id: CallId,
        rdata: &RxData<'_>,
    ) -> BridgeResult<Self> {
        Ok(Self::IncomingCall {
            account: AccountInfo::capture(engine, acc_id)?,
            call: CallInfo::capture(engine, call_id)?,
            rdata: RxSummary::from(rdata),
        })
    }

    pub fn tsx_state(engine: &dyn Engine, call_id: CallId, tsx: &TransactionView<'_>) -> BridgeResult<Self> {
        Ok(Self::TsxState {
            call: CallInfo::capture(engine, call_id)?,
            tsx: TransactionInfo::from(tsx),
        })
    }

    pub fn media_state(engine: &dyn Engine, call_id: CallId) -> BridgeResult<Self> {
        Ok(Self::MediaState {
            call: CallInfo::capture(engine, call_id)?,
        })
    }

    pub fn stream_created(engine: &dyn Engine, call_id: CallId, stream_idx: u32) -> BridgeResult<Self> {
        Ok(Self::StreamCreated {
            call: CallInfo::capture(engine, call_id)?,
            stream_idx,
        })
    }

    pub fn stream_destroyed(engine: &dyn Engine, call_id: CallId, stream_idx: u32) -> BridgeResult<Self> {
        Ok(Self::StreamDestroyed {
            call: CallInfo::capture(engine, call_id)?,
            stream_idx,
        })
    }

    pub fn dtmf_digit(engine: &dyn Engine, call_id: CallId, digit: i32) -> BridgeResult<Self> {
        Ok(Self::DtmfDigit {
            call: CallInfo::capture(engine, call_id)?,
            digit,
        })
    }

    pub fn transfer_request(engine: &dyn Engine, call_id: CallId, dst: &str) -> BridgeResult<Self> {
        Ok(Self::TransferRequest {
            call: CallInfo::capture(engine, call_id)?,
            dst: dst.to_string(),
        })
    }

    pub fn transfer_status(
        engine: &dyn Engine,
        call_id: CallId,
        st_code: i32,
        st_text: &str,
        is_final: bool,
    ) -> BridgeResult<Self> {
        Ok(Self::TransferStatus {
            call: CallInfo::capture(engine, call_id)?,
            st_code,
            st_text: st_text.to_string(),
            is_final,
        })
    }

    pub fn call_replace_request(engine: &dyn Engine, call_id: CallId, rdata: &RxData<'_>) -> BridgeResult<Self> {
        Ok(Self::CallReplaceRequest {
            call: CallInfo::capture(engine, call_id)?,
            rdata: RxSummary::from(rdata),
        })
    }

    pub fn call_replaced(engine: &dyn Engine, old_call_id: CallId, new_call_id: CallId) -> BridgeResult<Self> {
        Ok(Self::CallReplaced {
            old_call: CallInfo::capture(engine, old_call_id)?,
            new_call: CallInfo::capture(engine, new_call_id)?,
        })
    }

    pub fn reg_state(engine: &dyn Engine, acc_id: AccountId) -> BridgeResult<Self> {
        Ok(Self::RegState {
            account: AccountInfo::capture(engine, acc_id)?,
        })
    }

    pub fn reg_state2(engine: &dyn Engine, acc_id: AccountId, info: &RegInfoView<'_>) -> BridgeResult<Self> {
        Ok(Self::RegState2 {
            account: AccountInfo::capture(engine, acc_id)?,
            info: RegInfo::from(info),
        })
    }

    pub fn incoming_subscribe(
        engine: &dyn Engine,
        acc_id: AccountId,
        buddy_id: BuddyId,
        from: &str,
        rdata: &RxData<'_>,
    ) -> BridgeResult<Self> {
        Ok(Self::IncomingSubscribe {
            account: AccountInfo::capture(engine, acc_id)?,
            buddy_id: (buddy_id != INVALID_ID).then_some(buddy_id),
            from: from.to_string(),
            rdata: RxSummary::from(rdata),
        })
    }

    pub fn srv_subscribe_state(
        engine: &dyn Engine,
        acc_id: AccountId,
        remote_uri: &str,
        state: i32,
        event: Option<&str>,
    ) -> BridgeResult<Self> {
        Ok(Self::SrvSubscribeState {
            account: AccountInfo::capture(engine, acc_id)?,
            remote_uri: remote_uri.to_string(),
            state,
            event: event.map(str::to_string),
        })
    }

    pub fn buddy_state(engine: &dyn Engine, buddy_id: BuddyId) -> BridgeResult<Self> {
        Ok(Self::BuddyState {
            buddy: BuddyInfo::capture(engine, buddy_id)?,
        })
    }

    pub fn buddy_evsub_state(engine: &dyn Engine, buddy_id: BuddyId, event: Option<&str>) -> BridgeResult<Self> {
        Ok(Self::BuddyEvsubState {
            buddy: BuddyInfo::capture(engine, buddy_id)?,
            event: event.map(str::to_string),
        })
    }

    pub fn pager(engine: &dyn Engine, call_id: CallId, message: &PagerView<'_>) -> BridgeResult<Self> {
        Ok(Self::Pager {
            call: optional_call(engine, call_id)?,
            message: PagerMessage::from(message),
        })
    }

    pub fn pager2(
        engine: &dyn Engine,
        call_id: CallId,
        message: &PagerView<'_>,
        rdata: &RxData<'_>,
        acc_id: AccountId,
    ) -> BridgeResult<Self> {
        Ok(Self::Pager2 {
            call: optional_call(engine, call_id)?,
            message: PagerMessage::from(message),
            rdata: RxSummary::from(rdata),
            account: optional_account(engine, acc_id)?,
        })
    }

    pub fn pager_status(engine: &dyn Engine, call_id: CallId, status: &PagerStatusView<'_>) -> BridgeResult<Self> {
        Ok(Self::PagerStatus {
            call: optional_call(engine, call_id)?,
            status: PagerStatus::from(status),
        })
    }

    pub fn pager_status2(
        engine: &dyn Engine,
        call_id: CallId,
        status: &PagerStatusView<'_>,
        acc_id: AccountId,
    ) -> BridgeResult<Self> {
        Ok(Self::PagerStatus2 {
            call: optional_call(engine, call_id)?,
            status: PagerStatus::from(status),
            account: optional_account(engine, acc_id)?,
        })
    }

    pub fn typing(engine: &dyn Engine, call_id: CallId, typing: &TypingView<'_>) -> BridgeResult<Self> {
        Ok(Self::Typing {
            call: optional_call(engine, call_id)?,
            typing: TypingInfo::from(typing),
        })
    }

    pub fn typing2(
        engine: &dyn Engine,
        call_id: CallId,
        typing: &TypingView<'_>,
        rdata: &RxData<'_>,
        acc_id: AccountId,
    ) -> BridgeResult<Self> {
        Ok(Self::Typing2 {
            call: optional_call(engine, call_id)?,
            typing: TypingInfo::from(typing),
            rdata: RxSummary::from(rdata),
            account: optional_account(engine, acc_id)?,
        })
    }

    pub fn nat_detect(result: &NatDetectView<'_>) -> Self {
        Self::NatDetect {
            result: NatDetectResult::from(result),
        }
    }

    pub fn mwi_info(engine: &dyn Engine, acc_id: AccountId, info: &MwiView<'_>) -> BridgeResult<Self> {
        Ok(Self::MwiInfo {
            account: AccountInfo::capture(engine, acc_id)?,
            info: MwiInfo::from(info),
        })
    }

    pub fn transport_state(transport: &TransportView<'_>, state: i32, status: i32) -> Self {
        Self::TransportState {
            transport: TransportStateInfo {
                type_name: transport.type_name.to_string(),
                local_name: transport.local_name.to_string(),
                remote_name: transport.remote_name.to_string(),
                state,
                status,
            },
        }
    }

    pub fn ice_transport_error(index: i32, op: i32, status: i32) -> Self {
        Self::IceTransportError { index, op, status }
    }
}

impl EventPayload {
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::CallState { .. } => EventKind::CallState,
            EventPayload::IncomingCall { .. } => EventKind::IncomingCall,
            EventPayload::TsxState { .. } => EventKind::TsxState,
            EventPayload::MediaState { .. } => EventKind::MediaState,
            EventPayload::StreamCreated { .. } => EventKind::StreamCreated,
            EventPayload::StreamDestroyed { .. } => EventKind::StreamDestroyed,
            EventPayload::DtmfDigit { .. } => EventKind::DtmfDigit,
            EventPayload::TransferRequest { .. } => EventKind::TransferRequest,
            EventPayload::TransferStatus { .. } => EventKind::TransferStatus,
            EventPayload::CallReplaceRequest { .. } => EventKind::CallReplaceRequest,
            EventPayload::CallReplaced { .. } => EventKind::CallReplaced,
            EventPayload::RegState { .. } => EventKind::RegState,
            EventPayload::RegState2 { .. } => EventKind::RegState2,
            EventPayload::IncomingSubscribe { .. } => EventKind::IncomingSubscribe,
            EventPayload::SrvSubscribeState { .. } => EventKind::SrvSubscribeState,
            EventPayload::BuddyState { .. } => EventKind::BuddyState,
            EventPayload::BuddyEvsubState { .. } => EventKind::BuddyEvsubState,
            EventPayload::Pager { .. } => EventKind::Pager,
            EventPayload::Pager2 { .. } => EventKind::Pager2,
            EventPayload::PagerStatus { .. } => EventKind::PagerStatus,
            EventPayload::PagerStatus2 { .. } => EventKind::PagerStatus2,
            EventPayload::Typing { .. } => EventKind::Typing,
            EventPayload::Typing2 { .. } => EventKind::Typing2,
            EventPayload::NatDetect { .. } => EventKind::NatDetect,
            EventPayload::MwiInfo { .. } => EventKind::MwiInfo,
            EventPayload::TransportState { .. } => EventKind::TransportState,
            EventPayload::IceTransportError { .. } => EventKind::IceTransportError,
        }
    }

    /// The call snapshot this event was captured with, if any
    ///
    /// For `call_replaced` this is the new call.
    pub fn call_snapshot(&self) -> Option<&CallInfo> {
        match self {
            EventPayload::CallState { call }
            | EventPayload::IncomingCall { call, .. }
            | EventPayload::TsxState { call, .. }
            | EventPayload::MediaState { call }
            | EventPayload::StreamCreated { call, .. }
            | EventPayload::StreamDestroyed { call, .. }
            | EventPayload::DtmfDigit { call, .. }
            | EventPayload::TransferRequest { call, .. }
            | EventPayload::TransferStatus { call, .. }
            | EventPayload::CallReplaceRequest { call, .. } => Some(call),
            EventPayload::CallReplaced { new_call, .. } => Some(new_call),
            EventPayload::Pager { call, .. }
            | EventPayload::Pager2 { call, .. }
            | EventPayload::PagerStatus { call, .. }
            | EventPayload::PagerStatus2 { call, .. }
            | EventPayload::Typing { call, .. }
            | EventPayload::Typing2 { call, .. } => call.as_ref(),
            _ => None,
        }
    }

    /// The account snapshot this event was captured with, if any
    pub fn account_snapshot(&self) -> Option<&AccountInfo> {
        match self {
            EventPayload::IncomingCall { account, .. }
            | EventPayload::RegState { account }
            | EventPayload::RegState2 { account, .. }
            | EventPayload::IncomingSubscribe { account, .. }
            | EventPayload::SrvSubscribeState { account, .. }
            | EventPayload::MwiInfo { account, .. } => Some(account),
            EventPayload::Pager2 { account, .. }
            | EventPayload::PagerStatus2 { account, .. }
            | EventPayload::Typing2 { account, .. } => account.as_ref(),
            _ => None,
        }
    }

    /// Render the payload the handler receives
    pub fn to_value(&self) -> Value {
        match self {
            EventPayload::CallState { call } | EventPayload::MediaState { call } => json!(call),
            EventPayload::IncomingCall { account, call, rdata } => json!([account, call, rdata]),
            EventPayload::TsxState { call, tsx } => json!([call, tsx]),
            EventPayload::StreamCreated { call, stream_idx }
            | EventPayload::StreamDestroyed { call, stream_idx } => json!([call, stream_idx]),
            EventPayload::DtmfDigit { call, digit } => json!([call, digit]),
            EventPayload::TransferRequest { call, dst } => json!([call, dst]),
            EventPayload::TransferStatus { call, st_code, st_text, is_final } => {
                json!([call, st_code, st_text, is_final])
            }
            EventPayload::CallReplaceRequest { call, rdata } => json!([call, rdata]),
            EventPayload::CallReplaced { old_call, new_call } => json!([old_call, new_call]),
            EventPayload::RegState { account } => json!(account),
            EventPayload::RegState2 { account, info } => json!([account, info]),
            EventPayload::IncomingSubscribe { account, buddy_id, from, rdata } => {
                json!([account, buddy_id, from, rdata])
            }
            EventPayload::SrvSubscribeState { account, remote_uri, state, event } => {
                json!([account, remote_uri, state, SUBSCRIPTION_STATES.id_to_name(*state), event])
            }
            EventPayload::BuddyState { buddy } => json!(buddy),
            EventPayload::BuddyEvsubState { buddy, event } => json!([buddy, event]),
            EventPayload::Pager { call, message } => json!([call, message]),
            EventPayload::Pager2 { call, message, rdata, account } => json!([call, message, rdata, account]),
            EventPayload::PagerStatus { call, status } => json!([call, status]),
            EventPayload::PagerStatus2 { call, status, account } => json!([call, status, account]),
            EventPayload::Typing { call, typing } => json!([call, typing]),
            EventPayload::Typing2 { call, typing, rdata, account } => json!([call, typing, rdata, account]),
            EventPayload::NatDetect { result } => json!(result),
            EventPayload::MwiInfo { account, info } => json!([account, info]),
            EventPayload::TransportState { transport } => json!(transport),
            EventPayload::IceTransportError { index, op, status } => json!([index, op, status]),
        }
    }
}

// ===== RESPONSE SLOT =====

/// One-shot cell through which the host's decision reaches the callback thread
#[derive(Debug, Default)]
pub struct ResponseSlot {
    value: Mutex<Option<Reply>>,
    filled: Condvar,
}

impl ResponseSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the reply and wake the waiter; a slot is filled at most once
    pub fn fill(&self, reply: Reply) -> bool {
        let mut value = self.value.lock();
        if value.is_some() {
            return false;
        }
        *value = Some(reply);
        self.filled.notify_all();
        true
    }

    pub fn is_filled(&self) -> bool {
        self.value.lock().is_some()
    }

    /// Block until the slot is filled
    pub fn wait(&self) -> Reply {
        let mut value = self.value.lock();
        loop {
            if let Some(reply) = value.as_ref() {
                return reply.clone();
            }
            self.filled.wait(&mut value);
        }
    }

    /// Block until the slot is filled or the timeout elapses
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Reply> {
        let mut value = self.value.lock();
        if value.is_none() {
            let _ = self
                .filled
                .wait_while_for(&mut value, |value| value.is_none(), timeout);
        }
        value.clone()
    }
}

/// Fills its slot with [`Reply::None`] if dropped unanswered
struct Responder {
    slot: Arc<ResponseSlot>,
}

impl Drop for Responder {
    fn drop(&mut self) {
        self.slot.fill(Reply::None);
    }
}

// ===== EVENT =====

/// A captured engine callback
pub struct Event {
    seq: u64,
    captured_at: DateTime<Utc>,
    payload: EventPayload,
    responder: Option<Responder>,
}

impl Event {
    /// Wrap a captured payload; kinds that expect a reply get a fresh response slot
    pub fn new(seq: u64, payload: EventPayload) -> Self {
        let responder = payload.kind().expects_reply().then(|| Responder {
            slot: Arc::new(ResponseSlot::new()),
        });
        Self {
            seq,
            captured_at: Utc::now(),
            payload,
            responder,
        }
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }

    pub fn name(&self) -> &'static str {
        self.payload.kind().as_str()
    }

    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    pub fn payload_value(&self) -> Value {
        self.payload.to_value()
    }

    /// Handle on the response slot, for the callback thread to wait on
    pub fn reply_slot(&self) -> Option<Arc<ResponseSlot>> {
        self.responder.as_ref().map(|responder| responder.slot.clone())
    }

    /// Relay the handler's reply into the response slot
    ///
    /// Returns `false` for kinds that do not expect a reply.
    pub fn respond(&mut self, reply: Reply) -> bool {
        match self.responder.take() {
            Some(responder) => responder.slot.fill(reply),
            None => false,
        }
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("seq", &self.seq)
            .field("kind", &self.kind())
            .field("captured_at", &self.captured_at)
            .field("awaiting_reply", &self.responder.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{MockEngine, RawAccountInfo, RawCallInfo};
    use std::thread;

    fn engine_with_call(call_id: CallId) -> MockEngine {
        let mut engine = MockEngine::new();
        engine.expect_call_get_info().returning(move |id| {
            Ok(RawCallInfo {
                id,
                call_id: format!("dialog-{}", call_id),
                state_text: "CONFIRMED".to_string(),
                state: 5,
                ..Default::default()
            })
        });
        engine.expect_acc_get_info().returning(|id| {
            Ok(RawAccountInfo {
                id,
                acc_uri: "sip:2002@192.168.2.2".to_string(),
                status: 200,
                ..Default::default()
            })
        });
        engine
    }

    #[test]
    fn test_every_kind_has_unique_name() {
        let mut names: Vec<_> = EventKind::ALL.iter().map(|kind| kind.as_str()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), EventKind::ALL.len());
    }

    #[test]
    fn test_serde_name_matches_handler_name() {
        for kind in EventKind::ALL {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }

    #[test]
    fn test_single_argument_payload_is_the_record() {
        let engine = engine_with_call(7);
        let payload = EventPayload::call_state(&engine, 7).unwrap();
        let value = payload.to_value();
        assert_eq!(value["id"], 7);
        assert_eq!(value["state_text"], "CONFIRMED");
    }

    #[test]
    fn test_multi_argument_payload_is_positional() {
        let engine = engine_with_call(1);
        let payload = EventPayload::transfer_status(&engine, 1, 180, "Ringing", false).unwrap();
        let value = payload.to_value();
        let items = value.as_array().unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0]["id"], 1);
        assert_eq!(items[1], 180);
        assert_eq!(items[2], "Ringing");
        assert_eq!(items[3], false);
    }

    #[test]
    fn test_out_of_dialog_pager_has_no_call() {
        let engine = MockEngine::new();
        let message = PagerView {
            from: "sip:bob@example.com",
            to: "sip:alice@example.com",
            contact: "",
            mime_type: "text/plain",
            body: "hello",
        };
        let payload = EventPayload::pager(&engine, INVALID_ID, &message).unwrap();
        assert!(payload.call_snapshot().is_none());
        assert_eq!(payload.to_value()[0], Value::Null);
        assert_eq!(payload.to_value()[1]["body"], "hello");
    }

    #[test]
    fn test_snapshots_exposed_as_named_fields() {
        let engine = engine_with_call(4);
        let rdata = RxData {
            info: "INVITE sip:2002@192.168.2.2 SIP/2.0",
            src_addr: "192.168.2.10:5060",
        };
        let payload = EventPayload::incoming_call(&engine, 0, 4, &rdata).unwrap();
        assert_eq!(payload.call_snapshot().map(|call| call.id), Some(4));
        assert_eq!(payload.account_snapshot().map(|account| account.status), Some(200));
    }

    #[test]
    fn test_notification_events_have_no_slot() {
        let engine = engine_with_call(2);
        let mut event = Event::new(1, EventPayload::media_state(&engine, 2).unwrap());
        assert!(event.reply_slot().is_none());
        assert!(!event.respond(Reply::Status(200)));
    }

    #[test]
    fn test_respond_fills_slot_once() {
        let engine = engine_with_call(2);
        let mut event = Event::new(1, EventPayload::transfer_request(&engine, 2, "sip:carol@example.com").unwrap());
        let slot = event.reply_slot().unwrap();
        assert!(event.respond(Reply::Status(603)));
        assert!(!slot.fill(Reply::Status(200)));
        assert_eq!(slot.wait(), Reply::Status(603));
    }

    #[test]
    fn test_dropped_event_releases_waiter() {
        let engine = engine_with_call(2);
        let event = Event::new(1, EventPayload::transfer_request(&engine, 2, "sip:carol@example.com").unwrap());
        let slot = event.reply_slot().unwrap();

        let waiter = thread::spawn(move || slot.wait());
        drop(event);
        assert_eq!(waiter.join().unwrap(), Reply::None);
    }

    #[test]
    fn test_wait_timeout_on_empty_slot() {
        let slot = ResponseSlot::new();
        assert_eq!(slot.wait_timeout(Duration::from_millis(10)), None);
        slot.fill(Reply::Continue(false));
        assert_eq!(slot.wait_timeout(Duration::from_millis(10)), Some(Reply::Continue(false)));
    }
}
