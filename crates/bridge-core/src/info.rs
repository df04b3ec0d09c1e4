//! Snapshot records of engine state
//!
//! [`CallInfo`], [`AccountInfo`] and [`BuddyInfo`] are flat, owned copies of
//! what the engine reports for one object at one instant. They are built from
//! a single engine query, embedded into an event or returned to the caller,
//! and never mutated afterwards. No field refers back into engine memory.

use serde::{Deserialize, Serialize};

use crate::engine::{
    AccountId, BuddyId, CallId, Engine, EngineStatus, RawAccountInfo, RawBuddyInfo, RawCallInfo,
    RawPresence, ROLE_UAC,
};
use crate::enums::SUBSCRIPTION_STATES;
use crate::error::{BridgeError, BridgeResult};

/// Role of the local endpoint in a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallRole {
    #[serde(rename = "UAC")]
    Uac,
    #[serde(rename = "UAS")]
    Uas,
}

impl CallRole {
    pub fn from_code(role: i32) -> Self {
        if role == ROLE_UAC { CallRole::Uac } else { CallRole::Uas }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallRole::Uac => "UAC",
            CallRole::Uas => "UAS",
        }
    }
}

/// Snapshot of a call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallInfo {
    pub id: CallId,
    pub role: CallRole,
    pub acc_id: AccountId,
    pub local_info: String,
    pub local_contact: String,
    pub remote_info: String,
    pub remote_contact: String,
    /// SIP Call-ID header value
    pub call_id: String,
    pub state: i32,
    pub state_text: String,
    pub last_status: i32,
    pub last_status_text: String,
    pub media_status: i32,
    pub media_dir: i32,
    pub conf_slot: i32,
    /// Seconds since the call was confirmed
    pub connect_duration: f64,
    /// Seconds since the call was created
    pub total_duration: f64,
}

impl CallInfo {
    /// Query the engine and copy the result
    pub fn capture(engine: &dyn Engine, call_id: CallId) -> BridgeResult<Self> {
        let raw = engine
            .call_get_info(call_id)
            .map_err(|status| query_error(engine, "Error getting call info", status))?;
        Ok(Self::from(&raw))
    }
}

impl From<&RawCallInfo> for CallInfo {
    fn from(raw: &RawCallInfo) -> Self {
        Self {
            id: raw.id,
            role: CallRole::from_code(raw.role),
            acc_id: raw.acc_id,
            local_info: raw.local_info.clone(),
            local_contact: raw.local_contact.clone(),
            remote_info: raw.remote_info.clone(),
            remote_contact: raw.remote_contact.clone(),
            call_id: raw.call_id.clone(),
            state: raw.state,
            state_text: raw.state_text.clone(),
            last_status: raw.last_status,
            last_status_text: raw.last_status_text.clone(),
            media_status: raw.media_status,
            media_dir: raw.media_dir,
            conf_slot: raw.conf_slot,
            connect_duration: raw.connect_duration.as_secs_f64(),
            total_duration: raw.total_duration.as_secs_f64(),
        }
    }
}

/// Rich presence (RPID) fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceInfo {
    #[serde(rename = "type")]
    pub kind: i32,
    pub id: String,
    pub activity: i32,
    pub note: String,
}

impl From<&RawPresence> for PresenceInfo {
    fn from(raw: &RawPresence) -> Self {
        Self {
            kind: raw.kind,
            id: raw.id.clone(),
            activity: raw.activity,
            note: raw.note.clone(),
        }
    }
}

/// Snapshot of an account and its registration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: AccountId,
    pub is_default: bool,
    pub acc_uri: String,
    pub has_registration: bool,
    pub expires: i32,
    /// Last registration status code
    pub status: i32,
    pub reg_last_err: i32,
    pub status_text: String,
    pub online_status: bool,
    pub online_status_text: String,
    pub rpid: PresenceInfo,
}

impl AccountInfo {
    pub fn capture(engine: &dyn Engine, acc_id: AccountId) -> BridgeResult<Self> {
        let raw = engine
            .acc_get_info(acc_id)
            .map_err(|status| query_error(engine, "Error getting account info", status))?;
        Ok(Self::from(&raw))
    }

    /// Whether the last registration attempt got a final response
    pub fn registration_complete(&self) -> bool {
        self.status >= 200
    }
}

impl From<&RawAccountInfo> for AccountInfo {
    fn from(raw: &RawAccountInfo) -> Self {
        Self {
            id: raw.id,
            is_default: raw.is_default,
            acc_uri: raw.acc_uri.clone(),
            has_registration: raw.has_registration,
            expires: raw.expires,
            status: raw.status,
            reg_last_err: raw.reg_last_err,
            status_text: raw.status_text.clone(),
            online_status: raw.online_status,
            online_status_text: raw.online_status_text.clone(),
            rpid: PresenceInfo::from(&raw.rpid),
        }
    }
}

/// Snapshot of a buddy's presence subscription
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuddyInfo {
    pub id: BuddyId,
    pub uri: String,
    pub contact: String,
    pub status: i32,
    pub status_text: String,
    pub monitor_pres: bool,
    pub sub_state: i32,
    pub sub_state_name: String,
    pub sub_term_reason: String,
    pub rpid: PresenceInfo,
}

impl BuddyInfo {
    pub fn capture(engine: &dyn Engine, buddy_id: BuddyId) -> BridgeResult<Self> {
        let raw = engine
            .buddy_get_info(buddy_id)
            .map_err(|status| query_error(engine, "Error getting buddy info", status))?;
        Ok(Self::from(&raw))
    }
}

impl From<&RawBuddyInfo> for BuddyInfo {
    fn from(raw: &RawBuddyInfo) -> Self {
        Self {
            id: raw.id,
            uri: raw.uri.clone(),
            contact: raw.contact.clone(),
            status: raw.status,
            status_text: raw.status_text.clone(),
            monitor_pres: raw.monitor_pres,
            sub_state: raw.sub_state,
            sub_state_name: SUBSCRIPTION_STATES.id_to_name(raw.sub_state).to_string(),
            sub_term_reason: raw.sub_term_reason.clone(),
            rpid: PresenceInfo::from(&raw.rpid),
        }
    }
}

pub(crate) fn query_error(engine: &dyn Engine, operation: &str, status: EngineStatus) -> BridgeError {
    BridgeError::engine(operation, status.0, engine.strerror(status))
}
