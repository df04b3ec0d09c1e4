//! In-process engine used by the tests and the console
//!
//! [`SimulatedEngine`] behaves like the native engine as far as the bridge
//! can observe: every operation returns a status code, state changes are
//! reported through the registered callbacks from threads the engine spawns
//! itself, and call records are dropped as soon as the callbacks reporting
//! the disconnect have returned. Every operation is recorded so tests can
//! assert exactly which engine calls were (or were not) made.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::{
    AccountConfig, AccountId, BuddyId, CallId, CallResponse, Engine, EngineCallbacks, EngineStatus,
    MessageData, RawAccountInfo, RawBuddyInfo, RawCallInfo, RegInfoView, RxData, StatusReply,
    ROLE_UAC, ROLE_UAS,
};
use crate::enums::{CALL_STATES, MEDIA_STATUSES, SUBSCRIPTION_STATES, TRANSPORT_TYPES};
use crate::logging::forward_engine_log;

/// One recorded engine call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    Create,
    Init { console_level: u8 },
    CreateTransport { kind: i32, port: u16 },
    Start,
    AccAdd { config: AccountConfig, make_default: bool },
    CallAnswer { call_id: CallId, response: CallResponse },
    CallHangup { call_id: CallId, response: CallResponse },
    CallMakeCall { acc_id: AccountId, dst_uri: String, msg_data: MessageData },
    CallGetInfo { call_id: CallId },
    AccGetInfo { acc_id: AccountId },
    BuddyGetInfo { buddy_id: BuddyId },
    Destroy,
}

impl Invocation {
    pub fn operation(&self) -> Operation {
        match self {
            Invocation::Create => Operation::Create,
            Invocation::Init { .. } => Operation::Init,
            Invocation::CreateTransport { .. } => Operation::CreateTransport,
            Invocation::Start => Operation::Start,
            Invocation::AccAdd { .. } => Operation::AccAdd,
            Invocation::CallAnswer { .. } => Operation::CallAnswer,
            Invocation::CallHangup { .. } => Operation::CallHangup,
            Invocation::CallMakeCall { .. } => Operation::CallMakeCall,
            Invocation::CallGetInfo { .. } => Operation::CallGetInfo,
            Invocation::AccGetInfo { .. } => Operation::AccGetInfo,
            Invocation::BuddyGetInfo { .. } => Operation::BuddyGetInfo,
            Invocation::Destroy => Operation::Destroy,
        }
    }
}

/// Engine operation names, used to count invocations and inject failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Init,
    CreateTransport,
    Start,
    AccAdd,
    CallAnswer,
    CallHangup,
    CallMakeCall,
    CallGetInfo,
    AccGetInfo,
    BuddyGetInfo,
    Destroy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Created,
    Initialized,
    Started,
    Destroyed,
}

const STATE_CALLING: i32 = 1;
const STATE_INCOMING: i32 = 2;
const STATE_EARLY: i32 = 3;
const STATE_CONFIRMED: i32 = 5;
const STATE_DISCONNECTED: i32 = 6;

const MEDIA_NONE: i32 = 0;
const MEDIA_ACTIVE: i32 = 1;

const REGISTRATION_EXPIRES: i32 = 300;

struct Inner {
    lifecycle: Mutex<Lifecycle>,
    callbacks: RwLock<Option<Arc<dyn EngineCallbacks>>>,
    console_level: AtomicU8,
    calls: DashMap<CallId, RawCallInfo>,
    accounts: DashMap<AccountId, RawAccountInfo>,
    buddies: DashMap<BuddyId, RawBuddyInfo>,
    invocations: Mutex<Vec<Invocation>>,
    failures: Mutex<HashMap<Operation, EngineStatus>>,
    pending: Mutex<Vec<JoinHandle<()>>>,
    next_call: AtomicI32,
    next_account: AtomicI32,
    next_buddy: AtomicI32,
    dialogs: AtomicU64,
}

/// Engine stand-in with observable invocations and injectable failures
#[derive(Clone)]
pub struct SimulatedEngine {
    inner: Arc<Inner>,
}

impl Default for SimulatedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                lifecycle: Mutex::new(Lifecycle::Idle),
                callbacks: RwLock::new(None),
                console_level: AtomicU8::new(0),
                calls: DashMap::new(),
                accounts: DashMap::new(),
                buddies: DashMap::new(),
                invocations: Mutex::new(Vec::new()),
                failures: Mutex::new(HashMap::new()),
                pending: Mutex::new(Vec::new()),
                next_call: AtomicI32::new(0),
                next_account: AtomicI32::new(0),
                next_buddy: AtomicI32::new(0),
                dialogs: AtomicU64::new(0),
            }),
        }
    }

    // ===== TEST CONTROLS =====

    /// Make every subsequent `operation` fail with `status`
    pub fn fail_with(&self, operation: Operation, status: EngineStatus) {
        self.inner.failures.lock().insert(operation, status);
    }

    pub fn clear_failures(&self) {
        self.inner.failures.lock().clear();
    }

    /// Every engine call made so far, in order
    pub fn invocations(&self) -> Vec<Invocation> {
        self.inner.invocations.lock().clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.inner
            .invocations
            .lock()
            .iter()
            .filter(|invocation| invocation.operation() == operation)
            .count()
    }

    pub fn clear_invocations(&self) {
        self.inner.invocations.lock().clear();
    }

    pub fn is_started(&self) -> bool {
        *self.inner.lifecycle.lock() == Lifecycle::Started
    }

    pub fn is_destroyed(&self) -> bool {
        *self.inner.lifecycle.lock() == Lifecycle::Destroyed
    }

    /// The callbacks registered at `init`, while the engine is alive
    pub fn callbacks(&self) -> Option<Arc<dyn EngineCallbacks>> {
        self.inner.callbacks.read().clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.calls.len()
    }

    /// Wait for every callback thread fired by engine operations so far
    ///
    /// Must not be called from a thread those callbacks need to rendezvous with.
    pub fn settle(&self) {
        loop {
            let pending: Vec<_> = self.inner.pending.lock().drain(..).collect();
            if pending.is_empty() {
                return;
            }
            for handle in pending {
                if handle.join().is_err() {
                    warn!("Engine callback thread panicked");
                }
            }
        }
    }

    /// Callback threads fired but not yet reaped
    pub fn pending_callbacks(&self) -> usize {
        self.inner.pending.lock().len()
    }

    // ===== CALLBACK DISPATCH =====

    /// Run `f` against the registered callbacks on a fresh engine thread
    ///
    /// Returns `None` when no callbacks are registered (before `init` or
    /// after `destroy`).
    pub fn fire<T, F>(&self, f: F) -> Option<JoinHandle<T>>
    where
        T: Send + 'static,
        F: FnOnce(&dyn EngineCallbacks) -> T + Send + 'static,
    {
        let callbacks = self.callbacks()?;
        let spawned = thread::Builder::new()
            .name("engine-callback".to_string())
            .spawn(move || f(callbacks.as_ref()));
        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                warn!("Failed to spawn engine callback thread: {}", e);
                None
            }
        }
    }

    fn fire_detached<F>(&self, f: F)
    where
        F: FnOnce(&dyn EngineCallbacks) + Send + 'static,
    {
        let Some(handle) = self.fire(f) else {
            return;
        };
        let finished = {
            let mut pending = self.inner.pending.lock();
            let (finished, running): (Vec<_>, Vec<_>) =
                pending.drain(..).partition(|handle| handle.is_finished());
            *pending = running;
            pending.push(handle);
            finished
        };
        // Reaped here so a host that never settles does not collect handles.
        for handle in finished {
            if handle.join().is_err() {
                warn!("Engine callback thread panicked");
            }
        }
    }

    // ===== SIMULATED PEER ACTIVITY =====

    /// A remote party calls `acc_id`
    pub fn simulate_incoming_call(&self, acc_id: AccountId, from: &str) -> Result<CallId, EngineStatus> {
        let local_uri = self
            .inner
            .accounts
            .get(&acc_id)
            .map(|account| account.acc_uri.clone())
            .ok_or(EngineStatus::ENOTFOUND)?;
        let call_id = self.new_call(acc_id, ROLE_UAS, &local_uri, from, STATE_INCOMING);
        self.log(4, &format!("Incoming call {} from {}", call_id, from));

        let invite = format!("INVITE {} SIP/2.0", local_uri);
        let source = source_address(from);
        self.fire_detached(move |callbacks| {
            let rdata = RxData {
                info: &invite,
                src_addr: &source,
            };
            callbacks.on_incoming_call(acc_id, call_id, &rdata);
            callbacks.on_call_state(call_id);
        });
        Ok(call_id)
    }

    /// The remote party answers an outgoing call
    pub fn simulate_remote_answer(&self, call_id: CallId) -> Result<(), EngineStatus> {
        self.update_call(call_id, |call| {
            call.state = STATE_CONFIRMED;
            call.last_status = 200;
            call.last_status_text = "OK".to_string();
            call.media_status = MEDIA_ACTIVE;
        })?;
        self.fire_detached(move |callbacks| {
            callbacks.on_call_state(call_id);
            callbacks.on_call_media_state(call_id);
        });
        Ok(())
    }

    /// The remote party hangs up
    pub fn simulate_remote_hangup(&self, call_id: CallId) -> Result<(), EngineStatus> {
        self.disconnect(call_id, 200, "Normal call clearing")
    }

    pub fn simulate_dtmf(&self, call_id: CallId, digit: char) -> Result<(), EngineStatus> {
        if !self.inner.calls.contains_key(&call_id) {
            return Err(EngineStatus::ENOTFOUND);
        }
        self.fire_detached(move |callbacks| callbacks.on_dtmf_digit(call_id, digit as i32));
        Ok(())
    }

    /// The remote party sends a REFER; the handle yields the engine's decision
    pub fn simulate_transfer_request(&self, call_id: CallId, dst: &str) -> Option<JoinHandle<u16>> {
        let dst = dst.to_string();
        self.fire(move |callbacks| callbacks.on_call_transfer_request(call_id, &dst))
    }

    pub fn simulate_transfer_status(
        &self,
        call_id: CallId,
        st_code: i32,
        st_text: &str,
        is_final: bool,
    ) -> Option<JoinHandle<bool>> {
        let st_text = st_text.to_string();
        self.fire(move |callbacks| callbacks.on_call_transfer_status(call_id, st_code, &st_text, is_final))
    }

    pub fn simulate_replace_request(&self, call_id: CallId, from: &str) -> Option<JoinHandle<StatusReply>> {
        let info = format!("INVITE {} SIP/2.0", from);
        let source = source_address(from);
        self.fire(move |callbacks| {
            let rdata = RxData {
                info: &info,
                src_addr: &source,
            };
            callbacks.on_call_replace_request(call_id, &rdata)
        })
    }

    pub fn simulate_incoming_subscribe(
        &self,
        acc_id: AccountId,
        from: &str,
    ) -> Option<JoinHandle<StatusReply>> {
        let from = from.to_string();
        let info = format!("SUBSCRIBE {} SIP/2.0", from);
        let source = source_address(&from);
        self.fire(move |callbacks| {
            let rdata = RxData {
                info: &info,
                src_addr: &source,
            };
            callbacks.on_incoming_subscribe(acc_id, super::INVALID_ID, &from, &rdata)
        })
    }

    /// Add a buddy subscription and report it active
    pub fn simulate_buddy(&self, uri: &str) -> BuddyId {
        let buddy_id = self.inner.next_buddy.fetch_add(1, Ordering::SeqCst);
        let active = SUBSCRIPTION_STATES.name_to_id("ACTIVE").unwrap_or_default();
        self.inner.buddies.insert(
            buddy_id,
            RawBuddyInfo {
                id: buddy_id,
                uri: uri.to_string(),
                contact: uri.to_string(),
                status: 1,
                status_text: "Online".to_string(),
                monitor_pres: true,
                sub_state: active,
                ..Default::default()
            },
        );
        self.fire_detached(move |callbacks| {
            callbacks.on_buddy_evsub_state(buddy_id, Some("presence"));
            callbacks.on_buddy_state(buddy_id);
        });
        buddy_id
    }

    // ===== INTERNALS =====

    fn record(&self, invocation: Invocation) -> Result<(), EngineStatus> {
        let operation = invocation.operation();
        self.inner.invocations.lock().push(invocation);
        match self.inner.failures.lock().get(&operation) {
            Some(status) => Err(*status),
            None => Ok(()),
        }
    }

    fn log(&self, level: u8, message: &str) {
        if level <= self.inner.console_level.load(Ordering::Relaxed) {
            forward_engine_log(level, message);
        }
    }

    fn require_started(&self) -> Result<(), EngineStatus> {
        if self.is_started() {
            Ok(())
        } else {
            Err(EngineStatus::EINVALIDOP)
        }
    }

    fn new_call(&self, acc_id: AccountId, role: i32, local: &str, remote: &str, state: i32) -> CallId {
        let call_id = self.inner.next_call.fetch_add(1, Ordering::SeqCst);
        let dialog = self.inner.dialogs.fetch_add(1, Ordering::SeqCst);
        self.inner.calls.insert(
            call_id,
            RawCallInfo {
                id: call_id,
                role,
                acc_id,
                local_info: format!("<{}>", local),
                local_contact: format!("<{}>", local),
                remote_info: format!("<{}>", remote),
                remote_contact: format!("<{}>", remote),
                call_id: format!("sim-{}@rvoip.local", dialog),
                state,
                state_text: CALL_STATES.id_to_name(state).to_string(),
                media_status: MEDIA_NONE,
                conf_slot: call_id + 1,
                ..Default::default()
            },
        );
        call_id
    }

    fn update_call(&self, call_id: CallId, f: impl FnOnce(&mut RawCallInfo)) -> Result<(), EngineStatus> {
        let mut call = self.inner.calls.get_mut(&call_id).ok_or(EngineStatus::ENOTFOUND)?;
        f(call.value_mut());
        call.state_text = CALL_STATES.id_to_name(call.state).to_string();
        Ok(())
    }

    /// Report the call disconnected, then forget it once the callbacks returned
    fn disconnect(&self, call_id: CallId, code: u16, reason: &str) -> Result<(), EngineStatus> {
        self.update_call(call_id, |call| {
            call.state = STATE_DISCONNECTED;
            call.last_status = i32::from(code);
            call.last_status_text = reason.to_string();
            call.media_status = MEDIA_NONE;
        })?;
        let inner = self.inner.clone();
        self.fire_detached(move |callbacks| {
            callbacks.on_call_state(call_id);
            inner.calls.remove(&call_id);
        });
        Ok(())
    }
}

fn source_address(uri: &str) -> String {
    let host = uri
        .trim_start_matches("sips:")
        .trim_start_matches("sip:")
        .rsplit('@')
        .next()
        .unwrap_or_default();
    if host.contains(':') {
        host.to_string()
    } else {
        format!("{}:5060", host)
    }
}

fn reason_or(response: &CallResponse, default: &str) -> String {
    response.reason.clone().unwrap_or_else(|| default.to_string())
}

fn status_text(code: u16) -> &'static str {
    match code {
        100 => "Trying",
        180 => "Ringing",
        183 => "Session Progress",
        200 => "OK",
        202 => "Accepted",
        403 => "Forbidden",
        404 => "Not Found",
        486 => "Busy Here",
        487 => "Request Terminated",
        603 => "Decline",
        _ => "",
    }
}

impl Engine for SimulatedEngine {
    fn create(&self) -> EngineStatus {
        if let Err(status) = self.record(Invocation::Create) {
            return status;
        }
        *self.inner.lifecycle.lock() = Lifecycle::Created;
        EngineStatus::SUCCESS
    }

    fn init(&self, callbacks: Arc<dyn EngineCallbacks>, console_level: u8) -> EngineStatus {
        if let Err(status) = self.record(Invocation::Init { console_level }) {
            return status;
        }
        let mut lifecycle = self.inner.lifecycle.lock();
        if *lifecycle != Lifecycle::Created {
            return EngineStatus::EINVALIDOP;
        }
        self.inner.console_level.store(console_level, Ordering::Relaxed);
        *self.inner.callbacks.write() = Some(callbacks);
        *lifecycle = Lifecycle::Initialized;
        EngineStatus::SUCCESS
    }

    fn create_transport(&self, kind: i32, port: u16) -> EngineStatus {
        if let Err(status) = self.record(Invocation::CreateTransport { kind, port }) {
            return status;
        }
        if kind <= 0 || kind as usize >= TRANSPORT_TYPES.len() {
            return EngineStatus::EINVAL;
        }
        self.log(
            4,
            &format!("{} transport listening on 0.0.0.0:{}", TRANSPORT_TYPES.id_to_name(kind), port),
        );
        EngineStatus::SUCCESS
    }

    fn start(&self) -> EngineStatus {
        if let Err(status) = self.record(Invocation::Start) {
            return status;
        }
        let mut lifecycle = self.inner.lifecycle.lock();
        if *lifecycle != Lifecycle::Initialized {
            return EngineStatus::EINVALIDOP;
        }
        *lifecycle = Lifecycle::Started;
        EngineStatus::SUCCESS
    }

    fn acc_add(&self, config: &AccountConfig, make_default: bool) -> Result<AccountId, EngineStatus> {
        self.record(Invocation::AccAdd {
            config: config.clone(),
            make_default,
        })?;
        self.require_started()?;
        if !config.id.starts_with("sip:") {
            return Err(EngineStatus::EINVALIDURI);
        }

        let acc_id = self.inner.next_account.fetch_add(1, Ordering::SeqCst);
        let has_registration = !config.reg_uri.is_empty();
        self.inner.accounts.insert(
            acc_id,
            RawAccountInfo {
                id: acc_id,
                is_default: make_default,
                acc_uri: config.id.clone(),
                has_registration,
                expires: -1,
                status: 0,
                status_text: "In Progress".to_string(),
                online_status_text: "Offline".to_string(),
                ..Default::default()
            },
        );
        self.log(3, &format!("Account {} added: {}", acc_id, config.id));

        if has_registration {
            let inner = self.inner.clone();
            self.fire_detached(move |callbacks| {
                if let Some(mut account) = inner.accounts.get_mut(&acc_id) {
                    account.status = 200;
                    account.status_text = "OK".to_string();
                    account.expires = REGISTRATION_EXPIRES;
                    account.online_status = true;
                    account.online_status_text = "Online".to_string();
                }
                callbacks.on_reg_state(acc_id);
                let info = RegInfoView {
                    code: 200,
                    reason: "OK",
                    expiration: REGISTRATION_EXPIRES as u32,
                    renew: true,
                };
                callbacks.on_reg_state2(acc_id, &info);
            });
        }
        Ok(acc_id)
    }

    fn call_answer(&self, call_id: CallId, response: &CallResponse) -> EngineStatus {
        if let Err(status) = self.record(Invocation::CallAnswer {
            call_id,
            response: response.clone(),
        }) {
            return status;
        }
        let (role, state) = match self.inner.calls.get(&call_id) {
            Some(call) => (call.role, call.state),
            None => return EngineStatus::ENOTFOUND,
        };
        if role != ROLE_UAS || state >= STATE_CONFIRMED {
            return EngineStatus::EINVALIDOP;
        }

        let code = response.code;
        let reason = reason_or(response, status_text(code));
        if code >= 300 {
            return match self.disconnect(call_id, code, &reason) {
                Ok(()) => EngineStatus::SUCCESS,
                Err(status) => status,
            };
        }

        let confirmed = code >= 200;
        let updated = self.update_call(call_id, |call| {
            call.state = if confirmed { STATE_CONFIRMED } else { STATE_EARLY };
            call.last_status = i32::from(code);
            call.last_status_text = reason.clone();
            if confirmed {
                call.media_status = MEDIA_ACTIVE;
            }
        });
        if let Err(status) = updated {
            return status;
        }
        debug!(
            "Call {} answered with {} ({})",
            call_id,
            code,
            MEDIA_STATUSES.id_to_name(if confirmed { MEDIA_ACTIVE } else { MEDIA_NONE })
        );
        self.fire_detached(move |callbacks| {
            callbacks.on_call_state(call_id);
            if confirmed {
                callbacks.on_call_media_state(call_id);
            }
        });
        EngineStatus::SUCCESS
    }

    fn call_hangup(&self, call_id: CallId, response: &CallResponse) -> EngineStatus {
        if let Err(status) = self.record(Invocation::CallHangup {
            call_id,
            response: response.clone(),
        }) {
            return status;
        }
        let (role, state) = match self.inner.calls.get(&call_id) {
            Some(call) => (call.role, call.state),
            None => return EngineStatus::ENOTFOUND,
        };
        if state == STATE_DISCONNECTED {
            return EngineStatus::EINVALIDOP;
        }

        // Code 0 lets the engine pick: decline an unanswered incoming call,
        // cancel an unanswered outgoing one, otherwise a normal BYE.
        let code = match response.code {
            0 if state < STATE_CONFIRMED && role == ROLE_UAS => 603,
            0 if state < STATE_CONFIRMED && role == ROLE_UAC => 487,
            0 => 200,
            code => code,
        };
        let reason = reason_or(response, status_text(code));
        match self.disconnect(call_id, code, &reason) {
            Ok(()) => EngineStatus::SUCCESS,
            Err(status) => status,
        }
    }

    fn call_make_call(
        &self,
        acc_id: AccountId,
        dst_uri: &str,
        msg_data: &MessageData,
    ) -> Result<CallId, EngineStatus> {
        self.record(Invocation::CallMakeCall {
            acc_id,
            dst_uri: dst_uri.to_string(),
            msg_data: msg_data.clone(),
        })?;
        self.require_started()?;
        let local_uri = self
            .inner
            .accounts
            .get(&acc_id)
            .map(|account| account.acc_uri.clone())
            .ok_or(EngineStatus::ENOTFOUND)?;
        if !(dst_uri.starts_with("sip:") || dst_uri.starts_with("sips:")) {
            return Err(EngineStatus::EINVALIDURI);
        }

        let call_id = self.new_call(acc_id, ROLE_UAC, &local_uri, dst_uri, STATE_CALLING);
        self.log(4, &format!("Making call {} to {}", call_id, dst_uri));
        self.fire_detached(move |callbacks| callbacks.on_call_state(call_id));
        Ok(call_id)
    }

    fn call_get_info(&self, call_id: CallId) -> Result<RawCallInfo, EngineStatus> {
        self.record(Invocation::CallGetInfo { call_id })?;
        self.inner
            .calls
            .get(&call_id)
            .map(|call| call.value().clone())
            .ok_or(EngineStatus::ENOTFOUND)
    }

    fn acc_get_info(&self, acc_id: AccountId) -> Result<RawAccountInfo, EngineStatus> {
        self.record(Invocation::AccGetInfo { acc_id })?;
        self.inner
            .accounts
            .get(&acc_id)
            .map(|account| account.value().clone())
            .ok_or(EngineStatus::ENOTFOUND)
    }

    fn buddy_get_info(&self, buddy_id: BuddyId) -> Result<RawBuddyInfo, EngineStatus> {
        self.record(Invocation::BuddyGetInfo { buddy_id })?;
        self.inner
            .buddies
            .get(&buddy_id)
            .map(|buddy| buddy.value().clone())
            .ok_or(EngineStatus::ENOTFOUND)
    }

    fn strerror(&self, status: EngineStatus) -> String {
        let text = match status {
            EngineStatus::SUCCESS => "Success",
            EngineStatus::EINVAL => "Invalid argument",
            EngineStatus::ENOTFOUND => "Not found",
            EngineStatus::EBUSY => "Object is busy",
            EngineStatus::EINVALIDOP => "Invalid operation",
            EngineStatus::EINVALIDURI => "Invalid URI",
            EngineStatus(other) => return format!("Unknown error {}", other),
        };
        text.to_string()
    }

    fn destroy(&self) -> EngineStatus {
        if let Err(status) = self.record(Invocation::Destroy) {
            return status;
        }
        *self.inner.lifecycle.lock() = Lifecycle::Destroyed;
        // Releases the bridge held by the callbacks.
        self.inner.callbacks.write().take();
        self.inner.calls.clear();
        self.inner.accounts.clear();
        self.inner.buddies.clear();
        EngineStatus::SUCCESS
    }
}
