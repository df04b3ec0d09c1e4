//! Foreign call gateway
//!
//! Thin synchronous wrappers over the engine's call-in surface. Each
//! operation validates its arguments, performs exactly one engine call and
//! turns a failing status into [`BridgeError::Engine`] with the engine's own
//! description of the failure. Invalid arguments are reported as
//! [`BridgeError::Usage`] without touching the engine.
//!
//! Gateway operations belong on the host's thread. They must never be called
//! from inside an engine callback.
//!
//! [`Gateway::invoke`] exposes the same operations as named commands taking
//! JSON arguments, for hosts that drive the bridge dynamically.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::{is_hangup_code, BridgeConfig, TransportSettings, ANSWER_CODES};
use crate::engine::{
    AccountConfig, AccountId, CallId, CallResponse, Credential, Engine, EngineCallbacks,
    EngineStatus, MessageData,
};
use crate::error::{BridgeError, BridgeResult};
use crate::info::{query_error, AccountInfo, BuddyInfo, CallInfo};

/// Synchronous call-in surface of the engine
#[derive(Clone)]
pub struct Gateway {
    engine: Arc<dyn Engine>,
    transport: TransportSettings,
    console_log_level: u8,
    default_answer_code: u16,
    default_hangup_code: u16,
}

impl Gateway {
    pub fn new(engine: Arc<dyn Engine>, config: &BridgeConfig) -> Self {
        Self {
            engine,
            transport: config.transport.clone(),
            console_log_level: config.console_log_level,
            default_answer_code: config.default_answer_code,
            default_hangup_code: config.default_hangup_code,
        }
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    fn check(&self, operation: &str, status: EngineStatus) -> BridgeResult<()> {
        status
            .into_result()
            .map_err(|status| query_error(self.engine.as_ref(), operation, status))
    }

    /// Create the engine instance
    pub fn create_engine(&self) -> BridgeResult<()> {
        self.check("Error creating engine", self.engine.create())
    }

    /// Register `callbacks`, open the configured transport and start the engine
    pub fn start_engine(&self, callbacks: Arc<dyn EngineCallbacks>) -> BridgeResult<()> {
        let kind = self.transport.kind.engine_id()?;

        self.check(
            "Error initializing engine",
            self.engine.init(callbacks, self.console_log_level),
        )?;
        self.check(
            "Error creating transport",
            self.engine.create_transport(kind, self.transport.port),
        )?;
        self.check("Error starting engine", self.engine.start())?;

        info!(
            "Engine started on {} port {}",
            self.transport.kind.table_name(),
            self.transport.port
        );
        Ok(())
    }

    /// Destroy the engine; drops the registered callbacks
    pub fn shutdown_engine(&self) -> BridgeResult<()> {
        self.check("Error destroying engine", self.engine.destroy())?;
        info!("Engine destroyed");
        Ok(())
    }

    /// Register `user@domain` with the registrar at `domain`
    pub fn add_account(&self, user: &str, domain: &str, password: &str) -> BridgeResult<AccountId> {
        if user.is_empty() || domain.is_empty() {
            return Err(BridgeError::usage("addAccount requires a user and a domain"));
        }

        let config = AccountConfig {
            id: format!("sip:{}@{}", user, domain),
            reg_uri: format!("sip:{}", domain),
            credentials: vec![Credential {
                realm: domain.to_string(),
                scheme: "digest".to_string(),
                username: user.to_string(),
                password: password.to_string(),
            }],
        };
        let acc_id = self
            .engine
            .acc_add(&config, true)
            .map_err(|status| query_error(self.engine.as_ref(), "Error adding account", status))?;

        info!("Added account {} as {}", config.id, acc_id);
        Ok(acc_id)
    }

    /// Answer an incoming call; `status` defaults to 200
    pub fn answer_call(&self, call_id: CallId, status: Option<u16>) -> BridgeResult<()> {
        self.answer_call_with(call_id, status, None, MessageData::default())
    }

    /// Answer with an explicit reason phrase and extra headers
    pub fn answer_call_with(
        &self,
        call_id: CallId,
        status: Option<u16>,
        reason: Option<&str>,
        msg_data: MessageData,
    ) -> BridgeResult<()> {
        validate_call_id("callAnswer", call_id)?;
        let code = status.unwrap_or(self.default_answer_code);
        if !ANSWER_CODES.contains(&code) {
            return Err(BridgeError::usage(format!(
                "Invalid status {} to callAnswer, expected 100-699",
                code
            )));
        }

        let response = CallResponse {
            code,
            reason: reason.map(str::to_string),
            msg_data,
        };
        self.check("Error answering call", self.engine.call_answer(call_id, &response))?;
        debug!("Answered call {} with {}", call_id, code);
        Ok(())
    }

    /// Hang up a call; `status` defaults to 0 (engine's choice)
    pub fn hangup_call(&self, call_id: CallId, status: Option<u16>) -> BridgeResult<()> {
        self.hangup_call_with(call_id, status, None, MessageData::default())
    }

    pub fn hangup_call_with(
        &self,
        call_id: CallId,
        status: Option<u16>,
        reason: Option<&str>,
        msg_data: MessageData,
    ) -> BridgeResult<()> {
        validate_call_id("callHangup", call_id)?;
        let code = status.unwrap_or(self.default_hangup_code);
        if !is_hangup_code(code) {
            return Err(BridgeError::usage(format!(
                "Invalid status {} to callHangup, expected 0 or 100-699",
                code
            )));
        }

        let response = CallResponse {
            code,
            reason: reason.map(str::to_string),
            msg_data,
        };
        self.check("Error hanging up", self.engine.call_hangup(call_id, &response))?;
        debug!("Hung up call {} with {}", call_id, code);
        Ok(())
    }

    /// Place a call from `acc_id` to `dst_uri`
    pub fn make_call(&self, acc_id: AccountId, dst_uri: &str) -> BridgeResult<CallId> {
        self.make_call_with(acc_id, dst_uri, MessageData::default())
    }

    pub fn make_call_with(&self, acc_id: AccountId, dst_uri: &str, msg_data: MessageData) -> BridgeResult<CallId> {
        if acc_id < 0 {
            return Err(BridgeError::usage(format!("Invalid account id {} to callMakeCall", acc_id)));
        }
        if dst_uri.trim().is_empty() {
            return Err(BridgeError::usage("callMakeCall requires a destination URI"));
        }

        let call_id = self
            .engine
            .call_make_call(acc_id, dst_uri, &msg_data)
            .map_err(|status| query_error(self.engine.as_ref(), "Error making call", status))?;
        info!("Calling {} from account {} as call {}", dst_uri, acc_id, call_id);
        Ok(call_id)
    }

    pub fn call_info(&self, call_id: CallId) -> BridgeResult<CallInfo> {
        validate_call_id("callInfo", call_id)?;
        CallInfo::capture(self.engine.as_ref(), call_id)
    }

    pub fn account_info(&self, acc_id: AccountId) -> BridgeResult<AccountInfo> {
        if acc_id < 0 {
            return Err(BridgeError::usage(format!("Invalid account id {} to accountInfo", acc_id)));
        }
        AccountInfo::capture(self.engine.as_ref(), acc_id)
    }

    pub fn buddy_info(&self, buddy_id: i32) -> BridgeResult<BuddyInfo> {
        if buddy_id < 0 {
            return Err(BridgeError::usage(format!("Invalid buddy id {} to buddyInfo", buddy_id)));
        }
        BuddyInfo::capture(self.engine.as_ref(), buddy_id)
    }

    /// Run a named command with positional JSON arguments
    ///
    /// | command | arguments | result |
    /// |---------|-----------|--------|
    /// | `addAccount` | `user, domain, password` | account id |
    /// | `callAnswer` | `callId[, status[, reason[, msg_data]]]` | `null` |
    /// | `callHangup` | `callId[, status[, reason[, msg_data]]]` | `null` |
    /// | `callMakeCall` | `accountId, uri[, options[, user_data[, msg_data]]]` | call id |
    /// | `callInfo` | `callId` | call record |
    /// | `accountInfo` | `accountId` | account record |
    pub fn invoke(&self, command: &str, args: &[Value]) -> BridgeResult<Value> {
        match command {
            "addAccount" => {
                let args = Args::new(command, "user, domain, password", args, 3..=3)?;
                let acc_id = self.add_account(args.str(0)?, args.str(1)?, args.str(2)?)?;
                Ok(json!(acc_id))
            }
            "callAnswer" | "callHangup" => {
                let args = Args::new(command, "callId[, status[, reason[, msg_data]]]", args, 1..=4)?;
                let call_id = args.int(0)?;
                let status = args.opt_status(1)?;
                let reason = args.opt_str(2)?;
                let msg_data = args.opt_msg_data(3)?;
                if command == "callAnswer" {
                    self.answer_call_with(call_id, status, reason, msg_data)?;
                } else {
                    self.hangup_call_with(call_id, status, reason, msg_data)?;
                }
                Ok(Value::Null)
            }
            "callMakeCall" => {
                let args = Args::new(
                    command,
                    "accountId, uri[, options[, user_data[, msg_data]]]",
                    args,
                    2..=5,
                )?;
                // Call options and user data have no engine counterpart; options must still be an integer.
                if args.get(2).is_some() {
                    args.int(2)?;
                }
                let call_id = self.make_call_with(args.int(0)?, args.str(1)?, args.opt_msg_data(4)?)?;
                Ok(json!(call_id))
            }
            "callInfo" => {
                let args = Args::new(command, "callId", args, 1..=1)?;
                Ok(json!(self.call_info(args.int(0)?)?))
            }
            "accountInfo" => {
                let args = Args::new(command, "accountId", args, 1..=1)?;
                Ok(json!(self.account_info(args.int(0)?)?))
            }
            other => Err(BridgeError::usage(format!("Unknown command {}", other))),
        }
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("transport", &self.transport)
            .field("console_log_level", &self.console_log_level)
            .finish()
    }
}

fn validate_call_id(command: &str, call_id: CallId) -> BridgeResult<()> {
    if call_id < 0 {
        return Err(BridgeError::usage(format!("Invalid call id {} to {}", call_id, command)));
    }
    Ok(())
}

/// Positional arguments of one [`Gateway::invoke`] command
struct Args<'a> {
    command: &'a str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    fn new(
        command: &'a str,
        signature: &str,
        values: &'a [Value],
        arity: std::ops::RangeInclusive<usize>,
    ) -> BridgeResult<Self> {
        if !arity.contains(&values.len()) {
            return Err(BridgeError::usage(format!(
                "Invalid number of arguments to {} ({})",
                command, signature
            )));
        }
        Ok(Self { command, values })
    }

    fn type_error(&self, index: usize, expected: &str) -> BridgeError {
        BridgeError::usage(format!(
            "Argument {} to {} must be {}",
            index + 1,
            self.command,
            expected
        ))
    }

    /// A present, non-null argument
    fn get(&self, index: usize) -> Option<&'a Value> {
        self.values.get(index).filter(|value| !value.is_null())
    }

    fn int(&self, index: usize) -> BridgeResult<i32> {
        self.get(index)
            .and_then(Value::as_i64)
            .and_then(|value| i32::try_from(value).ok())
            .ok_or_else(|| self.type_error(index, "an integer"))
    }

    fn str(&self, index: usize) -> BridgeResult<&'a str> {
        self.get(index)
            .and_then(Value::as_str)
            .ok_or_else(|| self.type_error(index, "a string"))
    }

    fn opt_str(&self, index: usize) -> BridgeResult<Option<&'a str>> {
        match self.get(index) {
            None => Ok(None),
            Some(value) => value
                .as_str()
                .map(Some)
                .ok_or_else(|| self.type_error(index, "a string")),
        }
    }

    fn opt_status(&self, index: usize) -> BridgeResult<Option<u16>> {
        match self.get(index) {
            None => Ok(None),
            Some(value) => value
                .as_u64()
                .and_then(|value| u16::try_from(value).ok())
                .map(Some)
                .ok_or_else(|| self.type_error(index, "a status code")),
        }
    }

    fn opt_msg_data(&self, index: usize) -> BridgeResult<MessageData> {
        match self.get(index) {
            None => Ok(MessageData::default()),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|_| self.type_error(index, "a msg_data object")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EngineCallbacks, MockEngine, RawCallInfo};
    use mockall::predicate::eq;
    use mockall::Sequence;

    struct NoCallbacks;

    impl EngineCallbacks for NoCallbacks {}

    fn gateway(engine: MockEngine) -> Gateway {
        Gateway::new(Arc::new(engine), &BridgeConfig::default())
    }

    #[test]
    fn test_make_call_validation_never_reaches_engine() {
        let mut engine = MockEngine::new();
        engine.expect_call_make_call().times(0);
        let gateway = gateway(engine);

        assert!(matches!(gateway.make_call(-1, "sip:bob@example.com"), Err(BridgeError::Usage { .. })));
        assert!(matches!(gateway.make_call(0, ""), Err(BridgeError::Usage { .. })));
        assert!(matches!(gateway.make_call(0, "   "), Err(BridgeError::Usage { .. })));
    }

    #[test]
    fn test_answer_defaults_to_200() {
        let mut engine = MockEngine::new();
        engine
            .expect_call_answer()
            .withf(|call_id, response| *call_id == 3 && response.code == 200 && response.reason.is_none())
            .times(1)
            .returning(|_, _| EngineStatus::SUCCESS);
        gateway(engine).answer_call(3, None).unwrap();
    }

    #[test]
    fn test_answer_status_passes_through() {
        let mut engine = MockEngine::new();
        engine
            .expect_call_answer()
            .withf(|_, response| response.code == 403)
            .times(1)
            .returning(|_, _| EngineStatus::SUCCESS);
        gateway(engine).answer_call(3, Some(403)).unwrap();
    }

    #[test]
    fn test_reason_and_headers_forwarded() {
        let mut engine = MockEngine::new();
        engine
            .expect_call_hangup()
            .withf(|_, response| {
                response.code == 486
                    && response.reason.as_deref() == Some("Busy")
                    && response.msg_data.headers == vec![("X-Reason".to_string(), "dnd".to_string())]
            })
            .times(1)
            .returning(|_, _| EngineStatus::SUCCESS);
        let msg_data = MessageData {
            headers: vec![("X-Reason".to_string(), "dnd".to_string())],
            ..Default::default()
        };
        gateway(engine)
            .hangup_call_with(1, Some(486), Some("Busy"), msg_data)
            .unwrap();
    }

    #[test]
    fn test_hangup_defaults_to_zero() {
        let mut engine = MockEngine::new();
        engine
            .expect_call_hangup()
            .withf(|_, response| response.code == 0)
            .times(1)
            .returning(|_, _| EngineStatus::SUCCESS);
        gateway(engine).hangup_call(1, None).unwrap();
    }

    #[test]
    fn test_out_of_range_status_is_usage_error() {
        let mut engine = MockEngine::new();
        engine.expect_call_answer().times(0);
        engine.expect_call_hangup().times(0);
        let gateway = gateway(engine);
        assert!(matches!(gateway.answer_call(1, Some(99)), Err(BridgeError::Usage { .. })));
        assert!(matches!(gateway.answer_call(1, Some(700)), Err(BridgeError::Usage { .. })));
        assert!(matches!(gateway.hangup_call(1, Some(42)), Err(BridgeError::Usage { .. })));
    }

    #[test]
    fn test_engine_failure_carries_reason() {
        let mut engine = MockEngine::new();
        engine
            .expect_call_answer()
            .returning(|_, _| EngineStatus::EINVALIDOP);
        engine
            .expect_strerror()
            .with(eq(EngineStatus::EINVALIDOP))
            .returning(|_| "Invalid operation".to_string());

        let error = gateway(engine).answer_call(5, None).unwrap_err();
        assert_eq!(error.to_string(), "Error answering call: Invalid operation");
        assert_eq!(error.engine_status(), Some(70013));
    }

    #[test]
    fn test_add_account_builds_identity_and_credential() {
        let mut engine = MockEngine::new();
        engine
            .expect_acc_add()
            .withf(|config, make_default| {
                *make_default
                    && config.id == "sip:2002@192.168.2.2"
                    && config.reg_uri == "sip:192.168.2.2"
                    && config.credentials
                        == vec![Credential {
                            realm: "192.168.2.2".to_string(),
                            scheme: "digest".to_string(),
                            username: "2002".to_string(),
                            password: "1234".to_string(),
                        }]
            })
            .times(1)
            .returning(|_, _| Ok(4));
        assert_eq!(gateway(engine).add_account("2002", "192.168.2.2", "1234").unwrap(), 4);
    }

    #[test]
    fn test_start_runs_init_transport_start_in_order() {
        let mut engine = MockEngine::new();
        let mut seq = Sequence::new();
        engine
            .expect_init()
            .withf(|_, level| *level == 1)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| EngineStatus::SUCCESS);
        engine
            .expect_create_transport()
            .with(eq(1), eq(5060))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| EngineStatus::SUCCESS);
        engine
            .expect_start()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| EngineStatus::SUCCESS);

        gateway(engine).start_engine(Arc::new(NoCallbacks)).unwrap();
    }

    #[test]
    fn test_start_reports_failing_step() {
        let mut engine = MockEngine::new();
        engine.expect_init().returning(|_, _| EngineStatus::SUCCESS);
        engine
            .expect_create_transport()
            .returning(|_, _| EngineStatus::EBUSY);
        engine.expect_start().times(0);
        engine
            .expect_strerror()
            .returning(|_| "Object is busy".to_string());

        let error = gateway(engine).start_engine(Arc::new(NoCallbacks)).unwrap_err();
        assert_eq!(error.to_string(), "Error creating transport: Object is busy");
    }

    #[test]
    fn test_invoke_arity_message() {
        let gateway = gateway(MockEngine::new());
        let error = gateway.invoke("callAnswer", &[]).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Invalid number of arguments to callAnswer (callId[, status[, reason[, msg_data]]])"
        );
        let error = gateway
            .invoke("addAccount", &[json!("2002"), json!("192.168.2.2")])
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Invalid number of arguments to addAccount (user, domain, password)"
        );
    }

    #[test]
    fn test_invoke_type_checks_before_engine() {
        let mut engine = MockEngine::new();
        engine.expect_call_make_call().times(0);
        let gateway = gateway(engine);
        let error = gateway
            .invoke("callMakeCall", &[json!("zero"), json!("sip:bob@example.com")])
            .unwrap_err();
        assert_eq!(error.to_string(), "Argument 1 to callMakeCall must be an integer");
        assert!(gateway.invoke("callTransfer", &[]).is_err());
    }

    #[test]
    fn test_invoke_make_call_and_info() {
        let mut engine = MockEngine::new();
        engine
            .expect_call_make_call()
            .with(eq(0), eq("sip:bob@example.com"), eq(MessageData::default()))
            .returning(|_, _, _| Ok(8));
        engine.expect_call_get_info().returning(|id| {
            Ok(RawCallInfo {
                id,
                state_text: "CALLING".to_string(),
                ..Default::default()
            })
        });
        let gateway = gateway(engine);

        let call_id = gateway
            .invoke("callMakeCall", &[json!(0), json!("sip:bob@example.com")])
            .unwrap();
        assert_eq!(call_id, json!(8));
        let info = gateway.invoke("callInfo", &[call_id]).unwrap();
        assert_eq!(info["state_text"], "CALLING");
    }

    #[test]
    fn test_invoke_make_call_skips_options_and_user_data() {
        let mut engine = MockEngine::new();
        engine
            .expect_call_make_call()
            .withf(|acc_id, uri, msg_data| {
                *acc_id == 1
                    && uri == "sip:bob@example.com"
                    && msg_data.headers == vec![("X-Ticket".to_string(), "42".to_string())]
            })
            .times(1)
            .returning(|_, _, _| Ok(3));
        let gateway = gateway(engine);

        let msg_data = json!({ "headers": [["X-Ticket", "42"]] });
        let call_id = gateway
            .invoke(
                "callMakeCall",
                &[json!(1), json!("sip:bob@example.com"), json!(0), json!({ "tag": 9 }), msg_data],
            )
            .unwrap();
        assert_eq!(call_id, json!(3));

        let error = gateway
            .invoke("callMakeCall", &[json!(1), json!("sip:bob@example.com"), json!("fast")])
            .unwrap_err();
        assert_eq!(error.to_string(), "Argument 3 to callMakeCall must be an integer");
        let error = gateway
            .invoke("callMakeCall", &[json!(1), json!("sip:a@b"), Value::Null, Value::Null, Value::Null, Value::Null])
            .unwrap_err();
        assert_eq!(
            error.to_string(),
            "Invalid number of arguments to callMakeCall (accountId, uri[, options[, user_data[, msg_data]]])"
        );
    }

    #[test]
    fn test_invoke_answer_with_null_status_uses_default() {
        let mut engine = MockEngine::new();
        engine
            .expect_call_answer()
            .withf(|_, response| response.code == 200 && response.reason.as_deref() == Some("Welcome"))
            .times(1)
            .returning(|_, _| EngineStatus::SUCCESS);
        gateway(engine)
            .invoke("callAnswer", &[json!(2), Value::Null, json!("Welcome")])
            .unwrap();
    }
}
