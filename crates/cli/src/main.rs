//! rvoip-bridge: interactive console for the engine bridge
//!
//! Starts a bridge against the bundled simulated engine, registers one
//! account and then reads commands from stdin:
//!
//! ```text
//! CALL <uri>        place a call
//! ANSWER            answer the current incoming call
//! HANGUP            hang up the current call
//! INFO              show the current call
//! RING <uri>        simulate an incoming call from <uri>
//! DTMF <digits>     simulate digits received on the current call
//! REMOTE-ANSWER     simulate the far end answering
//! REMOTE-HANGUP     simulate the far end hanging up
//! QUIT
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use rvoip_bridge_core::logging::parse_log_level;
use rvoip_bridge_core::{
    AccountId, Bridge, BridgeConfig, CallId, Engine, EngineStatus, LoggingConfig, MessageData, Reply,
    SimulatedEngine, MEDIA_STATUSES, VERSION, setup_logging,
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::LocalSet;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "rvoip-bridge", version, about = "Interactive console for the rvoip engine bridge")]
struct Args {
    /// SIP user name
    #[arg(long, env = "SIP_USER")]
    user: String,

    /// SIP registrar / gateway host
    #[arg(long, env = "SIP_GATEWAY")]
    gateway: String,

    /// SIP password
    #[arg(long, env = "SIP_PASSWORD", hide_env_values = true)]
    password: String,

    /// Bridge configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log level for lines forwarded from the engine (defaults to --log-level)
    #[arg(long)]
    engine_log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,

    /// Print every event the handler receives
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut logging = LoggingConfig::new(parse_log_level(&args.log_level)?).with_json(args.json_logs);
    if let Some(level) = &args.engine_log_level {
        logging = logging.with_engine_level(parse_log_level(level)?);
    }
    setup_logging(logging)?;
    info!("Starting rvoip-bridge v{}", VERSION);

    let config = load_config(args.config.as_deref())?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build runtime")?;

    // The bridge and its handler live on this thread only.
    LocalSet::new().block_on(&runtime, run(args, config))
}

/// Explicit path, else `<config dir>/rvoip-bridge/config.toml` if present, else defaults
fn load_config(explicit: Option<&Path>) -> Result<BridgeConfig> {
    if let Some(path) = explicit {
        return BridgeConfig::from_file(path).with_context(|| format!("loading {}", path.display()));
    }
    let default_path = dirs::config_dir().map(|dir| dir.join("rvoip-bridge").join("config.toml"));
    match default_path {
        Some(path) if path.exists() => {
            info!("Using configuration from {}", path.display());
            Ok(BridgeConfig::from_file(&path)?)
        }
        _ => Ok(BridgeConfig::default()),
    }
}

async fn run(args: Args, config: BridgeConfig) -> Result<()> {
    let engine = SimulatedEngine::new();
    let bridge = Bridge::try_new(Arc::new(engine.clone()), config)?;

    let (tx, mut events) = mpsc::unbounded_channel();
    let verbose = args.verbose;
    bridge.start(move |name: &str, payload: &Value| {
        if verbose {
            println!("got event {} {}", name, payload);
        }
        let _ = tx.send((name.to_string(), payload.clone()));
        Reply::None
    })?;

    let account = bridge
        .gateway()
        .add_account(&args.user, &args.gateway, &args.password)?;
    let mut console = Console {
        bridge,
        engine,
        account,
        current_call: None,
        registered: false,
        sip_uri: format!("sip:{}@{}", args.user, args.gateway),
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !console.command(&line) {
                    break;
                }
            }
            Some((name, payload)) = events.recv() => console.on_event(&name, &payload),
        }
    }

    console.bridge.stop().await?;
    info!("Console finished");
    Ok(())
}

struct Console {
    bridge: Bridge,
    engine: SimulatedEngine,
    account: AccountId,
    current_call: Option<CallId>,
    registered: bool,
    sip_uri: String,
}

impl Console {
    /// Run one command line; returns false on QUIT
    fn command(&mut self, line: &str) -> bool {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            return true;
        };
        let argument = words.next();
        debug!("Console command {}", command);

        match command.to_uppercase().as_str() {
            "CALL" => self.call(argument),
            "ANSWER" => self.with_call(|console, call| {
                console.report(console.bridge.gateway().answer_call(call, Some(200)))
            }),
            "HANGUP" => self.with_call(|console, call| {
                console.report(console.bridge.gateway().hangup_call(call, None))
            }),
            "INFO" => self.with_call(|console, call| match console.bridge.gateway().call_info(call) {
                Ok(info) => println!("{:#?}", info),
                Err(e) => error(e),
            }),
            "RING" => match argument {
                Some(uri) => {
                    let rung = self.engine.simulate_incoming_call(self.account, uri);
                    self.report_engine(rung.map(|_| ()));
                }
                None => error("Missing URI"),
            },
            "DTMF" => self.with_call(|console, call| {
                for digit in argument.unwrap_or_default().chars() {
                    console.report_engine(console.engine.simulate_dtmf(call, digit));
                }
            }),
            "REMOTE-ANSWER" => self.with_call(|console, call| {
                console.report_engine(console.engine.simulate_remote_answer(call))
            }),
            "REMOTE-HANGUP" => self.with_call(|console, call| {
                console.report_engine(console.engine.simulate_remote_hangup(call))
            }),
            "QUIT" => return false,
            other => error(format!("Unknown command {}", other)),
        }
        self.prompt();
        true
    }

    fn call(&mut self, uri: Option<&str>) {
        if self.current_call.is_some() {
            error("Already have another call");
            return;
        }
        let Some(uri) = uri else {
            error("Missing URI");
            return;
        };
        println!("CALLING {}", uri);
        match self.bridge.gateway().make_call(self.account, uri) {
            Ok(call) => self.current_call = Some(call),
            Err(e) => println!("{} {}", "Exception:".red(), e),
        }
    }

    fn with_call(&mut self, f: impl FnOnce(&mut Self, CallId)) {
        match self.current_call {
            Some(call) => f(self, call),
            None => error("There is no call"),
        }
    }

    fn on_event(&mut self, name: &str, payload: &Value) {
        match name {
            "reg_state" if !self.registered => {
                let status = payload["status"].as_i64().unwrap_or_default();
                if status >= 200 {
                    self.registered = true;
                    println!(
                        "{} {} {}",
                        "REGISTRATION_COMPLETE".green(),
                        status,
                        payload["status_text"].as_str().unwrap_or_default()
                    );
                    self.prompt();
                }
            }
            "incoming_call" => self.on_incoming(&payload[1]),
            "call_state" => {
                println!(
                    "STATE {} CODE {} {}",
                    payload["state_text"].as_str().unwrap_or_default(),
                    payload["last_status"],
                    payload["last_status_text"].as_str().unwrap_or_default()
                );
                let call = payload["id"].as_i64().map(|id| id as CallId);
                if payload["state_text"] == "DISCONNECTED" && call == self.current_call {
                    self.current_call = None;
                }
            }
            "media_state" => {
                let status = payload["media_status"].as_i64().unwrap_or_default() as i32;
                if MEDIA_STATUSES.id_to_name(status) == "ACTIVE" {
                    println!("MEDIA active");
                } else {
                    println!("MEDIA inactive");
                }
            }
            _ => {}
        }
    }

    /// Ring a new caller, or turn it away when a call is already up
    fn on_incoming(&mut self, call: &Value) {
        let Some(id) = call["id"].as_i64().map(|id| id as CallId) else {
            return;
        };
        let gateway = self.bridge.gateway();
        if self.current_call.is_some() {
            self.report(gateway.answer_call_with(id, Some(486), Some("Busy"), MessageData::default()));
            return;
        }
        println!("{} {}", "INCOMING".yellow(), call["remote_info"].as_str().unwrap_or_default());
        self.current_call = Some(id);
        self.report(gateway.answer_call(id, Some(180)));
    }

    fn report(&self, result: rvoip_bridge_core::BridgeResult<()>) {
        if let Err(e) = result {
            println!("{} {}", "Exception:".red(), e);
        }
    }

    fn report_engine(&self, result: Result<(), EngineStatus>) {
        if let Err(status) = result {
            error(self.engine.strerror(status));
        }
    }

    fn prompt(&self) {
        println!("SIP_URI {}", self.sip_uri);
    }
}

fn error(message: impl std::fmt::Display) {
    println!("{} {}", "ERROR".red(), message);
}
