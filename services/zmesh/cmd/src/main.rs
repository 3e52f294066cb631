//! Mesh device-control node binary.
//!
//! Thin boundary glue over the zmesh crates: encode and decode commands on
//! the command line, and bridge a link layer over stdin/stdout for
//! integration against an external radio daemon.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use zmesh_dispatch::NodeId;
use zmesh_network::Network;
use zmesh_registry::Registry;
use zmesh_wire::{FieldMap, Frame, Value};

mod config;

use config::NodeConfig;

/// Mesh device-control node utility
#[derive(Parser, Debug)]
#[command(name = "zmesh", version, about = "Mesh device-control node utility")]
struct Args {
    /// Path to the node configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Per-attempt response timeout, e.g. 5s
    #[arg(long)]
    response_timeout: Option<humantime::Duration>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a named command into frame bytes
    Encode {
        /// Command name, e.g. DOOR_LOCK_OPERATION_SET
        command: String,
        /// field=value parameters
        params: Vec<String>,
    },
    /// Decode hex frame bytes into named fields
    Decode {
        /// Frame bytes as hex, e.g. 620103
        hex: String,
    },
    /// List the registered commands
    Commands,
    /// Bridge a link layer over stdin/stdout
    Node,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = NodeConfig::load(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.log_level = level;
    }
    if let Some(timeout) = args.response_timeout {
        config.response_timeout_ms = timeout.as_millis() as u64;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .with_writer(std::io::stderr)
        .init();

    match args.command {
        Command::Encode { command, params } => {
            let registry = Registry::builtin();
            let frame = registry.encode(&command, &parse_params(&params)?)?;
            println!("{}", to_hex(frame.as_bytes()));
        }
        Command::Decode { hex } => {
            let registry = Registry::builtin();
            let frame = Frame::try_from(from_hex(&hex)?)?;
            let decoded = registry.decode_or_raw(&frame, u8::MAX);
            println!("{}", serde_json::to_string_pretty(&decoded)?);
        }
        Command::Commands => {
            for def in Registry::builtin().iter() {
                println!(
                    "{:<44} v{} {:#04x}/{:#04x} {:?}",
                    def.name,
                    def.version,
                    def.class_key(),
                    def.command_id(),
                    def.direction
                );
            }
        }
        Command::Node => run_node(config).await?,
    }

    Ok(())
}

/// Run the stdin/stdout link bridge.
///
/// Outbound frames print as `xmit <node> <hex>`; input lines drive the
/// session: `send <node> <COMMAND> [field=value ...]`,
/// `recv <node> <hex>`, `nak <node>`, `queue <node>`, `seq`.
async fn run_node(config: NodeConfig) -> Result<()> {
    let (network, mut outbound) = Network::new(config.network());
    let network = Arc::new(network);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    info!("node bridge started");

    loop {
        tokio::select! {
            maybe_out = outbound.recv() => {
                let Some(out) = maybe_out else { break };
                println!("xmit {} {}", out.destination, to_hex(out.frame.as_bytes()));
            }
            maybe_line = lines.next_line() => {
                let Some(line) = maybe_line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if let Err(err) = handle_line(&network, line) {
                    warn!(%err, line, "input rejected");
                }
            }
        }
    }
    Ok(())
}

fn handle_line(network: &Arc<Network>, line: &str) -> Result<()> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("send") => {
            let destination: u8 = parts.next().context("missing destination")?.parse()?;
            let command = parts.next().context("missing command name")?;
            let params: Vec<String> = parts.map(str::to_string).collect();
            let transaction = network.request(destination, command, &parse_params(&params)?)?;
            let mut handle = network.enqueue(transaction);
            let network = Arc::clone(network);
            tokio::spawn(async move {
                let status = handle.wait().await;
                match &status.response {
                    Some(frame) => {
                        let decoded = network.decode_from(handle.destination(), frame);
                        info!(
                            id = handle.id(),
                            state = ?status.state,
                            response = %serde_json::to_string(&decoded).unwrap_or_default(),
                            "transaction resolved"
                        );
                    }
                    None => info!(
                        id = handle.id(),
                        state = ?status.state,
                        attempts = status.attempts,
                        "transaction resolved"
                    ),
                }
            });
        }
        Some("recv") => {
            let source: u8 = parts.next().context("missing source")?.parse()?;
            let source = NodeId::new(source)?;
            let hex = parts.next().context("missing frame bytes")?;
            let frame = Frame::try_from(from_hex(hex)?)?;
            if let Some(unsolicited) = network.handle_frame(source, frame) {
                let decoded = network.decode_from(source, &unsolicited);
                println!("report {} {}", source, serde_json::to_string(&decoded)?);
            }
        }
        Some("nak") => {
            let destination: u8 = parts.next().context("missing destination")?.parse()?;
            network.fail_in_flight(NodeId::new(destination)?);
        }
        Some("queue") => {
            let destination: u8 = parts.next().context("missing destination")?.parse()?;
            let destination = NodeId::new(destination)?;
            println!("queue {} {}", destination, network.queue_length(destination));
        }
        Some("seq") => println!("seq {}", network.next_sequence()),
        Some(other) => bail!("unknown input '{other}'"),
        None => {}
    }
    Ok(())
}

/// Parse `field=value` pairs into a parameter set.
fn parse_params(pairs: &[String]) -> Result<FieldMap> {
    let mut map = FieldMap::new();
    for pair in pairs {
        let (name, raw) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("parameter '{pair}' is not field=value"))?;
        map.insert(name.to_string(), parse_value(raw)?);
    }
    Ok(map)
}

fn parse_value(raw: &str) -> Result<Value> {
    Ok(match raw {
        "true" => Value::Flag(true),
        "false" => Value::Flag(false),
        _ => {
            if let Some(stripped) = raw.strip_prefix("hex:") {
                Value::bytes(from_hex(stripped)?)
            } else if let Some(stripped) = raw.strip_prefix("0x") {
                Value::Uint(u64::from_str_radix(stripped, 16)?)
            } else if let Ok(value) = raw.parse::<u64>() {
                Value::Uint(value)
            } else if raw.contains(',') {
                Value::Set(raw.split(',').map(str::to_string).collect())
            } else {
                Value::Symbol(raw.to_string())
            }
        }
    })
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

fn from_hex(raw: &str) -> Result<Vec<u8>> {
    let cleaned: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.len() % 2 != 0 {
        bail!("hex input has an odd number of digits");
    }
    (0..cleaned.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&cleaned[i..i + 2], 16)
                .map_err(|_| anyhow!("invalid hex byte '{}'", &cleaned[i..i + 2]))
        })
        .collect()
}
