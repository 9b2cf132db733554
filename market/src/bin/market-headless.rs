//! Headless marketplace ledger driven over JSON-over-stdio IPC.
//!
//! Logging goes to stderr; stdout is reserved for the IPC protocol.
//!
//! Usage:
//!   market-headless [--state <snapshot.cbor>]
//!
//! On startup, emits a `Ready` JSON line to stdout.
//! Then reads `Command` JSON lines from stdin and writes `Response` lines.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use datamarket::util::{amount_string, decode_hex_prefixed};
use datamarket::{
    Address, Commitment, Ledger, ListingParams, MarketConfig, SharedLedger, SystemTimeProvider,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ── IPC types ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ReadyEvent {
    event: &'static str,
    version: &'static str,
    tx_count: u64,
}

#[derive(Deserialize)]
#[serde(tag = "cmd")]
enum Command {
    Fund {
        identity: Address,
        #[serde(with = "amount_string")]
        amount: u128,
    },
    Balance {
        identity: Address,
    },
    DeployKeyRegistry {
        caller: Address,
    },
    RegisterKey {
        caller: Address,
        registry: Address,
        key: String,
    },
    GetKey {
        registry: Address,
        identity: Address,
    },
    DeployRegistry {
        caller: Address,
        key_registry: Option<Address>,
    },
    DeployListing {
        caller: Address,
        #[serde(with = "amount_string")]
        price: u128,
        /// Commitment to publish; computed from `data` or `data_hex` when absent.
        data_hash: Option<Commitment>,
        data: Option<String>,
        data_hex: Option<String>,
        key_registry: Option<Address>,
        #[serde(default)]
        denied_buyers: Vec<Address>,
        #[serde(default)]
        metadata_keys: Vec<String>,
        #[serde(default)]
        metadata_values: Vec<String>,
        /// Deploy through this registry instead of standalone.
        registry: Option<Address>,
    },
    RegisterListing {
        caller: Address,
        registry: Address,
        listing: Address,
    },
    GetListings {
        registry: Address,
    },
    Purchase {
        caller: Address,
        listing: Address,
        #[serde(with = "amount_string")]
        payment: u128,
    },
    /// The preimage is given as text in `revealed` or as hex in `revealed_hex`.
    Verify {
        caller: Address,
        listing: Address,
        revealed: Option<String>,
        revealed_hex: Option<String>,
    },
    Withdraw {
        caller: Address,
        listing: Address,
    },
    Upload {
        caller: Address,
        listing: Address,
        reference: String,
    },
    GetListing {
        listing: Address,
    },
    Events {
        #[serde(default)]
        since: u64,
    },
    Save {
        path: Option<PathBuf>,
    },
    Shutdown,
}

#[derive(Serialize)]
#[serde(tag = "status")]
enum Response {
    Ok { data: Option<serde_json::Value> },
    Err { message: String },
}

// ── Helpers ──────────────────────────────────────────────────────────

fn parse_state_path() -> anyhow::Result<Option<PathBuf>> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let mut state = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--state" => {
                let path = iter.next().context("--state requires a path")?;
                state = Some(PathBuf::from(path));
            }
            other => bail!("Usage: market-headless [--state <path>] (unexpected argument {other:?})"),
        }
    }
    Ok(state)
}

fn init_logging_stderr(fallback: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();
}

fn emit_json(value: &impl Serialize) -> anyhow::Result<()> {
    let line = serde_json::to_string(value).context("JSON serialization failed")?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}").context("stdout write failed")?;
    stdout.flush().context("stdout flush failed")?;
    Ok(())
}

fn load_snapshot(ledger: &mut Ledger, path: &Path) -> anyhow::Result<()> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
    ledger
        .restore_cbor(&bytes)
        .with_context(|| format!("Failed to restore snapshot {}", path.display()))?;
    Ok(())
}

fn save_snapshot(ledger: &SharedLedger, path: &Path) -> anyhow::Result<usize> {
    let bytes = ledger.query(Ledger::snapshot_cbor)?;
    std::fs::write(path, &bytes)
        .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    Ok(bytes.len())
}

/// Bytes of a payload given either as text in `field` or as hex in `field_hex`.
fn payload_bytes(
    text: Option<String>,
    hex: Option<String>,
    field: &str,
) -> anyhow::Result<Vec<u8>> {
    match (text, hex) {
        (Some(_), Some(_)) => bail!("give only one of {field} and {field}_hex"),
        (Some(text), None) => Ok(text.into_bytes()),
        (None, Some(hex)) => {
            decode_hex_prefixed(&hex).with_context(|| format!("invalid {field}_hex"))
        }
        (None, None) => bail!("missing {field} or {field}_hex"),
    }
}

/// Execute one command. `Ok(None)` carries no payload.
fn handle(
    ledger: &SharedLedger,
    command: Command,
    state_path: Option<&Path>,
) -> anyhow::Result<Option<serde_json::Value>> {
    let data = match command {
        Command::Fund { identity, amount } => {
            ledger.execute(|l| l.fund(identity, amount))?;
            None
        }
        Command::Balance { identity } => {
            let balance = ledger.query(|l| l.balance_of(&identity));
            Some(json!({ "balance": balance.to_string() }))
        }
        Command::DeployKeyRegistry { caller } => {
            let address = ledger.execute(|l| l.deploy_key_registry(caller))?;
            Some(json!({ "address": address }))
        }
        Command::RegisterKey {
            caller,
            registry,
            key,
        } => {
            ledger.execute(|l| l.register_key(caller, registry, &key))?;
            None
        }
        Command::GetKey { registry, identity } => {
            let record = ledger.query(|l| l.key_of(&registry, &identity).cloned())?;
            Some(serde_json::to_value(record)?)
        }
        Command::DeployRegistry {
            caller,
            key_registry,
        } => {
            let address = ledger.execute(|l| l.deploy_registry(caller, key_registry))?;
            Some(json!({ "address": address }))
        }
        Command::DeployListing {
            caller,
            price,
            data_hash,
            data,
            data_hex,
            key_registry,
            denied_buyers,
            metadata_keys,
            metadata_values,
            registry,
        } => {
            let data_hash = match data_hash {
                Some(hash) => hash,
                None => Commitment::of(payload_bytes(data, data_hex, "data")?),
            };
            let mut params = ListingParams::new(price, data_hash)
                .denied_buyers(denied_buyers)
                .metadata(metadata_keys, metadata_values);
            params.key_registry = key_registry;

            let address = ledger.execute(|l| match registry {
                Some(registry) => l.registry_deploy_listing(caller, registry, params),
                None => l.deploy_listing(caller, params),
            })?;
            Some(json!({ "address": address, "data_hash": data_hash }))
        }
        Command::RegisterListing {
            caller,
            registry,
            listing,
        } => {
            let added = ledger.execute(|l| l.register_listing(caller, registry, listing))?;
            Some(json!({ "added": added }))
        }
        Command::GetListings { registry } => {
            let listings = ledger.query(|l| l.listings_of(&registry).map(<[Address]>::to_vec))?;
            Some(json!({ "listings": listings }))
        }
        Command::Purchase {
            caller,
            listing,
            payment,
        } => {
            ledger.execute(|l| l.purchase(caller, listing, payment))?;
            None
        }
        Command::Verify {
            caller,
            listing,
            revealed,
            revealed_hex,
        } => {
            let revealed = payload_bytes(revealed, revealed_hex, "revealed")?;
            let outcome = ledger.execute(|l| l.verify(caller, listing, &revealed))?;
            Some(json!({ "outcome": outcome }))
        }
        Command::Withdraw { caller, listing } => {
            let amount = ledger.execute(|l| l.withdraw(caller, listing))?;
            Some(json!({ "amount": amount.to_string() }))
        }
        Command::Upload {
            caller,
            listing,
            reference,
        } => {
            ledger.execute(|l| l.emit_upload(caller, listing, &reference))?;
            None
        }
        Command::GetListing { listing } => {
            let entry = ledger.query(|l| l.listing(&listing).cloned())?;
            Some(serde_json::to_value(entry)?)
        }
        Command::Events { since } => {
            let events = ledger.query(|l| l.events_since(since).to_vec());
            Some(json!({ "events": events }))
        }
        Command::Save { path } => {
            let path = path
                .as_deref()
                .or(state_path)
                .context("Save needs a path (none given and no --state)")?;
            let bytes = save_snapshot(ledger, path)?;
            Some(json!({ "path": path, "bytes": bytes }))
        }
        Command::Shutdown => None,
    };
    Ok(data)
}

// ── Main ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = MarketConfig::from_env()?;
    init_logging_stderr(&config.log_filter);
    let state_path = parse_state_path()?;
    info!("market-headless starting (state={:?})", state_path);

    let mut ledger = Ledger::with_config(config, SystemTimeProvider::new());
    if let Some(path) = state_path.as_deref().filter(|p| p.exists()) {
        load_snapshot(&mut ledger, path)?;
    }
    let shared = SharedLedger::new(ledger);

    // Mirror committed events into the log.
    let mut events = shared.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(record) => info!(
                    "tx {} event #{} {} from {}",
                    record.tx,
                    record.seq,
                    record.event.name(),
                    record.source
                ),
                Err(RecvError::Lagged(skipped)) => warn!("Event log lagged by {}", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    emit_json(&ReadyEvent {
        event: "Ready",
        version: env!("CARGO_PKG_VERSION"),
        tx_count: shared.query(Ledger::tx_count),
    })?;
    info!("Ready event emitted");

    // Command loop
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => {
                info!("stdin closed, shutting down");
                break;
            }
            Err(e) => {
                error!("stdin read error: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let command: Command = match serde_json::from_str(&line) {
            Ok(c) => c,
            Err(e) => {
                emit_json(&Response::Err {
                    message: format!("Invalid command JSON: {e}"),
                })?;
                continue;
            }
        };
        let shutdown = matches!(command, Command::Shutdown);

        let response = match handle(&shared, command, state_path.as_deref()) {
            Ok(data) => Response::Ok { data },
            Err(e) => Response::Err {
                message: format!("{e:#}"),
            },
        };
        emit_json(&response)?;

        if shutdown {
            info!("Shutdown command received");
            break;
        }
    }

    info!("Shutdown complete");
    Ok(())
}
