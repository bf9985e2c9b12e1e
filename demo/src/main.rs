//! SkyBridge Security Telemetry — Demo CLI
//!
//! Wires a real `EventBus` and `AuditChain` together and runs scenarios that
//! exercise overflow signalling, per-session audit recording, chain
//! verification, and snapshot export.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- overflow
//!   cargo run -p demo -- audit-chain
//!   cargo run -p demo -- export --session session-7f3a
//!   cargo run -p demo -- --config telemetry.toml overflow

mod scenarios;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use skybridge_contracts::{config::TelemetryConfig, error::TelemetryResult};

// ── CLI definition ────────────────────────────────────────────────────────────

/// SkyBridge security event bus and audit chain demo.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "SkyBridge security telemetry demo",
    long_about = "Runs SkyBridge telemetry scenarios showing bounded fan-out,\n\
                  rate-limited overflow meta-events, and hash-chained audit sessions."
)]
struct Cli {
    /// TOML file overriding the default bus and audit settings.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run every scenario in sequence.
    RunAll,
    /// Flood the bus and a slow subscriber; watch overflow meta-events.
    Overflow,
    /// Record a handshake session, verify it, then show tamper detection.
    AuditChain,
    /// Record the demo session and print one session's snapshot as JSON.
    Export {
        /// Session to export.
        #[arg(long)]
        session: String,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set RUST_LOG=debug to see every bus and chain transition.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Command::RunAll => {
            print_banner(&config);
            run_all(&config).await
        }
        Command::Overflow => {
            print_banner(&config);
            scenarios::overflow::run_scenario(&config).await
        }
        Command::AuditChain => {
            print_banner(&config);
            scenarios::audit_chain::run_scenario(&config).await
        }
        // No banner: stdout stays valid JSON.
        Command::Export { session } => scenarios::export::run_scenario(&config, &session).await,
    };

    if let Err(e) = result {
        eprintln!("Demo error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&std::path::Path>) -> TelemetryResult<TelemetryConfig> {
    match path {
        Some(path) => TelemetryConfig::from_file(path),
        None => Ok(TelemetryConfig::default()),
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

async fn run_all(config: &TelemetryConfig) -> TelemetryResult<()> {
    scenarios::overflow::run_scenario(config).await?;
    scenarios::audit_chain::run_scenario(config).await?;
    println!("All scenarios completed successfully.");
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner(config: &TelemetryConfig) {
    println!();
    println!("SkyBridge — Security Event Bus & Audit Chain");
    println!("============================================");
    println!();
    println!("  main queue capacity      : {}", config.bus.main_queue_capacity);
    println!("  subscriber capacity      : {}", config.bus.subscriber_capacity);
    println!("  meta-event min interval  : {} ms", config.bus.meta_event_min_interval_ms);
    println!("  audit enabled            : {}", config.audit.enabled);
    println!("  audit entries per session: {}", config.audit.max_entries_per_session);
    println!();
}
