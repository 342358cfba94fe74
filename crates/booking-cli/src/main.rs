//! `slotbook` CLI: publish availability and book meetings from the command line.
//!
//! All state lives in one JSON snapshot file. Every invocation loads it, runs a single
//! operation, writes it back if anything changed, and prints the result as JSON.
//!
//! ## Usage
//!
//! ```sh
//! # Register the parties
//! slotbook register provider --id ada --name "Dr. Ada" --email ada@uni.example --department Maths
//! slotbook register requester --id sam --name Sam --email sam@students.example
//!
//! # Publish slots and list what is still free
//! slotbook slots add --as provider:ada --provider ada "Mon 09:00-10:00" "Tue 14:00-15:00"
//! slotbook slots free --provider ada
//!
//! # Book, move and cancel
//! slotbook book --as requester:sam --provider ada "Mon 09:00-10:00" --title "Thesis"
//! slotbook bookings update --as requester:sam 1 --start 09:15
//! slotbook bookings cancel --as provider:ada 1
//! ```
//!
//! Notifications are written to the log on stderr. Set `RUST_LOG` to change verbosity.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use booking_engine::notify::LogSink;
use booking_engine::slot::parse_time;
use booking_engine::{
    BookingId, BookingRequest, BookingUpdate, Day, Dispatcher, Engine, EngineConfig,
    EngineError, Principal, Provider, ProviderId, Requester, RequesterId, SlotId, Snapshot,
    Window,
};
use chrono::NaiveTime;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "slotbook",
    version,
    about = "Availability and booking consistency engine CLI"
)]
struct Cli {
    /// State file (created on first write)
    #[arg(long, env = "SLOTBOOK_STATE", default_value = "slotbook.json")]
    state: PathBuf,

    /// Engine configuration file (JSON)
    #[arg(long, env = "SLOTBOOK_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a provider or requester
    #[command(subcommand)]
    Register(RegisterCommand),
    /// Manage a provider's availability slots
    #[command(subcommand)]
    Slots(SlotsCommand),
    /// Book a published slot
    Book {
        /// Acting principal, `requester:<id>`
        #[arg(long = "as")]
        principal: Principal,
        #[arg(long)]
        provider: String,
        /// Window to book, e.g. "Mon 09:00-10:00"
        window: Window,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Inspect and change bookings
    #[command(subcommand)]
    Bookings(BookingsCommand),
}

#[derive(Subcommand)]
enum RegisterCommand {
    Provider {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        department: String,
        #[arg(long)]
        office: Option<String>,
    },
    Requester {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
}

#[derive(Args)]
struct SlotOwner {
    /// Acting principal, `provider:<id>`
    #[arg(long = "as")]
    principal: Principal,
    #[arg(long)]
    provider: String,
}

#[derive(Subcommand)]
enum SlotsCommand {
    /// Publish one or more windows
    Add {
        #[command(flatten)]
        owner: SlotOwner,
        #[arg(required = true)]
        windows: Vec<Window>,
    },
    /// Replace a slot's window; the booking on the old window follows
    Update {
        #[command(flatten)]
        owner: SlotOwner,
        #[arg(long)]
        slot: u64,
        window: Window,
    },
    /// Withdraw a slot; the booking on its window is cancelled
    Delete {
        #[command(flatten)]
        owner: SlotOwner,
        #[arg(long)]
        slot: u64,
    },
    /// List every published slot
    List {
        #[arg(long)]
        provider: String,
    },
    /// List unbooked slots, or the first one of a minimum length
    Free {
        #[arg(long)]
        provider: String,
        /// Only report the first free slot at least this many minutes long
        #[arg(long)]
        min_minutes: Option<i64>,
    },
    /// Report published slots that overlap each other
    Overlaps {
        #[arg(long)]
        provider: String,
    },
}

#[derive(Subcommand)]
enum BookingsCommand {
    /// Show one booking with both parties' profiles
    Get {
        id: u64,
    },
    /// List bookings of one requester or one provider
    List {
        #[arg(long, conflicts_with = "provider", required_unless_present = "provider")]
        requester: Option<String>,
        #[arg(long)]
        provider: Option<String>,
    },
    /// Move a booking or change its details
    Update {
        #[arg(long = "as")]
        principal: Principal,
        id: u64,
        #[arg(long)]
        day: Option<Day>,
        #[arg(long, value_parser = parse_time)]
        start: Option<NaiveTime>,
        #[arg(long, value_parser = parse_time)]
        end: Option<NaiveTime>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    Cancel {
        #[arg(long = "as")]
        principal: Principal,
        id: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,booking_engine::notify=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let snapshot = load_state(&cli.state)?;

    let sink = Arc::new(LogSink::new(config.notifications.sender.clone()));
    let (dispatcher, worker) = Dispatcher::spawn(sink, config.notifications.retry_policy());
    let engine = Engine::from_snapshot(snapshot, &config, dispatcher).map_err(report)?;

    let outcome = run(&engine, cli.command);
    if let Ok(true) = outcome {
        save_state(&cli.state, &engine.snapshot().map_err(report)?)?;
    }

    // Dropping the engine closes the queue so the worker can drain and exit.
    drop(engine);
    let stats = worker.finish().await;
    debug!(
        delivered = stats.delivered,
        failed = stats.failed,
        "notifications flushed"
    );

    outcome.map(|_| ())
}

/// Run one command. Returns whether the state changed.
fn run(engine: &Engine, command: Commands) -> Result<bool> {
    match command {
        Commands::Register(RegisterCommand::Provider {
            id,
            name,
            email,
            department,
            office,
        }) => {
            let provider = Provider {
                id: ProviderId::from(id),
                name,
                email,
                department,
                office,
            };
            engine.register_provider(provider.clone()).map_err(report)?;
            print_json(&provider)?;
            Ok(true)
        }
        Commands::Register(RegisterCommand::Requester { id, name, email }) => {
            let requester = Requester {
                id: RequesterId::from(id),
                name,
                email,
            };
            engine.register_requester(requester.clone()).map_err(report)?;
            print_json(&requester)?;
            Ok(true)
        }
        Commands::Slots(command) => run_slots(engine, command),
        Commands::Book {
            principal,
            provider,
            window,
            title,
            description,
        } => {
            let mut request = BookingRequest::new(provider, window);
            request.title = title;
            request.description = description;
            print_json(&engine.create_booking(&principal, request).map_err(report)?)?;
            Ok(true)
        }
        Commands::Bookings(command) => run_bookings(engine, command),
    }
}

fn run_slots(engine: &Engine, command: SlotsCommand) -> Result<bool> {
    match command {
        SlotsCommand::Add { owner, windows } => {
            let provider = ProviderId::from(owner.provider);
            let slots = engine
                .add_slots(&owner.principal, &provider, &windows)
                .map_err(report)?;
            print_json(&slots)?;
            Ok(true)
        }
        SlotsCommand::Update {
            owner,
            slot,
            window,
        } => {
            let provider = ProviderId::from(owner.provider);
            let update = engine
                .update_slot(&owner.principal, &provider, SlotId(slot), window)
                .map_err(report)?;
            print_json(&update)?;
            Ok(true)
        }
        SlotsCommand::Delete { owner, slot } => {
            let provider = ProviderId::from(owner.provider);
            let removal = engine
                .delete_slot(&owner.principal, &provider, SlotId(slot))
                .map_err(report)?;
            print_json(&removal)?;
            Ok(true)
        }
        SlotsCommand::List { provider } => {
            print_json(&engine.list_slots(&provider.into()).map_err(report)?)?;
            Ok(false)
        }
        SlotsCommand::Free {
            provider,
            min_minutes,
        } => {
            let provider = ProviderId::from(provider);
            match min_minutes {
                Some(min) => print_json(&engine.next_free_slot(&provider, min).map_err(report)?)?,
                None => print_json(&engine.list_free_slots(&provider).map_err(report)?)?,
            }
            Ok(false)
        }
        SlotsCommand::Overlaps { provider } => {
            print_json(&engine.overlapping_slots(&provider.into()).map_err(report)?)?;
            Ok(false)
        }
    }
}

fn run_bookings(engine: &Engine, command: BookingsCommand) -> Result<bool> {
    match command {
        BookingsCommand::Get { id } => {
            print_json(&engine.booking_details(BookingId(id)).map_err(report)?)?;
            Ok(false)
        }
        BookingsCommand::List {
            requester,
            provider,
        } => {
            let bookings = match (requester, provider) {
                (Some(requester), _) => engine.bookings_for_requester(&requester.into()),
                (None, Some(provider)) => engine.bookings_for_provider(&provider.into()),
                (None, None) => anyhow::bail!("Pass --requester or --provider"),
            }
            .map_err(report)?;
            print_json(&bookings)?;
            Ok(false)
        }
        BookingsCommand::Update {
            principal,
            id,
            day,
            start,
            end,
            title,
            description,
        } => {
            let update = BookingUpdate {
                day,
                start,
                end,
                title,
                description,
            };
            let booking = engine
                .update_booking(&principal, BookingId(id), update)
                .map_err(report)?;
            print_json(&booking)?;
            Ok(true)
        }
        BookingsCommand::Cancel { principal, id } => {
            let booking = engine
                .delete_booking(&principal, BookingId(id))
                .map_err(report)?;
            print_json(&booking)?;
            Ok(true)
        }
    }
}

/// A missing state file is an empty ledger.
fn load_state(path: &Path) -> Result<Snapshot> {
    if !path.exists() {
        debug!(path = %path.display(), "no state file yet; starting empty");
        return Ok(Snapshot::default());
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read state file: {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Failed to parse state file: {}", path.display()))
}

fn save_state(path: &Path, snapshot: &Snapshot) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write state file: {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Engine errors reach the user by their public message only.
fn report(err: EngineError) -> anyhow::Error {
    anyhow::anyhow!(err.public_message())
}
