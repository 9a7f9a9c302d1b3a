use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fleet_core::{compute_status, render_status, Event, EventEnvelope, EventLevel};
use fleet_world::{load_world, save_state, Session, SystemClock};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser)]
#[command(name = "fleet_cli", about = "Fleet logistics allocator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tick the allocator against the simulated fleet for a fixed number of ticks.
    Run {
        #[arg(long)]
        ticks: u64,
        /// Seed for the bus and for a generated allocator id.
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long, default_value = "./config")]
        config_dir: String,
        /// Persisted state file. Restored when present, written when the run ends.
        #[arg(long = "state")]
        state_file: Option<PathBuf>,
        #[arg(long, default_value_t = 100)]
        print_every: u64,
        #[arg(long, default_value = "normal", value_parser = ["normal", "debug"])]
        event_level: String,
        /// Print the final status as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

struct RunArgs {
    ticks: u64,
    seed: Option<u64>,
    config_dir: String,
    state_file: Option<PathBuf>,
    print_every: u64,
    event_level: EventLevel,
    json: bool,
}

// ---------------------------------------------------------------------------
// Run loop
// ---------------------------------------------------------------------------

/// One line for events worth seeing without `RUST_LOG`.
fn notable(event: &EventEnvelope) -> Option<String> {
    let tick = event.tick;
    match &event.event {
        Event::MissionCreated {
            mission_id,
            unit,
            quantity,
            producer,
            consumer,
        } => Some(format!(
            "[tick={tick:05}] mission {mission_id}: {quantity} {unit} {producer} -> {consumer}"
        )),
        Event::MissionCompleted {
            mission_id,
            quantity,
        } => Some(format!("[tick={tick:05}] mission {mission_id} completed ({quantity})")),
        Event::DeliveryShortfall {
            mission_id,
            expected,
            delivered,
        } => Some(format!(
            "[tick={tick:05}] *** SHORTFALL on {mission_id}: expected {expected}, delivered {delivered} ***"
        )),
        Event::FlightDropped { mission_id, reason } => {
            Some(format!("[tick={tick:05}] flight for {mission_id} dropped: {reason}"))
        }
        _ => None,
    }
}

fn run(args: RunArgs) -> Result<()> {
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let world = load_world(&args.config_dir, &mut rng)?;
    let (mut session, startup) = Session::start(world, args.state_file.as_deref(), seed)?;
    for event in &startup {
        info!(event = ?event.event, "startup");
    }

    println!(
        "Starting allocator {}: ticks={} seed={seed} producers={} consumers={} hangars={}",
        session.state.meta.allocator_id,
        args.ticks,
        session.fleet.producers.len(),
        session.fleet.consumers.len(),
        session.fleet.hangars.len(),
    );
    println!("{}", "-".repeat(80));

    let clock = SystemClock;
    let print_every = args.print_every.max(1);
    for _ in 0..args.ticks {
        let events = session.step(&clock, args.event_level);
        for line in events.iter().filter_map(notable) {
            println!("{line}");
        }
        if session.state.meta.tick % print_every == 0 {
            print!("{}", render_status(&compute_status(&session.state)));
        }
    }

    println!("{}", "-".repeat(80));
    let status = compute_status(&session.state);
    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&status).context("serializing status")?
        );
    } else {
        println!("Done. Final state at tick {}:", status.tick);
        print!("{}", render_status(&status));
    }
    println!(
        "flights completed={} cargo received={} bus dropped={} duplicated={}",
        session.fleet.completed_flights(),
        session.fleet.total_received(),
        session.downlink.dropped + session.uplink.dropped,
        session.downlink.duplicated + session.uplink.duplicated,
    );

    if let Some(path) = &args.state_file {
        save_state(path, &session.state)?;
        println!("State written to {}", path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            ticks,
            seed,
            config_dir,
            state_file,
            print_every,
            event_level,
            json,
        } => {
            let event_level = match event_level.as_str() {
                "debug" => EventLevel::Debug,
                _ => EventLevel::Normal,
            };
            run(RunArgs {
                ticks,
                seed,
                config_dir,
                state_file,
                print_every,
                event_level,
                json,
            })?;
        }
    }
    Ok(())
}
