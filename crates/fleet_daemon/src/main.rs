mod routes;
mod state;
mod tick_loop;

use anyhow::{Context, Result};
use clap::Parser;
use fleet_world::{load_world, Session};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use routes::make_router_with_cors;
use state::AppState;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tick_loop::run_tick_loop;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fleet_daemon", about = "Fleet logistics allocator HTTP daemon")]
struct Cli {
    #[arg(long, default_value_t = 3001)]
    port: u16,
    /// Ticks per second. 0 runs as fast as possible.
    #[arg(long, default_value_t = 10.0)]
    ticks_per_sec: f64,
    #[arg(long)]
    max_ticks: Option<u64>,
    /// Seed for the bus and for a generated allocator id.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value = "./config")]
    config_dir: String,
    /// Persisted state file. Restored at startup, written by `/api/v1/save`.
    #[arg(long = "state")]
    state_file: Option<PathBuf>,
    #[arg(long, default_value = "http://localhost:5173")]
    cors_origin: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let seed = cli.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let world = load_world(&cli.config_dir, &mut rng)?;
    let (session, startup) = Session::start(world, cli.state_file.as_deref(), seed)?;
    tracing::info!(
        allocator = %session.state.meta.allocator_id,
        tick = session.state.meta.tick,
        seed,
        startup_events = startup.len(),
        "allocator ready"
    );

    let (event_tx, _) = tokio::sync::broadcast::channel(256);
    let app_state = AppState {
        session: Arc::new(Mutex::new(session)),
        event_tx,
        ticks_per_sec: cli.ticks_per_sec,
        paused: Arc::new(AtomicBool::new(false)),
        state_path: cli.state_file.map(Arc::new),
    };

    let router = make_router_with_cors(app_state.clone(), &cli.cors_origin)?;
    tokio::spawn(run_tick_loop(app_state, cli.max_ticks));

    let addr = format!("0.0.0.0:{}", cli.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!("listening on http://{addr}");
    axum::serve(listener, router).await.context("serving HTTP")?;
    Ok(())
}
