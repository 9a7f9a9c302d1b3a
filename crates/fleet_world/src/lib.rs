//! Configuration, persisted state and the wall clock, shared between
//! fleet_cli and fleet_daemon.

use anyhow::{ensure, Context, Result};
use fleet_control::ScenarioDef;
use fleet_core::{
    decode_state, encode_state, generate_allocator_id, reset_orders, Clock, EntityId,
    EventEnvelope, FleetId, NetworkConfig, NetworkState, Transport,
};
use rand::Rng;
use serde::Deserialize;
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::Path;

mod session;

pub use session::Session;

/// `network.json`: the allocator's identity plus its tuning.
#[derive(Debug, Deserialize)]
struct NetworkFile {
    #[serde(default)]
    allocator_id: Option<EntityId>,
    #[serde(flatten)]
    config: NetworkConfig,
}

/// Everything loaded from a config directory.
#[derive(Debug, Clone)]
pub struct World {
    pub allocator_id: EntityId,
    pub config: NetworkConfig,
    pub scenario: ScenarioDef,
}

pub fn validate_network(config: &NetworkConfig) -> Result<()> {
    ensure!(
        config.assumed_cruise_speed.is_finite() && config.assumed_cruise_speed > 0.0,
        "assumed_cruise_speed must be positive, got {}",
        config.assumed_cruise_speed
    );
    ensure!(
        config.waypoint_tolerance.is_finite() && config.waypoint_tolerance >= 0.0,
        "waypoint_tolerance must not be negative, got {}",
        config.waypoint_tolerance
    );
    if let Some(volume) = config.max_mission_volume {
        ensure!(
            volume.is_finite() && volume > 0.0,
            "max_mission_volume must be positive when set, got {volume}"
        );
    }
    Ok(())
}

fn ensure_chance(name: &str, value: f64) -> Result<()> {
    ensure!(
        (0.0..=1.0).contains(&value),
        "{name} must be within 0..=1, got {value}"
    );
    Ok(())
}

/// Cross-checks a scenario: ids are unique, numbers are sane, and every
/// producer and consumer fleet has a station vehicles can route to.
pub fn validate_scenario(scenario: &ScenarioDef) -> Result<()> {
    let mut ids = HashSet::new();
    let all_ids = scenario
        .producers
        .iter()
        .map(|p| &p.entity_id)
        .chain(scenario.consumers.iter().map(|c| &c.entity_id))
        .chain(scenario.stations.iter().map(|s| &s.entity_id))
        .chain(scenario.hangars.iter().map(|h| &h.entity_id));
    for id in all_ids {
        ensure!(ids.insert(id), "entity id '{id}' is used twice");
    }

    let station_fleets: HashSet<&FleetId> = scenario
        .stations
        .iter()
        .map(|s| &s.fleet_id)
        .chain(scenario.hangars.iter().map(|h| &h.fleet_id))
        .collect();
    for producer in &scenario.producers {
        ensure!(
            producer.unit_volume.is_finite() && producer.unit_volume > 0.0,
            "producer '{}' unit_volume must be positive",
            producer.entity_id
        );
        ensure!(
            station_fleets.contains(&producer.fleet_id),
            "producer '{}' fleet '{}' has no station",
            producer.entity_id,
            producer.fleet_id
        );
    }
    for consumer in &scenario.consumers {
        ensure!(
            station_fleets.contains(&consumer.fleet_id),
            "consumer '{}' fleet '{}' has no station",
            consumer.entity_id,
            consumer.fleet_id
        );
    }
    for hangar in &scenario.hangars {
        ensure!(hangar.vehicles > 0, "hangar '{}' has no vehicles", hangar.entity_id);
        ensure!(
            hangar.cruise_speed.is_finite() && hangar.cruise_speed > 0.0,
            "hangar '{}' cruise_speed must be positive",
            hangar.entity_id
        );
    }
    ensure_chance("bus.drop_chance", scenario.bus.drop_chance)?;
    ensure_chance("bus.duplicate_chance", scenario.bus.duplicate_chance)?;
    ensure!(
        scenario.cadence.seconds_per_tick.is_finite() && scenario.cadence.seconds_per_tick > 0.0,
        "cadence.seconds_per_tick must be positive"
    );
    Ok(())
}

/// Load `network.json` and `scenario.json` from `config_dir`.
///
/// A missing `allocator_id` is generated from `rng`. A missing
/// `scenario.json` means no simulated peers.
pub fn load_world(config_dir: &str, rng: &mut impl Rng) -> Result<World> {
    let dir = Path::new(config_dir);
    let network: NetworkFile = serde_json::from_str(
        &std::fs::read_to_string(dir.join("network.json")).context("reading network.json")?,
    )
    .context("parsing network.json")?;
    validate_network(&network.config).context("validating network.json")?;

    let scenario = match std::fs::read_to_string(dir.join("scenario.json")) {
        Ok(text) => serde_json::from_str(&text).context("parsing scenario.json")?,
        Err(err) if err.kind() == ErrorKind::NotFound => ScenarioDef::default(),
        Err(err) => return Err(err).context("reading scenario.json"),
    };
    validate_scenario(&scenario).context("validating scenario.json")?;

    Ok(World {
        allocator_id: network
            .allocator_id
            .unwrap_or_else(|| generate_allocator_id(rng)),
        config: network.config,
        scenario,
    })
}

pub fn build_initial_state(world: &World) -> NetworkState {
    NetworkState::new(world.allocator_id.clone())
}

/// Read a persisted state file. `Ok(None)` when there is none yet.
pub fn load_state(path: &Path, allocator_id: &EntityId) -> Result<Option<NetworkState>> {
    match std::fs::read_to_string(path) {
        Ok(text) if text.trim().is_empty() => Ok(None),
        Ok(text) => Ok(Some(decode_state(&text, allocator_id.clone()))),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading state file: {}", path.display())),
    }
}

/// Write the state through a sibling temp file so a crash never leaves a
/// half-written record set behind.
pub fn save_state(path: &Path, state: &NetworkState) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, encode_state(state))
        .with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("replacing state file: {}", path.display()))?;
    Ok(())
}

/// Restore persisted state when there is some, otherwise start empty and
/// broadcast `ResetOrders` so producers drop reservations nobody remembers.
pub fn restore_or_reset(
    world: &World,
    path: Option<&Path>,
    transport: &mut impl Transport,
) -> Result<(NetworkState, Vec<EventEnvelope>)> {
    if let Some(path) = path {
        if let Some(state) = load_state(path, &world.allocator_id)? {
            return Ok((state, Vec::new()));
        }
    }
    let mut state = build_initial_state(world);
    let events = reset_orders(&mut state, &world.config, transport);
    Ok((state, events))
}

/// Wall-clock milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or_default()
    }
}
