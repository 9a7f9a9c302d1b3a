//! Serde definitions for a simulated fleet, as loaded from `scenario.json`.

use fleet_core::{ContainerKind, EntityId, FleetId, ResourceUnit, Waypoint};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioDef {
    #[serde(default)]
    pub producers: Vec<ProducerDef>,
    #[serde(default)]
    pub consumers: Vec<ConsumerDef>,
    #[serde(default)]
    pub stations: Vec<StationDef>,
    #[serde(default)]
    pub hangars: Vec<HangarDef>,
    #[serde(default)]
    pub bus: BusDef,
    #[serde(default)]
    pub cadence: CadenceDef,
}

/// A named point, flattened for hand-written JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointDef {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PointDef {
    pub fn waypoint(&self) -> Waypoint {
        Waypoint::new(&self.name, self.x, self.y, self.z)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerDef {
    pub entity_id: EntityId,
    pub fleet_id: FleetId,
    pub unit: ResourceUnit,
    pub kind: ContainerKind,
    pub unit_volume: f64,
    pub dock: PointDef,
    pub stock: u64,
    /// Stock added every report cycle.
    #[serde(default)]
    pub replenish: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerDef {
    pub entity_id: EntityId,
    pub fleet_id: FleetId,
    pub unit: ResourceUnit,
    pub dock: PointDef,
    /// Demand added every report cycle.
    pub demand_per_cycle: u64,
    #[serde(default = "default_max_requested")]
    pub max_requested: u64,
}

fn default_max_requested() -> u64 {
    1000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationDef {
    pub entity_id: EntityId,
    pub fleet_id: FleetId,
    pub position: PointDef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HangarDef {
    pub entity_id: EntityId,
    pub fleet_id: FleetId,
    pub position: PointDef,
    pub vehicles: u32,
    /// Real cruise speed of its vehicles, distance units per second.
    pub cruise_speed: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BusDef {
    #[serde(default)]
    pub drop_chance: f64,
    #[serde(default)]
    pub duplicate_chance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CadenceDef {
    #[serde(default = "default_report_every")]
    pub report_every: u64,
    #[serde(default = "default_announce_every")]
    pub announce_every: u64,
    /// Simulated seconds that pass per tick.
    #[serde(default = "default_seconds_per_tick")]
    pub seconds_per_tick: f64,
}

fn default_report_every() -> u64 {
    5
}

fn default_announce_every() -> u64 {
    50
}

fn default_seconds_per_tick() -> f64 {
    1.0
}

impl Default for CadenceDef {
    fn default() -> Self {
        Self {
            report_every: default_report_every(),
            announce_every: default_announce_every(),
            seconds_per_tick: default_seconds_per_tick(),
        }
    }
}
