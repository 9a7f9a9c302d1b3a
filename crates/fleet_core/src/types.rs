//! Type definitions for `fleet_core`.
//!
//! Entity records, ID newtypes, tick state, configuration and events.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::graph::StationGraph;
use crate::waypoint::Waypoint;

// ---------------------------------------------------------------------------
// ID newtypes
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_id!(EntityId);
string_id!(FleetId);
string_id!(ResourceUnit);
string_id!(ContainerKind);
string_id!(MissionId);
string_id!(EventId);

// ---------------------------------------------------------------------------
// Core enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventLevel {
    Normal,
    Debug,
}

// ---------------------------------------------------------------------------
// Entity records
// ---------------------------------------------------------------------------

/// A site advertising stock for pickup.
///
/// `stock` is whatever the remote producer last reported. `reserved` is the
/// share of it already promised to open missions; it may briefly exceed
/// `stock` and is repaired by the correction pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub entity_id: EntityId,
    pub fleet_id: FleetId,
    pub unit: ResourceUnit,
    pub kind: ContainerKind,
    pub unit_volume: f64,
    pub waypoint: Waypoint,
    pub stock: u64,
    pub reserved: u64,
}

impl Producer {
    /// Stock not yet promised to a mission.
    pub fn available(&self) -> u64 {
        self.stock.saturating_sub(self.reserved)
    }
}

/// A site advertising demand for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consumer {
    pub entity_id: EntityId,
    pub fleet_id: FleetId,
    pub unit: ResourceUnit,
    pub waypoint: Waypoint,
    pub requested: u64,
    pub delivered: u64,
}

impl Consumer {
    /// Demand still waiting for a delivery.
    pub fn outstanding(&self) -> u64 {
        self.requested.saturating_sub(self.delivered)
    }
}

/// An open delivery assignment pairing one producer dock with one consumer dock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub id: MissionId,
    pub unit: ResourceUnit,
    pub consumer_waypoint: Waypoint,
    pub producer_waypoint: Waypoint,
    pub quantity: u64,
    pub vehicle_class: ContainerKind,
}

// ---------------------------------------------------------------------------
// State types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkState {
    pub meta: MetaState,
    /// Registration order matters: the matching loop takes the first viable producer.
    pub producers: Vec<Producer>,
    pub consumers: Vec<Consumer>,
    pub missions: Vec<Mission>,
    /// Fleet most recently serviced per resource unit.
    pub last_served: HashMap<ResourceUnit, FleetId>,
    pub graph: StationGraph,
    /// Missions the router has already handed to a hangar.
    pub dispatched: HashSet<MissionId>,
    pub counters: Counters,
}

impl NetworkState {
    pub fn new(allocator_id: EntityId) -> Self {
        Self {
            meta: MetaState {
                tick: 0,
                allocator_id,
                schema_version: 1,
            },
            producers: Vec::new(),
            consumers: Vec::new(),
            missions: Vec::new(),
            last_served: HashMap::new(),
            graph: StationGraph::default(),
            dispatched: HashSet::new(),
            counters: Counters::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaState {
    pub tick: u64,
    pub allocator_id: EntityId,
    pub schema_version: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub next_event_id: u64,
    pub next_mission_seq: u64,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Distance units per second used to seed unmeasured edges. Kept above
    /// real cruise speed so fresh estimates err low.
    #[serde(default = "default_cruise_speed")]
    pub assumed_cruise_speed: f64,
    /// Two waypoints closer than this are the same dock.
    #[serde(default = "default_waypoint_tolerance")]
    pub waypoint_tolerance: f64,
    /// Cargo volume one vehicle can carry. `None` leaves missions uncapped.
    #[serde(default)]
    pub max_mission_volume: Option<f64>,
    /// Ticks between re-sends of `RequestFlight` for missions no hangar has
    /// taken yet. Zero disables the re-send.
    #[serde(default = "default_resend_interval")]
    pub resend_interval_ticks: u64,
}

fn default_cruise_speed() -> f64 {
    150.0
}

fn default_waypoint_tolerance() -> f64 {
    0.01
}

fn default_resend_interval() -> u64 {
    10
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            assumed_cruise_speed: default_cruise_speed(),
            waypoint_tolerance: default_waypoint_tolerance(),
            max_mission_volume: None,
            resend_interval_ticks: default_resend_interval(),
        }
    }
}

// ---------------------------------------------------------------------------
// Event types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: EventId,
    pub tick: u64,
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Only emitted at `EventLevel::Debug`.
    MessageReceived {
        verb: String,
        sender: EntityId,
    },
    MessageDropped {
        verb: String,
        reason: String,
    },
    ProducerRegistered {
        entity_id: EntityId,
        unit: ResourceUnit,
        created: bool,
    },
    ConsumerRegistered {
        entity_id: EntityId,
        unit: ResourceUnit,
        created: bool,
    },
    ProducerRemoved {
        unit: ResourceUnit,
        waypoint: String,
    },
    ConsumerRemoved {
        unit: ResourceUnit,
        waypoint: String,
    },
    /// Only emitted at `EventLevel::Debug`.
    StockUpdated {
        entity_id: EntityId,
        unit: ResourceUnit,
        stock: u64,
        reserved: u64,
    },
    DemandUpdated {
        unit: ResourceUnit,
        waypoint: String,
        requested: u64,
    },
    DeliveryRecorded {
        unit: ResourceUnit,
        waypoint: String,
        delivered: u64,
    },
    DeliveryClamped {
        unit: ResourceUnit,
        waypoint: String,
        excess: u64,
    },
    MissionCreated {
        mission_id: MissionId,
        unit: ResourceUnit,
        quantity: u64,
        producer: EntityId,
        consumer: EntityId,
    },
    MissionCompleted {
        mission_id: MissionId,
        quantity: u64,
    },
    DeliveryShortfall {
        mission_id: MissionId,
        expected: u64,
        delivered: u64,
    },
    ResyncRequested,
    OrdersReset {
        missions_cleared: u32,
    },
    ReservationCorrected {
        entity_id: EntityId,
        unit: ResourceUnit,
        cleared: u64,
    },
    StationRegistered {
        entity_id: EntityId,
        fleet_id: FleetId,
        hangar: bool,
        created: bool,
    },
    WeightUpdated {
        from: EntityId,
        to: EntityId,
        seconds: f64,
    },
    FlightDispatched {
        mission_id: MissionId,
        hangar: EntityId,
        legs: u32,
    },
    FlightDropped {
        mission_id: MissionId,
        reason: String,
    },
}
