//! Shared test fixtures for fleet_core and downstream crates.
//!
//! `base_state()` is an empty network owned by `ALLOCATOR`. `stocked_network()`
//! adds one ice producer, two consumers on different fleets and a small
//! station graph with one hangar, all registered directly without traffic.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::{
    tick, Consumer, EntityId, Envelope, EventEnvelope, EventLevel, FixedClock, Inbox, Message,
    NetworkConfig, NetworkState, Outbox, Producer, Waypoint,
};

pub const ALLOCATOR: &str = "allocator_test";
pub const CLOCK_MILLIS: u64 = 1_700_000_000_000;

pub fn make_rng() -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(42)
}

pub fn base_config() -> NetworkConfig {
    NetworkConfig::default()
}

pub fn base_state() -> NetworkState {
    NetworkState::new(EntityId::from(ALLOCATOR))
}

pub fn clock() -> FixedClock {
    FixedClock(CLOCK_MILLIS)
}

pub fn producer_dock() -> Waypoint {
    Waypoint::new("ice_dock", 1000.0, 0.0, 0.0)
}

pub fn consumer_a_dock() -> Waypoint {
    Waypoint::new("base_a_dock", 0.0, 1000.0, 0.0)
}

pub fn consumer_b_dock() -> Waypoint {
    Waypoint::new("base_b_dock", 0.0, -1000.0, 0.0)
}

/// One producer (`ice_cargo`, fleet `mine`, 100 Ice in stock), two consumers
/// (`base_a_cargo` on `base_a`, `base_b_cargo` on `base_b`) with no demand yet,
/// one station per fleet and a hangar `hangar_1` at the origin.
pub fn stocked_network() -> NetworkState {
    let mut state = base_state();
    state.producers.push(Producer {
        entity_id: "ice_cargo".into(),
        fleet_id: "mine".into(),
        unit: "Ice".into(),
        kind: "Ore".into(),
        unit_volume: 0.37,
        waypoint: producer_dock(),
        stock: 100,
        reserved: 0,
    });
    state.consumers.push(Consumer {
        entity_id: "base_a_cargo".into(),
        fleet_id: "base_a".into(),
        unit: "Ice".into(),
        waypoint: consumer_a_dock(),
        requested: 0,
        delivered: 0,
    });
    state.consumers.push(Consumer {
        entity_id: "base_b_cargo".into(),
        fleet_id: "base_b".into(),
        unit: "Ice".into(),
        waypoint: consumer_b_dock(),
        requested: 0,
        delivered: 0,
    });
    let graph = &mut state.graph;
    graph.upsert(
        &"hangar_1".into(),
        &"depot".into(),
        &Waypoint::new("hangar_1", 0.0, 0.0, 0.0),
        true,
    );
    graph.upsert(
        &"mine_station".into(),
        &"mine".into(),
        &Waypoint::new("mine_station", 990.0, 0.0, 0.0),
        false,
    );
    graph.upsert(
        &"base_a_station".into(),
        &"base_a".into(),
        &Waypoint::new("base_a_station", 0.0, 990.0, 0.0),
        false,
    );
    graph.upsert(
        &"base_b_station".into(),
        &"base_b".into(),
        &Waypoint::new("base_b_station", 0.0, -990.0, 0.0),
        false,
    );
    state
}

/// A broadcast from `sender`.
pub fn broadcast(sender: &str, message: Message) -> Envelope {
    Envelope::broadcast(sender.into(), message)
}

/// A unicast from `sender` to the test allocator.
pub fn to_allocator(sender: &str, message: Message) -> Envelope {
    Envelope::unicast(sender.into(), ALLOCATOR.into(), message)
}

pub fn request_resource(unit: &str, quantity: u64, waypoint: Waypoint) -> Message {
    Message::RequestResource {
        unit: unit.into(),
        quantity,
        waypoint,
    }
}

pub fn resource_delivered(unit: &str, quantity: u64, waypoint: Waypoint) -> Message {
    Message::ResourceDelivered {
        unit: unit.into(),
        quantity,
        waypoint,
    }
}

/// Tick once with the default config and fixed clock. Returns the events and
/// everything the engine sent.
pub fn run_tick(state: &mut NetworkState, inbox: &mut Inbox) -> (Vec<EventEnvelope>, Outbox) {
    run_tick_with(state, inbox, &base_config())
}

pub fn run_tick_with(
    state: &mut NetworkState,
    inbox: &mut Inbox,
    config: &NetworkConfig,
) -> (Vec<EventEnvelope>, Outbox) {
    let mut outbox = Outbox::new();
    let events = tick(state, inbox, config, &mut outbox, &clock(), EventLevel::Normal);
    (events, outbox)
}

/// Deliver `envelope` and tick once.
pub fn deliver(state: &mut NetworkState, envelope: Envelope) -> (Vec<EventEnvelope>, Outbox) {
    let mut inbox = Inbox::new();
    inbox.push(envelope);
    run_tick(state, &mut inbox)
}

/// Put demand on both consumers of `stocked_network()`.
pub fn with_demand(state: &mut NetworkState, a: u64, b: u64) {
    state.consumers[0].requested = a;
    state.consumers[1].requested = b;
}
