//! Simulated remote peers for the allocator.
//!
//! Producers, consumers, stations and hangar dispatchers speak the same message
//! vocabulary as real peers. `FleetSimulation` steps them once per tick and
//! moves cargo between docks; `LossyBus` carries traffic in both directions
//! through the text codec, losing and duplicating some of it.

mod bus;
mod consumer;
mod fleet;
mod hangar;
mod producer;
mod scenario;
mod station;

pub use bus::LossyBus;
pub use consumer::ConsumerPeer;
pub use fleet::FleetSimulation;
pub use hangar::HangarDispatcher;
pub use producer::ProducerPeer;
pub use scenario::{
    BusDef, CadenceDef, ConsumerDef, HangarDef, PointDef, ProducerDef, ScenarioDef, StationDef,
};
pub use station::StationPeer;

use fleet_core::{EntityId, Envelope, Waypoint};

/// One simulated participant on the bus.
pub trait Peer {
    fn entity_id(&self) -> &EntityId;

    /// React to a broadcast, or to a unicast addressed to this peer.
    fn receive(&mut self, envelope: &Envelope, outbound: &mut Vec<Envelope>);

    /// Cadence-driven traffic for this tick.
    fn poll(&mut self, tick: u64, outbound: &mut Vec<Envelope>);
}

/// Physical cargo handling at docks. Lives outside the message protocol.
pub trait Docks {
    fn is_dock(&self, at: &Waypoint) -> bool;

    /// Load the oldest open order at the producer dock `at`. Returns what was loaded.
    fn load(&mut self, at: &Waypoint) -> u64;

    /// Hand `quantity` to the consumer dock `at`.
    fn unload(&mut self, at: &Waypoint, quantity: u64, outbound: &mut Vec<Envelope>);

    /// The flight that unloaded `quantity` at `at` has finished.
    fn settle(&mut self, at: &Waypoint, quantity: u64);
}

/// How often a peer announces itself and reports, staggered by `offset` so
/// peers do not all talk on the same tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub report_every: u64,
    pub announce_every: u64,
    pub offset: u64,
}

impl Cadence {
    fn due(every: u64, tick: u64, offset: u64) -> bool {
        every <= 1 || (tick + offset) % every == 0
    }

    pub fn report_due(&self, tick: u64) -> bool {
        Self::due(self.report_every, tick, self.offset)
    }

    pub fn announce_due(&self, tick: u64) -> bool {
        Self::due(self.announce_every, tick, self.offset)
    }
}
