use fleet_core::{Channel, Envelope, Waypoint};

use crate::{
    Cadence, ConsumerPeer, Docks, HangarDispatcher, Peer, ProducerPeer, ScenarioDef, StationPeer,
};

/// Every simulated peer of one network.
#[derive(Debug, Clone)]
pub struct FleetSimulation {
    pub producers: Vec<ProducerPeer>,
    pub consumers: Vec<ConsumerPeer>,
    pub stations: Vec<StationPeer>,
    pub hangars: Vec<HangarDispatcher>,
    seconds_per_tick: f64,
    tolerance: f64,
}

/// Producer and consumer docks, borrowed while vehicles fly.
struct DockSet<'a> {
    producers: &'a mut [ProducerPeer],
    consumers: &'a mut [ConsumerPeer],
    tolerance: f64,
}

impl Docks for DockSet<'_> {
    fn is_dock(&self, at: &Waypoint) -> bool {
        self.producers.iter().any(|p| p.dock.near(at, self.tolerance))
            || self.consumers.iter().any(|c| c.dock.near(at, self.tolerance))
    }

    fn load(&mut self, at: &Waypoint) -> u64 {
        let tolerance = self.tolerance;
        self.producers
            .iter_mut()
            .filter(|p| p.dock.near(at, tolerance))
            .find(|p| p.open_orders() > 0)
            .map_or(0, ProducerPeer::load)
    }

    fn unload(&mut self, at: &Waypoint, quantity: u64, outbound: &mut Vec<Envelope>) {
        let tolerance = self.tolerance;
        if let Some(consumer) = self.consumers.iter_mut().find(|c| c.dock.near(at, tolerance)) {
            consumer.unload(quantity, outbound);
        }
    }

    fn settle(&mut self, at: &Waypoint, quantity: u64) {
        let tolerance = self.tolerance;
        if let Some(consumer) = self.consumers.iter_mut().find(|c| c.dock.near(at, tolerance)) {
            consumer.settle(quantity);
        }
    }
}

impl FleetSimulation {
    /// Build peers from a scenario. Each peer gets its own cadence offset.
    pub fn from_scenario(scenario: &ScenarioDef, tolerance: f64) -> Self {
        let mut offset = 0;
        let mut next_cadence = || {
            let cadence = Cadence {
                report_every: scenario.cadence.report_every,
                announce_every: scenario.cadence.announce_every,
                offset,
            };
            offset += 1;
            cadence
        };
        let producers = scenario
            .producers
            .iter()
            .map(|def| ProducerPeer::new(def, next_cadence(), tolerance))
            .collect();
        let consumers = scenario
            .consumers
            .iter()
            .map(|def| ConsumerPeer::new(def, next_cadence(), tolerance))
            .collect();
        let stations = scenario
            .stations
            .iter()
            .map(|def| StationPeer::new(def, next_cadence()))
            .collect();
        let hangars = scenario
            .hangars
            .iter()
            .map(|def| HangarDispatcher::new(def, next_cadence(), tolerance))
            .collect();
        Self {
            producers,
            consumers,
            stations,
            hangars,
            seconds_per_tick: scenario.cadence.seconds_per_tick,
            tolerance,
        }
    }

    fn peers_mut(&mut self) -> impl Iterator<Item = &mut dyn Peer> + '_ {
        self.producers
            .iter_mut()
            .map(|p| p as &mut dyn Peer)
            .chain(self.consumers.iter_mut().map(|c| c as &mut dyn Peer))
            .chain(self.stations.iter_mut().map(|s| s as &mut dyn Peer))
            .chain(self.hangars.iter_mut().map(|h| h as &mut dyn Peer))
    }

    /// Hand traffic from the allocator to the peers it reaches. Returns any
    /// immediate replies.
    pub fn deliver(&mut self, envelopes: &[Envelope]) -> Vec<Envelope> {
        let mut outbound = Vec::new();
        for envelope in envelopes {
            for peer in self.peers_mut() {
                let reaches = match &envelope.channel {
                    Channel::Broadcast => true,
                    Channel::Unicast { target } => target == peer.entity_id(),
                };
                if reaches {
                    peer.receive(envelope, &mut outbound);
                }
            }
        }
        outbound
    }

    /// Advance every peer by one tick: cadence traffic, then flying.
    pub fn step(&mut self, tick: u64) -> Vec<Envelope> {
        let mut outbound = Vec::new();
        for peer in self.peers_mut() {
            peer.poll(tick, &mut outbound);
        }
        let seconds = self.seconds_per_tick;
        let mut docks = DockSet {
            producers: &mut self.producers,
            consumers: &mut self.consumers,
            tolerance: self.tolerance,
        };
        for hangar in &mut self.hangars {
            hangar.fly(seconds, &mut docks, &mut outbound);
        }
        outbound
    }

    pub fn completed_flights(&self) -> u64 {
        self.hangars.iter().map(|h| h.completed).sum()
    }

    pub fn total_received(&self) -> u64 {
        self.consumers.iter().map(|c| c.received_total).sum()
    }
}
