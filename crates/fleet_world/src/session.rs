//! One allocator wired to its simulated fleet through two lossy buses.

use anyhow::Result;
use fleet_control::{FleetSimulation, LossyBus};
use fleet_core::{
    request_resync, reset_orders, tick, Clock, Envelope, EventEnvelope, EventLevel, Inbox,
    NetworkState, Outbox,
};
use std::path::Path;

use crate::{restore_or_reset, World};

pub struct Session {
    pub world: World,
    pub state: NetworkState,
    pub inbox: Inbox,
    pub fleet: FleetSimulation,
    /// Allocator to peers.
    pub downlink: LossyBus,
    /// Peers to allocator.
    pub uplink: LossyBus,
}

impl Session {
    /// Restore or reset the allocator and build the fleet. Returns the
    /// startup events alongside the session.
    pub fn start(
        world: World,
        state_path: Option<&Path>,
        seed: u64,
    ) -> Result<(Self, Vec<EventEnvelope>)> {
        let mut outbox = Outbox::new();
        let (state, events) = restore_or_reset(&world, state_path, &mut outbox)?;
        let bus = &world.scenario.bus;
        let mut session = Self {
            fleet: FleetSimulation::from_scenario(&world.scenario, world.config.waypoint_tolerance),
            downlink: LossyBus::new(seed, bus.drop_chance, bus.duplicate_chance),
            uplink: LossyBus::new(seed.wrapping_add(1), bus.drop_chance, bus.duplicate_chance),
            state,
            inbox: Inbox::new(),
            world,
        };
        session.forward(outbox.drain());
        Ok((session, events))
    }

    fn forward(&mut self, sent: Vec<Envelope>) -> Vec<Envelope> {
        let arriving = self.downlink.carry(sent);
        self.fleet.deliver(&arriving)
    }

    /// One allocator tick, then one fleet step. Peer traffic lands in the
    /// inbox for the next tick.
    pub fn step(&mut self, clock: &impl Clock, level: EventLevel) -> Vec<EventEnvelope> {
        let now = self.state.meta.tick;
        let mut outbox = Outbox::new();
        let events = tick(
            &mut self.state,
            &mut self.inbox,
            &self.world.config,
            &mut outbox,
            clock,
            level,
        );
        let mut replies = self.forward(outbox.drain());
        replies.extend(self.fleet.step(now));
        self.inbox.extend(self.uplink.carry(replies));
        events
    }

    pub fn reset_orders(&mut self) -> Vec<EventEnvelope> {
        let mut outbox = Outbox::new();
        let events = reset_orders(&mut self.state, &self.world.config, &mut outbox);
        let replies = self.forward(outbox.drain());
        self.inbox.extend(self.uplink.carry(replies));
        events
    }

    pub fn resync(&mut self) -> Vec<EventEnvelope> {
        let mut outbox = Outbox::new();
        let events = request_resync(&mut self.state, &self.world.config, &mut outbox);
        let replies = self.forward(outbox.drain());
        self.inbox.extend(self.uplink.carry(replies));
        events
    }
}
