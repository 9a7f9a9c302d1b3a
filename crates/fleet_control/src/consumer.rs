use fleet_core::{EntityId, Envelope, FleetId, Message, ResourceUnit, Waypoint};

use crate::{Cadence, ConsumerDef, Peer};

/// A cargo container wanting one resource unit delivered to one dock.
///
/// Mirrors the allocator's bookkeeping: a delivery raises `delivered`, and the
/// finished flight takes the same quantity off both counters.
#[derive(Debug, Clone)]
pub struct ConsumerPeer {
    pub entity_id: EntityId,
    pub fleet_id: FleetId,
    pub unit: ResourceUnit,
    pub dock: Waypoint,
    pub requested: u64,
    pub delivered: u64,
    /// Everything ever unloaded here.
    pub received_total: u64,
    pub allocator: Option<EntityId>,
    demand_per_cycle: u64,
    max_requested: u64,
    cadence: Cadence,
    tolerance: f64,
}

impl ConsumerPeer {
    pub fn new(def: &ConsumerDef, cadence: Cadence, tolerance: f64) -> Self {
        Self {
            entity_id: def.entity_id.clone(),
            fleet_id: def.fleet_id.clone(),
            unit: def.unit.clone(),
            dock: def.dock.waypoint(),
            requested: 0,
            delivered: 0,
            received_total: 0,
            allocator: None,
            demand_per_cycle: def.demand_per_cycle,
            max_requested: def.max_requested,
            cadence,
            tolerance,
        }
    }

    fn registration(&self) -> Envelope {
        Envelope::broadcast(
            self.entity_id.clone(),
            Message::RegisterConsumer {
                unit: self.unit.clone(),
                entity_id: self.entity_id.clone(),
                fleet_id: self.fleet_id.clone(),
                waypoint: self.dock.clone(),
            },
        )
    }

    pub fn unload(&mut self, quantity: u64, outbound: &mut Vec<Envelope>) {
        self.delivered += quantity;
        self.received_total += quantity;
        let Some(allocator) = self.allocator.clone() else {
            return;
        };
        if quantity > 0 {
            outbound.push(Envelope::unicast(
                self.entity_id.clone(),
                allocator,
                Message::ResourceDelivered {
                    unit: self.unit.clone(),
                    quantity,
                    waypoint: self.dock.clone(),
                },
            ));
        }
    }

    pub fn settle(&mut self, quantity: u64) {
        self.requested = self.requested.saturating_sub(quantity);
        self.delivered = self.delivered.saturating_sub(quantity);
    }
}

impl Peer for ConsumerPeer {
    fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    fn receive(&mut self, envelope: &Envelope, outbound: &mut Vec<Envelope>) {
        match &envelope.message {
            Message::ConsumerRegistered {
                unit,
                allocator_id,
                waypoint,
            } if unit == &self.unit && waypoint.near(&self.dock, self.tolerance) => {
                self.allocator = Some(allocator_id.clone());
            }
            Message::ReRegisterConsumer => {
                // The allocator forgets deliveries on re-registration; so do we.
                self.delivered = 0;
                outbound.push(self.registration());
            }
            _ => {}
        }
    }

    fn poll(&mut self, tick: u64, outbound: &mut Vec<Envelope>) {
        let Some(allocator) = self.allocator.clone() else {
            if self.cadence.announce_due(tick) {
                outbound.push(self.registration());
            }
            return;
        };
        if !self.cadence.report_due(tick) {
            return;
        }
        self.requested = self
            .requested
            .saturating_add(self.demand_per_cycle)
            .min(self.max_requested.max(self.delivered));
        if self.requested == 0 {
            return;
        }
        outbound.push(Envelope::unicast(
            self.entity_id.clone(),
            allocator,
            Message::RequestResource {
                unit: self.unit.clone(),
                quantity: self.requested,
                waypoint: self.dock.clone(),
            },
        ));
    }
}
