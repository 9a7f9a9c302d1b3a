use std::collections::VecDeque;

use fleet_core::{ContainerKind, EntityId, Envelope, FleetId, Message, ResourceUnit, Waypoint};

use crate::{Cadence, Peer, ProducerDef};

/// A cargo container offering one resource unit at one dock.
#[derive(Debug, Clone)]
pub struct ProducerPeer {
    pub entity_id: EntityId,
    pub fleet_id: FleetId,
    pub unit: ResourceUnit,
    pub kind: ContainerKind,
    pub unit_volume: f64,
    pub dock: Waypoint,
    pub stock: u64,
    pub reserved: u64,
    pub allocator: Option<EntityId>,
    replenish: u64,
    orders: VecDeque<u64>,
    cadence: Cadence,
    tolerance: f64,
}

impl ProducerPeer {
    pub fn new(def: &ProducerDef, cadence: Cadence, tolerance: f64) -> Self {
        Self {
            entity_id: def.entity_id.clone(),
            fleet_id: def.fleet_id.clone(),
            unit: def.unit.clone(),
            kind: def.kind.clone(),
            unit_volume: def.unit_volume,
            dock: def.dock.waypoint(),
            stock: def.stock,
            reserved: 0,
            allocator: None,
            replenish: def.replenish,
            orders: VecDeque::new(),
            cadence,
            tolerance,
        }
    }

    fn registration(&self) -> Envelope {
        Envelope::broadcast(
            self.entity_id.clone(),
            Message::RegisterProducer {
                unit: self.unit.clone(),
                entity_id: self.entity_id.clone(),
                fleet_id: self.fleet_id.clone(),
                kind: self.kind.clone(),
                unit_volume: self.unit_volume,
                waypoint: self.dock.clone(),
            },
        )
    }

    fn ours(&self, unit: &ResourceUnit, waypoint: &Waypoint) -> bool {
        unit == &self.unit && waypoint.near(&self.dock, self.tolerance)
    }

    pub fn open_orders(&self) -> usize {
        self.orders.len()
    }

    /// A vehicle collects the oldest order. Short stock ships short.
    pub fn load(&mut self) -> u64 {
        let Some(ordered) = self.orders.pop_front() else {
            return 0;
        };
        let loaded = ordered.min(self.stock);
        self.stock -= loaded;
        self.reserved = self.reserved.saturating_sub(ordered);
        loaded
    }
}

impl Peer for ProducerPeer {
    fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    fn receive(&mut self, envelope: &Envelope, outbound: &mut Vec<Envelope>) {
        match &envelope.message {
            Message::ProducerRegistered {
                unit,
                allocator_id,
                waypoint,
            } if self.ours(unit, waypoint) => {
                self.allocator = Some(allocator_id.clone());
            }
            Message::OrderResource {
                unit,
                quantity,
                waypoint,
            } if self.ours(unit, waypoint) => {
                self.reserved += quantity;
                self.orders.push_back(*quantity);
            }
            Message::ResetOrders => {
                self.reserved = 0;
                self.orders.clear();
            }
            Message::ReRegisterProducer => outbound.push(self.registration()),
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
        self.stock = self.stock.saturating_add(self.replenish);
        outbound.push(Envelope::unicast(
            self.entity_id.clone(),
            allocator,
            Message::UpdateResourceStock {
                unit: self.unit.clone(),
                stock: self.stock,
                reserved: self.reserved,
                entity_id: self.entity_id.clone(),
                waypoint: self.dock.clone(),
            },
        ));
    }
}
