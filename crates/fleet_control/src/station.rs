use fleet_core::{EntityId, Envelope, FleetId, Message, Waypoint};

use crate::{Cadence, Peer, StationDef};

/// A docking site that only announces itself to the router.
#[derive(Debug, Clone)]
pub struct StationPeer {
    pub entity_id: EntityId,
    pub fleet_id: FleetId,
    pub waypoint: Waypoint,
    cadence: Cadence,
}

impl StationPeer {
    pub fn new(def: &StationDef, cadence: Cadence) -> Self {
        Self {
            entity_id: def.entity_id.clone(),
            fleet_id: def.fleet_id.clone(),
            waypoint: def.position.waypoint(),
            cadence,
        }
    }
}

impl Peer for StationPeer {
    fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    fn receive(&mut self, _envelope: &Envelope, _outbound: &mut Vec<Envelope>) {}

    // The router never acknowledges, so keep announcing.
    fn poll(&mut self, tick: u64, outbound: &mut Vec<Envelope>) {
        if self.cadence.announce_due(tick) {
            outbound.push(Envelope::broadcast(
                self.entity_id.clone(),
                Message::RegisterStation {
                    entity_id: self.entity_id.clone(),
                    fleet_id: self.fleet_id.clone(),
                    waypoint: self.waypoint.clone(),
                },
            ));
        }
    }
}
