use super::*;
use crate::test_fixtures::*;

mod registration;

// --- Shared test helpers ------------------------------------------------

fn has_event(events: &[EventEnvelope], predicate: impl Fn(&Event) -> bool) -> bool {
    events.iter().any(|e| predicate(&e.event))
}

/// `(mission_id, consumer)` for every mission created in `events`.
fn created_missions(events: &[EventEnvelope]) -> Vec<(MissionId, EntityId)> {
    events
        .iter()
        .filter_map(|e| match &e.event {
            Event::MissionCreated {
                mission_id,
                consumer,
                ..
            } => Some((mission_id.clone(), consumer.clone())),
            _ => None,
        })
        .collect()
}

fn unicasts_to<'a>(outbox: &'a Outbox, target: &str) -> Vec<&'a Message> {
    outbox
        .sent
        .iter()
        .filter(|e| matches!(&e.channel, Channel::Unicast { target: t } if t.as_str() == target))
        .map(|e| &e.message)
        .collect()
}

fn broadcast_verbs(outbox: &Outbox) -> Vec<&'static str> {
    outbox.broadcasts().map(|e| e.message.verb()).collect()
}

fn second_producer() -> Producer {
    Producer {
        entity_id: "ice_cargo_2".into(),
        fleet_id: "mine_2".into(),
        unit: "Ice".into(),
        kind: "Ore".into(),
        unit_volume: 0.37,
        waypoint: Waypoint::new("ice_dock_2", 2000.0, 0.0, 0.0),
        stock: 100,
        reserved: 0,
    }
}
