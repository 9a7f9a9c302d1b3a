//! Read-only status view of `NetworkState`.
//!
//! `compute_status` samples the state for display; `render_status` turns the
//! sample into the plain-text table the CLI prints. No state mutation, no IO.

use std::fmt::Write;

use serde::Serialize;

use crate::{EntityId, FleetId, NetworkState, ResourceUnit};

#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub tick: u64,
    pub allocator_id: EntityId,
    pub producer_count: u32,
    pub consumer_count: u32,
    pub station_count: u32,
    pub hangar_count: u32,
    pub units: Vec<UnitStatus>,
    pub missions: Vec<MissionStatus>,
}

/// Totals for one resource unit across every producer and consumer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnitStatus {
    pub unit: ResourceUnit,
    pub stock: u64,
    pub reserved: u64,
    pub requested: u64,
    pub delivered: u64,
    pub open_missions: u32,
    pub last_served: Option<FleetId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MissionStatus {
    pub id: String,
    pub unit: ResourceUnit,
    pub quantity: u64,
    pub producer_waypoint: String,
    pub consumer_waypoint: String,
    pub dispatched: bool,
}

fn unit_entry<'a>(units: &'a mut Vec<UnitStatus>, unit: &ResourceUnit) -> &'a mut UnitStatus {
    let index = if let Some(index) = units.iter().position(|u| &u.unit == unit) {
        index
    } else {
        units.push(UnitStatus {
            unit: unit.clone(),
            ..UnitStatus::default()
        });
        units.len() - 1
    };
    &mut units[index]
}

#[allow(clippy::cast_possible_truncation)]
pub fn compute_status(state: &NetworkState) -> StatusSnapshot {
    let mut units: Vec<UnitStatus> = Vec::new();
    for producer in &state.producers {
        let entry = unit_entry(&mut units, &producer.unit);
        entry.stock = entry.stock.saturating_add(producer.stock);
        entry.reserved = entry.reserved.saturating_add(producer.reserved);
    }
    for consumer in &state.consumers {
        let entry = unit_entry(&mut units, &consumer.unit);
        entry.requested = entry.requested.saturating_add(consumer.requested);
        entry.delivered = entry.delivered.saturating_add(consumer.delivered);
    }
    for mission in &state.missions {
        unit_entry(&mut units, &mission.unit).open_missions += 1;
    }
    for entry in &mut units {
        entry.last_served = state.last_served.get(&entry.unit).cloned();
    }
    units.sort_by(|a, b| a.unit.cmp(&b.unit));

    let missions = state
        .missions
        .iter()
        .map(|m| MissionStatus {
            id: m.id.to_string(),
            unit: m.unit.clone(),
            quantity: m.quantity,
            producer_waypoint: m.producer_waypoint.name().to_string(),
            consumer_waypoint: m.consumer_waypoint.name().to_string(),
            dispatched: state.dispatched.contains(&m.id),
        })
        .collect();

    StatusSnapshot {
        tick: state.meta.tick,
        allocator_id: state.meta.allocator_id.clone(),
        producer_count: state.producers.len() as u32,
        consumer_count: state.consumers.len() as u32,
        station_count: state.graph.len() as u32,
        hangar_count: state.graph.hangars().count() as u32,
        units,
        missions,
    }
}

pub fn render_status(status: &StatusSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "tick {}  allocator {}  producers {}  consumers {}  stations {} ({} hangars)",
        status.tick,
        status.allocator_id,
        status.producer_count,
        status.consumer_count,
        status.station_count,
        status.hangar_count
    );
    if !status.units.is_empty() {
        let _ = writeln!(
            out,
            "  {:<20} {:>8} {:>8} {:>9} {:>9} {:>4}  last served",
            "unit", "stock", "reserved", "requested", "delivered", "open"
        );
    }
    for unit in &status.units {
        let _ = writeln!(
            out,
            "  {:<20} {:>8} {:>8} {:>9} {:>9} {:>4}  {}",
            unit.unit.as_str(),
            unit.stock,
            unit.reserved,
            unit.requested,
            unit.delivered,
            unit.open_missions,
            unit.last_served.as_ref().map_or("-", FleetId::as_str)
        );
    }
    for mission in &status.missions {
        let _ = writeln!(
            out,
            "  mission {} {} x{} {} -> {}{}",
            mission.id,
            mission.unit,
            mission.quantity,
            mission.producer_waypoint,
            mission.consumer_waypoint,
            if mission.dispatched { "" } else { " (awaiting vehicle)" }
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waypoint::Waypoint;
    use crate::{Consumer, Mission, Producer};

    fn producer(unit: &str, stock: u64, reserved: u64) -> Producer {
        Producer {
            entity_id: "p".into(),
            fleet_id: "pf".into(),
            unit: unit.into(),
            kind: "Ore".into(),
            unit_volume: 1.0,
            waypoint: Waypoint::new("p", 0.0, 0.0, 0.0),
            stock,
            reserved,
        }
    }

    #[test]
    fn empty_state_has_no_units() {
        let status = compute_status(&NetworkState::new("alloc".into()));
        assert_eq!(status.tick, 0);
        assert!(status.units.is_empty());
        assert_eq!(render_status(&status).lines().count(), 1);
    }

    #[test]
    fn totals_grouped_by_unit() {
        let mut state = NetworkState::new("alloc".into());
        state.producers.push(producer("Ice", 10, 2));
        state.producers.push(producer("Ice", 5, 0));
        state.producers.push(producer("Ore", 1, 1));
        state.consumers.push(Consumer {
            entity_id: "c".into(),
            fleet_id: "cf".into(),
            unit: "Ice".into(),
            waypoint: Waypoint::new("c", 1.0, 0.0, 0.0),
            requested: 8,
            delivered: 3,
        });
        state.missions.push(Mission {
            id: "m1".into(),
            unit: "Ice".into(),
            consumer_waypoint: Waypoint::new("c", 1.0, 0.0, 0.0),
            producer_waypoint: Waypoint::new("p", 0.0, 0.0, 0.0),
            quantity: 2,
            vehicle_class: "Ore".into(),
        });
        state.last_served.insert("Ice".into(), "cf".into());

        let status = compute_status(&state);
        assert_eq!(status.units.len(), 2);
        let ice = &status.units[0];
        assert_eq!(ice.unit, ResourceUnit::from("Ice"));
        assert_eq!((ice.stock, ice.reserved), (15, 2));
        assert_eq!((ice.requested, ice.delivered), (8, 3));
        assert_eq!(ice.open_missions, 1);
        assert_eq!(ice.last_served, Some(FleetId::from("cf")));
        assert!(!status.missions[0].dispatched);

        let text = render_status(&status);
        assert!(text.contains("awaiting vehicle"));
        assert!(text.contains("Ore"));
    }
}
