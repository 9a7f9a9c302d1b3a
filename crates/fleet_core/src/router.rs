//! Station registration, travel-time learning and flight-plan assembly.

use tracing::{debug, info, warn};

use crate::engine::TickContext;
use crate::graph::StationGraph;
use crate::messages::{FlightPlan, FlightRequest, Message};
use crate::waypoint::Waypoint;
use crate::{EntityId, Event, FleetId, MissionId, NetworkState};

/// A dock on a station: the station a vehicle arrives at, and the exact
/// coordinate it docks to once there.
#[derive(Debug, Clone, Copy)]
pub struct DockStop<'a> {
    pub station: &'a EntityId,
    pub dock: &'a Waypoint,
}

pub(crate) fn register_station(
    state: &mut NetworkState,
    ctx: &mut TickContext<'_>,
    entity_id: &EntityId,
    fleet_id: &FleetId,
    waypoint: &Waypoint,
    hangar: bool,
) {
    let created = state.graph.upsert(entity_id, fleet_id, waypoint, hangar);
    if created {
        info!(entity = %entity_id, fleet = %fleet_id, hangar, "station registered");
    }
    ctx.record(Event::StationRegistered {
        entity_id: entity_id.clone(),
        fleet_id: fleet_id.clone(),
        hangar,
        created,
    });
}

/// A vehicle reports how long it actually took between two stations.
pub(crate) fn flight_time(
    state: &mut NetworkState,
    ctx: &mut TickContext<'_>,
    from: &Waypoint,
    to: &Waypoint,
    observed_seconds: f64,
) {
    let tolerance = ctx.config.waypoint_tolerance;
    let (Some(from_station), Some(to_station)) = (
        state.graph.find_by_waypoint(from, tolerance),
        state.graph.find_by_waypoint(to, tolerance),
    ) else {
        ctx.dropped("FlightTime", format!("no station at {from} or {to}"));
        return;
    };
    let from_id = from_station.entity_id.clone();
    let to_id = to_station.entity_id.clone();
    if !state.graph.update_weight(&from_id, &to_id, observed_seconds) {
        ctx.dropped(
            "FlightTime",
            format!("rejected {observed_seconds}s from {from_id} to {to_id}"),
        );
        return;
    }
    debug!(from = %from_id, to = %to_id, observed_seconds, "travel time learned");
    ctx.record(Event::WeightUpdated {
        from: from_id,
        to: to_id,
        seconds: observed_seconds,
    });
}

pub(crate) fn forget_mission(state: &mut NetworkState, mission_id: &MissionId) {
    state.dispatched.remove(mission_id);
}

/// The hangar with the cheapest estimated trip to `station`. Ties go to the
/// earliest registered.
pub fn select_hangar(
    graph: &mut StationGraph,
    station: &EntityId,
    cruise_speed: f64,
) -> Option<EntityId> {
    let hangars: Vec<EntityId> = graph.hangars().map(|h| h.entity_id.clone()).collect();
    let mut best: Option<(EntityId, f64)> = None;
    for hangar in hangars {
        let Some(cost) = graph.weight(&hangar, station, cruise_speed) else {
            continue;
        };
        if best.as_ref().is_none_or(|(_, lowest)| cost < *lowest) {
            best = Some((hangar, cost));
        }
    }
    best.map(|(hangar, _)| hangar)
}

fn push_route(
    graph: &mut StationGraph,
    legs: &mut Vec<Waypoint>,
    from: &EntityId,
    to: &EntityId,
    cruise_speed: f64,
) {
    for stop in graph.find_path(from, to, cruise_speed) {
        if let Some(station) = graph.get(&stop) {
            legs.push(station.waypoint.clone());
        }
    }
}

/// Assemble the full round trip for one mission.
///
/// hangar -> (route) -> producer station -> producer dock -> producer station
/// -> (route) -> consumer station -> consumer dock -> consumer station
/// -> (route) -> hangar. The vehicle lands on the final leg.
///
/// Returns `None` when the hangar or either station is unknown.
pub fn build_flight_path(
    graph: &mut StationGraph,
    cruise_speed: f64,
    hangar: &EntityId,
    producer: DockStop<'_>,
    consumer: DockStop<'_>,
) -> Option<FlightPlan> {
    let hangar_waypoint = graph.get(hangar)?.waypoint.clone();
    let producer_station = graph.get(producer.station)?.waypoint.clone();
    let consumer_station = graph.get(consumer.station)?.waypoint.clone();

    let mut legs = vec![hangar_waypoint.clone()];
    push_route(graph, &mut legs, hangar, producer.station, cruise_speed);
    legs.push(producer_station.clone());
    legs.push(producer.dock.clone());
    legs.push(producer_station);
    push_route(graph, &mut legs, producer.station, consumer.station, cruise_speed);
    legs.push(consumer_station.clone());
    legs.push(consumer.dock.clone());
    legs.push(consumer_station);
    push_route(graph, &mut legs, consumer.station, hangar, cruise_speed);
    legs.push(hangar_waypoint);
    Some(FlightPlan { legs })
}

/// Turn a mission's flight request into a transport order for a hangar.
///
/// Missing stations or hangars drop the request; the allocator's broadcast is
/// the only retry.
pub(crate) fn request_flight(
    state: &mut NetworkState,
    ctx: &mut TickContext<'_>,
    request: &FlightRequest,
) {
    if state.dispatched.contains(&request.mission_id) {
        debug!(mission = %request.mission_id, "flight already dispatched");
        return;
    }
    let cruise_speed = ctx.config.assumed_cruise_speed;

    let Some(producer_station) = state
        .graph
        .find_by_fleet(&request.producer_fleet_id)
        .map(|s| s.entity_id.clone())
    else {
        drop_flight(
            ctx,
            &request.mission_id,
            format!("no station for producer fleet {}", request.producer_fleet_id),
        );
        return;
    };
    let Some(consumer_station) = state
        .graph
        .find_by_fleet(&request.consumer_fleet_id)
        .map(|s| s.entity_id.clone())
    else {
        drop_flight(
            ctx,
            &request.mission_id,
            format!("no station for consumer fleet {}", request.consumer_fleet_id),
        );
        return;
    };
    let Some(hangar) = select_hangar(&mut state.graph, &producer_station, cruise_speed) else {
        drop_flight(ctx, &request.mission_id, "no hangar registered".to_string());
        return;
    };
    let Some(flight_plan) = build_flight_path(
        &mut state.graph,
        cruise_speed,
        &hangar,
        DockStop {
            station: &producer_station,
            dock: &request.producer_waypoint,
        },
        DockStop {
            station: &consumer_station,
            dock: &request.consumer_waypoint,
        },
    ) else {
        drop_flight(ctx, &request.mission_id, "station vanished while routing".to_string());
        return;
    };

    #[allow(clippy::cast_possible_truncation)]
    let legs = flight_plan.legs.len() as u32;
    info!(mission = %request.mission_id, hangar = %hangar, legs, "transport requested");
    ctx.unicast(
        &hangar,
        Message::RequestTransport {
            mission_id: request.mission_id.clone(),
            vehicle_class: request.vehicle_class.clone(),
            flight_plan,
        },
    );
    state.dispatched.insert(request.mission_id.clone());
    ctx.record(Event::FlightDispatched {
        mission_id: request.mission_id.clone(),
        hangar,
        legs,
    });
}

fn drop_flight(ctx: &mut TickContext<'_>, mission_id: &MissionId, reason: String) {
    warn!(mission = %mission_id, %reason, "flight request dropped");
    ctx.record(Event::FlightDropped {
        mission_id: mission_id.clone(),
        reason,
    });
}
