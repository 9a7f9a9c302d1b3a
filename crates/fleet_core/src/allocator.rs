//! Supply/demand bookkeeping and the per-tick matching pass.
//!
//! Every handler is an idempotent upsert or overwrite keyed on stable
//! identifiers (entity id, resource unit, waypoint). None of them fail: an
//! unknown key drops the message with a diagnostic, a bad counter is clamped.

use tracing::{debug, info, warn};

use crate::engine::TickContext;
use crate::messages::{FlightRequest, Message};
use crate::router;
use crate::waypoint::Waypoint;
use crate::{
    ContainerKind, Consumer, EntityId, Event, FleetId, Mission, MissionId, NetworkState, Producer,
    ResourceUnit,
};

/// Fields of a `RegisterProducer` announcement.
pub(crate) struct ProducerAnnouncement {
    pub unit: ResourceUnit,
    pub entity_id: EntityId,
    pub fleet_id: FleetId,
    pub kind: ContainerKind,
    pub unit_volume: f64,
    pub waypoint: Waypoint,
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

pub(crate) fn register_producer(
    state: &mut NetworkState,
    ctx: &mut TickContext<'_>,
    announcement: &ProducerAnnouncement,
) {
    let tolerance = ctx.config.waypoint_tolerance;
    let existing = state.producers.iter_mut().find(|p| {
        p.entity_id == announcement.entity_id
            && p.unit == announcement.unit
            && p.waypoint.near(&announcement.waypoint, tolerance)
    });
    let created = if let Some(producer) = existing {
        producer.fleet_id = announcement.fleet_id.clone();
        producer.kind = announcement.kind.clone();
        producer.unit_volume = announcement.unit_volume;
        false
    } else {
        info!(
            entity = %announcement.entity_id,
            unit = %announcement.unit,
            waypoint = %announcement.waypoint,
            "producer registered"
        );
        state.producers.push(Producer {
            entity_id: announcement.entity_id.clone(),
            fleet_id: announcement.fleet_id.clone(),
            unit: announcement.unit.clone(),
            kind: announcement.kind.clone(),
            unit_volume: announcement.unit_volume,
            waypoint: announcement.waypoint.clone(),
            stock: 0,
            reserved: 0,
        });
        true
    };

    // Always acknowledge: the remote side may have restarted and forgotten.
    ctx.unicast(
        &announcement.entity_id,
        Message::ProducerRegistered {
            unit: announcement.unit.clone(),
            allocator_id: state.meta.allocator_id.clone(),
            waypoint: announcement.waypoint.clone(),
        },
    );
    ctx.record(Event::ProducerRegistered {
        entity_id: announcement.entity_id.clone(),
        unit: announcement.unit.clone(),
        created,
    });
}

pub(crate) fn register_consumer(
    state: &mut NetworkState,
    ctx: &mut TickContext<'_>,
    unit: &ResourceUnit,
    entity_id: &EntityId,
    fleet_id: &FleetId,
    waypoint: &Waypoint,
) {
    let tolerance = ctx.config.waypoint_tolerance;
    let existing = state.consumers.iter_mut().find(|c| {
        &c.entity_id == entity_id && &c.unit == unit && c.waypoint.near(waypoint, tolerance)
    });
    let created = if let Some(consumer) = existing {
        // A re-announcing consumer starts over; its next RequestResource
        // restates demand and deliveries are counted afresh.
        consumer.fleet_id = fleet_id.clone();
        consumer.delivered = 0;
        false
    } else {
        info!(entity = %entity_id, %unit, %waypoint, "consumer registered");
        state.consumers.push(Consumer {
            entity_id: entity_id.clone(),
            fleet_id: fleet_id.clone(),
            unit: unit.clone(),
            waypoint: waypoint.clone(),
            requested: 0,
            delivered: 0,
        });
        true
    };

    ctx.unicast(
        entity_id,
        Message::ConsumerRegistered {
            unit: unit.clone(),
            allocator_id: state.meta.allocator_id.clone(),
            waypoint: waypoint.clone(),
        },
    );
    ctx.record(Event::ConsumerRegistered {
        entity_id: entity_id.clone(),
        unit: unit.clone(),
        created,
    });
}

pub(crate) fn remove_producer(
    state: &mut NetworkState,
    ctx: &mut TickContext<'_>,
    unit: &ResourceUnit,
    waypoint: &Waypoint,
) {
    let tolerance = ctx.config.waypoint_tolerance;
    let before = state.producers.len();
    state
        .producers
        .retain(|p| !(&p.unit == unit && p.waypoint.near(waypoint, tolerance)));
    if state.producers.len() < before {
        info!(%unit, %waypoint, "producer removed");
        ctx.record(Event::ProducerRemoved {
            unit: unit.clone(),
            waypoint: waypoint.to_string(),
        });
    }
}

pub(crate) fn remove_consumer(
    state: &mut NetworkState,
    ctx: &mut TickContext<'_>,
    unit: &ResourceUnit,
    waypoint: &Waypoint,
) {
    let tolerance = ctx.config.waypoint_tolerance;
    let before = state.consumers.len();
    state
        .consumers
        .retain(|c| !(&c.unit == unit && c.waypoint.near(waypoint, tolerance)));
    if state.consumers.len() < before {
        info!(%unit, %waypoint, "consumer removed");
        ctx.record(Event::ConsumerRemoved {
            unit: unit.clone(),
            waypoint: waypoint.to_string(),
        });
    }
}

// ---------------------------------------------------------------------------
// Stock & demand sync
// ---------------------------------------------------------------------------

/// Producer's own view of its stock. Overwrites ours.
pub(crate) fn update_resource_stock(
    state: &mut NetworkState,
    ctx: &mut TickContext<'_>,
    entity_id: &EntityId,
    unit: &ResourceUnit,
    waypoint: &Waypoint,
    stock: u64,
    reserved: u64,
) {
    let tolerance = ctx.config.waypoint_tolerance;
    let Some(producer) = state.producers.iter_mut().find(|p| {
        &p.entity_id == entity_id && &p.unit == unit && p.waypoint.near(waypoint, tolerance)
    }) else {
        ctx.dropped(
            "UpdateResourceStock",
            format!("no producer {entity_id} for {unit} at {waypoint}"),
        );
        return;
    };
    producer.stock = stock;
    producer.reserved = reserved;
    ctx.record_debug(Event::StockUpdated {
        entity_id: entity_id.clone(),
        unit: unit.clone(),
        stock,
        reserved,
    });
}

/// Replace the consumer's demand. Zero cancels it.
pub(crate) fn request_resource(
    state: &mut NetworkState,
    ctx: &mut TickContext<'_>,
    unit: &ResourceUnit,
    waypoint: &Waypoint,
    quantity: u64,
) {
    let tolerance = ctx.config.waypoint_tolerance;
    let Some(consumer) = state
        .consumers
        .iter_mut()
        .find(|c| &c.unit == unit && c.waypoint.near(waypoint, tolerance))
    else {
        ctx.dropped("RequestResource", format!("no consumer for {unit} at {waypoint}"));
        return;
    };
    consumer.requested = quantity;
    if consumer.delivered > consumer.requested {
        consumer.delivered = consumer.requested;
    }
    ctx.record(Event::DemandUpdated {
        unit: unit.clone(),
        waypoint: waypoint.to_string(),
        requested: quantity,
    });
}

pub(crate) fn resource_delivered(
    state: &mut NetworkState,
    ctx: &mut TickContext<'_>,
    unit: &ResourceUnit,
    waypoint: &Waypoint,
    quantity: u64,
) {
    let tolerance = ctx.config.waypoint_tolerance;
    let Some(consumer) = state
        .consumers
        .iter_mut()
        .find(|c| &c.unit == unit && c.waypoint.near(waypoint, tolerance))
    else {
        ctx.dropped("ResourceDelivered", format!("no consumer for {unit} at {waypoint}"));
        return;
    };
    let total = consumer.delivered.saturating_add(quantity);
    consumer.delivered = total.min(consumer.requested);
    let delivered = consumer.delivered;
    if total > delivered {
        let excess = total - delivered;
        warn!(%unit, %waypoint, excess, "delivery exceeds request, clamped");
        ctx.record(Event::DeliveryClamped {
            unit: unit.clone(),
            waypoint: waypoint.to_string(),
            excess,
        });
    }
    ctx.record(Event::DeliveryRecorded {
        unit: unit.clone(),
        waypoint: waypoint.to_string(),
        delivered,
    });
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

fn mission_at_consumer(state: &NetworkState, waypoint: &Waypoint, tolerance: f64) -> bool {
    state
        .missions
        .iter()
        .any(|m| m.consumer_waypoint.near(waypoint, tolerance))
}

fn mission_at_producer(state: &NetworkState, waypoint: &Waypoint, tolerance: f64) -> bool {
    state
        .missions
        .iter()
        .any(|m| m.producer_waypoint.near(waypoint, tolerance))
}

/// One matching pass. Creates at most one mission.
///
/// Requesting consumers are grouped by resource unit in order of first
/// appearance. Within a unit, a consumer whose fleet was the last one served
/// for that unit waits its turn. When every requesting consumer of a unit was
/// skipped without even looking for a producer, the unit's rotation restarts.
pub(crate) fn search_requesting_consumer_for_missions(
    state: &mut NetworkState,
    ctx: &mut TickContext<'_>,
) -> Option<MissionId> {
    let tolerance = ctx.config.waypoint_tolerance;

    let mut units: Vec<ResourceUnit> = Vec::new();
    for consumer in state.consumers.iter().filter(|c| c.outstanding() > 0) {
        if !units.contains(&consumer.unit) {
            units.push(consumer.unit.clone());
        }
    }

    for unit in units {
        let candidates: Vec<usize> = state
            .consumers
            .iter()
            .enumerate()
            .filter(|(_, c)| c.unit == unit && c.outstanding() > 0)
            .map(|(index, _)| index)
            .collect();

        let mut all_skipped = true;
        for index in candidates {
            let consumer = &state.consumers[index];
            if state.last_served.get(&unit) == Some(&consumer.fleet_id) {
                continue;
            }
            if mission_at_consumer(state, &consumer.waypoint, tolerance) {
                continue;
            }
            all_skipped = false;
            if let Some(mission_id) = find_producer_and_create_mission(state, ctx, index) {
                return Some(mission_id);
            }
        }
        if all_skipped {
            state.last_served.remove(&unit);
        }
    }
    None
}

/// Largest quantity whose volume fits in one vehicle. Never below one unit.
fn volume_cap(max_volume: f64, unit_volume: f64) -> u64 {
    if unit_volume <= 0.0 || !unit_volume.is_finite() {
        return u64::MAX;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let units = (max_volume / unit_volume).floor().max(1.0) as u64;
    units
}

fn find_producer_and_create_mission(
    state: &mut NetworkState,
    ctx: &mut TickContext<'_>,
    consumer_index: usize,
) -> Option<MissionId> {
    let tolerance = ctx.config.waypoint_tolerance;
    let consumer = state.consumers[consumer_index].clone();
    let needed = consumer.outstanding();

    let producer_index = state.producers.iter().position(|p| {
        p.unit == consumer.unit
            && p.available() > 0
            && !mission_at_producer(state, &p.waypoint, tolerance)
    })?;

    let producer = &mut state.producers[producer_index];
    let mut quantity = producer.available().min(needed);
    if let Some(max_volume) = ctx.config.max_mission_volume {
        quantity = quantity.min(volume_cap(max_volume, producer.unit_volume));
    }
    producer.reserved += quantity;
    let producer = producer.clone();

    let mission_id = crate::id::next_mission_id(ctx.clock, &mut state.counters);
    state.missions.push(Mission {
        id: mission_id.clone(),
        unit: consumer.unit.clone(),
        consumer_waypoint: consumer.waypoint.clone(),
        producer_waypoint: producer.waypoint.clone(),
        quantity,
        vehicle_class: producer.kind.clone(),
    });
    state
        .last_served
        .insert(consumer.unit.clone(), consumer.fleet_id.clone());

    info!(
        mission = %mission_id,
        unit = %consumer.unit,
        quantity,
        producer = %producer.entity_id,
        consumer = %consumer.entity_id,
        "mission created"
    );
    ctx.unicast(
        &producer.entity_id,
        Message::OrderResource {
            unit: consumer.unit.clone(),
            quantity,
            waypoint: producer.waypoint.clone(),
        },
    );
    let request = FlightRequest {
        mission_id: mission_id.clone(),
        vehicle_class: producer.kind.clone(),
        producer_waypoint: producer.waypoint.clone(),
        producer_fleet_id: producer.fleet_id.clone(),
        consumer_waypoint: consumer.waypoint.clone(),
        consumer_fleet_id: consumer.fleet_id.clone(),
    };
    ctx.broadcast(Message::RequestFlight(request.clone()));
    ctx.record(Event::MissionCreated {
        mission_id: mission_id.clone(),
        unit: consumer.unit,
        quantity,
        producer: producer.entity_id,
        consumer: consumer.entity_id,
    });

    // The router sharing this process sees the request immediately.
    router::request_flight(state, ctx, &request);
    Some(mission_id)
}

/// Re-broadcast `RequestFlight` for every open mission the router has not
/// dispatched yet. Missions whose producer or consumer has since been removed
/// are left for completion or `ResetOrders` to clear.
pub(crate) fn resend_undispatched_flights(state: &mut NetworkState, ctx: &mut TickContext<'_>) {
    let tolerance = ctx.config.waypoint_tolerance;
    let pending: Vec<FlightRequest> = state
        .missions
        .iter()
        .filter(|m| !state.dispatched.contains(&m.id))
        .filter_map(|mission| {
            let producer = state.producers.iter().find(|p| {
                p.unit == mission.unit && p.waypoint.near(&mission.producer_waypoint, tolerance)
            })?;
            let consumer = state.consumers.iter().find(|c| {
                c.unit == mission.unit && c.waypoint.near(&mission.consumer_waypoint, tolerance)
            })?;
            Some(FlightRequest {
                mission_id: mission.id.clone(),
                vehicle_class: mission.vehicle_class.clone(),
                producer_waypoint: mission.producer_waypoint.clone(),
                producer_fleet_id: producer.fleet_id.clone(),
                consumer_waypoint: mission.consumer_waypoint.clone(),
                consumer_fleet_id: consumer.fleet_id.clone(),
            })
        })
        .collect();

    for request in pending {
        debug!(mission = %request.mission_id, "flight request re-sent");
        ctx.broadcast(Message::RequestFlight(request.clone()));
        router::request_flight(state, ctx, &request);
    }
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

pub(crate) fn mission_completed(
    state: &mut NetworkState,
    ctx: &mut TickContext<'_>,
    mission_id: &MissionId,
) {
    let Some(position) = state.missions.iter().position(|m| &m.id == mission_id) else {
        ctx.dropped("MissionCompleted", format!("unknown mission {mission_id}"));
        return;
    };
    let mission = state.missions.remove(position);
    ctx.record(Event::MissionCompleted {
        mission_id: mission.id.clone(),
        quantity: mission.quantity,
    });

    let tolerance = ctx.config.waypoint_tolerance;
    let Some(consumer) = state.consumers.iter_mut().find(|c| {
        c.unit == mission.unit && c.waypoint.near(&mission.consumer_waypoint, tolerance)
    }) else {
        warn!(mission = %mission.id, "completed mission has no consumer");
        return;
    };

    if consumer.delivered < mission.quantity {
        warn!(
            mission = %mission.id,
            expected = mission.quantity,
            delivered = consumer.delivered,
            "cargo lost in transit, resynchronising network"
        );
        ctx.record(Event::DeliveryShortfall {
            mission_id: mission.id.clone(),
            expected: mission.quantity,
            delivered: consumer.delivered,
        });
        re_register_all_stations(ctx);
        return;
    }

    consumer.requested = consumer.requested.saturating_sub(mission.quantity);
    consumer.delivered = consumer.delivered.saturating_sub(mission.quantity);
    info!(mission = %mission.id, quantity = mission.quantity, "mission completed");
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

/// Broadcast a request for every producer and consumer to announce itself again.
pub(crate) fn re_register_all_stations(ctx: &mut TickContext<'_>) {
    ctx.broadcast(Message::ReRegisterProducer);
    ctx.broadcast(Message::ReRegisterConsumer);
    ctx.record(Event::ResyncRequested);
}

pub(crate) fn reset_orders(state: &mut NetworkState, ctx: &mut TickContext<'_>) {
    for producer in &mut state.producers {
        producer.reserved = 0;
    }
    #[allow(clippy::cast_possible_truncation)]
    let missions_cleared = state.missions.len() as u32;
    state.missions.clear();
    state.dispatched.clear();
    warn!(missions_cleared, "orders reset");
    ctx.broadcast(Message::ResetOrders);
    ctx.record(Event::OrdersReset { missions_cleared });
}

/// Repair divergence the remote side cannot: reservations against empty stock,
/// deliveries above the request.
pub(crate) fn correct_runtime_data(state: &mut NetworkState, ctx: &mut TickContext<'_>) {
    for producer in &mut state.producers {
        if producer.stock == 0 && producer.reserved != 0 {
            warn!(
                entity = %producer.entity_id,
                unit = %producer.unit,
                reserved = producer.reserved,
                "reservation against empty stock cleared"
            );
            ctx.record(Event::ReservationCorrected {
                entity_id: producer.entity_id.clone(),
                unit: producer.unit.clone(),
                cleared: producer.reserved,
            });
            producer.reserved = 0;
        }
    }
    for consumer in &mut state.consumers {
        if consumer.delivered > consumer.requested {
            let excess = consumer.delivered - consumer.requested;
            consumer.delivered = consumer.requested;
            ctx.record(Event::DeliveryClamped {
                unit: consumer.unit.clone(),
                waypoint: consumer.waypoint.to_string(),
                excess,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::volume_cap;

    #[test]
    fn volume_cap_floors_to_whole_units() {
        assert_eq!(volume_cap(10.0, 3.0), 3);
        assert_eq!(volume_cap(10.0, 0.5), 20);
    }

    #[test]
    fn volume_cap_never_below_one() {
        assert_eq!(volume_cap(1.0, 50.0), 1);
    }

    #[test]
    fn volume_cap_ignores_degenerate_volume() {
        assert_eq!(volume_cap(10.0, 0.0), u64::MAX);
        assert_eq!(volume_cap(10.0, f64::NAN), u64::MAX);
    }
}
