use tracing::{debug, trace, warn};

use crate::allocator::{self, ProducerAnnouncement};
use crate::messages::{Channel, Envelope, Message};
use crate::router;
use crate::transport::{Clock, FixedClock, Inbox, Transport};
use crate::{EntityId, Event, EventEnvelope, EventLevel, NetworkConfig, NetworkState};

/// Everything a handler needs besides the state itself: configuration, the
/// outbound transport, the clock, and the events raised so far this tick.
pub(crate) struct TickContext<'a> {
    pub config: &'a NetworkConfig,
    pub clock: &'a dyn Clock,
    transport: &'a mut dyn Transport,
    level: EventLevel,
    sender: EntityId,
    events: Vec<Event>,
}

impl<'a> TickContext<'a> {
    pub fn new(
        config: &'a NetworkConfig,
        transport: &'a mut dyn Transport,
        clock: &'a dyn Clock,
        level: EventLevel,
        sender: EntityId,
    ) -> Self {
        Self {
            config,
            clock,
            transport,
            level,
            sender,
            events: Vec::new(),
        }
    }

    pub fn broadcast(&mut self, message: Message) {
        self.transport
            .send(Envelope::broadcast(self.sender.clone(), message));
    }

    pub fn unicast(&mut self, target: &EntityId, message: Message) {
        self.transport
            .send(Envelope::unicast(self.sender.clone(), target.clone(), message));
    }

    pub fn record(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Record only when running at `EventLevel::Debug`.
    pub fn record_debug(&mut self, event: Event) {
        if self.level == EventLevel::Debug {
            self.events.push(event);
        }
    }

    /// Transient absence or malformed input: log, record, move on.
    pub fn dropped(&mut self, verb: &str, reason: String) {
        warn!(verb, %reason, "message dropped");
        self.record(Event::MessageDropped {
            verb: verb.to_string(),
            reason,
        });
    }

    fn finish(self) -> Vec<Event> {
        self.events
    }
}

/// Advance the allocator and router by one tick.
///
/// Order of operations:
/// 1. Pop at most one unicast and one broadcast envelope and dispatch them,
///    unicast first so a delivery report lands before the completion that follows it.
/// 2. Every `resend_interval_ticks`, re-send flight requests for missions
///    no hangar has taken.
/// 3. Run one matching pass (creates at most one mission).
/// 4. Run the correction pass.
/// 5. Increment tick counter.
///
/// Returns all events produced this tick.
pub fn tick(
    state: &mut NetworkState,
    inbox: &mut Inbox,
    config: &NetworkConfig,
    transport: &mut impl Transport,
    clock: &impl Clock,
    event_level: EventLevel,
) -> Vec<EventEnvelope> {
    let sender = state.meta.allocator_id.clone();
    let mut ctx = TickContext::new(config, transport, clock, event_level, sender);

    if let Some(envelope) = inbox.pop_unicast() {
        dispatch(state, &mut ctx, envelope);
    }
    if let Some(envelope) = inbox.pop_broadcast() {
        dispatch(state, &mut ctx, envelope);
    }
    let interval = config.resend_interval_ticks;
    if interval > 0 && state.meta.tick % interval == interval - 1 {
        allocator::resend_undispatched_flights(state, &mut ctx);
    }
    allocator::search_requesting_consumer_for_missions(state, &mut ctx);
    allocator::correct_runtime_data(state, &mut ctx);

    let current_tick = state.meta.tick;
    let events = ctx
        .finish()
        .into_iter()
        .map(|event| crate::emit(&mut state.counters, current_tick, event))
        .collect();
    state.meta.tick += 1;
    events
}

/// Zero every reservation, forget open missions and tell producers to do the same.
pub fn reset_orders(
    state: &mut NetworkState,
    config: &NetworkConfig,
    transport: &mut impl Transport,
) -> Vec<EventEnvelope> {
    out_of_tick(state, config, transport, allocator::reset_orders)
}

/// Ask every producer and consumer to announce itself again.
pub fn request_resync(
    state: &mut NetworkState,
    config: &NetworkConfig,
    transport: &mut impl Transport,
) -> Vec<EventEnvelope> {
    out_of_tick(state, config, transport, |_, ctx| {
        allocator::re_register_all_stations(ctx);
    })
}

fn out_of_tick(
    state: &mut NetworkState,
    config: &NetworkConfig,
    transport: &mut impl Transport,
    action: impl FnOnce(&mut NetworkState, &mut TickContext<'_>),
) -> Vec<EventEnvelope> {
    let clock = FixedClock::default();
    let sender = state.meta.allocator_id.clone();
    let mut ctx = TickContext::new(config, transport, &clock, EventLevel::Normal, sender);
    action(state, &mut ctx);
    let current_tick = state.meta.tick;
    ctx.finish()
        .into_iter()
        .map(|event| crate::emit(&mut state.counters, current_tick, event))
        .collect()
}

fn dispatch(state: &mut NetworkState, ctx: &mut TickContext<'_>, envelope: Envelope) {
    let verb = envelope.message.verb();
    if let Channel::Unicast { target } = &envelope.channel {
        if target != &state.meta.allocator_id {
            ctx.dropped(verb, format!("addressed to {target}"));
            return;
        }
    }
    ctx.record_debug(Event::MessageReceived {
        verb: verb.to_string(),
        sender: envelope.sender.clone(),
    });
    debug!(verb, sender = %envelope.sender, "dispatch");

    match envelope.message {
        Message::RegisterProducer {
            unit,
            entity_id,
            fleet_id,
            kind,
            unit_volume,
            waypoint,
        } => allocator::register_producer(
            state,
            ctx,
            &ProducerAnnouncement {
                unit,
                entity_id,
                fleet_id,
                kind,
                unit_volume,
                waypoint,
            },
        ),
        Message::RegisterConsumer {
            unit,
            entity_id,
            fleet_id,
            waypoint,
        } => allocator::register_consumer(state, ctx, &unit, &entity_id, &fleet_id, &waypoint),
        Message::UpdateResourceStock {
            unit,
            stock,
            reserved,
            entity_id,
            waypoint,
        } => allocator::update_resource_stock(
            state, ctx, &entity_id, &unit, &waypoint, stock, reserved,
        ),
        Message::RequestResource {
            unit,
            quantity,
            waypoint,
        } => allocator::request_resource(state, ctx, &unit, &waypoint, quantity),
        Message::ResourceDelivered {
            unit,
            quantity,
            waypoint,
        } => allocator::resource_delivered(state, ctx, &unit, &waypoint, quantity),
        Message::MissionCompleted { mission_id } => {
            allocator::mission_completed(state, ctx, &mission_id);
            router::forget_mission(state, &mission_id);
        }
        Message::RemoveProducer { unit, waypoint } => {
            allocator::remove_producer(state, ctx, &unit, &waypoint);
        }
        Message::RemoveConsumer { unit, waypoint } => {
            allocator::remove_consumer(state, ctx, &unit, &waypoint);
        }
        Message::RegisterStation {
            entity_id,
            fleet_id,
            waypoint,
        } => router::register_station(state, ctx, &entity_id, &fleet_id, &waypoint, false),
        Message::RegisterHangar {
            entity_id,
            fleet_id,
            waypoint,
        } => router::register_station(state, ctx, &entity_id, &fleet_id, &waypoint, true),
        Message::FlightTime {
            from,
            to,
            observed_seconds,
        } => router::flight_time(state, ctx, &from, &to, observed_seconds),
        Message::RequestFlight(request) => router::request_flight(state, ctx, &request),
        // Our own vocabulary echoed back, or traffic between other peers.
        Message::ProducerRegistered { .. }
        | Message::ConsumerRegistered { .. }
        | Message::OrderResource { .. }
        | Message::ResetOrders
        | Message::ReRegisterProducer
        | Message::ReRegisterConsumer
        | Message::RequestTransport { .. } => {
            trace!(verb, "not for the allocator");
        }
    }
}
