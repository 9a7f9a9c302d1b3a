use super::*;

fn register_ice_producer(waypoint: Waypoint) -> Envelope {
    broadcast(
        "ice_cargo",
        Message::RegisterProducer {
            unit: "Ice".into(),
            entity_id: "ice_cargo".into(),
            fleet_id: "mine".into(),
            kind: "Ore".into(),
            unit_volume: 0.37,
            waypoint,
        },
    )
}

fn register_base_consumer(waypoint: Waypoint) -> Envelope {
    broadcast(
        "base_a_cargo",
        Message::RegisterConsumer {
            unit: "Ice".into(),
            entity_id: "base_a_cargo".into(),
            fleet_id: "base_a".into(),
            waypoint,
        },
    )
}

#[test]
fn producer_registration_is_idempotent() {
    let mut state = base_state();

    let (events, outbox) = deliver(&mut state, register_ice_producer(producer_dock()));
    assert!(has_event(&events, |e| matches!(
        e,
        Event::ProducerRegistered { created: true, .. }
    )));
    assert_eq!(unicasts_to(&outbox, "ice_cargo").len(), 1);

    // Same dock reported with a little numerical drift.
    let drifted = Waypoint::new("ice_dock", 1000.005, 0.0, 0.0);
    let (events, outbox) = deliver(&mut state, register_ice_producer(drifted));
    assert!(has_event(&events, |e| matches!(
        e,
        Event::ProducerRegistered { created: false, .. }
    )));
    assert_eq!(state.producers.len(), 1);

    // Acknowledged again: the remote side may have forgotten.
    let acks = unicasts_to(&outbox, "ice_cargo");
    assert_eq!(acks.len(), 1);
    assert!(matches!(
        acks[0],
        Message::ProducerRegistered { allocator_id, .. } if allocator_id.as_str() == ALLOCATOR
    ));
}

#[test]
fn re_registration_keeps_counters() {
    let mut state = stocked_network();
    state.producers[0].reserved = 40;
    deliver(&mut state, register_ice_producer(producer_dock()));
    assert_eq!(state.producers.len(), 1);
    assert_eq!(state.producers[0].stock, 100);
    assert_eq!(state.producers[0].reserved, 40);
}

#[test]
fn consumer_re_registration_clears_delivered() {
    let mut state = stocked_network();
    with_demand(&mut state, 30, 0);
    state.consumers[0].delivered = 12;
    deliver(&mut state, register_base_consumer(consumer_a_dock()));
    assert_eq!(state.consumers.len(), 2);
    assert_eq!(state.consumers[0].requested, 30);
    assert_eq!(state.consumers[0].delivered, 0);
}

#[test]
fn distant_waypoint_is_a_different_consumer() {
    let mut state = base_state();
    deliver(&mut state, register_base_consumer(consumer_a_dock()));
    deliver(
        &mut state,
        register_base_consumer(Waypoint::new("other", 0.0, 1000.5, 0.0)),
    );
    assert_eq!(state.consumers.len(), 2);
}

#[test]
fn duplicated_registrations_in_one_inbox() {
    let mut state = base_state();
    let mut inbox = Inbox::new();
    inbox.push(register_base_consumer(consumer_a_dock()));
    inbox.push(register_base_consumer(consumer_a_dock()));
    run_tick(&mut state, &mut inbox);
    run_tick(&mut state, &mut inbox);
    assert!(inbox.is_empty());
    assert_eq!(state.consumers.len(), 1);
}

#[test]
fn stock_update_for_unknown_producer_is_dropped() {
    let mut state = base_state();
    let (events, _) = deliver(
        &mut state,
        to_allocator(
            "ghost",
            Message::UpdateResourceStock {
                unit: "Ice".into(),
                stock: 10,
                reserved: 0,
                entity_id: "ghost".into(),
                waypoint: producer_dock(),
            },
        ),
    );
    assert!(state.producers.is_empty());
    assert!(has_event(&events, |e| matches!(
        e,
        Event::MessageDropped { verb, .. } if verb == "UpdateResourceStock"
    )));
}

#[test]
fn stock_update_overwrites_both_counters() {
    let mut state = stocked_network();
    state.producers[0].reserved = 30;
    deliver(
        &mut state,
        to_allocator(
            "ice_cargo",
            Message::UpdateResourceStock {
                unit: "Ice".into(),
                stock: 70,
                reserved: 0,
                entity_id: "ice_cargo".into(),
                waypoint: producer_dock(),
            },
        ),
    );
    assert_eq!(state.producers[0].stock, 70);
    assert_eq!(state.producers[0].reserved, 0);
}

#[test]
fn misaddressed_unicast_is_dropped() {
    let mut state = stocked_network();
    let envelope = Envelope::unicast(
        "base_a_cargo".into(),
        "someone_else".into(),
        request_resource("Ice", 30, consumer_a_dock()),
    );
    let (events, outbox) = deliver(&mut state, envelope);
    assert_eq!(state.consumers[0].requested, 0);
    assert!(outbox.sent.is_empty());
    assert!(has_event(&events, |e| matches!(
        e,
        Event::MessageDropped { verb, .. } if verb == "RequestResource"
    )));
}

#[test]
fn request_replaces_demand_and_clamps_delivered() {
    let mut state = stocked_network();
    state.consumers[0].requested = 30;
    state.consumers[0].delivered = 20;
    state.missions.push(Mission {
        id: "msn_open".into(),
        unit: "Ice".into(),
        consumer_waypoint: consumer_a_dock(),
        producer_waypoint: producer_dock(),
        quantity: 30,
        vehicle_class: "Ore".into(),
    });
    deliver(
        &mut state,
        to_allocator("base_a_cargo", request_resource("Ice", 10, consumer_a_dock())),
    );
    assert_eq!(state.consumers[0].requested, 10);
    assert_eq!(state.consumers[0].delivered, 10);
}

#[test]
fn zero_request_cancels_demand() {
    let mut state = stocked_network();
    state.consumers[0].requested = 30;
    state.producers[0].stock = 0;
    deliver(
        &mut state,
        to_allocator("base_a_cargo", request_resource("Ice", 0, consumer_a_dock())),
    );
    assert_eq!(state.consumers[0].outstanding(), 0);
}

#[test]
fn remove_producer_is_idempotent() {
    let mut state = stocked_network();
    let remove = || {
        broadcast(
            "ice_cargo",
            Message::RemoveProducer {
                unit: "Ice".into(),
                waypoint: producer_dock(),
            },
        )
    };
    let (events, _) = deliver(&mut state, remove());
    assert!(state.producers.is_empty());
    assert!(has_event(&events, |e| matches!(e, Event::ProducerRemoved { .. })));

    let (events, _) = deliver(&mut state, remove());
    assert!(!has_event(&events, |e| matches!(e, Event::ProducerRemoved { .. })));
}

#[test]
fn remove_consumer_matches_unit_and_waypoint() {
    let mut state = stocked_network();
    deliver(
        &mut state,
        broadcast(
            "base_b_cargo",
            Message::RemoveConsumer {
                unit: "Ore".into(),
                waypoint: consumer_b_dock(),
            },
        ),
    );
    assert_eq!(state.consumers.len(), 2);
    deliver(
        &mut state,
        broadcast(
            "base_b_cargo",
            Message::RemoveConsumer {
                unit: "Ice".into(),
                waypoint: consumer_b_dock(),
            },
        ),
    );
    assert_eq!(state.consumers.len(), 1);
    assert_eq!(state.consumers[0].entity_id, EntityId::from("base_a_cargo"));
}

#[test]
fn debug_level_records_every_dispatch() {
    let mut state = base_state();
    let mut inbox = Inbox::new();
    inbox.push(register_base_consumer(consumer_a_dock()));
    let mut outbox = Outbox::new();
    let events = tick(
        &mut state,
        &mut inbox,
        &base_config(),
        &mut outbox,
        &clock(),
        EventLevel::Debug,
    );
    assert!(has_event(&events, |e| matches!(
        e,
        Event::MessageReceived { verb, .. } if verb == "RegisterConsumer"
    )));
}

#[test]
fn event_ids_and_ticks_advance() {
    let mut state = base_state();
    let (first, _) = deliver(&mut state, register_base_consumer(consumer_a_dock()));
    let (second, _) = deliver(&mut state, register_base_consumer(consumer_a_dock()));
    assert_eq!(first[0].id, EventId::from("evt_000000"));
    assert_eq!(first[0].tick, 0);
    assert_eq!(second[0].id, EventId::from("evt_000001"));
    assert_eq!(second[0].tick, 1);
    assert_eq!(state.meta.tick, 2);
}
