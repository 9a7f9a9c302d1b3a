//! Hangar dispatchers: accept transport orders, fly them leg by leg, and report
//! travel times and completion.

use std::collections::VecDeque;

use fleet_core::{EntityId, Envelope, FleetId, FlightPlan, Message, MissionId, Waypoint};
use tracing::debug;

use crate::{Cadence, Docks, HangarDef, Peer};

#[derive(Debug, Clone)]
struct Flight {
    mission_id: MissionId,
    legs: Vec<Waypoint>,
    /// Index of the leg being flown towards.
    next: usize,
    /// Seconds until `legs[next]` is reached.
    remaining: f64,
    cargo: u64,
    picked_up: bool,
    unloaded: Option<(Waypoint, u64)>,
    last_station: Option<Waypoint>,
    since_station: f64,
}

impl Flight {
    fn new(mission_id: MissionId, plan: FlightPlan, cruise_speed: f64) -> Self {
        let mut flight = Self {
            mission_id,
            last_station: plan.legs.first().cloned(),
            legs: plan.legs,
            next: 1,
            remaining: 0.0,
            cargo: 0,
            picked_up: false,
            unloaded: None,
            since_station: 0.0,
        };
        flight.remaining = flight.leg_seconds(cruise_speed);
        flight
    }

    fn finished(&self) -> bool {
        self.next >= self.legs.len()
    }

    fn leg_seconds(&self, cruise_speed: f64) -> f64 {
        match (self.legs.get(self.next - 1), self.legs.get(self.next)) {
            (Some(from), Some(to)) => from.distance_to(to) / cruise_speed,
            _ => 0.0,
        }
    }

    fn arrive(
        &mut self,
        docks: &mut dyn Docks,
        tolerance: f64,
        reporter: &EntityId,
        outbound: &mut Vec<Envelope>,
    ) {
        let here = self.legs[self.next].clone();
        if docks.is_dock(&here) {
            // First dock is the pickup, second the drop-off.
            if !self.picked_up {
                self.cargo = docks.load(&here);
                self.picked_up = true;
            } else if self.unloaded.is_none() {
                docks.unload(&here, self.cargo, outbound);
                self.unloaded = Some((here, self.cargo));
                self.cargo = 0;
            }
            return;
        }
        if let Some(previous) = &self.last_station {
            if !previous.near(&here, tolerance) && self.since_station > 0.0 {
                outbound.push(Envelope::broadcast(
                    reporter.clone(),
                    Message::FlightTime {
                        from: previous.clone(),
                        to: here.clone(),
                        observed_seconds: self.since_station,
                    },
                ));
            }
        }
        self.last_station = Some(here);
        self.since_station = 0.0;
    }
}

/// A hangar station with a pool of vehicles.
#[derive(Debug, Clone)]
pub struct HangarDispatcher {
    pub entity_id: EntityId,
    pub fleet_id: FleetId,
    pub waypoint: Waypoint,
    /// Vehicles parked and free to launch.
    pub vehicles: u32,
    pub completed: u64,
    cruise_speed: f64,
    flights: Vec<Flight>,
    queued: VecDeque<(MissionId, FlightPlan)>,
    cadence: Cadence,
    tolerance: f64,
}

impl HangarDispatcher {
    pub fn new(def: &HangarDef, cadence: Cadence, tolerance: f64) -> Self {
        Self {
            entity_id: def.entity_id.clone(),
            fleet_id: def.fleet_id.clone(),
            waypoint: def.position.waypoint(),
            vehicles: def.vehicles,
            completed: 0,
            cruise_speed: def.cruise_speed,
            flights: Vec::new(),
            queued: VecDeque::new(),
            cadence,
            tolerance,
        }
    }

    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    pub fn queued(&self) -> usize {
        self.queued.len()
    }

    fn knows(&self, mission_id: &MissionId) -> bool {
        self.flights.iter().any(|f| &f.mission_id == mission_id)
            || self.queued.iter().any(|(id, _)| id == mission_id)
    }

    fn launch_queued(&mut self) {
        while self.vehicles > 0 {
            let Some((mission_id, plan)) = self.queued.pop_front() else {
                break;
            };
            debug!(hangar = %self.entity_id, mission = %mission_id, legs = plan.legs.len(), "vehicle launched");
            self.vehicles -= 1;
            self.flights
                .push(Flight::new(mission_id, plan, self.cruise_speed));
        }
    }

    /// Move every flight forward by `seconds`. Finished flights land, settle
    /// with the consumer and report completion.
    pub fn fly(&mut self, seconds: f64, docks: &mut dyn Docks, outbound: &mut Vec<Envelope>) {
        let tolerance = self.tolerance;
        let cruise_speed = self.cruise_speed;
        for flight in &mut self.flights {
            let mut budget = seconds;
            while !flight.finished() && budget > 0.0 {
                if flight.remaining <= budget {
                    budget -= flight.remaining;
                    flight.since_station += flight.remaining;
                    flight.arrive(docks, tolerance, &self.entity_id, outbound);
                    flight.next += 1;
                    flight.remaining = flight.leg_seconds(cruise_speed);
                } else {
                    flight.remaining -= budget;
                    flight.since_station += budget;
                    budget = 0.0;
                }
            }
        }

        let (landed, flying): (Vec<Flight>, Vec<Flight>) =
            self.flights.drain(..).partition(Flight::finished);
        self.flights = flying;
        for flight in landed {
            if let Some((dock, quantity)) = &flight.unloaded {
                docks.settle(dock, *quantity);
            }
            debug!(hangar = %self.entity_id, mission = %flight.mission_id, "vehicle landed");
            outbound.push(Envelope::broadcast(
                self.entity_id.clone(),
                Message::MissionCompleted {
                    mission_id: flight.mission_id,
                },
            ));
            self.vehicles += 1;
            self.completed += 1;
        }
        self.launch_queued();
    }
}

impl Peer for HangarDispatcher {
    fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    fn receive(&mut self, envelope: &Envelope, _outbound: &mut Vec<Envelope>) {
        if let Message::RequestTransport {
            mission_id,
            flight_plan,
            ..
        } = &envelope.message
        {
            if !envelope.is_broadcast() && !self.knows(mission_id) {
                self.queued.push_back((mission_id.clone(), flight_plan.clone()));
            }
        }
    }

    fn poll(&mut self, tick: u64, outbound: &mut Vec<Envelope>) {
        if self.cadence.announce_due(tick) {
            outbound.push(Envelope::broadcast(
                self.entity_id.clone(),
                Message::RegisterHangar {
                    entity_id: self.entity_id.clone(),
                    fleet_id: self.fleet_id.clone(),
                    waypoint: self.waypoint.clone(),
                },
            ));
        }
        self.launch_queued();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PointDef;

    /// One producer dock at x=100 holding 7 units, one consumer dock at x=200.
    #[derive(Default)]
    struct TwoDocks {
        delivered: Vec<u64>,
        settled: Vec<u64>,
    }

    impl Docks for TwoDocks {
        fn is_dock(&self, at: &Waypoint) -> bool {
            at.name().ends_with("dock")
        }

        fn load(&mut self, _at: &Waypoint) -> u64 {
            7
        }

        fn unload(&mut self, _at: &Waypoint, quantity: u64, _outbound: &mut Vec<Envelope>) {
            self.delivered.push(quantity);
        }

        fn settle(&mut self, _at: &Waypoint, quantity: u64) {
            self.settled.push(quantity);
        }
    }

    fn hangar(vehicles: u32) -> HangarDispatcher {
        let def = HangarDef {
            entity_id: "hangar".into(),
            fleet_id: "depot".into(),
            position: PointDef {
                name: "hangar".into(),
                x: 0.0,
                y: 0.0,
                z: 0.0,
            },
            vehicles,
            cruise_speed: 10.0,
        };
        let cadence = Cadence {
            report_every: 1,
            announce_every: 100,
            offset: 0,
        };
        HangarDispatcher::new(&def, cadence, 0.01)
    }

    fn plan() -> FlightPlan {
        FlightPlan {
            legs: vec![
                Waypoint::new("hangar", 0.0, 0.0, 0.0),
                Waypoint::new("a_station", 90.0, 0.0, 0.0),
                Waypoint::new("a_dock", 100.0, 0.0, 0.0),
                Waypoint::new("a_station", 90.0, 0.0, 0.0),
                Waypoint::new("b_station", 190.0, 0.0, 0.0),
                Waypoint::new("b_dock", 200.0, 0.0, 0.0),
                Waypoint::new("b_station", 190.0, 0.0, 0.0),
            ],
        }
    }

    fn transport(id: &str) -> Envelope {
        Envelope::unicast(
            "alloc".into(),
            "hangar".into(),
            Message::RequestTransport {
                mission_id: id.into(),
                vehicle_class: "Ore".into(),
                flight_plan: plan(),
            },
        )
    }

    #[test]
    fn flies_the_plan_and_reports() {
        let mut hangar = hangar(1);
        let mut docks = TwoDocks::default();
        let mut out = Vec::new();
        hangar.receive(&transport("m1"), &mut out);
        hangar.poll(1, &mut out);
        assert_eq!(hangar.in_flight(), 1);
        assert_eq!(hangar.vehicles, 0);

        // 9 + 1 + 1 + 10 + 1 + 1 seconds of flying.
        hangar.fly(30.0, &mut docks, &mut out);
        assert_eq!(docks.delivered, vec![7]);
        assert_eq!(docks.settled, vec![7]);
        assert_eq!(hangar.completed, 1);
        assert_eq!(hangar.vehicles, 1);

        let times: Vec<(String, String, f64)> = out
            .iter()
            .filter_map(|e| match &e.message {
                Message::FlightTime {
                    from,
                    to,
                    observed_seconds,
                } => Some((from.name().to_string(), to.name().to_string(), *observed_seconds)),
                _ => None,
            })
            .collect();
        assert_eq!(times.len(), 2);
        assert_eq!((times[0].0.as_str(), times[0].1.as_str()), ("hangar", "a_station"));
        assert!((times[0].2 - 9.0).abs() < 1e-9);
        assert_eq!((times[1].0.as_str(), times[1].1.as_str()), ("a_station", "b_station"));
        assert!((times[1].2 - 10.0).abs() < 1e-9);
        assert_eq!(out.last().unwrap().message.verb(), "MissionCompleted");
    }

    #[test]
    fn duplicate_orders_fly_once() {
        let mut hangar = hangar(2);
        let mut out = Vec::new();
        hangar.receive(&transport("m1"), &mut out);
        hangar.receive(&transport("m1"), &mut out);
        hangar.poll(1, &mut out);
        assert_eq!(hangar.in_flight(), 1);
        assert_eq!(hangar.queued(), 0);
    }

    #[test]
    fn orders_wait_for_a_free_vehicle() {
        let mut hangar = hangar(1);
        let mut docks = TwoDocks::default();
        let mut out = Vec::new();
        hangar.receive(&transport("m1"), &mut out);
        hangar.receive(&transport("m2"), &mut out);
        hangar.poll(1, &mut out);
        assert_eq!((hangar.in_flight(), hangar.queued()), (1, 1));

        hangar.fly(30.0, &mut docks, &mut out);
        assert_eq!((hangar.in_flight(), hangar.queued()), (1, 0));
    }

    #[test]
    fn slow_flights_span_several_calls() {
        let mut hangar = hangar(1);
        let mut docks = TwoDocks::default();
        let mut out = Vec::new();
        hangar.receive(&transport("m1"), &mut out);
        hangar.poll(1, &mut out);
        for _ in 0..10 {
            hangar.fly(2.0, &mut docks, &mut out);
        }
        assert_eq!(hangar.completed, 0);
        hangar.fly(3.0, &mut docks, &mut out);
        assert_eq!(hangar.completed, 1);
    }
}
