use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::waypoint::Waypoint;
use crate::{EntityId, FleetId};

/// Intermediate stops between two stations.
pub type StationPath = SmallVec<[EntityId; 8]>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub entity_id: EntityId,
    pub fleet_id: FleetId,
    /// Where a vehicle arrives before docking anywhere on this site.
    pub waypoint: Waypoint,
    /// Hangars dispatch vehicles but route like any other station.
    pub hangar: bool,
    /// Learned one-way travel seconds to other stations, keyed by their id.
    pub weights: AHashMap<EntityId, f64>,
}

/// Every known station with its learned adjacency. The graph is complete:
/// any pair without a measurement gets a geometric estimate on first use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StationGraph {
    pub stations: Vec<Station>,
}

impl StationGraph {
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    pub fn get(&self, entity_id: &EntityId) -> Option<&Station> {
        self.stations.iter().find(|s| &s.entity_id == entity_id)
    }

    fn index_of(&self, entity_id: &EntityId) -> Option<usize> {
        self.stations.iter().position(|s| &s.entity_id == entity_id)
    }

    /// The station serving a fleet. A plain station wins over a hangar on the
    /// same fleet.
    pub fn find_by_fleet(&self, fleet_id: &FleetId) -> Option<&Station> {
        let mut on_fleet = self.stations.iter().filter(|s| &s.fleet_id == fleet_id);
        let first = on_fleet.next()?;
        if !first.hangar {
            return Some(first);
        }
        on_fleet.find(|s| !s.hangar).or(Some(first))
    }

    pub fn find_by_waypoint(&self, waypoint: &Waypoint, tolerance: f64) -> Option<&Station> {
        self.stations
            .iter()
            .find(|s| s.waypoint.near(waypoint, tolerance))
    }

    pub fn hangars(&self) -> impl Iterator<Item = &Station> {
        self.stations.iter().filter(|s| s.hangar)
    }

    /// Insert a station or refresh a known one. Returns `true` when created.
    pub fn upsert(
        &mut self,
        entity_id: &EntityId,
        fleet_id: &FleetId,
        waypoint: &Waypoint,
        hangar: bool,
    ) -> bool {
        if let Some(station) = self.stations.iter_mut().find(|s| &s.entity_id == entity_id) {
            station.fleet_id = fleet_id.clone();
            station.waypoint = waypoint.clone();
            station.hangar |= hangar;
            return false;
        }
        self.stations.push(Station {
            entity_id: entity_id.clone(),
            fleet_id: fleet_id.clone(),
            waypoint: waypoint.clone(),
            hangar,
            weights: AHashMap::new(),
        });
        true
    }

    /// Travel estimate from `from` to `to`, seeding both directions when unmeasured.
    pub fn weight(&mut self, from: &EntityId, to: &EntityId, cruise_speed: f64) -> Option<f64> {
        let i = self.index_of(from)?;
        let j = self.index_of(to)?;
        Some(self.weight_at(i, j, cruise_speed))
    }

    fn weight_at(&mut self, i: usize, j: usize, cruise_speed: f64) -> f64 {
        if i == j {
            return 0.0;
        }
        let to_id = self.stations[j].entity_id.clone();
        if let Some(w) = self.stations[i].weights.get(&to_id) {
            return *w;
        }
        let distance = self.stations[i].waypoint.distance_to(&self.stations[j].waypoint);
        let estimate = if cruise_speed > 0.0 {
            distance / cruise_speed
        } else {
            distance
        };
        let from_id = self.stations[i].entity_id.clone();
        self.stations[i].weights.insert(to_id, estimate);
        // The reverse entry is independent; a measured value there survives.
        self.stations[j].weights.entry(from_id).or_insert(estimate);
        estimate
    }

    /// Overwrite the directional edge with a measured travel time.
    /// Ignored unless `observed_seconds > 0`, both stations are known and distinct.
    pub fn update_weight(&mut self, from: &EntityId, to: &EntityId, observed_seconds: f64) -> bool {
        if from == to || !(observed_seconds > 0.0 && observed_seconds.is_finite()) {
            return false;
        }
        if self.index_of(to).is_none() {
            return false;
        }
        let Some(i) = self.index_of(from) else {
            return false;
        };
        self.stations[i].weights.insert(to.clone(), observed_seconds);
        true
    }

    /// Greedy one-step lookahead from `start` towards `destination`.
    ///
    /// Each step moves to the unvisited station minimising
    /// `weight(current, c) + weight(c, destination)`. This is not a shortest-path
    /// search: a cheap detour two hops away is never seen. Visited stations are
    /// closed, so the walk ends after at most `len()` steps; if every station is
    /// closed the destination is taken directly.
    ///
    /// Returns the intermediate stations only, excluding both endpoints.
    /// Unknown endpoints yield an empty path.
    pub fn find_path(
        &mut self,
        start: &EntityId,
        destination: &EntityId,
        cruise_speed: f64,
    ) -> StationPath {
        let mut path = StationPath::new();
        let (Some(start), Some(dest)) = (self.index_of(start), self.index_of(destination)) else {
            return path;
        };
        let mut closed = vec![false; self.stations.len()];
        closed[start] = true;
        let mut current = start;

        while current != dest {
            let mut best: Option<(usize, f64)> = None;
            for candidate in 0..self.stations.len() {
                if closed[candidate] {
                    continue;
                }
                let cost = self.weight_at(current, candidate, cruise_speed)
                    + self.weight_at(candidate, dest, cruise_speed);
                if best.is_none_or(|(_, lowest)| cost < lowest) {
                    best = Some((candidate, cost));
                }
            }
            let Some((next, _)) = best else {
                break;
            };
            if next == dest {
                break;
            }
            closed[next] = true;
            path.push(self.stations[next].entity_id.clone());
            current = next;
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(points: &[(&str, f64, f64, f64)]) -> StationGraph {
        let mut graph = StationGraph::default();
        for (id, x, y, z) in points {
            graph.upsert(
                &EntityId::from(*id),
                &FleetId(format!("fleet_{id}")),
                &Waypoint::new(id, *x, *y, *z),
                false,
            );
        }
        graph
    }

    fn id(s: &str) -> EntityId {
        EntityId::from(s)
    }

    #[test]
    fn seeds_geometric_estimate_in_both_directions() {
        let mut graph = graph_with(&[("A", 0.0, 0.0, 0.0), ("B", 300.0, 400.0, 0.0)]);
        let w = graph.weight(&id("A"), &id("B"), 100.0).unwrap();
        assert!((w - 5.0).abs() < 1e-9);
        assert!((graph.get(&id("B")).unwrap().weights[&id("A")] - 5.0).abs() < 1e-9);
    }

    #[test]
    fn seeding_keeps_measured_reverse_edge() {
        let mut graph = graph_with(&[("A", 0.0, 0.0, 0.0), ("B", 100.0, 0.0, 0.0)]);
        assert!(graph.update_weight(&id("B"), &id("A"), 42.0));
        let forward = graph.weight(&id("A"), &id("B"), 100.0).unwrap();
        assert!((forward - 1.0).abs() < 1e-9);
        let back = graph.weight(&id("B"), &id("A"), 100.0).unwrap();
        assert!((back - 42.0).abs() < 1e-9);
    }

    #[test]
    fn update_weight_rejects_bogus_measurements() {
        let mut graph = graph_with(&[("A", 0.0, 0.0, 0.0), ("B", 100.0, 0.0, 0.0)]);
        assert!(!graph.update_weight(&id("A"), &id("A"), 3.0));
        assert!(!graph.update_weight(&id("A"), &id("B"), 0.0));
        assert!(!graph.update_weight(&id("A"), &id("B"), -1.0));
        assert!(!graph.update_weight(&id("A"), &id("B"), f64::NAN));
        assert!(!graph.update_weight(&id("A"), &id("Z"), 3.0));
        assert!(graph.get(&id("A")).unwrap().weights.is_empty());
    }

    #[test]
    fn weights_are_directional() {
        let mut graph = graph_with(&[("A", 0.0, 0.0, 0.0), ("B", 100.0, 0.0, 0.0)]);
        graph.update_weight(&id("A"), &id("B"), 10.0);
        graph.update_weight(&id("B"), &id("A"), 30.0);
        assert!((graph.weight(&id("A"), &id("B"), 1.0).unwrap() - 10.0).abs() < 1e-9);
        assert!((graph.weight(&id("B"), &id("A"), 1.0).unwrap() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn self_weight_is_zero() {
        let mut graph = graph_with(&[("A", 5.0, 5.0, 5.0)]);
        assert_eq!(graph.weight(&id("A"), &id("A"), 1.0), Some(0.0));
        assert!(graph.get(&id("A")).unwrap().weights.is_empty());
    }

    #[test]
    fn upsert_refreshes_without_duplicating() {
        let mut graph = graph_with(&[("A", 0.0, 0.0, 0.0)]);
        let created = graph.upsert(
            &id("A"),
            &FleetId::from("moved"),
            &Waypoint::new("A2", 1.0, 1.0, 1.0),
            true,
        );
        assert!(!created);
        assert_eq!(graph.len(), 1);
        let station = graph.get(&id("A")).unwrap();
        assert_eq!(station.fleet_id, FleetId::from("moved"));
        assert!(station.hangar);
    }

    #[test]
    fn find_by_fleet_prefers_plain_station() {
        let mut graph = StationGraph::default();
        let fleet = FleetId::from("base");
        graph.upsert(&id("H"), &fleet, &Waypoint::new("H", 0.0, 0.0, 0.0), true);
        graph.upsert(&id("S"), &fleet, &Waypoint::new("S", 1.0, 0.0, 0.0), false);
        assert_eq!(graph.find_by_fleet(&fleet).unwrap().entity_id, id("S"));

        let mut only_hangar = StationGraph::default();
        only_hangar.upsert(&id("H"), &fleet, &Waypoint::new("H", 0.0, 0.0, 0.0), true);
        assert_eq!(only_hangar.find_by_fleet(&fleet).unwrap().entity_id, id("H"));
        assert!(only_hangar.find_by_fleet(&FleetId::from("nope")).is_none());
    }

    #[test]
    fn unknown_endpoints_give_empty_path() {
        let mut graph = graph_with(&[("A", 0.0, 0.0, 0.0)]);
        assert!(graph.find_path(&id("A"), &id("Z"), 1.0).is_empty());
        assert!(graph.find_path(&id("Z"), &id("A"), 1.0).is_empty());
    }

    #[test]
    fn start_equals_destination() {
        let mut graph = graph_with(&[("A", 0.0, 0.0, 0.0), ("B", 1.0, 0.0, 0.0)]);
        assert!(graph.find_path(&id("A"), &id("A"), 1.0).is_empty());
    }
}
