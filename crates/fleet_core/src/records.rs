//! Flat text persistence for `NetworkState`.
//!
//! One line per entity set, `tag=record|record|...`, fields inside a record
//! separated by `*`. Station weights are `id~seconds` pairs joined by `,`.
//! Decoding is lenient: a record that fails to parse is skipped with a
//! warning, a missing line leaves that set empty.

use ahash::AHashMap;
use tracing::warn;

use crate::error::CodecError;
use crate::graph::Station;
use crate::messages::Fields;
use crate::waypoint::sanitize;
use crate::{Consumer, EntityId, Mission, NetworkState, Producer};

pub const RECORD_SEP: char = '|';
pub const FIELD_SEP: char = '*';
const TAG_SEP: char = '=';
const WEIGHT_SEP: char = ',';
const WEIGHT_PAIR: char = '~';

/// A value persisted as one `*`-delimited record.
pub trait FlatRecord: Sized {
    const TAG: &'static str;

    fn encode_record(&self) -> String;

    fn decode_record(text: &str) -> Result<Self, CodecError>;
}

fn join(fields: &[String]) -> String {
    fields.join(&FIELD_SEP.to_string())
}

fn reader<'a>(context: &'static str, text: &'a str) -> Fields<'a> {
    Fields::new(context, text.split(FIELD_SEP))
}

impl FlatRecord for Producer {
    const TAG: &'static str = "producers";

    fn encode_record(&self) -> String {
        join(&[
            sanitize(self.entity_id.as_str()),
            sanitize(self.fleet_id.as_str()),
            sanitize(self.unit.as_str()),
            sanitize(self.kind.as_str()),
            self.unit_volume.to_string(),
            self.waypoint.to_string(),
            self.stock.to_string(),
            self.reserved.to_string(),
        ])
    }

    fn decode_record(text: &str) -> Result<Self, CodecError> {
        let mut f = reader("producer", text);
        let producer = Producer {
            entity_id: f.id("entity_id")?,
            fleet_id: f.id("fleet_id")?,
            unit: f.id("unit")?,
            kind: f.id("kind")?,
            unit_volume: f.float("unit_volume")?,
            waypoint: f.waypoint("waypoint")?,
            stock: f.count("stock")?,
            reserved: f.count("reserved")?,
        };
        f.finish()?;
        Ok(producer)
    }
}

impl FlatRecord for Consumer {
    const TAG: &'static str = "consumers";

    fn encode_record(&self) -> String {
        join(&[
            sanitize(self.entity_id.as_str()),
            sanitize(self.fleet_id.as_str()),
            sanitize(self.unit.as_str()),
            self.waypoint.to_string(),
            self.requested.to_string(),
            self.delivered.to_string(),
        ])
    }

    fn decode_record(text: &str) -> Result<Self, CodecError> {
        let mut f = reader("consumer", text);
        let consumer = Consumer {
            entity_id: f.id("entity_id")?,
            fleet_id: f.id("fleet_id")?,
            unit: f.id("unit")?,
            waypoint: f.waypoint("waypoint")?,
            requested: f.count("requested")?,
            delivered: f.count("delivered")?,
        };
        f.finish()?;
        Ok(consumer)
    }
}

impl FlatRecord for Mission {
    const TAG: &'static str = "missions";

    fn encode_record(&self) -> String {
        join(&[
            sanitize(self.id.as_str()),
            sanitize(self.unit.as_str()),
            self.consumer_waypoint.to_string(),
            self.producer_waypoint.to_string(),
            self.quantity.to_string(),
            sanitize(self.vehicle_class.as_str()),
        ])
    }

    fn decode_record(text: &str) -> Result<Self, CodecError> {
        let mut f = reader("mission", text);
        let mission = Mission {
            id: f.id("id")?,
            unit: f.id("unit")?,
            consumer_waypoint: f.waypoint("consumer_waypoint")?,
            producer_waypoint: f.waypoint("producer_waypoint")?,
            quantity: f.count("quantity")?,
            vehicle_class: f.id("vehicle_class")?,
        };
        f.finish()?;
        Ok(mission)
    }
}

impl FlatRecord for Station {
    const TAG: &'static str = "stations";

    fn encode_record(&self) -> String {
        let mut weights: Vec<(&EntityId, &f64)> = self.weights.iter().collect();
        weights.sort_by(|a, b| a.0.cmp(b.0));
        let weights: Vec<String> = weights
            .into_iter()
            .map(|(id, seconds)| format!("{}{WEIGHT_PAIR}{seconds}", sanitize(id.as_str())))
            .collect();
        join(&[
            sanitize(self.entity_id.as_str()),
            sanitize(self.fleet_id.as_str()),
            if self.hangar { "1" } else { "0" }.to_string(),
            self.waypoint.to_string(),
            weights.join(&WEIGHT_SEP.to_string()),
        ])
    }

    fn decode_record(text: &str) -> Result<Self, CodecError> {
        let mut f = reader("station", text);
        let entity_id = f.id("entity_id")?;
        let fleet_id = f.id("fleet_id")?;
        let hangar = f.count("hangar")? != 0;
        let waypoint = f.waypoint("waypoint")?;
        let weights = decode_weights(f.raw("weights")?)?;
        f.finish()?;
        Ok(Station {
            entity_id,
            fleet_id,
            waypoint,
            hangar,
            weights,
        })
    }
}

fn decode_weights(raw: &str) -> Result<AHashMap<EntityId, f64>, CodecError> {
    let mut weights = AHashMap::new();
    for pair in raw.split(WEIGHT_SEP).filter(|p| !p.is_empty()) {
        let invalid = || CodecError::InvalidNumber {
            context: "station",
            field: "weights",
            value: pair.to_string(),
        };
        let (id, seconds) = pair.split_once(WEIGHT_PAIR).ok_or_else(invalid)?;
        let seconds: f64 = seconds.parse().map_err(|_| invalid())?;
        if !(seconds >= 0.0 && seconds.is_finite()) {
            return Err(invalid());
        }
        weights.insert(EntityId::from(id), seconds);
    }
    Ok(weights)
}

fn encode_set<T: FlatRecord>(records: &[T]) -> String {
    let body: Vec<String> = records.iter().map(FlatRecord::encode_record).collect();
    format!("{}{TAG_SEP}{}", T::TAG, body.join(&RECORD_SEP.to_string()))
}

fn decode_set<T: FlatRecord>(body: &str) -> Vec<T> {
    body.split(RECORD_SEP)
        .filter(|r| !r.trim().is_empty())
        .filter_map(|record| match T::decode_record(record) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(tag = T::TAG, %err, "skipping unreadable record");
                None
            }
        })
        .collect()
}

/// Render the persistent part of the state. The allocator id is not stored;
/// it comes from configuration on load.
pub fn encode_state(state: &NetworkState) -> String {
    let mut lines = vec![format!(
        "meta{TAG_SEP}{}{FIELD_SEP}{}{FIELD_SEP}{}",
        state.meta.tick, state.counters.next_event_id, state.counters.next_mission_seq
    )];
    lines.push(encode_set(&state.producers));
    lines.push(encode_set(&state.consumers));
    lines.push(encode_set(&state.missions));
    lines.push(encode_set(&state.graph.stations));

    let mut fairness: Vec<String> = state
        .last_served
        .iter()
        .map(|(unit, fleet)| {
            format!("{}{FIELD_SEP}{}", sanitize(unit.as_str()), sanitize(fleet.as_str()))
        })
        .collect();
    fairness.sort();
    lines.push(format!("fairness{TAG_SEP}{}", fairness.join(&RECORD_SEP.to_string())));

    let mut dispatched: Vec<String> = state
        .dispatched
        .iter()
        .map(|id| sanitize(id.as_str()))
        .collect();
    dispatched.sort();
    lines.push(format!("dispatched{TAG_SEP}{}", dispatched.join(&RECORD_SEP.to_string())));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn decode_meta(state: &mut NetworkState, body: &str) -> Result<(), CodecError> {
    let mut f = reader("meta", body);
    let tick = f.count("tick")?;
    let next_event_id = f.count("next_event_id")?;
    let next_mission_seq = f.count("next_mission_seq")?;
    f.finish()?;
    state.meta.tick = tick;
    state.counters.next_event_id = next_event_id;
    state.counters.next_mission_seq = next_mission_seq;
    Ok(())
}

fn decode_fairness(state: &mut NetworkState, body: &str) {
    for record in body.split(RECORD_SEP).filter(|r| !r.is_empty()) {
        match record.split_once(FIELD_SEP) {
            Some((unit, fleet)) if !unit.is_empty() && !fleet.is_empty() => {
                state.last_served.insert(unit.into(), fleet.into());
            }
            _ => warn!(record, "skipping unreadable fairness record"),
        }
    }
}

/// Rebuild state from `encode_state` output. Never fails: anything unreadable
/// is skipped and the rest is kept.
pub fn decode_state(text: &str, allocator_id: EntityId) -> NetworkState {
    let mut state = NetworkState::new(allocator_id);
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let Some((tag, body)) = line.split_once(TAG_SEP) else {
            warn!(line, "skipping line without tag");
            continue;
        };
        match tag {
            "meta" => {
                if let Err(err) = decode_meta(&mut state, body) {
                    warn!(%err, "unreadable meta record, counters start at zero");
                }
            }
            "producers" => state.producers = decode_set(body),
            "consumers" => state.consumers = decode_set(body),
            "missions" => state.missions = decode_set(body),
            "stations" => state.graph.stations = decode_set(body),
            "fairness" => decode_fairness(&mut state, body),
            "dispatched" => {
                state.dispatched = body
                    .split(RECORD_SEP)
                    .filter(|r| !r.is_empty())
                    .map(Into::into)
                    .collect();
            }
            other => warn!(tag = other, "skipping unknown record set"),
        }
    }
    state
}
