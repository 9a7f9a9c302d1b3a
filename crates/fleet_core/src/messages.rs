//! Message vocabulary exchanged over the bus, and its delimited text form.
//!
//! On the wire a message is `Verb;field;field;...`. Waypoints use their
//! canonical `GPS:` form, a flight plan is a `,`-separated list of waypoints.

use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::waypoint::{sanitize, Waypoint};
use crate::{ContainerKind, EntityId, FleetId, MissionId, ResourceUnit};

pub const FIELD_SEP: char = ';';
pub const LEG_SEP: char = ',';

// ---------------------------------------------------------------------------
// Envelopes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Channel {
    Broadcast,
    Unicast { target: EntityId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: EntityId,
    pub channel: Channel,
    pub message: Message,
}

impl Envelope {
    pub fn broadcast(sender: EntityId, message: Message) -> Self {
        Self {
            sender,
            channel: Channel::Broadcast,
            message,
        }
    }

    pub fn unicast(sender: EntityId, target: EntityId, message: Message) -> Self {
        Self {
            sender,
            channel: Channel::Unicast { target },
            message,
        }
    }

    pub fn is_broadcast(&self) -> bool {
        matches!(self.channel, Channel::Broadcast)
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightRequest {
    pub mission_id: MissionId,
    pub vehicle_class: ContainerKind,
    pub producer_waypoint: Waypoint,
    pub producer_fleet_id: FleetId,
    pub consumer_waypoint: Waypoint,
    pub consumer_fleet_id: FleetId,
}

/// Ordered itinerary handed to a hangar. Opaque to the router once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlightPlan {
    pub legs: Vec<Waypoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    RegisterProducer {
        unit: ResourceUnit,
        entity_id: EntityId,
        fleet_id: FleetId,
        kind: ContainerKind,
        unit_volume: f64,
        waypoint: Waypoint,
    },
    ProducerRegistered {
        unit: ResourceUnit,
        allocator_id: EntityId,
        waypoint: Waypoint,
    },
    RegisterConsumer {
        unit: ResourceUnit,
        entity_id: EntityId,
        fleet_id: FleetId,
        waypoint: Waypoint,
    },
    ConsumerRegistered {
        unit: ResourceUnit,
        allocator_id: EntityId,
        waypoint: Waypoint,
    },
    UpdateResourceStock {
        unit: ResourceUnit,
        stock: u64,
        reserved: u64,
        entity_id: EntityId,
        waypoint: Waypoint,
    },
    RequestResource {
        unit: ResourceUnit,
        quantity: u64,
        waypoint: Waypoint,
    },
    OrderResource {
        unit: ResourceUnit,
        quantity: u64,
        waypoint: Waypoint,
    },
    ResourceDelivered {
        unit: ResourceUnit,
        quantity: u64,
        waypoint: Waypoint,
    },
    MissionCompleted {
        mission_id: MissionId,
    },
    RemoveProducer {
        unit: ResourceUnit,
        waypoint: Waypoint,
    },
    RemoveConsumer {
        unit: ResourceUnit,
        waypoint: Waypoint,
    },
    ResetOrders,
    ReRegisterProducer,
    ReRegisterConsumer,
    RequestFlight(FlightRequest),
    RegisterStation {
        entity_id: EntityId,
        fleet_id: FleetId,
        waypoint: Waypoint,
    },
    RegisterHangar {
        entity_id: EntityId,
        fleet_id: FleetId,
        waypoint: Waypoint,
    },
    FlightTime {
        from: Waypoint,
        to: Waypoint,
        observed_seconds: f64,
    },
    RequestTransport {
        mission_id: MissionId,
        vehicle_class: ContainerKind,
        flight_plan: FlightPlan,
    },
}

impl Message {
    pub fn verb(&self) -> &'static str {
        match self {
            Message::RegisterProducer { .. } => "RegisterProducer",
            Message::ProducerRegistered { .. } => "ProducerRegistered",
            Message::RegisterConsumer { .. } => "RegisterConsumer",
            Message::ConsumerRegistered { .. } => "ConsumerRegistered",
            Message::UpdateResourceStock { .. } => "UpdateResourceStock",
            Message::RequestResource { .. } => "RequestResource",
            Message::OrderResource { .. } => "OrderResource",
            Message::ResourceDelivered { .. } => "ResourceDelivered",
            Message::MissionCompleted { .. } => "MissionCompleted",
            Message::RemoveProducer { .. } => "RemoveProducer",
            Message::RemoveConsumer { .. } => "RemoveConsumer",
            Message::ResetOrders => "ResetOrders",
            Message::ReRegisterProducer => "ReRegisterProducer",
            Message::ReRegisterConsumer => "ReRegisterConsumer",
            Message::RequestFlight(_) => "RequestFlight",
            Message::RegisterStation { .. } => "RegisterStation",
            Message::RegisterHangar { .. } => "RegisterHangar",
            Message::FlightTime { .. } => "FlightTime",
            Message::RequestTransport { .. } => "RequestTransport",
        }
    }

    /// Render as `Verb;field;...`.
    pub fn encode(&self) -> String {
        let mut fields: Vec<String> = vec![self.verb().to_string()];
        match self {
            Message::RegisterProducer {
                unit,
                entity_id,
                fleet_id,
                kind,
                unit_volume,
                waypoint,
            } => {
                fields.push(sanitize(unit.as_str()));
                fields.push(sanitize(entity_id.as_str()));
                fields.push(sanitize(fleet_id.as_str()));
                fields.push(sanitize(kind.as_str()));
                fields.push(unit_volume.to_string());
                fields.push(waypoint.to_string());
            }
            Message::ProducerRegistered {
                unit,
                allocator_id,
                waypoint,
            }
            | Message::ConsumerRegistered {
                unit,
                allocator_id,
                waypoint,
            } => {
                fields.push(sanitize(unit.as_str()));
                fields.push(sanitize(allocator_id.as_str()));
                fields.push(waypoint.to_string());
            }
            Message::RegisterConsumer {
                unit,
                entity_id,
                fleet_id,
                waypoint,
            } => {
                fields.push(sanitize(unit.as_str()));
                fields.push(sanitize(entity_id.as_str()));
                fields.push(sanitize(fleet_id.as_str()));
                fields.push(waypoint.to_string());
            }
            Message::UpdateResourceStock {
                unit,
                stock,
                reserved,
                entity_id,
                waypoint,
            } => {
                fields.push(sanitize(unit.as_str()));
                fields.push(stock.to_string());
                fields.push(reserved.to_string());
                fields.push(sanitize(entity_id.as_str()));
                fields.push(waypoint.to_string());
            }
            Message::RequestResource {
                unit,
                quantity,
                waypoint,
            }
            | Message::OrderResource {
                unit,
                quantity,
                waypoint,
            }
            | Message::ResourceDelivered {
                unit,
                quantity,
                waypoint,
            } => {
                fields.push(sanitize(unit.as_str()));
                fields.push(quantity.to_string());
                fields.push(waypoint.to_string());
            }
            Message::MissionCompleted { mission_id } => {
                fields.push(sanitize(mission_id.as_str()));
            }
            Message::RemoveProducer { unit, waypoint } | Message::RemoveConsumer { unit, waypoint } => {
                fields.push(sanitize(unit.as_str()));
                fields.push(waypoint.to_string());
            }
            Message::ResetOrders | Message::ReRegisterProducer | Message::ReRegisterConsumer => {}
            Message::RequestFlight(request) => {
                fields.push(sanitize(request.mission_id.as_str()));
                fields.push(sanitize(request.vehicle_class.as_str()));
                fields.push(request.producer_waypoint.to_string());
                fields.push(sanitize(request.producer_fleet_id.as_str()));
                fields.push(request.consumer_waypoint.to_string());
                fields.push(sanitize(request.consumer_fleet_id.as_str()));
            }
            Message::RegisterStation {
                entity_id,
                fleet_id,
                waypoint,
            }
            | Message::RegisterHangar {
                entity_id,
                fleet_id,
                waypoint,
            } => {
                fields.push(sanitize(entity_id.as_str()));
                fields.push(sanitize(fleet_id.as_str()));
                fields.push(waypoint.to_string());
            }
            Message::FlightTime {
                from,
                to,
                observed_seconds,
            } => {
                fields.push(from.to_string());
                fields.push(to.to_string());
                fields.push(observed_seconds.to_string());
            }
            Message::RequestTransport {
                mission_id,
                vehicle_class,
                flight_plan,
            } => {
                fields.push(sanitize(mission_id.as_str()));
                fields.push(sanitize(vehicle_class.as_str()));
                let legs: Vec<String> = flight_plan.legs.iter().map(ToString::to_string).collect();
                fields.push(legs.join(&LEG_SEP.to_string()));
            }
        }
        fields.join(&FIELD_SEP.to_string())
    }

    /// Parse the `Verb;field;...` form.
    pub fn decode(text: &str) -> Result<Message, CodecError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CodecError::Empty);
        }
        let mut split = text.split(FIELD_SEP);
        let verb = split.next().unwrap_or_default();
        let context = known_verb(verb).ok_or_else(|| CodecError::UnknownVerb(verb.to_string()))?;
        let mut f = Fields::new(context, split);

        let message = match context {
            "RegisterProducer" => Message::RegisterProducer {
                unit: f.id("unit")?,
                entity_id: f.id("entity_id")?,
                fleet_id: f.id("fleet_id")?,
                kind: f.id("kind")?,
                unit_volume: f.float("unit_volume")?,
                waypoint: f.waypoint("waypoint")?,
            },
            "ProducerRegistered" => Message::ProducerRegistered {
                unit: f.id("unit")?,
                allocator_id: f.id("allocator_id")?,
                waypoint: f.waypoint("waypoint")?,
            },
            "RegisterConsumer" => Message::RegisterConsumer {
                unit: f.id("unit")?,
                entity_id: f.id("entity_id")?,
                fleet_id: f.id("fleet_id")?,
                waypoint: f.waypoint("waypoint")?,
            },
            "ConsumerRegistered" => Message::ConsumerRegistered {
                unit: f.id("unit")?,
                allocator_id: f.id("allocator_id")?,
                waypoint: f.waypoint("waypoint")?,
            },
            "UpdateResourceStock" => Message::UpdateResourceStock {
                unit: f.id("unit")?,
                stock: f.count("stock")?,
                reserved: f.count("reserved")?,
                entity_id: f.id("entity_id")?,
                waypoint: f.waypoint("waypoint")?,
            },
            "RequestResource" => Message::RequestResource {
                unit: f.id("unit")?,
                quantity: f.count("quantity")?,
                waypoint: f.waypoint("waypoint")?,
            },
            "OrderResource" => Message::OrderResource {
                unit: f.id("unit")?,
                quantity: f.count("quantity")?,
                waypoint: f.waypoint("waypoint")?,
            },
            "ResourceDelivered" => Message::ResourceDelivered {
                unit: f.id("unit")?,
                quantity: f.count("quantity")?,
                waypoint: f.waypoint("waypoint")?,
            },
            "MissionCompleted" => Message::MissionCompleted {
                mission_id: f.id("mission_id")?,
            },
            "RemoveProducer" => Message::RemoveProducer {
                unit: f.id("unit")?,
                waypoint: f.waypoint("waypoint")?,
            },
            "RemoveConsumer" => Message::RemoveConsumer {
                unit: f.id("unit")?,
                waypoint: f.waypoint("waypoint")?,
            },
            "ResetOrders" => Message::ResetOrders,
            "ReRegisterProducer" => Message::ReRegisterProducer,
            "ReRegisterConsumer" => Message::ReRegisterConsumer,
            "RequestFlight" => Message::RequestFlight(FlightRequest {
                mission_id: f.id("mission_id")?,
                vehicle_class: f.id("vehicle_class")?,
                producer_waypoint: f.waypoint("producer_waypoint")?,
                producer_fleet_id: f.id("producer_fleet_id")?,
                consumer_waypoint: f.waypoint("consumer_waypoint")?,
                consumer_fleet_id: f.id("consumer_fleet_id")?,
            }),
            "RegisterStation" => Message::RegisterStation {
                entity_id: f.id("entity_id")?,
                fleet_id: f.id("fleet_id")?,
                waypoint: f.waypoint("waypoint")?,
            },
            "RegisterHangar" => Message::RegisterHangar {
                entity_id: f.id("entity_id")?,
                fleet_id: f.id("fleet_id")?,
                waypoint: f.waypoint("waypoint")?,
            },
            "FlightTime" => Message::FlightTime {
                from: f.waypoint("from")?,
                to: f.waypoint("to")?,
                observed_seconds: f.float("observed_seconds")?,
            },
            "RequestTransport" => Message::RequestTransport {
                mission_id: f.id("mission_id")?,
                vehicle_class: f.id("vehicle_class")?,
                flight_plan: f.flight_plan("flight_plan")?,
            },
            _ => return Err(CodecError::UnknownVerb(verb.to_string())),
        };
        f.finish()?;
        Ok(message)
    }
}

const VERBS: &[&str] = &[
    "RegisterProducer",
    "ProducerRegistered",
    "RegisterConsumer",
    "ConsumerRegistered",
    "UpdateResourceStock",
    "RequestResource",
    "OrderResource",
    "ResourceDelivered",
    "MissionCompleted",
    "RemoveProducer",
    "RemoveConsumer",
    "ResetOrders",
    "ReRegisterProducer",
    "ReRegisterConsumer",
    "RequestFlight",
    "RegisterStation",
    "RegisterHangar",
    "FlightTime",
    "RequestTransport",
];

fn known_verb(verb: &str) -> Option<&'static str> {
    VERBS.iter().copied().find(|v| *v == verb)
}

// ---------------------------------------------------------------------------
// Field reader
// ---------------------------------------------------------------------------

/// Pulls typed fields off a split message or record, naming the field in any error.
pub(crate) struct Fields<'a> {
    context: &'static str,
    inner: std::str::Split<'a, char>,
}

impl<'a> Fields<'a> {
    pub(crate) fn new(context: &'static str, inner: std::str::Split<'a, char>) -> Self {
        Self { context, inner }
    }

    pub(crate) fn raw(&mut self, field: &'static str) -> Result<&'a str, CodecError> {
        self.inner.next().ok_or(CodecError::MissingField {
            context: self.context,
            field,
        })
    }

    pub(crate) fn id<T: From<String>>(&mut self, field: &'static str) -> Result<T, CodecError> {
        Ok(T::from(self.raw(field)?.to_string()))
    }

    pub(crate) fn count(&mut self, field: &'static str) -> Result<u64, CodecError> {
        let raw = self.raw(field)?;
        raw.trim().parse().map_err(|_| CodecError::InvalidNumber {
            context: self.context,
            field,
            value: raw.to_string(),
        })
    }

    pub(crate) fn float(&mut self, field: &'static str) -> Result<f64, CodecError> {
        let raw = self.raw(field)?;
        raw.trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| CodecError::InvalidNumber {
                context: self.context,
                field,
                value: raw.to_string(),
            })
    }

    pub(crate) fn waypoint(&mut self, field: &'static str) -> Result<Waypoint, CodecError> {
        self.raw(field)?.parse()
    }

    pub(crate) fn flight_plan(&mut self, field: &'static str) -> Result<FlightPlan, CodecError> {
        let raw = self.raw(field)?;
        if raw.is_empty() {
            return Ok(FlightPlan::default());
        }
        let legs = raw
            .split(LEG_SEP)
            .map(str::parse)
            .collect::<Result<Vec<Waypoint>, _>>()?;
        Ok(FlightPlan { legs })
    }

    pub(crate) fn finish(mut self) -> Result<(), CodecError> {
        match self.inner.next() {
            None => Ok(()),
            Some(extra) => Err(CodecError::TrailingField {
                context: self.context,
                value: extra.to_string(),
            }),
        }
    }
}
