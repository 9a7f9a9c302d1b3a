//! `fleet_core` — deterministic allocator and router tick.
//!
//! No IO, no network. Outbound traffic goes through the passed-in `Transport`,
//! time through the passed-in `Clock`.

mod allocator;
mod engine;
mod error;
mod graph;
mod id;
pub mod messages;
pub mod records;
mod router;
pub mod status;
mod transport;
mod types;
mod waypoint;

pub use engine::{request_resync, reset_orders, tick};
pub use error::CodecError;
pub use graph::{Station, StationGraph, StationPath};
pub use id::{generate_allocator_id, generate_uuid};
pub use messages::{Channel, Envelope, FlightPlan, FlightRequest, Message};
pub use records::{decode_state, encode_state, FlatRecord};
pub use router::{build_flight_path, select_hangar, DockStop};
pub use status::{compute_status, render_status, StatusSnapshot};
pub use transport::{Clock, FixedClock, Inbox, Outbox, Transport};
pub use types::*;
pub use waypoint::{sanitize, Vec3, Waypoint};

pub(crate) fn emit(counters: &mut Counters, tick: u64, event: Event) -> EventEnvelope {
    let id = EventId(format!("evt_{:06}", counters.next_event_id));
    counters.next_event_id += 1;
    EventEnvelope { id, tick, event }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_fixtures;

#[cfg(test)]
mod tests;
