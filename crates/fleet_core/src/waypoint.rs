//! Named 3D coordinates and their canonical text form.
//!
//! A waypoint renders as `GPS:<name>:<x>:<y>:<z>:`. Names are scrubbed of the
//! characters the wire and record formats reserve as separators.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CodecError;

/// Characters that separate fields, records, lists and coordinates somewhere in
/// the text formats. They never survive inside a name or identifier.
pub(crate) const RESERVED: &[char] = &[';', '*', '|', '=', ',', ':', '~', '\n', '\r'];

/// Replace reserved separator characters with `_`.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|c| if RESERVED.contains(&c) { '_' } else { c })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Vec3) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// A named point. The name is always sanitized, however the waypoint was
/// built, so equality and the rendered text agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawWaypoint")]
pub struct Waypoint {
    name: String,
    pub position: Vec3,
}

#[derive(Deserialize)]
struct RawWaypoint {
    name: String,
    position: Vec3,
}

impl From<RawWaypoint> for Waypoint {
    fn from(raw: RawWaypoint) -> Self {
        Self::at(&raw.name, raw.position)
    }
}

impl Waypoint {
    pub fn new(name: &str, x: f64, y: f64, z: f64) -> Self {
        Self::at(name, Vec3::new(x, y, z))
    }

    pub fn at(name: &str, position: Vec3) -> Self {
        Self {
            name: sanitize(name),
            position,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn distance_to(&self, other: &Waypoint) -> f64 {
        self.position.distance_to(&other.position)
    }

    /// Same physical dock: coordinates agree within `tolerance`. Names are ignored,
    /// remote ends report the same dock with small numerical drift.
    pub fn near(&self, other: &Waypoint, tolerance: f64) -> bool {
        self.distance_to(other) <= tolerance
    }
}

impl fmt::Display for Waypoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GPS:{}:{}:{}:{}:",
            self.name,
            self.position.x,
            self.position.y,
            self.position.z
        )
    }
}

impl FromStr for Waypoint {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CodecError::InvalidWaypoint(s.to_string());
        let mut parts = s.trim().split(':');
        if parts.next() != Some("GPS") {
            return Err(invalid());
        }
        let name = parts.next().ok_or_else(invalid)?;
        let mut coord = || -> Result<f64, CodecError> {
            let value: f64 = parts
                .next()
                .ok_or_else(invalid)?
                .parse()
                .map_err(|_| invalid())?;
            if value.is_finite() {
                Ok(value)
            } else {
                Err(invalid())
            }
        };
        let x = coord()?;
        let y = coord()?;
        let z = coord()?;
        Ok(Self::new(name, x, y, z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_text_form() {
        let wp = Waypoint::new("Ice Dock", 1.5, -2.0, 300.25);
        assert_eq!(wp.to_string(), "GPS:Ice Dock:1.5:-2:300.25:");
    }

    #[test]
    fn parses_its_own_output() {
        let wp = Waypoint::new("Depot", 12_345.678_9, -0.001, 1e7);
        let back: Waypoint = wp.to_string().parse().unwrap();
        assert_eq!(back, wp);
    }

    #[test]
    fn parses_without_trailing_colon() {
        let wp: Waypoint = "GPS:A:1:2:3".parse().unwrap();
        assert_eq!(wp.position, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn rejects_garbage() {
        assert!("".parse::<Waypoint>().is_err());
        assert!("GPS:A:1:2".parse::<Waypoint>().is_err());
        assert!("GPS:A:x:2:3:".parse::<Waypoint>().is_err());
        assert!("GPS:A:NaN:2:3:".parse::<Waypoint>().is_err());
        assert!("POS:A:1:2:3:".parse::<Waypoint>().is_err());
    }

    #[test]
    fn reserved_characters_are_scrubbed_from_names() {
        let wp = Waypoint::new("a;b*c|d:e", 0.0, 0.0, 0.0);
        assert_eq!(wp.name(), "a_b_c_d_e");
    }

    #[test]
    fn parsed_and_deserialized_names_match_rendered_form() {
        let parsed: Waypoint = "GPS:dock|7=north:1:2:3:".parse().unwrap();
        assert_eq!(parsed.name(), "dock_7_north");
        assert_eq!(parsed, Waypoint::new("dock_7_north", 1.0, 2.0, 3.0));
        assert_eq!(parsed.to_string().parse::<Waypoint>().unwrap(), parsed);

        let json = r#"{"name":"bay;2","position":{"x":1.0,"y":2.0,"z":3.0}}"#;
        let decoded: Waypoint = serde_json::from_str(json).unwrap();
        assert_eq!(decoded.name(), "bay_2");
        assert_eq!(decoded.to_string(), "GPS:bay_2:1:2:3:");
    }

    #[test]
    fn near_uses_coordinates_only() {
        let a = Waypoint::new("one", 10.0, 10.0, 10.0);
        let b = Waypoint::new("two", 10.004, 10.0, 9.996);
        let c = Waypoint::new("one", 10.5, 10.0, 10.0);
        assert!(a.near(&b, 0.01));
        assert!(!a.near(&c, 0.01));
    }
}
