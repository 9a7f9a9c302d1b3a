//! Decoding errors for wire messages and persisted records.

/// Errors produced when text from the bus or a state file cannot be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("empty message")]
    Empty,

    #[error("unknown verb \"{0}\"")]
    UnknownVerb(String),

    #[error("{context}: missing field {field}")]
    MissingField {
        context: &'static str,
        field: &'static str,
    },

    #[error("{context}: invalid number in {field}: \"{value}\"")]
    InvalidNumber {
        context: &'static str,
        field: &'static str,
        value: String,
    },

    #[error("invalid waypoint \"{0}\"")]
    InvalidWaypoint(String),

    #[error("{context}: unexpected trailing field \"{value}\"")]
    TrailingField {
        context: &'static str,
        value: String,
    },
}
