use ulid::Ulid;

use crate::model::RoomId;

#[derive(Debug)]
pub enum EngineError {
    RoomNotFound(RoomId),
    RoomExists(RoomId),
    ReservationNotFound(Ulid),
    RestrictionNotFound(Ulid),
    /// A staged restriction overlaps this existing (or co-staged) restriction.
    Conflict(Ulid),
    Invalid(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::RoomNotFound(id) => write!(f, "room not found: {id}"),
            EngineError::RoomExists(id) => write!(f, "room already exists: {id}"),
            EngineError::ReservationNotFound(id) => write!(f, "reservation not found: {id}"),
            EngineError::RestrictionNotFound(id) => write!(f, "restriction not found: {id}"),
            EngineError::Conflict(id) => write!(f, "conflict with restriction: {id}"),
            EngineError::Invalid(msg) => write!(f, "invalid write: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
