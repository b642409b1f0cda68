use chrono::NaiveDate;

use crate::model::{RoomId, StayError};
use crate::repository::RepoError;

use super::validation::ValidationErrors;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    InvalidDate(String),
    InvalidInterval { start: NaiveDate, end: NaiveDate },
    RoomNotFound(RoomId),
    ValidationFailed(ValidationErrors),
    /// The store failed or timed out. Detail is for logs only.
    PersistenceFailure(String),
    MissingDraft,
    /// A draft reached the commit step without a room or a usable stay.
    InvalidCandidate(&'static str),
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::InvalidDate(raw) => write!(f, "invalid date: {raw:?}"),
            BookingError::InvalidInterval { start, end } => {
                write!(f, "invalid interval: {start} is not before {end}")
            }
            BookingError::RoomNotFound(id) => write!(f, "room not found: {id}"),
            BookingError::ValidationFailed(errors) => {
                write!(f, "validation failed for: {}", errors.fields().collect::<Vec<_>>().join(", "))
            }
            BookingError::PersistenceFailure(msg) => write!(f, "persistence failure: {msg}"),
            BookingError::MissingDraft => write!(f, "no reservation in progress"),
            BookingError::InvalidCandidate(msg) => write!(f, "invalid reservation candidate: {msg}"),
        }
    }
}

impl std::error::Error for BookingError {}

impl From<StayError> for BookingError {
    fn from(e: StayError) -> Self {
        match e {
            StayError::InvalidDate(raw) => BookingError::InvalidDate(raw),
            StayError::InvalidInterval { start, end } => BookingError::InvalidInterval { start, end },
        }
    }
}

impl From<RepoError> for BookingError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound(id) => BookingError::RoomNotFound(id),
            other => BookingError::PersistenceFailure(other.to_string()),
        }
    }
}

impl BookingError {
    /// Failures a guest cannot fix by changing their input.
    pub fn is_system(&self) -> bool {
        matches!(self, BookingError::PersistenceFailure(_))
    }
}
