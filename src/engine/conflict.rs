use chrono::Datelike;

use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub fn now_ms() -> Ms {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as Ms)
        .unwrap_or(0)
}

fn check_years(stay: &Stay) -> Result<(), EngineError> {
    if stay.start.year() < MIN_VALID_YEAR || stay.end.year() > MAX_VALID_YEAR {
        return Err(EngineError::LimitExceeded("date out of range"));
    }
    Ok(())
}

/// Stays that are written to the store.
pub(crate) fn validate_stay(stay: &Stay) -> Result<(), EngineError> {
    if !stay.is_well_formed() {
        return Err(EngineError::Invalid("stay must start before it ends"));
    }
    check_years(stay)?;
    if stay.nights() > MAX_STAY_NIGHTS {
        return Err(EngineError::LimitExceeded("stay too long"));
    }
    Ok(())
}

/// Windows that are only read.
pub(crate) fn validate_query_window(window: &Stay) -> Result<(), EngineError> {
    if !window.is_well_formed() {
        return Err(EngineError::Invalid("query window must start before it ends"));
    }
    check_years(window)?;
    if window.nights() > MAX_QUERY_WINDOW_NIGHTS {
        return Err(EngineError::LimitExceeded("query window too wide"));
    }
    Ok(())
}

/// The write-time overlap constraint: the candidate may not collide with any
/// restriction already on the room.
pub(crate) fn check_no_conflict(rs: &RoomState, candidate: &RoomRestriction) -> Result<(), EngineError> {
    match rs.find_conflict(candidate) {
        Some(existing) => Err(EngineError::Conflict(existing)),
        None => Ok(()),
    }
}

/// Restrictions staged together must not collide with each other either.
pub(crate) fn check_batch_conflicts(staged: &[RoomRestriction]) -> Result<(), EngineError> {
    for (i, a) in staged.iter().enumerate() {
        if let Some(b) = staged[i + 1..].iter().find(|b| a.conflicts_with(b)) {
            return Err(EngineError::Conflict(b.id));
        }
    }
    Ok(())
}
