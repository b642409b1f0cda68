use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;

use crate::model::*;
use crate::observability::SEARCHES_TOTAL;
use crate::repository::Repository;

use super::{BookingError, bounded};

/// Read-only availability questions against the repository.
pub struct Availability {
    repo: Arc<dyn Repository>,
    timeout: Duration,
}

impl Availability {
    pub fn new(repo: Arc<dyn Repository>, timeout: Duration) -> Self {
        Self { repo, timeout }
    }

    /// Whether the room is free for every night of `[start, end)`.
    /// `Ok(false)` is an answer, not a failure.
    pub async fn check_room(&self, room_id: RoomId, start: NaiveDate, end: NaiveDate) -> Result<bool, BookingError> {
        let stay = Stay::new(start, end)?;
        let result = bounded(
            self.timeout,
            "room_is_available",
            self.repo.room_is_available(room_id, &stay),
        )
        .await;
        let label = match &result {
            Ok(true) => "available",
            Ok(false) => "unavailable",
            Err(_) => "error",
        };
        metrics::counter!(SEARCHES_TOTAL, "kind" => "room", "result" => label).increment(1);
        let available = result?;
        tracing::debug!("room {room_id} {stay:?}: available={available}");
        Ok(available)
    }

    /// Every room free for all of `[start, end)`, sorted by id. An empty list
    /// means nothing is free; a failed query is an error.
    pub async fn search(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<Room>, BookingError> {
        let stay = Stay::new(start, end)?;
        let result = bounded(
            self.timeout,
            "search_available_rooms",
            self.repo.search_available_rooms(&stay),
        )
        .await;
        let label = match &result {
            Ok(rooms) if rooms.is_empty() => "empty",
            Ok(_) => "found",
            Err(_) => "error",
        };
        metrics::counter!(SEARCHES_TOTAL, "kind" => "all", "result" => label).increment(1);
        Ok(result?)
    }
}
