//! Administrator actions on stored reservations and the room calendar.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::info;
use ulid::Ulid;

use crate::booking::{BookingError, bounded};
use crate::engine::{free_windows, now_ms};
use crate::model::*;
use crate::observability::ADMIN_ACTIONS_TOTAL;
use crate::repository::{RepoError, Repository, Txn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminError {
    NotFound(Ulid),
    RoomNotFound(RoomId),
    /// The block would cover nights already booked by a guest.
    Conflict(Ulid),
    Invalid(String),
    Storage(String),
}

impl std::fmt::Display for AdminError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdminError::NotFound(id) => write!(f, "not found: {id}"),
            AdminError::RoomNotFound(id) => write!(f, "room not found: {id}"),
            AdminError::Conflict(id) => write!(f, "conflicts with restriction {id}"),
            AdminError::Invalid(msg) => write!(f, "invalid: {msg}"),
            AdminError::Storage(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for AdminError {}

impl From<RepoError> for AdminError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound(id) => AdminError::RoomNotFound(id),
            RepoError::ReservationNotFound(id) | RepoError::RestrictionNotFound(id) => AdminError::NotFound(id),
            RepoError::Conflict(id) => AdminError::Conflict(id),
            RepoError::Invalid(msg) | RepoError::LimitExceeded(msg) => AdminError::Invalid(msg.to_string()),
            other => AdminError::Storage(other.to_string()),
        }
    }
}

impl From<StayError> for AdminError {
    fn from(e: StayError) -> Self {
        AdminError::Invalid(BookingError::from(e).to_string())
    }
}

/// One room over a window: what is on it and which nights are still open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomCalendar {
    pub room: Room,
    pub window: Stay,
    pub restrictions: Vec<RoomRestriction>,
    pub free: Vec<Stay>,
}

pub struct Admin {
    repo: Arc<dyn Repository>,
    timeout: Duration,
}

impl Admin {
    pub fn new(repo: Arc<dyn Repository>, timeout: Duration) -> Self {
        Self { repo, timeout }
    }

    pub async fn show(&self, id: ReservationId) -> Result<Reservation, AdminError> {
        Ok(bounded(self.timeout, "get_reservation", self.repo.get_reservation(id)).await?)
    }

    pub async fn mark_processed(&self, id: ReservationId, processed: bool) -> Result<(), AdminError> {
        bounded(self.timeout, "set_processed", self.repo.set_processed(id, processed)).await?;
        metrics::counter!(ADMIN_ACTIONS_TOTAL, "action" => "mark_processed").increment(1);
        info!("reservation {id} processed={processed}");
        Ok(())
    }

    /// Delete a reservation and free its nights.
    pub async fn cancel(&self, id: ReservationId) -> Result<RoomId, AdminError> {
        let room_id = bounded(self.timeout, "delete_reservation", self.repo.delete_reservation(id)).await?;
        metrics::counter!(ADMIN_ACTIONS_TOTAL, "action" => "cancel").increment(1);
        info!("reservation {id} on room {room_id} cancelled");
        Ok(room_id)
    }

    /// Close a room for `[start, end)`. Fails if a guest already holds any of
    /// those nights; other blocks may overlap.
    pub async fn block(&self, room_id: RoomId, start: NaiveDate, end: NaiveDate) -> Result<RestrictionId, AdminError> {
        let stay = Stay::new(start, end)?;
        let restriction = RoomRestriction {
            id: Ulid::new(),
            stay,
            room_id,
            reservation_id: None,
            kind: RestrictionKind::Block,
            created_at: now_ms(),
        };
        let mut txn = Txn::new();
        bounded(
            self.timeout,
            "insert_room_restriction",
            self.repo.insert_room_restriction(&mut txn, &restriction),
        )
        .await?;
        bounded(self.timeout, "commit", self.repo.commit(txn)).await?;
        metrics::counter!(ADMIN_ACTIONS_TOTAL, "action" => "block").increment(1);
        info!("room {room_id} blocked {stay:?} as {}", restriction.id);
        Ok(restriction.id)
    }

    pub async fn unblock(&self, id: RestrictionId) -> Result<RoomId, AdminError> {
        let room_id = bounded(self.timeout, "delete_block", self.repo.delete_block(id)).await?;
        metrics::counter!(ADMIN_ACTIONS_TOTAL, "action" => "unblock").increment(1);
        info!("block {id} on room {room_id} removed");
        Ok(room_id)
    }

    pub async fn calendar(&self, room_id: RoomId, start: NaiveDate, end: NaiveDate) -> Result<RoomCalendar, AdminError> {
        let window = Stay::new(start, end)?;
        let room = bounded(self.timeout, "get_room_by_id", self.repo.get_room_by_id(room_id)).await?;
        let restrictions = bounded(
            self.timeout,
            "room_restrictions",
            self.repo.room_restrictions(room_id, &window),
        )
        .await?;
        let free = free_windows(&window, &restrictions);
        Ok(RoomCalendar {
            room,
            window,
            restrictions,
            free,
        })
    }
}
