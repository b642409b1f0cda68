//! Storage seam for the booking engine.
//!
//! Two backends implement [`Repository`]: the durable WAL-backed [`Engine`]
//! and [`memory::MemoryRepository`], a deterministic store with fault
//! injection for tests. Writes are staged in a [`Txn`] and applied all at once
//! by [`Repository::commit`]; a `Txn` dropped without commit leaves no trace.
//!
//! [`Engine`]: crate::engine::Engine

pub mod durable;
pub mod memory;

use async_trait::async_trait;
use ulid::Ulid;

use crate::engine::{EngineError, now_ms};
use crate::limits::MAX_TXN_WRITES;
use crate::model::*;

pub use memory::{Fault, FaultMode, FaultPoint, MemoryRepository};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoError {
    NotFound(RoomId),
    ReservationNotFound(Ulid),
    RestrictionNotFound(Ulid),
    /// The staged write overlaps this existing restriction.
    Conflict(Ulid),
    Invalid(&'static str),
    LimitExceeded(&'static str),
    Storage(String),
    Injected(FaultPoint),
}

impl std::fmt::Display for RepoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepoError::NotFound(id) => write!(f, "room not found: {id}"),
            RepoError::ReservationNotFound(id) => write!(f, "reservation not found: {id}"),
            RepoError::RestrictionNotFound(id) => write!(f, "restriction not found: {id}"),
            RepoError::Conflict(id) => write!(f, "conflict with restriction {id}"),
            RepoError::Invalid(msg) => write!(f, "invalid: {msg}"),
            RepoError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            RepoError::Storage(msg) => write!(f, "storage error: {msg}"),
            RepoError::Injected(point) => write!(f, "injected failure at {point:?}"),
        }
    }
}

impl std::error::Error for RepoError {}

impl From<EngineError> for RepoError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::RoomNotFound(id) => RepoError::NotFound(id),
            EngineError::RoomExists(_) => RepoError::Invalid("room already exists"),
            EngineError::ReservationNotFound(id) => RepoError::ReservationNotFound(id),
            EngineError::RestrictionNotFound(id) => RepoError::RestrictionNotFound(id),
            EngineError::Conflict(id) => RepoError::Conflict(id),
            EngineError::Invalid(msg) => RepoError::Invalid(msg),
            EngineError::LimitExceeded(msg) => RepoError::LimitExceeded(msg),
            EngineError::WalError(msg) => RepoError::Storage(msg),
        }
    }
}

/// Unit of work: writes staged by `insert_*`, applied by `commit`.
#[derive(Debug, Default)]
pub struct Txn {
    reservations: Vec<Reservation>,
    restrictions: Vec<RoomRestriction>,
}

impl Txn {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reservations.len() + self.restrictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every room a commit of this unit would write to.
    pub fn rooms(&self) -> Vec<RoomId> {
        let mut rooms: Vec<RoomId> = self
            .reservations
            .iter()
            .map(|r| r.room_id)
            .chain(self.restrictions.iter().map(|r| r.room_id))
            .collect();
        rooms.sort_unstable();
        rooms.dedup();
        rooms
    }

    /// Stage a reservation under a freshly generated id, stamped now.
    pub(crate) fn stage_reservation(&mut self, reservation: &Reservation) -> Result<ReservationId, RepoError> {
        self.check_capacity()?;
        let now = now_ms();
        let id = Ulid::new();
        self.reservations.push(Reservation {
            id,
            created_at: now,
            updated_at: now,
            ..reservation.clone()
        });
        Ok(id)
    }

    pub(crate) fn stage_restriction(&mut self, restriction: &RoomRestriction) -> Result<(), RepoError> {
        self.check_capacity()?;
        self.restrictions.push(restriction.clone());
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (Vec<Reservation>, Vec<RoomRestriction>) {
        (self.reservations, self.restrictions)
    }

    fn check_capacity(&self) -> Result<(), RepoError> {
        if self.len() >= MAX_TXN_WRITES {
            return Err(RepoError::LimitExceeded("too many writes in one commit"));
        }
        Ok(())
    }
}

#[async_trait]
pub trait Repository: Send + Sync {
    /// True iff no restriction on the room overlaps `stay`.
    async fn room_is_available(&self, room_id: RoomId, stay: &Stay) -> Result<bool, RepoError>;

    /// Rooms with nothing overlapping `stay`, sorted by id.
    async fn search_available_rooms(&self, stay: &Stay) -> Result<Vec<Room>, RepoError>;

    async fn get_room_by_id(&self, room_id: RoomId) -> Result<Room, RepoError>;

    /// Stage `reservation` and return the id it will be stored under.
    async fn insert_reservation(&self, txn: &mut Txn, reservation: &Reservation) -> Result<ReservationId, RepoError>;

    async fn insert_room_restriction(&self, txn: &mut Txn, restriction: &RoomRestriction) -> Result<(), RepoError>;

    /// Apply everything staged in `txn`, or nothing. Overlap is re-checked
    /// here against the current state of every touched room.
    async fn commit(&self, txn: Txn) -> Result<(), RepoError>;

    async fn get_reservation(&self, id: ReservationId) -> Result<Reservation, RepoError>;

    async fn set_processed(&self, id: ReservationId, processed: bool) -> Result<(), RepoError>;

    /// Remove a reservation and its restriction. Returns the room it was on.
    async fn delete_reservation(&self, id: ReservationId) -> Result<RoomId, RepoError>;

    /// Remove a manual block. Returns the room it was on.
    async fn delete_block(&self, id: RestrictionId) -> Result<RoomId, RepoError>;

    /// Restrictions on a room overlapping `window`, in start order.
    async fn room_restrictions(&self, room_id: RoomId, window: &Stay) -> Result<Vec<RoomRestriction>, RepoError>;
}
