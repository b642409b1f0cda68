use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::engine::{check_batch_conflicts, now_ms, validate_query_window, validate_stay};
use crate::model::*;

use super::{RepoError, Repository, Txn};

/// Repository calls a [`Fault`] can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    RoomIsAvailable,
    SearchAvailableRooms,
    GetRoom,
    InsertReservation,
    InsertRoomRestriction,
    Commit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultMode {
    /// Return `RepoError::Injected` immediately.
    Fail,
    /// Never complete. Exercises caller timeouts.
    Stall,
}

/// A failure armed on a repository call. With `room` set, only calls touching
/// that room trip it; calls with no room (searches) only trip room-less faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fault {
    pub point: FaultPoint,
    pub mode: FaultMode,
    pub room: Option<RoomId>,
}

impl Fault {
    pub fn fail(point: FaultPoint) -> Self {
        Self {
            point,
            mode: FaultMode::Fail,
            room: None,
        }
    }

    pub fn stall(point: FaultPoint) -> Self {
        Self {
            point,
            mode: FaultMode::Stall,
            room: None,
        }
    }

    pub fn on_room(mut self, room: RoomId) -> Self {
        self.room = Some(room);
        self
    }
}

#[derive(Default)]
struct MemoryState {
    rooms: BTreeMap<RoomId, RoomState>,
    reservations: BTreeMap<ReservationId, Reservation>,
}

/// Deterministic in-process store. Same conflict rules as the durable engine,
/// nothing persisted, and armed faults instead of magic ids.
#[derive(Default)]
pub struct MemoryRepository {
    state: RwLock<MemoryState>,
    faults: Mutex<Vec<Fault>>,
}

impl MemoryRepository {
    pub fn new(rooms: impl IntoIterator<Item = Room>) -> Self {
        let rooms = rooms
            .into_iter()
            .map(|room| (room.id, RoomState::new(room)))
            .collect();
        Self {
            state: RwLock::new(MemoryState {
                rooms,
                reservations: BTreeMap::new(),
            }),
            faults: Mutex::new(Vec::new()),
        }
    }

    pub fn inject(&self, fault: Fault) {
        self.faults.lock().unwrap_or_else(|e| e.into_inner()).push(fault);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub async fn reservation_count(&self) -> usize {
        self.state.read().await.reservations.len()
    }

    pub async fn restriction_count(&self) -> usize {
        self.state
            .read()
            .await
            .rooms
            .values()
            .map(|rs| rs.restrictions.len())
            .sum()
    }

    fn armed(&self, point: FaultPoint, rooms: &[RoomId]) -> Option<FaultMode> {
        let faults = self.faults.lock().unwrap_or_else(|e| e.into_inner());
        faults
            .iter()
            .find(|f| {
                f.point == point
                    && match f.room {
                        None => true,
                        Some(room) => rooms.contains(&room),
                    }
            })
            .map(|f| f.mode)
    }

    async fn trip(&self, point: FaultPoint, rooms: &[RoomId]) -> Result<(), RepoError> {
        match self.armed(point, rooms) {
            None => Ok(()),
            Some(FaultMode::Fail) => {
                tracing::debug!("injected failure at {point:?}");
                Err(RepoError::Injected(point))
            }
            Some(FaultMode::Stall) => {
                tracing::debug!("injected stall at {point:?}");
                std::future::pending().await
            }
        }
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn room_is_available(&self, room_id: RoomId, stay: &Stay) -> Result<bool, RepoError> {
        self.trip(FaultPoint::RoomIsAvailable, &[room_id]).await?;
        validate_query_window(stay)?;
        let state = self.state.read().await;
        let rs = state.rooms.get(&room_id).ok_or(RepoError::NotFound(room_id))?;
        Ok(rs.is_free(stay))
    }

    async fn search_available_rooms(&self, stay: &Stay) -> Result<Vec<Room>, RepoError> {
        self.trip(FaultPoint::SearchAvailableRooms, &[]).await?;
        validate_query_window(stay)?;
        let state = self.state.read().await;
        Ok(state
            .rooms
            .values()
            .filter(|rs| rs.is_free(stay))
            .map(|rs| rs.room.clone())
            .collect())
    }

    async fn get_room_by_id(&self, room_id: RoomId) -> Result<Room, RepoError> {
        self.trip(FaultPoint::GetRoom, &[room_id]).await?;
        let state = self.state.read().await;
        state
            .rooms
            .get(&room_id)
            .map(|rs| rs.room.clone())
            .ok_or(RepoError::NotFound(room_id))
    }

    async fn insert_reservation(&self, txn: &mut Txn, reservation: &Reservation) -> Result<ReservationId, RepoError> {
        self.trip(FaultPoint::InsertReservation, &[reservation.room_id]).await?;
        txn.stage_reservation(reservation)
    }

    async fn insert_room_restriction(&self, txn: &mut Txn, restriction: &RoomRestriction) -> Result<(), RepoError> {
        self.trip(FaultPoint::InsertRoomRestriction, &[restriction.room_id]).await?;
        txn.stage_restriction(restriction)
    }

    async fn commit(&self, txn: Txn) -> Result<(), RepoError> {
        self.trip(FaultPoint::Commit, &txn.rooms()).await?;
        let (reservations, restrictions) = txn.into_parts();
        if reservations.is_empty() && restrictions.is_empty() {
            return Ok(());
        }

        // One write lock for the whole store: the checks below and the apply
        // see the same state.
        let mut state = self.state.write().await;

        let mut staged_ids = HashSet::new();
        for reservation in &reservations {
            validate_stay(&reservation.stay)?;
            if !state.rooms.contains_key(&reservation.room_id) {
                return Err(RepoError::NotFound(reservation.room_id));
            }
            if state.reservations.contains_key(&reservation.id) || !staged_ids.insert(reservation.id) {
                return Err(RepoError::Invalid("duplicate reservation id"));
            }
        }
        for restriction in &restrictions {
            validate_stay(&restriction.stay)?;
            let rs = state
                .rooms
                .get(&restriction.room_id)
                .ok_or(RepoError::NotFound(restriction.room_id))?;
            match (restriction.kind, restriction.reservation_id) {
                (RestrictionKind::Block, None) => {}
                (RestrictionKind::Block, Some(_)) => {
                    return Err(RepoError::Invalid("manual block linked to a reservation"));
                }
                (RestrictionKind::Reservation, None) => {
                    return Err(RepoError::Invalid("guest restriction without reservation"));
                }
                (RestrictionKind::Reservation, Some(rid)) => {
                    let linked_room = reservations
                        .iter()
                        .chain(state.reservations.values())
                        .find(|r| r.id == rid)
                        .map(|r| r.room_id)
                        .ok_or(RepoError::ReservationNotFound(rid))?;
                    if linked_room != restriction.room_id {
                        return Err(RepoError::Invalid("restriction room differs from its reservation"));
                    }
                }
            }
            if let Some(existing) = rs.find_conflict(restriction) {
                return Err(RepoError::Conflict(existing));
            }
        }
        check_batch_conflicts(&restrictions)?;

        for reservation in reservations {
            state.reservations.insert(reservation.id, reservation);
        }
        for restriction in restrictions {
            if let Some(rs) = state.rooms.get_mut(&restriction.room_id) {
                rs.insert_restriction(restriction);
            }
        }
        Ok(())
    }

    async fn get_reservation(&self, id: ReservationId) -> Result<Reservation, RepoError> {
        let state = self.state.read().await;
        state
            .reservations
            .get(&id)
            .cloned()
            .ok_or(RepoError::ReservationNotFound(id))
    }

    async fn set_processed(&self, id: ReservationId, processed: bool) -> Result<(), RepoError> {
        let mut state = self.state.write().await;
        let reservation = state
            .reservations
            .get_mut(&id)
            .ok_or(RepoError::ReservationNotFound(id))?;
        reservation.processed = processed;
        reservation.updated_at = now_ms();
        Ok(())
    }

    async fn delete_reservation(&self, id: ReservationId) -> Result<RoomId, RepoError> {
        let mut state = self.state.write().await;
        let reservation = state
            .reservations
            .remove(&id)
            .ok_or(RepoError::ReservationNotFound(id))?;
        if let Some(rs) = state.rooms.get_mut(&reservation.room_id) {
            rs.restrictions.retain(|r| r.reservation_id != Some(id));
        }
        Ok(reservation.room_id)
    }

    async fn delete_block(&self, id: RestrictionId) -> Result<RoomId, RepoError> {
        let mut state = self.state.write().await;
        let rs = state
            .rooms
            .values_mut()
            .find(|rs| rs.restrictions.iter().any(|r| r.id == id))
            .ok_or(RepoError::RestrictionNotFound(id))?;
        if rs.restrictions.iter().any(|r| r.id == id && r.is_guest()) {
            return Err(RepoError::Invalid("not a manual block"));
        }
        rs.remove_restriction(id);
        Ok(rs.room.id)
    }

    async fn room_restrictions(&self, room_id: RoomId, window: &Stay) -> Result<Vec<RoomRestriction>, RepoError> {
        validate_query_window(window)?;
        let state = self.state.read().await;
        let rs = state.rooms.get(&room_id).ok_or(RepoError::NotFound(room_id))?;
        Ok(rs.overlapping(window).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn repo() -> MemoryRepository {
        MemoryRepository::new([
            Room { id: 1, name: "General's Quarters".into() },
            Room { id: 2, name: "Major's Suite".into() },
        ])
    }

    fn stay(start: &str, end: &str) -> Stay {
        Stay::parse(start, end).unwrap()
    }

    fn reservation(room_id: RoomId, stay: Stay) -> Reservation {
        Reservation {
            id: ReservationId::nil(),
            guest: Guest::default(),
            stay,
            room_id,
            processed: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn restriction_for(id: ReservationId, room_id: RoomId, stay: Stay) -> RoomRestriction {
        RoomRestriction {
            id: RestrictionId::new(),
            stay,
            room_id,
            reservation_id: Some(id),
            kind: RestrictionKind::Reservation,
            created_at: 0,
        }
    }

    async fn book(repo: &MemoryRepository, room_id: RoomId, stay: Stay) -> Result<ReservationId, RepoError> {
        let mut txn = Txn::new();
        let id = repo.insert_reservation(&mut txn, &reservation(room_id, stay)).await?;
        repo.insert_room_restriction(&mut txn, &restriction_for(id, room_id, stay))
            .await?;
        repo.commit(txn).await?;
        Ok(id)
    }

    #[tokio::test]
    async fn memory_books_and_searches() {
        let repo = repo();
        let s = stay("2050-01-01", "2050-01-02");
        assert_eq!(repo.search_available_rooms(&s).await.unwrap().len(), 2);

        book(&repo, 1, s).await.unwrap();
        assert!(!repo.room_is_available(1, &s).await.unwrap());
        let free = repo.search_available_rooms(&s).await.unwrap();
        assert_eq!(free, vec![Room { id: 2, name: "Major's Suite".into() }]);
        assert_eq!(repo.reservation_count().await, 1);
        assert_eq!(repo.restriction_count().await, 1);
    }

    #[tokio::test]
    async fn memory_rejects_overlap_at_commit() {
        let repo = repo();
        book(&repo, 1, stay("2050-01-01", "2050-01-05")).await.unwrap();
        let result = book(&repo, 1, stay("2050-01-04", "2050-01-06")).await;
        assert!(matches!(result, Err(RepoError::Conflict(_))));
        assert_eq!(repo.reservation_count().await, 1);
        assert_eq!(repo.restriction_count().await, 1);

        book(&repo, 1, stay("2050-01-05", "2050-01-06")).await.unwrap();
    }

    #[tokio::test]
    async fn memory_injected_restriction_failure_leaves_nothing() {
        let repo = repo();
        repo.inject(Fault::fail(FaultPoint::InsertRoomRestriction));
        let result = book(&repo, 1, stay("2050-01-01", "2050-01-02")).await;
        assert_eq!(result, Err(RepoError::Injected(FaultPoint::InsertRoomRestriction)));
        assert_eq!(repo.reservation_count().await, 0);
        assert_eq!(repo.restriction_count().await, 0);

        repo.clear_faults();
        book(&repo, 1, stay("2050-01-01", "2050-01-02")).await.unwrap();
    }

    #[tokio::test]
    async fn memory_room_scoped_fault() {
        let repo = repo();
        repo.inject(Fault::fail(FaultPoint::RoomIsAvailable).on_room(2));
        let s = stay("2050-01-01", "2050-01-02");
        assert!(repo.room_is_available(1, &s).await.unwrap());
        assert_eq!(
            repo.room_is_available(2, &s).await,
            Err(RepoError::Injected(FaultPoint::RoomIsAvailable))
        );
    }

    #[tokio::test]
    async fn memory_stall_never_completes() {
        let repo = repo();
        repo.inject(Fault::stall(FaultPoint::SearchAvailableRooms));
        let s = stay("2050-01-01", "2050-01-02");
        let result = tokio::time::timeout(Duration::from_millis(20), repo.search_available_rooms(&s)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn memory_blocks_and_admin_writes() {
        let repo = repo();
        let block = RoomRestriction {
            id: RestrictionId::new(),
            stay: stay("2050-02-01", "2050-02-05"),
            room_id: 2,
            reservation_id: None,
            kind: RestrictionKind::Block,
            created_at: 0,
        };
        let block_id = block.id;
        let mut txn = Txn::new();
        repo.insert_room_restriction(&mut txn, &block).await.unwrap();
        repo.commit(txn).await.unwrap();

        let conflict = book(&repo, 2, stay("2050-02-04", "2050-02-06")).await;
        assert!(matches!(conflict, Err(RepoError::Conflict(id)) if id == block_id));

        let id = book(&repo, 1, stay("2050-02-01", "2050-02-02")).await.unwrap();
        repo.set_processed(id, true).await.unwrap();
        assert!(repo.get_reservation(id).await.unwrap().processed);

        assert_eq!(repo.delete_block(block_id).await, Ok(2));
        assert_eq!(repo.delete_reservation(id).await, Ok(1));
        assert_eq!(repo.restriction_count().await, 0);
        assert_eq!(repo.get_reservation(id).await, Err(RepoError::ReservationNotFound(id)));
    }
}
