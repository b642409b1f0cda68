use crate::model::*;

use super::conflict::validate_query_window;
use super::{Engine, EngineError};

impl Engine {
    pub async fn get_room(&self, id: RoomId) -> Option<Room> {
        let rs = self.get_room_state(id)?;
        let guard = rs.read().await;
        Some(guard.room.clone())
    }

    pub async fn list_rooms(&self) -> Vec<Room> {
        let mut states: Vec<_> = self.state.iter().map(|e| (*e.key(), e.value().clone())).collect();
        states.sort_unstable_by_key(|(id, _)| *id);
        let mut rooms = Vec::with_capacity(states.len());
        for (_, rs) in states {
            rooms.push(rs.read().await.room.clone());
        }
        rooms
    }

    /// True iff nothing on the room overlaps `stay`.
    pub async fn room_is_available(&self, room_id: RoomId, stay: &Stay) -> Result<bool, EngineError> {
        validate_query_window(stay)?;
        let rs = self
            .get_room_state(room_id)
            .ok_or(EngineError::RoomNotFound(room_id))?;
        let guard = rs.read().await;
        Ok(guard.is_free(stay))
    }

    /// Rooms with no restriction overlapping `stay`, sorted by id.
    pub async fn search_available_rooms(&self, stay: &Stay) -> Result<Vec<Room>, EngineError> {
        validate_query_window(stay)?;
        // Clone the Arcs first: DashMap shard guards must not live across an await.
        let mut states: Vec<_> = self.state.iter().map(|e| (*e.key(), e.value().clone())).collect();
        states.sort_unstable_by_key(|(id, _)| *id);

        let mut free = Vec::new();
        for (_, rs) in states {
            let guard = rs.read().await;
            if guard.is_free(stay) {
                free.push(guard.room.clone());
            }
        }
        Ok(free)
    }

    pub fn get_reservation(&self, id: ReservationId) -> Option<Reservation> {
        self.reservations.get(&id).map(|r| r.value().clone())
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    /// Restrictions on a room overlapping `window`, in start order.
    pub async fn room_restrictions(&self, room_id: RoomId, window: &Stay) -> Result<Vec<RoomRestriction>, EngineError> {
        validate_query_window(window)?;
        let rs = self
            .get_room_state(room_id)
            .ok_or(EngineError::RoomNotFound(room_id))?;
        let guard = rs.read().await;
        Ok(guard.overlapping(window).cloned().collect())
    }
}
