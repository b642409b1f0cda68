use async_trait::async_trait;

use crate::engine::Engine;
use crate::model::*;

use super::{RepoError, Repository, Txn};

#[async_trait]
impl Repository for Engine {
    async fn room_is_available(&self, room_id: RoomId, stay: &Stay) -> Result<bool, RepoError> {
        Ok(Engine::room_is_available(self, room_id, stay).await?)
    }

    async fn search_available_rooms(&self, stay: &Stay) -> Result<Vec<Room>, RepoError> {
        Ok(Engine::search_available_rooms(self, stay).await?)
    }

    async fn get_room_by_id(&self, room_id: RoomId) -> Result<Room, RepoError> {
        self.get_room(room_id).await.ok_or(RepoError::NotFound(room_id))
    }

    async fn insert_reservation(&self, txn: &mut Txn, reservation: &Reservation) -> Result<ReservationId, RepoError> {
        txn.stage_reservation(reservation)
    }

    async fn insert_room_restriction(&self, txn: &mut Txn, restriction: &RoomRestriction) -> Result<(), RepoError> {
        txn.stage_restriction(restriction)
    }

    async fn commit(&self, txn: Txn) -> Result<(), RepoError> {
        let (reservations, restrictions) = txn.into_parts();
        Ok(Engine::commit(self, reservations, restrictions).await?)
    }

    async fn get_reservation(&self, id: ReservationId) -> Result<Reservation, RepoError> {
        Engine::get_reservation(self, id).ok_or(RepoError::ReservationNotFound(id))
    }

    async fn set_processed(&self, id: ReservationId, processed: bool) -> Result<(), RepoError> {
        Ok(Engine::set_processed(self, id, processed).await?)
    }

    async fn delete_reservation(&self, id: ReservationId) -> Result<RoomId, RepoError> {
        Ok(Engine::delete_reservation(self, id).await?)
    }

    async fn delete_block(&self, id: RestrictionId) -> Result<RoomId, RepoError> {
        Ok(Engine::delete_block(self, id).await?)
    }

    async fn room_restrictions(&self, room_id: RoomId, window: &Stay) -> Result<Vec<RoomRestriction>, RepoError> {
        Ok(Engine::room_restrictions(self, room_id, window).await?)
    }
}
