use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use tokio::sync::{RwLock, oneshot};

use crate::limits::*;
use crate::model::*;

use super::conflict::{check_batch_conflicts, check_no_conflict, now_ms, validate_stay};
use super::{Engine, EngineError, RoomGuards, WalCommand, wal_append};

impl Engine {
    /// Register a new room. Creation holds the layout lock, so a compaction
    /// snapshot either includes the room or runs after it is logged.
    pub async fn create_room(&self, room: Room) -> Result<(), EngineError> {
        if room.id == NO_ROOM {
            return Err(EngineError::Invalid("room id 0 is reserved"));
        }
        if room.name.len() > MAX_ROOM_NAME_LEN {
            return Err(EngineError::LimitExceeded("room name too long"));
        }
        let layout = self.layout.clone().lock_owned().await;
        if self.state.len() >= MAX_ROOMS {
            return Err(EngineError::LimitExceeded("too many rooms"));
        }
        if self.state.contains_key(&room.id) {
            return Err(EngineError::RoomExists(room.id));
        }

        let wal_tx = self.wal_tx.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            let _layout = layout;
            let event = Event::RoomCreated { room: room.clone() };
            wal_append(&wal_tx, &event).await?;
            state.insert(room.id, Arc::new(RwLock::new(RoomState::new(room))));
            Ok::<(), EngineError>(())
        })
        .await
        .map_err(|e| EngineError::WalError(format!("write task failed: {e}")))?
    }

    /// Create every configured room the store does not know yet. Existing rooms
    /// keep their stored name. Returns how many were created.
    pub async fn seed_rooms(&self, rooms: &[Room]) -> Result<usize, EngineError> {
        let mut created = 0;
        for room in rooms {
            if self.state.contains_key(&room.id) {
                continue;
            }
            self.create_room(room.clone()).await?;
            created += 1;
        }
        Ok(created)
    }

    /// Atomically write staged reservations and restrictions.
    ///
    /// Overlap is checked here, under the write locks of every touched room,
    /// against the current state and within the batch. The whole batch is one
    /// WAL record: either all of it becomes visible or none of it does.
    pub async fn commit(
        &self,
        reservations: Vec<Reservation>,
        restrictions: Vec<RoomRestriction>,
    ) -> Result<(), EngineError> {
        if reservations.is_empty() && restrictions.is_empty() {
            return Ok(());
        }
        if reservations.len() + restrictions.len() > MAX_TXN_WRITES {
            return Err(EngineError::LimitExceeded("too many writes in one commit"));
        }

        let mut staged_ids = HashSet::new();
        for reservation in &reservations {
            validate_stay(&reservation.stay)?;
            if reservation.room_id == NO_ROOM {
                return Err(EngineError::Invalid("reservation has no room"));
            }
            if self.reservations.contains_key(&reservation.id) || !staged_ids.insert(reservation.id) {
                return Err(EngineError::Invalid("duplicate reservation id"));
            }
        }
        for restriction in &restrictions {
            validate_stay(&restriction.stay)?;
            match (restriction.kind, restriction.reservation_id) {
                (RestrictionKind::Block, None) => {}
                (RestrictionKind::Block, Some(_)) => {
                    return Err(EngineError::Invalid("manual block linked to a reservation"));
                }
                (RestrictionKind::Reservation, None) => {
                    return Err(EngineError::Invalid("guest restriction without reservation"));
                }
                (RestrictionKind::Reservation, Some(rid)) => {
                    let linked_room = reservations
                        .iter()
                        .find(|r| r.id == rid)
                        .map(|r| r.room_id)
                        .or_else(|| self.reservations.get(&rid).map(|r| r.room_id))
                        .ok_or(EngineError::ReservationNotFound(rid))?;
                    if linked_room != restriction.room_id {
                        return Err(EngineError::Invalid("restriction room differs from its reservation"));
                    }
                }
            }
            if self.restriction_to_room.contains_key(&restriction.id) {
                return Err(EngineError::Invalid("duplicate restriction id"));
            }
        }
        check_batch_conflicts(&restrictions)?;

        let guards = self
            .lock_rooms(
                reservations
                    .iter()
                    .map(|r| r.room_id)
                    .chain(restrictions.iter().map(|r| r.room_id)),
            )
            .await?;

        for restriction in &restrictions {
            let rs = &guards[&restriction.room_id];
            if rs.restrictions.len() >= MAX_RESTRICTIONS_PER_ROOM {
                return Err(EngineError::LimitExceeded("too many restrictions on room"));
            }
            check_no_conflict(rs, restriction)?;
        }

        let event = Event::Committed {
            reservations,
            restrictions,
        };
        self.persist_and_apply(guards, event).await
    }

    pub async fn set_processed(&self, id: ReservationId, processed: bool) -> Result<(), EngineError> {
        let (_, guards) = self.lock_reservation_room(id).await?;
        let event = Event::ReservationProcessed {
            id,
            processed,
            at: now_ms(),
        };
        self.persist_and_apply(guards, event).await
    }

    /// Remove a reservation together with its restriction. Returns the room id.
    pub async fn delete_reservation(&self, id: ReservationId) -> Result<RoomId, EngineError> {
        let (room_id, guards) = self.lock_reservation_room(id).await?;
        let event = Event::ReservationDeleted { id, room_id };
        self.persist_and_apply(guards, event).await?;
        Ok(room_id)
    }

    /// Remove a manual block. Guest restrictions go through `delete_reservation`.
    pub async fn delete_block(&self, id: RestrictionId) -> Result<RoomId, EngineError> {
        let room_id = self
            .restriction_to_room
            .get(&id)
            .map(|e| *e.value())
            .ok_or(EngineError::RestrictionNotFound(id))?;
        let guards = self.lock_rooms([room_id]).await?;
        let kind = guards[&room_id]
            .restrictions
            .iter()
            .find(|r| r.id == id)
            .map(|r| r.kind)
            .ok_or(EngineError::RestrictionNotFound(id))?;
        if kind != RestrictionKind::Block {
            return Err(EngineError::Invalid("not a manual block"));
        }
        let event = Event::BlockRemoved { id, room_id };
        self.persist_and_apply(guards, event).await?;
        Ok(room_id)
    }

    /// Lock the room of a reservation, re-checking it still exists once the
    /// lock is held.
    async fn lock_reservation_room(&self, id: ReservationId) -> Result<(RoomId, RoomGuards), EngineError> {
        let room_id = self
            .reservations
            .get(&id)
            .map(|r| r.room_id)
            .ok_or(EngineError::ReservationNotFound(id))?;
        let guards = self.lock_rooms([room_id]).await?;
        if !self.reservations.contains_key(&id) {
            return Err(EngineError::ReservationNotFound(id));
        }
        Ok((room_id, guards))
    }

    /// Rewrite the WAL with only the events needed to recreate current state:
    /// one `RoomCreated` per room, then one `Committed` per room carrying its
    /// reservations (processed flag included) and restrictions.
    ///
    /// Every room stays write-locked until the new file is in place. All
    /// reservation writes take a room lock and room creation takes the layout
    /// lock, so nothing can be appended to the old log after the snapshot.
    pub async fn compact_wal(&self) -> Result<(), EngineError> {
        let _layout = self.layout.lock().await;
        let room_ids: Vec<RoomId> = self.state.iter().map(|e| *e.key()).collect();
        let guards = self.lock_rooms(room_ids).await?;

        let mut by_room: BTreeMap<RoomId, Vec<Reservation>> = BTreeMap::new();
        for entry in self.reservations.iter() {
            by_room
                .entry(entry.room_id)
                .or_default()
                .push(entry.value().clone());
        }

        let mut events = Vec::with_capacity(guards.len() * 2);
        let mut committed = Vec::new();
        for guard in guards.values() {
            let room_id = guard.room.id;
            events.push(Event::RoomCreated {
                room: guard.room.clone(),
            });
            let mut reservations = by_room.remove(&room_id).unwrap_or_default();
            reservations.sort_by_key(|r| r.id);
            if !reservations.is_empty() || !guard.restrictions.is_empty() {
                committed.push(Event::Committed {
                    reservations,
                    restrictions: guard.restrictions.clone(),
                });
            }
        }
        events.extend(committed);

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
        let result = rx
            .await
            .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
            .map_err(|e| EngineError::WalError(e.to_string()));
        drop(guards);
        result
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
