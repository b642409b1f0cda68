use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use ulid::Ulid;

use crate::engine::now_ms;
use crate::model::*;
use crate::observability::COMMITS_TOTAL;
use crate::repository::{RepoError, Repository, Txn};

use super::{BookingError, DraftReservation, bounded};

/// Turns a validated draft into a stored reservation and its room
/// restriction, both or neither.
pub struct BookingTx {
    repo: Arc<dyn Repository>,
    timeout: Duration,
}

fn failed(e: RepoError) -> BookingError {
    BookingError::PersistenceFailure(e.to_string())
}

impl BookingTx {
    pub fn new(repo: Arc<dyn Repository>, timeout: Duration) -> Self {
        Self { repo, timeout }
    }

    pub async fn commit(&self, draft: &DraftReservation) -> Result<ReservationId, BookingError> {
        let result = self.try_commit(draft).await;
        let status = match &result {
            Ok(id) => {
                info!("reservation {id} committed for room {} {:?}", draft.room_id, draft.stay);
                "ok"
            }
            Err(e) if e.is_system() => {
                warn!("reservation for room {} {:?} failed: {e}", draft.room_id, draft.stay);
                "error"
            }
            Err(e) => {
                warn!("reservation for room {} rejected: {e}", draft.room_id);
                "rejected"
            }
        };
        metrics::counter!(COMMITS_TOTAL, "status" => status).increment(1);
        result
    }

    async fn try_commit(&self, draft: &DraftReservation) -> Result<ReservationId, BookingError> {
        if draft.room_id == NO_ROOM {
            return Err(BookingError::InvalidCandidate("no room chosen"));
        }
        if !draft.stay.is_well_formed() {
            return Err(BookingError::InvalidCandidate("stay does not start before it ends"));
        }

        bounded(self.timeout, "get_room_by_id", self.repo.get_room_by_id(draft.room_id)).await?;

        let mut txn = Txn::new();
        let now = now_ms();
        let reservation = Reservation {
            id: Ulid::nil(),
            guest: draft.guest.clone(),
            stay: draft.stay,
            room_id: draft.room_id,
            processed: false,
            created_at: now,
            updated_at: now,
        };
        let reservation_id = bounded(
            self.timeout,
            "insert_reservation",
            self.repo.insert_reservation(&mut txn, &reservation),
        )
        .await
        .map_err(failed)?;

        let restriction = RoomRestriction {
            id: Ulid::new(),
            stay: draft.stay,
            room_id: draft.room_id,
            reservation_id: Some(reservation_id),
            kind: RestrictionKind::Reservation,
            created_at: now,
        };
        bounded(
            self.timeout,
            "insert_room_restriction",
            self.repo.insert_room_restriction(&mut txn, &restriction),
        )
        .await
        .map_err(failed)?;

        bounded(self.timeout, "commit", self.repo.commit(txn))
            .await
            .map_err(failed)?;
        Ok(reservation_id)
    }
}
