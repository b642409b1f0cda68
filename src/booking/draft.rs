use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;

use crate::model::*;
use crate::observability::{DRAFTS_ACTIVE, DRAFTS_EXPIRED_TOTAL};

/// Opaque session key supplied by the request layer.
pub type SessionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DraftStage {
    Searching,
    RoomChosen,
    DetailsEntered,
    /// Stored under this id. Kept only so the summary can be shown once.
    Committed(ReservationId),
}

/// A reservation in progress, held per session until it is committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftReservation {
    pub guest: Guest,
    pub stay: Stay,
    pub room_id: RoomId,
    pub room_name: Option<String>,
    pub stage: DraftStage,
}

impl DraftReservation {
    pub fn searching(stay: Stay) -> Self {
        Self {
            guest: Guest::default(),
            stay,
            room_id: NO_ROOM,
            room_name: None,
            stage: DraftStage::Searching,
        }
    }

    pub fn for_room(stay: Stay, room_id: RoomId, room_name: String) -> Self {
        Self {
            guest: Guest::default(),
            stay,
            room_id,
            room_name: Some(room_name),
            stage: DraftStage::RoomChosen,
        }
    }

    /// Still waiting to be committed.
    pub fn is_pending(&self) -> bool {
        !matches!(self.stage, DraftStage::Committed(_))
    }

    pub fn committed_id(&self) -> Option<ReservationId> {
        match self.stage {
            DraftStage::Committed(id) => Some(id),
            _ => None,
        }
    }
}

struct Entry {
    draft: DraftReservation,
    touched_at: Instant,
}

/// One draft slot per session. Sessions never contend with each other beyond
/// sharing a map shard.
#[derive(Default)]
pub struct DraftStore {
    slots: DashMap<SessionId, Entry>,
}

impl DraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the session's draft.
    pub fn put(&self, session: &str, draft: DraftReservation) {
        self.slots.insert(
            session.to_string(),
            Entry {
                draft,
                touched_at: Instant::now(),
            },
        );
        metrics::gauge!(DRAFTS_ACTIVE).set(self.slots.len() as f64);
    }

    pub fn get(&self, session: &str) -> Option<DraftReservation> {
        self.slots.get(session).map(|e| e.draft.clone())
    }

    /// The session's draft if it is still waiting to be committed.
    pub fn pending(&self, session: &str) -> Option<DraftReservation> {
        self.get(session).filter(DraftReservation::is_pending)
    }

    pub fn clear(&self, session: &str) {
        self.slots.remove(session);
        metrics::gauge!(DRAFTS_ACTIVE).set(self.slots.len() as f64);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Drop drafts not written for longer than `ttl`. Returns how many went.
    pub fn expire_idle(&self, now: Instant, ttl: Duration) -> usize {
        let before = self.slots.len();
        self.slots
            .retain(|_, entry| now.saturating_duration_since(entry.touched_at) <= ttl);
        let expired = before.saturating_sub(self.slots.len());
        if expired > 0 {
            metrics::counter!(DRAFTS_EXPIRED_TOTAL).increment(expired as u64);
            metrics::gauge!(DRAFTS_ACTIVE).set(self.slots.len() as f64);
        }
        expired
    }
}
