mod availability;
mod conflict;
mod error;
mod mutations;
mod queries;

pub use availability::free_windows;
pub use conflict::now_ms;
pub(crate) use conflict::{check_batch_conflicts, validate_query_window, validate_stay};
use conflict::check_no_conflict;
pub use error::EngineError;

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedRwLockWriteGuard, RwLock, mpsc, oneshot};

use crate::model::*;

pub type SharedRoomState = Arc<RwLock<RoomState>>;

/// Write locks held for the duration of one mutation, keyed (and acquired) in
/// ascending room order.
pub(super) type RoomGuards = BTreeMap<RoomId, OwnedRwLockWriteGuard<RoomState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task owning the WAL. Appends that arrive while a flush is being
/// prepared share one fsync:
/// 1. Block for the first Append.
/// 2. Drain every Append already queued.
/// 3. One `flush_sync` for the batch, then answer every sender.
async fn wal_writer_loop(mut wal: crate::wal::Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_non_append(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }

        metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        if let Err(e) = &result {
            tracing::error!("WAL flush of {} events failed: {e}", batch.len());
        }
        for (_, tx) in batch {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = tx.send(r);
        }

        if let Some(cmd) = deferred {
            handle_non_append(&mut wal, cmd);
        }
    }
}

fn flush_batch(wal: &mut crate::wal::Wal, batch: &[(Event, oneshot::Sender<io::Result<()>>)]) -> io::Result<()> {
    let append_result = batch
        .iter()
        .try_for_each(|(event, _)| wal.append_buffered(event));
    // Flush even after a failed append so half-buffered bytes do not leak into
    // the next batch.
    let flush_result = wal.flush_sync();
    append_result.and(flush_result)
}

fn handle_non_append(wal: &mut crate::wal::Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = crate::wal::Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// The durable room store: rooms, their restrictions, and reservations, kept in
/// memory and rebuilt from the WAL at startup.
///
/// Maps are shared with detached write tasks, see `persist_and_apply`.
pub struct Engine {
    pub state: Arc<DashMap<RoomId, SharedRoomState>>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
    pub(super) reservations: Arc<DashMap<ReservationId, Reservation>>,
    /// Reverse lookup: restriction id → room id.
    pub(super) restriction_to_room: Arc<DashMap<RestrictionId, RoomId>>,
    /// Serializes room creation against compaction snapshots.
    pub(super) layout: Arc<Mutex<()>>,
}

/// Rooms whose state an event changes.
fn event_rooms(event: &Event) -> BTreeSet<RoomId> {
    match event {
        Event::RoomCreated { .. } | Event::ReservationProcessed { .. } => BTreeSet::new(),
        Event::Committed {
            reservations,
            restrictions,
        } => reservations
            .iter()
            .map(|r| r.room_id)
            .chain(restrictions.iter().map(|r| r.room_id))
            .collect(),
        Event::ReservationDeleted { room_id, .. } | Event::BlockRemoved { room_id, .. } => {
            BTreeSet::from([*room_id])
        }
    }
}

/// A replayed `Committed` record must fit the state rebuilt so far.
fn check_replayed_commit(guards: &RoomGuards, restrictions: &[RoomRestriction]) -> Result<(), EngineError> {
    check_batch_conflicts(restrictions)?;
    for restriction in restrictions {
        if let Some(rs) = guards.get(&restriction.room_id) {
            check_no_conflict(rs, restriction)?;
        }
    }
    Ok(())
}

/// Write event to the WAL via the background group-commit writer.
pub(super) async fn wal_append(wal_tx: &mpsc::Sender<WalCommand>, event: &Event) -> Result<(), EngineError> {
    let (tx, rx) = oneshot::channel();
    wal_tx
        .send(WalCommand::Append {
            event: event.clone(),
            response: tx,
        })
        .await
        .map_err(|_| EngineError::WalError("WAL writer shut down".into()))?;
    rx.await
        .map_err(|_| EngineError::WalError("WAL writer dropped response".into()))?
        .map_err(|e| EngineError::WalError(e.to_string()))
}

/// Apply an event to in-memory state. The caller holds write locks for
/// every room in `event_rooms(event)`; rooms missing from `guards` are skipped.
fn apply_event(
    reservations: &DashMap<ReservationId, Reservation>,
    restriction_to_room: &DashMap<RestrictionId, RoomId>,
    guards: &mut RoomGuards,
    event: &Event,
) {
    match event {
        Event::Committed {
            reservations: added,
            restrictions,
        } => {
            for reservation in added {
                reservations.insert(reservation.id, reservation.clone());
            }
            for restriction in restrictions {
                if let Some(rs) = guards.get_mut(&restriction.room_id) {
                    rs.insert_restriction(restriction.clone());
                    restriction_to_room.insert(restriction.id, restriction.room_id);
                }
            }
        }
        Event::ReservationProcessed { id, processed, at } => {
            if let Some(mut reservation) = reservations.get_mut(id) {
                reservation.processed = *processed;
                reservation.updated_at = *at;
            }
        }
        Event::ReservationDeleted { id, room_id } => {
            reservations.remove(id);
            if let Some(rs) = guards.get_mut(room_id) {
                let linked: Vec<RestrictionId> = rs
                    .restrictions
                    .iter()
                    .filter(|r| r.reservation_id == Some(*id))
                    .map(|r| r.id)
                    .collect();
                for restriction_id in linked {
                    rs.remove_restriction(restriction_id);
                    restriction_to_room.remove(&restriction_id);
                }
            }
        }
        Event::BlockRemoved { id, room_id } => {
            if let Some(rs) = guards.get_mut(room_id) {
                rs.remove_restriction(*id);
            }
            restriction_to_room.remove(id);
        }
        // Room creation is handled at the DashMap level.
        Event::RoomCreated { .. } => {}
    }
}

impl Engine {
    pub fn new(wal_path: PathBuf) -> io::Result<Self> {
        let events = crate::wal::Wal::recover(&wal_path)?;
        let wal = crate::wal::Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            state: Arc::new(DashMap::new()),
            wal_tx,
            reservations: Arc::new(DashMap::new()),
            restriction_to_room: Arc::new(DashMap::new()),
            layout: Arc::new(Mutex::new(())),
        };

        // Nothing else holds these locks yet. Blocking locks are off-limits
        // here: this runs inside the runtime.
        let mut skipped = 0;
        for event in &events {
            if let Event::RoomCreated { room } = event {
                engine
                    .state
                    .insert(room.id, Arc::new(RwLock::new(RoomState::new(room.clone()))));
                continue;
            }
            let mut guards = RoomGuards::new();
            for room_id in event_rooms(event) {
                match engine.get_room_state(room_id).map(|rs| rs.try_write_owned()) {
                    Some(Ok(guard)) => {
                        guards.insert(room_id, guard);
                    }
                    Some(Err(_)) => tracing::warn!("replay: room {room_id} locked; skipping its writes"),
                    None => tracing::warn!("WAL references unknown room {room_id}; skipping its writes"),
                }
            }
            if let Event::Committed { restrictions, .. } = event
                && let Err(e) = check_replayed_commit(&guards, restrictions)
            {
                tracing::warn!("replay: dropping committed record that does not fit stored state: {e}");
                skipped += 1;
                continue;
            }
            apply_event(&engine.reservations, &engine.restriction_to_room, &mut guards, event);
        }

        tracing::info!(
            "store loaded: {} rooms, {} reservations from {} events ({skipped} dropped)",
            engine.state.len(),
            engine.reservations.len(),
            events.len()
        );
        Ok(engine)
    }

    /// WAL-append then apply. Nothing is applied if the append fails.
    ///
    /// Both steps run on a detached task that owns the room locks, so a caller
    /// that stops waiting (a timeout, a dropped request) cannot leave a logged
    /// event unapplied. The locks are released only once memory matches the log.
    pub(super) async fn persist_and_apply(&self, guards: RoomGuards, event: Event) -> Result<(), EngineError> {
        let wal_tx = self.wal_tx.clone();
        let reservations = self.reservations.clone();
        let restriction_to_room = self.restriction_to_room.clone();
        tokio::spawn(async move {
            let mut guards = guards;
            wal_append(&wal_tx, &event).await?;
            apply_event(&reservations, &restriction_to_room, &mut guards, &event);
            Ok::<(), EngineError>(())
        })
        .await
        .map_err(|e| EngineError::WalError(format!("write task failed: {e}")))?
    }

    pub fn get_room_state(&self, id: RoomId) -> Option<SharedRoomState> {
        self.state.get(&id).map(|e| e.value().clone())
    }

    /// Write-lock a set of rooms in ascending id order so concurrent
    /// multi-room mutations cannot deadlock.
    pub(super) async fn lock_rooms(
        &self,
        ids: impl IntoIterator<Item = RoomId>,
    ) -> Result<RoomGuards, EngineError> {
        let ordered: BTreeSet<RoomId> = ids.into_iter().collect();
        let mut guards = RoomGuards::new();
        for id in ordered {
            let rs = self.get_room_state(id).ok_or(EngineError::RoomNotFound(id))?;
            guards.insert(id, rs.write_owned().await);
        }
        Ok(guards)
    }
}
