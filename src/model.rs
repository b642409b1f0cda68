use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, bookkeeping timestamps only. Stays are calendar dates.
pub type Ms = i64;

pub type RoomId = u32;
pub type ReservationId = Ulid;
pub type RestrictionId = Ulid;

/// A draft carrying this room id has no room chosen yet.
pub const NO_ROOM: RoomId = 0;

/// The only accepted wire format for dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StayError {
    InvalidDate(String),
    InvalidInterval { start: NaiveDate, end: NaiveDate },
}

impl std::fmt::Display for StayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StayError::InvalidDate(raw) => write!(f, "invalid date: {raw:?}"),
            StayError::InvalidInterval { start, end } => {
                write!(f, "invalid interval: {start} is not before {end}")
            }
        }
    }
}

impl std::error::Error for StayError {}

/// Parse a strict `YYYY-MM-DD` date.
///
/// chrono alone is lenient about padding and signs, so the shape is checked
/// first; impossible dates such as `2050-02-30` are rejected by chrono.
pub fn parse_date(raw: &str) -> Result<NaiveDate, StayError> {
    let bytes = raw.as_bytes();
    let well_shaped = bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !well_shaped {
        return Err(StayError::InvalidDate(raw.to_string()));
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| StayError::InvalidDate(raw.to_string()))
}

/// Half-open date interval `[start, end)`: `end` is the checkout day and is free
/// for the next guest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stay {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Stay {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, StayError> {
        if start >= end {
            return Err(StayError::InvalidInterval { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, StayError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    pub fn nights(&self) -> i64 {
        (self.end - self.start).num_days()
    }

    pub fn overlaps(&self, other: &Stay) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Fields are public, so a stay that came through a session or the WAL is
    /// re-checked before it is trusted.
    pub fn is_well_formed(&self) -> bool {
        self.start < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub guest: Guest,
    pub stay: Stay,
    pub room_id: RoomId,
    pub processed: bool,
    pub created_at: Ms,
    pub updated_at: Ms,
}

/// What a restriction represents on the room calendar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RestrictionKind {
    /// Created by a guest booking; always linked to a reservation.
    Reservation,
    /// Closed by an administrator.
    Block,
}

/// The row the availability engine scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRestriction {
    pub id: RestrictionId,
    pub stay: Stay,
    pub room_id: RoomId,
    pub reservation_id: Option<ReservationId>,
    pub kind: RestrictionKind,
    pub created_at: Ms,
}

impl RoomRestriction {
    pub fn is_guest(&self) -> bool {
        self.kind == RestrictionKind::Reservation
    }

    /// Overlapping restrictions conflict unless both are manual blocks.
    pub fn conflicts_with(&self, other: &RoomRestriction) -> bool {
        self.room_id == other.room_id
            && self.stay.overlaps(&other.stay)
            && (self.is_guest() || other.is_guest())
    }
}

/// Everything the store knows about one room.
#[derive(Debug, Clone)]
pub struct RoomState {
    pub room: Room,
    /// Sorted by `stay.start`.
    pub restrictions: Vec<RoomRestriction>,
}

impl RoomState {
    pub fn new(room: Room) -> Self {
        Self {
            room,
            restrictions: Vec::new(),
        }
    }

    /// Insert restriction maintaining sort order by stay.start.
    pub fn insert_restriction(&mut self, restriction: RoomRestriction) {
        let pos = self
            .restrictions
            .binary_search_by_key(&restriction.stay.start, |r| r.stay.start)
            .unwrap_or_else(|e| e);
        self.restrictions.insert(pos, restriction);
    }

    pub fn remove_restriction(&mut self, id: RestrictionId) -> Option<RoomRestriction> {
        let pos = self.restrictions.iter().position(|r| r.id == id)?;
        Some(self.restrictions.remove(pos))
    }

    /// Restrictions whose stay overlaps `query`.
    /// Binary search skips everything starting on or after `query.end`.
    pub fn overlapping(&self, query: &Stay) -> impl Iterator<Item = &RoomRestriction> {
        let right_bound = self
            .restrictions
            .partition_point(|r| r.stay.start < query.end);
        let start = query.start;
        self.restrictions[..right_bound]
            .iter()
            .filter(move |r| r.stay.end > start)
    }

    pub fn is_free(&self, query: &Stay) -> bool {
        self.overlapping(query).next().is_none()
    }

    /// First existing restriction the candidate would collide with.
    pub fn find_conflict(&self, candidate: &RoomRestriction) -> Option<RestrictionId> {
        self.overlapping(&candidate.stay)
            .find(|existing| existing.conflicts_with(candidate))
            .map(|existing| existing.id)
    }
}

/// WAL record format. A booking is one `Committed` record, so a crash can
/// never leave a reservation without its restriction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    RoomCreated {
        room: Room,
    },
    Committed {
        reservations: Vec<Reservation>,
        restrictions: Vec<RoomRestriction>,
    },
    ReservationProcessed {
        id: ReservationId,
        processed: bool,
        at: Ms,
    },
    ReservationDeleted {
        id: ReservationId,
        room_id: RoomId,
    },
    BlockRemoved {
        id: RestrictionId,
        room_id: RoomId,
    },
}
