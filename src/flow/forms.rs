//! Request payloads. Every field defaults to empty so a partial submission
//! still decodes and is rejected by the handler, not the decoder.

use serde::Deserialize;

use crate::model::{Guest, NO_ROOM, RoomId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchForm {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RoomSearchForm {
    pub start: String,
    pub end: String,
    pub room_id: String,
}

/// Query string of the direct "book this room" link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BookRoomQuery {
    pub id: String,
    pub s: String,
    pub e: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReservationForm {
    pub start_date: String,
    pub end_date: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub room_id: String,
}

impl ReservationForm {
    pub fn guest(&self) -> Guest {
        Guest {
            first_name: self.first_name.trim().to_string(),
            last_name: self.last_name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
        }
    }
}

/// A positive room id, or `None`.
pub fn parse_room_id(raw: &str) -> Option<RoomId> {
    raw.trim().parse().ok().filter(|id| *id != NO_ROOM)
}
