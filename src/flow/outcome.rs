use serde::Serialize;

use crate::booking::{DraftReservation, ValidationErrors};
use crate::model::{Room, RoomId, Stay};

pub const ROUTE_HOME: &str = "/";
pub const ROUTE_SEARCH_AVAILABILITY: &str = "/search-availability";
pub const ROUTE_MAKE_RESERVATION: &str = "/make-reservation";
pub const ROUTE_RESERVATION_SUMMARY: &str = "/reservation-summary";

pub fn choose_room_route(room_id: RoomId) -> String {
    format!("/choose-room/{room_id}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "lowercase")]
pub enum Flash {
    Info(String),
    Error(String),
}

impl Flash {
    pub fn message(&self) -> &str {
        match self {
            Flash::Info(m) | Flash::Error(m) => m,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Flash::Error(_))
    }
}

/// Template data handed to the renderer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "page", rename_all = "kebab-case")]
pub enum Page {
    ChooseRoom { rooms: Vec<Room>, stay: Stay },
    /// Also used to re-show a rejected submission with its errors.
    MakeReservation { draft: DraftReservation, errors: ValidationErrors },
    ReservationSummary { draft: DraftReservation },
}

impl Page {
    /// Where the page's form posts to, if it has one.
    pub fn form_action(&self) -> Option<&'static str> {
        match self {
            Page::ChooseRoom { .. } => None,
            Page::MakeReservation { .. } => Some(ROUTE_MAKE_RESERVATION),
            Page::ReservationSummary { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityResponse {
    pub ok: bool,
    pub message: String,
    /// Echoes the submitted value, parseable or not.
    pub room_id: String,
    pub start: String,
    pub end: String,
}

/// What a handler asks the HTTP layer to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Render(Page),
    Redirect { to: String, flash: Option<Flash> },
    Json(AvailabilityResponse),
}

impl Outcome {
    pub fn redirect(to: impl Into<String>) -> Self {
        Outcome::Redirect {
            to: to.into(),
            flash: None,
        }
    }

    pub fn redirect_with(to: impl Into<String>, flash: Flash) -> Self {
        Outcome::Redirect {
            to: to.into(),
            flash: Some(flash),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Outcome::Render(_) | Outcome::Json(_) => 200,
            Outcome::Redirect { .. } => 303,
        }
    }

    pub fn location(&self) -> Option<&str> {
        match self {
            Outcome::Redirect { to, .. } => Some(to),
            _ => None,
        }
    }

    pub fn flash(&self) -> Option<&Flash> {
        match self {
            Outcome::Redirect { flash, .. } => flash.as_ref(),
            _ => None,
        }
    }

    pub fn page(&self) -> Option<&Page> {
        match self {
            Outcome::Render(page) => Some(page),
            _ => None,
        }
    }

    /// Response body for JSON outcomes.
    pub fn json_body(&self) -> Option<serde_json::Result<String>> {
        match self {
            Outcome::Json(body) => Some(serde_json::to_string(body)),
            _ => None,
        }
    }
}
