//! Guest-facing booking steps, independent of any HTTP framework. Each handler
//! takes the session key and decoded input and returns an [`Outcome`].

pub mod forms;
pub mod outcome;

#[cfg(test)]
mod tests;

pub use forms::{BookRoomQuery, ReservationForm, RoomSearchForm, SearchForm, parse_room_id};
pub use outcome::*;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::booking::{
    Availability, BookingError, BookingTx, DraftReservation, DraftStage, DraftStore, ValidationErrors, bounded,
    parse_stay, validate,
};
use crate::model::{Stay, parse_date};
use crate::repository::Repository;

pub const MSG_NO_AVAILABILITY: &str = "No availability";
pub const MSG_INTERNAL: &str = "Internal server error";
pub const MSG_QUERY_FAILED: &str = "Error querying database";
pub const MSG_BAD_FORM: &str = "Can't parse form";
pub const MSG_BAD_DATES: &str = "Invalid dates";
pub const MSG_BAD_ROOM: &str = "Invalid room";
pub const MSG_NO_DRAFT: &str = "Can't get reservation from session";
pub const MSG_COMMIT_FAILED: &str = "Can't save your reservation, please try again";
pub const MSG_CONFIRMED: &str = "Reservation confirmed";

#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub repo_timeout: Duration,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            repo_timeout: Duration::from_secs(2),
        }
    }
}

fn home_with_error(message: &str) -> Outcome {
    Outcome::redirect_with(ROUTE_HOME, Flash::Error(message.to_string()))
}

fn json_failure(message: &str, room_id: &str, start: &str, end: &str) -> Outcome {
    Outcome::Json(AvailabilityResponse {
        ok: false,
        message: message.to_string(),
        room_id: room_id.to_string(),
        start: start.to_string(),
        end: end.to_string(),
    })
}

pub struct BookingFlow {
    repo: Arc<dyn Repository>,
    drafts: Arc<DraftStore>,
    availability: Availability,
    tx: BookingTx,
    config: FlowConfig,
}

impl BookingFlow {
    pub fn new(repo: Arc<dyn Repository>, drafts: Arc<DraftStore>, config: FlowConfig) -> Self {
        Self {
            availability: Availability::new(repo.clone(), config.repo_timeout),
            tx: BookingTx::new(repo.clone(), config.repo_timeout),
            repo,
            drafts,
            config,
        }
    }

    pub fn drafts(&self) -> &Arc<DraftStore> {
        &self.drafts
    }

    /// Search every room for a stay and offer the free ones.
    pub async fn post_availability(&self, session: &str, form: Option<SearchForm>) -> Outcome {
        let Some(form) = form else {
            return home_with_error(MSG_BAD_FORM);
        };
        let stay = match parse_stay(&form.start, &form.end) {
            Ok(stay) => stay,
            Err(e) => {
                info!("search rejected: {e}");
                return home_with_error(MSG_BAD_DATES);
            }
        };
        let rooms = match self.availability.search(stay.start, stay.end).await {
            Ok(rooms) => rooms,
            Err(e) => {
                error!("availability search for {stay:?} failed: {e}");
                return home_with_error(MSG_INTERNAL);
            }
        };
        if rooms.is_empty() {
            return Outcome::redirect_with(ROUTE_SEARCH_AVAILABILITY, Flash::Error(MSG_NO_AVAILABILITY.to_string()));
        }
        self.drafts.put(session, DraftReservation::searching(stay));
        Outcome::Render(Page::ChooseRoom { rooms, stay })
    }

    /// Single-room check for the in-page availability widget.
    pub async fn availability_json(&self, form: Option<RoomSearchForm>) -> Outcome {
        let Some(form) = form else {
            return json_failure(MSG_INTERNAL, "", "", "");
        };
        let (Some(room_id), Ok(stay)) = (parse_room_id(&form.room_id), parse_stay(&form.start, &form.end)) else {
            return json_failure(MSG_INTERNAL, &form.room_id, &form.start, &form.end);
        };
        match self.availability.check_room(room_id, stay.start, stay.end).await {
            Ok(ok) => Outcome::Json(AvailabilityResponse {
                ok,
                message: String::new(),
                room_id: form.room_id,
                start: form.start,
                end: form.end,
            }),
            Err(e) => {
                error!("availability check for room {room_id} failed: {e}");
                json_failure(MSG_QUERY_FAILED, &form.room_id, &form.start, &form.end)
            }
        }
    }

    /// Pick one of the rooms offered by the last search.
    pub async fn choose_room(&self, session: &str, raw_room_id: &str) -> Outcome {
        let Some(room_id) = parse_room_id(raw_room_id) else {
            return home_with_error(MSG_BAD_ROOM);
        };
        let Some(mut draft) = self.drafts.pending(session) else {
            return home_with_error(MSG_NO_DRAFT);
        };
        if draft.room_id != room_id {
            draft.room_name = None;
        }
        draft.room_id = room_id;
        draft.stage = DraftStage::RoomChosen;
        self.drafts.put(session, draft);
        Outcome::redirect(ROUTE_MAKE_RESERVATION)
    }

    /// Start a reservation for a known room and stay, skipping the search.
    pub async fn book_room(&self, session: &str, query: BookRoomQuery) -> Outcome {
        let Some(room_id) = parse_room_id(&query.id) else {
            return home_with_error(MSG_BAD_ROOM);
        };
        let stay = match parse_stay(&query.s, &query.e) {
            Ok(stay) => stay,
            Err(e) => {
                info!("book-room rejected: {e}");
                return home_with_error(MSG_BAD_DATES);
            }
        };
        let room = match bounded(self.config.repo_timeout, "get_room_by_id", self.repo.get_room_by_id(room_id)).await {
            Ok(room) => room,
            Err(e) => {
                warn!("book-room lookup of room {room_id} failed: {e}");
                return home_with_error(MSG_BAD_ROOM);
            }
        };
        self.drafts
            .put(session, DraftReservation::for_room(stay, room.id, room.name));
        Outcome::redirect(ROUTE_MAKE_RESERVATION)
    }

    /// Show the guest-details form for the pending draft.
    pub async fn reservation_form(&self, session: &str) -> Outcome {
        let Some(mut draft) = self.drafts.pending(session) else {
            return home_with_error(MSG_NO_DRAFT);
        };
        let room = match bounded(
            self.config.repo_timeout,
            "get_room_by_id",
            self.repo.get_room_by_id(draft.room_id),
        )
        .await
        {
            Ok(room) => room,
            Err(e) => {
                warn!("reservation form: room {} lookup failed: {e}", draft.room_id);
                return home_with_error(MSG_BAD_ROOM);
            }
        };
        if draft.room_name.as_deref() != Some(room.name.as_str()) {
            draft.room_name = Some(room.name);
            self.drafts.put(session, draft.clone());
        }
        Outcome::Render(Page::MakeReservation {
            draft,
            errors: ValidationErrors::default(),
        })
    }

    /// Take the guest's details. Invalid input re-renders the form with what
    /// was entered; valid input is committed straight away.
    pub async fn post_reservation(&self, session: &str, form: Option<ReservationForm>) -> Outcome {
        let Some(draft) = self.drafts.pending(session) else {
            return home_with_error(MSG_NO_DRAFT);
        };
        let Some(form) = form else {
            return home_with_error(MSG_BAD_FORM);
        };
        let (start, end) = match (parse_date(form.start_date.trim()), parse_date(form.end_date.trim())) {
            (Ok(start), Ok(end)) => (start, end),
            _ => return home_with_error(MSG_BAD_DATES),
        };
        let Some(room_id) = parse_room_id(&form.room_id) else {
            return home_with_error(MSG_BAD_ROOM);
        };

        // An inverted stay is kept as entered and reported by validation.
        let mut candidate = DraftReservation {
            guest: form.guest(),
            stay: Stay { start, end },
            room_id,
            room_name: draft.room_name.filter(|_| draft.room_id == room_id),
            stage: draft.stage,
        };
        let errors = validate(&candidate);
        if !errors.is_empty() {
            info!(
                "reservation details rejected: {}",
                errors.fields().collect::<Vec<_>>().join(", ")
            );
            return Outcome::Render(Page::MakeReservation {
                draft: candidate,
                errors,
            });
        }

        candidate.stage = DraftStage::DetailsEntered;
        self.drafts.put(session, candidate);
        self.confirm(session).await
    }

    /// Commit a draft whose details have been accepted.
    pub async fn confirm(&self, session: &str) -> Outcome {
        let Some(mut draft) = self
            .drafts
            .pending(session)
            .filter(|d| d.stage == DraftStage::DetailsEntered)
        else {
            return home_with_error(MSG_NO_DRAFT);
        };
        match self.tx.commit(&draft).await {
            Ok(id) => {
                draft.stage = DraftStage::Committed(id);
                self.drafts.put(session, draft);
                Outcome::redirect_with(ROUTE_RESERVATION_SUMMARY, Flash::Info(MSG_CONFIRMED.to_string()))
            }
            Err(BookingError::RoomNotFound(id)) => {
                warn!("confirm: room {id} vanished");
                home_with_error(MSG_BAD_ROOM)
            }
            Err(e) => {
                error!("confirm failed: {e}");
                home_with_error(MSG_COMMIT_FAILED)
            }
        }
    }

    /// Show a just-committed reservation once.
    pub async fn reservation_summary(&self, session: &str) -> Outcome {
        let Some(draft) = self.drafts.get(session).filter(|d| d.committed_id().is_some()) else {
            return home_with_error(MSG_NO_DRAFT);
        };
        self.drafts.clear(session);
        Outcome::Render(Page::ReservationSummary { draft })
    }
}
