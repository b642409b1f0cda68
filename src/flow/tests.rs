use super::*;
use crate::model::{Room, RoomId, RoomRestriction, RestrictionId, RestrictionKind};
use crate::repository::{Fault, FaultPoint, MemoryRepository, Txn};

const SESSION: &str = "session-a";

struct Harness {
    repo: Arc<MemoryRepository>,
    flow: BookingFlow,
}

fn harness() -> Harness {
    let repo = Arc::new(MemoryRepository::new([
        Room { id: 1, name: "General's Quarters".into() },
        Room { id: 2, name: "Major's Suite".into() },
    ]));
    let flow = BookingFlow::new(
        repo.clone(),
        Arc::new(DraftStore::new()),
        FlowConfig {
            repo_timeout: Duration::from_millis(50),
        },
    );
    Harness { repo, flow }
}

fn stay(start: &str, end: &str) -> Stay {
    Stay::parse(start, end).unwrap()
}

fn chosen(room_id: RoomId) -> DraftReservation {
    DraftReservation::for_room(stay("2050-01-01", "2050-01-02"), room_id, "General's Quarters".into())
}

fn valid_form() -> ReservationForm {
    ReservationForm {
        start_date: "2050-01-01".into(),
        end_date: "2050-01-02".into(),
        first_name: "John".into(),
        last_name: "Smith".into(),
        email: "john@smith.com".into(),
        phone: "123456789".into(),
        room_id: "1".into(),
    }
}

async fn block(repo: &MemoryRepository, room_id: RoomId, start: &str, end: &str) {
    let mut txn = Txn::new();
    repo.insert_room_restriction(
        &mut txn,
        &RoomRestriction {
            id: RestrictionId::new(),
            stay: stay(start, end),
            room_id,
            reservation_id: None,
            kind: RestrictionKind::Block,
            created_at: 0,
        },
    )
    .await
    .unwrap();
    repo.commit(txn).await.unwrap();
}

fn assert_home(outcome: &Outcome) {
    assert_eq!(outcome.status(), 303, "{outcome:?}");
    assert_eq!(outcome.location(), Some(ROUTE_HOME), "{outcome:?}");
}

// ── Reservation form ─────────────────────────────────────────────

#[tokio::test]
async fn reservation_form_with_draft_renders() {
    let h = harness();
    h.flow.drafts().put(SESSION, chosen(1));
    let outcome = h.flow.reservation_form(SESSION).await;
    assert_eq!(outcome.status(), 200);
    let page = outcome.page().unwrap();
    assert_eq!(page.form_action(), Some(ROUTE_MAKE_RESERVATION));
    match page {
        Page::MakeReservation { draft, errors } => {
            assert_eq!(draft.room_name.as_deref(), Some("General's Quarters"));
            assert!(errors.is_empty());
        }
        other => panic!("unexpected page {other:?}"),
    }
}

#[tokio::test]
async fn reservation_form_without_draft_redirects() {
    let h = harness();
    assert_home(&h.flow.reservation_form(SESSION).await);
}

#[tokio::test]
async fn reservation_form_for_missing_room_redirects() {
    let h = harness();
    h.flow.drafts().put(SESSION, chosen(100));
    assert_home(&h.flow.reservation_form(SESSION).await);
}

// ── Post reservation ─────────────────────────────────────────────

#[tokio::test]
async fn post_reservation_valid_goes_to_summary() {
    let h = harness();
    h.flow.drafts().put(SESSION, chosen(1));
    let outcome = h.flow.post_reservation(SESSION, Some(valid_form())).await;
    assert_eq!(outcome.status(), 303);
    assert_eq!(outcome.location(), Some(ROUTE_RESERVATION_SUMMARY));
    assert_eq!(h.repo.reservation_count().await, 1);
    assert_eq!(h.repo.restriction_count().await, 1);

    let draft = h.flow.drafts().get(SESSION).unwrap();
    assert!(draft.committed_id().is_some());
}

#[tokio::test]
async fn post_reservation_missing_body_redirects() {
    let h = harness();
    h.flow.drafts().put(SESSION, chosen(1));
    assert_home(&h.flow.post_reservation(SESSION, None).await);
}

#[tokio::test]
async fn post_reservation_without_draft_redirects() {
    let h = harness();
    assert_home(&h.flow.post_reservation(SESSION, Some(valid_form())).await);
    assert_eq!(h.repo.reservation_count().await, 0);
}

#[tokio::test]
async fn post_reservation_invalid_dates_redirect() {
    let h = harness();
    h.flow.drafts().put(SESSION, chosen(1));
    let bad_start = ReservationForm {
        start_date: "invalid".into(),
        ..valid_form()
    };
    assert_home(&h.flow.post_reservation(SESSION, Some(bad_start)).await);

    let bad_end = ReservationForm {
        end_date: "invalid".into(),
        ..valid_form()
    };
    assert_home(&h.flow.post_reservation(SESSION, Some(bad_end)).await);
    assert_eq!(h.repo.reservation_count().await, 0);
}

#[tokio::test]
async fn post_reservation_invalid_room_id_redirects() {
    let h = harness();
    h.flow.drafts().put(SESSION, chosen(1));
    for raw in ["invalid", "0", ""] {
        let form = ReservationForm {
            room_id: raw.into(),
            ..valid_form()
        };
        assert_home(&h.flow.post_reservation(SESSION, Some(form)).await);
    }
}

#[tokio::test]
async fn post_reservation_invalid_data_rerenders_form() {
    let h = harness();
    h.flow.drafts().put(SESSION, chosen(1));
    let form = ReservationForm {
        first_name: "J".into(),
        ..valid_form()
    };
    let outcome = h.flow.post_reservation(SESSION, Some(form)).await;
    assert_eq!(outcome.status(), 200);
    let page = outcome.page().unwrap();
    assert_eq!(page.form_action(), Some(ROUTE_MAKE_RESERVATION));
    match page {
        Page::MakeReservation { draft, errors } => {
            assert!(errors.has("first_name"));
            // What the guest typed comes back.
            assert_eq!(draft.guest.first_name, "J");
            assert_eq!(draft.guest.email, "john@smith.com");
        }
        other => panic!("unexpected page {other:?}"),
    }
    assert_eq!(h.repo.reservation_count().await, 0);
    assert!(h.flow.drafts().pending(SESSION).is_some());
}

#[tokio::test]
async fn post_reservation_inverted_dates_rerender_form() {
    let h = harness();
    h.flow.drafts().put(SESSION, chosen(1));
    let form = ReservationForm {
        start_date: "2050-01-05".into(),
        end_date: "2050-01-02".into(),
        ..valid_form()
    };
    let outcome = h.flow.post_reservation(SESSION, Some(form)).await;
    match outcome.page() {
        Some(Page::MakeReservation { errors, .. }) => assert!(errors.has("end_date")),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn post_reservation_insert_reservation_fails() {
    let h = harness();
    h.repo.inject(Fault::fail(FaultPoint::InsertReservation));
    h.flow.drafts().put(SESSION, chosen(1));
    let outcome = h.flow.post_reservation(SESSION, Some(valid_form())).await;
    assert_home(&outcome);
    assert!(outcome.flash().unwrap().is_error());
    assert_eq!(h.repo.reservation_count().await, 0);
}

#[tokio::test]
async fn post_reservation_insert_restriction_fails() {
    let h = harness();
    h.repo.inject(Fault::fail(FaultPoint::InsertRoomRestriction));
    h.flow.drafts().put(SESSION, chosen(1));
    let outcome = h.flow.post_reservation(SESSION, Some(valid_form())).await;
    assert_home(&outcome);
    assert_eq!(h.repo.reservation_count().await, 0);
    assert_eq!(h.repo.restriction_count().await, 0);
    // The guest can retry: the pending draft is still there.
    assert_eq!(
        h.flow.drafts().pending(SESSION).unwrap().stage,
        DraftStage::DetailsEntered
    );
}

#[tokio::test]
async fn post_reservation_twice_books_once() {
    let h = harness();
    h.flow.drafts().put(SESSION, chosen(1));
    let first = h.flow.post_reservation(SESSION, Some(valid_form())).await;
    assert_eq!(first.location(), Some(ROUTE_RESERVATION_SUMMARY));
    let second = h.flow.post_reservation(SESSION, Some(valid_form())).await;
    assert_home(&second);
    assert_eq!(h.repo.reservation_count().await, 1);
}

#[tokio::test]
async fn confirm_requires_accepted_details() {
    let h = harness();
    h.flow.drafts().put(SESSION, chosen(1));
    assert_home(&h.flow.confirm(SESSION).await);
    assert_eq!(h.repo.reservation_count().await, 0);
}

// ── Search ───────────────────────────────────────────────────────

#[tokio::test]
async fn post_availability_offers_free_rooms() {
    let h = harness();
    block(&h.repo, 1, "2050-01-01", "2050-01-02").await;
    let form = SearchForm {
        start: "2050-01-01".into(),
        end: "2050-01-02".into(),
    };
    let outcome = h.flow.post_availability(SESSION, Some(form)).await;
    assert_eq!(outcome.status(), 200);
    match outcome.page() {
        Some(Page::ChooseRoom { rooms, stay: s }) => {
            assert_eq!(rooms.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);
            assert_eq!(*s, stay("2050-01-01", "2050-01-02"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(h.flow.drafts().get(SESSION).unwrap().stage, DraftStage::Searching);
}

#[tokio::test]
async fn post_availability_nothing_free() {
    let h = harness();
    block(&h.repo, 1, "2050-01-01", "2050-01-02").await;
    block(&h.repo, 2, "2050-01-01", "2050-01-02").await;
    let form = SearchForm {
        start: "2050-01-01".into(),
        end: "2050-01-02".into(),
    };
    let outcome = h.flow.post_availability(SESSION, Some(form)).await;
    assert_eq!(outcome.location(), Some(ROUTE_SEARCH_AVAILABILITY));
    assert_eq!(outcome.flash().unwrap().message(), MSG_NO_AVAILABILITY);
    assert!(h.flow.drafts().get(SESSION).is_none());
}

#[tokio::test]
async fn post_availability_bad_input_and_failure() {
    let h = harness();
    assert_home(&h.flow.post_availability(SESSION, None).await);
    let form = SearchForm {
        start: "invalid".into(),
        end: "2050-01-02".into(),
    };
    assert_home(&h.flow.post_availability(SESSION, Some(form)).await);

    h.repo.inject(Fault::fail(FaultPoint::SearchAvailableRooms));
    let form = SearchForm {
        start: "2050-01-01".into(),
        end: "2050-01-02".into(),
    };
    assert_home(&h.flow.post_availability(SESSION, Some(form)).await);
}

#[tokio::test]
async fn post_availability_stalled_store_redirects() {
    let h = harness();
    h.repo.inject(Fault::stall(FaultPoint::SearchAvailableRooms));
    let form = SearchForm {
        start: "2050-01-01".into(),
        end: "2050-01-02".into(),
    };
    assert_home(&h.flow.post_availability(SESSION, Some(form)).await);
}

// ── JSON availability ────────────────────────────────────────────

fn json(outcome: Outcome) -> AvailabilityResponse {
    match outcome {
        Outcome::Json(body) => body,
        other => panic!("expected json, got {other:?}"),
    }
}

fn room_search(room_id: &str) -> RoomSearchForm {
    RoomSearchForm {
        start: "2050-01-01".into(),
        end: "2050-01-02".into(),
        room_id: room_id.into(),
    }
}

#[tokio::test]
async fn availability_json_rooms_available_and_not() {
    let h = harness();
    block(&h.repo, 2, "2050-01-01", "2050-01-02").await;

    let body = json(h.flow.availability_json(Some(room_search("1"))).await);
    assert!(body.ok);
    assert_eq!(body.message, "");
    assert_eq!(body.room_id, "1");
    assert_eq!(body.start, "2050-01-01");

    let body = json(h.flow.availability_json(Some(room_search("2"))).await);
    assert!(!body.ok);
    assert_eq!(body.message, "");
}

#[tokio::test]
async fn availability_json_missing_or_bad_body() {
    let h = harness();
    let body = json(h.flow.availability_json(None).await);
    assert!(!body.ok);
    assert_eq!(body.message, MSG_INTERNAL);
    assert_eq!(body.room_id, "");

    let body = json(h.flow.availability_json(Some(room_search("invalid"))).await);
    assert_eq!(body.message, MSG_INTERNAL);
    assert_eq!(body.room_id, "invalid");

    let form = RoomSearchForm {
        start: "invalid".into(),
        ..room_search("1")
    };
    let body = json(h.flow.availability_json(Some(form)).await);
    assert_eq!(body.message, MSG_INTERNAL);
}

#[tokio::test]
async fn availability_json_query_failure() {
    let h = harness();
    h.repo.inject(Fault::fail(FaultPoint::RoomIsAvailable));
    let body = json(h.flow.availability_json(Some(room_search("1"))).await);
    assert!(!body.ok);
    assert_eq!(body.message, MSG_QUERY_FAILED);
}

// ── Choose room / book room ──────────────────────────────────────

#[tokio::test]
async fn choose_room_sets_room_on_draft() {
    let h = harness();
    h.flow
        .drafts()
        .put(SESSION, DraftReservation::searching(stay("2050-01-01", "2050-01-02")));
    let outcome = h.flow.choose_room(SESSION, "1").await;
    assert_eq!(outcome.location(), Some(ROUTE_MAKE_RESERVATION));
    let draft = h.flow.drafts().get(SESSION).unwrap();
    assert_eq!(draft.room_id, 1);
    assert_eq!(draft.stage, DraftStage::RoomChosen);
}

#[tokio::test]
async fn choose_room_bad_id_or_missing_draft() {
    let h = harness();
    assert_home(&h.flow.choose_room(SESSION, "1").await);
    h.flow
        .drafts()
        .put(SESSION, DraftReservation::searching(stay("2050-01-01", "2050-01-02")));
    assert_home(&h.flow.choose_room(SESSION, "invalid").await);
    assert_home(&h.flow.choose_room(SESSION, "0").await);
}

#[tokio::test]
async fn book_room_starts_a_draft() {
    let h = harness();
    let query = BookRoomQuery {
        id: "2".into(),
        s: "2050-01-01".into(),
        e: "2050-01-02".into(),
    };
    let outcome = h.flow.book_room(SESSION, query).await;
    assert_eq!(outcome.location(), Some(ROUTE_MAKE_RESERVATION));
    let draft = h.flow.drafts().get(SESSION).unwrap();
    assert_eq!(draft.room_id, 2);
    assert_eq!(draft.room_name.as_deref(), Some("Major's Suite"));
    assert_eq!(draft.stage, DraftStage::RoomChosen);
}

#[tokio::test]
async fn book_room_failures_redirect() {
    let h = harness();
    let good = BookRoomQuery {
        id: "1".into(),
        s: "2050-01-01".into(),
        e: "2050-01-02".into(),
    };
    for query in [
        BookRoomQuery { id: "100".into(), ..good.clone() },
        BookRoomQuery { id: "x".into(), ..good.clone() },
        BookRoomQuery { s: "invalid".into(), ..good.clone() },
        BookRoomQuery { e: "2049-01-01".into(), ..good.clone() },
    ] {
        assert_home(&h.flow.book_room(SESSION, query).await);
    }
    assert!(h.flow.drafts().get(SESSION).is_none());
}

// ── Summary ──────────────────────────────────────────────────────

#[tokio::test]
async fn summary_without_draft_redirects() {
    let h = harness();
    let outcome = h.flow.reservation_summary(SESSION).await;
    assert_home(&outcome);
    assert!(outcome.flash().is_some());
}

#[tokio::test]
async fn summary_shows_committed_copy_once() {
    let h = harness();
    h.flow.drafts().put(SESSION, chosen(1));
    h.flow.post_reservation(SESSION, Some(valid_form())).await;

    let outcome = h.flow.reservation_summary(SESSION).await;
    match outcome.page() {
        Some(Page::ReservationSummary { draft }) => {
            assert_eq!(draft.guest.last_name, "Smith");
            assert!(draft.committed_id().is_some());
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert!(h.flow.drafts().get(SESSION).is_none());
    assert_home(&h.flow.reservation_summary(SESSION).await);
}

#[tokio::test]
async fn summary_ignores_pending_draft() {
    let h = harness();
    h.flow.drafts().put(SESSION, chosen(1));
    assert_home(&h.flow.reservation_summary(SESSION).await);
    assert!(h.flow.drafts().pending(SESSION).is_some());
}
