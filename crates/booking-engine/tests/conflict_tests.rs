//! Tests for booking creation, update and cancellation rules.

use booking_engine::{
    BookingId, BookingRequest, BookingUpdate, Day, Dispatcher, Engine, EngineConfig, EngineError,
    ErrorKind, Principal, Provider, ProviderId, Requester, RequesterId, Window,
};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn window(s: &str) -> Window {
    s.parse().unwrap()
}

fn time(s: &str) -> chrono::NaiveTime {
    booking_engine::slot::parse_time(s).unwrap()
}

fn provider(id: &str) -> Provider {
    Provider {
        id: ProviderId::from(id),
        name: format!("Dr. {}", id),
        email: format!("{}@uni.example", id),
        department: "Computing".to_string(),
        office: None,
    }
}

fn requester(id: &str) -> Requester {
    Requester {
        id: RequesterId::from(id),
        name: format!("Student {}", id),
        email: format!("{}@students.example", id),
    }
}

/// Engine with provider `p1` publishing the given slots and requesters `r1`, `r2`.
fn engine_with_slots(slots: &[&str]) -> Engine {
    let engine = Engine::new(&EngineConfig::default(), Dispatcher::disabled());
    engine.register_provider(provider("p1")).unwrap();
    engine.register_requester(requester("r1")).unwrap();
    engine.register_requester(requester("r2")).unwrap();
    let windows: Vec<Window> = slots.iter().map(|s| window(s)).collect();
    engine
        .add_slots(&Principal::provider("p1"), &ProviderId::from("p1"), &windows)
        .unwrap();
    engine
}

fn book(engine: &Engine, who: &str, slot: &str) -> Result<booking_engine::Booking, EngineError> {
    engine.create_booking(
        &Principal::requester(who),
        BookingRequest::new("p1", window(slot)),
    )
}

// ── Create ──────────────────────────────────────────────────────────────────

#[test]
fn booking_an_exact_slot_succeeds() {
    let engine = engine_with_slots(&["Mon 09:00-10:00"]);
    let booking = book(&engine, "r1", "Mon 09:00-10:00").unwrap();

    assert_eq!(booking.window, window("Mon 09:00-10:00"));
    assert_eq!(booking.requester, RequesterId::from("r1"));
    assert_eq!(booking.provider, ProviderId::from("p1"));
    assert_eq!(engine.booking(booking.id).unwrap(), booking);
}

#[test]
fn title_and_description_are_stored() {
    let engine = engine_with_slots(&["Mon 09:00-10:00"]);
    let booking = engine
        .create_booking(
            &Principal::requester("r1"),
            BookingRequest::new("p1", window("Mon 09:00-10:00"))
                .with_title("Thesis review")
                .with_description("Chapter 3"),
        )
        .unwrap();

    assert_eq!(booking.title.as_deref(), Some("Thesis review"));
    assert_eq!(booking.description.as_deref(), Some("Chapter 3"));
}

#[test]
fn unknown_provider_fails_before_anything_else() {
    let engine = engine_with_slots(&["Mon 09:00-10:00"]);
    let err = engine
        .create_booking(
            &Principal::requester("r1"),
            BookingRequest::new("nobody", window("Mon 09:00-10:00")),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::ProviderNotFound(_)));
}

#[test]
fn window_without_exact_slot_is_unavailable() {
    let engine = engine_with_slots(&["Mon 09:00-10:00"]);

    // A sub-interval is not enough at creation time.
    let err = book(&engine, "r1", "Mon 09:00-09:30").unwrap_err();
    assert!(matches!(err, EngineError::SlotUnavailable(_)));
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = book(&engine, "r1", "Tue 09:00-10:00").unwrap_err();
    assert!(matches!(err, EngineError::SlotUnavailable(_)));

    // Nothing was committed.
    assert!(engine
        .bookings_for_provider(&ProviderId::from("p1"))
        .unwrap()
        .is_empty());
}

#[test]
fn second_booking_of_same_window_is_rejected() {
    let engine = engine_with_slots(&["Mon 09:00-10:00"]);
    book(&engine, "r1", "Mon 09:00-10:00").unwrap();

    let err = book(&engine, "r2", "Mon 09:00-10:00").unwrap_err();
    assert!(matches!(err, EngineError::SlotAlreadyBooked(_)));
    assert_eq!(
        engine
            .bookings_for_requester(&RequesterId::from("r2"))
            .unwrap()
            .len(),
        0
    );
}

#[test]
fn providers_cannot_book() {
    let engine = engine_with_slots(&["Mon 09:00-10:00"]);
    let err = engine
        .create_booking(
            &Principal::provider("p1"),
            BookingRequest::new("p1", window("Mon 09:00-10:00")),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
}

#[test]
fn unregistered_requester_is_not_found() {
    let engine = engine_with_slots(&["Mon 09:00-10:00"]);
    let err = book(&engine, "stranger", "Mon 09:00-10:00").unwrap_err();
    assert!(matches!(err, EngineError::RequesterNotFound(_)));
}

// ── Update ──────────────────────────────────────────────────────────────────

#[test]
fn update_to_sub_range_inside_slot_succeeds() {
    let engine = engine_with_slots(&["Mon 09:00-11:00"]);
    let booking = book(&engine, "r1", "Mon 09:00-11:00").unwrap();

    let updated = engine
        .update_booking(
            &Principal::requester("r1"),
            booking.id,
            BookingUpdate {
                start: Some(time("09:30")),
                end: Some(time("10:15")),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(updated.window, window("Mon 09:30-10:15"));
    assert_eq!(updated.slot, booking.slot);
}

#[test]
fn update_starting_before_any_covering_slot_is_unavailable() {
    let engine = engine_with_slots(&["Mon 09:00-10:00"]);
    let booking = book(&engine, "r1", "Mon 09:00-10:00").unwrap();

    let err = engine
        .update_booking(
            &Principal::requester("r1"),
            booking.id,
            BookingUpdate {
                start: Some(time("08:30")),
                ..Default::default()
            },
        )
        .unwrap_err();

    assert!(matches!(err, EngineError::SlotUnavailable(_)));
    assert_eq!(engine.booking(booking.id).unwrap().window, booking.window);
}

#[test]
fn update_can_move_to_another_day_and_relinks_slot() {
    let engine = engine_with_slots(&["Mon 09:00-10:00", "Wed 09:00-12:00"]);
    let booking = book(&engine, "r1", "Mon 09:00-10:00").unwrap();
    let wednesday = engine.list_slots(&ProviderId::from("p1")).unwrap()[1];

    let updated = engine
        .update_booking(
            &Principal::requester("r1"),
            booking.id,
            BookingUpdate {
                day: Some("Wed".parse::<Day>().unwrap()),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(updated.window, window("Wed 09:00-10:00"));
    assert_eq!(updated.slot, Some(wednesday.id));
    // Monday is free again.
    let free = engine.list_free_slots(&ProviderId::from("p1")).unwrap();
    assert!(free.iter().any(|s| s.window == window("Mon 09:00-10:00")));
}

#[test]
fn update_onto_a_held_window_is_rejected() {
    let engine = engine_with_slots(&["Mon 09:00-10:00", "Mon 10:00-11:00"]);
    book(&engine, "r1", "Mon 09:00-10:00").unwrap();
    let second = book(&engine, "r2", "Mon 10:00-11:00").unwrap();

    let err = engine
        .update_booking(
            &Principal::requester("r2"),
            second.id,
            BookingUpdate {
                start: Some(time("09:00")),
                end: Some(time("10:00")),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::SlotAlreadyBooked(_)));
}

#[test]
fn only_owning_requester_may_update() {
    let engine = engine_with_slots(&["Mon 09:00-10:00"]);
    let booking = book(&engine, "r1", "Mon 09:00-10:00").unwrap();

    for caller in [Principal::requester("r2"), Principal::provider("p1")] {
        let err = engine
            .update_booking(
                &caller,
                booking.id,
                BookingUpdate {
                    title: Some("hijack".to_string()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::NotAuthorized(_)), "{}", caller);
    }
}

#[test]
fn detail_only_update_skips_availability_check() {
    let engine = engine_with_slots(&["Mon 09:00-10:00"]);
    let booking = book(&engine, "r1", "Mon 09:00-10:00").unwrap();

    let updated = engine
        .update_booking(
            &Principal::requester("r1"),
            booking.id,
            BookingUpdate {
                title: Some("Office hours".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(updated.title.as_deref(), Some("Office hours"));
    assert_eq!(updated.window, booking.window);
}

#[test]
fn updating_missing_booking_is_not_found() {
    let engine = engine_with_slots(&[]);
    let err = engine
        .update_booking(
            &Principal::requester("r1"),
            BookingId(99),
            BookingUpdate::default(),
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::BookingNotFound(BookingId(99))));
}

// ── Delete ──────────────────────────────────────────────────────────────────

#[test]
fn requester_or_provider_may_cancel() {
    let engine = engine_with_slots(&["Mon 09:00-10:00", "Mon 10:00-11:00"]);
    let first = book(&engine, "r1", "Mon 09:00-10:00").unwrap();
    let second = book(&engine, "r1", "Mon 10:00-11:00").unwrap();

    let removed = engine
        .delete_booking(&Principal::requester("r1"), first.id)
        .unwrap();
    assert_eq!(removed.window, first.window);
    engine
        .delete_booking(&Principal::provider("p1"), second.id)
        .unwrap();

    assert!(engine
        .bookings_for_requester(&RequesterId::from("r1"))
        .unwrap()
        .is_empty());
}

#[test]
fn strangers_cannot_cancel() {
    let engine = engine_with_slots(&["Mon 09:00-10:00"]);
    engine.register_provider(provider("p2")).unwrap();
    let booking = book(&engine, "r1", "Mon 09:00-10:00").unwrap();

    for caller in [Principal::requester("r2"), Principal::provider("p2")] {
        let err = engine.delete_booking(&caller, booking.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
    }
    assert!(engine.booking(booking.id).is_ok());
}

#[test]
fn cancelled_window_can_be_booked_again() {
    let engine = engine_with_slots(&["Mon 09:00-10:00"]);
    let booking = book(&engine, "r1", "Mon 09:00-10:00").unwrap();
    engine
        .delete_booking(&Principal::requester("r1"), booking.id)
        .unwrap();

    let again = book(&engine, "r2", "Mon 09:00-10:00").unwrap();
    assert_ne!(again.id, booking.id, "booking ids are not reused");
}
