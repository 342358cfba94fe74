//! Booking validation: the only way bookings are created, changed or cancelled.
//!
//! Creation and update apply different availability rules:
//!
//! - **create** requires a published slot whose window equals the requested window
//!   exactly;
//! - **update** only requires a published slot on the target day whose bounds contain
//!   the requested window, so a requester may narrow a booking to part of a slot.
//!
//! Both paths claim the slot key through [`crate::booking::BookingStore`]'s unique
//! index, which is what actually rejects a double booking.
//!
//! Every function validates and looks up all contacts before mutating anything, so a
//! failed call leaves the ledger untouched. Notifications are appended to `outbox`
//! only after the mutation succeeded.

use chrono::{NaiveTime, Utc};
use tracing::debug;

use crate::booking::{Booking, BookingId, NewBooking};
use crate::directory::{Principal, ProviderId, RequesterId, Role};
use crate::error::{EngineError, Result};
use crate::ledger::Ledger;
use crate::notify::{Composer, Notification};
use crate::slot::{Day, SlotId, Window};

/// A requester's reservation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingRequest {
    pub provider: ProviderId,
    pub window: Window,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl BookingRequest {
    pub fn new(provider: impl Into<ProviderId>, window: Window) -> Self {
        Self {
            provider: provider.into(),
            window,
            title: None,
            description: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Changes a requester asks for. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingUpdate {
    pub day: Option<Day>,
    pub start: Option<NaiveTime>,
    pub end: Option<NaiveTime>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl BookingUpdate {
    /// True when any of day/start/end is supplied.
    pub fn moves(&self) -> bool {
        self.day.is_some() || self.start.is_some() || self.end.is_some()
    }

    fn target(&self, current: &Window) -> Result<Window> {
        Window::new(
            self.day.unwrap_or(current.day()),
            self.start.unwrap_or(current.start()),
            self.end.unwrap_or(current.end()),
        )
    }
}

pub fn create_booking(
    ledger: &mut Ledger,
    principal: &Principal,
    request: BookingRequest,
    composer: &Composer,
    outbox: &mut Vec<Notification>,
) -> Result<Booking> {
    let provider = ledger.provider_contact(&request.provider)?;
    if principal.role != Role::Requester {
        return Err(EngineError::NotAuthorized(
            "only requesters can book slots".to_string(),
        ));
    }
    let requester_id = RequesterId(principal.id.clone());
    let requester = ledger.requester_contact(&requester_id)?;

    let slot = ledger
        .availability
        .find_exact(&request.provider, &request.window)?
        .ok_or(EngineError::SlotUnavailable(request.window))?;

    let booking = ledger
        .bookings
        .insert(
            NewBooking {
                requester: requester_id,
                provider: request.provider,
                slot,
                window: request.window,
                title: request.title,
                description: request.description,
            },
            Utc::now(),
        )?
        .clone();

    debug!(booking = %booking.id, slot = %slot, window = %booking.window, "booking created");
    outbox.extend(composer.booking_created(&booking, &provider, &requester));
    Ok(booking)
}

pub fn update_booking(
    ledger: &mut Ledger,
    principal: &Principal,
    id: BookingId,
    update: BookingUpdate,
    composer: &Composer,
    outbox: &mut Vec<Notification>,
) -> Result<Booking> {
    let current = ledger.bookings.get(id)?.clone();
    if !principal.is_requester(&current.requester) {
        return Err(EngineError::NotAuthorized(
            "only the requester who made the booking can change it".to_string(),
        ));
    }
    let provider = ledger.provider_contact(&current.provider)?;
    let requester = ledger.requester_contact(&current.requester)?;

    let now = Utc::now();
    if update.moves() {
        let target = update.target(&current.window)?;
        let slot = link_for(ledger, &current, &target)?;
        ledger.bookings.retime(id, slot, target, now)?;
        debug!(booking = %id, slot = %slot, from = %current.window, to = %target, "booking moved");
    }

    let booking = if update.title.is_some() || update.description.is_some() {
        ledger
            .bookings
            .set_details(id, update.title, update.description, now)?
            .clone()
    } else {
        ledger.bookings.get(id)?.clone()
    };

    outbox.extend(composer.booking_updated(&booking, &provider, &requester));
    Ok(booking)
}

/// The slot a moved booking links to.
///
/// An exact match wins, then the current slot if it still covers `target`, then the
/// first covering slot.
fn link_for(ledger: &Ledger, current: &Booking, target: &Window) -> Result<SlotId> {
    let provider = &current.provider;
    let linked = current
        .slot
        .and_then(|id| ledger.availability.slot(provider, id).ok());

    if let Some(slot) = linked.as_ref().filter(|s| s.window == *target) {
        return Ok(slot.id);
    }
    if let Some(id) = ledger.availability.find_exact(provider, target)? {
        return Ok(id);
    }
    if let Some(slot) = linked.filter(|s| s.window.contains(target)) {
        return Ok(slot.id);
    }
    ledger
        .availability
        .find_covering(provider, target)?
        .ok_or(EngineError::SlotUnavailable(*target))
}

/// Cancel a booking on behalf of its requester or its provider.
///
/// Returns the booking as it was before removal.
pub fn delete_booking(
    ledger: &mut Ledger,
    principal: &Principal,
    id: BookingId,
    composer: &Composer,
    outbox: &mut Vec<Notification>,
) -> Result<Booking> {
    let booking = ledger.bookings.get(id)?;
    if !principal.is_requester(&booking.requester) && !principal.is_provider(&booking.provider) {
        return Err(EngineError::NotAuthorized(
            "only the booking's requester or provider can cancel it".to_string(),
        ));
    }
    let provider = ledger.provider_contact(&booking.provider)?;
    let requester = ledger.requester_contact(&booking.requester)?;

    let removed = ledger.bookings.remove(id)?;
    debug!(booking = %id, window = %removed.window, by = %principal, "booking cancelled");
    outbox.extend(composer.booking_cancelled(&removed, &provider, &requester));
    Ok(removed)
}
