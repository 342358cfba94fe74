//! Propagate slot edits and deletions into the bookings on the slot's window.
//!
//! A slot change reaches exactly one booking: the one holding the slot's old window.
//! It is skipped only when it is linked to a surviving duplicate slot that still
//! publishes that window. Bookings narrowed to part of the slot keep their tuple; their
//! link is moved to another covering slot, or dropped when none is left.
//!
//! Both functions are idempotent: running one again with the same change leaves the
//! ledger as it is. The engine runs the slot mutation and its cascade under one lock;
//! idempotence means a cascade interrupted half-way can simply be re-run.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::availability::{AvailabilityStore, RemovedSlot, SlotChange};
use crate::booking::{Booking, BookingId, BookingStore};
use crate::directory::{Contact, Directory, ProviderId};
use crate::error::EngineError;
use crate::notify::{Composer, Notification};
use crate::slot::{SlotId, Window};

/// What a cascade did to the bookings of one slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub updated: Vec<BookingId>,
    pub cancelled: Vec<BookingId>,
}

impl CascadeReport {
    pub fn is_empty(&self) -> bool {
        self.updated.is_empty() && self.cancelled.is_empty()
    }
}

/// Rewrite the booking on `change.old` to `change.new`.
///
/// `availability` must already hold the edited slot. If the new window is held by
/// another booking the rewritten one is cancelled instead.
pub fn on_slot_updated(
    bookings: &mut BookingStore,
    availability: &AvailabilityStore,
    directory: &Directory,
    change: &SlotChange,
    composer: &Composer,
    outbox: &mut Vec<Notification>,
) -> CascadeReport {
    let mut report = CascadeReport::default();

    let held = on_window(bookings, availability, &change.provider, change.slot, change.old);
    if let Some(id) = held.filter(|_| change.old != change.new) {
        match bookings.retime(id, change.slot, change.new, Utc::now()).cloned() {
            Ok(booking) => {
                debug!(
                    booking = %id,
                    from = %change.old,
                    to = %change.new,
                    "booking follows slot edit"
                );
                if let Some(requester) = contact(directory, &booking) {
                    outbox.push(composer.slot_moved(&booking, &requester));
                }
                report.updated.push(id);
            }
            Err(EngineError::SlotAlreadyBooked(_)) => {
                warn!(
                    booking = %id,
                    window = %change.new,
                    "slot edit collides with another booking; cancelling"
                );
                cancel(bookings, directory, id, composer, outbox, &mut report);
            }
            Err(err) => warn!(booking = %id, error = %err, "cascade could not move booking"),
        }
    }

    settle_links(bookings, availability, &change.provider, change.slot);
    report
}

/// Cancel the booking on the removed slot's window.
///
/// `availability` must no longer hold the removed slot.
pub fn on_slot_deleted(
    bookings: &mut BookingStore,
    availability: &AvailabilityStore,
    directory: &Directory,
    removed: &RemovedSlot,
    composer: &Composer,
    outbox: &mut Vec<Notification>,
) -> CascadeReport {
    let mut report = CascadeReport::default();
    let held = on_window(bookings, availability, &removed.provider, removed.slot, removed.window);
    if let Some(id) = held {
        cancel(bookings, directory, id, composer, outbox, &mut report);
    }
    settle_links(bookings, availability, &removed.provider, removed.slot);
    report
}

/// The booking holding `window`, unless another slot still publishes it for that booking.
fn on_window(
    bookings: &BookingStore,
    availability: &AvailabilityStore,
    provider: &ProviderId,
    slot: SlotId,
    window: Window,
) -> Option<BookingId> {
    let id = bookings.holder(provider, window)?;
    match bookings.get(id).ok()?.slot {
        Some(other) if other != slot => {
            let survives = matches!(availability.slot(provider, other), Ok(s) if s.window == window);
            (!survives).then_some(id)
        }
        _ => Some(id),
    }
}

/// Relink bookings the slot no longer covers. Their windows are left alone.
fn settle_links(
    bookings: &mut BookingStore,
    availability: &AvailabilityStore,
    provider: &ProviderId,
    slot: SlotId,
) {
    let current = availability.slot(provider, slot).ok();
    for id in bookings.linked_to(provider, slot) {
        let Ok(window) = bookings.get(id).map(|b| b.window) else {
            continue;
        };
        if current.as_ref().is_some_and(|s| s.window.contains(&window)) {
            continue;
        }
        let link = availability.find_covering(provider, &window).ok().flatten();
        if let Err(err) = bookings.relink(id, link) {
            warn!(booking = %id, error = %err, "cascade could not relink booking");
            continue;
        }
        match link {
            Some(to) => debug!(booking = %id, from = %slot, to = %to, "booking relinked"),
            None => debug!(booking = %id, window = %window, "booking has no covering slot"),
        }
    }
}

/// Remove one booking and queue the requester's cancellation.
///
/// The contact is captured before removal; afterwards the booking is gone.
fn cancel(
    bookings: &mut BookingStore,
    directory: &Directory,
    id: BookingId,
    composer: &Composer,
    outbox: &mut Vec<Notification>,
    report: &mut CascadeReport,
) {
    let requester = match bookings.get(id) {
        Ok(booking) => contact(directory, booking),
        Err(_) => return,
    };
    match bookings.remove(id) {
        Ok(booking) => {
            debug!(booking = %id, window = %booking.window, "booking cancelled by slot change");
            if let Some(requester) = requester {
                outbox.push(composer.slot_withdrawn(&booking, &requester));
            }
            report.cancelled.push(id);
        }
        Err(err) => warn!(booking = %id, error = %err, "cascade could not cancel booking"),
    }
}

fn contact(directory: &Directory, booking: &Booking) -> Option<Contact> {
    match directory.requester(&booking.requester) {
        Ok(requester) => Some(Contact::from(requester)),
        Err(err) => {
            warn!(booking = %booking.id, error = %err, "no contact for requester; skipping notification");
            None
        }
    }
}
