//! The engine: every booking and availability operation behind one lock.
//!
//! Each call takes the ledger lock once, runs validation, the mutation and any cascade
//! inside that critical section, releases the lock, and only then hands the produced
//! notifications to the dispatcher. A slot edit and the booking rewrites it causes are
//! therefore never observable half-applied, and a slow or failing notification sink
//! cannot hold up or undo a committed change.

use std::sync::{Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, error, info};

use crate::booking::{Booking, BookingId};
use crate::cascade::{self, CascadeReport};
use crate::config::EngineConfig;
use crate::conflict::{self, BookingRequest, BookingUpdate};
use crate::directory::{Principal, Provider, ProviderId, Requester, RequesterId};
use crate::dispatch::Dispatcher;
use crate::error::{EngineError, ErrorKind, Result};
use crate::freebusy;
use crate::ledger::Ledger;
use crate::notify::{Composer, Notification};
use crate::overlap::{self, SlotOverlap};
use crate::slot::{Slot, SlotId, Window};
use crate::snapshot::Snapshot;

/// Outcome of a slot edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotUpdate {
    pub slot: Slot,
    pub previous: Window,
    pub cascade: CascadeReport,
}

/// Outcome of a slot deletion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotRemoval {
    pub slot: Slot,
    pub cascade: CascadeReport,
}

/// A booking with the public profiles of both parties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingDetails {
    pub booking: Booking,
    pub provider: Provider,
    pub requester: Requester,
}

pub struct Engine {
    ledger: Mutex<Ledger>,
    composer: Composer,
    dispatcher: Dispatcher,
}

impl Engine {
    pub fn new(config: &EngineConfig, dispatcher: Dispatcher) -> Self {
        Self::with_ledger(Ledger::new(), config, dispatcher)
    }

    pub fn with_ledger(ledger: Ledger, config: &EngineConfig, dispatcher: Dispatcher) -> Self {
        Self {
            ledger: Mutex::new(ledger),
            composer: config.notifications.composer(),
            dispatcher,
        }
    }

    pub fn from_snapshot(
        snapshot: Snapshot,
        config: &EngineConfig,
        dispatcher: Dispatcher,
    ) -> Result<Self> {
        let ledger = logged("restore", snapshot.restore())?;
        Ok(Self::with_ledger(ledger, config, dispatcher))
    }

    pub fn snapshot(&self) -> Result<Snapshot> {
        let ledger = self.lock()?;
        Ok(Snapshot::capture(&ledger))
    }

    fn lock(&self) -> Result<MutexGuard<'_, Ledger>> {
        self.ledger
            .lock()
            .map_err(|_| EngineError::Internal("ledger lock poisoned".to_string()))
    }

    fn flush(&self, outbox: Vec<Notification>) {
        for notification in outbox {
            self.dispatcher.dispatch(notification);
        }
    }

    // ── Directory ───────────────────────────────────────────────────────────

    pub fn register_provider(&self, provider: Provider) -> Result<()> {
        let id = provider.id.clone();
        let result = self.lock().and_then(|mut ledger| ledger.add_provider(provider));
        if result.is_ok() {
            info!(provider = %id, "provider registered");
        }
        logged("register_provider", result)
    }

    pub fn register_requester(&self, requester: Requester) -> Result<()> {
        let id = requester.id.clone();
        let result = self.lock().and_then(|mut ledger| ledger.add_requester(requester));
        if result.is_ok() {
            info!(requester = %id, "requester registered");
        }
        logged("register_requester", result)
    }

    pub fn provider(&self, id: &ProviderId) -> Result<Provider> {
        logged("provider", self.lock().and_then(|ledger| ledger.directory.provider(id).cloned()))
    }

    pub fn requester(&self, id: &RequesterId) -> Result<Requester> {
        logged("requester", self.lock().and_then(|ledger| ledger.directory.requester(id).cloned()))
    }

    pub fn providers(&self) -> Result<Vec<Provider>> {
        let ledger = self.lock()?;
        Ok(ledger.directory.providers().cloned().collect())
    }

    // ── Availability ────────────────────────────────────────────────────────

    pub fn add_slots(
        &self,
        principal: &Principal,
        provider: &ProviderId,
        windows: &[Window],
    ) -> Result<Vec<Slot>> {
        let result = self.lock().and_then(|mut ledger| {
            authorize_slot_owner(&ledger, principal, provider)?;
            ledger.availability.add_slots(provider, windows)
        });
        if let Ok(slots) = &result {
            info!(provider = %provider, count = slots.len(), "slots published");
        }
        logged("add_slots", result)
    }

    /// Edit a slot in place and move the booking held on its old window.
    pub fn update_slot(
        &self,
        principal: &Principal,
        provider: &ProviderId,
        slot: SlotId,
        window: Window,
    ) -> Result<SlotUpdate> {
        let mut outbox = Vec::new();
        let result = self.lock().and_then(|mut guard| {
            let ledger = &mut *guard;
            authorize_slot_owner(ledger, principal, provider)?;
            let change = ledger.availability.update_slot(provider, slot, window)?;
            let cascade = cascade::on_slot_updated(
                &mut ledger.bookings,
                &ledger.availability,
                &ledger.directory,
                &change,
                &self.composer,
                &mut outbox,
            );
            Ok(SlotUpdate {
                slot: Slot {
                    id: slot,
                    window: change.new,
                },
                previous: change.old,
                cascade,
            })
        });
        self.flush(outbox);

        if let Ok(update) = &result {
            info!(
                provider = %provider,
                slot = %slot,
                from = %update.previous,
                to = %update.slot.window,
                updated = update.cascade.updated.len(),
                cancelled = update.cascade.cancelled.len(),
                "slot updated"
            );
        }
        logged("update_slot", result)
    }

    /// Remove a slot and cancel the booking held on its window.
    pub fn delete_slot(
        &self,
        principal: &Principal,
        provider: &ProviderId,
        slot: SlotId,
    ) -> Result<SlotRemoval> {
        let mut outbox = Vec::new();
        let result = self.lock().and_then(|mut guard| {
            let ledger = &mut *guard;
            authorize_slot_owner(ledger, principal, provider)?;
            let removed = ledger.availability.delete_slot(provider, slot)?;
            let cascade = cascade::on_slot_deleted(
                &mut ledger.bookings,
                &ledger.availability,
                &ledger.directory,
                &removed,
                &self.composer,
                &mut outbox,
            );
            Ok(SlotRemoval {
                slot: Slot {
                    id: slot,
                    window: removed.window,
                },
                cascade,
            })
        });
        self.flush(outbox);

        if let Ok(removal) = &result {
            info!(
                provider = %provider,
                slot = %slot,
                window = %removal.slot.window,
                cancelled = removal.cascade.cancelled.len(),
                "slot deleted"
            );
        }
        logged("delete_slot", result)
    }

    pub fn list_slots(&self, provider: &ProviderId) -> Result<Vec<Slot>> {
        logged("list_slots", self.lock().and_then(|ledger| ledger.availability.slots(provider)))
    }

    /// Published slots with no booking of an identical window.
    pub fn list_free_slots(&self, provider: &ProviderId) -> Result<Vec<Slot>> {
        let result = self.lock().and_then(|ledger| {
            let slots = ledger.availability.slots(provider)?;
            let booked = ledger.bookings.booked_windows(provider);
            Ok(freebusy::find_free_slots(&slots, &booked))
        });
        logged("list_free_slots", result)
    }

    /// The first free slot lasting at least `min_duration_minutes`.
    pub fn next_free_slot(
        &self,
        provider: &ProviderId,
        min_duration_minutes: i64,
    ) -> Result<Option<Slot>> {
        let result = self.lock().and_then(|ledger| {
            let slots = ledger.availability.slots(provider)?;
            let booked = ledger.bookings.booked_windows(provider);
            Ok(freebusy::find_first_free_slot(
                &slots,
                &booked,
                min_duration_minutes,
            ))
        });
        logged("next_free_slot", result)
    }

    pub fn overlapping_slots(&self, provider: &ProviderId) -> Result<Vec<SlotOverlap>> {
        let result = self
            .lock()
            .and_then(|ledger| ledger.availability.slots(provider))
            .map(|slots| overlap::find_overlaps(&slots));
        logged("overlapping_slots", result)
    }

    // ── Bookings ────────────────────────────────────────────────────────────

    pub fn create_booking(&self, principal: &Principal, request: BookingRequest) -> Result<Booking> {
        let mut outbox = Vec::new();
        let result = self.lock().and_then(|mut ledger| {
            conflict::create_booking(&mut ledger, principal, request, &self.composer, &mut outbox)
        });
        self.flush(outbox);

        if let Ok(booking) = &result {
            info!(
                booking = %booking.id,
                provider = %booking.provider,
                requester = %booking.requester,
                window = %booking.window,
                "booking created"
            );
        }
        logged("create_booking", result)
    }

    pub fn booking(&self, id: BookingId) -> Result<Booking> {
        logged("booking", self.lock().and_then(|ledger| ledger.bookings.get(id).cloned()))
    }

    /// A booking together with its provider's and requester's profiles.
    pub fn booking_details(&self, id: BookingId) -> Result<BookingDetails> {
        let result = self.lock().and_then(|ledger| {
            let booking = ledger.bookings.get(id)?.clone();
            let provider = ledger.directory.provider(&booking.provider)?.clone();
            let requester = ledger.directory.requester(&booking.requester)?.clone();
            Ok(BookingDetails {
                booking,
                provider,
                requester,
            })
        });
        logged("booking_details", result)
    }

    pub fn bookings_for_requester(&self, requester: &RequesterId) -> Result<Vec<Booking>> {
        let result = self.lock().and_then(|ledger| {
            ledger.directory.requester(requester)?;
            Ok(ledger.bookings.by_requester(requester))
        });
        logged("bookings_for_requester", result)
    }

    pub fn bookings_for_provider(&self, provider: &ProviderId) -> Result<Vec<Booking>> {
        let result = self.lock().and_then(|ledger| {
            ledger.directory.provider(provider)?;
            Ok(ledger.bookings.by_provider(provider))
        });
        logged("bookings_for_provider", result)
    }

    pub fn update_booking(
        &self,
        principal: &Principal,
        id: BookingId,
        update: BookingUpdate,
    ) -> Result<Booking> {
        let mut outbox = Vec::new();
        let result = self.lock().and_then(|mut ledger| {
            conflict::update_booking(&mut ledger, principal, id, update, &self.composer, &mut outbox)
        });
        self.flush(outbox);

        if let Ok(booking) = &result {
            info!(booking = %booking.id, window = %booking.window, "booking updated");
        }
        logged("update_booking", result)
    }

    pub fn delete_booking(&self, principal: &Principal, id: BookingId) -> Result<Booking> {
        let mut outbox = Vec::new();
        let result = self.lock().and_then(|mut ledger| {
            conflict::delete_booking(&mut ledger, principal, id, &self.composer, &mut outbox)
        });
        self.flush(outbox);

        if let Ok(booking) = &result {
            info!(booking = %booking.id, by = %principal, "booking cancelled");
        }
        logged("delete_booking", result)
    }
}

fn authorize_slot_owner(ledger: &Ledger, principal: &Principal, provider: &ProviderId) -> Result<()> {
    ledger.directory.provider(provider)?;
    if !principal.is_provider(provider) {
        return Err(EngineError::NotAuthorized(format!(
            "only provider {} can change its availability",
            provider
        )));
    }
    Ok(())
}

/// Log a failed operation: storage failures in full at error level, rejections
/// (not found, conflict, unauthorized, invalid) at debug level.
fn logged<T>(op: &'static str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        match err.kind() {
            ErrorKind::Internal => error!(op, error = ?err, "operation failed"),
            kind => debug!(op, ?kind, error = %err, "operation rejected"),
        }
    }
    result
}
