//! Booking records and the slot-key unique index.
//!
//! The store refuses to hold two bookings with the same (provider, window) key. The
//! check and the insert happen in one step on the index, so a second reservation of a
//! held key fails deterministically instead of racing a prior read.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directory::{ProviderId, RequesterId};
use crate::error::{EngineError, Result};
use crate::slot::{SlotId, SlotKey, Window};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(pub u64);

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A requester's reservation.
///
/// `window` is a value copy taken when the booking was made (or last moved). `slot`
/// links the booking to a published slot that covers it; a narrowed booking whose slot
/// was edited or deleted away keeps its window and may be left without one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub requester: RequesterId,
    pub provider: ProviderId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<SlotId>,
    pub window: Window,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn key(&self) -> SlotKey {
        SlotKey::new(self.provider.clone(), self.window)
    }
}

/// Fields for a booking that has passed validation.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub requester: RequesterId,
    pub provider: ProviderId,
    pub slot: SlotId,
    pub window: Window,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BookingStore {
    next_id: u64,
    bookings: BTreeMap<BookingId, Booking>,
    index: HashMap<SlotKey, BookingId>,
}

impl BookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a booking, claiming its slot key.
    ///
    /// Fails with `SlotAlreadyBooked` when another booking holds the key.
    pub fn insert(&mut self, new: NewBooking, now: DateTime<Utc>) -> Result<&Booking> {
        let key = SlotKey::new(new.provider.clone(), new.window);
        let id = BookingId(self.next_id + 1);
        match self.index.entry(key) {
            Entry::Occupied(_) => return Err(EngineError::SlotAlreadyBooked(new.window)),
            Entry::Vacant(vacant) => {
                vacant.insert(id);
            }
        }
        self.next_id = id.0;

        let booking = Booking {
            id,
            requester: new.requester,
            provider: new.provider,
            slot: Some(new.slot),
            window: new.window,
            title: new.title,
            description: new.description,
            created_at: now,
            updated_at: now,
        };
        Ok(&*self.bookings.entry(id).or_insert(booking))
    }

    pub fn get(&self, id: BookingId) -> Result<&Booking> {
        self.bookings
            .get(&id)
            .ok_or(EngineError::BookingNotFound(id))
    }

    pub fn remove(&mut self, id: BookingId) -> Result<Booking> {
        let booking = self
            .bookings
            .remove(&id)
            .ok_or(EngineError::BookingNotFound(id))?;
        self.index.remove(&booking.key());
        Ok(booking)
    }

    /// Move a booking to a new window (and slot link), keeping the key unique.
    ///
    /// Moving onto the key the booking already holds is a no-op apart from the slot
    /// link and timestamp.
    pub fn retime(
        &mut self,
        id: BookingId,
        slot: SlotId,
        window: Window,
        now: DateTime<Utc>,
    ) -> Result<&Booking> {
        let booking = self
            .bookings
            .get_mut(&id)
            .ok_or(EngineError::BookingNotFound(id))?;
        let old_key = booking.key();
        let new_key = SlotKey::new(booking.provider.clone(), window);

        if new_key != old_key {
            match self.index.entry(new_key) {
                Entry::Occupied(_) => return Err(EngineError::SlotAlreadyBooked(window)),
                Entry::Vacant(vacant) => {
                    vacant.insert(id);
                }
            }
            self.index.remove(&old_key);
        }

        booking.slot = Some(slot);
        booking.window = window;
        booking.updated_at = now;
        Ok(&*booking)
    }

    /// Overwrite title and/or description. `None` leaves a field as it is.
    pub fn set_details(
        &mut self,
        id: BookingId,
        title: Option<String>,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<&Booking> {
        let booking = self
            .bookings
            .get_mut(&id)
            .ok_or(EngineError::BookingNotFound(id))?;
        if title.is_some() {
            booking.title = title;
        }
        if description.is_some() {
            booking.description = description;
        }
        booking.updated_at = now;
        Ok(&*booking)
    }

    /// Point a booking at another covering slot, or at none. The window is unchanged.
    pub fn relink(&mut self, id: BookingId, slot: Option<SlotId>) -> Result<()> {
        let booking = self
            .bookings
            .get_mut(&id)
            .ok_or(EngineError::BookingNotFound(id))?;
        booking.slot = slot;
        Ok(())
    }

    /// The booking holding exactly this key, if any.
    pub fn holder(&self, provider: &ProviderId, window: Window) -> Option<BookingId> {
        self.index
            .get(&SlotKey::new(provider.clone(), window))
            .copied()
    }

    /// Windows held by a provider's active bookings.
    pub fn booked_windows(&self, provider: &ProviderId) -> HashSet<Window> {
        self.index
            .keys()
            .filter(|key| &key.provider == provider)
            .map(|key| key.window)
            .collect()
    }

    /// Ids of the bookings linked to one slot, in booking order.
    pub fn linked_to(&self, provider: &ProviderId, slot: SlotId) -> Vec<BookingId> {
        self.bookings
            .values()
            .filter(|b| &b.provider == provider && b.slot == Some(slot))
            .map(|b| b.id)
            .collect()
    }

    pub fn by_requester(&self, requester: &RequesterId) -> Vec<Booking> {
        self.bookings
            .values()
            .filter(|b| &b.requester == requester)
            .cloned()
            .collect()
    }

    pub fn by_provider(&self, provider: &ProviderId) -> Vec<Booking> {
        self.bookings
            .values()
            .filter(|b| &b.provider == provider)
            .cloned()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Booking> {
        self.bookings.values()
    }

    /// Reinsert a booking under its original id (snapshot restore).
    pub(crate) fn restore(&mut self, booking: Booking) -> Result<()> {
        if self.bookings.contains_key(&booking.id) {
            return Err(EngineError::Internal(format!(
                "duplicate booking id {} in snapshot",
                booking.id
            )));
        }
        match self.index.entry(booking.key()) {
            Entry::Occupied(held) => {
                return Err(EngineError::Internal(format!(
                    "bookings {} and {} in snapshot both hold {}",
                    held.get(),
                    booking.id,
                    booking.window
                )))
            }
            Entry::Vacant(vacant) => {
                vacant.insert(booking.id);
            }
        }
        self.next_id = self.next_id.max(booking.id.0);
        self.bookings.insert(booking.id, booking);
        Ok(())
    }
}
