//! Compute free (unbooked) slots.
//!
//! A slot is free when no active booking of the same provider holds a window equal to
//! the slot's window. Bookings narrowed to part of a slot do not make the slot busy;
//! only an exact reservation does, matching the exact-match rule used at creation.

use std::collections::HashSet;

use crate::slot::{Slot, Window};

/// Slots whose window is not held by any booking, in the order given.
pub fn find_free_slots(slots: &[Slot], booked: &HashSet<Window>) -> Vec<Slot> {
    slots
        .iter()
        .filter(|slot| !booked.contains(&slot.window))
        .copied()
        .collect()
}

/// The first free slot lasting at least `min_duration_minutes`.
///
/// Delegates to [`find_free_slots`] and returns the first slot meeting the minimum
/// duration requirement.
pub fn find_first_free_slot(
    slots: &[Slot],
    booked: &HashSet<Window>,
    min_duration_minutes: i64,
) -> Option<Slot> {
    find_free_slots(slots, booked)
        .into_iter()
        .find(|slot| slot.window.duration_minutes() >= min_duration_minutes)
}
