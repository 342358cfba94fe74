//! Detect overlapping slots within one provider's availability.
//!
//! Publishing overlapping slots is allowed; this is a report, not a guard. Adjacent
//! slots (where one ends exactly when another starts) are NOT overlaps.

use serde::Serialize;

use crate::slot::Slot;

/// Two published slots sharing part of the same day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotOverlap {
    pub first: Slot,
    pub second: Slot,
    pub overlap_minutes: i64,
}

/// Find every pair of slots whose windows overlap, in publication order.
///
/// Two slots overlap when they share a day and `a.start < b.end && b.start < a.end`.
/// Identical windows are reported with the full slot length as overlap.
pub fn find_overlaps(slots: &[Slot]) -> Vec<SlotOverlap> {
    let mut overlaps = Vec::new();

    for (i, a) in slots.iter().enumerate() {
        for b in &slots[i + 1..] {
            if let Some(overlap_minutes) = a.window.overlap_minutes(&b.window) {
                overlaps.push(SlotOverlap {
                    first: *a,
                    second: *b,
                    overlap_minutes,
                });
            }
        }
    }

    overlaps
}
