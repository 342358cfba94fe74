//! Serializable image of a ledger.
//!
//! A snapshot is how the engine is persisted between runs. Restoring re-validates
//! every cross-reference, so a hand-edited or truncated file cannot produce a ledger
//! that breaks the booking invariants.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::booking::Booking;
use crate::directory::{Provider, Requester};
use crate::error::{EngineError, Result};
use crate::ledger::Ledger;
use crate::slot::Slot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderRecord {
    #[serde(flatten)]
    pub profile: Provider,
    #[serde(default)]
    pub slots: Vec<Slot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub providers: Vec<ProviderRecord>,
    #[serde(default)]
    pub requesters: Vec<Requester>,
    #[serde(default)]
    pub bookings: Vec<Booking>,
}

impl Snapshot {
    pub fn capture(ledger: &Ledger) -> Self {
        let providers = ledger
            .directory
            .providers()
            .map(|profile| ProviderRecord {
                profile: profile.clone(),
                slots: ledger.availability.slots(&profile.id).unwrap_or_default(),
            })
            .collect();

        Self {
            providers,
            requesters: ledger.directory.requesters().cloned().collect(),
            bookings: ledger.bookings.iter().cloned().collect(),
        }
    }

    /// Rebuild a ledger. Any dangling or inconsistent reference is an `Internal` error.
    pub fn restore(self) -> Result<Ledger> {
        self.rebuild().map_err(|err| match err {
            EngineError::Internal(_) => err,
            other => corrupt(other.to_string()),
        })
    }

    fn rebuild(self) -> Result<Ledger> {
        let mut ledger = Ledger::new();
        let mut slot_ids = HashSet::new();

        for record in self.providers {
            let id = record.profile.id.clone();
            ledger.add_provider(record.profile)?;
            for slot in record.slots {
                if !slot_ids.insert(slot.id) {
                    return Err(corrupt(format!("slot id {} used twice", slot.id)));
                }
                ledger.availability.restore_slot(&id, slot)?;
            }
        }
        for requester in self.requesters {
            ledger.add_requester(requester)?;
        }
        for booking in self.bookings {
            ledger.directory.requester(&booking.requester)?;
            ledger.directory.provider(&booking.provider)?;
            if let Some(id) = booking.slot {
                let slot = ledger.availability.slot(&booking.provider, id)?;
                if !slot.window.contains(&booking.window) {
                    return Err(corrupt(format!(
                        "booking {} ({}) lies outside slot {} ({})",
                        booking.id, booking.window, slot.id, slot.window
                    )));
                }
            }
            ledger.bookings.restore(booking)?;
        }

        Ok(ledger)
    }
}

fn corrupt(detail: String) -> EngineError {
    EngineError::Internal(format!("corrupt snapshot: {}", detail))
}
