//! Per-provider collections of published slots.
//!
//! Slots are addressed by a generated [`SlotId`], never by position: removing one slot
//! leaves every other id valid. Ids grow monotonically, so iterating a provider's map
//! yields slots in the order they were published.

use std::collections::{BTreeMap, HashMap};

use crate::directory::ProviderId;
use crate::error::{EngineError, Result};
use crate::slot::{Slot, SlotId, Window};

/// Result of an in-place slot edit: both windows, for the cascade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotChange {
    pub provider: ProviderId,
    pub slot: SlotId,
    pub old: Window,
    pub new: Window,
}

/// A slot that was just removed, with the window it had.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedSlot {
    pub provider: ProviderId,
    pub slot: SlotId,
    pub window: Window,
}

#[derive(Debug, Clone, Default)]
pub struct AvailabilityStore {
    next_id: u64,
    providers: HashMap<ProviderId, BTreeMap<SlotId, Window>>,
}

impl AvailabilityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an empty slot collection for a provider. Existing collections are kept.
    pub fn register(&mut self, provider: ProviderId) {
        self.providers.entry(provider).or_default();
    }

    fn slots_of(&self, provider: &ProviderId) -> Result<&BTreeMap<SlotId, Window>> {
        self.providers
            .get(provider)
            .ok_or_else(|| EngineError::ProviderNotFound(provider.clone()))
    }

    fn slots_of_mut(&mut self, provider: &ProviderId) -> Result<&mut BTreeMap<SlotId, Window>> {
        self.providers
            .get_mut(provider)
            .ok_or_else(|| EngineError::ProviderNotFound(provider.clone()))
    }

    fn allocate_id(&mut self) -> SlotId {
        self.next_id += 1;
        SlotId(self.next_id)
    }

    /// Append slots to a provider's collection.
    ///
    /// No uniqueness check is made against existing slots: identical or overlapping
    /// windows are accepted as published. Use [`crate::overlap::find_overlaps`] to
    /// report them.
    pub fn add_slots(&mut self, provider: &ProviderId, windows: &[Window]) -> Result<Vec<Slot>> {
        // Fail before allocating ids for an unknown provider.
        self.slots_of(provider)?;

        let added: Vec<Slot> = windows
            .iter()
            .map(|window| Slot {
                id: self.allocate_id(),
                window: *window,
            })
            .collect();

        let slots = self.slots_of_mut(provider)?;
        for slot in &added {
            slots.insert(slot.id, slot.window);
        }
        Ok(added)
    }

    /// Replace the window of one slot, returning the old and new windows.
    pub fn update_slot(
        &mut self,
        provider: &ProviderId,
        slot: SlotId,
        window: Window,
    ) -> Result<SlotChange> {
        let slots = self.slots_of_mut(provider)?;
        let current = slots.get_mut(&slot).ok_or_else(|| EngineError::SlotNotFound {
            provider: provider.clone(),
            slot,
        })?;
        let old = std::mem::replace(current, window);
        Ok(SlotChange {
            provider: provider.clone(),
            slot,
            old,
            new: window,
        })
    }

    pub fn delete_slot(&mut self, provider: &ProviderId, slot: SlotId) -> Result<RemovedSlot> {
        let window = self
            .slots_of_mut(provider)?
            .remove(&slot)
            .ok_or_else(|| EngineError::SlotNotFound {
                provider: provider.clone(),
                slot,
            })?;
        Ok(RemovedSlot {
            provider: provider.clone(),
            slot,
            window,
        })
    }

    pub fn slot(&self, provider: &ProviderId, slot: SlotId) -> Result<Slot> {
        self.slots_of(provider)?
            .get(&slot)
            .map(|window| Slot { id: slot, window: *window })
            .ok_or_else(|| EngineError::SlotNotFound {
                provider: provider.clone(),
                slot,
            })
    }

    /// All of a provider's slots in publication order.
    pub fn slots(&self, provider: &ProviderId) -> Result<Vec<Slot>> {
        Ok(self
            .slots_of(provider)?
            .iter()
            .map(|(id, window)| Slot {
                id: *id,
                window: *window,
            })
            .collect())
    }

    /// First published slot whose window equals `window` exactly.
    pub fn find_exact(&self, provider: &ProviderId, window: &Window) -> Result<Option<SlotId>> {
        Ok(self
            .slots_of(provider)?
            .iter()
            .find(|(_, published)| *published == window)
            .map(|(id, _)| *id))
    }

    /// First published slot whose window contains `window`.
    pub fn find_covering(&self, provider: &ProviderId, window: &Window) -> Result<Option<SlotId>> {
        Ok(self
            .slots_of(provider)?
            .iter()
            .find(|(_, published)| published.contains(window))
            .map(|(id, _)| *id))
    }

    /// Reinsert a slot under its original id (snapshot restore).
    pub(crate) fn restore_slot(&mut self, provider: &ProviderId, slot: Slot) -> Result<()> {
        let slots = self.slots_of_mut(provider)?;
        if slots.insert(slot.id, slot.window).is_some() {
            return Err(EngineError::Internal(format!(
                "duplicate slot id {} in snapshot",
                slot.id
            )));
        }
        self.next_id = self.next_id.max(slot.id.0);
        Ok(())
    }
}
