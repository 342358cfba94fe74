//! The complete mutable state of one engine.

use crate::availability::AvailabilityStore;
use crate::booking::BookingStore;
use crate::directory::{Contact, Directory, Provider, ProviderId, Requester, RequesterId};
use crate::error::Result;

/// Directory, availability and bookings, mutated together under one lock.
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    pub directory: Directory,
    pub availability: AvailabilityStore,
    pub bookings: BookingStore,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider and open its (empty) slot collection.
    pub fn add_provider(&mut self, provider: Provider) -> Result<()> {
        let id = provider.id.clone();
        self.directory.add_provider(provider)?;
        self.availability.register(id);
        Ok(())
    }

    pub fn add_requester(&mut self, requester: Requester) -> Result<()> {
        self.directory.add_requester(requester)
    }

    pub fn provider_contact(&self, id: &ProviderId) -> Result<Contact> {
        self.directory.provider(id).map(Contact::from)
    }

    pub fn requester_contact(&self, id: &RequesterId) -> Result<Contact> {
        self.directory.requester(id).map(Contact::from)
    }
}
