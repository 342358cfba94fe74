//! Error types for booking-engine operations.

use thiserror::Error;

use crate::booking::BookingId;
use crate::directory::{ProviderId, RequesterId};
use crate::slot::{SlotId, Window};

/// Coarse classification of an [`EngineError`], used by callers to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A provider, requester, slot or booking does not exist.
    NotFound,
    /// The caller is not the owning party.
    Unauthorized,
    /// The requested window is unavailable or already taken.
    Conflict,
    /// The input itself is malformed.
    Invalid,
    /// Storage failure. Details are logged, never shown to the caller.
    Internal,
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Provider not found: {0}")]
    ProviderNotFound(ProviderId),

    #[error("Requester not found: {0}")]
    RequesterNotFound(RequesterId),

    #[error("Slot {slot} not found for provider {provider}")]
    SlotNotFound { provider: ProviderId, slot: SlotId },

    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),

    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("This slot is not available: {0}")]
    SlotUnavailable(Window),

    #[error("This slot is already booked: {0}")]
    SlotAlreadyBooked(Window),

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Invalid day: {0}")]
    InvalidDay(String),

    #[error("Invalid principal: {0}")]
    InvalidPrincipal(String),

    #[error("Already registered: {0}")]
    DuplicateParty(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ProviderNotFound(_)
            | Self::RequesterNotFound(_)
            | Self::SlotNotFound { .. }
            | Self::BookingNotFound(_) => ErrorKind::NotFound,
            Self::NotAuthorized(_) => ErrorKind::Unauthorized,
            Self::SlotUnavailable(_) | Self::SlotAlreadyBooked(_) => ErrorKind::Conflict,
            Self::InvalidTimeRange(_)
            | Self::InvalidDay(_)
            | Self::InvalidPrincipal(_)
            | Self::DuplicateParty(_) => ErrorKind::Invalid,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to hand back to the caller. Internal details are replaced with a
    /// generic text; everything else is returned verbatim.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "Internal error".to_string(),
            _ => self.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
