//! # booking-engine
//!
//! Keeps a provider's published availability slots and the bookings made against them
//! mutually consistent.
//!
//! Providers publish atomic slots (a day plus a start/end time). Requesters reserve a
//! slot, which produces a booking holding a value copy of the slot's window and a link
//! to the slot's stable id. Editing or deleting a slot cascades into the booking that
//! holds the slot's window, and each change is reported to both parties through an
//! asynchronous notification queue that never blocks or fails the triggering operation.
//!
//! ## Modules
//!
//! - [`slot`]: `Day`, `Window`, `Slot` and the (provider, window) uniqueness key
//! - [`directory`]: provider/requester public profiles and the calling `Principal`
//! - [`availability`]: per-provider slot collections keyed by stable id
//! - [`booking`]: booking records with a unique index on the slot key
//! - [`conflict`]: create/update/delete validation for bookings
//! - [`cascade`]: propagate slot edits and deletes into the bookings on their windows
//! - [`freebusy`]: free (unbooked) slot computation
//! - [`overlap`]: detect overlapping published slots
//! - [`notify`]: notification messages, the sink trait, and stock sinks
//! - [`dispatch`]: background delivery queue with retry/backoff
//! - [`ledger`]: directory, availability and bookings held together
//! - [`engine`]: the thread-safe operation surface tying everything together
//! - [`snapshot`]: serializable image of the whole engine state
//! - [`config`]: engine configuration
//! - [`error`]: error types

pub mod availability;
pub mod booking;
pub mod cascade;
pub mod config;
pub mod conflict;
pub mod directory;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod freebusy;
pub mod ledger;
pub mod notify;
pub mod overlap;
pub mod slot;
pub mod snapshot;

pub use booking::{Booking, BookingId};
pub use config::EngineConfig;
pub use conflict::{BookingRequest, BookingUpdate};
pub use directory::{Principal, Provider, ProviderId, Requester, RequesterId, Role};
pub use dispatch::{Dispatcher, RetryPolicy};
pub use engine::{BookingDetails, Engine, SlotRemoval, SlotUpdate};
pub use error::{EngineError, ErrorKind};
pub use notify::{MemorySink, Notification, NotificationKind, NotificationSink};
pub use slot::{Day, Slot, SlotId, Window};
pub use snapshot::Snapshot;
