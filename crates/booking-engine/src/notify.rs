//! Notification messages and the external sink they are delivered to.
//!
//! The engine never talks to a mail server. It composes [`Notification`]s, hands them
//! to the [`crate::dispatch::Dispatcher`], and moves on; a [`NotificationSink`]
//! implementation does the actual delivery. Delivery failures are logged by the
//! dispatcher and never reach the operation that produced the message.

use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::booking::{Booking, BookingId};
use crate::directory::Contact;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    BookingCreated,
    BookingUpdated,
    BookingCancelled,
}

/// One message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub booking: BookingId,
    pub recipient: Contact,
    pub subject: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

#[derive(Error, Debug)]
pub enum NotifyError {
    /// Transient; the dispatcher retries.
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// Permanent; retrying cannot help.
    #[error("Recipient rejected: {0}")]
    Rejected(String),
}

/// Delivers notifications to people. Implementations own their own timeouts.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Writes each notification to the tracing log instead of sending it.
#[derive(Debug, Clone)]
pub struct LogSink {
    sender: String,
}

impl LogSink {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for LogSink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        info!(
            from = %self.sender,
            to = %notification.recipient.email,
            kind = ?notification.kind,
            booking = %notification.booking,
            subject = %notification.subject,
            "{}",
            notification.text
        );
        Ok(())
    }
}

/// Keeps every delivered notification in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    delivered: Mutex<Vec<Notification>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, in delivery order.
    pub fn delivered(&self) -> Vec<Notification> {
        match self.delivered.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Delivered notifications addressed to one email.
    pub fn delivered_to(&self, email: &str) -> Vec<Notification> {
        self.delivered()
            .into_iter()
            .filter(|n| n.recipient.email == email)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for MemorySink {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        match self.delivered.lock() {
            Ok(mut guard) => guard.push(notification.clone()),
            Err(poisoned) => poisoned.into_inner().push(notification.clone()),
        }
        Ok(())
    }
}

/// Builds the subject and body of each notification.
#[derive(Debug, Clone, Default)]
pub struct Composer {
    subject_prefix: String,
}

impl Composer {
    pub fn new(subject_prefix: impl Into<String>) -> Self {
        Self {
            subject_prefix: subject_prefix.into(),
        }
    }

    fn message(
        &self,
        kind: NotificationKind,
        booking: BookingId,
        recipient: &Contact,
        subject: &str,
        text: String,
    ) -> Notification {
        let html = format!(
            "<p>Hello {},</p><p>{}</p>",
            escape_html(&recipient.name),
            escape_html(&text)
        );
        Notification {
            kind,
            booking,
            recipient: recipient.clone(),
            subject: format!("{}{}", self.subject_prefix, subject),
            text: format!("Hello {},\n\n{}", recipient.name, text),
            html: Some(html),
        }
    }

    /// A reservation was made: tell both parties.
    pub fn booking_created(
        &self,
        booking: &Booking,
        provider: &Contact,
        requester: &Contact,
    ) -> Vec<Notification> {
        vec![
            self.message(
                NotificationKind::BookingCreated,
                booking.id,
                requester,
                "Booking confirmed",
                format!(
                    "Your meeting with {} on {} is confirmed.",
                    provider.name, booking.window
                ),
            ),
            self.message(
                NotificationKind::BookingCreated,
                booking.id,
                provider,
                "New booking",
                format!("{} booked your slot on {}.", requester.name, booking.window),
            ),
        ]
    }

    /// The requester changed the booking: tell both parties.
    pub fn booking_updated(
        &self,
        booking: &Booking,
        provider: &Contact,
        requester: &Contact,
    ) -> Vec<Notification> {
        vec![
            self.message(
                NotificationKind::BookingUpdated,
                booking.id,
                requester,
                "Booking updated",
                format!(
                    "Your meeting with {} is now on {}.",
                    provider.name, booking.window
                ),
            ),
            self.message(
                NotificationKind::BookingUpdated,
                booking.id,
                provider,
                "Booking updated",
                format!(
                    "{} moved their booking to {}.",
                    requester.name, booking.window
                ),
            ),
        ]
    }

    /// A party cancelled the booking. `booking` is the record as it was before removal.
    pub fn booking_cancelled(
        &self,
        booking: &Booking,
        provider: &Contact,
        requester: &Contact,
    ) -> Vec<Notification> {
        vec![
            self.message(
                NotificationKind::BookingCancelled,
                booking.id,
                requester,
                "Booking cancelled",
                format!(
                    "Your meeting with {} on {} has been cancelled.",
                    provider.name, booking.window
                ),
            ),
            self.message(
                NotificationKind::BookingCancelled,
                booking.id,
                provider,
                "Booking cancelled",
                format!(
                    "The booking by {} on {} has been cancelled.",
                    requester.name, booking.window
                ),
            ),
        ]
    }

    /// The provider edited the slot under the booking.
    pub fn slot_moved(&self, booking: &Booking, requester: &Contact) -> Notification {
        self.message(
            NotificationKind::BookingUpdated,
            booking.id,
            requester,
            "Booking time changed",
            format!(
                "The provider changed your booked slot. Your meeting is now on {}.",
                booking.window
            ),
        )
    }

    /// The provider withdrew the slot under the booking.
    pub fn slot_withdrawn(&self, booking: &Booking, requester: &Contact) -> Notification {
        self.message(
            NotificationKind::BookingCancelled,
            booking.id,
            requester,
            "Booking cancelled",
            format!(
                "The provider removed the slot on {}. Your booking has been cancelled.",
                booking.window
            ),
        )
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
