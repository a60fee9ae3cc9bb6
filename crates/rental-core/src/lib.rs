//! Rental Core - reservation status workflow.
//!
//! This crate implements the reservation lifecycle operations on top of
//! injected collaborators:
//!
//! - **Status updates** gated on the administrator flag, committed through a
//!   server-side procedure, followed by a best-effort customer email
//! - **History** of status changes, newest first
//! - **Details** of a reservation with customer and items joined
//! - **Change subscriptions** on the reservations table
//!
//! The collaborators are the traits in [`ports`]; `rental-client` provides
//! remote implementations and tests provide in-memory ones.

pub mod error;
pub mod notify;
pub mod ports;
pub mod pubsub;
pub mod service;

pub use error::{Error, MailError, NotifyError, StoreError};
pub use notify::{EmailMessage, EmailTemplate, TemplateData};
pub use ports::{Authenticator, ChangeFeed, Mailer, ReservationStore};
pub use pubsub::{ChangeCallback, ChangeHub, SubscriptionHandle};
pub use service::{NotifyOutcome, ReservationService};

/// Re-export protocol types.
pub use rental_proto as proto;
