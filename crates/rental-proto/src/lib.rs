//! Rental protocol types.
//!
//! This crate defines the data shapes exchanged with the rental backend:
//! reservation rows and their joins, status history, the status-transition
//! procedure arguments, realtime change events, and a table query builder.
//!
//! # Modules
//!
//! - [`id`] - Identifier newtypes
//! - [`status`] - Declared reservation statuses
//! - [`reservation`] - Reservation, customer, item and history rows
//! - [`query`] - Table query builder and canned workflow queries
//! - [`change`] - Realtime change events and subscription filters
//! - [`error`] - Protocol error types

pub mod change;
pub mod error;
pub mod id;
pub mod query;
pub mod reservation;
pub mod status;

pub use error::Error;

// Re-export commonly used types at crate root
pub use change::{ChangeEvent, ChangeFilter, ChangeType, EventFilter, DEFAULT_SCHEMA};
pub use id::{CustomerId, EquipmentId, ReservationId, UserId};
pub use query::{OrderDirection, OrderSpec, TableQuery, UPDATE_STATUS_PROCEDURE};
pub use reservation::{
    Customer, Equipment, Profile, Reservation, ReservationDetails, ReservationItem,
    ReservationRow, StatusChange, StatusHistoryEntry, UserIdentity,
};
pub use status::ReservationStatus;
