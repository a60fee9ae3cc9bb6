//! Reservation lifecycle statuses.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Declared reservation statuses.
///
/// Which transitions between them are legal is decided by the server-side
/// procedure, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Awaiting confirmation.
    Pending,
    /// Confirmed by staff.
    Confirmed,
    /// Cancelled.
    Cancelled,
    /// Equipment returned, reservation closed.
    Completed,
}

impl ReservationStatus {
    /// All declared statuses.
    pub const ALL: [ReservationStatus; 4] = [
        ReservationStatus::Pending,
        ReservationStatus::Confirmed,
        ReservationStatus::Cancelled,
        ReservationStatus::Completed,
    ];

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Cancelled => "cancelled",
            ReservationStatus::Completed => "completed",
        }
    }

    /// Comment recorded in the history when an operator gives none.
    pub fn default_comment(&self) -> &'static str {
        match self {
            ReservationStatus::Confirmed => "Rezerwacja potwierdzona",
            ReservationStatus::Cancelled => "Rezerwacja anulowana",
            ReservationStatus::Completed => "Rezerwacja zakończona",
            ReservationStatus::Pending => "Status zmieniony",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReservationStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReservationStatus::Pending),
            "confirmed" => Ok(ReservationStatus::Confirmed),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            "completed" => Ok(ReservationStatus::Completed),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}
