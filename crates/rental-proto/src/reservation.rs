//! Reservation rows and their joined shapes.
//!
//! Field names follow the column names of the backing tables so the types
//! decode straight from REST responses and realtime row images.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::id::{CustomerId, EquipmentId, ReservationId, UserId};
use crate::status::ReservationStatus;

/// A row of the `reservations` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation identifier.
    pub id: ReservationId,
    /// Raw status column. May hold values outside [`ReservationStatus`].
    pub status: String,
    /// Owning customer.
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    /// First rental day as stored (ISO date or timestamp).
    pub start_date: String,
    /// Last rental day as stored.
    pub end_date: String,
    /// Total price of the booking.
    #[serde(default)]
    pub total_price: Option<f64>,
}

impl Reservation {
    /// Parse the status column into a declared status, if it is one.
    pub fn declared_status(&self) -> Option<ReservationStatus> {
        self.status.parse().ok()
    }
}

/// New row image of a reservation change.
///
/// Realtime rows are not validated by the store and a delete carries an empty
/// image, so every column is optional. Columns not listed here land in
/// `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReservationRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ReservationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<CustomerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_price: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReservationRow {
    /// Read a row image. Columns of an unexpected type keep their raw value
    /// in `extra` instead of failing the whole image.
    pub fn from_image(image: &Value) -> Self {
        if let Ok(row) = serde_json::from_value::<ReservationRow>(image.clone()) {
            return row;
        }

        let mut row = ReservationRow::default();
        let Some(columns) = image.as_object() else {
            return row;
        };
        for (column, value) in columns {
            let taken = match column.as_str() {
                "id" => take_column(value, &mut row.id),
                "status" => take_column(value, &mut row.status),
                "customer_id" => take_column(value, &mut row.customer_id),
                "start_date" => take_column(value, &mut row.start_date),
                "end_date" => take_column(value, &mut row.end_date),
                "total_price" => take_column(value, &mut row.total_price),
                _ => false,
            };
            if !taken {
                row.extra.insert(column.clone(), value.clone());
            }
        }
        row
    }

    /// Whether the image carries no columns, as for deletes.
    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.status.is_none()
            && self.customer_id.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.total_price.is_none()
            && self.extra.is_empty()
    }

    /// Parse the status column into a declared status, if it is one.
    pub fn declared_status(&self) -> Option<ReservationStatus> {
        self.status.as_deref()?.parse().ok()
    }

    /// The complete reservation, when every required column is present.
    pub fn to_reservation(&self) -> Option<Reservation> {
        Some(Reservation {
            id: self.id.clone()?,
            status: self.status.clone()?,
            customer_id: self.customer_id.clone(),
            start_date: self.start_date.clone()?,
            end_date: self.end_date.clone()?,
            total_price: self.total_price,
        })
    }
}

fn take_column<T: serde::de::DeserializeOwned>(value: &Value, slot: &mut Option<T>) -> bool {
    match serde_json::from_value::<Option<T>>(value.clone()) {
        Ok(parsed) => {
            *slot = parsed;
            true
        }
        Err(_) => false,
    }
}

/// Customer columns embedded into a reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Equipment columns embedded into a reservation item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A row of `reservation_items` with its equipment embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationItem {
    pub equipment_id: EquipmentId,
    pub quantity: u32,
    pub price_per_day: f64,
    #[serde(default)]
    pub deposit: Option<f64>,
    #[serde(default)]
    pub equipment: Option<Equipment>,
}

impl ReservationItem {
    /// Display name of the item, falling back to the equipment id when the
    /// equipment row was not embedded.
    pub fn display_name(&self) -> &str {
        self.equipment
            .as_ref()
            .map(|e| e.name.as_str())
            .unwrap_or_else(|| self.equipment_id.as_str())
    }
}

/// A reservation with customer and line items joined in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReservationDetails {
    #[serde(flatten)]
    pub reservation: Reservation,
    /// Pick-up time of day (`HH:MM`).
    #[serde(default)]
    pub start_time: Option<String>,
    /// Return time of day (`HH:MM`).
    #[serde(default)]
    pub end_time: Option<String>,
    /// Number of rental days.
    #[serde(default)]
    pub days: Option<u32>,
    /// Total deposit.
    #[serde(default)]
    pub deposit: Option<f64>,
    #[serde(default)]
    pub customer: Option<Customer>,
    #[serde(default)]
    pub items: Vec<ReservationItem>,
}

/// Profile row carrying the administrator flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    #[serde(default)]
    pub is_admin: Option<bool>,
}

impl Profile {
    /// Whether the profile is flagged as administrator. Absent counts as no.
    pub fn is_admin(&self) -> bool {
        self.is_admin.unwrap_or(false)
    }
}

/// The currently authenticated user as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}

/// One row of `reservation_history`. Written by the status procedure only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub id: String,
    #[serde(default)]
    pub previous_status: Option<String>,
    pub new_status: String,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub changed_at: DateTime<Utc>,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub changed_by: Option<UserId>,
}

/// Accept `timestamptz` values and offset-less `timestamp` values, which are
/// read as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| {
            <D::Error as serde::de::Error>::custom(format!("invalid timestamp: {raw}"))
        })
}

/// Arguments of the status-transition procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    #[serde(rename = "p_reservation_id")]
    pub reservation_id: ReservationId,
    #[serde(rename = "p_new_status")]
    pub new_status: ReservationStatus,
    #[serde(rename = "p_comment")]
    pub comment: Option<String>,
}

impl StatusChange {
    /// Create a status change request.
    pub fn new(
        reservation_id: ReservationId,
        new_status: ReservationStatus,
        comment: Option<String>,
    ) -> Self {
        Self {
            reservation_id,
            new_status,
            comment,
        }
    }
}
