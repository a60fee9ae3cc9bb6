//! Polish-locale formatting of notification fields.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};

use rental_proto::ReservationItem;

/// Time shown when a reservation has no pick-up time.
pub const DEFAULT_START_TIME: &str = "08:00";
/// Time shown when a reservation has no return time.
pub const DEFAULT_END_TIME: &str = "16:00";

/// Customer-facing label of a status. Statuses without a label are shown raw.
///
/// `in_progress` has a label although it is not a declared status; rows
/// carrying it can still come back from the store.
pub fn status_label(status: &str) -> &str {
    match status {
        "pending" => "Oczekująca",
        "confirmed" => "Potwierdzona",
        "in_progress" => "W trakcie",
        "completed" => "Zakończona",
        "cancelled" => "Anulowana",
        other => other,
    }
}

/// One line per item: `"{name} ({qty} szt.) - {price} zł/dzień"`.
pub fn equipment_listing(items: &[ReservationItem]) -> String {
    items
        .iter()
        .map(|item| {
            format!(
                "{} ({} szt.) - {} zł/dzień",
                item.display_name(),
                item.quantity,
                format_amount(item.price_per_day)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Amounts print without a trailing `.0` for whole numbers.
pub fn format_amount(amount: f64) -> String {
    format!("{}", amount)
}

/// Format a stored date as `D.MM.YYYY`. Accepts plain dates and timestamps;
/// anything else is returned unchanged.
pub fn format_date(raw: &str) -> String {
    match parse_date(raw) {
        Some(date) => format!("{}.{:02}.{}", date.day(), date.month(), date.year()),
        None => raw.to_string(),
    }
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.date_naive());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|ts| ts.date())
        .ok()
}
