//! Output formatters for command results.

use clap::ValueEnum;
use comfy_table::Table;
use serde_json::json;

use rental_core::notify::{equipment_listing, format_amount, format_date, status_label};
use rental_proto::{ReservationDetails, ReservationId, ReservationRow, ReservationStatus, StatusHistoryEntry};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format a committed status change.
    fn format_status_change(
        &self,
        id: &ReservationId,
        status: ReservationStatus,
        comment: Option<&str>,
    ) -> String;

    /// Format a status history, newest first.
    fn format_history(&self, entries: &[StatusHistoryEntry]) -> String;

    /// Format reservation details.
    fn format_details(&self, details: &ReservationDetails) -> String;

    /// Format one row image received from the change feed.
    fn format_update(&self, row: &ReservationRow) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_status_change(
        &self,
        id: &ReservationId,
        status: ReservationStatus,
        comment: Option<&str>,
    ) -> String {
        match comment {
            Some(comment) => format!(
                "Reservation {} set to {} ({})",
                id,
                status_label(status.as_str()),
                comment
            ),
            None => format!("Reservation {} set to {}", id, status_label(status.as_str())),
        }
    }

    fn format_history(&self, entries: &[StatusHistoryEntry]) -> String {
        if entries.is_empty() {
            return "No status changes".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec!["Changed at", "From", "To", "Comment", "Changed by"]);

        for entry in entries {
            table.add_row(vec![
                entry.changed_at.format("%Y-%m-%d %H:%M").to_string(),
                entry
                    .previous_status
                    .as_deref()
                    .map(status_label)
                    .unwrap_or("-")
                    .to_string(),
                status_label(&entry.new_status).to_string(),
                entry.comment.clone().unwrap_or_default(),
                entry
                    .changed_by
                    .as_ref()
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
            ]);
        }

        table.to_string()
    }

    fn format_details(&self, details: &ReservationDetails) -> String {
        let reservation = &details.reservation;
        let mut summary = Table::new();
        summary.set_header(vec!["Field", "Value"]);

        summary.add_row(vec!["Reservation".to_string(), reservation.id.to_string()]);
        summary.add_row(vec![
            "Status".to_string(),
            status_label(&reservation.status).to_string(),
        ]);
        if let Some(customer) = &details.customer {
            summary.add_row(vec![
                "Customer".to_string(),
                format!("{} {}", customer.first_name, customer.last_name),
            ]);
            summary.add_row(vec!["Email".to_string(), customer.email.clone()]);
            if let Some(phone) = &customer.phone {
                summary.add_row(vec!["Phone".to_string(), phone.clone()]);
            }
        }
        summary.add_row(vec![
            "Start".to_string(),
            join_date_time(&reservation.start_date, details.start_time.as_deref()),
        ]);
        summary.add_row(vec![
            "End".to_string(),
            join_date_time(&reservation.end_date, details.end_time.as_deref()),
        ]);
        if let Some(days) = details.days {
            summary.add_row(vec!["Days".to_string(), days.to_string()]);
        }
        if let Some(total) = reservation.total_price {
            summary.add_row(vec!["Total".to_string(), format!("{} zł", format_amount(total))]);
        }
        if let Some(deposit) = details.deposit {
            summary.add_row(vec!["Deposit".to_string(), format!("{} zł", format_amount(deposit))]);
        }

        if details.items.is_empty() {
            return summary.to_string();
        }

        let mut items = Table::new();
        items.set_header(vec!["Equipment", "Quantity", "Price/day", "Deposit"]);
        for item in &details.items {
            items.add_row(vec![
                item.display_name().to_string(),
                item.quantity.to_string(),
                format_amount(item.price_per_day),
                item.deposit.map(format_amount).unwrap_or_default(),
            ]);
        }

        format!("{summary}\n\n{items}")
    }

    fn format_update(&self, row: &ReservationRow) -> String {
        if row.is_empty() {
            return "(row removed)".to_string();
        }

        let id = row.id.as_ref().map(|id| id.as_str()).unwrap_or("?");
        let status = row.status.as_deref().map(status_label).unwrap_or("-");
        let date = |value: &Option<String>| {
            value
                .as_deref()
                .map(format_date)
                .unwrap_or_else(|| "?".to_string())
        };
        format!(
            "{}  {}  {} - {}",
            id,
            status,
            date(&row.start_date),
            date(&row.end_date)
        )
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_status_change(
        &self,
        id: &ReservationId,
        status: ReservationStatus,
        comment: Option<&str>,
    ) -> String {
        json!({
            "reservation_id": id,
            "status": status,
            "comment": comment,
        })
        .to_string()
    }

    fn format_history(&self, entries: &[StatusHistoryEntry]) -> String {
        serde_json::to_string_pretty(entries).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_details(&self, details: &ReservationDetails) -> String {
        let mut value = serde_json::to_value(details).unwrap_or_default();
        value["equipment_text"] = json!(equipment_listing(&details.items));
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_update(&self, row: &ReservationRow) -> String {
        serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string())
    }
}

fn join_date_time(date: &str, time: Option<&str>) -> String {
    match time {
        Some(time) if !time.is_empty() => format!("{} {}", format_date(date), time),
        _ => format_date(date),
    }
}
