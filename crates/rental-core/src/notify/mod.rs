//! Customer notification for status changes.
//!
//! Assembles the email sent after a committed status change: status label,
//! equipment listing, formatted dates and the template matching the status.

pub mod format;
pub mod template;

pub use format::{equipment_listing, format_amount, format_date, status_label};
pub use template::{render, render_html, template_for, EmailTemplate, TemplateData, CANCEL_RESERVATION, STATUS_UPDATE};

use rental_proto::{ReservationDetails, ReservationStatus};

use crate::error::NotifyError;
use format::{DEFAULT_END_TIME, DEFAULT_START_TIME};

/// An email ready to hand to a [`Mailer`](crate::ports::Mailer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub recipient: String,
    /// Template name, for logs.
    pub template_name: String,
    /// Subject with unrendered placeholders.
    pub subject: String,
    /// HTML body with unrendered placeholders.
    pub html_content: String,
    pub template_data: TemplateData,
}

impl EmailMessage {
    /// Subject with placeholders filled.
    pub fn rendered_subject(&self) -> String {
        render(&self.subject, &self.template_data)
    }

    /// HTML body with placeholders filled and values escaped.
    pub fn rendered_html(&self) -> String {
        render_html(&self.html_content, &self.template_data)
    }
}

/// Build the notification for a reservation that moved to `status`.
pub fn build_notification(
    details: &ReservationDetails,
    status: ReservationStatus,
) -> Result<EmailMessage, NotifyError> {
    let reservation = &details.reservation;
    let customer = details
        .customer
        .as_ref()
        .ok_or_else(|| NotifyError::MissingCustomer(reservation.id.clone()))?;

    let template_data = TemplateData {
        first_name: customer.first_name.clone(),
        last_name: customer.last_name.clone(),
        status: status_label(status.as_str()).to_string(),
        start_date: format_date(&reservation.start_date),
        start_time: time_or(details.start_time.as_deref(), DEFAULT_START_TIME),
        end_date: format_date(&reservation.end_date),
        end_time: time_or(details.end_time.as_deref(), DEFAULT_END_TIME),
        days: details
            .days
            .filter(|days| *days != 0)
            .map(|days| days.to_string())
            .unwrap_or_else(|| "1".to_string()),
        equipment: equipment_listing(&details.items),
        total_price: reservation
            .total_price
            .map(format_amount)
            .unwrap_or_else(|| "0".to_string()),
        deposit: details
            .deposit
            .map(format_amount)
            .unwrap_or_else(|| "0".to_string()),
    };

    let template = template_for(status);
    Ok(EmailMessage {
        recipient: customer.email.clone(),
        template_name: template.name.to_string(),
        subject: template.subject.to_string(),
        html_content: template.html_content.to_string(),
        template_data,
    })
}

fn time_or(value: Option<&str>, default: &str) -> String {
    match value {
        Some(time) if !time.trim().is_empty() => time.to_string(),
        _ => default.to_string(),
    }
}
