//! Email templates and placeholder rendering.

use serde::{Deserialize, Serialize};

use rental_proto::ReservationStatus;

/// A named email template. Subject and body may contain `{{key}}`
/// placeholders filled from [`TemplateData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmailTemplate {
    pub name: &'static str,
    pub subject: &'static str,
    pub html_content: &'static str,
}

/// Sent when a reservation moves to any status other than cancelled.
pub const STATUS_UPDATE: EmailTemplate = EmailTemplate {
    name: "status_update",
    subject: "Zmiana statusu rezerwacji: {{status}}",
    html_content: r#"<h2>Dzień dobry {{first_name}} {{last_name}},</h2>
<p>Status Twojej rezerwacji został zmieniony na: <strong>{{status}}</strong>.</p>
<h3>Szczegóły rezerwacji</h3>
<p>Odbiór: {{start_date}}, godz. {{start_time}}<br>
Zwrot: {{end_date}}, godz. {{end_time}}<br>
Liczba dni: {{days}}</p>
<h3>Sprzęt</h3>
<pre>{{equipment}}</pre>
<p>Wartość rezerwacji: {{total_price}} zł<br>
Kaucja: {{deposit}} zł</p>
<p>Pozdrawiamy,<br>Wypożyczalnia</p>"#,
};

/// Sent when a reservation is cancelled.
pub const CANCEL_RESERVATION: EmailTemplate = EmailTemplate {
    name: "cancel_reservation",
    subject: "Rezerwacja anulowana",
    html_content: r#"<h2>Dzień dobry {{first_name}} {{last_name}},</h2>
<p>Twoja rezerwacja na termin {{start_date}} {{start_time}} – {{end_date}} {{end_time}} została <strong>anulowana</strong>.</p>
<h3>Sprzęt</h3>
<pre>{{equipment}}</pre>
<p>W razie pytań prosimy o kontakt.</p>
<p>Pozdrawiamy,<br>Wypożyczalnia</p>"#,
};

/// Template for a transition to `status`.
pub fn template_for(status: ReservationStatus) -> &'static EmailTemplate {
    match status {
        ReservationStatus::Cancelled => &CANCEL_RESERVATION,
        _ => &STATUS_UPDATE,
    }
}

/// Values substituted into a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateData {
    pub first_name: String,
    pub last_name: String,
    /// Localized status label.
    pub status: String,
    pub start_date: String,
    pub start_time: String,
    pub end_date: String,
    pub end_time: String,
    pub days: String,
    /// Multi-line equipment listing.
    pub equipment: String,
    pub total_price: String,
    pub deposit: String,
}

impl TemplateData {
    /// Look up a placeholder value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            "first_name" => &self.first_name,
            "last_name" => &self.last_name,
            "status" => &self.status,
            "start_date" => &self.start_date,
            "start_time" => &self.start_time,
            "end_date" => &self.end_date,
            "end_time" => &self.end_time,
            "days" => &self.days,
            "equipment" => &self.equipment,
            "total_price" => &self.total_price,
            "deposit" => &self.deposit,
            _ => return None,
        };
        Some(value.as_str())
    }
}

/// Replace `{{key}}` placeholders (inner whitespace allowed). Unknown keys and
/// unterminated braces are left as they are.
pub fn render(text: &str, data: &TemplateData) -> String {
    substitute(text, data, |out, value| out.push_str(value))
}

/// Like [`render`], but values are HTML-escaped. The template text itself is
/// trusted markup.
pub fn render_html(text: &str, data: &TemplateData) -> String {
    substitute(text, data, push_escaped)
}

fn substitute(text: &str, data: &TemplateData, push_value: impl Fn(&mut String, &str)) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        let Some(end) = after_open.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let key = after_open[..end].trim();
        match data.get(key) {
            Some(value) => push_value(&mut out, value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after_open[end + 2..];
    }

    out.push_str(rest);
    out
}

fn push_escaped(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}
