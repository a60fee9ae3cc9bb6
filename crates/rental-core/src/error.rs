//! Workflow error types.

use thiserror::Error;

use rental_proto::ReservationId;

/// Errors surfaced to callers of the reservation workflow.
#[derive(Debug, Error)]
pub enum Error {
    /// No logged-in identity.
    #[error("authentication required")]
    AuthenticationRequired,

    /// The caller is not flagged as administrator.
    #[error("permission denied: changing reservation status requires an administrator")]
    PermissionDenied,

    /// The status-transition procedure failed.
    #[error("status update failed: {0}")]
    RemoteWriteFailed(#[source] StoreError),

    /// A history or detail read failed.
    #[error("read failed: {0}")]
    RemoteReadFailed(#[source] StoreError),

    /// The change feed refused the subscription.
    #[error("subscription failed: {0}")]
    Subscription(#[source] StoreError),
}

/// Errors reported by a backing store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The store answered with an error.
    #[error("rejected by store (status {status}): {message}")]
    Rejected {
        /// Transport-level status code.
        status: u16,
        /// Store-specific error code, when provided.
        code: Option<String>,
        /// Human readable message.
        message: String,
    },

    /// A single-row read matched nothing.
    #[error("{table} row {id} not found")]
    NotFound {
        /// Table that was read.
        table: &'static str,
        /// Requested identifier.
        id: String,
    },

    /// The store answered with data that could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),
}

/// Errors reported by a mail delivery implementation.
#[derive(Debug, Error)]
pub enum MailError {
    /// The mail service could not be reached.
    #[error("transport error: {0}")]
    Transport(String),

    /// The mail service refused the message.
    #[error("mail rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    /// The message was not sent because it lacks a recipient.
    #[error("message has no recipient")]
    MissingRecipient,
}

/// Failures of the best-effort notification phase. Never surfaced to callers.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Fetching reservation details failed.
    #[error("fetching reservation details failed: {0}")]
    Fetch(#[source] StoreError),

    /// The reservation has no customer to notify.
    #[error("reservation {0} has no customer")]
    MissingCustomer(ReservationId),

    /// Sending the email failed.
    #[error("sending email failed: {0}")]
    Send(#[from] MailError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::RemoteWriteFailed(StoreError::Rejected {
            status: 400,
            code: Some("P0001".into()),
            message: "invalid transition".into(),
        });
        assert!(err.to_string().contains("invalid transition"));

        let err = Error::RemoteReadFailed(StoreError::NotFound {
            table: "reservations",
            id: "r-1".into(),
        });
        assert!(err.to_string().contains("reservations row r-1 not found"));
    }

    #[test]
    fn test_notify_error_from_mail_error() {
        let err: NotifyError = MailError::MissingRecipient.into();
        assert!(matches!(err, NotifyError::Send(MailError::MissingRecipient)));
    }
}
