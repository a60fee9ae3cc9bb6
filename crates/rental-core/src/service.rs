//! Reservation workflow service.
//!
//! This module provides [`ReservationService`], which exposes the four
//! reservation operations over injected collaborators.

use std::sync::Arc;

use rental_proto::{
    ChangeEvent, ChangeFilter, ReservationDetails, ReservationId, ReservationRow, ReservationStatus,
    StatusChange, StatusHistoryEntry, UserIdentity,
};

use crate::error::{Error, NotifyError, StoreError};
use crate::notify::build_notification;
use crate::ports::{Authenticator, ChangeFeed, Mailer, ReservationStore};
use crate::pubsub::{ChangeCallback, SubscriptionHandle};

/// What the notification phase did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    /// The email was handed to the mailer.
    Sent,
    /// The reservation could not be found after the write.
    ReservationMissing,
}

/// Reservation status workflow.
///
/// # Example
///
/// ```ignore
/// use rental_core::ReservationService;
/// use rental_proto::{ReservationId, ReservationStatus};
///
/// let service = ReservationService::new(store, auth, mailer, feed);
/// service
///     .update_status(&ReservationId::new("r-1"), ReservationStatus::Confirmed, None)
///     .await?;
/// ```
#[derive(Clone)]
pub struct ReservationService {
    store: Arc<dyn ReservationStore>,
    auth: Arc<dyn Authenticator>,
    mailer: Arc<dyn Mailer>,
    feed: Arc<dyn ChangeFeed>,
}

impl ReservationService {
    /// Create a service over the given collaborators.
    pub fn new(
        store: Arc<dyn ReservationStore>,
        auth: Arc<dyn Authenticator>,
        mailer: Arc<dyn Mailer>,
        feed: Arc<dyn ChangeFeed>,
    ) -> Self {
        Self {
            store,
            auth,
            mailer,
            feed,
        }
    }

    /// Change the status of a reservation and notify the customer.
    ///
    /// Runs in two phases. The commit phase (identity, admin flag, status
    /// procedure) fails the call on any error and performs no write unless the
    /// caller is an administrator. The notify phase runs only after a
    /// successful write; its failures are logged and never returned.
    pub async fn update_status(
        &self,
        reservation_id: &ReservationId,
        new_status: ReservationStatus,
        comment: Option<String>,
    ) -> Result<(), Error> {
        let user = self.require_admin().await?;

        let change = StatusChange::new(reservation_id.clone(), new_status, comment);
        self.store
            .update_status(&change)
            .await
            .map_err(Error::RemoteWriteFailed)?;

        tracing::info!(
            reservation_id = %reservation_id,
            status = %new_status,
            changed_by = %user.id,
            "reservation status updated"
        );

        match self.notify(reservation_id, new_status).await {
            Ok(NotifyOutcome::Sent) => {
                tracing::info!(
                    reservation_id = %reservation_id,
                    status = %new_status,
                    "status notification sent"
                );
            }
            Ok(NotifyOutcome::ReservationMissing) => {
                tracing::error!(
                    reservation_id = %reservation_id,
                    "reservation not found, status notification skipped"
                );
            }
            Err(e) => {
                tracing::error!(
                    reservation_id = %reservation_id,
                    status = %new_status,
                    error = %e,
                    "status notification failed"
                );
            }
        }

        Ok(())
    }

    /// Status history of a reservation, newest first.
    pub async fn history(
        &self,
        reservation_id: &ReservationId,
    ) -> Result<Vec<StatusHistoryEntry>, Error> {
        self.store
            .status_history(reservation_id)
            .await
            .map_err(Error::RemoteReadFailed)
    }

    /// Reservation with customer and items. A missing row is a read failure.
    pub async fn details(&self, reservation_id: &ReservationId) -> Result<ReservationDetails, Error> {
        self.store
            .reservation_details(reservation_id)
            .await
            .map_err(Error::RemoteReadFailed)?
            .ok_or_else(|| {
                Error::RemoteReadFailed(StoreError::NotFound {
                    table: rental_proto::query::tables::RESERVATIONS,
                    id: reservation_id.to_string(),
                })
            })
    }

    /// Call `on_update` with the new row image of every change on the
    /// reservations table, in arrival order. Deletes deliver an empty row.
    pub async fn subscribe_to_updates<F>(&self, on_update: F) -> Result<SubscriptionHandle, Error>
    where
        F: Fn(ReservationRow) + Send + Sync + 'static,
    {
        let callback: ChangeCallback = Arc::new(move |event: &ChangeEvent| {
            tracing::trace!(change_type = ?event.change_type, "reservation change received");
            on_update(ReservationRow::from_image(&event.new_record));
        });

        self.feed
            .subscribe(ChangeFilter::reservations(), callback)
            .await
            .map_err(Error::Subscription)
    }

    async fn require_admin(&self) -> Result<UserIdentity, Error> {
        let user = match self.auth.current_user().await {
            Ok(Some(user)) => user,
            Ok(None) => return Err(Error::AuthenticationRequired),
            Err(e) => {
                tracing::warn!(error = %e, "could not resolve current user");
                return Err(Error::AuthenticationRequired);
            }
        };

        let is_admin = match self.store.profile(&user.id).await {
            Ok(profile) => profile.map(|p| p.is_admin()).unwrap_or(false),
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "could not read profile");
                false
            }
        };

        if !is_admin {
            tracing::warn!(user_id = %user.id, "status change refused: not an administrator");
            return Err(Error::PermissionDenied);
        }

        Ok(user)
    }

    async fn notify(
        &self,
        reservation_id: &ReservationId,
        status: ReservationStatus,
    ) -> Result<NotifyOutcome, NotifyError> {
        let details = match self
            .store
            .reservation_details(reservation_id)
            .await
            .map_err(NotifyError::Fetch)?
        {
            Some(details) => details,
            None => return Ok(NotifyOutcome::ReservationMissing),
        };

        let message = build_notification(&details, status)?;
        self.mailer.send(&message).await?;
        Ok(NotifyOutcome::Sent)
    }
}
