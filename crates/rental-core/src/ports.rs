//! Collaborator traits.
//!
//! The workflow talks to the outside world only through these traits, so a
//! remote client or an in-memory double can be injected.

use async_trait::async_trait;

use rental_proto::{
    ChangeFilter, Profile, ReservationDetails, ReservationId, StatusChange, StatusHistoryEntry,
    UserId, UserIdentity,
};

use crate::error::{MailError, StoreError};
use crate::notify::EmailMessage;
use crate::pubsub::{ChangeCallback, SubscriptionHandle};

/// Reads and writes against the backing store.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Profile of `user_id`, or `None` when the user has no profile row.
    async fn profile(&self, user_id: &UserId) -> Result<Option<Profile>, StoreError>;

    /// Invoke the status-transition procedure. The procedure also appends the
    /// history row.
    async fn update_status(&self, change: &StatusChange) -> Result<(), StoreError>;

    /// Reservation with customer and items joined, or `None` when no row has
    /// this id.
    async fn reservation_details(
        &self,
        id: &ReservationId,
    ) -> Result<Option<ReservationDetails>, StoreError>;

    /// History of one reservation ordered by `changed_at` descending.
    async fn status_history(
        &self,
        id: &ReservationId,
    ) -> Result<Vec<StatusHistoryEntry>, StoreError>;
}

/// Resolves the identity the calls are made on behalf of.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// The current user, or `None` when nobody is logged in.
    async fn current_user(&self) -> Result<Option<UserIdentity>, StoreError>;
}

/// Delivers templated emails.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Push-based row change feed.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Register `callback` for every event inside `filter`. Events are
    /// delivered one callback call per event, in arrival order, with no
    /// replay of earlier events. Dropping or unsubscribing the returned handle
    /// stops delivery.
    async fn subscribe(
        &self,
        filter: ChangeFilter,
        callback: ChangeCallback,
    ) -> Result<SubscriptionHandle, StoreError>;
}
