//! Pub-sub infrastructure for change notifications.
//!
//! [`ChangeHub`] is the in-process fan-out every change feed delivers
//! through; realtime transports decode wire messages and publish them here.

mod hub;
mod subscription;

pub use hub::ChangeHub;
pub use subscription::{ChangeCallback, SubscriptionEntry, SubscriptionHandle};
