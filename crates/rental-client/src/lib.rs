//! Rental Client - remote collaborators for the reservation workflow.
//!
//! - [`RestClient`] reads tables, invokes the status procedure and resolves
//!   the current user
//! - [`RealtimeClient`] streams row changes over a websocket
//! - [`HttpMailer`] posts rendered status emails to a mail endpoint
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rental_client::{HttpMailer, MailerConfig, RealtimeClient, RealtimeConfig, RestClient, StoreConfig};
//! use rental_core::ReservationService;
//!
//! let store_config = StoreConfig::new(url, api_key).with_access_token(token);
//! let rest = Arc::new(RestClient::new(store_config.clone())?);
//! let feed = Arc::new(RealtimeClient::connect(RealtimeConfig::from_store(&store_config)?).await?);
//! let mailer = Arc::new(HttpMailer::new(MailerConfig::new(endpoint, sender))?);
//!
//! let service = ReservationService::new(rest.clone(), rest, mailer, feed);
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod mailer;
pub mod realtime;
pub mod rest;

pub use config::{
    MailerConfig, RealtimeConfig, StoreConfig, DEFAULT_CHANNEL, DEFAULT_HEARTBEAT_INTERVAL,
    DEFAULT_JOIN_TIMEOUT, DEFAULT_SCHEMA, DEFAULT_TIMEOUT,
};
pub use error::Error;
pub use mailer::HttpMailer;
pub use realtime::{decode_change, join_payload, Frame, RealtimeClient};
pub use rest::RestClient;

/// Re-export protocol types.
pub use rental_proto as proto;
