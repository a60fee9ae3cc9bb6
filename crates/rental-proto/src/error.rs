//! Protocol error types.

use thiserror::Error;

/// Errors raised while interpreting wire data.
#[derive(Debug, Error)]
pub enum Error {
    /// A status string outside the declared reservation statuses.
    #[error("unknown reservation status: {0}")]
    UnknownStatus(String),

    /// A change type string the realtime feed does not define.
    #[error("unknown change type: {0}")]
    UnknownChangeType(String),
}
