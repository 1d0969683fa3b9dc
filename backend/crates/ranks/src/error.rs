//! Error types for the ranks crate.

use thiserror::Error;

/// Errors raised while rebuilding a [`crate::RankHolder`] from storage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RankError {
    /// A stored rank name has no definition in the registry.
    ///
    /// One unknown name fails the whole reconstruction; no partial holder is
    /// returned.
    #[error("unregistered rank: {name}")]
    UnregisteredRank {
        /// The name that failed to resolve.
        name: String,
    },

    /// The stored record is not valid JSON of the expected shape.
    #[error("invalid rank record JSON: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
    },
}
