//! Common types and utilities shared across emojilove crates.
//!
//! This crate defines the shared error taxonomy and the observability helpers
//! used throughout the workspace. It depends on neither the HTTP nor the
//! runtime crates.
//!
//! # Overview
//!
//! - [`observability`]: Centralised tracing/logging initialisation
//! - [`EmojiLoveError`] and [`Result`]: Shared error handling
//!
//! # Examples
//!
//! Fatal errors render as a one-line diagnostic:
//!
//! ```rust
//! use emojilove_common::EmojiLoveError;
//!
//! let err = EmojiLoveError::UserNotFound("alice".into());
//! assert_eq!(err.to_string(), "user 'alice' not found");
//! assert!(err.is_fatal());
//! ```

pub mod observability;

/// Error types used across the emojilove system.
///
/// Every variant ends the process except [`EmojiLoveError::Favorite`], which is
/// reported and then ignored.
#[derive(thiserror::Error, Debug)]
pub enum EmojiLoveError {
    /// One or more required credential variables were unset or empty.
    #[error("missing required environment variables: {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),

    /// Configuration was incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The account lookup call failed.
    #[error("cannot look up user ID for '{username}': {reason}")]
    Lookup { username: String, reason: String },

    /// The account lookup succeeded but matched nothing.
    #[error("user '{0}' not found")]
    UserNotFound(String),

    /// The filtered stream could not be opened.
    #[error("cannot follow {follow}: {reason}")]
    StreamOpen { follow: String, reason: String },

    /// A favorite call failed. Never fatal.
    #[error("favorite for tweet {id} failed: {reason}")]
    Favorite { id: u64, reason: String },

    /// The server closed the stream while no shutdown had been requested.
    #[error("stream ended before shutdown was requested")]
    StreamEnded,
}

impl EmojiLoveError {
    /// Whether the error terminates the process.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EmojiLoveError::Favorite { .. })
    }
}

/// Convenient alias for results that use [`EmojiLoveError`].
pub type Result<T> = std::result::Result<T, EmojiLoveError>;
