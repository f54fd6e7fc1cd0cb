//! Twitter/X API integration surface exposed to the reactor.
//!
//! Submodules provide the signed client wrapper, the streaming decoder, and
//! strongly typed response models.
pub mod client;
pub mod stream;
pub mod types;

pub use client::{Endpoints, TwitterApi};
pub use stream::{FilterStream, Post, StreamEvent, StreamStopper};
