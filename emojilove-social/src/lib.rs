//! Social network client and post classification used by emojilove.
//!
//! Only the Twitter/X v1.1 surface needed by the monitor is implemented:
//! user lookup, the statuses/filter stream, and favorites. [`emoji`] holds the
//! code-point classifier applied to every streamed post.
pub mod emoji;
pub mod twitter;
