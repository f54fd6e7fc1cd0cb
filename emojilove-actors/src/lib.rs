//! Actor plumbing and the stream reactor.
//!
//! - [`actor`]: mailbox-driven actor loop with cooperative stop and cancellation
//! - [`reactor`]: classifies posts and favorites the ones carrying emoji
pub mod actor;
pub mod reactor;

pub use actor::{Actor, ActorHandle, Context, spawn_actor};
pub use reactor::{ConsoleReporter, Liker, ReactorActor, StatusReporter};
