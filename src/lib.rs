//! Atomic-swap action-following engine
//!
//! Drives one party's side of a cross-chain swap by following the actions a
//! hypermedia-described swap resource currently permits: discover the next
//! action, execute it against the right blockchain wallet, then poll until the
//! settlement daemon has observed the resulting on-chain event.

pub mod client;
pub mod config;
pub mod error;
pub mod follower;
pub mod ledger;
pub mod poll;
pub mod swap;

pub use config::Settings;
pub use error::{FollowerError, FollowerResult};
pub use follower::{Follower, FollowerTuning};
