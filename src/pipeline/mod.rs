//! Pipeline entry points for the watcher.
//!
//! - `Watcher`: poll cycle, diffing, auto-rent/reserve and notifications
//! - `KnownSet` / `Snapshot`: id-keyed item containers
//! - `KeywordFilter`: title matching for automatic actions

pub mod filter;
pub mod known;
pub mod message;
pub mod watch;

pub use filter::KeywordFilter;
pub use known::{KnownSet, Snapshot};
pub use message::{AutoAction, availability_message, notification_body};
pub use watch::{CycleReport, WatchOptions, Watcher};
