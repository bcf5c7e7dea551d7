//! The client-side mirror
//!
//! - [`Tree`] - arena of nodes with the synchronous structural edits
//! - [`TreeCache`] - lazy loading and resolution against the remote store
//! - [`SelectionTracker`] - path-addressed selection helpers

pub mod arena;
pub mod cache;
pub mod selection;

pub use arena::{retain_deepest, Lookup, Tree};
pub use cache::{LoadOutcome, MissPolicy, TreeCache};
pub use selection::SelectionTracker;
