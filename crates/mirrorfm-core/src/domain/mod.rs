//! Domain entities and business logic
//!
//! This module contains the core domain types for MirrorFM:
//! - Path normalization and splitting
//! - Mirror nodes and their identities
//! - Domain-specific error types

pub mod errors;
pub mod node;
pub mod path;

// Re-export commonly used types
pub use errors::FmError;
pub use node::{EntryType, Node, NodeId, NodeKind};
pub use path::PathParts;
