//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the mirror core
//! depends on, but whose implementations live in adapter crates or in the
//! embedding UI.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - The backend owning the authoritative namespace
//! - [`IAuthChallenge`], [`IConfirmPrompt`], [`IFilePicker`] - Interactive prompts
//! - [`ISecretStore`] - Durable storage of the signing secret
//! - [`IIconResolver`] - Presentation hints for new nodes
//! - [`IByteSource`], [`IDroppedEntry`] - Upload inputs

pub mod presentation;
pub mod prompt;
pub mod remote_store;
pub mod secret_store;
pub mod upload_source;

pub use presentation::{IIconResolver, NoIcons};
pub use prompt::{FixedConfirm, IAuthChallenge, IConfirmPrompt, IFilePicker};
pub use remote_store::{EntryDescriptor, IRemoteStore, ProgressFn, RenamePair};
pub use secret_store::{ISecretStore, MemorySecretStore};
pub use upload_source::{IByteSource, IDroppedEntry, MemoryFile};
