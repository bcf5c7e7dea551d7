//! MirrorFM Core - Remote file tree mirror and reconciliation
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain** - path utilities, the node model, `FmError`
//! - **Tree** - `TreeCache` (lazy loading, resolution), `SelectionTracker`
//! - **Use cases** - `MutationReconciler`, `UploadCoordinator`
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `ISecretStore`,
//!   `IAuthChallenge`, `IConfirmPrompt`, `IFilePicker`, `IIconResolver`
//!
//! # Architecture
//!
//! The domain module holds pure logic with no I/O. Ports define the trait
//! interfaces that adapter crates (such as `mirrorfm-http`) and the
//! embedding UI implement. The tree and the use cases drive the ports and
//! keep the local mirror consistent with what the backend reports.

pub mod config;
pub mod domain;
pub mod logging;
pub mod ports;
pub mod sources;
pub mod tree;
pub mod usecases;

#[cfg(test)]
pub(crate) mod testing;
