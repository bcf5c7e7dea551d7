//! Use cases (interactors) for the mirror
//!
//! Use cases are thin coordinators: the remote call goes through the
//! [`IRemoteStore`](crate::ports::IRemoteStore) port, the local edit
//! through the [`TreeCache`](crate::tree::TreeCache).
//!
//! ## Use Cases
//!
//! - [`MutationReconciler`] - delete, create, copy, move and rename
//! - [`UploadCoordinator`] - batched uploads from files, pickers and drops

pub mod reconcile;
pub mod upload;

pub use reconcile::{MutationReconciler, TransferOptions};
pub use upload::{UploadCoordinator, UploadReport, UploadSource};
