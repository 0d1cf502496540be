//! Session leasing
//!
//! Binds one credential and at most one proxy to a single outbound operation,
//! reports the outcome to the credential pool and tears the session down on
//! every exit path.

mod backend;
mod lease;

pub use backend::{BackendError, SessionBackend};
pub use lease::{Lease, LeaseCoordinator, LeaseError};
