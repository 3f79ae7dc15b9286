//! DS (dossier-management service) integration
//!
//! Polls the remote GraphQL-shaped API for account-update dossiers,
//! reconciles them into local records, and drives the remote state machine
//! for instructor actions.

pub mod client;
pub mod parse;
pub mod sync;
pub mod transitions;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{DsApi, DsGraphqlClient, TransitionInput, TransitionKind, TransitionOutcome};
pub use sync::{SyncOutcome, SyncService, INACTIVITY_PERIOD_MS};
pub use transitions::{steps_to, Step};
