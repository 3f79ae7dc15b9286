//! Domain models for Guichet

mod account_update;
mod user;

pub use account_update::{AccountUpdateRequest, DossierStatus, Flag, UpdateType};
pub use user::{User, UserId};
