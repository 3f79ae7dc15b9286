//! guichet-core - Core library for Guichet
//!
//! This crate contains the shared models, database layer, and the DS
//! (dossier-management service) synchronization logic used by the CLI and
//! the scheduled batch jobs.

pub mod config;
pub mod db;
pub mod ds;
pub mod email;
pub mod error;
pub mod models;
pub mod util;

pub use error::{Error, Result};
pub use models::{AccountUpdateRequest, DossierStatus, User, UserId};
