//! Database layer for Guichet

mod connection;
mod migrations;
mod request_repository;
mod user_repository;

pub use connection::Database;
pub use request_repository::{AccountUpdateRequestRepository, LibSqlAccountUpdateRequestRepository};
pub use user_repository::{LibSqlUserRepository, UserRepository};
