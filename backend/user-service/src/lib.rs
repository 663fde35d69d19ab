//! Account service
//!
//! Registration, password login issuing session tokens, profile and password
//! management, and logout backed by the token revocation ledger.

pub mod app_state;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod response;
pub mod routes;
pub mod security;

pub use app_state::AppState;
pub use config::Config;
pub use error::{AppError, Result};
