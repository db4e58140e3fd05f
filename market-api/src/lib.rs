//! Market data gateway: HTTP surface and process wiring
//!
//! Shared by the `market-api` server and the `market-worker` cache warmer.

pub mod auth;
pub mod config;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod state;

pub use auth::{CredentialValidator, JwtValidator};
pub use config::AppConfig;
pub use error::ApiError;
pub use state::{AppState, Components};
