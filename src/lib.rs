//! Launchkey - license issuing and device-bound verification for desktop
//! launchers.
//!
//! The library holds the license engine, its SQLite store and the HTTP
//! handlers; the binary wires them to configuration and a listener.

pub mod clock;
pub mod code;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod rate_limit;
pub mod state;
pub mod util;
