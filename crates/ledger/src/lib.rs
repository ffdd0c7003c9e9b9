//! Multi-tenant wallet ledger
//!
//! This crate provides:
//! - HTTP request gate with JWT bearer authentication
//! - transactional ledger store over Postgres (Sea-ORM)
//! - wallet service composing the store with the pricing-service rate client
//! - background archiver for inactive wallets
//! - Prometheus metrics for request and external-call latency
//!
//! Can be used as a library or through the `ledger-service` binary.

pub mod archiver;
pub mod auth;
pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod model;
pub mod rates;
pub mod server;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use archiver::Archiver;
pub use auth::{Principal, TokenVerifier};
pub use config::Config;
pub use database::Database;
pub use error::{LedgerError, Result};
pub use rates::{RateSource, RemoteRateClient};
pub use server::ApiServer;
pub use service::WalletService;
pub use store::LedgerStore;
