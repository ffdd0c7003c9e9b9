//! Pricing service: tabular exchange-rate responder
//!
//! Holds a single reference-currency table and serves directional rates as
//! `base_k / target_k`, so `rate(x, y) * rate(y, x) == 1` holds by
//! construction.

pub mod server;

pub use server::{RateServer, RateTable};
