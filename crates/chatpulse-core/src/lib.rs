//! Core domain + application logic for the chat activity checker.
//!
//! This crate is intentionally transport-agnostic. Telegram access lives
//! behind the [`ports::SignalFetcher`] trait implemented in adapter crates.

pub mod classify;
pub mod config;
pub mod domain;
pub mod errors;
pub mod files;
pub mod formatting;
pub mod links;
pub mod logging;
pub mod normalize;
pub mod orchestrator;
pub mod ports;
pub mod throttle;

pub use errors::{Error, FetchError, Result};
