//! Headless frontend for a CosmWasm sub-account bank.
//!
//! Layers follow the usual split: `domain` holds types, traits and errors,
//! `app` holds the controller and business logic, `infra` talks to the chain
//! and the wallet, and `api` exposes the controller over HTTP.

pub mod api;
pub mod app;
pub mod domain;
pub mod infra;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
