//! # Tool Gateway
//!
//! Serves schema-described tools over HTTP. Each tool call is validated,
//! authorized with an access token obtained from workload credentials and
//! forwarded to a backend REST API.
//!
//! Modules:
//! - `config` service configuration, loader and validator
//! - `credentials` credential providers, provider chain, OIDC exchange
//! - `cache` access tokens and the single-flight token cache
//! - `tools` tool registry, invoker, backend client and built-in catalog
//! - `health` readiness aggregation
//! - `server` axum routes and application state

pub mod cache;
pub mod config;
pub mod credentials;
pub mod health;
pub mod helpers;
pub mod observability;
pub mod parser;
pub mod resilience;
pub mod server;
pub mod tools;
pub mod utils;

#[cfg(test)]
mod tests;

pub use crate::config::settings::ServiceConfig;
