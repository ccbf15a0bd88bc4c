pub mod common;

mod health_aggregation;
mod provider_chain;
mod token_cache;
