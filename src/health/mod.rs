pub mod aggregator;

pub use aggregator::{ComponentStatus, HealthAggregator, HealthState, HealthStatus};
