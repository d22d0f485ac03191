//! Glint Telemetry - usage accounting and log setup

mod pricing;
mod subscriber;
mod usage;

pub use pricing::{PricingTable, ProviderPricing};
pub use subscriber::{init_subscriber, TelemetryConfig};
pub use usage::{UsageRecord, UsageSnapshot, UsageTotals, UsageTracker, MAX_RECORDS};
