//! Request/usage records and the usage report
//!
//! The translation pipeline reports into a [`RecordSink`] and never reads
//! back. The report side prices records with an explicit [`PricingTable`].

pub mod records;
pub mod report;
pub mod store;

pub use records::{RequestLog, UsageLog};
pub use report::{calculate_cost, summarize, ModelPricing, PricingTable, UsagePeriod, UsageStats};
pub use store::{JsonlStore, MemoryStore, NullSink, RecordSink, UsageSource};
