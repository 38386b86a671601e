//! Application layer: pipelines and the pure transform stages they feed
//!
//! Pipelines drive a [`BrowserSession`](crate::infrastructure::BrowserSession)
//! site by site and hand normalized rows to a
//! [`RecordSink`](crate::infrastructure::RecordSink).

pub mod aggregation;
pub mod classifier;
pub mod faq_pipeline;
pub mod market_pipeline;
pub mod normalizer;
pub mod pager;
pub mod registration_pipeline;
pub mod run_report;
pub mod vehicle_pipeline;

// Re-export commonly used items
pub use classifier::Classifier;
pub use faq_pipeline::FaqPipeline;
pub use market_pipeline::MarketPipeline;
pub use pager::{PagedRun, PagedSource, collect_pages, pager_for};
pub use run_report::{RunReport, SiteOutcome};
pub use vehicle_pipeline::VehiclePipeline;
