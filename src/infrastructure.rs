//! Infrastructure layer: browser sessions, HTML extraction, storage and configuration
//!
//! Everything that touches the outside world lives here. The application layer
//! only sees the `BrowserSession` and `RecordSink` traits.

pub mod artifact_store;
pub mod browser;
pub mod config;
pub mod database_connection;
pub mod logging;
pub mod parsing;
pub mod parsing_error;
pub mod pipeline_repository;
pub mod simple_http_client;
pub mod spreadsheet;

// Re-export commonly used items
pub use artifact_store::ArtifactStore;
pub use browser::{BrowserSession, ChromiumSession, ElementData, ScriptedSession, WaitCondition};
pub use config::{AppConfig, ConfigManager};
pub use database_connection::DatabaseConnection;
pub use logging::{get_log_directory, init_logging_with_config};
pub use parsing_error::{ExtractionError, ExtractionResult, InteractionError};
pub use pipeline_repository::{PipelineRepository, RecordSink};
pub use simple_http_client::HttpClient;
