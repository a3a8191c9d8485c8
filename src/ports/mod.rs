pub mod audit;
pub mod upstream;

/// Re-export commonly used types from ports
pub use audit::{AuditSink, ErrorRecord, LogRecord};
pub use upstream::{UpstreamClient, UpstreamError, UpstreamResponse, UpstreamResult};
