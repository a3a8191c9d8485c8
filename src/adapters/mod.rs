pub mod audit_log;
pub mod http_handler;
pub mod upstream_client;

/// Re-export commonly used types from adapters
pub use audit_log::AuditFileLogger;
pub use http_handler::{request_id_middleware, router};
pub use upstream_client::UpstreamClientAdapter;
