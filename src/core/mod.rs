pub mod envelope;
pub mod forwarder;

pub use forwarder::{FAILURE_NOTICE, Forwarder, InboundRequest, failure_reply};
