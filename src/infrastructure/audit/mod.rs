//! Audit sink implementations and the background writer feeding them

mod storage_sink;
mod tracing_sink;
mod writer;

pub use storage_sink::StorageAuditSink;
pub use tracing_sink::TracingAuditSink;
pub use writer::{AuditWriter, AUDIT_QUEUE_CAPACITY};
