//! Audit trail for workflow transitions

mod entity;
mod sink;

pub use entity::{AuditAction, AuditEntry, AuditEntryId, AuditEvent, AUDIT_ENTITY, AUDIT_USERNAME};
pub use sink::AuditSink;
