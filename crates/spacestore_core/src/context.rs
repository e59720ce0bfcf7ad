//! Per-request caller identity.
//!
//! # Responsibility
//! - Carry the tenant and user a store call acts on behalf of.
//!
//! # Invariants
//! - Storage handles are passed explicitly to store operations and are
//!   never carried here.

/// Identity of the caller for one store operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Tenant boundary applied to every query.
    pub org_id: String,
    /// Current user; becomes the owner of spaces it creates.
    pub user_id: String,
}

impl RequestContext {
    pub fn new(org_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
            user_id: user_id.into(),
        }
    }
}
