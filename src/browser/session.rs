//! Session-shaped data types (spec.md §3).

use std::time::Instant;

/// A live remote browser instance, as `BrowserBinding` hands it back.
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: String,
    pub started_at: Instant,
}

/// What `list_sessions` reports about a session without connecting to it.
#[derive(Debug, Clone)]
pub struct SessionDescriptor {
    pub session_id: String,
    pub has_connection: bool,
}

/// Snapshot of remaining capacity on the remote fleet.
#[derive(Debug, Clone, Copy)]
pub struct PoolQuota {
    pub max_concurrent: u32,
    pub active: u32,
    pub acquisitions_allowed: u32,
    pub wait_until: Instant,
}

impl PoolQuota {
    pub fn has_capacity(&self) -> bool {
        self.active < self.max_concurrent && self.acquisitions_allowed > 0
    }
}
