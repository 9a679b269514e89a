use chrono::{DateTime, Utc};

/// Single read point for the server clock. Every state-changing decision
/// in the tournament flow goes through this, never a client-supplied time.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}
