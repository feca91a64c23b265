//! Session data model (§3): a per-device automation-server session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `status ∈ {starting, running, stopping, stopped, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

/// A session's leased ports belong to exactly one session until it reaches
/// `Stopped`/`Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub device_id: String,
    /// Always length >= 1.
    pub ports: Vec<u16>,
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(device_id: impl Into<String>, ports: Vec<u16>) -> Self {
        assert!(!ports.is_empty(), "a session always owns at least one port");
        Self {
            session_id: crate::new_id("sess"),
            device_id: device_id.into(),
            ports,
            status: SessionStatus::Starting,
            started_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_in_starting_status() {
        let s = Session::new("d1", vec![4723, 4724]);
        assert_eq!(s.status, SessionStatus::Starting);
        assert_eq!(s.ports, vec![4723, 4724]);
    }

    #[test]
    #[should_panic]
    fn session_requires_at_least_one_port() {
        Session::new("d1", vec![]);
    }
}
