//! Device data model (§3).

use serde::{Deserialize, Serialize};

use crate::session::Session;

/// `platform ∈ {android, ios}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Ios,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `kind ∈ {physical, emulator, simulator}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Physical,
    Emulator,
    Simulator,
}

/// `state ∈ {connected, disconnected, unknown}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceState {
    Connected,
    Disconnected,
    Unknown,
}

/// Identity `(platform, id)`; `id` is the probe-reported serial/UDID, 1-128 chars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub platform: Platform,
    pub id: String,
    /// Human name; may be empty.
    pub name: String,
    pub kind: DeviceKind,
    pub state: DeviceState,
    pub session: Option<Session>,
}

impl Device {
    pub fn new(platform: Platform, id: impl Into<String>, name: impl Into<String>, kind: DeviceKind) -> Self {
        Self {
            platform,
            id: id.into(),
            name: name.into(),
            kind,
            state: DeviceState::Connected,
            session: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, DeviceState::Connected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_device_defaults_to_connected_with_no_session() {
        let d = Device::new(Platform::Android, "dev123", "Pixel", DeviceKind::Physical);
        assert!(d.is_connected());
        assert!(d.session.is_none());
    }

    #[test]
    fn platform_display_matches_wire_format() {
        assert_eq!(Platform::Android.to_string(), "android");
        assert_eq!(Platform::Ios.to_string(), "ios");
    }
}
