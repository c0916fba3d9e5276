//! User-facing notices.

use serde::Serialize;

/// Shown when tracking is requested without a geolocation source.
pub const GEOLOCATION_UNSUPPORTED: &str = "Geolocation is not supported on this device";

/// Shown when the IP form is submitted blank.
pub const IP_REQUIRED: &str = "Enter an IP address first";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    /// Needs acknowledgement before continuing
    Alert,
    /// An operation failed
    Error,
}

/// A message the user must see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    #[must_use]
    pub fn alert(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Alert,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
