//! Device access configuration

use std::path::PathBuf;

/// Configuration for opening devices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Serve every device number from this image file instead of real disks
    pub override_path: Option<PathBuf>,
    /// Number of disks probed when looking for an iPod
    pub scan_limit: u8,
}

impl DeviceConfig {
    /// Environment variable naming an override image
    pub const OVERRIDE_ENV: &'static str = "RAWPOD_OVERRIDE";

    /// Default number of disks probed
    pub const DEFAULT_SCAN_LIMIT: u8 = 8;

    /// Defaults, with the override image taken from `RAWPOD_OVERRIDE` if set
    pub fn from_env() -> Self {
        let override_path = std::env::var_os(Self::OVERRIDE_ENV)
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Self {
            override_path,
            ..Self::default()
        }
    }

    /// Redirect all device access to `path`
    pub fn with_override(mut self, path: impl Into<PathBuf>) -> Self {
        self.override_path = Some(path.into());
        self
    }

    pub fn with_scan_limit(mut self, scan_limit: u8) -> Self {
        self.scan_limit = scan_limit;
        self
    }

    pub fn is_overridden(&self) -> bool {
        self.override_path.is_some()
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            override_path: None,
            scan_limit: Self::DEFAULT_SCAN_LIMIT,
        }
    }
}
