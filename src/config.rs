use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Friendly device name to BLE address.
    #[serde(default)]
    pub devices: HashMap<String, String>,
    #[serde(default)]
    pub link: LinkConfig,
}

impl Config {
    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        serde_json::from_str(&text).map_err(|e| Error::Config(format!("{}: {e}", path.display())))
    }

    /// Resolve a device name through the registry; a literal BLE address
    /// passes straight through.
    pub fn resolve_address(&self, device: &str) -> Result<String> {
        if let Some(address) = self.devices.get(device) {
            return Ok(address.clone());
        }
        if looks_like_address(device) {
            return Ok(device.to_string());
        }
        Err(Error::UnknownDevice(device.to_string()))
    }
}

/// Six colon-separated hex pairs, e.g. `A4:C1:38:5C:0A:42`.
fn looks_like_address(s: &str) -> bool {
    let parts: Vec<&str> = s.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Transmit scheduler tuning. The defaults match what the strips tolerate;
/// lowering the throttle makes them drop frames on the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct LinkConfig {
    /// Delivery attempts per frame before it is dropped.
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,
    /// Minimum gap between writes, in milliseconds.
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    /// Keep-alive injection interval in milliseconds; 0 disables it.
    #[serde(default = "default_keep_alive_ms")]
    pub keep_alive_ms: u64,
}

impl LinkConfig {
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            retry_limit: default_retry_limit(),
            throttle_ms: default_throttle_ms(),
            keep_alive_ms: default_keep_alive_ms(),
        }
    }
}

fn default_retry_limit() -> u32 {
    3
}

fn default_throttle_ms() -> u64 {
    100
}

fn default_keep_alive_ms() -> u64 {
    2000
}
