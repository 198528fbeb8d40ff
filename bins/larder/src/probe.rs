//! Device conditions read from sysfs
//!
//! On systems without `/sys/class` every condition reads as satisfied.

use larder_sync::ConstraintProbe;
use std::fs;
use std::path::{Path, PathBuf};

/// Battery percentage below which a discharging battery counts as low
pub const LOW_BATTERY_PERCENT: u8 = 15;

/// Reads network and battery state from `/sys/class`
#[derive(Debug, Clone)]
pub struct SystemProbe {
    net_dir: PathBuf,
    power_dir: PathBuf,
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::with_root("/sys/class")
    }
}

impl SystemProbe {
    /// Probe rooted somewhere other than `/sys/class`
    pub fn with_root(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            net_dir: root.join("net"),
            power_dir: root.join("power_supply"),
        }
    }
}

impl ConstraintProbe for SystemProbe {
    /// Some interface other than loopback is not down
    ///
    /// Tunnels report `unknown` while carrying traffic, so only `up` and
    /// `unknown` count.
    fn network_available(&self) -> bool {
        let Ok(entries) = fs::read_dir(&self.net_dir) else {
            return true;
        };
        entries.flatten().any(|entry| {
            let state = read_trimmed(&entry.path().join("operstate"));
            entry.file_name() != "lo" && matches!(state.as_deref(), Some("up" | "unknown"))
        })
    }

    /// No battery, or one that is charging or above the threshold
    fn battery_not_low(&self) -> bool {
        let Ok(entries) = fs::read_dir(&self.power_dir) else {
            return true;
        };
        entries.flatten().all(|entry| {
            let dir = entry.path();
            if read_trimmed(&dir.join("type")).as_deref() != Some("Battery") {
                return true;
            }
            let discharging = read_trimmed(&dir.join("status")).as_deref() == Some("Discharging");
            let percent = read_trimmed(&dir.join("capacity")).and_then(|c| c.parse::<u8>().ok());
            !discharging || percent.is_none_or(|p| p >= LOW_BATTERY_PERCENT)
        })
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}
