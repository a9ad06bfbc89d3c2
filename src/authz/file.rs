//! File-backed authorization policy.
//!
//! Loads a `mac,allow` allowlist at startup. MAC addresses not in the file
//! are denied.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use macaddr::MacAddr6;

use super::Allower;

/// Authorization policy backed by a flat file.
pub struct FileAllower {
    entries: HashMap<MacAddr6, bool>,
}

impl FileAllower {
    /// Load an allowlist. One `mac,allow` row per line; blank lines and
    /// `#` comments are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read allowlist {}", path.display()))?;

        let mut entries = HashMap::new();
        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (mac, allow) = line
                .split_once(',')
                .ok_or_else(|| anyhow!("allowlist line {}: expected 'mac,allow'", i + 1))?;
            let mac = MacAddr6::from_str(mac.trim())
                .map_err(|e| anyhow!("allowlist line {}: invalid mac '{}': {}", i + 1, mac, e))?;
            let allow = allow
                .trim()
                .parse::<bool>()
                .map_err(|_| anyhow!("allowlist line {}: invalid flag '{}'", i + 1, allow))?;

            entries.insert(mac, allow);
        }

        Ok(Self { entries })
    }
}

impl Allower for FileAllower {
    fn allow(&self, mac: MacAddr6) -> bool {
        self.entries.get(&mac).copied().unwrap_or(false)
    }
}
