// ⚙️ Import configuration - settings as data
//
// Loaded from a JSON file (same shape as the defaults below); every field
// is optional in the file and falls back to the default.

use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

// ============================================================================
// HOUSEMATE POLICY
// ============================================================================

/// What happens to residents without an official name when every
/// previously known owner has left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HousematePolicy {
    /// Complete turnover: housemates are assumed to have left with the owners
    #[default]
    LeaveWithOwners,

    /// Only residents whose official name disappeared are moved out
    Keep,
}

// ============================================================================
// DENYLIST
// ============================================================================

/// Addresses the import never touches. Exact match only:
/// "5900 5th Ave N # 2" is a different address from "5900 5th Ave N".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Denylist {
    addresses: HashSet<String>,
}

impl Denylist {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Denylist {
            addresses: addresses.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, address: &str) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

impl Default for Denylist {
    fn default() -> Self {
        // Commercial complex sharing one parcel with dozens of unit owners
        Denylist::new(["5900 5th Ave N"])
    }
}

// ============================================================================
// IMPORT CONFIG
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Coordinate moves at or below this distance are survey jitter
    pub coordinate_threshold_meters: f64,

    pub denylist: Denylist,

    /// Used when a feed record leaves city/state blank
    pub default_city: String,
    pub default_state: String,

    pub housemate_policy: HousematePolicy,

    /// Audit attribution for every write the import makes
    pub actor: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        ImportConfig {
            coordinate_threshold_meters: 10.0,
            denylist: Denylist::default(),
            default_city: "St. Petersburg".to_string(),
            default_state: "FL".to_string(),
            housemate_policy: HousematePolicy::default(),
            actor: "gis_import".to_string(),
        }
    }
}

impl ImportConfig {
    /// Load config from JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: ImportConfig =
            serde_json::from_str(&content).context("Failed to parse config JSON")?;

        Ok(config)
    }
}

// ============================================================================
// TESTS
// ============================================================================
