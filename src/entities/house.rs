// 🏠 House Entity - stable identity + mutable address/location values
//
// Identity: UUID (ours) + parcel_id (the county's permanent identifier)
// Values: address fields and coordinates, replaced wholesale on every import
// The boundary polygon is carried as opaque JSON and never interpreted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// HOUSE ATTRIBUTES (the mutable snapshot)
// ============================================================================

/// The part of a house that an import may change.
///
/// Conflict detection compares two of these (before/after) instead of
/// inspecting any persistence-layer change tracking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HouseAttributes {
    pub street_number: String,
    pub street_name: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl HouseAttributes {
    /// "123 Main St, St. Petersburg, FL 33701"
    pub fn formatted_address(&self) -> String {
        format!(
            "{} {}, {}, {} {}",
            self.street_number, self.street_name, self.city, self.state, self.zip
        )
        .trim()
        .to_string()
    }

    /// Street line only, the form the county feed and the denylist use
    pub fn street_address(&self) -> String {
        format!("{} {}", self.street_number, self.street_name)
            .trim()
            .to_string()
    }

    /// Both halves of the pair, or nothing
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

// ============================================================================
// HOUSE ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct House {
    /// Stable identity (UUID) - NEVER changes
    pub id: String,

    /// Permanent identifier supplied by the GIS feed
    pub parcel_id: String,

    #[serde(flatten)]
    pub attributes: HouseAttributes,

    /// Opaque geometry blob, passed through unchanged
    pub boundary: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl House {
    pub fn new(
        parcel_id: String,
        attributes: HouseAttributes,
        boundary: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();

        House {
            id: uuid::Uuid::new_v4().to_string(),
            parcel_id,
            attributes,
            boundary,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn address(&self) -> String {
        self.attributes.street_address()
    }

    /// True when an import carrying these values would change nothing
    pub fn is_unchanged_by(
        &self,
        attributes: &HouseAttributes,
        boundary: &Option<serde_json::Value>,
    ) -> bool {
        self.attributes == *attributes && self.boundary == *boundary
    }
}

// ============================================================================
// TESTS
// ============================================================================
