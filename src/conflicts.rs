// 🚩 Conflict Detection - visibility, not enforcement
//
// Every change an import makes to an existing house is accepted ("latest
// wins"). The interesting ones are classified here, logged at warn, and
// collected into a per-run ConflictLog for the end-of-run report.
//
// The evaluate_* functions are pure; the ConflictLog is an explicit value
// owned by whoever drives the run.

use crate::entities::HouseAttributes;
use crate::names::OwnerSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Below this, coordinate moves are GIS survey jitter
pub const DEFAULT_COORDINATE_THRESHOLD_METERS: f64 = 10.0;

// ============================================================================
// CONFLICT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictType {
    AddressChange,
    CoordinateChange,
    OwnershipChange,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::AddressChange => "address_change",
            ConflictType::CoordinateChange => "coordinate_change",
            ConflictType::OwnershipChange => "ownership_change",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    AutoAcceptLatest,
}

impl Resolution {
    pub fn is_automatic(&self) -> bool {
        matches!(self, Resolution::AutoAcceptLatest)
    }
}

/// Old/new values, shaped per conflict type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConflictDetails {
    AddressChange {
        old_address: String,
        new_address: String,
    },
    CoordinateChange {
        old_coordinates: (f64, f64),
        new_coordinates: (f64, f64),
        distance_meters: f64,
    },
    OwnershipChange {
        current_owners: Vec<String>,
        new_owners: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conflict {
    pub house_id: String,
    #[serde(flatten)]
    pub details: ConflictDetails,
    pub resolution: Resolution,
    pub detected_at: DateTime<Utc>,
}

impl Conflict {
    fn new(house_id: &str, details: ConflictDetails) -> Self {
        Conflict {
            house_id: house_id.to_string(),
            details,
            resolution: Resolution::AutoAcceptLatest,
            detected_at: Utc::now(),
        }
    }

    pub fn conflict_type(&self) -> ConflictType {
        match self.details {
            ConflictDetails::AddressChange { .. } => ConflictType::AddressChange,
            ConflictDetails::CoordinateChange { .. } => ConflictType::CoordinateChange,
            ConflictDetails::OwnershipChange { .. } => ConflictType::OwnershipChange,
        }
    }

    pub fn description(&self) -> String {
        match &self.details {
            ConflictDetails::AddressChange {
                old_address,
                new_address,
            } => format!("address changed: {} → {}", old_address, new_address),
            ConflictDetails::CoordinateChange {
                distance_meters, ..
            } => format!("coordinates moved {:.0} m", distance_meters),
            ConflictDetails::OwnershipChange {
                current_owners,
                new_owners,
            } => format!(
                "owners changed: [{}] → [{}]",
                current_owners.join("; "),
                new_owners.join("; ")
            ),
        }
    }
}

// ============================================================================
// DETECTION (pure)
// ============================================================================

/// Great-circle distance between two (lat, lon) pairs in degrees
pub fn haversine_distance_meters(from: (f64, f64), to: (f64, f64)) -> f64 {
    let (lat1, lon1) = (from.0.to_radians(), from.1.to_radians());
    let (lat2, lon2) = (to.0.to_radians(), to.1.to_radians());

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Street number, street name, city or zip changed.
/// State is not compared.
pub fn evaluate_address(
    house_id: &str,
    before: &HouseAttributes,
    after: &HouseAttributes,
) -> Option<Conflict> {
    let changed = before.street_number != after.street_number
        || before.street_name != after.street_name
        || before.city != after.city
        || before.zip != after.zip;

    if !changed {
        return None;
    }

    Some(Conflict::new(
        house_id,
        ConflictDetails::AddressChange {
            old_address: before.formatted_address(),
            new_address: after.formatted_address(),
        },
    ))
}

/// A relocation farther than `threshold_meters`. Needs both pairs present.
pub fn evaluate_coordinates(
    house_id: &str,
    before: &HouseAttributes,
    after: &HouseAttributes,
    threshold_meters: f64,
) -> Option<Conflict> {
    if before.latitude == after.latitude && before.longitude == after.longitude {
        return None;
    }

    let (old, new) = (before.coordinates()?, after.coordinates()?);
    let distance = haversine_distance_meters(old, new);

    if distance <= threshold_meters {
        return None;
    }

    Some(Conflict::new(
        house_id,
        ConflictDetails::CoordinateChange {
            old_coordinates: old,
            new_coordinates: new,
            distance_meters: distance,
        },
    ))
}

/// Owner sets differ after normalization. Independent of reconciliation.
pub fn evaluate_ownership(
    house_id: &str,
    current_owners: &OwnerSet,
    new_owners: &OwnerSet,
) -> Option<Conflict> {
    if current_owners.same_owners(new_owners) {
        return None;
    }

    Some(Conflict::new(
        house_id,
        ConflictDetails::OwnershipChange {
            current_owners: current_owners.originals(),
            new_owners: new_owners.originals(),
        },
    ))
}

// ============================================================================
// ACCUMULATOR
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConflictSummary {
    pub total: usize,
    pub auto_resolved: usize,
    /// Always zero while every conflict resolves automatically
    pub requires_manual_review: usize,
    pub by_type: BTreeMap<ConflictType, usize>,
}

impl ConflictSummary {
    pub fn count(&self, conflict_type: ConflictType) -> usize {
        self.by_type.get(&conflict_type).copied().unwrap_or(0)
    }
}

/// Conflicts found during one import run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConflictLog {
    conflicts: Vec<Conflict>,
}

impl ConflictLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the conflict and log it at warn
    pub fn record(&mut self, conflict: Conflict) {
        warn!(
            conflict_type = conflict.conflict_type().as_str(),
            house_id = %conflict.house_id,
            resolution = ?conflict.resolution,
            "{}",
            conflict.description()
        );
        self.conflicts.push(conflict);
    }

    pub fn record_all<I: IntoIterator<Item = Conflict>>(&mut self, conflicts: I) {
        for conflict in conflicts {
            self.record(conflict);
        }
    }

    pub fn conflicts(&self) -> &[Conflict] {
        &self.conflicts
    }

    pub fn len(&self) -> usize {
        self.conflicts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn summary(&self) -> ConflictSummary {
        let mut summary = ConflictSummary {
            total: self.conflicts.len(),
            ..ConflictSummary::default()
        };

        for conflict in &self.conflicts {
            *summary.by_type.entry(conflict.conflict_type()).or_insert(0) += 1;

            if conflict.resolution.is_automatic() {
                summary.auto_resolved += 1;
            } else {
                summary.requires_manual_review += 1;
            }
        }

        summary
    }

    pub fn into_conflicts(self) -> Vec<Conflict> {
        self.conflicts
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs() -> HouseAttributes {
        HouseAttributes {
            street_number: "123".to_string(),
            street_name: "Old St".to_string(),
            city: "St. Petersburg".to_string(),
            state: "FL".to_string(),
            zip: "33701".to_string(),
            latitude: Some(27.7676),
            longitude: Some(-82.6403),
        }
    }

    #[test]
    fn test_haversine_known_distance() {
        let d = haversine_distance_meters((27.7676, -82.6403), (27.7700, -82.6403));

        // 0.0024° of latitude ≈ 267 m
        assert!((d - 266.9).abs() < 1.0, "got {}", d);
        assert_eq!(haversine_distance_meters((27.7676, -82.6403), (27.7676, -82.6403)), 0.0);
    }

    #[test]
    fn test_street_name_change_is_one_conflict() {
        let before = attrs();
        let mut after = attrs();
        after.street_name = "New St".to_string();

        let conflict = evaluate_address("house-1", &before, &after).unwrap();

        assert_eq!(conflict.conflict_type(), ConflictType::AddressChange);
        match &conflict.details {
            ConflictDetails::AddressChange {
                old_address,
                new_address,
            } => {
                assert!(old_address.contains("Old St"));
                assert!(new_address.contains("New St"));
            }
            other => panic!("unexpected details: {:?}", other),
        }
        assert!(evaluate_coordinates("house-1", &before, &after, 10.0).is_none());
    }

    #[test]
    fn test_state_change_alone_is_not_address_conflict() {
        let mut after = attrs();
        after.state = "Florida".to_string();

        assert!(evaluate_address("house-1", &attrs(), &after).is_none());
    }

    #[test]
    fn test_coordinate_threshold() {
        let before = attrs();

        let mut far = attrs();
        far.latitude = Some(27.7700);
        let conflict = evaluate_coordinates("house-1", &before, &far, 10.0).unwrap();
        assert_eq!(conflict.conflict_type(), ConflictType::CoordinateChange);

        // ~1 m north
        let mut near = attrs();
        near.latitude = Some(27.7676 + 0.000009);
        assert!(evaluate_coordinates("house-1", &before, &near, 10.0).is_none());
    }

    #[test]
    fn test_missing_coordinates_never_conflict() {
        let mut before = attrs();
        before.latitude = None;
        let mut after = attrs();
        after.latitude = Some(40.0);

        assert!(evaluate_coordinates("house-1", &before, &after, 10.0).is_none());
    }

    #[test]
    fn test_ownership_conflict_uses_normalized_sets() {
        let current = OwnerSet::from_names(["SMITH, JOHN", "DOE, JANE"]);

        let same = OwnerSet::from_names(["doe, jane", "smith, john"]);
        assert!(evaluate_ownership("house-1", &current, &same).is_none());

        let changed = OwnerSet::from_names(["SMITH, JOHN", "NEW, OWNER"]);
        let conflict = evaluate_ownership("house-1", &current, &changed).unwrap();
        assert_eq!(conflict.conflict_type(), ConflictType::OwnershipChange);
    }

    #[test]
    fn test_summary_counts_by_type() {
        let before = attrs();
        let mut after = attrs();
        after.street_name = "New St".to_string();
        after.latitude = Some(27.7700);

        let mut log = ConflictLog::new();
        log.record_all(evaluate_address("h1", &before, &after));
        log.record_all(evaluate_coordinates("h1", &before, &after, 10.0));
        log.record_all(evaluate_address("h2", &before, &after));

        let summary = log.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.auto_resolved, 3);
        assert_eq!(summary.requires_manual_review, 0);
        assert_eq!(summary.count(ConflictType::AddressChange), 2);
        assert_eq!(summary.count(ConflictType::CoordinateChange), 1);
        assert_eq!(summary.count(ConflictType::OwnershipChange), 0);
    }

    #[test]
    fn test_conflict_serializes_with_type_tag() {
        let mut after = attrs();
        after.street_name = "New St".to_string();
        let conflict = evaluate_address("house-1", &attrs(), &after).unwrap();

        let json = serde_json::to_value(&conflict).unwrap();

        assert_eq!(json["type"], "address_change");
        assert_eq!(json["resolution"], "auto_accept_latest");
        assert_eq!(json["house_id"], "house-1");
    }
}
