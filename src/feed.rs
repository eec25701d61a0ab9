// 📥 County GIS feed - deserialized parcel features
//
// The HTTP client lives outside this crate. What arrives here is the JSON
// body of a feature query:
//
//   {"features": [{"attributes": {"PARCEL_ID": "...", "SITE_ADDR": "...", ...},
//                  "geometry": {"rings": [...]}}]}
//
// Geometry is carried as opaque JSON and never looked at.

use crate::config::ImportConfig;
use crate::entities::HouseAttributes;
use crate::names::OwnerSet;
use anyhow::{Context as AnyhowContext, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

// ============================================================================
// WIRE SHAPE
// ============================================================================

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureCollection {
    #[serde(default)]
    pub features: Vec<Feature>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Feature {
    pub attributes: ParcelAttributes,
    #[serde(default)]
    pub geometry: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ParcelAttributes {
    #[serde(rename = "PARCEL_ID", default)]
    pub parcel_id: Option<String>,

    /// "123 MAIN ST N": street number + street name
    #[serde(rename = "SITE_ADDR", default)]
    pub site_address: Option<String>,

    #[serde(rename = "STR_NUM", default, deserialize_with = "string_or_number")]
    pub street_number: Option<String>,

    #[serde(rename = "SITE_CITY", default)]
    pub city: Option<String>,

    #[serde(rename = "SITE_ZIP", default, deserialize_with = "string_or_number")]
    pub zip: Option<String>,

    #[serde(rename = "OWNER1", default)]
    pub owner1: Option<String>,

    #[serde(rename = "OWNER2", default)]
    pub owner2: Option<String>,

    #[serde(rename = "LATITUDE", default)]
    pub latitude: Option<f64>,

    #[serde(rename = "LONGITUDE", default)]
    pub longitude: Option<f64>,
}

/// The county publishes STR_NUM and SITE_ZIP as numbers on some layers
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(number_text(&n)),
        _ => None,
    })
}

/// `5900.0` reads as `5900`; fractional values keep their digits
fn number_text(n: &serde_json::Number) -> String {
    if let Some(i) = n.as_i64() {
        return i.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
        _ => n.to_string(),
    }
}

// ============================================================================
// PARCEL RECORD (what the driver consumes)
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ParcelRecord {
    pub parcel_id: String,

    /// Street line exactly as the feed spelled it (denylist key)
    pub address: String,

    pub street_number: String,
    pub street_name: String,
    pub city: Option<String>,
    pub zip: String,
    pub owner1: Option<String>,
    pub owner2: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub geometry: Option<serde_json::Value>,
}

impl ParcelRecord {
    pub fn from_feature(feature: Feature) -> Self {
        let attrs = feature.attributes;
        let address = clean(attrs.site_address).unwrap_or_default();
        let street_number = clean(attrs.street_number)
            .unwrap_or_else(|| leading_number(&address).to_string());
        let street_name = strip_street_number(&address, &street_number);

        ParcelRecord {
            parcel_id: clean(attrs.parcel_id).unwrap_or_default(),
            address,
            street_number,
            street_name,
            city: clean(attrs.city),
            zip: clean(attrs.zip).unwrap_or_default(),
            owner1: attrs.owner1,
            owner2: attrs.owner2,
            latitude: attrs.latitude,
            longitude: attrs.longitude,
            geometry: feature.geometry,
        }
    }

    /// Owner fields as a normalized set (blank fields dropped)
    pub fn owners(&self) -> OwnerSet {
        OwnerSet::from_optional([self.owner1.as_deref(), self.owner2.as_deref()])
    }

    /// House values this record asks for
    pub fn house_attributes(&self, config: &ImportConfig) -> HouseAttributes {
        HouseAttributes {
            street_number: self.street_number.clone(),
            street_name: self.street_name.clone(),
            city: self
                .city
                .clone()
                .unwrap_or_else(|| config.default_city.clone()),
            state: config.default_state.clone(),
            zip: self.zip.clone(),
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn leading_number(address: &str) -> &str {
    address.split_whitespace().next().filter(|w| w.chars().all(|c| c.is_ascii_digit())).unwrap_or("")
}

/// "5900 5th Ave N" with number "5900" → "5th Ave N"
fn strip_street_number(address: &str, street_number: &str) -> String {
    if street_number.is_empty() {
        return address.to_string();
    }
    match address.strip_prefix(street_number) {
        Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim().to_string(),
        _ => address.to_string(),
    }
}

// ============================================================================
// LOADING
// ============================================================================

pub fn parse_feed(json: &str) -> Result<Vec<ParcelRecord>> {
    let collection: FeatureCollection =
        serde_json::from_str(json).context("Failed to parse GIS feature collection")?;

    Ok(collection
        .features
        .into_iter()
        .map(ParcelRecord::from_feature)
        .collect())
}

/// Read a saved feature-query response. A failure here aborts the whole job.
pub fn load_feed<P: AsRef<Path>>(path: P) -> Result<Vec<ParcelRecord>> {
    let content = fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read feed file: {:?}", path.as_ref()))?;

    parse_feed(&content)
}

// ============================================================================
// TESTS
// ============================================================================
