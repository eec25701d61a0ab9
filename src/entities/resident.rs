// 👤 Resident Entity - soft-removed, never deleted
//
// A resident is current while moved_out_at is None. The move-out timestamp
// is set once, by reconciliation, and is final from then on.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resident {
    /// Stable identity (UUID)
    pub id: String,

    pub house_id: String,

    /// Name exactly as the authoritative feed spelled it.
    /// None only for housemates who are not on the deed.
    pub official_name: Option<String>,

    /// Set at creation, never changed
    pub first_seen_at: DateTime<Utc>,

    /// None = still living here
    pub moved_out_at: Option<DateTime<Utc>>,

    // Personal fields, maintained by people, not by imports
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,

    /// Privacy opt-out: hidden residents never leave the API
    #[serde(default)]
    pub hidden: bool,
}

impl Resident {
    /// Resident created from a feed owner name.
    ///
    /// A blank or whitespace-only name is a contract violation by the caller.
    pub fn new_owner(house_id: &str, official_name: &str, now: DateTime<Utc>) -> Result<Self> {
        if official_name.trim().is_empty() {
            return Err(Error::Validation(format!(
                "refusing to create resident with blank official name for house {}",
                house_id
            )));
        }

        Ok(Resident {
            official_name: Some(official_name.to_string()),
            ..Resident::housemate(house_id, now)
        })
    }

    /// Resident without an official name (added by a neighbor, not the county)
    pub fn housemate(house_id: &str, now: DateTime<Utc>) -> Self {
        Resident {
            id: uuid::Uuid::new_v4().to_string(),
            house_id: house_id.to_string(),
            official_name: None,
            first_seen_at: now,
            moved_out_at: None,
            display_name: None,
            email: None,
            phone: None,
            hidden: false,
        }
    }

    pub fn is_current(&self) -> bool {
        self.moved_out_at.is_none()
    }

    pub fn is_owner(&self) -> bool {
        self.official_name.is_some()
    }

    /// Name to show neighbors
    pub fn name_for_display(&self) -> Option<&str> {
        self.display_name
            .as_deref()
            .or(self.official_name.as_deref())
    }

    /// In-memory counterpart of the persisted move-out
    pub fn mark_moved_out(&mut self, at: DateTime<Utc>) -> Result<()> {
        if self.moved_out_at.is_some() {
            return Err(Error::AlreadyMovedOut(self.id.clone()));
        }
        self.moved_out_at = Some(at);
        Ok(())
    }
}
