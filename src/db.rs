use crate::entities::{House, HouseAttributes, Resident};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

// ============================================================================
// CHANGE CONTEXT (explicit audit attribution)
// ============================================================================

/// Who is making a change, and the instant it is recorded at.
///
/// Passed into every write; nothing reads the actor from ambient state.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeContext {
    pub actor: String,
    pub at: DateTime<Utc>,
}

impl ChangeContext {
    pub fn new(actor: &str) -> Self {
        ChangeContext {
            actor: actor.to_string(),
            at: Utc::now(),
        }
    }

    pub fn at(actor: &str, at: DateTime<Utc>) -> Self {
        ChangeContext {
            actor: actor.to_string(),
            at,
        }
    }
}

// ============================================================================
// EVENTS (audit trail: every change is an event)
// ============================================================================

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        ctx: &ChangeContext,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: ctx.at,
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: ctx.actor.clone(),
        }
    }
}

pub fn setup_database(conn: &Connection) -> Result<()> {
    // WAL for crash recovery; in-memory databases silently stay on "memory"
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Houses (one row per county parcel)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS houses (
            id TEXT PRIMARY KEY,
            parcel_id TEXT UNIQUE NOT NULL,
            street_number TEXT NOT NULL,
            street_name TEXT NOT NULL,
            city TEXT NOT NULL,
            state TEXT NOT NULL,
            zip TEXT NOT NULL,
            latitude REAL,
            longitude REAL,
            boundary TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Residents (soft-removed via moved_out_at, never deleted)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS residents (
            id TEXT PRIMARY KEY,
            house_id TEXT NOT NULL REFERENCES houses(id),
            official_name TEXT,
            first_seen_at TEXT NOT NULL,
            moved_out_at TEXT,
            display_name TEXT,
            email TEXT,
            phone TEXT,
            hidden INTEGER NOT NULL DEFAULT 0
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail / event sourcing)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_residents_house ON residents(house_id, moved_out_at)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp)",
        [],
    )?;

    Ok(())
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC, id DESC",
    )?;

    let events = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp_str: String = row.get(1)?;
            let data_json: String = row.get(5)?;

            Ok(Event {
                event_id: row.get(0)?,
                timestamp: parse_time(1, &timestamp_str)?,
                event_type: row.get(2)?,
                entity_type: row.get(3)?,
                entity_id: row.get(4)?,
                data: parse_json(5, &data_json)?,
                actor: row.get(6)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(events)
}

// ============================================================================
// HOUSES
// ============================================================================

const HOUSE_COLUMNS: &str = "id, parcel_id, street_number, street_name, city, state, zip,
     latitude, longitude, boundary, created_at, updated_at";

pub fn insert_house(conn: &Connection, house: &House, ctx: &ChangeContext) -> Result<()> {
    let boundary_json = house
        .boundary
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let a = &house.attributes;

    conn.execute(
        "INSERT INTO houses (
            id, parcel_id, street_number, street_name, city, state, zip,
            latitude, longitude, boundary, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            house.id,
            house.parcel_id,
            a.street_number,
            a.street_name,
            a.city,
            a.state,
            a.zip,
            a.latitude,
            a.longitude,
            boundary_json,
            house.created_at.to_rfc3339(),
            house.updated_at.to_rfc3339(),
        ],
    )?;

    insert_event(
        conn,
        &Event::new(
            "house_created",
            "house",
            &house.id,
            serde_json::json!({
                "parcel_id": house.parcel_id,
                "address": a.formatted_address(),
            }),
            ctx,
        ),
    )
}

/// Overwrite the mutable attributes; records old and new values in the event
pub fn update_house(
    conn: &Connection,
    house: &House,
    previous: &HouseAttributes,
    ctx: &ChangeContext,
) -> Result<()> {
    let boundary_json = house
        .boundary
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let a = &house.attributes;

    let updated = conn.execute(
        "UPDATE houses
         SET street_number = ?1, street_name = ?2, city = ?3, state = ?4, zip = ?5,
             latitude = ?6, longitude = ?7, boundary = ?8, updated_at = ?9
         WHERE id = ?10",
        params![
            a.street_number,
            a.street_name,
            a.city,
            a.state,
            a.zip,
            a.latitude,
            a.longitude,
            boundary_json,
            house.updated_at.to_rfc3339(),
            house.id,
        ],
    )?;

    if updated == 0 {
        return Err(Error::NotFound(format!("house {}", house.id)));
    }

    insert_event(
        conn,
        &Event::new(
            "house_updated",
            "house",
            &house.id,
            serde_json::json!({
                "before": previous,
                "after": a,
            }),
            ctx,
        ),
    )
}

pub fn find_house_by_parcel(conn: &Connection, parcel_id: &str) -> Result<Option<House>> {
    let sql = format!("SELECT {} FROM houses WHERE parcel_id = ?1", HOUSE_COLUMNS);
    let house = conn
        .query_row(&sql, params![parcel_id], house_from_row)
        .optional()?;
    Ok(house)
}

pub fn get_house(conn: &Connection, id: &str) -> Result<Option<House>> {
    let sql = format!("SELECT {} FROM houses WHERE id = ?1", HOUSE_COLUMNS);
    let house = conn.query_row(&sql, params![id], house_from_row).optional()?;
    Ok(house)
}

pub fn all_houses(conn: &Connection) -> Result<Vec<House>> {
    let sql = format!(
        "SELECT {} FROM houses ORDER BY street_name, CAST(street_number AS INTEGER), street_number",
        HOUSE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;

    let houses = stmt
        .query_map([], house_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(houses)
}

fn house_from_row(row: &Row) -> rusqlite::Result<House> {
    let boundary_json: Option<String> = row.get(9)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    let boundary = match boundary_json {
        Some(json) => Some(parse_json(9, &json)?),
        None => None,
    };

    Ok(House {
        id: row.get(0)?,
        parcel_id: row.get(1)?,
        attributes: HouseAttributes {
            street_number: row.get(2)?,
            street_name: row.get(3)?,
            city: row.get(4)?,
            state: row.get(5)?,
            zip: row.get(6)?,
            latitude: row.get(7)?,
            longitude: row.get(8)?,
        },
        boundary,
        created_at: parse_time(10, &created_at)?,
        updated_at: parse_time(11, &updated_at)?,
    })
}

// ============================================================================
// RESIDENTS
// ============================================================================

const RESIDENT_COLUMNS: &str = "id, house_id, official_name, first_seen_at, moved_out_at,
     display_name, email, phone, hidden";

pub fn insert_resident(conn: &Connection, resident: &Resident, ctx: &ChangeContext) -> Result<()> {
    conn.execute(
        "INSERT INTO residents (
            id, house_id, official_name, first_seen_at, moved_out_at,
            display_name, email, phone, hidden
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            resident.id,
            resident.house_id,
            resident.official_name,
            resident.first_seen_at.to_rfc3339(),
            resident.moved_out_at.map(|dt| dt.to_rfc3339()),
            resident.display_name,
            resident.email,
            resident.phone,
            resident.hidden,
        ],
    )?;

    insert_event(
        conn,
        &Event::new(
            "resident_added",
            "house",
            &resident.house_id,
            resident_event_data(resident),
            ctx,
        ),
    )
}

/// Set moved_out_at exactly once. A resident that already moved out is refused.
pub fn mark_resident_moved_out(
    conn: &Connection,
    resident: &Resident,
    ctx: &ChangeContext,
) -> Result<()> {
    let updated = conn.execute(
        "UPDATE residents SET moved_out_at = ?1 WHERE id = ?2 AND moved_out_at IS NULL",
        params![ctx.at.to_rfc3339(), resident.id],
    )?;

    if updated == 0 {
        return Err(Error::AlreadyMovedOut(resident.id.clone()));
    }

    insert_event(
        conn,
        &Event::new(
            "resident_moved_out",
            "house",
            &resident.house_id,
            resident_event_data(resident),
            ctx,
        ),
    )
}

/// Names stay in the residents table; the audit trail is public
fn resident_event_data(resident: &Resident) -> serde_json::Value {
    serde_json::json!({
        "resident_id": resident.id,
        "owner": resident.is_owner(),
    })
}

pub fn residents_for_house(
    conn: &Connection,
    house_id: &str,
    include_former: bool,
) -> Result<Vec<Resident>> {
    let sql = if include_former {
        format!(
            "SELECT {} FROM residents WHERE house_id = ?1 ORDER BY first_seen_at, id",
            RESIDENT_COLUMNS
        )
    } else {
        format!(
            "SELECT {} FROM residents WHERE house_id = ?1 AND moved_out_at IS NULL
             ORDER BY first_seen_at, id",
            RESIDENT_COLUMNS
        )
    };
    let mut stmt = conn.prepare(&sql)?;

    let residents = stmt
        .query_map(params![house_id], resident_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(residents)
}

fn resident_from_row(row: &Row) -> rusqlite::Result<Resident> {
    let first_seen_at: String = row.get(3)?;
    let moved_out_at: Option<String> = row.get(4)?;

    Ok(Resident {
        id: row.get(0)?,
        house_id: row.get(1)?,
        official_name: row.get(2)?,
        first_seen_at: parse_time(3, &first_seen_at)?,
        moved_out_at: moved_out_at.map(|s| parse_time(4, &s)).transpose()?,
        display_name: row.get(5)?,
        email: row.get(6)?,
        phone: row.get(7)?,
        hidden: row.get(8)?,
    })
}

// ============================================================================
// COLUMN PARSING
// ============================================================================

fn parse_time(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_json(idx: usize, s: &str) -> rusqlite::Result<serde_json::Value> {
    serde_json::from_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
