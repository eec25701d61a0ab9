// 🗄️ Directory store - the persistence seam the import talks to
//
// The batch driver and the reconciler only see the `Directory` trait.
// `SqliteDirectory` is the real implementation; tests wrap it to inject
// failures.

use crate::db::{self, ChangeContext, Event};
use crate::entities::{House, HouseAttributes, Resident};
use crate::error::{Error, Result};
use crate::reconciliation::{OwnershipChangeRecord, OwnershipPlan};
use rusqlite::Connection;
use std::path::Path;

// ============================================================================
// DIRECTORY TRAIT
// ============================================================================

pub trait Directory {
    /// Look up a house by the feed's permanent parcel identifier
    fn find_house(&self, parcel_id: &str) -> Result<Option<House>>;

    fn insert_house(
        &mut self,
        parcel_id: &str,
        attributes: HouseAttributes,
        boundary: Option<serde_json::Value>,
        ctx: &ChangeContext,
    ) -> Result<House>;

    /// Replace a house's mutable values ("accept latest")
    fn update_house(
        &mut self,
        house: &House,
        attributes: HouseAttributes,
        boundary: Option<serde_json::Value>,
        ctx: &ChangeContext,
    ) -> Result<House>;

    /// Residents that have not moved out
    fn current_residents(&self, house_id: &str) -> Result<Vec<Resident>>;

    /// Apply every move-out and creation of a plan, all or nothing
    fn apply_ownership_plan(
        &mut self,
        house: &House,
        plan: &OwnershipPlan,
        ctx: &ChangeContext,
    ) -> Result<OwnershipChangeRecord>;
}

// ============================================================================
// SQLITE DIRECTORY
// ============================================================================

pub struct SqliteDirectory {
    conn: Connection,
}

impl SqliteDirectory {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> Result<Self> {
        db::setup_database(&conn)?;
        Ok(SqliteDirectory { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Add a resident outside of reconciliation (a housemate added by a neighbor)
    pub fn insert_resident(&mut self, resident: &Resident, ctx: &ChangeContext) -> Result<()> {
        db::insert_resident(&self.conn, resident, ctx)
    }

    pub fn residents(&self, house_id: &str, include_former: bool) -> Result<Vec<Resident>> {
        db::residents_for_house(&self.conn, house_id, include_former)
    }

    /// Audit events for a house, newest first
    pub fn history(&self, house_id: &str) -> Result<Vec<Event>> {
        db::get_events_for_entity(&self.conn, "house", house_id)
    }

    pub fn all_houses(&self) -> Result<Vec<House>> {
        db::all_houses(&self.conn)
    }
}

impl Directory for SqliteDirectory {
    fn find_house(&self, parcel_id: &str) -> Result<Option<House>> {
        db::find_house_by_parcel(&self.conn, parcel_id)
    }

    fn insert_house(
        &mut self,
        parcel_id: &str,
        attributes: HouseAttributes,
        boundary: Option<serde_json::Value>,
        ctx: &ChangeContext,
    ) -> Result<House> {
        if parcel_id.trim().is_empty() {
            return Err(Error::Validation(format!(
                "house at {} has no parcel id",
                attributes.street_address()
            )));
        }

        let mut house = House::new(parcel_id.to_string(), attributes, boundary);
        house.created_at = ctx.at;
        house.updated_at = ctx.at;

        let tx = self.conn.transaction()?;
        db::insert_house(&tx, &house, ctx)?;
        tx.commit()?;

        Ok(house)
    }

    fn update_house(
        &mut self,
        house: &House,
        attributes: HouseAttributes,
        boundary: Option<serde_json::Value>,
        ctx: &ChangeContext,
    ) -> Result<House> {
        let mut updated = house.clone();
        updated.attributes = attributes;
        updated.boundary = boundary;
        updated.updated_at = ctx.at;

        let tx = self.conn.transaction()?;
        db::update_house(&tx, &updated, &house.attributes, ctx)?;
        tx.commit()?;

        Ok(updated)
    }

    fn current_residents(&self, house_id: &str) -> Result<Vec<Resident>> {
        db::residents_for_house(&self.conn, house_id, false)
    }

    fn apply_ownership_plan(
        &mut self,
        house: &House,
        plan: &OwnershipPlan,
        ctx: &ChangeContext,
    ) -> Result<OwnershipChangeRecord> {
        let mut record = OwnershipChangeRecord::default();

        // Dropping `tx` on any early return rolls the whole house back
        let tx = self.conn.transaction()?;

        for resident in &plan.move_outs {
            db::mark_resident_moved_out(&tx, resident, ctx)?;

            let mut moved = resident.clone();
            moved.mark_moved_out(ctx.at)?;
            record.residents_removed.push(moved);
        }

        for name in &plan.arrivals {
            let resident = Resident::new_owner(&house.id, name, ctx.at)?;
            db::insert_resident(&tx, &resident, ctx)?;
            record.residents_added.push(resident);
        }

        tx.commit()?;

        Ok(record)
    }
}

impl std::fmt::Debug for SqliteDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteDirectory")
            .field("path", &self.conn.path())
            .finish()
    }
}
