// ⚖️ Ownership Reconciliation - who moved out, who stayed, who arrived
//
// The county feed only says "these are the owners of parcel X today".
// It carries no identity for people and no notion of departure, so we
// infer both by comparing owner-name SETS:
//
//   staying  = current ∩ new
//   leaving  = current − new
//   arriving = new − current
//
// Identical sets mean nothing happened: re-importing the same feed is a no-op.

use crate::config::HousematePolicy;
use crate::db::ChangeContext;
use crate::entities::{House, Resident};
use crate::error::Result;
use crate::names::{normalize_name, OwnerSet};
use crate::store::Directory;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, info};

// ============================================================================
// CHANGE RECORD
// ============================================================================

/// Result of reconciling one house. Not persisted; handed to notification.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnershipChangeRecord {
    pub residents_added: Vec<Resident>,
    pub residents_removed: Vec<Resident>,
}

impl OwnershipChangeRecord {
    pub fn is_empty(&self) -> bool {
        self.residents_added.is_empty() && self.residents_removed.is_empty()
    }

    pub fn summary(&self) -> String {
        let names = |residents: &[Resident]| {
            residents
                .iter()
                .map(|r| r.name_for_display().unwrap_or("(housemate)"))
                .collect::<Vec<_>>()
                .join("; ")
        };

        format!(
            "{} added [{}], {} removed [{}]",
            self.residents_added.len(),
            names(&self.residents_added),
            self.residents_removed.len(),
            names(&self.residents_removed),
        )
    }
}

// ============================================================================
// PLAN
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnoverKind {
    /// Owner sets are equal after normalization
    Unchanged,

    /// No previous owner remains: the household turned over
    Complete,

    /// Some owners stay (or the house had no known owners yet)
    Partial,
}

/// The writes one reconciliation needs, computed without touching storage.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnershipPlan {
    pub kind: TurnoverKind,
    pub staying: BTreeSet<String>,
    pub leaving: BTreeSet<String>,

    /// Current residents to mark moved out
    pub move_outs: Vec<Resident>,

    /// Raw incoming spellings to create residents for
    pub arrivals: Vec<String>,
}

impl OwnershipPlan {
    fn unchanged(staying: BTreeSet<String>) -> Self {
        OwnershipPlan {
            kind: TurnoverKind::Unchanged,
            staying,
            leaving: BTreeSet::new(),
            move_outs: Vec::new(),
            arrivals: Vec::new(),
        }
    }

    pub fn is_noop(&self) -> bool {
        self.move_outs.is_empty() && self.arrivals.is_empty()
    }
}

// ============================================================================
// RECONCILER
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct OwnershipReconciler {
    pub housemate_policy: HousematePolicy,
}

impl OwnershipReconciler {
    pub fn new(housemate_policy: HousematePolicy) -> Self {
        OwnershipReconciler { housemate_policy }
    }

    /// Official owner names among the current residents
    pub fn current_owners(residents: &[Resident]) -> OwnerSet {
        OwnerSet::from_names(
            residents
                .iter()
                .filter(|r| r.is_current())
                .filter_map(|r| r.official_name.as_deref()),
        )
    }

    /// Decide what has to change. Pure: reads nothing, writes nothing.
    pub fn plan(&self, current: &[Resident], incoming: &OwnerSet) -> OwnershipPlan {
        let current: Vec<&Resident> = current.iter().filter(|r| r.is_current()).collect();
        let current_owners = OwnerSet::from_names(
            current.iter().filter_map(|r| r.official_name.as_deref()),
        );

        let old = current_owners.normalized();
        if current_owners.same_owners(incoming) {
            return OwnershipPlan::unchanged(old);
        }

        let new = incoming.normalized();
        let staying: BTreeSet<String> = old.intersection(&new).cloned().collect();
        let leaving: BTreeSet<String> = old.difference(&new).cloned().collect();
        let arriving: BTreeSet<String> = new.difference(&old).cloned().collect();

        let complete = staying.is_empty() && !old.is_empty() && !new.is_empty();
        let evict_everyone = complete && self.housemate_policy == HousematePolicy::LeaveWithOwners;

        let move_outs = current
            .into_iter()
            .filter(|r| {
                evict_everyone
                    || r.official_name
                        .as_deref()
                        .and_then(normalize_name)
                        .map_or(false, |name| leaving.contains(&name))
            })
            .cloned()
            .collect();

        let arrivals = arriving
            .iter()
            .filter_map(|name| incoming.original(name))
            .map(str::to_string)
            .collect();

        OwnershipPlan {
            kind: if complete {
                TurnoverKind::Complete
            } else {
                TurnoverKind::Partial
            },
            staying,
            leaving,
            move_outs,
            arrivals,
        }
    }

    /// Plan and apply one house's ownership change as a single atomic unit.
    ///
    /// `current` must be the house's residents that have not moved out.
    pub fn reconcile<D: Directory + ?Sized>(
        &self,
        directory: &mut D,
        house: &House,
        current: &[Resident],
        incoming: &OwnerSet,
        ctx: &ChangeContext,
    ) -> Result<OwnershipChangeRecord> {
        let plan = self.plan(current, incoming);

        if plan.is_noop() {
            debug!(house_id = %house.id, "ownership unchanged");
            return Ok(OwnershipChangeRecord::default());
        }

        info!(
            house_id = %house.id,
            address = %house.address(),
            kind = ?plan.kind,
            leaving = plan.move_outs.len(),
            arriving = plan.arrivals.len(),
            "ownership changed"
        );

        directory.apply_ownership_plan(house, &plan, ctx)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::HouseAttributes;
    use crate::error::Error;
    use crate::store::SqliteDirectory;

    fn setup() -> (SqliteDirectory, House, ChangeContext) {
        let mut dir = SqliteDirectory::open_in_memory().unwrap();
        let ctx = ChangeContext::new("test_import");
        let house = dir
            .insert_house(
                "P-1",
                HouseAttributes {
                    street_number: "123".to_string(),
                    street_name: "Main St".to_string(),
                    city: "St. Petersburg".to_string(),
                    state: "FL".to_string(),
                    zip: "33701".to_string(),
                    latitude: None,
                    longitude: None,
                },
                None,
                &ctx,
            )
            .unwrap();
        (dir, house, ctx)
    }

    fn seed(dir: &mut SqliteDirectory, house: &House, names: &[Option<&str>], ctx: &ChangeContext) {
        for name in names {
            let resident = match name {
                Some(n) => Resident::new_owner(&house.id, n, ctx.at).unwrap(),
                None => Resident::housemate(&house.id, ctx.at),
            };
            dir.insert_resident(&resident, ctx).unwrap();
        }
    }

    fn run(
        dir: &mut SqliteDirectory,
        house: &House,
        owners: &[&str],
        ctx: &ChangeContext,
    ) -> OwnershipChangeRecord {
        let current = dir.current_residents(&house.id).unwrap();
        OwnershipReconciler::default()
            .reconcile(dir, house, &current, &OwnerSet::from_names(owners), ctx)
            .unwrap()
    }

    fn current_names(dir: &SqliteDirectory, house: &House) -> Vec<Option<String>> {
        let mut names: Vec<Option<String>> = dir
            .current_residents(&house.id)
            .unwrap()
            .into_iter()
            .map(|r| r.official_name)
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_reimport_is_idempotent() {
        let (mut dir, house, ctx) = setup();

        let first = run(&mut dir, &house, &["SMITH, JOHN", "DOE, JANE"], &ctx);
        assert_eq!(first.residents_added.len(), 2);

        let events_before = dir.history(&house.id).unwrap().len();
        let second = run(&mut dir, &house, &["SMITH, JOHN", "DOE, JANE"], &ctx);

        assert!(second.is_empty());
        assert_eq!(dir.history(&house.id).unwrap().len(), events_before);
        assert_eq!(dir.current_residents(&house.id).unwrap().len(), 2);
    }

    #[test]
    fn test_case_and_order_insensitive() {
        let (mut dir, house, ctx) = setup();
        seed(&mut dir, &house, &[Some("SMITH, JOHN"), Some("DOE, JANE")], &ctx);

        let record = run(&mut dir, &house, &["doe, jane", " smith, john "], &ctx);

        assert!(record.is_empty());
    }

    #[test]
    fn test_complete_turnover_evicts_housemates() {
        let (mut dir, house, ctx) = setup();
        seed(&mut dir, &house, &[Some("OLD, OWNER"), None], &ctx);

        let record = run(&mut dir, &house, &["NEW, OWNER"], &ctx);

        assert_eq!(record.residents_removed.len(), 2);
        assert_eq!(record.residents_added.len(), 1);
        assert!(record.residents_removed.iter().all(|r| r.moved_out_at == Some(ctx.at)));
        assert_eq!(record.residents_added[0].official_name.as_deref(), Some("NEW, OWNER"));
        assert_eq!(record.residents_added[0].first_seen_at, ctx.at);
        assert_eq!(current_names(&dir, &house), vec![Some("NEW, OWNER".to_string())]);
    }

    #[test]
    fn test_complete_turnover_keep_policy_spares_housemates() {
        let (mut dir, house, ctx) = setup();
        seed(&mut dir, &house, &[Some("OLD, OWNER"), None], &ctx);
        let current = dir.current_residents(&house.id).unwrap();

        let record = OwnershipReconciler::new(HousematePolicy::Keep)
            .reconcile(&mut dir, &house, &current, &OwnerSet::from_names(["NEW, OWNER"]), &ctx)
            .unwrap();

        assert_eq!(record.residents_removed.len(), 1);
        assert_eq!(
            current_names(&dir, &house),
            vec![None, Some("NEW, OWNER".to_string())]
        );
    }

    #[test]
    fn test_partial_turnover_only_moves_departed_owner() {
        let (mut dir, house, ctx) = setup();
        seed(&mut dir, &house, &[Some("SMITH, JOHN"), Some("DOE, JANE"), None], &ctx);

        let record = run(&mut dir, &house, &["SMITH, JOHN", "NEW, OWNER"], &ctx);

        assert_eq!(record.residents_removed.len(), 1);
        assert_eq!(record.residents_removed[0].official_name.as_deref(), Some("DOE, JANE"));
        assert_eq!(record.residents_added.len(), 1);
        assert_eq!(
            current_names(&dir, &house),
            vec![
                None,
                Some("NEW, OWNER".to_string()),
                Some("SMITH, JOHN".to_string()),
            ]
        );
    }

    #[test]
    fn test_new_owner_keeps_raw_spelling() {
        let (mut dir, house, ctx) = setup();

        let record = run(&mut dir, &house, &["  Acme Holdings LLC "], &ctx);

        assert_eq!(
            record.residents_added[0].official_name.as_deref(),
            Some("  Acme Holdings LLC ")
        );
    }

    #[test]
    fn test_no_names_no_owners_is_noop() {
        let (mut dir, house, ctx) = setup();
        seed(&mut dir, &house, &[None], &ctx);

        let current = dir.current_residents(&house.id).unwrap();
        let incoming = OwnerSet::from_optional([None, Some("   ")]);
        let plan = OwnershipReconciler::default().plan(&current, &incoming);

        assert_eq!(plan.kind, TurnoverKind::Unchanged);
        assert!(plan.is_noop());
    }

    #[test]
    fn test_owners_dropped_from_feed_leave_housemates() {
        let (mut dir, house, ctx) = setup();
        seed(&mut dir, &house, &[Some("SMITH, JOHN"), None], &ctx);

        let current = dir.current_residents(&house.id).unwrap();
        let plan = OwnershipReconciler::default().plan(&current, &OwnerSet::new());

        assert_eq!(plan.kind, TurnoverKind::Partial);
        assert_eq!(plan.move_outs.len(), 1);
        assert!(plan.arrivals.is_empty());
    }

    #[test]
    fn test_blank_arrival_rolls_back_everything() {
        let (mut dir, house, ctx) = setup();
        seed(&mut dir, &house, &[Some("OLD, OWNER")], &ctx);
        let current = dir.current_residents(&house.id).unwrap();

        for blank in ["", "   "] {
            let plan = OwnershipPlan {
                kind: TurnoverKind::Complete,
                staying: BTreeSet::new(),
                leaving: ["OLD, OWNER".to_string()].into_iter().collect(),
                move_outs: current.clone(),
                arrivals: vec!["NEW, OWNER".to_string(), blank.to_string()],
            };

            let err = dir.apply_ownership_plan(&house, &plan, &ctx).unwrap_err();

            assert!(matches!(err, Error::Validation(_)));
            assert_eq!(current_names(&dir, &house), vec![Some("OLD, OWNER".to_string())]);
            assert_eq!(dir.residents(&house.id, true).unwrap().len(), 1);
        }
    }

    #[test]
    fn test_change_record_summary() {
        let (mut dir, house, ctx) = setup();
        seed(&mut dir, &house, &[Some("OLD, OWNER")], &ctx);

        let record = run(&mut dir, &house, &["NEW, OWNER"], &ctx);

        assert_eq!(
            record.summary(),
            "1 added [NEW, OWNER], 1 removed [OLD, OWNER]"
        );
    }
}
