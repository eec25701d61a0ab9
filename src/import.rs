// 🔁 Batch import driver
//
// One pass over one fetched feed, strictly in order:
//   denylist skip → house upsert → conflict detection → ownership reconciliation
//
// A failing record is counted and logged; the run always reaches the end.

use crate::conflicts::{self, Conflict, ConflictLog, ConflictSummary};
use crate::config::ImportConfig;
use crate::db::ChangeContext;
use crate::error::Result;
use crate::feed::ParcelRecord;
use crate::notify::Notifier;
use crate::reconciliation::{OwnershipChangeRecord, OwnershipReconciler};
use crate::store::Directory;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, error, info};

/// Progress line every N records
const PROGRESS_INTERVAL: usize = 500;

// ============================================================================
// RUN STATISTICS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportStats {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub errors: usize,
    pub residents_added: usize,
    pub residents_removed: usize,
}

impl ImportStats {
    pub fn processed(&self) -> usize {
        self.created + self.updated + self.unchanged + self.skipped + self.errors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Created,
    Updated,
    Unchanged,
}

/// One house whose residents changed during the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HouseOwnershipChange {
    pub house_id: String,
    pub parcel_id: String,
    pub address: String,
    pub change: OwnershipChangeRecord,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportFailure {
    pub parcel_id: String,
    pub address: String,
    pub error: String,
    /// Underlying causes, outermost first
    #[serde(default)]
    pub causes: Vec<String>,
}

// ============================================================================
// RUN REPORT
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub stats: ImportStats,
    pub conflict_summary: ConflictSummary,
    pub conflicts: Vec<Conflict>,
    pub ownership_changes: Vec<HouseOwnershipChange>,
    pub failures: Vec<ImportFailure>,
}

impl ImportReport {
    pub fn summary(&self) -> String {
        format!(
            "Import finished in {:.1}s: {} created, {} updated, {} unchanged, {} skipped, {} errors; \
             {} residents added, {} removed; {} conflicts ({} auto-resolved, {} need review)",
            self.duration_ms as f64 / 1000.0,
            self.stats.created,
            self.stats.updated,
            self.stats.unchanged,
            self.stats.skipped,
            self.stats.errors,
            self.stats.residents_added,
            self.stats.residents_removed,
            self.conflict_summary.total,
            self.conflict_summary.auto_resolved,
            self.conflict_summary.requires_manual_review,
        )
    }

    pub fn has_errors(&self) -> bool {
        self.stats.errors > 0
    }
}

// ============================================================================
// IMPORTER
// ============================================================================

pub struct Importer<'a> {
    config: &'a ImportConfig,
    reconciler: OwnershipReconciler,
}

impl<'a> Importer<'a> {
    pub fn new(config: &'a ImportConfig) -> Self {
        Importer {
            config,
            reconciler: OwnershipReconciler::new(config.housemate_policy),
        }
    }

    /// Run every record through the pipeline and hand the report to `notifier`
    pub fn run<D, N, I>(&self, directory: &mut D, records: I, notifier: &mut N) -> ImportReport
    where
        D: Directory + ?Sized,
        N: Notifier + ?Sized,
        I: IntoIterator<Item = ParcelRecord>,
    {
        let started_at = Utc::now();
        let clock = Instant::now();

        let mut stats = ImportStats::default();
        let mut conflict_log = ConflictLog::new();
        let mut ownership_changes = Vec::new();
        let mut failures = Vec::new();

        info!(denylist = self.config.denylist.len(), "starting parcel import");

        for (index, record) in records.into_iter().enumerate() {
            if index > 0 && index % PROGRESS_INTERVAL == 0 {
                info!(processed = index, errors = stats.errors, "import progress");
            }

            if self.config.denylist.contains(&record.address) {
                debug!(address = %record.address, "skipping denylisted address");
                stats.skipped += 1;
                continue;
            }

            let ctx = ChangeContext::new(&self.config.actor);

            match self.import_record(directory, &record, &mut conflict_log, &ctx) {
                Ok((outcome, house_change)) => {
                    match outcome {
                        RecordOutcome::Created => stats.created += 1,
                        RecordOutcome::Updated => stats.updated += 1,
                        RecordOutcome::Unchanged => stats.unchanged += 1,
                    }

                    if let Some(house_change) = house_change {
                        stats.residents_added += house_change.change.residents_added.len();
                        stats.residents_removed += house_change.change.residents_removed.len();
                        notifier.ownership_changed(&house_change);
                        ownership_changes.push(house_change);
                    }
                }
                Err(e) => {
                    stats.errors += 1;
                    let causes = e.causes();
                    error!(
                        address = %record.address,
                        parcel_id = %record.parcel_id,
                        error = ?e,
                        causes = ?causes,
                        "failed to import parcel: {}",
                        e
                    );
                    failures.push(ImportFailure {
                        parcel_id: record.parcel_id.clone(),
                        address: record.address.clone(),
                        error: e.to_string(),
                        causes,
                    });
                }
            }
        }

        let report = ImportReport {
            started_at,
            finished_at: Utc::now(),
            duration_ms: clock.elapsed().as_millis() as u64,
            stats,
            conflict_summary: conflict_log.summary(),
            conflicts: conflict_log.into_conflicts(),
            ownership_changes,
            failures,
        };

        info!(
            created = report.stats.created,
            updated = report.stats.updated,
            unchanged = report.stats.unchanged,
            skipped = report.stats.skipped,
            errors = report.stats.errors,
            conflicts = report.conflict_summary.total,
            "parcel import complete"
        );

        notifier.import_completed(&report);
        report
    }

    /// One parcel. Any error aborts only this record.
    pub fn import_record<D: Directory + ?Sized>(
        &self,
        directory: &mut D,
        record: &ParcelRecord,
        conflict_log: &mut ConflictLog,
        ctx: &ChangeContext,
    ) -> Result<(RecordOutcome, Option<HouseOwnershipChange>)> {
        let attributes = record.house_attributes(self.config);
        let incoming = record.owners();

        let (house, mut outcome, existed) = match directory.find_house(&record.parcel_id)? {
            None => {
                let house = directory.insert_house(
                    &record.parcel_id,
                    attributes,
                    record.geometry.clone(),
                    ctx,
                )?;
                (house, RecordOutcome::Created, false)
            }
            Some(existing) if existing.is_unchanged_by(&attributes, &record.geometry) => {
                (existing, RecordOutcome::Unchanged, true)
            }
            Some(existing) => {
                // Classify against the stored values, report only once the write landed
                let detected: Vec<Conflict> = conflicts::evaluate_address(
                    &existing.id,
                    &existing.attributes,
                    &attributes,
                )
                .into_iter()
                .chain(conflicts::evaluate_coordinates(
                    &existing.id,
                    &existing.attributes,
                    &attributes,
                    self.config.coordinate_threshold_meters,
                ))
                .collect();

                let house =
                    directory.update_house(&existing, attributes, record.geometry.clone(), ctx)?;
                conflict_log.record_all(detected);
                (house, RecordOutcome::Updated, true)
            }
        };

        let current = directory.current_residents(&house.id)?;

        if existed {
            conflict_log.record_all(conflicts::evaluate_ownership(
                &house.id,
                &OwnershipReconciler::current_owners(&current),
                &incoming,
            ));
        }

        let change = self
            .reconciler
            .reconcile(directory, &house, &current, &incoming, ctx)?;

        if change.is_empty() {
            return Ok((outcome, None));
        }

        if outcome == RecordOutcome::Unchanged {
            outcome = RecordOutcome::Updated;
        }

        Ok((
            outcome,
            Some(HouseOwnershipChange {
                house_id: house.id.clone(),
                parcel_id: house.parcel_id.clone(),
                address: house.address(),
                change,
            }),
        ))
    }
}

/// Convenience wrapper: one run with a fresh importer
pub fn run_import<D, N, I>(
    directory: &mut D,
    records: I,
    config: &ImportConfig,
    notifier: &mut N,
) -> ImportReport
where
    D: Directory + ?Sized,
    N: Notifier + ?Sized,
    I: IntoIterator<Item = ParcelRecord>,
{
    Importer::new(config).run(directory, records, notifier)
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflicts::ConflictType;
    use crate::notify::NullNotifier;
    use crate::store::SqliteDirectory;

    fn record(parcel_id: &str, address: &str, owners: &[&str]) -> ParcelRecord {
        let (number, name) = address.split_once(' ').unwrap();
        ParcelRecord {
            parcel_id: parcel_id.to_string(),
            address: address.to_string(),
            street_number: number.to_string(),
            street_name: name.to_string(),
            city: Some("St. Petersburg".to_string()),
            zip: "33710".to_string(),
            owner1: owners.first().map(|s| s.to_string()),
            owner2: owners.get(1).map(|s| s.to_string()),
            latitude: Some(27.7676),
            longitude: Some(-82.6403),
            geometry: None,
        }
    }

    #[test]
    fn test_first_import_creates_houses_and_owners() {
        let mut dir = SqliteDirectory::open_in_memory().unwrap();
        let config = ImportConfig::default();

        let report = run_import(
            &mut dir,
            vec![
                record("P-1", "100 Elm St", &["SMITH, JOHN", "DOE, JANE"]),
                record("P-2", "102 Elm St", &["ACME HOLDINGS LLC"]),
            ],
            &config,
            &mut NullNotifier,
        );

        assert_eq!(report.stats.created, 2);
        assert_eq!(report.stats.residents_added, 3);
        assert_eq!(report.ownership_changes.len(), 2);
        // New houses are not ownership conflicts
        assert_eq!(report.conflict_summary.total, 0);
    }

    #[test]
    fn test_reimport_is_unchanged() {
        let mut dir = SqliteDirectory::open_in_memory().unwrap();
        let config = ImportConfig::default();
        let feed = vec![record("P-1", "100 Elm St", &["SMITH, JOHN"])];

        run_import(&mut dir, feed.clone(), &config, &mut NullNotifier);
        let report = run_import(&mut dir, feed, &config, &mut NullNotifier);

        assert_eq!(report.stats.unchanged, 1);
        assert_eq!(report.stats.updated, 0);
        assert!(report.ownership_changes.is_empty());
        assert!(report.conflicts.is_empty());
    }

    #[test]
    fn test_reimport_of_precise_geometry_is_unchanged() {
        let mut dir = SqliteDirectory::open_in_memory().unwrap();
        let config = ImportConfig::default();

        let feed: Vec<ParcelRecord> = (0..200)
            .map(|i| {
                let x = -82.64 - i as f64 * 1.234_567_891_234_567e-7;
                let y = 27.76 + i as f64 * 9.876_543_210_987_654e-8;
                let mut r = record(&format!("P-{}", i), &format!("{} Elm St", 100 + i), &[]);
                r.geometry = Some(serde_json::json!({
                    "rings": [[[x, y], [x + 1.1e-5, y], [x + 1.1e-5, y + 1.3e-5], [x, y]]]
                }));
                r
            })
            .collect();

        run_import(&mut dir, feed.clone(), &config, &mut NullNotifier);
        let report = run_import(&mut dir, feed, &config, &mut NullNotifier);

        assert_eq!(report.stats.unchanged, 200);
        assert_eq!(report.stats.updated, 0);
    }

    #[test]
    fn test_denylist_skips_exact_address_only() {
        let mut dir = SqliteDirectory::open_in_memory().unwrap();
        let config = ImportConfig::default();

        let report = run_import(
            &mut dir,
            vec![
                record("P-1", "5900 5th Ave N", &["CONDO ASSN"]),
                record("P-2", "5900 5th Ave N # 2", &["UNIT, OWNER"]),
                record("P-3", "5901 5th Ave N", &["NEXT, DOOR"]),
            ],
            &config,
            &mut NullNotifier,
        );

        assert_eq!(report.stats.skipped, 1);
        assert_eq!(report.stats.created, 2);
        assert!(dir.find_house("P-1").unwrap().is_none());
    }

    #[test]
    fn test_sale_and_move_produce_conflicts() {
        let mut dir = SqliteDirectory::open_in_memory().unwrap();
        let config = ImportConfig::default();

        run_import(
            &mut dir,
            vec![record("P-1", "100 Old St", &["OLD, OWNER"])],
            &config,
            &mut NullNotifier,
        );

        let mut moved = record("P-1", "100 New St", &["NEW, OWNER"]);
        moved.latitude = Some(27.7700);
        let report = run_import(&mut dir, vec![moved], &config, &mut NullNotifier);

        assert_eq!(report.stats.updated, 1);
        assert_eq!(report.stats.residents_added, 1);
        assert_eq!(report.stats.residents_removed, 1);
        assert_eq!(report.conflict_summary.total, 3);
        assert_eq!(report.conflict_summary.count(ConflictType::AddressChange), 1);
        assert_eq!(report.conflict_summary.count(ConflictType::CoordinateChange), 1);
        assert_eq!(report.conflict_summary.count(ConflictType::OwnershipChange), 1);
        assert_eq!(report.conflict_summary.requires_manual_review, 0);

        // Latest value was accepted
        let house = dir.find_house("P-1").unwrap().unwrap();
        assert_eq!(house.attributes.street_name, "New St");
    }

    #[test]
    fn test_owner_change_alone_counts_as_update() {
        let mut dir = SqliteDirectory::open_in_memory().unwrap();
        let config = ImportConfig::default();

        run_import(
            &mut dir,
            vec![record("P-1", "100 Elm St", &["OLD, OWNER"])],
            &config,
            &mut NullNotifier,
        );
        let report = run_import(
            &mut dir,
            vec![record("P-1", "100 Elm St", &["NEW, OWNER"])],
            &config,
            &mut NullNotifier,
        );

        assert_eq!(report.stats.updated, 1);
        assert_eq!(report.stats.unchanged, 0);
        assert_eq!(report.conflict_summary.count(ConflictType::OwnershipChange), 1);
    }

    #[test]
    fn test_missing_parcel_id_is_isolated() {
        let mut dir = SqliteDirectory::open_in_memory().unwrap();
        let config = ImportConfig::default();

        let report = run_import(
            &mut dir,
            vec![
                record("", "100 Elm St", &["SMITH, JOHN"]),
                record("P-2", "102 Elm St", &["DOE, JANE"]),
            ],
            &config,
            &mut NullNotifier,
        );

        assert_eq!(report.stats.errors, 1);
        assert_eq!(report.stats.created, 1);
        assert_eq!(report.failures[0].address, "100 Elm St");
        assert!(report.has_errors());
        assert_eq!(report.stats.processed(), 2);
    }
}
