// 📣 Notification collaborators
//
// Mail delivery is somebody else's job. The import hands over a change
// record per house that actually changed, and one report at the end.

use crate::import::{HouseOwnershipChange, ImportReport};
use tracing::info;

pub trait Notifier {
    /// Called only for houses whose residents changed
    fn ownership_changed(&mut self, change: &HouseOwnershipChange);

    /// Called once, after the last record
    fn import_completed(&mut self, report: &ImportReport);
}

/// Writes notifications to the operational log
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn ownership_changed(&mut self, change: &HouseOwnershipChange) {
        info!(
            house_id = %change.house_id,
            address = %change.address,
            "ownership change: {}",
            change.change.summary()
        );
    }

    fn import_completed(&mut self, report: &ImportReport) {
        info!("{}", report.summary());
    }
}

/// Drops everything
#[derive(Debug, Default)]
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn ownership_changed(&mut self, _change: &HouseOwnershipChange) {}

    fn import_completed(&mut self, _report: &ImportReport) {}
}
