// Neighborhood Directory - Core Library
// Houses and residents kept in step with the county parcel feed.
// Exposes all modules for use in the CLI, the API server, and tests.

pub mod config;
pub mod conflicts;
pub mod db;
pub mod entities;
pub mod error;
pub mod feed;
pub mod import;
pub mod names;
pub mod notify;
pub mod reconciliation;
pub mod store;

// Re-export commonly used types
pub use config::{Denylist, HousematePolicy, ImportConfig};
pub use conflicts::{
    evaluate_address, evaluate_coordinates, evaluate_ownership, haversine_distance_meters,
    Conflict, ConflictDetails, ConflictLog, ConflictSummary, ConflictType, Resolution,
};
pub use db::{ChangeContext, Event};
pub use entities::{House, HouseAttributes, Resident};
pub use error::{Error, Result};
pub use feed::{load_feed, parse_feed, ParcelRecord};
pub use import::{run_import, HouseOwnershipChange, ImportReport, ImportStats, Importer};
pub use names::{normalize_name, OwnerSet};
pub use notify::{LogNotifier, Notifier, NullNotifier};
pub use reconciliation::{OwnershipChangeRecord, OwnershipPlan, OwnershipReconciler, TurnoverKind};
pub use store::{Directory, SqliteDirectory};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
