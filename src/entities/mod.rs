// Entity Models
// Each entity has a stable UUID identity; values change around it.
// Residents are never deleted, only moved out.

pub mod house;
pub mod resident;

pub use house::{House, HouseAttributes};
pub use resident::Resident;
