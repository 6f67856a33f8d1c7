pub mod distribution_lock_repository;
pub mod error;
pub mod memory;
pub mod models;
pub mod surfer_repository;

pub use distribution_lock_repository::{DistributionLockRepository, DistributionLockStore};
pub use error::DbError;
pub use memory::{InMemoryLockStore, InMemorySurferDirectory};
pub use models::*;
pub use surfer_repository::{SurferDirectory, SurferRepository};
