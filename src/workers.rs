pub mod distribution_coordinator;

pub use distribution_coordinator::{DistributionCoordinator, DistributionError, RunOutcome};
