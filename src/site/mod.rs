//! Site topology: clusters, partitions, schedulers and compiler environments
//!
//! This is pure data loaded once at start-up. Nothing here talks to a real
//! scheduler or module system.

mod catalog;
pub mod environ;
pub mod scheduler;

pub use catalog::*;
pub use environ::{EnvironKind, EnvironmentCatalog, EnvironmentDescriptor, GLOBAL_SCOPE};
pub use scheduler::{Launcher, Scheduler, SchedulerKind};

use serde::{Deserialize, Serialize};

/// Site and environment catalogs as handed to the harness
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SiteConfiguration {
    /// Clusters keyed by name
    pub systems: SiteCatalog,
    /// Environments keyed by scope
    pub environments: EnvironmentCatalog,
}

impl SiteConfiguration {
    /// Resolve an environment for a partition's cluster
    pub fn environ_for(&self, system: &SystemPartition, name: &str) -> Option<&EnvironmentDescriptor> {
        self.environments.lookup(&system.cluster, name)
    }
}
