//! Site catalog: clusters, their partitions and host detection

use super::scheduler::SchedulerKind;
use crate::error::{CiConfigError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A `cluster:partition` pair, as used in `valid_systems`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SystemPartition {
    /// Cluster name
    pub cluster: String,
    /// Partition name within the cluster
    pub partition: String,
}

impl SystemPartition {
    /// Create from its two halves
    pub fn new(cluster: impl Into<String>, partition: impl Into<String>) -> Self {
        Self {
            cluster: cluster.into(),
            partition: partition.into(),
        }
    }
}

impl FromStr for SystemPartition {
    type Err = CiConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CiConfigError::InvalidSystemName(s.to_string());
        let (cluster, partition) = s.split_once(':').ok_or_else(invalid)?;
        if cluster.is_empty() || partition.is_empty() || partition.contains(':') {
            return Err(invalid());
        }
        Ok(Self::new(cluster, partition))
    }
}

impl fmt::Display for SystemPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.cluster, self.partition)
    }
}

impl TryFrom<String> for SystemPartition {
    type Error = CiConfigError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SystemPartition> for String {
    fn from(sp: SystemPartition) -> Self {
        sp.to_string()
    }
}

/// Environment modules implementation available on a site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModulesSystem {
    /// Classic Tcl environment modules
    Tmod,
    /// Lua-based Lmod
    Lmod,
    /// No module system; module lists are ignored
    #[default]
    Nomod,
}

impl ModulesSystem {
    /// Shell command that loads one module, if modules are supported
    pub fn load_command(&self, module: &str) -> Option<String> {
        match self {
            ModulesSystem::Tmod | ModulesSystem::Lmod => Some(format!("module load {}", module)),
            ModulesSystem::Nomod => None,
        }
    }
}

/// One partition of a cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartitionDescriptor {
    /// Human-readable description
    #[serde(default)]
    pub descr: String,
    /// Scheduler and launcher
    pub scheduler: SchedulerKind,
    /// Modules loaded for every job on this partition
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<String>,
    /// Programming environments allowed on this partition
    #[serde(default)]
    pub environs: Vec<String>,
    /// Ceiling on concurrently submitted jobs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_jobs: Option<u32>,
}

impl PartitionDescriptor {
    /// Create a partition with no modules and no environments
    pub fn new(descr: impl Into<String>, scheduler: SchedulerKind) -> Self {
        Self {
            descr: descr.into(),
            scheduler,
            modules: Vec::new(),
            environs: Vec::new(),
            max_jobs: None,
        }
    }

    /// Set the partition modules
    pub fn with_modules<I, S>(mut self, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.modules = modules.into_iter().map(Into::into).collect();
        self
    }

    /// Set the allowed environments
    pub fn with_environs<I, S>(mut self, environs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.environs = environs.into_iter().map(Into::into).collect();
        self
    }

    /// Set the job ceiling
    pub fn with_max_jobs(mut self, max_jobs: u32) -> Self {
        self.max_jobs = Some(max_jobs);
        self
    }

    /// Whether the partition allows the given environment
    pub fn allows_environ(&self, environ: &str) -> bool {
        self.environs.iter().any(|e| e == environ)
    }
}

/// One cluster and its partitions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteDescriptor {
    /// Human-readable description
    #[serde(default)]
    pub descr: String,
    /// Host-name prefixes identifying this cluster
    #[serde(default)]
    pub hostnames: Vec<String>,
    /// Environment modules implementation
    #[serde(default)]
    pub modules_system: ModulesSystem,
    /// Partitions keyed by name
    pub partitions: BTreeMap<String, PartitionDescriptor>,
}

impl SiteDescriptor {
    /// Create a site with no partitions
    pub fn new(descr: impl Into<String>, modules_system: ModulesSystem) -> Self {
        Self {
            descr: descr.into(),
            hostnames: Vec::new(),
            modules_system,
            partitions: BTreeMap::new(),
        }
    }

    /// Add a host-name pattern
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostnames.push(hostname.into());
        self
    }

    /// Add or replace a partition
    pub fn with_partition(mut self, name: impl Into<String>, partition: PartitionDescriptor) -> Self {
        self.partitions.insert(name.into(), partition);
        self
    }

    /// Whether this site claims the given host
    pub fn matches_host(&self, hostname: &str) -> bool {
        self.hostnames.iter().any(|p| hostname.starts_with(p.as_str()))
    }
}

/// All known clusters keyed by name
///
/// Keys are unique by construction, and iteration order is stable so
/// listings and serialised settings do not shuffle between runs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteCatalog {
    sites: BTreeMap<String, SiteDescriptor>,
}

impl SiteCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a site
    pub fn with_site(mut self, name: impl Into<String>, site: SiteDescriptor) -> Self {
        self.sites.insert(name.into(), site);
        self
    }

    /// Look up a site by name
    pub fn site(&self, name: &str) -> Option<&SiteDescriptor> {
        self.sites.get(name)
    }

    /// Iterate over `(name, site)` pairs
    pub fn sites(&self) -> impl Iterator<Item = (&str, &SiteDescriptor)> {
        self.sites.iter().map(|(name, site)| (name.as_str(), site))
    }

    /// Look up a partition
    pub fn partition(&self, system: &SystemPartition) -> Option<&PartitionDescriptor> {
        self.sites
            .get(&system.cluster)
            .and_then(|site| site.partitions.get(&system.partition))
    }

    /// Whether the catalog defines the given partition
    pub fn contains(&self, system: &SystemPartition) -> bool {
        self.partition(system).is_some()
    }

    /// Every partition in the catalog
    pub fn system_partitions(&self) -> Vec<SystemPartition> {
        self.sites
            .iter()
            .flat_map(|(cluster, site)| {
                site.partitions
                    .keys()
                    .map(move |partition| SystemPartition::new(cluster.as_str(), partition.as_str()))
            })
            .collect()
    }

    /// Find the site a host belongs to
    pub fn detect(&self, hostname: &str) -> Option<(&str, &SiteDescriptor)> {
        self.sites().find(|(_, site)| site.matches_host(hostname))
    }

    /// Number of sites
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
