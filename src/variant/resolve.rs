//! Variant resolution
//!
//! Given a `(cluster:partition, environment)` target, pick the registered
//! variants that apply and materialise the settings the harness consumes.
//! Resolution is a pure filter; an empty result is a normal outcome.

use super::descriptor::VariantDescriptor;
use super::registry::VariantRegistry;
use crate::error::{CiConfigError, Result};
use crate::sanity::SuccessPredicate;
use crate::site::SystemPartition;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// Where the harness wants to run
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolveTarget {
    /// Partition
    pub system: SystemPartition,
    /// Programming environment
    pub environ: String,
}

impl ResolveTarget {
    /// Create a target
    pub fn new(system: SystemPartition, environ: impl Into<String>) -> Self {
        Self {
            system,
            environ: environ.into(),
        }
    }
}

impl fmt::Display for ResolveTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} with {}", self.system, self.environ)
    }
}

/// A variant materialised for one target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedVariant {
    /// Variant name
    pub name: String,
    /// Target partition
    pub system: SystemPartition,
    /// Target environment
    pub environ: String,
    /// Every partition the variant is valid on, as `cluster:partition`
    pub valid_systems: Vec<String>,
    /// Every environment the variant is valid with
    pub valid_prog_environs: Vec<String>,
    /// Source directory relative to the check prefix
    pub sourcesdir: PathBuf,
    /// Build path inside the sources
    pub sourcepath: Option<PathBuf>,
    /// Composed build flags
    pub build_flags: Vec<String>,
    /// Configure steps
    pub prebuild_cmd: Vec<String>,
    /// Build driver command
    pub build_cmd: String,
    /// Modules loaded before the build
    pub modules: Vec<String>,
    /// Executable run after the build
    pub executable: String,
    /// Environment variables
    pub variables: BTreeMap<String, String>,
    /// Success predicate
    pub sanity_patterns: SuccessPredicate,
    /// Selection labels
    pub tags: BTreeSet<String>,
}

/// Whether a variant can run on a target
pub fn applies(variant: &VariantDescriptor, target: &ResolveTarget) -> bool {
    variant.runs_on(&target.system) && variant.runs_with(&target.environ)
}

fn materialise(variant: &VariantDescriptor, target: &ResolveTarget) -> ResolvedVariant {
    ResolvedVariant {
        name: variant.name().to_string(),
        system: target.system.clone(),
        environ: target.environ.clone(),
        valid_systems: variant.valid_systems().iter().map(ToString::to_string).collect(),
        valid_prog_environs: variant.valid_prog_environs().to_vec(),
        sourcesdir: variant.sourcesdir().to_path_buf(),
        sourcepath: variant.sourcepath().map(|p| p.to_path_buf()),
        build_flags: variant.cmake_options().to_vec(),
        prebuild_cmd: variant.prebuild_cmd(),
        build_cmd: variant.build_system().command(),
        modules: variant.modules().to_vec(),
        executable: variant.executable().to_string(),
        variables: variant.variables().clone(),
        sanity_patterns: variant.sanity_patterns().clone(),
        tags: variant.tags().clone(),
    }
}

/// Every variant that applies to the target, in registration order
pub fn resolve(registry: &VariantRegistry, target: &ResolveTarget) -> Vec<ResolvedVariant> {
    registry
        .iter()
        .filter(|variant| {
            let ok = applies(variant, target);
            debug!(variant = variant.name(), target = %target, applies = ok, "variant filter");
            ok
        })
        .map(|variant| materialise(variant, target))
        .collect()
}

/// Resolve one named variant, failing if it does not apply
pub fn resolve_named(
    registry: &VariantRegistry,
    name: &str,
    target: &ResolveTarget,
) -> Result<ResolvedVariant> {
    let variant = registry.require(name)?;
    if !applies(variant, target) {
        return Err(CiConfigError::NotApplicable {
            variant: name.to_string(),
            system: target.system.to_string(),
            environ: target.environ.clone(),
        });
    }
    Ok(materialise(variant, target))
}
