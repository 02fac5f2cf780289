//! Variant descriptors: a base plus a list of feature overlays

use super::overlay::FeatureOverlay;
use crate::error::{CiConfigError, Result};
use crate::sanity::SuccessPredicate;
use crate::site::SystemPartition;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::{Path, PathBuf};

/// Build driver the harness runs after the prebuild commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BuildSystemKind {
    /// `make` in the source path
    #[default]
    Make,
}

/// Build driver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildSystem {
    /// Driver kind
    pub kind: BuildSystemKind,
    /// Whether compiler flags are taken from the environment
    pub flags_from_environ: bool,
    /// Parallel build jobs (`None` = unlimited `-j`)
    pub max_jobs: Option<u32>,
}

impl Default for BuildSystem {
    fn default() -> Self {
        Self {
            kind: BuildSystemKind::Make,
            flags_from_environ: false,
            max_jobs: None,
        }
    }
}

impl BuildSystem {
    /// Compile command line
    pub fn command(&self) -> String {
        match (self.kind, self.max_jobs) {
            (BuildSystemKind::Make, Some(n)) => format!("make -j {}", n),
            (BuildSystemKind::Make, None) => "make -j".to_string(),
        }
    }
}

/// Settings shared by every variant before overlays are applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseDescriptor {
    /// Partitions the base build runs on
    pub valid_systems: Vec<SystemPartition>,
    /// Environments the base build runs with
    pub valid_prog_environs: Vec<String>,
    /// Source directory relative to the check prefix
    pub sourcesdir: PathBuf,
    /// Path inside the sources that holds the build
    pub sourcepath: Option<PathBuf>,
    /// Executable run after the build, relative to the stage directory
    pub executable: String,
    /// Environment variables set for build and run
    pub variables: BTreeMap<String, String>,
    /// Success predicate over captured output
    pub sanity_patterns: SuccessPredicate,
    /// Build driver
    pub build_system: BuildSystem,
    /// Modules loaded before the build
    pub modules: Vec<String>,
    /// CMake options every variant starts from
    pub cmake_options: Vec<String>,
    /// Selection labels
    pub tags: BTreeSet<String>,
}

/// Key of a `-DNAME=VALUE` style flag
pub fn flag_key(flag: &str) -> &str {
    flag.split_once('=').map_or(flag, |(key, _)| key)
}

/// Compose build flags: base first, then every overlay in order
///
/// This is plain concatenation. A later flag never overrides an earlier one,
/// so composing the same key twice is the caller's bug and is reported here.
pub fn flags_for(name: &str, base: &BaseDescriptor, overlays: &[FeatureOverlay]) -> Result<Vec<String>> {
    let flags: Vec<String> = base
        .cmake_options
        .iter()
        .cloned()
        .chain(overlays.iter().flat_map(FeatureOverlay::flags))
        .collect();

    check_flag_keys(name, &flags)?;
    Ok(flags)
}

/// Reject a flag list that sets the same key twice
pub fn check_flag_keys(name: &str, flags: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for flag in flags {
        let key = flag_key(flag);
        if !seen.insert(key) {
            return Err(CiConfigError::DuplicateFlag {
                variant: name.to_string(),
                key: key.to_string(),
            });
        }
    }
    Ok(())
}

/// A named build/test variant with its overlays already merged
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "VariantRepr")]
pub struct VariantDescriptor {
    name: String,
    overlays: Vec<FeatureOverlay>,
    valid_systems: Vec<SystemPartition>,
    valid_prog_environs: Vec<String>,
    sourcesdir: PathBuf,
    sourcepath: Option<PathBuf>,
    executable: String,
    variables: BTreeMap<String, String>,
    sanity_patterns: SuccessPredicate,
    build_system: BuildSystem,
    modules: Vec<String>,
    cmake_options: Vec<String>,
    tags: BTreeSet<String>,
}

#[derive(Deserialize)]
struct VariantRepr {
    name: String,
    overlays: Vec<FeatureOverlay>,
    valid_systems: Vec<SystemPartition>,
    valid_prog_environs: Vec<String>,
    sourcesdir: PathBuf,
    sourcepath: Option<PathBuf>,
    executable: String,
    variables: BTreeMap<String, String>,
    sanity_patterns: SuccessPredicate,
    build_system: BuildSystem,
    modules: Vec<String>,
    cmake_options: Vec<String>,
    tags: BTreeSet<String>,
}

impl TryFrom<VariantRepr> for VariantDescriptor {
    type Error = CiConfigError;

    fn try_from(repr: VariantRepr) -> Result<Self> {
        check_flag_keys(&repr.name, &repr.cmake_options)?;
        Ok(Self {
            name: repr.name,
            overlays: repr.overlays,
            valid_systems: repr.valid_systems,
            valid_prog_environs: repr.valid_prog_environs,
            sourcesdir: repr.sourcesdir,
            sourcepath: repr.sourcepath,
            executable: repr.executable,
            variables: repr.variables,
            sanity_patterns: repr.sanity_patterns,
            build_system: repr.build_system,
            modules: repr.modules,
            cmake_options: repr.cmake_options,
            tags: repr.tags,
        })
    }
}

impl VariantDescriptor {
    /// Merge overlays into a base descriptor
    pub fn compose(
        name: impl Into<String>,
        base: &BaseDescriptor,
        overlays: Vec<FeatureOverlay>,
    ) -> Result<Self> {
        let name = name.into();
        let cmake_options = flags_for(&name, base, &overlays)?;

        let valid_systems = overlays
            .iter()
            .fold(base.valid_systems.clone(), |systems, overlay| overlay.constrain(systems));

        let mut modules = base.modules.clone();
        for module in overlays.iter().flat_map(FeatureOverlay::modules) {
            if !modules.contains(&module) {
                modules.push(module);
            }
        }

        Ok(Self {
            name,
            overlays,
            valid_systems,
            valid_prog_environs: base.valid_prog_environs.clone(),
            sourcesdir: base.sourcesdir.clone(),
            sourcepath: base.sourcepath.clone(),
            executable: base.executable.clone(),
            variables: base.variables.clone(),
            sanity_patterns: base.sanity_patterns.clone(),
            build_system: base.build_system.clone(),
            modules,
            cmake_options,
            tags: base.tags.clone(),
        })
    }

    /// Variant name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Overlays merged into this variant
    pub fn overlays(&self) -> &[FeatureOverlay] {
        &self.overlays
    }

    /// Partitions this variant runs on
    pub fn valid_systems(&self) -> &[SystemPartition] {
        &self.valid_systems
    }

    /// Environments this variant runs with
    pub fn valid_prog_environs(&self) -> &[String] {
        &self.valid_prog_environs
    }

    /// Source directory relative to the check prefix
    pub fn sourcesdir(&self) -> &Path {
        &self.sourcesdir
    }

    /// Source directory anchored at a check prefix
    pub fn sourcesdir_under(&self, prefix: &Path) -> PathBuf {
        prefix.join(&self.sourcesdir)
    }

    /// Build path inside the sources
    pub fn sourcepath(&self) -> Option<&Path> {
        self.sourcepath.as_deref()
    }

    /// Executable run after the build
    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Environment variables
    pub fn variables(&self) -> &BTreeMap<String, String> {
        &self.variables
    }

    /// Success predicate
    pub fn sanity_patterns(&self) -> &SuccessPredicate {
        &self.sanity_patterns
    }

    /// Build driver
    pub fn build_system(&self) -> &BuildSystem {
        &self.build_system
    }

    /// Modules, base modules first
    pub fn modules(&self) -> &[String] {
        &self.modules
    }

    /// Composed CMake flags
    pub fn cmake_options(&self) -> &[String] {
        &self.cmake_options
    }

    /// Selection labels
    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    /// Configure steps run before the build driver
    pub fn prebuild_cmd(&self) -> Vec<String> {
        let mut configure = String::from("cmake ..");
        for flag in &self.cmake_options {
            configure.push(' ');
            configure.push_str(flag);
        }
        vec!["mkdir build".to_string(), "cd build".to_string(), configure]
    }

    /// Whether the variant runs on a partition
    pub fn runs_on(&self, system: &SystemPartition) -> bool {
        self.valid_systems.contains(system)
    }

    /// Whether the variant runs with an environment
    pub fn runs_with(&self, environ: &str) -> bool {
        self.valid_prog_environs.iter().any(|e| e == environ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variant::overlay::GpuModel;

    fn base() -> BaseDescriptor {
        BaseDescriptor {
            valid_systems: vec!["daint:gpu".parse().unwrap(), "daint:mc".parse().unwrap()],
            valid_prog_environs: vec!["PrgEnv-gnu".to_string()],
            sourcesdir: PathBuf::from(".."),
            sourcepath: None,
            executable: "./build/bin/unit".to_string(),
            variables: BTreeMap::new(),
            sanity_patterns: SuccessPredicate::passed(),
            build_system: BuildSystem::default(),
            modules: vec!["CMake".to_string()],
            cmake_options: vec!["-DARB_WITH_ASSERTIONS=ON".to_string()],
            tags: BTreeSet::new(),
        }
    }

    #[test]
    fn test_flag_key() {
        assert_eq!(flag_key("-DARB_ARCH=haswell"), "-DARB_ARCH");
        assert_eq!(flag_key("-Wall"), "-Wall");
    }

    #[test]
    fn test_compose_appends_in_order() {
        let variant = VariantDescriptor::compose(
            "mixed",
            &base(),
            vec![FeatureOverlay::Mpi, FeatureOverlay::Gpu { model: GpuModel::P100 }],
        )
        .unwrap();

        assert_eq!(
            variant.cmake_options(),
            &["-DARB_WITH_ASSERTIONS=ON", "-DARB_WITH_MPI=ON", "-DARB_GPU_MODEL=P100"]
        );
        assert_eq!(variant.modules(), &["CMake", "craype-accel-nvidia60"]);
        assert_eq!(variant.valid_systems(), &["daint:gpu".parse::<SystemPartition>().unwrap()]);
    }

    #[test]
    fn test_duplicate_flag_key_rejected() {
        let err = VariantDescriptor::compose(
            "twice",
            &base(),
            vec![
                FeatureOverlay::Simd { arch: "haswell".into() },
                FeatureOverlay::Simd { arch: "broadwell".into() },
            ],
        )
        .unwrap_err();

        match err {
            CiConfigError::DuplicateFlag { variant, key } => {
                assert_eq!(variant, "twice");
                assert_eq!(key, "-DARB_VECTORIZE");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_deserialize_checks_flag_keys() {
        let variant = VariantDescriptor::compose("mpi", &base(), vec![FeatureOverlay::Mpi]).unwrap();
        let mut value = serde_json::to_value(&variant).unwrap();

        let back: VariantDescriptor = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(back, variant);

        value["cmake_options"] = serde_json::json!(["-DARB_WITH_MPI=ON", "-DARB_WITH_MPI=OFF"]);
        let err = serde_json::from_value::<VariantDescriptor>(value).unwrap_err();
        assert!(err.to_string().contains("-DARB_WITH_MPI"), "{}", err);
    }

    #[test]
    fn test_prebuild_cmd() {
        let variant = VariantDescriptor::compose("base", &base(), Vec::new()).unwrap();
        assert_eq!(
            variant.prebuild_cmd(),
            vec!["mkdir build", "cd build", "cmake .. -DARB_WITH_ASSERTIONS=ON"]
        );
        assert_eq!(
            variant.sourcesdir_under(Path::new("/scratch/ci")),
            PathBuf::from("/scratch/ci/..")
        );
    }

    #[test]
    fn test_build_system_command() {
        assert_eq!(BuildSystem::default().command(), "make -j");
        let limited = BuildSystem {
            max_jobs: Some(8),
            ..Default::default()
        };
        assert_eq!(limited.command(), "make -j 8");
    }
}
