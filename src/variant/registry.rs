//! The Arbor variant registry

use super::descriptor::{BaseDescriptor, BuildSystem, VariantDescriptor};
use super::overlay::{FeatureOverlay, GpuModel};
use crate::error::{collect_errors, CiConfigError, Result};
use crate::sanity::SuccessPredicate;
use crate::site::SystemPartition;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

/// CPU micro-architectures the vectorized variant is built for
pub const SIMD_ARCHES: [&str; 2] = ["haswell", "broadwell"];

/// Base descriptor every Arbor variant starts from
pub fn arbor_base() -> BaseDescriptor {
    let valid_systems = [("daint", "gpu"), ("daint", "mc"), ("dom", "gpu"), ("dom", "mc")]
        .into_iter()
        .map(|(cluster, partition)| SystemPartition::new(cluster, partition))
        .collect();

    BaseDescriptor {
        valid_systems,
        valid_prog_environs: vec!["PrgEnv-gnu".to_string()],
        sourcesdir: PathBuf::from(".."),
        sourcepath: None,
        executable: "./build/bin/unit".to_string(),
        variables: BTreeMap::from([("CRAYPE_LINK_TYPE".to_string(), "dynamic".to_string())]),
        sanity_patterns: SuccessPredicate::passed(),
        build_system: BuildSystem::default(),
        modules: vec!["CMake".to_string(), "gcc/7.1.0".to_string()],
        cmake_options: vec!["-DARB_WITH_ASSERTIONS=ON".to_string()],
        tags: BTreeSet::from(["sanity".to_string()]),
    }
}

/// Registered variants, in registration order
#[derive(Debug, Clone, Default)]
pub struct VariantRegistry {
    variants: Vec<VariantDescriptor>,
}

impl VariantRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The Arbor CI variants: base, MPI, GPU and one SIMD build per arch
    pub fn arbor() -> Result<Self> {
        let base = arbor_base();

        let mut entries = vec![
            ("ArborBaseTest".to_string(), Vec::new()),
            ("ArborMPITest".to_string(), vec![FeatureOverlay::Mpi]),
            (
                "ArborGpuTest".to_string(),
                vec![FeatureOverlay::Gpu { model: GpuModel::P100 }],
            ),
        ];
        entries.extend(SIMD_ARCHES.iter().map(|arch| {
            (
                format!("ArborSIMDTest_{}", arch),
                vec![FeatureOverlay::Simd { arch: arch.to_string() }],
            )
        }));

        let variants = collect_errors(
            entries
                .into_iter()
                .map(|(name, overlays)| VariantDescriptor::compose(name, &base, overlays))
                .collect(),
        )?;

        let mut registry = Self::new();
        for variant in variants {
            registry.register(variant)?;
        }
        Ok(registry)
    }

    /// Add a variant; names must be unique
    pub fn register(&mut self, variant: VariantDescriptor) -> Result<()> {
        if self.get(variant.name()).is_some() {
            return Err(CiConfigError::config(format!(
                "variant '{}' registered twice",
                variant.name()
            )));
        }
        self.variants.push(variant);
        Ok(())
    }

    /// Look up a variant by name
    pub fn get(&self, name: &str) -> Option<&VariantDescriptor> {
        self.variants.iter().find(|v| v.name() == name)
    }

    /// Look up a variant by name, failing if missing
    pub fn require(&self, name: &str) -> Result<&VariantDescriptor> {
        self.get(name)
            .ok_or_else(|| CiConfigError::UnknownVariant(name.to_string()))
    }

    /// Iterate in registration order
    pub fn iter(&self) -> impl Iterator<Item = &VariantDescriptor> {
        self.variants.iter()
    }

    /// Number of variants
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Whether no variant is registered
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arbor_registry_names() {
        let registry = VariantRegistry::arbor().unwrap();
        let names: Vec<&str> = registry.iter().map(|v| v.name()).collect();
        assert_eq!(
            names,
            vec![
                "ArborBaseTest",
                "ArborMPITest",
                "ArborGpuTest",
                "ArborSIMDTest_haswell",
                "ArborSIMDTest_broadwell",
            ]
        );
    }

    #[test]
    fn test_register_rejects_duplicates() {
        let mut registry = VariantRegistry::arbor().unwrap();
        let again = VariantDescriptor::compose("ArborMPITest", &arbor_base(), Vec::new()).unwrap();
        assert!(registry.register(again).is_err());
        assert_eq!(registry.len(), 5);
    }

    #[test]
    fn test_require_unknown() {
        let registry = VariantRegistry::arbor().unwrap();
        assert!(matches!(
            registry.require("ArborTBBTest"),
            Err(CiConfigError::UnknownVariant(_))
        ));
    }

    #[test]
    fn test_shared_base_fields() {
        let registry = VariantRegistry::arbor().unwrap();
        for variant in registry.iter() {
            assert_eq!(variant.executable(), "./build/bin/unit");
            assert_eq!(variant.variables()["CRAYPE_LINK_TYPE"], "dynamic");
            assert_eq!(variant.sanity_patterns().literal(), "PASSED");
            assert!(variant.tags().contains("sanity"));
            assert!(!variant.build_system().flags_from_environ);
        }
    }
}
