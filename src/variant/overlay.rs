//! Feature overlays layered on top of the base variant
//!
//! Each overlay contributes build flags, environment modules and a
//! restriction on the systems it can run on. Overlays are merged in
//! declaration order; nothing an overlay adds replaces what came before.

use crate::site::SystemPartition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// CMake flag that turns on MPI support
pub const MPI_FLAG: &str = "-DARB_WITH_MPI=ON";

/// CMake flag that turns on explicit vectorization
pub const VECTORIZE_FLAG: &str = "-DARB_VECTORIZE=ON";

/// NVIDIA GPU generation targeted by a GPU build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GpuModel {
    /// Kepler K20
    K20,
    /// Kepler K80
    K80,
    /// Pascal P100
    P100,
    /// Volta V100
    V100,
}

impl GpuModel {
    /// Value passed to `ARB_GPU_MODEL`
    pub fn name(&self) -> &'static str {
        match self {
            GpuModel::K20 => "K20",
            GpuModel::K80 => "K80",
            GpuModel::P100 => "P100",
            GpuModel::V100 => "V100",
        }
    }

    /// Cray accelerator module for this generation
    pub fn accel_module(&self) -> &'static str {
        match self {
            GpuModel::K20 | GpuModel::K80 => "craype-accel-nvidia35",
            GpuModel::P100 => "craype-accel-nvidia60",
            GpuModel::V100 => "craype-accel-nvidia70",
        }
    }
}

/// Partitions whose nodes carry a given CPU micro-architecture
pub fn simd_systems(arch: &str) -> Vec<SystemPartition> {
    match arch {
        "haswell" => vec![SystemPartition::new("daint", "gpu")],
        "broadwell" => vec![SystemPartition::new("daint", "mc")],
        _ => Vec::new(),
    }
}

/// A named feature merged into the base variant
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "feature", rename_all = "lowercase")]
pub enum FeatureOverlay {
    /// Distributed build with MPI
    Mpi,
    /// CUDA build for one GPU generation, GPU partitions only
    Gpu {
        /// Targeted GPU generation
        model: GpuModel,
    },
    /// Vectorized build for one CPU micro-architecture
    Simd {
        /// Value passed to `ARB_ARCH`
        arch: String,
    },
}

impl FeatureOverlay {
    /// Short label, used to derive variant names
    pub fn label(&self) -> String {
        match self {
            FeatureOverlay::Mpi => "mpi".to_string(),
            FeatureOverlay::Gpu { model } => format!("gpu-{}", model.name()),
            FeatureOverlay::Simd { arch } => format!("simd-{}", arch),
        }
    }

    /// Build flags this overlay appends
    pub fn flags(&self) -> Vec<String> {
        match self {
            FeatureOverlay::Mpi => vec![MPI_FLAG.to_string()],
            FeatureOverlay::Gpu { model } => vec![format!("-DARB_GPU_MODEL={}", model.name())],
            FeatureOverlay::Simd { arch } => {
                vec![VECTORIZE_FLAG.to_string(), format!("-DARB_ARCH={}", arch)]
            }
        }
    }

    /// Modules this overlay appends
    pub fn modules(&self) -> Vec<String> {
        match self {
            FeatureOverlay::Gpu { model } => vec![model.accel_module().to_string()],
            FeatureOverlay::Mpi | FeatureOverlay::Simd { .. } => Vec::new(),
        }
    }

    /// Narrow a system list to the partitions this overlay can run on
    pub fn constrain(&self, systems: Vec<SystemPartition>) -> Vec<SystemPartition> {
        match self {
            FeatureOverlay::Mpi => systems,
            FeatureOverlay::Gpu { .. } => systems
                .into_iter()
                .filter(|sp| sp.partition == "gpu")
                .collect(),
            FeatureOverlay::Simd { arch } => {
                let allowed = simd_systems(arch);
                systems.into_iter().filter(|sp| allowed.contains(sp)).collect()
            }
        }
    }
}

impl fmt::Display for FeatureOverlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_systems() -> Vec<SystemPartition> {
        ["daint:gpu", "daint:mc", "dom:gpu", "dom:mc"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect()
    }

    #[test]
    fn test_gpu_overlay() {
        let overlay = FeatureOverlay::Gpu { model: GpuModel::P100 };
        assert_eq!(overlay.flags(), vec!["-DARB_GPU_MODEL=P100"]);
        assert_eq!(overlay.modules(), vec!["craype-accel-nvidia60"]);

        let systems: Vec<String> = overlay
            .constrain(base_systems())
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(systems, vec!["daint:gpu", "dom:gpu"]);
    }

    #[test]
    fn test_simd_overlay_systems() {
        let haswell = FeatureOverlay::Simd { arch: "haswell".into() };
        assert_eq!(haswell.constrain(base_systems()), vec![SystemPartition::new("daint", "gpu")]);
        assert_eq!(
            haswell.flags(),
            vec!["-DARB_VECTORIZE=ON", "-DARB_ARCH=haswell"]
        );

        let broadwell = FeatureOverlay::Simd { arch: "broadwell".into() };
        assert_eq!(broadwell.constrain(base_systems()), vec![SystemPartition::new("daint", "mc")]);

        let skylake = FeatureOverlay::Simd { arch: "skylake".into() };
        assert!(skylake.constrain(base_systems()).is_empty());
    }

    #[test]
    fn test_mpi_overlay_keeps_systems() {
        assert_eq!(FeatureOverlay::Mpi.constrain(base_systems()), base_systems());
        assert!(FeatureOverlay::Mpi.modules().is_empty());
    }

    #[test]
    fn test_serde_tagging() {
        let overlay: FeatureOverlay =
            serde_json::from_str(r#"{"feature": "gpu", "model": "P100"}"#).unwrap();
        assert_eq!(overlay, FeatureOverlay::Gpu { model: GpuModel::P100 });
        assert_eq!(overlay.label(), "gpu-P100");
    }
}
