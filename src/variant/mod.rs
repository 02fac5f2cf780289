//! Build/test variants and their resolution against a target partition
//!
//! A variant is a base descriptor plus a list of feature overlays (MPI, GPU,
//! SIMD). Overlays are merged once, when the registry is built; resolution
//! then only filters and copies.

mod descriptor;
pub mod overlay;
mod registry;
mod resolve;

pub use descriptor::*;
pub use overlay::{FeatureOverlay, GpuModel};
pub use registry::{arbor_base, VariantRegistry, SIMD_ARCHES};
pub use resolve::{applies, resolve, resolve_named, ResolveTarget, ResolvedVariant};
