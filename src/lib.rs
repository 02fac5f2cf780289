//! # arbor-ci - Typed configuration for the Arbor regression-test CI
//!
//! arbor-ci describes where and how the Arbor unit tests run under a
//! ReFrame-style regression harness: the clusters and partitions of a site,
//! the compiler environments available on them, the build variants of the
//! test (base, MPI, GPU and SIMD), the success check applied to the test
//! output, and the log sinks the harness writes to.
//!
//! Everything is pure data, evaluated once at start-up.
//!
//! ## Quick Start
//!
//! ```no_run
//! use arbor_ci::prelude::*;
//!
//! let settings = HarnessSettings::default();
//! let registry = VariantRegistry::arbor().unwrap();
//!
//! let target = ResolveTarget::new("daint:gpu".parse().unwrap(), "PrgEnv-gnu");
//! for variant in resolve(&registry, &target) {
//!     println!("{}: {}", variant.name, variant.build_flags.join(" "));
//! }
//!
//! let report = validate(&settings, &registry);
//! assert!(report.passed);
//! ```
//!
//! ## Build Plans
//!
//! ```no_run
//! use arbor_ci::prelude::*;
//!
//! let settings = HarnessSettings::default();
//! let registry = VariantRegistry::arbor().unwrap();
//! let target = ResolveTarget::new("daint:gpu".parse().unwrap(), "PrgEnv-gnu");
//!
//! let gpu = resolve_named(&registry, "ArborGpuTest", &target).unwrap();
//! let plan = BuildPlan::new(&settings.site_configuration, &gpu).unwrap();
//! print!("{}", plan.render_script());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod error;
pub mod logging;
pub mod plan;
pub mod sanity;
pub mod site;
pub mod validate;
pub mod variant;

// Re-export commonly used types
pub use config::HarnessSettings;
pub use error::{CiConfigError, Result};
pub use sanity::{SuccessPredicate, PASSED};
pub use variant::{resolve, VariantRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use arbor_ci::prelude::*;
    //! ```

    pub use crate::config::HarnessSettings;
    pub use crate::error::{CiConfigError, Result};
    pub use crate::logging::{LogLevel, LoggingConfig, LoggingSink, SinkKind};
    pub use crate::plan::BuildPlan;
    pub use crate::sanity::{OutputStream, SanityOutcome, SuccessPredicate, PASSED};
    pub use crate::site::{
        EnvironmentCatalog, EnvironmentDescriptor, PartitionDescriptor, SchedulerKind, SiteCatalog,
        SiteDescriptor, SystemPartition,
    };
    pub use crate::validate::{validate, ValidationReport};
    pub use crate::variant::{
        resolve, resolve_named, FeatureOverlay, GpuModel, ResolveTarget, ResolvedVariant,
        VariantDescriptor, VariantRegistry,
    };
}
