//! Cross-module consistency of the built-in settings and variants

use arbor_ci::logging::{LogLevel, LoggingSink, SinkKind, StreamName};
use arbor_ci::prelude::*;
use arbor_ci::variant::arbor_base;
use std::collections::BTreeSet;

fn registry() -> VariantRegistry {
    VariantRegistry::arbor().expect("built-in variants compose")
}

#[test]
fn every_variant_system_is_in_the_catalog() {
    let settings = HarnessSettings::default();
    let catalog = &settings.site_configuration.systems;

    for variant in registry().iter() {
        assert!(!variant.valid_systems().is_empty(), "{} runs nowhere", variant.name());
        for system in variant.valid_systems() {
            assert!(catalog.contains(system), "{}: {} missing", variant.name(), system);
        }
    }
}

#[test]
fn every_variant_environ_is_defined() {
    let settings = HarnessSettings::default();
    let environments = &settings.site_configuration.environments;

    for variant in registry().iter() {
        for system in variant.valid_systems() {
            for environ in variant.valid_prog_environs() {
                assert!(
                    environments.is_defined(&system.cluster, environ),
                    "{}: {} not defined on {}",
                    variant.name(),
                    environ,
                    system.cluster
                );
            }
        }
    }
}

#[test]
fn derived_flags_extend_the_base() {
    let base: BTreeSet<String> = arbor_base().cmake_options.into_iter().collect();

    for variant in registry().iter() {
        let flags: BTreeSet<String> = variant.cmake_options().iter().cloned().collect();
        let added: BTreeSet<String> = variant
            .overlays()
            .iter()
            .flat_map(FeatureOverlay::flags)
            .collect();

        assert!(base.is_subset(&flags), "{} dropped a base flag", variant.name());
        let expected: BTreeSet<String> = base.union(&added).cloned().collect();
        assert_eq!(flags, expected, "{}", variant.name());
    }

    let mpi = registry();
    let mpi = mpi.get("ArborMPITest").unwrap();
    let extra: Vec<&String> = mpi.cmake_options().iter().filter(|f| !base.contains(*f)).collect();
    assert_eq!(extra, vec!["-DARB_WITH_MPI=ON"]);
}

#[test]
fn simd_variants_pin_their_partition() {
    let registry = registry();
    let haswell = registry.get("ArborSIMDTest_haswell").unwrap();
    assert_eq!(haswell.valid_systems(), &[SystemPartition::new("daint", "gpu")]);
    assert!(haswell.cmake_options().contains(&"-DARB_ARCH=haswell".to_string()));

    let broadwell = registry.get("ArborSIMDTest_broadwell").unwrap();
    assert_eq!(broadwell.valid_systems(), &[SystemPartition::new("daint", "mc")]);
}

#[test]
fn passed_predicate() {
    let predicate = SuccessPredicate::passed();
    assert!(!predicate.literal().is_empty());
    assert_eq!(predicate.literal(), PASSED);

    assert!(predicate.evaluate("[==========] 212 tests ran.\n[  PASSED  ] 212 tests.\n").passed);
    assert!(!predicate.evaluate("[  FAILED  ] 3 tests\n").passed);
    assert!(!predicate.evaluate("passed").passed);

    for variant in registry().iter() {
        assert_eq!(variant.sanity_patterns(), &predicate);
    }
}

#[test]
fn sink_levels_filter_records() {
    let debug = LoggingSink::file("reframe.log", LogLevel::Debug, "%(message)s", false);
    let info = LoggingSink::stream(StreamName::Stdout, LogLevel::Info, "%(message)s");

    assert!(debug.accepts(LogLevel::Info));
    assert!(debug.accepts(LogLevel::Debug));
    assert!(info.accepts(LogLevel::Info));
    assert!(!info.accepts(LogLevel::Debug));
}

#[test]
fn default_sinks_match_the_harness_layout() {
    let settings = HarnessSettings::default();

    let debug_sinks: Vec<String> = settings
        .logging_config
        .sinks_for(LogLevel::Debug)
        .map(LoggingSink::describe)
        .collect();
    assert_eq!(debug_sinks.len(), 1);

    assert_eq!(settings.logging_config.sinks_for(LogLevel::Info).count(), 3);

    let perf = &settings.perf_logging_config.handlers[0];
    assert!(matches!(perf.kind, SinkKind::Filelog { append: true, .. }));
}

#[test]
fn gpu_variant_on_daint_gpu() {
    let settings = HarnessSettings::default();
    let registry = registry();
    let target = ResolveTarget::new("daint:gpu".parse().unwrap(), "PrgEnv-gnu");

    let gpu = resolve(&registry, &target)
        .into_iter()
        .find(|v| v.name == "ArborGpuTest")
        .expect("GPU variant applies on daint:gpu");
    assert_eq!(gpu.build_flags, vec!["-DARB_WITH_ASSERTIONS=ON", "-DARB_GPU_MODEL=P100"]);
    assert_eq!(gpu.modules, vec!["CMake", "gcc/7.1.0", "craype-accel-nvidia60"]);
    assert_eq!(gpu.executable, "./build/bin/unit");
    assert_eq!(gpu.variables.get("CRAYPE_LINK_TYPE").map(String::as_str), Some("dynamic"));

    let mc = ResolveTarget::new("daint:mc".parse().unwrap(), "PrgEnv-gnu");
    assert!(resolve(&registry, &mc).iter().all(|v| v.name != "ArborGpuTest"));

    let plan = BuildPlan::new(&settings.site_configuration, &gpu).unwrap();
    assert!(plan.render_script().contains("srun ./build/bin/unit"));
}

#[test]
fn built_in_settings_validate() {
    let report = validate(&HarnessSettings::default(), &registry());
    assert!(report.passed, "{:?}", report.violations);
    assert!(report.violations.is_empty());
}
