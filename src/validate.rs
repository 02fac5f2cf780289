//! Consistency checks across settings and variants
//!
//! Every check runs; the report lists all violations instead of stopping at
//! the first one.

use crate::config::HarnessSettings;
use crate::logging::LoggingConfig;
use crate::site::SystemPartition;
use crate::variant::VariantRegistry;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Outcome of a validation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Whether no violation was found
    pub passed: bool,
    /// Violations (empty if passed)
    pub violations: Vec<String>,
    /// Summary message
    pub message: String,
}

impl ValidationReport {
    fn from_violations(violations: Vec<String>) -> Self {
        let passed = violations.is_empty();
        let message = if passed {
            "Configuration is consistent".to_string()
        } else {
            format!("Validation failed with {} violation(s)", violations.len())
        };
        Self {
            passed,
            violations,
            message,
        }
    }
}

fn check_environ(
    settings: &HarnessSettings,
    owner: &str,
    system: &SystemPartition,
    environ: &str,
    violations: &mut Vec<String>,
) {
    let environments = &settings.site_configuration.environments;
    if !environments.is_defined(&system.cluster, environ) {
        violations.push(format!(
            "{}: environment '{}' is not defined for cluster '{}'",
            owner, environ, system.cluster
        ));
    }
}

fn check_logger(name: &str, config: &LoggingConfig, violations: &mut Vec<String>) {
    if config.handlers.is_empty() {
        violations.push(format!("{}: no handlers configured", name));
    }
}

/// Check the settings on their own
pub fn validate_settings(settings: &HarnessSettings) -> Vec<String> {
    let mut violations = Vec::new();

    if settings.job_poll_intervals.is_empty() {
        violations.push("job_poll_intervals: must not be empty".to_string());
    }
    if settings.job_poll_intervals.iter().any(|s| *s == 0) {
        violations.push("job_poll_intervals: intervals must be positive".to_string());
    }
    if settings.job_submit_timeout == 0 {
        violations.push("job_submit_timeout: must be positive".to_string());
    }
    if settings.checks_path.is_empty() {
        violations.push("checks_path: must name at least one directory".to_string());
    }

    for (cluster, site) in settings.site_configuration.systems.sites() {
        if site.partitions.is_empty() {
            violations.push(format!("system '{}': no partitions", cluster));
        }
        for (name, partition) in &site.partitions {
            let system = SystemPartition::new(cluster, name.as_str());
            let owner = format!("partition '{}'", system);
            for environ in &partition.environs {
                check_environ(settings, &owner, &system, environ, &mut violations);
            }
        }
    }

    check_logger("logging_config", &settings.logging_config, &mut violations);
    check_logger("perf_logging_config", &settings.perf_logging_config, &mut violations);

    violations
}

/// Check every variant against the site and environment catalogs
pub fn validate_variants(settings: &HarnessSettings, registry: &VariantRegistry) -> Vec<String> {
    let mut violations = Vec::new();
    let systems = &settings.site_configuration.systems;

    for variant in registry.iter() {
        let owner = format!("variant '{}'", variant.name());
        if variant.valid_systems().is_empty() {
            violations.push(format!("{}: runs on no system", owner));
        }
        if variant.valid_prog_environs().is_empty() {
            violations.push(format!("{}: runs with no environment", owner));
        }

        for system in variant.valid_systems() {
            if !systems.contains(system) {
                violations.push(format!("{}: system '{}' is not in the site catalog", owner, system));
                continue;
            }
            for environ in variant.valid_prog_environs() {
                check_environ(settings, &owner, system, environ, &mut violations);
            }
        }
    }

    violations
}

/// Run every check
pub fn validate(settings: &HarnessSettings, registry: &VariantRegistry) -> ValidationReport {
    let mut violations = validate_settings(settings);
    violations.extend(validate_variants(settings, registry));

    for violation in &violations {
        warn!("{}", violation);
    }
    ValidationReport::from_violations(violations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::{PartitionDescriptor, SchedulerKind};

    #[test]
    fn test_defaults_are_consistent() {
        let report = validate(&HarnessSettings::default(), &VariantRegistry::arbor().unwrap());
        assert!(report.passed, "{:?}", report.violations);
        assert_eq!(report.message, "Configuration is consistent");
    }

    #[test]
    fn test_missing_cluster_is_reported() {
        let mut settings = HarnessSettings::default();
        settings.site_configuration.systems = settings
            .site_configuration
            .systems
            .clone()
            .with_site("dom", crate::site::SiteDescriptor::new("empty", Default::default()));

        let report = validate(&settings, &VariantRegistry::arbor().unwrap());
        assert!(!report.passed);
        assert!(report.violations.iter().any(|v| v == "system 'dom': no partitions"));
        assert!(report
            .violations
            .iter()
            .any(|v| v.contains("variant 'ArborBaseTest': system 'dom:gpu' is not in the site catalog")));
    }

    #[test]
    fn test_unknown_partition_environ() {
        let mut settings = HarnessSettings::default();
        settings.site_configuration.systems = settings.site_configuration.systems.clone().with_site(
            "tresa",
            crate::site::SiteDescriptor::new("My Mac", Default::default()).with_partition(
                "login",
                PartitionDescriptor::new("My Mac", SchedulerKind::LOCAL).with_environs(["PrgEnv-gnu", "PrgEnv-xlc"]),
            ),
        );

        let violations = validate_settings(&settings);
        assert_eq!(
            violations,
            vec!["partition 'tresa:login': environment 'PrgEnv-xlc' is not defined for cluster 'tresa'"]
        );
    }

    #[test]
    fn test_settings_scalars() {
        let mut settings = HarnessSettings::default();
        settings.job_poll_intervals = vec![];
        settings.job_submit_timeout = 0;
        settings.perf_logging_config.handlers.clear();

        let violations = validate_settings(&settings);
        assert_eq!(violations.len(), 3);
    }
}
