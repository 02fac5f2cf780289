//! Harness settings and CLI arguments
//!
//! [`HarnessSettings`] is the single immutable value handed to the
//! regression harness at start-up. It can be loaded from a JSON file with
//! the same nested-mapping shape the harness reads, or taken from the
//! built-in CSCS defaults.

use crate::error::{IoResultExt, Result};
use crate::logging::{LogLevel, LoggingConfig, LoggingSink, StreamName};
use crate::site::{
    EnvironmentCatalog, EnvironmentDescriptor, Launcher, ModulesSystem, PartitionDescriptor,
    Scheduler, SchedulerKind, SiteCatalog, SiteConfiguration, SiteDescriptor,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// arbor-ci - inspect the Arbor regression-test CI configuration
#[derive(Parser, Debug, Clone)]
#[command(name = "arbor-ci")]
#[command(author = "Arbor CI Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Site catalog, build variants and log sinks for the Arbor CI")]
#[command(long_about = r#"
arbor-ci describes where and how the Arbor regression tests run: the
clusters and partitions of a site, the compiler environments, the build
variants (base, MPI, GPU, SIMD) and the log sinks of the harness.

Examples:
  arbor-ci systems                                      # List the site catalog
  arbor-ci resolve --system daint:gpu --environ PrgEnv-gnu
  arbor-ci plan --variant ArborGpuTest --system daint:gpu --environ PrgEnv-gnu
  arbor-ci sanity --variant ArborBaseTest build/unit.out
  arbor-ci --config site.json validate
"#)]
pub struct CliArgs {
    /// Settings file (JSON); built-in settings are used when absent
    #[arg(short = 'C', long, value_name = "PATH", env = "ARBOR_CI_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Route logs through the settings' log sinks, writing files here
    #[arg(long, value_name = "DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List clusters, partitions and environments
    #[command(name = "systems")]
    Systems {
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the variants that apply to a partition and environment
    #[command(name = "resolve")]
    Resolve {
        /// Target partition as cluster:partition
        #[arg(short, long)]
        system: String,
        /// Target programming environment
        #[arg(short, long)]
        environ: String,
        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Check the settings and variants for consistency
    #[command(name = "validate")]
    Validate,

    /// Print the settings as JSON
    #[command(name = "show-config")]
    ShowConfig,

    /// Report which cluster the current host belongs to
    #[command(name = "detect")]
    Detect {
        /// Host name to test instead of the current one
        #[arg(long)]
        hostname: Option<String>,
    },

    /// Print the build script for one variant
    #[command(name = "plan")]
    Plan {
        /// Variant name
        #[arg(long)]
        variant: String,
        /// Target partition as cluster:partition
        #[arg(short, long)]
        system: String,
        /// Target programming environment
        #[arg(short, long)]
        environ: String,
    },

    /// Check captured output against a variant's success predicate
    #[command(name = "sanity")]
    Sanity {
        /// Variant name
        #[arg(long)]
        variant: String,
        /// File holding the captured output
        output: PathBuf,
    },
}

/// Output format for reports
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON format
    Json,
}

/// Settings handed to the regression harness
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarnessSettings {
    /// Module that provides the harness itself
    #[serde(default = "default_reframe_module")]
    pub reframe_module: String,
    /// Seconds between successive job-state polls
    pub job_poll_intervals: Vec<u64>,
    /// Seconds to wait for a job submission to be acknowledged
    pub job_submit_timeout: u64,
    /// Directories searched for checks
    pub checks_path: Vec<PathBuf>,
    /// Whether check directories are searched recursively
    #[serde(default)]
    pub checks_path_recurse: bool,
    /// Site and environment catalogs
    pub site_configuration: SiteConfiguration,
    /// Harness log sinks
    pub logging_config: LoggingConfig,
    /// Performance log sinks
    pub perf_logging_config: LoggingConfig,
}

fn default_reframe_module() -> String {
    "reframe".to_string()
}

fn cray_partition(descr: &str, module: &str) -> PartitionDescriptor {
    PartitionDescriptor::new(descr, SchedulerKind::new(Scheduler::Local, Launcher::Srun))
        .with_modules([module])
        .with_environs(["PrgEnv-cray", "PrgEnv-gnu", "PrgEnv-intel", "PrgEnv-pgi"])
}

fn cray_site(descr: &str, hostname: &str) -> SiteDescriptor {
    SiteDescriptor::new(descr, ModulesSystem::Tmod)
        .with_hostname(hostname)
        .with_partition(
            "gpu",
            cray_partition("Hybrid nodes (Haswell/P100)", "daint-gpu").with_max_jobs(100),
        )
        .with_partition("mc", cray_partition("Multicore nodes (Broadwell)", "daint-mc"))
}

/// The CSCS site catalog: Piz Daint, its test twin Dom, and a workstation
pub fn cscs_site_configuration() -> SiteConfiguration {
    let systems = SiteCatalog::new()
        .with_site("daint", cray_site("Piz Daint compute nodes", "daint"))
        .with_site("dom", cray_site("Dom TDS compute nodes", "dom"))
        .with_site(
            "tresa",
            SiteDescriptor::new("My Mac", ModulesSystem::Nomod)
                .with_hostname("tresa")
                .with_partition(
                    "login",
                    PartitionDescriptor::new("My Mac", SchedulerKind::LOCAL)
                        .with_environs(["PrgEnv-clang"]),
                ),
        );

    let mut environments = EnvironmentCatalog::new().with_scoped(
        "tresa",
        "PrgEnv-clang",
        EnvironmentDescriptor::with_compilers("clang", "clang++", None),
    );
    for prgenv in ["PrgEnv-cray", "PrgEnv-gnu", "PrgEnv-intel", "PrgEnv-pgi"] {
        environments = environments.with_global(prgenv, EnvironmentDescriptor::from_modules([prgenv]));
    }
    environments = environments
        .with_global("builtin", EnvironmentDescriptor::with_compilers("cc", "", Some("")))
        .with_global(
            "builtin-gcc",
            EnvironmentDescriptor::with_compilers("gcc", "g++", Some("gfortran")),
        );

    SiteConfiguration {
        systems,
        environments,
    }
}

/// The harness log: a debug file, console output and a plain output file
pub fn default_logging_config() -> LoggingConfig {
    LoggingConfig {
        level: LogLevel::Debug,
        handlers: vec![
            LoggingSink::file(
                "reframe.log",
                LogLevel::Debug,
                "[%(asctime)s] %(levelname)s: %(check_info)s: %(message)s",
                false,
            ),
            LoggingSink::stream(StreamName::Stdout, LogLevel::Info, "%(message)s"),
            LoggingSink::file("reframe.out", LogLevel::Info, "%(message)s", false),
        ],
    }
}

/// The performance log: one appended file per check and partition
pub fn default_perf_logging_config() -> LoggingConfig {
    LoggingConfig {
        level: LogLevel::Debug,
        handlers: vec![LoggingSink::filelog(
            "%(check_system)s/%(check_partition)s",
            LogLevel::Info,
            concat!(
                "%(asctime)s|reframe %(version)s|",
                "%(check_info)s|jobid=%(check_jobid)s|",
                "%(check_perf_var)s=%(check_perf_value)s|",
                "ref=%(check_perf_ref)s ",
                "(l=%(check_perf_lower_thres)s, ",
                "u=%(check_perf_upper_thres)s)"
            ),
            true,
        )],
    }
}

impl Default for HarnessSettings {
    fn default() -> Self {
        Self {
            reframe_module: default_reframe_module(),
            job_poll_intervals: vec![1, 2, 3],
            job_submit_timeout: 60,
            checks_path: vec![PathBuf::from("checks/")],
            checks_path_recurse: true,
            site_configuration: cscs_site_configuration(),
            logging_config: default_logging_config(),
            perf_logging_config: default_perf_logging_config(),
        }
    }
}

impl HarnessSettings {
    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).with_path(path)?;
        Self::from_json(&text).map_err(|e| e.with_context(format!("loading {}", path.display())))
    }

    /// Parse settings from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Settings from a file if given, otherwise the built-in ones
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        match &args.config {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Serialise as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Poll intervals as durations
    pub fn poll_intervals(&self) -> Vec<Duration> {
        self.job_poll_intervals
            .iter()
            .map(|s| Duration::from_secs(*s))
            .collect()
    }

    /// Submission timeout as a duration
    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.job_submit_timeout)
    }

    /// Short human-readable summary
    pub fn print_summary(&self) {
        let polls: Vec<String> = self
            .poll_intervals()
            .into_iter()
            .map(|d| humantime::format_duration(d).to_string())
            .collect();

        println!("=== Harness Settings ===");
        println!("Harness module: {}", self.reframe_module);
        println!("Poll intervals: {}", polls.join(", "));
        println!("Submit timeout: {}", humantime::format_duration(self.submit_timeout()));
        println!(
            "Checks path:    {}{}",
            self.checks_path
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            if self.checks_path_recurse { " (recursive)" } else { "" }
        );
        println!("Sites:          {}", self.site_configuration.systems.len());
        println!(
            "Log sinks:      {} harness, {} performance",
            self.logging_config.handlers.len(),
            self.perf_logging_config.handlers.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::SystemPartition;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = HarnessSettings::default();
        assert_eq!(settings.job_poll_intervals, vec![1, 2, 3]);
        assert_eq!(settings.job_submit_timeout, 60);
        assert_eq!(settings.submit_timeout(), Duration::from_secs(60));

        let systems = &settings.site_configuration.systems;
        let gpu = systems.partition(&SystemPartition::new("daint", "gpu")).unwrap();
        assert_eq!(gpu.scheduler.to_string(), "local+srun");
        assert_eq!(gpu.max_jobs, Some(100));
        assert_eq!(gpu.modules, vec!["daint-gpu"]);

        let mc = systems.partition(&SystemPartition::new("daint", "mc")).unwrap();
        assert_eq!(mc.max_jobs, None);
        assert!(systems.contains(&SystemPartition::new("dom", "mc")));
    }

    #[test]
    fn test_default_environments() {
        let envs = &HarnessSettings::default().site_configuration.environments;
        assert_eq!(envs.lookup("daint", "PrgEnv-gnu").unwrap().modules, vec!["PrgEnv-gnu"]);
        assert_eq!(envs.lookup("tresa", "PrgEnv-clang").unwrap().ftn, None);
        assert!(envs.lookup("daint", "PrgEnv-clang").is_none());
        assert_eq!(
            envs.lookup("dom", "builtin-gcc").unwrap().ftn.as_deref(),
            Some("gfortran")
        );
    }

    #[test]
    fn test_json_round_trip_through_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.json");
        let settings = HarnessSettings::default();
        fs::write(&path, settings.to_json().unwrap()).unwrap();

        let loaded = HarnessSettings::load(&path).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_load_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let err = HarnessSettings::load(&path).unwrap_err();
        assert!(err.is_user_config());
        assert!(err.to_string().contains("broken.json"));

        let err = HarnessSettings::load(&tmp.path().join("missing.json")).unwrap_err();
        assert!(err.path().is_some());
    }

    #[test]
    fn test_harness_settings_shape() {
        let text = r#"{
            "job_poll_intervals": [1, 2, 3],
            "job_submit_timeout": 60,
            "checks_path": ["checks/"],
            "site_configuration": {
                "systems": {
                    "tresa": {
                        "descr": "My Mac",
                        "hostnames": ["tresa"],
                        "partitions": {
                            "login": {"scheduler": "local", "environs": ["PrgEnv-clang"], "descr": "My Mac"}
                        }
                    }
                },
                "environments": {
                    "tresa": {
                        "PrgEnv-clang": {"type": "ProgEnvironment", "cc": "clang", "cxx": "clang++", "ftn": null}
                    }
                }
            },
            "logging_config": {"level": "DEBUG", "handlers": [
                {"type": "stream", "name": "stdout", "level": "INFO", "format": "%(message)s"}
            ]},
            "perf_logging_config": {"level": "DEBUG", "handlers": [
                {"type": "filelog", "prefix": "%(check_system)s/%(check_partition)s", "level": "INFO", "format": "%(message)s", "append": true}
            ]}
        }"#;

        let settings = HarnessSettings::from_json(text).unwrap();
        assert_eq!(settings.reframe_module, "reframe");
        assert!(!settings.checks_path_recurse);
        let site = settings.site_configuration.systems.site("tresa").unwrap();
        assert_eq!(site.modules_system, ModulesSystem::Nomod);
        assert_eq!(
            settings.perf_logging_config.handlers[0].append(),
            Some(true)
        );
    }

    #[test]
    fn test_bad_scheduler_rejected() {
        let text = HarnessSettings::default()
            .to_json()
            .unwrap()
            .replace("local+srun", "local+jsrun");
        assert!(HarnessSettings::from_json(&text).is_err());
    }
}
