//! Build plans
//!
//! A [`BuildPlan`] spells out what the harness does for one resolved
//! variant on one partition: load modules, export variables, configure,
//! build and launch. It renders to a bash script; nothing is executed.

use crate::error::{CiConfigError, Result};
use crate::site::{Scheduler, SchedulerKind, SiteConfiguration};
use crate::variant::ResolvedVariant;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Single-quote a value for the shell
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Steps for building and running one variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildPlan {
    /// Variant name
    pub variant: String,
    /// Target as `cluster:partition`
    pub system: String,
    /// Partition name, used for the batch header
    pub partition: String,
    /// Target environment
    pub environ: String,
    /// Partition scheduler
    pub scheduler: SchedulerKind,
    /// `module load` lines, partition first, then environment, then variant
    pub module_loads: Vec<String>,
    /// Exported variables in order
    pub exports: Vec<(String, String)>,
    /// Directory the build starts from
    pub sourcesdir: PathBuf,
    /// Configure steps
    pub prebuild: Vec<String>,
    /// Build driver
    pub build: String,
    /// Launch command, launcher first
    pub run: Vec<String>,
}

impl BuildPlan {
    /// Plan a resolved variant against the site it resolved for
    pub fn new(site: &SiteConfiguration, resolved: &ResolvedVariant) -> Result<Self> {
        let system = &resolved.system;
        let cluster = site
            .systems
            .site(&system.cluster)
            .ok_or_else(|| CiConfigError::UnknownSystem(system.to_string()))?;
        let partition = cluster
            .partitions
            .get(&system.partition)
            .ok_or_else(|| CiConfigError::UnknownSystem(system.to_string()))?;
        if !partition.allows_environ(&resolved.environ) {
            return Err(CiConfigError::unknown_environment(system.to_string(), &resolved.environ));
        }
        let environ = site
            .environ_for(system, &resolved.environ)
            .ok_or_else(|| CiConfigError::unknown_environment(system.to_string(), &resolved.environ))?;

        let mut modules: Vec<&String> = Vec::new();
        for module in partition
            .modules
            .iter()
            .chain(&environ.modules)
            .chain(&resolved.modules)
        {
            if !modules.contains(&module) {
                modules.push(module);
            }
        }
        let module_loads = modules
            .into_iter()
            .filter_map(|m| cluster.modules_system.load_command(m))
            .collect();

        let mut exports: Vec<(String, String)> = resolved
            .variables
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        exports.extend(
            environ
                .compiler_variables()
                .into_iter()
                .map(|(k, v)| (k.to_string(), v)),
        );

        let mut run = partition.scheduler.launcher.command();
        run.push(resolved.executable.clone());

        Ok(Self {
            variant: resolved.name.clone(),
            system: system.to_string(),
            partition: system.partition.clone(),
            environ: resolved.environ.clone(),
            scheduler: partition.scheduler,
            module_loads,
            exports,
            sourcesdir: resolved.sourcesdir.clone(),
            prebuild: resolved.prebuild_cmd.clone(),
            build: resolved.build_cmd.clone(),
            run,
        })
    }

    /// Scheduler directives placed under the shebang
    pub fn header(&self) -> Vec<String> {
        match self.scheduler.scheduler {
            Scheduler::Local => Vec::new(),
            Scheduler::Slurm | Scheduler::Squeue => vec![
                format!("#SBATCH --job-name={}", self.variant),
                format!("#SBATCH --partition={}", self.partition),
            ],
            Scheduler::Pbs => vec![
                format!("#PBS -N {}", self.variant),
                format!("#PBS -q {}", self.partition),
            ],
        }
    }

    /// Render as a bash script
    pub fn render_script(&self) -> String {
        let mut script = String::from("#!/bin/bash\n");

        for line in self.header() {
            script.push_str(&line);
            script.push('\n');
        }
        script.push_str(&format!("# {} on {} with {}\n", self.variant, self.system, self.environ));
        script.push_str("set -e\n");

        if !self.module_loads.is_empty() {
            script.push_str("\n# Modules\n");
            for line in &self.module_loads {
                script.push_str(line);
                script.push('\n');
            }
        }

        if !self.exports.is_empty() {
            script.push_str("\n# Environment\n");
            for (key, value) in &self.exports {
                script.push_str(&format!("export {}={}\n", key, shell_quote(value)));
            }
        }

        script.push_str("\n# Build\n");
        script.push_str(&format!("cd {}\n", self.sourcesdir.display()));
        script.push_str("(\n");
        for cmd in &self.prebuild {
            script.push_str(&format!("  {}\n", cmd));
        }
        script.push_str(&format!("  {}\n", self.build));
        script.push_str(")\n");

        script.push_str("\n# Run\n");
        script.push_str(&self.run.join(" "));
        script.push('\n');
        script
    }
}
