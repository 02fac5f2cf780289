//! Partition scheduler and parallel launcher kinds
//!
//! A partition declares its job scheduler as `scheduler[+launcher]`, e.g.
//! `local`, `local+srun`, `nativeslurm` or `pbs+mpiexec`. Both halves are
//! closed enumerations so a typo in a settings file is caught at load time.

use crate::error::{CiConfigError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Job scheduler used to place work on a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scheduler {
    /// Run directly on the current node
    Local,
    /// Slurm Workload Manager (`sbatch`)
    Slurm,
    /// Slurm, polling job state through `squeue`
    Squeue,
    /// PBS/Torque
    Pbs,
}

impl Scheduler {
    /// Get scheduler name as written in settings files
    pub fn name(&self) -> &'static str {
        match self {
            Scheduler::Local => "local",
            Scheduler::Slurm => "slurm",
            Scheduler::Squeue => "squeue",
            Scheduler::Pbs => "pbs",
        }
    }

    /// Whether jobs go through a batch queue rather than running in place
    pub fn is_batch(&self) -> bool {
        !matches!(self, Scheduler::Local)
    }
}

impl FromStr for Scheduler {
    type Err = CiConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(Scheduler::Local),
            "slurm" => Ok(Scheduler::Slurm),
            "squeue" => Ok(Scheduler::Squeue),
            "pbs" => Ok(Scheduler::Pbs),
            other => Err(CiConfigError::UnknownScheduler(other.to_string())),
        }
    }
}

/// Parallel launcher placed in front of the executable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Launcher {
    /// No launcher, run the executable as is
    #[default]
    Local,
    /// Slurm `srun`
    Srun,
    /// `srun` issuing its own allocation
    SrunAlloc,
    /// Cray ALPS `aprun`
    Alps,
    /// Generic `mpirun`
    Mpirun,
    /// Generic `mpiexec`
    Mpiexec,
}

impl Launcher {
    /// Get launcher name as written in settings files
    pub fn name(&self) -> &'static str {
        match self {
            Launcher::Local => "local",
            Launcher::Srun => "srun",
            Launcher::SrunAlloc => "srunalloc",
            Launcher::Alps => "alps",
            Launcher::Mpirun => "mpirun",
            Launcher::Mpiexec => "mpiexec",
        }
    }

    /// Command words that prefix the executable
    pub fn command(&self) -> Vec<String> {
        match self {
            Launcher::Local => Vec::new(),
            Launcher::Srun => vec!["srun".to_string()],
            Launcher::SrunAlloc => vec!["srun".to_string(), "--exclusive".to_string()],
            Launcher::Alps => vec!["aprun".to_string()],
            Launcher::Mpirun => vec!["mpirun".to_string()],
            Launcher::Mpiexec => vec!["mpiexec".to_string()],
        }
    }
}

impl FromStr for Launcher {
    type Err = CiConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(Launcher::Local),
            "srun" => Ok(Launcher::Srun),
            "srunalloc" => Ok(Launcher::SrunAlloc),
            "alps" => Ok(Launcher::Alps),
            "mpirun" => Ok(Launcher::Mpirun),
            "mpiexec" => Ok(Launcher::Mpiexec),
            other => Err(CiConfigError::UnknownLauncher(other.to_string())),
        }
    }
}

/// Scheduler and launcher pair of a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SchedulerKind {
    /// Job scheduler
    pub scheduler: Scheduler,
    /// Parallel launcher
    pub launcher: Launcher,
}

impl SchedulerKind {
    /// Plain local execution
    pub const LOCAL: SchedulerKind = SchedulerKind {
        scheduler: Scheduler::Local,
        launcher: Launcher::Local,
    };

    /// Create from explicit parts
    pub fn new(scheduler: Scheduler, launcher: Launcher) -> Self {
        Self { scheduler, launcher }
    }

    /// Whether jobs on this partition are queued
    pub fn is_batch(&self) -> bool {
        self.scheduler.is_batch()
    }
}

impl FromStr for SchedulerKind {
    type Err = CiConfigError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        // Shorthand kept for settings files written against older harnesses
        if s == "nativeslurm" {
            return Ok(Self::new(Scheduler::Slurm, Launcher::Srun));
        }

        match s.split_once('+') {
            Some((sched, launcher)) => Ok(Self::new(sched.parse()?, launcher.parse()?)),
            None => Ok(Self::new(s.parse()?, Launcher::Local)),
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.launcher {
            Launcher::Local => write!(f, "{}", self.scheduler.name()),
            launcher => write!(f, "{}+{}", self.scheduler.name(), launcher.name()),
        }
    }
}

impl TryFrom<String> for SchedulerKind {
    type Error = CiConfigError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SchedulerKind> for String {
    fn from(kind: SchedulerKind) -> Self {
        kind.to_string()
    }
}
