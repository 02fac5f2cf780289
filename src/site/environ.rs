//! Programming environment catalog
//!
//! Environments are grouped by scope: the `*` scope holds entries every
//! cluster can use, and a cluster-named scope holds entries for that cluster
//! only. A cluster entry shadows a global entry of the same name.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Scope name for environments shared by every cluster
pub const GLOBAL_SCOPE: &str = "*";

/// Kind of environment description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EnvironKind {
    /// Compiler toolchain environment
    #[default]
    ProgEnvironment,
}

fn default_cc() -> String {
    "cc".to_string()
}

fn default_cxx() -> String {
    "CC".to_string()
}

fn default_ftn() -> Option<String> {
    Some("ftn".to_string())
}

/// A named compiler toolchain
///
/// Unset compilers fall back to the Cray wrapper names (`cc`, `CC`, `ftn`).
/// An explicit `null` Fortran compiler means the toolchain has none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    /// Environment kind
    #[serde(rename = "type", default)]
    pub kind: EnvironKind,
    /// Modules loaded to activate this environment
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modules: Vec<String>,
    /// C compiler driver
    #[serde(default = "default_cc")]
    pub cc: String,
    /// C++ compiler driver
    #[serde(default = "default_cxx")]
    pub cxx: String,
    /// Fortran compiler driver
    #[serde(default = "default_ftn")]
    pub ftn: Option<String>,
}

impl Default for EnvironmentDescriptor {
    fn default() -> Self {
        Self {
            kind: EnvironKind::ProgEnvironment,
            modules: Vec::new(),
            cc: default_cc(),
            cxx: default_cxx(),
            ftn: default_ftn(),
        }
    }
}

impl EnvironmentDescriptor {
    /// Environment that only loads modules and keeps the wrapper compilers
    pub fn from_modules<I, S>(modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            modules: modules.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Environment with explicit compiler drivers
    pub fn with_compilers(
        cc: impl Into<String>,
        cxx: impl Into<String>,
        ftn: Option<&str>,
    ) -> Self {
        Self {
            cc: cc.into(),
            cxx: cxx.into(),
            ftn: ftn.map(str::to_string),
            ..Default::default()
        }
    }

    /// Compiler variables exported before a build
    pub fn compiler_variables(&self) -> Vec<(&'static str, String)> {
        let mut vars = Vec::new();
        if !self.cc.is_empty() {
            vars.push(("CC", self.cc.clone()));
        }
        if !self.cxx.is_empty() {
            vars.push(("CXX", self.cxx.clone()));
        }
        if let Some(ftn) = self.ftn.as_deref().filter(|f| !f.is_empty()) {
            vars.push(("FC", ftn.to_string()));
        }
        vars
    }
}

/// Environments keyed by scope, then by name
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentCatalog {
    scopes: BTreeMap<String, BTreeMap<String, EnvironmentDescriptor>>,
}

impl EnvironmentCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an environment to the global scope
    pub fn with_global(self, name: impl Into<String>, environ: EnvironmentDescriptor) -> Self {
        self.with_scoped(GLOBAL_SCOPE, name, environ)
    }

    /// Add an environment to a cluster scope
    pub fn with_scoped(
        mut self,
        scope: impl Into<String>,
        name: impl Into<String>,
        environ: EnvironmentDescriptor,
    ) -> Self {
        self.scopes
            .entry(scope.into())
            .or_default()
            .insert(name.into(), environ);
        self
    }

    /// Resolve an environment for a cluster, preferring the cluster scope
    pub fn lookup(&self, cluster: &str, name: &str) -> Option<&EnvironmentDescriptor> {
        self.scopes
            .get(cluster)
            .and_then(|scope| scope.get(name))
            .or_else(|| self.scopes.get(GLOBAL_SCOPE).and_then(|scope| scope.get(name)))
    }

    /// Whether an environment is visible from a cluster
    pub fn is_defined(&self, cluster: &str, name: &str) -> bool {
        self.lookup(cluster, name).is_some()
    }

    /// Names of every environment visible from a cluster
    pub fn names_for(&self, cluster: &str) -> BTreeSet<&str> {
        [GLOBAL_SCOPE, cluster]
            .iter()
            .filter_map(|scope| self.scopes.get(*scope))
            .flat_map(|scope| scope.keys().map(String::as_str))
            .collect()
    }

    /// Iterate over `(scope, name, environment)` triples
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &EnvironmentDescriptor)> {
        self.scopes.iter().flat_map(|(scope, envs)| {
            envs.iter()
                .map(move |(name, env)| (scope.as_str(), name.as_str(), env))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cluster_scope_shadows_global() {
        let catalog = EnvironmentCatalog::new()
            .with_global("PrgEnv-gnu", EnvironmentDescriptor::from_modules(["PrgEnv-gnu"]))
            .with_scoped(
                "tresa",
                "PrgEnv-gnu",
                EnvironmentDescriptor::with_compilers("gcc", "g++", None),
            );

        assert_eq!(catalog.lookup("daint", "PrgEnv-gnu").unwrap().cc, "cc");
        assert_eq!(catalog.lookup("tresa", "PrgEnv-gnu").unwrap().cc, "gcc");
        assert!(catalog.lookup("daint", "PrgEnv-clang").is_none());
    }

    #[test]
    fn test_names_for_merges_scopes() {
        let catalog = EnvironmentCatalog::new()
            .with_global("builtin", EnvironmentDescriptor::default())
            .with_scoped("tresa", "PrgEnv-clang", EnvironmentDescriptor::default());

        let names: Vec<&str> = catalog.names_for("tresa").into_iter().collect();
        assert_eq!(names, vec!["PrgEnv-clang", "builtin"]);
        assert!(!catalog.is_defined("daint", "PrgEnv-clang"));
    }

    #[test]
    fn test_fortran_null_versus_absent() {
        let env: EnvironmentDescriptor =
            serde_json::from_str(r#"{"type": "ProgEnvironment", "cc": "clang", "cxx": "clang++", "ftn": null}"#)
                .unwrap();
        assert_eq!(env.ftn, None);

        let env: EnvironmentDescriptor =
            serde_json::from_str(r#"{"type": "ProgEnvironment", "modules": ["PrgEnv-cray"]}"#).unwrap();
        assert_eq!(env.ftn.as_deref(), Some("ftn"));
        assert_eq!(env.cxx, "CC");
    }

    #[test]
    fn test_compiler_variables_skip_empty() {
        let env = EnvironmentDescriptor::with_compilers("cc", "", Some(""));
        assert_eq!(env.compiler_variables(), vec![("CC", "cc".to_string())]);
    }
}
