//! Service graph validation.
//!
//! Validates the application namespace at build time:
//! - Detects circular dependencies between beans
//! - Checks that every required service is registered
//!
//! All validation happens during [`ContainerBuilder::build()`], before the
//! first `resolve()` call.
//!
//! [`ContainerBuilder::build()`]: crate::container::ContainerBuilder::build

use std::collections::{HashMap, HashSet};

use nazar_support::rendering::suggest_similar;
use tracing::{debug, instrument, warn};

use crate::error::{CircularDependencyError, NazarError, NotRegisteredError, Result};
use crate::key::DependencyKey;

/// What a registered service needs, for validation.
#[derive(Debug, Clone)]
pub(crate) struct DependencyInfo {
    pub dependencies: Vec<DependencyKey>,
}

/// Validates the service graph for correctness.
///
/// # Algorithm
/// Depth-first search over the registrations, keeping the current path to
/// detect and report cycles.
pub(crate) struct GraphValidator {
    dependencies: HashMap<DependencyKey, DependencyInfo>,
    /// Currently being visited (for cycle detection)
    visiting: HashSet<DependencyKey>,
    /// Already validated (cache)
    validated: HashSet<DependencyKey>,
    /// Current DFS path (for error reporting)
    path: Vec<DependencyKey>,
}

impl GraphValidator {
    pub fn new(dependencies: HashMap<DependencyKey, DependencyInfo>) -> Self {
        Self {
            dependencies,
            visiting: HashSet::new(),
            validated: HashSet::new(),
            path: Vec::new(),
        }
    }

    /// Validates the entire graph.
    ///
    /// # Errors
    /// - [`NazarError::CircularDependency`]: cycle detected
    /// - [`NazarError::NotRegistered`]: missing dependency
    #[instrument(skip(self), name = "graph_validation")]
    pub fn validate(&mut self) -> Result<()> {
        let mut keys: Vec<DependencyKey> = self.dependencies.keys().cloned().collect();
        keys.sort_by(|a, b| a.type_name().cmp(b.type_name()).then(a.name().cmp(&b.name())));

        debug!(service_count = keys.len(), "Starting service graph validation");

        for key in keys {
            self.validate_key(&key)?;
        }

        debug!("Service graph validation passed");
        Ok(())
    }

    fn validate_key(&mut self, key: &DependencyKey) -> Result<()> {
        if self.validated.contains(key) {
            return Ok(());
        }

        if self.visiting.contains(key) {
            let cycle_start = self.path.iter().position(|k| k == key).unwrap_or(0);

            let mut chain: Vec<DependencyKey> = self.path[cycle_start..].to_vec();
            chain.push(key.clone());

            warn!(cycle = ?chain, "Circular dependency detected");
            return Err(NazarError::CircularDependency(CircularDependencyError { chain }));
        }

        let info = self.dependencies.get(key).cloned().ok_or_else(|| {
            NazarError::NotRegistered(NotRegisteredError {
                requested: key.clone(),
                required_by: self.path.last().map(|k| k.to_string()),
                suggestions: self.find_similar_keys(key),
            })
        })?;

        self.visiting.insert(key.clone());
        self.path.push(key.clone());

        for dependency in &info.dependencies {
            self.validate_key(dependency)?;
        }

        self.path.pop();
        self.visiting.remove(key);
        self.validated.insert(key.clone());

        Ok(())
    }

    fn find_similar_keys(&self, target: &DependencyKey) -> Vec<String> {
        let available: Vec<&str> = self.dependencies.keys().map(|k| k.type_name()).collect();
        suggest_similar(target.type_name(), &available, 3)
    }
}
