//! Service registry: stores the registrations of one namespace.
//!
//! The registry maps [`DependencyKey`] to factory functions that know how
//! to produce a [`Value`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::binding::Namespace;
use crate::class::Value;
use crate::error::{AlreadyRegisteredError, NazarError, Result};
use crate::key::DependencyKey;

/// Type alias for factory functions.
///
/// A factory takes a reference to the [`Resolver`] (to resolve
/// sub-dependencies) and returns a [`Value`] or an error.
pub type FactoryFn = Arc<dyn Fn(&dyn Resolver) -> Result<Value> + Send + Sync>;

/// Trait for resolving services.
///
/// This is what factory functions and bean invocations receive. Separated
/// from the container to avoid circular references.
pub trait Resolver: Send + Sync {
    fn resolve_key(&self, namespace: &Namespace, key: &DependencyKey) -> Result<Value>;
}

/// How often a factory runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Once; the value is cached.
    Singleton,
    /// On every resolution.
    Transient,
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => write!(f, "Singleton"),
            Lifetime::Transient => write!(f, "Transient"),
        }
    }
}

/// Registration entry for a single service.
#[derive(Clone)]
pub(crate) struct Registration {
    pub key: DependencyKey,
    pub factory: FactoryFn,
    pub lifetime: Lifetime,
    /// Services the factory is known to need; only bean registrations
    /// declare any.
    pub dependencies: Vec<DependencyKey>,
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("key", &self.key)
            .field("lifetime", &self.lifetime)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// Stores all service registrations of one namespace.
///
/// The registry is populated during the build phase and becomes
/// immutable once the container is constructed.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    registrations: HashMap<DependencyKey, Registration>,
}

impl Registry {
    /// Registers a factory for a service key.
    ///
    /// # Errors
    /// Returns [`NazarError::AlreadyRegistered`] if the key is already
    /// registered and `allow_override` is false.
    pub fn register(&mut self, registration: Registration, allow_override: bool) -> Result<()> {
        let key = registration.key.clone();

        if !allow_override && self.registrations.contains_key(&key) {
            return Err(NazarError::AlreadyRegistered(AlreadyRegisteredError { key }));
        }

        debug!(key = %key, lifetime = %registration.lifetime, "Registered service");
        self.registrations.insert(key, registration);
        Ok(())
    }

    pub fn get(&self, key: &DependencyKey) -> Option<&Registration> {
        self.registrations.get(key)
    }

    pub fn contains(&self, key: &DependencyKey) -> bool {
        self.registrations.contains_key(key)
    }

    /// Returns all registrations (for validation).
    pub fn all_registrations(&self) -> &HashMap<DependencyKey, Registration> {
        &self.registrations
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Type names of every registered key, for suggestions.
    pub fn registered_names(&self) -> Vec<String> {
        self.registrations
            .keys()
            .map(|k| match k.name() {
                Some(name) => format!("{} (named \"{name}\")", k.type_name()),
                None => k.type_name().to_string(),
            })
            .collect()
    }
}
