//! # The Container: heart of Nazar
//!
//! Holds the services, extensions and hook catalog that bean scans run
//! against, and the beans registered at build time.
//!
//! # Architecture
//! ```text
//! ContainerBuilder ──build()──> scan beans ──> register bean factories ──> validate graph
//!                                    │
//!                                    ▼
//!                                Container ──install_bean()──> Bean
//! ```
//!
//! # Examples
//! ```rust
//! use nazar_core::prelude::*;
//! use std::sync::Arc;
//!
//! struct Greeting(String);
//!
//! struct Greeter {
//!     greeting: Arc<Greeting>,
//! }
//!
//! let greeter_class = ClassDescriptor::builder::<Greeter>()
//!     .constructor(
//!         ConstructorDescriptor::new(Visibility::Public, |args| {
//!             let greeting: &Greeting = arg(args, 0)?;
//!             Ok(Some(value(Greeter {
//!                 greeting: Arc::new(Greeting(greeting.0.clone())),
//!             })))
//!         })
//!         .param(ParameterDescriptor::of::<Greeting>("greeting")),
//!     )
//!     .build();
//!
//! let container = Container::builder()
//!     .singleton_value(Greeting("hello".into()))
//!     .bean(greeter_class)
//!     .build()
//!     .expect("Failed to build container");
//!
//! let greeter: Arc<Greeter> = container.resolve().expect("Failed to resolve");
//! assert_eq!(greeter.greeting.0, "hello");
//! ```

use std::any::type_name;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use nazar_support::rendering::suggest_similar;
use once_cell::sync::OnceCell;
use parking_lot::{ReentrantMutex, RwLock};
use tracing::{debug, info, instrument, trace, warn};

use crate::bean::{Bean, BeanInstaller, BeanSource};
use crate::binding::{Binding, Namespace};
use crate::class::{registered_classes, value, ClassDescriptor, Value};
use crate::error::{
    AlreadyRegisteredError, CircularDependencyError, NazarError, NotRegisteredError, Result,
};
use crate::extension::{Extension, ExtensionHost, Handler};
use crate::graph::{DependencyInfo, GraphValidator};
use crate::hook::HookCatalog;
use crate::key::{DependencyKey, ExtensionKey, TypeKey};
use crate::registry::{FactoryFn, Lifetime, Registration, Registry, Resolver};
use crate::scanner::BeanScanner;
use crate::settings::ScanSettings;

// ============================================================
// ContainerBuilder
// ============================================================

/// Builds a [`Container`].
///
/// Registration errors are collected and reported by
/// [`build()`](ContainerBuilder::build).
///
/// # Examples
/// ```rust,ignore
/// let container = Container::builder()
///     .singleton_value(Config::load())
///     .type_hook::<Logger, LoggingExtension>()
///     .discovered_beans()
///     .build()?;
/// ```
pub struct ContainerBuilder {
    namespaces: HashMap<Namespace, Registry>,
    catalog: HookCatalog,
    extensions: HashMap<ExtensionKey, Arc<dyn Extension>>,
    beans: Vec<Arc<ClassDescriptor>>,
    settings: ScanSettings,
    errors: Vec<NazarError>,
}

impl ContainerBuilder {
    fn new() -> Self {
        Self {
            namespaces: HashMap::new(),
            catalog: HookCatalog::new(),
            extensions: HashMap::new(),
            beans: Vec::new(),
            settings: ScanSettings::default(),
            errors: Vec::new(),
        }
    }

    /// Replaces the scan settings.
    pub fn settings(mut self, settings: ScanSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Allow overriding previously registered services.
    pub fn allow_override(mut self, allow: bool) -> Self {
        self.settings.allow_override = allow;
        self
    }

    pub fn max_deferred_operations(mut self, limit: usize) -> Self {
        self.settings.max_deferred_operations = limit;
        self
    }

    // ── Services ──

    /// Register a pre-built value as an application singleton.
    pub fn singleton_value<T: Send + Sync + 'static>(self, service: T) -> Self {
        self.value_in(Namespace::Application, DependencyKey::of::<T>(), service)
    }

    /// Register a pre-built value under a name.
    pub fn named_value<T: Send + Sync + 'static>(self, name: &'static str, service: T) -> Self {
        self.value_in(Namespace::Application, DependencyKey::named::<T>(name), service)
    }

    /// Register a value visible only to beans installed by `extension`.
    pub fn extension_value<T: Send + Sync + 'static>(
        self,
        extension: ExtensionKey,
        service: T,
    ) -> Self {
        self.value_in(
            Namespace::Extension(extension),
            DependencyKey::of::<T>(),
            service,
        )
    }

    /// Register a singleton factory.
    ///
    /// Called once on first resolve (via `OnceCell`).
    pub fn singleton_with<T: Send + Sync + 'static>(
        self,
        factory: impl Fn(&dyn Resolver) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        let cell: Arc<OnceCell<Value>> = Arc::new(OnceCell::new());
        self.register_internal(
            Namespace::Application,
            DependencyKey::of::<T>(),
            Lifetime::Singleton,
            Arc::new(move |resolver: &dyn Resolver| {
                cell.get_or_try_init(|| factory(resolver).map(value))
                    .cloned()
            }),
            vec![],
        )
    }

    /// Register a transient factory.
    ///
    /// Creates a new instance on every resolve.
    pub fn transient_with<T: Send + Sync + 'static>(
        self,
        factory: impl Fn(&dyn Resolver) -> Result<T> + Send + Sync + 'static,
    ) -> Self {
        self.register_internal(
            Namespace::Application,
            DependencyKey::of::<T>(),
            Lifetime::Transient,
            Arc::new(move |resolver: &dyn Resolver| factory(resolver).map(value)),
            vec![],
        )
    }

    // ── Extensions and hooks ──

    /// Installs a ready-made extension instance.
    pub fn install_extension<E: Extension>(mut self, extension: E) -> Self {
        let key = ExtensionKey::without_constructor::<E>();
        debug!(extension = %key, "Installed extension");
        self.extensions.insert(key, Arc::new(extension));
        self
    }

    /// Routes parameters of type `T` without a binding marker to `E`.
    pub fn type_hook<T: ?Sized + 'static, E: Extension + Default>(self) -> Self {
        self.type_hook_for(TypeKey::of::<T>(), ExtensionKey::of::<E>())
    }

    pub fn type_hook_for(mut self, ty: TypeKey, extension: ExtensionKey) -> Self {
        if let Err(err) = self.catalog.register_type_hook(ty, extension) {
            self.errors.push(err);
        }
        self
    }

    // ── Beans ──

    /// Adds a class-sourced application bean, scanned at build time and
    /// registered as a singleton service of its own type.
    pub fn bean(mut self, class: Arc<ClassDescriptor>) -> Self {
        self.beans.push(class);
        self
    }

    /// Adds every class submitted with `inventory::submit!`.
    pub fn discovered_beans(mut self) -> Self {
        let classes = registered_classes();
        debug!(count = classes.len(), "Discovered bean classes");
        self.beans.extend(classes);
        self
    }

    // ── Build ──

    /// Build the container: scan the beans, register them, validate the
    /// application service graph.
    #[instrument(skip(self), name = "container_build")]
    pub fn build(self) -> Result<Container> {
        if let Some(err) = self.errors.into_iter().next() {
            return Err(err);
        }

        info!(
            beans = self.beans.len(),
            extensions = self.extensions.len(),
            "Building container"
        );

        let mut container = Container {
            namespaces: self.namespaces,
            catalog: self.catalog,
            extensions: RwLock::new(self.extensions),
            settings: self.settings,
            pending: HashSet::new(),
            construction: Arc::new(ReentrantMutex::new(())),
        };

        // Beans may depend on each other; their keys count as known while
        // scanning.
        for class in &self.beans {
            let key = DependencyKey::for_type(class.type_key());
            let taken = container
                .namespaces
                .get(&Namespace::Application)
                .is_some_and(|r| r.contains(&key));
            if (taken && !container.settings.allow_override) || container.pending.contains(&key) {
                return Err(NazarError::AlreadyRegistered(AlreadyRegisteredError { key }));
            }
            container.pending.insert(key);
        }

        let mut scanned = Vec::with_capacity(self.beans.len());
        for class in self.beans {
            let mut bean = Bean::from_class(class);
            container.scan(&mut bean, None)?;
            scanned.push(Arc::new(bean));
        }
        container.pending.clear();

        for bean in scanned {
            container.register_bean(bean)?;
        }

        container.validate()?;

        info!("Container built successfully");
        Ok(container)
    }

    // ── Internal ──

    fn value_in<T: Send + Sync + 'static>(
        self,
        namespace: Namespace,
        key: DependencyKey,
        service: T,
    ) -> Self {
        let service = value(service);
        self.register_internal(
            namespace,
            key,
            Lifetime::Singleton,
            Arc::new(move |_: &dyn Resolver| Ok(Arc::clone(&service))),
            vec![],
        )
    }

    fn register_internal(
        mut self,
        namespace: Namespace,
        key: DependencyKey,
        lifetime: Lifetime,
        factory: FactoryFn,
        dependencies: Vec<DependencyKey>,
    ) -> Self {
        let registration = Registration {
            key,
            factory,
            lifetime,
            dependencies,
        };
        let allow_override = self.settings.allow_override;
        if let Err(err) = self
            .namespaces
            .entry(namespace)
            .or_default()
            .register(registration, allow_override)
        {
            self.errors.push(err);
        }
        self
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

/// Immutable, thread-safe container.
///
/// Created by [`ContainerBuilder::build()`]. Extensions referenced by a
/// hook are installed lazily the first time a scan needs them.
pub struct Container {
    namespaces: HashMap<Namespace, Registry>,
    catalog: HookCatalog,
    extensions: RwLock<HashMap<ExtensionKey, Arc<dyn Extension>>>,
    settings: ScanSettings,
    /// Bean keys registered once the build-time scans are done.
    pending: HashSet<DependencyKey>,
    /// Held while a bean singleton is being built.
    construction: Arc<ReentrantMutex<()>>,
}

impl Container {
    /// Create a new builder.
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    /// Resolve an application service by type.
    ///
    /// ```rust,ignore
    /// let db: Arc<Database> = container.resolve()?;
    /// ```
    pub fn resolve<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolve_typed(&Namespace::Application, DependencyKey::of::<T>())
    }

    /// Resolve a named application service.
    pub fn resolve_named<T: Send + Sync + 'static>(&self, name: &'static str) -> Result<Arc<T>> {
        self.resolve_typed(&Namespace::Application, DependencyKey::named::<T>(name))
    }

    /// Resolve a service from an extension's namespace.
    pub fn resolve_in<T: Send + Sync + 'static>(
        &self,
        extension: ExtensionKey,
        name: Option<&'static str>,
    ) -> Result<Arc<T>> {
        let key = match name {
            Some(name) => DependencyKey::named::<T>(name),
            None => DependencyKey::of::<T>(),
        };
        self.resolve_typed(&Namespace::Extension(extension), key)
    }

    /// Scans `bean` against this container.
    pub fn scan(&self, bean: &mut Bean, preset: Option<Box<dyn Handler>>) -> Result<()> {
        BeanScanner::scan(self, bean, preset)
    }

    /// Creates and scans a bean after the container was built.
    ///
    /// `preset` is used as the handler of the installing extension when it
    /// takes part in the scan.
    pub fn install_bean(
        &self,
        class: Arc<ClassDescriptor>,
        source: BeanSource,
        installer: BeanInstaller,
        preset: Option<Box<dyn Handler>>,
    ) -> Result<Arc<Bean>> {
        let mut bean = Bean::new(class, source, installer);
        self.scan(&mut bean, preset)?;
        Ok(Arc::new(bean))
    }

    /// The installed extension for `key`, if any.
    pub fn extension(&self, key: &ExtensionKey) -> Option<Arc<dyn Extension>> {
        self.extensions.read().get(key).cloned()
    }

    /// Keys of all installed extensions, sorted by type name.
    pub fn installed_extensions(&self) -> Vec<ExtensionKey> {
        let mut keys: Vec<ExtensionKey> = self.extensions.read().keys().copied().collect();
        keys.sort_by_key(|k| k.type_name());
        keys
    }

    fn resolve_typed<T: Send + Sync + 'static>(
        &self,
        namespace: &Namespace,
        key: DependencyKey,
    ) -> Result<Arc<T>> {
        trace!(key = %key, namespace = %namespace, "Resolving");
        let service = self.resolve_key(namespace, &key)?;
        downcast(&key, service)
    }

    fn register_bean(&mut self, bean: Arc<Bean>) -> Result<()> {
        let key = DependencyKey::for_type(bean.class().type_key());
        let dependencies = bean.service_dependencies();
        let cell: Arc<OnceCell<Value>> = Arc::new(OnceCell::new());
        let construction = Arc::clone(&self.construction);

        let factory: FactoryFn = Arc::new(move |resolver: &dyn Resolver| {
            if let Some(instance) = cell.get() {
                return Ok(Arc::clone(instance));
            }
            // One thread builds beans at a time, so two threads never hold
            // the two halves of an optional cycle.
            let _construction = construction.lock();
            cell.get_or_try_init(|| bean.instantiate(resolver)).cloned()
        });

        self.namespaces.entry(Namespace::Application).or_default().register(
            Registration {
                key,
                factory,
                lifetime: Lifetime::Singleton,
                dependencies,
            },
            self.settings.allow_override,
        )
    }

    fn validate(&self) -> Result<()> {
        let Some(registry) = self.namespaces.get(&Namespace::Application) else {
            return Ok(());
        };

        let dep_infos: HashMap<DependencyKey, DependencyInfo> = registry
            .all_registrations()
            .iter()
            .map(|(key, reg)| {
                (
                    key.clone(),
                    DependencyInfo {
                        dependencies: reg.dependencies.clone(),
                    },
                )
            })
            .collect();

        GraphValidator::new(dep_infos).validate()
    }

    fn not_registered(&self, namespace: &Namespace, key: &DependencyKey) -> NazarError {
        let names: Vec<String> = self
            .namespaces
            .get(namespace)
            .map(Registry::registered_names)
            .unwrap_or_default();
        let available: Vec<&str> = names.iter().map(String::as_str).collect();

        NazarError::NotRegistered(NotRegisteredError {
            requested: key.clone(),
            required_by: None,
            suggestions: suggest_similar(key.type_name(), &available, 3),
        })
    }
}

impl Resolver for Container {
    fn resolve_key(&self, namespace: &Namespace, key: &DependencyKey) -> Result<Value> {
        let registration = self
            .namespaces
            .get(namespace)
            .and_then(|registry| registry.get(key))
            .ok_or_else(|| self.not_registered(namespace, key))?;

        let _in_flight = InFlight::enter(*namespace, key)?;
        (registration.factory)(self)
    }
}

thread_local! {
    /// Services being resolved on this thread, outermost first.
    static RESOLVING: RefCell<Vec<(Namespace, DependencyKey)>> = const { RefCell::new(Vec::new()) };
}

/// Marks a service as being resolved on the current thread until dropped.
///
/// Re-entering a service that is still in flight is a cycle: it fails
/// with [`NazarError::CircularDependency`] instead of waiting on its own
/// singleton cell.
struct InFlight;

impl InFlight {
    fn enter(namespace: Namespace, key: &DependencyKey) -> Result<Self> {
        RESOLVING.with_borrow_mut(|stack| {
            if let Some(start) = stack.iter().position(|(ns, k)| *ns == namespace && k == key) {
                let mut chain: Vec<DependencyKey> =
                    stack[start..].iter().map(|(_, k)| k.clone()).collect();
                chain.push(key.clone());
                warn!(cycle = ?chain, "Circular dependency while resolving");
                return Err(NazarError::CircularDependency(CircularDependencyError { chain }));
            }
            stack.push((namespace, key.clone()));
            Ok(InFlight)
        })
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        RESOLVING.with_borrow_mut(|stack| {
            stack.pop();
        });
    }
}

impl ExtensionHost for Container {
    fn catalog(&self) -> &HookCatalog {
        &self.catalog
    }

    fn settings(&self) -> &ScanSettings {
        &self.settings
    }

    fn resolve_or_install_extension(&self, key: &ExtensionKey) -> Result<Arc<dyn Extension>> {
        if let Some(extension) = self.extensions.read().get(key) {
            return Ok(Arc::clone(extension));
        }

        let factory = key
            .factory()
            .ok_or(NazarError::MissingConstructor { extension: *key })?;

        let mut extensions = self.extensions.write();
        let extension = extensions.entry(*key).or_insert_with(|| {
            debug!(extension = %key, "Installing extension");
            factory()
        });
        Ok(Arc::clone(extension))
    }

    fn lookup_service(
        &self,
        namespace: &Namespace,
        key: &DependencyKey,
        required: bool,
    ) -> Result<Binding> {
        let known = self
            .namespaces
            .get(namespace)
            .is_some_and(|registry| registry.contains(key))
            || (*namespace == Namespace::Application && self.pending.contains(key));

        if !known && required {
            return Err(self.not_registered(namespace, key));
        }

        trace!(key = %key, namespace = %namespace, known, "Service binding");
        Ok(Binding::Service {
            key: key.clone(),
            namespace: *namespace,
            required,
        })
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: usize = self.namespaces.values().map(Registry::len).sum();
        f.debug_struct("Container")
            .field("registered", &registered)
            .field("extensions", &self.extensions.read().len())
            .finish()
    }
}

fn downcast<T: Send + Sync + 'static>(key: &DependencyKey, service: Value) -> Result<Arc<T>> {
    service.downcast::<T>().map_err(|_| {
        NazarError::invocation(
            key.to_string(),
            format!("type mismatch: expected {}", type_name::<T>()),
        )
    })
}

// ═══════════════════════════════════════════
// Free functions for use inside factories
// ═══════════════════════════════════════════

/// Resolve a typed application service from a [`Resolver`].
///
/// Use this inside factory closures:
///
/// ```rust,ignore
/// builder.singleton_with::<MyService>(|r| {
///     let db: Arc<Database> = nazar_core::container::resolve(r)?;
///     Ok(MyService { db })
/// })
/// ```
pub fn resolve<T: Send + Sync + 'static>(resolver: &dyn Resolver) -> Result<Arc<T>> {
    let key = DependencyKey::of::<T>();
    let service = resolver.resolve_key(&Namespace::Application, &key)?;
    downcast(&key, service)
}

/// Resolve a named application service from a [`Resolver`].
pub fn resolve_named<T: Send + Sync + 'static>(
    resolver: &dyn Resolver,
    name: &'static str,
) -> Result<Arc<T>> {
    let key = DependencyKey::named::<T>(name);
    let service = resolver.resolve_key(&Namespace::Application, &key)?;
    downcast(&key, service)
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::{resolve, resolve_named, Container, ContainerBuilder};
    pub use crate::bean::{Bean, BeanInstaller, BeanSource};
    pub use crate::binding::{Binding, BindingKind, BindingSlot, Namespace};
    pub use crate::class::{
        arg, registered_classes, value, ClassDescriptor, ClassRegistration,
        ConstructorDescriptor, FieldDescriptor, MethodDescriptor, ParameterDescriptor, Value,
        Visibility,
    };
    pub use crate::error::{NazarError, Result};
    pub use crate::extension::{Extension, ExtensionHost, Handler, ScanContext};
    pub use crate::key::{DependencyKey, ExtensionKey, MarkerKey, TypeKey};
    pub use crate::marker::{FieldCaps, HookSpec, Inject, Marker, MarkerInstance};
    pub use crate::operation::{AccessMode, Operation, OperationId, Operator};
    pub use crate::registry::Resolver;
    pub use crate::scanner::{BeanScanner, MatchedField, MatchedMethod};
    pub use crate::settings::ScanSettings;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
