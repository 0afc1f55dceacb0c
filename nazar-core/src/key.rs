//! Identification keys.
//!
//! Every identity the scanner deals with is a Rust type seen through a
//! key: [`TypeKey`] for classes and parameter types, [`MarkerKey`] for
//! marker types, [`ExtensionKey`] for extensions and [`DependencyKey`]
//! for services in a namespace.

use std::any::{TypeId, type_name};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use nazar_support::rendering::{crate_of, package_of, shorten_type_name};

use crate::extension::Extension;
use crate::marker::{HookSpec, Marker};

// ═══════════════════════════════════════════
// TypeKey
// ═══════════════════════════════════════════

/// Identity of a Rust type as seen by the scanner.
///
/// # Examples
/// ```
/// use nazar_core::key::TypeKey;
///
/// let key = TypeKey::of::<i32>();
/// assert!(key.is_primitive());
/// assert!(!TypeKey::of::<String>().is_primitive());
/// ```
#[derive(Clone, Copy)]
pub struct TypeKey {
    type_id: TypeId,
    type_name: &'static str,
}

impl TypeKey {
    /// Creates a key for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }

    /// Creates a key from a raw [`TypeId`] and type name.
    ///
    /// Prefer [`TypeKey::of`]; this exists for generated registries.
    #[inline]
    pub fn from_raw(type_id: TypeId, type_name: &'static str) -> Self {
        Self { type_id, type_name }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Short display name without module paths.
    pub fn short_name(&self) -> String {
        shorten_type_name(self.type_name)
    }

    /// The deployable unit (crate) the type was declared in.
    pub fn module(&self) -> &'static str {
        crate_of(self.type_name)
    }

    /// The module path the type was declared in.
    pub fn package(&self) -> &'static str {
        package_of(self.type_name)
    }

    /// Returns `true` for primitive scalars, which can never hold "null".
    pub fn is_primitive(&self) -> bool {
        PRIMITIVES.iter().any(|id| id() == self.type_id)
    }
}

const PRIMITIVES: [fn() -> TypeId; 17] = [
    TypeId::of::<bool>,
    TypeId::of::<char>,
    TypeId::of::<i8>,
    TypeId::of::<i16>,
    TypeId::of::<i32>,
    TypeId::of::<i64>,
    TypeId::of::<i128>,
    TypeId::of::<isize>,
    TypeId::of::<u8>,
    TypeId::of::<u16>,
    TypeId::of::<u32>,
    TypeId::of::<u64>,
    TypeId::of::<u128>,
    TypeId::of::<usize>,
    TypeId::of::<f32>,
    TypeId::of::<f64>,
    TypeId::of::<()>,
];

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeKey({})", self.type_name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

// ═══════════════════════════════════════════
// MarkerKey
// ═══════════════════════════════════════════

/// Identity of a marker type.
///
/// Besides the type identity, the key carries the marker's own hook
/// declaration so the catalog can resolve it without knowing `M`.
#[derive(Clone, Copy)]
pub struct MarkerKey {
    ty: TypeKey,
    hook: fn() -> Option<HookSpec>,
}

impl MarkerKey {
    /// Creates a key for marker type `M`.
    #[inline]
    pub fn of<M: Marker>() -> Self {
        Self {
            ty: TypeKey::of::<M>(),
            hook: M::hook,
        }
    }

    /// Creates a key from raw parts.
    ///
    /// Used by registries generated outside of Rust's type system, where
    /// the declared type name (and therefore crate) is supplied explicitly.
    #[inline]
    pub fn from_raw(
        type_id: TypeId,
        type_name: &'static str,
        hook: fn() -> Option<HookSpec>,
    ) -> Self {
        Self {
            ty: TypeKey::from_raw(type_id, type_name),
            hook,
        }
    }

    #[inline]
    pub fn type_key(&self) -> TypeKey {
        self.ty
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.ty.type_name()
    }

    pub fn module(&self) -> &'static str {
        self.ty.module()
    }

    /// The hook the marker type declares for itself, if any.
    pub fn declared_hook(&self) -> Option<HookSpec> {
        (self.hook)()
    }
}

impl PartialEq for MarkerKey {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
    }
}

impl Eq for MarkerKey {}

impl Hash for MarkerKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ty.hash(state);
    }
}

impl fmt::Debug for MarkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MarkerKey({})", self.ty.type_name())
    }
}

impl fmt::Display for MarkerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#[{}]", self.ty.short_name())
    }
}

// ═══════════════════════════════════════════
// ExtensionKey
// ═══════════════════════════════════════════

/// Constructor used by the container to install an extension on demand.
pub type ExtensionFactory = fn() -> Arc<dyn Extension>;

/// Identity of an extension type.
#[derive(Clone, Copy)]
pub struct ExtensionKey {
    ty: TypeKey,
    factory: Option<ExtensionFactory>,
}

impl ExtensionKey {
    /// Creates a key for an extension that can be installed with `E::default()`.
    #[inline]
    pub fn of<E: Extension + Default>() -> Self {
        fn construct<E: Extension + Default>() -> Arc<dyn Extension> {
            Arc::new(E::default())
        }

        Self {
            ty: TypeKey::of::<E>(),
            factory: Some(construct::<E>),
        }
    }

    /// Creates a key for an extension with no no-argument constructor.
    ///
    /// Such an extension must be installed explicitly before any scan
    /// activates it.
    #[inline]
    pub fn without_constructor<E: Extension>() -> Self {
        Self {
            ty: TypeKey::of::<E>(),
            factory: None,
        }
    }

    /// Creates a key from raw parts.
    #[inline]
    pub fn from_raw(
        type_id: TypeId,
        type_name: &'static str,
        factory: Option<ExtensionFactory>,
    ) -> Self {
        Self {
            ty: TypeKey::from_raw(type_id, type_name),
            factory,
        }
    }

    #[inline]
    pub fn type_key(&self) -> TypeKey {
        self.ty
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.ty.type_name()
    }

    pub fn module(&self) -> &'static str {
        self.ty.module()
    }

    #[inline]
    pub fn factory(&self) -> Option<ExtensionFactory> {
        self.factory
    }
}

impl PartialEq for ExtensionKey {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
    }
}

impl Eq for ExtensionKey {}

impl Hash for ExtensionKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ty.hash(state);
    }
}

impl fmt::Debug for ExtensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExtensionKey({})", self.ty.type_name())
    }
}

impl fmt::Display for ExtensionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ty.type_name())
    }
}

// ═══════════════════════════════════════════
// DependencyKey
// ═══════════════════════════════════════════

/// Uniquely identifies a service in a namespace.
///
/// Each service is identified by its Rust type ([`TypeId`]) and an
/// optional name for cases where multiple instances of the same type
/// are needed.
///
/// # Examples
/// ```
/// use nazar_core::key::DependencyKey;
///
/// let key = DependencyKey::of::<String>();
/// assert_eq!(key.type_name(), "alloc::string::String");
/// assert_eq!(key.name(), None);
///
/// let key = DependencyKey::named::<String>("database_url");
/// assert_eq!(key.name(), Some("database_url"));
/// ```
#[derive(Clone)]
pub struct DependencyKey {
    type_id: TypeId,
    type_name: &'static str,
    name: Option<&'static str>,
}

impl DependencyKey {
    /// Creates a key for type `T`.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            name: None,
        }
    }

    /// Creates a named key for type `T`.
    ///
    /// ```
    /// use nazar_core::key::DependencyKey;
    ///
    /// let primary = DependencyKey::named::<String>("primary_db");
    /// let replica = DependencyKey::named::<String>("replica_db");
    /// assert_ne!(primary, replica);
    /// ```
    #[inline]
    pub fn named<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            name: Some(name),
        }
    }

    /// Derives the service key of a parameter or class type.
    #[inline]
    pub fn for_type(ty: TypeKey) -> Self {
        Self {
            type_id: ty.type_id(),
            type_name: ty.type_name(),
            name: None,
        }
    }

    /// Returns a copy of this key carrying `name`.
    #[inline]
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns the human-readable type name.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the optional name for named bindings.
    #[inline]
    pub fn name(&self) -> Option<&'static str> {
        self.name
    }
}

// Two keys are equal when both TypeId and name match.
impl PartialEq for DependencyKey {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.name == other.name
    }
}

impl Eq for DependencyKey {}

impl Hash for DependencyKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.name.hash(state);
    }
}

impl fmt::Debug for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "DependencyKey({}, name={:?})", self.type_name, name),
            None => write!(f, "DependencyKey({})", self.type_name),
        }
    }
}

impl fmt::Display for DependencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => write!(f, "{} (name={:?})", self.type_name, name),
            None => write!(f, "{}", self.type_name),
        }
    }
}
