//! Class descriptors: the member registry the scanner introspects.
//!
//! Rust has no runtime reflection, so a bean class is described once by an
//! explicit [`ClassDescriptor`]: its supertypes, constructors, fields and
//! methods, each member with its markers and a type-erased accessor. The
//! descriptor is the "resolve once, invoke many" registry; the scanner never
//! needs anything beyond it.
//!
//! # Examples
//! ```
//! use nazar_core::class::{arg, value, ClassDescriptor, ConstructorDescriptor, ParameterDescriptor, Visibility};
//!
//! struct Widget { id: i32 }
//!
//! let class = ClassDescriptor::builder::<Widget>()
//!     .constructor(
//!         ConstructorDescriptor::new(Visibility::Public, |args| {
//!             let id: i32 = *arg::<i32>(args, 0)?;
//!             Ok(Some(value(Widget { id })))
//!         })
//!         .param(ParameterDescriptor::of::<i32>("id")),
//!     )
//!     .build();
//!
//! assert_eq!(class.constructors().len(), 1);
//! ```

use std::any::{Any, TypeId, type_name};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{NazarError, Result};
use crate::key::{MarkerKey, TypeKey};
use crate::marker::{HookSpec, Marker, MarkerInstance};

/// A type-erased runtime value.
pub type Value = Arc<dyn Any + Send + Sync>;

/// A callable bound to exactly one member.
///
/// Receives the receiver (for instance members) followed by the member's
/// own arguments; `None` entries are nulls.
pub type Invoker = Arc<dyn Fn(&[Option<Value>]) -> Result<Option<Value>> + Send + Sync>;

/// Wraps `value` as a [`Value`].
pub fn value<T: Any + Send + Sync>(value: T) -> Value {
    Arc::new(value)
}

/// Borrows argument `index` as a `T`.
///
/// Helper for invokers; fails on a missing, null or mistyped argument.
pub fn arg<T: Any>(args: &[Option<Value>], index: usize) -> Result<&T> {
    match args.get(index) {
        None => Err(NazarError::ArityMismatch {
            target: "member accessor".to_string(),
            expected: index + 1,
            actual: args.len(),
        }),
        Some(None) => Err(NazarError::invocation(
            format!("argument {index}"),
            format!("expected {}, got null", type_name::<T>()),
        )),
        Some(Some(v)) => v.downcast_ref::<T>().ok_or_else(|| {
            NazarError::invocation(
                format!("argument {index}"),
                format!("expected {}", type_name::<T>()),
            )
        }),
    }
}

/// Member visibility, deciding override and access rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    Public,
    Protected,
    /// Visible within the declaring module only.
    Package,
    Private,
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Visibility::Public => write!(f, "public"),
            Visibility::Protected => write!(f, "protected"),
            Visibility::Package => write!(f, "package"),
            Visibility::Private => write!(f, "private"),
        }
    }
}

// ═══════════════════════════════════════════
// Members
// ═══════════════════════════════════════════

/// One parameter of a constructor or method.
#[derive(Debug, Clone)]
pub struct ParameterDescriptor {
    pub name: &'static str,
    pub ty: TypeKey,
    /// Declared as `Option<T>`: a missing service binds to null.
    pub optional: bool,
    /// Trailing variable-arity parameter, passed as a single value.
    pub variadic: bool,
    pub markers: Vec<MarkerInstance>,
}

impl ParameterDescriptor {
    pub fn of<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            name,
            ty: TypeKey::of::<T>(),
            optional: false,
            variadic: false,
            markers: Vec::new(),
        }
    }

    /// A parameter of type `Option<T>`; its service key is derived from `T`.
    pub fn optional<T: ?Sized + 'static>(name: &'static str) -> Self {
        Self {
            optional: true,
            ..Self::of::<T>(name)
        }
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn marker<M: Marker>(mut self, marker: M) -> Self {
        self.markers.push(MarkerInstance::new(marker));
        self
    }

    pub fn marker_instance(mut self, marker: MarkerInstance) -> Self {
        self.markers.push(marker);
        self
    }
}

/// A constructor.
#[derive(Clone)]
pub struct ConstructorDescriptor {
    pub visibility: Visibility,
    pub params: Vec<ParameterDescriptor>,
    pub markers: Vec<MarkerInstance>,
    pub invoker: Invoker,
}

impl ConstructorDescriptor {
    pub fn new(
        visibility: Visibility,
        invoker: impl Fn(&[Option<Value>]) -> Result<Option<Value>> + Send + Sync + 'static,
    ) -> Self {
        Self {
            visibility,
            params: Vec::new(),
            markers: Vec::new(),
            invoker: Arc::new(invoker),
        }
    }

    pub fn param(mut self, param: ParameterDescriptor) -> Self {
        self.params.push(param);
        self
    }

    pub fn marker<M: Marker>(mut self, marker: M) -> Self {
        self.markers.push(MarkerInstance::new(marker));
        self
    }

    pub fn has_marker<M: Marker>(&self) -> bool {
        self.markers.iter().any(|m| m.is::<M>())
    }
}

impl fmt::Debug for ConstructorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDescriptor")
            .field("visibility", &self.visibility)
            .field("params", &self.params)
            .field("markers", &self.markers)
            .finish()
    }
}

/// A field with optional getter and setter accessors.
///
/// The getter receives `[receiver]`, the setter `[receiver, value]`;
/// static fields omit the receiver.
#[derive(Clone)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub ty: TypeKey,
    pub visibility: Visibility,
    pub is_static: bool,
    pub markers: Vec<MarkerInstance>,
    pub getter: Option<Invoker>,
    pub setter: Option<Invoker>,
}

impl FieldDescriptor {
    pub fn new<T: ?Sized + 'static>(name: &'static str, visibility: Visibility) -> Self {
        Self {
            name,
            ty: TypeKey::of::<T>(),
            visibility,
            is_static: false,
            markers: Vec::new(),
            getter: None,
            setter: None,
        }
    }

    pub fn static_field(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn marker<M: Marker>(mut self, marker: M) -> Self {
        self.markers.push(MarkerInstance::new(marker));
        self
    }

    pub fn marker_instance(mut self, marker: MarkerInstance) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn getter(
        mut self,
        getter: impl Fn(&[Option<Value>]) -> Result<Option<Value>> + Send + Sync + 'static,
    ) -> Self {
        self.getter = Some(Arc::new(getter));
        self
    }

    pub fn setter(
        mut self,
        setter: impl Fn(&[Option<Value>]) -> Result<Option<Value>> + Send + Sync + 'static,
    ) -> Self {
        self.setter = Some(Arc::new(setter));
        self
    }
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("visibility", &self.visibility)
            .field("is_static", &self.is_static)
            .field("markers", &self.markers)
            .finish()
    }
}

/// A method. Abstract methods have no invoker.
#[derive(Clone)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub visibility: Visibility,
    pub is_static: bool,
    /// Interface method with a default body.
    pub is_default: bool,
    pub params: Vec<ParameterDescriptor>,
    pub returns: Option<TypeKey>,
    pub markers: Vec<MarkerInstance>,
    pub invoker: Option<Invoker>,
}

impl MethodDescriptor {
    pub fn new(name: &'static str, visibility: Visibility) -> Self {
        Self {
            name,
            visibility,
            is_static: false,
            is_default: false,
            params: Vec::new(),
            returns: None,
            markers: Vec::new(),
            invoker: None,
        }
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn default_method(mut self) -> Self {
        self.is_default = true;
        self
    }

    pub fn param(mut self, param: ParameterDescriptor) -> Self {
        self.params.push(param);
        self
    }

    pub fn returns<T: ?Sized + 'static>(mut self) -> Self {
        self.returns = Some(TypeKey::of::<T>());
        self
    }

    pub fn marker<M: Marker>(mut self, marker: M) -> Self {
        self.markers.push(MarkerInstance::new(marker));
        self
    }

    pub fn marker_instance(mut self, marker: MarkerInstance) -> Self {
        self.markers.push(marker);
        self
    }

    pub fn invoker(
        mut self,
        invoker: impl Fn(&[Option<Value>]) -> Result<Option<Value>> + Send + Sync + 'static,
    ) -> Self {
        self.invoker = Some(Arc::new(invoker));
        self
    }

    /// Name and parameter types; what overriding is decided on.
    pub fn signature(&self) -> MethodSignature {
        MethodSignature {
            name: self.name,
            params: self.params.iter().map(|p| p.ty.type_id()).collect(),
        }
    }
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("is_static", &self.is_static)
            .field("is_default", &self.is_default)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .field("markers", &self.markers)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub name: &'static str,
    pub params: Vec<TypeId>,
}

// ═══════════════════════════════════════════
// ClassDescriptor
// ═══════════════════════════════════════════

/// Everything the scanner knows about one bean class.
#[derive(Debug)]
pub struct ClassDescriptor {
    ty: TypeKey,
    superclass: Option<Arc<ClassDescriptor>>,
    interfaces: Vec<Arc<ClassDescriptor>>,
    is_interface: bool,
    markers: Vec<MarkerInstance>,
    hook_declarations: Vec<(MarkerKey, HookSpec)>,
    opens_to: Vec<&'static str>,
    constructors: Vec<ConstructorDescriptor>,
    fields: Vec<FieldDescriptor>,
    methods: Vec<MethodDescriptor>,
}

impl ClassDescriptor {
    pub fn builder<T: ?Sized + 'static>() -> ClassBuilder {
        ClassBuilder::new(TypeKey::of::<T>(), false)
    }

    /// Starts an interface descriptor; only its default methods are scanned.
    pub fn interface<T: ?Sized + 'static>() -> ClassBuilder {
        ClassBuilder::new(TypeKey::of::<T>(), true)
    }

    #[inline]
    pub fn type_key(&self) -> TypeKey {
        self.ty
    }

    pub fn superclass(&self) -> Option<&Arc<ClassDescriptor>> {
        self.superclass.as_ref()
    }

    pub fn interfaces(&self) -> &[Arc<ClassDescriptor>] {
        &self.interfaces
    }

    pub fn is_interface(&self) -> bool {
        self.is_interface
    }

    pub fn markers(&self) -> &[MarkerInstance] {
        &self.markers
    }

    pub fn hook_declarations(&self) -> &[(MarkerKey, HookSpec)] {
        &self.hook_declarations
    }

    pub fn constructors(&self) -> &[ConstructorDescriptor] {
        &self.constructors
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    /// The crate the class was declared in.
    pub fn module(&self) -> &'static str {
        self.ty.module()
    }

    pub fn package(&self) -> &'static str {
        self.ty.package()
    }

    /// Whether non-public members may be reached from `module`.
    pub fn is_open_to(&self, module: &str) -> bool {
        self.module() == module || self.opens_to.iter().any(|m| *m == module)
    }

    /// The class followed by its superclasses, most derived first.
    pub fn hierarchy(self: &Arc<Self>) -> Vec<Arc<ClassDescriptor>> {
        let mut chain = vec![Arc::clone(self)];
        let mut current = self.superclass.clone();
        while let Some(class) = current {
            current = class.superclass.clone();
            chain.push(class);
        }
        chain
    }

    /// All interfaces implemented anywhere in the hierarchy, depth first,
    /// each listed once.
    pub fn all_interfaces(self: &Arc<Self>) -> Vec<Arc<ClassDescriptor>> {
        fn visit(
            iface: &Arc<ClassDescriptor>,
            seen: &mut HashSet<TypeKey>,
            out: &mut Vec<Arc<ClassDescriptor>>,
        ) {
            if !seen.insert(iface.ty) {
                return;
            }
            out.push(Arc::clone(iface));
            for parent in &iface.interfaces {
                visit(parent, seen, out);
            }
        }

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for class in self.hierarchy() {
            for iface in &class.interfaces {
                visit(iface, &mut seen, &mut out);
            }
        }
        out
    }
}

/// Builder for [`ClassDescriptor`].
pub struct ClassBuilder {
    class: ClassDescriptor,
}

impl ClassBuilder {
    fn new(ty: TypeKey, is_interface: bool) -> Self {
        Self {
            class: ClassDescriptor {
                ty,
                superclass: None,
                interfaces: Vec::new(),
                is_interface,
                markers: Vec::new(),
                hook_declarations: Vec::new(),
                opens_to: Vec::new(),
                constructors: Vec::new(),
                fields: Vec::new(),
                methods: Vec::new(),
            },
        }
    }

    pub fn extends(mut self, superclass: Arc<ClassDescriptor>) -> Self {
        self.class.superclass = Some(superclass);
        self
    }

    pub fn implements(mut self, interface: Arc<ClassDescriptor>) -> Self {
        self.class.interfaces.push(interface);
        self
    }

    pub fn marker<M: Marker>(mut self, marker: M) -> Self {
        self.class.markers.push(MarkerInstance::new(marker));
        self
    }

    /// Declares, at this level of the hierarchy, which extension handles `M`.
    pub fn declare_hook<M: Marker>(self, spec: HookSpec) -> Self {
        self.declare_hook_for(MarkerKey::of::<M>(), spec)
    }

    pub fn declare_hook_for(mut self, marker: MarkerKey, spec: HookSpec) -> Self {
        self.class.hook_declarations.push((marker, spec));
        self
    }

    /// Grants extensions from `module` access to non-public members.
    pub fn opens_to(mut self, module: &'static str) -> Self {
        self.class.opens_to.push(module);
        self
    }

    pub fn constructor(mut self, constructor: ConstructorDescriptor) -> Self {
        self.class.constructors.push(constructor);
        self
    }

    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.class.fields.push(field);
        self
    }

    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.class.methods.push(method);
        self
    }

    pub fn build(self) -> Arc<ClassDescriptor> {
        Arc::new(self.class)
    }
}

// ═══════════════════════════════════════════
// Build-time registration
// ═══════════════════════════════════════════

/// A bean class submitted with `inventory::submit!`.
///
/// ```rust,ignore
/// inventory::submit! {
///     ClassRegistration::new(widget_class)
/// }
/// ```
pub struct ClassRegistration {
    describe: fn() -> Arc<ClassDescriptor>,
}

impl ClassRegistration {
    pub const fn new(describe: fn() -> Arc<ClassDescriptor>) -> Self {
        Self { describe }
    }
}

inventory::collect!(ClassRegistration);

/// All submitted classes, ordered by type name.
pub fn registered_classes() -> Vec<Arc<ClassDescriptor>> {
    let mut classes: Vec<Arc<ClassDescriptor>> = inventory::iter::<ClassRegistration>
        .into_iter()
        .map(|registration| (registration.describe)())
        .collect();
    classes.sort_by_key(|class| class.type_key().type_name());
    classes
}
