//! Parameter bindings and the slot extensions bind them through.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::class::{ClassDescriptor, MethodDescriptor, ParameterDescriptor, Value};
use crate::error::{InvalidArgumentError, NazarError, Result};
use crate::key::{DependencyKey, ExtensionKey, TypeKey};
use crate::marker::MarkerInstance;
use crate::operation::{self, Operation, OperationId, Operator};
use crate::scanner::{select_constructor, OperationSink};

/// The service namespace a lookup goes to.
///
/// Beans installed by the application see the application namespace; beans
/// installed by an extension see that extension's namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    Application,
    Extension(ExtensionKey),
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Application => write!(f, "application"),
            Namespace::Extension(key) => write!(f, "extension {key}"),
        }
    }
}

/// How a parameter gets its value at invocation time.
#[derive(Clone)]
pub enum Binding {
    /// A fixed value; `None` is null.
    Constant(Option<Value>),
    /// The call-site argument at this index.
    Argument(usize),
    /// The result of a nested operation of the same bean.
    Operation(OperationId),
    /// A service looked up when the operation is invoked.
    Service {
        key: DependencyKey,
        namespace: Namespace,
        required: bool,
    },
}

/// The variant of a [`Binding`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    Constant,
    Argument,
    Operation,
    Service,
}

impl BindingKind {
    pub fn name(self) -> &'static str {
        match self {
            BindingKind::Constant => "constant",
            BindingKind::Argument => "argument",
            BindingKind::Operation => "operation",
            BindingKind::Service => "service",
        }
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Binding {
    pub fn kind(&self) -> BindingKind {
        match self {
            Binding::Constant(_) => BindingKind::Constant,
            Binding::Argument(_) => BindingKind::Argument,
            Binding::Operation(_) => BindingKind::Operation,
            Binding::Service { .. } => BindingKind::Service,
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Constant(None) => write!(f, "Constant(null)"),
            Binding::Constant(Some(_)) => write!(f, "Constant(..)"),
            Binding::Argument(index) => write!(f, "Argument({index})"),
            Binding::Operation(id) => write!(f, "Operation({id})"),
            Binding::Service {
                key,
                namespace,
                required,
            } => f
                .debug_struct("Service")
                .field("key", key)
                .field("namespace", namespace)
                .field("required", required)
                .finish(),
        }
    }
}

// ═══════════════════════════════════════════
// BindingSlot
// ═══════════════════════════════════════════

/// One unbound parameter, handed to the extension that owns it.
///
/// Exactly one `bind_*` call must succeed before the handler returns; a
/// second one fails with [`NazarError::AlreadyBound`].
pub struct BindingSlot<'a> {
    sink: OperationSink<'a>,
    operation: OperationId,
    index: usize,
    parameter: ParameterDescriptor,
    marker: Option<MarkerInstance>,
    extension: ExtensionKey,
    namespace: Namespace,
}

impl<'a> BindingSlot<'a> {
    pub(crate) fn new(
        sink: OperationSink<'a>,
        operation: OperationId,
        index: usize,
        parameter: ParameterDescriptor,
        marker: Option<MarkerInstance>,
        extension: ExtensionKey,
        namespace: Namespace,
    ) -> Self {
        Self {
            sink,
            operation,
            index,
            parameter,
            marker,
            extension,
            namespace,
        }
    }

    pub fn parameter(&self) -> &ParameterDescriptor {
        &self.parameter
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The binding marker that routed the request here; `None` when the
    /// request came from a type-driven hook.
    pub fn marker(&self) -> Option<&MarkerInstance> {
        self.marker.as_ref()
    }

    pub fn extension(&self) -> ExtensionKey {
        self.extension
    }

    pub fn bean_class(&self) -> TypeKey {
        self.sink.bean.class().type_key()
    }

    pub fn operation(&self) -> &Operation {
        &self.sink.bean.operations[self.operation.0]
    }

    pub fn is_bound(&self) -> bool {
        self.operation().binding(self.index).is_some()
    }

    /// Binds a typed constant.
    pub fn bind_constant<T: Any + Send + Sync>(&mut self, value: T) -> Result<()> {
        self.bind_value(Arc::new(value))
    }

    /// Binds a type-erased constant, checked against the parameter type.
    pub fn bind_value(&mut self, value: Value) -> Result<()> {
        self.ensure_unbound()?;
        let expected = self.parameter.ty;

        if (*value).type_id() != expected.type_id() {
            let operation = self.operation().target();
            return Err(if expected.is_primitive() {
                NazarError::PrimitiveMismatch {
                    operation,
                    index: self.index,
                    expected,
                }
            } else {
                NazarError::ConstantTypeMismatch {
                    operation,
                    index: self.index,
                    expected,
                }
            });
        }

        self.commit(Binding::Constant(Some(value)))
    }

    /// Binds null. Rejected for primitive parameters.
    pub fn bind_null(&mut self) -> Result<()> {
        self.ensure_unbound()?;
        if self.parameter.ty.is_primitive() {
            return Err(NazarError::NullPrimitive {
                operation: self.operation().target(),
                index: self.index,
                expected: self.parameter.ty,
            });
        }
        self.commit(Binding::Constant(None))
    }

    /// Binds the call-site argument at `argument`.
    pub fn bind_argument(&mut self, argument: usize) -> Result<()> {
        self.ensure_unbound()?;
        let operation = self.operation();
        let argument_type = operation.contract().arguments.get(argument).copied();

        if argument_type != Some(self.parameter.ty) {
            return Err(NazarError::InvalidArgumentIndex(InvalidArgumentError {
                operation: operation.target(),
                parameter: self.index,
                argument,
                parameter_type: self.parameter.ty,
                argument_type,
            }));
        }

        self.commit(Binding::Argument(argument))
    }

    /// Binds the result of a static factory method. The nested operation
    /// inherits this operation's invocation contract and is resolved later.
    pub fn bind_factory(
        &mut self,
        class: &ClassDescriptor,
        method: &MethodDescriptor,
    ) -> Result<OperationId> {
        self.ensure_unbound()?;
        if method.returns != Some(self.parameter.ty) {
            return Err(NazarError::InvalidFactory {
                target: format!("{}::{}", class.type_key().short_name(), method.name),
                reason: format!("it does not return {}", self.parameter.ty),
            });
        }

        let id = self.sink.next_id();
        let nested = {
            let parent = self.operation();
            operation::build_factory(
                id,
                class,
                method,
                Operator::Extension(self.extension),
                (parent.id(), parent.contract()),
            )?
        };
        self.attach(nested)
    }

    /// Binds a new instance of `class`, built through its eligible
    /// constructor.
    pub fn bind_constructor(&mut self, class: &ClassDescriptor) -> Result<OperationId> {
        self.ensure_unbound()?;
        if class.type_key() != self.parameter.ty {
            return Err(NazarError::InvalidFactory {
                target: format!("{}::new", class.type_key().short_name()),
                reason: format!("it does not construct {}", self.parameter.ty),
            });
        }

        let constructor = select_constructor(class)?;
        let id = self.sink.next_id();
        let nested = {
            let parent = self.operation();
            operation::build_constructor(
                id,
                class,
                constructor,
                Operator::Extension(self.extension),
                Some((parent.id(), parent.contract())),
            )
        };
        self.attach(nested)
    }

    /// Binds a service from the bean's namespace.
    pub fn bind_service(&mut self, key: DependencyKey) -> Result<()> {
        self.ensure_unbound()?;
        let binding =
            self.sink
                .host
                .lookup_service(&self.namespace, &key, !self.parameter.optional)?;
        self.commit(binding)
    }

    fn attach(&mut self, nested: Operation) -> Result<OperationId> {
        let id = self.sink.push(nested);
        self.commit(Binding::Operation(id))?;
        Ok(id)
    }

    fn ensure_unbound(&self) -> Result<()> {
        match self.operation().binding(self.index) {
            Some(existing) => Err(NazarError::AlreadyBound {
                operation: self.operation().target(),
                index: self.index,
                existing: existing.kind().name(),
            }),
            None => Ok(()),
        }
    }

    fn commit(&mut self, binding: Binding) -> Result<()> {
        debug!(
            operation = %self.operation().target(),
            index = self.index,
            kind = %binding.kind(),
            "Parameter bound"
        );
        self.sink.bean.operations[self.operation.0].set_binding(self.index, binding)
    }
}

impl fmt::Debug for BindingSlot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingSlot")
            .field("operation", &self.operation)
            .field("index", &self.index)
            .field("parameter", &self.parameter.name)
            .field("extension", &self.extension)
            .finish()
    }
}
