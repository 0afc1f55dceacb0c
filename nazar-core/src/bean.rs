//! Beans: a class plus the operations a scan derived from it.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::binding::{Binding, Namespace};
use crate::class::{ClassDescriptor, Value};
use crate::error::{NazarError, Result};
use crate::key::{DependencyKey, ExtensionKey};
use crate::operation::{AccessMode, Operation, OperationId, Operator};
use crate::registry::Resolver;

/// Where a bean's instance comes from.
#[derive(Clone)]
pub enum BeanSource {
    /// Built through the class's eligible constructor.
    Class,
    /// A ready-made instance.
    Instance(Value),
    /// No instance; only static members are usable.
    SourceLess,
}

impl fmt::Debug for BeanSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BeanSource::Class => write!(f, "Class"),
            BeanSource::Instance(_) => write!(f, "Instance(..)"),
            BeanSource::SourceLess => write!(f, "SourceLess"),
        }
    }
}

/// Who installed a bean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeanInstaller {
    Application,
    Extension(ExtensionKey),
}

impl BeanInstaller {
    /// The operator of operations the bean itself owns.
    pub fn operator(self) -> Operator {
        match self {
            BeanInstaller::Application => Operator::Application,
            BeanInstaller::Extension(key) => Operator::Extension(key),
        }
    }

    /// The namespace the bean's services are looked up in.
    pub fn namespace(self) -> Namespace {
        match self {
            BeanInstaller::Application => Namespace::Application,
            BeanInstaller::Extension(key) => Namespace::Extension(key),
        }
    }
}

/// A bean and its operations.
///
/// Operations are only added while the bean is being scanned; after that
/// the bean is read-only and can be shared.
pub struct Bean {
    class: Arc<ClassDescriptor>,
    source: BeanSource,
    installer: BeanInstaller,
    pub(crate) operations: Vec<Operation>,
    pub(crate) scanned: bool,
    pub(crate) names: Mutex<Option<Arc<BTreeMap<OperationId, String>>>>,
}

impl Bean {
    pub fn new(class: Arc<ClassDescriptor>, source: BeanSource, installer: BeanInstaller) -> Self {
        Self {
            class,
            source,
            installer,
            operations: Vec::new(),
            scanned: false,
            names: Mutex::new(None),
        }
    }

    /// A class-sourced bean installed by the application.
    pub fn from_class(class: Arc<ClassDescriptor>) -> Self {
        Self::new(class, BeanSource::Class, BeanInstaller::Application)
    }

    pub fn class(&self) -> &Arc<ClassDescriptor> {
        &self.class
    }

    pub fn source(&self) -> &BeanSource {
        &self.source
    }

    pub fn installer(&self) -> BeanInstaller {
        self.installer
    }

    pub fn is_scanned(&self) -> bool {
        self.scanned
    }

    /// Operations in creation order; an operation's id is its index.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn operation(&self, id: OperationId) -> Option<&Operation> {
        self.operations.get(id.0)
    }

    /// The bean's own constructor operation.
    pub fn constructor(&self) -> Option<&Operation> {
        self.operations
            .iter()
            .find(|op| op.mode() == AccessMode::Construct && op.parent().is_none())
    }

    /// Operations nested under `id`, in creation order.
    pub fn children(&self, id: OperationId) -> Vec<OperationId> {
        self.operations
            .iter()
            .filter(|op| op.parent() == Some(id))
            .map(Operation::id)
            .collect()
    }

    /// Invokes operation `id` with the call-site arguments `args`.
    ///
    /// Parameters are produced from their bindings: constants as bound,
    /// arguments from `args`, nested operations by invoking them with the
    /// same `args`, services through `services`. An optional service that
    /// is missing, or still being built further up the call, is passed as
    /// null.
    pub fn invoke(
        &self,
        id: OperationId,
        services: &dyn Resolver,
        args: &[Option<Value>],
    ) -> Result<Option<Value>> {
        let operation = self.operation(id).ok_or_else(|| NazarError::UnknownOperation {
            class: self.class.type_key(),
            id,
        })?;

        let expected = operation.contract().arguments.len();
        if args.len() != expected {
            return Err(NazarError::ArityMismatch {
                target: operation.target(),
                expected,
                actual: args.len(),
            });
        }

        let mut params = Vec::with_capacity(operation.bindings().len());
        for (index, binding) in operation.bindings().iter().enumerate() {
            let value = match binding {
                None => {
                    return Err(NazarError::invocation(
                        operation.target(),
                        format!("parameter {index} is not bound"),
                    ));
                }
                Some(Binding::Constant(constant)) => constant.clone(),
                Some(Binding::Argument(argument)) => args.get(*argument).cloned().flatten(),
                Some(Binding::Operation(nested)) => self.invoke(*nested, services, args)?,
                Some(Binding::Service {
                    key,
                    namespace,
                    required,
                }) => match services.resolve_key(namespace, key) {
                    Ok(service) => Some(service),
                    Err(NazarError::NotRegistered(_) | NazarError::CircularDependency(_))
                        if !required =>
                    {
                        None
                    }
                    Err(err) => return Err(err),
                },
            };
            params.push(value);
        }

        trace!(operation = %operation.target(), "Invoking operation");
        operation.call(args, params)
    }

    /// Produces the bean's instance: the held instance, or the result of
    /// the constructor operation invoked with no arguments.
    pub fn instantiate(&self, services: &dyn Resolver) -> Result<Value> {
        match &self.source {
            BeanSource::Instance(instance) => Ok(Arc::clone(instance)),
            BeanSource::SourceLess => Err(NazarError::NoEligibleConstructor {
                class: self.class.type_key(),
                reason: "the bean has no source".to_string(),
            }),
            BeanSource::Class => {
                let constructor =
                    self.constructor()
                        .ok_or_else(|| NazarError::NoEligibleConstructor {
                            class: self.class.type_key(),
                            reason: "the bean has not been scanned".to_string(),
                        })?;
                let args = vec![None; constructor.contract().arguments.len()];
                self.invoke(constructor.id(), services, &args)?
                    .ok_or_else(|| {
                        NazarError::invocation(constructor.target(), "constructor returned null")
                    })
            }
        }
    }

    /// Required services the constructor chain depends on, in the
    /// application namespace.
    pub(crate) fn service_dependencies(&self) -> Vec<DependencyKey> {
        let mut out = Vec::new();
        let mut pending: Vec<OperationId> = self.constructor().map(Operation::id).into_iter().collect();

        while let Some(id) = pending.pop() {
            let Some(operation) = self.operation(id) else {
                continue;
            };
            for binding in operation.bindings().iter().flatten() {
                match binding {
                    Binding::Operation(nested) => pending.push(*nested),
                    Binding::Service {
                        key,
                        namespace: Namespace::Application,
                        required: true,
                    } if !out.contains(key) => out.push(key.clone()),
                    _ => {}
                }
            }
        }
        out
    }

    /// One line per operation: name, operator and binding kinds.
    pub fn describe(&self) -> String {
        let names = self.operation_names();
        let mut out = format!("bean {}", self.class.type_key());

        for operation in &self.operations {
            let name = names.get(&operation.id()).map_or("?", String::as_str);
            let bindings: Vec<String> = operation
                .bindings()
                .iter()
                .map(|binding| match binding {
                    None => "unbound".to_string(),
                    Some(Binding::Constant(None)) => "null".to_string(),
                    Some(Binding::Constant(Some(_))) => "constant".to_string(),
                    Some(Binding::Argument(index)) => format!("argument {index}"),
                    Some(Binding::Operation(nested)) => format!(
                        "operation {}",
                        names.get(nested).map_or("?", String::as_str)
                    ),
                    Some(Binding::Service { key, .. }) => format!("service {key}"),
                })
                .collect();

            let operator = match operation.operator() {
                Operator::Application => "application".to_string(),
                Operator::Extension(key) => key.type_key().short_name(),
            };
            out.push_str(&format!(
                "\n  {} {name} [{operator}] ({})",
                operation.id(),
                bindings.join(", ")
            ));
        }
        out
    }
}

impl fmt::Debug for Bean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bean")
            .field("class", &self.class.type_key())
            .field("source", &self.source)
            .field("installer", &self.installer)
            .field("operations", &self.operations.len())
            .field("scanned", &self.scanned)
            .finish()
    }
}
