//! Operations: invocable units synthesized from members.
//!
//! An [`Operation`] wraps a [`MemberAccessor`] for exactly one member, an
//! [`InvocationContract`] describing the call site, and one write-once
//! binding slot per member parameter. Operations live in their bean's
//! operation list and are addressed by [`OperationId`].
//!
//! # Invocation contract
//! The call-site arguments of an operation are derived from the member:
//!
//! ```text
//! constructor  Widget(i32)          (i32)            -> Widget
//! method       fn run(&self, u8)    (Widget, u8)     -> ret
//! static fn    fn make(u8)          (u8)             -> ret
//! field get    id: i32              (Widget)         -> i32
//! field set    id: i32              (Widget, i32)    -> ()
//! injection    id: i32              (Widget)         -> ()    [1 slot]
//! factory      nested               (parent's args)  -> ret
//! ```
//!
//! Field get/set operations have no binding slots; the access direction is
//! the operation's [`AccessMode`].

use std::fmt;

use crate::class::{
    ClassDescriptor, ConstructorDescriptor, FieldDescriptor, Invoker, MethodDescriptor,
    ParameterDescriptor, Value,
};
use crate::binding::Binding;
use crate::error::{NazarError, Result};
use crate::key::{ExtensionKey, TypeKey};

/// Index of an operation in its bean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationId(pub(crate) usize);

impl OperationId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How an operation touches its member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    Construct,
    Invoke,
    Get,
    Set,
    /// Writes a field with a value resolved like a parameter.
    Inject,
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessMode::Construct => write!(f, "construct"),
            AccessMode::Invoke => write!(f, "invoke"),
            AccessMode::Get => write!(f, "get"),
            AccessMode::Set => write!(f, "set"),
            AccessMode::Inject => write!(f, "inject"),
        }
    }
}

/// Who owns an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    /// The application that installed the bean.
    Application,
    Extension(ExtensionKey),
}

/// Call-site argument types and return type of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationContract {
    pub arguments: Vec<TypeKey>,
    pub returns: Option<TypeKey>,
}

/// A callable bound to exactly one member, with strict arity.
///
/// A variadic trailing parameter counts as one argument: callers pass the
/// collected values as a single value, never spread.
#[derive(Clone)]
pub struct MemberAccessor {
    invoker: Invoker,
    arity: usize,
    target: String,
}

impl MemberAccessor {
    pub(crate) fn new(invoker: Invoker, arity: usize, target: String) -> Self {
        Self {
            invoker,
            arity,
            target,
        }
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn invoke(&self, args: &[Option<Value>]) -> Result<Option<Value>> {
        if args.len() != self.arity {
            return Err(NazarError::ArityMismatch {
                target: self.target.clone(),
                expected: self.arity,
                actual: args.len(),
            });
        }
        (self.invoker)(args)
    }
}

impl fmt::Debug for MemberAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberAccessor")
            .field("target", &self.target)
            .field("arity", &self.arity)
            .finish()
    }
}

// ═══════════════════════════════════════════
// Operation
// ═══════════════════════════════════════════

/// One invocable unit derived from a member.
#[derive(Debug)]
pub struct Operation {
    id: OperationId,
    declaring: TypeKey,
    member: &'static str,
    mode: AccessMode,
    operator: Operator,
    accessor: MemberAccessor,
    contract: InvocationContract,
    params: Vec<ParameterDescriptor>,
    bindings: Vec<Option<Binding>>,
    receiver: bool,
    parent: Option<OperationId>,
}

impl Operation {
    #[inline]
    pub fn id(&self) -> OperationId {
        self.id
    }

    /// The class that declares the member.
    #[inline]
    pub fn declaring_class(&self) -> TypeKey {
        self.declaring
    }

    /// Member name; `"new"` for constructors.
    #[inline]
    pub fn member_name(&self) -> &'static str {
        self.member
    }

    #[inline]
    pub fn mode(&self) -> AccessMode {
        self.mode
    }

    #[inline]
    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn accessor(&self) -> &MemberAccessor {
        &self.accessor
    }

    pub fn contract(&self) -> &InvocationContract {
        &self.contract
    }

    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.params
    }

    pub fn bindings(&self) -> &[Option<Binding>] {
        &self.bindings
    }

    pub fn binding(&self, index: usize) -> Option<&Binding> {
        self.bindings.get(index).and_then(Option::as_ref)
    }

    /// Whether every binding slot is set.
    pub fn is_complete(&self) -> bool {
        self.bindings.iter().all(Option::is_some)
    }

    /// The operation this one produces a value for, if nested.
    #[inline]
    pub fn parent(&self) -> Option<OperationId> {
        self.parent
    }

    /// Whether call-site argument 0 is the receiver.
    #[inline]
    pub fn takes_receiver(&self) -> bool {
        self.receiver
    }

    /// Human-readable target, e.g. `Widget::new` or `Widget.id (get)`.
    pub fn target(&self) -> String {
        let class = self.declaring.short_name();
        match self.mode {
            AccessMode::Construct | AccessMode::Invoke => format!("{class}::{}", self.member),
            mode => format!("{class}.{} ({mode})", self.member),
        }
    }

    pub(crate) fn set_binding(&mut self, index: usize, binding: Binding) -> Result<()> {
        let target = self.target();
        let slot = self
            .bindings
            .get_mut(index)
            .ok_or_else(|| NazarError::ArityMismatch {
                target: target.clone(),
                expected: self.params.len(),
                actual: index + 1,
            })?;

        if let Some(existing) = slot {
            return Err(NazarError::AlreadyBound {
                operation: target,
                index,
                existing: existing.kind().name(),
            });
        }

        *slot = Some(binding);
        Ok(())
    }

    /// Calls the accessor with the call-site arguments and the values
    /// produced by the bindings, in parameter order.
    pub(crate) fn call(
        &self,
        call_args: &[Option<Value>],
        params: Vec<Option<Value>>,
    ) -> Result<Option<Value>> {
        let mut accessor_args = Vec::with_capacity(self.accessor.arity());

        if self.receiver {
            match call_args.first().cloned().flatten() {
                Some(receiver) => accessor_args.push(Some(receiver)),
                None => return Err(NazarError::NullReceiver { target: self.target() }),
            }
        }

        accessor_args.extend(params);

        if self.mode == AccessMode::Set {
            let value_index = usize::from(self.receiver);
            accessor_args.push(call_args.get(value_index).cloned().flatten());
        }

        self.accessor.invoke(&accessor_args)
    }
}

// ═══════════════════════════════════════════
// Operation builder
// ═══════════════════════════════════════════

fn receiver_prefix(class: &ClassDescriptor, is_static: bool) -> Vec<TypeKey> {
    if is_static {
        Vec::new()
    } else {
        vec![class.type_key()]
    }
}

fn unset_slots(count: usize) -> Vec<Option<Binding>> {
    (0..count).map(|_| None).collect()
}

pub(crate) fn build_constructor(
    id: OperationId,
    class: &ClassDescriptor,
    constructor: &ConstructorDescriptor,
    operator: Operator,
    parent: Option<(OperationId, &InvocationContract)>,
) -> Operation {
    let target = format!("{}::new", class.type_key().short_name());
    let contract = match parent {
        Some((_, inherited)) => InvocationContract {
            arguments: inherited.arguments.clone(),
            returns: Some(class.type_key()),
        },
        None => InvocationContract {
            arguments: constructor.params.iter().map(|p| p.ty).collect(),
            returns: Some(class.type_key()),
        },
    };

    Operation {
        id,
        declaring: class.type_key(),
        member: "new",
        mode: AccessMode::Construct,
        operator,
        accessor: MemberAccessor::new(
            constructor.invoker.clone(),
            constructor.params.len(),
            target,
        ),
        contract,
        params: constructor.params.clone(),
        bindings: unset_slots(constructor.params.len()),
        receiver: false,
        parent: parent.map(|(parent_id, _)| parent_id),
    }
}

pub(crate) fn build_method(
    id: OperationId,
    class: &ClassDescriptor,
    method: &MethodDescriptor,
    operator: Operator,
) -> Result<Operation> {
    let target = format!("{}::{}", class.type_key().short_name(), method.name);
    let invoker = method.invoker.clone().ok_or_else(|| NazarError::MissingAccessor {
        class: class.type_key(),
        member: method.name.to_string(),
        accessor: "invoker",
    })?;

    let receiver = !method.is_static;
    let mut arguments = receiver_prefix(class, method.is_static);
    arguments.extend(method.params.iter().map(|p| p.ty));

    Ok(Operation {
        id,
        declaring: class.type_key(),
        member: method.name,
        mode: AccessMode::Invoke,
        operator,
        accessor: MemberAccessor::new(invoker, usize::from(receiver) + method.params.len(), target),
        contract: InvocationContract {
            arguments,
            returns: method.returns,
        },
        params: method.params.clone(),
        bindings: unset_slots(method.params.len()),
        receiver,
        parent: None,
    })
}

/// Static method producing a value for a parent operation's parameter.
pub(crate) fn build_factory(
    id: OperationId,
    class: &ClassDescriptor,
    method: &MethodDescriptor,
    operator: Operator,
    parent: (OperationId, &InvocationContract),
) -> Result<Operation> {
    let target = format!("{}::{}", class.type_key().short_name(), method.name);
    if !method.is_static {
        return Err(NazarError::InvalidFactory {
            target,
            reason: "factory methods must be static".to_string(),
        });
    }

    let mut operation = build_method(id, class, method, operator)?;
    operation.contract.arguments = parent.1.arguments.clone();
    operation.parent = Some(parent.0);
    Ok(operation)
}

pub(crate) fn build_field(
    id: OperationId,
    class: &ClassDescriptor,
    field: &FieldDescriptor,
    mode: AccessMode,
    operator: Operator,
) -> Result<Operation> {
    let receiver = !field.is_static;
    let arguments = receiver_prefix(class, field.is_static);

    let (accessor, accessor_name) = match mode {
        AccessMode::Get => (field.getter.clone(), "getter"),
        _ => (field.setter.clone(), "setter"),
    };
    let invoker = accessor.ok_or_else(|| NazarError::MissingAccessor {
        class: class.type_key(),
        member: field.name.to_string(),
        accessor: accessor_name,
    })?;

    let target = format!("{}.{} ({mode})", class.type_key().short_name(), field.name);
    let (contract, params) = match mode {
        AccessMode::Get => (
            InvocationContract {
                arguments,
                returns: Some(field.ty),
            },
            Vec::new(),
        ),
        AccessMode::Set => {
            let mut arguments = arguments;
            arguments.push(field.ty);
            (
                InvocationContract {
                    arguments,
                    returns: None,
                },
                Vec::new(),
            )
        }
        _ => (
            InvocationContract {
                arguments,
                returns: None,
            },
            vec![ParameterDescriptor {
                name: field.name,
                ty: field.ty,
                optional: false,
                variadic: false,
                markers: field.markers.clone(),
            }],
        ),
    };

    let arity = usize::from(receiver) + usize::from(mode != AccessMode::Get);
    let slots = params.len();

    Ok(Operation {
        id,
        declaring: class.type_key(),
        member: field.name,
        mode,
        operator,
        accessor: MemberAccessor::new(invoker, arity, target),
        contract,
        params,
        bindings: unset_slots(slots),
        receiver,
        parent: None,
    })
}
