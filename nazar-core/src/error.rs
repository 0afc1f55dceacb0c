//! Error types for scanning, binding and invocation.
//!
//! Every failure in this crate is fatal for the scan (or call) that
//! produced it. Messages name the class, member and extension involved
//! and end with a hint on how to fix the deployment.

use std::fmt;

use nazar_support::rendering::{render_chain, shorten_type_name};

use crate::key::{DependencyKey, ExtensionKey, MarkerKey, TypeKey};
use crate::operation::OperationId;

/// Main error type for all Nazar operations.
#[derive(Debug, thiserror::Error)]
pub enum NazarError {
    // ── Configuration ──
    /// A marker declares itself both a member hook and a binding hook.
    #[error(
        "Marker {marker} is declared both as a member hook and as a binding hook by {extension}\n  Hint: a marker type must be either a field/method hook or a binding hook"
    )]
    AmbiguousHook {
        marker: MarkerKey,
        extension: ExtensionKey,
    },

    /// Two incompatible hook declarations exist for the same marker.
    #[error("{}", .0)]
    ConflictingHook(ConflictingHookError),

    /// Two extensions claim the same parameter type.
    #[error("Type {ty} is already bound by {existing}, cannot register {conflicting} as its binding hook")]
    ConflictingTypeHook {
        ty: TypeKey,
        existing: ExtensionKey,
        conflicting: ExtensionKey,
    },

    /// A marker is handled by an extension from another crate.
    #[error(
        "Marker {marker} (crate `{marker_module}`) cannot be handled by {extension} (crate `{extension_module}`)\n  Hint: a marker and its extension must be declared in the same crate"
    )]
    ForeignExtension {
        marker: MarkerKey,
        marker_module: &'static str,
        extension: ExtensionKey,
        extension_module: &'static str,
    },

    /// The extension is not installed and has no no-argument constructor.
    #[error(
        "Extension {extension} is not installed and has no no-argument constructor\n  Hint: build its key with ExtensionKey::of::<E>() (requires Default) or install it on the builder"
    )]
    MissingConstructor { extension: ExtensionKey },

    /// A field carries a member-hook marker and a binding-hook marker.
    #[error(
        "Field {class}::{field} carries member hook {member_marker} and binding hook {binding_marker}\n  Hint: member hooks and binding hooks are mutually exclusive on one field"
    )]
    ConflictingFieldMarkers {
        class: TypeKey,
        field: &'static str,
        member_marker: MarkerKey,
        binding_marker: MarkerKey,
    },

    /// More than one binding hook applies to the same parameter or field.
    #[error(
        "{target} has more than one binding hook: {first} and {second}\n  Hint: keep a single binding marker per injection point"
    )]
    DuplicateBindingHook {
        target: String,
        first: MarkerKey,
        second: MarkerKey,
    },

    /// No constructor can be selected for a class-sourced bean.
    #[error(
        "Cannot select a constructor for {class}: {reason}\n  Hint: mark exactly one constructor with #[Inject] or declare a single public constructor"
    )]
    NoEligibleConstructor { class: TypeKey, reason: String },

    /// A nested factory binding cannot produce the parameter's value.
    #[error("Cannot use {target} as a factory: {reason}")]
    InvalidFactory { target: String, reason: String },

    /// A hook matched, but the extension's handler does not handle that kind of match.
    #[error("Extension {extension} does not handle {what}")]
    UnhandledHook {
        extension: ExtensionKey,
        what: &'static str,
    },

    // ── Accessibility ──
    /// The member cannot be reached by the extension.
    #[error("{}", .0)]
    Inaccessible(InaccessibleMemberError),

    /// The class descriptor registers no accessor for the member.
    #[error("No {accessor} registered for {class}::{member}\n  Hint: register the {accessor} on the class descriptor")]
    MissingAccessor {
        class: TypeKey,
        member: String,
        accessor: &'static str,
    },

    /// An extension asked for an access mode its markers did not grant.
    #[error(
        "Extension {extension} requested {mode} access to field {class}::{field}, which its markers do not allow"
    )]
    AccessNotPermitted {
        extension: ExtensionKey,
        class: TypeKey,
        field: &'static str,
        mode: &'static str,
    },

    // ── Binding ──
    /// A binding slot was set twice.
    #[error("Illegal state: parameter {index} of {operation} is already bound as {existing}")]
    AlreadyBound {
        operation: String,
        index: usize,
        existing: &'static str,
    },

    /// A null constant was bound to a primitive parameter.
    #[error("Illegal argument: cannot bind null to primitive parameter {index} ({expected}) of {operation}")]
    NullPrimitive {
        operation: String,
        index: usize,
        expected: TypeKey,
    },

    /// A constant of the wrong type was bound to a primitive parameter.
    #[error(
        "Illegal argument: cannot bind a constant of another type to primitive parameter {index} ({expected}) of {operation}"
    )]
    PrimitiveMismatch {
        operation: String,
        index: usize,
        expected: TypeKey,
    },

    /// A constant of the wrong type was bound to a reference parameter.
    #[error("Cannot cast constant for parameter {index} of {operation} to {expected}")]
    ConstantTypeMismatch {
        operation: String,
        index: usize,
        expected: TypeKey,
    },

    /// An invocation-argument binding refers to a missing or incompatible argument.
    #[error("{}", .0)]
    InvalidArgumentIndex(InvalidArgumentError),

    /// An extension returned from a binding request without binding the slot.
    #[error(
        "Extension {extension} did not bind parameter {index} of {operation}\n  Hint: on_binding_requested must call one of the BindingSlot::bind_* methods"
    )]
    BindingNotSet {
        extension: ExtensionKey,
        operation: String,
        index: usize,
    },

    /// A required service was never registered.
    #[error("{}", .0)]
    NotRegistered(NotRegisteredError),

    /// The deferred resolution queue did not reach a fixed point.
    #[error(
        "Resolution of {class} processed more than {limit} operations without reaching a fixed point\n  Hint: an extension keeps creating operations from its own binding requests"
    )]
    ResolutionLimitExceeded { class: TypeKey, limit: usize },

    /// A bean was scanned twice.
    #[error("Illegal state: bean {class} has already been scanned")]
    AlreadyScanned { class: TypeKey },

    // ── Container ──
    /// Circular dependency detected between services.
    #[error("{}", .0)]
    CircularDependency(CircularDependencyError),

    /// Service was already registered (when override is disabled).
    #[error("{}", .0)]
    AlreadyRegistered(AlreadyRegisteredError),

    // ── Invocation ──
    /// Wrong number of arguments for an operation or member accessor.
    #[error("{target} expects {expected} argument(s), got {actual}")]
    ArityMismatch {
        target: String,
        expected: usize,
        actual: usize,
    },

    /// An operation id that does not belong to the bean.
    #[error("{class} has no operation {id}")]
    UnknownOperation { class: TypeKey, id: OperationId },

    /// An instance member was invoked without a receiver.
    #[error("{target} requires a bean instance as argument 0, got null")]
    NullReceiver { target: String },

    /// A member accessor or service factory failed.
    #[error("Failed to invoke {target}: {source}")]
    InvocationFailed {
        target: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Extension callbacks ──
    /// An error raised by extension code, propagated unchanged.
    #[error("Extension {extension} failed: {source}")]
    Extension {
        extension: ExtensionKey,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl NazarError {
    /// Wraps an error raised inside an extension callback.
    pub fn extension(
        extension: ExtensionKey,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        NazarError::Extension {
            extension,
            source: source.into(),
        }
    }

    /// Wraps an error raised inside a member accessor.
    pub fn invocation(
        target: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        NazarError::InvocationFailed {
            target: target.into(),
            source: source.into(),
        }
    }
}

/// Two hook declarations disagree about one marker.
#[derive(Debug)]
pub struct ConflictingHookError {
    pub marker: MarkerKey,
    /// The class whose declaration triggered the conflict (if class-level).
    pub class: Option<TypeKey>,
    pub existing: ExtensionKey,
    pub conflicting: ExtensionKey,
}

impl fmt::Display for ConflictingHookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Conflicting hooks for marker {}: already handled by {}, redeclared for {}",
            self.marker, self.existing, self.conflicting
        )?;
        if let Some(class) = self.class {
            write!(f, "\n  Declared on: {class}")?;
        }
        write!(
            f,
            "\n  Hint: a marker type maps to exactly one extension with one set of capabilities"
        )
    }
}

/// A member cannot be reached without an explicit access grant.
#[derive(Debug)]
pub struct InaccessibleMemberError {
    pub class: TypeKey,
    pub member: String,
    pub extension: ExtensionKey,
    /// The crate that must be granted access.
    pub required_grant: &'static str,
}

impl fmt::Display for InaccessibleMemberError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Member {}::{} is not accessible to extension {}",
            self.class, self.member, self.extension
        )?;
        write!(
            f,
            "\n  Hint: call .opens_to({:?}) on the class descriptor of {}",
            self.required_grant,
            self.class.short_name()
        )
    }
}

/// An invocation-argument binding does not fit the invocation contract.
#[derive(Debug)]
pub struct InvalidArgumentError {
    pub operation: String,
    pub parameter: usize,
    pub argument: usize,
    pub parameter_type: TypeKey,
    /// `None` when the index is past the end of the contract.
    pub argument_type: Option<TypeKey>,
}

impl fmt::Display for InvalidArgumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.argument_type {
            None => write!(
                f,
                "Parameter {} of {} is bound to invocation argument {}, which does not exist",
                self.parameter, self.operation, self.argument
            ),
            Some(actual) => write!(
                f,
                "Parameter {} of {} ({}) is bound to invocation argument {} of type {}",
                self.parameter,
                self.operation,
                shorten_type_name(self.parameter_type.type_name()),
                self.argument,
                shorten_type_name(actual.type_name())
            ),
        }
    }
}

/// Error when a service was not registered.
///
/// Includes helpful hints about what went wrong.
#[derive(Debug)]
pub struct NotRegisteredError {
    /// The service that was requested
    pub requested: DependencyKey,
    /// What required this service (if known)
    pub required_by: Option<String>,
    /// Similar types that ARE registered (for "did you mean?" suggestions)
    pub suggestions: Vec<String>,
}

impl fmt::Display for NotRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service not registered: {}", self.requested)?;

        if let Some(ref parent) = self.required_by {
            write!(f, "\n  Required by: {parent}")?;
        }

        if !self.suggestions.is_empty() {
            write!(f, "\n  Did you mean one of:")?;
            for suggestion in &self.suggestions {
                write!(f, "\n    - {suggestion}")?;
            }
        }

        write!(
            f,
            "\n  Hint: register {} in the namespace that installs the bean, or declare the parameter optional",
            shorten_type_name(self.requested.type_name())
        )
    }
}

/// Error when a circular dependency is detected.
///
/// Shows the full dependency chain so you can see WHERE the cycle is.
#[derive(Debug)]
pub struct CircularDependencyError {
    /// Example: ["A", "B", "C", "A"]
    pub chain: Vec<DependencyKey>,
}

impl fmt::Display for CircularDependencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circular dependency detected:\n  ")?;

        let names: Vec<String> = self
            .chain
            .iter()
            .map(|k| shorten_type_name(k.type_name()))
            .collect();
        write!(f, "{}", render_chain(&names))?;

        write!(
            f,
            "\n  Hint: break the cycle with an optional parameter or a factory binding"
        )
    }
}

/// Error when trying to register a service that already exists.
#[derive(Debug)]
pub struct AlreadyRegisteredError {
    pub key: DependencyKey,
}

impl fmt::Display for AlreadyRegisteredError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service already registered: {}", self.key)?;
        write!(
            f,
            "\n  Hint: enable allow_override in the scan settings to replace it"
        )
    }
}

/// Convenient Result type for Nazar operations.
pub type Result<T> = std::result::Result<T, NazarError>;

#[cfg(test)]
mod tests {
    use super::*;

    struct Widget;
    struct Gadget;

    #[test]
    fn not_registered_error_display() {
        let err = NazarError::NotRegistered(NotRegisteredError {
            requested: DependencyKey::of::<String>(),
            required_by: Some("Widget::new".to_string()),
            suggestions: vec!["alloc::string::Str".to_string()],
        });

        let msg = format!("{err}");
        assert!(msg.contains("not registered"));
        assert!(msg.contains("String"));
        assert!(msg.contains("Required by: Widget::new"));
        assert!(msg.contains("Did you mean"));
    }

    #[test]
    fn circular_dependency_error_display() {
        let err = NazarError::CircularDependency(CircularDependencyError {
            chain: vec![
                DependencyKey::of::<Widget>(),
                DependencyKey::of::<Gadget>(),
                DependencyKey::of::<Widget>(),
            ],
        });

        let msg = format!("{err}");
        assert!(msg.contains("Circular"));
        assert!(msg.contains("Widget → Gadget → Widget"));
    }

    #[test]
    fn inaccessible_error_names_grant() {
        let err = NazarError::Inaccessible(InaccessibleMemberError {
            class: TypeKey::of::<Widget>(),
            member: "secret".to_string(),
            extension: crate::key::ExtensionKey::from_raw(
                std::any::TypeId::of::<Gadget>(),
                "foreign::GadgetExtension",
                None,
            ),
            required_grant: "foreign",
        });

        let msg = format!("{err}");
        assert!(msg.contains("secret"));
        assert!(msg.contains("opens_to(\"foreign\")"));
    }

    #[test]
    fn invalid_argument_display_out_of_range() {
        let err = InvalidArgumentError {
            operation: "Widget::new".into(),
            parameter: 0,
            argument: 3,
            parameter_type: TypeKey::of::<i32>(),
            argument_type: None,
        };
        assert!(err.to_string().contains("does not exist"));
    }
}
