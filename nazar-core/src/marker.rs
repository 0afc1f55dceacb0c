//! Declarative markers.
//!
//! A marker is a plain Rust value placed on a class, constructor, field,
//! method or parameter. A marker type may declare a hook through
//! [`Marker::hook`], which names the extension that handles the marker and
//! what the extension may do with the marked member.
//!
//! ```
//! use nazar_core::marker::{FieldCaps, HookSpec, Marker, MarkerInstance};
//! # use nazar_core::extension::{Extension, Handler};
//! # #[derive(Default)]
//! # struct ConfigExtension;
//! # struct ConfigHandler;
//! # impl Handler for ConfigHandler {}
//! # impl Extension for ConfigExtension {
//! #     fn new_handler(&self) -> Box<dyn Handler> { Box::new(ConfigHandler) }
//! # }
//!
//! struct Setting(&'static str);
//!
//! impl Marker for Setting {
//!     fn hook() -> Option<HookSpec> {
//!         Some(HookSpec::field::<ConfigExtension>(FieldCaps::GET_SET))
//!     }
//! }
//!
//! let placed = MarkerInstance::new(Setting("port"));
//! assert_eq!(placed.get::<Setting>().map(|s| s.0), Some("port"));
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::extension::Extension;
use crate::key::{ExtensionKey, MarkerKey};

/// A marker type.
pub trait Marker: Any + Send + Sync {
    /// The hook this marker type declares, or `None` for plain markers.
    fn hook() -> Option<HookSpec> {
        None
    }
}

/// Selects the constructor the scanner uses to instantiate a bean.
#[derive(Debug, Clone, Copy, Default)]
pub struct Inject;

impl Marker for Inject {}

/// A marker value placed on a member.
#[derive(Clone)]
pub struct MarkerInstance {
    key: MarkerKey,
    value: Arc<dyn Any + Send + Sync>,
}

impl MarkerInstance {
    pub fn new<M: Marker>(marker: M) -> Self {
        Self {
            key: MarkerKey::of::<M>(),
            value: Arc::new(marker),
        }
    }

    /// Places a marker whose key was built with [`MarkerKey::from_raw`].
    pub fn from_raw(key: MarkerKey, value: Arc<dyn Any + Send + Sync>) -> Self {
        Self { key, value }
    }

    #[inline]
    pub fn key(&self) -> MarkerKey {
        self.key
    }

    /// Returns the marker value if it is an `M`.
    pub fn get<M: Marker>(&self) -> Option<&M> {
        self.value.downcast_ref::<M>()
    }

    pub fn is<M: Marker>(&self) -> bool {
        self.value.is::<M>()
    }
}

impl fmt::Debug for MarkerInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)
    }
}

/// What an extension may do with a field carrying a field-hook marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldCaps {
    pub gettable: bool,
    pub settable: bool,
}

impl FieldCaps {
    pub const NONE: FieldCaps = FieldCaps { gettable: false, settable: false };
    pub const GET: FieldCaps = FieldCaps { gettable: true, settable: false };
    pub const SET: FieldCaps = FieldCaps { gettable: false, settable: true };
    pub const GET_SET: FieldCaps = FieldCaps { gettable: true, settable: true };

    /// Logical OR of both permission sets.
    pub fn union(self, other: FieldCaps) -> FieldCaps {
        FieldCaps {
            gettable: self.gettable || other.gettable,
            settable: self.settable || other.settable,
        }
    }
}

/// A hook declaration: which extension handles a marker, and how.
#[derive(Debug, Clone, Copy)]
pub struct HookSpec {
    extension: ExtensionKey,
    field: Option<FieldCaps>,
    method: bool,
    binding: bool,
}

impl HookSpec {
    /// An empty declaration for `extension`; add capabilities with the
    /// `with_*` methods.
    pub fn for_extension(extension: ExtensionKey) -> Self {
        Self {
            extension,
            field: None,
            method: false,
            binding: false,
        }
    }

    /// Field hook: marked fields are matched by `E` with `caps`.
    pub fn field<E: Extension + Default>(caps: FieldCaps) -> Self {
        Self::for_extension(ExtensionKey::of::<E>()).with_field(caps)
    }

    /// Method hook: marked methods are matched by `E`.
    pub fn method<E: Extension + Default>() -> Self {
        Self::for_extension(ExtensionKey::of::<E>()).with_method()
    }

    /// Binding hook: marked parameters are bound by `E`.
    pub fn binding<E: Extension + Default>() -> Self {
        Self::for_extension(ExtensionKey::of::<E>()).with_binding()
    }

    pub fn with_field(mut self, caps: FieldCaps) -> Self {
        self.field = Some(self.field.unwrap_or_default().union(caps));
        self
    }

    pub fn with_method(mut self) -> Self {
        self.method = true;
        self
    }

    pub fn with_binding(mut self) -> Self {
        self.binding = true;
        self
    }

    #[inline]
    pub fn extension(&self) -> ExtensionKey {
        self.extension
    }

    #[inline]
    pub fn field_caps(&self) -> Option<FieldCaps> {
        self.field
    }

    #[inline]
    pub fn is_method_hook(&self) -> bool {
        self.method
    }

    #[inline]
    pub fn is_binding_hook(&self) -> bool {
        self.binding
    }
}
