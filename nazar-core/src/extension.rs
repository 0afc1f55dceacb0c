//! Extensions, their per-bean handlers, and the host they run in.
//!
//! An [`Extension`] is installed once per container. For every bean whose
//! markers route to it, the scanner asks it for a fresh [`Handler`] that
//! lives for the duration of that bean's scan and receives the matched
//! members and binding requests.

use std::any::{type_name, Any};
use std::sync::Arc;

use crate::bean::BeanInstaller;
use crate::binding::{Binding, BindingSlot, Namespace};
use crate::error::{NazarError, Result};
use crate::hook::HookCatalog;
use crate::key::{DependencyKey, ExtensionKey, TypeKey};
use crate::scanner::{MatchedField, MatchedMethod};
use crate::settings::ScanSettings;

/// A container extension.
pub trait Extension: Any + Send + Sync {
    /// Creates the handler that serves one bean scan.
    fn new_handler(&self) -> Box<dyn Handler>;

    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

/// Per-bean callbacks of an extension.
///
/// Every method has a default: scan start and end do nothing, matches and
/// binding requests fail with [`NazarError::UnhandledHook`] so a hook that
/// routes to a handler that ignores it never passes silently.
pub trait Handler: Send {
    /// Called once when the extension starts contributing to a bean.
    fn on_scan_start(&mut self, context: &ScanContext) -> Result<()> {
        let _ = context;
        Ok(())
    }

    /// Called once per contributor after the bean has been fully resolved,
    /// in activation order.
    fn on_scan_end(&mut self, context: &ScanContext) -> Result<()> {
        let _ = context;
        Ok(())
    }

    fn on_matched_field(&mut self, field: &mut MatchedField<'_>) -> Result<()> {
        Err(NazarError::UnhandledHook {
            extension: field.extension(),
            what: "field matches",
        })
    }

    fn on_matched_method(&mut self, method: &mut MatchedMethod<'_>) -> Result<()> {
        Err(NazarError::UnhandledHook {
            extension: method.extension(),
            what: "method matches",
        })
    }

    fn on_binding_requested(&mut self, slot: &mut BindingSlot<'_>) -> Result<()> {
        Err(NazarError::UnhandledHook {
            extension: slot.extension(),
            what: "binding requests",
        })
    }
}

/// What a handler knows about the scan it serves.
#[derive(Debug, Clone, Copy)]
pub struct ScanContext {
    pub bean_class: TypeKey,
    pub extension: ExtensionKey,
    pub installer: BeanInstaller,
    /// Set when the extension installed the bean itself.
    pub full_access: bool,
}

/// The services a scan needs from its container.
pub trait ExtensionHost {
    fn catalog(&self) -> &HookCatalog;

    fn settings(&self) -> &ScanSettings;

    /// Returns the installed extension for `key`, installing it on first
    /// use.
    fn resolve_or_install_extension(&self, key: &ExtensionKey) -> Result<Arc<dyn Extension>>;

    /// Produces a service binding for `key` in `namespace`.
    ///
    /// Fails with [`NazarError::NotRegistered`] when the service is unknown
    /// and `required` is set.
    fn lookup_service(
        &self,
        namespace: &Namespace,
        key: &DependencyKey,
        required: bool,
    ) -> Result<Binding>;
}
