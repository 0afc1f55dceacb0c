//! Hook Model: which extension handles which marker, and how.
//!
//! Hooks come from two places:
//! - a marker type's own declaration ([`Marker::hook`](crate::marker::Marker::hook)),
//!   resolved and validated once per marker type;
//! - class-level declarations ([`ClassBuilder::declare_hook`](crate::class::ClassBuilder::declare_hook)),
//!   merged along the superclass chain into one [`HookModel`] level per class.
//!
//! Each level points at its superclass's level instead of copying it, so
//! sibling classes share the cached prefix. A marker maps to exactly one
//! extension with one set of capabilities; anything else is a fatal
//! configuration error raised while the model is built.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, trace, warn};

use crate::class::ClassDescriptor;
use crate::error::{ConflictingHookError, NazarError, Result};
use crate::key::{ExtensionKey, MarkerKey, TypeKey};
use crate::marker::{FieldCaps, HookSpec};

/// Capability flags of a hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HookCapabilities {
    /// Matches fields.
    pub field: bool,
    pub readable: bool,
    pub writable: bool,
    /// Matches methods.
    pub invokable: bool,
    /// Binds parameters.
    pub binding: bool,
}

impl HookCapabilities {
    fn from_spec(spec: &HookSpec) -> Self {
        let caps = spec.field_caps();
        Self {
            field: caps.is_some(),
            readable: caps.is_some_and(|c| c.gettable),
            writable: caps.is_some_and(|c| c.settable),
            invokable: spec.is_method_hook(),
            binding: spec.is_binding_hook(),
        }
    }

    #[inline]
    pub fn is_member_hook(&self) -> bool {
        self.field || self.invokable
    }

    pub fn field_caps(&self) -> FieldCaps {
        FieldCaps {
            gettable: self.readable,
            settable: self.writable,
        }
    }
}

/// A validated hook: marker → extension + capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookDescriptor {
    pub marker: MarkerKey,
    pub extension: ExtensionKey,
    pub capabilities: HookCapabilities,
}

fn validate(marker: MarkerKey, spec: &HookSpec) -> Result<HookDescriptor> {
    let capabilities = HookCapabilities::from_spec(spec);
    let extension = spec.extension();

    if capabilities.is_member_hook() && capabilities.binding {
        warn!(marker = %marker, extension = %extension, "Ambiguous hook capability");
        return Err(NazarError::AmbiguousHook { marker, extension });
    }

    if marker.module() != extension.module() {
        warn!(marker = %marker, extension = %extension, "Marker handled by a foreign extension");
        return Err(NazarError::ForeignExtension {
            marker,
            marker_module: marker.module(),
            extension,
            extension_module: extension.module(),
        });
    }

    Ok(HookDescriptor {
        marker,
        extension,
        capabilities,
    })
}

// ═══════════════════════════════════════════
// HookModel
// ═══════════════════════════════════════════

/// The hook declarations of one class, chained to its superclass's model.
#[derive(Debug)]
pub struct HookModel {
    class: TypeKey,
    parent: Option<Arc<HookModel>>,
    entries: HashMap<MarkerKey, Arc<HookDescriptor>>,
}

impl HookModel {
    pub fn class(&self) -> TypeKey {
        self.class
    }

    pub fn parent(&self) -> Option<&Arc<HookModel>> {
        self.parent.as_ref()
    }

    /// Looks up the hook for `marker`: this level, then the superclass
    /// levels, then the marker's own declaration.
    pub fn lookup(
        &self,
        catalog: &HookCatalog,
        marker: &MarkerKey,
    ) -> Result<Option<Arc<HookDescriptor>>> {
        match self.local(marker) {
            Some(descriptor) => Ok(Some(descriptor)),
            None => catalog.declared(marker),
        }
    }

    fn local(&self, marker: &MarkerKey) -> Option<Arc<HookDescriptor>> {
        match self.entries.get(marker) {
            Some(descriptor) => Some(Arc::clone(descriptor)),
            None => self.parent.as_ref().and_then(|parent| parent.local(marker)),
        }
    }
}

// ═══════════════════════════════════════════
// HookCatalog
// ═══════════════════════════════════════════

/// Container-wide hook registry and cache.
///
/// Read-mostly: marker declarations and class models are computed once per
/// key and then only read, so unrelated scans can share the catalog.
#[derive(Debug, Default)]
pub struct HookCatalog {
    declared: DashMap<MarkerKey, Option<Arc<HookDescriptor>>>,
    type_hooks: HashMap<TypeKey, ExtensionKey>,
    models: DashMap<TypeKey, Arc<HookModel>>,
}

impl HookCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `extension` as the binding hook for every parameter of type `ty`.
    pub fn register_type_hook(&mut self, ty: TypeKey, extension: ExtensionKey) -> Result<()> {
        if let Some(existing) = self.type_hooks.get(&ty) {
            if *existing != extension {
                warn!(ty = %ty, existing = %existing, conflicting = %extension, "Conflicting type hook");
                return Err(NazarError::ConflictingTypeHook {
                    ty,
                    existing: *existing,
                    conflicting: extension,
                });
            }
            return Ok(());
        }
        debug!(ty = %ty, extension = %extension, "Registered type binding hook");
        self.type_hooks.insert(ty, extension);
        Ok(())
    }

    /// The extension registered as binding hook for `ty`, if any.
    pub fn type_hook(&self, ty: &TypeKey) -> Option<ExtensionKey> {
        self.type_hooks.get(ty).copied()
    }

    /// The marker type's own hook declaration, validated once.
    pub fn declared(&self, marker: &MarkerKey) -> Result<Option<Arc<HookDescriptor>>> {
        if let Some(hit) = self.declared.get(marker) {
            return Ok(hit.value().clone());
        }

        let computed = match marker.declared_hook() {
            Some(spec) => Some(Arc::new(validate(*marker, &spec)?)),
            None => None,
        };
        trace!(marker = %marker, hooked = computed.is_some(), "Resolved marker declaration");

        Ok(self.declared.entry(*marker).or_insert(computed).value().clone())
    }

    /// The hook model of `class`, building missing levels up the hierarchy.
    pub fn model_for(&self, class: &Arc<ClassDescriptor>) -> Result<Arc<HookModel>> {
        let key = class.type_key();
        if let Some(model) = self.models.get(&key) {
            return Ok(Arc::clone(model.value()));
        }

        let parent = match class.superclass() {
            Some(superclass) => Some(self.model_for(superclass)?),
            None => None,
        };

        let mut entries: HashMap<MarkerKey, Arc<HookDescriptor>> = HashMap::new();
        for (marker, spec) in class.hook_declarations() {
            let descriptor = validate(*marker, spec)?;

            let visible = match entries.get(marker) {
                Some(same_level) => Some(Arc::clone(same_level)),
                None => match parent.as_ref().and_then(|p| p.local(marker)) {
                    Some(inherited) => Some(inherited),
                    None => self.declared(marker)?,
                },
            };

            match visible {
                Some(existing) if *existing != descriptor => {
                    warn!(
                        class = %key,
                        marker = %marker,
                        existing = %existing.extension,
                        conflicting = %descriptor.extension,
                        "Conflicting hook declaration"
                    );
                    return Err(NazarError::ConflictingHook(ConflictingHookError {
                        marker: *marker,
                        class: Some(key),
                        existing: existing.extension,
                        conflicting: descriptor.extension,
                    }));
                }
                // identical redeclaration, keep the shared descriptor
                Some(_) => {}
                None => {
                    entries.insert(*marker, Arc::new(descriptor));
                }
            }
        }

        debug!(class = %key, declarations = entries.len(), "Built hook model level");
        let model = Arc::new(HookModel {
            class: key,
            parent,
            entries,
        });
        Ok(Arc::clone(self.models.entry(key).or_insert(model).value()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::{Extension, Handler};
    use crate::marker::Marker;
    use std::any::TypeId;

    #[derive(Default)]
    struct ConfigExtension;
    #[derive(Default)]
    struct NamingExtension;
    struct NoopHandler;
    impl Handler for NoopHandler {}
    impl Extension for ConfigExtension {
        fn new_handler(&self) -> Box<dyn Handler> {
            Box::new(NoopHandler)
        }
    }
    impl Extension for NamingExtension {
        fn new_handler(&self) -> Box<dyn Handler> {
            Box::new(NoopHandler)
        }
    }

    struct Setting;
    impl Marker for Setting {
        fn hook() -> Option<HookSpec> {
            Some(HookSpec::field::<ConfigExtension>(FieldCaps::GET))
        }
    }

    struct Confused;
    impl Marker for Confused {
        fn hook() -> Option<HookSpec> {
            Some(HookSpec::field::<ConfigExtension>(FieldCaps::GET).with_binding())
        }
    }

    struct Plain;
    impl Marker for Plain {}

    struct Base;
    struct Widget;
    struct Gadget;
    struct Logger;

    #[test]
    fn declared_hook_is_cached() {
        let catalog = HookCatalog::new();
        let a = catalog.declared(&MarkerKey::of::<Setting>()).unwrap().unwrap();
        let b = catalog.declared(&MarkerKey::of::<Setting>()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.capabilities.readable);
        assert!(!a.capabilities.writable);
        assert_eq!(a.extension, ExtensionKey::of::<ConfigExtension>());
    }

    #[test]
    fn plain_marker_has_no_hook() {
        let catalog = HookCatalog::new();
        assert!(catalog.declared(&MarkerKey::of::<Plain>()).unwrap().is_none());
    }

    #[test]
    fn member_and_binding_is_ambiguous() {
        let catalog = HookCatalog::new();
        let err = catalog.declared(&MarkerKey::of::<Confused>()).unwrap_err();
        assert!(matches!(err, NazarError::AmbiguousHook { .. }));
    }

    #[test]
    fn foreign_extension_rejected() {
        fn hook() -> Option<HookSpec> {
            Some(HookSpec::binding::<ConfigExtension>())
        }
        let foreign = MarkerKey::from_raw(TypeId::of::<Gadget>(), "other_crate::Gadget", hook);

        let catalog = HookCatalog::new();
        match catalog.declared(&foreign).unwrap_err() {
            NazarError::ForeignExtension { marker_module, extension_module, .. } => {
                assert_eq!(marker_module, "other_crate");
                assert_eq!(extension_module, "nazar_core");
            }
            other => panic!("Expected ForeignExtension, got: {other:?}"),
        }
    }

    #[test]
    fn subclass_shares_base_descriptor() {
        let base = ClassDescriptor::builder::<Base>()
            .declare_hook::<Plain>(HookSpec::method::<NamingExtension>())
            .build();
        let widget = ClassDescriptor::builder::<Widget>()
            .extends(Arc::clone(&base))
            .build();

        let catalog = HookCatalog::new();
        let base_model = catalog.model_for(&base).unwrap();
        let widget_model = catalog.model_for(&widget).unwrap();

        let from_base = base_model.lookup(&catalog, &MarkerKey::of::<Plain>()).unwrap().unwrap();
        let from_widget = widget_model.lookup(&catalog, &MarkerKey::of::<Plain>()).unwrap().unwrap();
        assert!(Arc::ptr_eq(&from_base, &from_widget));
        assert!(Arc::ptr_eq(widget_model.parent().unwrap(), &base_model));
    }

    #[test]
    fn sibling_classes_share_parent_level() {
        let base = ClassDescriptor::builder::<Base>().build();
        let widget = ClassDescriptor::builder::<Widget>().extends(Arc::clone(&base)).build();
        let gadget = ClassDescriptor::builder::<Gadget>().extends(base).build();

        let catalog = HookCatalog::new();
        let w = catalog.model_for(&widget).unwrap();
        let g = catalog.model_for(&gadget).unwrap();
        assert!(Arc::ptr_eq(w.parent().unwrap(), g.parent().unwrap()));
    }

    #[test]
    fn subclass_conflicting_redeclaration_fails() {
        let base = ClassDescriptor::builder::<Base>()
            .declare_hook::<Plain>(HookSpec::method::<NamingExtension>())
            .build();
        let widget = ClassDescriptor::builder::<Widget>()
            .extends(base)
            .declare_hook::<Plain>(HookSpec::method::<ConfigExtension>())
            .build();

        let catalog = HookCatalog::new();
        match catalog.model_for(&widget).unwrap_err() {
            NazarError::ConflictingHook(err) => {
                assert_eq!(err.existing, ExtensionKey::of::<NamingExtension>());
                assert_eq!(err.conflicting, ExtensionKey::of::<ConfigExtension>());
                assert_eq!(err.class, Some(TypeKey::of::<Widget>()));
            }
            other => panic!("Expected ConflictingHook, got: {other:?}"),
        }
    }

    #[test]
    fn class_declaration_conflicting_with_marker_declaration_fails() {
        let widget = ClassDescriptor::builder::<Widget>()
            .declare_hook::<Setting>(HookSpec::field::<ConfigExtension>(FieldCaps::GET_SET))
            .build();

        let catalog = HookCatalog::new();
        assert!(matches!(
            catalog.model_for(&widget),
            Err(NazarError::ConflictingHook(_))
        ));
    }

    #[test]
    fn identical_redeclaration_is_accepted() {
        let widget = ClassDescriptor::builder::<Widget>()
            .declare_hook::<Setting>(HookSpec::field::<ConfigExtension>(FieldCaps::GET))
            .build();

        let catalog = HookCatalog::new();
        let model = catalog.model_for(&widget).unwrap();
        let found = model.lookup(&catalog, &MarkerKey::of::<Setting>()).unwrap().unwrap();
        assert_eq!(found.extension, ExtensionKey::of::<ConfigExtension>());
    }

    #[test]
    fn type_hooks() {
        let mut catalog = HookCatalog::new();
        catalog
            .register_type_hook(TypeKey::of::<Logger>(), ExtensionKey::of::<NamingExtension>())
            .unwrap();
        assert_eq!(
            catalog.type_hook(&TypeKey::of::<Logger>()),
            Some(ExtensionKey::of::<NamingExtension>())
        );
        assert!(catalog
            .register_type_hook(TypeKey::of::<Logger>(), ExtensionKey::of::<ConfigExtension>())
            .is_err());
        assert!(catalog.type_hook(&TypeKey::of::<Widget>()).is_none());
    }
}
