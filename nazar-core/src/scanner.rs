//! Bean scanning: walks a bean's members, matches their markers against
//! the hook model, and hands matches to the owning extensions.
//!
//! A scan runs in four steps:
//!
//! 1. class-level markers are looked up (validated, otherwise unused);
//! 2. for class-sourced beans, the constructor operation is built and its
//!    parameters resolved immediately;
//! 3. fields are walked root class first, methods most derived first;
//! 4. the deferred queue is drained until no operation has unbound slots,
//!    then every contributor is told the scan is over.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tracing::{debug, info, instrument, trace, warn};

use crate::bean::{Bean, BeanInstaller, BeanSource};
use crate::binding::Namespace;
use crate::class::{
    ClassDescriptor, ConstructorDescriptor, FieldDescriptor, MethodDescriptor, MethodSignature,
    Visibility,
};
use crate::contributor::Contributors;
use crate::error::{InaccessibleMemberError, NazarError, Result};
use crate::extension::{ExtensionHost, Handler};
use crate::hook::{HookDescriptor, HookModel};
use crate::key::{ExtensionKey, TypeKey};
use crate::marker::{FieldCaps, Inject, Marker, MarkerInstance};
use crate::operation::{self, AccessMode, Operation, OperationId, Operator};

// ═══════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════

/// Where new operations go: the bean's operation list and the deferred
/// queue.
pub(crate) struct OperationSink<'a> {
    pub(crate) bean: &'a mut Bean,
    pub(crate) queue: &'a mut VecDeque<OperationId>,
    pub(crate) host: &'a dyn ExtensionHost,
}

impl OperationSink<'_> {
    pub(crate) fn next_id(&self) -> OperationId {
        OperationId(self.bean.operations.len())
    }

    pub(crate) fn push(&mut self, operation: Operation) -> OperationId {
        let id = operation.id();
        debug!(
            operation = %operation.target(),
            id = %id,
            mode = %operation.mode(),
            "Operation created"
        );
        self.bean.operations.push(operation);
        self.queue.push_back(id);
        id
    }
}

/// Picks the constructor a class-sourced bean is built with: the one
/// marked [`Inject`], else the only public one.
pub(crate) fn select_constructor(class: &ClassDescriptor) -> Result<&ConstructorDescriptor> {
    let reject = |reason: String| NazarError::NoEligibleConstructor {
        class: class.type_key(),
        reason,
    };

    let injected: Vec<_> = class
        .constructors()
        .iter()
        .filter(|c| c.has_marker::<Inject>())
        .collect();
    match injected.as_slice() {
        [only] => return Ok(only),
        [] => {}
        many => {
            return Err(reject(format!(
                "{} constructors are marked #[Inject]",
                many.len()
            )));
        }
    }

    let public: Vec<_> = class
        .constructors()
        .iter()
        .filter(|c| c.visibility == Visibility::Public)
        .collect();
    match public.as_slice() {
        [only] => Ok(only),
        [] => Err(reject("no public constructor".to_string())),
        many => Err(reject(format!(
            "{} public constructors and none is marked #[Inject]",
            many.len()
        ))),
    }
}

/// Public members are reachable by everyone; others only with full access
/// or when the class opens its crate to the extension's crate.
pub(crate) fn check_access(
    class: &ClassDescriptor,
    member: &str,
    visibility: Visibility,
    extension: ExtensionKey,
    full_access: bool,
) -> Result<()> {
    if visibility == Visibility::Public || full_access || class.is_open_to(extension.module()) {
        return Ok(());
    }

    warn!(
        class = %class.type_key(),
        member,
        %visibility,
        extension = %extension,
        "Member not accessible"
    );
    Err(NazarError::Inaccessible(InaccessibleMemberError {
        class: class.type_key(),
        member: member.to_string(),
        extension,
        required_grant: extension.module(),
    }))
}

// ═══════════════════════════════════════════
// Matches
// ═══════════════════════════════════════════

/// A field whose markers route to one extension.
pub struct MatchedField<'a> {
    sink: OperationSink<'a>,
    class: &'a Arc<ClassDescriptor>,
    field: &'a FieldDescriptor,
    markers: Vec<MarkerInstance>,
    caps: FieldCaps,
    extension: ExtensionKey,
    full_access: bool,
}

impl MatchedField<'_> {
    pub fn field(&self) -> &FieldDescriptor {
        self.field
    }

    /// The class in the hierarchy that declares the field.
    pub fn declaring_class(&self) -> &Arc<ClassDescriptor> {
        self.class
    }

    pub fn bean_class(&self) -> TypeKey {
        self.sink.bean.class().type_key()
    }

    /// The matched markers, in declaration order.
    pub fn markers(&self) -> &[MarkerInstance] {
        &self.markers
    }

    /// The first matched marker of type `M`.
    pub fn marker<M: Marker>(&self) -> Option<&M> {
        self.markers.iter().find_map(|m| m.get::<M>())
    }

    /// Union of the access modes the matched markers grant.
    pub fn caps(&self) -> FieldCaps {
        self.caps
    }

    pub fn extension(&self) -> ExtensionKey {
        self.extension
    }

    /// Creates an operation reading the field.
    pub fn new_get_operation(&mut self) -> Result<OperationId> {
        self.new_operation(AccessMode::Get)
    }

    /// Creates an operation writing the field.
    pub fn new_set_operation(&mut self) -> Result<OperationId> {
        self.new_operation(AccessMode::Set)
    }

    fn new_operation(&mut self, mode: AccessMode) -> Result<OperationId> {
        let (allowed, name) = match mode {
            AccessMode::Get => (self.caps.gettable, "get"),
            _ => (self.caps.settable, "set"),
        };
        if !allowed {
            return Err(NazarError::AccessNotPermitted {
                extension: self.extension,
                class: self.class.type_key(),
                field: self.field.name,
                mode: name,
            });
        }

        check_access(
            self.class,
            self.field.name,
            self.field.visibility,
            self.extension,
            self.full_access,
        )?;

        let operation = operation::build_field(
            self.sink.next_id(),
            self.class,
            self.field,
            mode,
            Operator::Extension(self.extension),
        )?;
        Ok(self.sink.push(operation))
    }
}

/// A method whose markers route to one extension.
pub struct MatchedMethod<'a> {
    sink: OperationSink<'a>,
    class: &'a Arc<ClassDescriptor>,
    method: &'a MethodDescriptor,
    markers: Vec<MarkerInstance>,
    extension: ExtensionKey,
    full_access: bool,
}

impl MatchedMethod<'_> {
    pub fn method(&self) -> &MethodDescriptor {
        self.method
    }

    /// The class or interface that declares the method.
    pub fn declaring_class(&self) -> &Arc<ClassDescriptor> {
        self.class
    }

    pub fn bean_class(&self) -> TypeKey {
        self.sink.bean.class().type_key()
    }

    pub fn markers(&self) -> &[MarkerInstance] {
        &self.markers
    }

    pub fn marker<M: Marker>(&self) -> Option<&M> {
        self.markers.iter().find_map(|m| m.get::<M>())
    }

    pub fn extension(&self) -> ExtensionKey {
        self.extension
    }

    /// Creates an operation invoking the method. Its parameters are
    /// resolved after the member walk.
    pub fn new_operation(&mut self) -> Result<OperationId> {
        check_access(
            self.class,
            self.method.name,
            self.method.visibility,
            self.extension,
            self.full_access,
        )?;

        let operation = operation::build_method(
            self.sink.next_id(),
            self.class,
            self.method,
            Operator::Extension(self.extension),
        )?;
        Ok(self.sink.push(operation))
    }
}

// ═══════════════════════════════════════════
// Scanner
// ═══════════════════════════════════════════

struct Hit {
    marker: MarkerInstance,
    hook: Arc<HookDescriptor>,
}

struct HookGroup {
    extension: ExtensionKey,
    caps: FieldCaps,
    markers: Vec<MarkerInstance>,
}

/// Groups hits by extension in order of first appearance, merging field
/// capabilities within a group.
fn group_by_extension(hits: Vec<Hit>) -> Vec<HookGroup> {
    let mut groups: Vec<HookGroup> = Vec::new();
    for hit in hits {
        let caps = hit.hook.capabilities.field_caps();
        match groups.iter_mut().find(|g| g.extension == hit.hook.extension) {
            Some(group) => {
                group.caps = group.caps.union(caps);
                group.markers.push(hit.marker);
            }
            None => groups.push(HookGroup {
                extension: hit.hook.extension,
                caps,
                markers: vec![hit.marker],
            }),
        }
    }
    groups
}

/// Scans one bean against an [`ExtensionHost`].
///
/// # Examples
/// ```
/// use nazar_core::bean::Bean;
/// use nazar_core::class::{value, ClassDescriptor, ConstructorDescriptor, Visibility};
/// use nazar_core::prelude::*;
///
/// struct Clock;
///
/// let class = ClassDescriptor::builder::<Clock>()
///     .constructor(ConstructorDescriptor::new(Visibility::Public, |_| Ok(Some(value(Clock)))))
///     .build();
///
/// let container = Container::builder().build().unwrap();
/// let mut bean = Bean::from_class(class);
/// BeanScanner::scan(&container, &mut bean, None).unwrap();
///
/// assert_eq!(bean.operations().len(), 1);
/// assert!(bean.is_scanned());
/// ```
pub struct BeanScanner<'s> {
    pub(crate) host: &'s dyn ExtensionHost,
    pub(crate) bean: &'s mut Bean,
    pub(crate) model: Arc<HookModel>,
    pub(crate) contributors: Contributors,
    pub(crate) preset: Option<Box<dyn Handler>>,
    pub(crate) queue: VecDeque<OperationId>,
    pub(crate) processed: usize,
    pub(crate) bean_class: TypeKey,
    pub(crate) installer: BeanInstaller,
    pub(crate) namespace: Namespace,
}

impl<'s> BeanScanner<'s> {
    /// Scans `bean`, filling its operation list.
    ///
    /// `preset` replaces the handler of the extension that installed the
    /// bean, if that extension takes part in the scan. On error the bean is
    /// left partially populated and should be discarded.
    #[instrument(skip_all, fields(bean = %bean.class().type_key()))]
    pub fn scan(
        host: &'s dyn ExtensionHost,
        bean: &'s mut Bean,
        preset: Option<Box<dyn Handler>>,
    ) -> Result<()> {
        let class = Arc::clone(bean.class());
        if bean.is_scanned() {
            return Err(NazarError::AlreadyScanned {
                class: class.type_key(),
            });
        }

        let model = host.catalog().model_for(&class)?;
        let installer = bean.installer();
        let from_class = matches!(bean.source(), BeanSource::Class);

        let mut scanner = BeanScanner {
            host,
            bean,
            model,
            contributors: Contributors::new(),
            preset,
            queue: VecDeque::new(),
            processed: 0,
            bean_class: class.type_key(),
            installer,
            namespace: installer.namespace(),
        };

        scanner.process_class_markers(&class)?;
        if from_class {
            scanner.process_constructor(&class)?;
        }
        scanner.process_fields(&class)?;
        scanner.process_methods(&class)?;
        scanner.drain()?;
        scanner.contributors.finish()?;

        scanner.bean.scanned = true;
        info!(
            operations = scanner.bean.operations.len(),
            extensions = scanner.contributors.len(),
            "Bean scanned"
        );
        trace!(order = ?scanner.contributors.activation_order(), "Extension activation order");
        Ok(())
    }

    fn process_class_markers(&mut self, class: &Arc<ClassDescriptor>) -> Result<()> {
        for marker in class.markers() {
            if let Some(hook) = self.model.lookup(self.host.catalog(), &marker.key())? {
                trace!(marker = %marker.key(), extension = %hook.extension, "Class marker has a hook");
            }
        }
        Ok(())
    }

    fn process_constructor(&mut self, class: &Arc<ClassDescriptor>) -> Result<()> {
        let constructor = select_constructor(class)?;
        let operation = operation::build_constructor(
            OperationId(self.bean.operations.len()),
            class,
            constructor,
            self.installer.operator(),
            None,
        );
        self.sink().push(operation);
        self.drain()
    }

    fn sink(&mut self) -> OperationSink<'_> {
        OperationSink {
            bean: &mut *self.bean,
            queue: &mut self.queue,
            host: self.host,
        }
    }

    pub(crate) fn activate(&mut self, extension: ExtensionKey) -> Result<usize> {
        self.contributors.compute(
            extension,
            self.host,
            self.bean_class,
            self.installer,
            &mut self.preset,
        )
    }

    // ── Fields ──

    fn process_fields(&mut self, class: &Arc<ClassDescriptor>) -> Result<()> {
        let hierarchy = class.hierarchy();
        for level in hierarchy.iter().rev() {
            for field in level.fields() {
                self.process_field(level, field)?;
            }
        }
        Ok(())
    }

    fn process_field(&mut self, class: &Arc<ClassDescriptor>, field: &FieldDescriptor) -> Result<()> {
        let mut members = Vec::new();
        let mut bindings = Vec::new();

        for marker in &field.markers {
            let Some(hook) = self.model.lookup(self.host.catalog(), &marker.key())? else {
                continue;
            };
            let hit = Hit {
                marker: marker.clone(),
                hook,
            };
            if hit.hook.capabilities.binding {
                bindings.push(hit);
            } else if hit.hook.capabilities.field {
                members.push(hit);
            } else {
                trace!(field = field.name, marker = %marker.key(), "Method hook on a field, skipped");
            }
        }

        match (members.first(), bindings.as_slice()) {
            (Some(member), [binding, ..]) => Err(NazarError::ConflictingFieldMarkers {
                class: class.type_key(),
                field: field.name,
                member_marker: member.marker.key(),
                binding_marker: binding.marker.key(),
            }),
            (None, [first, second, ..]) => Err(NazarError::DuplicateBindingHook {
                target: format!("Field {}::{}", class.type_key().short_name(), field.name),
                first: first.marker.key(),
                second: second.marker.key(),
            }),
            (None, [binding]) => self.inject_field(class, field, binding.hook.extension),
            (None, []) => Ok(()),
            (Some(_), []) if members.len() == 1 => {
                let hit = members.remove(0);
                let group = HookGroup {
                    extension: hit.hook.extension,
                    caps: hit.hook.capabilities.field_caps(),
                    markers: vec![hit.marker],
                };
                self.dispatch_field(class, field, group)
            }
            (Some(_), []) => {
                for group in group_by_extension(members) {
                    self.dispatch_field(class, field, group)?;
                }
                Ok(())
            }
        }
    }

    fn dispatch_field(
        &mut self,
        class: &Arc<ClassDescriptor>,
        field: &FieldDescriptor,
        group: HookGroup,
    ) -> Result<()> {
        let position = self.activate(group.extension)?;
        let contributor = self.contributors.get_mut(position);

        trace!(
            field = field.name,
            extension = %group.extension,
            markers = group.markers.len(),
            "Field matched"
        );

        let mut matched = MatchedField {
            sink: OperationSink {
                bean: &mut *self.bean,
                queue: &mut self.queue,
                host: self.host,
            },
            class,
            field,
            markers: group.markers,
            caps: group.caps,
            extension: group.extension,
            full_access: contributor.full_access,
        };
        contributor.handler.on_matched_field(&mut matched)
    }

    /// A field carrying a single binding marker becomes an injection
    /// operation whose one slot is resolved like a parameter.
    fn inject_field(
        &mut self,
        class: &Arc<ClassDescriptor>,
        field: &FieldDescriptor,
        extension: ExtensionKey,
    ) -> Result<()> {
        let position = self.activate(extension)?;
        let full_access = self.contributors.get_mut(position).full_access;
        check_access(class, field.name, field.visibility, extension, full_access)?;

        let operation = operation::build_field(
            OperationId(self.bean.operations.len()),
            class,
            field,
            AccessMode::Inject,
            Operator::Extension(extension),
        )?;
        self.sink().push(operation);
        Ok(())
    }

    // ── Methods ──

    fn process_methods(&mut self, class: &Arc<ClassDescriptor>) -> Result<()> {
        let hierarchy = class.hierarchy();
        let mut public_seen: HashSet<MethodSignature> = HashSet::new();

        // Public methods, most derived first; an override hides its parents.
        for (depth, level) in hierarchy.iter().enumerate() {
            for method in level.methods() {
                if method.visibility != Visibility::Public || (method.is_static && depth > 0) {
                    continue;
                }
                if public_seen.insert(method.signature()) {
                    self.process_method(level, method)?;
                }
            }
        }

        for interface in class.all_interfaces() {
            for method in interface.methods() {
                if method.visibility == Visibility::Public
                    && method.is_default
                    && !method.is_static
                    && public_seen.insert(method.signature())
                {
                    self.process_method(&interface, method)?;
                }
            }
        }

        // Non-public methods, per level.
        let mut protected_seen: HashSet<MethodSignature> = HashSet::new();
        let mut package_seen: HashSet<(&'static str, MethodSignature)> = HashSet::new();

        for (depth, level) in hierarchy.iter().enumerate() {
            for method in level.methods() {
                if method.is_static && depth > 0 {
                    continue;
                }
                let signature = method.signature();
                let first = match method.visibility {
                    Visibility::Public => false,
                    Visibility::Protected => {
                        !public_seen.contains(&signature) && protected_seen.insert(signature)
                    }
                    Visibility::Package => {
                        !public_seen.contains(&signature)
                            && !protected_seen.contains(&signature)
                            && package_seen.insert((level.package(), signature))
                    }
                    Visibility::Private => true,
                };
                if first {
                    self.process_method(level, method)?;
                }
            }
        }
        Ok(())
    }

    fn process_method(
        &mut self,
        class: &Arc<ClassDescriptor>,
        method: &MethodDescriptor,
    ) -> Result<()> {
        let mut hits = Vec::new();
        for marker in &method.markers {
            let Some(hook) = self.model.lookup(self.host.catalog(), &marker.key())? else {
                continue;
            };
            if hook.capabilities.binding {
                trace!(method = method.name, marker = %marker.key(), "Binding hook on a method, skipped");
            } else if hook.capabilities.invokable {
                hits.push(Hit {
                    marker: marker.clone(),
                    hook,
                });
            } else {
                trace!(method = method.name, marker = %marker.key(), "Field hook on a method, skipped");
            }
        }

        for group in group_by_extension(hits) {
            self.dispatch_method(class, method, group)?;
        }
        Ok(())
    }

    fn dispatch_method(
        &mut self,
        class: &Arc<ClassDescriptor>,
        method: &MethodDescriptor,
        group: HookGroup,
    ) -> Result<()> {
        let position = self.activate(group.extension)?;
        let contributor = self.contributors.get_mut(position);

        trace!(
            method = method.name,
            extension = %group.extension,
            markers = group.markers.len(),
            "Method matched"
        );

        let mut matched = MatchedMethod {
            sink: OperationSink {
                bean: &mut *self.bean,
                queue: &mut self.queue,
                host: self.host,
            },
            class,
            method,
            markers: group.markers,
            extension: group.extension,
            full_access: contributor.full_access,
        };
        contributor.handler.on_matched_method(&mut matched)
    }
}
