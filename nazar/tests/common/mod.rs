#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use nazar::prelude::*;

/// Shared, append-only event log.
#[derive(Default, Clone)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, event: impl Into<String>) {
        self.0.lock().unwrap().push(event.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

// ── #[Arg(n)]: bind to call-site argument n ──

pub struct Arg(pub usize);

impl Marker for Arg {
    fn hook() -> Option<HookSpec> {
        Some(HookSpec::binding::<ArgumentExtension>())
    }
}

#[derive(Default)]
pub struct ArgumentExtension;

struct ArgumentHandler;

impl Handler for ArgumentHandler {
    fn on_binding_requested(&mut self, slot: &mut BindingSlot<'_>) -> Result<()> {
        let index = slot.marker().and_then(|m| m.get::<Arg>()).map_or(0, |a| a.0);
        slot.bind_argument(index)
    }
}

impl Extension for ArgumentExtension {
    fn new_handler(&self) -> Box<dyn Handler> {
        Box::new(ArgumentHandler)
    }
}

// ── #[Named("x")]: bind to a named service ──

pub struct Named(pub &'static str);

impl Marker for Named {
    fn hook() -> Option<HookSpec> {
        Some(HookSpec::binding::<NamingExtension>())
    }
}

#[derive(Default)]
pub struct NamingExtension;

struct NamingHandler;

impl Handler for NamingHandler {
    fn on_binding_requested(&mut self, slot: &mut BindingSlot<'_>) -> Result<()> {
        let name = slot
            .marker()
            .and_then(|m| m.get::<Named>())
            .map(|n| n.0)
            .ok_or_else(|| NazarError::extension(slot.extension(), "expected #[Named]"))?;
        let key = DependencyKey::for_type(slot.parameter().ty).with_name(name);
        slot.bind_service(key)
    }
}

impl Extension for NamingExtension {
    fn new_handler(&self) -> Box<dyn Handler> {
        Box::new(NamingHandler)
    }
}

// ── Logger: bound by type ──

#[derive(Debug, Clone, PartialEq)]
pub struct Logger {
    pub owner: String,
}

#[derive(Default)]
pub struct LoggingExtension;

struct LoggingHandler;

impl Handler for LoggingHandler {
    fn on_binding_requested(&mut self, slot: &mut BindingSlot<'_>) -> Result<()> {
        let owner = slot.bean_class().short_name();
        slot.bind_constant(Logger { owner })
    }
}

impl Extension for LoggingExtension {
    fn new_handler(&self) -> Box<dyn Handler> {
        Box::new(LoggingHandler)
    }
}

// ── #[Setting] (get) and #[Tunable] (set): field hooks ──

pub struct Setting;

impl Marker for Setting {
    fn hook() -> Option<HookSpec> {
        Some(HookSpec::field::<ConfigExtension>(FieldCaps::GET))
    }
}

pub struct Tunable;

impl Marker for Tunable {
    fn hook() -> Option<HookSpec> {
        Some(HookSpec::field::<ConfigExtension>(FieldCaps::SET))
    }
}

#[derive(Default, Clone)]
pub struct ConfigExtension {
    pub log: Log,
}

pub struct ConfigHandler {
    pub log: Log,
}

impl Handler for ConfigHandler {
    fn on_matched_field(&mut self, field: &mut MatchedField<'_>) -> Result<()> {
        let caps = field.caps();
        self.log.push(format!(
            "{} get={} set={} markers={}",
            field.field().name,
            caps.gettable,
            caps.settable,
            field.markers().len()
        ));
        if caps.gettable {
            field.new_get_operation()?;
        }
        if caps.settable {
            field.new_set_operation()?;
        }
        Ok(())
    }
}

impl Extension for ConfigExtension {
    fn new_handler(&self) -> Box<dyn Handler> {
        Box::new(ConfigHandler {
            log: self.log.clone(),
        })
    }
}

// ── #[Scheduled]: method hook ──

pub struct Scheduled;

impl Marker for Scheduled {
    fn hook() -> Option<HookSpec> {
        Some(HookSpec::method::<SchedulerExtension>())
    }
}

/// Plain marker; a class may declare its hook.
pub struct Audited;

impl Marker for Audited {}

#[derive(Default, Clone)]
pub struct SchedulerExtension {
    pub log: Log,
}

struct SchedulerHandler {
    log: Log,
}

impl Handler for SchedulerHandler {
    fn on_scan_start(&mut self, context: &ScanContext) -> Result<()> {
        self.log.push(format!("start {}", context.bean_class.short_name()));
        Ok(())
    }

    fn on_scan_end(&mut self, context: &ScanContext) -> Result<()> {
        self.log.push(format!("end {}", context.bean_class.short_name()));
        Ok(())
    }

    fn on_matched_method(&mut self, method: &mut MatchedMethod<'_>) -> Result<()> {
        self.log.push(format!(
            "{}::{}",
            method.declaring_class().type_key().short_name(),
            method.method().name
        ));
        method.new_operation()?;
        Ok(())
    }
}

impl Extension for SchedulerExtension {
    fn new_handler(&self) -> Box<dyn Handler> {
        Box::new(SchedulerHandler {
            log: self.log.clone(),
        })
    }
}

// ── Misbehaving extensions ──

/// Binds every request twice.
pub struct Twice;

impl Marker for Twice {
    fn hook() -> Option<HookSpec> {
        Some(HookSpec::binding::<DoubleBindExtension>())
    }
}

#[derive(Default)]
pub struct DoubleBindExtension;

struct DoubleBindHandler;

impl Handler for DoubleBindHandler {
    fn on_binding_requested(&mut self, slot: &mut BindingSlot<'_>) -> Result<()> {
        slot.bind_constant(1i32)?;
        slot.bind_constant(2i32)
    }
}

impl Extension for DoubleBindExtension {
    fn new_handler(&self) -> Box<dyn Handler> {
        Box::new(DoubleBindHandler)
    }
}

/// Routed to an extension that never binds.
pub struct Ignored;

impl Marker for Ignored {
    fn hook() -> Option<HookSpec> {
        Some(HookSpec::binding::<IgnoringExtension>())
    }
}

#[derive(Default)]
pub struct IgnoringExtension;

struct IgnoringHandler;

impl Handler for IgnoringHandler {
    fn on_binding_requested(&mut self, _slot: &mut BindingSlot<'_>) -> Result<()> {
        Ok(())
    }
}

impl Extension for IgnoringExtension {
    fn new_handler(&self) -> Box<dyn Handler> {
        Box::new(IgnoringHandler)
    }
}

/// Field hook whose extension handles nothing.
pub struct Watched;

impl Marker for Watched {
    fn hook() -> Option<HookSpec> {
        Some(HookSpec::field::<SilentExtension>(FieldCaps::GET))
    }
}

#[derive(Default)]
pub struct SilentExtension;

struct SilentHandler;

impl Handler for SilentHandler {}

impl Extension for SilentExtension {
    fn new_handler(&self) -> Box<dyn Handler> {
        Box::new(SilentHandler)
    }
}

// ── Beans ──

pub struct Widget {
    pub id: i32,
}

/// `Widget(#[Arg(0)] id: i32)`
pub fn widget_class() -> Arc<ClassDescriptor> {
    ClassDescriptor::builder::<Widget>()
        .constructor(
            ConstructorDescriptor::new(Visibility::Public, |args| {
                Ok(Some(value(Widget {
                    id: *arg::<i32>(args, 0)?,
                })))
            })
            .param(ParameterDescriptor::of::<i32>("id").marker(Arg(0))),
        )
        .build()
}

pub fn no_op() -> impl Fn(&[Option<Value>]) -> Result<Option<Value>> + Send + Sync + 'static {
    |_| Ok(None)
}

pub fn install(container: &Container, class: Arc<ClassDescriptor>) -> Result<Arc<Bean>> {
    container.install_bean(class, BeanSource::Class, BeanInstaller::Application, None)
}
