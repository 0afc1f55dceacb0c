mod common;

use std::sync::{Arc, Mutex};

use common::*;
use nazar::prelude::*;

fn container() -> Container {
    Container::builder().build().unwrap()
}

#[test]
fn argument_binding_yields_single_constructor_operation() {
    let container = container();
    let bean = install(&container, widget_class()).unwrap();

    assert_eq!(bean.operations().len(), 1);
    let ctor = &bean.operations()[0];
    assert_eq!(ctor.mode(), AccessMode::Construct);
    assert_eq!(ctor.operator(), Operator::Application);
    assert_eq!(ctor.contract().arguments, vec![TypeKey::of::<i32>()]);
    assert!(matches!(ctor.binding(0), Some(Binding::Argument(0))));

    let widget = bean
        .invoke(ctor.id(), &container, &[Some(value(5i32))])
        .unwrap()
        .unwrap();
    assert_eq!(widget.downcast_ref::<Widget>().unwrap().id, 5);
}

#[test]
fn invoke_checks_arity() {
    let container = container();
    let bean = install(&container, widget_class()).unwrap();
    let ctor = bean.constructor().unwrap().id();

    assert!(matches!(
        bean.invoke(ctor, &container, &[]),
        Err(NazarError::ArityMismatch {
            expected: 1,
            actual: 0,
            ..
        })
    ));
}

#[test]
fn scanning_is_deterministic() {
    let container = Container::builder()
        .install_extension(SchedulerExtension::default())
        .build()
        .unwrap();

    let class = ClassDescriptor::builder::<Widget>()
        .constructor(ConstructorDescriptor::new(Visibility::Public, no_op()))
        .method(MethodDescriptor::new("a", Visibility::Public).marker(Scheduled).invoker(no_op()))
        .method(MethodDescriptor::new("b", Visibility::Private).marker(Scheduled).invoker(no_op()))
        .build();

    let first = install(&container, Arc::clone(&class)).unwrap();
    let second = install(&container, class).unwrap();

    assert_eq!(first.describe(), second.describe());
    assert_eq!(first.operation_names(), second.operation_names());
}

#[test]
fn a_bean_is_scanned_once() {
    let container = container();
    let mut bean = Bean::from_class(widget_class());
    container.scan(&mut bean, None).unwrap();

    assert!(matches!(
        container.scan(&mut bean, None),
        Err(NazarError::AlreadyScanned { .. })
    ));
}

#[test]
fn binding_twice_fails() {
    let class = ClassDescriptor::builder::<Widget>()
        .constructor(
            ConstructorDescriptor::new(Visibility::Public, no_op())
                .param(ParameterDescriptor::of::<i32>("id").marker(Twice)),
        )
        .build();

    match install(&container(), class).unwrap_err() {
        NazarError::AlreadyBound {
            index, existing, ..
        } => {
            assert_eq!(index, 0);
            assert_eq!(existing, "constant");
        }
        other => panic!("Expected AlreadyBound, got: {other:?}"),
    }
}

#[test]
fn handler_must_bind_requested_slot() {
    let class = ClassDescriptor::builder::<Widget>()
        .constructor(
            ConstructorDescriptor::new(Visibility::Public, no_op())
                .param(ParameterDescriptor::of::<i32>("id").marker(Ignored)),
        )
        .build();

    assert!(matches!(
        install(&container(), class),
        Err(NazarError::BindingNotSet { index: 0, .. })
    ));
}

#[test]
fn default_handler_rejects_matches() {
    let class = ClassDescriptor::builder::<Widget>()
        .constructor(ConstructorDescriptor::new(Visibility::Public, no_op()))
        .field(
            FieldDescriptor::new::<i32>("id", Visibility::Public)
                .marker(Watched)
                .getter(no_op()),
        )
        .build();

    assert!(matches!(
        install(&container(), class),
        Err(NazarError::UnhandledHook {
            what: "field matches",
            ..
        })
    ));
}

// ═══════════════════════════════════════════
// Constructor selection
// ═══════════════════════════════════════════

#[test]
fn inject_marker_selects_constructor() {
    let class = ClassDescriptor::builder::<Widget>()
        .constructor(
            ConstructorDescriptor::new(Visibility::Public, no_op())
                .param(ParameterDescriptor::of::<String>("unused")),
        )
        .constructor(
            ConstructorDescriptor::new(Visibility::Private, no_op())
                .marker(Inject)
                .param(ParameterDescriptor::of::<i32>("id").marker(Arg(0))),
        )
        .build();

    let bean = install(&container(), class).unwrap();
    let ctor = bean.constructor().unwrap();
    assert_eq!(ctor.parameters()[0].name, "id");
}

#[test]
fn ambiguous_constructors_are_rejected() {
    let class = ClassDescriptor::builder::<Widget>()
        .constructor(ConstructorDescriptor::new(Visibility::Public, no_op()))
        .constructor(
            ConstructorDescriptor::new(Visibility::Public, no_op())
                .param(ParameterDescriptor::of::<i32>("id").marker(Arg(0))),
        )
        .build();

    assert!(matches!(
        install(&container(), class),
        Err(NazarError::NoEligibleConstructor { .. })
    ));
}

#[test]
fn instance_beans_have_no_constructor_operation() {
    let container = container();
    let bean = container
        .install_bean(
            widget_class(),
            BeanSource::Instance(value(Widget { id: 9 })),
            BeanInstaller::Application,
            None,
        )
        .unwrap();

    assert!(bean.operations().is_empty());
    let instance = bean.instantiate(&container).unwrap();
    assert_eq!(instance.downcast_ref::<Widget>().unwrap().id, 9);
}

// ═══════════════════════════════════════════
// Fields
// ═══════════════════════════════════════════

struct Server {
    port: Mutex<u16>,
}

fn port_field() -> FieldDescriptor {
    FieldDescriptor::new::<u16>("port", Visibility::Private)
        .getter(|args| {
            let server: &Server = arg(args, 0)?;
            Ok(Some(value(*server.port.lock().unwrap())))
        })
        .setter(|args| {
            let server: &Server = arg(args, 0)?;
            *server.port.lock().unwrap() = *arg::<u16>(args, 1)?;
            Ok(None)
        })
}

#[test]
fn field_markers_of_one_extension_are_merged() {
    let config = ConfigExtension::default();
    let container = Container::builder()
        .install_extension(config.clone())
        .build()
        .unwrap();

    let class = ClassDescriptor::builder::<Server>()
        .field(port_field().marker(Setting).marker(Tunable))
        .build();

    let server = value(Server {
        port: Mutex::new(80),
    });
    let bean = container
        .install_bean(
            class,
            BeanSource::Instance(Arc::clone(&server)),
            BeanInstaller::Application,
            None,
        )
        .unwrap();

    assert_eq!(config.log.entries(), vec!["port get=true set=true markers=2"]);

    let names = bean.operation_names();
    let find = |wanted: &str| {
        names
            .iter()
            .find(|(_, name)| name.as_str() == wanted)
            .map(|(id, _)| *id)
            .unwrap()
    };

    let set = find("set_port");
    assert!(bean.operation(set).unwrap().bindings().is_empty());
    bean.invoke(set, &container, &[Some(Arc::clone(&server)), Some(value(8080u16))])
        .unwrap();

    let port = bean
        .invoke(find("get_port"), &container, &[Some(server)])
        .unwrap()
        .unwrap();
    assert_eq!(port.downcast_ref::<u16>(), Some(&8080));
}

#[test]
fn private_field_of_foreign_class_is_inaccessible() {
    let container = Container::builder()
        .install_extension(ConfigExtension::default())
        .build()
        .unwrap();

    let class = ClassDescriptor::builder::<std::time::Duration>()
        .field(
            FieldDescriptor::new::<u64>("secs", Visibility::Private)
                .marker(Setting)
                .getter(no_op()),
        )
        .build();

    let err = container
        .install_bean(class, BeanSource::SourceLess, BeanInstaller::Application, None)
        .unwrap_err();
    let extension_crate = ExtensionKey::of::<ConfigExtension>().module();
    match &err {
        NazarError::Inaccessible(inner) => {
            assert_eq!(inner.member, "secs");
            assert_eq!(inner.required_grant, extension_crate);
        }
        other => panic!("Expected Inaccessible, got: {other:?}"),
    }
    assert!(err.to_string().contains(&format!("opens_to(\"{extension_crate}\")")));
}

#[test]
fn opened_class_grants_access() {
    let container = Container::builder()
        .install_extension(ConfigExtension::default())
        .build()
        .unwrap();

    let class = ClassDescriptor::builder::<std::time::Duration>()
        .opens_to(ExtensionKey::of::<ConfigExtension>().module())
        .field(
            FieldDescriptor::new::<u64>("secs", Visibility::Private)
                .marker(Setting)
                .getter(no_op()),
        )
        .build();

    let bean = container
        .install_bean(class, BeanSource::SourceLess, BeanInstaller::Application, None)
        .unwrap();
    assert_eq!(bean.operations().len(), 1);
}

#[test]
fn installing_extension_has_full_access_and_preset_handler() {
    let preset_log = Log::default();
    let container = Container::builder()
        .install_extension(ConfigExtension::default())
        .build()
        .unwrap();

    let class = ClassDescriptor::builder::<std::time::Duration>()
        .field(
            FieldDescriptor::new::<u64>("secs", Visibility::Private)
                .marker(Setting)
                .getter(no_op()),
        )
        .build();

    let bean = container
        .install_bean(
            class,
            BeanSource::SourceLess,
            BeanInstaller::Extension(ExtensionKey::of::<ConfigExtension>()),
            Some(Box::new(ConfigHandler {
                log: preset_log.clone(),
            })),
        )
        .unwrap();

    assert_eq!(preset_log.entries(), vec!["secs get=true set=false markers=1"]);
    assert_eq!(
        bean.operations()[0].operator(),
        Operator::Extension(ExtensionKey::of::<ConfigExtension>())
    );
}

#[test]
fn member_and_binding_markers_conflict_on_a_field() {
    let class = ClassDescriptor::builder::<Server>()
        .field(port_field().marker(Setting).marker(Named("port")))
        .build();

    let err = container()
        .install_bean(class, BeanSource::SourceLess, BeanInstaller::Application, None)
        .unwrap_err();
    match err {
        NazarError::ConflictingFieldMarkers {
            field,
            member_marker,
            binding_marker,
            ..
        } => {
            assert_eq!(field, "port");
            assert_eq!(member_marker, MarkerKey::of::<Setting>());
            assert_eq!(binding_marker, MarkerKey::of::<Named>());
        }
        other => panic!("Expected ConflictingFieldMarkers, got: {other:?}"),
    }
}

#[test]
fn binding_marker_on_field_becomes_injection() {
    struct Client {
        url: Mutex<Option<String>>,
    }

    let container = Container::builder()
        .named_value("primary", String::from("db://primary"))
        .build()
        .unwrap();

    let class = ClassDescriptor::builder::<Client>()
        .field(
            FieldDescriptor::new::<String>("url", Visibility::Private)
                .marker(Named("primary"))
                .setter(|args| {
                    let client: &Client = arg(args, 0)?;
                    let url: &String = arg(args, 1)?;
                    *client.url.lock().unwrap() = Some(url.clone());
                    Ok(None)
                }),
        )
        .build();

    let client = value(Client {
        url: Mutex::new(None),
    });
    let bean = container
        .install_bean(
            class,
            BeanSource::Instance(Arc::clone(&client)),
            BeanInstaller::Application,
            None,
        )
        .unwrap();

    let inject = &bean.operations()[0];
    assert_eq!(inject.mode(), AccessMode::Inject);
    assert_eq!(bean.operation_name(inject.id()).as_deref(), Some("inject_url"));
    assert!(matches!(inject.binding(0), Some(Binding::Service { .. })));

    bean.invoke(inject.id(), &container, &[Some(Arc::clone(&client))])
        .unwrap();
    let url = client.downcast_ref::<Client>().unwrap().url.lock().unwrap().clone();
    assert_eq!(url.as_deref(), Some("db://primary"));
}

// ═══════════════════════════════════════════
// Methods and hierarchy
// ═══════════════════════════════════════════

struct Base;
struct Derived;
struct Greets;

fn derived_class() -> Arc<ClassDescriptor> {
    let greets = ClassDescriptor::interface::<Greets>()
        .method(
            MethodDescriptor::new("greet", Visibility::Public)
                .default_method()
                .marker(Scheduled)
                .invoker(no_op()),
        )
        .build();

    let base = ClassDescriptor::builder::<Base>()
        .method(MethodDescriptor::new("run", Visibility::Public).marker(Scheduled).invoker(no_op()))
        .method(MethodDescriptor::new("tick", Visibility::Private).marker(Scheduled).invoker(no_op()))
        .method(
            MethodDescriptor::new("boot", Visibility::Public)
                .static_method()
                .marker(Scheduled)
                .invoker(no_op()),
        )
        .method(MethodDescriptor::new("save", Visibility::Protected).marker(Scheduled).invoker(no_op()))
        .build();

    ClassDescriptor::builder::<Derived>()
        .extends(base)
        .implements(greets)
        .constructor(ConstructorDescriptor::new(Visibility::Public, no_op()))
        .method(MethodDescriptor::new("run", Visibility::Public).marker(Scheduled).invoker(no_op()))
        .method(MethodDescriptor::new("tick", Visibility::Private).marker(Scheduled).invoker(no_op()))
        .method(MethodDescriptor::new("save", Visibility::Protected).marker(Scheduled).invoker(no_op()))
        .build()
}

#[test]
fn overridden_methods_match_once() {
    let scheduler = SchedulerExtension::default();
    let container = Container::builder()
        .install_extension(scheduler.clone())
        .build()
        .unwrap();

    let bean = install(&container, derived_class()).unwrap();

    assert_eq!(
        scheduler.log.entries(),
        vec![
            "start Derived",
            "Derived::run",
            "Greets::greet",
            "Derived::tick",
            "Derived::save",
            "Base::tick",
            "end Derived",
        ]
    );
    // Constructor plus five methods.
    assert_eq!(bean.operations().len(), 6);

    let names: Vec<String> = bean.operation_names().values().cloned().collect();
    assert_eq!(names, vec!["new", "run", "greet", "tick", "save", "tick#2"]);
}

#[test]
fn superclass_hook_declarations_apply_to_subclasses() {
    let scheduler = SchedulerExtension::default();
    let container = Container::builder()
        .install_extension(scheduler.clone())
        .build()
        .unwrap();

    let base = ClassDescriptor::builder::<Base>()
        .declare_hook::<Audited>(HookSpec::method::<SchedulerExtension>())
        .build();
    let derived = ClassDescriptor::builder::<Derived>()
        .extends(base)
        .constructor(ConstructorDescriptor::new(Visibility::Public, no_op()))
        .method(MethodDescriptor::new("audit", Visibility::Public).marker(Audited).invoker(no_op()))
        .build();

    install(&container, derived).unwrap();
    assert!(scheduler.log.entries().contains(&"Derived::audit".to_string()));
}

#[test]
fn subclass_cannot_reroute_a_declared_hook() {
    let base = ClassDescriptor::builder::<Base>()
        .declare_hook::<Audited>(HookSpec::method::<SchedulerExtension>())
        .build();
    let derived = ClassDescriptor::builder::<Derived>()
        .extends(base)
        .declare_hook::<Audited>(HookSpec::method::<ConfigExtension>())
        .constructor(ConstructorDescriptor::new(Visibility::Public, no_op()))
        .build();

    assert!(matches!(
        install(&container(), derived),
        Err(NazarError::ConflictingHook(_))
    ));
}

#[test]
fn undeclared_plain_markers_are_ignored() {
    let class = ClassDescriptor::builder::<Widget>()
        .marker(Audited)
        .constructor(ConstructorDescriptor::new(Visibility::Public, no_op()))
        .method(MethodDescriptor::new("audit", Visibility::Public).marker(Audited).invoker(no_op()))
        .build();

    let bean = install(&container(), class).unwrap();
    assert_eq!(bean.operations().len(), 1);
}

// ═══════════════════════════════════════════
// Several extensions in one scan
// ═══════════════════════════════════════════

/// Field hook of a second extension that records what it is shown.
struct Tracked;

impl Marker for Tracked {
    fn hook() -> Option<HookSpec> {
        Some(HookSpec::field::<TrackerExtension>(FieldCaps::GET))
    }
}

#[derive(Default, Clone)]
struct TrackerExtension {
    log: Log,
}

struct TrackerHandler {
    log: Log,
}

impl Handler for TrackerHandler {
    fn on_scan_start(&mut self, _context: &ScanContext) -> Result<()> {
        self.log.push("tracker start");
        Ok(())
    }

    fn on_scan_end(&mut self, _context: &ScanContext) -> Result<()> {
        self.log.push("tracker end");
        Ok(())
    }

    fn on_matched_field(&mut self, field: &mut MatchedField<'_>) -> Result<()> {
        let markers: Vec<String> = field
            .markers()
            .iter()
            .map(|m| m.key().type_key().short_name())
            .collect();
        self.log.push(format!(
            "tracker field {} [{}]",
            field.field().name,
            markers.join(", ")
        ));
        field.new_get_operation()?;
        Ok(())
    }
}

impl Extension for TrackerExtension {
    fn new_handler(&self) -> Box<dyn Handler> {
        Box::new(TrackerHandler {
            log: self.log.clone(),
        })
    }
}

fn id_field() -> FieldDescriptor {
    FieldDescriptor::new::<i32>("id", Visibility::Private).getter(no_op())
}

#[test]
fn scan_end_follows_activation_order() {
    let log = Log::default();
    let container = Container::builder()
        .install_extension(TrackerExtension { log: log.clone() })
        .install_extension(SchedulerExtension { log: log.clone() })
        .build()
        .unwrap();

    let class = ClassDescriptor::builder::<Widget>()
        .constructor(ConstructorDescriptor::new(Visibility::Public, no_op()))
        .field(id_field().marker(Tracked))
        .method(MethodDescriptor::new("tick", Visibility::Public).marker(Scheduled).invoker(no_op()))
        .build();

    install(&container, class).unwrap();
    assert_eq!(
        log.entries(),
        vec![
            "tracker start",
            "tracker field id [Tracked]",
            "start Widget",
            "Widget::tick",
            "tracker end",
            "end Widget",
        ]
    );
}

#[test]
fn field_markers_of_different_extensions_are_matched_separately() {
    let config = ConfigExtension::default();
    let tracker = TrackerExtension::default();
    let container = Container::builder()
        .install_extension(config.clone())
        .install_extension(tracker.clone())
        .build()
        .unwrap();

    let class = ClassDescriptor::builder::<Widget>()
        .constructor(ConstructorDescriptor::new(Visibility::Public, no_op()))
        .field(id_field().marker(Tracked).marker(Setting))
        .build();

    let bean = install(&container, class).unwrap();

    assert_eq!(config.log.entries(), vec!["id get=true set=false markers=1"]);
    assert_eq!(
        tracker.log.entries(),
        vec!["tracker start", "tracker field id [Tracked]", "tracker end"]
    );

    let operators: Vec<Operator> = bean.operations()[1..].iter().map(Operation::operator).collect();
    assert_eq!(
        operators,
        vec![
            Operator::Extension(ExtensionKey::of::<TrackerExtension>()),
            Operator::Extension(ExtensionKey::of::<ConfigExtension>()),
        ]
    );
}

// ═══════════════════════════════════════════
// Null constants
// ═══════════════════════════════════════════

/// Binds the parameter to null.
struct Nothing;

impl Marker for Nothing {
    fn hook() -> Option<HookSpec> {
        Some(HookSpec::binding::<NullExtension>())
    }
}

#[derive(Default)]
struct NullExtension;

struct NullHandler;

impl Handler for NullHandler {
    fn on_binding_requested(&mut self, slot: &mut BindingSlot<'_>) -> Result<()> {
        slot.bind_null()
    }
}

impl Extension for NullExtension {
    fn new_handler(&self) -> Box<dyn Handler> {
        Box::new(NullHandler)
    }
}

#[test]
fn null_cannot_bind_a_primitive() {
    let class = ClassDescriptor::builder::<Widget>()
        .constructor(
            ConstructorDescriptor::new(Visibility::Public, no_op())
                .param(ParameterDescriptor::of::<i32>("id").marker(Nothing)),
        )
        .build();

    match install(&container(), class).unwrap_err() {
        NazarError::NullPrimitive {
            index, expected, ..
        } => {
            assert_eq!(index, 0);
            assert_eq!(expected, TypeKey::of::<i32>());
        }
        other => panic!("Expected NullPrimitive, got: {other:?}"),
    }
}

#[test]
fn null_binds_a_reference_parameter() {
    let class = ClassDescriptor::builder::<Widget>()
        .constructor(
            ConstructorDescriptor::new(Visibility::Public, no_op())
                .param(ParameterDescriptor::of::<String>("label").marker(Nothing)),
        )
        .build();

    let bean = install(&container(), class).unwrap();
    assert!(matches!(
        bean.constructor().unwrap().binding(0),
        Some(Binding::Constant(None))
    ));
}
