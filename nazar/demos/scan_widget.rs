//! Scans a bean with a method hook and a type-driven binding, then prints
//! the operations the scan produced.

use std::sync::Arc;

use nazar::prelude::*;

// === Markers and extensions ===

/// Marks methods to run on a schedule.
#[derive(Marker)]
#[hook(extension = "SchedulerExtension", method)]
struct Scheduled;

#[derive(Default)]
struct SchedulerExtension;

struct SchedulerHandler;

impl Handler for SchedulerHandler {
    fn on_matched_method(&mut self, method: &mut MatchedMethod<'_>) -> Result<()> {
        println!("⏱  scheduling {}", method.method().name);
        method.new_operation()?;
        Ok(())
    }
}

impl Extension for SchedulerExtension {
    fn new_handler(&self) -> Box<dyn Handler> {
        Box::new(SchedulerHandler)
    }
}

#[derive(Debug, Clone)]
struct Logger {
    owner: String,
}

#[derive(Default)]
struct LoggingExtension;

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

// === The bean ===

struct Config {
    url: String,
}

struct Widget {
    config: Arc<Config>,
    logger: Logger,
}

impl Widget {
    fn refresh(&self) {
        println!("[{}] refreshing from {}", self.logger.owner, self.config.url);
    }
}

fn widget_class() -> Arc<ClassDescriptor> {
    ClassDescriptor::builder::<Widget>()
        .constructor(
            ConstructorDescriptor::new(Visibility::Public, |args| {
                let config = args[0]
                    .clone()
                    .and_then(|config| config.downcast::<Config>().ok())
                    .ok_or_else(|| NazarError::invocation("Widget::new", "config missing"))?;
                let logger = arg::<Logger>(args, 1)?.clone();
                Ok(Some(value(Widget { config, logger })))
            })
            .param(ParameterDescriptor::of::<Config>("config"))
            .param(ParameterDescriptor::of::<Logger>("logger")),
        )
        .method(
            MethodDescriptor::new("refresh", Visibility::Public)
                .marker(Scheduled)
                .invoker(|args| {
                    arg::<Widget>(args, 0)?.refresh();
                    Ok(None)
                }),
        )
        .build()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("nazar_core=debug")
        .init();

    let container = Container::builder()
        .singleton_value(Config {
            url: "postgres://localhost/widgets".to_string(),
        })
        .type_hook::<Logger, LoggingExtension>()
        .build()?;

    println!("✅ Container built: {container:?}");

    let bean = container.install_bean(
        widget_class(),
        BeanSource::Class,
        BeanInstaller::Application,
        None,
    )?;
    println!("{}", bean.describe());

    let widget = bean.instantiate(&container)?;
    for operation in bean.operations() {
        if operation.mode() == AccessMode::Invoke {
            bean.invoke(operation.id(), &container, &[Some(Arc::clone(&widget))])?;
        }
    }

    println!("🎉 Done, extensions installed: {:?}", container.installed_extensions());
    Ok(())
}
