//! # Nazar: introspection and binding core for dependency injection
//!
//! Nazar scans bean classes described by explicit
//! [`ClassDescriptor`](class::ClassDescriptor)s, routes the markers on
//! their members to container extensions, and resolves every parameter of
//! the resulting operations to a constant, a call-site argument, a nested
//! operation or a service.
//!
//! ```rust
//! use nazar::prelude::*;
//!
//! struct Widget {
//!     id: i32,
//! }
//!
//! let class = ClassDescriptor::builder::<Widget>()
//!     .constructor(
//!         ConstructorDescriptor::new(Visibility::Public, |args| {
//!             Ok(Some(value(Widget { id: *arg::<i32>(args, 0)? })))
//!         })
//!         .param(ParameterDescriptor::of::<i32>("id")),
//!     )
//!     .build();
//!
//! let container = Container::builder()
//!     .singleton_value(7i32)
//!     .bean(class)
//!     .build()
//!     .expect("Failed to build container");
//!
//! let widget: std::sync::Arc<Widget> = container.resolve().expect("Failed to resolve");
//! assert_eq!(widget.id, 7);
//! ```

pub use nazar_core::*;
pub use nazar_derive::*;
pub use nazar_support::*;

pub mod prelude {
    pub use nazar_core::prelude::*;
    pub use nazar_derive::Marker;
}
