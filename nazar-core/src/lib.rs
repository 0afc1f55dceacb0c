//! Core of the Nazar container: class introspection, hook resolution,
//! bean scanning and parameter binding.
//!
//! The pieces, bottom up:
//!
//! - [`class`]: explicit class descriptors (the member registry);
//! - [`marker`] and [`hook`]: markers, the hooks they declare, and the
//!   per-class hook model;
//! - [`scanner`]: the member walk and the deferred resolution queue;
//! - [`operation`] and [`binding`]: what a scan produces;
//! - [`container`]: services, extensions and build-time bean wiring.

pub mod bean;
pub mod binding;
pub mod class;
pub mod container;
mod contributor;
pub mod error;
pub mod extension;
mod graph;
pub mod hook;
pub mod key;
pub mod marker;
mod naming;
pub mod operation;
pub mod registry;
mod resolver;
pub mod scanner;
pub mod settings;

pub use container::prelude;
pub use error::{NazarError, Result};
pub use key::{DependencyKey, ExtensionKey, MarkerKey, TypeKey};

#[doc(hidden)]
pub use inventory;
