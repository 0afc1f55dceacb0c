//! # Nazar Support
//!
//! Shared utilities for the Nazar introspection crates.
//!
//! This crate provides:
//! - Text rendering for error messages and operation names
//! - Deployable-unit (crate) and package derivation from type names

pub mod rendering;
