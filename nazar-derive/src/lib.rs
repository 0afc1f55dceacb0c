//! Derive macros for Nazar, re-exported from `nazar-macros`.

pub use nazar_macros::*;
