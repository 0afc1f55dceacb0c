//! Procedural macros for Nazar.
//!
//! - [`Marker`](macro@Marker): implements `nazar::marker::Marker`, with an
//!   optional hook declaration.

use proc_macro::TokenStream;
use syn::{parse_macro_input, DeriveInput};

mod marker;

/// Derives `nazar::marker::Marker`.
///
/// Without a `#[hook(...)]` attribute the type is a plain marker. With
/// one, it declares the hook that routes the marker to an extension:
///
/// ```rust,ignore
/// // Fields marked #[Setting] are matched by ConfigExtension, which may
/// // read and write them.
/// #[derive(Marker)]
/// #[hook(extension = "ConfigExtension", field(get, set))]
/// struct Setting(&'static str);
///
/// #[derive(Marker)]
/// #[hook(extension = "SchedulerExtension", method)]
/// struct Every { seconds: u64 }
///
/// #[derive(Marker)]
/// #[hook(extension = "NamingExtension", binding)]
/// struct Named(&'static str);
/// ```
///
/// The extension must implement `Extension + Default`. A hook is either a
/// member hook (`field` and/or `method`) or a `binding` hook, never both.
#[proc_macro_derive(Marker, attributes(hook))]
pub fn derive_marker(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    marker::derive_marker_impl(input)
        .unwrap_or_else(|err| err.write_errors())
        .into()
}
