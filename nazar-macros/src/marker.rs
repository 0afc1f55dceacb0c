use darling::util::Flag;
use darling::{FromDeriveInput, FromMeta};
use proc_macro2::TokenStream;
use quote::quote;
use syn::DeriveInput;

#[derive(Debug, Default, FromMeta)]
struct FieldArgs {
    #[darling(default)]
    get: Flag,
    #[darling(default)]
    set: Flag,
}

#[derive(Debug, FromDeriveInput)]
#[darling(attributes(hook), supports(struct_any, enum_any))]
struct MarkerArgs {
    ident: syn::Ident,
    generics: syn::Generics,
    #[darling(default)]
    extension: Option<syn::Path>,
    #[darling(default)]
    field: Option<FieldArgs>,
    #[darling(default)]
    method: Flag,
    #[darling(default)]
    binding: Flag,
}

pub(crate) fn derive_marker_impl(input: DeriveInput) -> darling::Result<TokenStream> {
    let args = MarkerArgs::from_derive_input(&input)?;
    let ident = &args.ident;
    let (impl_generics, ty_generics, where_clause) = args.generics.split_for_impl();

    let Some(extension) = &args.extension else {
        if args.field.is_some() || args.method.is_present() || args.binding.is_present() {
            return Err(darling::Error::custom(
                "hook capabilities need an extension: add `extension = \"Path\"`",
            )
            .with_span(ident));
        }
        return Ok(quote! {
            impl #impl_generics ::nazar::marker::Marker for #ident #ty_generics #where_clause {}
        });
    };

    let member = args.field.is_some() || args.method.is_present();
    if member && args.binding.is_present() {
        return Err(darling::Error::custom(
            "a hook cannot both match members (`field`, `method`) and bind parameters (`binding`)",
        )
        .with_span(ident));
    }
    if !member && !args.binding.is_present() {
        return Err(darling::Error::custom(
            "declare at least one capability: `field(get, set)`, `method` or `binding`",
        )
        .with_span(extension));
    }

    let field = args.field.as_ref().map(|caps| {
        let get = caps.get.is_present();
        let set = caps.set.is_present();
        quote! {
            .with_field(::nazar::marker::FieldCaps { gettable: #get, settable: #set })
        }
    });
    let method = args.method.is_present().then(|| quote!(.with_method()));
    let binding = args.binding.is_present().then(|| quote!(.with_binding()));

    Ok(quote! {
        impl #impl_generics ::nazar::marker::Marker for #ident #ty_generics #where_clause {
            fn hook() -> ::core::option::Option<::nazar::marker::HookSpec> {
                ::core::option::Option::Some(
                    ::nazar::marker::HookSpec::for_extension(
                        ::nazar::key::ExtensionKey::of::<#extension>(),
                    )
                    #field
                    #method
                    #binding
                )
            }
        }
    })
}
