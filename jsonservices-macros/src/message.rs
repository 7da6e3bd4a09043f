//! Implementation of `#[derive(Message)]`
//!
//! Input:
//! ```ignore
//! #[derive(Serialize, Message)]
//! #[message(name = "rpc.version", response = VersionResponse)]
//! struct VersionRequest {}
//! ```
//!
//! Generated output:
//! ```ignore
//! impl ::jsonservices_core::Message for VersionRequest {
//!     type Response = VersionResponse;
//!
//!     fn message_name(&self) -> Option<&str> {
//!         Some("rpc.version")
//!     }
//! }
//! ```

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, LitStr, Type};

/// Parsed `#[message(...)]` attribute
#[derive(Default)]
struct MessageAttrs {
    name: Option<LitStr>,
    response: Option<Type>,
}

impl MessageAttrs {
    fn parse(input: &DeriveInput) -> syn::Result<Self> {
        let mut attrs = MessageAttrs::default();

        for attr in input.attrs.iter().filter(|a| a.path().is_ident("message")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let name: LitStr = meta.value()?.parse()?;
                    if name.value().is_empty() {
                        return Err(syn::Error::new(name.span(), "message name can't be empty"));
                    }
                    attrs.name = Some(name);
                    Ok(())
                } else if meta.path.is_ident("response") {
                    attrs.response = Some(meta.value()?.parse()?);
                    Ok(())
                } else {
                    Err(meta.error("expected `name` or `response`"))
                }
            })?;
        }

        Ok(attrs)
    }
}

pub fn derive_message_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let attrs = MessageAttrs::parse(input)?;
    let ident = &input.ident;

    let name = attrs
        .name
        .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));
    let response = match attrs.response {
        Some(ty) => quote! { #ty },
        None => quote! { ::jsonservices_core::Void },
    };
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        impl #impl_generics ::jsonservices_core::Message for #ident #ty_generics #where_clause {
            type Response = #response;

            fn message_name(&self) -> ::std::option::Option<&str> {
                ::std::option::Option::Some(#name)
            }
        }
    })
}
