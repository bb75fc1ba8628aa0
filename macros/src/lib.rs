//! Procedural macros for the topicbus event bus.
//!
//! - `#[derive(Event)]`: Implements `topicbus::Event` for your type, preserving generics and bounds.
//!   The topic comes from `#[event(topic = "...")]` on the type, on each enum variant, or both
//!   (a variant attribute overrides the type-level one). For enums, also generates `name()`
//!   returning the variant name.
//!
//! Usage:
//! ```rust,ignore
//! use topicbus::Event;
//!
//! #[derive(Debug, Event)]
//! #[event(topic = "orders")]
//! struct OrderPlaced { id: u64 }
//!
//! #[derive(Debug, Event)]
//! #[event(topic = "sensors")]
//! enum Reading {
//!     Temperature(f64),
//!     #[event(topic = "alarms")]
//!     Overheat,
//! }
//! ```
use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, LitStr, parse_macro_input};

#[proc_macro_derive(Event, attributes(event))]
pub fn derive_event(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    expand_event(&input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

fn expand_event(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();
    let type_topic = topic_attr(&input.attrs)?;

    let methods = match &input.data {
        Data::Enum(data_enum) => {
            let mut topic_arms = Vec::with_capacity(data_enum.variants.len());
            let mut name_arms = Vec::with_capacity(data_enum.variants.len());

            for variant in &data_enum.variants {
                let variant_ident = &variant.ident;
                let variant_name = variant_ident.to_string();

                let topic = match topic_attr(&variant.attrs)? {
                    Some(topic) => topic,
                    None => type_topic.clone().ok_or_else(|| {
                        syn::Error::new_spanned(
                            variant,
                            "variant has no topic: add `#[event(topic = \"...\")]` to the variant or the enum",
                        )
                    })?,
                };

                // Handle different field types (unit, tuple, struct)
                let pattern = match &variant.fields {
                    Fields::Unit => quote! { Self::#variant_ident },
                    Fields::Unnamed(_) => quote! { Self::#variant_ident(..) },
                    Fields::Named(_) => quote! { Self::#variant_ident { .. } },
                };

                topic_arms.push(quote! { #pattern => #topic });
                name_arms.push(quote! {
                    #pattern => ::std::borrow::Cow::Borrowed(#variant_name)
                });
            }

            quote! {
                fn topic(&self) -> &str {
                    match *self {
                        #(#topic_arms),*
                    }
                }

                fn name(&self) -> ::std::borrow::Cow<'static, str> {
                    match *self {
                        #(#name_arms),*
                    }
                }
            }
        }
        // Structs and unions share a single topic and keep the default name()
        _ => {
            let topic = type_topic.ok_or_else(|| {
                syn::Error::new_spanned(
                    ident,
                    "`#[derive(Event)]` requires `#[event(topic = \"...\")]` on the type",
                )
            })?;
            quote! {
                fn topic(&self) -> &str {
                    #topic
                }
            }
        }
    };

    Ok(quote! {
        impl #impl_generics ::topicbus::Event for #ident #ty_generics #where_clause {
            #methods
        }
    })
}

fn topic_attr(attrs: &[Attribute]) -> syn::Result<Option<LitStr>> {
    let mut topic = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("event")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("topic") {
                let value: LitStr = meta.value()?.parse()?;
                if value.value().is_empty() {
                    return Err(meta.error("topic must not be empty"));
                }
                topic = Some(value);
                Ok(())
            } else {
                Err(meta.error("unsupported event attribute, expected `topic`"))
            }
        })?;
    }
    Ok(topic)
}
