use proc_macro2::TokenStream;
use quote::quote;
use syn::{Data, DeriveInput, Error, Fields, Ident, Result};

use crate::util::{Errors, reject_generics, runtime};

/// Representations whose values may not fit in 32 bits.
const WIDE_REPRS: &[&str] = &["i64", "u64", "u32", "isize", "usize", "i128", "u128"];

fn is_wide(input: &DeriveInput) -> Result<bool> {
    let mut wide = false;

    for attr in input.attrs.iter().filter(|attr| attr.path().is_ident("repr")) {
        attr.parse_nested_meta(|meta| {
            if let Some(ident) = meta.path.get_ident() {
                wide |= WIDE_REPRS.iter().any(|repr| ident == repr);
            }
            // `align(N)` and `packed(N)` carry arguments.
            if meta.input.peek(syn::token::Paren) {
                let arguments;
                syn::parenthesized!(arguments in meta.input);
                arguments.parse::<TokenStream>()?;
            }
            Ok(())
        })?;
    }

    Ok(wide)
}

pub(crate) fn expand(input: DeriveInput) -> Result<TokenStream> {
    reject_generics(&input, "Enumeration")?;

    let Data::Enum(data) = &input.data else {
        return Err(Error::new_spanned(&input.ident, "#[derive(Enumeration)] can only be used on enums"));
    };

    let mut errors = Errors::default();
    for variant in &data.variants {
        if !matches!(variant.fields, Fields::Unit) {
            errors.push(Error::new_spanned(variant, "enumeration variants cannot carry fields"));
        }
    }
    if data.variants.is_empty() {
        errors.push(Error::new_spanned(&input.ident, "an enumeration needs at least one variant"));
    }
    errors.finish()?;

    let rt = runtime();
    let name = &input.ident;
    let wide = is_wide(&input)?;
    let variants: Vec<&Ident> = data.variants.iter().map(|variant| &variant.ident).collect();

    Ok(quote! {
        impl #rt::rules::Enumeration for #name {
            const WIDE: bool = #wide;

            fn to_repr(&self) -> i64 {
                match self {
                    #(Self::#variants => Self::#variants as i64,)*
                }
            }

            fn from_repr(repr: i64) -> ::core::option::Option<Self> {
                #(
                    if repr == Self::#variants as i64 {
                        return ::core::option::Option::Some(Self::#variants);
                    }
                )*
                ::core::option::Option::None
            }
        }

        impl #rt::rules::FieldValue for #name {
            fn encode(&self) -> #rt::error::MappingResult<#rt::bson::Bson> {
                #rt::rules::encode_enumeration(self)
            }

            fn decode(value: &#rt::bson::Bson) -> #rt::error::MappingResult<Self> {
                #rt::rules::decode_enumeration(value)
            }
        }
    })
}
