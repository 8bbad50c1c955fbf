//! Procedural macros for the docmodel project.
//!
//! - `#[derive(Record)]` builds the field table, the document mapper and the typed
//!   `<Name>Query` builder of a struct.
//! - `#[derive(Variant)]` turns an enum of single-payload variants into a tagged
//!   `{"type", "value"}` value.
//! - `#[derive(Enumeration)]` maps a fieldless enum to its integer discriminant.
//!
//! Generated code refers to the runtime through the `docmodel` facade crate.

mod enumeration;
mod record;
mod util;
mod variant;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `Record`, `FieldValue` and a typed query builder for a struct with named fields.
///
/// Field attributes, under `#[record(...)]`:
///
/// - `rename = "key"`: store the field under `key`
/// - `ignore`: leave the field out of the document
/// - `id`: the identity field, an `Option<ObjectId>` stored under `_id`
/// - `encode_with = path`: `fn(&Self) -> MappingResult<Bson>` producing the stored value
/// - `decode_with = path`: `fn(&Document) -> MappingResult<FieldType>` reading it back
/// - `binary` / `binary = <subtype>`: store a one-byte element sequence as BSON binary
/// - `structural`: map the field through its serde implementation
#[proc_macro_derive(Record, attributes(record))]
pub fn derive_record(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    record::expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derives `Variant`, `Alternative`, `From` and `FieldValue` for an enum whose
/// variants each hold one payload.
///
/// `#[variant(label = "...")]` on a variant overrides its stored label, which
/// defaults to the variant name.
#[proc_macro_derive(Variant, attributes(variant))]
pub fn derive_variant(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    variant::expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Derives `Enumeration` and `FieldValue` for a fieldless enum.
///
/// The enum must also be `Clone + Copy`. A 64-bit or `u32` `#[repr]` stores values
/// as `int64`; anything else as `int32`.
#[proc_macro_derive(Enumeration)]
pub fn derive_enumeration(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    enumeration::expand(input)
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
