use std::collections::HashMap;

use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::{
    Attribute, Data, DeriveInput, Error, Field, Fields, Ident, LitInt, LitStr, Path, Result, Token, Type,
    Visibility, spanned::Spanned,
};

use crate::util::{Errors, reject_generics, runtime, type_name};

const ID_KEY: &str = "_id";
const DEFAULT_BINARY_SUBTYPE: u8 = 0;

/// One `#[record(...)]` option as written, kept with its span for diagnostics.
#[derive(Default)]
struct FieldOptions {
    rename: Option<LitStr>,
    ignore: Option<Span>,
    id: Option<Span>,
    encode_with: Option<Path>,
    decode_with: Option<Path>,
    binary: Option<(Span, u8)>,
    structural: Option<Span>,
}

fn set_once<T>(slot: &mut Option<T>, value: T, name: &str, span: Span) -> Result<()> {
    if slot.is_some() {
        return Err(Error::new(span, format!("duplicate `{name}` annotation")));
    }
    *slot = Some(value);
    Ok(())
}

/// Parses a hook path, written either bare (`encode_with = my::hook`) or quoted.
fn parse_hook(input: syn::parse::ParseStream) -> Result<Path> {
    if input.peek(LitStr) {
        input.parse::<LitStr>()?.parse()
    } else {
        input.parse()
    }
}

impl FieldOptions {
    fn parse(attrs: &[Attribute]) -> Result<Self> {
        let mut options = FieldOptions::default();

        for attr in attrs.iter().filter(|attr| attr.path().is_ident("record")) {
            attr.parse_nested_meta(|meta| {
                let span = meta.path.span();

                if meta.path.is_ident("rename") {
                    let name: LitStr = meta.value()?.parse()?;
                    set_once(&mut options.rename, name, "rename", span)
                } else if meta.path.is_ident("ignore") {
                    set_once(&mut options.ignore, span, "ignore", span)
                } else if meta.path.is_ident("id") {
                    set_once(&mut options.id, span, "id", span)
                } else if meta.path.is_ident("encode_with") {
                    let hook = parse_hook(meta.value()?)?;
                    set_once(&mut options.encode_with, hook, "encode_with", span)
                } else if meta.path.is_ident("decode_with") {
                    let hook = parse_hook(meta.value()?)?;
                    set_once(&mut options.decode_with, hook, "decode_with", span)
                } else if meta.path.is_ident("binary") {
                    let subtype = if meta.input.peek(Token![=]) {
                        meta.value()?.parse::<LitInt>()?.base10_parse::<u8>()?
                    } else {
                        DEFAULT_BINARY_SUBTYPE
                    };
                    set_once(&mut options.binary, (span, subtype), "binary", span)
                } else if meta.path.is_ident("structural") {
                    set_once(&mut options.structural, span, "structural", span)
                } else {
                    Err(meta.error("unknown record attribute"))
                }
            })?;
        }

        if let Some(id) = options.id {
            let combined = options.rename.is_some()
                || options.ignore.is_some()
                || options.encode_with.is_some()
                || options.decode_with.is_some()
                || options.binary.is_some()
                || options.structural.is_some();
            if combined {
                return Err(Error::new(id, "`id` cannot be combined with other record attributes"));
            }
        }

        if let (Some((binary, _)), Some(_)) = (options.binary, options.structural) {
            return Err(Error::new(binary, "`binary` and `structural` are mutually exclusive"));
        }

        Ok(options)
    }
}

/// How a field is written and read.
enum Mapping {
    Ignored,
    Identity,
    Mapped {
        encode_with: Option<Path>,
        decode_with: Option<Path>,
        binary: Option<u8>,
        structural: bool,
    },
}

struct RecordField<'a> {
    ident: &'a Ident,
    ty: &'a Type,
    vis: &'a Visibility,
    key: String,
    key_span: Span,
    mapping: Mapping,
}

impl<'a> RecordField<'a> {
    fn new(field: &'a Field) -> Result<Self> {
        let ident = field
            .ident
            .as_ref()
            .ok_or_else(|| Error::new_spanned(field, "record fields must be named"))?;
        let options = FieldOptions::parse(&field.attrs)?;

        let (key, key_span) = match (&options.rename, options.id) {
            (_, Some(span)) => (ID_KEY.to_string(), span),
            (Some(rename), None) => (rename.value(), rename.span()),
            (None, None) => (ident.to_string(), ident.span()),
        };

        let mapping = if options.ignore.is_some() {
            Mapping::Ignored
        } else if options.id.is_some() {
            Mapping::Identity
        } else {
            Mapping::Mapped {
                encode_with: options.encode_with,
                decode_with: options.decode_with,
                binary: options.binary.map(|(_, subtype)| subtype),
                structural: options.structural.is_some(),
            }
        };

        Ok(Self {
            ident,
            ty: &field.ty,
            vis: &field.vis,
            key,
            key_span,
            mapping,
        })
    }

    fn is_eligible(&self) -> bool {
        !matches!(self.mapping, Mapping::Ignored)
    }

    fn descriptor(&self, rt: &TokenStream) -> TokenStream {
        let source_name = self.ident.to_string();
        let document_name = &self.key;
        let declared_type = type_name(self.ty);
        let ignored = matches!(self.mapping, Mapping::Ignored);

        let (custom_encode, custom_decode, binary, structural) = match &self.mapping {
            Mapping::Mapped {
                encode_with,
                decode_with,
                binary,
                structural,
            } => (
                encode_with.as_ref().map(|path| type_name(path)),
                decode_with.as_ref().map(|path| type_name(path)),
                *binary,
                *structural,
            ),
            _ => (None, None, None, false),
        };

        let custom_encode = option_tokens(custom_encode.map(|path| quote!(#path)));
        let custom_decode = option_tokens(custom_decode.map(|path| quote!(#path)));
        let binary = option_tokens(binary.map(|subtype| quote!(#subtype)));

        quote! {
            #rt::record::FieldDescriptor {
                source_name: #source_name,
                document_name: #document_name,
                ignored: #ignored,
                custom_encode: #custom_encode,
                custom_decode: #custom_decode,
                binary_subtype: #binary,
                structural: #structural,
                type_name: #declared_type,
            }
        }
    }

    fn encode(&self, rt: &TokenStream) -> TokenStream {
        let ident = self.ident;
        let key = &self.key;

        match &self.mapping {
            Mapping::Ignored => quote!(),
            Mapping::Identity => quote! {
                #rt::record::encode_identity(&mut document, &self.#ident);
            },
            Mapping::Mapped {
                encode_with: Some(hook),
                ..
            } => quote! {
                #rt::record::encode_hooked_field(&mut document, #key, #hook(self))?;
            },
            Mapping::Mapped {
                binary: Some(subtype),
                ..
            } => quote! {
                #rt::record::encode_binary_field(&mut document, #key, &self.#ident, #subtype);
            },
            Mapping::Mapped { structural: true, .. } => quote! {
                #rt::record::encode_structural_field(&mut document, #key, &self.#ident)?;
            },
            Mapping::Mapped { .. } => quote! {
                #rt::record::encode_field(&mut document, #key, &self.#ident)?;
            },
        }
    }

    fn decode(&self, rt: &TokenStream) -> TokenStream {
        let ident = self.ident;
        let key = &self.key;

        match &self.mapping {
            Mapping::Ignored => quote!(),
            Mapping::Identity => quote! {
                #rt::record::decode_identity(document, &mut record.#ident)?;
            },
            Mapping::Mapped {
                decode_with: Some(hook),
                ..
            } => quote! {
                #rt::record::decode_hooked_field(document, #key, &mut record.#ident, #hook)?;
            },
            Mapping::Mapped {
                binary: Some(_),
                ..
            } => quote! {
                #rt::record::decode_binary_field(document, #key, &mut record.#ident)?;
            },
            Mapping::Mapped { structural: true, .. } => quote! {
                #rt::record::decode_structural_field(document, #key, &mut record.#ident)?;
            },
            Mapping::Mapped { .. } => quote! {
                #rt::record::decode_field(document, #key, &mut record.#ident)?;
            },
        }
    }

    fn accessor(&self, rt: &TokenStream) -> TokenStream {
        let ident = self.ident;
        let ty = self.ty;
        let vis = self.vis;
        let key = &self.key;
        let doc = format!("Conditions on `{key}`.");

        quote! {
            #[doc = #doc]
            #vis fn #ident(&mut self) -> #rt::query::FieldQuery<'_, #ty, Self> {
                #rt::query::FieldQuery::new(self, #key)
            }
        }
    }
}

fn option_tokens(value: Option<TokenStream>) -> TokenStream {
    match value {
        Some(value) => quote!(::core::option::Option::Some(#value)),
        None => quote!(::core::option::Option::None),
    }
}

fn check_fields(fields: &[RecordField<'_>], input: &DeriveInput) -> Result<()> {
    let mut errors = Errors::default();
    let mut seen: HashMap<&str, &Ident> = HashMap::new();
    let mut identity: Option<&Ident> = None;

    for field in fields.iter().filter(|field| field.is_eligible()) {
        if let Some(first) = seen.insert(&field.key, field.ident) {
            errors.push(Error::new(
                field.key_span,
                format!("document name `{}` is already used by field `{first}`", field.key),
            ));
        }

        match field.mapping {
            Mapping::Identity => {
                if let Some(first) = identity.replace(field.ident) {
                    errors.push(Error::new(
                        field.key_span,
                        format!("only one identity field is allowed, `{first}` is already one"),
                    ));
                }
            }
            _ if field.key == ID_KEY => errors.push(Error::new(
                field.key_span,
                "`_id` is reserved for the identity field; use #[record(id)]",
            )),
            _ => {}
        }
    }

    if !fields.iter().any(RecordField::is_eligible) {
        errors.push(Error::new_spanned(
            &input.ident,
            "a record needs at least one field that is not ignored",
        ));
    }

    errors.finish()
}

pub(crate) fn expand(input: DeriveInput) -> Result<TokenStream> {
    reject_generics(&input, "Record")?;

    let named = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(named) => &named.named,
            _ => {
                return Err(Error::new_spanned(
                    &input.ident,
                    "#[derive(Record)] needs a struct with named fields",
                ));
            }
        },
        _ => {
            return Err(Error::new_spanned(
                &input.ident,
                "#[derive(Record)] can only be used on structs",
            ));
        }
    };

    let mut errors = Errors::default();
    let mut fields = Vec::with_capacity(named.len());
    for field in named {
        match RecordField::new(field) {
            Ok(field) => fields.push(field),
            Err(err) => errors.push(err),
        }
    }
    errors.finish()?;
    check_fields(&fields, &input)?;

    let rt = runtime();
    let name = &input.ident;
    let vis = &input.vis;
    let record_name = name.to_string();
    let query = format_ident!("{}Query", name);
    let query_doc = format!("Typed query builder for [`{name}`].");

    let descriptors = fields.iter().map(|field| field.descriptor(&rt));
    let field_count = fields.len();
    // The identity is written and read first, wherever it is declared.
    let ordered: Vec<&RecordField<'_>> = fields
        .iter()
        .filter(|field| matches!(field.mapping, Mapping::Identity))
        .chain(fields.iter().filter(|field| !matches!(field.mapping, Mapping::Identity)))
        .collect();
    let encoders = ordered.iter().map(|field| field.encode(&rt));
    let decoders = ordered.iter().map(|field| field.decode(&rt));
    let accessors = fields
        .iter()
        .filter(|field| field.is_eligible())
        .map(|field| field.accessor(&rt));

    let identity = fields
        .iter()
        .find(|field| matches!(field.mapping, Mapping::Identity));
    let identity_name = option_tokens(identity.map(|field| {
        let name = field.ident.to_string();
        quote!(#name)
    }));
    let identity_methods = identity.map(|field| {
        let ident = field.ident;
        quote! {
            fn id(&self) -> ::core::option::Option<#rt::bson::oid::ObjectId> {
                self.#ident
            }

            fn set_id(&mut self, id: #rt::bson::oid::ObjectId) {
                self.#ident = ::core::option::Option::Some(id);
            }
        }
    });

    Ok(quote! {
        impl #rt::record::Record for #name {
            type Query = #query;

            fn descriptor() -> &'static #rt::record::RecordDescriptor {
                static FIELDS: [#rt::record::FieldDescriptor; #field_count] = [#(#descriptors),*];
                static DESCRIPTOR: #rt::record::RecordDescriptor = #rt::record::RecordDescriptor {
                    type_name: #record_name,
                    identity: #identity_name,
                    fields: &FIELDS,
                };
                &DESCRIPTOR
            }

            fn to_document(&self) -> #rt::error::MappingResult<#rt::bson::Document> {
                let mut document = #rt::bson::Document::new();
                #(#encoders)*
                ::core::result::Result::Ok(document)
            }

            fn from_document(document: &#rt::bson::Document) -> #rt::error::MappingResult<Self> {
                let mut record = <Self as ::core::default::Default>::default();
                #(#decoders)*
                ::core::result::Result::Ok(record)
            }

            #identity_methods
        }

        impl #rt::rules::FieldValue for #name {
            fn encode(&self) -> #rt::error::MappingResult<#rt::bson::Bson> {
                #rt::record::encode_record(self)
            }

            fn decode(value: &#rt::bson::Bson) -> #rt::error::MappingResult<Self> {
                #rt::record::decode_record(value)
            }
        }

        #[doc = #query_doc]
        #[derive(Debug, Clone, Default, PartialEq)]
        #vis struct #query(#rt::query::Query<#name>);

        impl #rt::query::QueryExpression for #query {
            type Record = #name;

            fn from_query(query: #rt::query::Query<#name>) -> Self {
                Self(query)
            }

            fn query(&self) -> &#rt::query::Query<#name> {
                &self.0
            }

            fn query_mut(&mut self) -> &mut #rt::query::Query<#name> {
                &mut self.0
            }

            fn into_query(self) -> #rt::query::Query<#name> {
                self.0
            }
        }

        impl #query {
            #(#accessors)*
        }
    })
}
