use std::collections::HashMap;

use proc_macro2::{Span, TokenStream};
use quote::quote;
use syn::{Data, DeriveInput, Error, Fields, Ident, LitStr, Result, Type, Variant};

use crate::util::{Errors, reject_generics, runtime, type_name};

struct Alternative<'a> {
    ident: &'a Ident,
    payload: &'a Type,
    label: String,
    label_span: Span,
}

fn parse_label(variant: &Variant) -> Result<Option<LitStr>> {
    let mut label = None;

    for attr in variant.attrs.iter().filter(|attr| attr.path().is_ident("variant")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("label") {
                if label.is_some() {
                    return Err(meta.error("duplicate `label` annotation"));
                }
                label = Some(meta.value()?.parse::<LitStr>()?);
                Ok(())
            } else {
                Err(meta.error("unknown variant attribute"))
            }
        })?;
    }

    Ok(label)
}

impl<'a> Alternative<'a> {
    fn new(variant: &'a Variant) -> Result<Self> {
        let payload = match &variant.fields {
            Fields::Unnamed(fields) if fields.unnamed.len() == 1 => &fields.unnamed[0].ty,
            _ => {
                return Err(Error::new_spanned(
                    variant,
                    "each variant must hold exactly one unnamed payload, like `Circle(Circle)`",
                ));
            }
        };

        let (label, label_span) = match parse_label(variant)? {
            Some(label) => (label.value(), label.span()),
            None => (variant.ident.to_string(), variant.ident.span()),
        };

        Ok(Self {
            ident: &variant.ident,
            payload,
            label,
            label_span,
        })
    }
}

pub(crate) fn expand(input: DeriveInput) -> Result<TokenStream> {
    reject_generics(&input, "Variant")?;

    let Data::Enum(data) = &input.data else {
        return Err(Error::new_spanned(&input.ident, "#[derive(Variant)] can only be used on enums"));
    };

    if data.variants.is_empty() {
        return Err(Error::new_spanned(
            &input.ident,
            "a variant needs at least one alternative; model the empty case with Option",
        ));
    }

    let mut errors = Errors::default();
    let mut alternatives = Vec::with_capacity(data.variants.len());
    for variant in &data.variants {
        match Alternative::new(variant) {
            Ok(alternative) => alternatives.push(alternative),
            Err(err) => errors.push(err),
        }
    }
    errors.finish()?;

    let mut errors = Errors::default();
    let mut labels: HashMap<&str, &Ident> = HashMap::new();
    let mut payloads: HashMap<String, &Ident> = HashMap::new();
    for alternative in &alternatives {
        if let Some(first) = labels.insert(&alternative.label, alternative.ident) {
            errors.push(Error::new(
                alternative.label_span,
                format!("label `{}` is already used by `{first}`", alternative.label),
            ));
        }
        if let Some(first) = payloads.insert(type_name(alternative.payload), alternative.ident) {
            errors.push(Error::new_spanned(
                alternative.payload,
                format!("payload type is already held by `{first}`"),
            ));
        }
    }
    errors.finish()?;

    let rt = runtime();
    let name = &input.ident;

    let labels = alternatives.iter().map(|alternative| &alternative.label);
    let label_arms = alternatives.iter().map(|alternative| {
        let ident = alternative.ident;
        let label = &alternative.label;
        quote!(Self::#ident(_) => #label)
    });
    let encode_arms = alternatives.iter().map(|alternative| {
        let ident = alternative.ident;
        quote!(Self::#ident(payload) => #rt::rules::FieldValue::encode(payload))
    });
    let decode_arms = alternatives.iter().map(|alternative| {
        let ident = alternative.ident;
        let payload = alternative.payload;
        let label = &alternative.label;
        quote! {
            #label => ::core::option::Option::Some(
                <#payload as #rt::rules::FieldValue>::decode(value).map(Self::#ident)
            )
        }
    });

    let per_alternative = alternatives.iter().map(|alternative| {
        let ident = alternative.ident;
        let payload = alternative.payload;
        let label = &alternative.label;
        let others = (alternatives.len() > 1).then(|| quote!(_ => ::core::option::Option::None,));
        let others_by_value = (alternatives.len() > 1).then(|| quote!(other => ::core::result::Result::Err(other),));

        quote! {
            impl #rt::variant::Alternative<#payload> for #name {
                const LABEL: &'static str = #label;

                fn payload(&self) -> ::core::option::Option<&#payload> {
                    match self {
                        Self::#ident(payload) => ::core::option::Option::Some(payload),
                        #others
                    }
                }

                fn payload_mut(&mut self) -> ::core::option::Option<&mut #payload> {
                    match self {
                        Self::#ident(payload) => ::core::option::Option::Some(payload),
                        #others
                    }
                }

                fn into_payload(self) -> ::core::result::Result<#payload, Self> {
                    match self {
                        Self::#ident(payload) => ::core::result::Result::Ok(payload),
                        #others_by_value
                    }
                }
            }

            impl ::core::convert::From<#payload> for #name {
                fn from(payload: #payload) -> Self {
                    Self::#ident(payload)
                }
            }
        }
    });

    Ok(quote! {
        impl #rt::variant::Variant for #name {
            const LABELS: &'static [&'static str] = &[#(#labels),*];

            fn label(&self) -> &'static str {
                match self {
                    #(#label_arms,)*
                }
            }

            fn encode_payload(&self) -> #rt::error::MappingResult<#rt::bson::Bson> {
                match self {
                    #(#encode_arms,)*
                }
            }

            fn decode_payload(
                label: &str,
                value: &#rt::bson::Bson,
            ) -> ::core::option::Option<#rt::error::MappingResult<Self>> {
                match label {
                    #(#decode_arms,)*
                    _ => ::core::option::Option::None,
                }
            }
        }

        #(#per_alternative)*

        impl #rt::rules::FieldValue for #name {
            fn encode(&self) -> #rt::error::MappingResult<#rt::bson::Bson> {
                #rt::variant::encode_variant(self)
            }

            fn decode(value: &#rt::bson::Bson) -> #rt::error::MappingResult<Self> {
                #rt::variant::decode_variant(value)
            }
        }
    })
}
