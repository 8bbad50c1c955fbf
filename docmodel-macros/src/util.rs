use proc_macro2::TokenStream;
use quote::{ToTokens, quote};
use syn::{DeriveInput, Error, Result};

/// Path of the runtime crate as seen from the expansion site.
pub(crate) fn runtime() -> TokenStream {
    quote!(::docmodel)
}

pub(crate) fn reject_generics(input: &DeriveInput, derive: &str) -> Result<()> {
    if input.generics.params.is_empty() && input.generics.where_clause.is_none() {
        Ok(())
    } else {
        Err(Error::new_spanned(
            &input.generics,
            format!("#[derive({derive})] does not support generic types"),
        ))
    }
}

/// Renders a type the way it was written, without the token spacing.
pub(crate) fn type_name(ty: &impl ToTokens) -> String {
    let rendered = ty.to_token_stream().to_string();
    let mut name = String::with_capacity(rendered.len());

    for piece in rendered.split(' ') {
        let keep_space = name
            .chars()
            .last()
            .is_some_and(|last| last.is_alphanumeric() || last == '_')
            && piece.chars().next().is_some_and(|first| first.is_alphanumeric() || first == '_');

        if keep_space || name.ends_with(',') {
            name.push(' ');
        }
        name.push_str(piece);
    }

    name
}

/// Collects errors so that one expansion reports every problem at once.
#[derive(Default)]
pub(crate) struct Errors(Option<Error>);

impl Errors {
    pub(crate) fn push(&mut self, error: Error) {
        match &mut self.0 {
            Some(existing) => existing.combine(error),
            None => self.0 = Some(error),
        }
    }

    pub(crate) fn finish(self) -> Result<()> {
        match self.0 {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use syn::Type;

    #[test]
    fn test_type_name() {
        let ty: Type = syn::parse_quote!(Option<Vec<u8>>);
        assert_eq!(type_name(&ty), "Option<Vec<u8>>");

        let ty: Type = syn::parse_quote!(HashMap<String, i32>);
        assert_eq!(type_name(&ty), "HashMap<String, i32>");

        let ty: Type = syn::parse_quote!(&'static str);
        assert_eq!(type_name(&ty), "&'static str");
    }
}
