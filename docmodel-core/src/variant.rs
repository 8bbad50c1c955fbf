//! Tagged variants: values holding exactly one of a fixed set of alternatives.
//!
//! A variant is an enum whose cases each carry one payload, declared with
//! `#[derive(Variant)]`. It is stored as `{"type": <label>, "value": <payload>}`;
//! an empty variant is modelled as `Option<V>` and stored as `null`.
//!
//! ```ignore
//! #[derive(Debug, Clone, PartialEq, Variant)]
//! pub enum Shape {
//!     Circle(Circle),
//!     #[variant(label = "sq")]
//!     Square(Square),
//! }
//!
//! let shape = Shape::from(Circle { radius: 3 });
//! assert_eq!(shape.encode()?, bson!({ "type": "Circle", "value": { "radius": 3 } }));
//! assert_eq!(shape.get::<Circle>()?.radius, 3);
//! ```

use bson::{Bson, doc};

use crate::error::{MappingError, MappingResult};

/// Key holding the label of the live alternative.
pub const TYPE_KEY: &str = "type";
/// Key holding the payload of the live alternative.
pub const VALUE_KEY: &str = "value";

/// A closed set of labelled alternatives.
pub trait Variant: Sized {
    /// Labels of every alternative, in declaration order.
    const LABELS: &'static [&'static str];

    /// Label of the live alternative.
    fn label(&self) -> &'static str;

    /// Encodes the live payload.
    ///
    /// # Errors
    ///
    /// Returns a [`MappingError`] if the payload cannot be encoded.
    fn encode_payload(&self) -> MappingResult<Bson>;

    /// Decodes the payload of the alternative named `label`.
    ///
    /// Returns `None` if no alternative has that label.
    fn decode_payload(label: &str, value: &Bson) -> Option<MappingResult<Self>>;

    /// Returns the payload if the live alternative holds a `P`.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::VariantLabel`] if another alternative is live.
    fn get<P>(&self) -> MappingResult<&P>
    where
        Self: Alternative<P>,
    {
        <Self as Alternative<P>>::payload(self).ok_or_else(|| MappingError::VariantLabel {
            expected: <Self as Alternative<P>>::LABEL,
            held: self.label(),
        })
    }

    /// Returns the payload mutably if the live alternative holds a `P`.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::VariantLabel`] if another alternative is live.
    fn get_mut<P>(&mut self) -> MappingResult<&mut P>
    where
        Self: Alternative<P>,
    {
        let held = self.label();
        <Self as Alternative<P>>::payload_mut(self).ok_or(MappingError::VariantLabel {
            expected: <Self as Alternative<P>>::LABEL,
            held,
        })
    }

    /// Consumes the variant and returns its `P` payload.
    ///
    /// # Errors
    ///
    /// Returns [`MappingError::VariantLabel`] if another alternative is live.
    fn into_inner<P>(self) -> MappingResult<P>
    where
        Self: Alternative<P>,
    {
        let held = self.label();
        <Self as Alternative<P>>::into_payload(self).map_err(|_| MappingError::VariantLabel {
            expected: <Self as Alternative<P>>::LABEL,
            held,
        })
    }

    /// Whether the live alternative holds a `P`.
    fn is<P>(&self) -> bool
    where
        Self: Alternative<P>,
    {
        self.label() == <Self as Alternative<P>>::LABEL
    }
}

/// One alternative of a [`Variant`], keyed by its payload type.
///
/// Each payload type may appear once per variant, so this is implemented at most
/// once per `(variant, payload)` pair.
pub trait Alternative<P>: Variant {
    /// Label of this alternative.
    const LABEL: &'static str;

    /// Returns the payload if this alternative is live.
    fn payload(&self) -> Option<&P>;

    /// Returns the payload mutably if this alternative is live.
    fn payload_mut(&mut self) -> Option<&mut P>;

    /// Returns the payload, or the variant back if another alternative is live.
    fn into_payload(self) -> Result<P, Self>;
}

/// Views of an optional variant, where `None` is the empty variant.
pub trait VariantExt {
    /// Label of the live alternative, or `None` when empty.
    fn variant_type(&self) -> Option<&'static str>;
}

impl<V: Variant> VariantExt for Option<V> {
    fn variant_type(&self) -> Option<&'static str> {
        self.as_ref().map(Variant::label)
    }
}

/// Encodes a variant as `{"type": label, "value": payload}`.
pub fn encode_variant<V: Variant>(variant: &V) -> MappingResult<Bson> {
    let value = variant
        .encode_payload()
        .map_err(|err| err.in_field(VALUE_KEY))?;

    Ok(Bson::Document(doc! { TYPE_KEY: variant.label(), VALUE_KEY: value }))
}

/// Decodes a variant from its `{"type", "value"}` document.
///
/// # Errors
///
/// Returns [`MappingError::Structural`] if the input is not an object, has no string
/// `type`, names an unknown label, or lacks a `value`. Payload decode failures are
/// returned as they are.
pub fn decode_variant<V: Variant>(value: &Bson) -> MappingResult<V> {
    let document = match value {
        Bson::Document(document) => document,
        other => {
            return Err(MappingError::Structural(format!(
                "expected a variant object, found {}",
                crate::value::kind_name(other)
            )));
        }
    };

    let label = match document.get(TYPE_KEY) {
        Some(Bson::String(label)) => label,
        Some(other) => {
            return Err(MappingError::Structural(format!(
                "variant `type` must be a string, found {}",
                crate::value::kind_name(other)
            )));
        }
        None => return Err(MappingError::Structural("variant has no `type`".to_string())),
    };

    let known = V::LABELS
        .iter()
        .find(|known| **known == label.as_str())
        .ok_or_else(|| MappingError::Structural(format!("unknown variant label `{label}`")))?;

    let payload = document
        .get(VALUE_KEY)
        .ok_or_else(|| MappingError::Structural(format!("variant `{known}` has no `value`")))?;

    match V::decode_payload(known, payload) {
        Some(decoded) => decoded.map_err(|err| err.in_field(VALUE_KEY)),
        None => Err(MappingError::Structural(format!("unknown variant label `{label}`"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::FieldValue;

    #[derive(Debug, Clone, PartialEq)]
    enum Number {
        Int(i32),
        Text(String),
    }

    impl Variant for Number {
        const LABELS: &'static [&'static str] = &["Int", "Text"];

        fn label(&self) -> &'static str {
            match self {
                Number::Int(_) => "Int",
                Number::Text(_) => "Text",
            }
        }

        fn encode_payload(&self) -> MappingResult<Bson> {
            match self {
                Number::Int(payload) => payload.encode(),
                Number::Text(payload) => payload.encode(),
            }
        }

        fn decode_payload(label: &str, value: &Bson) -> Option<MappingResult<Self>> {
            match label {
                "Int" => Some(i32::decode(value).map(Number::Int)),
                "Text" => Some(String::decode(value).map(Number::Text)),
                _ => None,
            }
        }
    }

    impl Alternative<i32> for Number {
        const LABEL: &'static str = "Int";

        fn payload(&self) -> Option<&i32> {
            match self {
                Number::Int(payload) => Some(payload),
                _ => None,
            }
        }

        fn payload_mut(&mut self) -> Option<&mut i32> {
            match self {
                Number::Int(payload) => Some(payload),
                _ => None,
            }
        }

        fn into_payload(self) -> Result<i32, Self> {
            match self {
                Number::Int(payload) => Ok(payload),
                other => Err(other),
            }
        }
    }

    impl Alternative<String> for Number {
        const LABEL: &'static str = "Text";

        fn payload(&self) -> Option<&String> {
            match self {
                Number::Text(payload) => Some(payload),
                _ => None,
            }
        }

        fn payload_mut(&mut self) -> Option<&mut String> {
            match self {
                Number::Text(payload) => Some(payload),
                _ => None,
            }
        }

        fn into_payload(self) -> Result<String, Self> {
            match self {
                Number::Text(payload) => Ok(payload),
                other => Err(other),
            }
        }
    }

    #[test]
    fn test_encode_shape() {
        let encoded = encode_variant(&Number::Int(3)).unwrap();
        assert_eq!(encoded, Bson::Document(doc! { "type": "Int", "value": 3 }));
    }

    #[test]
    fn test_decode_known_label() {
        let decoded: Number = decode_variant(&Bson::Document(doc! { "type": "Text", "value": "three" })).unwrap();
        assert_eq!(decoded, Number::Text("three".into()));
    }

    #[test]
    fn test_decode_structural_errors() {
        let cases = [
            Bson::Document(doc! { "type": "Unknown", "value": {} }),
            Bson::Document(doc! { "value": 1 }),
            Bson::Document(doc! { "type": 1, "value": 1 }),
            Bson::Document(doc! { "type": "Int" }),
            Bson::Array(vec![]),
            Bson::Null,
        ];

        for case in cases {
            let err = decode_variant::<Number>(&case).unwrap_err();
            assert!(matches!(err, MappingError::Structural(_)), "{case:?} gave {err:?}");
        }
    }

    #[test]
    fn test_payload_errors_are_not_structural() {
        let err = decode_variant::<Number>(&Bson::Document(doc! { "type": "Int", "value": "x" })).unwrap_err();
        assert!(matches!(err.root(), MappingError::Mapping(_)));
    }

    #[test]
    fn test_typed_access() {
        let mut number = Number::Int(3);
        assert_eq!(*number.get::<i32>().unwrap(), 3);
        assert!(number.is::<i32>());
        assert!(!number.is::<String>());

        let err = number.get::<String>().unwrap_err();
        assert_eq!(err, MappingError::VariantLabel { expected: "Text", held: "Int" });

        *number.get_mut::<i32>().unwrap() = 4;
        assert_eq!(number.clone().into_inner::<i32>().unwrap(), 4);
        assert!(number.into_inner::<String>().is_err());
    }

    #[test]
    fn test_optional_variant_type() {
        assert_eq!(None::<Number>.variant_type(), None);
        assert_eq!(Some(Number::Text("a".into())).variant_type(), Some("Text"));
    }
}
