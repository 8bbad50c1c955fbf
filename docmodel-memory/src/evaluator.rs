//! Filter document evaluation for in-memory document matching.
//!
//! Filters are the documents the query builder produces: field keys mapping to a
//! value (implicit equality) or to an operator document, plus the logical
//! operators `$and`, `$or`, `$nor` and `$not` at the top level.

use std::cmp::Ordering;

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use docmodel_core::error::{DocumentStoreError, DocumentStoreResult};

/// Comparable representation of BSON values.
///
/// Numbers of every width are normalized to `f64`, so `Int32(1)`, `Int64(1)` and
/// `Double(1.0)` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(Vec<(&'a str, Comparable<'a>)>),
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(items) => Comparable::Array(items.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(key, value)| (key.as_str(), Comparable::from(value)))
                    .collect(),
            ),
            other => Comparable::Other(other),
        }
    }
}

impl Comparable<'_> {
    /// Position of the value's type in the cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Number(_) => 2,
            Comparable::String(_) => 3,
            Comparable::Map(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Other(_) => 6,
            Comparable::ObjectId(_) => 7,
            Comparable::Bool(_) => 8,
            Comparable::DateTime(_) => 9,
        }
    }

    /// Orders values of any types, as sorting does.
    pub(crate) fn total_cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank()).then_with(|| match (self, other) {
            (Comparable::Number(a), Comparable::Number(b)) => a.total_cmp(b),
            (Comparable::Array(a), Comparable::Array(b)) => a
                .iter()
                .zip(b)
                .map(|(a, b)| a.total_cmp(b))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Comparable::Map(a), Comparable::Map(b)) => a
                .iter()
                .zip(b)
                .map(|((a_key, a), (b_key, b))| a_key.cmp(b_key).then_with(|| a.total_cmp(b)))
                .find(|ordering| ordering.is_ne())
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            // Remaining types order by BSON type code, then by their rendering.
            (Comparable::Other(a), Comparable::Other(b)) => (a.element_type() as u8)
                .cmp(&(b.element_type() as u8))
                .then_with(|| a.to_string().cmp(&b.to_string())),
            _ => self.partial_cmp(other).unwrap_or(Ordering::Equal),
        })
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

fn unsupported(what: impl std::fmt::Display) -> DocumentStoreError {
    DocumentStoreError::Backend(format!("in-memory store: {what}"))
}

/// Resolves a dotted key path, stepping into arrays by numeric position.
pub(crate) fn lookup<'d>(document: &'d Document, path: &str) -> Option<&'d Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

fn values_equal(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

/// Equality as filters see it: a missing key equals `null`, and an array matches
/// when it equals the operand or one of its elements does.
fn equality_matches(value: Option<&Bson>, operand: &Bson) -> bool {
    match value {
        None => matches!(operand, Bson::Null),
        Some(value) => {
            values_equal(value, operand)
                || matches!(value, Bson::Array(items) if items.iter().any(|item| values_equal(item, operand)))
        }
    }
}

fn ordering_matches(value: Option<&Bson>, operand: &Bson, accept: fn(Ordering) -> bool) -> bool {
    let check = |value: &Bson| {
        Comparable::from(value)
            .partial_cmp(&Comparable::from(operand))
            .is_some_and(accept)
    };

    match value {
        None => false,
        Some(Bson::Array(items)) => items.iter().any(check),
        Some(value) => check(value),
    }
}

fn as_integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(value) => Some(*value as i64),
        Bson::Int64(value) => Some(*value),
        Bson::Double(value) if value.fract() == 0.0 => Some(*value as i64),
        _ => None,
    }
}

fn operand_array<'o>(operator: &str, operand: &'o Bson) -> DocumentStoreResult<&'o [Bson]> {
    match operand {
        Bson::Array(items) => Ok(items),
        _ => Err(unsupported(format!("{operator} needs an array"))),
    }
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(value) => *value,
        Bson::Null | Bson::Undefined => false,
        other => as_integer(other).is_none_or(|value| value != 0),
    }
}

fn bit_mask(operator: &str, operand: &Bson) -> DocumentStoreResult<i64> {
    match operand {
        Bson::Array(positions) => positions.iter().try_fold(0i64, |mask, position| {
            match as_integer(position) {
                Some(position @ 0..=63) => Ok(mask | (1i64 << position)),
                _ => Err(unsupported(format!("{operator} bit positions must be in 0..64"))),
            }
        }),
        other => as_integer(other).ok_or_else(|| unsupported(format!("{operator} needs a mask or positions"))),
    }
}

fn type_matches(value: &Bson, operand: &Bson) -> DocumentStoreResult<bool> {
    match operand {
        Bson::Array(codes) => {
            for code in codes {
                if type_matches(value, code)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        other => match as_integer(other) {
            Some(code) => Ok(value.element_type() as i64 == code),
            None => Err(unsupported("$type needs numeric type codes")),
        },
    }
}

fn operator_matches(value: Option<&Bson>, operator: &str, operand: &Bson) -> DocumentStoreResult<bool> {
    Ok(match operator {
        "$eq" => equality_matches(value, operand),
        "$ne" => !equality_matches(value, operand),
        "$gt" => ordering_matches(value, operand, Ordering::is_gt),
        "$gte" => ordering_matches(value, operand, Ordering::is_ge),
        "$lt" => ordering_matches(value, operand, Ordering::is_lt),
        "$lte" => ordering_matches(value, operand, Ordering::is_le),
        "$in" => operand_array(operator, operand)?
            .iter()
            .any(|candidate| equality_matches(value, candidate)),
        "$nin" => !operand_array(operator, operand)?
            .iter()
            .any(|candidate| equality_matches(value, candidate)),
        "$exists" => value.is_some() == is_truthy(operand),
        "$type" => match value {
            Some(value) => type_matches(value, operand)?,
            None => false,
        },
        "$all" => {
            let required = operand_array(operator, operand)?;
            !required.is_empty() && required.iter().all(|item| equality_matches(value, item))
        }
        "$size" => {
            let size = as_integer(operand).ok_or_else(|| unsupported("$size needs an integer"))?;
            matches!(value, Some(Bson::Array(items)) if items.len() as i64 == size)
        }
        "$mod" => {
            let (divisor, remainder) = match operand_array(operator, operand)? {
                [divisor, remainder] => (as_integer(divisor), as_integer(remainder)),
                _ => (None, None),
            };
            let (divisor, remainder) = divisor
                .zip(remainder)
                .filter(|(divisor, _)| *divisor != 0)
                .ok_or_else(|| unsupported("$mod needs [divisor, remainder] with a non-zero divisor"))?;

            value
                .and_then(|value| match value {
                    Bson::Double(value) => Some(value.trunc() as i64),
                    other => as_integer(other),
                })
                .is_some_and(|value| value.wrapping_rem(divisor) == remainder)
        }
        "$bitsAllClear" | "$bitsAllSet" | "$bitsAnyClear" | "$bitsAnySet" => {
            let mask = bit_mask(operator, operand)?;

            match value.and_then(as_integer) {
                Some(bits) => match operator {
                    "$bitsAllClear" => bits & mask == 0,
                    "$bitsAllSet" => bits & mask == mask,
                    "$bitsAnyClear" => bits & mask != mask,
                    _ => bits & mask != 0,
                },
                None => false,
            }
        }
        "$not" => match operand {
            Bson::Document(operators) => !operators_match(value, operators)?,
            _ => return Err(unsupported("field-level $not needs an operator document")),
        },
        "$regex" | "$options" => return Err(unsupported("$regex is not supported")),
        other => return Err(unsupported(format!("unknown operator {other}"))),
    })
}

fn operators_match(value: Option<&Bson>, operators: &Document) -> DocumentStoreResult<bool> {
    for (operator, operand) in operators {
        if !operator_matches(value, operator, operand)? {
            return Ok(false);
        }
    }

    Ok(true)
}

fn is_operator_document(condition: &Bson) -> bool {
    match condition {
        Bson::Document(inner) => inner.keys().next().is_some_and(|key| key.starts_with('$')),
        _ => false,
    }
}

fn sub_filters<'f>(operator: &str, operand: &'f Bson) -> DocumentStoreResult<Vec<&'f Document>> {
    match operand {
        Bson::Array(items) => items
            .iter()
            .map(|item| match item {
                Bson::Document(filter) => Ok(filter),
                _ => Err(unsupported(format!("{operator} needs an array of filter documents"))),
            })
            .collect(),
        Bson::Document(filter) if operator == "$not" => Ok(vec![filter]),
        _ => Err(unsupported(format!("{operator} needs an array of filter documents"))),
    }
}

/// Evaluates a filter document against a stored document.
///
/// # Errors
///
/// Returns [`DocumentStoreError::Backend`] for operators this store cannot evaluate
/// (`$regex`, unknown operators) and malformed operands.
pub(crate) fn matches(document: &Document, filter: &Document) -> DocumentStoreResult<bool> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => all_match(document, &sub_filters(key, condition)?)?,
            "$or" => any_match(document, &sub_filters(key, condition)?)?,
            "$nor" => !any_match(document, &sub_filters(key, condition)?)?,
            // `$not` holds a list; the negation applies to their conjunction.
            "$not" => !all_match(document, &sub_filters(key, condition)?)?,
            other if other.starts_with('$') => {
                return Err(unsupported(format!("unknown top-level operator {other}")));
            }
            path => {
                let value = lookup(document, path);
                match condition {
                    Bson::Document(operators) if is_operator_document(condition) => {
                        operators_match(value, operators)?
                    }
                    Bson::RegularExpression(_) => return Err(unsupported("$regex is not supported")),
                    operand => equality_matches(value, operand),
                }
            }
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn all_match(document: &Document, filters: &[&Document]) -> DocumentStoreResult<bool> {
    for filter in filters {
        if !matches(document, filter)? {
            return Ok(false);
        }
    }

    Ok(true)
}

fn any_match(document: &Document, filters: &[&Document]) -> DocumentStoreResult<bool> {
    for filter in filters {
        if matches(document, filter)? {
            return Ok(true);
        }
    }

    Ok(false)
}

/// Orders two documents by a `{key: 1 | -1}` sort document.
pub(crate) fn compare_by(left: &Document, right: &Document, sort: &Document) -> Ordering {
    for (key, direction) in sort {
        let null = Bson::Null;
        let left_value = Comparable::from(lookup(left, key).unwrap_or(&null));
        let right_value = Comparable::from(lookup(right, key).unwrap_or(&null));

        let ordering = match as_integer(direction) {
            Some(direction) if direction < 0 => right_value.total_cmp(&left_value),
            _ => left_value.total_cmp(&right_value),
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}

/// Whether two values are equal under the store's numeric normalization.
pub(crate) fn same_value(left: Option<&Bson>, right: Option<&Bson>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(left), Some(right)) => values_equal(left, right),
        _ => false,
    }
}
