//! Update document application.

use bson::{Bson, Document};

use docmodel_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    value::ID_KEY,
};

use crate::evaluator::same_value;

/// How an update document changes its targets.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Update<'u> {
    /// Replace everything but `_id`.
    Replace(&'u Document),
    /// Apply `$set`, `$unset` and `$inc`.
    Operators(&'u Document),
}

fn invalid(what: impl std::fmt::Display) -> DocumentStoreError {
    DocumentStoreError::Backend(format!("in-memory store: {what}"))
}

impl<'u> Update<'u> {
    /// Classifies an update document. Operator and plain keys may not be mixed.
    pub(crate) fn parse(update: &'u Document) -> DocumentStoreResult<Self> {
        let operators = update.keys().filter(|key| key.starts_with('$')).count();

        match operators {
            0 => Ok(Update::Replace(update)),
            count if count == update.len() => {
                for (operator, operand) in update {
                    if !matches!(operator.as_str(), "$set" | "$unset" | "$inc") {
                        return Err(invalid(format!("unsupported update operator {operator}")));
                    }
                    if !matches!(operand, Bson::Document(_)) {
                        return Err(invalid(format!("{operator} needs a document")));
                    }
                }
                Ok(Update::Operators(update))
            }
            _ => Err(invalid("update mixes operators and plain keys")),
        }
    }

    /// Applies the update to a stored document.
    pub(crate) fn apply(&self, target: &mut Document) -> DocumentStoreResult<()> {
        match self {
            Update::Replace(replacement) => {
                let id = target.get(ID_KEY).cloned();
                if replacement.contains_key(ID_KEY) && !same_value(replacement.get(ID_KEY), id.as_ref()) {
                    return Err(invalid("a replacement cannot change _id"));
                }

                let mut replaced = Document::new();
                if let Some(id) = id {
                    replaced.insert(ID_KEY, id);
                }
                for (key, value) in replacement.iter().filter(|(key, _)| key.as_str() != ID_KEY) {
                    replaced.insert(key.clone(), value.clone());
                }
                *target = replaced;
            }
            Update::Operators(operators) => {
                for (operator, fields) in operators.iter() {
                    let Bson::Document(fields) = fields else {
                        continue;
                    };

                    for (path, operand) in fields {
                        match operator.as_str() {
                            "$set" => set_path(target, path, operand.clone())?,
                            "$unset" => unset_path(target, path),
                            _ => increment_path(target, path, operand)?,
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Builds the document an upsert inserts when nothing matched `filter`.
    ///
    /// Operator updates start from the filter's plain equality keys.
    pub(crate) fn seed(&self, filter: &Document) -> DocumentStoreResult<Document> {
        let mut seeded = Document::new();

        match self {
            Update::Replace(replacement) => {
                if let Some(id) = filter.get(ID_KEY).filter(|id| !matches!(id, Bson::Document(_))) {
                    seeded.insert(ID_KEY, id.clone());
                }
                for (key, value) in replacement.iter() {
                    seeded.insert(key.clone(), value.clone());
                }
            }
            Update::Operators(_) => {
                for (key, value) in filter {
                    let is_operator_document = matches!(
                        value,
                        Bson::Document(inner) if inner.keys().any(|key| key.starts_with('$'))
                    );
                    if !key.starts_with('$') && !is_operator_document {
                        set_path(&mut seeded, key, value.clone())?;
                    }
                }
                self.apply(&mut seeded)?;
            }
        }

        Ok(seeded)
    }
}

fn set_path(target: &mut Document, path: &str, value: Bson) -> DocumentStoreResult<()> {
    match path.split_once('.') {
        None => {
            target.insert(path, value);
            Ok(())
        }
        Some((head, rest)) => {
            let child = target
                .entry(head.to_string())
                .or_insert_with(|| Bson::Document(Document::new()));

            match child {
                Bson::Document(inner) => set_path(inner, rest, value),
                _ => Err(invalid(format!("cannot set {path}: {head} is not a document"))),
            }
        }
    }
}

fn unset_path(target: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            target.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = target.get_mut(head) {
                unset_path(inner, rest);
            }
        }
    }
}

fn checked_sum(path: &str, left: i64, right: i64) -> DocumentStoreResult<i64> {
    left.checked_add(right).ok_or_else(|| invalid(format!("$inc on {path} overflows int64")))
}

fn increment_path(target: &mut Document, path: &str, operand: &Bson) -> DocumentStoreResult<()> {
    let current = crate::evaluator::lookup(target, path).cloned();

    let incremented = match (current, operand) {
        (None, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_)) => operand.clone(),
        (Some(Bson::Int32(left)), Bson::Int32(right)) => left
            .checked_add(*right)
            .map(Bson::Int32)
            .unwrap_or(Bson::Int64(left as i64 + *right as i64)),
        (Some(Bson::Int32(left)), Bson::Int64(right)) => Bson::Int64(checked_sum(path, left as i64, *right)?),
        (Some(Bson::Int64(left)), Bson::Int32(right)) => Bson::Int64(checked_sum(path, left, *right as i64)?),
        (Some(Bson::Int64(left)), Bson::Int64(right)) => Bson::Int64(checked_sum(path, left, *right)?),
        (Some(Bson::Double(left)), Bson::Int32(right)) => Bson::Double(left + *right as f64),
        (Some(Bson::Double(left)), Bson::Int64(right)) => Bson::Double(left + *right as f64),
        (Some(Bson::Double(left)), Bson::Double(right)) => Bson::Double(left + right),
        (Some(Bson::Int32(left)), Bson::Double(right)) => Bson::Double(left as f64 + right),
        (Some(Bson::Int64(left)), Bson::Double(right)) => Bson::Double(left as f64 + right),
        _ => return Err(invalid(format!("$inc on {path} needs numeric values"))),
    };

    set_path(target, path, incremented)
}
