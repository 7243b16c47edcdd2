//! Query document evaluation for in-memory record filtering.
//!
//! This module evaluates MongoDB-style query documents against stored records,
//! and orders records by a sort specification.

use std::{cmp::Ordering, collections::HashMap};
use bson::{Bson, Document as RawRecord, datetime::DateTime, oid::ObjectId};

use docmapper_core::error::{MapperError, MapperResult};


/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so `1`, `1i64` and `1.0` compare equal.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    /// Null value
    Null,
    /// Boolean value
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    /// DateTime value
    DateTime(DateTime),
    /// Object identifier
    ObjectId(ObjectId),
    /// String value
    String(&'a str),
    /// Array of comparable values
    Array(Vec<Comparable<'a>>),
    /// Map/Object of comparable values
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(arr.iter().map(Comparable::from).collect::<Vec<_>>()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>(),
            ),
            _ => Comparable::Null,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Resolves a dotted field path such as `address.city` or `tags.0`.
pub(crate) fn lookup<'a>(record: &'a RawRecord, path: &str) -> Option<&'a Bson> {
    let mut parts = path.split('.');
    let mut current = record.get(parts.next()?)?;

    for part in parts {
        current = match current {
            Bson::Document(doc) => doc.get(part)?,
            Bson::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

fn is_truthy(value: &Bson) -> bool {
    match value {
        Bson::Null => false,
        Bson::Boolean(value) => *value,
        Bson::Int32(value) => *value != 0,
        Bson::Int64(value) => *value != 0,
        Bson::Double(value) => *value != 0.0,
        _ => true,
    }
}

fn is_operator_document(value: &Bson) -> bool {
    match value {
        Bson::Document(doc) => doc.keys().next().is_some_and(|key| key.starts_with('$')),
        _ => false,
    }
}

pub(crate) struct RecordEvaluator<'a> {
    record: &'a RawRecord,
}

impl<'a> RecordEvaluator<'a> {
    pub fn new(record: &'a RawRecord) -> Self {
        Self { record }
    }

    /// Returns whether the record satisfies every clause of `filter`.
    pub fn matches(&self, filter: &RawRecord) -> MapperResult<bool> {
        for (key, condition) in filter {
            if !self.evaluate_clause(key, condition)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    pub fn filter_records(
        records: impl IntoIterator<Item = &'a RawRecord>,
        filter: &RawRecord,
    ) -> MapperResult<Vec<RawRecord>> {
        let mut matched = Vec::new();

        for record in records {
            if RecordEvaluator::new(record).matches(filter)? {
                matched.push(record.clone());
            }
        }

        Ok(matched)
    }

    fn evaluate_clause(&self, key: &str, condition: &Bson) -> MapperResult<bool> {
        match key {
            "$and" => {
                for filter in Self::sub_filters(key, condition)? {
                    if !self.matches(filter)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            "$or" => {
                for filter in Self::sub_filters(key, condition)? {
                    if self.matches(filter)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            "$nor" => {
                for filter in Self::sub_filters(key, condition)? {
                    if self.matches(filter)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            operator if operator.starts_with('$') => Err(MapperError::UnsupportedCommand(operator.to_string())),
            field => self.evaluate_field(lookup(self.record, field), condition),
        }
    }

    fn sub_filters<'f>(operator: &str, condition: &'f Bson) -> MapperResult<Vec<&'f RawRecord>> {
        let invalid = || MapperError::Backend(format!("{} expects an array of query documents", operator));

        condition
            .as_array()
            .ok_or_else(invalid)?
            .iter()
            .map(|item| item.as_document().ok_or_else(invalid))
            .collect()
    }

    fn evaluate_field(&self, value: Option<&Bson>, condition: &Bson) -> MapperResult<bool> {
        if !is_operator_document(condition) {
            return Ok(Self::equals(value, condition));
        }

        let operators = condition.as_document().map(|doc| doc.iter()).into_iter().flatten();

        for (operator, operand) in operators {
            if !self.evaluate_operator(value, operator, operand)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn evaluate_operator(&self, value: Option<&Bson>, operator: &str, operand: &Bson) -> MapperResult<bool> {
        match operator {
            "$eq" => Ok(Self::equals(value, operand)),
            "$ne" => Ok(!Self::equals(value, operand)),
            "$gt" | "$gte" | "$lt" | "$lte" => Ok(Self::compares(value, operator, operand)),
            "$in" => match operand {
                Bson::Array(candidates) => Ok(candidates.iter().any(|candidate| Self::equals(value, candidate))),
                _ => Err(MapperError::Backend("$in expects an array".into())),
            },
            "$nin" => match operand {
                Bson::Array(candidates) => Ok(!candidates.iter().any(|candidate| Self::equals(value, candidate))),
                _ => Err(MapperError::Backend("$nin expects an array".into())),
            },
            "$exists" => Ok(value.is_some() == is_truthy(operand)),
            "$not" => Ok(!self.evaluate_field(value, operand)?),
            other => Err(MapperError::UnsupportedCommand(other.to_string())),
        }
    }

    /// Equality with MongoDB semantics: a missing field equals null, and an array
    /// field matches when it equals the operand or contains it.
    fn equals(value: Option<&Bson>, expected: &Bson) -> bool {
        let expected = Comparable::from(expected);

        match value {
            None => expected == Comparable::Null,
            Some(value) => match Comparable::from(value) {
                Comparable::Array(items) => {
                    items.iter().any(|item| item == &expected) || Comparable::Array(items) == expected
                }
                value => value == expected,
            },
        }
    }

    fn compares(value: Option<&Bson>, operator: &str, operand: &Bson) -> bool {
        let operand = Comparable::from(operand);
        let holds = |item: &Comparable<'_>| match item.partial_cmp(&operand) {
            Some(ordering) => match operator {
                "$gt" => ordering == Ordering::Greater,
                "$gte" => ordering != Ordering::Less,
                "$lt" => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            },
            None => false,
        };

        match value.map(Comparable::from) {
            Some(Comparable::Array(items)) => items.iter().any(holds),
            Some(value) => holds(&value),
            None => false,
        }
    }
}

/// Orders two records by a sort specification such as `{ "name": 1, "age": -1 }`.
///
/// Missing and null values sort before everything else.
pub(crate) fn compare_records(left: &RawRecord, right: &RawRecord, sort: &RawRecord) -> Ordering {
    for (field, direction) in sort {
        let left = lookup(left, field).map(Comparable::from).unwrap_or(Comparable::Null);
        let right = lookup(right, field).map(Comparable::from).unwrap_or(Comparable::Null);

        let ordering = match (&left, &right) {
            (Comparable::Null, Comparable::Null) => Ordering::Equal,
            (Comparable::Null, _) => Ordering::Less,
            (_, Comparable::Null) => Ordering::Greater,
            _ => left.partial_cmp(&right).unwrap_or(Ordering::Equal),
        };

        let descending = match direction {
            Bson::Int32(value) => *value < 0,
            Bson::Int64(value) => *value < 0,
            Bson::Double(value) => *value < 0.0,
            _ => false,
        };

        let ordering = if descending { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }

    Ordering::Equal
}
