//! Primary key conventions.
//!
//! A primary key is an ordered, 0-indexed list of field names plus the position of
//! the identity field, the one component whose value the store generates.

use bson::{Bson, Document as RawRecord};
use serde::{Deserialize, Serialize};

use crate::error::{MapperError, MapperResult};

/// Name of the object identifier field generated by the store.
pub const OBJECT_ID: &str = "_id";

/// Ordered primary key fields and the position of the identity field.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(try_from = "PrimaryKeyRepr")]
pub struct PrimaryKey {
    fields: Vec<String>,
    identity: usize,
}

#[derive(Deserialize)]
struct PrimaryKeyRepr {
    fields: Vec<String>,
    identity: usize,
}

impl TryFrom<PrimaryKeyRepr> for PrimaryKey {
    type Error = MapperError;

    fn try_from(repr: PrimaryKeyRepr) -> MapperResult<Self> {
        PrimaryKey::compound(repr.fields, repr.identity)
    }
}

impl PrimaryKey {
    /// Creates a single-field key whose only field is the identity field.
    pub fn single(field: impl Into<String>) -> Self {
        Self { fields: vec![field.into()], identity: 0 }
    }

    /// Creates a compound key. The identity position indexes into `fields`.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::MissingPrimaryKey`] when `fields` is empty and
    /// [`MapperError::IncompatibleCollection`] when `identity` is out of bounds.
    pub fn compound<I, S>(fields: I, identity: usize) -> MapperResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields = fields.into_iter().map(Into::into).collect::<Vec<String>>();

        if fields.is_empty() {
            return Err(MapperError::MissingPrimaryKey("<compound key>".into()));
        }
        if identity >= fields.len() {
            return Err(MapperError::IncompatibleCollection(format!(
                "identity position {} is outside of primary key {:?}",
                identity, fields
            )));
        }

        Ok(Self { fields, identity })
    }

    /// Returns the key fields in order.
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Returns the position of the identity field.
    pub fn identity_position(&self) -> usize {
        self.identity
    }

    /// Returns the identity field name.
    pub fn identity(&self) -> &str {
        &self.fields[self.identity]
    }

    /// Returns whether `field` is part of this key.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Returns whether the key is made of a single field.
    pub fn is_single(&self) -> bool {
        self.fields.len() == 1
    }

    /// Returns whether both keys are made of the same set of fields.
    pub fn same_fields(&self, other: &PrimaryKey) -> bool {
        self.fields.len() == other.fields.len() && self.fields.iter().all(|f| other.contains(f))
    }

    /// Removes the identity field from `data` when it is present with a null value,
    /// so the store generates it.
    pub fn strip_null_identity(&self, data: &mut RawRecord) {
        if matches!(data.get(self.identity()), Some(Bson::Null)) {
            data.remove(self.identity());
        }
    }

    /// Extracts the key values from `data` as a criteria document.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::PrimaryKeyValueMissing`] when a key field is absent.
    pub fn criteria(&self, data: &RawRecord) -> MapperResult<RawRecord> {
        self.fields
            .iter()
            .map(|field| {
                data.get(field)
                    .map(|value| (field.clone(), value.clone()))
                    .ok_or_else(|| MapperError::PrimaryKeyValueMissing(field.clone()))
            })
            .collect()
    }

    /// Normalizes an identifier returned by an insert into a map of key values.
    ///
    /// Compound identifiers are returned as documents; a scalar identifier belongs to
    /// the identity field.
    pub fn normalize(&self, identifier: &Bson) -> RawRecord {
        match identifier {
            Bson::Document(values) if !self.is_single() => values.clone(),
            value => {
                let mut values = RawRecord::new();
                values.insert(self.identity(), value.clone());
                values
            }
        }
    }
}

impl Default for PrimaryKey {
    fn default() -> Self {
        Self::single(OBJECT_ID)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn test_default_key_is_object_id() {
        let key = PrimaryKey::default();

        assert_eq!(key.fields(), ["_id".to_string()]);
        assert_eq!(key.identity(), "_id");
        assert_eq!(key.identity_position(), 0);
    }

    #[test]
    fn test_compound_identity_position() {
        let key = PrimaryKey::compound(["tenant", "seq"], 1).unwrap();

        assert_eq!(key.identity(), "seq");
        assert!(!key.is_single());
        assert!(PrimaryKey::compound(["tenant"], 1).is_err());
        assert!(PrimaryKey::compound(Vec::<String>::new(), 0).is_err());
    }

    #[test]
    fn test_strip_null_identity_only_strips_null() {
        let key = PrimaryKey::default();

        let mut data = doc! { "_id": Bson::Null, "name": "a" };
        key.strip_null_identity(&mut data);
        assert_eq!(data, doc! { "name": "a" });

        let mut data = doc! { "_id": 7, "name": "a" };
        key.strip_null_identity(&mut data);
        assert_eq!(data, doc! { "_id": 7, "name": "a" });
    }

    #[test]
    fn test_strip_uses_identity_position() {
        let key = PrimaryKey::compound(["tenant", "seq"], 1).unwrap();

        let mut data = doc! { "tenant": Bson::Null, "seq": Bson::Null };
        key.strip_null_identity(&mut data);
        assert_eq!(data, doc! { "tenant": Bson::Null });
    }

    #[test]
    fn test_criteria_requires_every_field() {
        let key = PrimaryKey::compound(["tenant", "seq"], 1).unwrap();

        assert_eq!(
            key.criteria(&doc! { "seq": 2, "tenant": "t", "x": 1 }).unwrap(),
            doc! { "tenant": "t", "seq": 2 }
        );
        assert!(matches!(
            key.criteria(&doc! { "tenant": "t" }),
            Err(MapperError::PrimaryKeyValueMissing(field)) if field == "seq"
        ));
    }

    #[test]
    fn test_normalize_scalar_and_compound() {
        let single = PrimaryKey::default();
        assert_eq!(single.normalize(&Bson::Int32(4)), doc! { "_id": 4 });

        let compound = PrimaryKey::compound(["tenant", "seq"], 1).unwrap();
        assert_eq!(compound.normalize(&Bson::Int32(4)), doc! { "seq": 4 });
        assert_eq!(
            compound.normalize(&Bson::Document(doc! { "tenant": "t", "seq": 4 })),
            doc! { "tenant": "t", "seq": 4 }
        );
    }

    #[test]
    fn test_same_fields_ignores_order() {
        let a = PrimaryKey::compound(["a", "b"], 0).unwrap();
        let b = PrimaryKey::compound(["b", "a"], 1).unwrap();

        assert!(a.same_fields(&b));
        assert!(!a.same_fields(&PrimaryKey::default()));
    }

    #[test]
    fn test_deserialize_checks_identity_position() {
        let key: PrimaryKey = serde_json::from_str(r#"{ "fields": ["tenant", "seq"], "identity": 1 }"#).unwrap();
        assert_eq!(key.identity(), "seq");

        assert!(serde_json::from_str::<PrimaryKey>(r#"{ "fields": ["_id"], "identity": 3 }"#).is_err());
        assert!(serde_json::from_str::<PrimaryKey>(r#"{ "fields": [], "identity": 0 }"#).is_err());
    }
}
