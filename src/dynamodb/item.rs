use aws_sdk_dynamodb::types::AttributeValue;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;

use crate::dynamodb::{Result, TableError};

/// Represents a DynamoDB item in its wire form.
///
/// An item is a flat mapping from attribute name to the store's tagged value
/// union (`S`, `N`, `BOOL`, `NULL`, `L`, `M` and the set types). Typed records
/// are converted to and from this shape with [`marshal`] and [`unmarshal`].
///
/// # Primary Key
///
/// - Every item in a table is uniquely identified by its primary key.
/// - The primary key can be simple (partition key only) or composite (partition key and sort key).
///
/// # Example
///
/// ```
/// use snitch_tables::dynamodb::Item;
///
/// let item = Item::new()
///     .set_string("userId", "u1")
///     .set_string("firstname", "Alice")
///     .set_number("age", 30.0);
/// assert_eq!(item.get_number("age"), Some(30.0));
/// ```
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Item {
    pub(crate) attributes: HashMap<String, AttributeValue>,
}

impl Item {
    /// Creates a new empty `Item`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a string attribute.
    pub fn set_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(key.into(), AttributeValue::S(value.into()));
        self
    }

    /// Sets a number attribute.
    ///
    /// Numbers travel as decimal strings on the wire.
    pub fn set_number(mut self, key: impl Into<String>, value: impl Into<f64>) -> Self {
        self.attributes
            .insert(key.into(), AttributeValue::N(value.into().to_string()));
        self
    }

    /// Sets an attribute of any type.
    pub fn set(mut self, key: impl Into<String>, value: impl IntoAttributeValue) -> Self {
        self.attributes
            .insert(key.into(), value.into_attribute_value());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.attributes.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    /// Gets the value of an attribute as a string.
    ///
    /// Returns `None` if the attribute doesn't exist or is not a string.
    pub fn get_string(&self, key: &str) -> Option<&String> {
        self.attributes.get(key).and_then(|av| av.as_s().ok())
    }

    /// Gets the value of an attribute as a number (f64).
    ///
    /// Returns `None` if the attribute doesn't exist, is not a number, or can't be parsed as f64.
    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.attributes
            .get(key)
            .and_then(|av| av.as_n().ok())
            .and_then(|n| n.parse().ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn attributes(&self) -> &HashMap<String, AttributeValue> {
        &self.attributes
    }

    pub fn into_attributes(self) -> HashMap<String, AttributeValue> {
        self.attributes
    }

    /// Returns a new item holding only the named attributes that are present.
    pub fn project<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Item {
        let attributes = names
            .into_iter()
            .filter_map(|name| {
                self.attributes
                    .get(name)
                    .map(|value| (name.to_string(), value.clone()))
            })
            .collect();
        Item { attributes }
    }
}

impl From<HashMap<String, AttributeValue>> for Item {
    fn from(attributes: HashMap<String, AttributeValue>) -> Self {
        Self { attributes }
    }
}

/// Converts a typed record into its wire item.
///
/// Fields skipped by serde (e.g. `#[serde(skip_serializing_if = "Option::is_none")]`)
/// are absent from the item, which under upsert semantics removes them from
/// the stored row.
pub fn marshal<T: Serialize>(record: &T) -> Result<Item> {
    let attributes: HashMap<String, AttributeValue> = serde_dynamo::to_item(record)
        .map_err(|e| TableError::validation(format!("Record cannot be marshalled: {e}")))?;
    Ok(Item { attributes })
}

/// Converts a stored item back into a typed record.
pub fn unmarshal<T: DeserializeOwned>(item: Item) -> Result<T> {
    serde_dynamo::from_item(item.attributes)
        .map_err(|e| TableError::store("Stored item does not match the record type", e))
}

/// Conversion of literal operands into the store's value union.
pub trait IntoAttributeValue {
    fn into_attribute_value(self) -> AttributeValue;
}

impl IntoAttributeValue for AttributeValue {
    fn into_attribute_value(self) -> AttributeValue {
        self
    }
}

impl IntoAttributeValue for String {
    fn into_attribute_value(self) -> AttributeValue {
        AttributeValue::S(self)
    }
}

impl IntoAttributeValue for &str {
    fn into_attribute_value(self) -> AttributeValue {
        AttributeValue::S(self.to_string())
    }
}

impl IntoAttributeValue for &String {
    fn into_attribute_value(self) -> AttributeValue {
        AttributeValue::S(self.clone())
    }
}

impl IntoAttributeValue for bool {
    fn into_attribute_value(self) -> AttributeValue {
        AttributeValue::Bool(self)
    }
}

macro_rules! number_into_attribute_value {
    ($($ty:ty),*) => {
        $(
            impl IntoAttributeValue for $ty {
                fn into_attribute_value(self) -> AttributeValue {
                    AttributeValue::N(self.to_string())
                }
            }
        )*
    };
}

number_into_attribute_value!(i32, i64, u32, u64, usize, f64);

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Snitch {
        user_id: String,
        created: u64,
        restaurant: String,
        tags: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        notes: Option<String>,
    }

    #[test]
    fn test_item_operations() {
        let item = Item::new()
            .set_string("key1", "value1")
            .set_number("key2", 42.0);

        assert_eq!(item.get_string("key1"), Some(&"value1".to_string()));
        assert_eq!(item.get_number("key2"), Some(42.0));
        assert_eq!(item.get_string("non_existent"), None);
        assert_eq!(item.get_number("non_existent"), None);
    }

    #[test]
    fn test_marshal_round_trip() {
        let snitch = Snitch {
            user_id: "u1".into(),
            created: 1_700_000_000,
            restaurant: "Burger Barn".into(),
            tags: vec!["fries".into(), "shake".into()],
            notes: Some("late night".into()),
        };

        let item = marshal(&snitch).unwrap();
        assert_eq!(item.get_string("userId"), Some(&"u1".to_string()));
        assert_eq!(item.get_number("created"), Some(1_700_000_000.0));

        let back: Snitch = unmarshal(item).unwrap();
        assert_eq!(back, snitch);
    }

    #[test]
    fn test_marshal_drops_absent_fields() {
        let snitch = Snitch {
            user_id: "u1".into(),
            created: 1,
            restaurant: "Taco Town".into(),
            tags: vec![],
            notes: None,
        };

        let item = marshal(&snitch).unwrap();
        assert!(!item.contains("notes"));

        let back: Snitch = unmarshal(item).unwrap();
        assert_eq!(back, snitch);
    }

    #[test]
    fn test_marshal_rejects_non_map_records() {
        let err = marshal(&"just a string").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_unmarshal_type_mismatch_is_store_error() {
        let item = Item::new().set_string("userId", "u1");
        let err = unmarshal::<Snitch>(item).unwrap_err();
        assert!(err.is_store());
    }

    #[test]
    fn test_project_keeps_present_attributes() {
        let item = Item::new()
            .set_string("userId", "u1")
            .set_number("created", 3.0)
            .set_string("restaurant", "Pizza Palace");

        let key = item.project(["userId", "created", "missing"]);
        assert_eq!(key.len(), 2);
        assert!(key.contains("userId"));
        assert!(key.contains("created"));
    }

    #[test]
    fn test_into_attribute_value() {
        assert_eq!("a".into_attribute_value(), AttributeValue::S("a".into()));
        assert_eq!(3u64.into_attribute_value(), AttributeValue::N("3".into()));
        assert_eq!(true.into_attribute_value(), AttributeValue::Bool(true));
    }
}
