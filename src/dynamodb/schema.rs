/// Describes a DynamoDB table, or a secondary index over one.
///
/// Table definitions are plain data: one generic [`TableAccessObject`] is
/// parameterized by a schema value instead of writing one type per table.
///
/// # Primary Key
///
/// Every DynamoDB table must have a primary key, which can be:
/// - **Simple Primary Key**: Consists of just a partition key.
/// - **Composite Primary Key**: Consists of a partition key and a sort key.
///
/// # Secondary Indexes
///
/// A schema with an `index_name` describes a secondary index. The index keeps
/// the `table_name` of its base table; its `primary_key` and `sort_key` are
/// the index's own key attributes.
///
/// # Example
///
/// ```
/// use snitch_tables::dynamodb::TableSchema;
///
/// let trainers = TableSchema::new("TrainerClientAssociations", "trainerId")
///     .with_sort_key("clientId");
/// let by_client = TableSchema::new("TrainerClientAssociations", "clientId")
///     .with_sort_key("trainerId")
///     .with_index("clientId-trainerId-index");
///
/// assert!(!trainers.is_index());
/// assert!(by_client.is_index());
/// ```
///
/// [`TableAccessObject`]: crate::dynamodb::TableAccessObject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    table_name: String,
    primary_key: String,
    sort_key: Option<String>,
    index_name: Option<String>,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            primary_key: primary_key.into(),
            sort_key: None,
            index_name: None,
        }
    }

    pub fn with_sort_key(mut self, sort_key: impl Into<String>) -> Self {
        self.sort_key = Some(sort_key.into());
        self
    }

    pub fn with_index(mut self, index_name: impl Into<String>) -> Self {
        self.index_name = Some(index_name.into());
        self
    }

    /// Returns the name of the table.
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Returns the partition key attribute.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Returns the sort key attribute, if any.
    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    /// Returns the index name when this schema describes a secondary index.
    ///
    /// An empty name counts as no index.
    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref().filter(|name| !name.is_empty())
    }

    pub fn is_index(&self) -> bool {
        self.index_name().is_some()
    }

    /// Key attribute names, partition key first.
    pub fn key_attributes(&self) -> Vec<&str> {
        let mut keys = vec![self.primary_key()];
        keys.extend(self.sort_key());
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_schema_operations() {
        let schema = TableSchema::new("Snitches", "userId").with_sort_key("created");

        assert_eq!(schema.table_name(), "Snitches");
        assert_eq!(schema.primary_key(), "userId");
        assert_eq!(schema.sort_key(), Some("created"));
        assert_eq!(schema.index_name(), None);
        assert_eq!(schema.key_attributes(), vec!["userId", "created"]);
    }

    #[test]
    fn test_empty_index_name_is_not_an_index() {
        let schema = TableSchema::new("Partners", "partnerId2").with_index("");
        assert!(!schema.is_index());
        assert_eq!(schema.key_attributes(), vec!["partnerId2"]);
    }
}
