use aws_sdk_dynamodb::types::AttributeValue;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::dynamodb::{
    item::{marshal, unmarshal},
    sort_condition, ConditionChain, IntoAttributeValue, Item, KeyRequest, PutRequest,
    QueryRequest, Result, ScanRequest, SortQuery, TableError, TableSchema, TableStore,
};

/// Typed access to one DynamoDB table, or to one secondary index of it.
///
/// `T` is the record shape of every row, a plain serde data type marshalled
/// to and from the store's attribute map. The facade holds only its schema
/// and a handle to the store; every call builds an independent request, so
/// clones can be used concurrently without synchronization.
///
/// # Operations
///
/// - [`create_or_update`](Self::create_or_update): full-replace upsert
/// - [`get_by_primary_key`](Self::get_by_primary_key): point lookup, for tables without a sort key
/// - [`delete_by_keys`](Self::delete_by_keys): idempotent delete
/// - [`query`](Self::query): every row of one partition, optionally filtered on the sort key
/// - [`scan`](Self::scan): arbitrary filter chain, one page at a time
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use serde::{Deserialize, Serialize};
/// use snitch_tables::dynamodb::{DynamoDb, SortQuery, TableAccessObject, TableSchema};
///
/// #[derive(Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct Snitch {
///     user_id: String,
///     created: u64,
/// }
///
/// # async fn example() -> snitch_tables::dynamodb::Result<()> {
/// let config = aws_config::load_from_env().await;
/// let snitches = TableAccessObject::<Snitch>::new(
///     Arc::new(DynamoDb::new(&config)),
///     TableSchema::new("Snitches", "userId").with_sort_key("created"),
/// );
///
/// let recent = snitches
///     .query("u1", Some(SortQuery::between(1_700_000_000u64, 1_800_000_000u64)))
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct TableAccessObject<T> {
    store: Arc<dyn TableStore>,
    schema: TableSchema,
    _record: PhantomData<fn() -> T>,
}

impl<T> Clone for TableAccessObject<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            schema: self.schema.clone(),
            _record: PhantomData,
        }
    }
}

impl<T> fmt::Debug for TableAccessObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableAccessObject")
            .field("schema", &self.schema)
            .field("store", &self.store)
            .finish()
    }
}

impl<T> TableAccessObject<T> {
    pub fn new(store: Arc<dyn TableStore>, schema: TableSchema) -> Self {
        Self {
            store,
            schema,
            _record: PhantomData,
        }
    }

    /// Returns a facade over an index of this table, sharing the same store.
    ///
    /// Fails with a schema error when the index belongs to another table or
    /// has no index name.
    pub fn bind_index(&self, index_schema: TableSchema) -> Result<Self> {
        if index_schema.table_name() != self.name() {
            return Err(TableError::schema(format!(
                "Index must be of the same table: '{}' is not '{}'",
                index_schema.table_name(),
                self.name()
            )));
        }
        if !index_schema.is_index() {
            return Err(TableError::schema(format!(
                "Index schema on '{}' has no index name",
                index_schema.table_name()
            )));
        }
        Ok(Self::new(Arc::clone(&self.store), index_schema))
    }

    pub fn name(&self) -> &str {
        self.schema.table_name()
    }

    pub fn primary_key(&self) -> &str {
        self.schema.primary_key()
    }

    pub fn sort_key(&self) -> Option<&str> {
        self.schema.sort_key()
    }

    pub fn index(&self) -> Option<&str> {
        self.schema.index_name()
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn writable(&self, operation: &str) -> Result<()> {
        match self.index() {
            Some(index) => Err(TableError::schema(format!(
                "Cannot {operation} through index '{index}' of '{}'; indexes are read-only",
                self.name()
            ))),
            None => Ok(()),
        }
    }

    fn query_request(
        &self,
        partition_value: AttributeValue,
        sort: Option<SortQuery>,
    ) -> Result<QueryRequest> {
        let sort_condition = match sort {
            Some(sort) => sort_condition(self.sort_key(), Some(sort.op), sort.value1, sort.value2)?,
            None => None,
        };
        Ok(QueryRequest {
            table_name: self.name().to_string(),
            index_name: self.index().map(str::to_string),
            partition_key: self.primary_key().to_string(),
            partition_value,
            sort_condition,
            limit: None,
            exclusive_start_key: None,
        })
    }
}

impl<T> TableAccessObject<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Writes `record` as a new row.
    ///
    /// If a row with the same keys already exists it is entirely replaced:
    /// attributes absent from `record` are dropped.
    #[instrument(skip_all, fields(table = %self.name()))]
    pub async fn create_or_update(&self, record: &T) -> Result<()> {
        self.writable("write")?;
        let item = marshal(record)?;
        self.store
            .put_item(PutRequest {
                table_name: self.name().to_string(),
                item,
            })
            .await
    }

    /// Looks up one row by its primary key value.
    ///
    /// Assumes the table has no sort key; use [`query`](Self::query) to find
    /// rows of a sort-keyed table. Through an index, the first row of the
    /// matching index partition is returned.
    #[instrument(skip_all, fields(table = %self.name(), index = ?self.index()))]
    pub async fn get_by_primary_key(
        &self,
        primary_value: impl IntoAttributeValue,
    ) -> Result<Option<T>> {
        let primary_value = primary_value.into_attribute_value();
        if self.index().is_some() {
            let mut request = self.query_request(primary_value, None)?;
            request.limit = Some(1);
            let page = self.store.query(request).await?;
            return page.items.into_iter().next().map(unmarshal).transpose();
        }

        let mut key = Item::new();
        key.insert(self.primary_key(), primary_value);
        let item = self
            .store
            .get_item(KeyRequest {
                table_name: self.name().to_string(),
                key,
            })
            .await?;
        item.map(unmarshal).transpose()
    }

    /// Deletes the row at the given keys. Deleting a missing row is not an error.
    ///
    /// The store acknowledges the request only at the transport level; there
    /// is no signal that a row was actually removed.
    #[instrument(skip_all, fields(table = %self.name()))]
    pub async fn delete_by_keys(
        &self,
        primary_value: impl IntoAttributeValue,
        sort_value: Option<AttributeValue>,
    ) -> Result<()> {
        self.writable("delete")?;
        let mut key = Item::new();
        key.insert(self.primary_key(), primary_value.into_attribute_value());
        if let Some(sort_value) = sort_value {
            let Some(sort_key) = self.sort_key() else {
                return Err(TableError::schema(format!(
                    "Sort value provided, but table '{}' has no sort key",
                    self.name()
                )));
            };
            key.insert(sort_key, sort_value);
        }
        self.store
            .delete_item(KeyRequest {
                table_name: self.name().to_string(),
                key,
            })
            .await
    }

    /// Returns every row whose primary key equals `primary_value`, in
    /// ascending sort-key order, optionally narrowed by a sort-key comparison.
    ///
    /// Returns an empty vector when nothing matches.
    #[instrument(skip_all, fields(table = %self.name(), index = ?self.index()))]
    pub async fn query(
        &self,
        primary_value: impl IntoAttributeValue,
        sort: Option<SortQuery>,
    ) -> Result<Vec<T>> {
        let request = self.query_request(primary_value.into_attribute_value(), sort)?;
        let mut records = Vec::new();
        let mut start = None;
        loop {
            let mut request = request.clone();
            request.exclusive_start_key = start;
            let page = self.store.query(request).await?;
            for item in page.items {
                records.push(unmarshal(item)?);
            }
            start = page.last_evaluated_key;
            if start.is_none() {
                break;
            }
        }
        debug!("Query returned {} record(s)", records.len());
        Ok(records)
    }

    /// Evaluates `filter` over the table or index and returns one page.
    ///
    /// Issues a single scan request evaluating up to `pagination.page_size`
    /// items. The store applies the filter after the limit, so a page may
    /// hold fewer records than `page_size`, or none, while more remain.
    /// Feed the returned `page_break_key` into the next call to continue; it
    /// is `None` once the store reports no further results.
    #[instrument(skip_all, fields(table = %self.name(), index = ?self.index()))]
    pub async fn scan(
        &self,
        filter: Option<&ConditionChain>,
        pagination: Pagination,
    ) -> Result<Page<T>> {
        let page_size = pagination.page_size;
        if page_size == 0 {
            return Err(TableError::validation("Page size must be at least 1"));
        }

        let page = self
            .store
            .scan(ScanRequest {
                table_name: self.name().to_string(),
                index_name: self.index().map(str::to_string),
                filter: filter.cloned(),
                limit: Some(page_size),
                exclusive_start_key: pagination.page_break_key.map(Cursor::into_key),
            })
            .await?;
        let records = page
            .items
            .into_iter()
            .map(unmarshal)
            .collect::<Result<Vec<T>>>()?;

        info!(
            "Scan page of {} record(s), more: {}",
            records.len(),
            page.last_evaluated_key.is_some()
        );
        Ok(Page {
            records,
            page_break_key: page.last_evaluated_key.map(Cursor),
            page_size,
        })
    }
}

/// Opaque resume point of a paginated scan.
///
/// Wraps the store's last evaluated key. Use [`to_token`](Self::to_token) to
/// hand it across an API boundary.
///
/// Tokens carry the key as JSON, so key attributes must be strings or
/// numbers within JSON number range (i64, u64 or f64). Binary keys and
/// numbers beyond that precision do not survive the round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor(Item);

impl Cursor {
    pub fn key(&self) -> &Item {
        &self.0
    }

    pub fn into_key(self) -> Item {
        self.0
    }

    /// Encodes the cursor as URL-safe base64 JSON.
    pub fn to_token(&self) -> Result<String> {
        let json: serde_json::Value = serde_dynamo::from_item(self.0.attributes.clone())
            .map_err(|e| TableError::store("Cursor cannot be encoded", e))?;
        let bytes = serde_json::to_vec(&json)
            .map_err(|e| TableError::store("Cursor cannot be encoded", e))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn from_token(token: &str) -> Result<Self> {
        let invalid =
            |reason: String| TableError::validation(format!("Invalid page break key: {reason}"));
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| invalid(e.to_string()))?;
        let json: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| invalid(e.to_string()))?;
        let attributes: HashMap<String, AttributeValue> =
            serde_dynamo::to_item(json).map_err(|e| invalid(e.to_string()))?;
        if attributes.is_empty() {
            return Err(invalid("empty key".to_string()));
        }
        Ok(Self(Item::from(attributes)))
    }
}

impl From<Item> for Cursor {
    fn from(key: Item) -> Self {
        Self(key)
    }
}

/// Scan paging request.
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    pub page_size: usize,
    pub page_break_key: Option<Cursor>,
}

impl Pagination {
    pub fn first(page_size: usize) -> Self {
        Self {
            page_size,
            page_break_key: None,
        }
    }

    pub fn resume(page_size: usize, page_break_key: Cursor) -> Self {
        Self {
            page_size,
            page_break_key: Some(page_break_key),
        }
    }
}

/// One page of scan results.
///
/// `page_size` echoes the requested size; `records` may hold fewer when the
/// filter dropped evaluated items or the scan is exhausted.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub records: Vec<T>,
    pub page_break_key: Option<Cursor>,
    pub page_size: usize,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.page_break_key.is_some()
    }

    /// Pagination for the following page, if any.
    pub fn next(&self) -> Option<Pagination> {
        self.page_break_key
            .clone()
            .map(|cursor| Pagination::resume(self.page_size, cursor))
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            records: self.records.into_iter().map(f).collect(),
            page_break_key: self.page_break_key,
            page_size: self.page_size,
        }
    }
}
