//! In-process [`TableStore`] for tests and offline use.
//!
//! Honours the same contract as DynamoDB where the table access layer relies
//! on it: key-schema checks on point operations, sparse secondary indexes,
//! ascending key order, `limit` counted before the filter applies, and
//! query/scan resumption from an exclusive start key. Unlike DynamoDB, a
//! last evaluated key is only reported when more items remain.

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::dynamodb::{
    ComparisonOp, Condition, ConditionChain, Item, ItemPage, KeyRequest, PutRequest, QueryRequest,
    Result, ScanRequest, TableError, TableSchema, TableStore,
};

/// Data is not persisted and is lost when the last clone is dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, MemoryTable>>>,
}

#[derive(Debug)]
struct MemoryTable {
    schema: TableSchema,
    indexes: HashMap<String, TableSchema>,
    items: BTreeMap<Vec<KeyPart>, Item>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table and its secondary indexes. Re-registering a table clears it.
    pub async fn create_table(&self, table: &TableSchema, indexes: &[TableSchema]) -> Result<()> {
        if table.is_index() {
            return Err(TableError::schema(format!(
                "Cannot create table from index schema '{}'",
                table.index_name().unwrap_or_default()
            )));
        }
        let mut index_map = HashMap::new();
        for index in indexes {
            let Some(name) = index.index_name() else {
                return Err(TableError::schema("Index schema has no index name"));
            };
            if index.table_name() != table.table_name() {
                return Err(TableError::schema(format!(
                    "Index '{name}' belongs to table '{}', not '{}'",
                    index.table_name(),
                    table.table_name()
                )));
            }
            index_map.insert(name.to_string(), index.clone());
        }

        let mut tables = self.tables.write().await;
        tables.insert(
            table.table_name().to_string(),
            MemoryTable {
                schema: table.clone(),
                indexes: index_map,
                items: BTreeMap::new(),
            },
        );
        debug!("Memory table '{}' created", table.table_name());
        Ok(())
    }

    /// Number of items stored in a table.
    pub async fn item_count(&self, table_name: &str) -> usize {
        let tables = self.tables.read().await;
        tables.get(table_name).map_or(0, |t| t.items.len())
    }
}

fn resource_not_found(table_name: &str) -> TableError {
    TableError::store_message(format!(
        "Requested resource not found: table '{table_name}'"
    ))
}

impl MemoryTable {
    fn target(&self, index_name: Option<&str>) -> Result<&TableSchema> {
        match index_name {
            None => Ok(&self.schema),
            Some(name) => self.indexes.get(name).ok_or_else(|| {
                TableError::store_message(format!(
                    "Requested resource not found: index '{name}' on table '{}'",
                    self.schema.table_name()
                ))
            }),
        }
    }

    /// Storage key of a full key, which must match the table's key schema exactly.
    fn exact_key(&self, key: &Item) -> Result<Vec<KeyPart>> {
        let expected = self.schema.key_attributes();
        let mismatch = || {
            TableError::store_message("The provided key element does not match the schema")
        };
        if key.len() != expected.len() {
            return Err(mismatch());
        }
        position(&self.schema, key).ok_or_else(mismatch)
    }

    /// Scan/query order: index keys first when reading an index, then the base key.
    fn order(&self, target: &TableSchema, item: &Item) -> Option<Vec<KeyPart>> {
        let mut order = Vec::new();
        if target.is_index() {
            order.extend(position(target, item)?);
        }
        order.extend(position(&self.schema, item)?);
        Some(order)
    }

    /// Key attributes reported back as the last evaluated key.
    fn last_key(&self, target: &TableSchema, item: &Item) -> Item {
        let mut names = self.schema.key_attributes();
        if target.is_index() {
            names.extend(target.key_attributes());
        }
        item.project(names)
    }

    /// Items visible through `target`, in order, resumed after `start`.
    fn rows(
        &self,
        target: &TableSchema,
        start: Option<&Item>,
    ) -> Result<Vec<(Vec<KeyPart>, &Item)>> {
        let start = match start {
            Some(key) => Some(self.order(target, key).ok_or_else(|| {
                TableError::store_message("The provided starting key is invalid")
            })?),
            None => None,
        };
        let mut rows: Vec<_> = self
            .items
            .values()
            .filter_map(|item| self.order(target, item).map(|order| (order, item)))
            .filter(|(order, _)| start.as_ref().map_or(true, |start| order > start))
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(rows)
    }

    /// Takes `limit` rows and reports a resume key when rows remain.
    fn page<'a>(
        &self,
        target: &TableSchema,
        rows: Vec<&'a Item>,
        limit: Option<usize>,
    ) -> (Vec<&'a Item>, Option<Item>) {
        let limit = limit.unwrap_or(usize::MAX);
        if rows.len() <= limit {
            return (rows, None);
        }
        let window: Vec<_> = rows.into_iter().take(limit).collect();
        let last_key = window.last().map(|item| self.last_key(target, item));
        (window, last_key)
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn put_item(&self, request: PutRequest) -> Result<()> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(&request.table_name)
            .ok_or_else(|| resource_not_found(&request.table_name))?;
        let key = position(&table.schema, &request.item).ok_or_else(|| {
            TableError::store_message(
                "One or more parameter values were invalid: Missing the key attributes",
            )
        })?;
        table.items.insert(key, request.item);
        Ok(())
    }

    async fn get_item(&self, request: KeyRequest) -> Result<Option<Item>> {
        let tables = self.tables.read().await;
        let table = tables
            .get(&request.table_name)
            .ok_or_else(|| resource_not_found(&request.table_name))?;
        let key = table.exact_key(&request.key)?;
        Ok(table.items.get(&key).cloned())
    }

    async fn delete_item(&self, request: KeyRequest) -> Result<()> {
        let mut tables = self.tables.write().await;
        let table = tables
            .get_mut(&request.table_name)
            .ok_or_else(|| resource_not_found(&request.table_name))?;
        let key = table.exact_key(&request.key)?;
        table.items.remove(&key);
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> Result<ItemPage> {
        let tables = self.tables.read().await;
        let table = tables
            .get(&request.table_name)
            .ok_or_else(|| resource_not_found(&request.table_name))?;
        let target = table.target(request.index_name.as_deref())?;
        if target.primary_key() != request.partition_key {
            return Err(TableError::store_message(format!(
                "Query condition missed key schema element: {}",
                target.primary_key()
            )));
        }
        if let Some(sort) = &request.sort_condition {
            if target.sort_key() != Some(sort.attribute()) {
                return Err(TableError::store_message(format!(
                    "Query key condition not supported on '{}'",
                    sort.attribute()
                )));
            }
        }

        let partition = Condition::eq(
            request.partition_key.as_str(),
            request.partition_value.clone(),
        );
        let matching: Vec<&Item> = table
            .rows(target, request.exclusive_start_key.as_ref())?
            .into_iter()
            .map(|(_, item)| item)
            .filter(|item| matches(&partition, item))
            .filter(|item| {
                request
                    .sort_condition
                    .as_ref()
                    .map_or(true, |sort| matches(sort, item))
            })
            .collect();

        let (items, last_evaluated_key) = table.page(target, matching, request.limit);
        Ok(ItemPage {
            items: items.into_iter().cloned().collect(),
            last_evaluated_key,
        })
    }

    async fn scan(&self, request: ScanRequest) -> Result<ItemPage> {
        let tables = self.tables.read().await;
        let table = tables
            .get(&request.table_name)
            .ok_or_else(|| resource_not_found(&request.table_name))?;
        let target = table.target(request.index_name.as_deref())?;

        let rows: Vec<&Item> = table
            .rows(target, request.exclusive_start_key.as_ref())?
            .into_iter()
            .map(|(_, item)| item)
            .collect();
        let (evaluated, last_evaluated_key) = table.page(target, rows, request.limit);

        let items = evaluated
            .into_iter()
            .filter(|item| {
                request
                    .filter
                    .as_ref()
                    .map_or(true, |chain| chain_matches(chain, item))
            })
            .cloned()
            .collect();
        Ok(ItemPage {
            items,
            last_evaluated_key,
        })
    }
}

/// Orderable form of a key attribute; keys are strings, numbers or binary.
#[derive(Debug, Clone)]
enum KeyPart {
    Number(f64),
    String(String),
    Binary(Vec<u8>),
}

impl KeyPart {
    fn from_value(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::N(n) => n.parse().ok().map(Self::Number),
            AttributeValue::S(s) => Some(Self::String(s.clone())),
            AttributeValue::B(b) => Some(Self::Binary(b.as_ref().to_vec())),
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Number(_) => 0,
            Self::String(_) => 1,
            Self::Binary(_) => 2,
        }
    }
}

impl Ord for KeyPart {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.total_cmp(b),
            (Self::String(a), Self::String(b)) => a.cmp(b),
            (Self::Binary(a), Self::Binary(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for KeyPart {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KeyPart {}

/// Key parts of `item` under `schema`, or `None` if a key attribute is missing.
fn position(schema: &TableSchema, item: &Item) -> Option<Vec<KeyPart>> {
    schema
        .key_attributes()
        .into_iter()
        .map(|name| item.get(name).and_then(KeyPart::from_value))
        .collect()
}

fn compare_values(left: &AttributeValue, right: &AttributeValue) -> Option<Ordering> {
    match (left, right) {
        (AttributeValue::S(a), AttributeValue::S(b)) => Some(a.cmp(b)),
        (AttributeValue::N(a), AttributeValue::N(b)) => {
            let a: f64 = a.parse().ok()?;
            let b: f64 = b.parse().ok()?;
            a.partial_cmp(&b)
        }
        (AttributeValue::B(a), AttributeValue::B(b)) => Some(a.as_ref().cmp(b.as_ref())),
        (AttributeValue::Bool(a), AttributeValue::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn matches(condition: &Condition, item: &Item) -> bool {
    let Some(value) = item.get(condition.attribute()) else {
        return false;
    };
    let operand = condition.operand1();
    let ordering = compare_values(value, operand);
    match condition.operator() {
        ComparisonOp::Equals => ordering.map_or(value == operand, |o| o == Ordering::Equal),
        ComparisonOp::LessThan => ordering == Some(Ordering::Less),
        ComparisonOp::LessThanOrEqual => {
            matches!(ordering, Some(Ordering::Less | Ordering::Equal))
        }
        ComparisonOp::MoreThan => ordering == Some(Ordering::Greater),
        ComparisonOp::MoreThanOrEqual => {
            matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
        }
        ComparisonOp::Between => {
            let Some(high) = condition.operand2() else {
                return false;
            };
            matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                && matches!(
                    compare_values(value, high),
                    Some(Ordering::Less | Ordering::Equal)
                )
        }
        ComparisonOp::BeginsWith => match (value, operand) {
            (AttributeValue::S(s), AttributeValue::S(prefix)) => s.starts_with(prefix.as_str()),
            (AttributeValue::B(b), AttributeValue::B(prefix)) => {
                b.as_ref().starts_with(prefix.as_ref())
            }
            _ => false,
        },
        ComparisonOp::Contains => match (value, operand) {
            (AttributeValue::S(s), AttributeValue::S(sub)) => s.contains(sub.as_str()),
            (AttributeValue::Ss(set), AttributeValue::S(v))
            | (AttributeValue::Ns(set), AttributeValue::N(v)) => set.contains(v),
            (AttributeValue::L(list), _) => list.contains(operand),
            _ => false,
        },
    }
}

fn chain_matches(chain: &ConditionChain, item: &Item) -> bool {
    chain
        .disjuncts()
        .iter()
        .any(|group| group.iter().all(|condition| matches(condition, item)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamodb::IntoAttributeValue;

    fn snitches() -> TableSchema {
        TableSchema::new("Snitches", "userId").with_sort_key("created")
    }

    fn snitch(user: &str, created: u64) -> Item {
        Item::new().set("userId", user).set("created", created)
    }

    #[test]
    fn test_matches_comparisons() {
        let item = Item::new()
            .set_string("firstname", "alice")
            .set_number("age", 30.0)
            .set("searchStrings", "alice_smith");

        assert!(matches(&Condition::eq("age", 30), &item));
        assert!(matches(&Condition::lt("age", 31), &item));
        assert!(!matches(&Condition::gt("age", 30), &item));
        assert!(matches(&Condition::between("age", 30, 40), &item));
        assert!(matches(&Condition::begins_with("firstname", "al"), &item));
        assert!(matches(&Condition::contains("searchStrings", "smith"), &item));
        assert!(!matches(&Condition::eq("missing", 1), &item));
        // Numbers compare numerically, not lexically.
        assert!(matches(&Condition::gt("age", 4), &item));
    }

    #[test]
    fn test_chain_matches_and_binds_tighter_than_or() {
        let item = Item::new().set("a", 1).set("b", 2);
        // a = 9 AND b = 9 OR a = 1
        let chain = ConditionChain::new(Condition::eq("a", 9))
            .and(Condition::eq("b", 9))
            .or(Condition::eq("a", 1));
        assert!(chain_matches(&chain, &item));

        // a = 1 AND b = 9 OR a = 9
        let chain = ConditionChain::new(Condition::eq("a", 1))
            .and(Condition::eq("b", 9))
            .or(Condition::eq("a", 9));
        assert!(!chain_matches(&chain, &item));
    }

    #[tokio::test]
    async fn test_get_requires_full_key() {
        let store = MemoryStore::new();
        store.create_table(&snitches(), &[]).await.unwrap();
        store
            .put_item(PutRequest {
                table_name: "Snitches".into(),
                item: snitch("u1", 1),
            })
            .await
            .unwrap();

        let partial = store
            .get_item(KeyRequest {
                table_name: "Snitches".into(),
                key: Item::new().set("userId", "u1"),
            })
            .await;
        assert!(partial.unwrap_err().is_store());

        let found = store
            .get_item(KeyRequest {
                table_name: "Snitches".into(),
                key: snitch("u1", 1),
            })
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_put_without_key_fails() {
        let store = MemoryStore::new();
        store.create_table(&snitches(), &[]).await.unwrap();
        let result = store
            .put_item(PutRequest {
                table_name: "Snitches".into(),
                item: Item::new().set("userId", "u1"),
            })
            .await;
        assert!(result.unwrap_err().is_store());
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let store = MemoryStore::new();
        let result = store
            .scan(ScanRequest {
                table_name: "Nope".into(),
                index_name: None,
                filter: None,
                limit: None,
                exclusive_start_key: None,
            })
            .await;
        assert!(result.unwrap_err().is_store());
    }

    #[tokio::test]
    async fn test_scan_limit_counts_before_filter() {
        let store = MemoryStore::new();
        store.create_table(&snitches(), &[]).await.unwrap();
        for created in 1..=6u64 {
            store
                .put_item(PutRequest {
                    table_name: "Snitches".into(),
                    item: snitch("u1", created),
                })
                .await
                .unwrap();
        }

        let page = store
            .scan(ScanRequest {
                table_name: "Snitches".into(),
                index_name: None,
                filter: Some(ConditionChain::new(Condition::gt("created", 2))),
                limit: Some(3),
                exclusive_start_key: None,
            })
            .await
            .unwrap();

        assert_eq!(page.items.len(), 1);
        let last = page.last_evaluated_key.unwrap();
        assert_eq!(last.get("created"), Some(&3.into_attribute_value()));
        assert_eq!(last.len(), 2);
    }

    #[tokio::test]
    async fn test_index_is_sparse_and_ordered_by_index_key() {
        let store = MemoryStore::new();
        let table = TableSchema::new("Partners", "partnerId1").with_sort_key("partnerId2");
        let index = TableSchema::new("Partners", "partnerId2")
            .with_sort_key("partnerId1")
            .with_index("partnerId2-partnerId1-index");
        store.create_table(&table, &[index]).await.unwrap();

        for (a, b) in [("p3", "p9"), ("p1", "p9"), ("p2", "p8")] {
            store
                .put_item(PutRequest {
                    table_name: "Partners".into(),
                    item: Item::new().set("partnerId1", a).set("partnerId2", b),
                })
                .await
                .unwrap();
        }

        let page = store
            .query(QueryRequest {
                table_name: "Partners".into(),
                index_name: Some("partnerId2-partnerId1-index".into()),
                partition_key: "partnerId2".into(),
                partition_value: "p9".into_attribute_value(),
                sort_condition: None,
                limit: None,
                exclusive_start_key: None,
            })
            .await
            .unwrap();

        let firsts: Vec<_> = page
            .items
            .iter()
            .filter_map(|item| item.get_string("partnerId1").cloned())
            .collect();
        assert_eq!(firsts, vec!["p1".to_string(), "p3".to_string()]);
        assert!(page.last_evaluated_key.is_none());
    }
}
