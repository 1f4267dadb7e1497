//! The store client contract the table access layer is written against.
//!
//! Requests carry structured key conditions and filter chains; each store
//! translates them to its own wire form. [`DynamoDb`] renders them into
//! expression text, [`MemoryStore`] evaluates them directly.
//!
//! [`DynamoDb`]: crate::dynamodb::DynamoDb
//! [`MemoryStore`]: crate::dynamodb::MemoryStore

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use std::fmt::Debug;

use crate::dynamodb::{Condition, ConditionChain, ExpressionBuilder, Item, Result};

#[derive(Debug, Clone)]
pub struct PutRequest {
    pub table_name: String,
    pub item: Item,
}

/// Point lookup or delete by full key.
#[derive(Debug, Clone)]
pub struct KeyRequest {
    pub table_name: String,
    pub key: Item,
}

#[derive(Debug, Clone)]
pub struct QueryRequest {
    pub table_name: String,
    pub index_name: Option<String>,
    pub partition_key: String,
    pub partition_value: AttributeValue,
    pub sort_condition: Option<Condition>,
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<Item>,
}

impl QueryRequest {
    pub fn key_condition_expression(&self, builder: &mut ExpressionBuilder) -> String {
        builder.key_condition(
            &self.partition_key,
            &self.partition_value,
            self.sort_condition.as_ref(),
        )
    }
}

#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub table_name: String,
    pub index_name: Option<String>,
    pub filter: Option<ConditionChain>,
    /// Upper bound on items evaluated, before the filter applies.
    pub limit: Option<usize>,
    pub exclusive_start_key: Option<Item>,
}

/// One page of raw items as returned by the store.
#[derive(Debug, Clone, Default)]
pub struct ItemPage {
    pub items: Vec<Item>,
    pub last_evaluated_key: Option<Item>,
}

/// Primitive operations of a key-value table store.
///
/// Implementations do not retry; any failure surfaces as a
/// [`TableError::Store`](crate::dynamodb::TableError::Store).
#[async_trait]
pub trait TableStore: Debug + Send + Sync {
    /// Writes the item, fully replacing any item with the same key.
    async fn put_item(&self, request: PutRequest) -> Result<()>;

    async fn get_item(&self, request: KeyRequest) -> Result<Option<Item>>;

    /// Deletes the item at the key. Deleting a missing key succeeds.
    async fn delete_item(&self, request: KeyRequest) -> Result<()>;

    async fn query(&self, request: QueryRequest) -> Result<ItemPage>;

    async fn scan(&self, request: ScanRequest) -> Result<ItemPage>;
}
