//! # DynamoDB Module
//!
//! Typed, schema-driven access to DynamoDB tables.
//!
//! ## Components
//!
//! - `TableSchema`: Describes a table or a secondary index (name, keys, index name).
//! - `TableAccessObject`: The generic facade issuing upserts, lookups, deletes, queries and scans.
//! - `Condition` / `ConditionChain`: Comparisons joined by AND/OR for key conditions and filters.
//! - `ExpressionBuilder`: Renders conditions into expression text with bound placeholders.
//! - `TableStore`: The store client contract, implemented by `DynamoDb` and `MemoryStore`.
//! - `Item`: The wire form of a record.
//! - `TableId`: The application's tables and indexes.
//!
//! ## Usage
//!
//! `DynamoDb` reads its AWS settings from the environment:
//!
//! - `AWS_ACCESS_KEY_ID`: Your AWS access key ID.
//! - `AWS_SECRET_ACCESS_KEY`: Your AWS secret access key.
//! - `AWS_REGION`: The AWS region where your DynamoDB tables are located.
//!
//! Optionally, you can also set:
//! - `AWS_SESSION_TOKEN`: If you're using temporary credentials.
//! - `AWS_ENDPOINT_URL`: For using a custom endpoint (e.g., for local development).
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use snitch_tables::dynamodb::{
//!     Condition, ConditionChain, MemoryStore, Pagination, TableAccessObject, TableId,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> snitch_tables::dynamodb::Result<()> {
//! let store = MemoryStore::new();
//! store.create_table(&TableId::Users.schema(), &[]).await?;
//!
//! let users =
//!     TableAccessObject::<serde_json::Value>::new(Arc::new(store), TableId::Users.schema());
//! users
//!     .create_or_update(&serde_json::json!({ "userId": "u1", "firstname": "Alice" }))
//!     .await?;
//!
//! let filter = ConditionChain::new(Condition::begins_with("firstname", "Al"));
//! let page = users.scan(Some(&filter), Pagination::first(25)).await?;
//! assert_eq!(page.records.len(), 1);
//! # Ok(())
//! # }
//! ```

mod client;
mod condition;
mod error;
mod expression;
pub(crate) mod item;
mod memory;
mod registry;
mod schema;
mod store;
mod table;

pub use client::DynamoDb;
pub use condition::{
    sort_condition, ChainLink, ComparisonOp, Condition, ConditionChain, LogicalOperator, SortQuery,
};
pub use error::{Result, TableError};
pub use expression::{Expression, ExpressionBuilder};
pub use item::{marshal, unmarshal, IntoAttributeValue, Item};
pub use memory::MemoryStore;
pub use registry::{TableId, USER_SEARCH_ATTRIBUTE};
pub use schema::TableSchema;
pub use store::{ItemPage, KeyRequest, PutRequest, QueryRequest, ScanRequest, TableStore};
pub use table::{Cursor, Page, Pagination, TableAccessObject};
