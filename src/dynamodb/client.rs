use anyhow::{anyhow, Result as AnyResult};
use async_trait::async_trait;
use aws_sdk_dynamodb::{
    operation::{create_table::CreateTableOutput, describe_table::DescribeTableOutput},
    types::{
        AttributeDefinition, BillingMode, GlobalSecondaryIndex, KeySchemaElement, KeyType,
        Projection, ProjectionType, ScalarAttributeType, TableStatus,
    },
    Client,
};
use std::collections::HashMap;
use tokio::time::Duration;
use tracing::{debug, error, info};

use crate::dynamodb::{
    ExpressionBuilder, Item, ItemPage, KeyRequest, PutRequest, QueryRequest, Result, ScanRequest,
    TableError, TableSchema, TableStore,
};
use crate::utils::retry_with_backoff;

/// DynamoDB client wrapper implementing [`TableStore`].
///
/// Structured key conditions and filter chains are rendered here into
/// expression text with bound `#attrN` / `:valN` placeholders. Items cross
/// the boundary unchanged; the wire item already is the store's
/// `AttributeValue` map.
///
/// # Error Handling
///
/// Store operations map every SDK failure to [`TableError::Store`] with the
/// SDK error attached as source. Nothing is retried at this layer. The table
/// provisioning helpers used by the command line return `anyhow::Result`.
#[derive(Debug, Clone)]
pub struct DynamoDb {
    client: Client,
}

impl DynamoDb {
    /// Creates a new `DynamoDb` instance.
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }

    pub fn from_client(client: Client) -> Self {
        Self { client }
    }

    /// Verifies authentication by attempting to list tables.
    pub async fn check_auth(&self) -> AnyResult<()> {
        self.client.list_tables().send().await.map_err(|e| {
            error!("Authentication failed: {}", e);
            anyhow!("Authentication failed")
        })?;
        info!("Authentication successful");
        Ok(())
    }

    // --- Table Operations ---

    /// Checks if a table exists.
    pub async fn table_exists(&self, table_name: &str) -> AnyResult<bool> {
        let tables = self.client.list_tables().send().await?;
        Ok(tables.table_names().contains(&table_name.to_string()))
    }

    /// Retrieves table description.
    pub async fn describe_table(&self, table_name: &str) -> AnyResult<DescribeTableOutput> {
        self.client
            .describe_table()
            .table_name(table_name)
            .send()
            .await
            .map_err(Into::into)
    }

    /// Creates the base table and its global secondary indexes if the table doesn't exist.
    ///
    /// `attribute_type` decides the scalar type of each key attribute.
    pub async fn create_table_if_not_exists(
        &self,
        table: &TableSchema,
        indexes: &[TableSchema],
        attribute_type: impl Fn(&str) -> ScalarAttributeType,
    ) -> AnyResult<Option<CreateTableOutput>> {
        if table.is_index() {
            return Err(anyhow!(
                "'{}' describes an index, not a table",
                table.index_name().unwrap_or_default()
            ));
        }
        if self.table_exists(table.table_name()).await? {
            info!("Table '{}' exists", table.table_name());
            return Ok(None);
        }

        let mut defined: Vec<&str> = Vec::new();
        for schema in std::iter::once(table).chain(indexes) {
            for key in schema.key_attributes() {
                if !defined.contains(&key) {
                    defined.push(key);
                }
            }
        }
        let attribute_definitions = defined
            .into_iter()
            .map(|name| {
                AttributeDefinition::builder()
                    .attribute_name(name)
                    .attribute_type(attribute_type(name))
                    .build()
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut global_indexes = Vec::new();
        for index in indexes {
            let Some(index_name) = index.index_name() else {
                continue;
            };
            if index.table_name() != table.table_name() {
                return Err(anyhow!(
                    "Index '{index_name}' belongs to table '{}'",
                    index.table_name()
                ));
            }
            global_indexes.push(
                GlobalSecondaryIndex::builder()
                    .index_name(index_name)
                    .set_key_schema(Some(key_schema(index)?))
                    .projection(
                        Projection::builder()
                            .projection_type(ProjectionType::All)
                            .build(),
                    )
                    .build()?,
            );
        }

        let output = self
            .client
            .create_table()
            .table_name(table.table_name())
            .billing_mode(BillingMode::PayPerRequest)
            .set_attribute_definitions(Some(attribute_definitions))
            .set_key_schema(Some(key_schema(table)?))
            .set_global_secondary_indexes((!global_indexes.is_empty()).then_some(global_indexes))
            .send()
            .await?;
        info!(
            "Table '{}' created with {} index(es)",
            table.table_name(),
            indexes.len()
        );
        Ok(Some(output))
    }

    /// Polls the table description until the table is active.
    pub async fn wait_until_active(&self, table_name: &str) -> AnyResult<()> {
        retry_with_backoff(
            || async move {
                let description = self.describe_table(table_name).await?;
                match description.table().and_then(|t| t.table_status()) {
                    Some(TableStatus::Active) => Ok(()),
                    status => Err(anyhow!("Table '{table_name}' is {status:?}")),
                }
            },
            Duration::from_secs(1),
            8,
        )
        .await
    }
}

fn key_schema(schema: &TableSchema) -> AnyResult<Vec<KeySchemaElement>> {
    let mut elements = vec![KeySchemaElement::builder()
        .attribute_name(schema.primary_key())
        .key_type(KeyType::Hash)
        .build()?];
    if let Some(sort_key) = schema.sort_key() {
        elements.push(
            KeySchemaElement::builder()
                .attribute_name(sort_key)
                .key_type(KeyType::Range)
                .build()?,
        );
    }
    Ok(elements)
}

fn to_limit(limit: Option<usize>) -> Option<i32> {
    limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX))
}

fn into_key(
    item: Option<Item>,
) -> Option<HashMap<String, aws_sdk_dynamodb::types::AttributeValue>> {
    item.map(Item::into_attributes)
}

#[async_trait]
impl TableStore for DynamoDb {
    async fn put_item(&self, request: PutRequest) -> Result<()> {
        let table_name = request.table_name;
        self.client
            .put_item()
            .table_name(&table_name)
            .set_item(Some(request.item.attributes))
            .send()
            .await
            .map_err(|e| TableError::store(format!("PutItem on '{table_name}' failed"), e))?;

        info!("Item put into '{table_name}'");
        Ok(())
    }

    async fn get_item(&self, request: KeyRequest) -> Result<Option<Item>> {
        let table_name = request.table_name;
        let response = self
            .client
            .get_item()
            .table_name(&table_name)
            .set_key(Some(request.key.attributes))
            .send()
            .await
            .map_err(|e| TableError::store(format!("GetItem on '{table_name}' failed"), e))?;

        Ok(response.item.map(Item::from))
    }

    async fn delete_item(&self, request: KeyRequest) -> Result<()> {
        let table_name = request.table_name;
        // The response carries no confirmation beyond transport success.
        self.client
            .delete_item()
            .table_name(&table_name)
            .set_key(Some(request.key.attributes))
            .send()
            .await
            .map_err(|e| TableError::store(format!("DeleteItem on '{table_name}' failed"), e))?;

        info!("Item deleted from '{table_name}'");
        Ok(())
    }

    async fn query(&self, request: QueryRequest) -> Result<ItemPage> {
        let mut builder = ExpressionBuilder::new();
        let key_condition = request.key_condition_expression(&mut builder);
        let (names, values) = builder.finish();
        debug!(
            table = %request.table_name,
            index = ?request.index_name,
            "Query: {key_condition}"
        );

        let response = self
            .client
            .query()
            .table_name(&request.table_name)
            .set_index_name(request.index_name)
            .key_condition_expression(key_condition)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .set_limit(to_limit(request.limit))
            .set_exclusive_start_key(into_key(request.exclusive_start_key))
            .send()
            .await
            .map_err(|e| {
                TableError::store(format!("Query on '{}' failed", request.table_name), e)
            })?;

        Ok(ItemPage {
            items: response
                .items
                .unwrap_or_default()
                .into_iter()
                .map(Item::from)
                .collect(),
            last_evaluated_key: response.last_evaluated_key.map(Item::from),
        })
    }

    async fn scan(&self, request: ScanRequest) -> Result<ItemPage> {
        let mut builder = ExpressionBuilder::new();
        let filter = request.filter.as_ref().map(|chain| builder.chain(chain));
        let (names, values) = builder.finish();
        debug!(
            table = %request.table_name,
            index = ?request.index_name,
            "Scan: {}",
            filter.as_deref().unwrap_or("<no filter>")
        );

        let response = self
            .client
            .scan()
            .table_name(&request.table_name)
            .set_index_name(request.index_name)
            .set_filter_expression(filter)
            .set_expression_attribute_names(names)
            .set_expression_attribute_values(values)
            .set_limit(to_limit(request.limit))
            .set_exclusive_start_key(into_key(request.exclusive_start_key))
            .send()
            .await
            .map_err(|e| {
                TableError::store(format!("Scan on '{}' failed", request.table_name), e)
            })?;

        Ok(ItemPage {
            items: response
                .items
                .unwrap_or_default()
                .into_iter()
                .map(Item::from)
                .collect(),
            last_evaluated_key: response.last_evaluated_key.map(Item::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_schema_for_composite_key() {
        let schema = TableSchema::new("Snitches", "userId").with_sort_key("created");
        let elements = key_schema(&schema).unwrap();

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].attribute_name(), "userId");
        assert_eq!(elements[0].key_type(), &KeyType::Hash);
        assert_eq!(elements[1].attribute_name(), "created");
        assert_eq!(elements[1].key_type(), &KeyType::Range);
    }

    #[test]
    fn test_to_limit_saturates() {
        assert_eq!(to_limit(None), None);
        assert_eq!(to_limit(Some(10)), Some(10));
        assert_eq!(to_limit(Some(usize::MAX)), Some(i32::MAX));
    }
}
