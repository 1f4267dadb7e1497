use anyhow::Result;
use serde_json::Value;
use snitch_tables::config::Config;
use snitch_tables::dynamodb::{DynamoDb, MemoryStore, TableAccessObject, TableId, TableStore};
use snitch_tables::{command_line, logging};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load();
    logging::init_logging(config.log_level)?;

    let id = config.table;
    let base = id.base();
    let store: Arc<dyn TableStore> = if config.memory {
        let store = MemoryStore::new();
        store.create_table(&base.schema(), &base.indexes()).await?;
        info!("Using in-memory store for '{}'", base.schema().table_name());
        Arc::new(store)
    } else {
        let sdk_config = aws_config::load_from_env().await;
        let ddb = DynamoDb::new(&sdk_config);
        ddb.check_auth().await?;

        if config.provision {
            let table_name = base.schema().table_name().to_string();
            if let Some(output) = ddb
                .create_table_if_not_exists(
                    &base.schema(),
                    &base.indexes(),
                    TableId::key_attribute_type,
                )
                .await?
            {
                if let Some(description) = output.table_description() {
                    info!("Table status: {:?}", description.table_status());
                }
                ddb.wait_until_active(&table_name).await?;
            }
        }
        Arc::new(ddb)
    };

    let table = TableAccessObject::<Value>::new(store, base.schema());
    let table = if id.schema().is_index() {
        table.bind_index(id.schema())?
    } else {
        table
    };

    command_line::run(&table, id, config.page_size).await
}
