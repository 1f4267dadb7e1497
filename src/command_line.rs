use crate::dynamodb::{
    ChainLink, ComparisonOp, Condition, ConditionChain, IntoAttributeValue, LogicalOperator,
    Pagination, SortQuery, TableAccessObject, TableError, TableId, USER_SEARCH_ATTRIBUTE,
};
use anyhow::{anyhow, Result};
use aws_sdk_dynamodb::types::{AttributeValue, ScalarAttributeType};
use serde_json::{Map, Value};
use std::io::{self, Write};
use tracing::info;

/// Runs the interactive command loop over one table or index.
///
/// The supported commands are:
/// - info: Print table information
/// - put attr=value ...: Create or fully replace a record
/// - get <pk>: Retrieve a record by primary key
/// - delete <pk> [sk]: Delete a record
/// - query <pk> [op v1 [v2]]: Query a partition, optionally comparing the sort key
/// - scan [attr op value [and|or attr op value ...]]: Scan page by page
/// - search <words>: Search users by name
/// - exit: Exit the program
///
/// Operation failures are reported and the loop continues.
pub async fn run(table: &TableAccessObject<Value>, id: TableId, page_size: usize) -> Result<()> {
    loop {
        let line = prompt(
            "Enter command (info/put/get/delete/query/scan/search/exit)",
            None,
        )?;
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();
        let outcome = match command {
            "info" => {
                print_info(table, id);
                Ok(())
            }
            "put" => put_record(table, id, &args).await,
            "get" => get_record(table, &args).await,
            "delete" => delete_record(table, &args).await,
            "query" => query_records(table, &args).await,
            "scan" => scan_records(table, id, &args, page_size).await,
            "search" => search_users(table, id, &args, page_size).await,
            "exit" => break,
            _ => {
                println!("Unknown command. Please try again.");
                Ok(())
            }
        };
        if let Err(e) = outcome {
            println!("Error: {e}");
        }
    }
    Ok(())
}

fn print_info(table: &TableAccessObject<Value>, id: TableId) {
    println!("\n--- Table Information ---");
    println!("Table: {id}");
    println!("Table Name: {}", table.name());
    if let Some(index) = table.index() {
        println!("Index: {index}");
    }
    println!("Partition Key: {}", table.primary_key());
    if let Some(key) = table.sort_key() {
        println!("Sort Key: {key}");
    }
    for index in id.base().indexes() {
        println!(
            "Index Available: {} ({} / {})",
            index.index_name().unwrap_or_default(),
            index.primary_key(),
            index.sort_key().unwrap_or("-")
        );
    }
    println!("-------------------------\n");
}

async fn put_record(table: &TableAccessObject<Value>, id: TableId, args: &[&str]) -> Result<()> {
    let record = parse_record(&key_attributes(id), args)?;
    table.create_or_update(&record).await?;
    info!("Record written to '{}'", table.name());
    Ok(())
}

/// Parses `attr=value ...` into a record, typing key attributes by their key type.
fn parse_record(keys: &[String], args: &[&str]) -> Result<Value> {
    if args.is_empty() {
        return Err(anyhow!("Usage: put attr=value [attr=value ...]"));
    }
    let mut record = Map::new();
    for arg in args {
        let (name, value) = arg
            .split_once('=')
            .ok_or_else(|| anyhow!("Expected attr=value, got '{arg}'"))?;
        let value = if is_key(keys, name) {
            match key_literal(name, value)? {
                AttributeValue::N(_) => json_literal(value),
                _ => Value::String(value.to_string()),
            }
        } else {
            json_literal(value)
        };
        record.insert(name.to_string(), value);
    }
    Ok(Value::Object(record))
}

async fn get_record(table: &TableAccessObject<Value>, args: &[&str]) -> Result<()> {
    let [primary] = args else {
        return Err(anyhow!("Usage: get <{}>", table.primary_key()));
    };
    let primary = key_literal(table.primary_key(), primary)?;
    match table.get_by_primary_key(primary).await? {
        Some(record) => println!("Record found: {record}"),
        None => println!("Record not found"),
    }
    Ok(())
}

async fn delete_record(table: &TableAccessObject<Value>, args: &[&str]) -> Result<()> {
    let (primary, sort) = match args {
        [primary] => (*primary, None),
        [primary, sort] => (*primary, Some(sort_literal(table, sort)?)),
        _ => return Err(anyhow!("Usage: delete <{}> [sort value]", table.primary_key())),
    };
    table
        .delete_by_keys(key_literal(table.primary_key(), primary)?, sort)
        .await?;
    println!("Delete request accepted.");
    Ok(())
}

async fn query_records(table: &TableAccessObject<Value>, args: &[&str]) -> Result<()> {
    let Some((primary, rest)) = args.split_first() else {
        return Err(anyhow!("Usage: query <{}> [op v1 [v2]]", table.primary_key()));
    };
    let sort = match rest {
        [] => None,
        [op, values @ ..] if values.len() <= 2 => Some(SortQuery::new(
            op.parse()?,
            values.first().map(|v| sort_literal(table, v)).transpose()?,
            values.get(1).map(|v| sort_literal(table, v)).transpose()?,
        )),
        _ => return Err(anyhow!("Usage: query <pk> [op v1 [v2]]")),
    };
    let primary = key_literal(table.primary_key(), primary)?;
    let records = table.query(primary, sort).await?;
    print_records("Query Results", &records);
    Ok(())
}

async fn scan_records(
    table: &TableAccessObject<Value>,
    id: TableId,
    args: &[&str],
    page_size: usize,
) -> Result<()> {
    let filter = parse_filter(&key_attributes(id), args)?;
    scan_pages(table, filter.as_ref(), page_size, "Scan Results").await
}

async fn search_users(
    table: &TableAccessObject<Value>,
    id: TableId,
    args: &[&str],
    page_size: usize,
) -> Result<()> {
    if id != TableId::Users {
        return Err(anyhow!("search is only available on the users table"));
    }
    let filter = ConditionChain::search(USER_SEARCH_ATTRIBUTE, &args.join(" "))
        .ok_or_else(|| anyhow!("Usage: search <words>"))?;
    scan_pages(table, Some(&filter), page_size, "Search Results").await
}

/// Scans page by page, asking before each following page.
async fn scan_pages(
    table: &TableAccessObject<Value>,
    filter: Option<&ConditionChain>,
    page_size: usize,
    title: &str,
) -> Result<()> {
    let mut pagination = Pagination::first(page_size);
    let mut page_num = 1;
    loop {
        let page = table.scan(filter, pagination).await?;
        print_records(&format!("{title} (Page {page_num})"), &page.records);

        let Some(next) = page.next() else {
            break;
        };
        if !prompt_bool("Continue to next page?", true)? {
            if let Some(cursor) = &next.page_break_key {
                println!("Page break key: {}", cursor.to_token()?);
            }
            break;
        }
        pagination = next;
        page_num += 1;
    }
    Ok(())
}

/// Parses `attr op value [value2] (and|or attr op value ...)*`.
///
/// `between` takes two values; every other operator takes one.
fn parse_filter(keys: &[String], args: &[&str]) -> Result<Option<ConditionChain>, TableError> {
    if args.is_empty() {
        return Ok(None);
    }
    let mut links = Vec::new();
    let mut rest = args;
    loop {
        let [attribute, op, value, tail @ ..] = rest else {
            return Err(TableError::validation(
                "Expected: attr op value [and|or attr op value ...]",
            ));
        };
        let op: ComparisonOp = op.parse()?;
        let operand = |raw: &str| {
            if is_key(keys, attribute) {
                key_literal(attribute, raw)
            } else {
                Ok(literal(raw))
            }
        };
        let (operand2, tail) = match (op.is_range(), tail) {
            (true, [high, tail @ ..]) => (Some(operand(*high)?), tail),
            (true, []) => (None, tail),
            (false, _) => (None, tail),
        };
        links.push(ChainLink::from(Condition::try_new(
            *attribute,
            op,
            Some(operand(*value)?),
            operand2,
        )?));

        match tail {
            [] => break,
            [join] => {
                return Err(TableError::validation(format!(
                    "Filter cannot end with {join}"
                )))
            }
            [join, tail @ ..] => {
                links.push(ChainLink::from(join.parse::<LogicalOperator>()?));
                rest = tail;
            }
        }
    }
    ConditionChain::from_links(links).map(Some)
}

/// Key attributes of the table and of every index on it.
fn key_attributes(id: TableId) -> Vec<String> {
    let base = id.base();
    std::iter::once(base.schema())
        .chain(base.indexes())
        .flat_map(|schema| {
            schema
                .key_attributes()
                .into_iter()
                .map(str::to_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn is_key(keys: &[String], attribute: &str) -> bool {
    keys.iter().any(|key| key == attribute)
}

/// Key values follow the provisioned key type instead of their look.
fn key_literal(attribute: &str, raw: &str) -> Result<AttributeValue, TableError> {
    match TableId::key_attribute_type(attribute) {
        ScalarAttributeType::N if raw.parse::<f64>().is_ok_and(f64::is_finite) => {
            Ok(AttributeValue::N(raw.to_string()))
        }
        ScalarAttributeType::N => Err(TableError::validation(format!(
            "Key attribute '{attribute}' expects a number, got '{raw}'"
        ))),
        _ => Ok(AttributeValue::S(raw.to_string())),
    }
}

fn sort_literal(table: &TableAccessObject<Value>, raw: &str) -> Result<AttributeValue, TableError> {
    match table.sort_key() {
        Some(sort_key) => key_literal(sort_key, raw),
        None => Ok(literal(raw)),
    }
}

/// Numeric-looking literals are numbers, `true`/`false` are booleans, the rest strings.
fn literal(raw: &str) -> AttributeValue {
    match raw {
        "true" => AttributeValue::Bool(true),
        "false" => AttributeValue::Bool(false),
        _ if raw.parse::<f64>().is_ok_and(f64::is_finite) => AttributeValue::N(raw.to_string()),
        _ => raw.into_attribute_value(),
    }
}

fn json_literal(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return Value::from(n);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => match raw.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::from(f),
            _ => Value::String(raw.to_string()),
        },
    }
}

fn print_records(title: &str, records: &[Value]) {
    println!("\n--- {} ---", title);
    records.iter().for_each(|record| println!("{record}"));
    println!("{}", "-".repeat(title.len() + 8));
}

/// Prompts the user for input.
fn prompt(message: &str, example: Option<&str>) -> Result<String> {
    let full_message = if let Some(ex) = example {
        format!("{} (e.g., {}): ", message, ex)
    } else {
        format!("{}: ", message)
    };
    print!("{}", full_message);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

fn prompt_bool(message: &str, default: bool) -> Result<bool> {
    let input = prompt(
        &format!("{} (y/n)", message),
        Some(if default { "y" } else { "n" }),
    )?;
    Ok(input.to_lowercase().starts_with('y') || (input.is_empty() && default))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snitch_keys() -> Vec<String> {
        key_attributes(TableId::Snitches)
    }

    #[test]
    fn test_parse_filter_chain() {
        let chain = parse_filter(&[], &["age", ">=", "21", "and", "firstname", "begins_with", "Al"])
            .unwrap()
            .unwrap();
        let conditions: Vec<_> = chain.conditions().collect();

        assert_eq!(chain.len(), 3);
        assert_eq!(conditions[0].operand1(), &AttributeValue::N("21".into()));
        assert_eq!(conditions[1].operator(), ComparisonOp::BeginsWith);
    }

    #[test]
    fn test_parse_filter_between() {
        let args = ["created", "between", "2", "3", "or", "userId", "=", "1"];
        let chain = parse_filter(&snitch_keys(), &args).unwrap().unwrap();
        let conditions: Vec<_> = chain.conditions().collect();

        assert_eq!(conditions[1].operand1(), &AttributeValue::S("1".into()));
        assert_eq!(chain.first().operand2(), Some(&AttributeValue::N("3".into())));
        assert_eq!(chain.rest()[0].0, LogicalOperator::Or);
    }

    #[test]
    fn test_parse_filter_errors() {
        assert!(parse_filter(&[], &[]).unwrap().is_none());
        assert!(parse_filter(&[], &["age", ">="]).unwrap_err().is_validation());
        assert!(parse_filter(&[], &["age", "=", "1", "and"])
            .unwrap_err()
            .is_validation());
        assert!(parse_filter(&[], &["created", "between", "2"])
            .unwrap_err()
            .is_validation());
        assert!(parse_filter(&[], &["age", "like", "1"]).unwrap_err().is_validation());
    }

    #[test]
    fn test_literals() {
        assert_eq!(literal("42"), AttributeValue::N("42".into()));
        assert_eq!(literal("true"), AttributeValue::Bool(true));
        assert_eq!(literal("u1"), AttributeValue::S("u1".into()));
        assert_eq!(literal("NaN"), AttributeValue::S("NaN".into()));

        assert_eq!(json_literal("42"), Value::from(42));
        assert_eq!(json_literal("2.5"), Value::from(2.5));
        assert_eq!(json_literal("Alice"), Value::from("Alice"));
    }

    #[test]
    fn test_parse_filter_types_key_operands() {
        let keys = key_attributes(TableId::Users);
        let chain = parse_filter(&keys, &["userId", "=", "42", "or", "age", "=", "42"])
            .unwrap()
            .unwrap();
        let conditions: Vec<_> = chain.conditions().collect();

        assert_eq!(conditions[0].operand1(), &AttributeValue::S("42".into()));
        assert_eq!(conditions[1].operand1(), &AttributeValue::N("42".into()));
    }

    #[test]
    fn test_key_literals_follow_key_type() {
        assert_eq!(key_literal("userId", "42").unwrap(), AttributeValue::S("42".into()));
        assert_eq!(key_literal("created", "42").unwrap(), AttributeValue::N("42".into()));
        assert!(key_literal("created", "yesterday").unwrap_err().is_validation());
    }

    #[test]
    fn test_key_attributes_include_indexes() {
        let keys = key_attributes(TableId::PartnersByPartner2);
        assert!(is_key(&keys, "partnerId1"));
        assert!(is_key(&keys, "partnerId2"));
        assert!(!is_key(&keys, "status"));
    }

    #[test]
    fn test_parse_record_keeps_string_keys() {
        let keys = key_attributes(TableId::Users);
        let record = parse_record(&keys, &["userId=42", "age=42", "firstname=Alice"]).unwrap();

        assert_eq!(record["userId"], Value::from("42"));
        assert_eq!(record["age"], Value::from(42));
        assert_eq!(record["firstname"], Value::from("Alice"));

        let snitch = parse_record(&snitch_keys(), &["userId=7", "created=1700000000"]).unwrap();
        assert_eq!(snitch["userId"], Value::from("7"));
        assert_eq!(snitch["created"], Value::from(1_700_000_000i64));
        assert!(parse_record(&snitch_keys(), &["created=soon"]).is_err());
        assert!(parse_record(&keys, &[]).is_err());
    }

    #[tokio::test]
    async fn test_numeric_looking_string_key_round_trips() {
        let store = crate::dynamodb::MemoryStore::new();
        store
            .create_table(&TableId::Users.schema(), &[])
            .await
            .unwrap();
        let table = TableAccessObject::<Value>::new(
            std::sync::Arc::new(store),
            TableId::Users.schema(),
        );
        let keys = key_attributes(TableId::Users);

        let record = parse_record(&keys, &["userId=42", "firstname=Alice"]).unwrap();
        table.create_or_update(&record).await.unwrap();

        let primary = key_literal(table.primary_key(), "42").unwrap();
        let found = table.get_by_primary_key(primary).await.unwrap();
        assert_eq!(found, Some(record));
    }
}
