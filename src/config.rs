use clap::Parser;
use tracing::Level;

use crate::dynamodb::TableId;

pub const DEFAULT_PAGE_SIZE: usize = 25;

/// Command line configuration; every flag can also come from the environment or `.env`.
///
/// AWS settings (`AWS_REGION`, `AWS_ENDPOINT_URL`, credentials) are read by
/// `aws_config` directly and are not part of this struct.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "snitch-tables",
    about = "Interactive access to the FitSnitch DynamoDB tables"
)]
pub struct Config {
    /// Table or index to open
    #[arg(long, env = "SNITCH_TABLE", default_value = "users")]
    pub table: TableId,

    /// Records per scan page
    #[arg(long, env = "SNITCH_PAGE_SIZE", default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: usize,

    /// Maximum log level
    #[arg(long, env = "SNITCH_LOG_LEVEL", default_value = "info")]
    pub log_level: Level,

    /// Create the table and its indexes when missing
    #[arg(long, env = "SNITCH_PROVISION")]
    pub provision: bool,

    /// Use an in-process store instead of DynamoDB
    #[arg(long)]
    pub memory: bool,
}

impl Config {
    /// Loads `.env` (if any) and parses the process arguments.
    pub fn load() -> Self {
        dotenv::dotenv().ok();
        Self::parse()
    }
}
