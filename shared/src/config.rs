use std::env;

/// Base table partition key
pub const TABLE_PARTITION_KEY: &str = "email";
/// Partition key shared by every secondary index
pub const INDEX_PARTITION_KEY: &str = "country";
/// Every user lives in the same index partition
pub const INDEX_PARTITION_KEY_VALUE: &str = "Ukraine";

pub const COUNTRY_NAME_INDEX: &str = "country-name-index";
pub const COUNTRY_LOCATION_INDEX: &str = "country-location-index";
pub const COUNTRY_BIRTHDAY_INDEX: &str = "country-birthday-index";

pub const LIMIT_QUERY_PARAMETER: &str = "limit";
pub const HASH_KEY_QUERY_PARAMETER: &str = "hashkey";
pub const RANGE_KEY_QUERY_PARAMETER: &str = "rangekey";

pub const SOCIAL_MEDIA_NAMES: [&str; 5] =
    ["linkedin", "telegram", "skype", "instagram", "facebook"];

pub const MAX_AGE: i32 = 150;
pub const MIN_AGE: i32 = 0;

const DEFAULT_TABLE_NAME: &str = "users";

/// Runtime settings read once at cold start
#[derive(Debug, Clone)]
pub struct Config {
    pub table_name: String,
}

impl Config {
    pub fn from_env() -> Self {
        let table_name = env::var("TABLE_NAME").unwrap_or_else(|_| DEFAULT_TABLE_NAME.to_string());
        Self { table_name }
    }
}
