//! Read planning for user listings.
//!
//! A listing request is reduced to a [`Filter`] (taken from the optional JSON body)
//! and an optional [`Page`] (taken from the query string). [`plan_read`] turns the
//! pair into a [`ReadPlan`]: either a table scan or a query against one of the
//! `country-*` secondary indexes, with limit and exclusive start key filled in
//! only when the request is paginated.

use crate::config::{
    COUNTRY_BIRTHDAY_INDEX, COUNTRY_LOCATION_INDEX, COUNTRY_NAME_INDEX, HASH_KEY_QUERY_PARAMETER,
    INDEX_PARTITION_KEY, INDEX_PARTITION_KEY_VALUE, LIMIT_QUERY_PARAMETER, MAX_AGE, MIN_AGE,
    RANGE_KEY_QUERY_PARAMETER, TABLE_PARTITION_KEY,
};
use crate::types::FilterRequest;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Months, Utc};
use std::collections::HashMap;

/// DynamoDB key map used as `ExclusiveStartKey`
pub type StartKey = HashMap<String, AttributeValue>;

const PARTITION_ALIAS: &str = ":partAlias";
const SORT_ALIAS: &str = ":sortAlias";
const SORT_LOW_ALIAS: &str = ":sortLowAlias";
const SORT_UP_ALIAS: &str = ":sortUpAlias";

/// Secondary indexes, all partitioned by `country`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserIndex {
    Name,
    Location,
    Birthday,
}

impl UserIndex {
    pub fn index_name(&self) -> &'static str {
        match self {
            UserIndex::Name => COUNTRY_NAME_INDEX,
            UserIndex::Location => COUNTRY_LOCATION_INDEX,
            UserIndex::Birthday => COUNTRY_BIRTHDAY_INDEX,
        }
    }

    pub fn sort_attribute(&self) -> &'static str {
        match self {
            UserIndex::Name => "name",
            UserIndex::Location => "location",
            UserIndex::Birthday => "birthday",
        }
    }

    /// Birthday is stored as a number, the other sort keys as strings
    fn sort_value(&self, raw: &str) -> AttributeValue {
        match self {
            UserIndex::Birthday => AttributeValue::N(raw.to_string()),
            UserIndex::Name | UserIndex::Location => AttributeValue::S(raw.to_string()),
        }
    }
}

/// What the listing is restricted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Unfiltered,
    Prefix { index: UserIndex, value: String },
    /// Ages in whole years; `None` falls back to `MIN_AGE` / `MAX_AGE`
    AgeRange { low: Option<i32>, high: Option<i32> },
}

impl Filter {
    /// Pick the filter from a raw request body.
    ///
    /// Only the first usable field counts, in the order name, location, age limits.
    /// A missing or unparseable body lists everything.
    pub fn from_body(body: Option<&str>) -> Self {
        let Some(body) = body else {
            return Filter::Unfiltered;
        };
        match serde_json::from_str::<FilterRequest>(body) {
            Ok(req) => Self::from_request(&req),
            Err(e) => {
                tracing::info!("Ignoring unparseable filter body: {}", e);
                Filter::Unfiltered
            }
        }
    }

    pub fn from_request(req: &FilterRequest) -> Self {
        if let Some(name) = non_empty(req.name.as_deref()) {
            return Filter::Prefix {
                index: UserIndex::Name,
                value: name.to_string(),
            };
        }
        if let Some(location) = non_empty(req.location.as_deref()) {
            return Filter::Prefix {
                index: UserIndex::Location,
                value: location.to_string(),
            };
        }
        if let Some((low, high)) = valid_age_limits(req.age_limits.as_deref()) {
            return Filter::AgeRange {
                low: Some(low),
                high: Some(high),
            };
        }
        Filter::Unfiltered
    }
}

/// Pagination request: a positive limit plus whatever cursor parts were supplied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub limit: i32,
    pub hash_key: Option<String>,
    pub range_key: Option<String>,
}

impl Page {
    /// `None` unless `limit` parses as a positive integer
    pub fn from_query(params: &HashMap<String, String>) -> Option<Self> {
        let limit = params
            .get(LIMIT_QUERY_PARAMETER)
            .and_then(|v| v.parse::<i32>().ok())
            .filter(|limit| *limit > 0)?;
        Some(Page {
            limit,
            hash_key: params.get(HASH_KEY_QUERY_PARAMETER).cloned(),
            range_key: params.get(RANGE_KEY_QUERY_PARAMETER).cloned(),
        })
    }

    fn table_start_key(&self) -> Option<StartKey> {
        let hash = non_empty(self.hash_key.as_deref())?;
        Some(HashMap::from([(
            TABLE_PARTITION_KEY.to_string(),
            AttributeValue::S(hash.to_string()),
        )]))
    }

    fn index_start_key(&self, index: UserIndex) -> Option<StartKey> {
        let hash = non_empty(self.hash_key.as_deref())?;
        let range = non_empty(self.range_key.as_deref())?;
        Some(HashMap::from([
            (
                TABLE_PARTITION_KEY.to_string(),
                AttributeValue::S(hash.to_string()),
            ),
            (
                INDEX_PARTITION_KEY.to_string(),
                AttributeValue::S(INDEX_PARTITION_KEY_VALUE.to_string()),
            ),
            (index.sort_attribute().to_string(), index.sort_value(range)),
        ]))
    }
}

/// Condition on the index sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortCondition {
    BeginsWith(String),
    /// Inclusive bounds on a numeric sort key
    Between(i64, i64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    pub index: UserIndex,
    pub condition: SortCondition,
    pub limit: Option<i32>,
    pub start_key: Option<StartKey>,
}

impl IndexQuery {
    pub fn key_condition_expression(&self) -> String {
        let partition = format!("#{} = {}", INDEX_PARTITION_KEY, PARTITION_ALIAS);
        let sort = format!("#{}", self.index.sort_attribute());
        match self.condition {
            SortCondition::BeginsWith(_) => {
                format!("{} and begins_with ({}, {})", partition, sort, SORT_ALIAS)
            }
            SortCondition::Between(..) => format!(
                "{} and {} between {} and {}",
                partition, sort, SORT_LOW_ALIAS, SORT_UP_ALIAS
            ),
        }
    }

    pub fn expression_attribute_names(&self) -> HashMap<String, String> {
        let sort = self.index.sort_attribute();
        HashMap::from([
            (
                format!("#{}", INDEX_PARTITION_KEY),
                INDEX_PARTITION_KEY.to_string(),
            ),
            (format!("#{}", sort), sort.to_string()),
        ])
    }

    pub fn expression_attribute_values(&self) -> HashMap<String, AttributeValue> {
        let mut values = HashMap::from([(
            PARTITION_ALIAS.to_string(),
            AttributeValue::S(INDEX_PARTITION_KEY_VALUE.to_string()),
        )]);
        match &self.condition {
            SortCondition::BeginsWith(prefix) => {
                values.insert(SORT_ALIAS.to_string(), AttributeValue::S(prefix.clone()));
            }
            SortCondition::Between(low, high) => {
                values.insert(SORT_LOW_ALIAS.to_string(), AttributeValue::N(low.to_string()));
                values.insert(SORT_UP_ALIAS.to_string(), AttributeValue::N(high.to_string()));
            }
        }
        values
    }
}

/// A single storage read, ready to execute
#[derive(Debug, Clone, PartialEq)]
pub enum ReadPlan {
    Scan {
        limit: Option<i32>,
        start_key: Option<StartKey>,
    },
    Query(IndexQuery),
}

impl ReadPlan {
    /// Paginated plans read exactly one page; the rest read until exhausted
    pub fn is_paginated(&self) -> bool {
        match self {
            ReadPlan::Scan { limit, .. } => limit.is_some(),
            ReadPlan::Query(query) => query.limit.is_some(),
        }
    }

    pub fn start_key(&self) -> Option<&StartKey> {
        match self {
            ReadPlan::Scan { start_key, .. } => start_key.as_ref(),
            ReadPlan::Query(query) => query.start_key.as_ref(),
        }
    }
}

pub fn plan_read(filter: &Filter, page: Option<&Page>, now: DateTime<Utc>) -> ReadPlan {
    let limit = page.map(|p| p.limit);
    let (index, condition) = match filter {
        Filter::Unfiltered => {
            return ReadPlan::Scan {
                limit,
                start_key: page.and_then(Page::table_start_key),
            };
        }
        Filter::Prefix { index, value } => (*index, SortCondition::BeginsWith(value.clone())),
        Filter::AgeRange { low, high } => {
            let (birthday_low, birthday_high) = birthday_range(*low, *high, now);
            (
                UserIndex::Birthday,
                SortCondition::Between(birthday_low, birthday_high),
            )
        }
    };
    ReadPlan::Query(IndexQuery {
        index,
        condition,
        limit,
        start_key: page.and_then(|p| p.index_start_key(index)),
    })
}

/// Seconds from `now` to the same instant one calendar year later (365 or 366 days)
pub fn year_seconds(now: DateTime<Utc>) -> i64 {
    let next_year = now.checked_add_months(Months::new(12)).unwrap_or(now);
    (next_year - now).num_seconds()
}

/// Birthday timestamps for people aged between `low` and `high` years at `now`
pub fn birthday_range(low: Option<i32>, high: Option<i32>, now: DateTime<Utc>) -> (i64, i64) {
    let current = now.timestamp();
    let year = year_seconds(now);
    let oldest = i64::from(high.unwrap_or(MAX_AGE));
    let youngest = i64::from(low.unwrap_or(MIN_AGE));
    (current - oldest * year, current - youngest * year)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn age_bound(value: &Option<serde_json::Value>) -> Option<i32> {
    match value.as_ref()? {
        serde_json::Value::String(s) => s.parse().ok(),
        serde_json::Value::Number(n) => n.as_i64().and_then(|n| i32::try_from(n).ok()),
        _ => None,
    }
}

fn valid_age_limits(limits: Option<&[Option<serde_json::Value>]>) -> Option<(i32, i32)> {
    let [low, high, ..] = limits? else {
        return None;
    };
    let (low, high) = (age_bound(low)?, age_bound(high)?);
    (low >= 0 && low < high).then_some((low, high))
}
