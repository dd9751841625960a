//! In-memory user storage for local development and tests.
//!
//! Mirrors DynamoDB read ordering closely enough for pagination to behave the same:
//! scans walk the table in key order, index queries walk the `country` partition in
//! sort-key order (ties broken by email), and an exclusive start key resumes right
//! after the item it names.

use std::cmp::Ordering;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use tokio::sync::RwLock;

use crate::config::{INDEX_PARTITION_KEY_VALUE, TABLE_PARTITION_KEY};
use crate::error::ServiceError;
use crate::planner::{IndexQuery, ReadPlan, SortCondition, StartKey, UserIndex};
use crate::store::UserStore;
use crate::types::User;

/// Sort key value of a user within an index
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum SortValue {
    Number(i64),
    Text(String),
}

impl SortValue {
    fn of(user: &User, index: UserIndex) -> Option<Self> {
        match index {
            UserIndex::Name => user.name.clone().map(SortValue::Text),
            UserIndex::Location => user.location.clone().map(SortValue::Text),
            UserIndex::Birthday => user.birthday.map(SortValue::Number),
        }
    }

    fn from_attribute(value: &AttributeValue) -> Option<Self> {
        match value {
            AttributeValue::S(s) => Some(SortValue::Text(s.clone())),
            AttributeValue::N(n) => n.parse().ok().map(SortValue::Number),
            _ => None,
        }
    }

    fn matches(&self, condition: &SortCondition) -> bool {
        match (self, condition) {
            (SortValue::Text(text), SortCondition::BeginsWith(prefix)) => text.starts_with(prefix),
            (SortValue::Number(n), SortCondition::Between(low, high)) => low <= n && n <= high,
            _ => false,
        }
    }
}

/// In-memory user store. Data is lost when the store is dropped.
#[derive(Debug, Clone, Default)]
pub struct MemoryUserStore {
    users: Arc<RwLock<BTreeMap<String, User>>>,
    last_plan: Arc<RwLock<Option<ReadPlan>>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The plan passed to the most recent [`UserStore::read`]
    pub async fn last_plan(&self) -> Option<ReadPlan> {
        self.last_plan.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }

    fn scan(
        users: &BTreeMap<String, User>,
        limit: Option<i32>,
        start_key: Option<&StartKey>,
    ) -> Vec<User> {
        let after = start_key
            .and_then(|key| key.get(TABLE_PARTITION_KEY))
            .and_then(|v| v.as_s().ok());
        users
            .iter()
            .filter(|(email, _)| after.map_or(true, |after| email.as_str() > after.as_str()))
            .map(|(_, user)| user.clone())
            .take(page_size(limit))
            .collect()
    }

    fn query(users: &BTreeMap<String, User>, query: &IndexQuery) -> Vec<User> {
        let mut matching: Vec<(SortValue, &User)> = users
            .values()
            .filter(|user| user.country.as_deref() == Some(INDEX_PARTITION_KEY_VALUE))
            .filter_map(|user| SortValue::of(user, query.index).map(|value| (value, user)))
            .filter(|(value, _)| value.matches(&query.condition))
            .collect();
        matching.sort_by(|(a, ua), (b, ub)| a.cmp(b).then_with(|| ua.email.cmp(&ub.email)));

        let after = query.start_key.as_ref().and_then(|key| {
            let value = SortValue::from_attribute(key.get(query.index.sort_attribute())?)?;
            let email = key.get(TABLE_PARTITION_KEY)?.as_s().ok()?.clone();
            Some((value, email))
        });

        matching
            .into_iter()
            .filter(|(value, user)| match &after {
                Some((after_value, after_email)) => {
                    match value.cmp(after_value) {
                        Ordering::Greater => true,
                        Ordering::Equal => user.email.as_str() > after_email.as_str(),
                        Ordering::Less => false,
                    }
                }
                None => true,
            })
            .map(|(_, user)| user.clone())
            .take(page_size(query.limit))
            .collect()
    }
}

fn page_size(limit: Option<i32>) -> usize {
    limit
        .and_then(|limit| usize::try_from(limit).ok())
        .unwrap_or(usize::MAX)
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn load(&self, email: &str) -> Result<Option<User>, ServiceError> {
        Ok(self.users.read().await.get(email).cloned())
    }

    async fn insert(&self, user: &User) -> Result<bool, ServiceError> {
        let mut users = self.users.write().await;
        match users.entry(user.email.clone()) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(user.clone());
                Ok(true)
            }
        }
    }

    async fn save(&self, user: &User) -> Result<(), ServiceError> {
        let mut users = self.users.write().await;
        users.insert(user.email.clone(), user.clone());
        Ok(())
    }

    async fn delete(&self, email: &str) -> Result<(), ServiceError> {
        let mut users = self.users.write().await;
        users.remove(email);
        Ok(())
    }

    async fn read(&self, plan: &ReadPlan) -> Result<Vec<User>, ServiceError> {
        *self.last_plan.write().await = Some(plan.clone());
        let users = self.users.read().await;
        Ok(match plan {
            ReadPlan::Scan { limit, start_key } => Self::scan(&users, *limit, start_key.as_ref()),
            ReadPlan::Query(query) => Self::query(&users, query),
        })
    }
}
