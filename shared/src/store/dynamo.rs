use crate::config::TABLE_PARTITION_KEY;
use crate::error::ServiceError;
use crate::planner::{IndexQuery, ReadPlan, StartKey};
use crate::store::UserStore;
use crate::types::User;
use async_trait::async_trait;
use aws_sdk_dynamodb::{types::AttributeValue, Client as DynamoClient};
use std::future::Future;

/// [`UserStore`] backed by a DynamoDB table
pub struct DynamoUserStore {
    client: DynamoClient,
    table_name: String,
}

impl DynamoUserStore {
    pub fn new(client: DynamoClient, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    async fn scan_page(
        &self,
        limit: Option<i32>,
        start_key: Option<StartKey>,
    ) -> Result<(Vec<User>, Option<StartKey>), ServiceError> {
        let resp = self
            .client
            .scan()
            .table_name(&self.table_name)
            .consistent_read(false)
            .set_limit(limit)
            .set_exclusive_start_key(start_key)
            .send()
            .await
            .map_err(|e| ServiceError::dynamo("scan", e))?;

        let users: Vec<User> = serde_dynamo::from_items(resp.items().to_vec())?;
        Ok((users, resp.last_evaluated_key().cloned()))
    }

    async fn query_page(
        &self,
        query: &IndexQuery,
        start_key: Option<StartKey>,
    ) -> Result<(Vec<User>, Option<StartKey>), ServiceError> {
        let resp = self
            .client
            .query()
            .table_name(&self.table_name)
            .index_name(query.index.index_name())
            .consistent_read(false)
            .key_condition_expression(query.key_condition_expression())
            .set_expression_attribute_names(Some(query.expression_attribute_names()))
            .set_expression_attribute_values(Some(query.expression_attribute_values()))
            .set_limit(query.limit)
            .set_exclusive_start_key(start_key)
            .send()
            .await
            .map_err(|e| ServiceError::dynamo("query", e))?;

        let users: Vec<User> = serde_dynamo::from_items(resp.items().to_vec())?;
        Ok((users, resp.last_evaluated_key().cloned()))
    }
}

#[async_trait]
impl UserStore for DynamoUserStore {
    async fn load(&self, email: &str) -> Result<Option<User>, ServiceError> {
        let result = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(TABLE_PARTITION_KEY, AttributeValue::S(email.to_string()))
            .send()
            .await
            .map_err(|e| ServiceError::dynamo("get_item", e))?;

        match result.item() {
            Some(item) => Ok(Some(serde_dynamo::from_item(item.clone())?)),
            None => Ok(None),
        }
    }

    async fn insert(&self, user: &User) -> Result<bool, ServiceError> {
        let result = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(serde_dynamo::to_item(user)?))
            .condition_expression(format!("attribute_not_exists({})", TABLE_PARTITION_KEY))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|err| err.is_conditional_check_failed_exception()) =>
            {
                Ok(false)
            }
            Err(e) => Err(ServiceError::dynamo("put_item", e)),
        }
    }

    async fn save(&self, user: &User) -> Result<(), ServiceError> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(serde_dynamo::to_item(user)?))
            .send()
            .await
            .map_err(|e| ServiceError::dynamo("put_item", e))?;
        Ok(())
    }

    async fn delete(&self, email: &str) -> Result<(), ServiceError> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .key(TABLE_PARTITION_KEY, AttributeValue::S(email.to_string()))
            .send()
            .await
            .map_err(|e| ServiceError::dynamo("delete_item", e))?;
        Ok(())
    }

    async fn read(&self, plan: &ReadPlan) -> Result<Vec<User>, ServiceError> {
        collect_pages(plan.is_paginated(), plan.start_key().cloned(), move |start_key| async move {
            match plan {
                ReadPlan::Scan { limit, .. } => self.scan_page(*limit, start_key).await,
                ReadPlan::Query(query) => self.query_page(query, start_key).await,
            }
        })
        .await
    }
}

/// Drive `fetch_page` from `start_key`. A paginated read stops after the first page,
/// otherwise pages are followed through `LastEvaluatedKey` until none is returned.
async fn collect_pages<F, Fut>(
    paginated: bool,
    start_key: Option<StartKey>,
    mut fetch_page: F,
) -> Result<Vec<User>, ServiceError>
where
    F: FnMut(Option<StartKey>) -> Fut,
    Fut: Future<Output = Result<(Vec<User>, Option<StartKey>), ServiceError>>,
{
    let mut users = Vec::new();
    let mut start_key = start_key;
    loop {
        let (page, last_key) = fetch_page(start_key).await?;
        users.extend(page);

        if paginated {
            if let Some(key) = &last_key {
                tracing::info!("Page ends at {:?}", key.get(TABLE_PARTITION_KEY));
            }
            break;
        }
        match last_key {
            Some(key) => start_key = Some(key),
            None => break,
        }
    }
    Ok(users)
}
