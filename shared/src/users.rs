use crate::config::{INDEX_PARTITION_KEY_VALUE, SOCIAL_MEDIA_NAMES};
use crate::error::ServiceError;
use crate::planner::{plan_read, Filter, Page};
use crate::store::UserStore;
use crate::types::{ResponseMessage, UpdateUserRequest, User};
use chrono::Utc;
use std::collections::HashMap;

/// Create a user. Existing emails and unknown social media platforms are
/// rejected with a message, nothing is written in that case.
pub async fn create_user(store: &dyn UserStore, body: &[u8]) -> Result<String, ServiceError> {
    let mut user: User = serde_json::from_slice(body)?;
    user.country = Some(INDEX_PARTITION_KEY_VALUE.to_string());

    if store.load(&user.email).await?.is_some() {
        tracing::warn!("User {} already exists", user.email);
        return Ok(ResponseMessage::json("User with this email already exists"));
    }
    if !is_valid_social_media(user.social_media.as_ref()) {
        tracing::warn!("Rejected social media links for {}", user.email);
        return Ok(ResponseMessage::json(
            "User with such social media links cannot be created",
        ));
    }

    // A concurrent create may have taken the email since the check above
    if !store.insert(&user).await? {
        tracing::warn!("User {} was created concurrently", user.email);
        return Ok(ResponseMessage::json("User with this email already exists"));
    }
    Ok(ResponseMessage::json(format!("User created: {}", user.email)))
}

/// Full record as JSON, or a not-found message
pub async fn find_user(store: &dyn UserStore, email: &str) -> Result<String, ServiceError> {
    match store.load(email).await? {
        Some(user) => Ok(serde_json::to_string(&user)?),
        None => Ok(ResponseMessage::json("User not found")),
    }
}

/// Patch an existing user; fields missing from the body keep their stored value
pub async fn update_user(
    store: &dyn UserStore,
    email: &str,
    body: &[u8],
) -> Result<String, ServiceError> {
    let patch: UpdateUserRequest = serde_json::from_slice(body)?;

    let Some(mut user) = store.load(email).await? else {
        return Ok(ResponseMessage::json("User not found"));
    };
    user.merge(patch);
    user.country = Some(INDEX_PARTITION_KEY_VALUE.to_string());

    if !is_valid_social_media(user.social_media.as_ref()) {
        tracing::warn!("Rejected social media links for {}", email);
        return Ok(ResponseMessage::json(
            "User with such social media links cannot be updated",
        ));
    }

    store.save(&user).await?;
    Ok(ResponseMessage::json(format!("User updated: {}", user.email)))
}

pub async fn delete_user(store: &dyn UserStore, email: &str) -> Result<String, ServiceError> {
    match store.load(email).await? {
        Some(user) => {
            store.delete(&user.email).await?;
            Ok(ResponseMessage::json(format!("User deleted: {}", user.email)))
        }
        None => Ok(ResponseMessage::json("User not found")),
    }
}

/// Unfiltered listing, optionally paginated by `limit` / `hashkey`
pub async fn list_users(
    store: &dyn UserStore,
    query_params: &HashMap<String, String>,
) -> Result<String, ServiceError> {
    read_users(store, &Filter::Unfiltered, query_params).await
}

/// Listing filtered by the JSON body (name prefix, location prefix or age range),
/// optionally paginated by `limit` / `hashkey` / `rangekey`
pub async fn list_users_by_query(
    store: &dyn UserStore,
    query_params: &HashMap<String, String>,
    body: Option<&str>,
) -> Result<String, ServiceError> {
    let filter = Filter::from_body(body);
    read_users(store, &filter, query_params).await
}

async fn read_users(
    store: &dyn UserStore,
    filter: &Filter,
    query_params: &HashMap<String, String>,
) -> Result<String, ServiceError> {
    let page = Page::from_query(query_params);
    let plan = plan_read(filter, page.as_ref(), Utc::now());
    tracing::info!("Reading users with {:?}", plan);

    let users = store.read(&plan).await?;
    Ok(serde_json::to_string(&users)?)
}

fn is_valid_social_media(social_media: Option<&HashMap<String, String>>) -> bool {
    social_media.map_or(true, |links| {
        links
            .keys()
            .all(|platform| SOCIAL_MEDIA_NAMES.contains(&platform.as_str()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::{ReadPlan, SortCondition, UserIndex};
    use crate::store::MemoryUserStore;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Barrier;

    /// Holds every `load` until two callers are waiting, so both pass the
    /// existence check before either writes
    struct LockstepStore {
        inner: MemoryUserStore,
        barrier: Arc<Barrier>,
    }

    #[async_trait]
    impl UserStore for LockstepStore {
        async fn load(&self, email: &str) -> Result<Option<User>, ServiceError> {
            let found = self.inner.load(email).await;
            self.barrier.wait().await;
            found
        }

        async fn insert(&self, user: &User) -> Result<bool, ServiceError> {
            self.inner.insert(user).await
        }

        async fn save(&self, user: &User) -> Result<(), ServiceError> {
            self.inner.save(user).await
        }

        async fn delete(&self, email: &str) -> Result<(), ServiceError> {
            self.inner.delete(email).await
        }

        async fn read(&self, plan: &ReadPlan) -> Result<Vec<User>, ServiceError> {
            self.inner.read(plan).await
        }
    }

    fn message(body: &str) -> String {
        serde_json::from_str::<ResponseMessage>(body).unwrap().message
    }

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_create_user_with_allowed_social_media() {
        let store = MemoryUserStore::new();
        let body = br#"{"email":"olena@example.com","name":"Olena",
            "socialMedia":{"linkedin":"olena","telegram":"@olena",
                "skype":"o","instagram":"o","facebook":"o"}}"#;

        let out = create_user(&store, body).await.unwrap();
        assert_eq!(message(&out), "User created: olena@example.com");

        let saved = store.load("olena@example.com").await.unwrap().unwrap();
        assert_eq!(saved.country.as_deref(), Some("Ukraine"));
        assert_eq!(saved.name.as_deref(), Some("Olena"));
    }

    #[tokio::test]
    async fn test_create_user_forces_index_partition() {
        let store = MemoryUserStore::new();
        create_user(&store, br#"{"email":"a@b.com","country":"Poland"}"#)
            .await
            .unwrap();
        let saved = store.load("a@b.com").await.unwrap().unwrap();
        assert_eq!(saved.country.as_deref(), Some("Ukraine"));
    }

    #[tokio::test]
    async fn test_create_user_rejects_unknown_social_media() {
        let store = MemoryUserStore::new();
        let body = br#"{"email":"a@b.com","socialMedia":{"linkedin":"a","myspace":"a"}}"#;

        let out = create_user(&store, body).await.unwrap();
        assert_eq!(
            message(&out),
            "User with such social media links cannot be created"
        );
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_user_twice_keeps_first_record() {
        let store = MemoryUserStore::new();
        create_user(&store, br#"{"email":"a@b.com","name":"First"}"#)
            .await
            .unwrap();

        let out = create_user(&store, br#"{"email":"a@b.com","name":"Second"}"#)
            .await
            .unwrap();
        assert_eq!(message(&out), "User with this email already exists");

        let saved = store.load("a@b.com").await.unwrap().unwrap();
        assert_eq!(saved.name.as_deref(), Some("First"));
    }

    #[tokio::test]
    async fn test_concurrent_creates_keep_one_record() {
        let inner = MemoryUserStore::new();
        let store = LockstepStore {
            inner: inner.clone(),
            barrier: Arc::new(Barrier::new(2)),
        };

        let (first, second) = tokio::join!(
            create_user(&store, br#"{"email":"a@b.com","name":"First"}"#),
            create_user(&store, br#"{"email":"a@b.com","name":"Second"}"#),
        );
        let (first, second) = (message(&first.unwrap()), message(&second.unwrap()));

        let saved = inner.load("a@b.com").await.unwrap().unwrap();
        let winner = if first == "User created: a@b.com" {
            assert_eq!(second, "User with this email already exists");
            "First"
        } else {
            assert_eq!(first, "User with this email already exists");
            assert_eq!(second, "User created: a@b.com");
            "Second"
        };
        assert_eq!(saved.name.as_deref(), Some(winner));
        assert_eq!(inner.len().await, 1);
    }

    #[tokio::test]
    async fn test_create_user_with_malformed_body_is_error() {
        let store = MemoryUserStore::new();
        let err = create_user(&store, b"{not json").await.unwrap_err();
        assert_eq!(err.kind(), "JsonParseException");
    }

    #[tokio::test]
    async fn test_find_user() {
        let store = MemoryUserStore::new();
        create_user(&store, br#"{"email":"a@b.com","name":"Anna","birthday":631152000}"#)
            .await
            .unwrap();

        let found = find_user(&store, "a@b.com").await.unwrap();
        let found: User = serde_json::from_str(&found).unwrap();
        assert_eq!(found.name.as_deref(), Some("Anna"));
        assert_eq!(found.birthday, Some(631152000));

        let out = find_user(&store, "nobody@b.com").await.unwrap();
        assert_eq!(message(&out), "User not found");
    }

    #[tokio::test]
    async fn test_delete_user() {
        let store = MemoryUserStore::new();
        create_user(&store, br#"{"email":"a@b.com"}"#).await.unwrap();

        let out = delete_user(&store, "nobody@b.com").await.unwrap();
        assert_eq!(message(&out), "User not found");
        assert_eq!(store.len().await, 1);

        let out = delete_user(&store, "a@b.com").await.unwrap();
        assert_eq!(message(&out), "User deleted: a@b.com");
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_user_merges_fields() {
        let store = MemoryUserStore::new();
        create_user(&store, br#"{"email":"a@b.com","name":"Anna","location":"Kyiv"}"#)
            .await
            .unwrap();

        let out = update_user(&store, "a@b.com", br#"{"location":"Lviv","about":"hi"}"#)
            .await
            .unwrap();
        assert_eq!(message(&out), "User updated: a@b.com");

        let saved = store.load("a@b.com").await.unwrap().unwrap();
        assert_eq!(saved.name.as_deref(), Some("Anna"));
        assert_eq!(saved.location.as_deref(), Some("Lviv"));
        assert_eq!(saved.about.as_deref(), Some("hi"));
        assert_eq!(saved.country.as_deref(), Some("Ukraine"));
    }

    #[tokio::test]
    async fn test_update_user_missing_or_invalid() {
        let store = MemoryUserStore::new();
        let out = update_user(&store, "a@b.com", br#"{"name":"X"}"#).await.unwrap();
        assert_eq!(message(&out), "User not found");
        assert!(store.is_empty().await);

        create_user(&store, br#"{"email":"a@b.com","name":"Anna"}"#)
            .await
            .unwrap();
        let out = update_user(&store, "a@b.com", br#"{"name":"X","socialMedia":{"vk":"x"}}"#)
            .await
            .unwrap();
        assert_eq!(
            message(&out),
            "User with such social media links cannot be updated"
        );
        let saved = store.load("a@b.com").await.unwrap().unwrap();
        assert_eq!(saved.name.as_deref(), Some("Anna"));
    }

    #[tokio::test]
    async fn test_list_users_returns_bare_array() {
        let store = MemoryUserStore::new();
        for email in ["b@x.com", "a@x.com", "c@x.com"] {
            create_user(&store, format!(r#"{{"email":"{}"}}"#, email).as_bytes())
                .await
                .unwrap();
        }

        let out = list_users(&store, &HashMap::new()).await.unwrap();
        let users: Vec<User> = serde_json::from_str(&out).unwrap();
        assert_eq!(users.len(), 3);

        let out = list_users(&store, &params(&[("limit", "2"), ("hashkey", "a@x.com")]))
            .await
            .unwrap();
        let users: Vec<User> = serde_json::from_str(&out).unwrap();
        let emails: Vec<_> = users.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, ["b@x.com", "c@x.com"]);
    }

    #[tokio::test]
    async fn test_invalid_limit_reads_everything() {
        let store = MemoryUserStore::new();
        for limit in ["0", "-5", "abc"] {
            list_users(&store, &params(&[("limit", limit), ("hashkey", "a@x.com")]))
                .await
                .unwrap();
            assert_eq!(
                store.last_plan().await,
                Some(ReadPlan::Scan {
                    limit: None,
                    start_key: None
                })
            );
        }
    }

    #[tokio::test]
    async fn test_list_by_query_prefers_name() {
        let store = MemoryUserStore::new();
        create_user(&store, br#"{"email":"a@x.com","name":"Anna","location":"Odesa"}"#)
            .await
            .unwrap();
        create_user(&store, br#"{"email":"b@x.com","name":"Bohdan","location":"Kyiv"}"#)
            .await
            .unwrap();

        let body = r#"{"name":"An","location":"Ky"}"#;
        let out = list_users_by_query(&store, &HashMap::new(), Some(body))
            .await
            .unwrap();
        let users: Vec<User> = serde_json::from_str(&out).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "a@x.com");

        let Some(ReadPlan::Query(query)) = store.last_plan().await else {
            panic!("expected index query");
        };
        assert_eq!(query.index, UserIndex::Name);
    }

    #[tokio::test]
    async fn test_list_by_age_range() {
        let store = MemoryUserStore::new();
        let now = Utc::now().timestamp();
        let year = 366 * 86_400;
        create_user(
            &store,
            format!(r#"{{"email":"young@x.com","birthday":{}}}"#, now - 10 * year).as_bytes(),
        )
        .await
        .unwrap();
        create_user(
            &store,
            format!(r#"{{"email":"adult@x.com","birthday":{}}}"#, now - 25 * year).as_bytes(),
        )
        .await
        .unwrap();

        let out = list_users_by_query(&store, &HashMap::new(), Some(r#"{"ageLimits":["20","30"]}"#))
            .await
            .unwrap();
        let users: Vec<User> = serde_json::from_str(&out).unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "adult@x.com");

        let Some(ReadPlan::Query(query)) = store.last_plan().await else {
            panic!("expected index query");
        };
        assert!(matches!(query.condition, SortCondition::Between(..)));
        assert_eq!(query.limit, None);
    }

    #[tokio::test]
    async fn test_list_by_query_paginated_without_range_key_restarts() {
        let store = MemoryUserStore::new();
        list_users_by_query(
            &store,
            &params(&[("limit", "3"), ("hashkey", "a@x.com")]),
            Some(r#"{"location":"Ky"}"#),
        )
        .await
        .unwrap();

        let Some(ReadPlan::Query(query)) = store.last_plan().await else {
            panic!("expected index query");
        };
        assert_eq!(query.limit, Some(3));
        assert_eq!(query.start_key, None);
    }

    #[tokio::test]
    async fn test_list_by_query_with_broken_body_scans() {
        let store = MemoryUserStore::new();
        list_users_by_query(&store, &HashMap::new(), Some("{oops"))
            .await
            .unwrap();
        assert!(matches!(
            store.last_plan().await,
            Some(ReadPlan::Scan { limit: None, .. })
        ));
    }
}
