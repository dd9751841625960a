use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

// ========== USER ==========
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Unix timestamp, seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<i64>,
    /// Unix timestamp, seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interests: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub social_media: Option<HashMap<String, String>>, // platform -> handle
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub privacy: Option<serde_json::Value>,
}

impl User {
    /// Overwrite every attribute that is set in `patch`, keeping the rest.
    /// The partition key never changes.
    pub fn merge(&mut self, patch: UpdateUserRequest) {
        if let Some(name) = patch.name {
            self.name = Some(name);
        }
        if let Some(location) = patch.location {
            self.location = Some(location);
        }
        if let Some(birthday) = patch.birthday {
            self.birthday = Some(birthday);
        }
        if let Some(registration) = patch.registration {
            self.registration = Some(registration);
        }
        if let Some(avatar) = patch.avatar {
            self.avatar = Some(avatar);
        }
        if let Some(about) = patch.about {
            self.about = Some(about);
        }
        if let Some(interests) = patch.interests {
            self.interests = Some(interests);
        }
        if let Some(social_media) = patch.social_media {
            self.social_media = Some(social_media);
        }
        if let Some(privacy) = patch.privacy {
            self.privacy = Some(privacy);
        }
    }
}

// Request body for PATCH /users/{email}; email and country are not patchable
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub location: Option<String>,
    pub birthday: Option<i64>,
    pub registration: Option<i64>,
    pub avatar: Option<String>,
    pub about: Option<String>,
    pub interests: Option<Vec<String>>,
    pub social_media: Option<HashMap<String, String>>,
    pub privacy: Option<serde_json::Value>,
}

// ========== LIST FILTER ==========
/// Body accepted by POST /users/query.
/// Age bounds arrive as strings ("20") but plain numbers are tolerated.
/// Numbers and booleans in `name` / `location` are read as their text.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FilterRequest {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub location: Option<String>,
    pub age_limits: Option<Vec<Option<serde_json::Value>>>,
}

/// Accepts any JSON scalar as text; objects and arrays are rejected
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(s)),
        serde_json::Value::Number(n) => Ok(Some(n.to_string())),
        serde_json::Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(serde::de::Error::custom(format!(
            "expected a string, found {}",
            other
        ))),
    }
}

// ========== RESPONSE ==========
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ResponseMessage {
    pub message: String,
}

impl ResponseMessage {
    pub fn json(message: impl Into<String>) -> String {
        serde_json::json!({ "message": message.into() }).to_string()
    }
}
