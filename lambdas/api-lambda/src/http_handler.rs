use lambda_http::{
    http::{Method, StatusCode},
    Body, Error, Request, RequestExt, Response,
};
use std::collections::HashMap;
use std::sync::Arc;
use userdir_shared::config::TABLE_PARTITION_KEY;
use userdir_shared::response::{failure_response, json_response};
use userdir_shared::types::ResponseMessage;
use userdir_shared::{users, AppState};

/// Main Lambda handler - routes /users requests to the user service
pub(crate) async fn function_handler(
    event: Request,
    state: Arc<AppState>,
) -> Result<Response<Body>, Error> {
    let method = event.method();
    let path = event.uri().path();
    tracing::info!(
        "Users API invoked - Method: {} Path: {} Table: {}",
        method,
        path,
        state.config.table_name
    );

    // Handle CORS preflight
    if *method == Method::OPTIONS {
        return json_response(Body::Empty, StatusCode::OK);
    }

    let store = state.store.as_ref();
    let query_params = query_parameters(&event);
    let body = event.body();
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    let result = match (method, parts.as_slice()) {
        // GET /users - list all users
        (&Method::GET, ["users"]) => users::list_users(store, &query_params).await,
        // POST /users/query - list users matching the filter body
        (&Method::POST, ["users", "query"]) => {
            users::list_users_by_query(store, &query_params, body_text(body)).await
        }
        // POST /users - create user
        (&Method::POST, ["users"]) => users::create_user(store, body).await,
        // GET /users/{email} - get user
        (&Method::GET, ["users", email]) => {
            users::find_user(store, &path_email(&event, email)).await
        }
        // PATCH /users/{email} - update user
        (&Method::PATCH, ["users", email]) => {
            users::update_user(store, &path_email(&event, email), body).await
        }
        // DELETE /users/{email} - delete user
        (&Method::DELETE, ["users", email]) => {
            users::delete_user(store, &path_email(&event, email)).await
        }
        _ => return not_found(),
    };

    match result {
        Ok(output) => json_response(output, StatusCode::OK),
        Err(e) => failure_response(&e),
    }
}

fn query_parameters(event: &Request) -> HashMap<String, String> {
    event
        .query_string_parameters_ref()
        .map(|params| {
            params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// API Gateway supplies `{email}` as a path parameter; fall back to the
/// percent-decoded path segment
fn path_email(event: &Request, segment: &str) -> String {
    if let Some(email) = event
        .path_parameters_ref()
        .and_then(|params| params.first(TABLE_PARTITION_KEY))
    {
        return email.to_string();
    }
    match urlencoding::decode(segment) {
        Ok(email) => email.into_owned(),
        Err(e) => {
            tracing::warn!("Path segment {} is not valid UTF-8 once decoded: {}", segment, e);
            segment.to_string()
        }
    }
}

fn body_text(body: &Body) -> Option<&str> {
    match body {
        Body::Empty => None,
        Body::Text(text) => Some(text.as_str()),
        Body::Binary(bytes) => std::str::from_utf8(bytes).ok(),
    }
}

fn not_found() -> Result<Response<Body>, Error> {
    json_response(ResponseMessage::json("Not found"), StatusCode::NOT_FOUND)
}
