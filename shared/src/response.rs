use crate::error::ServiceError;
use lambda_http::{http::StatusCode, Body, Error, Response};

/// Wrap a body with the headers every endpoint returns
pub fn json_response(body: impl Into<Body>, status: StatusCode) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("X-Custom-Header", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "*")
        .body(body.into())
        .map_err(Box::new)?)
}

/// 503 carrying the failure class and message
pub fn failure_response(err: &ServiceError) -> Result<Response<Body>, Error> {
    tracing::error!("Request failed with {}: {}", err.kind(), err);
    let body = format!(
        "An error occurred while executing the lambda function: {}; message: {}",
        err.kind(),
        err
    );
    json_response(body, StatusCode::SERVICE_UNAVAILABLE)
}
