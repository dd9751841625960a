use aws_sdk_dynamodb::error::{DisplayErrorContext, SdkError};
use thiserror::Error;

/// Failures that are not business outcomes.
/// The HTTP layer turns every one of these into a 503.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("DynamoDB {operation} failed: {message}")]
    Dynamo {
        operation: &'static str,
        message: String,
    },

    #[error("item conversion failed: {0}")]
    Conversion(#[from] serde_dynamo::Error),

    #[error("invalid request body: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServiceError {
    pub fn dynamo<E, R>(operation: &'static str, err: SdkError<E, R>) -> Self
    where
        E: std::error::Error + 'static,
        R: std::fmt::Debug,
    {
        ServiceError::Dynamo {
            operation,
            message: DisplayErrorContext(err).to_string(),
        }
    }

    /// Short name of the failure class, reported to the caller alongside the message
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Dynamo { .. } => "DynamoDbException",
            ServiceError::Conversion(_) => "ItemConversionException",
            ServiceError::Json(_) => "JsonParseException",
        }
    }
}
