use aws_sdk_dynamodb::Client as DynamoClient;
use lambda_http::{run, service_fn, tracing, Error, Request};
use std::sync::Arc;
use userdir_shared::config::Config;
use userdir_shared::store::DynamoUserStore;
use userdir_shared::AppState;

mod http_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    // Initialize AWS clients once at startup
    let aws_config = aws_config::load_from_env().await;
    let config = Config::from_env();
    let store = DynamoUserStore::new(DynamoClient::new(&aws_config), config.table_name.clone());

    let state = AppState::new(config, Arc::new(store));

    run(service_fn(move |event: Request| {
        let state = Arc::clone(&state);
        async move { http_handler::function_handler(event, state).await }
    }))
    .await
}
