pub mod config;
pub mod error;
pub mod planner;
pub mod response;
pub mod store;
pub mod types;
pub mod users;

use config::Config;
use std::sync::Arc;
use store::UserStore;

/// Shared application state, built once per cold start
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn UserStore>,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn UserStore>) -> Arc<Self> {
        Arc::new(Self { config, store })
    }
}
