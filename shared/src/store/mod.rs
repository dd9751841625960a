pub mod dynamo;
pub mod memory;

use crate::error::ServiceError;
use crate::planner::ReadPlan;
use crate::types::User;
use async_trait::async_trait;

pub use dynamo::DynamoUserStore;
pub use memory::MemoryUserStore;

/// Storage driver for user records, keyed by email
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn load(&self, email: &str) -> Result<Option<User>, ServiceError>;

    /// Write a new record unless one with the same email already exists.
    /// Returns `false` when the email is taken; the stored record is left untouched.
    async fn insert(&self, user: &User) -> Result<bool, ServiceError>;

    /// Insert or replace the whole record
    async fn save(&self, user: &User) -> Result<(), ServiceError>;

    async fn delete(&self, email: &str) -> Result<(), ServiceError>;

    /// Execute a scan or index query. Paginated plans return one page only.
    async fn read(&self, plan: &ReadPlan) -> Result<Vec<User>, ServiceError>;
}
