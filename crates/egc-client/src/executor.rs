use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use egc_types::{Operation, Variables};

/// Whatever the executor failed with, boxed so any transport error fits.
pub type ExecutionError = Box<dyn std::error::Error + Send + Sync>;

/// Runs operations against the data source and returns the `data` tree.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    async fn execute(&self, operation: &Operation, variables: &Variables) -> Result<Value, ExecutionError>;
}

#[async_trait]
impl<T: QueryExecutor + ?Sized> QueryExecutor for Arc<T> {
    async fn execute(&self, operation: &Operation, variables: &Variables) -> Result<Value, ExecutionError> {
        (**self).execute(operation, variables).await
    }
}
