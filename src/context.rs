//! Financial context access
//!
//! The product's goal/debt data lives in an external system; the pipeline
//! only reads snapshots through this trait. The in-memory implementation
//! backs development and tests.

use crate::error::Result;
use crate::models::FinancialContext;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Trait for read-only financial context lookups
#[async_trait::async_trait]
pub trait FinancialContextStore: Send + Sync {
    /// Snapshot for one user, `None` when nothing is known about them.
    async fn fetch(&self, user_id: &str) -> Result<Option<FinancialContext>>;
}

/// In-memory context store for development
pub struct InMemoryContextStore {
    contexts: Arc<RwLock<HashMap<String, FinancialContext>>>,
}

impl InMemoryContextStore {
    pub fn new() -> Self {
        Self {
            contexts: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn insert(&self, user_id: &str, context: FinancialContext) {
        self.contexts
            .write()
            .await
            .insert(user_id.to_string(), context);
    }
}

impl Default for InMemoryContextStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl FinancialContextStore for InMemoryContextStore {
    async fn fetch(&self, user_id: &str) -> Result<Option<FinancialContext>> {
        let contexts = self.contexts.read().await;
        Ok(contexts.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_returns_stored_snapshot() {
        let store = InMemoryContextStore::new();
        store
            .insert(
                "u1",
                FinancialContext {
                    total_debt: 12_000.0,
                    monthly_bills: 1800.0,
                    net_worth: 4500.0,
                    has_active_goal: true,
                },
            )
            .await;

        let context = store.fetch("u1").await.unwrap().unwrap();
        assert_eq!(context.total_debt, 12_000.0);
        assert!(context.has_active_goal);
    }

    #[tokio::test]
    async fn test_fetch_unknown_user_is_none() {
        let store = InMemoryContextStore::new();
        assert!(store.fetch("nobody").await.unwrap().is_none());
    }
}
