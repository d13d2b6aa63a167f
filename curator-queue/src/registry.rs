use crate::handler::JobHandler;
use std::collections::HashMap;
use std::sync::Arc;

/// Thread-safe handler registry. Built once at startup, immutable
/// thereafter — the same "built once, shared `Arc`" shape as the
/// teacher's `PluginRegistry`, keyed by job type instead of plugin name.
pub struct HandlerRegistry {
    handlers: HashMap<&'static str, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let job_type = handler.job_type();
        tracing::info!(job_type, "registered job handler");
        self.handlers.insert(job_type, handler);
    }

    pub fn get(&self, job_type: &str) -> Option<&Arc<dyn JobHandler>> {
        self.handlers.get(job_type)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandleOutcome;
    use curator_core::domain::Job;
    use sqlx::SqlitePool;

    struct MockHandler;

    #[async_trait::async_trait]
    impl JobHandler for MockHandler {
        fn job_type(&self) -> &'static str {
            "mock_job"
        }
        async fn handle(&self, _pool: &SqlitePool, _job: &Job) -> anyhow::Result<HandleOutcome> {
            Ok(HandleOutcome::Completed)
        }
    }

    #[test]
    fn register_and_get() {
        let mut registry = HandlerRegistry::new();
        assert!(registry.is_empty());
        registry.register(Arc::new(MockHandler));
        assert_eq!(registry.len(), 1);
        assert!(registry.get("mock_job").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn register_overwrite_keeps_last_write() {
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(MockHandler));
        registry.register(Arc::new(MockHandler));
        assert_eq!(registry.len(), 1);
    }
}
