//! Workbench facade tying the catalog store to the offload coordinator.
//!
//! The store stays the single source of truth; the executor holds a private
//! mirror refreshed through a data subscription. All engine work funnels
//! through the executor so the caller never cares where it actually ran.

use crate::catalog::store::{CatalogStore, SubscriptionToken};
use crate::catalog::{backup, Project};
use crate::error::Result;
use crate::importer::ImportResult;
use crate::matcher::{MatchResult, RequestDescriptor};
use crate::offload::{spawn_executor, Task, TaskExecutor, TaskOutput};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

pub struct Workbench {
    store: Arc<CatalogStore>,
    executor: Arc<dyn TaskExecutor>,
    sync_token: SubscriptionToken,
}

impl Workbench {
    /// Wire the store to the best available executor.
    pub fn new(store: Arc<CatalogStore>) -> Self {
        Self::with_executor(store, spawn_executor())
    }

    pub fn with_executor(store: Arc<CatalogStore>, executor: Arc<dyn TaskExecutor>) -> Self {
        executor.sync(store.snapshot());
        let sync_target = Arc::clone(&executor);
        let sync_token = store.subscribe(move |snapshot| sync_target.sync(snapshot.clone()));
        Self {
            store,
            executor,
            sync_token,
        }
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    /// Resolve a request: match on the executor, apply the selected
    /// response's delay, then emit the log side-channel entry.
    pub async fn send_request(&self, request: RequestDescriptor) -> Result<Option<MatchResult>> {
        let output = self.executor.run(Task::FindMatch(request.clone())).await?;
        let TaskOutput::Match(result) = output else {
            unreachable!("match task always yields a match output");
        };

        if let Some(result) = &result {
            let delay_ms = result.response.resolved_delay_ms();
            if delay_ms > 0 {
                debug!(delay_ms, response = %result.response.id, "applying response delay");
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
            }
        }

        self.store
            .log_match(&self.store.snapshot(), &request, result.as_ref());
        Ok(result)
    }

    /// Parse an OpenAPI document on the executor and apply the generated
    /// endpoints and responses to the catalog.
    pub async fn import_document(&self, project_id: &str, document: Value) -> Result<ImportResult> {
        let output = self
            .executor
            .run(Task::ParseSwagger {
                project_id: project_id.to_string(),
                document: document.clone(),
            })
            .await?;
        let TaskOutput::Import(result) = output else {
            unreachable!("import task always yields an import output");
        };
        self.store.apply_import(
            project_id,
            result.clone(),
            document.get("components").cloned(),
        )?;
        Ok(result)
    }

    pub fn export_project(&self, project_id: &str) -> Result<backup::BackupDocument> {
        backup::export_project(&self.store.snapshot(), project_id)
    }

    pub fn restore_backup(&self, raw: &Value) -> Result<Project> {
        backup::import_backup(&self.store, raw)
    }
}

impl Drop for Workbench {
    fn drop(&mut self) {
        self.store.unsubscribe(self.sync_token);
    }
}
