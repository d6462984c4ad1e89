//! Catalog Store: the single writer of the canonical catalog.
//!
//! Every successful mutation persists the full document synchronously and
//! then notifies data observers with the fresh snapshot. Match attempts emit
//! [`LogEntry`] records on a separate log listener registry. The engines
//! themselves stay pure; this module owns all side effects.

use super::persistence::{CatalogPersistence, InMemoryPersistence};
use super::{
    generate_id, DelayMode, Endpoint, LogEntry, MockResponse, Project, ProjectStatus,
    ResponseStrategy, StoreData, SwaggerDocs,
};
use crate::error::{Error, Result};
use crate::importer::{parse_swagger, ImportResult};
use crate::matcher::{self, MatchResult, RequestDescriptor};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

type DataListener = Arc<dyn Fn(&StoreData) + Send + Sync>;
type LogListener = Arc<dyn Fn(&LogEntry) + Send + Sync>;

/// Handle returned by `subscribe*`; pass back to `unsubscribe*` to stop
/// receiving notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken(u64);

pub struct CatalogStore {
    data: RwLock<StoreData>,
    persistence: Box<dyn CatalogPersistence>,
    data_listeners: Mutex<HashMap<u64, DataListener>>,
    log_listeners: Mutex<HashMap<u64, LogListener>>,
    next_token: AtomicU64,
}

impl CatalogStore {
    /// Open a store over the given persistence backend, loading any
    /// previously persisted catalog.
    pub fn open(persistence: Box<dyn CatalogPersistence>) -> Result<Self> {
        let initial = persistence.load()?.unwrap_or_default();
        Ok(Self {
            data: RwLock::new(initial),
            persistence,
            data_listeners: Mutex::new(HashMap::new()),
            log_listeners: Mutex::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        })
    }

    /// Store with in-memory persistence, mainly for tests.
    pub fn in_memory() -> Self {
        Self::open(Box::new(InMemoryPersistence::new())).expect("in-memory store cannot fail")
    }

    /// Clone of the full catalog. The engines operate on this snapshot.
    pub fn snapshot(&self) -> StoreData {
        self.data.read().clone()
    }

    // ------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------

    /// Register a data observer, invoked synchronously with the fresh
    /// snapshot after every successful mutation and persistence write.
    pub fn subscribe(
        &self,
        listener: impl Fn(&StoreData) + Send + Sync + 'static,
    ) -> SubscriptionToken {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.data_listeners.lock().insert(token, Arc::new(listener));
        SubscriptionToken(token)
    }

    pub fn unsubscribe(&self, token: SubscriptionToken) {
        self.data_listeners.lock().remove(&token.0);
    }

    /// Register a log listener for the match side-channel.
    pub fn subscribe_logs(
        &self,
        listener: impl Fn(&LogEntry) + Send + Sync + 'static,
    ) -> SubscriptionToken {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.log_listeners.lock().insert(token, Arc::new(listener));
        SubscriptionToken(token)
    }

    pub fn unsubscribe_logs(&self, token: SubscriptionToken) {
        self.log_listeners.lock().remove(&token.0);
    }

    /// Persist and notify after a mutation. Runs with no data lock held, and
    /// listeners are invoked with no registry lock held either, so a listener
    /// may subscribe, unsubscribe or mutate the store.
    fn commit(&self, snapshot: &StoreData) -> Result<()> {
        self.persistence.save(snapshot)?;
        let listeners: Vec<DataListener> = self.data_listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener(snapshot);
        }
        Ok(())
    }

    fn emit_log(&self, entry: LogEntry) {
        let listeners: Vec<LogListener> = self.log_listeners.lock().values().cloned().collect();
        for listener in listeners {
            listener(&entry);
        }
    }

    /// Run a mutation under the write lock, then persist and notify.
    fn mutate<T>(&self, f: impl FnOnce(&mut StoreData) -> Result<T>) -> Result<T> {
        let (out, snapshot) = {
            let mut data = self.data.write();
            let out = f(&mut data)?;
            (out, data.clone())
        };
        self.commit(&snapshot)?;
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------

    pub fn create_project(&self, name: &str, description: &str) -> Result<Project> {
        let project = Project {
            id: generate_id(),
            name: name.to_string(),
            description: description.to_string(),
            base_url: format!("/mock/{}", generate_id()),
            status: ProjectStatus::Stopped,
            components: None,
        };
        info!(project = %project.id, name = %project.name, "creating project");
        self.mutate(|data| {
            data.projects.push(project.clone());
            Ok(project.clone())
        })
    }

    pub fn projects(&self) -> Vec<Project> {
        self.data.read().projects.clone()
    }

    pub fn project(&self, id: &str) -> Option<Project> {
        self.data.read().projects.iter().find(|p| p.id == id).cloned()
    }

    pub fn update_project(&self, project: Project) -> Result<()> {
        self.mutate(|data| {
            let slot = data
                .projects
                .iter_mut()
                .find(|p| p.id == project.id)
                .ok_or_else(|| Error::ProjectNotFound(project.id.clone()))?;
            *slot = project;
            Ok(())
        })
    }

    pub fn update_project_status(&self, id: &str, status: ProjectStatus) -> Result<()> {
        self.mutate(|data| {
            let project = data
                .projects
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| Error::ProjectNotFound(id.to_string()))?;
            project.status = status;
            Ok(())
        })
    }

    /// Delete a project and cascade to its endpoints and their responses.
    pub fn delete_project(&self, id: &str) -> Result<()> {
        self.mutate(|data| {
            if !data.projects.iter().any(|p| p.id == id) {
                return Err(Error::ProjectNotFound(id.to_string()));
            }
            data.projects.retain(|p| p.id != id);
            let removed: Vec<String> = data
                .endpoints
                .iter()
                .filter(|e| e.project_id == id)
                .map(|e| e.id.clone())
                .collect();
            data.endpoints.retain(|e| e.project_id != id);
            data.responses.retain(|r| !removed.contains(&r.endpoint_id));
            debug!(project = %id, endpoints = removed.len(), "cascade-deleted project");
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Endpoints
    // ------------------------------------------------------------------

    pub fn create_endpoint(
        &self,
        project_id: &str,
        method: &str,
        path: &str,
        name: &str,
    ) -> Result<Endpoint> {
        let endpoint = Endpoint {
            id: generate_id(),
            project_id: project_id.to_string(),
            method: method.to_uppercase(),
            path: path.to_string(),
            name: name.to_string(),
            description: None,
            response_strategy: ResponseStrategy::Default,
            default_response_id: None,
            docs: Some(SwaggerDocs {
                tags: vec!["Custom".to_string()],
                ..SwaggerDocs::default()
            }),
        };
        self.mutate(|data| {
            if !data.projects.iter().any(|p| p.id == project_id) {
                return Err(Error::ProjectNotFound(project_id.to_string()));
            }
            data.endpoints.push(endpoint.clone());
            Ok(endpoint.clone())
        })
    }

    pub fn endpoints(&self, project_id: &str) -> Vec<Endpoint> {
        self.data
            .read()
            .endpoints
            .iter()
            .filter(|e| e.project_id == project_id)
            .cloned()
            .collect()
    }

    pub fn endpoint(&self, id: &str) -> Option<Endpoint> {
        self.data.read().endpoints.iter().find(|e| e.id == id).cloned()
    }

    pub fn update_endpoint(&self, endpoint: Endpoint) -> Result<()> {
        self.mutate(|data| {
            let slot = data
                .endpoints
                .iter_mut()
                .find(|e| e.id == endpoint.id)
                .ok_or_else(|| Error::EndpointNotFound(endpoint.id.clone()))?;
            *slot = endpoint;
            Ok(())
        })
    }

    /// Delete an endpoint and cascade to its responses.
    pub fn delete_endpoint(&self, id: &str) -> Result<()> {
        self.mutate(|data| {
            if !data.endpoints.iter().any(|e| e.id == id) {
                return Err(Error::EndpointNotFound(id.to_string()));
            }
            data.endpoints.retain(|e| e.id != id);
            data.responses.retain(|r| r.endpoint_id != id);
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Responses
    // ------------------------------------------------------------------

    /// Create a response. The first response created for an endpoint becomes
    /// its default.
    pub fn create_response(
        &self,
        endpoint_id: &str,
        name: &str,
        body: &str,
        status_code: u16,
    ) -> Result<MockResponse> {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        let response = MockResponse {
            id: generate_id(),
            endpoint_id: endpoint_id.to_string(),
            name: name.to_string(),
            status_code,
            headers,
            body: body.to_string(),
            delay: 0,
            delay_mode: DelayMode::Fixed,
            delay_min: Some(100),
            delay_max: Some(500),
            match_type: None,
            match_expression: None,
        };
        self.mutate(|data| {
            let endpoint = data
                .endpoints
                .iter_mut()
                .find(|e| e.id == endpoint_id)
                .ok_or_else(|| Error::EndpointNotFound(endpoint_id.to_string()))?;
            if endpoint.default_response_id.is_none() {
                endpoint.default_response_id = Some(response.id.clone());
            }
            data.responses.push(response.clone());
            Ok(response.clone())
        })
    }

    pub fn responses(&self, endpoint_id: &str) -> Vec<MockResponse> {
        self.data
            .read()
            .responses
            .iter()
            .filter(|r| r.endpoint_id == endpoint_id)
            .cloned()
            .collect()
    }

    pub fn update_response(&self, response: MockResponse) -> Result<()> {
        self.mutate(|data| {
            let slot = data
                .responses
                .iter_mut()
                .find(|r| r.id == response.id)
                .ok_or_else(|| Error::ResponseNotFound(response.id.clone()))?;
            *slot = response;
            Ok(())
        })
    }

    pub fn delete_response(&self, id: &str) -> Result<()> {
        self.mutate(|data| {
            if !data.responses.iter().any(|r| r.id == id) {
                return Err(Error::ResponseNotFound(id.to_string()));
            }
            data.responses.retain(|r| r.id != id);
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Engine integration
    // ------------------------------------------------------------------

    /// Resolve a request against the current snapshot and emit the log
    /// side-channel entry (503 project stopped/missing, 404 no endpoint,
    /// otherwise the matched response's status).
    pub fn find_match(&self, request: &RequestDescriptor) -> Option<MatchResult> {
        let snapshot = self.snapshot();
        let result = matcher::find_match(&snapshot, request);
        self.log_match(&snapshot, request, result.as_ref());
        result
    }

    /// Emit the log entry for an already-computed match result, e.g. one
    /// returned by the offload coordinator.
    pub fn log_match(
        &self,
        snapshot: &StoreData,
        request: &RequestDescriptor,
        result: Option<&MatchResult>,
    ) {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let entry = if let Some(result) = result {
            LogEntry {
                id: generate_id(),
                project_id: request.project_id.clone(),
                timestamp,
                method: request.method.clone(),
                path: request.path.clone(),
                status: result.response.status_code,
                duration: 0,
                request_body: request.body.clone(),
                response_body: Some(result.response.body.clone()),
                response_name: Some(result.response.name.clone()),
            }
        } else {
            let project_running = snapshot
                .projects
                .iter()
                .any(|p| p.id == request.project_id && p.status == ProjectStatus::Running);
            if !project_running {
                system_error_entry(request, timestamp, 503, r#"{"error":"Server stopped"}"#)
            } else {
                let endpoint_exists = snapshot.endpoints.iter().any(|e| {
                    e.project_id == request.project_id
                        && e.method == request.method
                        && e.path == request.path
                });
                if endpoint_exists {
                    // Endpoint with no responses: nothing to report.
                    return;
                }
                system_error_entry(request, timestamp, 404, r#"{"error":"Not Found"}"#)
            }
        };
        self.emit_log(entry);
    }

    /// Parse an OpenAPI document and create its endpoints and responses in
    /// one mutation. The document's `components` section is stored on the
    /// project for display-time doc resolution.
    pub fn import_swagger(&self, project_id: &str, document: &Value) -> Result<ImportResult> {
        let result = parse_swagger(project_id, document);
        self.apply_import(project_id, result.clone(), document.get("components").cloned())?;
        Ok(result)
    }

    /// Apply importer output (possibly computed on the background worker) to
    /// the catalog.
    pub fn apply_import(
        &self,
        project_id: &str,
        import: ImportResult,
        components: Option<Value>,
    ) -> Result<()> {
        let endpoints = import.endpoints.len();
        self.mutate(|data| {
            let project = data
                .projects
                .iter_mut()
                .find(|p| p.id == project_id)
                .ok_or_else(|| Error::ProjectNotFound(project_id.to_string()))?;
            if components.is_some() {
                project.components = components;
            }
            data.endpoints.extend(import.endpoints);
            data.responses.extend(import.responses);
            Ok(())
        })?;
        info!(project = %project_id, endpoints, "imported specification");
        Ok(())
    }

    /// Insert a whole project tree (used by backup import). The records must
    /// already be consistently cross-referenced.
    pub(crate) fn insert_project_tree(
        &self,
        project: Project,
        endpoints: Vec<Endpoint>,
        responses: Vec<MockResponse>,
    ) -> Result<Project> {
        self.mutate(|data| {
            data.projects.push(project.clone());
            data.endpoints.extend(endpoints);
            data.responses.extend(responses);
            Ok(project.clone())
        })
    }
}

fn system_error_entry(
    request: &RequestDescriptor,
    timestamp: i64,
    status: u16,
    body: &str,
) -> LogEntry {
    LogEntry {
        id: generate_id(),
        project_id: request.project_id.clone(),
        timestamp,
        method: request.method.clone(),
        path: request.path.clone(),
        status,
        duration: 0,
        request_body: request.body.clone(),
        response_body: Some(body.to_string()),
        response_name: Some("System Error".to_string()),
    }
}
