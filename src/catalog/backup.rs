//! Project backup export/import.
//!
//! A backup is a self-contained JSON document holding one project with its
//! endpoints and responses. Import regenerates every id through a fresh id
//! table and remaps all cross-references, so restoring the same backup
//! twice yields two independent projects.

use super::store::CatalogStore;
use super::{generate_id, Endpoint, MockResponse, Project, ProjectStatus, StoreData};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

pub const BACKUP_TYPE: &str = "castlemock-lite-backup";
pub const BACKUP_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupDocument {
    pub version: u32,
    #[serde(rename = "type")]
    pub kind: String,
    /// Epoch milliseconds at export time.
    pub timestamp: i64,
    pub project: Project,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub responses: Vec<MockResponse>,
}

/// Export one project and everything it owns.
pub fn export_project(data: &StoreData, project_id: &str) -> Result<BackupDocument> {
    let project = data
        .projects
        .iter()
        .find(|p| p.id == project_id)
        .cloned()
        .ok_or_else(|| Error::ProjectNotFound(project_id.to_string()))?;

    let endpoints: Vec<Endpoint> = data
        .endpoints
        .iter()
        .filter(|e| e.project_id == project_id)
        .cloned()
        .collect();
    let endpoint_ids: Vec<&str> = endpoints.iter().map(|e| e.id.as_str()).collect();
    let responses: Vec<MockResponse> = data
        .responses
        .iter()
        .filter(|r| endpoint_ids.contains(&r.endpoint_id.as_str()))
        .cloned()
        .collect();

    Ok(BackupDocument {
        version: BACKUP_VERSION,
        kind: BACKUP_TYPE.to_string(),
        timestamp: chrono::Utc::now().timestamp_millis(),
        project,
        endpoints,
        responses,
    })
}

/// Validate a raw backup document and restore it into the store as a new
/// project. Rejects documents whose `type` tag or `project` is missing.
pub fn import_backup(store: &CatalogStore, raw: &serde_json::Value) -> Result<Project> {
    match raw.get("type").and_then(serde_json::Value::as_str) {
        Some(BACKUP_TYPE) => {}
        Some(other) => {
            return Err(Error::InvalidBackup(format!(
                "unexpected type tag {other:?}"
            )))
        }
        None => return Err(Error::InvalidBackup("missing type tag".to_string())),
    }
    if raw.get("project").is_none() {
        return Err(Error::InvalidBackup("missing project".to_string()));
    }
    let document: BackupDocument = serde_json::from_value(raw.clone())
        .map_err(|err| Error::InvalidBackup(err.to_string()))?;
    restore(store, document)
}

fn restore(store: &CatalogStore, document: BackupDocument) -> Result<Project> {
    let mut project = document.project;
    let old_default_of: HashMap<String, Option<String>> = document
        .endpoints
        .iter()
        .map(|e| (e.id.clone(), e.default_response_id.clone()))
        .collect();

    // Fresh id tables, one per entity kind.
    let endpoint_ids: HashMap<String, String> = document
        .endpoints
        .iter()
        .map(|e| (e.id.clone(), generate_id()))
        .collect();
    let response_ids: HashMap<String, String> = document
        .responses
        .iter()
        .map(|r| (r.id.clone(), generate_id()))
        .collect();

    project.id = generate_id();
    project.base_url = format!("/mock/{}", generate_id());
    // Restored projects always start stopped.
    project.status = ProjectStatus::Stopped;

    let endpoints: Vec<Endpoint> = document
        .endpoints
        .into_iter()
        .map(|mut endpoint| {
            let new_default = old_default_of
                .get(&endpoint.id)
                .cloned()
                .flatten()
                .and_then(|old| response_ids.get(&old).cloned());
            endpoint.id = endpoint_ids[&endpoint.id].clone();
            endpoint.project_id = project.id.clone();
            endpoint.default_response_id = new_default;
            endpoint
        })
        .collect();

    let responses: Vec<MockResponse> = document
        .responses
        .into_iter()
        .filter_map(|mut response| {
            let Some(new_endpoint_id) = endpoint_ids.get(&response.endpoint_id) else {
                // Orphaned response in the backup; dropping it keeps the
                // no-orphans invariant.
                warn!(response = %response.id, "backup response references unknown endpoint, dropped");
                return None;
            };
            response.endpoint_id = new_endpoint_id.clone();
            response.id = response_ids[&response.id].clone();
            Some(response)
        })
        .collect();

    store.insert_project_tree(project, endpoints, responses)
}
