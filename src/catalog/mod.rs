//! Catalog data model.
//!
//! Projects own endpoints, endpoints own candidate responses. The whole
//! catalog serializes as one camelCase JSON document; [`StoreData`] is the
//! snapshot type the pure engines (matcher, importer) operate on.

pub mod backup;
pub mod persistence;
pub mod store;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Generate a fresh entity id.
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Project lifecycle status. Matching only succeeds against running projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectStatus {
    Running,
    Stopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub base_url: String,
    pub status: ProjectStatus,
    /// OpenAPI `components` section kept from import, so documentation on
    /// endpoints can be resolved against shared schemas at display time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<serde_json::Value>,
}

/// Policy an endpoint uses to pick among multiple candidate responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseStrategy {
    #[default]
    Default,
    Random,
    QueryMatch,
    HeaderMatch,
}

impl ResponseStrategy {
    /// Wire/display name, also used verbatim in match results.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStrategy::Default => "DEFAULT",
            ResponseStrategy::Random => "RANDOM",
            ResponseStrategy::QueryMatch => "QUERY_MATCH",
            ResponseStrategy::HeaderMatch => "HEADER_MATCH",
        }
    }
}

/// How a response's `match_expression` is interpreted under QUERY_MATCH
/// (or HEADER_MATCH for `Header`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Json,
    Regex,
    BodyJson,
    Header,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DelayMode {
    #[default]
    Fixed,
    Random,
}

/// Unresolved OpenAPI operation documentation carried on an endpoint.
///
/// `parameters`/`request_body`/`responses` keep their `$ref` pointers; they
/// are resolved at display time against the project's stored `components`,
/// which avoids duplicating large shared schemas per endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwaggerDocs {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responses: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub id: String,
    pub project_id: String,
    /// Uppercase HTTP method. `(project_id, method, path)` is the effective
    /// lookup key for matching; duplicates are allowed, the first one in
    /// catalog order wins.
    pub method: String,
    pub path: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub response_strategy: ResponseStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_response_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs: Option<SwaggerDocs>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockResponse {
    pub id: String,
    pub endpoint_id: String,
    pub name: String,
    pub status_code: u16,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Response body, stored as a raw string (usually JSON text).
    pub body: String,
    /// Fixed latency in milliseconds.
    #[serde(default)]
    pub delay: u64,
    #[serde(default)]
    pub delay_mode: DelayMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_min: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_max: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_type: Option<MatchType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub match_expression: Option<String>,
}

impl MockResponse {
    /// Latency to apply before serving this response.
    ///
    /// Random mode draws uniformly from `[delay_min, delay_max]`; an absent
    /// or inverted range falls back to the fixed `delay`.
    pub fn resolved_delay_ms(&self) -> u64 {
        match self.delay_mode {
            DelayMode::Fixed => self.delay,
            DelayMode::Random => match (self.delay_min, self.delay_max) {
                (Some(min), Some(max)) if max >= min => {
                    use rand::Rng;
                    rand::thread_rng().gen_range(min..=max)
                }
                _ => self.delay,
            },
        }
    }
}

/// Log entry emitted on the side-channel after a match attempt.
/// Never persisted with the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub id: String,
    pub project_id: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub method: String,
    pub path: String,
    pub status: u16,
    /// Milliseconds spent resolving the match.
    pub duration: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_name: Option<String>,
}

/// Full catalog snapshot. The matcher and importer are pure functions over
/// this type; the store is its single writer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreData {
    #[serde(default)]
    pub projects: Vec<Project>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub responses: Vec<MockResponse>,
}
