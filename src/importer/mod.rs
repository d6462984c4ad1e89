//! Specification Importer: walks an OpenAPI document's path/method tree and
//! emits Endpoint + Response records.
//!
//! Pure over the document; the store-integrated variant lives on
//! [`crate::catalog::store::CatalogStore`]. One malformed path entry is
//! logged and skipped, the rest of the document still imports.

pub mod example;
pub mod resolver;

use crate::catalog::{
    generate_id, DelayMode, Endpoint, MockResponse, ResponseStrategy, SwaggerDocs,
};
use anyhow::Context;
use example::generate_example;
use resolver::resolve_refs;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Records produced by an import, not yet applied to any catalog.
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub endpoints: Vec<Endpoint>,
    pub responses: Vec<MockResponse>,
}

/// Walk `document.paths` and synthesize one endpoint per (path, method)
/// operation plus exactly one default response each.
pub fn parse_swagger(project_id: &str, document: &Value) -> ImportResult {
    let mut result = ImportResult::default();

    let Some(paths) = document.get("paths").and_then(Value::as_object) else {
        return result;
    };

    for (path, item) in paths {
        if let Err(err) = import_path_item(project_id, path, item, document, &mut result) {
            warn!(path = %path, error = %err, "skipping malformed path during import");
        }
    }

    result
}

fn import_path_item(
    project_id: &str,
    path: &str,
    item: &Value,
    document: &Value,
    result: &mut ImportResult,
) -> anyhow::Result<()> {
    let operations = item.as_object().context("path item is not an object")?;

    for (method_key, details) in operations {
        let method = method_key.to_uppercase();
        // Path-level parameter lists share the operation map.
        if method == "PARAMETERS" {
            continue;
        }

        let summary = non_empty_str(details.get("summary"));
        let operation_id = non_empty_str(details.get("operationId"));
        let name = summary
            .or(operation_id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("{method} {path}"));

        let docs = SwaggerDocs {
            summary: summary.map(str::to_string),
            description: non_empty_str(details.get("description")).map(str::to_string),
            tags: details
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| {
                    tags.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            // Kept unresolved: display-time resolution runs against the
            // project's stored components section.
            parameters: details.get("parameters").cloned(),
            request_body: details.get("requestBody").cloned(),
            responses: details.get("responses").cloned(),
        };

        let mut endpoint = Endpoint {
            id: generate_id(),
            project_id: project_id.to_string(),
            method,
            path: path.to_string(),
            name,
            description: docs.description.clone(),
            response_strategy: ResponseStrategy::Default,
            default_response_id: None,
            docs: Some(docs),
        };

        let response = build_default_response(&endpoint, details, document);
        endpoint.default_response_id = Some(response.id.clone());

        result.endpoints.push(endpoint);
        result.responses.push(response);
    }

    Ok(())
}

/// Synthesize the single default mock response for an operation from its
/// first 2xx response definition. Best-effort: anything that goes wrong
/// falls back to a `{}` body.
fn build_default_response(endpoint: &Endpoint, details: &Value, document: &Value) -> MockResponse {
    let responses = details.get("responses").and_then(Value::as_object);
    let success_key =
        responses.and_then(|map| map.keys().find(|key| key.starts_with('2')).cloned());

    let body = success_key
        .as_deref()
        .and_then(|key| responses.and_then(|map| map.get(key)))
        .and_then(|success| synthesize_body(success, document))
        .unwrap_or_else(|| "{}".to_string());

    let (name, status_code) = match &success_key {
        Some(key) => (format!("{key} Response"), key.parse::<u16>().unwrap_or(200)),
        None => ("Default 200".to_string(), 200),
    };

    let mut headers = HashMap::new();
    headers.insert("Content-Type".to_string(), "application/json".to_string());

    MockResponse {
        id: generate_id(),
        endpoint_id: endpoint.id.clone(),
        name,
        status_code,
        headers,
        body,
        delay: 0,
        delay_mode: DelayMode::Fixed,
        delay_min: None,
        delay_max: None,
        match_type: None,
        match_expression: None,
    }
}

fn synthesize_body(success_response: &Value, document: &Value) -> Option<String> {
    // Resolved eagerly for the generated example only; endpoint docs keep
    // the unresolved originals.
    let resolved = resolve_refs(success_response, document);
    let json_content = resolved.get("content")?.get("application/json")?;

    if let Some(example) = json_content.get("example") {
        if !example.is_null() {
            return serde_json::to_string_pretty(example).ok();
        }
    }
    let schema = json_content.get("schema")?;
    serde_json::to_string_pretty(&generate_example(schema)).ok()
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn petstore() -> Value {
        json!({
            "openapi": "3.0.0",
            "info": {"title": "Petstore", "description": "demo"},
            "paths": {
                "/pets": {
                    "parameters": [{"name": "trace", "in": "header"}],
                    "get": {
                        "summary": "List pets",
                        "operationId": "listPets",
                        "tags": ["pets"],
                        "responses": {
                            "200": {
                                "description": "ok",
                                "content": {"application/json": {"schema": {
                                    "type": "array",
                                    "items": {"$ref": "#/components/schemas/Pet"}
                                }}}
                            }
                        }
                    },
                    "post": {
                        "operationId": "createPet",
                        "responses": {
                            "201": {
                                "description": "created",
                                "content": {"application/json": {"example": {"id": 1}}}
                            }
                        }
                    }
                },
                "/health": {
                    "get": {"responses": {"503": {"description": "nope"}}}
                }
            },
            "components": {"schemas": {"Pet": {
                "type": "object",
                "properties": {"id": {"type": "integer"}, "name": {"type": "string"}}
            }}}
        })
    }

    #[test]
    fn test_import_creates_one_endpoint_and_response_per_operation() {
        let result = parse_swagger("p1", &petstore());
        assert_eq!(result.endpoints.len(), 3);
        assert_eq!(result.responses.len(), 3);

        for endpoint in &result.endpoints {
            assert_eq!(endpoint.project_id, "p1");
            assert_eq!(endpoint.response_strategy, ResponseStrategy::Default);
            let default_id = endpoint.default_response_id.as_ref().unwrap();
            let response = result
                .responses
                .iter()
                .find(|r| &r.id == default_id)
                .expect("default response exists");
            assert_eq!(response.endpoint_id, endpoint.id);
            assert_eq!(
                response.headers.get("Content-Type").map(String::as_str),
                Some("application/json")
            );
        }
    }

    #[test]
    fn test_parameters_key_is_skipped() {
        let result = parse_swagger("p1", &petstore());
        assert!(result.endpoints.iter().all(|e| e.method != "PARAMETERS"));
    }

    #[test]
    fn test_name_fallback_chain() {
        let result = parse_swagger("p1", &petstore());
        let get_pets = result
            .endpoints
            .iter()
            .find(|e| e.method == "GET" && e.path == "/pets")
            .unwrap();
        assert_eq!(get_pets.name, "List pets");

        let post_pets = result
            .endpoints
            .iter()
            .find(|e| e.method == "POST" && e.path == "/pets")
            .unwrap();
        assert_eq!(post_pets.name, "createPet");

        let health = result
            .endpoints
            .iter()
            .find(|e| e.path == "/health")
            .unwrap();
        assert_eq!(health.name, "GET /health");
    }

    #[test]
    fn test_example_taken_verbatim_and_schema_generated() {
        let result = parse_swagger("p1", &petstore());

        let post_response = response_for(&result, "POST", "/pets");
        let body: Value = serde_json::from_str(&post_response.body).unwrap();
        assert_eq!(body, json!({"id": 1}));
        assert_eq!(post_response.status_code, 201);
        assert_eq!(post_response.name, "201 Response");

        let get_response = response_for(&result, "GET", "/pets");
        let body: Value = serde_json::from_str(&get_response.body).unwrap();
        assert_eq!(body, json!([{"id": 0, "name": "string"}]));
        assert_eq!(get_response.status_code, 200);
    }

    #[test]
    fn test_no_2xx_yields_default_200_empty_body() {
        let result = parse_swagger("p1", &petstore());
        let health = response_for(&result, "GET", "/health");
        assert_eq!(health.status_code, 200);
        assert_eq!(health.name, "Default 200");
        assert_eq!(health.body, "{}");
    }

    #[test]
    fn test_docs_keep_unresolved_refs() {
        let result = parse_swagger("p1", &petstore());
        let get_pets = result
            .endpoints
            .iter()
            .find(|e| e.method == "GET" && e.path == "/pets")
            .unwrap();
        let docs = get_pets.docs.as_ref().unwrap();
        let raw = docs.responses.as_ref().unwrap();
        assert_eq!(
            raw["200"]["content"]["application/json"]["schema"]["items"]["$ref"],
            json!("#/components/schemas/Pet")
        );
        assert_eq!(docs.tags, vec!["pets".to_string()]);
    }

    #[test]
    fn test_malformed_path_is_isolated() {
        let doc = json!({
            "paths": {
                "/broken": "not an object",
                "/ok": {"get": {"responses": {"200": {"description": "ok"}}}}
            }
        });
        let result = parse_swagger("p1", &doc);
        assert_eq!(result.endpoints.len(), 1);
        assert_eq!(result.endpoints[0].path, "/ok");
    }

    #[test]
    fn test_document_without_paths() {
        assert!(parse_swagger("p1", &json!({})).endpoints.is_empty());
        assert!(parse_swagger("p1", &json!({"paths": []})).endpoints.is_empty());
    }

    #[test]
    fn test_non_numeric_2xx_key_falls_back_to_200() {
        let doc = json!({"paths": {"/things": {"get": {"responses": {
            "2XX": {"description": "any success"}
        }}}}});
        let result = parse_swagger("p1", &doc);
        assert_eq!(result.responses[0].status_code, 200);
        assert_eq!(result.responses[0].name, "2XX Response");
    }

    fn response_for<'r>(result: &'r ImportResult, method: &str, path: &str) -> &'r MockResponse {
        let endpoint = result
            .endpoints
            .iter()
            .find(|e| e.method == method && e.path == path)
            .unwrap();
        result
            .responses
            .iter()
            .find(|r| r.endpoint_id == endpoint.id)
            .unwrap()
    }
}
