//! Match Engine: resolves a request descriptor against a catalog snapshot.
//!
//! Pure function over [`StoreData`]; never mutates its input and never
//! reaches into ambient state. Log emission is the store's concern.

pub mod rules;

use crate::catalog::{Endpoint, MockResponse, ProjectStatus, ResponseStrategy, StoreData};
use rules::MatchRule;
use std::collections::HashMap;

pub use rules::{get_object_value, is_subset};

/// Strategy label reported when no strategy-specific rule selected a
/// response and the default/first response was served instead.
pub const FALLBACK_STRATEGY: &str = "FALLBACK (Default)";

/// In-process request descriptor. There is no socket or wire protocol;
/// "sending a request" means resolving one of these against a snapshot.
#[derive(Debug, Clone, Default)]
pub struct RequestDescriptor {
    pub project_id: String,
    pub method: String,
    pub path: String,
    pub body: Option<String>,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone)]
pub struct MatchResult {
    pub endpoint: Endpoint,
    pub response: MockResponse,
    /// The strategy that actually selected the response: the endpoint's
    /// strategy name, or [`FALLBACK_STRATEGY`].
    pub matched_strategy: String,
}

/// Select exactly one response for the request, or `None` when the project
/// is stopped/missing, the endpoint is unknown, or it has no responses.
///
/// Whenever the endpoint exists with at least one response (and the project
/// runs), this returns `Some`: strategies that select nothing fall back to
/// the designated default response, else the positional first.
pub fn find_match(data: &StoreData, request: &RequestDescriptor) -> Option<MatchResult> {
    let project = data.projects.iter().find(|p| p.id == request.project_id)?;
    if project.status == ProjectStatus::Stopped {
        return None;
    }

    let endpoint = data.endpoints.iter().find(|e| {
        e.project_id == request.project_id && e.method == request.method && e.path == request.path
    })?;

    let responses: Vec<&MockResponse> = data
        .responses
        .iter()
        .filter(|r| r.endpoint_id == endpoint.id)
        .collect();
    if responses.is_empty() {
        return None;
    }

    let mut matched_strategy = endpoint.response_strategy.as_str().to_string();
    let mut selected: Option<&MockResponse> = match endpoint.response_strategy {
        ResponseStrategy::Random => {
            use rand::Rng;
            let index = rand::thread_rng().gen_range(0..responses.len());
            Some(responses[index])
        }
        ResponseStrategy::HeaderMatch => request.headers.as_ref().and_then(|headers| {
            responses
                .iter()
                .find(|r| MatchRule::header_rule(r).matches_headers(headers))
                .copied()
        }),
        // An empty body counts as no body; no rule gets to see it.
        ResponseStrategy::QueryMatch => request
            .body
            .as_deref()
            .filter(|body| !body.is_empty())
            .and_then(|body| {
                responses
                    .iter()
                    .find(|r| MatchRule::query_rule(r).matches_body(body))
                    .copied()
            }),
        ResponseStrategy::Default => None,
    };

    if selected.is_none() {
        matched_strategy = FALLBACK_STRATEGY.to_string();
        if let Some(default_id) = &endpoint.default_response_id {
            selected = responses.iter().find(|r| &r.id == default_id).copied();
        }
        // Positional first when the designated default no longer exists.
        if selected.is_none() {
            selected = Some(responses[0]);
        }
    }

    selected.map(|response| MatchResult {
        endpoint: endpoint.clone(),
        response: response.clone(),
        matched_strategy,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{DelayMode, MatchType, Project};

    fn project(id: &str, status: ProjectStatus) -> Project {
        Project {
            id: id.into(),
            name: "Demo".into(),
            description: String::new(),
            base_url: format!("/mock/{id}"),
            status,
            components: None,
        }
    }

    fn endpoint(id: &str, project_id: &str, strategy: ResponseStrategy) -> Endpoint {
        Endpoint {
            id: id.into(),
            project_id: project_id.into(),
            method: "POST".into(),
            path: "/orders".into(),
            name: "Create order".into(),
            description: None,
            response_strategy: strategy,
            default_response_id: None,
            docs: None,
        }
    }

    fn response(id: &str, endpoint_id: &str, status_code: u16) -> MockResponse {
        MockResponse {
            id: id.into(),
            endpoint_id: endpoint_id.into(),
            name: format!("{status_code} Response"),
            status_code,
            headers: HashMap::new(),
            body: "{}".into(),
            delay: 0,
            delay_mode: DelayMode::Fixed,
            delay_min: None,
            delay_max: None,
            match_type: None,
            match_expression: None,
        }
    }

    fn request(project_id: &str) -> RequestDescriptor {
        RequestDescriptor {
            project_id: project_id.into(),
            method: "POST".into(),
            path: "/orders".into(),
            body: None,
            headers: None,
        }
    }

    #[test]
    fn test_stopped_or_missing_project_is_none() {
        let mut data = StoreData {
            projects: vec![project("p1", ProjectStatus::Stopped)],
            endpoints: vec![endpoint("e1", "p1", ResponseStrategy::Default)],
            responses: vec![response("r1", "e1", 200)],
        };
        assert!(find_match(&data, &request("p1")).is_none());
        assert!(find_match(&data, &request("nope")).is_none());

        data.projects[0].status = ProjectStatus::Running;
        assert!(find_match(&data, &request("p1")).is_some());
    }

    #[test]
    fn test_unknown_endpoint_and_empty_responses_are_none() {
        let data = StoreData {
            projects: vec![project("p1", ProjectStatus::Running)],
            endpoints: vec![endpoint("e1", "p1", ResponseStrategy::Default)],
            responses: vec![],
        };
        // Endpoint exists but has no responses.
        assert!(find_match(&data, &request("p1")).is_none());

        let mut miss = request("p1");
        miss.path = "/unknown".into();
        assert!(find_match(&data, &miss).is_none());
    }

    #[test]
    fn test_default_strategy_picks_designated_default() {
        let mut ep = endpoint("e1", "p1", ResponseStrategy::Default);
        ep.default_response_id = Some("r2".into());
        let data = StoreData {
            projects: vec![project("p1", ProjectStatus::Running)],
            endpoints: vec![ep],
            responses: vec![response("r1", "e1", 500), response("r2", "e1", 201)],
        };
        let result = find_match(&data, &request("p1")).unwrap();
        assert_eq!(result.response.id, "r2");
        assert_eq!(result.matched_strategy, FALLBACK_STRATEGY);
    }

    #[test]
    fn test_dead_default_falls_back_to_positional_first() {
        let mut ep = endpoint("e1", "p1", ResponseStrategy::Default);
        ep.default_response_id = Some("deleted".into());
        let data = StoreData {
            projects: vec![project("p1", ProjectStatus::Running)],
            endpoints: vec![ep],
            responses: vec![response("r1", "e1", 500), response("r2", "e1", 201)],
        };
        let result = find_match(&data, &request("p1")).unwrap();
        assert_eq!(result.response.id, "r1");
    }

    #[test]
    fn test_query_match_first_in_catalog_order_wins() {
        let mut r1 = response("r1", "e1", 200);
        r1.match_type = Some(MatchType::Json);
        r1.match_expression = Some("kind == 'a'".into());
        let mut r2 = response("r2", "e1", 201);
        r2.match_type = Some(MatchType::Json);
        r2.match_expression = Some("kind".into());
        let mut r3 = response("r3", "e1", 202);
        r3.match_type = Some(MatchType::Json);
        r3.match_expression = Some("kind".into());

        let data = StoreData {
            projects: vec![project("p1", ProjectStatus::Running)],
            endpoints: vec![endpoint("e1", "p1", ResponseStrategy::QueryMatch)],
            responses: vec![r1, r2, r3],
        };
        let mut req = request("p1");
        req.body = Some(r#"{"kind": "b"}"#.into());
        let result = find_match(&data, &req).unwrap();
        // r1's equality fails, r2 and r3 both pass existence; r2 is first.
        assert_eq!(result.response.id, "r2");
        assert_eq!(result.matched_strategy, "QUERY_MATCH");
    }

    #[test]
    fn test_query_match_without_match_falls_back_with_label() {
        let mut r1 = response("r1", "e1", 200);
        r1.match_type = Some(MatchType::Json);
        r1.match_expression = Some("kind == 'a'".into());
        let data = StoreData {
            projects: vec![project("p1", ProjectStatus::Running)],
            endpoints: vec![endpoint("e1", "p1", ResponseStrategy::QueryMatch)],
            responses: vec![r1],
        };
        let mut req = request("p1");
        req.body = Some(r#"{"kind": "z"}"#.into());
        let result = find_match(&data, &req).unwrap();
        assert_eq!(result.matched_strategy, FALLBACK_STRATEGY);
        assert_eq!(result.response.id, "r1");
    }

    #[test]
    fn test_header_match_case_insensitive_name() {
        let mut r1 = response("r1", "e1", 200);
        r1.match_expression = Some(r#"{"key": "X-Tenant", "value": "acme"}"#.into());
        let mut r2 = response("r2", "e1", 201);
        r2.match_expression = Some(r#"{"key": "X-Tenant", "value": "globex"}"#.into());
        let data = StoreData {
            projects: vec![project("p1", ProjectStatus::Running)],
            endpoints: vec![endpoint("e1", "p1", ResponseStrategy::HeaderMatch)],
            responses: vec![r1, r2],
        };
        let mut req = request("p1");
        let mut headers = HashMap::new();
        headers.insert("x-tenant".to_string(), "globex".to_string());
        req.headers = Some(headers);
        let result = find_match(&data, &req).unwrap();
        assert_eq!(result.response.id, "r2");
        assert_eq!(result.matched_strategy, "HEADER_MATCH");
    }

    #[test]
    fn test_random_strategy_always_selects_a_response() {
        let data = StoreData {
            projects: vec![project("p1", ProjectStatus::Running)],
            endpoints: vec![endpoint("e1", "p1", ResponseStrategy::Random)],
            responses: vec![
                response("r1", "e1", 200),
                response("r2", "e1", 201),
                response("r3", "e1", 202),
            ],
        };
        for _ in 0..20 {
            let result = find_match(&data, &request("p1")).unwrap();
            assert_eq!(result.matched_strategy, "RANDOM");
            assert!(["r1", "r2", "r3"].contains(&result.response.id.as_str()));
        }
    }

    #[test]
    fn test_empty_body_skips_query_match_rules() {
        let mut r1 = response("r1", "e1", 200);
        r1.match_type = Some(MatchType::Regex);
        r1.match_expression = Some(".*".into());
        let data = StoreData {
            projects: vec![project("p1", ProjectStatus::Running)],
            endpoints: vec![endpoint("e1", "p1", ResponseStrategy::QueryMatch)],
            responses: vec![response("r0", "e1", 204), r1],
        };
        // The catch-all regex would match "" if it were evaluated.
        let mut req = request("p1");
        req.body = Some(String::new());
        let result = find_match(&data, &req).unwrap();
        assert_eq!(result.matched_strategy, FALLBACK_STRATEGY);
        assert_eq!(result.response.id, "r0");
    }

    #[test]
    fn test_duplicate_endpoints_first_in_catalog_order_wins() {
        let mut second = endpoint("e2", "p1", ResponseStrategy::Default);
        second.name = "Shadowed".into();
        let data = StoreData {
            projects: vec![project("p1", ProjectStatus::Running)],
            endpoints: vec![endpoint("e1", "p1", ResponseStrategy::Default), second],
            responses: vec![response("r1", "e1", 200), response("r2", "e2", 201)],
        };
        let result = find_match(&data, &request("p1")).unwrap();
        assert_eq!(result.endpoint.id, "e1");
    }

    #[test]
    fn test_fallback_totality_across_strategies() {
        for strategy in [
            ResponseStrategy::Default,
            ResponseStrategy::Random,
            ResponseStrategy::QueryMatch,
            ResponseStrategy::HeaderMatch,
        ] {
            let data = StoreData {
                projects: vec![project("p1", ProjectStatus::Running)],
                endpoints: vec![endpoint("e1", "p1", strategy)],
                responses: vec![response("r1", "e1", 200)],
            };
            assert!(
                find_match(&data, &request("p1")).is_some(),
                "strategy {strategy:?} returned no response"
            );
        }
    }
}
