//! Client for the n8n public REST API.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::WorkflowEngine;
use crate::error::EngineError;
use crate::http_client::build_http_client;

const API_KEY_HEADER: &str = "X-N8N-API-KEY";
const PAGE_LIMIT: u32 = 250;
const MAX_ERROR_BODY: usize = 512;

pub struct N8nClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct WorkflowPage {
    #[serde(default)]
    data: Vec<WorkflowSummary>,
    #[serde(default, rename = "nextCursor")]
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct WorkflowSummary {
    id: String,
    name: String,
}

impl N8nClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: build_http_client(Some(Duration::from_secs(30))),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    fn request(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1/workflows{}", self.base_url, path)
    }

    /// Walk every page of the workflow listing.
    async fn all_workflows(&self) -> Result<Vec<WorkflowSummary>, EngineError> {
        let mut workflows = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut builder = self
                .client
                .get(self.url(""))
                .query(&[("limit", PAGE_LIMIT.to_string())]);
            if let Some(cursor) = &cursor {
                builder = builder.query(&[("cursor", cursor)]);
            }
            let response = checked(self.request(builder).send().await?).await?;
            let page: WorkflowPage = serde_json::from_str(&response.text().await?)?;
            workflows.extend(page.data);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(workflows)
    }
}

#[async_trait]
impl WorkflowEngine for N8nClient {
    async fn create_or_update_workflow(&self, workflow: &Value) -> Result<String, EngineError> {
        let name = workflow
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::Rejected {
                status: 400,
                message: "Workflow has no name".to_string(),
            })?;

        let existing = self
            .all_workflows()
            .await?
            .into_iter()
            .find(|summary| summary.name == name);

        let builder = match &existing {
            Some(summary) => {
                debug!(id = %summary.id, name, "Updating existing n8n workflow");
                self.client.put(self.url(&format!("/{}", summary.id)))
            }
            None => {
                debug!(name, "Creating n8n workflow");
                self.client.post(self.url(""))
            }
        };

        let response = checked(self.request(builder.json(workflow)).send().await?).await?;
        let created: WorkflowSummary = serde_json::from_str(&response.text().await?)?;
        Ok(created.id)
    }

    async fn list_existing_names(&self, prefix: &str) -> Result<BTreeSet<String>, EngineError> {
        Ok(self
            .all_workflows()
            .await?
            .into_iter()
            .map(|summary| summary.name)
            .filter(|name| name.starts_with(prefix))
            .collect())
    }

    async fn activate(&self, external_id: &str) -> Result<(), EngineError> {
        let builder = self.client.post(self.url(&format!("/{external_id}/activate")));
        checked(self.request(builder).send().await?).await?;
        Ok(())
    }
}

async fn checked(response: Response) -> Result<Response, EngineError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated]", &body[..end])
    } else {
        body
    };
    Err(EngineError::Rejected {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> N8nClient {
        N8nClient::new(server.uri()).with_api_key("n8n-key")
    }

    #[tokio::test]
    async fn test_list_follows_cursor_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/workflows"))
            .and(query_param("cursor", "page2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "3", "name": "u1__Second" }],
                "nextCursor": null
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/workflows"))
            .and(header("X-N8N-API-KEY", "n8n-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    { "id": "1", "name": "u1__First" },
                    { "id": "2", "name": "u2__First" }
                ],
                "nextCursor": "page2"
            })))
            .mount(&server)
            .await;

        let names = client(&server).list_existing_names("u1__").await.unwrap();
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["u1__First", "u1__Second"]
        );
    }

    #[tokio::test]
    async fn test_upsert_updates_existing_by_name() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/workflows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{ "id": "42", "name": "u1__Report" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/workflows/42"))
            .and(body_partial_json(json!({ "name": "u1__Report" })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": "42", "name": "u1__Report" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server)
            .create_or_update_workflow(&json!({ "name": "u1__Report", "nodes": [] }))
            .await
            .unwrap();
        assert_eq!(id, "42");
    }

    #[tokio::test]
    async fn test_upsert_creates_when_missing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/workflows"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": [] })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/workflows"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "id": "7", "name": "u1__New" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server)
            .create_or_update_workflow(&json!({ "name": "u1__New" }))
            .await
            .unwrap();
        assert_eq!(id, "7");
    }

    #[tokio::test]
    async fn test_error_status_maps_to_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/workflows/9/activate"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client(&server).activate("9").await.unwrap_err();
        assert!(matches!(err, EngineError::Rejected { status: 503, .. }));
        assert!(err.is_retryable());
    }
}
