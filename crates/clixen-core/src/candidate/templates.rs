//! Built-in workflow templates matched against the user's intent by keyword.

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

use super::CandidateSource;
use crate::error::CandidateError;
use crate::node::catalog::{
    EMAIL_SEND, HTTP_REQUEST, IF, NO_OP, RESPOND_TO_WEBHOOK, SCHEDULE_TRIGGER, SET, SLACK,
    WEBHOOK,
};

pub struct WorkflowTemplate {
    pub key: &'static str,
    pub title: &'static str,
    pub keywords: &'static [&'static str],
    build: fn() -> Value,
}

impl WorkflowTemplate {
    /// Number of keywords that occur in `intent` (case-insensitive).
    pub fn score(&self, intent: &str) -> usize {
        let intent = intent.to_lowercase();
        self.keywords
            .iter()
            .filter(|keyword| intent.contains(*keyword))
            .count()
    }

    pub fn to_json(&self) -> Value {
        (self.build)()
    }
}

/// Keyword-scored template lookup.
pub struct TemplateLibrary {
    templates: Vec<WorkflowTemplate>,
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateLibrary {
    pub fn builtin() -> Self {
        Self {
            templates: vec![
                WorkflowTemplate {
                    key: "webhook-responder",
                    title: "Webhook responder",
                    keywords: &["webhook", "endpoint", "respond", "receive", "api call"],
                    build: webhook_responder,
                },
                WorkflowTemplate {
                    key: "scheduled-report",
                    title: "Scheduled report by email",
                    keywords: &["schedule", "daily", "weekly", "report", "every", "email"],
                    build: scheduled_report,
                },
                WorkflowTemplate {
                    key: "form-to-slack",
                    title: "Form submission to Slack",
                    keywords: &["form", "submission", "slack", "notify", "channel"],
                    build: form_to_slack,
                },
                WorkflowTemplate {
                    key: "http-poller",
                    title: "HTTP status poller",
                    keywords: &["poll", "monitor", "status", "check", "uptime", "url"],
                    build: http_poller,
                },
            ],
        }
    }

    pub fn templates(&self) -> &[WorkflowTemplate] {
        &self.templates
    }

    /// Highest-scoring template; ties go to the earlier template.
    pub fn best_match(&self, intent: &str) -> Option<(&WorkflowTemplate, usize)> {
        let mut best: Option<(&WorkflowTemplate, usize)> = None;
        for template in &self.templates {
            let score = template.score(intent);
            if score > 0 && best.is_none_or(|(_, top)| score > top) {
                best = Some((template, score));
            }
        }
        best
    }
}

#[async_trait]
impl CandidateSource for TemplateLibrary {
    fn name(&self) -> &str {
        "templates"
    }

    async fn request_candidate(&self, intent: &str) -> Result<String, CandidateError> {
        let (template, score) = self
            .best_match(intent)
            .ok_or_else(|| CandidateError::Source("No template matches the request".to_string()))?;
        debug!(template = template.key, score, "Selected workflow template");
        Ok(template.to_json().to_string())
    }
}

fn webhook_responder() -> Value {
    json!({
        "name": "Webhook responder",
        "nodes": [
            { "name": "Webhook", "type": WEBHOOK, "position": [250, 300],
              "parameters": { "path": "incoming", "httpMethod": "POST", "responseMode": "responseNode" } },
            { "name": "Shape Reply", "type": SET, "position": [470, 300],
              "parameters": { "assignments": { "assignments": [
                  { "name": "received", "value": "={{ true }}", "type": "boolean" }
              ] } } },
            { "name": "Respond", "type": RESPOND_TO_WEBHOOK, "position": [690, 300],
              "parameters": { "respondWith": "json", "responseBody": "={{ $json }}" } }
        ],
        "connections": {
            "Webhook": { "main": [[{ "node": "Shape Reply", "type": "main", "index": 0 }]] },
            "Shape Reply": { "main": [[{ "node": "Respond", "type": "main", "index": 0 }]] }
        }
    })
}

fn scheduled_report() -> Value {
    json!({
        "name": "Scheduled report",
        "nodes": [
            { "id": "schedule", "type": SCHEDULE_TRIGGER,
              "parameters": { "rule": { "interval": [{ "field": "days", "triggerAtHour": 8 }] } } },
            { "id": "fetch", "type": HTTP_REQUEST,
              "parameters": { "url": "https://api.example.com/report", "method": "GET" } },
            { "id": "mail", "type": EMAIL_SEND,
              "parameters": { "toEmail": "team@example.com", "fromEmail": "reports@example.com",
                              "subject": "Daily report",
                              "text": "={{ JSON.stringify($json) }}" } }
        ],
        "connections": [
            { "fromNodeId": "schedule", "fromPort": 0, "toNodeId": "fetch", "toPort": 0 },
            { "fromNodeId": "fetch", "fromPort": 0, "toNodeId": "mail", "toPort": 0 }
        ]
    })
}

fn form_to_slack() -> Value {
    json!({
        "name": "Form to Slack",
        "nodes": [
            { "name": "Form Hook", "type": WEBHOOK, "position": [250, 300],
              "parameters": { "path": "form", "httpMethod": "POST" } },
            { "name": "Pick Fields", "type": SET, "position": [470, 300],
              "parameters": { "assignments": { "assignments": [
                  { "name": "who", "value": "={{ $json.body.name }}", "type": "string" }
              ] } } },
            { "name": "Post", "type": SLACK, "position": [690, 300],
              "parameters": { "channelId": "#general", "text": "=New submission from {{ $json.who }}" } }
        ],
        "connections": {
            "Form Hook": { "main": [[{ "node": "Pick Fields", "type": "main", "index": 0 }]] },
            "Pick Fields": { "main": [[{ "node": "Post", "type": "main", "index": 0 }]] }
        }
    })
}

fn http_poller() -> Value {
    json!({
        "name": "HTTP poller",
        "nodes": [
            { "id": "every", "type": SCHEDULE_TRIGGER,
              "parameters": { "rule": { "interval": [{ "field": "minutes", "minutesInterval": 5 }] } } },
            { "id": "probe", "type": HTTP_REQUEST,
              "parameters": { "url": "https://status.example.com/health" } },
            { "id": "healthy", "type": IF,
              "parameters": { "conditions": { "combinator": "and", "conditions": [
                  { "leftValue": "={{ $json.status }}", "rightValue": "ok",
                    "operator": { "type": "string", "operation": "equals" } }
              ] } } },
            { "id": "up", "type": NO_OP },
            { "id": "down", "type": NO_OP }
        ],
        "connections": [
            { "fromNodeId": "every", "fromPort": 0, "toNodeId": "probe", "toPort": 0 },
            { "fromNodeId": "probe", "fromPort": 0, "toNodeId": "healthy", "toPort": 0 },
            { "fromNodeId": "healthy", "fromPort": 0, "toNodeId": "up", "toPort": 0 },
            { "fromNodeId": "healthy", "fromPort": 1, "toNodeId": "down", "toPort": 0 }
        ]
    })
}
