//! Node catalog - the registry of node types a workflow may use.
//!
//! The built-in catalog is built once on first use and is read-only
//! afterwards, so it can be shared freely across concurrent requests.

use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::CatalogError;

const N8N_BASE_PREFIX: &str = "n8n-nodes-base.";

pub const MANUAL_TRIGGER: &str = "n8n-nodes-base.manualTrigger";
pub const WEBHOOK: &str = "n8n-nodes-base.webhook";
pub const SCHEDULE_TRIGGER: &str = "n8n-nodes-base.scheduleTrigger";
pub const HTTP_REQUEST: &str = "n8n-nodes-base.httpRequest";
pub const SET: &str = "n8n-nodes-base.set";
pub const IF: &str = "n8n-nodes-base.if";
pub const MERGE: &str = "n8n-nodes-base.merge";
pub const CODE: &str = "n8n-nodes-base.code";
pub const NO_OP: &str = "n8n-nodes-base.noOp";
pub const RESPOND_TO_WEBHOOK: &str = "n8n-nodes-base.respondToWebhook";
pub const EMAIL_SEND: &str = "n8n-nodes-base.emailSend";
pub const SLACK: &str = "n8n-nodes-base.slack";
pub const GOOGLE_SHEETS: &str = "n8n-nodes-base.googleSheets";

/// A required parameter, optionally with a default the repair engine may fill in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Static definition of one kind of workflow node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeTypeSpec {
    pub type_id: String,
    pub display_name: String,
    pub type_version: f64,
    pub required_params: Vec<ParamSpec>,
    pub optional_params: BTreeMap<String, Value>,
    pub input_ports: usize,
    pub output_ports: usize,
}

impl NodeTypeSpec {
    pub fn new(type_id: impl Into<String>, input_ports: usize, output_ports: usize) -> Self {
        let type_id = type_id.into();
        Self {
            display_name: type_id.clone(),
            type_id,
            type_version: 1.0,
            required_params: Vec::new(),
            optional_params: BTreeMap::new(),
            input_ports,
            output_ports,
        }
    }

    pub fn display(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn version(mut self, type_version: f64) -> Self {
        self.type_version = type_version;
        self
    }

    pub fn required(mut self, name: impl Into<String>) -> Self {
        self.required_params.push(ParamSpec {
            name: name.into(),
            default: None,
        });
        self
    }

    pub fn required_with_default(mut self, name: impl Into<String>, default: Value) -> Self {
        self.required_params.push(ParamSpec {
            name: name.into(),
            default: Some(default),
        });
        self
    }

    pub fn optional(mut self, name: impl Into<String>, default: Value) -> Self {
        self.optional_params.insert(name.into(), default);
        self
    }

    /// Trigger-capable types have no input ports.
    pub fn is_trigger(&self) -> bool {
        self.input_ports == 0
    }

    /// Catalog default for a required parameter, if one is declared.
    pub fn required_default(&self, name: &str) -> Option<&Value> {
        self.required_params
            .iter()
            .find(|param| param.name == name)
            .and_then(|param| param.default.as_ref())
    }

    pub fn declares_param(&self, name: &str) -> bool {
        self.optional_params.contains_key(name)
            || self.required_params.iter().any(|param| param.name == name)
    }
}

/// Ports a node actually uses inside a graph.
///
/// A substitute type must offer at least these many ports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortUsage {
    pub inputs: usize,
    pub outputs: usize,
}

impl PortUsage {
    pub fn fits(&self, spec: &NodeTypeSpec) -> bool {
        self.inputs <= spec.input_ports && self.outputs <= spec.output_ports
    }
}

/// Registry of node types plus the static alias table used for substitution.
#[derive(Debug, Clone, Default)]
pub struct NodeCatalog {
    specs: BTreeMap<String, NodeTypeSpec>,
    aliases: HashMap<String, Vec<String>>,
}

static BUILTIN: Lazy<NodeCatalog> =
    Lazy::new(|| build_builtin().expect("built-in node catalog is consistent"));

impl NodeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide built-in catalog of n8n node types.
    pub fn builtin() -> &'static NodeCatalog {
        &BUILTIN
    }

    pub fn register(&mut self, spec: NodeTypeSpec) -> Result<(), CatalogError> {
        if self.specs.contains_key(&spec.type_id) {
            return Err(CatalogError::DuplicateType(spec.type_id));
        }
        self.specs.insert(spec.type_id.clone(), spec);
        Ok(())
    }

    /// Map an alias (matched case-insensitively, with or without the
    /// `n8n-nodes-base.` prefix) to known types in preference order.
    pub fn add_alias(&mut self, alias: &str, targets: &[&str]) -> Result<(), CatalogError> {
        for target in targets {
            if !self.specs.contains_key(*target) {
                return Err(CatalogError::UnknownAliasTarget {
                    alias: alias.to_string(),
                    target: target.to_string(),
                });
            }
        }
        self.aliases
            .entry(normalize_type(alias))
            .or_default()
            .extend(targets.iter().map(|t| t.to_string()));
        Ok(())
    }

    pub fn lookup(&self, type_id: &str) -> Option<&NodeTypeSpec> {
        self.specs.get(type_id)
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.specs.contains_key(type_id)
    }

    /// All registered types, ordered by type id.
    pub fn specs(&self) -> impl Iterator<Item = &NodeTypeSpec> {
        self.specs.values()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Find the nearest known type for an unknown one.
    ///
    /// Alias targets are tried first in table order, then any known type whose
    /// normalized id equals the normalized unknown id. The first candidate
    /// whose port arity covers `usage` wins.
    pub fn substitute_for(&self, unknown_type: &str, usage: PortUsage) -> Option<&NodeTypeSpec> {
        let key = normalize_type(unknown_type);
        if key.is_empty() {
            return None;
        }

        let aliased = self
            .aliases
            .get(&key)
            .into_iter()
            .flatten()
            .filter_map(|target| self.specs.get(target));
        let same_name = self
            .specs
            .values()
            .filter(|spec| normalize_type(&spec.type_id) == key);

        aliased.chain(same_name).find(|spec| usage.fits(spec))
    }
}

fn normalize_type(type_id: &str) -> String {
    let lowered = type_id.trim().to_ascii_lowercase();
    match lowered.strip_prefix(N8N_BASE_PREFIX) {
        Some(rest) => rest.to_string(),
        None => lowered,
    }
}

fn build_builtin() -> Result<NodeCatalog, CatalogError> {
    let mut catalog = NodeCatalog::new();

    catalog.register(NodeTypeSpec::new(MANUAL_TRIGGER, 0, 1).display("Manual Trigger"))?;
    catalog.register(
        NodeTypeSpec::new(WEBHOOK, 0, 1)
            .display("Webhook")
            .version(2.0)
            .required_with_default("path", json!("webhook"))
            .optional("httpMethod", json!("GET"))
            .optional("responseMode", json!("onReceived")),
    )?;
    catalog.register(
        NodeTypeSpec::new(SCHEDULE_TRIGGER, 0, 1)
            .display("Schedule Trigger")
            .version(1.2)
            .required_with_default(
                "rule",
                json!({ "interval": [{ "field": "days", "triggerAtHour": 9 }] }),
            ),
    )?;
    catalog.register(
        NodeTypeSpec::new(HTTP_REQUEST, 1, 1)
            .display("HTTP Request")
            .version(4.2)
            .required("url")
            .optional("method", json!("GET"))
            .optional("authentication", json!("none"))
            .optional("options", json!({})),
    )?;
    catalog.register(
        NodeTypeSpec::new(SET, 1, 1)
            .display("Edit Fields")
            .version(3.4)
            .optional("assignments", json!({ "assignments": [] }))
            .optional("options", json!({})),
    )?;
    catalog.register(
        NodeTypeSpec::new(IF, 1, 2)
            .display("If")
            .version(2.0)
            .required_with_default(
                "conditions",
                json!({ "conditions": [], "combinator": "and" }),
            )
            .optional("options", json!({})),
    )?;
    catalog.register(
        NodeTypeSpec::new(MERGE, 2, 1)
            .display("Merge")
            .version(3.0)
            .optional("mode", json!("append")),
    )?;
    catalog.register(
        NodeTypeSpec::new(CODE, 1, 1)
            .display("Code")
            .version(2.0)
            .required_with_default("jsCode", json!("return $input.all();"))
            .optional("mode", json!("runOnceForAllItems")),
    )?;
    catalog.register(NodeTypeSpec::new(NO_OP, 1, 1).display("No Operation"))?;
    catalog.register(
        NodeTypeSpec::new(RESPOND_TO_WEBHOOK, 1, 1)
            .display("Respond to Webhook")
            .version(1.1)
            .optional("respondWith", json!("text"))
            .optional("responseBody", json!("")),
    )?;
    catalog.register(
        NodeTypeSpec::new(EMAIL_SEND, 1, 1)
            .display("Send Email")
            .version(2.1)
            .required("toEmail")
            .required_with_default("fromEmail", json!("automations@clixen.app"))
            .required_with_default("subject", json!("Automation update"))
            .optional("text", json!("")),
    )?;
    catalog.register(
        NodeTypeSpec::new(SLACK, 1, 1)
            .display("Slack")
            .version(2.2)
            .required("channelId")
            .required("text")
            .optional("select", json!("channel")),
    )?;
    catalog.register(
        NodeTypeSpec::new(GOOGLE_SHEETS, 1, 1)
            .display("Google Sheets")
            .version(4.5)
            .required("documentId")
            .required("sheetName")
            .optional("operation", json!("append")),
    )?;

    catalog.add_alias("start", &[MANUAL_TRIGGER])?;
    catalog.add_alias("manual", &[MANUAL_TRIGGER])?;
    catalog.add_alias("trigger", &[MANUAL_TRIGGER])?;
    catalog.add_alias("webhookTrigger", &[WEBHOOK])?;
    catalog.add_alias("formTrigger", &[WEBHOOK])?;
    catalog.add_alias("cron", &[SCHEDULE_TRIGGER])?;
    catalog.add_alias("interval", &[SCHEDULE_TRIGGER])?;
    catalog.add_alias("schedule", &[SCHEDULE_TRIGGER])?;
    catalog.add_alias("http", &[HTTP_REQUEST])?;
    catalog.add_alias("httpRequestV3", &[HTTP_REQUEST])?;
    catalog.add_alias("editFields", &[SET])?;
    catalog.add_alias("function", &[CODE])?;
    catalog.add_alias("functionItem", &[CODE])?;
    catalog.add_alias("switch", &[IF])?;
    catalog.add_alias("respond", &[RESPOND_TO_WEBHOOK])?;
    catalog.add_alias("gmail", &[EMAIL_SEND])?;
    catalog.add_alias("sendEmail", &[EMAIL_SEND])?;
    catalog.add_alias("email", &[EMAIL_SEND])?;
    catalog.add_alias("slackApi", &[SLACK])?;
    catalog.add_alias("wait", &[NO_OP])?;

    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let catalog = NodeCatalog::builtin();
        let webhook = catalog.lookup(WEBHOOK).unwrap();
        assert!(webhook.is_trigger());
        assert_eq!(webhook.required_default("path"), Some(&json!("webhook")));

        let http = catalog.lookup(HTTP_REQUEST).unwrap();
        assert!(!http.is_trigger());
        assert!(http.required_default("url").is_none());
        assert!(http.declares_param("method"));
        assert!(!http.declares_param("body"));

        assert!(catalog.lookup("n8n-nodes-base.doesNotExist").is_none());
    }

    #[test]
    fn test_register_rejects_duplicate_type() {
        let mut catalog = NodeCatalog::new();
        catalog.register(NodeTypeSpec::new("custom.a", 1, 1)).unwrap();
        let err = catalog
            .register(NodeTypeSpec::new("custom.a", 0, 1))
            .unwrap_err();
        assert_eq!(err, CatalogError::DuplicateType("custom.a".to_string()));
    }

    #[test]
    fn test_alias_must_point_to_known_type() {
        let mut catalog = NodeCatalog::new();
        let err = catalog.add_alias("x", &["custom.missing"]).unwrap_err();
        assert!(matches!(err, CatalogError::UnknownAliasTarget { .. }));
    }

    #[test]
    fn test_substitute_via_alias_and_case_insensitive_name() {
        let catalog = NodeCatalog::builtin();
        let usage = PortUsage {
            inputs: 0,
            outputs: 1,
        };
        let cron = catalog
            .substitute_for("n8n-nodes-base.cron", usage)
            .unwrap();
        assert_eq!(cron.type_id, SCHEDULE_TRIGGER);

        let http = catalog
            .substitute_for(
                "HTTPREQUEST",
                PortUsage {
                    inputs: 1,
                    outputs: 1,
                },
            )
            .unwrap();
        assert_eq!(http.type_id, HTTP_REQUEST);
    }

    #[test]
    fn test_substitute_respects_port_arity() {
        let catalog = NodeCatalog::builtin();
        let two_branches = PortUsage {
            inputs: 1,
            outputs: 2,
        };
        assert_eq!(
            catalog.substitute_for("switch", two_branches).unwrap().type_id,
            IF
        );

        let four_branches = PortUsage {
            inputs: 1,
            outputs: 4,
        };
        assert!(catalog.substitute_for("switch", four_branches).is_none());
        assert!(catalog.substitute_for("totally.unknown", PortUsage::default()).is_none());
        assert!(catalog.substitute_for("", PortUsage::default()).is_none());
    }
}
