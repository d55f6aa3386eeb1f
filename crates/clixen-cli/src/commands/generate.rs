use std::sync::Arc;

use anyhow::{Result, bail};
use clixen_core::candidate::{
    CandidateSource, ChatCompletionSource, TemplateFirstSource, TemplateLibrary,
};
use clixen_core::deploy::{InMemoryEngine, N8nClient, WorkflowEngine, to_n8n_json};
use clixen_core::engine::{GenerationOutcome, OrchestratorConfig};
use clixen_core::node::NodeCatalog;
use clixen_core::{ClixenCore, GenerationRequest};
use colored::Colorize;
use serde_json::json;
use tracing::info;

use super::report::{print_audit, print_defects};
use super::utils::or_dash;
use crate::cli::{GenerateArgs, SourceKind};
use crate::config::{ClixenConfig, n8n_api_key, openai_api_key};
use crate::output::{OutputFormat, print_json};
use crate::output::table::print_fields;

const NAME_WORDS: usize = 6;

pub async fn run(
    core: &ClixenCore,
    config: &ClixenConfig,
    args: GenerateArgs,
    format: OutputFormat,
) -> Result<()> {
    let owner = config.owner(args.owner);
    let name = match args.name {
        Some(name) if !name.trim().is_empty() => name,
        _ => default_name(&args.intent),
    };

    let engine = build_engine(config, args.engine_url, args.dry_run || args.no_deploy)?;
    let gateway = core.gateway(
        engine,
        config.retry.clone(),
        args.activate || config.engine.activate,
    );

    let mut orchestrator_config = OrchestratorConfig::default();
    if let Some(timeout) = config.deploy_timeout() {
        orchestrator_config.deploy_timeout = timeout;
    }

    let source = build_source(&core.catalog, config, args.source);
    let orchestrator = core.orchestrator(source, gateway, orchestrator_config)?;

    let request = GenerationRequest::new(owner, name, args.intent);
    let outcome = if args.no_deploy {
        orchestrator.prepare(&request).await
    } else {
        orchestrator.generate(&request).await
    };

    print_outcome(&outcome, &core.catalog, format)?;

    if let Some(failure) = outcome.failure() {
        bail!("{failure}");
    }
    Ok(())
}

fn build_engine(
    config: &ClixenConfig,
    engine_url: Option<String>,
    local: bool,
) -> Result<Arc<dyn WorkflowEngine>> {
    if local {
        info!("Using in-process workflow engine");
        return Ok(Arc::new(InMemoryEngine::new()));
    }

    let Some(base_url) = engine_url.or_else(|| config.engine.base_url.clone()) else {
        bail!("n8n engine URL not configured");
    };

    let mut client = N8nClient::new(base_url);
    if let Some(key) = n8n_api_key() {
        client = client.with_api_key(key);
    }
    Ok(Arc::new(client))
}

fn build_source(
    catalog: &NodeCatalog,
    config: &ClixenConfig,
    kind: SourceKind,
) -> Arc<dyn CandidateSource> {
    let templates = TemplateLibrary::builtin();
    match kind {
        SourceKind::Templates => Arc::new(templates),
        SourceKind::Synthesis => Arc::new(synthesizer(catalog, config)),
        SourceKind::Auto => {
            if openai_api_key().is_none() && config.synthesis.base_url.is_none() {
                info!("No synthesis credentials, using templates only");
                return Arc::new(templates);
            }
            let mut source =
                TemplateFirstSource::new(templates, Arc::new(synthesizer(catalog, config)));
            if let Some(min_score) = config.synthesis.min_template_score {
                source = source.with_min_score(min_score);
            }
            Arc::new(source)
        }
    }
}

fn synthesizer(catalog: &NodeCatalog, config: &ClixenConfig) -> ChatCompletionSource {
    let mut source = ChatCompletionSource::new(catalog);
    if let Some(key) = openai_api_key() {
        source = source.with_api_key(key);
    }
    if let Some(model) = &config.synthesis.model {
        source = source.with_model(model);
    }
    if let Some(base_url) = &config.synthesis.base_url {
        source = source.with_base_url(base_url);
    }
    source
}

/// Workflow name derived from the first words of the intent.
fn default_name(intent: &str) -> String {
    let words: Vec<&str> = intent.split_whitespace().take(NAME_WORDS).collect();
    if words.is_empty() {
        return "Untitled workflow".to_string();
    }
    let mut name = words.join(" ");
    if let Some(first) = name.chars().next() {
        let upper: String = first.to_uppercase().collect();
        name.replace_range(..first.len_utf8(), &upper);
    }
    name
}

fn print_outcome(
    outcome: &GenerationOutcome,
    catalog: &NodeCatalog,
    format: OutputFormat,
) -> Result<()> {
    if format.is_json() {
        return print_json(&json!({
            "outcome": outcome,
            "workflow": to_n8n_json(&outcome.graph, catalog),
        }));
    }

    let record = &outcome.record;
    let state = record.state.to_string();
    let state = if outcome.failure().is_some() {
        state.red().bold().to_string()
    } else {
        state.green().bold().to_string()
    };
    let workflow = outcome
        .deployment
        .as_ref()
        .map(|d| d.namespaced_name.clone())
        .unwrap_or_else(|| outcome.graph.name.clone());

    print_fields(&[
        ("Request", record.request_id.clone()),
        ("State", state),
        ("Workflow", workflow),
        ("Status", record.status.to_string()),
        ("External ID", or_dash(record.external_id.as_deref())),
        ("Repairs", record.repair_attempts.to_string()),
        ("Validation passes", outcome.validation_passes.to_string()),
        ("Correlation", record.correlation_id.clone()),
    ]);

    if !outcome.audit.is_empty() {
        println!();
        print_audit(&outcome.audit)?;
    }
    if !outcome.defects.is_empty() {
        println!();
        print_defects(&outcome.defects)?;
    }
    Ok(())
}
