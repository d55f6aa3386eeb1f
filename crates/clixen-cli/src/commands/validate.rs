use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use clixen_core::candidate::{CandidateSource, parse_candidate};
use clixen_core::deploy::{DeploymentGateway, InMemoryEngine, to_n8n_json};
use clixen_core::engine::{GenerationOrchestrator, Validator};
use clixen_core::error::CandidateError;
use clixen_core::node::NodeCatalog;
use clixen_core::{GenerationRequest, GenerationState, blocking_count};
use serde_json::json;

use super::report::{print_audit, print_defects};
use crate::cli::ValidateArgs;
use crate::config::ClixenConfig;
use crate::output::{OutputFormat, print_json};
use crate::output::table::print_fields;

/// Hands the workflow read from disk to the orchestrator unchanged.
struct FileCandidate {
    raw: String,
}

#[async_trait]
impl CandidateSource for FileCandidate {
    fn name(&self) -> &str {
        "file"
    }

    async fn request_candidate(&self, _intent: &str) -> Result<String, CandidateError> {
        Ok(self.raw.clone())
    }
}

pub async fn run(config: &ClixenConfig, args: ValidateArgs, format: OutputFormat) -> Result<()> {
    let raw = read_input(args.file.as_deref())?;
    let name = workflow_name(args.file.as_deref());
    let owner = config.owner(None);
    let catalog = NodeCatalog::builtin();

    if args.repair {
        repair(catalog, raw, &owner, &name, format).await
    } else {
        validate(catalog, &raw, &owner, &name, format)
    }
}

fn validate(
    catalog: &NodeCatalog,
    raw: &str,
    owner: &str,
    name: &str,
    format: OutputFormat,
) -> Result<()> {
    let graph = parse_candidate(raw, owner, name)?;
    let defects = Validator::new(catalog).validate(&graph);
    let blocking = blocking_count(&defects);

    if format.is_json() {
        print_json(&json!({
            "valid": blocking == 0,
            "blocking": blocking,
            "defects": defects,
        }))?;
    } else {
        print_defects(&defects)?;
    }

    if blocking > 0 {
        bail!("Workflow has {blocking} blocking defect(s)");
    }
    Ok(())
}

async fn repair(
    catalog: &NodeCatalog,
    raw: String,
    owner: &str,
    name: &str,
    format: OutputFormat,
) -> Result<()> {
    let catalog = Arc::new(catalog.clone());
    let gateway = DeploymentGateway::new(Arc::new(InMemoryEngine::new()), catalog.clone());
    let orchestrator = GenerationOrchestrator::new(
        catalog.clone(),
        Arc::new(FileCandidate { raw }),
        Arc::new(gateway),
    )?;

    let request = GenerationRequest::new(owner, name, "validate");
    let outcome = orchestrator.prepare(&request).await;

    if format.is_json() {
        print_json(&json!({
            "state": outcome.state(),
            "validation_passes": outcome.validation_passes,
            "audit": outcome.audit,
            "defects": outcome.defects,
            "workflow": to_n8n_json(&outcome.graph, &catalog),
        }))?;
    } else {
        print_fields(&[
            ("State", outcome.state().to_string()),
            ("Repairs", outcome.audit.len().to_string()),
            ("Validation passes", outcome.validation_passes.to_string()),
        ]);
        println!();
        print_audit(&outcome.audit)?;
        if outcome.state() == GenerationState::Ready {
            print_defects(&outcome.defects)?;
        }
    }

    if outcome.state() != GenerationState::Ready {
        bail!("Repair did not produce a valid workflow (state: {})", outcome.state());
    }
    Ok(())
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read workflow file {}", path.display())),
        _ => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read workflow from stdin")?;
            Ok(raw)
        }
    }
}

fn workflow_name(file: Option<&Path>) -> String {
    file.and_then(Path::file_stem)
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| stem != "-")
        .unwrap_or_else(|| "stdin".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_workflow_name_from_path() {
        let path = PathBuf::from("/tmp/daily-report.json");
        assert_eq!(workflow_name(Some(path.as_path())), "daily-report");
        assert_eq!(workflow_name(None), "stdin");
        assert_eq!(workflow_name(Some(Path::new("-"))), "stdin");
    }
}
