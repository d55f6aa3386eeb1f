use anyhow::{Result, bail};
use clixen_core::ClixenCore;
use comfy_table::{Cell, Table};
use serde_json::json;

use super::report::print_audit;
use super::utils::{format_timestamp, or_dash};
use crate::cli::HistoryCommands;
use crate::config::ClixenConfig;
use crate::output::{OutputFormat, print_json};
use crate::output::table::{print_fields, print_table};

pub fn run(
    core: &ClixenCore,
    config: &ClixenConfig,
    command: HistoryCommands,
    format: OutputFormat,
) -> Result<()> {
    match command {
        HistoryCommands::List { owner, limit } => {
            list_requests(core, &config.owner(owner), limit, format)
        }
        HistoryCommands::Show { request_id, owner } => {
            show_request(core, &config.owner(owner), &request_id, format)
        }
        HistoryCommands::Delete { request_id, owner } => {
            delete_request(core, &config.owner(owner), &request_id, format)
        }
    }
}

fn list_requests(core: &ClixenCore, owner: &str, limit: usize, format: OutputFormat) -> Result<()> {
    let records = core.store.list(owner, Some(limit))?;

    if format.is_json() {
        return print_json(&records);
    }

    if records.is_empty() {
        println!("No generation requests found for {owner}.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "State", "External ID", "Repairs", "Created"]);

    for record in records {
        table.add_row(vec![
            Cell::new(&record.request_id),
            Cell::new(&record.name),
            Cell::new(record.state),
            Cell::new(or_dash(record.external_id.as_deref())),
            Cell::new(record.repair_attempts),
            Cell::new(format_timestamp(Some(record.created_at))),
        ]);
    }

    print_table(table)
}

fn show_request(
    core: &ClixenCore,
    owner: &str,
    request_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let Some(record) = core.store.get(owner, request_id)? else {
        bail!("Request not found: {request_id}");
    };
    let audit = core.store.audit_trail(owner, request_id)?;

    if format.is_json() {
        return print_json(&json!({ "record": record, "audit": audit }));
    }

    let failure = record
        .failure
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string());

    print_fields(&[
        ("Request", record.request_id.clone()),
        ("Owner", record.owner_id.clone()),
        ("Name", record.name.clone()),
        ("Intent", record.intent.clone()),
        ("State", record.state.to_string()),
        ("Status", record.status.to_string()),
        ("External ID", or_dash(record.external_id.as_deref())),
        ("Repairs", record.repair_attempts.to_string()),
        ("Correlation", record.correlation_id.clone()),
        ("Failure", failure),
        ("Created", format_timestamp(Some(record.created_at))),
        ("Updated", format_timestamp(Some(record.updated_at))),
    ]);

    if !audit.is_empty() {
        println!();
        print_audit(&audit)?;
    }
    Ok(())
}

fn delete_request(
    core: &ClixenCore,
    owner: &str,
    request_id: &str,
    format: OutputFormat,
) -> Result<()> {
    let deleted = core.store.delete(owner, request_id)?;

    if format.is_json() {
        return print_json(&json!({ "deleted": deleted, "request_id": request_id }));
    }

    if !deleted {
        bail!("Request not found: {request_id}");
    }
    println!("Deleted request {request_id}");
    Ok(())
}
