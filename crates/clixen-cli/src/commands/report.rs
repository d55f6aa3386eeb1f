//! Text rendering shared by commands that show defects and repair audits.

use anyhow::Result;
use clixen_core::models::{Defect, RepairAttempt, Severity, TransformationOutcome};
use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::output::table::print_table;

pub fn print_defects(defects: &[Defect]) -> Result<()> {
    if defects.is_empty() {
        println!("{}", "No defects found.".green());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Severity", "Kind", "Location", "Detail"]);

    for defect in defects {
        let severity = match defect.severity {
            Severity::Blocking => "blocking",
            Severity::Warning => "warning",
        };
        table.add_row(vec![
            Cell::new(severity),
            Cell::new(defect.kind),
            Cell::new(location(defect)),
            Cell::new(&defect.detail),
        ]);
    }

    print_table(table)
}

pub fn print_audit(audit: &[RepairAttempt]) -> Result<()> {
    if audit.is_empty() {
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Attempt", "Transformation", "Target", "Outcome", "Detail"]);

    for attempt in audit {
        for transformation in &attempt.transformations_applied {
            let outcome = match transformation.outcome {
                TransformationOutcome::Applied => "applied",
                TransformationOutcome::NotApplicable => "not applicable",
            };
            table.add_row(vec![
                Cell::new(attempt.attempt_number),
                Cell::new(format!("{:?}", transformation.kind)),
                Cell::new(&transformation.target),
                Cell::new(outcome),
                Cell::new(&transformation.detail),
            ]);
        }
    }

    print_table(table)
}

fn location(defect: &Defect) -> String {
    if let Some(connection) = &defect.connection_ref {
        return format!(
            "#{} {}[{}] -> {}[{}]",
            connection.index,
            connection.from_node_id,
            connection.from_port,
            connection.to_node_id,
            connection.to_port
        );
    }
    match (&defect.node_id, &defect.param) {
        (Some(node), Some(param)) => format!("{node}.{param}"),
        (Some(node), None) => node.clone(),
        _ => "workflow".to_string(),
    }
}
