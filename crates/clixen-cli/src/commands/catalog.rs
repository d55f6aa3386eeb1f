use anyhow::{Result, bail};
use clixen_core::node::{NodeCatalog, NodeTypeSpec};
use comfy_table::{Cell, Table};

use crate::output::{OutputFormat, print_json};
use crate::output::table::{print_fields, print_table};

pub fn run(type_id: Option<String>, format: OutputFormat) -> Result<()> {
    let catalog = NodeCatalog::builtin();
    match type_id {
        Some(type_id) => show_type(catalog, &type_id, format),
        None => list_types(catalog, format),
    }
}

fn list_types(catalog: &NodeCatalog, format: OutputFormat) -> Result<()> {
    if format.is_json() {
        let specs: Vec<&NodeTypeSpec> = catalog.specs().collect();
        return print_json(&specs);
    }

    let mut table = Table::new();
    table.set_header(vec!["Type", "Name", "Inputs", "Outputs", "Required"]);

    for spec in catalog.specs() {
        table.add_row(vec![
            Cell::new(&spec.type_id),
            Cell::new(&spec.display_name),
            Cell::new(spec.input_ports),
            Cell::new(spec.output_ports),
            Cell::new(required_names(spec)),
        ]);
    }

    print_table(table)
}

fn show_type(catalog: &NodeCatalog, type_id: &str, format: OutputFormat) -> Result<()> {
    let Some(spec) = catalog.lookup(type_id) else {
        bail!("Unknown node type: {type_id}");
    };

    if format.is_json() {
        return print_json(spec);
    }

    let optional = spec
        .optional_params
        .keys()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ");

    print_fields(&[
        ("Type", spec.type_id.clone()),
        ("Name", spec.display_name.clone()),
        ("Version", spec.type_version.to_string()),
        ("Trigger", spec.is_trigger().to_string()),
        ("Inputs", spec.input_ports.to_string()),
        ("Outputs", spec.output_ports.to_string()),
        ("Required", required_names(spec)),
        ("Optional", if optional.is_empty() { "-".to_string() } else { optional }),
    ]);
    Ok(())
}

fn required_names(spec: &NodeTypeSpec) -> String {
    if spec.required_params.is_empty() {
        return "-".to_string();
    }
    spec.required_params
        .iter()
        .map(|param| match &param.default {
            Some(default) => format!("{} (= {default})", param.name),
            None => param.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
