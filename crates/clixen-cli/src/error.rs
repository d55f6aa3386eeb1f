use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {:#}", "Error:".red().bold(), err);

    let msg = format!("{err:#}").to_lowercase();

    if msg.contains("engine url not configured") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Point Clixen at your n8n instance in ~/.config/clixen/config.toml:");
        eprintln!("  {} [engine]", "#".dimmed());
        eprintln!("  {} base_url = \"http://localhost:5678\"", "#".dimmed());
        eprintln!("  or try the pipeline locally with {}", "--dry-run".bold());
    }

    if msg.contains("blocking defect") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Let Clixen try to fix the workflow with:");
        eprintln!("  {} clixen validate <file> --repair", "$".dimmed());
    }

    if msg.contains("request not found") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  List recent requests with:");
        eprintln!("  {} clixen history list --owner <owner>", "$".dimmed());
    }

    if msg.contains("connection refused") || msg.contains("network") {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Check that the n8n instance is reachable and try again.");
    }

    std::process::exit(1);
}
