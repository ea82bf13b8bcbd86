use colored::Colorize;

pub fn handle_error(err: anyhow::Error) -> ! {
    eprintln!("{} {}", "Error:".red().bold(), err);

    if is_connection_problem(&err.to_string()) {
        eprintln!("\n{}", "Suggestion:".yellow().bold());
        eprintln!("  Make sure the chat server is running, e.g.:");
        eprintln!("  {} zepchat-server", "$".dimmed());
        eprintln!("  or point at another one with --endpoint / ZEPCHAT_ENDPOINT.");
    }

    std::process::exit(1);
}

fn is_connection_problem(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("connection refused") || message.contains("could not reach")
}
