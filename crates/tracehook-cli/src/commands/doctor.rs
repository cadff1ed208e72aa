//! Diagnostic command to check installation.

use tracehook_core::Config;
use tracehook_session::{SessionSelector, SessionStore};

use crate::commands::config::sources;
use crate::AppContext;

pub async fn run(ctx: &AppContext) -> anyhow::Result<()> {
    println!("Running diagnostics...\n");

    // Check config files
    println!("Configuration:");
    for (label, path) in sources() {
        if path.is_file() {
            println!("  ✓ {} config: {}", label, path.display());
        } else {
            println!("  - {} config: {} (not present)", label, path.display());
        }
    }
    match Config::load_validated() {
        Ok(_) => println!("  ✓ Configuration is valid"),
        Err(e) => println!("  ✗ {}", tracehook_core::error::format_error_with_suggestion(&e)),
    }

    // Check trace root
    let store = ctx.store();
    println!("\nTrace root: {}", store.root().display());
    if store.root().is_dir() {
        println!("  ✓ Exists");
    } else if store.root().exists() {
        println!("  ✗ Exists but is not a directory");
    } else {
        println!("  - Does not exist (will be created on first recorded spawn)");
    }

    // Check session id source
    let selector = SessionSelector::from_config(&ctx.config.trace);
    println!("\nSession id:");
    match selector.env_session() {
        Some(id) => println!("  ✓ {} is set ({})", selector.env_var(), id),
        None => println!(
            "  - {} is not set; hook payload ids or generated ids will be used",
            selector.env_var()
        ),
    }

    // Check sessions
    println!("\nSessions:");
    match store.list().await {
        Ok(sessions) if sessions.is_empty() => println!("  - None recorded yet"),
        Ok(sessions) => println!("  ✓ {} recorded", sessions.len()),
        Err(e) => println!("  ✗ Failed to list sessions: {}", e),
    }

    match selector.current(&store).await {
        Ok(Some(entry)) => {
            println!("  ✓ Current session: {}", entry.id);
            match store.read_events(&entry.id).await {
                Ok(log) if log.skipped > 0 => {
                    println!("  ✗ {} malformed line(s) in its event log", log.skipped)
                }
                Ok(log) => println!("  ✓ Event log readable ({} events)", log.len()),
                Err(e) => println!("  ✗ Failed to read event log: {}", e),
            }
        }
        Ok(None) => println!("  - No current session"),
        Err(e) => println!("  ✗ Failed to resolve current session: {}", e),
    }

    println!("\nDiagnostics complete.");
    Ok(())
}
