//! Configuration management commands.

use std::path::{Path, PathBuf};

use tracehook_core::config::{IssueSeverity, ValidationResult};
use tracehook_core::Config;

use crate::{AppContext, ConfigAction};

pub fn handle(action: ConfigAction, ctx: &AppContext) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            print!("{}", ctx.config.to_toml()?);

            // Issues in the configured sources; any error means the defaults above are in effect.
            match Config::load() {
                Ok(loaded) => print_issues(&loaded.validate()),
                Err(e) => {
                    println!();
                    println!("# error: {}", e);
                }
            }
        }
        ConfigAction::Path => {
            for (label, path) in sources() {
                println!("{:<8} {} {}", label, presence(&path), path.display());
            }
            println!("{:<8}   TRACEHOOK_* (e.g. TRACEHOOK_TRACE__ROOT)", "env");
        }
    }
    Ok(())
}

fn print_issues(result: &ValidationResult) {
    if result.issues.is_empty() {
        return;
    }
    println!();
    for issue in &result.issues {
        let label = match issue.severity {
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
        };
        println!("# {}: {}: {}", label, issue.field, issue.message);
    }
    if !result.is_ok() {
        println!("# defaults are in effect until the errors are fixed");
    }
}

/// Config files in merge order, lowest precedence first.
pub(crate) fn sources() -> Vec<(&'static str, PathBuf)> {
    vec![
        ("user", Config::config_dir().join("config.toml")),
        ("project", PathBuf::from(Config::PROJECT_FILE)),
        ("local", PathBuf::from(Config::PROJECT_LOCAL_FILE)),
    ]
}

fn presence(path: &Path) -> &'static str {
    if path.is_file() {
        "✓"
    } else {
        "-"
    }
}
