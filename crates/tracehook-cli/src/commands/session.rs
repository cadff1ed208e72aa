//! Session inspection commands.

use chrono::{DateTime, Local, Utc};
use serde_json::json;

use tracehook_core::error::format_error_with_suggestion;
use tracehook_core::{time, Error};
use tracehook_metrics::summarize;
use tracehook_session::{FileSessionStore, SessionEntry, SessionStore};

use crate::{AppContext, SessionAction};

/// Format a datetime for display.
fn format_time(dt: &DateTime<Utc>) -> String {
    let local: DateTime<Local> = dt.with_timezone(&Local);
    local.format("%Y-%m-%d %H:%M").to_string()
}

fn format_optional_time(dt: Option<&DateTime<Utc>>) -> String {
    dt.map(format_time).unwrap_or_else(|| "-".to_string())
}

/// Outcome of looking a session up by id or prefix.
#[derive(Debug)]
enum Lookup {
    Found(SessionEntry),
    NotFound,
    Ambiguous(Vec<SessionEntry>),
}

/// Exact id first, then unique prefix.
async fn lookup<S: SessionStore>(store: &S, id_or_prefix: &str) -> anyhow::Result<Lookup> {
    let mut matches = store.find_by_prefix(id_or_prefix.trim()).await?;

    if let Some(pos) = matches.iter().position(|m| m.id.as_str() == id_or_prefix.trim()) {
        return Ok(Lookup::Found(matches.swap_remove(pos)));
    }

    Ok(match matches.len() {
        0 => Lookup::NotFound,
        1 => Lookup::Found(matches.remove(0)),
        _ => Lookup::Ambiguous(matches),
    })
}

pub async fn handle(action: SessionAction, ctx: &AppContext) -> anyhow::Result<()> {
    let store = ctx.store();

    match action {
        SessionAction::List { limit } => {
            list_sessions(&store, limit).await?;
        }
        SessionAction::Show { id, json } => {
            show_session(&store, &id, json).await?;
        }
    }

    Ok(())
}

async fn list_sessions(store: &FileSessionStore, limit: usize) -> anyhow::Result<()> {
    let sessions = store.list().await?;

    if sessions.is_empty() {
        println!("No sessions found under {}", store.root().display());
        return Ok(());
    }

    let current = store.current().await?;

    println!("Sessions ({}):", sessions.len());
    println!();

    for session in sessions.iter().take(limit) {
        let marker = if current.as_ref() == Some(&session.id) {
            "*"
        } else {
            " "
        };
        let counts = match store.read_metadata(&session.id).await? {
            Some(meta) => format!("{} agents, {} events", meta.agent_count, meta.events_count),
            None => "no metadata".to_string(),
        };
        println!(
            "{} {} {} ({})",
            marker,
            session.id,
            format_time(&session.created),
            counts
        );
    }

    if sessions.len() > limit {
        println!("  ... and {} more", sessions.len() - limit);
    }

    println!();
    println!("Use 'tracehook session show <id>' for details");

    Ok(())
}

async fn show_session(store: &FileSessionStore, id: &str, as_json: bool) -> anyhow::Result<()> {
    let entry = match lookup(store, id).await? {
        Lookup::Found(entry) => entry,
        Lookup::NotFound => {
            let err = Error::NotFound(id.to_string());
            println!("{}", format_error_with_suggestion(&err));
            return Ok(());
        }
        Lookup::Ambiguous(matches) => {
            println!("Ambiguous ID '{}' matches {} sessions:", id, matches.len());
            for m in &matches {
                println!("  {} {}", m.id, format_time(&m.created));
            }
            println!();
            println!("Please provide a more specific ID.");
            return Ok(());
        }
    };

    let session = &entry.id;
    let metadata = store.read_metadata(session).await?;
    let stored = store.read_summary(session).await?;
    let log = store.read_events(session).await?;
    let live = summarize(session.as_str(), &log.events, time::now());

    if as_json {
        let report = json!({
            "session_id": session,
            "path": entry.path,
            "created": time::format(&entry.created),
            "metadata": metadata,
            "summary": live,
            "last_aggregated": stored.as_ref().map(|s| time::format(&s.aggregated_at)),
            "skipped_lines": log.skipped,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Session: {}", session);
    println!("========================================");
    println!();
    println!("Directory:   {}", entry.path.display());
    println!("Created:     {}", format_time(&entry.created));
    if let Some(ref meta) = metadata {
        println!("Updated:     {}", format_time(&meta.last_updated));
        println!("Last agent:  {}", meta.last_agent);
    }
    println!();
    println!("Events:      {}", live.total_events);
    println!("Agents:      {}", live.total_agents_spawned);
    println!("First event: {}", format_optional_time(live.first_event.as_ref()));
    println!("Last event:  {}", format_optional_time(live.last_event.as_ref()));
    if log.skipped > 0 {
        println!("Skipped:     {} malformed line(s)", log.skipped);
    }

    if !live.agents_by_type.is_empty() {
        println!();
        println!("Agent types:");
        for (agent, count) in &live.agents_by_type {
            println!("  {:<32} {}", agent, count);
        }
        println!();
        println!("Models:");
        for (model, count) in &live.models_used {
            println!("  {:<32} {}", model, count);
        }
    }

    println!();
    match stored {
        Some(summary) => println!("Last aggregated: {}", format_time(&summary.aggregated_at)),
        None => println!("Not aggregated yet. Run 'tracehook aggregate --session {}'", session),
    }

    Ok(())
}
