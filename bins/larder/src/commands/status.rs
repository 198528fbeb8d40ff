//! Status command - configuration, cache contents and journal state

use crate::context;
use anyhow::Result;
use chrono::Utc;
use larder_cli::output::{format_age, format_state, Status};
use larder_core::config::Config;
use larder_store::LocalStore;
use larder_sync::{JournalEntry, WorkJournal};
use owo_colors::OwoColorize;
use serde_json::json;

/// Print status without contacting the remote
pub async fn run(config: &Config, json: bool) -> Result<()> {
    let schema = &config.schema;
    let store = context::open_store(schema)?;
    let (count, newest) = tokio::task::spawn_blocking(move || {
        store
            .all()
            .map(|all| (all.len(), all.iter().map(|e| e.refreshed_at()).max()))
    })
    .await??;

    let journal = WorkJournal::open(schema.scheduler.journal_path_for(&schema.store.path))?;
    let entry = journal.load()?;
    let remote_valid = schema.validate().is_ok();

    if json {
        let output = json!({
            "config": config.path.as_ref().map(|p| p.display().to_string()),
            "remote": {
                "url": format!("{}{}", schema.remote.base_url, schema.remote.resource_path),
                "valid": remote_valid,
            },
            "store": {
                "path": schema.store.path.display().to_string(),
                "collection": schema.store.collection.name,
                "entities": count,
                "newest": newest,
            },
            "journal": entry,
            "metrics": larder_telemetry::metrics().export_json(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    Status::header("larder status");
    let config_path = config
        .path
        .as_ref()
        .map_or_else(|| "defaults".to_string(), |p| p.display().to_string());
    println!("  Config:      {config_path}");

    if remote_valid {
        println!(
            "  Remote:      {}{}",
            schema.remote.base_url, schema.remote.resource_path
        );
    } else {
        println!("  Remote:      {}", "not configured".yellow());
    }

    println!("  Database:    {}", schema.store.path.display());
    println!("  Collection:  {}", schema.store.collection.name);
    println!("  Entities:    {}", count.to_string().green());
    if let Some(newest) = newest {
        println!("  Updated:     {}", format_age(newest, Utc::now()));
    }

    print_journal(entry.as_ref());
    println!();
    Ok(())
}

fn print_journal(entry: Option<&JournalEntry>) {
    let Some(entry) = entry else {
        println!("  Scheduler:   {}", "never run".dimmed());
        return;
    };

    let state = if entry.pending {
        "pending".yellow().to_string()
    } else {
        "complete".green().to_string()
    };
    println!(
        "  Scheduler:   {state} (run {}, {} attempts)",
        entry.run_id, entry.attempts
    );
    if let Some(outcome) = &entry.last_outcome {
        println!("  Last run:    {}", format_state(outcome));
    }
}
