//! Local cache commands - list, get, delete, clear
//!
//! None of these touch the network.

use crate::context;
use crate::error::CommandError;
use anyhow::Result;
use larder_cli::output::{format_count, print_entities, summarize, Status};
use larder_core::config::Config;
use larder_core::entity::EntityId;
use larder_store::LocalStore;

/// Print every cached entity
pub async fn list(config: &Config, json: bool) -> Result<()> {
    let store = context::open_store(&config.schema)?;
    let entities = tokio::task::spawn_blocking(move || store.all()).await??;

    if json {
        println!("{}", serde_json::to_string_pretty(&entities)?);
    } else {
        print_entities(&entities);
    }
    Ok(())
}

/// Print one cached entity as JSON
pub async fn get(config: &Config, id: &str) -> Result<()> {
    let store = context::open_store(&config.schema)?;
    let id = EntityId::from(id);

    let lookup = id.clone();
    let entity = tokio::task::spawn_blocking(move || store.get(&lookup)).await??;
    let entity = entity.ok_or(CommandError::NotFound(id))?;

    println!("{}", serde_json::to_string_pretty(&entity)?);
    Ok(())
}

/// Remove one cached entity
pub async fn delete(config: &Config, id: &str) -> Result<()> {
    let store = context::open_store(&config.schema)?;
    let id = EntityId::from(id);

    let target = id.clone();
    let removed = tokio::task::spawn_blocking(move || {
        let entity = store.get(&target)?;
        store.delete(&target).map(|deleted| entity.filter(|_| deleted))
    })
    .await??;

    match removed {
        Some(entity) => {
            Status::success(&format!("Deleted {id} ({})", summarize(&entity)));
            Ok(())
        }
        None => Err(CommandError::NotFound(id).into()),
    }
}

/// Remove every cached entity
pub async fn clear(config: &Config) -> Result<()> {
    let store = context::open_store(&config.schema)?;
    let removed = tokio::task::spawn_blocking(move || {
        let count = store.len()?;
        store.clear().map(|()| count)
    })
    .await??;

    Status::success(&format!("Cleared {}", format_count(removed, "entity", "entities")));
    Ok(())
}
