//! Refresh command - fetch once and merge into the cache

use crate::context;
use crate::error::CommandError;
use anyhow::Result;
use larder_cli::output::{format_count, Status};
use larder_cli::progress;
use larder_core::config::Config;
use larder_core::state::RefreshState;
use std::time::Instant;

/// Run one refresh and report the outcome
pub async fn run(config: &Config) -> Result<()> {
    let repo = context::open(config)?;

    let pb = progress::refresh_spinner(repo.name());
    let started = Instant::now();
    let state = repo.refresh().await;
    progress::finish_refresh(&pb, &state, started.elapsed());

    let cached = repo.all().await?.len();
    let cached = format_count(cached, "entity", "entities");

    match state {
        RefreshState::Failed(failure) => {
            Status::warning(&format!("Keeping {cached} from the last refresh"));
            Err(CommandError::Refresh(failure).into())
        }
        _ => {
            Status::success(&format!("{cached} cached"));
            Ok(())
        }
    }
}
