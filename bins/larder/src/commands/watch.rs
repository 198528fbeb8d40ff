//! Watch command - scheduled refreshes with live change output

use crate::context;
use crate::error::CommandError;
use crate::probe::SystemProbe;
use anyhow::Result;
use larder_cli::output::{format_count, format_state, Status};
use larder_core::config::Config;
use larder_core::entity::Snapshot;
use larder_core::retry::RetryConfig;
use larder_core::state::RefreshState;
use larder_store::spawn_observer;
use larder_sync::{Constraints, RefreshScheduler, RunReport, WorkJournal};
use owo_colors::OwoColorize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// Run the scheduler until Ctrl-C, or until the single run of a one-shot
/// schedule completes
pub async fn run(config: &Config, period: Option<u64>) -> Result<()> {
    let repo = context::open(config)?;
    let section = &config.schema.scheduler;

    let constraints = Constraints {
        requires_network: section.requires_network,
        requires_battery_not_low: section.requires_battery_not_low,
        period: period.map(Duration::from_secs).or_else(|| section.period()),
    };
    let journal = WorkJournal::open(section.journal_path_for(&config.schema.store.path))?;
    debug!(journal = %journal.path().display(), ?constraints, "Starting scheduler");

    let _observer = spawn_observer(repo.observe(), |snapshot: Arc<Snapshot>| {
        println!(
            "{} {}",
            format!("[v{}]", snapshot.version).dimmed(),
            format_count(snapshot.len(), "entity", "entities")
        );
    });

    let handle = RefreshScheduler::new(Arc::new(repo), constraints.clone())
        .with_probe(Arc::new(SystemProbe::default()))
        .with_retry(RetryConfig::from(&section.retry))
        .with_poll_interval(section.poll_interval())
        .with_journal(journal)
        .start();

    match constraints.period {
        Some(p) => Status::info(&format!("Refreshing every {}s, Ctrl-C to stop", p.as_secs())),
        None => Status::info("Refreshing once"),
    }

    let outcome = follow(handle.reports(), constraints.period.is_none(), async {
        // An unavailable signal handler leaves only the scheduler to end the loop
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    })
    .await;

    handle.shutdown().await;
    outcome
}

/// Print reports until `stop` resolves, or after the first report of a
/// one-shot schedule
///
/// Fails if the scheduler ends on its own, or if a one-shot run failed.
async fn follow(
    mut reports: watch::Receiver<Option<RunReport>>,
    one_shot: bool,
    stop: impl Future<Output = ()>,
) -> Result<()> {
    tokio::pin!(stop);
    loop {
        tokio::select! {
            changed = reports.changed() => {
                if changed.is_err() {
                    return Err(CommandError::SchedulerStopped.into());
                }
                let Some(report) = reports.borrow_and_update().clone() else {
                    continue;
                };
                print_report(&report);
                if one_shot {
                    return match report.state {
                        RefreshState::Failed(failure) => Err(CommandError::Refresh(failure).into()),
                        _ => Ok(()),
                    };
                }
            }
            () = &mut stop => {
                Status::info("Stopping");
                return Ok(());
            }
        }
    }
}

fn print_report(report: &RunReport) {
    let line = format!(
        "Run {} {} after {}",
        report.run,
        format_state(&report.state),
        format_count(report.attempts as usize, "attempt", "attempts")
    );
    match report.state {
        RefreshState::Failed(_) => Status::warning(&line),
        _ => Status::success(&line),
    }
}
