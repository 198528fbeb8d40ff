//! Background refresh scheduler
//!
//! Runs a [`RefreshTask`] once or periodically, independent of any caller:
//!
//! - waits while the [`Constraints`] are unmet, re-checking on an interval
//! - retries network failures with exponential backoff
//! - records each run in an optional [`WorkJournal`] so a run interrupted
//!   by a restart is picked up by the next process

use crate::journal::WorkJournal;
use crate::repository::Repository;
use chrono::{DateTime, Utc};
use larder_core::retry::{retry_if, RetryConfig};
use larder_core::state::{RefreshFailure, RefreshState};
use larder_remote::RemoteSource;
use larder_store::LocalStore;
use larder_telemetry::{metrics, names};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info, warn};

/// Unit of work the scheduler runs
pub trait RefreshTask: Send + Sync + 'static {
    /// Run once and report the resulting state
    fn run(&self) -> impl Future<Output = RefreshState> + Send;
}

impl<R: RemoteSource, S: LocalStore> RefreshTask for Repository<R, S> {
    fn run(&self) -> impl Future<Output = RefreshState> + Send {
        self.refresh()
    }
}

/// Conditions a run waits for
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Constraints {
    pub requires_network: bool,
    pub requires_battery_not_low: bool,
    /// Time between runs; `None` runs once
    pub period: Option<Duration>,
}

impl Constraints {
    /// Run once, with no conditions
    pub fn one_shot() -> Self {
        Self::default()
    }

    /// Run every `period`, with no conditions
    pub fn periodic(period: Duration) -> Self {
        Self {
            period: Some(period),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_network(mut self) -> Self {
        self.requires_network = true;
        self
    }

    #[must_use]
    pub fn with_battery_not_low(mut self) -> Self {
        self.requires_battery_not_low = true;
        self
    }

    /// Whether the probe reports every required condition
    pub fn satisfied_by(&self, probe: &dyn ConstraintProbe) -> bool {
        (!self.requires_network || probe.network_available())
            && (!self.requires_battery_not_low || probe.battery_not_low())
    }
}

/// Reports device conditions
pub trait ConstraintProbe: Send + Sync + 'static {
    fn network_available(&self) -> bool;
    fn battery_not_low(&self) -> bool;
}

/// Probe that reports every condition as met
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysSatisfied;

impl ConstraintProbe for AlwaysSatisfied {
    fn network_available(&self) -> bool {
        true
    }

    fn battery_not_low(&self) -> bool {
        true
    }
}

/// Summary of one completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Run number within this scheduler, starting at 1
    pub run: u64,
    pub state: RefreshState,
    /// Task invocations, including retries
    pub attempts: u32,
    pub finished_at: DateTime<Utc>,
}

/// Schedules a refresh task
pub struct RefreshScheduler<T> {
    task: Arc<T>,
    constraints: Constraints,
    probe: Arc<dyn ConstraintProbe>,
    retry: RetryConfig,
    poll_interval: Duration,
    journal: Option<WorkJournal>,
}

impl<T: RefreshTask> RefreshScheduler<T> {
    /// Create a scheduler for `task`
    pub fn new(task: Arc<T>, constraints: Constraints) -> Self {
        Self {
            task,
            constraints,
            probe: Arc::new(AlwaysSatisfied),
            retry: RetryConfig::default(),
            poll_interval: Duration::from_secs(30),
            journal: None,
        }
    }

    #[must_use]
    pub fn with_probe(mut self, probe: Arc<dyn ConstraintProbe>) -> Self {
        self.probe = probe;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// How often unmet constraints are re-checked
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_journal(mut self, journal: WorkJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Start the scheduling loop on the current runtime
    pub fn start(self) -> SchedulerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (report_tx, report_rx) = watch::channel(None);
        let run_now = Arc::new(Notify::new());

        let task = tokio::spawn(self.run_loop(shutdown_rx, Arc::clone(&run_now), report_tx));

        SchedulerHandle {
            shutdown: shutdown_tx,
            run_now,
            reports: report_rx,
            task: Some(task),
        }
    }

    async fn run_loop(
        self,
        mut shutdown: watch::Receiver<bool>,
        run_now: Arc<Notify>,
        reports: watch::Sender<Option<RunReport>>,
    ) {
        let mut run = 0;
        let mut next_due = Some(self.first_due());

        loop {
            let due = async {
                match next_due {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            };
            tokio::select! {
                _ = shutdown.changed() => break,
                () = run_now.notified() => debug!("Run requested"),
                () = due => {}
            }

            if !self.wait_for_constraints(&mut shutdown).await {
                break;
            }

            run += 1;
            let report = tokio::select! {
                report = self.execute(run) => report,
                _ = shutdown.changed() => break,
            };
            reports.send_replace(Some(report));

            next_due = self.constraints.period.map(|p| Instant::now() + p);
        }

        debug!(runs = run, "Scheduler stopped");
    }

    /// When the first run is due, from the journal left by a previous process
    ///
    /// A pending entry runs at once. Periodic work whose last run completed
    /// less than a period ago waits out the rest of that period.
    fn first_due(&self) -> Instant {
        let now = Instant::now();
        let Some(journal) = &self.journal else {
            return now;
        };
        let entry = match journal.load() {
            Ok(Some(entry)) => entry,
            Ok(None) => return now,
            Err(e) => {
                warn!(error = %e, "Cannot read work journal, starting fresh");
                return now;
            }
        };

        if entry.pending {
            info!(run_id = %entry.run_id, "Resuming a run left pending by a previous process");
            return now;
        }
        let (Some(period), Some(completed_at)) = (self.constraints.period, entry.completed_at)
        else {
            return now;
        };

        // A completion stamped in the future counts as just now
        let elapsed = (Utc::now() - completed_at).to_std().unwrap_or_default();
        let remaining = period.saturating_sub(elapsed);
        if !remaining.is_zero() {
            debug!(
                wait_secs = remaining.as_secs_f64(),
                "Last run completed recently, deferring first run"
            );
        }
        now + remaining
    }

    /// Returns `false` if shutdown was requested while waiting
    async fn wait_for_constraints(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        let mut logged = false;
        while !self.constraints.satisfied_by(self.probe.as_ref()) {
            if !logged {
                debug!(
                    retry_in_secs = self.poll_interval.as_secs_f64(),
                    "Constraints unmet, deferring run"
                );
                logged = true;
            }
            tokio::select! {
                _ = shutdown.changed() => return false,
                () = sleep(self.poll_interval) => {}
            }
        }
        true
    }

    async fn execute(&self, run: u64) -> RunReport {
        metrics().increment(names::SCHEDULER_RUN);
        if let Some(journal) = &self.journal {
            if let Err(e) = journal.mark_pending() {
                warn!(error = %e, "Cannot record pending run");
            }
        }

        let result = retry_if(
            &self.retry,
            |failure: &RefreshFailure| failure.kind.is_retryable(),
            || {
                let task = Arc::clone(&self.task);
                async move {
                    match task.run().await {
                        RefreshState::Failed(failure) => Err(failure),
                        state => Ok(state),
                    }
                }
            },
        )
        .await;

        let (state, attempts) = match result {
            Ok(done) => (done.value, done.attempts),
            Err(failed) => (RefreshState::Failed(failed.error), failed.attempts),
        };

        if let Some(journal) = &self.journal {
            if let Err(e) = journal.record_outcome(attempts, &state) {
                warn!(error = %e, "Cannot record run outcome");
            }
        }

        match &state {
            RefreshState::Failed(f) => warn!(run, attempts, error = %f, "Scheduled refresh failed"),
            _ => info!(run, attempts, "Scheduled refresh finished"),
        }

        RunReport {
            run,
            state,
            attempts,
            finished_at: Utc::now(),
        }
    }
}

/// Controls a running scheduler; dropping it stops the loop
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    run_now: Arc<Notify>,
    reports: watch::Receiver<Option<RunReport>>,
    task: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Request an immediate run
    pub fn run_now(&self) {
        self.run_now.notify_one();
    }

    /// Watch completed runs
    pub fn reports(&self) -> watch::Receiver<Option<RunReport>> {
        self.reports.clone()
    }

    /// Report of the most recent run
    pub fn last_report(&self) -> Option<RunReport> {
        self.reports.borrow().clone()
    }

    /// Whether the loop has exited
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Stop the loop and wait for it to exit
    pub async fn shutdown(mut self) {
        self.shutdown.send_replace(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Scheduler task ended abnormally");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

impl std::fmt::Debug for SchedulerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerHandle")
            .field("finished", &self.is_finished())
            .field("last_report", &*self.reports.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use larder_core::state::FailureKind;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Task returning scripted states, then `Idle`
    #[derive(Default)]
    struct ScriptedTask {
        outcomes: Mutex<VecDeque<RefreshState>>,
        runs: AtomicUsize,
    }

    impl ScriptedTask {
        fn new(outcomes: Vec<RefreshState>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                runs: AtomicUsize::new(0),
            })
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }
    }

    impl RefreshTask for ScriptedTask {
        async fn run(&self) -> RefreshState {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.outcomes.lock().unwrap().pop_front().unwrap_or_default()
        }
    }

    #[derive(Default)]
    struct SwitchProbe {
        network: AtomicBool,
    }

    impl ConstraintProbe for SwitchProbe {
        fn network_available(&self) -> bool {
            self.network.load(Ordering::SeqCst)
        }

        fn battery_not_low(&self) -> bool {
            true
        }
    }

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
        }
    }

    async fn next_report(handle: &SchedulerHandle) -> RunReport {
        let mut reports = handle.reports();
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            reports.wait_for(Option::is_some),
        )
        .await
        .expect("scheduler produced no report")
        .expect("scheduler stopped");
        report.clone().expect("checked by wait_for")
    }

    #[test]
    fn test_constraints() {
        let probe = SwitchProbe::default();
        assert!(Constraints::one_shot().satisfied_by(&probe));
        assert!(!Constraints::one_shot().with_network().satisfied_by(&probe));
        probe.network.store(true, Ordering::SeqCst);
        assert!(Constraints::one_shot().with_network().satisfied_by(&probe));
    }

    #[tokio::test]
    async fn test_one_shot_runs_once() {
        let task = ScriptedTask::new(Vec::new());
        let handle = RefreshScheduler::new(Arc::clone(&task), Constraints::one_shot()).start();

        let report = next_report(&handle).await;
        assert_eq!(report.run, 1);
        assert!(report.state.is_idle());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(task.runs(), 1);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_network_failures_are_retried() {
        let task = ScriptedTask::new(vec![
            RefreshState::Failed(RefreshFailure::network("down")),
            RefreshState::Failed(RefreshFailure::network("still down")),
        ]);
        let handle = RefreshScheduler::new(Arc::clone(&task), Constraints::one_shot())
            .with_retry(fast_retry(5))
            .start();

        let report = next_report(&handle).await;
        assert!(report.state.is_idle());
        assert_eq!(report.attempts, 3);
        assert_eq!(task.runs(), 3);
    }

    #[tokio::test]
    async fn test_parse_failures_are_not_retried() {
        let task = ScriptedTask::new(vec![RefreshState::Failed(RefreshFailure::parse("bad"))]);
        let handle = RefreshScheduler::new(Arc::clone(&task), Constraints::one_shot())
            .with_retry(fast_retry(5))
            .start();

        let report = next_report(&handle).await;
        assert_eq!(report.state.failure().map(|f| f.kind), Some(FailureKind::Parse));
        assert_eq!(report.attempts, 1);
        assert_eq!(task.runs(), 1);
    }

    #[tokio::test]
    async fn test_retries_stop_at_max_attempts() {
        let task = ScriptedTask::new(vec![
            RefreshState::Failed(RefreshFailure::network("down")); 10
        ]);
        let handle = RefreshScheduler::new(Arc::clone(&task), Constraints::one_shot())
            .with_retry(fast_retry(2))
            .start();

        let report = next_report(&handle).await;
        assert!(report.state.is_failed());
        assert_eq!(report.attempts, 2);
    }

    #[tokio::test]
    async fn test_waits_for_network() {
        let task = ScriptedTask::new(Vec::new());
        let probe = Arc::new(SwitchProbe::default());
        let handle = RefreshScheduler::new(Arc::clone(&task), Constraints::one_shot().with_network())
            .with_probe(Arc::clone(&probe) as Arc<dyn ConstraintProbe>)
            .with_poll_interval(Duration::from_millis(10))
            .start();

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(task.runs(), 0);

        probe.network.store(true, Ordering::SeqCst);
        let report = next_report(&handle).await;
        assert!(report.state.is_idle());
        assert_eq!(task.runs(), 1);
    }

    #[tokio::test]
    async fn test_periodic_runs_repeat() {
        let task = ScriptedTask::new(Vec::new());
        let handle = RefreshScheduler::new(
            Arc::clone(&task),
            Constraints::periodic(Duration::from_millis(20)),
        )
        .start();

        let mut reports = handle.reports();
        tokio::time::timeout(
            Duration::from_secs(5),
            reports.wait_for(|r| r.as_ref().is_some_and(|r| r.run >= 3)),
        )
        .await
        .unwrap()
        .unwrap();

        handle.shutdown().await;
        assert!(task.runs() >= 3);
    }

    #[tokio::test]
    async fn test_run_now_triggers_another_run() {
        let task = ScriptedTask::new(Vec::new());
        let handle = RefreshScheduler::new(Arc::clone(&task), Constraints::one_shot()).start();
        next_report(&handle).await;

        handle.run_now();
        let mut reports = handle.reports();
        tokio::time::timeout(
            Duration::from_secs(5),
            reports.wait_for(|r| r.as_ref().is_some_and(|r| r.run == 2)),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(task.runs(), 2);
    }

    #[tokio::test]
    async fn test_dropping_handle_stops_loop() {
        let task = ScriptedTask::new(Vec::new());
        let handle = RefreshScheduler::new(
            Arc::clone(&task),
            Constraints::periodic(Duration::from_millis(10)),
        )
        .start();
        next_report(&handle).await;

        drop(handle);
        tokio::time::sleep(Duration::from_millis(30)).await;
        let runs = task.runs();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(task.runs(), runs);
    }

    #[tokio::test]
    async fn test_journal_records_completion() {
        let dir = tempfile::tempdir().unwrap();
        let journal = WorkJournal::open(dir.path().join("journal.json")).unwrap();

        let task = ScriptedTask::new(Vec::new());
        let handle = RefreshScheduler::new(Arc::clone(&task), Constraints::one_shot())
            .with_journal(journal.clone())
            .start();
        next_report(&handle).await;
        handle.shutdown().await;

        let entry = journal.load().unwrap().unwrap();
        assert!(!entry.pending);
        assert_eq!(entry.attempts, 1);
        assert_eq!(entry.last_outcome, Some(RefreshState::Idle));
    }

    #[tokio::test]
    async fn test_pending_entry_runs_on_start() {
        let dir = tempfile::tempdir().unwrap();
        let journal = WorkJournal::open(dir.path().join("journal.json")).unwrap();
        // Left behind by a process that died mid-run
        let interrupted = journal.mark_pending().unwrap();

        let task = ScriptedTask::new(Vec::new());
        let handle = RefreshScheduler::new(
            Arc::clone(&task),
            Constraints::periodic(Duration::from_secs(3600)),
        )
        .with_journal(journal.clone())
        .start();

        let report = next_report(&handle).await;
        assert!(report.state.is_idle());
        handle.shutdown().await;

        let entry = journal.load().unwrap().unwrap();
        assert_eq!(entry.run_id, interrupted.run_id);
        assert!(!entry.pending);
    }

    #[tokio::test]
    async fn test_recent_completion_defers_periodic_run() {
        let dir = tempfile::tempdir().unwrap();
        let journal = WorkJournal::open(dir.path().join("journal.json")).unwrap();
        journal.record_outcome(1, &RefreshState::Idle).unwrap();

        let task = ScriptedTask::new(Vec::new());
        let handle = RefreshScheduler::new(
            Arc::clone(&task),
            Constraints::periodic(Duration::from_secs(3600)),
        )
        .with_journal(journal.clone())
        .start();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(task.runs(), 0);
        assert!(handle.last_report().is_none());

        // An explicit request still runs during the wait
        handle.run_now();
        let report = next_report(&handle).await;
        assert_eq!(report.run, 1);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_stale_completion_runs_at_once() {
        let dir = tempfile::tempdir().unwrap();
        let journal = WorkJournal::open(dir.path().join("journal.json")).unwrap();
        let mut entry = journal.record_outcome(1, &RefreshState::Idle).unwrap();
        entry.completed_at = Some(Utc::now() - chrono::Duration::hours(2));
        std::fs::write(journal.path(), serde_json::to_vec(&entry).unwrap()).unwrap();

        let task = ScriptedTask::new(Vec::new());
        let handle = RefreshScheduler::new(
            Arc::clone(&task),
            Constraints::periodic(Duration::from_secs(3600)),
        )
        .with_journal(journal)
        .start();

        let report = next_report(&handle).await;
        assert!(report.state.is_idle());
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_completed_entry_does_not_delay_one_shot() {
        let dir = tempfile::tempdir().unwrap();
        let journal = WorkJournal::open(dir.path().join("journal.json")).unwrap();
        journal.record_outcome(1, &RefreshState::Idle).unwrap();

        let task = ScriptedTask::new(Vec::new());
        let handle = RefreshScheduler::new(Arc::clone(&task), Constraints::one_shot())
            .with_journal(journal)
            .start();

        next_report(&handle).await;
        assert_eq!(task.runs(), 1);
        handle.shutdown().await;
    }
}
