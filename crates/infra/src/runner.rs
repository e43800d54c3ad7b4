//! Interval runner for the reminder batch.
//!
//! A dedicated thread fires the batch on a fixed cadence, with an
//! event-trigger hook for firing early (e.g. after a project edit).
//! Run failures are logged and never propagate; the next tick retries
//! from scratch.

use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use duewatch_notifications::{Mailer, ProjectStore, ReminderBatch, SiteInfo, UserDirectory};

/// Config for the reminder runner.
#[derive(Debug, Clone)]
pub struct ReminderRunner {
    pub interval: Duration,
}

impl Default for ReminderRunner {
    fn default() -> Self {
        Self {
            // The original deployment ran hourly.
            interval: Duration::from_secs(3600),
        }
    }
}

/// Handle for the running batch thread (shutdown + trigger hook).
#[derive(Debug)]
pub struct ReminderRunnerHandle {
    shutdown: mpsc::Sender<()>,
    trigger: mpsc::SyncSender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl ReminderRunnerHandle {
    /// Fire a run ahead of schedule.
    ///
    /// Triggers are coalesced (bounded queue); if a run is already
    /// pending this is a no-op.
    pub fn trigger(&self) {
        let _ = self.trigger.try_send(());
    }

    /// Gracefully stop the runner thread.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

impl ReminderRunner {
    /// Spawn the runner thread around a constructed batch.
    pub fn spawn<P, D, M, S>(
        &self,
        name: &'static str,
        batch: ReminderBatch<P, D, M, S>,
    ) -> ReminderRunnerHandle
    where
        P: ProjectStore + 'static,
        D: UserDirectory + 'static,
        M: Mailer + 'static,
        S: SiteInfo + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let (trigger_tx, trigger_rx) = mpsc::sync_channel::<()>(1);

        let cfg = self.clone();
        let join = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || runner_loop(name, cfg, shutdown_rx, trigger_rx, batch))
            .expect("failed to spawn reminder runner thread");

        ReminderRunnerHandle {
            shutdown: shutdown_tx,
            trigger: trigger_tx,
            join: Some(join),
        }
    }
}

fn runner_loop<P, D, M, S>(
    name: &'static str,
    cfg: ReminderRunner,
    shutdown_rx: mpsc::Receiver<()>,
    trigger_rx: mpsc::Receiver<()>,
    batch: ReminderBatch<P, D, M, S>,
) where
    P: ProjectStore + 'static,
    D: UserDirectory + 'static,
    M: Mailer + 'static,
    S: SiteInfo + 'static,
{
    info!(runner = name, "reminder runner started");

    let mut next_tick = Instant::now() + cfg.interval;
    let mut pending = true; // run once on startup

    loop {
        // Shutdown has priority.
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        let now = Instant::now();
        if now >= next_tick {
            pending = true;
            // Keep a stable cadence even if we were delayed.
            while next_tick <= now {
                next_tick += cfg.interval;
            }
        }

        // Event-trigger: non-blocking drain to coalesce multiple triggers.
        while trigger_rx.try_recv().is_ok() {
            pending = true;
        }

        if !pending {
            let sleep_for = next_tick
                .saturating_duration_since(Instant::now())
                .min(Duration::from_millis(250));
            thread::sleep(sleep_for);
            continue;
        }

        pending = false;

        match batch.run() {
            Ok(summary) => {
                info!(
                    runner = name,
                    emails_sent = summary.emails_sent,
                    emails_failed = summary.emails_failed,
                    items_reminded = summary.items_reminded,
                    "reminder run finished"
                );
            }
            Err(e) => {
                warn!(runner = name, error = %e, "reminder run failed");
            }
        }
    }

    info!(runner = name, "reminder runner stopped");
}
