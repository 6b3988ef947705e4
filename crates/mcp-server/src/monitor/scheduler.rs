//! Cron-driven job loop with a single-flight guard.

use chrono::Utc;
use futures::future::BoxFuture;
use mattermost_mcp_core::cron::CronSchedule;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

pub type Job = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Held for the duration of one job run; clears the running flag on drop.
struct RunGuard(Arc<AtomicBool>);

impl RunGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Scheduler {
    schedule: CronSchedule,
    job_running: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Scheduler {
    pub fn new(schedule: CronSchedule) -> Self {
        Self {
            schedule,
            job_running: Arc::new(AtomicBool::new(false)),
            handle: Mutex::new(None),
        }
    }

    /// Spawn the loop that fires `job` at every cron tick. Restarting an
    /// active scheduler replaces the previous loop.
    pub fn start(&self, job: Job) {
        let schedule = self.schedule.clone();
        let job_running = self.job_running.clone();

        let handle = tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let Some(next) = schedule.next_after(now) else {
                    warn!(schedule = %schedule, "cron expression never fires, scheduler exiting");
                    return;
                };
                let wait = (next - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                match RunGuard::acquire(&job_running) {
                    None => warn!("Previous monitoring task still running, skipping this run"),
                    Some(guard) => {
                        info!(fire_time = %next.to_rfc3339(), "Starting scheduled monitoring run");
                        let job = job.clone();
                        tokio::spawn(async move {
                            let _guard = guard;
                            job().await;
                        });
                    }
                }
            }
        });

        if let Some(previous) = self.lock_handle().replace(handle) {
            previous.abort();
        }
        info!(schedule = %self.schedule, "scheduler started");
    }

    /// Run `job` immediately under the same guard as scheduled runs.
    /// Returns false without running when a run is already in progress.
    pub async fn run_now(&self, job: &Job) -> bool {
        let Some(_guard) = RunGuard::acquire(&self.job_running) else {
            warn!("Previous monitoring task still running, skipping this run");
            return false;
        };
        job().await;
        true
    }

    pub fn stop(&self) {
        if let Some(handle) = self.lock_handle().take() {
            handle.abort();
            info!("scheduler stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.lock_handle()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    pub fn is_job_running(&self) -> bool {
        self.job_running.load(Ordering::Acquire)
    }

    fn lock_handle(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.handle.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
