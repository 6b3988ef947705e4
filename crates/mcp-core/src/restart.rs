//! Restart-policy model for the service group.
//!
//! Mirrors how the scheduler treats task failures: a budget of `attempts`
//! restarts inside a rolling `interval`, each restart delayed by `delay`.
//! Once the budget is spent, mode `fail` marks the group failed for good and
//! mode `delay` waits for the window to roll forward.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RestartMode {
    Fail,
    Delay,
}

impl fmt::Display for RestartMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartMode::Fail => write!(f, "fail"),
            RestartMode::Delay => write!(f, "delay"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartPolicy {
    pub attempts: u32,
    pub interval: Duration,
    pub delay: Duration,
    pub mode: RestartMode,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            interval: Duration::from_secs(5 * 60),
            delay: Duration::from_secs(15),
            mode: RestartMode::Fail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    /// Relaunch the task once `after` has elapsed.
    Restart {
        #[serde(with = "duration_text")]
        after: Duration,
    },
    /// Budget spent under mode `delay`; the next attempt may start at `until`.
    Wait { until: DateTime<Utc> },
    /// Terminal. The group is not relaunched again.
    Failed,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Restart { after } => {
                write!(f, "restart after {}", humantime::format_duration(*after))
            }
            Decision::Wait { until } => write!(f, "wait until {}", until.to_rfc3339()),
            Decision::Failed => write!(f, "failed"),
        }
    }
}

mod duration_text {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&humantime::format_duration(*d))
    }
}

/// Tracks restarts of one group against its [`RestartPolicy`].
#[derive(Debug, Clone)]
pub struct RestartTracker {
    policy: RestartPolicy,
    restarts: VecDeque<DateTime<Utc>>,
    failed: bool,
}

impl RestartTracker {
    pub fn new(policy: RestartPolicy) -> Self {
        Self {
            policy,
            restarts: VecDeque::new(),
            failed: false,
        }
    }

    pub fn policy(&self) -> &RestartPolicy {
        &self.policy
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Restarts granted within `interval` of `at`.
    pub fn restarts_in_window(&self, at: DateTime<Utc>) -> usize {
        let interval = to_chrono(self.policy.interval);
        self.restarts.iter().filter(|t| at - **t < interval).count()
    }

    /// Record a task failure at `at` and decide what happens next.
    ///
    /// Failures must be recorded in chronological order.
    pub fn record_failure(&mut self, at: DateTime<Utc>) -> Decision {
        if self.failed {
            return Decision::Failed;
        }

        let interval = to_chrono(self.policy.interval);
        while let Some(oldest) = self.restarts.front() {
            if at - *oldest >= interval {
                self.restarts.pop_front();
            } else {
                break;
            }
        }

        if self.restarts.len() < self.policy.attempts as usize {
            self.restarts.push_back(at);
            return Decision::Restart {
                after: self.policy.delay,
            };
        }

        match self.policy.mode {
            RestartMode::Fail => {
                self.failed = true;
                tracing::warn!(
                    attempts = self.policy.attempts,
                    interval = %humantime::format_duration(self.policy.interval),
                    "restart budget exhausted, group failed"
                );
                Decision::Failed
            }
            RestartMode::Delay => {
                let until = self
                    .restarts
                    .front()
                    .map(|oldest| *oldest + interval)
                    .unwrap_or(at);
                Decision::Wait { until }
            }
        }
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::weeks(52 * 100))
}
