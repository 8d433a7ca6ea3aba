//! Cycle scheduler
//!
//! The CycleScheduler is responsible for:
//! - Acquiring a fresh remote UI session for every cycle
//! - Running the router update workflow against it
//! - Releasing the session exactly once, on every path
//! - Writing the liveness marker after successful cycles
//! - Sleeping until the next cycle, interruptibly
//!
//! ## Cycle Flow
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                                                              │
//!   ▼                                                              │
//! acquire ──► workflow ──► release ──► success? ──► mark liveness  │
//!   │                        ▲            │                        │
//!   └─ SessionAcquisition ───┘            ▼                        │
//!      Failed (no release)         sleep(interval) ────────────────┘
//!                                  sleep(fault_backoff) after a fault
//! ```
//!
//! ## Concurrency
//!
//! Cycles run one after another on the caller's task. The only suspension
//! point that observes shutdown is the sleep between cycles; a cycle in
//! flight always runs to completion, including its session release.

use crate::config::SchedulerConfig;
use crate::error::{Error, Result};
use crate::liveness::LivenessMarker;
use crate::session::SessionFactory;
use crate::workflow::{CycleResult, FailureKind, RouterUpdateWorkflow};
use chrono::{DateTime, Local, Utc};
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{Instrument, debug, error, info, info_span, warn};

/// Events emitted by the CycleScheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// Scheduler loop entered
    Started {
        interval: Duration,
    },

    /// A cycle is about to acquire its session
    CycleStarted {
        cycle: u64,
    },

    /// The cycle's session was released
    SessionReleased {
        cycle: u64,
    },

    /// Both LAN pages were saved
    CycleSucceeded {
        cycle: u64,
        completed_at: DateTime<Utc>,
        logout_error: Option<String>,
    },

    /// The cycle failed; the next tick is the retry
    CycleFailed {
        cycle: u64,
        kind: FailureKind,
        detail: String,
        consecutive_failures: u32,
    },

    /// Scheduler loop exited
    Stopped {
        reason: String,
        cycles: u64,
    },
}

/// Runs the router update workflow on a fixed interval, forever
///
/// ## Lifecycle
///
/// 1. Create with [`CycleScheduler::new()`]
/// 2. Start with [`CycleScheduler::run_until()`]
/// 3. Runs until the shutdown future completes
///
/// ## Failure Containment
///
/// Stage failures, session start-up failures and panics anywhere in a
/// cycle (acquire, workflow, release, liveness write) are all contained to
/// the cycle they happen in. Stage failures wait the normal interval;
/// panics wait the shorter fault backoff.
pub struct CycleScheduler {
    /// Creates one session per cycle
    factory: Box<dyn SessionFactory>,

    /// The update sequence
    workflow: RouterUpdateWorkflow,

    /// Written after each successful cycle
    liveness: Box<dyn LivenessMarker>,

    /// Normal wait between cycles
    interval: Duration,

    /// Wait after an unclassified fault
    fault_backoff: Duration,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<SchedulerEvent>,
}

impl CycleScheduler {
    /// Create a new scheduler
    ///
    /// # Returns
    ///
    /// A tuple of (scheduler, event_receiver) where event_receiver yields scheduler events
    pub fn new(
        factory: Box<dyn SessionFactory>,
        workflow: RouterUpdateWorkflow,
        liveness: Box<dyn LivenessMarker>,
        config: SchedulerConfig,
    ) -> Result<(Self, mpsc::Receiver<SchedulerEvent>)> {
        if config.interval.is_zero() {
            return Err(Error::config_invalid("Cycle interval must be > 0"));
        }
        if config.event_channel_capacity == 0 {
            return Err(Error::config_invalid("Event channel capacity must be > 0"));
        }

        let (tx, rx) = mpsc::channel(config.event_channel_capacity);

        let scheduler = Self {
            factory,
            workflow,
            liveness,
            interval: config.interval,
            fault_backoff: config.effective_fault_backoff(),
            event_tx: tx,
        };

        Ok((scheduler, rx))
    }

    /// Run cycles until `shutdown` completes
    ///
    /// The first cycle starts immediately. Shutdown is observed while
    /// sleeping between cycles.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        info!(
            "Starting DNS updater (engine={}, interval={:?})",
            self.factory.engine_name(),
            self.interval
        );
        self.emit_event(SchedulerEvent::Started {
            interval: self.interval,
        });

        let mut cycle: u64 = 0;
        let mut consecutive_failures: u32 = 0;

        loop {
            cycle += 1;

            let span = info_span!("cycle", cycle);

            let guarded = AssertUnwindSafe(async {
                info!("=== Starting DNS Update Cycle ===");
                self.workflow.config().log_summary();

                let result = self.run_cycle(cycle).await;
                self.settle(cycle, result, &mut consecutive_failures).await
            })
            .catch_unwind()
            .instrument(span.clone())
            .await;

            // Panics while settling, e.g. in the liveness marker, land here
            let wait = match guarded {
                Ok(wait) => wait,
                Err(payload) => {
                    let result = CycleResult::failure(
                        FailureKind::UnclassifiedFault,
                        panic_message(&*payload),
                    );
                    self.settle(cycle, result, &mut consecutive_failures)
                        .instrument(span)
                        .await
                }
            };

            log_next_run(wait);

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut shutdown => {
                    info!("Received shutdown signal, exiting gracefully...");
                    self.emit_event(SchedulerEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                        cycles: cycle,
                    });
                    break;
                }
            }
        }

        Ok(())
    }

    /// Run cycles until the oneshot fires or its sender is dropped
    pub async fn run_with_shutdown(
        &self,
        shutdown_rx: tokio::sync::oneshot::Receiver<()>,
    ) -> Result<()> {
        self.run_until(async {
            let _ = shutdown_rx.await;
        })
        .await
    }

    /// Execute one cycle: acquire, run the workflow, release
    ///
    /// The session is closed exactly once whether the workflow succeeds,
    /// fails at a stage, or panics. A session that could not be acquired,
    /// including one whose acquisition panicked, is never closed.
    pub async fn run_cycle(&self, cycle: u64) -> CycleResult {
        self.emit_event(SchedulerEvent::CycleStarted { cycle });

        info!("Creating {} session", self.factory.engine_name());
        let acquired = AssertUnwindSafe(self.factory.acquire())
            .catch_unwind()
            .await;
        let mut session = match acquired {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                error!("Failed to create {} session: {}", self.factory.engine_name(), e);
                return CycleResult::failure(FailureKind::SessionAcquisitionFailed, e.to_string());
            }
            Err(payload) => {
                return CycleResult::failure(FailureKind::UnclassifiedFault, panic_message(&*payload));
            }
        };
        info!("Session created successfully");

        let outcome = AssertUnwindSafe(self.workflow.run(session.as_mut()))
            .catch_unwind()
            .await;

        match AssertUnwindSafe(session.close()).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to release session cleanly: {}", e),
            Err(payload) => warn!(
                "Session release panicked: {}",
                panic_message(&*payload)
            ),
        }
        debug!("Session released");
        self.emit_event(SchedulerEvent::SessionReleased { cycle });

        match outcome {
            Ok(result) => result,
            Err(payload) => {
                CycleResult::failure(FailureKind::UnclassifiedFault, panic_message(&*payload))
            }
        }
    }

    /// Act on a cycle result and decide how long to wait
    async fn settle(
        &self,
        cycle: u64,
        result: CycleResult,
        consecutive_failures: &mut u32,
    ) -> Duration {
        match result {
            CycleResult::Success {
                completed_at,
                logout_error,
            } => {
                info!("=== DNS Update Completed Successfully ===");
                *consecutive_failures = 0;

                if let Err(e) = self.liveness.mark(completed_at).await {
                    warn!("Failed to update liveness marker: {}", e);
                }

                self.emit_event(SchedulerEvent::CycleSucceeded {
                    cycle,
                    completed_at,
                    logout_error,
                });
                self.interval
            }
            CycleResult::Failure { kind, detail } => {
                *consecutive_failures = consecutive_failures.saturating_add(1);

                let wait = if kind == FailureKind::UnclassifiedFault {
                    error!("Unexpected error in update cycle: {}", detail);
                    info!("Retrying in {} seconds...", self.fault_backoff.as_secs());
                    self.fault_backoff
                } else {
                    error!("Error during DNS update process ({}): {}", kind, detail);
                    if kind == FailureKind::Ipv6UpdateFailed {
                        warn!("IPv4 DNS servers were already saved; IPv6 servers were not");
                    }
                    self.interval
                };

                if *consecutive_failures > 1 {
                    warn!("{} consecutive cycles have failed", consecutive_failures);
                }

                self.emit_event(SchedulerEvent::CycleFailed {
                    cycle,
                    kind,
                    detail,
                    consecutive_failures: *consecutive_failures,
                });
                wait
            }
        }
    }

    /// Emit a scheduler event
    fn emit_event(&self, event: SchedulerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

fn log_next_run(wait: Duration) {
    let next_run = chrono::Duration::from_std(wait)
        .ok()
        .and_then(|delta| Local::now().checked_add_signed(delta))
        .map(|at| at.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    info!(
        "Sleeping for {} seconds ({:.2} hours). Next run at: {}",
        wait.as_secs(),
        wait.as_secs_f64() / 3600.0,
        next_run
    );
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {}", message)
    } else {
        "panic with non-string payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panic_message_extracts_str_and_string() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(&*payload), "panic: boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(&*payload), "panic: bang");

        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(&*payload), "panic with non-string payload");
    }

    #[test]
    fn scheduler_event_equality() {
        let event = SchedulerEvent::CycleFailed {
            cycle: 3,
            kind: FailureKind::LoginFailed,
            detail: "Element not found".to_string(),
            consecutive_failures: 2,
        };
        assert_eq!(event.clone(), event);
    }
}
