//! Scheduler module for running health-check cycles on a fixed period.
//!
//! One cycle runs immediately at start, then one per period. At most one
//! cycle is in flight at any time: a tick that finds a cycle still running
//! is dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::monitor::CycleError;

/// A unit of work the scheduler runs once per period.
#[async_trait]
pub trait CycleTask: Send + Sync + 'static {
    async fn run_cycle(&self) -> Result<(), CycleError>;
}

/// Shortest period the timer accepts.
const MIN_PERIOD: Duration = Duration::from_secs(1);
/// Longest period the timer accepts (one year).
const MAX_PERIOD: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Lifecycle of a [`Scheduler`].
///
/// `Starting` and `Stopping` are only held inside `start`/`stop` while the
/// lifecycle lock is taken. Outside those calls the state is either
/// `Stopped` or `Running`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

struct TimerHandle {
    stop_tx: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

struct Lifecycle {
    state: SchedulerState,
    timer: Option<TimerHandle>,
}

/// Launches cycles, guarded by the in-flight flag.
#[derive(Clone)]
struct CycleGate {
    task: Arc<dyn CycleTask>,
    in_flight: Arc<AtomicBool>,
}

/// Clears the in-flight flag when dropped, whether the cycle finished,
/// failed or panicked.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl CycleGate {
    /// Spawn a cycle unless one is already running. Does not wait for it.
    fn try_launch(&self) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        let guard = InFlightGuard(self.in_flight.clone());
        let task = self.task.clone();

        tokio::spawn(async move {
            let _guard = guard;

            // Run in its own task so a panic surfaces here as a JoinError.
            let cycle = tokio::spawn(async move { task.run_cycle().await });
            match cycle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!("Error during health check: {}", e),
                Err(e) => tracing::error!("Error during health check: cycle task aborted: {}", e),
            }
        });

        true
    }
}

/// Periodic cycle runner with explicit start/stop.
pub struct Scheduler {
    gate: CycleGate,
    lifecycle: Mutex<Lifecycle>,
}

impl Scheduler {
    pub fn new(task: Arc<dyn CycleTask>) -> Self {
        Self {
            gate: CycleGate {
                task,
                in_flight: Arc::new(AtomicBool::new(false)),
            },
            lifecycle: Mutex::new(Lifecycle {
                state: SchedulerState::Stopped,
                timer: None,
            }),
        }
    }

    /// Arm the timer and launch the first cycle without waiting for it.
    ///
    /// The first timer tick comes one full `period` after start. The period
    /// is clamped to between one second and one year. No-op unless the
    /// scheduler is stopped.
    pub async fn start(&self, period: Duration) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.state != SchedulerState::Stopped {
            tracing::warn!("Scheduler: start ignored, state is {:?}", lifecycle.state);
            return;
        }
        lifecycle.state = SchedulerState::Starting;

        let clamped = period.clamp(MIN_PERIOD, MAX_PERIOD);
        if clamped != period {
            tracing::warn!("Scheduler: period {:?} out of range, using {:?}", period, clamped);
        }
        let period = clamped;

        let (stop_tx, stop_rx) = broadcast::channel(1);
        let handle = tokio::spawn(run_timer(self.gate.clone(), period, stop_rx));
        lifecycle.timer = Some(TimerHandle { stop_tx, handle });

        tracing::info!("Scheduler: running a cycle every {:?}", period);
        self.trigger_cycle();

        lifecycle.state = SchedulerState::Running;
    }

    /// Cancel future ticks. A cycle already in flight runs to completion.
    pub async fn stop(&self) {
        let mut lifecycle = self.lifecycle.lock().await;
        if lifecycle.state != SchedulerState::Running {
            return;
        }
        lifecycle.state = SchedulerState::Stopping;

        if let Some(timer) = lifecycle.timer.take() {
            let _ = timer.stop_tx.send(());
            if let Err(e) = timer.handle.await {
                tracing::error!("Scheduler: timer task failed: {}", e);
            }
        }

        lifecycle.state = SchedulerState::Stopped;
    }

    /// Launch a cycle now if none is in flight. Returns whether one started.
    pub fn trigger_cycle(&self) -> bool {
        let launched = self.gate.try_launch();
        if !launched {
            tracing::warn!("Previous health check still running, skipping");
        }
        launched
    }
}

async fn run_timer(gate: CycleGate, period: Duration, mut stop_rx: broadcast::Receiver<()>) {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop_rx.recv() => break,
            _ = interval.tick() => {
                if !gate.try_launch() {
                    tracing::warn!("Previous health check still running, skipping this tick");
                }
            }
        }
    }
}
