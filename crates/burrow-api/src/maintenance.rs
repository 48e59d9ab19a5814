//! Background space reclamation
//!
//! The loop sleeps until its timer fires or a manual tick arrives, then
//! runs a burst: reclamation units back to back until one reports that
//! nothing is left or fails. A failed burst is reported and the loop goes
//! back to waiting. A stop command is honoured while waiting and between
//! units.

use crate::error::{classify, Error, ErrorHandler, Result};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One unit of space reclamation
pub trait Reclaimer {
    /// Reclaims one unit; `Ok(false)` means there was nothing to reclaim.
    fn reclaim_once(&self) -> Result<bool>;
}

/// How a burst ended
#[derive(Debug)]
pub enum BurstOutcome {
    /// The last unit found nothing to reclaim
    Drained,
    /// A unit failed; the loop retries on the next tick
    Failed(Error),
    /// A stop was requested between units
    Stopped,
}

/// Result of one reclamation burst
#[derive(Debug)]
pub struct BurstReport {
    /// Units that reclaimed something
    pub reclaimed: usize,
    pub outcome: BurstOutcome,
}

/// Runs reclamation units until the reclaimer is drained, fails, or
/// `stop_requested` returns true before a unit.
pub fn run_burst<R, F>(reclaimer: &R, mut stop_requested: F) -> BurstReport
where
    R: Reclaimer + ?Sized,
    F: FnMut() -> bool,
{
    let mut reclaimed = 0;
    loop {
        if stop_requested() {
            return BurstReport {
                reclaimed,
                outcome: BurstOutcome::Stopped,
            };
        }
        match reclaimer.reclaim_once() {
            Ok(true) => reclaimed += 1,
            Ok(false) => {
                return BurstReport {
                    reclaimed,
                    outcome: BurstOutcome::Drained,
                }
            }
            Err(err) => {
                return BurstReport {
                    reclaimed,
                    outcome: BurstOutcome::Failed(err),
                }
            }
        }
    }
}

enum Command {
    Tick,
    Stop,
}

/// Handle to a running maintenance thread; stops and joins it on drop
pub struct MaintenanceHandle {
    commands: Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl MaintenanceHandle {
    /// Starts the loop on a dedicated thread, ticking every `interval`.
    pub fn spawn<R>(reclaimer: Arc<R>, interval: Duration, handler: Option<ErrorHandler>) -> Result<Self>
    where
        R: Reclaimer + Send + Sync + 'static,
    {
        let (commands, receiver) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("burrow-maintenance".to_string())
            .spawn(move || run_loop(&*reclaimer, &receiver, interval, handler.as_ref()))
            .map_err(|e| classify("start_maintenance", e.into()))?;

        Ok(Self {
            commands,
            thread: Some(thread),
        })
    }

    /// Wakes the loop as if its timer fired. Returns false once it has stopped.
    pub fn trigger(&self) -> bool {
        self.commands.send(Command::Tick).is_ok()
    }

    /// Stops the loop and waits for the running unit, if any, to finish.
    pub fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // A send error means the loop is already gone.
        let _ = self.commands.send(Command::Stop);
        if thread.join().is_err() {
            warn!("maintenance thread panicked");
        }
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for MaintenanceHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop<R>(
    reclaimer: &R,
    commands: &Receiver<Command>,
    interval: Duration,
    handler: Option<&ErrorHandler>,
) where
    R: Reclaimer + ?Sized,
{
    info!(?interval, "maintenance loop started");
    loop {
        match commands.recv_timeout(interval) {
            Ok(Command::Tick) | Err(RecvTimeoutError::Timeout) => {}
            Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => break,
        }

        let report = run_burst(reclaimer, || stop_requested(commands));
        match report.outcome {
            BurstOutcome::Drained => {
                debug!(reclaimed = report.reclaimed, "reclamation burst drained");
            }
            BurstOutcome::Failed(err) => {
                warn!(reclaimed = report.reclaimed, error = %err, "reclamation burst failed");
                if let Some(handler) = handler {
                    handler("reclaim", &err);
                }
            }
            BurstOutcome::Stopped => break,
        }
    }
    info!("maintenance loop stopped");
}

fn stop_requested(commands: &Receiver<Command>) -> bool {
    // Ticks that arrive mid-burst are absorbed by the running burst.
    loop {
        match commands.try_recv() {
            Ok(Command::Tick) => continue,
            Ok(Command::Stop) | Err(TryRecvError::Disconnected) => return true,
            Err(TryRecvError::Empty) => return false,
        }
    }
}
