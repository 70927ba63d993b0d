use parking_lot::Mutex;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::pattern::LoadPatternGenerator;

pub type SharedGenerator = Arc<Mutex<LoadPatternGenerator>>;

/// Running schedule. Stopping or dropping the handle signals the thread and
/// joins it.
pub struct ScheduleHandle {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<usize>>,
}

impl ScheduleHandle {
    pub fn stop(mut self) -> usize {
        self.shutdown()
    }

    pub fn is_finished(&self) -> bool {
        self.thread
            .as_ref()
            .map(JoinHandle::is_finished)
            .unwrap_or(true)
    }

    fn shutdown(&mut self) -> usize {
        if let Some(stop_tx) = self.stop_tx.take() {
            // The thread may already be gone once its duration elapsed.
            let _ = stop_tx.send(());
        }
        match self.thread.take().map(JoinHandle::join) {
            Some(Ok(emitted)) => emitted,
            Some(Err(_)) => {
                warn!("scheduled generation thread panicked");
                0
            }
            None => 0,
        }
    }
}

impl Drop for ScheduleHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

pub fn start_scheduled<F>(
    generator: SharedGenerator,
    interval: Duration,
    duration: Option<Duration>,
    mut callback: F,
) -> ScheduleHandle
where
    F: FnMut(u64) + Send + 'static,
{
    let (stop_tx, stop_rx) = mpsc::channel::<()>();
    let thread = thread::spawn(move || {
        let started = Instant::now();
        let mut emitted = 0usize;
        loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
            if duration.is_some_and(|limit| started.elapsed() >= limit) {
                break;
            }
            let value = generator.lock().generate_next();
            callback(value);
            emitted += 1;
        }
        debug!(emitted, "scheduled generation finished");
        emitted
    });

    ScheduleHandle {
        stop_tx: Some(stop_tx),
        thread: Some(thread),
    }
}
