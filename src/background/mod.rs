pub mod still;
pub mod video;
pub mod window;

pub use still::StaticBackground;
pub use video::VideoPlayback;

use anyhow::{anyhow, Result};
use crossbeam_channel::{RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::shared::constants;

/// Full-screen background shown while the camera captures.
pub trait BackgroundPlayer: Send {
    /// Spawn the display thread. Returns once the window is up.
    fn start(&mut self) -> Result<()>;
    /// Raise the stop flag and join the display thread. Harmless when the
    /// player never started or already stopped.
    fn stop(&mut self) -> Result<()>;
    fn is_running(&self) -> bool;
}

/// Handed to a display thread so it can report that its window is open.
pub struct ReadySignal {
    tx: Sender<Result<(), String>>,
}

impl ReadySignal {
    pub fn ready(&self) {
        let _ = self.tx.try_send(Ok(()));
    }

    /// A signal nobody listens to, for driving display loops directly.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        let (tx, _rx) = crossbeam_channel::bounded(1);
        Self { tx }
    }
}

/// One display thread plus its stop flag.
pub struct DisplayThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<Result<u64>>>,
    label: &'static str,
}

impl DisplayThread {
    /// Run `body` on a named thread and wait for it to signal readiness, fail,
    /// or finish. `body` returns the number of frames it showed.
    pub fn spawn<F>(label: &'static str, body: F) -> Result<Self>
    where
        F: FnOnce(Arc<AtomicBool>, ReadySignal) -> Result<u64> + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = crossbeam_channel::bounded(1);

        let thread_stop = stop.clone();
        let handle = thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                let signal = ReadySignal { tx: tx.clone() };
                let result = body(thread_stop, signal);
                if let Err(e) = &result {
                    let _ = tx.try_send(Err(format!("{:#}", e)));
                }
                result
            })?;

        let mut display = Self {
            stop,
            handle: Some(handle),
            label,
        };

        match rx.recv_timeout(Duration::from_secs(constants::WINDOW_READY_TIMEOUT_SECS)) {
            Ok(Ok(())) | Err(RecvTimeoutError::Disconnected) => Ok(display),
            Ok(Err(msg)) => {
                let _ = display.join();
                Err(anyhow!("{} failed to start: {}", label, msg))
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!("{} is slow to open its window; continuing", label);
                Ok(display)
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Raise the stop flag and wait for the thread to exit.
    pub fn stop(&mut self) -> Result<u64> {
        self.stop.store(true, Ordering::SeqCst);
        self.join()
    }

    fn join(&mut self) -> Result<u64> {
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("{} thread panicked", self.label))?,
            None => Ok(0),
        }
    }
}

impl Drop for DisplayThread {
    fn drop(&mut self) {
        if self.handle.is_some() {
            if let Err(e) = self.stop() {
                tracing::error!("{} ended with error: {:#}", self.label, e);
            }
        }
    }
}
