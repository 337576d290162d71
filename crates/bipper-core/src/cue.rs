//! Audio cue ports.
//!
//! The engine holds two independent [`CuePort`]s, one for the warning beeps
//! near the end of a section and one for the section end. Firing is
//! fire-and-forget: a port must return promptly and must swallow its own
//! playback errors.
//!
//! Backends whose play call blocks are wrapped in a [`CueDispatcher`], which
//! moves playback onto a dedicated thread.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::error::CueError;
use crate::sync::AtomicFlag;

/// A handle the engine fires at cue points.
pub trait CuePort: Send + Sync {
    /// Trigger the cue. Must not block the caller for any real length of time.
    fn fire(&self);

    /// Release the backend. Called once the engine is torn down; may be
    /// called more than once.
    fn close(&self) {}
}

impl<T: CuePort + ?Sized> CuePort for Arc<T> {
    fn fire(&self) {
        (**self).fire()
    }

    fn close(&self) {
        (**self).close()
    }
}

/// A cue that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentCue;

impl CuePort for SilentCue {
    fn fire(&self) {}
}

/// A cue that only counts how often it fired.
#[derive(Debug, Default)]
pub struct CountingCue {
    fired: AtomicUsize,
    closed: AtomicUsize,
}

impl CountingCue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fired(&self) -> usize {
        self.fired.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl CuePort for CountingCue {
    fn fire(&self) {
        self.fired.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A cue backend that may block while it plays.
pub trait CuePlayer {
    fn play(&mut self) -> Result<(), CueError>;
}

/// Runs a [`CuePlayer`] on its own thread so firing never blocks.
///
/// The player is built on the worker thread, which lets backends that are
/// not `Send` (audio output streams, for instance) live there.
///
/// Closing drops fires that are still queued; only a cue already playing
/// is waited for.
pub struct CueDispatcher {
    name: String,
    closing: Arc<AtomicFlag>,
    tx: Mutex<Option<mpsc::Sender<()>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CueDispatcher {
    /// Start the worker thread and build the player on it.
    ///
    /// A player that fails to build is logged; the dispatcher then accepts
    /// and discards every fire request.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker thread cannot be spawned.
    pub fn spawn<F, P>(name: impl Into<String>, build: F) -> Result<Self, CueError>
    where
        F: FnOnce() -> Result<P, CueError> + Send + 'static,
        P: CuePlayer + 'static,
    {
        let name = name.into();
        let (tx, rx) = mpsc::channel::<()>();
        let thread_name = name.clone();
        let closing = Arc::new(AtomicFlag::new(false));
        let stop = Arc::clone(&closing);
        let worker = std::thread::Builder::new()
            .name(format!("cue-{name}"))
            .spawn(move || {
                let mut player = match build() {
                    Ok(player) => Some(player),
                    Err(e) => {
                        tracing::warn!(cue = %thread_name, "cue disabled: {e}");
                        None
                    }
                };
                for () in rx {
                    if stop.get() {
                        break;
                    }
                    let Some(player) = player.as_mut() else {
                        continue;
                    };
                    if let Err(e) = player.play() {
                        tracing::warn!(cue = %thread_name, "{e}");
                    }
                }
                tracing::debug!(cue = %thread_name, "cue worker stopped");
            })
            .map_err(|e| CueError::Unavailable(e.to_string()))?;

        Ok(Self {
            name,
            closing,
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl CuePort for CueDispatcher {
    fn fire(&self) {
        let Ok(guard) = self.tx.lock() else {
            return;
        };
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(()).is_err() {
                    tracing::debug!(cue = %self.name, "cue worker is gone");
                }
            }
            None => tracing::debug!(cue = %self.name, "fired after close"),
        }
    }

    fn close(&self) {
        self.closing.set(true);
        if let Ok(mut tx) = self.tx.lock() {
            tx.take();
        }
        let worker = self.worker.lock().ok().and_then(|mut w| w.take());
        if let Some(worker) = worker {
            if worker.join().is_err() {
                tracing::warn!(cue = %self.name, "cue worker panicked");
            }
        }
    }
}

impl Drop for CueDispatcher {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CueDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CueDispatcher")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
