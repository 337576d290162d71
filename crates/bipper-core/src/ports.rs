//! Event bus between the countdown engine and its observer.
//!
//! The five output ports (document, section, remaining, message and total
//! remaining) share one ordered channel, so the observer sees updates in
//! exactly the order the engine published them. With the default capacity
//! of 1 a publish returns only once the observer has taken the update; a
//! larger capacity lets `capacity - 1` updates wait in the channel. Pause
//! requests travel the other way on their own port.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::sync::AtomicFlag;

/// Capacity of the pause-request port.
const PAUSE_PORT_CAPACITY: usize = 8;

/// Name and length of the section being played.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionInfo {
    pub name: String,
    pub duration: Duration,
}

impl SectionInfo {
    /// The "no active countdown" section.
    pub fn idle() -> Self {
        Self {
            name: String::new(),
            duration: Duration::ZERO,
        }
    }
}

/// Request sent from the observer to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseRequest {
    /// Flip between paused and running, if pausing is currently allowed.
    Toggle,
}

/// One update, tagged with the output port it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "port", content = "value", rename_all = "snake_case")]
pub enum Update {
    Document(String),
    Section(SectionInfo),
    Remaining(Duration),
    Message(String),
    TotalRemaining(Duration),
}

impl Update {
    pub fn port(&self) -> &'static str {
        match self {
            Update::Document(_) => "document",
            Update::Section(_) => "section",
            Update::Remaining(_) => "remaining",
            Update::Message(_) => "message",
            Update::TotalRemaining(_) => "total_remaining",
        }
    }
}

/// Publishing was interrupted by cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Cancelled;

/// Sending half of the output ports.
#[derive(Debug)]
pub(crate) struct Publisher {
    tx: Option<mpsc::Sender<Update>>,
}

impl Publisher {
    /// Hand `update` to the observer, waiting until the channel has room
    /// again. Once the observer is gone every later publish is skipped.
    pub(crate) async fn publish(
        &mut self,
        update: Update,
        cancel: &CancellationToken,
    ) -> Result<(), Cancelled> {
        let port = update.port();
        let delivered = {
            let Some(tx) = self.tx.as_ref() else {
                return Ok(());
            };
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Cancelled),
                delivered = handoff(tx, update) => delivered,
            }
        };
        if !delivered {
            tracing::debug!(port, "observer is gone, dropping output ports");
            self.tx = None;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.tx = None;
    }
}

async fn handoff(tx: &mpsc::Sender<Update>, update: Update) -> bool {
    if tx.send(update).await.is_err() {
        return false;
    }
    // A permit is only granted once the channel is below capacity again,
    // which at capacity 1 means the observer has taken the update.
    tx.reserve().await.is_ok()
}

/// Engine side of the bus.
#[derive(Debug)]
pub(crate) struct Ports {
    pub(crate) updates: Publisher,
    pub(crate) pause: mpsc::Receiver<PauseRequest>,
}

impl Ports {
    /// Drop the sender so the observer sees the end of the run.
    pub(crate) fn close(&mut self) {
        self.updates.close();
    }
}

/// Observer side of the bus.
///
/// The observer must keep reading while a run is active or the engine
/// stalls.
#[derive(Debug)]
pub struct Observer {
    updates: mpsc::Receiver<Update>,
    pub pause: mpsc::Sender<PauseRequest>,
    pub pause_gate: Arc<AtomicFlag>,
}

impl Observer {
    /// Wait for the next update. Returns `None` once the engine has closed
    /// its ports.
    pub async fn recv(&mut self) -> Option<Update> {
        self.updates.recv().await
    }

    /// The next update if one is already waiting.
    pub fn try_recv(&mut self) -> Option<Update> {
        self.updates.try_recv().ok()
    }

    /// Ask the engine to toggle pause. See [`PauseHandle::toggle`].
    pub fn toggle_pause(&self) -> bool {
        self.pause_handle().toggle()
    }

    /// A cloneable handle for whatever forwards user input to the engine.
    pub fn pause_handle(&self) -> PauseHandle {
        PauseHandle {
            tx: self.pause.clone(),
            gate: Arc::clone(&self.pause_gate),
        }
    }
}

/// Sends pause toggles, checking the gate first.
#[derive(Debug, Clone)]
pub struct PauseHandle {
    tx: mpsc::Sender<PauseRequest>,
    gate: Arc<AtomicFlag>,
}

impl PauseHandle {
    /// Whether a toggle would currently be honored.
    pub fn allowed(&self) -> bool {
        self.gate.get()
    }

    /// Returns `false` without sending anything when the gate is closed or
    /// the engine is gone. The engine checks the gate again on receipt.
    pub fn toggle(&self) -> bool {
        if !self.gate.get() {
            return false;
        }
        self.tx.try_send(PauseRequest::Toggle).is_ok()
    }
}

/// Create a connected pair of port ends.
pub(crate) fn bus(capacity: usize, pause_gate: Arc<AtomicFlag>) -> (Ports, Observer) {
    let (update_tx, update_rx) = mpsc::channel(capacity.max(1));
    let (pause_tx, pause_rx) = mpsc::channel(PAUSE_PORT_CAPACITY);

    let ports = Ports {
        updates: Publisher {
            tx: Some(update_tx),
        },
        pause: pause_rx,
    };
    let observer = Observer {
        updates: update_rx,
        pause: pause_tx,
        pause_gate,
    };
    (ports, observer)
}
