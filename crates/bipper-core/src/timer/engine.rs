//! Countdown engine.
//!
//! Runs a [`Countdown`] against a clock, publishes its effects on the output
//! ports, fires the cues, and services pause requests and cancellation.
//!
//! ## Usage
//!
//! ```ignore
//! let (mut engine, observer) = CountdownEngine::new(EngineOptions::default());
//! engine.init(document, Box::new(warning), Box::new(end))?;
//! tokio::spawn(render(observer));
//! let outcome = engine.run().await;
//! engine.close();
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::clock::Clock;
use super::countdown::{Countdown, CountdownOptions, CountdownSnapshot, CountdownState, Effect};
use crate::cue::CuePort;
use crate::document::Document;
use crate::error::ConfigError;
use crate::ports::{bus, Cancelled, Observer, PauseRequest, Ports, SectionInfo, Update};
use crate::sync::AtomicFlag;

/// Message shown when there is nothing to count down.
pub const IDLE_MESSAGE: &str = "No active countdown";

/// Engine settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineOptions {
    #[serde(flatten)]
    pub countdown: CountdownOptions,
    /// Updates each output port buffers before the tick loop blocks.
    pub port_capacity: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            countdown: CountdownOptions::default(),
            port_capacity: 1,
        }
    }
}

/// How a call to [`CountdownEngine::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every section of a non-looping document was played.
    Completed,
    /// The cancellation token fired or the clock stopped.
    Cancelled,
    /// No valid document was loaded; the idle state was published.
    NotConfigured,
}

/// Drives one countdown run.
///
/// An engine serves a single run: its ports close when [`run`](Self::run)
/// returns, and a later [`init`](Self::init) is refused.
pub struct CountdownEngine {
    options: EngineOptions,
    countdown: Option<Countdown>,
    warning: Option<Box<dyn CuePort>>,
    end: Option<Box<dyn CuePort>>,
    ports: Ports,
    clock: Clock,
    cancel: CancellationToken,
    pause_gate: Arc<AtomicFlag>,
    spent: bool,
}

impl CountdownEngine {
    /// Create an engine ticking once per second, and the observer end of its ports.
    pub fn new(options: EngineOptions) -> (Self, Observer) {
        Self::with_clock(options, Clock::seconds())
    }

    /// Create an engine driven by `clock`.
    pub fn with_clock(options: EngineOptions, clock: Clock) -> (Self, Observer) {
        let pause_gate = Arc::new(AtomicFlag::new(false));
        let (ports, observer) = bus(options.port_capacity, Arc::clone(&pause_gate));
        let engine = Self {
            options,
            countdown: None,
            warning: None,
            end: None,
            ports,
            clock,
            cancel: CancellationToken::new(),
            pause_gate,
            spent: false,
        };
        (engine, observer)
    }

    /// Load a document and the two cue ports, resetting all counters.
    ///
    /// The cues are kept even when the document is rejected, so that
    /// [`close`](Self::close) releases them.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the document has nothing to play. The
    /// engine then stays unconfigured and [`run`](Self::run) returns at once.
    /// Returns [`ConfigError::EngineSpent`] once the engine has run or been
    /// closed; the given cues are closed right away.
    pub fn init(
        &mut self,
        document: Document,
        warning: Box<dyn CuePort>,
        end: Box<dyn CuePort>,
    ) -> Result<(), ConfigError> {
        if self.spent {
            warning.close();
            end.close();
            tracing::warn!("engine already used, refusing to load another document");
            return Err(ConfigError::EngineSpent);
        }
        self.release_cues();
        self.warning = Some(warning);
        self.end = Some(end);
        self.countdown = None;
        self.pause_gate.set(false);

        let countdown =
            Countdown::with_gate(document, self.options.countdown, Arc::clone(&self.pause_gate))
                .inspect_err(|e| tracing::warn!("refusing to start countdown: {e}"))?;
        tracing::info!(
            sections = countdown.document().sections().len(),
            total_secs = countdown.document().total().as_secs(),
            looping = countdown.document().looping(),
            "countdown ready"
        );
        self.countdown = Some(countdown);
        Ok(())
    }

    /// Shared gate telling observers whether a pause request would be honored.
    pub fn pause_gate(&self) -> Arc<AtomicFlag> {
        Arc::clone(&self.pause_gate)
    }

    /// Token that stops the run at the next tick boundary or blocked publish.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn snapshot(&self) -> Option<CountdownSnapshot> {
        self.countdown.as_ref().map(Countdown::snapshot)
    }

    /// Play the loaded document until it finishes or is cancelled.
    pub async fn run(&mut self) -> RunOutcome {
        self.spent = true;
        let Some(mut countdown) = self.countdown.take() else {
            tracing::info!("no countdown configured, publishing idle state");
            self.publish_idle().await;
            self.ports.close();
            return RunOutcome::NotConfigured;
        };

        let outcome = self.drive(&mut countdown).await;
        if outcome == RunOutcome::Cancelled {
            countdown.cancel();
        }
        tracing::info!(?outcome, laps = countdown.lap(), "countdown stopped");
        self.ports.close();
        self.countdown = Some(countdown);
        outcome
    }

    /// Release the cue ports. Safe to call at any time, any number of times.
    pub fn close(&mut self) {
        self.spent = true;
        self.cancel.cancel();
        self.pause_gate.set(false);
        self.release_cues();
    }

    // ── Internal ─────────────────────────────────────────────────────

    async fn drive(&mut self, countdown: &mut Countdown) -> RunOutcome {
        let effects = countdown.start();
        if self.apply(effects).await.is_err() {
            return RunOutcome::Cancelled;
        }

        loop {
            match countdown.state() {
                CountdownState::Finished => return RunOutcome::Completed,
                CountdownState::SectionComplete => {
                    let effects = countdown.advance();
                    if self.apply(effects).await.is_err() {
                        return RunOutcome::Cancelled;
                    }
                    continue;
                }
                CountdownState::Idle | CountdownState::Running => {}
            }

            let effects = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return RunOutcome::Cancelled,
                Some(request) = self.ports.pause.recv() => match request {
                    PauseRequest::Toggle => countdown.toggle_pause(),
                },
                ticked = self.clock.tick() => {
                    if !ticked {
                        tracing::warn!("clock stopped, ending countdown");
                        return RunOutcome::Cancelled;
                    }
                    countdown.tick()
                }
            };

            if self.apply(effects).await.is_err() {
                return RunOutcome::Cancelled;
            }
        }
    }

    async fn apply(&mut self, effects: Vec<Effect>) -> Result<(), Cancelled> {
        for effect in effects {
            let update = match effect {
                Effect::Document(raw) => Update::Document(raw),
                Effect::Section(section) => Update::Section(section),
                Effect::Remaining(left) => Update::Remaining(left),
                Effect::Message(text) => {
                    tracing::debug!(message = %text);
                    Update::Message(text)
                }
                Effect::TotalRemaining(total) => Update::TotalRemaining(total),
                Effect::WarningCue => {
                    if let Some(cue) = &self.warning {
                        cue.fire();
                    }
                    continue;
                }
                Effect::EndCue => {
                    if let Some(cue) = &self.end {
                        cue.fire();
                    }
                    continue;
                }
            };
            self.ports.updates.publish(update, &self.cancel).await?;
        }
        Ok(())
    }

    async fn publish_idle(&mut self) {
        let idle = [
            Update::Document(String::new()),
            Update::Section(SectionInfo::idle()),
            Update::Remaining(Duration::ZERO),
            Update::Message(IDLE_MESSAGE.into()),
            Update::TotalRemaining(Duration::ZERO),
        ];
        for update in idle {
            if self.ports.updates.publish(update, &self.cancel).await.is_err() {
                return;
            }
        }
    }

    fn release_cues(&mut self) {
        for cue in [self.warning.take(), self.end.take()].into_iter().flatten() {
            cue.close();
        }
    }
}

impl Drop for CountdownEngine {
    fn drop(&mut self) {
        self.release_cues();
    }
}

impl std::fmt::Debug for CountdownEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CountdownEngine")
            .field("options", &self.options)
            .field("countdown", &self.countdown)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}
