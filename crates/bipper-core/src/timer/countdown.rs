//! Countdown state machine.
//!
//! [`Countdown`] holds every counter of a run and exposes one method per
//! transition. Transitions never sleep or publish; they return the
//! [`Effect`]s the caller must carry out, in order. This keeps the timing
//! policy testable without a clock.
//!
//! ## State Transitions
//!
//! ```text
//! Idle -> Running(0) -> SectionComplete(0) -> Running(1) -> ... -> Finished
//!                                   ^                          |
//!                                   +------ Running(0) <-------+  (loop)
//! ```

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::document::{format_duration, Document, Section};
use crate::error::ConfigError;
use crate::ports::SectionInfo;
use crate::sync::AtomicFlag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CountdownState {
    Idle,
    Running,
    SectionComplete,
    Finished,
}

/// Something the caller must do after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Document(String),
    Section(SectionInfo),
    Remaining(Duration),
    Message(String),
    TotalRemaining(Duration),
    WarningCue,
    EndCue,
}

/// Thresholds of the cue and pause policy, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownOptions {
    /// The warning cue fires while `1 <= remaining <= warning_window_secs`.
    pub warning_window_secs: u64,
    /// Pausing is refused once the whole run has this many seconds or fewer left.
    pub pause_lockout_secs: u64,
}

impl Default for CountdownOptions {
    fn default() -> Self {
        Self {
            warning_window_secs: 3,
            pause_lockout_secs: 3,
        }
    }
}

/// Full state of a countdown, for display and logging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountdownSnapshot {
    pub state: CountdownState,
    pub section_index: usize,
    pub section_name: String,
    pub elapsed_in_section_secs: u64,
    pub remaining_in_section_secs: u64,
    pub total_remaining_secs: u64,
    pub paused: bool,
    pub pause_allowed: bool,
    pub lap: u64,
}

/// The countdown for one document.
#[derive(Debug)]
pub struct Countdown {
    document: Document,
    options: CountdownOptions,
    state: CountdownState,
    section_index: usize,
    /// Ticks since the current section started.
    elapsed_in_section: u64,
    /// Ticks left in the current pass over the document.
    total_remaining: u64,
    paused: bool,
    pause_allowed: Arc<AtomicFlag>,
    /// Completed passes over a looping document.
    lap: u64,
}

impl Countdown {
    /// Create an idle countdown with its own pause gate.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the document has no sections or a
    /// section with a zero duration.
    pub fn new(document: Document, options: CountdownOptions) -> Result<Self, ConfigError> {
        Self::with_gate(document, options, Arc::new(AtomicFlag::new(false)))
    }

    /// Create an idle countdown that drives an existing pause gate.
    ///
    /// # Errors
    ///
    /// Same as [`Countdown::new`].
    pub fn with_gate(
        document: Document,
        options: CountdownOptions,
        pause_allowed: Arc<AtomicFlag>,
    ) -> Result<Self, ConfigError> {
        pause_allowed.set(false);
        document.validate()?;
        let total_remaining = document.total_ticks();
        Ok(Self {
            document,
            options,
            state: CountdownState::Idle,
            section_index: 0,
            elapsed_in_section: 0,
            total_remaining,
            paused: false,
            pause_allowed,
            lap: 0,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn section_index(&self) -> usize {
        self.section_index
    }

    pub fn current_section(&self) -> &Section {
        &self.document.sections()[self.section_index]
    }

    pub fn elapsed_in_section(&self) -> u64 {
        self.elapsed_in_section
    }

    /// Seconds left in the current section, always derived from the elapsed count.
    pub fn remaining_in_section(&self) -> u64 {
        self.current_section()
            .ticks()
            .saturating_sub(self.elapsed_in_section)
    }

    pub fn total_remaining(&self) -> u64 {
        self.total_remaining
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause_allowed(&self) -> bool {
        self.pause_allowed.get()
    }

    pub fn pause_gate(&self) -> Arc<AtomicFlag> {
        Arc::clone(&self.pause_allowed)
    }

    pub fn lap(&self) -> u64 {
        self.lap
    }

    pub fn snapshot(&self) -> CountdownSnapshot {
        CountdownSnapshot {
            state: self.state,
            section_index: self.section_index,
            section_name: self.current_section().name.clone(),
            elapsed_in_section_secs: self.elapsed_in_section,
            remaining_in_section_secs: self.remaining_in_section(),
            total_remaining_secs: self.total_remaining,
            paused: self.paused,
            pause_allowed: self.pause_allowed(),
            lap: self.lap,
        }
    }

    // ── Transitions ──────────────────────────────────────────────────

    /// `Idle -> Running(0)`. Publishes the document once per run.
    pub fn start(&mut self) -> Vec<Effect> {
        if self.state != CountdownState::Idle {
            return Vec::new();
        }
        let mut effects = vec![Effect::Document(self.document.raw_text())];
        effects.extend(self.enter_section(0));
        effects.push(Effect::TotalRemaining(secs(self.total_remaining)));
        effects
    }

    /// One second of wall clock. Does nothing unless running and unpaused.
    pub fn tick(&mut self) -> Vec<Effect> {
        if self.state != CountdownState::Running || self.paused {
            return Vec::new();
        }

        self.elapsed_in_section += 1;
        self.total_remaining = self.total_remaining.saturating_sub(1);
        let remaining = self.remaining_in_section();
        let name = self.current_section().name.clone();

        if remaining == 0 {
            self.pause_allowed.set(false);
            self.state = CountdownState::SectionComplete;
            tracing::debug!(section = %name, lap = self.lap, "section complete");
            return vec![
                Effect::EndCue,
                Effect::Remaining(Duration::ZERO),
                Effect::Message(format!("Section {name} is over")),
                Effect::TotalRemaining(secs(self.total_remaining)),
            ];
        }

        let mut effects = vec![Effect::Remaining(secs(remaining))];
        if (1..=self.options.warning_window_secs).contains(&remaining) {
            effects.push(Effect::WarningCue);
            effects.push(Effect::Message(seconds_left(&name, remaining)));
        }
        effects.push(Effect::TotalRemaining(secs(self.total_remaining)));

        if self.total_remaining <= self.options.pause_lockout_secs {
            self.pause_allowed.set(false);
        }
        effects
    }

    /// Leave `SectionComplete`: next section, restart for a looping
    /// document, or `Finished`. A finished run emits nothing more.
    pub fn advance(&mut self) -> Vec<Effect> {
        if self.state != CountdownState::SectionComplete {
            return Vec::new();
        }

        let next = self.section_index + 1;
        if next < self.document.sections().len() {
            return self.enter_section(next);
        }

        if !self.document.looping() {
            self.state = CountdownState::Finished;
            self.pause_allowed.set(false);
            tracing::debug!("countdown finished");
            return Vec::new();
        }

        self.lap += 1;
        self.total_remaining = self.document.total_ticks();
        tracing::debug!(lap = self.lap, "restarting looped document");
        let mut effects = vec![Effect::Message(format!(
            "Restarting from the top (lap {})",
            self.lap + 1
        ))];
        effects.extend(self.enter_section(0));
        effects.push(Effect::TotalRemaining(secs(self.total_remaining)));
        effects
    }

    /// Flip pause if the gate is open, otherwise do nothing.
    pub fn toggle_pause(&mut self) -> Vec<Effect> {
        if self.state != CountdownState::Running || !self.pause_allowed.get() {
            tracing::debug!(state = ?self.state, "pause request dropped");
            return Vec::new();
        }
        self.paused = !self.paused;
        let text = if self.paused {
            format!("Paused {} (press again to resume)", self.current_section().name)
        } else {
            format!("Resumed {}", self.current_section().name)
        };
        vec![Effect::Message(text)]
    }

    /// Stop the run from any state.
    pub fn cancel(&mut self) {
        self.state = CountdownState::Finished;
        self.paused = false;
        self.pause_allowed.set(false);
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn enter_section(&mut self, index: usize) -> Vec<Effect> {
        self.section_index = index;
        self.elapsed_in_section = 0;
        self.state = CountdownState::Running;
        self.pause_allowed
            .set(self.total_remaining > self.options.pause_lockout_secs);

        let section = self.current_section();
        tracing::debug!(section = %section.name, index, "section started");
        vec![
            Effect::Section(SectionInfo {
                name: section.name.clone(),
                duration: section.duration,
            }),
            Effect::Remaining(secs(section.ticks())),
            Effect::Message(format!(
                "Running section {} lasting {}",
                section.name,
                format_duration(section.duration)
            )),
        ]
    }
}

fn secs(ticks: u64) -> Duration {
    Duration::from_secs(ticks)
}

fn seconds_left(name: &str, remaining: u64) -> String {
    if remaining == 1 {
        format!("{name}: 1 second left")
    } else {
        format!("{name}: {remaining} seconds left")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn doc(looping: bool, sections: &[(&str, u64)]) -> Document {
        Document::new(
            looping,
            sections
                .iter()
                .map(|(name, s)| Section::new(*name, Duration::from_secs(*s)))
                .collect(),
        )
    }

    fn countdown(looping: bool, sections: &[(&str, u64)]) -> Countdown {
        Countdown::new(doc(looping, sections), CountdownOptions::default()).unwrap()
    }

    fn count(effects: &[Effect], wanted: &Effect) -> usize {
        effects.iter().filter(|e| *e == wanted).count()
    }

    #[test]
    fn empty_document_is_a_configuration_error() {
        let err = Countdown::new(doc(false, &[]), CountdownOptions::default()).unwrap_err();
        assert_eq!(err, ConfigError::NoSections);
    }

    #[test]
    fn zero_section_is_a_configuration_error() {
        let err = Countdown::new(doc(false, &[("a", 3), ("b", 0)]), CountdownOptions::default())
            .unwrap_err();
        assert_eq!(err, ConfigError::ZeroDuration { name: "b".into() });
    }

    #[test]
    fn start_publishes_document_then_first_section() {
        let mut c = countdown(false, &[("warmup", 5), ("work", 10)]);
        assert!(!c.pause_allowed());
        let effects = c.start();
        assert!(matches!(effects[0], Effect::Document(_)));
        assert_eq!(
            effects[1],
            Effect::Section(SectionInfo {
                name: "warmup".into(),
                duration: Duration::from_secs(5)
            })
        );
        assert_eq!(effects.last(), Some(&Effect::TotalRemaining(secs(15))));
        assert_eq!(c.state(), CountdownState::Running);
        assert!(c.pause_allowed());
        assert!(c.start().is_empty());
    }

    #[test]
    fn cue_policy_for_ten_second_section() {
        let mut c = countdown(false, &[("work", 10)]);
        c.start();
        let mut warnings_at = Vec::new();
        let mut ends_at = Vec::new();
        for _ in 0..10 {
            let effects = c.tick();
            if effects.contains(&Effect::WarningCue) {
                warnings_at.push(c.remaining_in_section());
            }
            if effects.contains(&Effect::EndCue) {
                ends_at.push(c.remaining_in_section());
            }
        }
        assert_eq!(warnings_at, vec![3, 2, 1]);
        assert_eq!(ends_at, vec![0]);
        assert_eq!(c.state(), CountdownState::SectionComplete);
    }

    #[test]
    fn paused_ticks_change_nothing() {
        let mut c = countdown(false, &[("work", 10)]);
        c.start();
        c.tick();
        c.tick();
        assert_eq!(c.toggle_pause().len(), 1);
        assert!(c.is_paused());
        for _ in 0..5 {
            assert!(c.tick().is_empty());
        }
        assert_eq!(c.elapsed_in_section(), 2);
        assert_eq!(c.total_remaining(), 8);

        c.toggle_pause();
        assert!(!c.is_paused());
        c.tick();
        assert_eq!(c.elapsed_in_section(), 3);
        assert_eq!(c.total_remaining(), 7);
    }

    #[test]
    fn pause_is_refused_in_closing_seconds() {
        let mut c = countdown(false, &[("work", 5)]);
        c.start();
        c.tick();
        assert!(c.pause_allowed());
        c.tick();
        assert_eq!(c.total_remaining(), 3);
        assert!(!c.pause_allowed());
        assert!(c.toggle_pause().is_empty());
        assert!(!c.is_paused());
    }

    #[test]
    fn short_final_section_never_allows_pause() {
        let mut c = countdown(false, &[("sprint", 3)]);
        c.start();
        assert!(!c.pause_allowed());
        assert!(c.toggle_pause().is_empty());
    }

    #[test]
    fn gate_closes_at_section_end_and_reopens_on_next_section() {
        let mut c = countdown(false, &[("a", 5), ("b", 10)]);
        c.start();
        for _ in 0..5 {
            c.tick();
        }
        assert_eq!(c.state(), CountdownState::SectionComplete);
        assert!(!c.pause_allowed());
        assert!(c.toggle_pause().is_empty());
        c.advance();
        assert_eq!(c.current_section().name, "b");
        assert!(c.pause_allowed());
    }

    #[test]
    fn loop_restarts_with_full_total() {
        let mut c = countdown(true, &[("a", 5), ("b", 5)]);
        c.start();
        for _ in 0..2 {
            for _ in 0..5 {
                c.tick();
            }
            c.advance();
        }
        assert_eq!(c.state(), CountdownState::Running);
        assert_eq!(c.section_index(), 0);
        assert_eq!(c.total_remaining(), 10);
        assert_eq!(c.lap(), 1);
        assert!(c.pause_allowed());
    }

    #[test]
    fn loop_restart_publishes_reset_total() {
        let mut c = countdown(true, &[("only", 4)]);
        c.start();
        for _ in 0..4 {
            c.tick();
        }
        let effects = c.advance();
        assert_eq!(effects.last(), Some(&Effect::TotalRemaining(secs(4))));
        assert!(effects.iter().any(|e| matches!(e, Effect::Section(s) if s.name == "only")));
    }

    #[test]
    fn non_loop_finishes_after_exact_ticks() {
        let mut c = countdown(false, &[("only", 3)]);
        c.start();
        let mut ticks = 0;
        while c.state() == CountdownState::Running {
            c.tick();
            ticks += 1;
        }
        assert_eq!(ticks, 3);
        assert!(c.advance().is_empty());
        assert_eq!(c.state(), CountdownState::Finished);
        assert!(c.tick().is_empty());
        assert!(c.advance().is_empty());
        assert!(c.toggle_pause().is_empty());
    }

    #[test]
    fn warmup_work_scenario() {
        let mut c = countdown(false, &[("warmup", 5), ("work", 10)]);
        let mut effects = c.start();
        while c.state() != CountdownState::Finished {
            effects.extend(c.tick());
            if c.state() == CountdownState::SectionComplete {
                effects.extend(c.advance());
            }
        }

        let sections: Vec<_> = effects
            .iter()
            .filter_map(|e| match e {
                Effect::Section(s) => Some(s.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(sections, vec!["warmup", "work"]);
        assert_eq!(count(&effects, &Effect::EndCue), 2);
        assert_eq!(count(&effects, &Effect::WarningCue), 6);

        let totals: Vec<u64> = effects
            .iter()
            .filter_map(|e| match e {
                Effect::TotalRemaining(d) => Some(d.as_secs()),
                _ => None,
            })
            .collect();
        assert_eq!(totals, (0..=15).rev().collect::<Vec<_>>());
    }

    #[test]
    fn pause_toggles_are_idempotent_in_pairs() {
        let mut c = countdown(false, &[("work", 20)]);
        c.start();
        for _ in 0..4 {
            c.tick();
        }
        let before = (c.elapsed_in_section(), c.total_remaining(), c.is_paused());
        c.toggle_pause();
        c.tick();
        c.toggle_pause();
        assert_eq!(
            (c.elapsed_in_section(), c.total_remaining(), c.is_paused()),
            before
        );
    }

    #[test]
    fn cancel_closes_gate() {
        let mut c = countdown(false, &[("work", 20)]);
        c.start();
        c.toggle_pause();
        c.cancel();
        assert_eq!(c.state(), CountdownState::Finished);
        assert!(!c.pause_allowed());
        assert!(!c.is_paused());
    }

    #[test]
    fn custom_warning_window() {
        let options = CountdownOptions {
            warning_window_secs: 5,
            pause_lockout_secs: 0,
        };
        let mut c = Countdown::new(doc(false, &[("long", 10)]), options).unwrap();
        c.start();
        let mut warnings = 0;
        for _ in 0..10 {
            warnings += count(&c.tick(), &Effect::WarningCue);
        }
        assert_eq!(warnings, 5);
    }

    #[test]
    fn snapshot_reflects_counters() {
        let mut c = countdown(false, &[("work", 10)]);
        c.start();
        c.tick();
        let snap = c.snapshot();
        assert_eq!(snap.state, CountdownState::Running);
        assert_eq!(snap.section_name, "work");
        assert_eq!(snap.elapsed_in_section_secs, 1);
        assert_eq!(snap.remaining_in_section_secs, 9);
        assert_eq!(snap.total_remaining_secs, 9);
        assert!(snap.pause_allowed);
    }

    proptest! {
        #[test]
        fn counters_never_drift(
            lengths in prop::collection::vec(1u64..12, 1..5),
            presses in prop::collection::vec(any::<bool>(), 0..200),
        ) {
            let sections: Vec<_> = lengths
                .iter()
                .enumerate()
                .map(|(i, s)| Section::new(format!("s{i}"), Duration::from_secs(*s)))
                .collect();
            let document = Document::new(false, sections);
            let mut c = Countdown::new(document, CountdownOptions::default()).unwrap();
            c.start();

            let mut presses = presses.into_iter();
            let mut ends = 0;
            let mut guard = 0;
            while c.state() != CountdownState::Finished {
                guard += 1;
                prop_assert!(guard < 10_000);

                // Once the presses run out, resume so the run can finish.
                if presses.next().unwrap_or(c.is_paused()) {
                    let gate = c.pause_allowed();
                    let was = c.is_paused();
                    c.toggle_pause();
                    prop_assert_eq!(c.is_paused(), if gate { !was } else { was });
                }

                let paused = c.is_paused();
                let (elapsed, left) = (c.elapsed_in_section(), c.total_remaining());
                let effects = c.tick();
                ends += count(&effects, &Effect::EndCue);

                if paused {
                    prop_assert!(effects.is_empty());
                    prop_assert_eq!(c.elapsed_in_section(), elapsed);
                    prop_assert_eq!(c.total_remaining(), left);
                } else {
                    prop_assert_eq!(c.total_remaining(), left - 1);
                }
                prop_assert_eq!(
                    c.remaining_in_section(),
                    c.current_section().ticks() - c.elapsed_in_section()
                );
                if c.total_remaining() <= 3 {
                    prop_assert!(!c.pause_allowed());
                }

                if c.state() == CountdownState::SectionComplete {
                    c.advance();
                }
            }
            prop_assert_eq!(ends, lengths.len());
            prop_assert_eq!(c.total_remaining(), 0);
        }
    }
}
