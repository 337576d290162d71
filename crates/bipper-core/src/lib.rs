//! # Bipper Core Library
//!
//! This library provides the interval countdown behind the `bipper` CLI: it
//! plays an ordered list of named, timed sections, optionally looping,
//! beeping near the end of each section and again when it is over.
//!
//! ## Architecture
//!
//! - **Countdown**: A pure state machine. Every transition returns the
//!   effects (port publishes, cue fires) the caller must perform
//! - **Countdown engine**: An async tick loop that feeds the state machine
//!   one tick per second, publishes on the output ports and services pause
//!   requests and cancellation
//! - **Documents**: TOML, YAML or JSON description of the sections to play
//! - **Cues**: Fire-and-forget audio cue ports
//!
//! ## Key Components
//!
//! - [`CountdownEngine`]: Runs one countdown
//! - [`Observer`]: Receiving end of the engine's ports
//! - [`Document`]: Parsed list of sections
//! - [`Config`]: Application configuration management

pub mod cue;
pub mod document;
pub mod error;
pub mod ports;
pub mod storage;
pub mod sync;
pub mod timer;

pub use cue::{CueDispatcher, CuePlayer, CuePort, SilentCue};
pub use document::{Document, Section};
pub use error::{ConfigError, CoreError, CueError, DocumentLoadError};
pub use ports::{Observer, PauseHandle, PauseRequest, SectionInfo, Update};
pub use storage::Config;
pub use sync::AtomicFlag;
pub use timer::{Countdown, CountdownEngine, CountdownState, EngineOptions, RunOutcome};
