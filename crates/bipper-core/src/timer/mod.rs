mod clock;
mod countdown;
mod engine;

pub use clock::{Clock, ManualTicker};
pub use countdown::{Countdown, CountdownOptions, CountdownSnapshot, CountdownState, Effect};
pub use engine::{CountdownEngine, EngineOptions, RunOutcome, IDLE_MESSAGE};
