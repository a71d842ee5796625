//! Interval workout countdown timer.
//!
//! A [`timer::TimerEngine`] runs a fixed preparation countdown followed by
//! the main countdown, firing audio cues through a [`cue::CuePlayer`] at
//! fixed offsets from the end of each phase.

pub mod cli;
pub mod clock;
pub mod config;
pub mod cue;
pub mod display;
pub mod error;
pub mod input;
pub mod logging;
pub mod timer;

pub use clock::{Clock, LoopOutcome, MonotonicClock, SystemClock};
pub use config::{Config, TimingConfig};
pub use cue::{Cue, CuePlayer, HookPlayer, NullPlayer};
pub use error::{AppError, TimerError};
pub use timer::{EngineState, Phase, TimerEngine};
