//! Timer engine: the Idle → Preparing → Running → Finished state machine.
//!
//! Each run is driven by a spawned task that walks the phases with
//! [`clock::run_until`]. Observable state lives in a `watch` channel; every
//! `start`/`stop` bumps [`EngineState::generation`]. A tick writes state
//! only if its generation still matches, checked atomically with the write.
//! Cues are re-checked against the generation just before they play, so a
//! `stop` racing a tick on another worker can at most let a cue that was
//! already being handed to the player through.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::{self, Clock, LoopOutcome};
use crate::config::TimingConfig;
use crate::cue::{Cue, CuePlayer, CueTracker};
use crate::error::TimerError;

pub const STATUS_IDLE: &str = "Tap numbers to edit";
pub const STATUS_PREPARING: &str = "GET READY...";
pub const STATUS_RUNNING: &str = "GO!";
pub const STATUS_FINISHED: &str = "TIME'S UP!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Preparing,
    Running,
    Finished,
}

impl Phase {
    #[must_use]
    pub const fn status_text(self) -> &'static str {
        match self {
            Self::Idle => STATUS_IDLE,
            Self::Preparing => STATUS_PREPARING,
            Self::Running => STATUS_RUNNING,
            Self::Finished => STATUS_FINISHED,
        }
    }

    /// Whether a clock loop is active in this phase.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Preparing | Self::Running)
    }
}

/// Snapshot of everything a consumer may observe.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineState {
    pub phase: Phase,
    /// Milliseconds left in the active phase, or the main duration when idle.
    pub time_remaining_ms: u64,
    pub status_text: &'static str,
    /// Main duration of the current (or last) run.
    pub total_duration_ms: u64,
    pub prep_duration_ms: u64,
    /// Bumped by every `start` and `stop`.
    pub generation: u64,
}

impl EngineState {
    fn idle(total_duration_ms: u64, prep_duration_ms: u64) -> Self {
        Self {
            phase: Phase::Idle,
            time_remaining_ms: total_duration_ms,
            status_text: STATUS_IDLE,
            total_duration_ms,
            prep_duration_ms,
            generation: 0,
        }
    }

    /// Fraction of the active phase still to go, `1.0` outside a run.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn progress(&self) -> f64 {
        let whole = match self.phase {
            Phase::Preparing => self.prep_duration_ms,
            Phase::Running => self.total_duration_ms,
            Phase::Idle | Phase::Finished => return 1.0,
        };
        if whole == 0 {
            return 0.0;
        }
        (self.time_remaining_ms as f64 / whole as f64).clamp(0.0, 1.0)
    }
}

struct Inner<C, P> {
    clock: C,
    player: P,
    timing: TimingConfig,
    state: watch::Sender<EngineState>,
}

struct ActiveRun {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Countdown engine owning at most one run at a time.
pub struct TimerEngine<C: Clock, P: CuePlayer> {
    inner: Arc<Inner<C, P>>,
    run: Option<ActiveRun>,
}

/// Main duration shown before the first run, the one-minute default.
const INITIAL_DURATION_MS: u64 = 60_000;

impl<C: Clock, P: CuePlayer> TimerEngine<C, P> {
    #[must_use]
    pub fn new(clock: C, player: P, timing: TimingConfig) -> Self {
        let (state, _) = watch::channel(EngineState::idle(INITIAL_DURATION_MS, timing.prep_ms));
        Self {
            inner: Arc::new(Inner {
                clock,
                player,
                timing,
                state,
            }),
            run: None,
        }
    }

    /// Starts a new run of `minutes:seconds`, superseding any run in flight.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::InvalidDuration`] if the total is zero; the
    /// engine state is left exactly as it was.
    pub fn start(&mut self, minutes: u32, seconds: u32) -> Result<(), TimerError> {
        let total_ms = (u64::from(minutes) * 60 + u64::from(seconds)) * 1000;
        if total_ms == 0 {
            debug!(minutes, seconds, "rejecting zero-length run");
            return Err(TimerError::InvalidDuration { minutes, seconds });
        }

        self.cancel_run();

        let prep_ms = self.inner.timing.prep_ms;
        let mut generation = 0;
        self.inner.state.send_modify(|s| {
            s.generation += 1;
            generation = s.generation;
            s.phase = Phase::Preparing;
            s.status_text = STATUS_PREPARING;
            s.time_remaining_ms = prep_ms;
            s.total_duration_ms = total_ms;
            s.prep_duration_ms = prep_ms;
        });
        info!(generation, total_ms, "run started");

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(drive(
            Arc::clone(&self.inner),
            generation,
            total_ms,
            cancel.clone(),
        ));
        self.run = Some(ActiveRun { cancel, handle });
        Ok(())
    }

    /// Cancels an active run and returns to Idle, discarding progress.
    ///
    /// Does nothing while Idle or Finished.
    pub fn stop(&mut self) {
        if !self.inner.state.borrow().phase.is_active() {
            return;
        }
        self.cancel_run();
        self.enter_idle();
        info!("run stopped");
    }

    /// Returns to Idle from any phase, including Finished.
    pub fn reset(&mut self) {
        if self.inner.state.borrow().phase == Phase::Idle {
            return;
        }
        self.cancel_run();
        self.enter_idle();
        debug!("engine reset");
    }

    #[must_use]
    pub fn snapshot(&self) -> EngineState {
        self.inner.state.borrow().clone()
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.inner.state.subscribe()
    }

    fn enter_idle(&self) {
        self.inner.state.send_modify(|s| {
            s.generation += 1;
            s.phase = Phase::Idle;
            s.status_text = STATUS_IDLE;
            s.time_remaining_ms = s.total_duration_ms;
        });
    }

    fn cancel_run(&mut self) {
        if let Some(run) = self.run.take() {
            run.cancel.cancel();
            // The task exits at its next poll; nothing needs to wait on it.
            drop(run.handle);
        }
    }
}

impl<C: Clock, P: CuePlayer> Drop for TimerEngine<C, P> {
    fn drop(&mut self) {
        self.cancel_run();
    }
}

impl<C: Clock, P: CuePlayer> Inner<C, P> {
    /// Publishes `remaining` if `generation` is still current.
    fn publish_remaining(&self, generation: u64, remaining: u64) -> bool {
        let mut current = false;
        self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            current = true;
            // Clamp so a late sample can never move the countdown backwards.
            let next = remaining.min(s.time_remaining_ms);
            let changed = next != s.time_remaining_ms;
            s.time_remaining_ms = next;
            changed
        });
        current
    }

    /// Moves to `phase` with `remaining` on the clock if `generation` is
    /// still current.
    fn enter(&self, generation: u64, phase: Phase, remaining: u64) -> bool {
        self.state.send_if_modified(|s| {
            if s.generation != generation {
                return false;
            }
            let from = s.phase;
            s.phase = phase;
            s.status_text = phase.status_text();
            s.time_remaining_ms = remaining;
            info!(generation, ?from, to = ?phase, "phase transition");
            true
        })
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state.borrow().generation == generation
    }

    /// Plays `cue` unless a `start` or `stop` has superseded `generation`.
    fn play_if_current(&self, generation: u64, cue: Cue) -> bool {
        if !self.is_current(generation) {
            debug!(generation, cue = cue.as_str(), "dropping cue of superseded run");
            return false;
        }
        cue.play(&self.player);
        true
    }

    fn tick(&self, generation: u64, cues: &mut CueTracker, remaining: u64) {
        if !self.publish_remaining(generation, remaining) {
            return;
        }
        for cue in cues.due(remaining) {
            if self.play_if_current(generation, cue) {
                debug!(generation, cue = cue.as_str(), remaining, "cue fired");
            }
        }
    }

    async fn run_phase(
        &self,
        generation: u64,
        length_ms: u64,
        mut cues: CueTracker,
        cancel: &CancellationToken,
    ) -> LoopOutcome {
        let deadline = self.clock.now_ms().saturating_add(length_ms);
        clock::run_until(
            &self.clock,
            deadline,
            self.timing.poll_interval(),
            cancel,
            |remaining| self.tick(generation, &mut cues, remaining),
        )
        .await
    }
}

async fn drive<C: Clock, P: CuePlayer>(
    inner: Arc<Inner<C, P>>,
    generation: u64,
    total_ms: u64,
    cancel: CancellationToken,
) {
    let timing = inner.timing;

    let prep_cues = CueTracker::new(timing.primary_cue_ms, None);
    if inner
        .run_phase(generation, timing.prep_ms, prep_cues, &cancel)
        .await
        == LoopOutcome::Cancelled
    {
        debug!(generation, "run cancelled while preparing");
        return;
    }

    if !inner.enter(generation, Phase::Running, total_ms) {
        return;
    }
    let main_cues = CueTracker::new(timing.primary_cue_ms, timing.warning_cue_secs);
    if inner
        .run_phase(generation, total_ms, main_cues, &cancel)
        .await
        == LoopOutcome::Cancelled
    {
        debug!(generation, "run cancelled while running");
        return;
    }

    inner.enter(generation, Phase::Finished, 0);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::clock::MonotonicClock;
    use crate::cue::NullPlayer;

    fn engine() -> TimerEngine<MonotonicClock, NullPlayer> {
        TimerEngine::new(MonotonicClock::new(), NullPlayer, TimingConfig::default())
    }

    #[test]
    fn phase_status_text() {
        assert_eq!(Phase::Idle.status_text(), "Tap numbers to edit");
        assert_eq!(Phase::Preparing.status_text(), "GET READY...");
        assert_eq!(Phase::Running.status_text(), "GO!");
        assert_eq!(Phase::Finished.status_text(), "TIME'S UP!");
    }

    #[test]
    fn progress_per_phase() {
        let mut s = EngineState::idle(60_000, 5_000);
        assert!((s.progress() - 1.0).abs() < f64::EPSILON);

        s.phase = Phase::Preparing;
        s.time_remaining_ms = 2_500;
        assert!((s.progress() - 0.5).abs() < f64::EPSILON);

        s.phase = Phase::Running;
        s.time_remaining_ms = 15_000;
        assert!((s.progress() - 0.25).abs() < f64::EPSILON);

        s.phase = Phase::Finished;
        s.time_remaining_ms = 0;
        assert!((s.progress() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn new_engine_is_idle() {
        let s = engine().snapshot();
        assert_eq!(s.phase, Phase::Idle);
        assert_eq!(s.status_text, STATUS_IDLE);
        assert_eq!(s.time_remaining_ms, s.total_duration_ms);
        assert_eq!(s.generation, 0);
    }

    #[test]
    fn zero_duration_is_rejected_without_state_change() {
        let mut engine = engine();
        let before = engine.snapshot();

        let err = engine.start(0, 0).unwrap_err();

        assert_eq!(
            err,
            TimerError::InvalidDuration {
                minutes: 0,
                seconds: 0
            }
        );
        assert_eq!(engine.snapshot(), before);
    }

    #[test]
    fn stop_and_reset_while_idle_are_noops() {
        let mut engine = engine();
        let before = engine.snapshot();
        engine.stop();
        engine.reset();
        assert_eq!(engine.snapshot(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn start_enters_preparing_immediately() {
        let mut engine = engine();
        engine.start(0, 45).unwrap();

        let s = engine.snapshot();
        assert_eq!(s.phase, Phase::Preparing);
        assert_eq!(s.status_text, STATUS_PREPARING);
        assert_eq!(s.time_remaining_ms, 5_000);
        assert_eq!(s.total_duration_ms, 45_000);
        assert_eq!(s.generation, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_generation_cannot_write() {
        let engine = engine();
        let inner = &engine.inner;
        assert!(!inner.publish_remaining(7, 10));
        assert!(!inner.enter(7, Phase::Finished, 0));
        assert_eq!(engine.snapshot().phase, Phase::Idle);
    }

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl CuePlayer for Counting {
        fn play_primary(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }

        fn play_secondary(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cues_of_a_stopped_run_are_dropped() {
        let player = Arc::new(Counting::default());
        let mut engine = TimerEngine::new(
            MonotonicClock::new(),
            Arc::clone(&player),
            TimingConfig::default(),
        );
        engine.start(0, 10).unwrap();
        let generation = engine.snapshot().generation;

        assert!(engine.inner.play_if_current(generation, Cue::Primary));
        assert_eq!(player.0.load(Ordering::SeqCst), 1);

        engine.stop();
        assert!(!engine.inner.play_if_current(generation, Cue::Primary));
        assert!(!engine.inner.play_if_current(generation, Cue::Warning));
        let mut cues = CueTracker::new(4_000, Some(3));
        engine.inner.tick(generation, &mut cues, 3_500);
        assert_eq!(player.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_finished_is_noop_but_reset_is_not() {
        let mut engine = TimerEngine::new(
            MonotonicClock::new(),
            NullPlayer,
            TimingConfig {
                prep_ms: 100,
                ..TimingConfig::default()
            },
        );
        let mut rx = engine.subscribe();
        engine.start(0, 1).unwrap();
        rx.wait_for(|s| s.phase == Phase::Finished).await.unwrap();

        engine.stop();
        let s = engine.snapshot();
        assert_eq!(s.phase, Phase::Finished);
        assert_eq!(s.time_remaining_ms, 0);

        engine.reset();
        let s = engine.snapshot();
        assert_eq!(s.phase, Phase::Idle);
        assert_eq!(s.status_text, STATUS_IDLE);
        assert_eq!(s.time_remaining_ms, 1_000);
    }
}
