//! Audio cues: when they are due, and how they are played.

use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::process::{Child, Command};

use tracing::{debug, warn};

use crate::config::Hooks;

/// The two sounds the engine can ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cue {
    /// Final countdown, played shortly before a phase ends.
    Primary,
    /// Warning, played once when the main phase hits the warning mark.
    Warning,
}

impl Cue {
    /// Dispatches this cue to the matching player operation.
    pub fn play<P: CuePlayer + ?Sized>(self, player: &P) {
        match self {
            Self::Primary => player.play_primary(),
            Self::Warning => player.play_secondary(),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Warning => "warning",
        }
    }
}

/// Sink for cue playback.
///
/// Calls are fire-and-forget: implementations restart a cue that is still
/// playing instead of queueing it, and swallow their own failures.
pub trait CuePlayer: Send + Sync + 'static {
    fn play_primary(&self);
    fn play_secondary(&self);
}

impl<P: CuePlayer> CuePlayer for Arc<P> {
    fn play_primary(&self) {
        (**self).play_primary();
    }

    fn play_secondary(&self) {
        (**self).play_secondary();
    }
}

impl CuePlayer for Box<dyn CuePlayer> {
    fn play_primary(&self) {
        (**self).play_primary();
    }

    fn play_secondary(&self) {
        (**self).play_secondary();
    }
}

/// Player that ignores every cue (`--no-sound`).
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPlayer;

impl CuePlayer for NullPlayer {
    fn play_primary(&self) {}
    fn play_secondary(&self) {}
}

/// One-shot cue flags for a single phase.
///
/// A fresh tracker is created on every phase entry, which is what resets the
/// flags between phases and between runs.
#[derive(Debug, Clone)]
pub struct CueTracker {
    primary_at_ms: u64,
    warning_at_secs: Option<u64>,
    primary_fired: bool,
    warning_fired: bool,
}

impl CueTracker {
    /// Tracker firing the primary cue at `primary_at_ms` remaining and, if
    /// given, the warning cue when the whole seconds left equal
    /// `warning_at_secs`.
    #[must_use]
    pub const fn new(primary_at_ms: u64, warning_at_secs: Option<u64>) -> Self {
        Self {
            primary_at_ms,
            warning_at_secs,
            primary_fired: false,
            warning_fired: false,
        }
    }

    /// Returns the cues that become due at `remaining_ms` and marks them fired.
    ///
    /// Both cues are independent: if both thresholds are crossed by the same
    /// sample, both are returned, warning first.
    pub fn due(&mut self, remaining_ms: u64) -> impl Iterator<Item = Cue> + use<> {
        let warning = match self.warning_at_secs {
            Some(secs) if !self.warning_fired && remaining_ms / 1000 == secs => {
                self.warning_fired = true;
                Some(Cue::Warning)
            }
            _ => None,
        };

        let primary = if !self.primary_fired && remaining_ms <= self.primary_at_ms {
            self.primary_fired = true;
            Some(Cue::Primary)
        } else {
            None
        };

        [warning, primary].into_iter().flatten()
    }
}

const MACOS_SOUNDS: [&str; 2] = [
    "/System/Library/Sounds/Glass.aiff",
    "/System/Library/Sounds/Pop.aiff",
];

const LINUX_SOUNDS: [&str; 2] = [
    "/usr/share/sounds/alsa/Front_Left.wav",
    "/usr/share/sounds/sound-icons/bell.wav",
];

/// Plays cues through configured shell hooks, falling back to a system
/// sound and finally the terminal bell.
///
/// Each cue runs in its own process group, so replaying a cue stops
/// everything the previous hook started. Children are never waited on;
/// dropping the player leaves running cues to finish and the runtime
/// reaps them. Must be used from within a Tokio runtime.
#[derive(Debug)]
pub struct HookPlayer {
    hooks: Hooks,
    primary: Mutex<Option<Child>>,
    warning: Mutex<Option<Child>>,
}

impl HookPlayer {
    #[must_use]
    pub const fn new(hooks: Hooks) -> Self {
        Self {
            hooks,
            primary: Mutex::new(None),
            warning: Mutex::new(None),
        }
    }

    fn play(&self, cue: Cue) {
        let (hook, slot) = match cue {
            Cue::Primary => (self.hooks.primary_cue.as_deref(), &self.primary),
            Cue::Warning => (self.hooks.warning_cue.as_deref(), &self.warning),
        };

        let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = slot.take() {
            // Restart from the beginning rather than overlapping.
            stop_cue(cue, previous);
        }

        let command = match hook.map(str::trim) {
            Some(cmd) if cmd.starts_with('#') => {
                debug!(cue = cue.as_str(), "hook is commented out");
                return;
            }
            Some("") | None => system_sound_command(cue),
            Some(cmd) => Some(shell_command(cmd)),
        };

        let Some(mut command) = command else {
            ring_bell();
            return;
        };

        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        command.process_group(0);

        match command.spawn() {
            Ok(child) => *slot = Some(child),
            Err(e) => {
                warn!(cue = cue.as_str(), error = %e, "failed to play cue");
                ring_bell();
            }
        }
    }
}

impl CuePlayer for HookPlayer {
    fn play_primary(&self) {
        self.play(Cue::Primary);
    }

    fn play_secondary(&self) {
        self.play(Cue::Warning);
    }
}

/// Kills a still-running cue without waiting for it to exit.
fn stop_cue(cue: Cue, mut child: Child) {
    let Some(pid) = child.id() else {
        // Already exited and reaped.
        return;
    };

    #[cfg(unix)]
    {
        // The hook leads its own group; signal every process in it.
        let killed = Command::new("kill")
            .args(["-s", "KILL", "--", &format!("-{pid}")])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        if let Err(e) = killed {
            debug!(cue = cue.as_str(), error = %e, "failed to signal cue group");
        }
    }

    if let Err(e) = child.start_kill() {
        debug!(cue = cue.as_str(), pid, error = %e, "failed to stop cue");
    }
}

fn shell_command(cmd: &str) -> Command {
    let mut command = Command::new("sh");
    command.arg("-c").arg(cmd);
    command
}

fn system_sound_command(cue: Cue) -> Option<Command> {
    let index = match cue {
        Cue::Primary => 0,
        Cue::Warning => 1,
    };

    let (program, path) = if cfg!(target_os = "macos") {
        ("afplay", MACOS_SOUNDS[index])
    } else if cfg!(target_os = "linux") {
        ("paplay", LINUX_SOUNDS[index])
    } else {
        return None;
    };

    if !Path::new(path).exists() {
        return None;
    }
    let mut command = Command::new(program);
    command.arg(path);
    Some(command)
}

fn ring_bell() {
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(b"\x07");
    let _ = stdout.flush();
}
