//! Command-line interface: argument definitions and command handlers.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::clock::{Clock, MonotonicClock};
use crate::config::{self, Config};
use crate::cue::{CuePlayer, HookPlayer, NullPlayer};
use crate::display::{clock_digits, render_line};
use crate::error::{AppError, ConfigError, ExitCode};
use crate::input::{format_duration, parse_duration};
use crate::logging::LogFormat;
use crate::timer::{Phase, TimerEngine};

/// Interval workout countdown timer with audio cues.
#[derive(Parser, Debug)]
#[command(name = "workout-timer", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Human, global = true)]
    pub log_format: LogFormat,

    /// Path to the JSON config file.
    #[arg(long = "config", id = "config_path", global = true, env = "WORKOUT_TIMER_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a countdown: 5 seconds to get ready, then the workout.
    Start(StartArgs),

    /// Show the config file location and effective settings.
    Config,
}

#[derive(Args, Debug)]
pub struct StartArgs {
    /// Duration such as 25m, 45s or 1m30s; a bare number means minutes.
    #[arg(conflicts_with_all = ["minutes", "seconds"])]
    pub duration: Option<String>,

    /// Minutes of the workout.
    #[arg(short, long)]
    pub minutes: Option<u32>,

    /// Seconds of the workout.
    #[arg(short, long)]
    pub seconds: Option<u32>,

    /// Do not play any cues.
    #[arg(long)]
    pub no_sound: bool,
}

impl StartArgs {
    /// Resolves the requested `(minutes, seconds)`, defaulting to one minute.
    ///
    /// # Errors
    ///
    /// Returns an error if the positional duration does not parse.
    pub fn duration(&self) -> Result<(u32, u32), AppError> {
        if let Some(text) = &self.duration {
            return Ok(parse_duration(text)?);
        }
        match (self.minutes, self.seconds) {
            (None, None) => Ok((1, 0)),
            (m, s) => Ok((m.unwrap_or(0), s.unwrap_or(0))),
        }
    }
}

/// Runs the selected command and returns the process exit code.
///
/// # Errors
///
/// Returns an [`AppError`] for invalid input, config, or I/O failures.
pub async fn dispatch(cli: Cli) -> Result<i32, AppError> {
    let config_path = cli.config.unwrap_or_else(config::default_config_path);
    match cli.command {
        Commands::Start(args) => {
            let config = config::load_config(&config_path)?;
            run_start(&args, config).await
        }
        Commands::Config => {
            let config = config::load_config(&config_path)?;
            show_config(&config_path, &config)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_start(args: &StartArgs, config: Config) -> Result<i32, AppError> {
    let (minutes, seconds) = args.duration()?;

    let player: Box<dyn CuePlayer> = if args.no_sound {
        Box::new(NullPlayer)
    } else {
        Box::new(HookPlayer::new(config.hooks))
    };
    let mut engine = TimerEngine::new(MonotonicClock::new(), player, config.timing);

    let interrupt = CancellationToken::new();
    let handler_token = interrupt.clone();
    ctrlc::set_handler(move || handler_token.cancel())?;

    run_countdown(&mut engine, minutes, seconds, &interrupt, &mut io::stdout()).await
}

/// Starts a run on `engine` and redraws it on `out` until it finishes or
/// `interrupt` is cancelled.
///
/// Returns [`ExitCode::SUCCESS`] when the run finishes and
/// [`ExitCode::INTERRUPTED`] after stopping it on interrupt.
///
/// # Errors
///
/// Returns an error if the duration is rejected or `out` cannot be written.
pub async fn run_countdown<C, P, W>(
    engine: &mut TimerEngine<C, P>,
    minutes: u32,
    seconds: u32,
    interrupt: &CancellationToken,
    out: &mut W,
) -> Result<i32, AppError>
where
    C: Clock,
    P: CuePlayer,
    W: Write,
{
    engine.start(minutes, seconds)?;
    info!(minutes, seconds, "workout started");
    writeln!(out, "🏋️  Starting {} workout...", format_duration(minutes, seconds))?;

    let mut rx = engine.subscribe();
    loop {
        let state = rx.borrow_and_update().clone();
        write!(out, "{}", render_line(&state))?;
        out.flush()?;

        if state.phase == Phase::Finished {
            writeln!(out)?;
            writeln!(out, "🔔 TIME'S UP! Workout complete.")?;
            return Ok(ExitCode::SUCCESS);
        }

        tokio::select! {
            () = interrupt.cancelled() => {
                engine.stop();
                let state = engine.snapshot();
                writeln!(out)?;
                writeln!(
                    out,
                    "🛑 Stopped. Reset to {} ({})",
                    clock_digits(state.time_remaining_ms),
                    state.status_text
                )?;
                return Ok(ExitCode::INTERRUPTED);
            }
            changed = rx.changed() => {
                if changed.is_err() {
                    return Ok(ExitCode::ERROR);
                }
            }
        }
    }
}

fn show_config(path: &std::path::Path, config: &Config) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(config).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    println!("Config file: {}", path.display());
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    fn start_args(cli: Cli) -> StartArgs {
        match cli.command {
            Commands::Start(args) => args,
            Commands::Config => panic!("expected start"),
        }
    }

    #[test]
    fn default_duration_is_one_minute() {
        let args = start_args(parse(&["workout-timer", "start"]));
        assert_eq!(args.duration().unwrap(), (1, 0));
    }

    #[test]
    fn positional_duration() {
        let args = start_args(parse(&["workout-timer", "start", "1m30s"]));
        assert_eq!(args.duration().unwrap(), (1, 30));
    }

    #[test]
    fn minute_and_second_flags() {
        let args = start_args(parse(&["workout-timer", "start", "-s", "35"]));
        assert_eq!(args.duration().unwrap(), (0, 35));

        let args = start_args(parse(&["workout-timer", "start", "-m", "2", "-s", "5"]));
        assert_eq!(args.duration().unwrap(), (2, 5));
    }

    #[test]
    fn positional_conflicts_with_flags() {
        assert!(Cli::try_parse_from(["workout-timer", "start", "5m", "-m", "2"]).is_err());
    }

    #[test]
    fn bad_duration_is_usage_error() {
        let args = start_args(parse(&["workout-timer", "start", "5h"]));
        let err = args.duration().unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::USAGE_ERROR);
    }

    #[test]
    fn global_flags() {
        let cli = parse(&[
            "workout-timer",
            "-vv",
            "--log-format",
            "json",
            "--config",
            "/tmp/wt.json",
            "config",
        ]);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.log_format, LogFormat::Json);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/wt.json")));
        assert!(matches!(cli.command, Commands::Config));
    }

    fn quiet_engine() -> TimerEngine<MonotonicClock, NullPlayer> {
        TimerEngine::new(
            MonotonicClock::new(),
            NullPlayer,
            crate::config::TimingConfig::default(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_runs_to_completion() {
        let mut engine = quiet_engine();
        let interrupt = CancellationToken::new();
        let mut out = Vec::new();

        let code = run_countdown(&mut engine, 0, 3, &interrupt, &mut out)
            .await
            .unwrap();

        assert_eq!(code, ExitCode::SUCCESS);
        assert_eq!(engine.snapshot().phase, Phase::Finished);
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("🏋️  Starting 3 seconds workout..."), "{out}");
        assert!(out.contains("GET READY..."));
        assert!(out.ends_with("🔔 TIME'S UP! Workout complete.\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn interrupt_stops_and_resets_the_run() {
        let mut engine = quiet_engine();
        let interrupt = CancellationToken::new();
        let trigger = interrupt.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_secs(7)).await;
            trigger.cancel();
        });
        let mut out = Vec::new();

        let code = run_countdown(&mut engine, 1, 0, &interrupt, &mut out)
            .await
            .unwrap();

        assert_eq!(code, ExitCode::INTERRUPTED);
        let s = engine.snapshot();
        assert_eq!(s.phase, Phase::Idle);
        assert_eq!(s.time_remaining_ms, 60_000);
        let out = String::from_utf8(out).unwrap();
        assert!(out.contains("GO!"));
        assert!(
            out.ends_with(&format!("🛑 Stopped. Reset to 01:00 ({})\n", s.status_text)),
            "{out}"
        );
        assert!(!out.contains("TIME'S UP! Workout complete."));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_length_countdown_is_rejected() {
        let mut engine = quiet_engine();
        let interrupt = CancellationToken::new();
        let mut out = Vec::new();

        let err = run_countdown(&mut engine, 0, 0, &interrupt, &mut out)
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), ExitCode::USAGE_ERROR);
        assert!(out.is_empty());
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
