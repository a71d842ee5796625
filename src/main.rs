//! `workout-timer` — interval workout countdown timer

use clap::Parser;

use workout_timer::cli::{self, Cli};
use workout_timer::logging::init_logging;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.verbose);

    match cli::dispatch(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
