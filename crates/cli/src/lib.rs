pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use voyage_core::config::LoadOptions;

#[derive(Debug, Parser)]
#[command(
    name = "voyage",
    about = "Voyage marketplace operator CLI",
    long_about = "Apply migrations, inspect configuration, check readiness, seed the demo \
                  catalog, and run the offer/booking sweeps once.",
    after_help = "Examples:\n  voyage doctor --json\n  voyage --config ops/voyage.toml migrate\n  \
                  voyage sweep"
)]
pub struct Cli {
    /// Explicit config file; when it is given it must exist.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and report the outcome as JSON")]
    Migrate,
    #[command(about = "Load the demo hotel catalog and verify it")]
    Seed,
    #[command(about = "Expire lapsed offers and complete finished bookings once")]
    Sweep,
    #[command(about = "Print effective configuration values and where each one came from")]
    Config,
    #[command(about = "Check config, database connectivity and schema version")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            require_file: self.config.is_some(),
            config_path: self.config.clone(),
            ..LoadOptions::default()
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    let (exit_code, output) = match cli.command {
        Command::Migrate => commands::migrate::run(&options).into_parts(),
        Command::Seed => commands::seed::run(&options).into_parts(),
        Command::Sweep => commands::sweep::run(&options).into_parts(),
        Command::Config => (0, commands::config::run(&options)),
        Command::Doctor { json } => (0, commands::doctor::run(&options, json)),
    };

    println!("{output}");
    ExitCode::from(exit_code)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::Parser;

    use super::Cli;

    #[test]
    fn explicit_config_path_becomes_required() {
        let cli = Cli::try_parse_from(["voyage", "sweep", "--config", "ops/voyage.toml"])
            .expect("parse");
        let options = cli.load_options();
        assert!(options.require_file);
        assert_eq!(options.config_path, Some(PathBuf::from("ops/voyage.toml")));

        let cli = Cli::try_parse_from(["voyage", "doctor", "--json"]).expect("parse");
        assert!(!cli.load_options().require_file);
    }
}
