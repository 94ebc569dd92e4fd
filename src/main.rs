mod aggregate;
mod cli;
mod error;
mod filter;
mod fmt;
mod loader;
mod logging;
mod models;
mod settings;
mod tui;

use clap::{CommandFactory, Parser};

use cli::{Cli, Commands, ReportCommands};

fn main() {
    let cli = Cli::parse();

    // The dashboard owns the terminal, so its logs go to a file.
    let guard = match cli.command {
        None | Some(Commands::Dashboard) => logging::init_file(&settings::log_path()),
        Some(_) => {
            logging::init_stderr();
            None
        }
    };

    let result = match cli.command {
        None | Some(Commands::Dashboard) => cli::dashboard::run(&cli.source.resolve_saved()),
        Some(Commands::Report { command }) => {
            let source = cli.source.resolve_saved();
            match command {
                ReportCommands::Timeline {
                    filters,
                    interval,
                    json,
                } => cli::report::timeline(&source, &filters, interval, json),
                ReportCommands::Weekday { filters, day, json } => {
                    cli::report::weekday(&source, &filters, &day, json)
                }
            }
        }
        Some(Commands::Status) => cli::status::run(&cli.source.resolve_saved()),
        Some(Commands::Options { brand }) => {
            cli::options::run(&cli.source.resolve_saved(), brand.as_deref())
        }
        Some(Commands::Init { path, interval }) => cli::init::run(&path, interval, &cli.source),
        Some(Commands::Completions { shell }) => {
            clap_complete::generate(shell, &mut Cli::command(), "paylens", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        tracing::error!(error = %e, "command failed");
        eprintln!("Error: {e}");
        // `exit` skips destructors; flush the log writer first.
        drop(guard);
        std::process::exit(1);
    }
}
