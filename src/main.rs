use anyhow::Result;
use clap::{Parser, error::ErrorKind};
use log::LevelFilter;
use std::{env, io::Write};

use embed_typescript::cli::{self, UsageError};
use embed_typescript::external;

fn main() -> Result<()> {
    let raw_args: Vec<String> = env::args().collect();
    let cli = parse_cli(raw_args).unwrap_or_else(|err| match err.kind() {
        ErrorKind::InvalidSubcommand | ErrorKind::UnknownArgument => {
            cli::halt(&UsageError::InvalidCommand.to_string(), 1)
        }
        _ => err.exit(),
    });

    let log_level_filter = cli.verbose.log_level_filter();

    env_logger::Builder::new()
        .format(|buf, record| writeln!(buf, "{}:\n{}", record.level(), record.args()))
        .filter_level(log_level_filter)
        .target(env_logger::fmt::Target::Stdout)
        .init();

    // The progress bar only shows at the default log level.
    let show_progress = log_level_filter == LevelFilter::Info;

    match cli.command {
        Some(cli::Command::Help) => cli::halt("List of embed-typescript commands", 0),
        Some(cli::Command::External { input, output }) => {
            let args = match cli::validate_external(input.as_deref(), output.as_deref()) {
                Ok(args) => args,
                Err(error) => cli::halt(&error.to_string(), 1),
            };
            match external::execute(&args.input, &args.output, show_progress) {
                Err(e) => {
                    println!("{e:?}");
                    std::process::exit(1)
                }
                Ok(_) => std::process::exit(0),
            }
        }
        None => cli::halt(&UsageError::InvalidCommand.to_string(), 1),
    }
}

fn parse_cli(raw_args: Vec<String>) -> Result<cli::Cli, clap::Error> {
    cli::Cli::try_parse_from(&raw_args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<cli::Cli, clap::Error> {
        parse_cli(args.iter().map(|arg| arg.to_string()).collect())
    }

    #[test]
    fn no_command_parses_to_none() {
        let cli = parse(&["embed-typescript"]).expect("expected empty command");
        assert!(cli.command.is_none());
    }

    #[test]
    fn unknown_commands_are_rejected() {
        let err = parse(&["embed-typescript", "build"]).expect_err("expected invalid subcommand");
        assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
    }

    #[test]
    fn version_flag_is_handled_by_clap() {
        let err = parse(&["embed-typescript", "--version"]).expect_err("expected clap version error");
        assert_eq!(err.kind(), ErrorKind::DisplayVersion);
    }
}
