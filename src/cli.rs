use crate::external::PACKAGE_LOCK;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::InfoLevel;
use console::style;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Snapshot npm dependencies for the in-memory TypeScript compiler.
#[derive(Parser, Debug)]
#[command(version, disable_help_subcommand = true)]
pub struct Cli {
    /// Verbosity:
    /// -v -> Debug
    /// -vv -> Trace
    /// -q -> Warn
    /// -qq -> Error
    /// -qqq -> Off.
    /// Default (/ no argument given): 'info'
    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<InfoLevel>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List the available commands.
    Help,
    /// Collect the declaration files of installed packages into a JSON snapshot.
    External {
        /// Directory holding `node_modules` and `package-lock.json`, installed with npm.
        #[arg(long)]
        input: Option<String>,

        /// JSON file to generate.
        #[arg(long)]
        output: Option<String>,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UsageError {
    #[error("Wrong command detected")]
    WrongCommand,
    #[error("Output file must be a json file")]
    OutputNotJson,
    #[error("Input directory not found")]
    InputNotFound,
    #[error("Input is not a directory")]
    InputNotDirectory,
    #[error("node_modules not found in input directory")]
    MissingNodeModules,
    #[error("package-lock.json not found in input directory")]
    MissingPackageLock,
    #[error("Invalid command")]
    InvalidCommand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalArgs {
    pub input: PathBuf,
    pub output: PathBuf,
}

/// Checks the `external` arguments in order, reporting the first problem.
pub fn validate_external(input: Option<&str>, output: Option<&str>) -> Result<ExternalArgs, UsageError> {
    let (Some(input), Some(output)) = (input, output) else {
        return Err(UsageError::WrongCommand);
    };
    if !output.ends_with(".json") {
        return Err(UsageError::OutputNotJson);
    }
    let input = Path::new(input);
    if !input.exists() {
        return Err(UsageError::InputNotFound);
    }
    if !input.is_dir() {
        return Err(UsageError::InputNotDirectory);
    }
    if !input.join("node_modules").exists() {
        return Err(UsageError::MissingNodeModules);
    }
    if !input.join(PACKAGE_LOCK).exists() {
        return Err(UsageError::MissingPackageLock);
    }
    Ok(ExternalArgs {
        input: absolute(input),
        output: absolute(Path::new(output)),
    })
}

fn absolute(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}

pub fn usage() -> String {
    format!(
        r#"{} [command] [options]

{}

  1. embed-typescript help
  2. embed-typescript external --input <directory> --output <json>
     - input: directory placed in external dependencies
       - where "node_modules" and "package-lock.json" are
       - must be installed with npm, not pnpm or yarn
     - output: json file to be generated
       - example: embed-typescript external \
                    --input assets/dependencies \
                    --output src/external.json
"#,
        style("embed-typescript").bold(),
        style("Commands:").bold().dim()
    )
}

/// Prints `title` followed by the usage block and exits with `code`.
pub fn halt(title: &str, code: i32) -> ! {
    println!("{title}\n\n{}", usage());
    std::process::exit(code)
}
