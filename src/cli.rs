use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};

/// Color output mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Color when stderr is a terminal
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

/// Front end and interpreter for the chora language
#[derive(Debug, Parser)]
#[command(name = "chora", version, about = "Resolve, inspect and run chora programs", long_about = None)]
pub struct Cli {
    /// Color output: auto, always, never
    #[arg(long, global = true, value_enum, default_value_t = ColorMode::Auto)]
    pub color: ColorMode,

    /// Print at most N diagnostics (0 = unlimited)
    #[arg(long, global = true, value_name = "N")]
    pub max_diagnostics: Option<usize>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Debug, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Parse and resolve a file, reporting diagnostics
    Check {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Print the resolved tree of a file
    Tree {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Run `main` and exit with its integer result
    Run {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

impl Command {
    pub fn file(&self) -> &Path {
        match self {
            Command::Check { file } | Command::Tree { file } | Command::Run { file } => file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli = Cli::try_parse_from([
            "chora",
            "run",
            "demo.ch",
            "--color",
            "never",
            "--max-diagnostics",
            "3",
        ])
        .unwrap();
        assert_eq!(
            cli.command,
            Command::Run {
                file: PathBuf::from("demo.ch")
            }
        );
        assert_eq!(cli.color, ColorMode::Never);
        assert_eq!(cli.max_diagnostics, Some(3));
        assert_eq!(cli.command.file(), Path::new("demo.ch"));
    }

    #[test]
    fn file_argument_is_required() {
        assert!(Cli::try_parse_from(["chora", "check"]).is_err());
        assert!(Cli::try_parse_from(["chora", "build", "a.ch"]).is_err());
    }
}
