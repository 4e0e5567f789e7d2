use chora::{
    backend::{Backend, Interpreter, RuntimeError, TreePrinter},
    cli::{Cli, Command},
    config::{self, CompileOptions},
    diagnostics,
    language::{parser::parse_source, types::TypeRegistry},
};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use thiserror::Error;

const EXTENSION: &str = "ch";

#[derive(Debug, Error)]
enum DriverError {
    #[error("invalid file extension for {}: only .ch files are allowed", .path.display())]
    Extension { path: PathBuf },
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not compile {} due to {count} diagnostic(s)", .path.display())]
    Diagnostics { path: PathBuf, count: usize },
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

fn main() -> ExitCode {
    config::init_tracing();
    let cli = Cli::parse();
    let options = CompileOptions::from_cli(&cli);

    match execute(&cli.command, &options) {
        Ok(code) => code,
        Err(DriverError::Runtime(error)) => {
            diagnostics::report_runtime_error(&error);
            ExitCode::FAILURE
        }
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn read_source(path: &Path) -> Result<String, DriverError> {
    if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
        return Err(DriverError::Extension {
            path: path.to_path_buf(),
        });
    }
    fs::read_to_string(path).map_err(|source| DriverError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[tracing::instrument(level = "debug", skip_all, fields(file = %command.file().display()))]
fn execute(command: &Command, options: &CompileOptions) -> Result<ExitCode, DriverError> {
    let path = command.file();
    let source = read_source(path)?;
    let types = TypeRegistry::builtin();
    let unit = parse_source(&source, &types);

    if !unit.is_clean() {
        diagnostics::emit_diagnostics(
            path,
            &source,
            &unit.diagnostics,
            options.max_diagnostics,
            options.color,
        );
        return Err(DriverError::Diagnostics {
            path: path.to_path_buf(),
            count: unit.diagnostics.len(),
        });
    }

    match command {
        Command::Check { .. } => Ok(ExitCode::SUCCESS),
        Command::Tree { .. } => {
            let mut printer = TreePrinter::new(&types);
            printer.lower(&unit);
            print!("{}", printer.output());
            Ok(ExitCode::SUCCESS)
        }
        Command::Run { .. } => {
            let mut interpreter = Interpreter::new(&types).with_call_depth(options.call_depth);
            if !interpreter.lower(&unit) {
                let error = interpreter.take_error().unwrap_or(RuntimeError::Unresolved {
                    what: "program result",
                });
                return Err(error.into());
            }
            let code = interpreter.result().map_or(0, |value| value.exit_code());
            tracing::debug!(code, "exit");
            Ok(ExitCode::from(code as u8))
        }
    }
}
