use crate::{
    backend::interpreter::DEFAULT_CALL_DEPTH,
    cli::{Cli, ColorMode},
};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "CHORA_LOG";
pub const LOG_STYLE_ENV: &str = "CHORA_LOG_STYLE";
pub const MAX_DIAGNOSTICS_ENV: &str = "CHORA_MAX_DIAGNOSTICS";

/// Settings for one driver invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompileOptions {
    pub color: ColorMode,
    /// Diagnostics printed before the rest are summarized; 0 prints all.
    pub max_diagnostics: usize,
    pub call_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            color: ColorMode::Auto,
            max_diagnostics: 0,
            call_depth: DEFAULT_CALL_DEPTH,
        }
    }
}

impl CompileOptions {
    pub fn from_cli(cli: &Cli) -> Self {
        Self::resolve(cli, std::env::var(MAX_DIAGNOSTICS_ENV).ok().as_deref())
    }

    /// An explicit flag wins over the environment.
    fn resolve(cli: &Cli, env_max: Option<&str>) -> Self {
        let env_max = env_max.and_then(|raw| match raw.trim().parse::<usize>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(value = raw, "ignoring invalid {}", MAX_DIAGNOSTICS_ENV);
                None
            }
        });
        Self {
            color: cli.color,
            max_diagnostics: cli.max_diagnostics.or(env_max).unwrap_or(0),
            ..Self::default()
        }
    }
}

/// Installs a stderr subscriber when `CHORA_LOG` holds a filter. `CHORA_LOG_STYLE=full` adds
/// timestamps and span open/close events.
pub fn init_tracing() {
    let Ok(filter) = EnvFilter::try_from_env(LOG_ENV) else {
        return;
    };
    let full = std::env::var(LOG_STYLE_ENV).is_ok_and(|style| style == "full");
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr);
    if full {
        builder
            .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
            .init();
    } else {
        builder.without_time().compact().init();
    }
    tracing::debug!("tracing initialized");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn flag_takes_precedence_over_environment() {
        let options = CompileOptions::resolve(
            &cli(&["chora", "check", "a.ch", "--max-diagnostics", "2"]),
            Some("9"),
        );
        assert_eq!(options.max_diagnostics, 2);
    }

    #[test]
    fn environment_fills_missing_flag() {
        let args = cli(&["chora", "--color", "always", "tree", "a.ch"]);
        let options = CompileOptions::resolve(&args, Some(" 5 "));
        assert_eq!(options.max_diagnostics, 5);
        assert_eq!(options.color, ColorMode::Always);

        let options = CompileOptions::resolve(&args, Some("many"));
        assert_eq!(options.max_diagnostics, 0);
        assert_eq!(options.call_depth, DEFAULT_CALL_DEPTH);
    }
}
