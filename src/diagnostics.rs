use crate::{
    backend::RuntimeError,
    cli::ColorMode,
    language::errors::{Diagnostic as SourceDiagnostic, Diagnostics},
};
use miette::{
    Diagnostic, GraphicalReportHandler, GraphicalTheme, NamedSource, SourceSpan, ThemeCharacters,
    ThemeStyles,
};
use std::fmt::Write;
use std::io::IsTerminal;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
pub struct ChoraDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{label}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
    label: String,
}

impl ChoraDiagnostic {
    pub fn from_diagnostic(src: NamedSource<String>, diagnostic: &SourceDiagnostic) -> Self {
        Self {
            src,
            span: diagnostic.to_source_span(),
            help: diagnostic.kind.help().map(str::to_string),
            message: diagnostic.message(),
            label: diagnostic.kind.category().label().to_string(),
        }
    }
}

fn handler(color: ColorMode) -> GraphicalReportHandler {
    let colored = match color {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::io::stderr().is_terminal(),
    };
    let theme = if colored {
        GraphicalTheme {
            characters: ThemeCharacters::unicode(),
            styles: ThemeStyles::ansi(),
        }
    } else {
        GraphicalTheme {
            characters: ThemeCharacters::ascii(),
            styles: ThemeStyles::none(),
        }
    };
    GraphicalReportHandler::new_themed(theme)
}

/// Renders the first `limit` diagnostics (all of them for 0) and counts the rest.
pub fn render_diagnostics(
    path: &Path,
    source: &str,
    diagnostics: &Diagnostics,
    limit: usize,
    color: ColorMode,
) -> String {
    let src = NamedSource::new(path.display().to_string(), source.to_string());
    let handler = handler(color);
    let shown = match limit {
        0 => diagnostics.len(),
        limit => limit.min(diagnostics.len()),
    };

    let mut out = String::new();
    for diagnostic in diagnostics.iter().take(shown) {
        let report = ChoraDiagnostic::from_diagnostic(src.clone(), diagnostic);
        if handler.render_report(&mut out, &report).is_err() {
            let _ = writeln!(out, "{}: {}", report.label, report.message);
        }
    }
    let hidden = diagnostics.len() - shown;
    if hidden > 0 {
        let _ = writeln!(out, "... and {hidden} more diagnostic(s) not shown");
    }
    out
}

pub fn emit_diagnostics(
    path: &Path,
    source: &str,
    diagnostics: &Diagnostics,
    limit: usize,
    color: ColorMode,
) {
    eprint!(
        "{}",
        render_diagnostics(path, source, diagnostics, limit, color)
    );
}

pub fn report_runtime_error(error: &RuntimeError) {
    eprintln!("runtime error: {error}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::{parser::parse_source, types::TypeRegistry};

    fn diagnostics_for(source: &str) -> Diagnostics {
        let types = TypeRegistry::builtin();
        parse_source(source, &types).diagnostics
    }

    #[test]
    fn renders_message_category_and_file() {
        let source = "fn main() { let x: i32 = true; }";
        let diagnostics = diagnostics_for(source);
        assert_eq!(diagnostics.len(), 1);
        let text = render_diagnostics(
            Path::new("demo.ch"),
            source,
            &diagnostics,
            0,
            ColorMode::Never,
        );
        assert!(text.contains("expected type 'i32', but found type 'bool'"), "{text}");
        assert!(text.contains("type error"), "{text}");
        assert!(text.contains("demo.ch"), "{text}");
    }

    #[test]
    fn limit_truncates_and_counts_the_rest() {
        let source = "fn main() { let a: i32 = true; let b: bool = 1; }";
        let diagnostics = diagnostics_for(source);
        assert_eq!(diagnostics.len(), 2);
        let text = render_diagnostics(
            Path::new("demo.ch"),
            source,
            &diagnostics,
            1,
            ColorMode::Never,
        );
        assert!(text.contains("found type 'bool'"), "{text}");
        assert!(!text.contains("found type 'i32'"), "{text}");
        assert!(text.contains("... and 1 more diagnostic(s) not shown"), "{text}");
    }

    #[test]
    fn help_comes_from_the_message_kind() {
        let source = "fn helper() {}";
        let diagnostics = diagnostics_for(source);
        let first = diagnostics.iter().next().unwrap();
        let src = NamedSource::new("demo.ch", source.to_string());
        let report = ChoraDiagnostic::from_diagnostic(src, first);
        assert_eq!(report.to_string(), "missing main function");
        assert!(report.help.as_deref().unwrap().contains("fn main()"));
    }
}
