use crate::language::{errors::SyntaxError, typecheck::TypeError};
use crate::runtime::SessionError;
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
pub struct SyntaxDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{message}")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
}

impl SyntaxDiagnostic {
    pub fn from_error(src: NamedSource<String>, err: &SyntaxError) -> Self {
        Self {
            src,
            span: err.to_source_span(),
            help: err.help.clone(),
            message: err.message.clone(),
        }
    }
}

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
pub struct TypeDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("{message}")]
    span: SourceSpan,
    message: String,
}

impl TypeDiagnostic {
    pub fn from_error(src: NamedSource<String>, err: &TypeError) -> Self {
        Self {
            src,
            span: err.to_source_span(),
            message: err.message.clone(),
        }
    }
}

/// Prints a per-turn session error. Syntax and type errors render with
/// their source context; runtime and unimplemented errors are plain lines.
pub fn report_session_error(error: &SessionError) {
    match error {
        SessionError::Syntax { error, input } => {
            let src = NamedSource::new("input", input.clone());
            let diagnostic = SyntaxDiagnostic::from_error(src, error);
            eprintln!("{:?}", Report::new(diagnostic));
        }
        SessionError::Type { error, input } => {
            let src = NamedSource::new("input", input.clone());
            let diagnostic = TypeDiagnostic::from_error(src, error);
            eprintln!("{:?}", Report::new(diagnostic));
        }
        SessionError::Unimplemented(feature) => {
            eprintln!("not implemented: {}", feature);
        }
        SessionError::Runtime(err) => {
            eprintln!("runtime error: {}", err);
        }
    }
}
