//! Error types for compiling and rendering templates.

use std::fmt;
use thiserror::Error;

/// A problem found while scanning template source.
///
/// Lexing never stops at the first error; every problem in the source is
/// collected so authors can fix them in one pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[line {line}] Error: {message}")]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

/// Where a parse error was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// At the token with this lexeme.
    Token(String),
    /// At end of input.
    End,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Token(lexeme) => write!(f, "at '{}'", lexeme.escape_debug()),
            Location::End => f.write_str("at end"),
        }
    }
}

/// The first structural error in a token stream. Parsing stops here.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[line {line}] Error {location}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub location: Location,
    pub message: String,
}

/// Failure to turn template source into a [`Template`](crate::ast::Template).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("{}", join_lines(.0))]
    Lex(Vec<LexError>),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl CompileError {
    /// Line of the first reported problem.
    pub fn line(&self) -> usize {
        match self {
            CompileError::Lex(errors) => errors.first().map_or(0, |e| e.line),
            CompileError::Parse(err) => err.line,
        }
    }
}

fn join_lines(errors: &[LexError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Failure while evaluating a compiled template.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// `{{#each name alias}}` where `name` is missing or not a sequence.
    #[error("Cannot iterate '{name}': value is missing or not a sequence")]
    NotIterable { name: String },

    /// Partials nested deeper than the configured limit, usually a cycle.
    #[error("Partial '{name}' exceeds the maximum nesting depth of {limit}")]
    PartialDepthExceeded { name: String, limit: usize },

    /// Statements nested deeper than the configured limit.
    #[error("Template exceeds the maximum nesting depth of {limit} while rendering")]
    NestingTooDeep { limit: usize },
}

/// Any failure of the one-shot [`render_template`](crate::render_template) helper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lex_errors_are_reported_one_per_line() {
        let err = CompileError::Lex(vec![
            LexError { line: 1, message: "Unexpected character: '('".into() },
            LexError { line: 3, message: "Unterminated string.".into() },
        ]);
        assert_eq!(
            err.to_string(),
            "[line 1] Error: Unexpected character: '('\n[line 3] Error: Unterminated string."
        );
        assert_eq!(err.line(), 1);
    }

    #[test]
    fn parse_error_names_the_offending_token() {
        let err = ParseError {
            line: 2,
            location: Location::Token("}}".into()),
            message: "Expect variable name after '{{'.".into(),
        };
        assert_eq!(
            err.to_string(),
            "[line 2] Error at '}}': Expect variable name after '{{'."
        );

        let at_end = ParseError { line: 4, location: Location::End, message: "x".into() };
        assert_eq!(at_end.to_string(), "[line 4] Error at end: x");
    }
}
