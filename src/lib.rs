//! shimmybars: minimal Handlebars-like template compiler for HTML snippets.
//!
//! Templates are compiled once into a statement tree and rendered against a
//! [`Context`] plus a [`Registry`] of named partials. Compilation and
//! rendering are separate so a compiled [`Template`] can be rendered many
//! times, from many threads, against different data.
//!
//! Supported syntax:
//! - Literal text and HTML tags: `<a href="{{url}}">x</a>`, `<br/>`.
//! - Interpolation of dotted paths: `{{ user.name }}`.
//! - Conditionals: `{{#if flag}} ... {{else}} ... {{/if}}`.
//! - Iteration: `{{#each items item}} ... {{/each}}`.
//! - Partials: `{{> Card title="Hi {{name}}" user=current}}`.
//! - Slots: `{{#> Box}}body{{/Box}}`, with the body bound as `children`.
//!
//! Not supported:
//! - Expressions beyond dotted paths and quoted strings.
//! - HTML escaping. Values are inserted verbatim.
//! - Caching or incremental re-rendering.
//!
//! Missing variables and unknown partials render as nothing. Syntax errors
//! fail compilation with the line they were found on; iterating something
//! that is not a list fails the render.
//!
//! ```
//! use shimmybars::{compile, render, Context, Registry};
//!
//! let mut partials = Registry::new();
//! partials.register_partial("Greeting", "Hi {{name}}").unwrap();
//!
//! let template = compile("{{> Greeting name=user}}").unwrap();
//! let mut ctx = Context::new();
//! ctx.set("user", "Sam");
//!
//! assert_eq!(render(&template, &ctx, &partials).unwrap(), "Hi Sam");
//! ```

pub mod ast;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod registry;
pub mod value;

pub use ast::{AttrValue, Attribute, Statement, Template};
pub use error::{CompileError, Error, LexError, ParseError, RenderError};
pub use options::{CompileOptions, RenderOptions};
pub use registry::Registry;
pub use value::{Context, Value};

/// Compile template source into a statement tree.
pub fn compile(source: &str) -> Result<Template, CompileError> {
    compile_with(source, &CompileOptions::default())
}

/// Compile with explicit [`CompileOptions`].
///
/// Lexical errors are all collected before failing; the parser only runs
/// on a clean token stream and stops at its first error.
pub fn compile_with(source: &str, options: &CompileOptions) -> Result<Template, CompileError> {
    let (tokens, errors) = lexer::scan(source);
    if !errors.is_empty() {
        log::trace!("Lexing failed with {} error(s)", errors.len());
        return Err(CompileError::Lex(errors));
    }
    log::trace!("Scanned {} tokens", tokens.len());

    let template = parser::Parser::with_options(tokens, options.clone()).parse()?;
    log::trace!("Parsed {} top-level statements", template.len());
    Ok(template)
}

/// Render a compiled template against `context`, resolving partials from
/// `partials`.
pub fn render(template: &Template, context: &Context, partials: &Registry) -> Result<String, RenderError> {
    render_with(template, context, partials, &RenderOptions::default())
}

/// Render with explicit [`RenderOptions`].
pub fn render_with(
    template: &Template,
    context: &Context,
    partials: &Registry,
    options: &RenderOptions,
) -> Result<String, RenderError> {
    eval::Evaluator::new(partials, options).render(template, context)
}

/// Compile and render `source` in one step.
pub fn render_template(source: &str, context: &Context, partials: &Registry) -> Result<String, Error> {
    let template = compile(source)?;
    Ok(render(&template, context, partials)?)
}
