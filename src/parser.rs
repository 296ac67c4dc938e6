use crate::ast::*;
use crate::error::{Location, ParseError};
use crate::lexer::{Token, TokenKind};
use crate::options::CompileOptions;

use TokenKind::{
    BlockClose, BlockOpen, Each, Else, Eof, Equal, Greater, Identifier, If, Less, MustacheClose, MustacheOpen,
    Newline, Quote, SlashGreater, TagClose, Whitespace,
};

/// What surrounds the statement being parsed. Decides whether
/// `name=value` is an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    Bare,
    Tag,
    Partial,
}

type PResult<T> = Result<T, ParseError>;

/// Backtracking recursive-descent parser over a scanned token list.
///
/// The cursor is a plain index. Multi-token lookahead goes through
/// [`Parser::attempt`], which rewinds to the starting index whenever the
/// attempted pattern does not match in full.
pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
    depth: usize,
    options: CompileOptions,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self::with_options(tokens, CompileOptions::default())
    }

    pub fn with_options(mut tokens: Vec<Token>, options: CompileOptions) -> Self {
        if tokens.last().map(|t| t.kind) != Some(Eof) {
            let line = tokens.last().map_or(1, |t| t.line);
            tokens.push(Token::new(Eof, "", None, line));
        }
        Self {
            tokens,
            current: 0,
            depth: 0,
            options,
        }
    }

    pub fn parse(&mut self) -> PResult<Template> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            let statement = self.statement(Position::Bare)?;
            push(&mut statements, statement);
        }
        Ok(statements)
    }

    fn statement(&mut self, position: Position) -> PResult<Statement> {
        if self.depth >= self.options.max_nesting_depth {
            return Err(self.error("Template nested too deeply."));
        }
        self.depth += 1;
        let statement = self.dispatch(position);
        self.depth -= 1;
        statement
    }

    fn dispatch(&mut self, position: Position) -> PResult<Statement> {
        if self.match_seq(&[BlockOpen, Greater]) {
            return self.slot();
        }
        if self.match_seq(&[BlockOpen, Each]) {
            return self.each();
        }
        if self.match_seq(&[BlockOpen, If]) {
            return self.if_block();
        }
        if self.match_seq(&[MustacheOpen, Greater]) {
            return self.partial();
        }
        if position != Position::Bare {
            let name = self.attempt(|p| {
                let name = p.take(Identifier)?;
                p.eat(Equal).then_some(name)
            });
            if let Some(name) = name {
                return self.attribute(name).map(Statement::Attribute);
            }
        }
        if self.match_seq(&[Less]) {
            return self.tag();
        }
        if self.match_seq(&[Quote]) {
            return self.string();
        }
        if self.match_seq(&[MustacheOpen]) {
            return self.mustache();
        }
        if self.check(BlockOpen) {
            return Err(self.error("Unknown block; expect '{{#if', '{{#each' or '{{#>'."));
        }
        if self.check(BlockClose) {
            return Err(self.error("Unexpected closing block."));
        }

        Ok(Statement::Literal(self.advance().text.clone()))
    }

    // {{#> Name attr=value}} body {{/Name}}
    fn slot(&mut self) -> PResult<Statement> {
        self.consume(Whitespace, "Expect whitespace after '{{#>'.")?;
        let name = self
            .consume(Identifier, "Expect slot component name after '{{#> '.")?
            .text
            .clone();
        let mut attributes = self.attribute_list()?;
        self.consume(MustacheClose, "Expect '}}' at the end of a slot opening expression.")?;

        let children = self.body_until(|p| p.check(BlockClose))?;

        self.consume(BlockClose, "Expect '{{/' to close slot block.")?;
        self.skip_whitespace();
        let closing = self
            .consume(Identifier, "Expect slot component name in closing slot block.")?
            .text
            .clone();
        if closing != name {
            return Err(self.error_at_previous(format!(
                "Expect '{{{{/{name}}}}}' to close slot '{name}', found '{closing}'."
            )));
        }
        self.skip_whitespace();
        self.consume(MustacheClose, "Expect '}}' at the end of a closing slot expression.")?;

        attributes.push(Attribute {
            name: CHILDREN.to_string(),
            value: AttrValue::Children(children),
        });
        Ok(Statement::Partial { name, attributes })
    }

    // {{> Name attr=value}}
    fn partial(&mut self) -> PResult<Statement> {
        self.consume(Whitespace, "Expect whitespace after '{{>'.")?;
        let name = self
            .consume(Identifier, "Expect partial name after '{{> '.")?
            .text
            .clone();
        let attributes = self.attribute_list()?;
        self.consume(MustacheClose, "Expect '}}' at the end of a partial expression.")?;
        Ok(Statement::Partial { name, attributes })
    }

    fn attribute_list(&mut self) -> PResult<Vec<Attribute>> {
        let mut attributes = Vec::new();
        loop {
            self.skip_whitespace();
            if self.check(MustacheClose) || self.is_at_end() {
                return Ok(attributes);
            }
            match self.statement(Position::Partial)? {
                Statement::Attribute(attribute) => attributes.push(attribute),
                _ => {
                    return Err(
                        self.error_at_previous("Expect attribute (name=value) in partial invocation.")
                    )
                }
            }
        }
    }

    // `name=` has already been consumed.
    fn attribute(&mut self, name: String) -> PResult<Attribute> {
        let value = if self.eat(Quote) {
            AttrValue::String(self.string_body()?)
        } else {
            let reference = self.consume(Identifier, "Expect string or identifier after '='.")?;
            AttrValue::Literal(reference.text.clone())
        };
        Ok(Attribute { name, value })
    }

    // Outside an attribute value the quotes are content, not delimiters.
    fn string(&mut self) -> PResult<Statement> {
        let body = self.string_body()?;
        let mut children = vec![Statement::Literal("\"".to_string())];
        for statement in body {
            push(&mut children, statement);
        }
        push(&mut children, Statement::Literal("\"".to_string()));
        Ok(Statement::String(children))
    }

    // Opening quote already consumed.
    fn string_body(&mut self) -> PResult<Vec<Statement>> {
        let body = self.body_until(|p| p.check(Quote))?;
        self.consume(Quote, "Expect '\"' at the end of string.")?;
        Ok(body)
    }

    fn mustache(&mut self) -> PResult<Statement> {
        self.skip_whitespace();
        let variable = self
            .consume(Identifier, "Expect variable name after '{{'.")?
            .text
            .clone();
        self.skip_whitespace();
        self.consume(MustacheClose, "Expect '}}' after variable name.")?;
        Ok(Statement::Mustache(variable))
    }

    fn tag(&mut self) -> PResult<Statement> {
        let tag = self
            .consume(Identifier, "Expect tag name after '<'.")?
            .text
            .clone();

        let mut attributes = Vec::new();
        while !self.check(Greater) && !self.check(SlashGreater) && !self.is_at_end() {
            let statement = self.statement(Position::Tag)?;
            push(&mut attributes, statement);
        }

        if self.eat(SlashGreater) {
            return Ok(Statement::HtmlSelfClosingTag { tag, attributes });
        }
        self.consume(Greater, "Expect '>' after tag attributes.")?;

        let mut children = Vec::new();
        while !self.check(TagClose) && !self.is_at_end() {
            let statement = self.statement(Position::Bare)?;
            push(&mut children, statement);
        }

        self.consume(TagClose, "Expect '</' before closing tag name.")?;
        let closing = self
            .consume(Identifier, "Expect tag name after '</' in closing tag.")?
            .text
            .clone();
        if self.options.strict_closing_tags && closing != tag {
            return Err(self.error_at_previous(format!(
                "Expect '</{tag}>' to close '<{tag}>', found '</{closing}>'."
            )));
        }
        self.consume(Greater, "Expect '>' after closing tag name.")?;

        Ok(Statement::HtmlTag {
            tag,
            attributes,
            children,
        })
    }

    // {{#each name alias}} ... {{/each}}
    fn each(&mut self) -> PResult<Statement> {
        self.consume(Whitespace, "Expect whitespace after '{{#each'.")?;
        let name = self
            .consume(Identifier, "Expect collection name in each block.")?
            .text
            .clone();
        self.consume(Whitespace, "Expect whitespace after collection name in each block.")?;
        let alias = self
            .consume(Identifier, "Expect alias for the items of the collection.")?
            .text
            .clone();
        self.skip_whitespace();
        self.consume(MustacheClose, "Expect '}}' at the end of each opening block.")?;

        let children = self.body_until(|p| p.check(BlockClose))?;

        self.consume(BlockClose, "Expect '{{/each}}' to close each block.")?;
        self.skip_whitespace();
        self.consume(Each, "Expect 'each' in closing each block.")?;
        self.skip_whitespace();
        self.consume(MustacheClose, "Expect '}}' at the end of closing each block.")?;

        Ok(Statement::Each {
            name,
            alias,
            children,
        })
    }

    // {{#if condition}} ... [{{else}} ...] {{/if}}
    fn if_block(&mut self) -> PResult<Statement> {
        self.consume(Whitespace, "Expect whitespace after '{{#if'.")?;
        let condition = self
            .consume(Identifier, "Expect condition variable in if block.")?
            .text
            .clone();
        self.skip_whitespace();
        self.consume(MustacheClose, "Expect '}}' at the end of if opening block.")?;

        let then_branch = self.body_until(|p| p.check(BlockClose) || p.at_else())?;
        let else_branch = if self.match_else() {
            Some(self.body_until(|p| p.check(BlockClose))?)
        } else {
            None
        };

        self.consume(BlockClose, "Expect '{{/if}}' to close if block.")?;
        self.skip_whitespace();
        self.consume(If, "Expect 'if' in closing if block.")?;
        self.skip_whitespace();
        self.consume(MustacheClose, "Expect '}}' at the end of closing if block.")?;

        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn match_else(&mut self) -> bool {
        self.attempt(|p| {
            p.eat(MustacheOpen).then_some(())?;
            p.skip_whitespace();
            p.eat(Else).then_some(())?;
            p.skip_whitespace();
            p.eat(MustacheClose).then_some(())
        })
        .is_some()
    }

    fn at_else(&mut self) -> bool {
        let checkpoint = self.current;
        let found = self.match_else();
        self.current = checkpoint;
        found
    }

    fn body_until(&mut self, stop: fn(&mut Self) -> bool) -> PResult<Vec<Statement>> {
        let mut body = Vec::new();
        while !self.is_at_end() && !stop(self) {
            let statement = self.statement(Position::Bare)?;
            push(&mut body, statement);
        }
        Ok(body)
    }

    /// Runs `f` as one lookahead transaction: on `None` the cursor is put
    /// back where it was, so no pattern is ever left half-consumed.
    fn attempt<T>(&mut self, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let checkpoint = self.current;
        let result = f(self);
        if result.is_none() {
            self.current = checkpoint;
        }
        result
    }

    fn match_seq(&mut self, kinds: &[TokenKind]) -> bool {
        self.attempt(|p| kinds.iter().all(|&kind| p.eat(kind)).then_some(()))
            .is_some()
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if kind != Eof && self.check(kind) {
            self.current += 1;
            true
        } else {
            false
        }
    }

    fn take(&mut self, kind: TokenKind) -> Option<String> {
        let text = self.peek().text.clone();
        self.eat(kind).then_some(text)
    }

    fn consume(&mut self, kind: TokenKind, message: &str) -> PResult<&Token> {
        if self.eat(kind) {
            Ok(self.previous())
        } else {
            Err(self.error(message))
        }
    }

    fn skip_whitespace(&mut self) {
        while self.eat(Whitespace) || self.eat(Newline) {}
    }

    fn check(&self, kind: TokenKind) -> bool {
        self.peek().kind == kind
    }

    fn is_at_end(&self) -> bool {
        self.check(Eof)
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn peek(&self) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[self.current.min(last)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        error_at(self.peek(), message.into())
    }

    fn error_at_previous(&self, message: impl Into<String>) -> ParseError {
        error_at(self.previous(), message.into())
    }
}

fn error_at(token: &Token, message: String) -> ParseError {
    let location = match token.kind {
        Eof => Location::End,
        _ => Location::Token(token.text.clone()),
    };
    ParseError {
        line: token.line,
        location,
        message,
    }
}

/// Appends `statement`, folding adjacent literal runs into one.
fn push(statements: &mut Vec<Statement>, statement: Statement) {
    if let Statement::Literal(text) = &statement {
        if let Some(Statement::Literal(previous)) = statements.last_mut() {
            previous.push_str(text);
            return;
        }
    }
    statements.push(statement);
}

/// Parse a scanned token list with default options.
pub fn parse(tokens: Vec<Token>) -> Result<Template, ParseError> {
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::scan;

    fn parse_with(source: &str, options: CompileOptions) -> PResult<Template> {
        let (tokens, errors) = scan(source);
        assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
        Parser::with_options(tokens, options).parse()
    }

    fn parse_ok(source: &str) -> Template {
        match parse_with(source, CompileOptions::default()) {
            Ok(template) => template,
            Err(err) => panic!("failed to parse {source:?}: {err}"),
        }
    }

    fn parse_err(source: &str) -> ParseError {
        match parse_with(source, CompileOptions::default()) {
            Ok(template) => panic!("expected {source:?} to fail, got {template:?}"),
            Err(err) => err,
        }
    }

    fn lit(text: &str) -> Statement {
        Statement::Literal(text.to_string())
    }

    #[test]
    fn text_runs_fold_into_one_literal() {
        assert_eq!(parse_ok("Hello, world!\nbye"), vec![lit("Hello, world!\nbye")]);
        assert_eq!(parse_ok(""), vec![]);
    }

    #[test]
    fn mustache_allows_inner_whitespace() {
        assert_eq!(
            parse_ok("Hi {{ user.name }}!"),
            vec![lit("Hi "), Statement::Mustache("user.name".into()), lit("!")]
        );
    }

    #[test]
    fn paired_tag_with_attributes() {
        let template = parse_ok(r#"<a href="/x" target=_blank>go</a>"#);
        assert_eq!(
            template,
            vec![Statement::HtmlTag {
                tag: "a".into(),
                attributes: vec![
                    lit(" "),
                    Statement::Attribute(Attribute {
                        name: "href".into(),
                        value: AttrValue::String(vec![lit("/x")]),
                    }),
                    lit(" "),
                    Statement::Attribute(Attribute {
                        name: "target".into(),
                        value: AttrValue::Literal("_blank".into()),
                    }),
                ],
                children: vec![lit("go")],
            }]
        );
    }

    #[test]
    fn self_closing_tag_is_decided_after_attributes() {
        let template = parse_ok(r#"<img src="{{url}}"/>"#);
        assert_eq!(
            template,
            vec![Statement::HtmlSelfClosingTag {
                tag: "img".into(),
                attributes: vec![
                    lit(" "),
                    Statement::Attribute(Attribute {
                        name: "src".into(),
                        value: AttrValue::String(vec![Statement::Mustache("url".into())]),
                    }),
                ],
            }]
        );
    }

    #[test]
    fn bare_assignment_outside_tags_is_text() {
        assert_eq!(parse_ok("a=b"), vec![lit("a=b")]);
    }

    #[test]
    fn quotes_in_running_text_are_kept() {
        assert_eq!(
            parse_ok(r#"say "hi {{name}}""#),
            vec![
                lit("say "),
                Statement::String(vec![lit("\"hi "), Statement::Mustache("name".into()), lit("\"")]),
            ]
        );
    }

    #[test]
    fn loose_strings_inside_tags_keep_their_quotes() {
        assert_eq!(
            parse_ok(r#"<a href = "x">y</a>"#),
            vec![Statement::HtmlTag {
                tag: "a".into(),
                attributes: vec![
                    lit(" href = "),
                    Statement::String(vec![lit("\"x\"")]),
                ],
                children: vec![lit("y")],
            }]
        );
    }

    #[test]
    fn if_with_and_without_else() {
        assert_eq!(
            parse_ok("{{#if flag}}Y{{else}}N{{/if}}"),
            vec![Statement::If {
                condition: "flag".into(),
                then_branch: vec![lit("Y")],
                else_branch: Some(vec![lit("N")]),
            }]
        );
        assert_eq!(
            parse_ok("{{#if flag}}{{name}}{{/ if }}"),
            vec![Statement::If {
                condition: "flag".into(),
                then_branch: vec![Statement::Mustache("name".into())],
                else_branch: None,
            }]
        );
    }

    #[test]
    fn nested_ifs_each_own_their_else() {
        let template = parse_ok("{{#if a}}{{#if b}}1{{else}}2{{/if}}{{else}}3{{/if}}");
        let Statement::If { then_branch, else_branch, .. } = &template[0] else {
            panic!("expected if, got {template:?}");
        };
        assert!(matches!(&then_branch[0], Statement::If { else_branch: Some(_), .. }));
        assert_eq!(else_branch.as_deref(), Some(&[lit("3")][..]));
    }

    #[test]
    fn each_block() {
        assert_eq!(
            parse_ok("{{#each items it}}<li>{{it.name}}</li>{{/each}}"),
            vec![Statement::Each {
                name: "items".into(),
                alias: "it".into(),
                children: vec![Statement::HtmlTag {
                    tag: "li".into(),
                    attributes: vec![],
                    children: vec![Statement::Mustache("it.name".into())],
                }],
            }]
        );
    }

    #[test]
    fn partial_with_reference_and_string_attributes() {
        assert_eq!(
            parse_ok(r#"{{> Card title="Hi {{who}}" user=current }}"#),
            vec![Statement::Partial {
                name: "Card".into(),
                attributes: vec![
                    Attribute {
                        name: "title".into(),
                        value: AttrValue::String(vec![lit("Hi "), Statement::Mustache("who".into())]),
                    },
                    Attribute {
                        name: "user".into(),
                        value: AttrValue::Literal("current".into()),
                    },
                ],
            }]
        );
    }

    #[test]
    fn slot_captures_body_as_children_attribute() {
        assert_eq!(
            parse_ok("{{#> Box kind=k}}inner{{/Box}}"),
            vec![Statement::Partial {
                name: "Box".into(),
                attributes: vec![
                    Attribute {
                        name: "kind".into(),
                        value: AttrValue::Literal("k".into()),
                    },
                    Attribute {
                        name: CHILDREN.into(),
                        value: AttrValue::Children(vec![lit("inner")]),
                    },
                ],
            }]
        );
    }

    #[test]
    fn unclosed_if_fails_at_end() {
        let err = parse_err("{{#if cond}}no-close");
        assert_eq!(err.location, Location::End);
        assert_eq!(err.message, "Expect '{{/if}}' to close if block.");
    }

    #[test]
    fn mismatched_block_close_fails() {
        let err = parse_err("{{#each xs x}}a{{/if}}");
        assert_eq!(err.message, "Expect 'each' in closing each block.");
        assert_eq!(err.location, Location::Token("if".into()));

        let err = parse_err("{{#> Box}}a{{/Card}}");
        assert_eq!(err.location, Location::Token("Card".into()));
    }

    #[test]
    fn missing_whitespace_after_block_keyword_fails() {
        let err = parse_err("{{#each}}{{/each}}");
        assert_eq!(err.message, "Expect whitespace after '{{#each'.");
        let err = parse_err("{{>Card}}");
        assert_eq!(err.message, "Expect whitespace after '{{>'.");
    }

    #[test]
    fn unknown_and_stray_blocks_fail() {
        assert_eq!(
            parse_err("{{#unless x}}{{/unless}}").message,
            "Unknown block; expect '{{#if', '{{#each' or '{{#>'."
        );
        assert_eq!(parse_err("a{{/if}}").message, "Unexpected closing block.");
        assert_eq!(parse_err("{{else}}").message, "Expect variable name after '{{'.");
    }

    #[test]
    fn partial_arguments_must_be_attributes() {
        let err = parse_err("{{> Card loose}}");
        assert_eq!(err.message, "Expect attribute (name=value) in partial invocation.");
    }

    #[test]
    fn errors_carry_the_line() {
        let err = parse_err("<p>\n\n{{ }}</p>");
        assert_eq!(err.line, 3);
        assert_eq!(err.location, Location::Token("}}".into()));
    }

    #[test]
    fn closing_tag_names_are_lenient_unless_strict() {
        assert!(parse_with("<b>x</i>", CompileOptions::default()).is_ok());
        let err = parse_with("<b>x</i>", CompileOptions::new().with_strict_closing_tags(true))
            .expect_err("mismatched tags must fail in strict mode");
        assert_eq!(err.message, "Expect '</b>' to close '<b>', found '</i>'.");
    }

    #[test]
    fn nesting_is_bounded() {
        let options = CompileOptions::new().with_max_nesting_depth(8);
        let nested = |n: usize| format!("{}x{}", "<b>".repeat(n), "</b>".repeat(n));

        assert!(parse_with(&nested(7), options.clone()).is_ok());
        let err = parse_with(&nested(8), options).expect_err("too deep");
        assert_eq!(err.message, "Template nested too deeply.");
        assert_eq!(err.location, Location::Token("x".into()));

        let err = parse_err(&nested(10_000));
        assert_eq!(err.message, "Template nested too deeply.");
    }

    #[test]
    fn empty_token_list_parses_to_nothing() {
        assert_eq!(parse(Vec::new()), Ok(vec![]));
    }
}
