use crate::ast::*;
use crate::error::RenderError;
use crate::options::RenderOptions;
use crate::registry::Registry;
use crate::value::{Context, Value};
use std::collections::HashMap;

/// One level of bindings. Child scopes borrow their parent, so entering a
/// loop iteration or a partial never touches the enclosing bindings.
struct Scope<'a> {
    vars: &'a HashMap<String, Value>,
    parent: Option<&'a Scope<'a>>,
}

impl<'a> Scope<'a> {
    fn root(vars: &'a HashMap<String, Value>) -> Self {
        Self { vars, parent: None }
    }

    fn child<'b>(&'b self, vars: &'b HashMap<String, Value>) -> Scope<'b> {
        Scope {
            vars,
            parent: Some(self),
        }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.vars
            .get(name)
            .or_else(|| self.parent.and_then(|parent| parent.get(name)))
    }

    /// Resolves `a.b.c`; any missing segment or non-map step is a miss.
    fn lookup(&self, path: &str) -> Option<&'a Value> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        self.get(first)?.get_path(segments)
    }
}

/// How deep the renderer currently is: nested partials, and nested
/// statements of any kind across partial boundaries.
#[derive(Debug, Clone, Copy, Default)]
struct Frame {
    partials: usize,
    nesting: usize,
}

impl Frame {
    fn nested(self) -> Self {
        Self {
            nesting: self.nesting + 1,
            ..self
        }
    }

    fn into_partial(self) -> Self {
        Self {
            partials: self.partials + 1,
            nesting: self.nesting + 1,
        }
    }
}

pub struct Evaluator<'r> {
    partials: &'r Registry,
    options: &'r RenderOptions,
}

impl<'r> Evaluator<'r> {
    pub fn new(partials: &'r Registry, options: &'r RenderOptions) -> Self {
        Self { partials, options }
    }

    pub fn render(&self, template: &Template, context: &Context) -> Result<String, RenderError> {
        let scope = Scope::root(context.vars());
        self.render_scoped(template, &scope, Frame::default())
    }

    fn render_scoped(&self, statements: &[Statement], scope: &Scope<'_>, frame: Frame) -> Result<String, RenderError> {
        let mut output = String::new();
        self.render_into(&mut output, statements, scope, frame)?;
        Ok(output)
    }

    fn render_into(
        &self,
        output: &mut String,
        statements: &[Statement],
        scope: &Scope<'_>,
        frame: Frame,
    ) -> Result<(), RenderError> {
        if frame.nesting > self.options.max_nesting_depth {
            return Err(RenderError::NestingTooDeep {
                limit: self.options.max_nesting_depth,
            });
        }
        let inner = frame.nested();

        for statement in statements {
            match statement {
                Statement::Literal(text) => output.push_str(text),
                Statement::Mustache(path) => {
                    if let Some(value) = scope.lookup(path) {
                        output.push_str(&value.to_string());
                    }
                }
                Statement::String(children) => {
                    self.render_into(output, children, scope, inner)?;
                }
                Statement::Attribute(attribute) => {
                    self.render_attribute(output, attribute, scope, inner)?;
                }
                Statement::HtmlTag {
                    tag,
                    attributes,
                    children,
                } => {
                    output.push('<');
                    output.push_str(tag);
                    self.render_into(output, attributes, scope, inner)?;
                    output.push('>');
                    self.render_into(output, children, scope, inner)?;
                    output.push_str("</");
                    output.push_str(tag);
                    output.push('>');
                }
                Statement::HtmlSelfClosingTag { tag, attributes } => {
                    output.push('<');
                    output.push_str(tag);
                    self.render_into(output, attributes, scope, inner)?;
                    output.push_str("/>");
                }
                Statement::If {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    let value = scope.get(condition).or_else(|| scope.lookup(condition));
                    if value.is_some_and(Value::is_truthy) {
                        self.render_into(output, then_branch, scope, inner)?;
                    } else if let Some(else_branch) = else_branch {
                        self.render_into(output, else_branch, scope, inner)?;
                    }
                }
                Statement::Each {
                    name,
                    alias,
                    children,
                } => {
                    let items = scope
                        .lookup(name)
                        .and_then(Value::as_array)
                        .ok_or_else(|| RenderError::NotIterable { name: name.clone() })?;
                    for item in items {
                        let locals = HashMap::from([(alias.clone(), item.clone())]);
                        self.render_into(output, children, &scope.child(&locals), inner)?;
                    }
                }
                Statement::Partial { name, attributes } => {
                    self.render_partial(output, name, attributes, scope, frame)?;
                }
            }
        }
        Ok(())
    }

    fn render_attribute(
        &self,
        output: &mut String,
        attribute: &Attribute,
        scope: &Scope<'_>,
        frame: Frame,
    ) -> Result<(), RenderError> {
        output.push_str(&attribute.name);
        output.push_str("=\"");
        match &attribute.value {
            AttrValue::Literal(text) => output.push_str(text),
            AttrValue::String(children) | AttrValue::Children(children) => {
                self.render_into(output, children, scope, frame)?;
            }
        }
        output.push('"');
        Ok(())
    }

    fn render_partial(
        &self,
        output: &mut String,
        name: &str,
        attributes: &[Attribute],
        scope: &Scope<'_>,
        frame: Frame,
    ) -> Result<(), RenderError> {
        let Some(template) = self.partials.get(name) else {
            log::debug!("Partial `{name}` is not registered, rendering nothing");
            return Ok(());
        };
        if frame.partials >= self.options.max_partial_depth {
            return Err(RenderError::PartialDepthExceeded {
                name: name.to_string(),
                limit: self.options.max_partial_depth,
            });
        }

        // Attribute values are computed in the caller's scope, including the
        // captured slot body.
        let mut locals = HashMap::with_capacity(attributes.len());
        for attribute in attributes {
            let value = match &attribute.value {
                AttrValue::Literal(reference) => scope.lookup(reference).cloned().unwrap_or(Value::Null),
                AttrValue::String(children) | AttrValue::Children(children) => {
                    Value::String(self.render_scoped(children, scope, frame.nested())?)
                }
            };
            locals.insert(attribute.name.clone(), value);
        }

        self.render_into(output, template, &scope.child(&locals), frame.into_partial())
    }
}
