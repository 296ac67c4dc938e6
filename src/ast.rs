/// Name of the attribute a slot invocation binds its captured body to.
pub const CHILDREN: &str = "children";

#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// `name=ident`: a context reference inside partials, literal text inside tags.
    Literal(String),
    /// `name="..."`, possibly interpolated.
    String(Vec<Statement>),
    /// Captured slot body, rendered in the caller's scope.
    Children(Vec<Statement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttrValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Literal(String),
    HtmlTag {
        tag: String,
        attributes: Vec<Statement>,
        children: Vec<Statement>,
    },
    HtmlSelfClosingTag {
        tag: String,
        attributes: Vec<Statement>,
    },
    Mustache(String), // dotted path, e.g. "user.name"
    Attribute(Attribute),
    String(Vec<Statement>),
    If {
        condition: String,
        then_branch: Vec<Statement>,
        else_branch: Option<Vec<Statement>>,
    },
    Each {
        name: String,  // e.g., "items"
        alias: String, // e.g., "item"
        children: Vec<Statement>,
    },
    /// `{{> Name ...}}`, and `{{#> Name ...}}...{{/Name}}` with a trailing
    /// `children` attribute.
    Partial {
        name: String,
        attributes: Vec<Attribute>,
    },
}

pub type Template = Vec<Statement>;
