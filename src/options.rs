//! Knobs for compiling and rendering.

/// Settings for [`compile_with`](crate::compile_with).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    /// Require `</name>` to repeat the opening tag's name.
    ///
    /// Off by default: any identifier closes the innermost open tag.
    pub strict_closing_tags: bool,
    /// How deeply tags, blocks and strings may nest before compilation
    /// fails.
    pub max_nesting_depth: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            strict_closing_tags: false,
            max_nesting_depth: 256,
        }
    }
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict_closing_tags(mut self, strict: bool) -> Self {
        self.strict_closing_tags = strict;
        self
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }
}

/// Settings for [`render_with`](crate::render_with).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// How many partials may be nested inside each other before rendering
    /// fails. Guards against partials that include themselves.
    pub max_partial_depth: usize,
    /// How deeply statements may nest during rendering, counted across
    /// partial boundaries.
    pub max_nesting_depth: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_partial_depth: 64,
            max_nesting_depth: 512,
        }
    }
}

impl RenderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_partial_depth(mut self, depth: usize) -> Self {
        self.max_partial_depth = depth;
        self
    }

    pub fn with_max_nesting_depth(mut self, depth: usize) -> Self {
        self.max_nesting_depth = depth;
        self
    }
}
