use crate::ast::Template;
use crate::error::CompileError;
use crate::options::CompileOptions;
use std::collections::HashMap;

/// Compiled partials, looked up by name while rendering.
///
/// Lookups happen lazily at render time, so partials may be registered in
/// any order and may refer to each other.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    partials: HashMap<String, Template>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `source` and store it under `name`, replacing any earlier
    /// partial of the same name. On error the registry is left unchanged.
    pub fn register_partial(&mut self, name: impl Into<String>, source: &str) -> Result<(), CompileError> {
        self.register_partial_with(name, source, &CompileOptions::default())
    }

    pub fn register_partial_with(
        &mut self,
        name: impl Into<String>,
        source: &str,
        options: &CompileOptions,
    ) -> Result<(), CompileError> {
        let name = name.into();
        let template = crate::compile_with(source, options)?;
        log::trace!("Registered partial `{name}` ({} statements)", template.len());
        self.insert(name, template);
        Ok(())
    }

    /// Store an already compiled template.
    pub fn insert(&mut self, name: impl Into<String>, template: Template) -> Option<Template> {
        self.partials.insert(name.into(), template)
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.partials.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.partials.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.partials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partials.is_empty()
    }
}
