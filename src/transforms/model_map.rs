//! Caller-facing model name → upstream model name.

use std::collections::HashMap;

/// Outcome of a model lookup. An unmapped model is passed through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelResolution<'a> {
    Mapped(&'a str),
    Unmapped(&'a str),
}

impl<'a> ModelResolution<'a> {
    /// The model to send upstream.
    pub fn model(&self) -> &'a str {
        match self {
            ModelResolution::Mapped(m) | ModelResolution::Unmapped(m) => m,
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, ModelResolution::Mapped(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelMapper {
    mappings: HashMap<String, String>,
}

impl ModelMapper {
    pub fn new(mappings: HashMap<String, String>) -> Self {
        Self { mappings }
    }

    pub fn resolve<'a>(&'a self, source: &'a str) -> ModelResolution<'a> {
        match self.mappings.get(source) {
            Some(target) => ModelResolution::Mapped(target.as_str()),
            None => ModelResolution::Unmapped(source),
        }
    }
}
