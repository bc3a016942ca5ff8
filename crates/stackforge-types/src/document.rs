//! Template document tree.
//!
//! A [`Document`] is an ordered mapping of category name to category value.
//! Category names the compiler understands are listed in [`categories`];
//! anything else is carried through untouched.

use serde_yaml::{Mapping, Value};

/// Reserved category names.
pub mod categories {
    /// Template format version; only the root document's value applies.
    pub const FORMAT_VERSION: &str = "AWSTemplateFormatVersion";
    /// Template description; only the root document's value applies.
    pub const DESCRIPTION: &str = "Description";
    /// Parameter declarations.
    pub const PARAMETERS: &str = "Parameters";
    /// Resource declarations.
    pub const RESOURCES: &str = "Resources";
    /// Output declarations.
    pub const OUTPUTS: &str = "Outputs";
    /// Prefix of the category listing included documents.
    pub const INCLUDE_PREFIX: &str = "Include";

    /// Categories that are never taken from an included document.
    pub const ROOT_ONLY: [&str; 2] = [FORMAT_VERSION, DESCRIPTION];
}

/// Parsed template document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    root: Mapping,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap an existing mapping.
    pub fn from_mapping(root: Mapping) -> Self {
        Self { root }
    }

    /// Build a document from a parsed YAML value.
    ///
    /// An empty file parses to `Null` and yields an empty document.
    /// Returns `None` when the top level is not a mapping.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::new()),
            Value::Mapping(root) => Some(Self { root }),
            _ => None,
        }
    }

    /// Get a category by name.
    pub fn get(&self, category: &str) -> Option<&Value> {
        self.root.get(category)
    }

    /// Get a category by name, mutably.
    pub fn get_mut(&mut self, category: &str) -> Option<&mut Value> {
        self.root.get_mut(category)
    }

    /// Insert or replace a category, returning the previous value.
    pub fn insert(&mut self, category: impl Into<String>, value: Value) -> Option<Value> {
        self.root.insert(Value::String(category.into()), value)
    }

    /// Remove a category.
    pub fn remove(&mut self, category: &str) -> Option<Value> {
        self.root.remove(category)
    }

    /// Whether a category is present.
    pub fn contains(&self, category: &str) -> bool {
        self.root.contains_key(category)
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.root.len()
    }

    /// Whether the document has no categories.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Iterate over categories with string names, in document order.
    pub fn categories(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.root
            .iter()
            .filter_map(|(k, v)| k.as_str().map(|name| (name, v)))
    }

    /// Detach the includes category, if present.
    ///
    /// The includes category is the first category whose name starts with
    /// [`categories::INCLUDE_PREFIX`].
    pub fn take_includes(&mut self) -> Option<(String, Value)> {
        let name = self
            .categories()
            .map(|(name, _)| name)
            .find(|name| name.starts_with(categories::INCLUDE_PREFIX))?
            .to_string();
        let value = self.root.remove(name.as_str())?;
        Some((name, value))
    }

    /// The `Parameters` category, when it is a mapping.
    pub fn parameters(&self) -> Option<&Mapping> {
        self.get(categories::PARAMETERS).and_then(Value::as_mapping)
    }

    /// Default value declared for a parameter.
    pub fn parameter_default(&self, name: &str) -> Option<&Value> {
        self.parameters()?
            .get(name)
            .and_then(|param| param.get("Default"))
    }

    /// Borrow the underlying mapping.
    pub fn as_mapping(&self) -> &Mapping {
        &self.root
    }

    /// Consume the document, returning the underlying mapping.
    pub fn into_mapping(self) -> Mapping {
        self.root
    }

    /// Serialize to YAML text.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(&self.root)
    }
}

impl From<Mapping> for Document {
    fn from(root: Mapping) -> Self {
        Self::from_mapping(root)
    }
}
