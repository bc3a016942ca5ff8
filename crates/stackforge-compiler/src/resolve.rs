//! Reference resolution
//!
//! A `{Ref: Name}` value is looked up in the caller's bindings, then in
//! the document's own parameter defaults. Without bindings at all, as when
//! a document is compiled on its own for inspection, references are
//! deferred and left for an enclosing compilation to resolve.

use serde_yaml::Value;
use stackforge_types::{Document, ParameterBindings};

use crate::error::{CompileError, Result};

/// Outcome of resolving a value.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// A concrete value.
    Value(Value),
    /// A reference that no binding context was available for.
    Deferred(Value),
}

impl Resolved {
    /// The concrete string, if resolution produced one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Resolved::Value(value) => value.as_str(),
            Resolved::Deferred(_) => None,
        }
    }
}

/// Resolves references against bindings and document defaults.
pub struct Resolver<'a> {
    bindings: Option<&'a ParameterBindings>,
    document: &'a Document,
}

impl<'a> Resolver<'a> {
    pub fn new(bindings: Option<&'a ParameterBindings>, document: &'a Document) -> Self {
        Self { bindings, document }
    }

    /// Resolve `value`.
    ///
    /// Scalars and sequences pass through. A mapping must be a reference.
    pub fn resolve(&self, value: &Value) -> Result<Resolved> {
        let Value::Mapping(map) = value else {
            return Ok(Resolved::Value(value.clone()));
        };
        let Some(reference) = map.get("Ref") else {
            return Err(CompileError::InvalidReference(render(value)));
        };
        let Some(bindings) = self.bindings else {
            return Ok(Resolved::Deferred(value.clone()));
        };
        let Some(name) = reference.as_str() else {
            return Err(CompileError::InvalidReference(render(value)));
        };

        if let Some(bound) = bindings.get(name) {
            return Ok(Resolved::Value(Value::String(bound.to_string())));
        }
        match self.document.parameter_default(name) {
            Some(default) if !default.is_null() => Ok(Resolved::Value(default.clone())),
            _ => Err(CompileError::UnresolvedReference(name.to_string())),
        }
    }
}

fn render(value: &Value) -> String {
    serde_yaml::to_string(value)
        .map(|s| s.trim_end().replace('\n', " "))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Document {
        Document::from_value(
            serde_yaml::from_str("Parameters:\n  CodeUrl:\n    Default: https://default\n  Bare:\n    Type: String\n")
                .unwrap(),
        )
        .unwrap()
    }

    fn reference(name: &str) -> Value {
        serde_yaml::from_str(&format!("Ref: {name}")).unwrap()
    }

    #[test]
    fn test_without_bindings_reference_is_deferred() {
        let doc = doc();
        let resolver = Resolver::new(None, &doc);
        let value = reference("Anything");
        assert_eq!(resolver.resolve(&value).unwrap(), Resolved::Deferred(value));
    }

    #[test]
    fn test_binding_wins_over_default() {
        let doc = doc();
        let bindings: ParameterBindings = [("CodeUrl", "https://bound")].into_iter().collect();
        let resolver = Resolver::new(Some(&bindings), &doc);
        let resolved = resolver.resolve(&reference("CodeUrl")).unwrap();
        assert_eq!(resolved.as_str(), Some("https://bound"));
    }

    #[test]
    fn test_default_used_when_unbound() {
        let doc = doc();
        let bindings = ParameterBindings::new();
        let resolver = Resolver::new(Some(&bindings), &doc);
        let resolved = resolver.resolve(&reference("CodeUrl")).unwrap();
        assert_eq!(resolved.as_str(), Some("https://default"));
    }

    #[test]
    fn test_unresolvable_reference_fails() {
        let doc = doc();
        let bindings = ParameterBindings::new();
        let resolver = Resolver::new(Some(&bindings), &doc);
        let err = resolver.resolve(&reference("Bare")).unwrap_err();
        assert!(matches!(err, CompileError::UnresolvedReference(name) if name == "Bare"));
    }

    #[test]
    fn test_non_reference_mapping_is_invalid() {
        let doc = doc();
        let resolver = Resolver::new(None, &doc);
        let value: Value = serde_yaml::from_str("Other: x").unwrap();
        assert!(matches!(
            resolver.resolve(&value),
            Err(CompileError::InvalidReference(_))
        ));
    }

    #[test]
    fn test_scalars_pass_through() {
        let doc = doc();
        let resolver = Resolver::new(None, &doc);
        let value = Value::String("https://literal".into());
        assert_eq!(resolver.resolve(&value).unwrap().as_str(), Some("https://literal"));
    }
}
