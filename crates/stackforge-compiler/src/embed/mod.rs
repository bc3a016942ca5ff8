//! Payload embedding
//!
//! Walks a merged document depth-first, remembering the type of the
//! enclosing resource, and replaces payload-bearing fields via the
//! [`table`] of per-type transforms:
//!
//! | Resource type | Field | Replacement |
//! |---|---|---|
//! | `AWS::AutoScaling::LaunchConfiguration`, `AWS::EC2::LaunchTemplate` | `UserData` | base64 user data |
//! | `AWS::Lambda::Function` | `Code` | `S3Bucket`/`S3Key` or `ZipFile` |
//! | `AWS::CloudFormation::Stack` | `Properties` | `Template` becomes `TemplateURL` |
//!
//! Any other field is copied through.

mod function_code;
mod nested;
mod package;
mod rebase;
pub mod table;
mod user_data;

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use serde_yaml::{Mapping, Value};
use stackforge_types::{Document, ParameterBindings};

use crate::compiler::Compiler;
use crate::error::{CompileError, Result};

pub use package::zip_directory;
pub use rebase::rebase_file_references;
pub use table::FieldTransform;

/// Position in the document walk.
#[derive(Debug, Clone, Default)]
struct Scope {
    /// Type of the innermost enclosing resource.
    restype: Option<String>,
    /// Logical id of that resource.
    resource: Option<String>,
}

impl Scope {
    fn enter(&self, map: &Mapping) -> Scope {
        let mut scope = self.clone();
        if scope.restype.is_none() {
            scope.restype = map.get("Type").and_then(Value::as_str).map(str::to_string);
        }
        scope
    }

    fn child(&self, key: Option<&str>) -> Scope {
        let mut scope = self.clone();
        if scope.restype.is_none() {
            scope.resource = key.map(str::to_string);
        }
        scope
    }

    fn resource_name(&self) -> String {
        self.resource
            .clone()
            .unwrap_or_else(|| self.restype.clone().unwrap_or_default())
    }
}

/// Embeds payloads of one document.
pub(crate) struct Embedder<'a> {
    pub(crate) compiler: &'a Compiler,
    pub(crate) basedir: &'a Path,
    pub(crate) document: &'a Document,
    pub(crate) bindings: Option<&'a ParameterBindings>,
    /// Templates being compiled above this one.
    pub(crate) chain: &'a [PathBuf],
}

impl<'a> Embedder<'a> {
    /// Produce the embedded copy of the document.
    pub(crate) async fn embed(&self) -> Result<Document> {
        let mut out = Mapping::new();
        let scope = Scope::default();
        for (key, value) in self.document.as_mapping() {
            out.insert(key.clone(), self.walk(value, scope.child(key.as_str())).await?);
        }
        Ok(Document::from_mapping(out))
    }

    fn walk<'s>(&'s self, value: &'s Value, scope: Scope) -> BoxFuture<'s, Result<Value>> {
        Box::pin(async move {
            match value {
                Value::Mapping(map) => {
                    let scope = scope.enter(map);
                    let mut out = Mapping::new();
                    for (key, val) in map {
                        let replaced = match (scope.restype.as_deref(), key.as_str()) {
                            (Some(restype), Some(field)) => match table::lookup(restype, field) {
                                Some(transform) => self
                                    .apply(transform, val, map)
                                    .await
                                    .map_err(|source| CompileError::Payload {
                                        resource: scope.resource_name(),
                                        field: field.to_string(),
                                        source: Box::new(source),
                                    })?,
                                None => None,
                            },
                            _ => None,
                        };
                        let val = match replaced {
                            Some(val) => val,
                            None => self.walk(val, scope.child(key.as_str())).await?,
                        };
                        out.insert(key.clone(), val);
                    }
                    Ok(Value::Mapping(out))
                }
                Value::Sequence(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(self.walk(item, scope.clone()).await?);
                    }
                    Ok(Value::Sequence(out))
                }
                other => Ok(other.clone()),
            }
        })
    }

    /// Apply `transform` to `value`, found in `parent`. `None` leaves the
    /// field to the regular walk.
    async fn apply(
        &self,
        transform: FieldTransform,
        value: &Value,
        parent: &Mapping,
    ) -> Result<Option<Value>> {
        match transform {
            FieldTransform::UserData => self.user_data(value).await,
            FieldTransform::FunctionCode => self.function_code(value, parent).await,
            FieldTransform::NestedTemplate => self.nested_template(value).await,
        }
    }
}
