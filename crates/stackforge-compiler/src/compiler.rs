//! Template compiler
//!
//! Compilation runs in two phases. [`Compiler::load`] expands includes
//! recursively, one [`Template`] per file, and merges them into a single
//! document. [`Compiler::compile`] then embeds payloads into that document
//! in one pass.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_yaml::Value;
use stackforge_store::ArtifactStore;
use stackforge_types::{Document, ParameterBindings};
use tracing::{info, instrument};

use crate::embed::{rebase_file_references, Embedder};
use crate::error::{CompileError, Result};
use crate::fetch::Fetcher;
use crate::loader::Template;
use crate::merge::{include_key, merge_include};
use crate::options::CompileOptions;

/// Template compiler.
pub struct Compiler {
    store: ArtifactStore,
    fetcher: Arc<dyn Fetcher>,
    options: CompileOptions,
}

impl Compiler {
    pub fn new(store: ArtifactStore, fetcher: Arc<dyn Fetcher>, options: CompileOptions) -> Self {
        Self {
            store,
            fetcher,
            options,
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn fetcher(&self) -> &dyn Fetcher {
        self.fetcher.as_ref()
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Load the template at `path` with all includes merged.
    ///
    /// Nothing is fetched or uploaded.
    pub fn load(&self, path: &Path) -> Result<Template> {
        self.load_tree(path, &mut Vec::new())
    }

    /// Compile the template at `path`.
    ///
    /// With `bindings` set, references in payload fields must resolve from
    /// the bindings or the template's defaults. Without, they are left in
    /// place.
    #[instrument(skip(self, path, bindings), fields(path = %path.display()))]
    pub async fn compile(
        &self,
        path: &Path,
        bindings: Option<&ParameterBindings>,
    ) -> Result<Document> {
        self.compile_in(path, bindings, Vec::new()).await
    }

    /// Compile the template at `path` to YAML text.
    pub async fn compile_to_yaml(
        &self,
        path: &Path,
        bindings: Option<&ParameterBindings>,
    ) -> Result<String> {
        Ok(self.compile(path, bindings).await?.to_yaml()?)
    }

    /// Parameter names and defaults of the merged template.
    pub fn parameters(&self, path: &Path) -> Result<Vec<(String, Option<Value>)>> {
        let template = self.load(path)?;
        let params = template
            .document()
            .parameters()
            .map(|params| {
                params
                    .iter()
                    .filter_map(|(name, param)| {
                        let name = name.as_str()?.to_string();
                        Some((name, param.get("Default").cloned()))
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(params)
    }

    /// Compile a nested template with its own defaults only.
    pub(crate) fn compile_nested(
        &self,
        path: PathBuf,
        chain: Vec<PathBuf>,
    ) -> BoxFuture<'_, Result<String>> {
        Box::pin(async move {
            let bindings = ParameterBindings::new();
            let document = self.compile_in(&path, Some(&bindings), chain).await?;
            Ok(document.to_yaml()?)
        })
    }

    async fn compile_in(
        &self,
        path: &Path,
        bindings: Option<&ParameterBindings>,
        mut chain: Vec<PathBuf>,
    ) -> Result<Document> {
        let template = self.load_tree(path, &mut chain)?;
        chain.push(identity(template.path()));

        let embedder = Embedder {
            compiler: self,
            basedir: template.basedir(),
            document: template.document(),
            bindings,
            chain: &chain,
        };
        embedder.embed().await
    }

    fn load_tree(&self, path: &Path, chain: &mut Vec<PathBuf>) -> Result<Template> {
        let mut template = Template::load(path, &self.options)?;

        let id = identity(template.path());
        if chain.contains(&id) {
            let chain = chain
                .iter()
                .chain(std::iter::once(&id))
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(" -> ");
            return Err(CompileError::IncludeCycle { chain });
        }

        chain.push(id);
        let expanded = self.expand_includes(&mut template, chain);
        chain.pop();
        expanded?;
        Ok(template)
    }

    fn expand_includes(&self, template: &mut Template, chain: &mut Vec<PathBuf>) -> Result<()> {
        let Some((_, includes)) = template.document_mut().take_includes() else {
            return Ok(());
        };
        let items = match includes {
            Value::Sequence(items) => items,
            Value::Null => Vec::new(),
            other => vec![other],
        };

        let basedir = template.basedir().to_path_buf();
        for item in items {
            let Some(include) = item.as_str() else {
                return Err(CompileError::InvalidInclude {
                    path: template.path().to_path_buf(),
                    item: format!("{item:?}"),
                });
            };

            info!(include = %include, "Loading include");
            let included = self.load_tree(&basedir.join(include), chain)?;
            let reldir = included
                .basedir()
                .strip_prefix(&basedir)
                .unwrap_or(included.basedir())
                .to_path_buf();
            let document = rebase_file_references(included.into_document(), &reldir);

            let key = include_key(&basedir, include);
            merge_include(template.document_mut(), document, include, &key)?;
        }
        Ok(())
    }
}

/// Identity of a template file for cycle detection.
fn identity(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
