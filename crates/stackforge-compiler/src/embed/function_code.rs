//! Lambda function code

use serde_yaml::{Mapping, Value};
use stackforge_store::{artifact_name, Locator};
use tracing::{debug, info};

use super::package::zip_directory;
use super::Embedder;
use crate::error::{CompileError, Result};
use crate::resolve::{Resolved, Resolver};

/// Runtimes that accept inline `ZipFile` code.
const INLINE_RUNTIMES: &[&str] = &["nodejs", "python"];

impl Embedder<'_> {
    /// Replace `Code: {URL}` or `Code: {Path}` with an uploaded artifact.
    ///
    /// A URL that is still a reference after resolution is left for an
    /// enclosing compilation.
    pub(super) async fn function_code(
        &self,
        value: &Value,
        properties: &Mapping,
    ) -> Result<Option<Value>> {
        let Value::Mapping(code) = value else {
            return Ok(None);
        };

        if let Some(url) = code.get("URL") {
            let resolver = Resolver::new(self.bindings, self.document);
            let url = match resolver.resolve(url)? {
                Resolved::Deferred(_) => {
                    debug!("Function code URL deferred to enclosing template");
                    return Ok(None);
                }
                Resolved::Value(Value::String(url)) => url,
                Resolved::Value(other) => {
                    return Err(CompileError::InvalidReference(format!("{other:?}")))
                }
            };
            let locator = self.fetch_code(&url).await?;
            return Ok(Some(s3_location(&locator)));
        }

        if let Some(path) = code.get("Path").and_then(Value::as_str) {
            let path = self.basedir.join(path);
            let store = self.compiler.store();

            if path.is_dir() {
                info!(path = %path.display(), "Packaging function code");
                let archive = zip_directory(&path)?;
                let locator = store
                    .upload(&artifact_name("zip"), &archive, "application/zip", false)
                    .await?;
                return Ok(Some(s3_location(&locator)));
            }

            let content = std::fs::read(&path).map_err(|e| CompileError::read(&path, e))?;
            let runtime = properties
                .get("Runtime")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if self.compiler.options().inline_function_files && supports_inline(runtime) {
                let mut inline = Mapping::new();
                inline.insert(
                    Value::from("ZipFile"),
                    Value::String(String::from_utf8_lossy(&content).into_owned()),
                );
                return Ok(Some(Value::Mapping(inline)));
            }

            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or_default();
            let locator = store
                .upload(&artifact_name(ext), &content, mime_for(ext), false)
                .await?;
            return Ok(Some(s3_location(&locator)));
        }

        Ok(None)
    }

    async fn fetch_code(&self, url: &str) -> Result<Locator> {
        let fetcher = self.compiler.fetcher();
        let store = self.compiler.store();

        let validator = fetcher.validator(url).await?;
        if let Some(etag) = &validator {
            if let Some(locator) = store.find_validated(&cache_key(url, etag)).await? {
                debug!(url = %url, key = %locator.key, "Re-using downloaded function code");
                return Ok(locator);
            }
        }

        info!(url = %url, "Downloading function code");
        let fetched = fetcher.fetch(url).await?;
        let name = artifact_name(url_extension(url));
        let content_type = fetched
            .content_type
            .clone()
            .unwrap_or_else(|| "application/zip".to_string());

        let locator = match fetched.etag.as_ref().or(validator.as_ref()) {
            Some(etag) => {
                store
                    .upload_validated(&cache_key(url, etag), &name, &fetched.body, &content_type)
                    .await?
            }
            None => {
                store
                    .upload(&name, &fetched.body, &content_type, false)
                    .await?
            }
        };
        info!(url = %locator.url, "Uploaded function code");
        Ok(locator)
    }
}

fn supports_inline(runtime: &str) -> bool {
    INLINE_RUNTIMES.iter().any(|prefix| runtime.starts_with(prefix))
}

fn cache_key(url: &str, etag: &str) -> String {
    format!("{url}{etag}")
}

/// Extension of the last path segment of `url`, `zip` when there is none.
fn url_extension(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().unwrap_or(path);
    match segment.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext,
        _ => "zip",
    }
}

fn mime_for(ext: &str) -> &'static str {
    match ext {
        "zip" => "application/zip",
        "jar" => "application/java-archive",
        "js" | "mjs" => "application/javascript",
        "py" => "text/x-python",
        _ => "application/octet-stream",
    }
}

fn s3_location(locator: &Locator) -> Value {
    let mut map = Mapping::new();
    map.insert(Value::from("S3Bucket"), Value::String(locator.bucket.clone()));
    map.insert(Value::from("S3Key"), Value::String(locator.key.clone()));
    Value::Mapping(map)
}
