//! Cloud-init document compiler
//!
//! Expands a cloud-config document so that it carries every file it
//! references:
//!
//! - `write_files` entries with a `file` key get the file's content inline,
//!   base64 encoded
//! - `write_directories` entries (`source`, `target`) expand into one
//!   `write_files` entry per file under `source`, keeping permissions
//!
//! The result must fit the instance user-data limit. [`CloudInit::encode`]
//! compresses oversized output and, failing that, uploads it and returns an
//! `#include` document pointing at the artifact.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_yaml::{Mapping, Value};
use stackforge_store::{artifact_name, gzip, ArtifactStore, Locator};
use tracing::{debug, info};

use crate::error::{CompileError, Result};
use crate::loader::base_dir;

const HEADER: &str = "#cloud-config";

/// Whether a user-data file should go through the cloud-init compiler.
pub fn is_cloud_config(path: &Path, text: &str) -> bool {
    let by_ext = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("init" | "yaml" | "yml")
    );
    by_ext || text.starts_with(HEADER)
}

/// Encoded user data.
#[derive(Debug, Clone, PartialEq)]
pub enum Encoded {
    /// Payload small enough to embed, possibly gzipped.
    Inline(Vec<u8>),
    /// Payload uploaded as an artifact.
    Include(Locator),
}

impl Encoded {
    /// Bytes to place in the user-data field.
    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Encoded::Inline(bytes) => bytes,
            Encoded::Include(locator) => format!("#include\n{}", locator.url).into_bytes(),
        }
    }
}

/// A loaded cloud-config document.
#[derive(Debug, Clone)]
pub struct CloudInit {
    path: PathBuf,
    document: Mapping,
}

impl CloudInit {
    /// Load the cloud-config document at `path`.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        debug!(path = %path.display(), "Loading cloud-init");
        let text = std::fs::read_to_string(&path).map_err(|e| CompileError::read(&path, e))?;
        let document = match serde_yaml::from_str(&text)? {
            Value::Null => Mapping::new(),
            Value::Mapping(map) => map,
            _ => {
                return Err(CompileError::CloudInit {
                    path,
                    message: "cloud-config must be a mapping".to_string(),
                })
            }
        };
        Ok(Self { path, document })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Compile to cloud-config text with every referenced file embedded.
    pub fn compile(&self) -> Result<String> {
        let basedir = base_dir(&self.path);
        let mut document = self.document.clone();

        let mut files = Vec::new();
        if let Some(entries) = document.remove("write_files") {
            for entry in sequence(entries, "write_files", &self.path)? {
                files.push(self.embed_file_entry(entry, &basedir)?);
            }
        }
        if let Some(dirs) = document.remove("write_directories") {
            for dir in sequence(dirs, "write_directories", &self.path)? {
                let source = dir.get("source").and_then(Value::as_str);
                let target = dir.get("target").and_then(Value::as_str);
                let (Some(source), Some(target)) = (source, target) else {
                    return Err(self.error("write_directories entries need source and target"));
                };
                let realdir = basedir.join(source);
                if !realdir.is_dir() {
                    return Err(self.error(format!(
                        "references missing directory {}",
                        realdir.display()
                    )));
                }
                self.read_dir_files(&realdir, target, &mut files)?;
            }
        }
        if !files.is_empty() {
            document.insert(Value::from("write_files"), Value::Sequence(files));
        }

        Ok(format!("{HEADER}\n{}", serde_yaml::to_string(&document)?))
    }

    /// Compile and fit the output into `max_size` bytes.
    pub async fn encode(
        &self,
        allow_compression: bool,
        max_size: usize,
        store: &ArtifactStore,
    ) -> Result<Encoded> {
        let mut payload = self.compile()?.into_bytes();
        if allow_compression && payload.len() > max_size {
            payload = gzip(&payload).map_err(|e| CompileError::read(&self.path, e))?;
        }
        if payload.len() <= max_size {
            return Ok(Encoded::Inline(payload));
        }

        let locator = store
            .upload(&artifact_name("init"), &payload, "text/cloud-config", false)
            .await?;
        info!(url = %locator.url, "Wrote cloud config");
        Ok(Encoded::Include(locator))
    }

    /// Base64 of the encoded output, for a user-data field.
    pub async fn to_base64(&self, max_size: usize, store: &ArtifactStore) -> Result<String> {
        let encoded = self.encode(true, max_size, store).await?;
        Ok(STANDARD.encode(encoded.into_bytes()))
    }

    fn embed_file_entry(&self, entry: Value, basedir: &Path) -> Result<Value> {
        let Value::Mapping(mut fields) = entry else {
            return Ok(entry);
        };
        let Some(file) = fields.remove("file") else {
            return Ok(Value::Mapping(fields));
        };
        let Some(file) = file.as_str() else {
            return Err(self.error("write_files file must be a path"));
        };

        let content = std::fs::read(basedir.join(file)).map_err(|e| {
            let target = fields.get("path").and_then(Value::as_str).unwrap_or(file);
            self.error(format!("error loading embedded file for {target}: {e}"))
        })?;
        encode_content(&mut fields, &content);
        Ok(Value::Mapping(fields))
    }

    fn read_dir_files(&self, source: &Path, target: &str, out: &mut Vec<Value>) -> Result<()> {
        let mut entries: Vec<_> = std::fs::read_dir(source)
            .map_err(|e| CompileError::read(source, e))?
            .collect::<std::io::Result<_>>()
            .map_err(|e| CompileError::read(source, e))?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let target_path = format!("{}/{}", target, entry.file_name().to_string_lossy());
            if path.is_dir() {
                self.read_dir_files(&path, &target_path, out)?;
                continue;
            }
            let content = std::fs::read(&path).map_err(|e| CompileError::read(&path, e))?;
            let mut fields = Mapping::new();
            fields.insert(Value::from("path"), Value::from(target_path));
            fields.insert(Value::from("permissions"), Value::from(permissions(&path)?));
            encode_content(&mut fields, &content);
            out.push(Value::Mapping(fields));
        }
        Ok(())
    }

    fn error(&self, message: impl Into<String>) -> CompileError {
        CompileError::CloudInit {
            path: self.path.clone(),
            message: message.into(),
        }
    }
}

fn sequence(value: Value, key: &str, path: &Path) -> Result<Vec<Value>> {
    match value {
        Value::Sequence(items) => Ok(items),
        Value::Null => Ok(Vec::new()),
        _ => Err(CompileError::CloudInit {
            path: path.to_path_buf(),
            message: format!("{key} must be a list"),
        }),
    }
}

fn encode_content(fields: &mut Mapping, content: &[u8]) {
    fields.insert(Value::from("encoding"), Value::from("base64"));
    fields.insert(Value::from("content"), Value::from(STANDARD.encode(content)));
}

#[cfg(unix)]
fn permissions(path: &Path) -> Result<String> {
    use std::os::unix::fs::PermissionsExt;
    let mode = std::fs::metadata(path)
        .map_err(|e| CompileError::read(path, e))?
        .permissions()
        .mode();
    Ok(format!("{:04o}", mode & 0o7777))
}

#[cfg(not(unix))]
fn permissions(_path: &Path) -> Result<String> {
    Ok("0644".to_string())
}
