//! `UserData` from file

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_yaml::{Mapping, Value};

use super::Embedder;
use crate::cloud_init::{is_cloud_config, CloudInit};
use crate::error::{CompileError, Result};

impl Embedder<'_> {
    /// `{File: path}` becomes the base64 user data; `{FileTemplate: path}`
    /// becomes `Fn::Base64` of `Fn::Sub` over the compiled text.
    pub(super) async fn user_data(&self, value: &Value) -> Result<Option<Value>> {
        let Value::Mapping(field) = value else {
            return Ok(None);
        };

        if let Some(file) = field.get("File").and_then(Value::as_str) {
            let path = self.basedir.join(file);
            let raw = std::fs::read(&path).map_err(|e| CompileError::read(&path, e))?;
            let payload = if is_cloud_config(&path, &String::from_utf8_lossy(&raw)) {
                let options = self.compiler.options();
                CloudInit::load(&path)?
                    .encode(true, options.max_user_data_size, self.compiler.store())
                    .await?
                    .into_bytes()
            } else {
                raw
            };
            return Ok(Some(Value::String(STANDARD.encode(payload))));
        }

        if let Some(file) = field.get("FileTemplate").and_then(Value::as_str) {
            let path = self.basedir.join(file);
            let text = std::fs::read_to_string(&path).map_err(|e| CompileError::read(&path, e))?;
            let text = if is_cloud_config(&path, &text) {
                CloudInit::load(&path)?.compile()?
            } else {
                text
            };
            return Ok(Some(function("Fn::Base64", function("Fn::Sub", Value::String(text)))));
        }

        Ok(None)
    }
}

fn function(name: &str, arg: Value) -> Value {
    let mut map = Mapping::new();
    map.insert(Value::from(name), arg);
    Value::Mapping(map)
}
