//! Nested stack templates

use serde_yaml::Value;
use stackforge_store::artifact_name;
use tracing::info;

use super::Embedder;
use crate::error::Result;

impl Embedder<'_> {
    /// Compile `Properties.Template` on its own, upload it and replace it
    /// with `TemplateURL`.
    pub(super) async fn nested_template(&self, value: &Value) -> Result<Option<Value>> {
        let Value::Mapping(props) = value else {
            return Ok(None);
        };
        let Some(template) = props.get("Template").and_then(Value::as_str) else {
            return Ok(None);
        };

        let path = self.basedir.join(template);
        info!(template = %path.display(), "Compiling nested template");
        let text = self
            .compiler
            .compile_nested(path, self.chain.to_vec())
            .await?;
        let locator = self
            .compiler
            .store()
            .upload(&artifact_name("yaml"), text.as_bytes(), "text/yaml", false)
            .await?;

        let mut props = props.clone();
        props.remove("Template");
        props.insert(Value::from("TemplateURL"), Value::String(locator.url));
        Ok(Some(Value::Mapping(props)))
    }
}
