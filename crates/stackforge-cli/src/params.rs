//! Parameter input
//!
//! Bindings come from an optional YAML import (file or http(s) URL,
//! optionally scoped to one key) overlaid with `-p KEY=VALUE` flags.

use clap::Args;
use serde_yaml::{Mapping, Value};
use stackforge_compiler::Fetcher;
use stackforge_types::ParameterBindings;

use crate::error::{CliError, CliResult};

/// Parameter options shared by deploying commands
#[derive(Debug, Clone, Default, Args)]
pub struct ParamArgs {
    /// Template parameter as KEY=VALUE (or KEY:VALUE); repeatable
    #[arg(short = 'p', long = "param", value_name = "PARAM")]
    pub params: Vec<String>,

    /// Import parameters from a YAML file or http(s) URL
    #[arg(short = 'i', long = "import", value_name = "FILE")]
    pub import: Option<String>,

    /// Use the named map inside the imported file instead of the whole file
    #[arg(short = 'k', long = "import-key", value_name = "KEY", requires = "import")]
    pub import_key: Option<String>,
}

impl ParamArgs {
    /// Build bindings; command-line values override imported ones.
    pub async fn bindings(&self, fetcher: &dyn Fetcher) -> CliResult<ParameterBindings> {
        let mut bindings = match &self.import {
            Some(source) => {
                let text = read_source(source, fetcher).await?;
                imported(&text, source, self.import_key.as_deref())?
            }
            None => ParameterBindings::new(),
        };
        for param in &self.params {
            let (key, value) = split_param(param)?;
            bindings.insert(key, value);
        }
        Ok(bindings)
    }
}

async fn read_source(source: &str, fetcher: &dyn Fetcher) -> CliResult<String> {
    if source.starts_with("http://") || source.starts_with("https://") {
        let fetched = fetcher.fetch(source).await?;
        String::from_utf8(fetched.body.to_vec())
            .map_err(|_| CliError::InvalidInput(format!("{source} is not valid UTF-8")))
    } else {
        Ok(std::fs::read_to_string(source)?)
    }
}

fn imported(text: &str, source: &str, key: Option<&str>) -> CliResult<ParameterBindings> {
    let mapping = match serde_yaml::from_str::<Value>(text)? {
        Value::Null => Mapping::new(),
        Value::Mapping(mapping) => mapping,
        _ => {
            return Err(CliError::InvalidInput(format!(
                "Parameter file '{source}' must contain a map"
            )))
        }
    };
    let mapping = match key {
        Some(key) => match mapping.get(key) {
            Some(Value::Mapping(section)) => section.clone(),
            _ => {
                return Err(CliError::InvalidInput(format!(
                    "Missing parameter section '{key}' in '{source}'"
                )))
            }
        },
        None => mapping,
    };
    Ok(ParameterBindings::from_mapping(&mapping)?)
}

/// Split `KEY=VALUE` or `KEY:VALUE` at the first separator, trimming
/// whitespace around it.
pub fn split_param(param: &str) -> CliResult<(String, String)> {
    let invalid = || CliError::InvalidInput(format!("Parameter '{param}' must be KEY=VALUE"));
    let at = param.find(['=', ':']).ok_or_else(invalid)?;
    let key = param[..at].trim();
    if key.is_empty() {
        return Err(invalid());
    }
    Ok((key.to_string(), param[at + 1..].trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_param_forms() {
        assert_eq!(
            split_param("Env=prod").unwrap(),
            ("Env".to_string(), "prod".to_string())
        );
        assert_eq!(
            split_param("Env : prod").unwrap(),
            ("Env".to_string(), "prod".to_string())
        );
        assert_eq!(
            split_param("Url=http://host:80").unwrap(),
            ("Url".to_string(), "http://host:80".to_string())
        );
        assert!(split_param("novalue").is_err());
        assert!(split_param("=value").is_err());
    }

    #[test]
    fn test_import_key_scopes_the_map() {
        let text = "prod:\n  Size: large\nstaging:\n  Size: small\n";
        let bindings = imported(text, "params.yaml", Some("staging")).unwrap();
        assert_eq!(bindings.get("Size"), Some("small"));

        let err = imported(text, "params.yaml", Some("dev")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid input: Missing parameter section 'dev' in 'params.yaml'"
        );
    }

    #[test]
    fn test_empty_import_is_empty() {
        assert!(imported("", "params.yaml", None).unwrap().is_empty());
    }
}
