//! Include merging
//!
//! Folds a fully loaded included document into its parent:
//!
//! - `AWSTemplateFormatVersion` and `Description` are ignored
//! - `Parameters` are merged first. A parameter that already exists in the
//!   parent with the same default is skipped; with a different default it
//!   is dropped when marked `Override: false`, otherwise renamed to
//!   `<include-key>z<name>` and every reference to it in the include is
//!   rewritten. Two includes sharing a key may only rename a parameter to
//!   the same default
//! - Mapping categories merge key-wise and a key present on both sides is
//!   an error; sequence categories are concatenated; scalar categories can
//!   only be taken when the parent has none

use std::collections::HashMap;
use std::path::Path;

use serde_yaml::{Mapping, Value};
use stackforge_types::{categories, Document};
use tracing::info;

use crate::error::{CompileError, Result};

/// Parameter renames applied to one include.
pub type Rewrites = HashMap<String, String>;

/// Disambiguation key for an include, derived from its directory.
///
/// Every `/x` becomes `X` and non-word characters are dropped, so
/// `./db/template.yaml` gives `Db`.
pub fn include_key(basedir: &Path, include: &str) -> String {
    let joined = format!("{}/{}", basedir.display(), include);
    let dir = Path::new(&joined)
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();

    let mut key = String::with_capacity(dir.len());
    let mut chars = dir.chars();
    while let Some(c) = chars.next() {
        if c == '/' {
            if let Some(next) = chars.next() {
                key.extend(next.to_uppercase());
            }
        } else {
            key.push(c);
        }
    }
    key.retain(|c| c.is_alphanumeric() || c == '_');
    key
}

/// Merge `included` into `parent`.
///
/// `include` names the include in error messages; `key` is its
/// [`include_key`].
pub fn merge_include(
    parent: &mut Document,
    mut included: Document,
    include: &str,
    key: &str,
) -> Result<()> {
    let rewrites = match included.remove(categories::PARAMETERS) {
        Some(params) => merge_parameters(parent, params, include, key)?,
        None => Rewrites::new(),
    };

    for (category, value) in included.into_mapping() {
        let Some(name) = category.as_str() else {
            continue;
        };
        if categories::ROOT_ONLY.contains(&name) {
            continue;
        }
        merge_category(parent, name, value, include, &rewrites)?;
    }
    Ok(())
}

fn merge_parameters(
    parent: &mut Document,
    params: Value,
    include: &str,
    key: &str,
) -> Result<Rewrites> {
    let Value::Mapping(params) = params else {
        return Err(CompileError::ConflictingTypes {
            include: include.to_string(),
            category: categories::PARAMETERS.to_string(),
        });
    };

    if parent.get(categories::PARAMETERS).is_none() {
        parent.insert(categories::PARAMETERS, Value::Mapping(Mapping::new()));
    }
    let Some(Value::Mapping(existing)) = parent.get_mut(categories::PARAMETERS) else {
        return Err(CompileError::ConflictingTypes {
            include: include.to_string(),
            category: categories::PARAMETERS.to_string(),
        });
    };

    let mut rewrites = Rewrites::new();
    for (name, param) in params {
        let Some(current) = existing.get(&name) else {
            existing.insert(name, param);
            continue;
        };
        if current.get("Default") == param.get("Default") {
            continue;
        }
        if param.get("Override") == Some(&Value::Bool(false)) {
            continue;
        }

        let Some(name) = name.as_str() else {
            continue;
        };
        let renamed = format!("{key}z{name}");
        match existing.get(renamed.as_str()) {
            Some(taken) if taken.get("Default") != param.get("Default") => {
                return Err(CompileError::DuplicateItem {
                    include: include.to_string(),
                    category: categories::PARAMETERS.to_string(),
                    key: renamed,
                });
            }
            Some(_) => {}
            None => {
                info!(
                    parameter = %name,
                    renamed = %renamed,
                    "Rewriting conflicting parameter"
                );
                existing.insert(Value::String(renamed.clone()), param);
            }
        }
        rewrites.insert(name.to_string(), renamed);
    }
    Ok(rewrites)
}

fn merge_category(
    parent: &mut Document,
    category: &str,
    value: Value,
    include: &str,
    rewrites: &Rewrites,
) -> Result<()> {
    let conflicting = || CompileError::ConflictingTypes {
        include: include.to_string(),
        category: category.to_string(),
    };

    match value {
        Value::Mapping(items) => {
            if parent.get(category).is_none() {
                parent.insert(category, Value::Mapping(Mapping::new()));
            }
            let Some(Value::Mapping(existing)) = parent.get_mut(category) else {
                return Err(conflicting());
            };
            if let Some(dup) = items.keys().find(|k| existing.contains_key(*k)) {
                return Err(CompileError::DuplicateItem {
                    include: include.to_string(),
                    category: category.to_string(),
                    key: describe_key(dup),
                });
            }
            for (k, v) in items {
                existing.insert(k, rewrite_references(v, rewrites));
            }
        }
        Value::Sequence(items) => {
            let items = items
                .into_iter()
                .map(|item| rewrite_references(item, rewrites));
            match parent.get_mut(category) {
                None => {
                    parent.insert(category, Value::Sequence(items.collect()));
                }
                Some(Value::Sequence(existing)) => existing.extend(items),
                Some(_) => return Err(conflicting()),
            }
        }
        other => {
            if parent.contains(category) {
                return Err(CompileError::Unmergeable {
                    include: include.to_string(),
                    category: category.to_string(),
                });
            }
            parent.insert(category, rewrite_references(other, rewrites));
        }
    }
    Ok(())
}

fn describe_key(key: &Value) -> String {
    match key.as_str() {
        Some(s) => s.to_string(),
        None => serde_yaml::to_string(key)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Rewrite renamed parameter references in `value`.
///
/// Covers `Ref: Name` and `${Name}` placeholders in `Fn::Sub` strings.
/// Placeholders bound by a `Fn::Sub` variable map are left alone.
pub fn rewrite_references(value: Value, rewrites: &Rewrites) -> Value {
    if rewrites.is_empty() {
        return value;
    }
    match value {
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| {
                    let v = match k.as_str() {
                        Some("Ref") => match v.as_str().and_then(|r| rewrites.get(r)) {
                            Some(renamed) => Value::String(renamed.clone()),
                            None => v,
                        },
                        Some("Fn::Sub") => rewrite_sub(v, rewrites),
                        _ => rewrite_references(v, rewrites),
                    };
                    (k, v)
                })
                .collect(),
        ),
        Value::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(|item| rewrite_references(item, rewrites))
                .collect(),
        ),
        other => other,
    }
}

fn rewrite_sub(value: Value, rewrites: &Rewrites) -> Value {
    match value {
        Value::String(text) => Value::String(rewrite_placeholders(&text, rewrites, None)),
        Value::Sequence(mut items) if items.len() == 2 => {
            let bound = items[1].as_mapping().cloned();
            if let Value::String(text) = &items[0] {
                items[0] = Value::String(rewrite_placeholders(text, rewrites, bound.as_ref()));
            }
            items[1] = rewrite_references(items[1].clone(), rewrites);
            Value::Sequence(items)
        }
        other => rewrite_references(other, rewrites),
    }
}

fn rewrite_placeholders(text: &str, rewrites: &Rewrites, bound: Option<&Mapping>) -> String {
    let mut out = text.to_string();
    for (name, renamed) in rewrites {
        if bound.is_some_and(|vars| vars.contains_key(name.as_str())) {
            continue;
        }
        out = out.replace(&format!("${{{name}}}"), &format!("${{{renamed}}}"));
    }
    out
}
