//! File reference rebasing
//!
//! Payload fields name files relative to the document that declares them.
//! Once an included document is merged, its fields are embedded from the
//! parent's directory, so their paths are first rebased onto the
//! include's directory.

use std::path::Path;

use serde_yaml::{Mapping, Value};
use stackforge_types::Document;

use super::table;

/// Prefix relative file paths in payload fields of `document` with `dir`.
pub fn rebase_file_references(document: Document, dir: &Path) -> Document {
    if dir.as_os_str().is_empty() || dir == Path::new(".") {
        return document;
    }
    match rebase(Value::Mapping(document.into_mapping()), dir, None) {
        Value::Mapping(root) => Document::from_mapping(root),
        _ => Document::new(),
    }
}

fn rebase(value: Value, dir: &Path, restype: Option<&str>) -> Value {
    match value {
        Value::Mapping(map) => {
            let own_type = map.get("Type").and_then(Value::as_str).map(str::to_string);
            let restype = restype.or(own_type.as_deref());
            let mut out = Mapping::new();
            for (key, val) in map {
                let transform = restype
                    .zip(key.as_str())
                    .and_then(|(t, k)| table::lookup(t, k));
                let val = match (transform, val) {
                    (Some(transform), Value::Mapping(field)) => {
                        Value::Mapping(rebase_field(field, transform.file_keys(), dir))
                    }
                    (_, val) => rebase(val, dir, restype),
                };
                out.insert(key, val);
            }
            Value::Mapping(out)
        }
        Value::Sequence(items) => Value::Sequence(
            items
                .into_iter()
                .map(|item| rebase(item, dir, restype))
                .collect(),
        ),
        other => other,
    }
}

fn rebase_field(mut field: Mapping, keys: &[&str], dir: &Path) -> Mapping {
    for key in keys {
        if let Some(Value::String(path)) = field.get_mut(*key) {
            *path = dir.join(path.as_str()).to_string_lossy().into_owned();
        }
    }
    field
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_paths_are_rebased() {
        let doc = Document::from_value(
            serde_yaml::from_str(
                r#"
Resources:
  Fn:
    Type: AWS::Lambda::Function
    Properties:
      Code: { Path: src }
  Net:
    Type: AWS::CloudFormation::Stack
    Properties:
      Template: /abs/net.yaml
  Bucket:
    Type: AWS::S3::Bucket
    Properties:
      Code: { Path: untouched }
"#,
            )
            .unwrap(),
        )
        .unwrap();

        let doc = rebase_file_references(doc, Path::new("lambda"));
        let res = doc.get("Resources").unwrap();
        assert_eq!(res["Fn"]["Properties"]["Code"]["Path"].as_str(), Some("lambda/src"));
        assert_eq!(
            res["Net"]["Properties"]["Template"].as_str(),
            Some("/abs/net.yaml")
        );
        assert_eq!(
            res["Bucket"]["Properties"]["Code"]["Path"].as_str(),
            Some("untouched")
        );
    }
}
