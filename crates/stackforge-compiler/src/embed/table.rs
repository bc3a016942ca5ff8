//! Payload field dispatch table

use stackforge_types::resource_types;

/// Transform applied to a payload-bearing field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldTransform {
    /// `UserData: {File | FileTemplate: path}`
    UserData,
    /// `Code: {URL: url | Path: path}`
    FunctionCode,
    /// `Properties: {Template: path, ...}`
    NestedTemplate,
}

impl FieldTransform {
    /// Keys of the field value that hold local file paths.
    pub fn file_keys(self) -> &'static [&'static str] {
        match self {
            FieldTransform::UserData => &["File", "FileTemplate"],
            FieldTransform::FunctionCode => &["Path"],
            FieldTransform::NestedTemplate => &["Template"],
        }
    }
}

/// (resource type, field, transform)
const TRANSFORMS: &[(&str, &str, FieldTransform)] = &[
    (
        resource_types::LAUNCH_CONFIGURATION,
        "UserData",
        FieldTransform::UserData,
    ),
    (
        resource_types::LAUNCH_TEMPLATE,
        "UserData",
        FieldTransform::UserData,
    ),
    (
        resource_types::LAMBDA_FUNCTION,
        "Code",
        FieldTransform::FunctionCode,
    ),
    (
        resource_types::STACK,
        "Properties",
        FieldTransform::NestedTemplate,
    ),
];

/// Transform for `field` within a resource of type `resource_type`.
pub fn lookup(resource_type: &str, field: &str) -> Option<FieldTransform> {
    TRANSFORMS
        .iter()
        .find(|(t, f, _)| *t == resource_type && *f == field)
        .map(|(_, _, transform)| *transform)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(
            lookup("AWS::Lambda::Function", "Code"),
            Some(FieldTransform::FunctionCode)
        );
        assert_eq!(
            lookup("AWS::EC2::LaunchTemplate", "UserData"),
            Some(FieldTransform::UserData)
        );
        assert_eq!(lookup("AWS::Lambda::Function", "Properties"), None);
        assert_eq!(lookup("AWS::S3::Bucket", "Code"), None);
    }
}
