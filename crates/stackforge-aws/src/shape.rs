//! Conversions from SDK shapes and errors.
//!
//! SDK accessors return either plain values or `Option`s depending on
//! whether a member is required in the service model. The small traits
//! here accept both so that record conversion reads the same everywhere.

use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_cloudformation::primitives::DateTime as SdkDateTime;
use chrono::{DateTime, Utc};
use stackforge_deploy::ServiceError;

pub(crate) trait Text {
    fn into_text(self) -> Option<String>;
}

impl<T: AsRef<str> + ?Sized> Text for &T {
    fn into_text(self) -> Option<String> {
        Some(self.as_ref().to_string())
    }
}

impl<T: AsRef<str> + ?Sized> Text for Option<&T> {
    fn into_text(self) -> Option<String> {
        self.map(|v| v.as_ref().to_string())
    }
}

/// Optional string member (also enum members) as an owned string.
pub(crate) fn text(value: impl Text) -> Option<String> {
    value.into_text()
}

/// Required string member; missing values become empty.
pub(crate) fn text_or_empty(value: impl Text) -> String {
    value.into_text().unwrap_or_default()
}

pub(crate) trait Items<'a, T> {
    fn into_items(self) -> &'a [T];
}

impl<'a, T> Items<'a, T> for &'a [T] {
    fn into_items(self) -> &'a [T] {
        self
    }
}

impl<'a, T> Items<'a, T> for Option<&'a [T]> {
    fn into_items(self) -> &'a [T] {
        self.unwrap_or_default()
    }
}

/// List member as a slice.
pub(crate) fn items<'a, T: 'a>(value: impl Items<'a, T>) -> &'a [T] {
    value.into_items()
}

pub(crate) trait Nested<'a, T> {
    fn into_nested(self) -> Option<&'a T>;
}

impl<'a, T> Nested<'a, T> for &'a T {
    fn into_nested(self) -> Option<&'a T> {
        Some(self)
    }
}

impl<'a, T> Nested<'a, T> for Option<&'a T> {
    fn into_nested(self) -> Option<&'a T> {
        self
    }
}

/// Structure member as an option.
pub(crate) fn nested<'a, T: 'a>(value: impl Nested<'a, T>) -> Option<&'a T> {
    value.into_nested()
}

pub(crate) trait Count {
    fn into_count(self) -> Option<i32>;
}

impl Count for i32 {
    fn into_count(self) -> Option<i32> {
        Some(self)
    }
}

impl Count for Option<i32> {
    fn into_count(self) -> Option<i32> {
        self
    }
}

pub(crate) fn count(value: impl Count) -> Option<i32> {
    value.into_count()
}

pub(crate) trait Stamp {
    fn into_stamp(self) -> Option<DateTime<Utc>>;
}

impl Stamp for &SdkDateTime {
    fn into_stamp(self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.secs(), self.subsec_nanos())
    }
}

impl Stamp for Option<&SdkDateTime> {
    fn into_stamp(self) -> Option<DateTime<Utc>> {
        self.and_then(Stamp::into_stamp)
    }
}

/// Timestamp member as a chrono time; missing or out of range becomes the
/// epoch.
pub(crate) fn stamp(value: impl Stamp) -> DateTime<Utc> {
    value.into_stamp().unwrap_or_default()
}

const THROTTLING_CODES: [&str; 4] = [
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
];

const AUTH_CODES: [&str; 7] = [
    "ExpiredToken",
    "ExpiredTokenException",
    "InvalidClientTokenId",
    "UnrecognizedClientException",
    "AccessDenied",
    "AccessDeniedException",
    "SignatureDoesNotMatch",
];

/// Classify a service error code.
pub(crate) fn classify_code(code: Option<&str>, message: String) -> ServiceError {
    match code {
        Some(code) if THROTTLING_CODES.contains(&code) => ServiceError::Throttled(message),
        Some(code) if AUTH_CODES.contains(&code) => ServiceError::Auth(message),
        Some("ValidationError") => ServiceError::Validation(message),
        Some(code) => ServiceError::Other(format!("{code}: {message}")),
        None => ServiceError::Other(message),
    }
}

/// Classify an SDK error for the engine.
pub(crate) fn classify<E, R>(err: SdkError<E, R>) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: std::fmt::Debug,
{
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            ServiceError::Network(DisplayErrorContext(&err).to_string())
        }
        SdkError::ServiceError(_) => {
            let message = err
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| DisplayErrorContext(&err).to_string());
            classify_code(err.code(), message)
        }
        _ => {
            let message = DisplayErrorContext(&err).to_string();
            if message.contains("credentials") || message.contains("token") {
                ServiceError::Auth(message)
            } else {
                ServiceError::Other(message)
            }
        }
    }
}

/// Any SDK error as display text.
pub(crate) fn describe<E, R>(err: SdkError<E, R>) -> String
where
    E: std::error::Error + 'static,
    R: std::fmt::Debug,
{
    DisplayErrorContext(&err).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_classification() {
        assert!(matches!(
            classify_code(Some("Throttling"), "Rate exceeded".into()),
            ServiceError::Throttled(_)
        ));
        assert!(matches!(
            classify_code(Some("ExpiredToken"), "expired".into()),
            ServiceError::Auth(_)
        ));
        let missing = classify_code(
            Some("ValidationError"),
            "Stack with id web does not exist".into(),
        );
        assert!(missing.is_not_found());
        assert!(matches!(
            classify_code(Some("LimitExceeded"), "too many".into()),
            ServiceError::Other(msg) if msg == "LimitExceeded: too many"
        ));
    }

    #[test]
    fn test_optional_and_required_members_read_alike() {
        let required: &str = "web";
        let optional: Option<&str> = Some("web");
        assert_eq!(text(required), text(optional));
        assert_eq!(text(None::<&str>), None);

        let list: Vec<i32> = vec![1, 2];
        assert_eq!(items(list.as_slice()).len(), 2);
        assert!(items(None::<&[i32]>).is_empty());

        assert_eq!(count(3), count(Some(3)));
    }

    #[test]
    fn test_timestamps_convert() {
        let at = SdkDateTime::from_secs(1_714_557_600);
        assert_eq!(stamp(&at).timestamp(), 1_714_557_600);
        assert_eq!(stamp(None::<&SdkDateTime>).timestamp(), 0);
    }
}
