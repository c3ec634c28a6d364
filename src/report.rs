//! A plain snapshot of an error for logs and API responses.

use alloc::{
    format,
    string::{String, ToString},
    vec::Vec,
};

use crate::{Category, Error, Payload};

/// Everything a serializer needs to know about an [`Error`], with the
/// category resolved and stacks rendered.
///
/// With the `serde` feature this serializes as
///
/// ```json
/// {
///   "id": "user.load_failed",
///   "msg": "could not load user",
///   "type": "app.database",
///   "status": 500,
///   "message_data": "Please try again",
///   "is_retryable": true,
///   "stacks": [{ "msg": "could not load user", "frames": ["src/user.rs:12 app::user::load"] }],
///   "cause": { "msg": "conn refused", "type": "std::io::error::Error" }
/// }
/// ```
///
/// where `message_data`, `is_retryable`, `stacks` and `cause` are left out
/// when empty.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ErrorReport {
    /// The error id.
    pub id: String,
    /// The error message.
    #[cfg_attr(feature = "serde", serde(rename = "msg"))]
    pub message: String,
    /// The resolved category.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub category: Category,
    /// The HTTP status, `0` when unset.
    #[cfg_attr(feature = "serde", serde(rename = "status"))]
    pub http_status: u16,
    /// The payload: the text itself for string payloads, its `Debug`
    /// rendering otherwise.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "message_data", skip_serializing_if = "Option::is_none")
    )]
    pub payload: Option<String>,
    /// The retryable flag.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "is_retryable", skip_serializing_if = "is_false")
    )]
    pub retryable: bool,
    /// The rendered stacks, outermost first.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Vec::is_empty"))]
    pub stacks: Vec<StackReport>,
    /// A summary of the direct cause.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub cause: Option<CauseSummary>,
}

/// One rendered stack snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StackReport {
    /// The message of the error that captured the stack.
    #[cfg_attr(feature = "serde", serde(rename = "msg"))]
    pub message: String,
    /// The frames, after the error's cleaner ran.
    pub frames: Vec<String>,
}

/// The direct cause of a reported error.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CauseSummary {
    /// The cause's message.
    #[cfg_attr(feature = "serde", serde(rename = "msg"))]
    pub message: String,
    /// The resolved category of a native cause, the concrete type name of a
    /// foreign one, or `"undefined"` when neither is known.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub type_name: String,
}

#[cfg(feature = "serde")]
fn is_false(value: &bool) -> bool {
    !*value
}

fn render_payload(payload: &Payload) -> String {
    match payload.as_str() {
        Some(text) => text.to_string(),
        None => format!("{payload:?}"),
    }
}

impl Error {
    /// Takes a [`ErrorReport`] snapshot of this error.
    ///
    /// ```
    /// use faultline::Error;
    ///
    /// let err = Error::new("db.timeout")
    ///     .with_category("app.database")
    ///     .with_http_status(503)
    ///     .with_cause(std::io::Error::other("conn refused"));
    ///
    /// let report = err.report();
    /// assert_eq!(report.category, "app.database");
    /// assert_eq!(report.http_status, 503);
    /// assert_eq!(report.stacks.len(), 1);
    /// let cause = report.cause.unwrap();
    /// assert_eq!(cause.message, "conn refused");
    /// assert!(cause.type_name.contains("io"));
    /// ```
    #[must_use]
    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            id: self.id().to_string(),
            message: self.message().to_string(),
            category: self.resolve(),
            http_status: self.http_status().unwrap_or(0),
            payload: self.payload().map(render_payload),
            retryable: self.is_retryable(),
            stacks: self
                .stack_lines()
                .into_iter()
                .map(|(message, frames)| StackReport { message, frames })
                .collect(),
            cause: self.cause().map(|cause| CauseSummary {
                message: cause.to_string(),
                type_name: match cause.native() {
                    Some(native) => native.resolve().as_str().to_string(),
                    None => cause.type_name().unwrap_or("undefined").to_string(),
                },
            }),
        }
    }
}
