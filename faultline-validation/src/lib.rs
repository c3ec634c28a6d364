#![deny(
    missing_docs,
    unsafe_code,
    rustdoc::invalid_rust_codeblocks,
    rustdoc::broken_intra_doc_links,
    missing_copy_implementations,
    unused_doc_comments
)]

//! Field-level validation errors for faultline.
//!
//! A [`ValidationError`] collects the problems found in a form or request
//! body, one [`FieldError`] per problem, on top of a base
//! [`faultline::Error`] that carries the id, category and HTTP status.
//!
//! Messages can be any value: a plain string, a translation map, or a
//! structured description of the rule that failed. They are turned into text
//! by translator callbacks, which is where an application plugs in its own
//! localization.
//!
//! ```
//! use faultline_validation::ValidationError;
//!
//! let mut err = ValidationError::new("user.invalid").with_http_status(422);
//! err.add_field_error("email", "required", "Email is required");
//! err.add_field_error("password", "min_length", "Password is too short");
//!
//! assert_eq!(
//!     err.to_string(),
//!     "user.invalid: email: Email is required; password: Password is too short"
//! );
//! assert_eq!(err.summary(), "Validation failed with 2 error(s)");
//! assert!(faultline::chain::has_category(&err, faultline::Category::VALIDATION));
//! ```

use std::{any::Any, error::Error as StdError, fmt, sync::Arc};

use faultline::{Category, Error, Payload};
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

/// Named parameters of a field error, such as `{"min": "8"}` for a length
/// rule. Kept in insertion order.
pub type Params = IndexMap<String, String, FxBuildHasher>;

/// Builds the summary message from the field errors and the base payload.
pub type SummaryTranslator =
    Arc<dyn Fn(&[FieldError], Option<&Payload>) -> String + Send + Sync + 'static>;

/// Builds the message of one field error from its field, code and message.
pub type FieldTranslator =
    Arc<dyn Fn(&str, &str, Option<&Payload>) -> String + Send + Sync + 'static>;

/// One problem with one field.
#[derive(Clone, Debug)]
pub struct FieldError {
    /// The field name, such as `"email"`.
    pub field: String,
    /// A machine-readable code, such as `"required"` or `"min_length"`.
    pub code: String,
    /// The message data, if any.
    pub message: Option<Payload>,
    /// Rule parameters.
    pub params: Params,
}

/// Renders the summary: the base payload when it is a string, its `Debug`
/// rendering when it is something else, and a count of field errors when
/// there is no payload.
#[must_use]
pub fn default_summary(field_errors: &[FieldError], payload: Option<&Payload>) -> String {
    match payload {
        Some(payload) => payload
            .as_str()
            .map_or_else(|| format!("{payload:?}"), str::to_string),
        None => format!("Validation failed with {} error(s)", field_errors.len()),
    }
}

/// Renders a field message: the message when it is a string, its `Debug`
/// rendering when it is something else, and the code when there is no
/// message.
#[must_use]
pub fn default_field_message(_field: &str, code: &str, message: Option<&Payload>) -> String {
    match message {
        Some(message) => message
            .as_str()
            .map_or_else(|| format!("{message:?}"), str::to_string),
        None => code.to_string(),
    }
}

/// A validation failure made of any number of field errors.
///
/// The error's identity lives in its base [`Error`]: [`id`](Self::id),
/// [`category`](Self::category) and [`http_status`](Self::http_status)
/// delegate to it, and [`source`](StdError::source) returns it, so the
/// functions in [`faultline::chain`] see the base error.
#[derive(Clone)]
pub struct ValidationError {
    base: Error,
    field_errors: Vec<FieldError>,
    summary_translator: SummaryTranslator,
    field_translator: FieldTranslator,
}

impl ValidationError {
    /// Creates a validation error whose base has the given id and
    /// [`Category::VALIDATION`].
    #[must_use]
    pub fn new(id: impl Into<std::borrow::Cow<'static, str>>) -> Self {
        Self::from_error(Error::new(id).with_category(Category::VALIDATION))
    }

    /// Uses an existing error as the base, keeping its category.
    #[must_use]
    pub fn from_error(base: Error) -> Self {
        Self {
            base,
            field_errors: Vec::new(),
            summary_translator: Arc::new(default_summary),
            field_translator: Arc::new(default_field_message),
        }
    }

    /// Sets the HTTP status of the base error.
    #[must_use]
    pub fn with_http_status(mut self, status: u16) -> Self {
        self.base = self.base.with_http_status(status);
        self
    }

    /// Sets the payload of the base error, which the default summary
    /// translator uses as the summary.
    #[must_use]
    pub fn with_payload<T>(mut self, payload: T) -> Self
    where
        T: Any + fmt::Debug + Send + Sync,
    {
        self.base = self.base.with_payload(payload);
        self
    }

    /// Replaces the summary translator.
    ///
    /// ```
    /// use faultline_validation::ValidationError;
    ///
    /// let mut err = ValidationError::new("form.invalid")
    ///     .with_summary_translator(|fields, _| format!("{} fields need attention", fields.len()));
    /// err.add_field_code("name", "required");
    /// assert_eq!(err.summary(), "1 fields need attention");
    /// ```
    #[must_use]
    pub fn with_summary_translator<F>(mut self, translator: F) -> Self
    where
        F: Fn(&[FieldError], Option<&Payload>) -> String + Send + Sync + 'static,
    {
        self.summary_translator = Arc::new(translator);
        self
    }

    /// Replaces the field translator.
    #[must_use]
    pub fn with_field_translator<F>(mut self, translator: F) -> Self
    where
        F: Fn(&str, &str, Option<&Payload>) -> String + Send + Sync + 'static,
    {
        self.field_translator = Arc::new(translator);
        self
    }

    /// Records a problem with `field`.
    pub fn add_field_error<T>(&mut self, field: impl Into<String>, code: impl Into<String>, message: T)
    where
        T: Any + fmt::Debug + Send + Sync,
    {
        self.push(field.into(), code.into(), Some(Payload::new(message)), Params::default());
    }

    /// Records a problem with `field` together with rule parameters.
    pub fn add_field_error_with_params<T, K, V>(
        &mut self,
        field: impl Into<String>,
        code: impl Into<String>,
        message: T,
        params: impl IntoIterator<Item = (K, V)>,
    ) where
        T: Any + fmt::Debug + Send + Sync,
        K: Into<String>,
        V: Into<String>,
    {
        let params = params
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self.push(field.into(), code.into(), Some(Payload::new(message)), params);
    }

    /// Records a problem with `field` that has only a code. The default
    /// field translator renders it as the code itself.
    pub fn add_field_code(&mut self, field: impl Into<String>, code: impl Into<String>) {
        self.push(field.into(), code.into(), None, Params::default());
    }

    fn push(&mut self, field: String, code: String, message: Option<Payload>, params: Params) {
        tracing::trace!(id = self.base.id(), field = %field, code = %code, "field error recorded");
        self.field_errors.push(FieldError {
            field,
            code,
            message,
            params,
        });
    }

    /// The base error.
    #[must_use]
    pub fn base(&self) -> &Error {
        &self.base
    }

    /// The recorded field errors, in the order they were added.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        &self.field_errors
    }

    /// Returns `true` if no field error was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.field_errors.is_empty()
    }

    /// The base error's id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.base.id()
    }

    /// The base error's resolved category.
    #[must_use]
    pub fn category(&self) -> Category {
        self.base.resolve()
    }

    /// The base error's HTTP status.
    #[must_use]
    pub fn http_status(&self) -> Option<u16> {
        self.base.http_status()
    }

    /// The summary message produced by the summary translator.
    #[must_use]
    pub fn summary(&self) -> String {
        (self.summary_translator)(&self.field_errors, self.base.payload())
    }

    /// The message of one field error produced by the field translator.
    #[must_use]
    pub fn translate(&self, field_error: &FieldError) -> String {
        (self.field_translator)(
            &field_error.field,
            &field_error.code,
            field_error.message.as_ref(),
        )
    }

    /// Takes a [`ValidationReport`] snapshot with every message translated.
    #[must_use]
    pub fn report(&self) -> ValidationReport {
        ValidationReport {
            id: self.id().to_string(),
            category: self.category(),
            payload: self.base.payload().map(|payload| {
                payload
                    .as_str()
                    .map_or_else(|| format!("{payload:?}"), str::to_string)
            }),
            message: self.summary(),
            field_errors: self
                .field_errors
                .iter()
                .map(|field_error| FieldErrorReport {
                    field: field_error.field.clone(),
                    code: field_error.code.clone(),
                    message: field_error.message.as_ref().map(|message| format!("{message:?}")),
                    params: field_error.params.clone(),
                    translated_message: self.translate(field_error),
                })
                .collect(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base.message())?;
        for (i, field_error) in self.field_errors.iter().enumerate() {
            f.write_str(if i == 0 { ": " } else { "; " })?;
            write!(f, "{}: {}", field_error.field, self.translate(field_error))?;
        }
        Ok(())
    }
}

impl fmt::Debug for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationError")
            .field("base", &self.base)
            .field("field_errors", &self.field_errors)
            .finish_non_exhaustive()
    }
}

impl StdError for ValidationError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(&self.base)
    }
}

/// A snapshot of a [`ValidationError`] for API responses.
///
/// With the `serde` feature this serializes with the keys `id`, `type`,
/// `message_data` (left out when there is no payload), `message` and
/// `field_errors`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ValidationReport {
    /// The base error's id.
    pub id: String,
    /// The base error's resolved category.
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub category: Category,
    /// The base error's payload, rendered as text.
    #[cfg_attr(
        feature = "serde",
        serde(rename = "message_data", skip_serializing_if = "Option::is_none")
    )]
    pub payload: Option<String>,
    /// The translated summary.
    pub message: String,
    /// The field errors.
    pub field_errors: Vec<FieldErrorReport>,
}

/// One field error in a [`ValidationReport`].
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FieldErrorReport {
    /// The field name.
    pub field: String,
    /// The error code.
    pub code: String,
    /// The raw message data, rendered through `Debug`.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub message: Option<String>,
    /// Rule parameters.
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Params::is_empty"))]
    pub params: Params,
    /// The message produced by the field translator.
    pub translated_message: String,
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    static_assertions::assert_impl_all!(ValidationError: Send, Sync, Clone, StdError);

    #[test]
    fn test_display_without_field_errors_is_base_message() {
        let err = ValidationError::new("user.invalid");
        assert!(err.is_empty());
        assert_eq!(err.to_string(), "user.invalid");
    }

    #[test]
    fn test_delegates_to_base() {
        let err = ValidationError::new("user.invalid").with_http_status(400);
        assert_eq!(err.id(), "user.invalid");
        assert_eq!(err.category(), Category::VALIDATION);
        assert_eq!(err.http_status(), Some(400));
        let source = err.source().and_then(|s| s.downcast_ref::<Error>());
        assert!(source.is_some_and(|base| base.ptr_eq(err.base())));
    }

    #[test]
    fn test_default_translators() {
        let mut err = ValidationError::new("form.invalid").with_payload("Please fix the form");
        err.add_field_code("name", "required");
        err.add_field_error("age", "range", BTreeMap::from([("min", 18)]));

        assert_eq!(err.summary(), "Please fix the form");
        assert_eq!(err.translate(&err.field_errors()[0]), "required");
        assert_eq!(err.translate(&err.field_errors()[1]), r#"{"min": 18}"#);
    }

    #[test]
    fn test_custom_field_translator() {
        let mut err = ValidationError::new("form.invalid").with_field_translator(|field, code, _| {
            match code {
                "required" => format!("The {field} field is required"),
                other => other.to_string(),
            }
        });
        err.add_field_code("email", "required");
        assert_eq!(err.to_string(), "form.invalid: email: The email field is required");
    }

    #[test]
    fn test_report_keeps_params_in_order() {
        let mut err = ValidationError::new("form.invalid");
        err.add_field_error_with_params(
            "password",
            "length",
            "Password must be 8 to 64 characters",
            [("min", "8"), ("max", "64")],
        );
        let report = err.report();
        assert_eq!(report.message, "Validation failed with 1 error(s)");
        let field = &report.field_errors[0];
        assert_eq!(field.params.keys().collect::<Vec<_>>(), ["min", "max"]);
        assert_eq!(field.translated_message, "Password must be 8 to 64 characters");
        assert_eq!(field.message.as_deref(), Some(r#""Password must be 8 to 64 characters""#));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_report_serializes_with_wire_keys() {
        let mut err = ValidationError::new("form.invalid").with_payload("Please fix the form");
        err.add_field_code("name", "required");
        err.add_field_error_with_params("age", "range", "Too young", [("min", "18")]);

        let value = serde_json::to_value(err.report()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": "form.invalid",
                "type": "faultline.validation",
                "message_data": "Please fix the form",
                "message": "Please fix the form",
                "field_errors": [
                    {
                        "field": "name",
                        "code": "required",
                        "translated_message": "required",
                    },
                    {
                        "field": "age",
                        "code": "range",
                        "message": "\"Too young\"",
                        "params": { "min": "18" },
                        "translated_message": "Too young",
                    },
                ],
            })
        );
    }

    #[derive(Debug, thiserror::Error)]
    enum SignupError {
        #[error("signup rejected")]
        Invalid(#[from] ValidationError),
    }

    #[test]
    fn test_chain_functions_see_through_wrappers() {
        let mut err = ValidationError::new("signup.invalid").with_http_status(422);
        err.add_field_code("email", "required");
        let outer = SignupError::from(err);
        assert_eq!(faultline::chain::http_status(&outer), Some(422));
        assert!(faultline::chain::has_category(&outer, Category::VALIDATION));
        assert_eq!(faultline::chain::root_cause(&outer).to_string(), "signup.invalid");
    }
}
