//! Validation Utilities

use axum::http::Uri;
use validator::ValidationErrors;

use super::error::{AppError, FieldError};

/// Convert validator errors to AppError, reporting the first failing field
pub fn validation_error(errors: ValidationErrors) -> AppError {
    let field_errors: Vec<FieldError> = errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| FieldError {
                field: field.to_string(),
                message: e.message.clone().map(|m| m.to_string()).unwrap_or_default(),
            })
        })
        .collect();

    let message = field_errors
        .first()
        .map(|e| format!("{}: {}", e.field, e.message))
        .unwrap_or_else(|| "Validation failed".into());

    AppError::Validation(message)
}

/// Check that a redirect URI is absolute (scheme + authority) and has no fragment.
///
/// `http` is only accepted for loopback hosts.
pub fn is_valid_redirect_uri(candidate: &str) -> bool {
    if candidate.contains('#') || candidate.chars().any(char::is_whitespace) {
        return false;
    }
    let Ok(uri) = candidate.parse::<Uri>() else {
        return false;
    };
    let Some(host) = uri.host() else {
        return false;
    };
    match uri.scheme_str() {
        Some("https") => true,
        Some("http") => matches!(host, "localhost" | "127.0.0.1" | "[::1]"),
        // Custom schemes for native apps, e.g. com.example.app://callback
        Some(scheme) => scheme.contains('.'),
        None => false,
    }
}
