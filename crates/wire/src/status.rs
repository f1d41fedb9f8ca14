//! Mapping non-success responses to errors.

use serde::Deserialize;
use settee_core::{Error, OperationKind};

/// Longest error text kept from a body that is not JSON.
const MAX_RAW_REASON: usize = 200;

/// True for 2xx statuses.
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Error body returned by the server: `{"error": "...", "reason": "..."}`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Build the error for a non-success `status` with response `body`.
pub fn error_for_status(kind: OperationKind, status: u16, body: &[u8]) -> Error {
    let parsed: Option<ErrorBody> = serde_json::from_slice(body).ok();
    let reason = match &parsed {
        Some(ErrorBody {
            error: Some(error),
            reason: Some(reason),
        }) => format!("{}: {}", error, reason),
        Some(ErrorBody {
            error: None,
            reason: Some(reason),
        }) => reason.clone(),
        Some(ErrorBody {
            error: Some(error),
            reason: None,
        }) => error.clone(),
        _ => raw_reason(body, status),
    };

    match status {
        401 | 403 => Error::Unauthorized { status, reason },
        404 => {
            let database_missing = parsed
                .as_ref()
                .and_then(|b| b.reason.as_deref())
                .map(|r| r.starts_with("Database does not exist"))
                .unwrap_or(false);
            if kind.targets_document() && !database_missing {
                Error::NotFound { status, reason }
            } else {
                Error::ResourceMissing { status, reason }
            }
        }
        409 | 412 => Error::Conflict { status, reason },
        400..=499 => Error::BadRequest { status, reason },
        _ => Error::Server { status, reason },
    }
}

fn raw_reason(body: &[u8], status: u16) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return format!("HTTP {}", status);
    }
    match text.char_indices().nth(MAX_RAW_REASON) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
