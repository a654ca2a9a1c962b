//! Classification of remote HTTP failures into a small taxonomy, done once
//! at the boundary. All downstream code matches on [`RemoteError`] instead
//! of inspecting status codes or response bodies.

use reqwest::StatusCode;

use super::model::RemoteExceptionWrapper;

const NON_EMPTY_SUFFIX: &str = " is non empty";
const ACCESS_CONTROL_EXCEPTION: &str = "AccessControlException";

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("path not found")]
    NotFound,

    #[error("permission denied")]
    PermissionDenied,

    #[error("directory not empty")]
    DirectoryNotEmpty,

    #[error("remote request failed: {method} {url} -> {status}: {body}")]
    Generic {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("missing Location header on redirect response")]
    MissingLocation,

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Classifies a non-2xx/3xx response into the taxonomy. Called once at the
/// client boundary with the already-read body text.
pub(super) fn classify(method: &str, url: &str, status: StatusCode, body: &str) -> RemoteError {
    if status == StatusCode::NOT_FOUND {
        return RemoteError::NotFound;
    }

    if status == StatusCode::FORBIDDEN {
        if let Ok(wrapper) = serde_json::from_str::<RemoteExceptionWrapper>(body) {
            let ex = wrapper.remote_exception;
            if ex.message.ends_with(NON_EMPTY_SUFFIX) {
                return RemoteError::DirectoryNotEmpty;
            }
            if ex.exception == ACCESS_CONTROL_EXCEPTION {
                return RemoteError::PermissionDenied;
            }
        }
    }

    RemoteError::Generic {
        method: method.to_string(),
        url: url.to_string(),
        status: status.as_u16(),
        body: body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_not_found() {
        assert!(matches!(
            classify("GET", "http://x", StatusCode::NOT_FOUND, ""),
            RemoteError::NotFound
        ));
    }

    #[test]
    fn classifies_directory_not_empty() {
        let body = r#"{"RemoteException":{"exception":"PathIsNotEmptyDirectoryException","message":"/foo is non empty"}}"#;
        let err = classify("DELETE", "http://x", StatusCode::FORBIDDEN, body);
        assert!(matches!(err, RemoteError::DirectoryNotEmpty));
    }

    #[test]
    fn classifies_permission_denied() {
        let body = r#"{"RemoteException":{"exception":"AccessControlException","message":"no"}}"#;
        let err = classify("PUT", "http://x", StatusCode::FORBIDDEN, body);
        assert!(matches!(err, RemoteError::PermissionDenied));
    }

    #[test]
    fn falls_back_to_generic() {
        let err = classify("PUT", "http://x", StatusCode::INTERNAL_SERVER_ERROR, "boom");
        match err {
            RemoteError::Generic { status, body, .. } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Generic, got {other:?}"),
        }
    }

    #[test]
    fn forbidden_without_matching_reason_is_generic() {
        let body = r#"{"RemoteException":{"exception":"SomeOtherException","message":"nope"}}"#;
        let err = classify("PUT", "http://x", StatusCode::FORBIDDEN, body);
        assert!(matches!(err, RemoteError::Generic { .. }));
    }
}
