use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ApiErrorKind {
    Unauthorized,
    Network,
    Http,
    Parse,
    Realtime,
    /// Rejected locally before any request was made.
    Invalid,
}

/// Every gateway call resolves to this. `message` is what the user sees.
#[derive(Clone, Debug, Error)]
#[error("{message}")]
pub(crate) struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
}

impl ApiError {
    pub(crate) fn network(e: reqwest::Error) -> Self {
        Self {
            kind: ApiErrorKind::Network,
            message: e.to_string(),
        }
    }

    pub(crate) fn parse(e: impl std::fmt::Display) -> Self {
        Self {
            kind: ApiErrorKind::Parse,
            message: e.to_string(),
        }
    }

    pub(crate) fn unauthorized() -> Self {
        Self {
            kind: ApiErrorKind::Unauthorized,
            message: "Not authenticated".to_string(),
        }
    }

    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Invalid,
            message: message.into(),
        }
    }

    pub(crate) fn realtime(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Realtime,
            message: message.into(),
        }
    }

    /// PostgREST and GoTrue both answer failures with a JSON body; surface its
    /// message verbatim and fall back to the raw body.
    pub(crate) fn http(status: reqwest::StatusCode, body: &str) -> Self {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Self::unauthorized();
        }
        Self {
            kind: ApiErrorKind::Http,
            message: remote_message(body)
                .unwrap_or_else(|| format!("Request failed ({status}): {body}")),
        }
    }

    pub(crate) fn is_unauthorized(&self) -> bool {
        self.kind == ApiErrorKind::Unauthorized
    }
}

fn remote_message(body: &str) -> Option<String> {
    let v: serde_json::Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|k| v.get(*k).and_then(|m| m.as_str()))
        .filter(|m| !m.trim().is_empty())
        .map(|m| m.to_string())
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;
