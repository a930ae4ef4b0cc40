//! Error classification for the token endpoint and the Web API
//!
//! Each taxonomy is one ordered rule table. The first rule whose status
//! matcher and (optional) body pattern both match wins; statuses no rule
//! covers fall through to a per-table default.
//!
//! Bodies are read defensively: a structured OAuth or Web API error object
//! is tried first, then the raw text. Patterns are matched lower-cased.

use serde::Deserialize;

use crate::error::{ApiErrorKind, Denial, TokenExchangeReason};

#[derive(Debug, Clone, Copy)]
enum StatusMatch {
    Exact(u16),
    ServerError,
}

impl StatusMatch {
    fn matches(self, status: u16) -> bool {
        match self {
            StatusMatch::Exact(code) => code == status,
            StatusMatch::ServerError => (500..600).contains(&status),
        }
    }
}

struct Rule<K> {
    status: StatusMatch,
    pattern: Option<&'static str>,
    kind: K,
}

const TOKEN_RULES: &[Rule<TokenExchangeReason>] = &[
    Rule {
        status: StatusMatch::Exact(400),
        pattern: Some("redirect_uri"),
        kind: TokenExchangeReason::RedirectUriMismatch,
    },
    Rule {
        status: StatusMatch::Exact(400),
        pattern: Some("redirect uri"),
        kind: TokenExchangeReason::RedirectUriMismatch,
    },
    Rule {
        status: StatusMatch::Exact(400),
        pattern: None,
        kind: TokenExchangeReason::BadRequest,
    },
    Rule {
        status: StatusMatch::Exact(401),
        pattern: None,
        kind: TokenExchangeReason::Unauthorized,
    },
    Rule {
        status: StatusMatch::Exact(403),
        pattern: None,
        kind: TokenExchangeReason::Unauthorized,
    },
    Rule {
        status: StatusMatch::ServerError,
        pattern: None,
        kind: TokenExchangeReason::ProviderUnavailable,
    },
];

const API_RULES: &[Rule<ApiErrorKind>] = &[
    Rule {
        status: StatusMatch::Exact(401),
        pattern: None,
        kind: ApiErrorKind::SessionExpired,
    },
    Rule {
        status: StatusMatch::Exact(403),
        pattern: Some("premium"),
        kind: ApiErrorKind::PermissionDenied(Denial::PremiumRequired),
    },
    Rule {
        status: StatusMatch::Exact(403),
        pattern: Some("scope"),
        kind: ApiErrorKind::PermissionDenied(Denial::InsufficientScope),
    },
    Rule {
        status: StatusMatch::Exact(403),
        pattern: None,
        kind: ApiErrorKind::PermissionDenied(Denial::Unspecified),
    },
    Rule {
        status: StatusMatch::ServerError,
        pattern: None,
        kind: ApiErrorKind::UpstreamUnavailable,
    },
];

/// Error body shapes returned by Spotify.
///
/// The accounts service answers with RFC 6749 `{"error", "error_description"}`;
/// the Web API nests `{"status", "message", "reason"}` under `error`.
#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    OAuth {
        error: String,
        #[serde(default)]
        error_description: Option<String>,
    },
    Api {
        error: ApiErrorObject,
    },
}

#[derive(Deserialize)]
struct ApiErrorObject {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// Reduce an error body to the lower-cased text the rule patterns match on.
fn error_detail(body: &str) -> String {
    let detail = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody::OAuth {
            error,
            error_description,
        }) => [Some(error), error_description]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" "),
        Ok(ErrorBody::Api { error }) => [error.message, error.reason]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" "),
        Err(_) => body.to_owned(),
    };
    detail.to_lowercase()
}

fn lookup<K: Copy>(rules: &[Rule<K>], status: u16, body: &str) -> Option<K> {
    let detail = error_detail(body);
    rules
        .iter()
        .find(|rule| {
            rule.status.matches(status) && rule.pattern.is_none_or(|p| detail.contains(p))
        })
        .map(|rule| rule.kind)
}

/// Classify a non-success token endpoint response.
pub fn classify_token_error(status: u16, body: &str) -> TokenExchangeReason {
    lookup(TOKEN_RULES, status, body).unwrap_or(TokenExchangeReason::UnexpectedStatus(status))
}

/// Classify a non-success Web API response.
pub fn classify_api_error(status: u16, body: &str) -> ApiErrorKind {
    lookup(API_RULES, status, body).unwrap_or(ApiErrorKind::RequestFailed(status))
}
