//! Request guards: the access-token check applied to every route and the
//! Origin check applied to WebSocket upgrades.

use crate::server::WebttyServer;
use axum::extract::{Query, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Query string as ordered key/value pairs. Repeated keys are kept.
pub type QueryPairs = Vec<(String, String)>;

/// First value given for `key`; later repeats are ignored.
pub fn first_param<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Reject any request whose `token` query parameter does not match the
/// per-run token with 403 and an empty body.
pub async fn require_token(
    State(server): State<Arc<WebttyServer>>,
    req: Request,
    next: Next,
) -> Response {
    let pairs = Query::<QueryPairs>::try_from_uri(req.uri())
        .map(|Query(pairs)| pairs)
        .unwrap_or_default();
    if !server.token().permits(first_param(&pairs, "token")) {
        debug!(path = %req.uri().path(), "access token rejected");
        return StatusCode::FORBIDDEN.into_response();
    }
    next.run(req).await
}

const LOOPBACK_HOSTS: [&str; 3] = ["localhost", "127.0.0.1", "[::1]"];

/// Whether a WebSocket upgrade carrying `origin` may proceed.
///
/// Requests without an Origin are not from a browser and pass. Otherwise the
/// origin's host must be a loopback name, the configured bind host, or the
/// host the request was addressed to.
pub fn origin_allowed(origin: Option<&str>, request_host: Option<&str>, bind_host: &str) -> bool {
    let Some(origin) = origin else {
        return true;
    };
    let Some(host) = Url::parse(origin)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
    else {
        return false;
    };
    if LOOPBACK_HOSTS.iter().any(|h| h.eq_ignore_ascii_case(&host)) {
        return true;
    }
    let bind = if bind_host.contains(':') && !bind_host.starts_with('[') {
        format!("[{bind_host}]")
    } else {
        bind_host.to_string()
    };
    let same_host = |authority: &str| {
        authority_host(authority).is_some_and(|h| h.eq_ignore_ascii_case(&host))
    };
    same_host(&bind) || request_host.is_some_and(same_host)
}

/// Host part of a `host[:port]` authority, normalized the way origins are.
fn authority_host(authority: &str) -> Option<String> {
    Url::parse(&format!("http://{authority}"))
        .ok()?
        .host_str()
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_origin_passes() {
        assert!(origin_allowed(None, None, "localhost"));
    }

    #[test]
    fn loopback_origins_pass() {
        for origin in [
            "http://localhost:8080",
            "https://LOCALHOST",
            "http://127.0.0.1:9000/",
            "http://[::1]:8080",
        ] {
            assert!(origin_allowed(Some(origin), None, "0.0.0.0"), "{origin}");
        }
    }

    #[test]
    fn bind_host_passes() {
        assert!(origin_allowed(Some("http://devbox:8080"), None, "devbox"));
        assert!(origin_allowed(Some("http://[fe80::1]:8080"), None, "fe80::1"));
    }

    #[test]
    fn same_host_as_request_passes() {
        assert!(origin_allowed(
            Some("http://192.168.1.20:8080"),
            Some("192.168.1.20:8080"),
            "0.0.0.0"
        ));
    }

    #[test]
    fn foreign_origins_fail() {
        assert!(!origin_allowed(Some("https://evil.example"), None, "localhost"));
        assert!(!origin_allowed(
            Some("https://evil.example"),
            Some("localhost:8080"),
            "localhost"
        ));
        assert!(!origin_allowed(Some("null"), None, "localhost"));
        assert!(!origin_allowed(Some("http://"), None, "localhost"));
        assert!(!origin_allowed(Some("not a url"), Some("localhost:8080"), "devbox"));
    }

    #[test]
    fn first_value_wins() {
        let pairs: QueryPairs = vec![
            ("cols".into(), "100".into()),
            ("rows".into(), "40".into()),
            ("cols".into(), "120".into()),
        ];
        assert_eq!(first_param(&pairs, "cols"), Some("100"));
        assert_eq!(first_param(&pairs, "rows"), Some("40"));
        assert_eq!(first_param(&pairs, "token"), None);
    }
}
