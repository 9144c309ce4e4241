//! Caller identity, supplied by the fronting CRM via trusted headers.
//!
//! This service sits behind the CRM's own authentication; the proxy
//! forwards who is asking in `x-caller-*` headers. Absent headers mean an
//! unprivileged caller with no officer scope, who sees nothing.

use axum::http::HeaderMap;

use leadline_channels::Caller;

pub fn caller_from_headers(headers: &HeaderMap) -> Caller {
    let is_admin = headers
        .get("x-caller-admin")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "true" || v == "1");

    let officer_id = headers
        .get("x-caller-officer")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(ToString::to_string);

    let linked_officer_ids = headers
        .get("x-caller-linked")
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default();

    Caller {
        is_admin,
        officer_id,
        linked_officer_ids,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_flag_and_officer_scope() {
        let mut headers = HeaderMap::new();
        headers.insert("x-caller-admin", "true".parse().unwrap());
        let caller = caller_from_headers(&headers);
        assert!(caller.is_admin);

        let mut headers = HeaderMap::new();
        headers.insert("x-caller-officer", "o1".parse().unwrap());
        headers.insert("x-caller-linked", "o2, o3,".parse().unwrap());
        let caller = caller_from_headers(&headers);
        assert!(!caller.is_admin);
        assert_eq!(caller.officer_scope(), vec!["o1", "o2", "o3"]);
    }

    #[test]
    fn no_headers_means_no_scope() {
        let caller = caller_from_headers(&HeaderMap::new());
        assert!(!caller.is_admin);
        assert!(caller.officer_scope().is_empty());
    }
}
