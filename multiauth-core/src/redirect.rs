//! Post-login redirect targets

use url::form_urlencoded;

/// Return `next` if it is a local absolute path, otherwise `fallback`
///
/// Rejects protocol-relative (`//host`) and backslash variants browsers treat
/// as such, plus anything carrying a scheme.
#[must_use]
pub fn safe_next(next: Option<&str>, fallback: &str) -> String {
    next.map(str::trim)
        .filter(|next| is_local_path(next))
        .map_or_else(|| fallback.to_string(), ToString::to_string)
}

fn is_local_path(next: &str) -> bool {
    next.starts_with('/')
        && !next.starts_with("//")
        && !next.starts_with("/\\")
        && !next.chars().any(char::is_control)
}

/// Append query parameters to a URL that may already carry a query
#[must_use]
pub fn url_concat(url: &str, params: &[(&str, &str)]) -> String {
    if params.is_empty() {
        return url.to_string();
    }
    let query = form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{url}{separator}{query}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/foo"), "/hub/home"), "/foo");
        assert_eq!(safe_next(Some("/foo?a=1"), "/hub/home"), "/foo?a=1");
        assert_eq!(safe_next(None, "/hub/home"), "/hub/home");
        assert_eq!(safe_next(Some(""), "/hub/home"), "/hub/home");
        assert_eq!(safe_next(Some("//evil.com"), "/hub/home"), "/hub/home");
        assert_eq!(safe_next(Some("/\\evil.com"), "/hub/home"), "/hub/home");
        assert_eq!(safe_next(Some("https://evil.com/"), "/hub/home"), "/hub/home");
    }

    #[test]
    fn test_url_concat() {
        assert_eq!(
            url_concat("https://hub/hub/github/login", &[("next", "/foo")]),
            "https://hub/hub/github/login?next=%2Ffoo"
        );
        assert_eq!(url_concat("/a?x=1", &[("next", "/b c")]), "/a?x=1&next=%2Fb+c");
        assert_eq!(url_concat("/a", &[]), "/a");
    }
}
