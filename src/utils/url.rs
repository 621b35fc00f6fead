//! Endpoint URL helpers.

/// Strips trailing slashes so paths can be appended safely.
///
/// ```
/// use parley::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://api.x.ai/v1/"), "https://api.x.ai/v1");
/// assert_eq!(normalize_base_url("https://api.x.ai/v1"), "https://api.x.ai/v1");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Joins a base URL and a path with exactly one slash between them.
///
/// ```
/// use parley::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://api.venice.ai/api/v1/", "/chat/completions"),
///     "https://api.venice.ai/api/v1/chat/completions"
/// );
/// ```
pub fn construct_api_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        normalize_base_url(base_url),
        path.trim_start_matches('/')
    )
}

/// Host portion of a URL, for log lines that should not carry full paths.
pub fn host_of(url: &str) -> &str {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(without_scheme)
}
