//! Provider-specific authentication headers.

/// Anthropic's compatibility endpoint takes `x-api-key`; everything else uses
/// a bearer token.
pub fn add_auth_headers(
    request: reqwest::RequestBuilder,
    endpoint_id: &str,
    api_key: &str,
) -> reqwest::RequestBuilder {
    if endpoint_id.eq_ignore_ascii_case("anthropic") {
        return request
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01");
    }

    request.header("Authorization", format!("Bearer {api_key}"))
}
