//! Endpoint URL construction.

/// Join a base URL and an endpoint path.
///
/// Trailing slashes on the base and leading slashes on the endpoint are
/// stripped so the result never contains a double slash, whichever form
/// the configured base URL arrives in.
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}
