//! URL utilities for consistent URL handling
//!
//! Server URLs are stored and compared without trailing slashes, and
//! endpoint paths are joined onto them with exactly one separator.

/// Normalize a base URL by removing trailing slashes
///
/// # Examples
///
/// ```
/// use mcp_browser::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("https://tools.example.com/mcp"), "https://tools.example.com/mcp");
/// assert_eq!(normalize_base_url("https://tools.example.com/mcp/"), "https://tools.example.com/mcp");
/// assert_eq!(normalize_base_url("https://tools.example.com/mcp///"), "https://tools.example.com/mcp");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join an endpoint path onto a base URL without doubling slashes
///
/// # Examples
///
/// ```
/// use mcp_browser::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("https://tools.example.com", "/.well-known/mcp.json"),
///     "https://tools.example.com/.well-known/mcp.json"
/// );
/// assert_eq!(
///     construct_api_url("https://tools.example.com/mcp/", "v1/tools/echo"),
///     "https://tools.example.com/mcp/v1/tools/echo"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}
