//! URL helpers for the inference server endpoints.

/// Default address of a locally running Ollama server.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434/";

/// Strip trailing slashes so endpoints can be appended uniformly.
///
/// ```
/// use ollama_cli::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:11434/"), "http://localhost:11434");
/// assert_eq!(normalize_base_url("http://localhost:11434"), "http://localhost:11434");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Join a base URL and an endpoint path with exactly one slash.
///
/// ```
/// use ollama_cli::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:11434/", "/api/generate"),
///     "http://localhost:11434/api/generate"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    let normalized_base = normalize_base_url(base_url);
    let endpoint = endpoint.trim_start_matches('/');
    format!("{}/{}", normalized_base, endpoint)
}

/// Accept the `OLLAMA_HOST` forms the server itself accepts: a bare
/// `host:port` gets an `http://` scheme.
pub fn base_url_from_host(host: &str) -> String {
    let host = host.trim();
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{host}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construct_api_url_avoids_double_slashes() {
        assert_eq!(
            construct_api_url("http://127.0.0.1:11434///", "api/tags"),
            "http://127.0.0.1:11434/api/tags"
        );
        assert_eq!(
            construct_api_url(DEFAULT_BASE_URL, "api/generate"),
            "http://localhost:11434/api/generate"
        );
    }

    #[test]
    fn base_url_from_host_adds_scheme_only_when_missing() {
        assert_eq!(base_url_from_host("0.0.0.0:11434"), "http://0.0.0.0:11434");
        assert_eq!(
            base_url_from_host(" https://gpu-box:11434 "),
            "https://gpu-box:11434"
        );
    }
}
