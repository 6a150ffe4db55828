use std::net::IpAddr;
use thiserror::Error;
use url::Url;

/// Errors that can occur while validating a remote endpoint.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// Plain HTTP to a non-loopback host would expose the store key.
    #[error("HTTPS required for {0} (plain HTTP is allowed for localhost only)")]
    InsecureScheme(String),
    /// The URL has no host component.
    #[error("URL has no host")]
    MissingHost,
}

/// Validates a store or relay endpoint.
///
/// Requests to these endpoints carry the store key, so plain HTTP is only
/// accepted for loopback hosts (local development stacks and test servers).
///
/// # Examples
///
/// ```
/// use brief_sync::util::validate_endpoint;
///
/// assert!(validate_endpoint("https://store.example.com").is_ok());
/// assert!(validate_endpoint("http://127.0.0.1:54321").is_ok());
/// assert!(validate_endpoint("http://store.example.com").is_err());
/// assert!(validate_endpoint("file:///etc/passwd").is_err());
/// ```
pub fn validate_endpoint(url_str: &str) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlValidationError::UnsupportedScheme(url.scheme().to_owned()));
    }
    let host = url.host_str().ok_or(UrlValidationError::MissingHost)?;

    if url.scheme() == "http" {
        if !is_loopback_host(host) {
            return Err(UrlValidationError::InsecureScheme(host.to_owned()));
        }
        tracing::debug!(url = %url, "Using plain HTTP endpoint (loopback only)");
    }

    Ok(url)
}

fn is_loopback_host(host: &str) -> bool {
    if host == "localhost" {
        return true;
    }
    // Strip brackets from IPv6 addresses for parsing
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    host.parse::<IpAddr>().is_ok_and(|ip| ip.is_loopback())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_https_accepted() {
        assert!(validate_endpoint("https://abc.supabase.co").is_ok());
        assert!(validate_endpoint("https://relay.example.com/api/trigger-sync").is_ok());
    }

    #[test]
    fn test_http_loopback_accepted() {
        assert!(validate_endpoint("http://localhost:54321").is_ok());
        assert!(validate_endpoint("http://127.0.0.1:8080").is_ok());
        assert!(validate_endpoint("http://[::1]:8080").is_ok());
    }

    #[test]
    fn test_http_remote_rejected() {
        assert!(matches!(
            validate_endpoint("http://store.example.com"),
            Err(UrlValidationError::InsecureScheme(_))
        ));
        assert!(matches!(
            validate_endpoint("http://192.168.1.10"),
            Err(UrlValidationError::InsecureScheme(_))
        ));
    }

    #[test]
    fn test_invalid_schemes() {
        assert!(matches!(
            validate_endpoint("ftp://example.com"),
            Err(UrlValidationError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_unparseable() {
        assert!(matches!(
            validate_endpoint("not a url"),
            Err(UrlValidationError::InvalidUrl(_))
        ));
    }
}
