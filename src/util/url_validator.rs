use std::net::IpAddr;
use thiserror::Error;
use url::{Host, Url};

/// Errors that can occur during URL validation.
#[derive(Error, Debug)]
pub enum UrlValidationError {
    /// The URL string could not be parsed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// The URL uses a scheme other than http or https.
    #[error("Unsupported scheme: {0} (only http/https allowed)")]
    UnsupportedScheme(String),
    /// The URL points to a private/internal IP address.
    #[error("Private IP address not allowed: {0}")]
    PrivateIp(String),
    /// The URL points to localhost.
    #[error("Localhost not allowed")]
    Localhost,
}

/// Validates a source URL (page or feed) before it is fetched.
///
/// Rejects non-HTTP(S) schemes always. Localhost and private address ranges
/// (RFC 1918, link-local, unique local IPv6) are rejected unless
/// `allow_private` is set, which is how a local WordPress install or a test
/// server is reached.
///
/// # Examples
///
/// ```
/// use presswire::util::validate_url;
///
/// assert!(validate_url("https://example.com/feed/", false).is_ok());
/// assert!(validate_url("http://192.168.1.1/feed", false).is_err());
/// assert!(validate_url("http://192.168.1.1/feed", true).is_ok());
/// assert!(validate_url("file:///etc/passwd", true).is_err());
/// ```
pub fn validate_url(url_str: &str, allow_private: bool) -> Result<Url, UrlValidationError> {
    let url = Url::parse(url_str.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlValidationError::UnsupportedScheme(scheme.to_owned())),
    }

    if allow_private {
        return Ok(url);
    }

    if let Some(host) = url.host_str() {
        if host.eq_ignore_ascii_case("localhost") {
            return Err(UrlValidationError::Localhost);
        }

        let host_for_parse = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);

        if let Ok(ip) = host_for_parse.parse::<IpAddr>() {
            if ip.is_loopback() {
                return Err(UrlValidationError::Localhost);
            }
            if is_private_ip(&ip) {
                return Err(UrlValidationError::PrivateIp(ip.to_string()));
            }
        }
    }

    Ok(url)
}

/// Returns true when `base` may carry a bearer secret: HTTPS, or plain HTTP
/// to a loopback host.
pub fn is_secure_or_loopback(base: &str) -> bool {
    let Ok(url) = Url::parse(base) else {
        return false;
    };
    match url.scheme() {
        "https" => true,
        "http" => match url.host() {
            Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
            Some(Host::Ipv4(ip)) => ip.is_loopback(),
            Some(Host::Ipv6(ip)) => ip.is_loopback(),
            None => false,
        },
        _ => false,
    }
}

fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(ipv4) => {
            ipv4.is_private() || ipv4.is_loopback() || ipv4.is_link_local() || ipv4.is_unspecified()
        }
        IpAddr::V6(ipv6) => {
            if ipv6.is_loopback() || ipv6.is_unspecified() {
                return true;
            }
            let segments = ipv6.segments();
            // fc00::/7
            let is_unique_local = (segments[0] & 0xfe00) == 0xfc00;
            // fe80::/10
            let is_link_local = (segments[0] & 0xffc0) == 0xfe80;
            is_unique_local || is_link_local
        }
    }
}
