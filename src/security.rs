//! SSRF guard applied to every URL before any outbound request.
//!
//! Checks run on the URL text alone: scheme, then private-network host
//! patterns, then the domain allow-list. No DNS lookups happen here.

use crate::{classify::host_matches, errors::ExtractError};
use once_cell::sync::Lazy;
use regex::Regex;
use std::net::IpAddr;
use url::{Host, Url};

/// Social platforms, their CDNs, and known scraping mirrors.
pub const ALLOWED_DOMAINS: &[&str] = &[
    "twitter.com",
    "x.com",
    "reddit.com",
    "redd.it",
    "imgur.com",
    "youtube.com",
    "youtu.be",
    "pbs.twimg.com",
    "video.twimg.com",
    "abs.twimg.com",
    "ton.twimg.com",
    "nitter.net",
    "nitter.poast.org",
    "nitter.privacydev.net",
    "fxtwitter.com",
    "vxtwitter.com",
    "rxddit.com",
];

static BLOCKED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"^localhost$",
        r"^127\.",
        r"^10\.",
        r"^172\.(1[6-9]|2[0-9]|3[0-1])\.",
        r"^192\.168\.",
        r"^0\.0\.0\.0$",
        r"^::1$",
        r"\.local$",
        r"\.internal$",
        r"\.localhost$",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("Failed to compile blocked host pattern"))
    .collect()
});

const SENSITIVE_PARAMS: &[&str] = &[
    "key", "token", "auth", "secret", "password", "api_key", "apikey",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateOptions {
    /// Skip the allow-list for https URLs. Only for direct media links.
    pub allow_any_https: bool,
}

fn is_ip_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback() || v4.is_private() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
                || v6.to_ipv4_mapped().is_some_and(|v4| is_ip_private(&IpAddr::V4(v4)))
        }
    }
}

/// Host-level private network check shared with the HTTP client's redirect policy.
pub fn is_blocked_host(host: &Host<&str>) -> bool {
    match host {
        Host::Ipv4(v4) => {
            is_ip_private(&IpAddr::V4(*v4)) || matches_blocked_pattern(&v4.to_string())
        }
        Host::Ipv6(v6) => {
            is_ip_private(&IpAddr::V6(*v6)) || matches_blocked_pattern(&v6.to_string())
        }
        Host::Domain(domain) => {
            let domain = domain.trim_end_matches('.').to_lowercase();
            matches_blocked_pattern(&domain)
        }
    }
}

fn matches_blocked_pattern(host: &str) -> bool {
    BLOCKED_PATTERNS.iter().any(|p| p.is_match(host))
}

/// True for URLs no request may ever be sent to.
pub fn is_blocked_url(url: &Url) -> bool {
    if !matches!(url.scheme(), "http" | "https") {
        return true;
    }
    match url.host() {
        Some(host) => is_blocked_host(&host),
        None => true,
    }
}

pub fn validate_url(raw: &str, opts: ValidateOptions) -> Result<Url, ExtractError> {
    let url = Url::parse(raw.trim()).map_err(|_| ExtractError::InvalidUrl("Malformed URL".into()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ExtractError::InvalidUrl(
            "Only HTTP/HTTPS URLs are allowed".into(),
        ));
    }

    let host = match url.host() {
        Some(h) => h,
        None => return Err(ExtractError::InvalidUrl("URL has no host".into())),
    };

    if is_blocked_host(&host) {
        return Err(ExtractError::Blocked(
            "Internal network URLs are not allowed".into(),
        ));
    }

    if opts.allow_any_https && url.scheme() == "https" {
        return Ok(url);
    }

    let hostname = host.to_string().to_lowercase();
    if !ALLOWED_DOMAINS.iter().any(|d| host_matches(&hostname, d)) {
        return Err(ExtractError::DomainNotAllowed(format!(
            "Domain not allowed: {hostname}"
        )));
    }

    Ok(url)
}

/// Redact credential-looking query parameters before a URL reaches the logs.
pub fn sanitize_url_for_logging(raw: &str) -> String {
    let mut url = match Url::parse(raw) {
        Ok(u) => u,
        Err(_) => return "[Invalid URL]".to_string(),
    };

    if url.query().is_none() {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let v = if SENSITIVE_PARAMS.contains(&k.to_ascii_lowercase().as_str()) {
                "[REDACTED]".to_string()
            } else {
                v.to_string()
            };
            (k.to_string(), v)
        })
        .collect();

    url.query_pairs_mut().clear().extend_pairs(pairs);
    url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strict(raw: &str) -> Result<Url, ExtractError> {
        validate_url(raw, ValidateOptions::default())
    }

    fn any_https(raw: &str) -> Result<Url, ExtractError> {
        validate_url(raw, ValidateOptions { allow_any_https: true })
    }

    #[test]
    fn test_rejects_non_http_schemes() {
        for raw in ["ftp://imgur.com/a.png", "file:///etc/passwd", "javascript:alert(1)"] {
            let err = any_https(raw).unwrap_err();
            assert!(matches!(err, ExtractError::InvalidUrl(_)), "{raw}: {err:?}");
        }
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(matches!(strict("not a url"), Err(ExtractError::InvalidUrl(_))));
    }

    #[test]
    fn test_blocks_private_hosts() {
        let blocked = [
            "http://localhost/x",
            "http://LOCALHOST:8080/x",
            "http://127.0.0.1/x",
            "http://127.1/x",
            "http://10.1.2.3/x",
            "http://172.16.0.1/x",
            "http://172.31.255.255/x",
            "http://192.168.1.1/x",
            "http://0.0.0.0/x",
            "http://[::1]/x",
            "http://[fd00::1]/x",
            "http://[::ffff:127.0.0.1]/x",
            "http://169.254.169.254/latest/meta-data",
            "https://printer.local/x",
            "https://metadata.google.internal/x",
            "https://app.localhost/x",
            "http://2130706433/x",
        ];
        for raw in blocked {
            let err = any_https(raw).unwrap_err();
            assert!(matches!(err, ExtractError::Blocked(_)), "{raw}: {err:?}");
        }
    }

    #[test]
    fn test_public_ranges_not_blocked() {
        assert!(any_https("https://172.32.0.1/a.png").is_ok());
        assert!(any_https("https://11.0.0.1/a.png").is_ok());
    }

    #[test]
    fn test_allow_list() {
        assert!(strict("https://twitter.com/a/status/1").is_ok());
        assert!(strict("https://www.reddit.com/r/pics").is_ok());
        assert!(strict("https://i.imgur.com/abc.jpg").is_ok());
        assert!(strict("https://api.fxtwitter.com/a/status/1").is_ok());

        let err = strict("https://example.com/a.png").unwrap_err();
        assert_eq!(
            err,
            ExtractError::DomainNotAllowed("Domain not allowed: example.com".into())
        );
        assert!(matches!(
            strict("https://notreddit.com/r/a"),
            Err(ExtractError::DomainNotAllowed(_))
        ));
    }

    #[test]
    fn test_allow_any_https_only_covers_https() {
        assert!(any_https("https://example.com/a.png").is_ok());
        assert!(matches!(
            any_https("http://example.com/a.png"),
            Err(ExtractError::DomainNotAllowed(_))
        ));
    }

    #[test]
    fn test_is_blocked_url() {
        assert!(is_blocked_url(&Url::parse("http://10.0.0.5/").unwrap()));
        assert!(is_blocked_url(&Url::parse("gopher://example.com/").unwrap()));
        assert!(!is_blocked_url(&Url::parse("https://i.imgur.com/a.png").unwrap()));
    }

    #[test]
    fn test_sanitize_url_for_logging() {
        assert_eq!(
            sanitize_url_for_logging("https://cdn.example/a.png?token=abc&w=10"),
            "https://cdn.example/a.png?token=%5BREDACTED%5D&w=10"
        );
        assert_eq!(
            sanitize_url_for_logging("https://cdn.example/a.png"),
            "https://cdn.example/a.png"
        );
        assert_eq!(sanitize_url_for_logging("nope"), "[Invalid URL]");
    }
}
