//! Identity URLs and host label extraction.

use url::Url;

/// Build the public URL for a generated label, e.g. `http://k3j9x0aa.example.com`.
pub fn identity_url(scheme: &str, domain: &str, label: &str) -> String {
    format!("{}://{}.{}", scheme, label, domain)
}

/// True iff `candidate` is an absolute `http`/`https` URL with a non-empty host.
pub fn validate_url(candidate: &str) -> bool {
    match Url::parse(candidate) {
        Ok(parsed) => {
            matches!(parsed.scheme(), "http" | "https")
                && parsed.host_str().is_some_and(|h| !h.is_empty())
        }
        Err(_) => false,
    }
}

/// Leftmost DNS label of a `Host` header value, lowercased.
///
/// A trailing `:port` is ignored. Returns `None` when no label is present.
pub fn host_label(host: &str) -> Option<String> {
    let host = host.trim();
    let without_port = match host.rfind(':') {
        Some(idx)
            if !host[idx..].contains(']')
                && host[idx + 1..].chars().all(|c| c.is_ascii_digit()) =>
        {
            &host[..idx]
        }
        _ => host,
    };

    let label = without_port.split('.').next().unwrap_or_default();
    if label.is_empty() {
        None
    } else {
        Some(label.to_ascii_lowercase())
    }
}

/// Leftmost label of a validated identity URL's host.
pub fn url_label(candidate: &str) -> Option<String> {
    if !validate_url(candidate) {
        return None;
    }
    let parsed = Url::parse(candidate).ok()?;
    host_label(parsed.host_str()?)
}
