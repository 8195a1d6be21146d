//! URL resolution and origin classification.
//!
//! Same-origin is an exact comparison of the URL authority (`host[:port]`)
//! against the site domain. `www.example.com`, `example.com` and
//! `cdn.example.com` are all foreign to each other.

use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    SameOrigin,
    Foreign,
    /// `data:`, `javascript:`, `mailto:`, `tel:` and every other non-http(s) scheme.
    NonFetchable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedUrl {
    pub url: Url,
    pub origin: Origin,
}

impl ResolvedUrl {
    pub fn is_same_origin(&self) -> bool {
        self.origin == Origin::SameOrigin
    }

    pub fn fragment(&self) -> Option<&str> {
        self.url.fragment()
    }

    /// Identity of the resource: the absolute URL without its fragment.
    pub fn key(&self) -> String {
        registry_key(&self.url)
    }
}

/// Resolves `raw` against `base`.
///
/// Absolute URLs pass through, protocol-relative URLs inherit the scheme of
/// `base`, everything else follows RFC 3986 reference resolution.
pub fn normalize(raw: &str, base: &Url) -> Result<Url, url::ParseError> {
    let raw = raw.trim();
    if has_scheme(raw) {
        Url::parse(raw)
    } else if raw.starts_with("//") {
        // Protocol-relative URL
        Url::parse(&format!("{}:{}", base.scheme(), raw))
    } else {
        base.join(raw)
    }
}

pub fn classify(url: &Url, site_domain: &str) -> Origin {
    if !matches!(url.scheme(), "http" | "https") {
        return Origin::NonFetchable;
    }
    match authority(url) {
        None => Origin::SameOrigin,
        Some(authority) if authority == site_domain => Origin::SameOrigin,
        Some(_) => Origin::Foreign,
    }
}

/// Normalizes and classifies a raw reference in one step.
///
/// Returns `None` for blank references and for strings that cannot be
/// resolved; callers treat those as opaque text.
pub fn resolve(raw: &str, base: &Url, site_domain: &str) -> Option<ResolvedUrl> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    match normalize(trimmed, base) {
        Ok(url) => {
            let origin = classify(&url, site_domain);
            Some(ResolvedUrl { url, origin })
        }
        Err(e) => {
            tracing::debug!("Skipping unresolvable reference {:?}: {}", trimmed, e);
            None
        }
    }
}

/// String-level same-domain check.
///
/// A reference without a host (e.g. `/x.png`) counts as same-origin.
pub fn is_same_domain(raw: &str, domain: &str) -> bool {
    let raw = raw.trim();
    let parsed = if raw.starts_with("//") {
        Url::parse(&format!("https:{}", raw))
    } else {
        Url::parse(raw)
    };

    match parsed {
        Ok(url) => match authority(&url) {
            None => true,
            Some(authority) => authority == domain,
        },
        Err(url::ParseError::RelativeUrlWithoutBase) => true,
        Err(_) => false,
    }
}

/// `host[:port]`, with the port only when it is not the scheme default.
pub fn authority(url: &Url) -> Option<String> {
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

pub fn registry_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_fragment(None);
    key.into()
}

/// Prepares user input as a target URL: trims it, defaults the scheme to
/// `https://` and drops a trailing slash.
pub fn normalize_target(input: &str) -> String {
    let input = input.trim();
    let with_scheme = if input.starts_with("http://") || input.starts_with("https://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };
    with_scheme.trim_end_matches('/').to_string()
}

/// Directory name for a mirrored site: the authority without a leading
/// `www.`, with characters unsafe on common filesystems replaced.
pub fn project_name(target: &Url) -> String {
    let authority = authority(target).unwrap_or_default();
    let name = authority.strip_prefix("www.").unwrap_or(&authority);
    let name: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect();

    if name.is_empty() {
        "site".to_string()
    } else {
        name
    }
}

fn has_scheme(raw: &str) -> bool {
    let Some(colon) = raw.find(':') else {
        return false;
    };
    let scheme = &raw[..colon];
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        _ => false,
    }
}
