use url::Url;

/// A user-supplied target that parsed as an absolute `http`/`https` URL.
///
/// `raw` keeps the caller's spelling (minus surrounding whitespace) so responses echo
/// exactly what was sent; `parsed` is what the rest of the pipeline inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetUrl {
    raw: String,
    parsed: Url,
}

impl TargetUrl {
    pub fn parse(candidate: &str) -> Option<Self> {
        let raw = candidate.trim();
        let parsed = Url::parse(raw).ok()?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return None;
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return None;
        }
        Some(Self {
            raw: raw.to_owned(),
            parsed,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn url(&self) -> &Url {
        &self.parsed
    }
}

impl std::fmt::Display for TargetUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

#[must_use]
pub fn is_valid_target(candidate: &str) -> bool {
    TargetUrl::parse(candidate).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_and_https() {
        assert!(is_valid_target("http://example.com"));
        assert!(is_valid_target("https://example.com/products?id=1"));
        assert!(is_valid_target("  https://example.com/a/b  "));
    }

    #[test]
    fn rejects_other_schemes_and_garbage() {
        for candidate in [
            "ftp://x",
            "not a url",
            "",
            "   ",
            "example.com",
            "/relative/path",
            "mailto:someone@example.com",
            "javascript:alert(1)",
            "file:///etc/passwd",
            "http://",
        ] {
            assert!(!is_valid_target(candidate), "{candidate:?} should be rejected");
        }
    }

    #[test]
    fn keeps_trimmed_spelling() {
        let target = TargetUrl::parse(" https://example.com ").expect("valid target");
        assert_eq!(target.as_str(), "https://example.com");
        assert_eq!(target.url().as_str(), "https://example.com/");
        assert_eq!(target.to_string(), "https://example.com");
    }
}
