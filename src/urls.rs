use regex::Regex;

/// Accepts watch, short-link, shorts and playlist URLs for a set of hosts.
#[derive(Debug, Clone)]
pub struct UrlValidator {
    patterns: Vec<Regex>,
    playlist: Regex,
}

impl UrlValidator {
    pub fn new<S: AsRef<str>>(sites: &[S], short_hosts: &[S]) -> Self {
        let sites = alternation(sites);
        let short_hosts = alternation(short_hosts);

        // Host lists are escaped, so these always compile.
        let build = |pattern: String| Regex::new(&pattern).expect("valid url pattern");

        let playlist = build(format!(
            r"^https?://(?:www\.)?(?:{sites})/playlist\?list=[\w-]+"
        ));
        let patterns = vec![
            build(format!(r"^https?://(?:www\.)?(?:{sites})/watch\?v=[\w-]+")),
            build(format!(r"^https?://(?:{short_hosts})/[\w-]+")),
            build(format!(r"^https?://(?:www\.)?(?:{sites})/shorts/[\w-]+")),
            playlist.clone(),
        ];

        Self { patterns, playlist }
    }

    pub fn is_valid(&self, url: &str) -> bool {
        !url.is_empty() && self.patterns.iter().any(|p| p.is_match(url))
    }

    pub fn is_playlist(&self, url: &str) -> bool {
        self.playlist.is_match(url)
    }
}

impl Default for UrlValidator {
    fn default() -> Self {
        Self::new(&["youtube.com"], &["youtu.be"])
    }
}

fn alternation<S: AsRef<str>>(hosts: &[S]) -> String {
    let escaped: Vec<String> = hosts
        .iter()
        .map(|h| regex::escape(h.as_ref().trim()))
        .filter(|h| !h.is_empty())
        .collect();

    if escaped.is_empty() {
        // NUL never appears in a URL host
        r"\x00".to_string()
    } else {
        escaped.join("|")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> UrlValidator {
        UrlValidator::new(&["example.com"], &["youtu.be"])
    }

    #[test]
    fn accepts_known_shapes() {
        let v = validator();
        assert!(v.is_valid("https://www.example.com/watch?v=abc123"));
        assert!(v.is_valid("https://youtu.be/abc123"));
        assert!(v.is_valid("https://example.com/shorts/abc_12"));
        assert!(v.is_valid("https://example.com/playlist?list=xyz-9"));
        assert!(v.is_valid("http://example.com/watch?v=a-b_c"));
    }

    #[test]
    fn rejects_other_shapes() {
        let v = validator();
        assert!(!v.is_valid("https://example.com/video/123"));
        assert!(!v.is_valid(""));
        assert!(!v.is_valid("not a url"));
        assert!(!v.is_valid("https://exampleXcom/watch?v=abc"));
        assert!(!v.is_valid("ftp://example.com/watch?v=abc"));
    }

    #[test]
    fn detects_playlists() {
        let v = validator();
        assert!(v.is_playlist("https://www.example.com/playlist?list=PL123"));
        assert!(!v.is_playlist("https://www.example.com/watch?v=abc123"));
    }

    #[test]
    fn default_targets_youtube() {
        let v = UrlValidator::default();
        assert!(v.is_valid("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(!v.is_valid("https://www.example.com/watch?v=abc123"));
    }

    #[test]
    fn empty_host_lists_match_nothing() {
        let v = UrlValidator::new::<&str>(&[], &[]);
        assert!(!v.is_valid("https://youtu.be/abc"));
    }
}
