//! Content-level answer checks
//!
//! Pure helpers over captured answer text: markup hygiene, link allowlists,
//! and fallback keyword coverage. The runner decides what to do with a
//! failed check; nothing here touches the browser.

use once_cell::sync::Lazy;
use regex::Regex;

static SCRIPT_OR_STYLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<\s*(script|style)\b").unwrap());
static OPEN_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([a-zA-Z]+)[^>/]*>").unwrap());
static CLOSE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</([a-zA-Z]+)\s*>").unwrap());
static URL: Lazy<Regex> = Lazy::new(|| Regex::new(r"https?://[^\s)\]]+").unwrap());

/// Elements that never take a closing tag and are excluded from balancing.
const VOID_ELEMENTS: [&str; 6] = ["br", "hr", "img", "input", "meta", "link"];

/// Light markup hygiene check: no script/style blocks, and closing tags may
/// not outnumber opening tags by more than a small slack (renderers emit
/// self-closing and fragmentary markup legitimately).
pub fn looks_clean(text: &str) -> bool {
    if SCRIPT_OR_STYLE.is_match(text) {
        return false;
    }

    let opens = OPEN_TAG
        .captures_iter(text)
        .map(|c| c[1].to_ascii_lowercase())
        .filter(|tag| !VOID_ELEMENTS.contains(&tag.as_str()))
        .count();
    let closes = CLOSE_TAG.captures_iter(text).count();

    closes <= opens + 2
}

/// Allowlist of domains that answer links may point to. Any URL outside the
/// list counts as a hallucinated reference.
#[derive(Debug, Clone)]
pub struct LinkAllowlist {
    pattern: Regex,
}

impl LinkAllowlist {
    /// The approved government domains for this deployment.
    pub fn government_default() -> Self {
        Self {
            pattern: Regex::new(r"(?i)(gdrfad\.gov\.ae|icp\.gov\.ae|u\.ae|gov\.ae)").unwrap(),
        }
    }

    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self { pattern: Regex::new(pattern)? })
    }

    /// URLs in `text` that match no allowlisted domain.
    pub fn offending_links<'t>(&self, text: &'t str) -> Vec<&'t str> {
        URL.find_iter(text)
            .map(|m| m.as_str())
            .filter(|url| !self.pattern.is_match(url))
            .collect()
    }

    pub fn all_allowed(&self, text: &str) -> bool {
        self.offending_links(text).is_empty()
    }
}

/// Required phrases absent from the answer (case-insensitive containment).
pub fn missing_phrases<'p>(answer: &str, phrases: &'p [String]) -> Vec<&'p str> {
    let haystack = answer.to_lowercase();
    phrases
        .iter()
        .map(|p| p.as_str())
        .filter(|p| !haystack.contains(&p.to_lowercase()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_clean() {
        assert!(looks_clean("You can renew the visa online at the ICP portal."));
    }

    #[test]
    fn script_blocks_are_rejected() {
        assert!(!looks_clean("Before <script>alert(1)</script> after"));
        assert!(!looks_clean("< style >p{}</style>"));
    }

    #[test]
    fn balanced_markup_is_clean() {
        assert!(looks_clean("<p>Fees are <strong>AED 650</strong>.</p><br>"));
    }

    #[test]
    fn grossly_unbalanced_markup_is_rejected() {
        assert!(!looks_clean("text</div></div></div></p>"));
    }

    #[test]
    fn void_elements_do_not_count_as_openers() {
        // Three closers against three void openers exceeds the slack.
        assert!(!looks_clean("<br><hr><img src=x></p></div></span>"));
    }

    #[test]
    fn government_links_pass_the_allowlist() {
        let allowlist = LinkAllowlist::government_default();
        let answer = "Apply at https://icp.gov.ae/en/services and https://u.ae/en#visas";
        assert!(allowlist.all_allowed(answer));
    }

    #[test]
    fn external_links_are_reported() {
        let allowlist = LinkAllowlist::government_default();
        let answer = "See https://example.com/visa-help and https://gdrfad.gov.ae/en";
        let offending = allowlist.offending_links(answer);
        assert_eq!(offending, vec!["https://example.com/visa-help"]);
    }

    #[test]
    fn answers_without_links_are_trivially_allowed() {
        assert!(LinkAllowlist::government_default().all_allowed("No links at all."));
    }

    #[test]
    fn missing_phrases_reports_only_absent_ones() {
        let phrases = vec!["sorry".to_string(), "rephrase".to_string()];
        let missing = missing_phrases("I'm SORRY, I didn't catch that.", &phrases);
        assert_eq!(missing, vec!["rephrase"]);
    }
}
