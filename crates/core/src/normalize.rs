//! Text canonicalization for fact-keyword matching

use once_cell::sync::Lazy;
use regex::Regex;

static BULLET_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[•\-–·]\s*").unwrap());
static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Canonical form used for fact matching: bullet and dash runs become a
/// single space, whitespace collapses, the result is trimmed and lowercased.
///
/// Chat answers arrive as rendered list markup; required facts are plain
/// phrases, so list decoration has to go before substring matching.
pub fn canonicalize(text: &str) -> String {
    let no_bullets = BULLET_RUNS.replace_all(text, " ");
    let collapsed = WHITESPACE_RUNS.replace_all(&no_bullets, " ");
    collapsed.trim().to_lowercase()
}

/// Coarser normalizer: lowercase with all punctuation removed. Keeps
/// alphanumerics and whitespace only, so it works for Arabic as well.
pub fn strip_punctuation(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_flattens_bullet_lists() {
        let text = "Requirements:\n• Valid passport\n• Photograph\n- Proof of residence";
        assert_eq!(
            canonicalize(text),
            "requirements: valid passport photograph proof of residence"
        );
    }

    #[test]
    fn canonicalize_collapses_whitespace_and_lowercases() {
        assert_eq!(canonicalize("  Visa\t\tFees\n\nApply  "), "visa fees apply");
    }

    #[test]
    fn canonicalize_keeps_arabic_text_intact() {
        assert_eq!(canonicalize("  التأشيرة   الذهبية "), "التأشيرة الذهبية");
    }

    #[test]
    fn strip_punctuation_drops_symbols() {
        assert_eq!(strip_punctuation("Visa, fees: AED 650!"), "visa fees aed 650");
    }
}
