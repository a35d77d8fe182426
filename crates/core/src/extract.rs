//! Trailing-section removal for captured answers

/// Section headings that start a citation/footer block, in both languages.
/// Checked in order; the first marker present wins.
const SECTION_MARKERS: [&str; 4] = ["\nSources", "\nOfficial Resources", "\nالمصادر", "\nمصادر"];

/// Strip a trailing citations/footer section from a settled answer.
///
/// Source blocks and CTA footers would skew similarity scoring against a
/// golden answer that contains neither. Returns the text unchanged when no
/// marker is found; idempotent, since the cut text no longer contains the
/// marker.
pub fn strip_sources(text: &str) -> &str {
    for marker in SECTION_MARKERS {
        if let Some(idx) = text.find(marker) {
            return text[..idx].trim();
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuts_english_sources_block() {
        let text = "You can renew the visa online.\nSources\n1. gdrfad.gov.ae";
        assert_eq!(strip_sources(text), "You can renew the visa online.");
    }

    #[test]
    fn cuts_arabic_sources_block() {
        let text = "يمكنك تجديد التأشيرة عبر الإنترنت.\nالمصادر\n١. بوابة الحكومة";
        assert_eq!(strip_sources(text), "يمكنك تجديد التأشيرة عبر الإنترنت.");
    }

    #[test]
    fn cuts_official_resources_footer() {
        let text = "Fees start at AED 650.\nOfficial Resources\nVisit icp.gov.ae";
        assert_eq!(strip_sources(text), "Fees start at AED 650.");
    }

    #[test]
    fn leaves_plain_answers_unchanged() {
        let text = "No citations here, just an answer.";
        assert_eq!(strip_sources(text), text);
    }

    #[test]
    fn idempotent_on_already_trimmed_text() {
        let once = strip_sources("Answer body.\nSources\nlink");
        assert_eq!(strip_sources(once), once);
    }

    #[test]
    fn inline_mention_of_sources_is_not_a_marker() {
        // The marker requires a line break before the heading.
        let text = "These Sources are listed inline.";
        assert_eq!(strip_sources(text), text);
    }
}
