//! Plain key/value diagnostic attachments
//!
//! The engine explains every verdict through named text attachments; how a
//! report sink stores or renders them is out of scope here.

use serde::{Deserialize, Serialize};

use crate::dataset::PromptCase;
use crate::judge::Judgment;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub name: String,
    pub body: String,
}

impl Attachment {
    pub fn new(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self { name: name.into(), body: body.into() }
    }
}

/// Everything a human needs to triage a verdict: the prompt, both texts,
/// the score, and a one-line summary of the policy inputs.
pub fn judgment_attachments(case: &PromptCase, answer: &str, judgment: &Judgment) -> Vec<Attachment> {
    let mut attachments = vec![
        Attachment::new("prompt", &case.user),
        Attachment::new("app_answer", answer),
    ];

    if let Some(golden) = &case.golden {
        attachments.push(Attachment::new("golden_answer", golden));
    }
    if let Some(score) = judgment.score {
        attachments.push(Attachment::new("similarity", format!("{score:.3}")));
    }

    attachments.push(Attachment::new(
        "diagnostics",
        format!(
            "facts_hit={}/{} len_ratio={:.1} base_thr={:.2} eff_thr={:.2}",
            judgment.fact_hits,
            judgment.facts_required,
            judgment.length_ratio,
            judgment.base_threshold,
            judgment.effective_threshold,
        ),
    ));

    attachments
}

/// One-line failure summary in the style a test assertion message wants.
pub fn failure_summary(case: &PromptCase, judgment: &Judgment) -> String {
    match judgment.score {
        Some(score) => format!(
            "[{}] similarity {:.2} (base {:.2}, eff {:.2}, len {:.1}) facts {}/{}",
            case.id,
            score,
            judgment.base_threshold,
            judgment.effective_threshold,
            judgment.length_ratio,
            judgment.fact_hits,
            judgment.facts_required,
        ),
        None => format!(
            "[{}] answer of {} chars, facts {}/{} (needed {})",
            case.id,
            judgment.answer_chars,
            judgment.fact_hits,
            judgment.facts_required,
            judgment.needed,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::decide_with_golden;

    fn case() -> PromptCase {
        serde_json::from_str(
            r#"{
                "id": "golden_visa_en",
                "user": "What is the Golden Visa?",
                "lang": "en",
                "golden": "A ten-year residence visa.",
                "must_contain": ["visa"]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn golden_case_attaches_score_and_reference() {
        let case = case();
        let answer = "The Golden Visa is a ten-year residence visa.";
        let judgment =
            decide_with_golden(0.91, answer, case.golden.as_deref().unwrap(), &case.must_contain, 0.85);
        let attachments = judgment_attachments(&case, answer, &judgment);

        let names: Vec<&str> = attachments.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["prompt", "app_answer", "golden_answer", "similarity", "diagnostics"]);

        let similarity = &attachments[3];
        assert_eq!(similarity.body, "0.910");
        assert!(attachments[4].body.starts_with("facts_hit=1/1"));
    }

    #[test]
    fn failure_summary_mentions_case_and_thresholds() {
        let case = case();
        let judgment = decide_with_golden(0.42, "Too different.", "A ten-year residence visa.", &[], 0.85);
        let summary = failure_summary(&case, &judgment);
        assert!(summary.starts_with("[golden_visa_en] similarity 0.42"));
        assert!(summary.contains("base 0.85"));
    }
}
