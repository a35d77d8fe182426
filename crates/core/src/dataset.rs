//! Prompt-case dataset loaded once per run

use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Language of a prompt case. Selects the embedding profile and the default
/// similarity threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Ar,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ar => "ar",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::En
    }
}

/// Default similarity threshold for English goldens (monolingual model).
pub const DEFAULT_EN_THRESHOLD: f64 = 0.85;
/// Default similarity threshold for Arabic goldens (multilingual model).
pub const DEFAULT_AR_THRESHOLD: f64 = 0.80;

/// One prompt case from the dataset. Immutable after loading; defaults are
/// resolved at load time, not at point of use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptCase {
    /// Unique case identifier; paired en/ar cases share a base id with an
    /// `_en`/`_ar` suffix.
    pub id: String,

    /// The user-visible question sent to the chatbot.
    #[serde(alias = "prompt")]
    pub user: String,

    #[serde(default)]
    pub lang: Language,

    /// Human-authored reference answer, when one exists.
    #[serde(default)]
    pub golden: Option<String>,

    /// Required fact substrings, matched case-insensitively against the
    /// canonicalized answer. Lowercased at load time.
    #[serde(default)]
    pub must_contain: Vec<String>,

    /// Per-case override of the base similarity threshold.
    #[serde(default)]
    pub threshold: Option<f64>,

    /// Per-case override of the multilingual (cross-language) threshold.
    #[serde(default)]
    pub xl_threshold: Option<f64>,
}

impl PromptCase {
    /// Base similarity threshold for this case: explicit `threshold` if set,
    /// else 0.85 for English; Arabic falls back to `xl_threshold`, else 0.80.
    pub fn base_threshold(&self) -> f64 {
        if let Some(t) = self.threshold {
            return t;
        }
        match self.lang {
            Language::En => DEFAULT_EN_THRESHOLD,
            Language::Ar => self.xl_threshold.unwrap_or(DEFAULT_AR_THRESHOLD),
        }
    }

    /// Threshold used when this case participates in an EN↔AR consistency
    /// comparison.
    pub fn consistency_threshold(&self) -> f64 {
        self.xl_threshold.unwrap_or(DEFAULT_AR_THRESHOLD)
    }

    /// Case id with the language suffix removed, for pairing en/ar variants.
    pub fn base_id(&self) -> &str {
        static LANG_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"_(en|ar)$").unwrap());
        match LANG_SUFFIX.find(&self.id) {
            Some(m) => &self.id[..m.start()],
            None => &self.id,
        }
    }

    /// Fallback-behavior probes are tagged through their id.
    pub fn is_fallback_probe(&self) -> bool {
        self.id.contains("fallback_test")
    }

    fn resolve(&mut self) {
        for fact in &mut self.must_contain {
            *fact = fact.to_lowercase();
        }
        if let Some(golden) = &mut self.golden {
            *golden = golden.trim().to_string();
        }
    }
}

/// The full prompt dataset, consumed read-only once per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub prompts: Vec<PromptCase>,
}

impl Dataset {
    /// Parse a dataset from a JSON string and resolve per-case defaults.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let mut dataset: Dataset = serde_json::from_str(json)?;
        for case in &mut dataset.prompts {
            case.resolve();
        }
        Ok(dataset)
    }

    /// Load a dataset from a JSON file.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Dataset(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Cases that carry a golden reference answer.
    pub fn golden_cases(&self) -> Vec<&PromptCase> {
        self.prompts.iter().filter(|c| c.golden.is_some()).collect()
    }

    pub fn by_language(&self, lang: Language) -> Vec<&PromptCase> {
        self.prompts.iter().filter(|c| c.lang == lang).collect()
    }

    pub fn fallback_probes(&self) -> Vec<&PromptCase> {
        self.prompts.iter().filter(|c| c.is_fallback_probe()).collect()
    }

    /// EN↔AR case pairs sharing a base id, in dataset order of the English
    /// member. Cases without a counterpart are skipped.
    pub fn language_pairs(&self) -> Vec<(&PromptCase, &PromptCase)> {
        let mut pairs = Vec::new();
        for en in self.prompts.iter().filter(|c| c.lang == Language::En) {
            let counterpart = self
                .prompts
                .iter()
                .find(|c| c.lang == Language::Ar && c.base_id() == en.base_id());
            if let Some(ar) = counterpart {
                pairs.push((en, ar));
            }
        }
        pairs
    }
}
