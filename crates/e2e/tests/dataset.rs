//! Validates the dataset shipped with the repository
//!
//! The live suite trusts `data/test-data.json` blindly at startup, so shape
//! problems should fail here, offline, not twenty minutes into a browser run.

use std::path::PathBuf;

use chatgauge_core::{Dataset, Language};

fn shipped_dataset() -> Dataset {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../data/test-data.json");
    Dataset::from_file(&path).expect("shipped dataset must parse")
}

#[test]
fn shipped_dataset_parses_and_is_nonempty() {
    let dataset = shipped_dataset();
    assert!(!dataset.prompts.is_empty());
}

#[test]
fn every_case_has_an_id_and_a_question() {
    let dataset = shipped_dataset();
    for case in &dataset.prompts {
        assert!(!case.id.trim().is_empty(), "case with empty id");
        assert!(!case.user.trim().is_empty(), "case {} has no question", case.id);
    }
}

#[test]
fn ids_are_unique() {
    let dataset = shipped_dataset();
    let mut ids: Vec<&str> = dataset.prompts.iter().map(|c| c.id.as_str()).collect();
    ids.sort_unstable();
    let before = ids.len();
    ids.dedup();
    assert_eq!(ids.len(), before, "duplicate case ids in dataset");
}

#[test]
fn thresholds_are_sane() {
    let dataset = shipped_dataset();
    for case in &dataset.prompts {
        let threshold = case.base_threshold();
        assert!(
            (0.0..=1.0).contains(&threshold),
            "case {} has threshold {} outside [0, 1]",
            case.id,
            threshold
        );
    }
}

#[test]
fn facts_are_lowercased_at_load() {
    let dataset = shipped_dataset();
    for case in &dataset.prompts {
        for fact in &case.must_contain {
            assert_eq!(fact, &fact.to_lowercase(), "fact not lowercased in {}", case.id);
        }
    }
}

#[test]
fn bilingual_cases_pair_up() {
    let dataset = shipped_dataset();
    let pairs = dataset.language_pairs();
    assert!(!pairs.is_empty(), "expected at least one en/ar pair");
    for (en, ar) in pairs {
        assert_eq!(en.lang, Language::En);
        assert_eq!(ar.lang, Language::Ar);
        assert_eq!(en.base_id(), ar.base_id());
    }
}

#[test]
fn golden_cases_exist_for_the_similarity_run() {
    let dataset = shipped_dataset();
    assert!(dataset.golden_cases().len() >= 2);
}

#[test]
fn fallback_probe_carries_keywords() {
    let dataset = shipped_dataset();
    let probes = dataset.fallback_probes();
    assert!(!probes.is_empty(), "expected a fallback probe case");
    for probe in probes {
        assert!(
            probe.golden.is_some() || !probe.must_contain.is_empty(),
            "fallback probe {} has nothing to assert on",
            probe.id
        );
    }
}
