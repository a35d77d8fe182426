//! ChatGauge answer-quality engine
//!
//! The response-capture and similarity-judgment core of the suite: it
//! decides when a streaming chat answer has finished and whether it is
//! correct enough, independent of any particular browser driver.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    chatgauge-core                            │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ResponseWaiter                                              │
//! │    └── poll AnswerRegion until 2 identical readings          │
//! │        (loading markers / short readings never count)        │
//! │  strip_sources()  — drop trailing citation sections          │
//! │  SimilarityScorer — en / multilingual embedding profiles,    │
//! │        process-wide registry, cosine over batched embeds     │
//! │  judge::assess()  — score + fact coverage + length-ratio     │
//! │        relaxation → Judgment with diagnostics                │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Dataset (JSON)                                              │
//! │    └── prompts: [ id, lang, user, golden?, must_contain?,    │
//! │                   threshold?, xl_threshold? ]                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The browser session that feeds text into the waiter lives in
//! `chatgauge-e2e`; this crate only sees the [`waiter::AnswerRegion`] seam.

pub mod dataset;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod judge;
pub mod normalize;
pub mod report;
pub mod waiter;

pub use dataset::{Dataset, Language, PromptCase};
pub use embedding::{EmbeddingConfig, SimilarityScorer};
pub use error::{CoreError, CoreResult};
pub use extract::strip_sources;
pub use judge::{assess, Judgment};
pub use report::Attachment;
pub use waiter::{AnswerRegion, Clock, ResponseWaiter, SystemClock, WaiterConfig};
