//! ChatGauge live suite
//!
//! Drives the chatbot deployment through a real Playwright-controlled
//! browser and feeds captured answers into the `chatgauge-core` judgment
//! engine.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     chatgauge-e2e                           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  SuiteRunner                                                │
//! │    ├── ChatSession (node + playwright, JSON-lines protocol) │
//! │    │     ├── login() / send_prompt()                        │
//! │    │     └── answer_region() -> AnswerRegion handle         │
//! │    ├── chatgauge-core: waiter → extractor → judge           │
//! │    ├── checks: markup hygiene, link allowlist, fallbacks    │
//! │    ├── ArtifactSink: screenshots + DOM on failure           │
//! │    └── write_results() -> reports/suite-results.json        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The live run is gated behind `CHATGAUGE_LIVE=1` (see `tests/live.rs`);
//! everything else in this crate is testable offline.

pub mod capture;
pub mod checks;
pub mod config;
pub mod error;
pub mod runner;
pub mod session;

pub use config::{BrowserKind, SuiteConfig};
pub use error::{E2eError, E2eResult};
pub use runner::{CaseResult, SuiteResult, SuiteRunner};
pub use session::ChatSession;
