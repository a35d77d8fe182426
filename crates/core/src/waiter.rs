//! Streaming-answer stabilization
//!
//! Chat answers stream into the page incrementally, so "text is present" is
//! not "the answer is finished". The waiter polls the live answer region and
//! declares the answer final only after two consecutive identical readings,
//! which cheaply approximates end-of-stream without any signal from the
//! application itself.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::error::{CoreError, CoreResult};

/// Handle to a live, possibly-updating text region in the page.
///
/// A failed read (momentarily detached element, re-rendered node) is
/// recoverable: the waiter swallows it and reads again on the next tick.
#[async_trait]
pub trait AnswerRegion: Send {
    async fn read_text(&mut self) -> CoreResult<String>;
}

/// Time source for the poll loop. Injectable so tests can run the full
/// 120-second budget without real delays.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Transient captions and icons the application renders while an answer is
/// still being produced. A reading containing any of these is never final.
pub const DEFAULT_LOADING_MARKERS: [&str; 8] = [
    "Just a sec",
    "Scanning the Gov Knowledge Base",
    "Retrieving the right documents",
    "Analyzing documents",
    "⏳",
    "📂",
    "📄",
    "🧠",
];

#[derive(Debug, Clone)]
pub struct WaiterConfig {
    /// Delay between polls of the answer region.
    pub poll_interval: Duration,

    /// Readings shorter than this (in characters) are treated as an
    /// in-progress stream, not a finished answer.
    pub min_answer_chars: usize,

    /// Consecutive identical readings required to declare the text final.
    pub required_stable_polls: u32,

    /// Overall wait budget; exceeding it is a hard Timeout failure.
    pub timeout: Duration,

    /// Substrings that mark a reading as still loading.
    pub loading_markers: Vec<String>,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            min_answer_chars: 20,
            required_stable_polls: 2,
            timeout: Duration::from_secs(120),
            loading_markers: DEFAULT_LOADING_MARKERS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Polls an [`AnswerRegion`] until its text stabilizes or the budget runs out.
pub struct ResponseWaiter<C: Clock = SystemClock> {
    config: WaiterConfig,
    clock: C,
}

impl ResponseWaiter<SystemClock> {
    pub fn new(config: WaiterConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> ResponseWaiter<C> {
    pub fn with_clock(config: WaiterConfig, clock: C) -> Self {
        Self { config, clock }
    }

    pub fn config(&self) -> &WaiterConfig {
        &self.config
    }

    /// Produce the final settled text of the region, or fail with
    /// [`CoreError::Timeout`] carrying the last accepted reading.
    pub async fn wait_for_final<R>(&self, region: &mut R) -> CoreResult<String>
    where
        R: AnswerRegion + ?Sized,
    {
        let start = self.clock.now();
        let mut last_text = String::new();
        let mut stable = 0u32;

        while self.clock.now().duration_since(start) < self.config.timeout {
            let reading = match region.read_text().await {
                Ok(text) => text.trim().to_string(),
                Err(err) if err.is_transient() => {
                    debug!("transient region read error, retrying: {}", err);
                    self.clock.sleep(self.config.poll_interval).await;
                    continue;
                }
                Err(err) => return Err(err),
            };

            if self.is_loading(&reading) || reading.chars().count() < self.config.min_answer_chars {
                trace!("reading still in progress ({} chars)", reading.chars().count());
                self.clock.sleep(self.config.poll_interval).await;
                continue;
            }

            if reading == last_text {
                stable += 1;
            } else {
                stable = 0;
                last_text = reading;
            }

            if stable >= self.config.required_stable_polls {
                debug!("answer settled after {:?}", self.clock.now().duration_since(start));
                return Ok(last_text);
            }

            self.clock.sleep(self.config.poll_interval).await;
        }

        Err(CoreError::Timeout { last_seen: last_text })
    }

    fn is_loading(&self, text: &str) -> bool {
        self.config.loading_markers.iter().any(|m| text.contains(m.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Clock that only advances when slept on.
    struct FakeClock {
        now: Mutex<Instant>,
    }

    impl FakeClock {
        fn new() -> Self {
            Self { now: Mutex::new(Instant::now()) }
        }
    }

    #[async_trait]
    impl Clock for FakeClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += duration;
        }
    }

    /// Region that replays a scripted sequence of readings; the final entry
    /// repeats forever.
    struct ScriptedRegion {
        readings: Vec<CoreResult<String>>,
        cursor: usize,
    }

    impl ScriptedRegion {
        fn new<I: IntoIterator<Item = CoreResult<String>>>(readings: I) -> Self {
            Self { readings: readings.into_iter().collect(), cursor: 0 }
        }
    }

    #[async_trait]
    impl AnswerRegion for ScriptedRegion {
        async fn read_text(&mut self) -> CoreResult<String> {
            let idx = self.cursor.min(self.readings.len() - 1);
            self.cursor += 1;
            match &self.readings[idx] {
                Ok(text) => Ok(text.clone()),
                Err(_) => Err(CoreError::RegionRead("detached".into())),
            }
        }
    }

    fn ok(text: &str) -> CoreResult<String> {
        Ok(text.to_string())
    }

    fn waiter() -> ResponseWaiter<FakeClock> {
        ResponseWaiter::with_clock(WaiterConfig::default(), FakeClock::new())
    }

    const FINAL: &str = "The Golden Visa is a long-term residence visa.";

    #[tokio::test]
    async fn returns_final_text_after_loading_markers() {
        let mut region = ScriptedRegion::new([
            ok("⏳ Just a sec"),
            ok("Scanning the Gov Knowledge Base 📂"),
            ok(FINAL),
            ok(FINAL),
            ok(FINAL),
        ]);
        let settled = waiter().wait_for_final(&mut region).await.unwrap();
        assert_eq!(settled, FINAL);
    }

    #[tokio::test]
    async fn never_returns_an_intermediate_reading() {
        let partial = "The Golden Visa is a long-term residence";
        let mut region = ScriptedRegion::new([
            ok("Analyzing documents 🧠"),
            ok(partial),
            ok(FINAL),
            ok(FINAL),
            ok(FINAL),
        ]);
        let settled = waiter().wait_for_final(&mut region).await.unwrap();
        assert_eq!(settled, FINAL);
    }

    #[tokio::test]
    async fn short_readings_are_treated_as_in_progress() {
        // Under 20 characters: skipped, never counted as stable.
        let mut region = ScriptedRegion::new([ok("Yes."), ok("Yes."), ok(FINAL), ok(FINAL), ok(FINAL)]);
        let settled = waiter().wait_for_final(&mut region).await.unwrap();
        assert_eq!(settled, FINAL);
    }

    #[tokio::test]
    async fn stability_counter_resets_on_change() {
        let longer = "The Golden Visa is a long-term residence visa for investors.";
        let mut region = ScriptedRegion::new([
            ok(FINAL),
            ok(FINAL),
            // stream resumed: counter must reset and settle on the new text
            ok(longer),
            ok(longer),
            ok(longer),
        ]);
        let settled = waiter().wait_for_final(&mut region).await.unwrap();
        assert_eq!(settled, longer);
    }

    #[tokio::test]
    async fn transient_read_errors_are_swallowed() {
        let mut region = ScriptedRegion::new([
            Err(CoreError::RegionRead("detached".into())),
            Err(CoreError::RegionRead("detached".into())),
            ok(FINAL),
            ok(FINAL),
            ok(FINAL),
        ]);
        let settled = waiter().wait_for_final(&mut region).await.unwrap();
        assert_eq!(settled, FINAL);
    }

    #[tokio::test]
    async fn times_out_at_or_after_budget_when_text_never_stabilizes() {
        /// Region whose text alternates every poll, so the stability counter
        /// never reaches two.
        struct Alternating(u64);

        #[async_trait]
        impl AnswerRegion for Alternating {
            async fn read_text(&mut self) -> CoreResult<String> {
                self.0 += 1;
                Ok(format!("Answer draft number {} still being revised.", self.0))
            }
        }

        let clock = FakeClock::new();
        let started = clock.now();
        let config = WaiterConfig::default();
        let budget = config.timeout;
        let waiter = ResponseWaiter::with_clock(config, clock);

        let mut region = Alternating(0);
        let err = waiter.wait_for_final(&mut region).await.unwrap_err();

        match err {
            CoreError::Timeout { last_seen } => {
                assert!(last_seen.contains("still being revised"));
            }
            other => panic!("expected Timeout, got {other:?}"),
        }
        // Never fails before the budget has fully elapsed.
        assert!(waiter.clock.now().duration_since(started) >= budget);
    }

    #[tokio::test]
    async fn timeout_with_only_loading_markers_reports_empty_last_seen() {
        struct AlwaysLoading;

        #[async_trait]
        impl AnswerRegion for AlwaysLoading {
            async fn read_text(&mut self) -> CoreResult<String> {
                Ok("Retrieving the right documents 📄".to_string())
            }
        }

        let err = waiter().wait_for_final(&mut AlwaysLoading).await.unwrap_err();
        match err {
            CoreError::Timeout { last_seen } => assert!(last_seen.is_empty()),
            other => panic!("expected Timeout, got {other:?}"),
        }
    }
}
