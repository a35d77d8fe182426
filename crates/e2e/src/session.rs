//! Persistent Playwright chat session
//!
//! The suite needs one live page that survives across a send and dozens of
//! answer polls, so instead of a script per step, a single generated node
//! driver keeps the browser open and speaks a JSON-lines protocol on
//! stdin/stdout: one command object in, one response object out, in order.
//! The driver searches same-origin iframes when a selector misses the main
//! page, because the login form and the chat composer are sometimes framed.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use chatgauge_core::{AnswerRegion, CoreError, CoreResult};

use crate::config::SuiteConfig;
use crate::error::{E2eError, E2eResult};

/// Selectors for the chat UI under test.
pub mod selectors {
    /// Editable paragraph inside the chat composer.
    pub const COMPOSER: &str = "xpath=//div[@id='chat-input']//p";
    /// Submit button next to the composer.
    pub const SEND_BUTTON: &str = "xpath=//button[@type='submit']";
    /// Latest answer region; streaming text lands here.
    pub const LATEST_ANSWER: &str = "xpath=(//div[@id='response-content-container'])[last()]";
    /// Credentials entry point on the landing page (absent when SSO-only).
    pub const CREDENTIALS_LOGIN: &str =
        "xpath=//button[normalize-space(.)='Login using Credentials']";
    pub const EMAIL_INPUT: &str = "#email";
    pub const PASSWORD_INPUT: &str = "#password";
    pub const SIGN_IN: &str = "xpath=//button[@type='submit' and normalize-space()='Sign in']";
}

/// Spare time granted on top of a command's own timeout before the driver
/// itself is declared unresponsive.
const PROTOCOL_GRACE: Duration = Duration::from_secs(10);

/// Budget for browser launch and the ready handshake.
const LAUNCH_TIMEOUT: Duration = Duration::from_secs(60);

const DEFAULT_COMMAND_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Serialize)]
struct DriverCommand<'a> {
    id: u64,
    cmd: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    selector: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    value: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DriverResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
}

/// A live logged-in (or about-to-log-in) chat page.
pub struct ChatSession {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    base_url: String,
    email: String,
    password: String,
    // Holds the generated driver script for the life of the session.
    _script_dir: tempfile::TempDir,
}

impl ChatSession {
    /// Generate the driver script, spawn node, and wait for the browser to
    /// come up.
    pub async fn launch(config: &SuiteConfig) -> E2eResult<Self> {
        check_playwright_installed()?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        std::fs::write(&script_path, build_driver_script(config))?;

        debug!("spawning Playwright driver: {}", script_path.display());

        let mut child = Command::new("node")
            .arg(&script_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::DriverUnavailable(format!("failed to spawn node: {e}")))?;

        let stdin = child.stdin.take().ok_or_else(|| E2eError::Protocol("no driver stdin".into()))?;
        let stdout = child.stdout.take().ok_or_else(|| E2eError::Protocol("no driver stdout".into()))?;
        let stderr = child.stderr.take().ok_or_else(|| E2eError::Protocol("no driver stderr".into()))?;

        // Surface driver/browser noise at debug level rather than losing it.
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "chatgauge_e2e::driver", "{}", line);
            }
        });

        let mut session = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            base_url: config.base_url.clone(),
            email: config.email.clone(),
            password: config.password.clone(),
            _script_dir: script_dir,
        };

        session.await_ready().await?;
        info!("browser session up ({})", config.browser.as_str());
        Ok(session)
    }

    async fn await_ready(&mut self) -> E2eResult<()> {
        let line = tokio::time::timeout(LAUNCH_TIMEOUT, self.stdout.next_line())
            .await
            .map_err(|_| E2eError::DriverTimeout(LAUNCH_TIMEOUT))?
            .map_err(E2eError::Io)?
            .ok_or_else(|| E2eError::Protocol("driver exited before ready".into()))?;

        let response: DriverResponse = serde_json::from_str(&line)
            .map_err(|e| E2eError::Protocol(format!("bad ready line '{line}': {e}")))?;
        if response.ok && response.value == json!("ready") {
            Ok(())
        } else {
            Err(E2eError::DriverUnavailable(
                response.error.unwrap_or_else(|| "browser failed to launch".into()),
            ))
        }
    }

    async fn command(
        &mut self,
        cmd: &str,
        selector: Option<&str>,
        value: Option<&str>,
        timeout_ms: Option<u64>,
    ) -> E2eResult<Value> {
        let id = self.next_id;
        self.next_id += 1;

        let request = DriverCommand { id, cmd, selector, value, timeout_ms };
        let mut line = serde_json::to_vec(&request)?;
        line.push(b'\n');
        self.stdin.write_all(&line).await?;
        self.stdin.flush().await?;

        let budget =
            Duration::from_millis(timeout_ms.unwrap_or(DEFAULT_COMMAND_TIMEOUT_MS)) + PROTOCOL_GRACE;
        let reply = tokio::time::timeout(budget, self.stdout.next_line())
            .await
            .map_err(|_| E2eError::DriverTimeout(budget))?
            .map_err(E2eError::Io)?
            .ok_or_else(|| E2eError::Protocol("driver closed its stdout".into()))?;

        let response: DriverResponse = serde_json::from_str(&reply)
            .map_err(|e| E2eError::Protocol(format!("bad driver reply '{reply}': {e}")))?;
        if response.id != id {
            return Err(E2eError::Protocol(format!(
                "driver answered out of order: sent {id}, got {}",
                response.id
            )));
        }
        if response.ok {
            Ok(response.value)
        } else {
            Err(E2eError::Command {
                cmd: cmd.to_string(),
                reason: response.error.unwrap_or_else(|| "unspecified".into()),
            })
        }
    }

    pub async fn goto(&mut self, url: &str) -> E2eResult<()> {
        self.command("goto", None, Some(url), Some(30_000)).await?;
        Ok(())
    }

    pub async fn click(&mut self, selector: &str, timeout_ms: u64) -> E2eResult<()> {
        self.command("click", Some(selector), None, Some(timeout_ms)).await?;
        Ok(())
    }

    pub async fn fill(&mut self, selector: &str, text: &str) -> E2eResult<()> {
        self.command("fill", Some(selector), Some(text), Some(15_000)).await?;
        Ok(())
    }

    pub async fn type_text(&mut self, text: &str) -> E2eResult<()> {
        self.command("type_text", None, Some(text), Some(30_000)).await?;
        Ok(())
    }

    pub async fn wait_visible(&mut self, selector: &str, timeout_ms: u64) -> E2eResult<()> {
        self.command("wait_visible", Some(selector), None, Some(timeout_ms)).await?;
        Ok(())
    }

    pub async fn wait_enabled(&mut self, selector: &str, timeout_ms: u64) -> E2eResult<()> {
        self.command("wait_enabled", Some(selector), None, Some(timeout_ms)).await?;
        Ok(())
    }

    pub async fn exists(&mut self, selector: &str) -> E2eResult<bool> {
        let value = self.command("exists", Some(selector), None, None).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    pub async fn inner_text(&mut self, selector: &str) -> E2eResult<String> {
        let value = self.command("inner_text", Some(selector), None, Some(2_000)).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Evaluate a JavaScript expression in the page and return its value.
    pub async fn evaluate(&mut self, expression: &str) -> E2eResult<Value> {
        self.command("evaluate", None, Some(expression), Some(10_000)).await
    }

    /// Best-effort wait for network idle; streaming UIs keep sockets open,
    /// so the driver treats expiry as success.
    pub async fn settle(&mut self) -> E2eResult<()> {
        self.command("wait_load", None, None, Some(15_000)).await?;
        Ok(())
    }

    pub async fn screenshot(&mut self, path: &Path) -> E2eResult<()> {
        self.command("screenshot", None, Some(&path.to_string_lossy()), Some(15_000)).await?;
        Ok(())
    }

    /// Current page HTML.
    pub async fn page_content(&mut self) -> E2eResult<String> {
        let value = self.command("content", None, None, Some(15_000)).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Walk the credentials login flow and wait for the chat composer.
    pub async fn login(&mut self) -> E2eResult<()> {
        self.goto(&self.base_url.clone()).await?;
        self.settle().await?;

        if self.exists(selectors::CREDENTIALS_LOGIN).await? {
            self.click(selectors::CREDENTIALS_LOGIN, 8_000).await?;
        }

        self.wait_visible(selectors::EMAIL_INPUT, 15_000)
            .await
            .map_err(|_| E2eError::Login("login form not found: #email/#password".into()))?;
        let email = self.email.clone();
        let password = self.password.clone();
        self.fill(selectors::EMAIL_INPUT, &email).await?;
        self.fill(selectors::PASSWORD_INPUT, &password).await?;
        self.wait_enabled(selectors::SIGN_IN, 15_000).await?;
        self.click(selectors::SIGN_IN, 15_000).await?;
        self.settle().await?;

        self.wait_visible(selectors::COMPOSER, 20_000)
            .await
            .map_err(|_| E2eError::Login("chat composer never appeared after sign-in".into()))?;
        Ok(())
    }

    /// Type a prompt into the composer and submit it. Falls back to raw
    /// keyboard typing when the rich-text editor rejects a direct fill.
    pub async fn send_prompt(&mut self, text: &str) -> E2eResult<()> {
        self.wait_visible(selectors::COMPOSER, 15_000).await?;
        self.click(selectors::COMPOSER, 5_000).await?;
        if let Err(err) = self.fill(selectors::COMPOSER, text).await {
            debug!("composer fill failed ({err}), typing instead");
            self.type_text(text).await?;
        }
        self.wait_enabled(selectors::SEND_BUTTON, 5_000).await?;
        self.click(selectors::SEND_BUTTON, 5_000).await?;
        Ok(())
    }

    /// Text currently in the composer (empty after a successful send).
    pub async fn composer_text(&mut self) -> E2eResult<String> {
        self.inner_text(selectors::COMPOSER).await
    }

    /// Wait for the latest answer region to appear, then hand out a poll
    /// handle over it for the response waiter.
    pub async fn answer_region(&mut self, appear_timeout_ms: u64) -> E2eResult<AnswerHandle<'_>> {
        self.wait_visible(selectors::LATEST_ANSWER, appear_timeout_ms).await?;
        Ok(AnswerHandle { session: self })
    }

    /// Document direction as the page reports it ("ltr", "rtl", "auto", "").
    pub async fn document_direction(&mut self) -> E2eResult<String> {
        let value = self
            .evaluate("document.documentElement.dir || getComputedStyle(document.documentElement).direction")
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    /// Shut the driver down; errors are logged, not surfaced.
    pub async fn close(mut self) {
        if let Err(err) = self.command("close", None, None, Some(5_000)).await {
            warn!("driver close failed: {err}");
        }
        let _ = self.child.wait().await;
    }
}

/// Poll handle over the latest answer region. Read failures surface as
/// recoverable region errors, so the waiter retries through re-renders.
pub struct AnswerHandle<'a> {
    session: &'a mut ChatSession,
}

#[async_trait]
impl AnswerRegion for AnswerHandle<'_> {
    async fn read_text(&mut self) -> CoreResult<String> {
        self.session
            .inner_text(selectors::LATEST_ANSWER)
            .await
            .map_err(|e| CoreError::RegionRead(e.to_string()))
    }
}

/// Verify node + playwright are importable before spending a browser launch.
fn check_playwright_installed() -> E2eResult<()> {
    let status = std::process::Command::new("node")
        .args(["-e", "require('playwright')"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => Err(E2eError::DriverUnavailable(
            "playwright not importable; install with: npm i playwright && npx playwright install".into(),
        )),
        Err(e) => Err(E2eError::DriverUnavailable(format!("node not found: {e}"))),
    }
}

/// Generate the node driver for this configuration.
pub fn build_driver_script(config: &SuiteConfig) -> String {
    let (width, height) = config.viewport();
    let user_agent_option = match config.user_agent() {
        Some(ua) => format!(",\n    userAgent: '{ua}'"),
        None => String::new(),
    };

    format!(
        r#"const readline = require('readline');
const {{ chromium, firefox, webkit }} = require('playwright');

(async () => {{
  let browser;
  try {{
    browser = await {browser}.launch({{ headless: {headless} }});
  }} catch (e) {{
    console.log(JSON.stringify({{ id: 0, ok: false, error: e.message }}));
    process.exit(1);
  }}
  const context = await browser.newContext({{
    locale: '{locale}',
    viewport: {{ width: {width}, height: {height} }}{user_agent_option}
  }});
  const page = await context.newPage();

  // Selector lookup with same-origin iframe fallback.
  const locate = async (selector) => {{
    const main = page.locator(selector).first();
    if (await main.count() > 0) return main;
    for (const frame of page.frames()) {{
      try {{
        const framed = frame.locator(selector).first();
        if (await framed.count() > 0) return framed;
      }} catch (e) {{ /* cross-origin frame */ }}
    }}
    return main;
  }};

  const handlers = {{
    goto: async (c) => {{ await page.goto(c.value, {{ waitUntil: 'domcontentloaded', timeout: c.timeout_ms }}); }},
    click: async (c) => {{ const l = await locate(c.selector); await l.click({{ timeout: c.timeout_ms }}); }},
    fill: async (c) => {{ const l = await locate(c.selector); await l.fill(c.value, {{ timeout: c.timeout_ms }}); }},
    type_text: async (c) => {{ await page.keyboard.type(c.value); }},
    wait_visible: async (c) => {{ const l = await locate(c.selector); await l.waitFor({{ state: 'visible', timeout: c.timeout_ms }}); }},
    wait_enabled: async (c) => {{
      const l = await locate(c.selector);
      const deadline = Date.now() + (c.timeout_ms || 5000);
      while (Date.now() < deadline) {{
        if (await l.isEnabled()) return;
        await page.waitForTimeout(100);
      }}
      throw new Error('element never became enabled: ' + c.selector);
    }},
    exists: async (c) => {{
      if (await page.locator(c.selector).count() > 0) return true;
      for (const frame of page.frames()) {{
        try {{ if (await frame.locator(c.selector).count() > 0) return true; }} catch (e) {{}}
      }}
      return false;
    }},
    inner_text: async (c) => {{ const l = await locate(c.selector); return await l.innerText({{ timeout: c.timeout_ms }}); }},
    evaluate: async (c) => {{ return await page.evaluate(c.value); }},
    wait_load: async (c) => {{
      try {{ await page.waitForLoadState('networkidle', {{ timeout: c.timeout_ms }}); }} catch (e) {{}}
    }},
    screenshot: async (c) => {{ await page.screenshot({{ path: c.value, fullPage: true }}); }},
    content: async () => {{ return await page.content(); }},
  }};

  console.log(JSON.stringify({{ id: 0, ok: true, value: 'ready' }}));

  const rl = readline.createInterface({{ input: process.stdin }});
  for await (const line of rl) {{
    if (!line.trim()) continue;
    let cmd;
    try {{
      cmd = JSON.parse(line);
    }} catch (e) {{
      console.log(JSON.stringify({{ id: -1, ok: false, error: 'unparseable command: ' + e.message }}));
      continue;
    }}
    if (cmd.cmd === 'close') {{
      console.log(JSON.stringify({{ id: cmd.id, ok: true, value: null }}));
      break;
    }}
    const handler = handlers[cmd.cmd];
    if (!handler) {{
      console.log(JSON.stringify({{ id: cmd.id, ok: false, error: 'unknown command: ' + cmd.cmd }}));
      continue;
    }}
    try {{
      const value = await handler(cmd);
      console.log(JSON.stringify({{ id: cmd.id, ok: true, value: value === undefined ? null : value }}));
    }} catch (e) {{
      console.log(JSON.stringify({{ id: cmd.id, ok: false, error: e.message }}));
    }}
  }}

  await browser.close();
}})();
"#,
        browser = config.browser.as_str(),
        headless = config.headless,
        locale = config.locale(),
        width = width,
        height = height,
        user_agent_option = user_agent_option,
    )
}
