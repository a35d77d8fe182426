//! Live suite entry point
//!
//! This file is a test binary (`harness = false`) that runs the whole suite
//! against a real deployment. It needs network access, credentials, a node
//! installation with Playwright, and a running embedding service, so it is
//! gated behind `CHATGAUGE_LIVE=1` and skips cleanly everywhere else.
//!
//! Run with:
//! ```bash
//! CHATGAUGE_LIVE=1 CHATGAUGE_EMAIL=... CHATGAUGE_PASSWORD=... \
//!   cargo test --package chatgauge-e2e --test live -- --lang en
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use chatgauge_core::{Dataset, Language};
use chatgauge_e2e::{BrowserKind, ChatSession, SuiteConfig, SuiteRunner};

#[derive(Parser, Debug)]
#[command(name = "chatgauge-live")]
#[command(about = "Live answer-quality suite for the chatbot deployment")]
struct Args {
    /// Path to the prompt dataset
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Base URL of the deployment under test
    #[arg(long)]
    base_url: Option<String>,

    /// Language mode (en or ar)
    #[arg(long)]
    lang: Option<String>,

    /// Browser engine (chromium, firefox, webkit)
    #[arg(long)]
    browser: Option<String>,

    /// Run with a visible browser window
    #[arg(long)]
    headed: bool,

    /// Emulate a phone-sized viewport
    #[arg(long)]
    mobile: bool,

    /// Base URL of the embeddings API
    #[arg(long)]
    embed_url: Option<String>,

    /// Directory for reports and failure artifacts
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() {
    let live = std::env::var("CHATGAUGE_LIVE").map(|v| v == "1").unwrap_or(false);
    if !live {
        eprintln!("[SKIP] live suite requires CHATGAUGE_LIVE=1 (browser, credentials, embedding service)");
        std::process::exit(0);
    }

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let args = Args::parse();

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    match rt.block_on(run(args)) {
        Ok(all_passed) => std::process::exit(if all_passed { 0 } else { 1 }),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(2);
        }
    }
}

async fn run(args: Args) -> Result<bool> {
    let mut config = SuiteConfig::from_env();

    if let Some(data) = args.data {
        config.dataset_path = data;
    }
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(lang) = args.lang {
        config.lang = match lang.as_str() {
            "ar" => Language::Ar,
            _ => Language::En,
        };
    }
    if let Some(browser) = args.browser {
        config.browser = browser.parse::<BrowserKind>().map_err(|e| anyhow::anyhow!(e))?;
    }
    if args.headed {
        config.headless = false;
    }
    if args.mobile {
        config.mobile = true;
    }
    if let Some(embed_url) = args.embed_url {
        config.embedding.base_url = embed_url;
    }
    if let Some(output) = args.output {
        config.reports_dir = output;
    }

    let dataset = Dataset::from_file(&config.dataset_path)
        .with_context(|| format!("loading dataset {}", config.dataset_path.display()))?;

    let runner = SuiteRunner::new(config.clone())
        .await
        .context("bringing up the suite runner (embedding service reachable?)")?;

    let mut session = ChatSession::launch(&config).await.context("launching the browser driver")?;
    session.login().await.context("logging in")?;

    let suite = runner.run_all(&mut session, &dataset).await?;
    session.close().await;

    runner.write_results(&suite)?;
    println!(
        "Suite: {} passed, {} failed of {} ({} ms)",
        suite.passed, suite.failed, suite.total, suite.duration_ms
    );

    Ok(suite.failed == 0)
}
