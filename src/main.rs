use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::Parser;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use content_parser::config::{ExtractorConfig, LlmConfig};
use content_parser::document::PageResult;
use content_parser::fetch::{HttpFetcher, ProxyConfig, DEFAULT_USER_AGENT};
use content_parser::oracle::ChatCompletionOracle;
use content_parser::output::write_artifacts;
use content_parser::service::MainContentExtractor;

#[derive(Parser)]
#[command(name = "content_parser", about = "Extract the main content of web pages")]
struct Cli {
    /// URLs to process
    urls: Vec<String>,

    /// File with one URL per line (blank lines and `#` comments are ignored)
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Directory for the markdown and link artifacts
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Pages processed at the same time
    #[arg(short = 'j', long, env = "MC_CONCURRENCY", default_value = "10")]
    concurrency: usize,

    /// Per-page fetch timeout in seconds
    #[arg(long, env = "MC_FETCH_TIMEOUT_SECS", default_value = "30")]
    fetch_timeout: u64,

    #[arg(long, env = "MC_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    user_agent: String,
}

type Extractor = MainContentExtractor<ChatCompletionOracle>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let urls = collect_urls(&cli)?;
    if urls.is_empty() {
        bail!("no URLs given; pass them as arguments or with --input");
    }

    let config = ExtractorConfig::from_env().context("invalid extractor configuration")?;
    let llm = LlmConfig::from_env().context("invalid LLM configuration")?;
    info!(model = %llm.model, max_tokens = config.max_tokens, "starting extraction");

    let extractor = Arc::new(MainContentExtractor::new(config, ChatCompletionOracle::new(llm)));
    let proxy = ProxyConfig::from_env();
    let fetcher = HttpFetcher::new(
        &cli.user_agent,
        Duration::from_secs(cli.fetch_timeout),
        proxy.as_ref(),
    )?;

    let total = urls.len();
    let results: Vec<PageResult> = stream::iter(urls)
        .map(|url| process_url(fetcher.clone(), Arc::clone(&extractor), url))
        .buffer_unordered(cli.concurrency.max(1))
        .collect()
        .await;

    let mut ok = 0usize;
    for result in &results {
        match write_artifacts(&cli.output, result) {
            Ok(Some(_)) => ok += 1,
            Ok(None) => {}
            Err(e) => warn!(url = %result.url(), error = %e, "failed to write artifacts"),
        }
    }

    info!(
        total,
        ok,
        failed = total - ok,
        elapsed_secs = t0.elapsed().as_secs_f64(),
        output = %cli.output.display(),
        "done"
    );
    Ok(())
}

async fn process_url(fetcher: HttpFetcher, extractor: Arc<Extractor>, url: String) -> PageResult {
    let page = match fetcher.fetch(&url).await {
        Ok(page) => page,
        Err(e) => return PageResult::failure(url, e),
    };

    // parsing and the oracle call are blocking
    match tokio::task::spawn_blocking(move || extractor.process(&page)).await {
        Ok(result) => result,
        Err(e) => PageResult::failure(url, format!("worker failed: {}", e)),
    }
}

fn collect_urls(cli: &Cli) -> anyhow::Result<Vec<String>> {
    let mut urls = cli.urls.clone();

    if let Some(path) = &cli.input {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        urls.extend(
            contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(String::from),
        );
    }

    Ok(urls)
}
