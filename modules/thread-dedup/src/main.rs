use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use thread_dedup::sweep::DEFAULT_PREVIEW_LEN;
use thread_dedup::{Config, RetryPolicy, RunOptions, Sweeper, TopicRef};

const EXIT_RUNTIME: u8 = 1;
const EXIT_SETUP: u8 = 3;
const EXIT_ABORTED: u8 = 130;

/// How long in-flight deletions may keep running after Ctrl-C.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(1500);

const MAX_CONCURRENCY: usize = 10;
const MAX_RETRIES: u32 = 20;
const MIN_BACKOFF_MS: u64 = 50;
const MAX_BACKOFF_MS: u64 = 60_000;

#[derive(Parser, Debug)]
#[command(name = "thread-dedup")]
#[command(about = "Delete adjacent duplicate comments from a VK board topic")]
#[command(version)]
struct Cli {
    /// Community id that owns the topic (without the minus sign)
    group_id: u64,

    /// Topic id inside the community
    topic_id: u64,

    /// Scan the whole topic instead of the most recent comments
    #[arg(long)]
    full: bool,

    /// Number of most recent comments to scan
    #[arg(long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..))]
    tail: u64,

    /// Compare text and author only
    #[arg(long)]
    ignore_attachments: bool,

    /// Build the plan and print it without deleting anything
    #[arg(long)]
    dry_run: bool,

    /// Deletions in flight at once (clamped to 1..=10)
    #[arg(long, default_value_t = 3)]
    concurrency: usize,

    /// Retries per API call on rate limits and server errors (max 20)
    #[arg(long, default_value_t = 5)]
    retries: u32,

    /// Base backoff delay in milliseconds (clamped to 50..=60000)
    #[arg(long, default_value_t = 500)]
    backoff_ms: u64,

    /// Ids shown from each end of the plan in a dry run
    #[arg(long, default_value_t = DEFAULT_PREVIEW_LEN)]
    preview: usize,
}

impl Cli {
    fn topic(&self) -> TopicRef {
        TopicRef::new(self.group_id, self.topic_id)
    }

    fn run_options(&self) -> RunOptions {
        let retry = RetryPolicy::default()
            .with_max_retries(self.retries.min(MAX_RETRIES))
            .with_base_delay(Duration::from_millis(
                self.backoff_ms.clamp(MIN_BACKOFF_MS, MAX_BACKOFF_MS),
            ));

        RunOptions {
            full_scan: self.full,
            tail_size: self.tail.max(1),
            ignore_attachments: self.ignore_attachments,
            dry_run: self.dry_run,
            concurrency: self.concurrency.clamp(1, MAX_CONCURRENCY),
            retry,
            preview_len: self.preview,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let sweeper = match setup(&cli) {
        Ok(sweeper) => sweeper,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::from(EXIT_SETUP);
        }
    };

    let cancel = Arc::new(AtomicBool::new(false));
    let sweeper = sweeper.with_cancel(cancel.clone());
    let run = sweeper.run();
    tokio::pin!(run);

    let result = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            warn!(grace_ms = SHUTDOWN_GRACE.as_millis() as u64, "Shutdown requested, draining in-flight deletions");
            cancel.store(true, Ordering::SeqCst);
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut run).await {
                Ok(Ok(summary)) => info!("Sweep stopped early. {summary}"),
                Ok(Err(e)) => error!(error = %e, "Sweep failed during shutdown"),
                Err(_) => warn!("Grace period elapsed, abandoning in-flight work"),
            }
            return ExitCode::from(EXIT_ABORTED);
        }
    };

    match result {
        Ok(summary) => {
            info!("Sweep complete. {summary}");
            if !summary.failed_ids.is_empty() {
                warn!(ids = ?summary.failed_ids, "Some comments could not be deleted");
            }
            if summary.is_complete() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(EXIT_RUNTIME)
            }
        }
        Err(e) => {
            error!(error = %e, "Sweep aborted");
            ExitCode::from(EXIT_RUNTIME)
        }
    }
}

fn setup(cli: &Cli) -> Result<Sweeper> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("thread_dedup=info".parse()?))
        .init();

    info!("Thread dedup starting...");

    let config = Config::from_env().context("Failed to load credentials")?;
    config.log_redacted();

    let reader = config.read_client().context("Failed to build read client")?;
    let moderator = config
        .moderation_client()
        .context("Failed to build moderation client")?;

    let options = cli.run_options();
    info!(
        topic = %cli.topic(),
        concurrency = options.concurrency,
        max_retries = options.retry.max_retries,
        dry_run = options.dry_run,
        "Run options resolved"
    );

    Ok(Sweeper::new(
        Arc::new(reader),
        Arc::new(moderator),
        cli.topic(),
        options,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::try_parse_from(["thread-dedup", "123", "456"]).unwrap();
        let options = cli.run_options();
        assert_eq!(cli.topic(), TopicRef::new(123, 456));
        assert!(!options.full_scan);
        assert_eq!(options.tail_size, 500);
        assert_eq!(options.concurrency, 3);
        assert_eq!(options.retry.max_retries, 5);
        assert_eq!(options.retry.base_delay, Duration::from_millis(500));
        assert_eq!(options.preview_len, DEFAULT_PREVIEW_LEN);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let cli = Cli::try_parse_from([
            "thread-dedup",
            "1",
            "2",
            "--concurrency",
            "0",
            "--retries",
            "99",
            "--backoff-ms",
            "1",
        ])
        .unwrap();
        let options = cli.run_options();
        assert_eq!(options.concurrency, 1);
        assert_eq!(options.retry.max_retries, MAX_RETRIES);
        assert_eq!(options.retry.base_delay, Duration::from_millis(MIN_BACKOFF_MS));

        let cli = Cli::try_parse_from(["thread-dedup", "1", "2", "--concurrency", "64"]).unwrap();
        assert_eq!(cli.run_options().concurrency, MAX_CONCURRENCY);
    }

    #[test]
    fn zero_tail_is_a_usage_error() {
        assert!(Cli::try_parse_from(["thread-dedup", "1", "2", "--tail", "0"]).is_err());
    }

    #[test]
    fn flags_map_to_options() {
        let cli = Cli::try_parse_from([
            "thread-dedup",
            "1",
            "2",
            "--full",
            "--ignore-attachments",
            "--dry-run",
        ])
        .unwrap();
        let options = cli.run_options();
        assert!(options.full_scan);
        assert!(options.ignore_attachments);
        assert!(options.dry_run);
    }
}
