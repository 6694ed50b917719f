//! # MajesticBot
//!
//! Collects posts about a fixed set of topics (UFOs, aliens, the paranormal)
//! from Reddit, Twitter and configured news sites, appends them to a Google
//! Sheet, and emails a completion notice.
//!
//! ## Usage
//!
//! ```sh
//! majesticbot --sources sources.json --token-file token.json
//! ```
//!
//! ## Run order
//!
//! 1. **Config**: `sources.json` is read once; a bad file means no sources
//! 2. **Reddit**: newest posts of each configured subreddit
//! 3. **Twitter**: keyword search, ten posts in total
//! 4. **News**: headlines from each configured site
//! 5. **Notify**: one email, sent whatever happened above
//!
//! Every step logs its own failures and the run always continues, so the log
//! file is the place to check whether anything went wrong. The process exits
//! with status 0 regardless.

use clap::Parser;
use std::path::Path;
use tracing::{debug, info, instrument, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod collectors;
mod config;
mod models;
mod notify;
mod pipeline;
mod sink;
mod utils;

use cli::Cli;
use collectors::news::NewsSource;
use collectors::reddit::RedditSource;
use collectors::twitter::{KEYWORDS, TwitterSource};
use notify::SmtpMailer;
use pipeline::Clients;
use sink::sheets::GoogleSheets;
use utils::split_log_path;

/// Log to an append-only file and to stderr.
///
/// Falls back to stderr alone if the log file can't be opened. The returned
/// guard must live until the end of `main` so buffered lines are flushed.
fn init_tracing(log_file: &Path) -> Option<WorkerGuard> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339());

    let (dir, file_name) = split_log_path(log_file);
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(file_name)
        .build(&dir);

    match appender {
        Ok(appender) => {
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter())
                .with(stderr_layer)
                .with(
                    fmt::layer()
                        .with_writer(writer)
                        .with_ansi(false)
                        .with_target(false)
                        .with_timer(UtcTime::rfc_3339()),
                )
                .init();
            Some(guard)
        }
        Err(e) => {
            tracing_subscriber::registry().with(filter()).with(stderr_layer).init();
            warn!(path = %log_file.display(), error = %e, "Could not open log file; logging to stderr only");
            None
        }
    }
}

/// One full run. Client construction failures are logged and the affected
/// collector degrades, so this always reaches the email step.
#[instrument(skip_all)]
async fn run(args: Cli) {
    let start_time = std::time::Instant::now();
    info!("Starting MajesticBot12 run");
    debug!(sources = %args.sources.display(), token_file = %args.token_file.display(), "Parsed CLI arguments");
    debug!(
        client_secret_file = %args.google_client_secret_file.display(),
        "Client secret file is not used for connecting"
    );

    let sources = config::load_sources(&args.sources);

    let clients = Clients {
        reddit: RedditSource::build(&args.reddit_credentials()),
        twitter: TwitterSource::build(&args.twitter_search_base),
        news: NewsSource::build(),
        sheets: GoogleSheets::new(args.google_sheet_id.clone(), args.token_file.clone()),
        mailer: SmtpMailer::new(args.smtp_host.clone(), args.smtp_port, args.email_app_password.clone()),
    };

    let summary = clients.run(&sources, &KEYWORDS, &args.report_message()).await;

    let rows: usize = summary.reports.iter().map(|r| r.rows).sum();
    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        rows,
        email_sent = summary.email_sent,
        "MajesticBot12 run completed"
    );
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = Cli::parse();
    let _guard = init_tracing(&args.log_file);

    println!("🚀 Running MajesticBot12...");
    run(args).await;
    println!("✅ MajesticBot12 script completed.");
}
