use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use bill_parser::channels::GmailClient;
use bill_parser::config::ParserConfig;
use bill_parser::pipeline::decode::DecodePolicy;
use bill_parser::pipeline::processor::BillProcessor;
use bill_parser::pipeline::runner::run_once;
use bill_parser::store::{InfluxConfig, InfluxWriter};

/// Log to stderr, and to a daily file when `BILL_PARSER_LOG_DIR` is set.
///
/// The returned guard flushes the file writer on drop.
fn init_tracing() -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);

    match std::env::var("BILL_PARSER_LOG_DIR") {
        Ok(dir) if !dir.is_empty() => {
            let appender = tracing_appender::rolling::daily(dir, "bill-parser.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(writer),
                )
                .init();
            Some(guard)
        }
        _ => {
            tracing_subscriber::registry().with(filter).with(stderr).init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _log_guard = init_tracing();

    // ── Configuration ────────────────────────────────────────────────────
    let config = ParserConfig::from_env().context("failed to load parser config")?;
    let categories = Arc::new(config.category_map());
    info!(
        senders = categories.len(),
        decode_html = config.decode_html,
        "Loaded parser config"
    );

    let processor = BillProcessor::new(
        categories,
        DecodePolicy::from_allow_html(config.decode_html),
    );

    // ── Collaborators ────────────────────────────────────────────────────
    let sink = InfluxWriter::new(InfluxConfig::from_parser_config(&config));

    let source = GmailClient::from_env().await.context(
        "failed to set up Gmail; set EMAIL_CREDS_FILE to create a missing token file",
    )?;

    // ── Run ──────────────────────────────────────────────────────────────
    let summary = run_once(&source, &sink, &processor)
        .await
        .context("bill run failed")?;

    info!(
        fetched = summary.fetched,
        recorded = summary.recorded,
        skipped = summary.skipped,
        acknowledged = summary.acknowledged,
        "Run complete"
    );

    if summary.write_errors > 0 {
        anyhow::bail!(
            "{} record(s) failed to write; messages left unread",
            summary.write_errors
        );
    }

    Ok(())
}
