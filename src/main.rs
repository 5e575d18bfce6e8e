use anyhow::Context;
use pinbot::config::Config;
use pinbot::flow::{FlowClient, TransactionFetcher};
use pinbot::metadata::{DisabledMetadata, EditionLookup, ScriptMetadata};
use pinbot::monitor::{AuditLog, BlockPoller, PollerConfig, Pipeline, Publishing, SaleHandler};
use pinbot::notify::{DryRunNotifier, Notifier, PostStyle, TwitterNotifier};
use pinbot::price::{CoinbaseOracle, PriceConverter, RateOracle, ScriptOracle};
use pinbot::sale::{GateConfig, SaleEventGate, TransferCorrelator, TransferMatch};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Prod,
    Test,
}

#[derive(Debug)]
struct Cli {
    mode: Mode,
    block_height: Option<u64>,
    dry_run: bool,
    config_path: PathBuf,
}

impl Cli {
    fn parse(args: impl Iterator<Item = String>) -> anyhow::Result<Self> {
        let mut cli = Cli {
            mode: Mode::Prod,
            block_height: None,
            dry_run: false,
            config_path: PathBuf::from("pinbot.toml"),
        };
        for arg in args {
            if let Some(mode) = arg.strip_prefix("--mode=") {
                cli.mode = match mode {
                    "prod" => Mode::Prod,
                    "test" => Mode::Test,
                    other => anyhow::bail!("unknown mode {other:?} (expected prod or test)"),
                };
            } else if let Some(height) = arg.strip_prefix("--blockheight=") {
                cli.block_height = Some(
                    height
                        .parse()
                        .with_context(|| format!("invalid block height {height:?}"))?,
                );
            } else if let Some(path) = arg.strip_prefix("--config=") {
                cli.config_path = PathBuf::from(path);
            } else if arg == "--dry-run" {
                cli.dry_run = true;
            } else {
                anyhow::bail!("unrecognised argument {arg:?}");
            }
        }
        if cli.mode == Mode::Test && cli.block_height.is_none() {
            anyhow::bail!("--mode=test requires --blockheight=N");
        }
        Ok(cli)
    }
}

fn build_handler(config: &Config, client: &FlowClient, dry_run: bool) -> anyhow::Result<SaleHandler> {
    let policy = config.retry_policy();

    let oracle: Arc<dyn RateOracle> = match config.price.script.as_deref() {
        Some(script) if config.price.source == "script" => Arc::new(
            ScriptOracle::load(
                client.clone(),
                Path::new(script),
                &config.price.feed_address,
                config.price.products.keys().cloned().collect(),
            )
            .context("loading price script")?,
        ),
        _ => Arc::new(CoinbaseOracle::new(
            &config.price.oracle_url,
            config.price.products.clone(),
        )),
    };
    let pipeline = Pipeline {
        gate: SaleEventGate::new(GateConfig {
            tracked_type: config.tracking.nft_type.clone(),
            threshold_usd: config.threshold()?,
            dry_run,
        }),
        converter: PriceConverter::new(
            oracle,
            config.price.usd_vaults.clone(),
            Duration::from_secs(config.price.ttl_secs),
        ),
        fetcher: TransactionFetcher::new(Arc::new(client.clone()), policy),
        correlator: TransferCorrelator::new(TransferMatch::non_fungible_token(
            &config.flow.nft_standard_address,
        )),
    };

    let metadata: Arc<dyn EditionLookup> =
        match (&config.metadata.pin_script, &config.metadata.edition_script) {
            (Some(pin), Some(edition)) => Arc::new(
                ScriptMetadata::load(client.clone(), Path::new(pin), Path::new(edition), policy)
                    .context("loading metadata scripts")?,
            ),
            _ => {
                warn!("metadata scripts not configured - posts will use fallback text");
                Arc::new(DisabledMetadata)
            }
        };

    let notifier: Arc<dyn Notifier> = if config.notify.enabled && !dry_run {
        Arc::new(TwitterNotifier::new(
            &config.notify.api_url,
            &config.notify.bearer_token,
        ))
    } else {
        info!("posting disabled - dry-run notifier in use");
        Arc::new(DryRunNotifier)
    };

    let audit = match config.audit.dir.as_deref().filter(|d| !d.is_empty()) {
        Some(dir) => AuditLog::in_dir(dir),
        None => AuditLog::disabled(),
    };

    let publishing = Publishing {
        metadata,
        notifier,
        style: PostStyle {
            handle: config.notify.handle.clone(),
            site_url: config.notify.site_url.clone(),
        },
        image_base_url: config.metadata.image_base_url.clone(),
        audit,
    };

    Ok(SaleHandler::new(
        pipeline,
        publishing,
        Duration::from_secs(config.poll.status_interval_secs),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse(std::env::args().skip(1))?;

    // Load config
    let config = if cli.config_path.exists() {
        Config::load(&cli.config_path)
            .with_context(|| format!("loading {}", cli.config_path.display()))?
    } else {
        Config::from_env()
    };

    // Initialize logging
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    info!("pinbot v{} starting", env!("CARGO_PKG_VERSION"));
    if !cli.config_path.exists() {
        info!(path = %cli.config_path.display(), "config file not found, using env-only config");
    }

    let dry_run = cli.dry_run || cli.mode == Mode::Test || config.tracking.dry_run;
    if !dry_run {
        config.validate()?;
    } else {
        // Credentials are irrelevant when nothing is published.
        let mut relaxed = config.clone();
        relaxed.notify.enabled = false;
        relaxed.validate()?;
    }

    let client = FlowClient::new(&config.flow.rest_url);
    let mut handler = build_handler(&config, &client, dry_run)?;
    let poller = BlockPoller::new(
        Arc::new(client.clone()),
        PollerConfig {
            listing_types: config.flow.listing_event_types.clone(),
            poll_interval: Duration::from_millis(config.poll.interval_ms),
            max_block_span: config.poll.max_block_span,
        },
        config.retry_policy(),
    );

    info!(
        rest_url = %config.flow.rest_url,
        nft_type = %config.tracking.nft_type,
        threshold_usd = %config.tracking.threshold_usd,
        dry_run = dry_run,
        "monitor configured"
    );

    match (cli.mode, cli.block_height) {
        (Mode::Test, Some(height)) => {
            let count = poller
                .process_block(&mut handler, height)
                .await
                .with_context(|| format!("fetching block {height}"))?;
            info!(
                height = height,
                events = count,
                posted = handler.stats.posted,
                "test block processed"
            );
        }
        _ => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("interrupt received - finishing current event");
                    let _ = shutdown_tx.send(true);
                }
            });

            info!("entering poll loop - press Ctrl+C to stop");
            poller
                .run(&mut handler, shutdown_rx)
                .await
                .context("initial sealed height")?;
        }
    }

    info!("pinbot stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<Cli> {
        Cli::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.mode, Mode::Prod);
        assert!(!cli.dry_run);
        assert_eq!(cli.config_path, PathBuf::from("pinbot.toml"));
    }

    #[test]
    fn test_test_mode_needs_height() {
        assert!(parse(&["--mode=test"]).is_err());

        let cli = parse(&["--mode=test", "--blockheight=85113264", "--config=alt.toml"]).unwrap();
        assert_eq!(cli.mode, Mode::Test);
        assert_eq!(cli.block_height, Some(85_113_264));
        assert_eq!(cli.config_path, PathBuf::from("alt.toml"));
    }

    #[test]
    fn test_rejects_unknown_arguments() {
        assert!(parse(&["--live"]).is_err());
        assert!(parse(&["--blockheight=abc"]).is_err());
        assert!(parse(&["--mode=staging"]).is_err());
    }
}
