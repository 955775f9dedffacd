use clap::Parser;
use eyre::{Result, eyre};
use slack_history_export::config::{self, ExportConfig};
use slack_history_export::{SlackClient, export};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Download the complete history of every Slack channel, private channel and
/// direct message you belong to, one JSON file per conversation.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory to write the export into.
    /// Defaults to the current directory if not set in config.
    #[arg(value_name = "TARGET_DIR")]
    target_dir: Option<PathBuf>,

    /// An API token for a Slack user.
    #[arg(long, env = "SLACK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Don't fetch or write history, only list conversation names.
    #[arg(long = "dryRun", visible_alias = "dry-run")]
    dry_run: bool,

    /// Skip fetching history for public channels.
    #[arg(long = "skipChannels", visible_alias = "skip-channels")]
    skip_channels: bool,

    /// Skip fetching history for private channels.
    #[arg(long = "skipPrivateChannels", visible_alias = "skip-private-channels")]
    skip_private_channels: bool,

    /// Skip fetching history for direct messages.
    #[arg(long = "skipDirectMessages", visible_alias = "skip-direct-messages")]
    skip_direct_messages: bool,

    /// Messages requested per history call (default 100).
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..=config::MAX_PAGE_SIZE as i64))]
    page_size: Option<u32>,

    /// Base URL of the Slack Web API.
    #[arg(long, value_name = "URL")]
    api_url: Option<Url>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/slack-history-export/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log every history page request.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if quiet {
        "warn"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    // 1. Load config file (CLI path > default path)
    let file_cfg = config::load_file_config(cli.config.as_deref())?;

    // 2. Resolve token (CLI/env > Config)
    let token = cli.token.or(file_cfg.token).ok_or_else(|| {
        eyre!("No API token supplied.\nUse --token, set SLACK_TOKEN, or set token in config.toml.")
    })?;

    // 3. Build the Export Config (CLI > Config > Default)
    let defaults = ExportConfig::default();
    let config = ExportConfig {
        target_dir: cli
            .target_dir
            .or(file_cfg.target_dir)
            .unwrap_or(defaults.target_dir),
        api_url: cli.api_url.or(file_cfg.api_url).unwrap_or(defaults.api_url),
        page_size: config::check_page_size(
            cli.page_size
                .or(file_cfg.page_size)
                .unwrap_or(defaults.page_size),
        )?,
        dry_run: cli.dry_run,
        skip_channels: cli.skip_channels,
        skip_private_channels: cli.skip_private_channels,
        skip_direct_messages: cli.skip_direct_messages,
    };

    // 4. Run the Business Logic
    let client = SlackClient::new(&config.api_url, token)?;
    let summary = export::run(&client, &config)?;

    if !config.dry_run {
        info!(
            "Done. {} channels, {} private channels, {} direct messages, {} messages exported.",
            summary.channels, summary.private_channels, summary.direct_messages, summary.messages
        );
    }
    Ok(())
}
