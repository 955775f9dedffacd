//! # slack-history-export
//!
//! A CLI tool that exports every Slack conversation you take part in to local JSON files.
//!
//! ## What it does
//!
//! The official Slack exporter only covers public channels. This tool works from the
//! point of view of a single user: using that user's API token it finds every public
//! channel, private channel and 1:1 direct message they belong to, pages through the
//! complete history of each one, and writes one JSON file per conversation:
//!
//! ```text
//! metadata.json                      {auth_info, users}
//! channels/<name>.json               {channel_info, messages}
//! private_channels/<name>.json       {channel_info, messages}
//! direct_messages/<user name>.json   {channel_info, messages}
//! ```
//!
//! Messages are written exactly as the API returned them, newest first.
//! Every run re-fetches everything; there is no incremental mode.
//!
//! ## Usage
//!
//! ```sh
//! # Export everything into the current directory
//! slack-history-export --token xoxp-123
//!
//! # Only list what would be exported
//! slack-history-export --token xoxp-123 --dryRun
//!
//! # Only public channels, into ~/slack-backup
//! slack-history-export ~/slack-backup --token xoxp-123 --skipDirectMessages --skipPrivateChannels
//! ```
//!
//! The token may also come from `SLACK_TOKEN` or from
//! `~/.config/slack-history-export/config.toml`.
pub mod config;
pub mod export;
pub mod history;
pub mod models;
pub mod slack;
pub mod users;

pub use config::ExportConfig;
pub use export::{ExportSummary, run};
pub use history::{HistoryQuery, HistorySource, fetch_history};
pub use slack::{SlackApi, SlackClient};
