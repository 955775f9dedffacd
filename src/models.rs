//! Wire and on-disk types for the Slack Web API export.
//!
//! Messages and conversation metadata are passed through as raw JSON; only the
//! handful of fields the exporter actually reads are typed.
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::users::UserDirectory;

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

/// The three kinds of conversation a user can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationKind {
    Channel,
    PrivateChannel,
    DirectMessage,
}

impl ConversationKind {
    /// Web API method family (`channels.*`, `groups.*`, `im.*`).
    pub fn api_prefix(self) -> &'static str {
        match self {
            ConversationKind::Channel => "channels",
            ConversationKind::PrivateChannel => "groups",
            ConversationKind::DirectMessage => "im",
        }
    }

    /// Field of the `<prefix>.list` response holding the conversations.
    pub fn list_field(self) -> &'static str {
        match self {
            ConversationKind::Channel => "channels",
            ConversationKind::PrivateChannel => "groups",
            ConversationKind::DirectMessage => "ims",
        }
    }

    /// Field of the `<prefix>.info` response holding the metadata object.
    /// `im.info` does not exist, so direct messages have none.
    pub fn info_field(self) -> Option<&'static str> {
        match self {
            ConversationKind::Channel => Some("channel"),
            ConversationKind::PrivateChannel => Some("group"),
            ConversationKind::DirectMessage => None,
        }
    }

    /// Output directory name under the export root.
    pub fn dir_name(self) -> &'static str {
        match self {
            ConversationKind::Channel => "channels",
            ConversationKind::PrivateChannel => "private_channels",
            ConversationKind::DirectMessage => "direct_messages",
        }
    }
}

impl fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConversationKind::Channel => "channel",
            ConversationKind::PrivateChannel => "private channel",
            ConversationKind::DirectMessage => "direct message",
        };
        f.write_str(label)
    }
}

/// One entry of a `channels.list`, `groups.list` or `im.list` response.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationSummary {
    pub id: String,
    /// Absent for direct messages.
    #[serde(default)]
    pub name: Option<String>,
    /// Counterpart of a direct message.
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub members: Vec<String>,
}

impl ConversationSummary {
    pub fn name_or_id(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

// ---------------------------------------------------------------------------
// Users / auth
// ---------------------------------------------------------------------------

/// Entry of a `users.list` response.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

/// Result of `auth.test`. Unread fields are kept so `metadata.json` carries
/// the full response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthInfo {
    pub team: String,
    pub user: String,
    pub user_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// A message exactly as the remote returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Message(pub Value);

impl Message {
    /// Timestamp used as the pagination cursor.
    pub fn ts(&self) -> Option<&str> {
        self.0.get("ts").and_then(Value::as_str)
    }
}

/// One page of a `<prefix>.history` response, newest message first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryPage {
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub has_more: bool,
}

// ---------------------------------------------------------------------------
// Output documents
// ---------------------------------------------------------------------------

/// `<kind-dir>/<name>.json`
#[derive(Debug, Serialize)]
pub struct ExportDocument<'a> {
    pub channel_info: &'a Value,
    pub messages: &'a [Message],
}

/// `metadata.json`
#[derive(Debug, Serialize)]
pub struct Metadata<'a> {
    pub auth_info: &'a AuthInfo,
    pub users: &'a UserDirectory,
}
