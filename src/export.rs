use eyre::{Context, Result};
use serde::Serialize;
use serde_json::{Value, json};
use serde_json::ser::PrettyFormatter;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::ExportConfig;
use crate::history::fetch_history;
use crate::models::{AuthInfo, ConversationKind, ExportDocument, Message, Metadata};
use crate::slack::{ConversationHistory, SlackApi};
use crate::users::UserDirectory;

/// Totals reported at the end of a run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub channels: usize,
    pub private_channels: usize,
    pub direct_messages: usize,
    pub messages: usize,
}

/// Conversations and messages written by one enumerator.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KindSummary {
    pub conversations: usize,
    pub messages: usize,
}

/// Probe auth, resolve users, then export every kind that isn't skipped.
pub fn run<A: SlackApi + ?Sized>(api: &A, config: &ExportConfig) -> Result<ExportSummary> {
    let auth = probe_auth(api)?;
    let users = load_user_directory(api)?;

    if !config.dry_run {
        fs::create_dir_all(&config.target_dir).wrap_err_with(|| {
            format!(
                "Failed to create target directory: {}",
                config.target_dir.display()
            )
        })?;
        info!("writing metadata");
        write_json(
            &config.target_dir.join("metadata.json"),
            &Metadata {
                auth_info: &auth,
                users: &users,
            },
        )?;
    }

    let mut summary = ExportSummary::default();

    if !config.skip_channels {
        let kind = export_channels(api, config)?;
        summary.channels = kind.conversations;
        summary.messages += kind.messages;
    }

    if !config.skip_private_channels {
        let kind = export_private_channels(api, config)?;
        summary.private_channels = kind.conversations;
        summary.messages += kind.messages;
    }

    if !config.skip_direct_messages {
        let kind = export_direct_messages(api, &auth.user_id, &users, config)?;
        summary.direct_messages = kind.conversations;
        summary.messages += kind.messages;
    }

    Ok(summary)
}

/// Validate the token before anything is exported.
pub fn probe_auth<A: SlackApi + ?Sized>(api: &A) -> Result<AuthInfo> {
    let auth = api.auth_test().wrap_err("Authentication failed")?;
    info!(
        "Successfully authenticated for team {} and user {}",
        auth.team, auth.user
    );
    Ok(auth)
}

pub fn load_user_directory<A: SlackApi + ?Sized>(api: &A) -> Result<UserDirectory> {
    let users = api.users_list()?;
    info!("found {} users", users.len());
    Ok(UserDirectory::new(users))
}

/// Fetch and write history for all public channels.
pub fn export_channels<A: SlackApi + ?Sized>(api: &A, config: &ExportConfig) -> Result<KindSummary> {
    let kind = ConversationKind::Channel;
    let channels = api.list_conversations(kind)?;

    println!("\nfound channels:");
    for channel in &channels {
        println!("{}", channel.name_or_id());
    }

    let mut summary = KindSummary::default();
    if config.dry_run {
        return Ok(summary);
    }

    let dir = create_kind_dir(config, kind)?;
    for channel in &channels {
        let name = channel.name_or_id();
        info!("getting history for channel {}", name);
        let channel_info = api.conversation_info(kind, &channel.id)?;
        let messages = fetch_history(
            ConversationHistory::new(api, kind),
            &channel.id,
            config.page_size,
        )?;
        write_document(&dir, name, &channel_info, &messages)?;
        summary.conversations += 1;
        summary.messages += messages.len();
    }
    Ok(summary)
}

/// Fetch and write history for all private channels (`groups` in the API).
pub fn export_private_channels<A: SlackApi + ?Sized>(
    api: &A,
    config: &ExportConfig,
) -> Result<KindSummary> {
    let kind = ConversationKind::PrivateChannel;
    let groups = api.list_conversations(kind)?;

    println!("\nfound private channels:");
    for group in &groups {
        println!("{}: ({} members)", group.name_or_id(), group.members.len());
    }

    let mut summary = KindSummary::default();
    if config.dry_run {
        return Ok(summary);
    }

    let dir = create_kind_dir(config, kind)?;
    for group in &groups {
        let name = group.name_or_id();
        info!("getting history for private channel {} with id {}", name, group.id);
        let channel_info = api.conversation_info(kind, &group.id)?;
        let messages = fetch_history(
            ConversationHistory::new(api, kind),
            &group.id,
            config.page_size,
        )?;
        write_document(&dir, name, &channel_info, &messages)?;
        summary.conversations += 1;
        summary.messages += messages.len();
    }
    Ok(summary)
}

/// Fetch and write history for all 1:1 direct messages (`im` in the API).
pub fn export_direct_messages<A: SlackApi + ?Sized>(
    api: &A,
    owner_id: &str,
    users: &UserDirectory,
    config: &ExportConfig,
) -> Result<KindSummary> {
    let kind = ConversationKind::DirectMessage;
    let dms = api.list_conversations(kind)?;

    println!("\nfound direct messages (1:1) with the following users:");
    for dm in &dms {
        println!("{}", dm_partner(dm.user.as_deref(), &dm.id, users));
    }

    let mut summary = KindSummary::default();
    if config.dry_run {
        return Ok(summary);
    }

    let dir = create_kind_dir(config, kind)?;
    for dm in &dms {
        let name = dm_partner(dm.user.as_deref(), &dm.id, users);
        info!("getting history for direct messages with {}", name);
        let messages = fetch_history(
            ConversationHistory::new(api, kind),
            &dm.id,
            config.page_size,
        )?;
        let members: Vec<&str> = dm.user.as_deref().into_iter().chain([owner_id]).collect();
        let channel_info = json!({ "members": members });
        write_document(&dir, &name, &channel_info, &messages)?;
        summary.conversations += 1;
        summary.messages += messages.len();
    }
    Ok(summary)
}

/// Display name of the other side of a DM; falls back to the DM id if the
/// listing carries no user at all.
fn dm_partner(user: Option<&str>, dm_id: &str, users: &UserDirectory) -> String {
    users.resolve(user.unwrap_or(dm_id)).to_string()
}

fn create_kind_dir(config: &ExportConfig, kind: ConversationKind) -> Result<PathBuf> {
    let dir = config.target_dir.join(kind.dir_name());
    fs::create_dir_all(&dir)
        .wrap_err_with(|| format!("Failed to create directory: {}", dir.display()))?;
    Ok(dir)
}

/// Turn a display name into a file stem that stays inside its directory.
pub fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect();
    match stem.as_str() {
        "" | "." | ".." => format!("_{}", stem),
        _ => stem,
    }
}

fn write_document(
    dir: &Path,
    name: &str,
    channel_info: &Value,
    messages: &[Message],
) -> Result<()> {
    let path = dir.join(format!("{}.json", file_stem(name)));
    info!("writing {} records to {}", messages.len(), path.display());
    write_json(
        &path,
        &ExportDocument {
            channel_info,
            messages,
        },
    )
}

/// Pretty-print `value` to `path` with a 4-space indent, overwriting any existing file.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file =
        File::create(path).wrap_err_with(|| format!("Failed to create: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let mut ser =
        serde_json::Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b"    "));
    value
        .serialize(&mut ser)
        .wrap_err_with(|| format!("Failed to write: {}", path.display()))?;
    writer
        .flush()
        .wrap_err_with(|| format!("Failed to flush: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::HistoryQuery;
    use crate::models::{ConversationSummary, HistoryPage, User};
    use eyre::eyre;
    use serde_json::Map;
    use std::cell::RefCell;
    use std::collections::HashMap;

    /// In-memory team: each conversation id maps to its full history, newest first.
    #[derive(Default)]
    struct FakeSlack {
        auth_error: Option<&'static str>,
        users: Vec<(&'static str, &'static str)>,
        channels: Vec<ConversationSummary>,
        groups: Vec<ConversationSummary>,
        ims: Vec<ConversationSummary>,
        histories: HashMap<String, Vec<Message>>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeSlack {
        fn record(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn history_calls(&self) -> usize {
            self.calls().iter().filter(|c| c.contains(".history")).count()
        }
    }

    impl SlackApi for FakeSlack {
        fn auth_test(&self) -> Result<AuthInfo> {
            self.record("auth.test".into());
            if let Some(err) = self.auth_error {
                return Err(eyre!("Slack API method auth.test failed: {}", err));
            }
            Ok(AuthInfo {
                team: "acme".into(),
                user: "alice".into(),
                user_id: "U1".into(),
                extra: Map::new(),
            })
        }

        fn users_list(&self) -> Result<Vec<User>> {
            self.record("users.list".into());
            Ok(self
                .users
                .iter()
                .map(|(id, name)| User {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .collect())
        }

        fn list_conversations(&self, kind: ConversationKind) -> Result<Vec<ConversationSummary>> {
            self.record(format!("{}.list", kind.api_prefix()));
            Ok(match kind {
                ConversationKind::Channel => self.channels.clone(),
                ConversationKind::PrivateChannel => self.groups.clone(),
                ConversationKind::DirectMessage => self.ims.clone(),
            })
        }

        fn conversation_info(&self, kind: ConversationKind, id: &str) -> Result<Value> {
            self.record(format!("{}.info {}", kind.api_prefix(), id));
            Ok(json!({ "id": id, "kind": kind.to_string() }))
        }

        fn history(&self, kind: ConversationKind, query: &HistoryQuery<'_>) -> Result<HistoryPage> {
            self.record(format!("{}.history {}", kind.api_prefix(), query.channel));
            let all = self.histories.get(query.channel).cloned().unwrap_or_default();
            let start = match query.latest {
                None => 0,
                Some(latest) => all
                    .iter()
                    .position(|m| m.ts() == Some(latest))
                    .map_or(all.len(), |i| i + 1),
            };
            let end = (start + query.count as usize).min(all.len());
            Ok(HistoryPage {
                messages: all[start..end].to_vec(),
                has_more: end < all.len(),
            })
        }
    }

    fn conversation(id: &str, name: Option<&str>, user: Option<&str>) -> ConversationSummary {
        ConversationSummary {
            id: id.into(),
            name: name.map(Into::into),
            user: user.map(Into::into),
            members: vec!["U1".into(), "U2".into()],
        }
    }

    fn messages(ts: &[&str]) -> Vec<Message> {
        ts.iter().map(|t| Message(json!({ "ts": t, "text": "héllo" }))).collect()
    }

    fn team() -> FakeSlack {
        FakeSlack {
            users: vec![("U1", "alice"), ("U2", "bob")],
            channels: vec![conversation("C1", Some("general"), None)],
            groups: vec![conversation("G1", Some("secret"), None)],
            ims: vec![
                conversation("D1", None, Some("U2")),
                conversation("D2", None, Some("U9")),
            ],
            histories: HashMap::from([
                ("C1".to_string(), messages(&["5", "4", "3", "2", "1"])),
                ("G1".to_string(), messages(&["7"])),
                ("D1".to_string(), messages(&["2", "1"])),
            ]),
            ..FakeSlack::default()
        }
    }

    fn config(dir: &Path) -> ExportConfig {
        ExportConfig {
            target_dir: dir.to_path_buf(),
            page_size: 2,
            ..ExportConfig::default()
        }
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_full_export_writes_every_kind() {
        let tmp = tempfile::tempdir().unwrap();
        let api = team();

        let summary = run(&api, &config(tmp.path())).unwrap();

        assert_eq!(
            summary,
            ExportSummary {
                channels: 1,
                private_channels: 1,
                direct_messages: 2,
                messages: 8,
            }
        );

        let metadata = read_json(&tmp.path().join("metadata.json"));
        assert_eq!(metadata["auth_info"]["user_id"], "U1");
        assert_eq!(metadata["users"], json!({"U1": "alice", "U2": "bob"}));

        let general = read_json(&tmp.path().join("channels/general.json"));
        assert_eq!(general["channel_info"]["id"], "C1");
        let ts: Vec<_> = general["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["ts"].as_str().unwrap())
            .collect();
        assert_eq!(ts, ["5", "4", "3", "2", "1"]);

        let secret = read_json(&tmp.path().join("private_channels/secret.json"));
        assert_eq!(secret["channel_info"]["kind"], "private channel");
        assert_eq!(secret["messages"].as_array().unwrap().len(), 1);

        let bob = read_json(&tmp.path().join("direct_messages/bob.json"));
        assert_eq!(bob["channel_info"], json!({"members": ["U2", "U1"]}));
        assert_eq!(bob["messages"].as_array().unwrap().len(), 2);

        let unknown = read_json(&tmp.path().join("direct_messages/U9 (name unknown).json"));
        assert_eq!(unknown["messages"], json!([]));
    }

    #[test]
    fn test_channel_history_is_paged() {
        let tmp = tempfile::tempdir().unwrap();
        let api = team();

        export_channels(&api, &config(tmp.path())).unwrap();

        // 5 messages, page size 2
        let calls = api.calls();
        assert_eq!(calls.iter().filter(|c| *c == "channels.history C1").count(), 3);
        assert_eq!(
            calls,
            [
                "channels.list",
                "channels.info C1",
                "channels.history C1",
                "channels.history C1",
                "channels.history C1",
            ]
        );
    }

    #[test]
    fn test_dry_run_lists_but_never_fetches_or_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out");
        let api = team();
        let cfg = ExportConfig {
            dry_run: true,
            ..config(&out)
        };

        let summary = run(&api, &cfg).unwrap();

        assert_eq!(summary, ExportSummary::default());
        assert_eq!(api.history_calls(), 0);
        assert!(api.calls().contains(&"channels.list".to_string()));
        assert!(api.calls().contains(&"groups.list".to_string()));
        assert!(api.calls().contains(&"im.list".to_string()));
        assert!(!out.exists());
    }

    #[test]
    fn test_skip_flags_gate_enumerators() {
        let tmp = tempfile::tempdir().unwrap();
        let api = team();
        let cfg = ExportConfig {
            skip_channels: true,
            skip_private_channels: true,
            ..config(tmp.path())
        };

        let summary = run(&api, &cfg).unwrap();

        assert_eq!(summary.direct_messages, 2);
        assert_eq!(summary.channels, 0);
        assert!(!tmp.path().join("channels").exists());
        assert!(!tmp.path().join("private_channels").exists());
        assert!(tmp.path().join("direct_messages").is_dir());
        assert!(
            api.calls()
                .iter()
                .all(|c| !c.starts_with("channels.") && !c.starts_with("groups."))
        );
    }

    #[test]
    fn test_failed_auth_aborts_before_any_export() {
        let tmp = tempfile::tempdir().unwrap();
        let api = FakeSlack {
            auth_error: Some("invalid_auth"),
            ..team()
        };

        let err = run(&api, &config(tmp.path())).unwrap_err();

        assert_eq!(err.to_string(), "Authentication failed");
        assert_eq!(api.calls(), ["auth.test"]);
        assert!(!tmp.path().join("metadata.json").exists());
    }

    #[test]
    fn test_existing_file_is_overwritten() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("channels");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("general.json"), "stale").unwrap();

        export_channels(&team(), &config(tmp.path())).unwrap();

        let general = read_json(&dir.join("general.json"));
        assert_eq!(general["messages"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_output_uses_four_space_indent_and_raw_utf8() {
        let tmp = tempfile::tempdir().unwrap();

        export_private_channels(&team(), &config(tmp.path())).unwrap();

        let text = fs::read_to_string(tmp.path().join("private_channels/secret.json")).unwrap();
        assert!(text.starts_with("{\n    \"channel_info\": {"));
        assert!(text.contains("héllo"));
    }

    #[test]
    fn test_file_stem_keeps_names_inside_directory() {
        assert_eq!(file_stem("general"), "general");
        assert_eq!(file_stem("U9 (name unknown)"), "U9 (name unknown)");
        assert_eq!(file_stem("../etc/passwd"), ".._etc_passwd");
        assert_eq!(file_stem(".."), "_..");
        assert_eq!(file_stem(""), "_");
    }
}
