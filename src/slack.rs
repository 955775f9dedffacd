//! Thin blocking client for the subset of the Slack Web API the exporter uses.
use eyre::{Context, Result, eyre};
use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::history::{HistoryQuery, HistorySource};
use crate::models::{AuthInfo, ConversationKind, ConversationSummary, HistoryPage, User};

pub const DEFAULT_API_URL: &str = "https://slack.com/api/";

/// The remote calls the exporter depends on.
pub trait SlackApi {
    /// `auth.test`: validates the token and identifies the caller.
    fn auth_test(&self) -> Result<AuthInfo>;

    /// `users.list`
    fn users_list(&self) -> Result<Vec<User>>;

    /// `<prefix>.list` for one kind of conversation.
    fn list_conversations(&self, kind: ConversationKind) -> Result<Vec<ConversationSummary>>;

    /// `<prefix>.info`, returned verbatim.
    fn conversation_info(&self, kind: ConversationKind, id: &str) -> Result<Value>;

    /// `<prefix>.history`, one page.
    fn history(&self, kind: ConversationKind, query: &HistoryQuery<'_>) -> Result<HistoryPage>;
}

/// History of one kind of conversation, viewed as a pageable resource.
pub struct ConversationHistory<'a, A: ?Sized> {
    api: &'a A,
    kind: ConversationKind,
}

impl<'a, A: SlackApi + ?Sized> ConversationHistory<'a, A> {
    pub fn new(api: &'a A, kind: ConversationKind) -> Self {
        Self { api, kind }
    }
}

impl<A: SlackApi + ?Sized> HistorySource for ConversationHistory<'_, A> {
    fn history(&self, query: &HistoryQuery<'_>) -> Result<HistoryPage> {
        self.api.history(self.kind, query)
    }
}

/// Envelope shared by every Web API response.
#[derive(Deserialize)]
struct Envelope {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

pub struct SlackClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl SlackClient {
    pub fn new(base_url: &Url, token: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .wrap_err("Failed to build HTTP client")?;

        // `Url::join` replaces the last path segment unless the base ends in '/'
        let mut base_url = base_url.clone();
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            http,
            base_url,
            token: token.into(),
        })
    }

    /// POST `method` with form `params`, fail on HTTP errors or `ok: false`.
    fn call(&self, method: &str, params: &[(&str, String)]) -> Result<Value> {
        let url = self
            .base_url
            .join(method)
            .wrap_err_with(|| format!("Invalid Slack API method: {}", method))?;

        let body: Value = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .form(params)
            .send()
            .and_then(|r| r.error_for_status())
            .and_then(|r| r.json())
            .wrap_err_with(|| format!("Failed to call Slack API method {}", method))?;

        let envelope = Envelope::deserialize(&body)
            .wrap_err_with(|| format!("Malformed response from Slack API method {}", method))?;
        if !envelope.ok {
            return Err(eyre!(
                "Slack API method {} failed: {}",
                method,
                envelope.error.as_deref().unwrap_or("unknown_error")
            ));
        }
        Ok(body)
    }

    /// Call `method` and deserialize `field` of its response.
    fn call_field<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &[(&str, String)],
        field: &str,
    ) -> Result<T> {
        let mut body = self.call(method, params)?;
        let value = body
            .get_mut(field)
            .map(Value::take)
            .ok_or_else(|| eyre!("Slack API method {} returned no `{}`", method, field))?;
        serde_json::from_value(value)
            .wrap_err_with(|| format!("Unexpected `{}` in Slack API method {}", field, method))
    }
}

impl SlackApi for SlackClient {
    fn auth_test(&self) -> Result<AuthInfo> {
        let body = self.call("auth.test", &[])?;
        serde_json::from_value(body).wrap_err("Unexpected auth.test response")
    }

    fn users_list(&self) -> Result<Vec<User>> {
        self.call_field("users.list", &[], "members")
    }

    fn list_conversations(&self, kind: ConversationKind) -> Result<Vec<ConversationSummary>> {
        let method = format!("{}.list", kind.api_prefix());
        self.call_field(&method, &[], kind.list_field())
    }

    fn conversation_info(&self, kind: ConversationKind, id: &str) -> Result<Value> {
        let field = kind
            .info_field()
            .ok_or_else(|| eyre!("No info call for {} conversations", kind))?;
        let method = format!("{}.info", kind.api_prefix());
        self.call_field(&method, &[("channel", id.to_string())], field)
    }

    fn history(&self, kind: ConversationKind, query: &HistoryQuery<'_>) -> Result<HistoryPage> {
        let method = format!("{}.history", kind.api_prefix());
        let mut params = vec![
            ("channel", query.channel.to_string()),
            ("oldest", query.oldest.to_string()),
            ("count", query.count.to_string()),
        ];
        if let Some(latest) = query.latest {
            params.push(("latest", latest.to_string()));
        }
        let body = self.call(&method, &params)?;
        serde_json::from_value(body)
            .wrap_err_with(|| format!("Unexpected {} response", method))
    }
}
