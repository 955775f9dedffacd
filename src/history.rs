use eyre::{Result, eyre};
use tracing::debug;

use crate::models::{HistoryPage, Message};

/// Messages requested per page unless overridden.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Parameters of a single `<prefix>.history` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryQuery<'a> {
    pub channel: &'a str,
    /// Upper bound timestamp; `None` means "most recent".
    pub latest: Option<&'a str>,
    pub oldest: &'a str,
    pub count: u32,
}

/// Anything that can answer a paged history request for a conversation.
pub trait HistorySource {
    fn history(&self, query: &HistoryQuery<'_>) -> Result<HistoryPage>;
}

impl<S: HistorySource + ?Sized> HistorySource for &S {
    fn history(&self, query: &HistoryQuery<'_>) -> Result<HistoryPage> {
        (**self).history(query)
    }
}

/// Fetch the complete history of `channel`, newest first, in the order the
/// pages were returned.
///
/// After each page with `has_more`, the `ts` of the oldest message seen so far
/// becomes the next page's `latest`. Messages sharing a timestamp across a page
/// boundary are passed through unchanged, whatever the remote does with them.
pub fn fetch_history<S: HistorySource>(
    source: S,
    channel: &str,
    page_size: u32,
) -> Result<Vec<Message>> {
    let mut messages: Vec<Message> = Vec::new();
    let mut latest: Option<String> = None;

    loop {
        let query = HistoryQuery {
            channel,
            latest: latest.as_deref(),
            oldest: "0",
            count: page_size,
        };
        debug!(channel, latest = ?query.latest, count = page_size, "requesting history page");
        let page = source.history(&query)?;
        let received = page.messages.len();
        messages.extend(page.messages);

        if !page.has_more {
            break;
        }

        // An empty page would leave the cursor where it was and loop forever.
        if received == 0 {
            return Err(eyre!(
                "History of {} reported more messages but returned an empty page",
                channel
            ));
        }
        let cursor = messages
            .last()
            .and_then(Message::ts)
            .ok_or_else(|| eyre!("Message in {} has no `ts` to continue paging from", channel))?;
        latest = Some(cursor.to_string());
    }

    Ok(messages)
}
