//! Cursor pagination over a channel's message log.

use courier_slack_runtime::{SlackHistoryPage, SlackMessage};
use futures_util::{stream, Stream, TryStreamExt};
use tracing::{debug, info};

use crate::{ArchiveError, ArchivePlatform};

/// Lazily pages through `channel_id`, newest page first.
///
/// The stream is finite and single-use: it ends after the first page without a
/// continuation cursor. Building a new stream re-queries the platform.
pub fn history_pages<'a, P>(
    platform: &'a P,
    channel_id: &'a str,
) -> impl Stream<Item = Result<SlackHistoryPage, ArchiveError>> + Send + 'a
where
    P: ArchivePlatform + ?Sized,
{
    // `None` once the last page has been yielded.
    let start: Option<Option<String>> = Some(None);
    stream::try_unfold(start, move |state| async move {
        let Some(cursor) = state else {
            return Ok(None);
        };
        let page = platform.history_page(channel_id, cursor.as_deref()).await?;
        let next = page
            .next_cursor
            .clone()
            .filter(|value| !value.trim().is_empty())
            .filter(|value| Some(value) != cursor.as_ref());
        debug!(
            channel_id,
            messages = page.messages.len(),
            has_more = next.is_some(),
            "received history page"
        );
        Ok::<_, ArchiveError>(Some((page, next.map(Some))))
    })
}

/// Fetches the complete history of `channel_id`, oldest message first.
pub async fn fetch_history<P>(
    platform: &P,
    channel_id: &str,
) -> Result<Vec<SlackMessage>, ArchiveError>
where
    P: ArchivePlatform + ?Sized,
{
    let mut pages = Box::pin(history_pages(platform, channel_id));
    let mut messages = Vec::new();
    let mut page_count = 0usize;
    while let Some(page) = pages.try_next().await? {
        page_count += 1;
        messages.extend(page.messages);
    }
    messages.reverse();
    info!(
        channel_id,
        pages = page_count,
        messages = messages.len(),
        "fetched channel history"
    );
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use futures_util::TryStreamExt;

    use super::{fetch_history, history_pages};
    use crate::test_support::{text_message, FakePlatform};
    use crate::ArchiveError;

    fn timestamps(messages: &[courier_slack_runtime::SlackMessage]) -> Vec<&str> {
        messages.iter().map(|message| message.ts.as_str()).collect()
    }

    #[tokio::test]
    async fn functional_fetch_history_concatenates_pages_oldest_first() {
        let messages = (1..=7)
            .map(|index| text_message(&format!("{index}.000100"), "U1", &format!("m{index}")))
            .collect::<Vec<_>>();
        let platform = FakePlatform::with_messages(messages, 3);

        let fetched = fetch_history(&platform, "C1").await.expect("history");
        assert_eq!(
            timestamps(&fetched),
            vec![
                "1.000100", "2.000100", "3.000100", "4.000100", "5.000100", "6.000100",
                "7.000100"
            ]
        );
        assert_eq!(
            platform.calls().history_cursors,
            vec![
                None,
                Some("cursor-1".to_string()),
                Some("cursor-2".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn functional_history_stream_is_lazy_and_reissues_queries() {
        let messages = (1..=4)
            .map(|index| text_message(&format!("{index}.0"), "U1", "hi"))
            .collect::<Vec<_>>();
        let platform = FakePlatform::with_messages(messages, 2);

        let pages = history_pages(&platform, "C1");
        assert!(platform.calls().history_cursors.is_empty());
        let pages = pages.try_collect::<Vec<_>>().await.expect("pages");
        assert_eq!(pages.len(), 2);

        fetch_history(&platform, "C1").await.expect("second fetch");
        assert_eq!(platform.calls().history_cursors.len(), 4);
    }

    #[tokio::test]
    async fn unit_fetch_history_of_empty_channel_is_empty() {
        let platform = FakePlatform::with_messages(Vec::new(), 10);
        let fetched = fetch_history(&platform, "C1").await.expect("history");
        assert!(fetched.is_empty());
        assert_eq!(platform.calls().history_cursors, vec![None::<String>]);
    }

    #[tokio::test]
    async fn regression_fetch_history_surfaces_membership_errors() {
        let mut platform = FakePlatform::with_messages(Vec::new(), 10);
        platform.history_error = Some("not_in_channel");
        let error = fetch_history(&platform, "C1").await.expect_err("error");
        assert!(matches!(error, ArchiveError::NotAMember(_)));
    }
}
