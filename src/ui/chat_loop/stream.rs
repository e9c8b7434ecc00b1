use futures_util::StreamExt;
use std::io;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::core::backend::FragmentStream;
use crate::core::error::ChatError;
use crate::core::reply::{CompletedReply, ReplyBuffer};
use crate::ui::panel::ReplyView;

#[derive(Debug)]
pub enum StreamOutcome {
    Completed(CompletedReply),
    Interrupted,
    Failed(ChatError),
}

/// Drains `fragments` into `view`, redrawing at most once per `min_redraw`
/// and always once more with the complete text. Cancelling `cancel` stops
/// reading at the next fragment boundary.
pub async fn stream_reply<V: ReplyView>(
    mut fragments: FragmentStream,
    view: &mut V,
    title: &str,
    min_redraw: Duration,
    cancel: &CancellationToken,
) -> io::Result<StreamOutcome> {
    view.begin(title)?;
    let mut buffer = ReplyBuffer::new();
    let mut last_draw: Option<Instant> = None;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            item = fragments.next() => Some(item),
        };

        match next {
            None => {
                debug!(fragments = buffer.fragment_count(), "reply interrupted");
                view.finish(buffer.text())?;
                return Ok(StreamOutcome::Interrupted);
            }
            Some(Some(Ok(fragment))) => {
                buffer.push(&fragment);
                if last_draw.is_none_or(|at| at.elapsed() >= min_redraw) {
                    view.update(buffer.text())?;
                    last_draw = Some(Instant::now());
                }
            }
            Some(Some(Err(err))) => {
                view.finish(buffer.text())?;
                return Ok(StreamOutcome::Failed(err));
            }
            Some(None) => break,
        }
    }

    view.finish(buffer.text())?;
    debug!(fragments = buffer.fragment_count(), "reply complete");
    Ok(StreamOutcome::Completed(buffer.finish()))
}
