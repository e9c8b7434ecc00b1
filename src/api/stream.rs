//! Line framing shared by the SSE and NDJSON transports.

use futures_util::future;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use memchr::memchr;
use std::fmt::Display;

use crate::core::backend::{BackendKind, FragmentStream};
use crate::core::error::ChatError;

/// What one line of a reply stream means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Text(String),
    /// Keep-alives, event names, metadata.
    Skip,
    Done,
}

type LineStream = BoxStream<'static, Result<String, ChatError>>;

/// Splits a byte stream on `\n`. A trailing line without a newline is still
/// yielded. A transport error ends the stream after being reported.
pub fn byte_lines<S, B, E>(kind: BackendKind, bytes: S) -> LineStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = (bytes.boxed(), Vec::<u8>::new(), false);
    stream::unfold(state, move |(mut bytes, mut buffer, mut finished)| async move {
        loop {
            if let Some(newline) = memchr(b'\n', &buffer) {
                let line: Vec<u8> = buffer.drain(..=newline).collect();
                let text = decode_line(&line[..newline]);
                return Some((Ok(text), (bytes, buffer, finished)));
            }
            if finished {
                if buffer.is_empty() {
                    return None;
                }
                let text = decode_line(&std::mem::take(&mut buffer));
                return Some((Ok(text), (bytes, buffer, finished)));
            }
            match bytes.next().await {
                Some(Ok(chunk)) => buffer.extend_from_slice(chunk.as_ref()),
                Some(Err(err)) => {
                    buffer.clear();
                    let err = ChatError::request(kind.tag(), format!("stream interrupted: {err}"));
                    return Some((Err(err), (bytes, buffer, true)));
                }
                None => finished = true,
            }
        }
    })
    .boxed()
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim_end_matches('\r').to_string()
}

/// The payload of an SSE `data:` line, if `line` is one.
pub fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Maps each line through `parse` and stops at the first [`Frame::Done`].
pub fn fragments<F>(lines: LineStream, mut parse: F) -> FragmentStream
where
    F: FnMut(&str) -> Result<Frame, ChatError> + Send + 'static,
{
    lines
        .map(move |line| line.and_then(|line| parse(&line)))
        .take_while(|frame| future::ready(!matches!(frame, Ok(Frame::Done))))
        .filter_map(|frame| {
            future::ready(match frame {
                Ok(Frame::Text(text)) if !text.is_empty() => Some(Ok(text)),
                Ok(_) => None,
                Err(err) => Some(Err(err)),
            })
        })
        .boxed()
}
