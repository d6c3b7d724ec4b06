//! Newline-delimited JSON (NDJSON) processing for streaming chat responses.
//!
//! The model server answers a streaming chat request with one JSON object per line.  This
//! module turns the raw byte stream into a stream of [`ChatChunk`] records, handling lines
//! split across reads, blank lines, in-band error records, and the final `done` record.

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};

use crate::observability::{STREAM_BYTES, STREAM_ERRORS};
use crate::{ChatChunk, Error, Result};

/// Process a stream of bytes into a stream of chat chunks.
///
/// The returned stream ends after the record with `done: true`, after the first error, or
/// when the byte stream ends.  A byte stream that ends before the `done` record yields a
/// streaming error so that a cut-off response is never mistaken for a complete one.
pub fn process_ndjson<S, E>(byte_stream: S) -> impl Stream<Item = Result<ChatChunk>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    let stream = byte_stream
        .map(|result| {
            result.map_err(|e| {
                Error::streaming(format!("Error in HTTP stream: {e}"), Some(Box::new(e)))
            })
        })
        .fuse();

    stream::unfold(
        (stream, BytesMut::new(), false),
        move |(mut stream, mut buffer, finished)| async move {
            if finished {
                return None;
            }
            loop {
                // Drain complete lines before reading more.
                while let Some(line) = next_line(&mut buffer) {
                    if let Some(item) = parse_line(&line) {
                        let finished = is_final(&item);
                        return Some((item, (stream, buffer, finished)));
                    }
                }

                match stream.next().await {
                    Some(Ok(bytes)) => {
                        STREAM_BYTES.count(bytes.len() as u64);
                        buffer.extend_from_slice(&bytes);
                    }
                    Some(Err(e)) => {
                        STREAM_ERRORS.click();
                        return Some((Err(e), (stream, buffer, true)));
                    }
                    None => {
                        // A trailing line without a newline is still a record.  Anything
                        // other than the final record means the stream was cut off.
                        let rest = buffer.split();
                        return match parse_line(&rest) {
                            Some(Ok(chunk)) if !chunk.done => {
                                Some((Ok(chunk), (stream, buffer, false)))
                            }
                            Some(item) => Some((item, (stream, buffer, true))),
                            None => {
                                STREAM_ERRORS.click();
                                Some((
                                    Err(Error::streaming(
                                        "stream ended before the final record",
                                        None,
                                    )),
                                    (stream, buffer, true),
                                ))
                            }
                        };
                    }
                }
            }
        },
    )
}

/// Split the next newline-terminated line off the front of the buffer.
fn next_line(buffer: &mut BytesMut) -> Option<BytesMut> {
    let pos = buffer.iter().position(|b| *b == b'\n')?;
    Some(buffer.split_to(pos + 1))
}

/// Parse one line.  Returns `None` for blank lines.
fn parse_line(line: &[u8]) -> Option<Result<ChatChunk>> {
    let text = match std::str::from_utf8(line) {
        Ok(text) => text.trim(),
        Err(e) => {
            return Some(Err(Error::encoding(
                format!("Invalid UTF-8 in stream: {e}"),
                Some(Box::new(e)),
            )));
        }
    };
    if text.is_empty() {
        return None;
    }
    let chunk = match serde_json::from_str::<ChatChunk>(text) {
        Ok(chunk) => chunk,
        Err(e) => {
            return Some(Err(Error::serialization(
                format!("Malformed stream record '{text}': {e}"),
                Some(Box::new(e)),
            )));
        }
    };
    if let Some(message) = &chunk.error {
        return Some(Err(Error::streaming(message.clone(), None)));
    }
    Some(Ok(chunk))
}

fn is_final(item: &Result<ChatChunk>) -> bool {
    match item {
        Ok(chunk) => chunk.done,
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use std::io;

    fn bytes_of(chunks: &[&str]) -> impl Stream<Item = std::result::Result<Bytes, io::Error>> + Unpin {
        let owned: Vec<std::result::Result<Bytes, io::Error>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from(c.to_string())))
            .collect();
        stream::iter(owned)
    }

    async fn collect(chunks: &[&str]) -> Vec<Result<ChatChunk>> {
        process_ndjson(bytes_of(chunks)).collect().await
    }

    const THINK: &str =
        r#"{"model":"qwen3:0.6b","message":{"role":"assistant","content":"","thinking":"Let"},"done":false}"#;
    const ANSWER: &str =
        r#"{"model":"qwen3:0.6b","message":{"role":"assistant","content":"Hi"},"done":false}"#;
    const DONE: &str =
        r#"{"model":"qwen3:0.6b","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop"}"#;

    #[tokio::test]
    async fn parse_complete_stream() {
        let body = format!("{THINK}\n{ANSWER}\n{DONE}\n");
        let items = collect(&[&body]).await;
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.is_ok()));
        assert!(items[2].as_ref().unwrap().done);
    }

    #[tokio::test]
    async fn handle_split_line() {
        let (left, right) = ANSWER.split_at(20);
        let tail = format!("{right}\n{DONE}\n");
        let items = collect(&[left, &tail]).await;
        assert_eq!(items.len(), 2);
        let first = items[0].as_ref().unwrap().clone();
        assert_eq!(first.into_fragment().answer_text(), Some("Hi"));
    }

    #[tokio::test]
    async fn handle_split_multibyte_character() {
        let line = r#"{"message":{"role":"assistant","content":"héllo"},"done":false}"#;
        let bytes = line.as_bytes();
        let cut = line.find('é').unwrap() + 1;
        let chunks: Vec<std::result::Result<Bytes, io::Error>> = vec![
            Ok(Bytes::copy_from_slice(&bytes[..cut])),
            Ok(Bytes::copy_from_slice(&bytes[cut..])),
            Ok(Bytes::from(format!("\n{DONE}\n"))),
        ];
        let items: Vec<_> = process_ndjson(stream::iter(chunks)).collect().await;
        let first = items[0].as_ref().unwrap().clone();
        assert_eq!(first.into_fragment().answer_text(), Some("héllo"));
    }

    #[tokio::test]
    async fn skip_blank_lines() {
        let body = format!("\n\n{ANSWER}\n\n{DONE}\n");
        let items = collect(&[&body]).await;
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn trailing_final_line_without_newline() {
        let body = format!("{ANSWER}\n{DONE}");
        let items = collect(&[&body]).await;
        assert_eq!(items.len(), 2);
        assert!(items[1].as_ref().unwrap().done);
    }

    #[tokio::test]
    async fn stops_after_done_record() {
        let body = format!("{DONE}\n{ANSWER}\n");
        let items = collect(&[&body]).await;
        assert_eq!(items.len(), 1);
    }

    #[tokio::test]
    async fn error_record_ends_stream() {
        let body = format!("{ANSWER}\n{{\"error\":\"model runner crashed\"}}\n{ANSWER}\n");
        let items = collect(&[&body]).await;
        assert_eq!(items.len(), 2);
        let err = items[1].as_ref().unwrap_err();
        assert!(err.is_streaming());
        assert!(err.to_string().contains("model runner crashed"));
    }

    #[tokio::test]
    async fn truncated_stream_is_an_error() {
        let body = format!("{ANSWER}\n");
        let items = collect(&[&body]).await;
        assert_eq!(items.len(), 2);
        assert!(items[1].as_ref().unwrap_err().is_streaming());
    }

    #[tokio::test]
    async fn truncated_trailing_record_is_kept() {
        let items = collect(&[ANSWER]).await;
        assert_eq!(items.len(), 2);
        let first = items[0].as_ref().unwrap().clone();
        assert_eq!(first.into_fragment().answer_text(), Some("Hi"));
        assert!(items[1].as_ref().unwrap_err().is_streaming());
    }

    #[tokio::test]
    async fn malformed_record() {
        let items = collect(&["not json\n"]).await;
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    #[tokio::test]
    async fn transport_error_ends_stream() {
        let chunks: Vec<std::result::Result<Bytes, io::Error>> = vec![
            Ok(Bytes::from(format!("{ANSWER}\n"))),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")),
            Ok(Bytes::from(format!("{DONE}\n"))),
        ];
        let items: Vec<_> = process_ndjson(stream::iter(chunks)).collect().await;
        assert_eq!(items.len(), 2);
        let err = items[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("Error in HTTP stream"));
    }
}
