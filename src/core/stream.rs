//! Decoding of the newline-delimited generate stream.
//!
//! Each line is one JSON progress record. The first record with
//! `done: true` ends the sequence; the underlying connection is released at
//! that point without reading further bytes.

use futures_util::StreamExt;
use memchr::memchr;
use tracing::debug;

use crate::api::GenerateResponse;
use crate::core::error::{ProtocolError, TurnError};
use crate::core::transport::ChunkStream;

/// Timing and token counts the server reports on the final record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnStats {
    pub total_duration_ns: Option<u64>,
    pub load_duration_ns: Option<u64>,
    pub prompt_eval_count: Option<u64>,
    pub eval_count: Option<u64>,
    pub eval_duration_ns: Option<u64>,
}

impl TurnStats {
    fn from_response(response: &GenerateResponse) -> Option<Self> {
        let stats = TurnStats {
            total_duration_ns: response.total_duration,
            load_duration_ns: response.load_duration,
            prompt_eval_count: response.prompt_eval_count,
            eval_count: response.eval_count,
            eval_duration_ns: response.eval_duration,
        };
        (stats != TurnStats::default()).then_some(stats)
    }

    /// Generation speed, when both the count and the duration are known.
    pub fn tokens_per_second(&self) -> Option<f64> {
        match (self.eval_count, self.eval_duration_ns) {
            (Some(count), Some(duration)) if duration > 0 => {
                Some(count as f64 / (duration as f64 / 1_000_000_000.0))
            }
            _ => None,
        }
    }
}

/// One decoded line of the response.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    pub text_fragment: String,
    pub is_final: bool,
    /// Only ever set on the final record.
    pub final_token: Option<Vec<i64>>,
    pub stats: Option<TurnStats>,
}

/// Decode a single non-blank line.
pub fn decode_record(line: &str) -> Result<ProgressRecord, TurnError> {
    let response: GenerateResponse =
        serde_json::from_str(line).map_err(|source| ProtocolError::InvalidRecord {
            line: line.to_string(),
            source,
        })?;

    if let Some(message) = response.error {
        return Err(TurnError::Server(message));
    }

    let final_token = if response.done {
        response.context.clone()
    } else {
        if response.context.is_some() {
            debug!("ignoring context on a non-final record");
        }
        None
    };

    let stats = if response.done {
        TurnStats::from_response(&response)
    } else {
        None
    };

    Ok(ProgressRecord {
        text_fragment: response.response,
        is_final: response.done,
        final_token,
        stats,
    })
}

/// Reassembles complete lines from arbitrarily split chunks.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pop the next complete line without its terminator.
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        let newline_pos = memchr(b'\n', &self.buffer)?;
        let mut line: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Some(line)
    }

    /// Take whatever is left once the source is exhausted.
    pub fn take_remainder(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buffer))
        }
    }
}

/// Lazy, finite, non-restartable sequence of [`ProgressRecord`]s.
pub struct RecordStream {
    source: Option<ChunkStream>,
    lines: LineBuffer,
    finished: bool,
}

impl RecordStream {
    pub fn new(source: ChunkStream) -> Self {
        Self {
            source: Some(source),
            lines: LineBuffer::new(),
            finished: false,
        }
    }

    /// Next record, `Ok(None)` once the final record has been yielded or the
    /// stream has failed.
    pub async fn next_record(&mut self) -> Result<Option<ProgressRecord>, TurnError> {
        loop {
            if self.finished {
                return Ok(None);
            }

            if let Some(line) = self.lines.next_line() {
                if let Some(record) = self.accept_line(&line)? {
                    return Ok(Some(record));
                }
                continue;
            }

            let Some(source) = self.source.as_mut() else {
                if let Some(line) = self.lines.take_remainder() {
                    if let Some(record) = self.accept_line(&line)? {
                        return Ok(Some(record));
                    }
                    continue;
                }
                self.finished = true;
                return Err(ProtocolError::MissingFinal.into());
            };

            match source.next().await {
                Some(Ok(chunk)) => self.lines.push(&chunk),
                Some(Err(err)) => {
                    self.close();
                    return Err(err);
                }
                None => self.source = None,
            }
        }
    }

    fn accept_line(&mut self, line: &[u8]) -> Result<Option<ProgressRecord>, TurnError> {
        let text = match std::str::from_utf8(line) {
            Ok(text) => text.trim(),
            Err(_) => {
                self.close();
                return Err(ProtocolError::InvalidUtf8.into());
            }
        };
        if text.is_empty() {
            return Ok(None);
        }

        match decode_record(text) {
            Ok(record) => {
                if record.is_final {
                    self.close();
                }
                Ok(Some(record))
            }
            Err(err) => {
                self.close();
                Err(err)
            }
        }
    }

    fn close(&mut self) {
        self.finished = true;
        self.source = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn chunks(parts: &[&str]) -> ChunkStream {
        let owned: Vec<Result<Vec<u8>, TurnError>> =
            parts.iter().map(|p| Ok(p.as_bytes().to_vec())).collect();
        stream::iter(owned).boxed()
    }

    #[tokio::test]
    async fn yields_records_in_order_and_stops_at_final() {
        let body = "{\"response\":\"Hi\",\"done\":false}\n{\"response\":\" there\",\"done\":true,\"context\":[1,2,3]}\n";
        let mut records = RecordStream::new(chunks(&[body]));

        let first = records.next_record().await.expect("first").expect("some");
        assert_eq!(first.text_fragment, "Hi");
        assert!(!first.is_final);
        assert_eq!(first.final_token, None);

        let second = records.next_record().await.expect("second").expect("some");
        assert_eq!(second.text_fragment, " there");
        assert!(second.is_final);
        assert_eq!(second.final_token, Some(vec![1, 2, 3]));

        assert!(records.next_record().await.expect("after final").is_none());
        assert!(records.next_record().await.expect("still done").is_none());
    }

    #[tokio::test]
    async fn reassembles_lines_split_across_chunks() {
        let mut records = RecordStream::new(chunks(&[
            "{\"respo",
            "nse\":\"a\",\"done\":false}\n{\"response\":\"b\",",
            "\"done\":true,\"context\":[9]}\n",
        ]));

        let mut text = String::new();
        while let Some(record) = records.next_record().await.expect("decode") {
            text.push_str(&record.text_fragment);
        }
        assert_eq!(text, "ab");
    }

    #[tokio::test]
    async fn does_not_read_past_the_final_record() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let parts = vec![
            "{\"response\":\"x\",\"done\":true,\"context\":[5]}\n".to_string(),
            "this is never decoded\n".to_string(),
        ];
        let source = stream::iter(parts)
            .map(move |part| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(part.into_bytes())
            })
            .boxed();

        let mut records = RecordStream::new(source);
        let record = records.next_record().await.expect("decode").expect("some");
        assert!(record.is_final);
        assert!(records.next_record().await.expect("fused").is_none());
        assert_eq!(pulled.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn final_record_without_trailing_newline_is_accepted() {
        let mut records = RecordStream::new(chunks(&[
            "{\"response\":\"ok\",\"done\":true,\"context\":[1]}",
        ]));
        let record = records.next_record().await.expect("decode").expect("some");
        assert!(record.is_final);
        assert_eq!(record.final_token, Some(vec![1]));
    }

    #[tokio::test]
    async fn end_of_stream_without_final_is_protocol_error() {
        let mut records = RecordStream::new(chunks(&["{\"response\":\"partial\",\"done\":false}\n"]));
        assert!(records.next_record().await.expect("first").is_some());
        let err = records.next_record().await.expect_err("missing final");
        assert!(matches!(err, TurnError::Protocol(ProtocolError::MissingFinal)));
        assert!(records.next_record().await.expect("fused").is_none());
    }

    #[tokio::test]
    async fn malformed_line_is_fatal() {
        let mut records = RecordStream::new(chunks(&[
            "{\"response\":\"a\",\"done\":false}\nnot json\n{\"response\":\"b\",\"done\":true}\n",
        ]));
        assert!(records.next_record().await.expect("first").is_some());
        let err = records.next_record().await.expect_err("malformed");
        assert!(matches!(
            err,
            TurnError::Protocol(ProtocolError::InvalidRecord { .. })
        ));
        assert!(records.next_record().await.expect("fused").is_none());
    }

    #[tokio::test]
    async fn invalid_utf8_is_fatal() {
        let source = stream::iter(vec![Ok(vec![0xff, 0xfe, b'\n'])]).boxed();
        let mut records = RecordStream::new(source);
        let err = records.next_record().await.expect_err("utf8");
        assert!(matches!(err, TurnError::Protocol(ProtocolError::InvalidUtf8)));
    }

    #[tokio::test]
    async fn server_error_record_aborts() {
        let mut records = RecordStream::new(chunks(&["{\"error\":\"out of memory\"}\n"]));
        match records.next_record().await {
            Err(TurnError::Server(message)) => assert_eq!(message, "out of memory"),
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn blank_and_crlf_lines_are_tolerated() {
        let mut records = RecordStream::new(chunks(&[
            "\r\n{\"response\":\"a\",\"done\":false}\r\n   \n{\"response\":\"\",\"done\":true}\r\n",
        ]));
        let first = records.next_record().await.expect("a").expect("some");
        assert_eq!(first.text_fragment, "a");
        let last = records.next_record().await.expect("final").expect("some");
        assert!(last.is_final);
        assert_eq!(last.final_token, None);
    }

    #[tokio::test]
    async fn transport_error_mid_stream_is_surfaced() {
        let source = stream::iter(vec![
            Ok(b"{\"response\":\"a\",\"done\":false}\n".to_vec()),
            Err(TurnError::transport("connection reset")),
        ])
        .boxed();
        let mut records = RecordStream::new(source);
        assert!(records.next_record().await.expect("a").is_some());
        let err = records.next_record().await.expect_err("reset");
        assert!(matches!(err, TurnError::Transport(_)));
    }

    #[test]
    fn non_final_context_is_dropped() {
        let record =
            decode_record(r#"{"response":"a","done":false,"context":[1]}"#).expect("decode");
        assert_eq!(record.final_token, None);
    }

    #[test]
    fn stats_only_on_final_record() {
        let record = decode_record(
            r#"{"response":"","done":true,"context":[1],"eval_count":20,"eval_duration":2000000000}"#,
        )
        .expect("decode");
        let stats = record.stats.expect("stats");
        assert_eq!(stats.eval_count, Some(20));
        assert_eq!(stats.tokens_per_second(), Some(10.0));

        let bare = decode_record(r#"{"response":"","done":true}"#).expect("decode");
        assert!(bare.stats.is_none());
    }

    #[test]
    fn line_buffer_keeps_partial_tail() {
        let mut lines = LineBuffer::new();
        lines.push(b"one\ntw");
        assert_eq!(lines.next_line(), Some(b"one".to_vec()));
        assert_eq!(lines.next_line(), None);
        lines.push(b"o\n");
        assert_eq!(lines.next_line(), Some(b"two".to_vec()));
        assert_eq!(lines.take_remainder(), None);
    }
}
