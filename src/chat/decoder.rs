//! Incremental decoding of a server-sent-event body into payloads.
//!
//! The decoder is fed raw chunks exactly as they come off the wire.
//! Chunk boundaries can fall anywhere, including inside a line or a
//! multi-byte character, so both the partial line and any incomplete
//! UTF-8 sequence are carried over to the next chunk.
//!
//! Every complete `data: ` line is one payload, with trailing
//! whitespace removed. Blank lines and other fields are skipped. A
//! `data: [DONE]` line ends the stream.

use futures_util::{Stream, StreamExt};

use crate::api::public::chat::DONE;

const DATA_PREFIX: &str = "data: ";

#[derive(Debug, Default)]
pub struct StreamDecoder {
    // Trailing bytes of a multi-byte character split across chunks
    pending_bytes: Vec<u8>,
    // Text after the last line break seen so far
    buffer: String,
    done: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` sentinel has been seen. Once set, further
    /// input is ignored.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed the next chunk of the body, returning the payload of every
    /// line it completed in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut out = Vec::new();
        if self.done {
            return out;
        }

        let text = self.decode_utf8(chunk);
        self.buffer.push_str(&text);

        while let Some(end) = self.buffer.find('\n') {
            let line: String = self.buffer.drain(..=end).collect();
            let line = line.trim_end_matches('\n').trim_end_matches('\r');
            self.process_line(line, &mut out);
            if self.done {
                self.buffer.clear();
                break;
            }
        }

        out
    }

    /// Signal the end of the body. An unterminated last line is
    /// processed like a complete one.
    pub fn finish(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        if self.done {
            return out;
        }

        if !self.pending_bytes.is_empty() {
            self.pending_bytes.clear();
            self.buffer.push(char::REPLACEMENT_CHARACTER);
        }
        let line = std::mem::take(&mut self.buffer);
        self.process_line(line.trim_end_matches('\r'), &mut out);
        self.done = true;

        out
    }

    fn process_line(&mut self, line: &str, out: &mut Vec<String>) {
        if self.done || line.trim().is_empty() {
            return;
        }

        let payload = if line == "data:" {
            ""
        } else if let Some(value) = line.strip_prefix(DATA_PREFIX) {
            value.trim_end()
        } else {
            // Comments, `event:`, `id:` and `retry:` lines
            return;
        };

        if payload == DONE {
            self.done = true;
        } else {
            out.push(payload.to_string());
        }
    }

    fn decode_utf8(&mut self, chunk: &[u8]) -> String {
        let mut bytes = std::mem::take(&mut self.pending_bytes);
        bytes.extend_from_slice(chunk);

        let mut out = String::with_capacity(bytes.len());
        let mut rest = bytes.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(e) => {
                    let (valid, invalid) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &invalid[len..];
                        }
                        None => {
                            // Incomplete sequence at the end of the chunk
                            self.pending_bytes = invalid.to_vec();
                            break;
                        }
                    }
                }
            }
        }

        out
    }
}

/// Decode a body stream into its payloads, stopping at `[DONE]` or at
/// the end of the body, whichever comes first. A failed read is
/// returned as-is and ends the stream.
pub fn decode_stream<S, B, E>(source: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    async_stream::try_stream! {
        let mut decoder = StreamDecoder::new();
        futures_util::pin_mut!(source);

        while let Some(chunk) = source.next().await {
            let chunk = chunk?;
            for payload in decoder.push(chunk.as_ref()) {
                yield payload;
            }
            if decoder.is_done() {
                break;
            }
        }

        for payload in decoder.finish() {
            yield payload;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures_util::stream;

    fn decode_all(chunks: &[&[u8]]) -> Vec<String> {
        let mut decoder = StreamDecoder::new();
        let mut out = Vec::new();
        for chunk in chunks {
            out.extend(decoder.push(chunk));
        }
        out.extend(decoder.finish());
        out
    }

    #[test]
    fn test_decodes_single_line_events() {
        let body: &[u8] = b"data: Hi\n\ndata:  there\n\ndata: [DONE]\n\n";
        assert_eq!(decode_all(&[body]), vec!["Hi", " there"]);
    }

    #[test]
    fn test_any_chunking_yields_same_payloads() {
        let body: &[u8] = "data: one\n\ndata: dos\r\n\r\ndata: drei ü 日本\n\ndata: [DONE]\n\n".as_bytes();
        let expected = vec!["one", "dos", "drei ü 日本"];

        // Every split point, including inside multi-byte characters
        for split in 0..=body.len() {
            let (a, b) = body.split_at(split);
            assert_eq!(decode_all(&[a, b]), expected, "split at {}", split);
        }

        // One byte at a time
        let bytes: Vec<&[u8]> = body.chunks(1).collect();
        assert_eq!(decode_all(&bytes), expected);
    }

    #[test]
    fn test_ignores_comments_and_other_fields() {
        let body: &[u8] = b": keep-alive\n\nevent: message\nid: 7\ndata: hello\n\nretry: 10\n\n";
        assert_eq!(decode_all(&[body]), vec!["hello"]);
    }

    #[test]
    fn test_each_data_line_is_a_payload() {
        let body: &[u8] = b"data: a\ndata: b\ndata: [DONE]\ndata: late\n";
        let mut decoder = StreamDecoder::new();
        assert_eq!(decoder.push(body), vec!["a", "b"]);
        assert!(decoder.is_done());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_n_lines_then_done_yield_n_payloads() {
        let body: &[u8] = b"data: one\n\ndata: \ndata: three\r\ndata: [DONE]\n";
        assert_eq!(decode_all(&[body]), vec!["one", "", "three"]);
    }

    #[test]
    fn test_strips_trailing_whitespace_only() {
        let body: &[u8] = b"data:   padded  \t\n\n";
        assert_eq!(decode_all(&[body]), vec!["  padded"]);
    }

    #[test]
    fn test_stops_at_done() {
        let mut decoder = StreamDecoder::new();
        let out = decoder.push(b"data: a\n\ndata: [DONE]\n\ndata: late\n\n");
        assert_eq!(out, vec!["a"]);
        assert!(decoder.is_done());
        assert!(decoder.push(b"data: later\n\n").is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_end_of_body_without_done() {
        // The last event has no trailing blank line or line break
        assert_eq!(decode_all(&[b"data: a\n\ndata: b".as_slice()]), vec!["a", "b"]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        assert_eq!(decode_all(&[b"data: a\xffb\n\n".as_slice()]), vec!["a\u{FFFD}b"]);
        // Truncated sequence at the very end of the body
        assert_eq!(decode_all(&[b"data: a\xe6\x97".as_slice()]), vec!["a\u{FFFD}"]);
    }

    #[test]
    fn test_decode_stream() {
        let chunks: Vec<Result<&[u8], String>> = vec![
            Ok(b"data: He".as_slice()),
            Ok(b"llo\n\ndata: [DO".as_slice()),
            Ok(b"NE]\n\n".as_slice()),
            Err("never read".to_string()),
        ];
        let payloads: Vec<Result<String, String>> =
            block_on(decode_stream(stream::iter(chunks)).collect());
        assert_eq!(payloads, vec![Ok("Hello".to_string())]);
    }

    #[test]
    fn test_decode_stream_surfaces_read_errors() {
        let chunks: Vec<Result<&[u8], String>> = vec![
            Ok(b"data: partial\n\n".as_slice()),
            Err("connection reset".to_string()),
        ];
        let payloads: Vec<Result<String, String>> =
            block_on(decode_stream(stream::iter(chunks)).collect());
        assert_eq!(
            payloads,
            vec![Ok("partial".to_string()), Err("connection reset".to_string())]
        );
    }
}
