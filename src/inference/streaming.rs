//! Streaming primitives
//!
//! Token text crosses the worker-thread boundary as raw bytes, and a single
//! multi-byte character is routinely split across token boundaries (the norm
//! for Japanese output). `TokenDecoder` buffers bytes until they form valid
//! UTF-8 so consumers only ever see complete characters.

use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

/// A single event in a generation stream
#[derive(Debug, Clone, PartialEq)]
pub enum StreamToken {
    /// A piece of generated text
    Token(String),
    /// Generation finished normally
    Done,
    /// Generation failed mid-stream
    Error(String),
}

/// Incremental UTF-8 decoder for streamed token bytes
#[derive(Debug, Default)]
pub struct TokenDecoder {
    buffer: Vec<u8>,
}

impl TokenDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed token bytes, returning all text decodable so far
    ///
    /// An incomplete trailing sequence stays buffered until later bytes
    /// complete it. Genuinely invalid bytes are replaced with U+FFFD so the
    /// stream never stalls on them.
    pub fn push(&mut self, bytes: &[u8]) -> Option<String> {
        self.buffer.extend_from_slice(bytes);

        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.buffer) {
                Ok(s) => {
                    out.push_str(s);
                    self.buffer.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.buffer[..valid]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.buffer.drain(..valid + bad);
                        }
                        None => {
                            self.buffer.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }

        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }

    /// Drain the buffer at end of stream
    ///
    /// A trailing incomplete sequence cannot become text anymore and is
    /// dropped.
    pub fn flush(&mut self) -> Option<String> {
        let bytes = std::mem::take(&mut self.buffer);
        match String::from_utf8(bytes) {
            Ok(s) if !s.is_empty() => Some(s),
            _ => None,
        }
    }
}

/// Wait for one value on a std receiver without blocking the async runtime
///
/// Returns None once the sending side is gone.
pub async fn recv_async<T>(rx: &Receiver<T>) -> Option<T> {
    loop {
        match rx.try_recv() {
            Ok(value) => return Some(value),
            Err(TryRecvError::Empty) => tokio::time::sleep(Duration::from_millis(10)).await,
            Err(TryRecvError::Disconnected) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        let mut decoder = TokenDecoder::new();
        assert_eq!(decoder.push(b"Hello"), Some("Hello".to_string()));
        assert_eq!(decoder.flush(), None);
    }

    #[test]
    fn test_multibyte_char_split_across_tokens() {
        // 日 is E6 97 A5; feed it one byte at a time
        let mut decoder = TokenDecoder::new();
        assert_eq!(decoder.push(&[0xE6]), None);
        assert_eq!(decoder.push(&[0x97]), None);
        assert_eq!(decoder.push(&[0xA5]), Some("日".to_string()));
    }

    #[test]
    fn test_complete_prefix_emitted_before_incomplete_suffix() {
        let mut decoder = TokenDecoder::new();
        // "Hi " followed by the first two bytes of 日
        assert_eq!(decoder.push(b"Hi \xE6\x97"), Some("Hi ".to_string()));
        assert_eq!(decoder.push(b"\xA5!"), Some("日!".to_string()));
    }

    #[test]
    fn test_japanese_text_reassembles() {
        let text = "日本語のテキスト";
        let bytes = text.as_bytes();
        let mut decoder = TokenDecoder::new();
        let mut out = String::new();
        // Feed in awkward 2-byte slices so every character is split somewhere
        for chunk in bytes.chunks(2) {
            if let Some(piece) = decoder.push(chunk) {
                out.push_str(&piece);
            }
        }
        if let Some(piece) = decoder.flush() {
            out.push_str(&piece);
        }
        assert_eq!(out, text);
    }

    #[test]
    fn test_invalid_byte_does_not_stall_the_stream() {
        let mut decoder = TokenDecoder::new();
        // 0xFF can never start a UTF-8 sequence
        let out = decoder.push(b"a\xFFb").expect("should produce text");
        assert_eq!(out, "a\u{FFFD}b");
        assert_eq!(decoder.push(b"c"), Some("c".to_string()));
    }

    #[test]
    fn test_flush_drops_trailing_incomplete_sequence() {
        let mut decoder = TokenDecoder::new();
        assert_eq!(decoder.push(&[0xE6, 0x97]), None);
        assert_eq!(decoder.flush(), None);
        // Decoder is reusable afterwards
        assert_eq!(decoder.push(b"ok"), Some("ok".to_string()));
    }
}
