//! Incremental UTF-8 decoding of a chunked response body.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid UTF-8 sequence at byte {offset} of the response body")]
    InvalidUtf8 { offset: usize },

    #[error("response body ended inside a UTF-8 sequence ({pending} dangling bytes)")]
    Truncated { pending: usize },
}

/// Decodes a byte stream chunk by chunk.
///
/// A multi-byte character split across two chunks is held back until the
/// rest of it arrives. Anything that can never become valid UTF-8 is an
/// error; bytes are never dropped or replaced.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
    consumed: usize,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode as much of `chunk` (plus any carried-over bytes) as possible.
    pub fn push(&mut self, chunk: &[u8]) -> Result<String, DecodeError> {
        self.pending.extend_from_slice(chunk);

        match std::str::from_utf8(&self.pending) {
            Ok(text) => {
                let text = text.to_string();
                self.consumed += self.pending.len();
                self.pending.clear();
                Ok(text)
            }
            Err(e) => {
                let valid = e.valid_up_to();
                if e.error_len().is_some() {
                    return Err(DecodeError::InvalidUtf8 {
                        offset: self.consumed + valid,
                    });
                }

                // Incomplete sequence at the end: keep it for the next chunk.
                let rest = self.pending.split_off(valid);
                let text = String::from_utf8(std::mem::replace(&mut self.pending, rest))
                    .map_err(|_| DecodeError::InvalidUtf8 {
                        offset: self.consumed,
                    })?;
                self.consumed += valid;
                Ok(text)
            }
        }
    }

    /// Call once the body has ended.
    pub fn finish(self) -> Result<(), DecodeError> {
        if self.pending.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::Truncated {
                pending: self.pending.len(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_passes_through() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.push(b"Hel").unwrap(), "Hel");
        assert_eq!(decoder.push(b"lo").unwrap(), "lo");
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn test_split_multibyte_character_is_carried_over() {
        let bytes = "é🦀".as_bytes();
        let mut decoder = Utf8StreamDecoder::new();

        assert_eq!(decoder.push(&bytes[..1]).unwrap(), "");
        assert_eq!(decoder.push(&bytes[1..3]).unwrap(), "é");
        assert_eq!(decoder.push(&bytes[3..5]).unwrap(), "");
        assert_eq!(decoder.push(&bytes[5..]).unwrap(), "🦀");
        assert!(decoder.finish().is_ok());
    }

    #[test]
    fn test_invalid_bytes_fail() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.push(b"ok").unwrap(), "ok");
        assert_eq!(
            decoder.push(&[b'a', 0xff, b'b']),
            Err(DecodeError::InvalidUtf8 { offset: 3 })
        );
    }

    #[test]
    fn test_dangling_sequence_at_end_fails() {
        let mut decoder = Utf8StreamDecoder::new();
        assert_eq!(decoder.push(&"é".as_bytes()[..1]).unwrap(), "");
        assert_eq!(decoder.finish(), Err(DecodeError::Truncated { pending: 1 }));
    }
}
