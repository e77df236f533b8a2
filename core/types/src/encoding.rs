// meridian/core/types/src/encoding.rs

//! Canonical byte notation used for hashing and signing.
//!
//! Every value is written as a 4-byte big-endian length followed by its
//! bytes, and slices are written as an element count followed by each
//! element. Writes only ever append, so a notation extended with more fields
//! keeps the shorter notation as an exact prefix.

/// Append-only canonical writer.
#[derive(Debug, Default, Clone)]
pub struct Notation {
    buf: Vec<u8>,
}

impl Notation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_i64(&mut self, value: i64) {
        self.write_bytes(&value.to_be_bytes());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.write_len(bytes.len());
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_string(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    pub fn write_string_slice<S: AsRef<str>>(&mut self, items: &[S]) {
        self.write_len(items.len());
        for item in items {
            self.write_string(item.as_ref());
        }
    }

    pub fn write_bytes_slice<B: AsRef<[u8]>>(&mut self, items: &[B]) {
        self.write_len(items.len());
        for item in items {
            self.write_bytes(item.as_ref());
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    fn write_len(&mut self, len: usize) {
        // Lengths beyond u32 cannot occur for consensus payloads.
        self.buf.extend_from_slice(&(len as u32).to_be_bytes());
    }
}
