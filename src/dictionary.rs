use crate::error::{DecodeError, Result};
use crate::stream::ByteCursor;

pub const NEW_ENTRY: i32 = -1;

/// Back-reference string table for record and tag names.
///
/// Every token in a game record is an `i32`. [`NEW_ENTRY`] is followed by a C string
/// which gets the next free index; any other value refers to a string defined earlier
/// in the same stream.
#[derive(Debug, Default)]
pub struct Dictionary {
    entries: Vec<String>,
    peeked: Option<String>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.entries.get(index).map(String::as_str)
    }

    /// Returns the next token, or `None` once the stream is exhausted.
    pub fn read(&mut self, cursor: &mut ByteCursor) -> Result<Option<String>> {
        if let Some(peeked) = self.peeked.take() {
            return Ok(Some(peeked));
        }

        if cursor.remaining() < 4 {
            return Ok(None);
        }

        let offset = cursor.position();
        let index = cursor.read_i32()?;
        if index == NEW_ENTRY {
            let value = cursor.read_cstring()?;
            self.entries.push(value.clone());
            return Ok(Some(value));
        }

        usize::try_from(index)
            .ok()
            .and_then(|i| self.get(i))
            .map(|value| Some(value.to_string()))
            .ok_or(DecodeError::DictionaryCorruption { index, offset })
    }

    /// Like [`Dictionary::read`], but the stream must not end here.
    pub fn expect(&mut self, cursor: &mut ByteCursor) -> Result<String> {
        let offset = cursor.position();
        self.read(cursor)?.ok_or(DecodeError::TruncatedStream(offset))
    }

    pub fn peek_equals(&mut self, cursor: &mut ByteCursor, expected: &str) -> Result<bool> {
        if self.peeked.is_none() {
            self.peeked = self.read(cursor)?;
        }

        if self.peeked.as_deref() == Some(expected) {
            self.peeked = None;
            return Ok(true);
        }

        Ok(false)
    }
}
