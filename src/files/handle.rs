//! Open file variants
//!
//! Every handle understands the same small set of operations; what they
//! mean depends on the variant. Values read from raw files and the
//! serializer are little-endian `f32`. Strings are stored as a `u32` length
//! followed by the bytes.

use std::fs;
use std::path::Path;

use super::audio::{AudioInfo, AudioReader};
use crate::error::{FxError, Result};
use crate::source::slider::parse_number_prefix;

/// Direction of the serializer during `@serialize`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerializeMode {
    #[default]
    Idle,
    Read,
    Write,
}

/// In-memory stream bound to handle 0
#[derive(Debug, Default)]
pub struct Serializer {
    mode: SerializeMode,
    stream: ByteStream,
}

impl Serializer {
    /// Start a `@serialize` pass; `data` is the input in read mode
    pub fn begin(&mut self, mode: SerializeMode, data: Vec<u8>) {
        self.mode = mode;
        self.stream = ByteStream::new(data);
    }

    /// Finish the pass, returning the written bytes
    pub fn end(&mut self) -> Vec<u8> {
        self.mode = SerializeMode::Idle;
        std::mem::take(&mut self.stream).data
    }

    pub fn mode(&self) -> SerializeMode {
        self.mode
    }
}

/// Byte stream with a read position
#[derive(Debug, Default)]
pub struct ByteStream {
    data: Vec<u8>,
    pos: usize,
}

impl ByteStream {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> &[u8] {
        &self.data[self.pos..]
    }

    fn read_f32(&mut self) -> Option<f64> {
        let bytes: [u8; 4] = self.remaining().get(..4)?.try_into().ok()?;
        self.pos += 4;
        Some(f64::from(f32::from_le_bytes(bytes)))
    }

    fn read_string(&mut self) -> Option<String> {
        let len: [u8; 4] = self.remaining().get(..4)?.try_into().ok()?;
        let len = u32::from_le_bytes(len) as usize;
        let text = self.remaining().get(4..4 + len)?;
        let text = String::from_utf8_lossy(text).into_owned();
        self.pos += 4 + len;
        Some(text)
    }

    fn avail_values(&self) -> u64 {
        (self.remaining().len() / 4) as u64
    }
}

/// Whitespace/comma separated numeric tokens
#[derive(Debug, Default)]
pub struct TextStream {
    lines: Vec<String>,
    line: usize,
    pending: Vec<String>,
}

impl TextStream {
    pub fn new(text: &str) -> Self {
        Self {
            lines: text.lines().map(str::to_string).collect(),
            line: 0,
            pending: Vec::new(),
        }
    }

    fn tokens(line: &str) -> Vec<String> {
        let content = line.split('/').next().unwrap_or("");
        content
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|t| !t.is_empty())
            .rev()
            .map(str::to_string)
            .collect()
    }

    fn next_token(&mut self) -> Option<String> {
        while self.pending.is_empty() {
            let line = self.lines.get(self.line)?;
            self.pending = Self::tokens(line);
            self.line += 1;
        }
        self.pending.pop()
    }

    fn next_line(&mut self) -> Option<String> {
        self.pending.clear();
        let line = self.lines.get(self.line)?.clone();
        self.line += 1;
        Some(line)
    }

    fn avail(&self) -> u64 {
        let rest: usize = self.lines[self.line.min(self.lines.len())..]
            .iter()
            .map(|l| Self::tokens(l).len())
            .sum();
        (self.pending.len() + rest) as u64
    }

    fn rewind(&mut self) {
        self.line = 0;
        self.pending.clear();
    }
}

/// One entry of the file table
pub enum FileHandle {
    Raw(ByteStream),
    Text(TextStream),
    Audio(Box<dyn AudioReader>),
    Serializer(Serializer),
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileHandle::Raw(s) => f.debug_tuple("Raw").field(s).finish(),
            FileHandle::Text(s) => f.debug_tuple("Text").field(s).finish(),
            FileHandle::Audio(r) => f.debug_tuple("Audio").field(&r.info()).finish(),
            FileHandle::Serializer(s) => f.debug_tuple("Serializer").field(s).finish(),
        }
    }
}

impl FileHandle {
    pub fn open_raw(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|e| FxError::load_io(path, e))?;
        Ok(FileHandle::Raw(ByteStream::new(data)))
    }

    pub fn open_text(path: &Path) -> Result<Self> {
        let data = fs::read(path).map_err(|e| FxError::load_io(path, e))?;
        Ok(FileHandle::Text(TextStream::new(&String::from_utf8_lossy(&data))))
    }

    /// Values left to read; `-1` for a serializer in write mode
    pub fn avail(&self) -> f64 {
        match self {
            FileHandle::Raw(s) => s.avail_values() as f64,
            FileHandle::Text(s) => s.avail() as f64,
            FileHandle::Audio(r) => r.avail() as f64,
            FileHandle::Serializer(s) => match s.mode {
                SerializeMode::Write => -1.0,
                SerializeMode::Read => s.stream.avail_values() as f64,
                SerializeMode::Idle => 0.0,
            },
        }
    }

    pub fn rewind(&mut self) {
        match self {
            FileHandle::Raw(s) => s.pos = 0,
            FileHandle::Text(s) => s.rewind(),
            FileHandle::Audio(r) => r.rewind(),
            FileHandle::Serializer(s) => {
                if s.mode == SerializeMode::Read {
                    s.stream.pos = 0;
                }
            }
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, FileHandle::Text(_))
    }

    pub fn is_writing(&self) -> bool {
        matches!(self, FileHandle::Serializer(s) if s.mode == SerializeMode::Write)
    }

    /// Channel count and rate of an audio stream
    pub fn riff(&self) -> Option<AudioInfo> {
        match self {
            FileHandle::Audio(r) => Some(r.info()),
            _ => None,
        }
    }

    /// Read the next value
    pub fn read_value(&mut self) -> Option<f64> {
        match self {
            FileHandle::Raw(s) => s.read_f32(),
            FileHandle::Text(s) => s.next_token().map(|t| parse_number_prefix(&t).0),
            FileHandle::Audio(r) => {
                let mut out = [0.0];
                (r.read(&mut out) == 1).then_some(out[0])
            }
            FileHandle::Serializer(s) if s.mode == SerializeMode::Read => s.stream.read_f32(),
            FileHandle::Serializer(_) => None,
        }
    }

    /// Read up to `out.len()` values, returning the count read
    pub fn read_values(&mut self, out: &mut [f64]) -> usize {
        if let FileHandle::Audio(r) = self {
            return r.read(out);
        }
        let mut count = 0;
        for slot in out.iter_mut() {
            match self.read_value() {
                Some(value) => *slot = value,
                None => break,
            }
            count += 1;
        }
        count
    }

    /// Append a value; only a serializer in write mode accepts writes
    pub fn write_value(&mut self, value: f64) -> bool {
        match self {
            FileHandle::Serializer(s) if s.mode == SerializeMode::Write => {
                s.stream.data.extend_from_slice(&(value as f32).to_le_bytes());
                true
            }
            _ => false,
        }
    }

    pub fn read_string(&mut self) -> Option<String> {
        match self {
            FileHandle::Raw(s) => s.read_string(),
            FileHandle::Text(s) => s.next_line(),
            FileHandle::Audio(_) => None,
            FileHandle::Serializer(s) if s.mode == SerializeMode::Read => s.stream.read_string(),
            FileHandle::Serializer(_) => None,
        }
    }

    pub fn write_string(&mut self, text: &str) -> bool {
        match self {
            FileHandle::Serializer(s) if s.mode == SerializeMode::Write => {
                s.stream.data.extend_from_slice(&(text.len() as u32).to_le_bytes());
                s.stream.data.extend_from_slice(text.as_bytes());
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_tokens_and_comments() {
        let mut file = FileHandle::Text(TextStream::new("1, 2 3 // three values\n\n4.5/ trailing\nhello world\n"));
        assert!(file.is_text());
        assert_eq!(file.avail(), 6.0);
        assert_eq!(file.read_value(), Some(1.0));
        assert_eq!(file.read_value(), Some(2.0));
        assert_eq!(file.avail(), 4.0);
        assert_eq!(file.read_value(), Some(3.0));
        assert_eq!(file.read_value(), Some(4.5));
        assert_eq!(file.read_string().as_deref(), Some("hello world"));
        assert_eq!(file.read_value(), None);

        file.rewind();
        assert_eq!(file.read_value(), Some(1.0));
    }

    #[test]
    fn test_raw_values() {
        let mut bytes = Vec::new();
        for v in [0.5f32, -2.0, 8.0] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        bytes.push(0xAA);
        let mut file = FileHandle::Raw(ByteStream::new(bytes));
        assert_eq!(file.avail(), 3.0);

        let mut out = [0.0; 5];
        assert_eq!(file.read_values(&mut out), 3);
        assert_eq!(&out[..3], &[0.5, -2.0, 8.0]);
        assert!(!file.write_value(1.0));
    }

    #[test]
    fn test_serializer_write_then_read() {
        let mut file = FileHandle::Serializer(Serializer::default());
        assert_eq!(file.avail(), 0.0);

        if let FileHandle::Serializer(s) = &mut file {
            s.begin(SerializeMode::Write, Vec::new());
        }
        assert!(file.is_writing());
        assert_eq!(file.avail(), -1.0);
        assert!(file.write_value(1.25));
        assert!(file.write_string("abc"));
        let data = match &mut file {
            FileHandle::Serializer(s) => s.end(),
            _ => unreachable!(),
        };
        assert_eq!(data.len(), 4 + 4 + 3);

        if let FileHandle::Serializer(s) = &mut file {
            s.begin(SerializeMode::Read, data);
        }
        assert_eq!(file.read_value(), Some(1.25));
        assert_eq!(file.read_string().as_deref(), Some("abc"));
        assert_eq!(file.read_value(), None);
        assert!(!file.write_value(2.0));
    }
}
