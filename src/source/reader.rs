//! Line-oriented scanner over script text
//!
//! The reader only finds section boundaries. Content is never interpreted
//! here; header lines and section bodies are handed out verbatim together
//! with their original line numbers.

use std::io::{self, BufRead, Cursor};

/// One physical line of a script
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    /// 0-based line number in the source file
    pub number: usize,
    /// Line text without line terminator and trailing whitespace
    pub text: String,
}

impl ScriptLine {
    /// Check whether this line opens a new section
    pub fn is_section_marker(&self) -> bool {
        self.text.starts_with('@')
    }
}

/// Lazy sequence of [`ScriptLine`]s read from any buffered source
pub struct ScriptReader<R> {
    inner: R,
    next_number: usize,
    buf: Vec<u8>,
}

impl<R: BufRead> ScriptReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            next_number: 0,
            buf: Vec::new(),
        }
    }
}

impl<'a> ScriptReader<Cursor<&'a [u8]>> {
    /// Read lines out of an in-memory script
    pub fn from_text(text: &'a str) -> Self {
        Self::new(Cursor::new(text.as_bytes()))
    }
}

impl<R: BufRead> Iterator for ScriptReader<R> {
    type Item = io::Result<ScriptLine>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.inner.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                // Scripts are not guaranteed to be UTF-8 (legacy comments)
                let text = String::from_utf8_lossy(&self.buf);
                let line = ScriptLine {
                    number: self.next_number,
                    text: text.trim_end().to_string(),
                };
                self.next_number += 1;
                Some(Ok(line))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Text accumulated for the header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBlock {
    pub text: String,
}

impl TextBlock {
    pub(crate) fn push_line(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }
}
