//! Effect script sources
//!
//! A script is free-form header text followed by `@init`, `@slider`,
//! `@block`, `@sample`, `@gfx [W H]` and `@serialize` sections. This module
//! splits a file into a [`SourceUnit`]; the header grammar lives in
//! [`header`], slider lines in [`slider`] and import resolution in
//! [`imports`].

pub mod header;
pub mod imports;
pub mod reader;
pub mod slider;

use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FxError, Result};

pub use header::{Header, HeaderOptions, PinList};
pub use imports::{resolve_import, FileIdentity, ImportResolver, MAX_IMPORT_DEPTH};
pub use reader::{ScriptLine, ScriptReader, TextBlock};
pub use slider::{Slider, MAX_SLIDERS};

/// Named code section of a script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionKind {
    Init,
    Slider,
    Block,
    Sample,
    Gfx,
    Serialize,
}

impl SectionKind {
    /// Singleton sections, in the order they are compiled
    pub const SINGLETONS: [SectionKind; 5] = [
        SectionKind::Slider,
        SectionKind::Block,
        SectionKind::Sample,
        SectionKind::Gfx,
        SectionKind::Serialize,
    ];

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "init" => Some(SectionKind::Init),
            "slider" => Some(SectionKind::Slider),
            "block" => Some(SectionKind::Block),
            "sample" => Some(SectionKind::Sample),
            "gfx" => Some(SectionKind::Gfx),
            "serialize" => Some(SectionKind::Serialize),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            SectionKind::Init => "init",
            SectionKind::Slider => "slider",
            SectionKind::Block => "block",
            SectionKind::Sample => "sample",
            SectionKind::Gfx => "gfx",
            SectionKind::Serialize => "serialize",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Body of one section
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub kind: SectionKind,
    /// 0-based line number of the first body line, for VM diagnostics
    pub line_offset: usize,
    pub text: String,
    /// Requested drawing surface size, `@gfx` only (0 when unspecified)
    pub width: u32,
    pub height: u32,
}

/// One parsed script file
#[derive(Debug, Clone, Default)]
pub struct SourceUnit {
    /// File the unit was read from, if any
    pub path: Option<PathBuf>,
    pub header: Header,
    pub init: Option<Section>,
    pub slider: Option<Section>,
    pub block: Option<Section>,
    pub sample: Option<Section>,
    pub gfx: Option<Section>,
    pub serialize: Option<Section>,
}

impl SourceUnit {
    /// Parse a script held in memory
    pub fn parse_str(text: &str) -> Result<Self> {
        Self::parse_lines(ScriptReader::from_text(text))
    }

    /// Parse a script from any buffered reader
    pub fn parse_reader<R: BufRead>(reader: R) -> Result<Self> {
        Self::parse_lines(ScriptReader::new(reader))
    }

    /// Open and parse the script at `path`
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| FxError::load_io(path, e))?;
        let mut unit = Self::parse_reader(BufReader::new(file)).map_err(|e| match e {
            FxError::Io(io) => FxError::load_io(path, io),
            other => other,
        })?;
        unit.path = Some(path.to_path_buf());
        Ok(unit)
    }

    fn parse_lines<R: BufRead>(reader: ScriptReader<R>) -> Result<Self> {
        let mut unit = SourceUnit::default();
        let mut header = TextBlock::default();
        let mut current: Option<Section> = None;

        for line in reader {
            let line = line?;
            if line.is_section_marker() {
                if let Some(done) = current.take() {
                    unit.store(done)?;
                }
                current = Some(parse_section_marker(&line)?);
                continue;
            }
            match current.as_mut() {
                Some(section) => {
                    section.text.push_str(&line.text);
                    section.text.push('\n');
                }
                None => header.push_line(&line.text),
            }
        }
        if let Some(done) = current.take() {
            unit.store(done)?;
        }

        unit.header = Header::parse(&header.text);
        unit.header.apply_default_pins(unit.sample.is_some());
        Ok(unit)
    }

    fn store(&mut self, section: Section) -> Result<()> {
        // the marker sits on the line before the body
        let line = section.line_offset;
        let slot = self.slot_mut(section.kind);
        if slot.is_some() {
            return Err(FxError::Parse {
                line,
                message: format!("duplicate @{} section", section.kind),
            });
        }
        *slot = Some(section);
        Ok(())
    }

    fn slot_mut(&mut self, kind: SectionKind) -> &mut Option<Section> {
        match kind {
            SectionKind::Init => &mut self.init,
            SectionKind::Slider => &mut self.slider,
            SectionKind::Block => &mut self.block,
            SectionKind::Sample => &mut self.sample,
            SectionKind::Gfx => &mut self.gfx,
            SectionKind::Serialize => &mut self.serialize,
        }
    }

    /// Look up a section by kind
    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        match kind {
            SectionKind::Init => self.init.as_ref(),
            SectionKind::Slider => self.slider.as_ref(),
            SectionKind::Block => self.block.as_ref(),
            SectionKind::Sample => self.sample.as_ref(),
            SectionKind::Gfx => self.gfx.as_ref(),
            SectionKind::Serialize => self.serialize.as_ref(),
        }
    }

    /// Directory containing the unit's file
    pub fn directory(&self) -> Option<&Path> {
        self.path.as_deref().and_then(Path::parent)
    }
}

fn parse_section_marker(line: &ScriptLine) -> Result<Section> {
    let mut words = line.text[1..].split_whitespace();
    let tag = words.next().unwrap_or("");
    let kind = SectionKind::from_tag(tag).ok_or_else(|| FxError::Parse {
        line: line.number + 1,
        message: format!("invalid section: @{}", tag),
    })?;

    let mut section = Section {
        kind,
        line_offset: line.number + 1,
        text: String::new(),
        width: 0,
        height: 0,
    };
    if kind == SectionKind::Gfx {
        section.width = words.next().and_then(parse_dimension).unwrap_or(0);
        section.height = words.next().and_then(parse_dimension).unwrap_or(0);
    }
    Ok(section)
}

fn parse_dimension(word: &str) -> Option<u32> {
    word.parse::<f64>().ok().filter(|v| *v > 0.0).map(|v| v as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = "desc:Test\nslider1:0<0,1,0.1>Gain\n\n@init\nx = 0;\n@gfx 400 300\ny = 1;\n@sample\nspl0 = spl0;\n";

    #[test]
    fn test_parse_sections_and_line_offsets() {
        let unit = SourceUnit::parse_str(SCRIPT).unwrap();

        let init = unit.init.as_ref().unwrap();
        assert_eq!(init.line_offset, 4);
        assert_eq!(init.text, "x = 0;\n");

        let gfx = unit.gfx.as_ref().unwrap();
        assert_eq!((gfx.width, gfx.height), (400, 300));
        assert_eq!(gfx.line_offset, 6);

        assert!(unit.block.is_none());
        assert_eq!(unit.header.desc, "Test");
    }

    #[test]
    fn test_section_marker_excluded_from_text() {
        let unit = SourceUnit::parse_str("@block\na=1;\n@sample\nb=2;\n").unwrap();
        assert_eq!(unit.block.unwrap().text, "a=1;\n");
        assert_eq!(unit.sample.unwrap().text, "b=2;\n");
    }

    #[test]
    fn test_unknown_section_is_parse_error() {
        let err = SourceUnit::parse_str("desc:x\n@bogus\n").unwrap_err();
        match err {
            FxError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_section_is_parse_error() {
        let err = SourceUnit::parse_str("desc:x\n@init\na=1;\n@init\n").unwrap_err();
        assert_eq!(err.to_string(), "Parse error at line 4: duplicate @init section");
    }

    #[test]
    fn test_default_pins_with_sample_section() {
        let unit = SourceUnit::parse_str("desc:x\n@sample\n").unwrap();
        assert_eq!(unit.header.in_pins.count(), 2);
        assert_eq!(unit.header.out_pins.count(), 2);
    }

    #[test]
    fn test_load_missing_file_is_load_error() {
        let err = SourceUnit::load(Path::new("/definitely/not/here.jsfx")).unwrap_err();
        assert_eq!(err.error_code(), "LOAD_ERROR");
    }
}
