//! Header metadata
//!
//! The header is the text preceding the first section. It is scanned line by
//! line for `desc:`, `author:`, `tags:`, `in_pin:`, `out_pin:`, `options:`,
//! `import`, `sliderN:` and `filename:` declarations. A second pass picks up
//! `//author:` and `//tags:` comment forms for fields the first pass left
//! empty.

use serde::{Deserialize, Serialize};

use super::slider::{split_slider_line, Slider, MAX_SLIDERS};

/// Upper bound on declared input or output pins
pub const MAX_PINS: usize = 64;

/// Pin declaration state for one direction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinList {
    /// No `in_pin`/`out_pin` line at all
    #[default]
    Unspecified,
    /// Declared as `none`
    None,
    /// Explicit pin names
    Named(Vec<String>),
}

impl PinList {
    /// Number of audio channels this declaration provides
    pub fn count(&self) -> usize {
        match self {
            PinList::Named(names) => names.len(),
            _ => 0,
        }
    }

    pub fn names(&self) -> &[String] {
        match self {
            PinList::Named(names) => names,
            _ => &[],
        }
    }

    fn push(&mut self, value: &str) {
        if value.eq_ignore_ascii_case("none") {
            *self = PinList::None;
            return;
        }
        match self {
            PinList::Named(names) => names.push(value.to_string()),
            _ => *self = PinList::Named(vec![value.to_string()]),
        }
    }

    fn truncate(&mut self) {
        if let PinList::Named(names) = self {
            names.truncate(MAX_PINS);
        }
    }
}

/// Values of the `options:` line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderOptions {
    /// Name of the shared memory region (`gmem=NAME`)
    pub gmem: Option<String>,
    /// Requested VM memory size in slots (`maxmem=N`)
    pub maxmem: Option<u64>,
    pub want_all_kb: bool,
    pub no_meter: bool,
}

impl HeaderOptions {
    fn parse_into(&mut self, text: &str) {
        for token in text.split_whitespace() {
            let (key, value) = match token.split_once('=') {
                Some((key, value)) => (key, Some(value)),
                None => (token, None),
            };
            match key {
                "gmem" => self.gmem = value.filter(|v| !v.is_empty()).map(str::to_string),
                "maxmem" => self.maxmem = value.and_then(|v| v.parse::<f64>().ok()).map(|v| v.max(0.0) as u64),
                "want_all_kb" => self.want_all_kb = true,
                "no_meter" => self.no_meter = true,
                other => log::debug!("ignoring unknown option '{}'", other),
            }
        }
    }
}

/// Metadata declared by a script header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub desc: String,
    pub author: String,
    pub tags: Vec<String>,
    pub in_pins: PinList,
    pub out_pins: PinList,
    pub imports: Vec<String>,
    /// `filename:N,name` entries, index N at position N
    pub filenames: Vec<String>,
    pub options: HeaderOptions,
    /// Always `MAX_SLIDERS` entries; undeclared slots have `exists == false`
    pub sliders: Vec<Slider>,
}

impl Default for Header {
    fn default() -> Self {
        Self {
            desc: String::new(),
            author: String::new(),
            tags: Vec::new(),
            in_pins: PinList::Unspecified,
            out_pins: PinList::Unspecified,
            imports: Vec::new(),
            filenames: Vec::new(),
            options: HeaderOptions::default(),
            sliders: (0..MAX_SLIDERS as u32).map(Slider::empty).collect(),
        }
    }
}

impl Header {
    /// Parse header text
    pub fn parse(text: &str) -> Self {
        let mut header = Header::default();

        for line in text.lines() {
            header.parse_line(line.trim());
        }

        // Comment-form metadata only fills what the main pass left empty
        let mut comment_author = None;
        let mut comment_tags = None;
        for line in text.lines() {
            let line = line.trim();
            if let Some(value) = line.strip_prefix("//author:") {
                comment_author.get_or_insert_with(|| value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("//tags:") {
                comment_tags.get_or_insert_with(|| split_tags(value));
            }
        }
        if header.author.is_empty() {
            if let Some(author) = comment_author {
                header.author = author;
            }
        }
        if header.tags.is_empty() {
            if let Some(tags) = comment_tags {
                header.tags = tags;
            }
        }

        header.in_pins.truncate();
        header.out_pins.truncate();
        header
    }

    fn parse_line(&mut self, line: &str) {
        if let Some(value) = line.strip_prefix("desc:") {
            self.desc = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("author:") {
            self.author = value.trim().to_string();
        } else if let Some(value) = line.strip_prefix("tags:") {
            self.tags = split_tags(value);
        } else if let Some(value) = line.strip_prefix("in_pin:") {
            self.in_pins.push(value.trim());
        } else if let Some(value) = line.strip_prefix("out_pin:") {
            self.out_pins.push(value.trim());
        } else if let Some(value) = line.strip_prefix("options:") {
            self.options.parse_into(value);
        } else if let Some(value) = line.strip_prefix("import") {
            if value.starts_with(char::is_whitespace) && !value.trim().is_empty() {
                self.imports.push(value.trim().to_string());
            }
        } else if let Some(value) = line.strip_prefix("filename:") {
            self.parse_filename(value);
        } else if let Some((id, text)) = split_slider_line(line) {
            self.sliders[id as usize] = Slider::parse(id, text);
        }
    }

    fn parse_filename(&mut self, text: &str) {
        let Some((index, name)) = text.split_once(',') else {
            return;
        };
        match index.trim().parse::<usize>() {
            Ok(index) if index == self.filenames.len() => {
                self.filenames.push(name.trim().to_string());
            }
            _ => log::debug!("ignoring out-of-order filename entry '{}'", text),
        }
    }

    /// Substitute two generic pins per direction when a `@sample` section
    /// exists and neither direction was declared
    pub fn apply_default_pins(&mut self, has_sample: bool) {
        if has_sample
            && self.in_pins == PinList::Unspecified
            && self.out_pins == PinList::Unspecified
        {
            self.in_pins = PinList::Named(vec!["Input 1".into(), "Input 2".into()]);
            self.out_pins = PinList::Named(vec!["Output 1".into(), "Output 2".into()]);
        }
    }

    /// Self-heal the ranges of enumerated sliders, returning one warning per
    /// corrected slider
    pub fn fix_invalid_enums(&mut self) -> Vec<String> {
        self.sliders
            .iter_mut()
            .filter_map(Slider::fix_enum_range)
            .collect()
    }

    /// Iterate over declared sliders
    pub fn existing_sliders(&self) -> impl Iterator<Item = &Slider> {
        self.sliders.iter().filter(|s| s.exists)
    }
}

fn split_tags(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_metadata() {
        let header = Header::parse(
            "desc:Simple Gain\nauthor: Someone\ntags: utility gain\nimport lib/common.jsfx-inc\n",
        );
        assert_eq!(header.desc, "Simple Gain");
        assert_eq!(header.author, "Someone");
        assert_eq!(header.tags, vec!["utility", "gain"]);
        assert_eq!(header.imports, vec!["lib/common.jsfx-inc"]);
    }

    #[test]
    fn test_pins_none_is_explicit() {
        let mut header = Header::parse("in_pin:none\nout_pin:none\n");
        header.apply_default_pins(true);
        assert_eq!(header.in_pins, PinList::None);
        assert_eq!(header.in_pins.count(), 0);
        assert_eq!(header.out_pins.count(), 0);
    }

    #[test]
    fn test_pins_unspecified_default_to_stereo_with_sample() {
        let mut header = Header::parse("desc:x\n");
        header.apply_default_pins(true);
        assert_eq!(header.in_pins.count(), 2);
        assert_eq!(header.out_pins.count(), 2);

        let mut header = Header::parse("desc:x\n");
        header.apply_default_pins(false);
        assert_eq!(header.in_pins, PinList::Unspecified);
    }

    #[test]
    fn test_named_pins() {
        let header = Header::parse("in_pin:Left\nin_pin:Right\nout_pin:Mono\n");
        assert_eq!(header.in_pins.names(), ["Left", "Right"]);
        assert_eq!(header.out_pins.count(), 1);
    }

    #[test]
    fn test_pin_lists_truncated() {
        let text: String = (0..70).map(|i| format!("in_pin:p{}\n", i)).collect();
        let header = Header::parse(&text);
        assert_eq!(header.in_pins.count(), MAX_PINS);
    }

    #[test]
    fn test_options() {
        let header = Header::parse("options:gmem=shared maxmem=1000000 want_all_kb no_meter\n");
        assert_eq!(header.options.gmem.as_deref(), Some("shared"));
        assert_eq!(header.options.maxmem, Some(1_000_000));
        assert!(header.options.want_all_kb);
        assert!(header.options.no_meter);
    }

    #[test]
    fn test_filenames_must_be_contiguous() {
        let header = Header::parse("filename:0,a.wav\nfilename:2,c.wav\nfilename:1,b.wav\n");
        assert_eq!(header.filenames, vec!["a.wav", "b.wav"]);
    }

    #[test]
    fn test_comment_metadata_only_fills_gaps() {
        let header = Header::parse("//author:Commenter\n//tags:a b\ntags:real\n");
        assert_eq!(header.author, "Commenter");
        assert_eq!(header.tags, vec!["real"]);
    }

    #[test]
    fn test_sliders_in_header() {
        let header = Header::parse("slider1:0<0,1,0.1>A\nslider3:5<0,10,1>C\nslider99:0<0,1>X\n");
        let ids: Vec<u32> = header.existing_sliders().map(|s| s.id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(header.sliders.len(), MAX_SLIDERS);
    }

    #[test]
    fn test_fix_invalid_enums_reports_warnings() {
        let mut header = Header::parse("slider1:0<5,9,2{a,b,c}>Mode\nslider2:0<0,1,1{x,y}>Ok\n");
        let warnings = header.fix_invalid_enums();
        assert_eq!(warnings.len(), 1);
        assert_eq!(header.sliders[0].max, 2.0);
    }
}
