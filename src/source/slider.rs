//! Slider declarations
//!
//! Grammar of the text following `sliderN:`:
//!
//! ```text
//! [name=]default[<min,max[,inc[{name,name,...}]]>][-]description
//! [name=]/path:default:[-]description
//! ```

use serde::{Deserialize, Serialize};

/// Number of slider slots a script can declare
pub const MAX_SLIDERS: usize = 64;

/// One adjustable parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slider {
    /// 0-based slot (`slider1` is id 0)
    pub id: u32,
    pub exists: bool,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub inc: f64,
    /// Variable bound to this slider
    pub var: String,
    pub is_enum: bool,
    pub enum_names: Vec<String>,
    /// Directory of a path slider, empty otherwise
    pub path: String,
    pub desc: String,
    pub initially_visible: bool,
}

impl Slider {
    /// Create a placeholder for an undeclared slot
    pub fn empty(id: u32) -> Self {
        Self {
            id,
            exists: false,
            default: 0.0,
            min: 0.0,
            max: 1.0,
            inc: 0.0,
            var: default_var_name(id),
            is_enum: false,
            enum_names: Vec::new(),
            path: String::new(),
            desc: String::new(),
            initially_visible: false,
        }
    }

    /// Parse the text following `sliderN:` into slot `id`
    pub fn parse(id: u32, text: &str) -> Self {
        let mut slider = Slider::empty(id);
        slider.exists = true;
        slider.initially_visible = true;

        let mut rest = text.trim_start();
        if let Some((name, after)) = split_var_name(rest) {
            slider.var = name.to_string();
            rest = after.trim_start();
        }

        if let Some(path_form) = rest.strip_prefix('/') {
            // /path:default:description
            let mut parts = path_form.splitn(3, ':');
            slider.path = parts.next().unwrap_or("").trim().to_string();
            slider.default = parse_number_prefix(parts.next().unwrap_or("").trim()).0;
            slider.inc = 1.0;
            slider.min = 0.0;
            slider.max = 0.0;
            slider.is_enum = true;
            slider.set_description(parts.next().unwrap_or(""));
            return slider;
        }

        let (default, after_default) = parse_number_prefix(rest);
        slider.default = default;
        rest = after_default.trim_start();

        if let Some(range_text) = rest.strip_prefix('<') {
            let (range, after_range) = match range_text.find('>') {
                Some(end) => (&range_text[..end], &range_text[end + 1..]),
                None => (range_text, ""),
            };
            slider.apply_range(range);
            rest = after_range;
        }

        slider.set_description(rest);
        slider
    }

    fn apply_range(&mut self, range: &str) {
        let (numbers, names) = match range.find('{') {
            Some(open) => {
                let inner = &range[open + 1..];
                let inner = inner.find('}').map_or(inner, |close| &inner[..close]);
                (&range[..open], Some(inner))
            }
            None => (range, None),
        };

        let mut values = numbers
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(|v| parse_number_prefix(v).0);
        self.min = values.next().unwrap_or(0.0);
        self.max = values.next().unwrap_or(self.max);
        self.inc = values.next().unwrap_or(0.0);

        if let Some(names) = names {
            self.is_enum = true;
            self.enum_names = names.split(',').map(|n| n.trim().to_string()).collect();
        }
    }

    fn set_description(&mut self, text: &str) {
        let mut desc = text.trim();
        if let Some(hidden) = desc.strip_prefix('-') {
            self.initially_visible = false;
            desc = hidden.trim();
        }
        self.desc = desc.to_string();
    }

    /// Correct the range of an enumerated slider to `<0, N-1, 1>`
    ///
    /// Returns a warning describing the correction, if one was made. An
    /// enumeration without names always warns.
    pub fn fix_enum_range(&mut self) -> Option<String> {
        if !self.exists || !self.is_enum {
            return None;
        }
        let count = self.enum_names.len();
        let max = count.max(1) as f64 - 1.0;
        if count > 0 && self.min == 0.0 && self.max == max && self.inc == 1.0 {
            return None;
        }

        let warning = if count == 0 {
            format!("slider{}: enumeration has no names", self.id + 1)
        } else {
            format!(
                "slider{}: enumeration range <{},{},{}> corrected to <0,{},1>",
                self.id + 1,
                self.min,
                self.max,
                self.inc,
                max
            )
        };
        self.min = 0.0;
        self.max = max;
        self.inc = 1.0;
        Some(warning)
    }

    /// Path sliders take their names from a directory listing
    pub fn is_path(&self) -> bool {
        !self.path.is_empty()
    }
}

/// Name of the built-in variable bound to slot `id`
pub fn default_var_name(id: u32) -> String {
    format!("slider{}", id + 1)
}

/// Split a `sliderN:` line into slot id and declaration text
///
/// Returns `None` for non-slider lines and for slots outside `1..=64`.
pub fn split_slider_line(line: &str) -> Option<(u32, &str)> {
    let rest = line.strip_prefix("slider")?;
    let colon = rest.find(':')?;
    let digits = &rest[..colon];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number: u32 = digits.parse().ok()?;
    if number == 0 || number as usize > MAX_SLIDERS {
        return None;
    }
    Some((number - 1, &rest[colon + 1..]))
}

fn split_var_name(text: &str) -> Option<(&str, &str)> {
    let first = text.chars().next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    let end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '.'))
        .unwrap_or(text.len());
    let after = text[end..].strip_prefix('=')?;
    Some((&text[..end], after))
}

/// Parse the longest numeric prefix of `text`, like C `strtod`
///
/// Returns 0 and the untouched text when no number is present.
pub fn parse_number_prefix(text: &str) -> (f64, &str) {
    let bytes = text.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let digits_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end == digits_start || &text[digits_start..end] == "." {
        return (0.0, text);
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        let exp_digits = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits {
            end = exp_end;
        }
    }
    match text[..end].parse::<f64>() {
        Ok(value) => (value, &text[end..]),
        Err(_) => (0.0, text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_slider_with_range() {
        let (id, text) = split_slider_line("slider1:freq=440<20,20000,1>Frequency").unwrap();
        let slider = Slider::parse(id, text);

        assert_eq!(slider.id, 0);
        assert!(slider.exists);
        assert_eq!(slider.var, "freq");
        assert_eq!(slider.default, 440.0);
        assert_eq!(slider.min, 20.0);
        assert_eq!(slider.max, 20000.0);
        assert_eq!(slider.inc, 1.0);
        assert_eq!(slider.desc, "Frequency");
        assert!(!slider.is_enum);
        assert!(slider.initially_visible);
    }

    #[test]
    fn test_unnamed_slider_uses_default_var() {
        let slider = Slider::parse(4, "0.5<0,1,0.01>Mix");
        assert_eq!(slider.var, "slider5");
        assert_eq!(slider.default, 0.5);
    }

    #[test]
    fn test_enum_slider_names() {
        let slider = Slider::parse(0, "1<0,2,1{Low,Mid,High}>Band");
        assert!(slider.is_enum);
        assert_eq!(slider.enum_names, vec!["Low", "Mid", "High"]);
        assert_eq!(slider.desc, "Band");
    }

    #[test]
    fn test_enum_range_self_heals() {
        let mut slider = Slider::parse(0, "0<5,9,2{a,b,c}>Mode");
        let warning = slider.fix_enum_range();

        assert!(warning.is_some());
        assert_eq!((slider.min, slider.max, slider.inc), (0.0, 2.0, 1.0));
        assert!(slider.fix_enum_range().is_none());
    }

    #[test]
    fn test_empty_path_slider_warns() {
        let mut slider = Slider::parse(0, "/empty_dir:0:Model");
        assert!(slider.enum_names.is_empty());
        assert_eq!((slider.min, slider.max, slider.inc), (0.0, 0.0, 1.0));

        let warning = slider.fix_enum_range();
        assert_eq!(warning.as_deref(), Some("slider1: enumeration has no names"));
        assert_eq!((slider.min, slider.max, slider.inc), (0.0, 0.0, 1.0));
    }

    #[test]
    fn test_hidden_slider() {
        let slider = Slider::parse(2, "0<0,1,1>-Secret");
        assert!(!slider.initially_visible);
        assert_eq!(slider.desc, "Secret");
    }

    #[test]
    fn test_path_slider() {
        let slider = Slider::parse(0, "model=/amp_models:2:Model");
        assert_eq!(slider.var, "model");
        assert_eq!(slider.path, "amp_models");
        assert_eq!(slider.default, 2.0);
        assert_eq!(slider.inc, 1.0);
        assert!(slider.is_enum);
        assert_eq!(slider.desc, "Model");
    }

    #[test]
    fn test_missing_range_is_tolerated() {
        let slider = Slider::parse(0, "3 Plain");
        assert_eq!(slider.default, 3.0);
        assert_eq!(slider.desc, "Plain");
        assert_eq!((slider.min, slider.max, slider.inc), (0.0, 1.0, 0.0));
    }

    #[test]
    fn test_unterminated_range_is_tolerated() {
        let slider = Slider::parse(0, "1<0,10,1");
        assert_eq!((slider.min, slider.max, slider.inc), (0.0, 10.0, 1.0));
        assert!(slider.desc.is_empty());
    }

    #[test]
    fn test_slider_line_bounds() {
        assert!(split_slider_line("slider64:0<0,1>x").is_some());
        assert!(split_slider_line("slider65:0<0,1>x").is_none());
        assert!(split_slider_line("slider0:0<0,1>x").is_none());
        assert!(split_slider_line("sliderx:0").is_none());
    }

    #[test]
    fn test_parse_number_prefix() {
        assert_eq!(parse_number_prefix("1.5e3rest"), (1500.0, "rest"));
        assert_eq!(parse_number_prefix("-2<"), (-2.0, "<"));
        assert_eq!(parse_number_prefix("abc"), (0.0, "abc"));
        assert_eq!(parse_number_prefix(".25"), (0.25, ""));
        assert_eq!(parse_number_prefix("3e"), (3.0, "e"));
    }
}
