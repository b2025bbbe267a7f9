//! Preset banks in the `.rpl` text format
//!
//! ```text
//! <REAPER_PRESET_LIBRARY `JS: My Effect`
//!   <PRESET `Bright`
//!     MC41IC0gLSAt...
//!   >
//! >
//! ```
//!
//! Each preset body is base64. Decoded, it holds up to 64 whitespace
//! separated slider tokens (`-` for an absent slider), a NUL byte, then the
//! `@serialize` data.

use std::fs;
use std::path::Path;

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use serde::{Deserialize, Serialize};

use super::state::{State, StateSlider};
use crate::error::{FxError, Result};
use crate::source::MAX_SLIDERS;

/// Width of the base64 lines written by [`Bank::to_rpl`]
const RPL_LINE_WIDTH: usize = 128;

const DECODER: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub name: String,
    pub state: State,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bank {
    pub name: String,
    pub presets: Vec<Preset>,
}

impl Bank {
    pub fn find(&self, name: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.name == name)
    }

    /// Render the bank in `.rpl` form
    pub fn to_rpl(&self) -> String {
        let mut out = format!("<REAPER_PRESET_LIBRARY {}\n", quote(&self.name));
        for preset in &self.presets {
            out.push_str(&format!("  <PRESET {}\n", quote(&preset.name)));
            let encoded = STANDARD.encode(preset_blob(&preset.state));
            for line in encoded.as_bytes().chunks(RPL_LINE_WIDTH) {
                out.push_str("    ");
                out.push_str(&String::from_utf8_lossy(line));
                out.push('\n');
            }
            out.push_str("  >\n");
        }
        out.push_str(">\n");
        out
    }
}

/// Read and parse the bank at `path`
pub fn load_bank(path: &Path) -> Result<Bank> {
    let text = fs::read(path).map_err(|e| FxError::load_io(path, e))?;
    let bank = parse_bank(&String::from_utf8_lossy(&text))?;
    log::debug!("loaded bank '{}' with {} preset(s)", bank.name, bank.presets.len());
    Ok(bank)
}

/// Parse bank text
pub fn parse_bank(text: &str) -> Result<Bank> {
    let invalid = |reason: &str| FxError::InvalidBank {
        reason: reason.to_string(),
    };
    let tokens = tokenize(&text.replace(['\r', '\n'], " "));
    let mut tokens = tokens.iter().map(String::as_str);

    match tokens.next() {
        Some(t) if t.starts_with('<') => {}
        _ => return Err(invalid("missing library header")),
    }
    let mut bank = Bank {
        name: tokens.next().unwrap_or_default().to_string(),
        presets: Vec::new(),
    };

    loop {
        match tokens.next() {
            Some(">") | None => break,
            Some("<PRESET") => {
                let name = tokens.next().ok_or_else(|| invalid("unnamed preset"))?;
                let mut encoded = String::new();
                for chunk in tokens.by_ref() {
                    if chunk == ">" {
                        break;
                    }
                    encoded.push_str(chunk);
                }
                let blob = DECODER
                    .decode(encoded.as_bytes())
                    .map_err(|e| invalid(&format!("preset '{}': {}", name, e)))?;
                bank.presets.push(Preset {
                    name: name.to_string(),
                    state: parse_preset_blob(&blob),
                });
            }
            Some(t) if t.starts_with('<') => skip_block(&mut tokens),
            Some(_) => {}
        }
    }
    Ok(bank)
}

fn skip_block<'a>(tokens: &mut impl Iterator<Item = &'a str>) {
    let mut depth = 1;
    for token in tokens {
        if token.starts_with('<') {
            depth += 1;
        } else if token == ">" {
            depth -= 1;
            if depth == 0 {
                return;
            }
        }
    }
}

/// Split on whitespace; a token starting with a quote runs to the matching quote
fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut chars = text.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        let mut token = String::new();
        if matches!(c, '"' | '\'' | '`') {
            chars.next();
            for ch in chars.by_ref() {
                if ch == c {
                    break;
                }
                token.push(ch);
            }
        } else {
            while let Some(&ch) = chars.peek() {
                if ch.is_whitespace() {
                    break;
                }
                token.push(ch);
                chars.next();
            }
        }
        tokens.push(token);
    }
    tokens
}

fn quote(name: &str) -> String {
    let q = ['`', '"', '\''].into_iter().find(|q| !name.contains(*q)).unwrap_or('`');
    format!("{q}{name}{q}")
}

/// Split a decoded preset into slider values and serialize data
fn parse_preset_blob(blob: &[u8]) -> State {
    let (text, data) = match blob.iter().position(|&b| b == 0) {
        Some(nul) => (&blob[..nul], blob[nul + 1..].to_vec()),
        None => (blob, Vec::new()),
    };
    let text = String::from_utf8_lossy(text);
    let sliders = text
        .split_whitespace()
        .take(MAX_SLIDERS)
        .enumerate()
        .filter(|(_, token)| *token != "-")
        .filter_map(|(i, token)| {
            token.parse::<f64>().ok().map(|value| StateSlider {
                index: i as u32,
                value,
            })
        })
        .collect();
    State { sliders, data }
}

fn preset_blob(state: &State) -> Vec<u8> {
    let mut slots = vec!["-".to_string(); MAX_SLIDERS];
    for slider in &state.sliders {
        if let Some(slot) = slots.get_mut(slider.index as usize) {
            *slot = slider.value.to_string();
        }
    }
    let mut blob = slots.join(" ").into_bytes();
    blob.push(0);
    blob.extend_from_slice(&state.data);
    blob
}
