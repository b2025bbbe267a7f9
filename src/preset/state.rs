//! Effect state snapshot
//!
//! Binary layout used by [`State::to_bytes`], all little endian:
//!
//! ```text
//! u32 count
//! count x (u32 index, f32 value)
//! serialize data until the end
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{FxError, Result};

/// Value of one existing slider
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateSlider {
    pub index: u32,
    pub value: f64,
}

/// Slider values plus the bytes written by `@serialize`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub sliders: Vec<StateSlider>,
    pub data: Vec<u8>,
}

impl State {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + 8 * self.sliders.len() + self.data.len());
        out.extend_from_slice(&(self.sliders.len() as u32).to_le_bytes());
        for slider in &self.sliders {
            out.extend_from_slice(&slider.index.to_le_bytes());
            out.extend_from_slice(&(slider.value as f32).to_le_bytes());
        }
        out.extend_from_slice(&self.data);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let truncated = || FxError::InvalidState {
            reason: format!("truncated at {} bytes", bytes.len()),
        };
        let word = |at: usize| -> Result<[u8; 4]> {
            bytes
                .get(at..at + 4)
                .and_then(|b| b.try_into().ok())
                .ok_or_else(truncated)
        };

        let count = u32::from_le_bytes(word(0)?) as usize;
        let data_start = count
            .checked_mul(8)
            .and_then(|n| n.checked_add(4))
            .filter(|&end| end <= bytes.len())
            .ok_or_else(truncated)?;

        let sliders = (0..count)
            .map(|i| {
                let at = 4 + 8 * i;
                Ok(StateSlider {
                    index: u32::from_le_bytes(word(at)?),
                    value: f64::from(f32::from_le_bytes(word(at + 4)?)),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(State {
            sliders,
            data: bytes[data_start..].to_vec(),
        })
    }
}
