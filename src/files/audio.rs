//! Audio file capability
//!
//! Scripts read audio files through [`AudioFormat`] implementations
//! injected via [`crate::Config`]. The bundled [`WavFormat`] decodes WAV
//! files with `hound`.

use std::fmt;
use std::path::Path;

use hound::{SampleFormat, WavReader};

use crate::error::{FxError, Result};

/// Stream properties reported by `file_riff`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioInfo {
    pub channels: u32,
    pub sample_rate: f64,
}

/// An open audio stream, read as interleaved samples
pub trait AudioReader: Send {
    fn info(&self) -> AudioInfo;

    /// Number of interleaved samples left to read
    fn avail(&self) -> u64;

    fn rewind(&mut self);

    /// Read interleaved samples into `out`, returning how many were read
    fn read(&mut self, out: &mut [f64]) -> usize;
}

/// A readable audio file format
pub trait AudioFormat: Send + Sync {
    /// Check whether `path` looks like a file of this format
    fn can_handle(&self, path: &Path) -> bool;

    fn open(&self, path: &Path) -> Result<Box<dyn AudioReader>>;
}

impl fmt::Debug for dyn AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AudioFormat")
    }
}

/// WAV reader backed by `hound`
#[derive(Debug, Clone, Copy, Default)]
pub struct WavFormat;

impl AudioFormat for WavFormat {
    fn can_handle(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
    }

    fn open(&self, path: &Path) -> Result<Box<dyn AudioReader>> {
        let reader = WavReader::open(path)
            .map_err(|e| FxError::load(path, format!("failed to open WAV file: {}", e)))?;
        let spec = reader.spec();
        let info = AudioInfo {
            channels: u32::from(spec.channels),
            sample_rate: f64::from(spec.sample_rate),
        };
        let samples = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)
            .map_err(|reason| FxError::load(path, reason))?;
        Ok(Box::new(WavStream {
            info,
            samples,
            pos: 0,
        }))
    }
}

/// Fully decoded WAV file
struct WavStream {
    info: AudioInfo,
    samples: Vec<f32>,
    pos: usize,
}

impl AudioReader for WavStream {
    fn info(&self) -> AudioInfo {
        self.info
    }

    fn avail(&self) -> u64 {
        (self.samples.len() - self.pos) as u64
    }

    fn rewind(&mut self) {
        self.pos = 0;
    }

    fn read(&mut self, out: &mut [f64]) -> usize {
        let rest = &self.samples[self.pos..];
        let count = out.len().min(rest.len());
        for (dst, src) in out.iter_mut().zip(&rest[..count]) {
            *dst = f64::from(*src);
        }
        self.pos += count;
        count
    }
}

/// Read every sample from a WAV reader, normalized to [-1, 1]
pub fn read_samples_as_f32<R: std::io::Read>(
    mut reader: WavReader<R>,
    bits_per_sample: u16,
    sample_format: SampleFormat,
) -> std::result::Result<Vec<f32>, String> {
    match sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<Vec<f32>, _>>()
            .map_err(|e| format!("failed to read float samples: {}", e)),
        SampleFormat::Int => {
            let scale = match bits_per_sample {
                8 => 128.0,
                16 => 32768.0,
                24 => 8388608.0,
                32 => 2147483648.0,
                other => return Err(format!("{}-bit integer audio is not supported", other)),
            };
            // hound widens every integer depth to i32
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<Vec<f32>, _>>()
                .map_err(|e| format!("failed to read {}-bit samples: {}", bits_per_sample, e))
        }
    }
}
