//! CLI Command Implementations
//!
//! Implements the actual logic for each CLI command.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use log::info;
use serde_json::json;

use crate::config::{CompileOptions, Config, LoadOptions};
use crate::engine::Effect;
use crate::files::audio::read_samples_as_f32;
use crate::preset::load_bank;
use crate::vm::mini::MiniVm;

/// Print script metadata.
pub fn show_info(script: &Path, no_imports: bool) -> Result<()> {
    info!("Inspecting script: {}", script.display());

    let options = if no_imports {
        LoadOptions::IGNORE_IMPORTS
    } else {
        LoadOptions::NONE
    };
    let mut fx = Effect::new(Config::default(), Box::new(MiniVm::new()));
    fx.load(script, options)
        .with_context(|| format!("failed to load {}", script.display()))?;
    let header = fx.header().ok_or_else(|| anyhow!("no header after load"))?;

    let sliders: Vec<_> = header.existing_sliders().collect();
    let report = json!({
        "desc": header.desc,
        "author": header.author,
        "tags": header.tags,
        "inputs": header.in_pins.names(),
        "outputs": header.out_pins.names(),
        "imports": header.imports,
        "filenames": header.filenames,
        "options": header.options,
        "sliders": sliders,
        "bank": fx.bank_path(),
        "gfx": fx.gfx_size(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// List the presets of a bank.
pub fn show_bank(path: &Path, as_json: bool) -> Result<()> {
    info!("Reading bank: {}", path.display());

    let bank = load_bank(path)?;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&bank)?);
        return Ok(());
    }

    println!("Bank: {}", bank.name);
    println!("{:-<60}", "");
    for (i, preset) in bank.presets.iter().enumerate() {
        println!(
            "{:3}. {:<40} {:2} slider(s) {:6} byte(s)",
            i + 1,
            preset.name,
            preset.state.sliders.len(),
            preset.state.data.len()
        );
    }
    Ok(())
}

/// Process a WAV file through a script.
pub fn render(
    script: &Path,
    input: &Path,
    output: &Path,
    block_size: usize,
    sliders: &[String],
) -> Result<()> {
    if block_size == 0 {
        bail!("block size must be positive");
    }
    info!("Rendering {} through {}", input.display(), script.display());

    let reader = WavReader::open(input).with_context(|| format!("failed to open {}", input.display()))?;
    let spec = reader.spec();
    let interleaved = read_samples_as_f32(reader, spec.bits_per_sample, spec.sample_format)
        .map_err(|e| anyhow!("failed to decode {}: {}", input.display(), e))?;
    let channels = usize::from(spec.channels.max(1));
    let frames = interleaved.len() / channels;
    let inputs: Vec<Vec<f32>> = (0..channels)
        .map(|ch| interleaved.iter().skip(ch).step_by(channels).copied().collect())
        .collect();

    let mut fx = Effect::new(Config::default(), Box::new(MiniVm::new()));
    fx.load(script, LoadOptions::NONE)?;
    fx.compile(CompileOptions::SKIP_GFX)?;
    fx.set_sample_rate(f64::from(spec.sample_rate));
    fx.set_block_size(block_size as u32);
    for assignment in sliders {
        let (index, value) = parse_slider_assignment(assignment)?;
        fx.set_slider_value(index, value);
    }

    let out_channels = if fx.num_outputs() > 0 { fx.num_outputs() } else { channels };
    let mut outputs = vec![vec![0.0f32; frames]; out_channels];

    let mut start = 0;
    while start < frames {
        let n = block_size.min(frames - start);
        let ins: Vec<&[f32]> = inputs.iter().map(|c| &c[start..start + n]).collect();
        let mut outs: Vec<&mut [f32]> = outputs.iter_mut().map(|c| &mut c[start..start + n]).collect();
        fx.process_f32(&ins, &mut outs, n);
        start += n;
    }

    let out_spec = WavSpec {
        channels: out_channels as u16,
        sample_rate: spec.sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(output, out_spec)
        .with_context(|| format!("failed to create {}", output.display()))?;
    for frame in 0..frames {
        for channel in &outputs {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()?;

    println!(
        "Rendered {} frame(s), {} -> {} channel(s): {}",
        frames,
        channels,
        out_channels,
        output.display()
    );
    Ok(())
}

/// Parse `INDEX=VALUE` with a 1-based slider index
fn parse_slider_assignment(text: &str) -> Result<(usize, f64)> {
    let (index, value) = text
        .split_once('=')
        .ok_or_else(|| anyhow!("expected INDEX=VALUE, got '{}'", text))?;
    let index: usize = index.trim().parse().with_context(|| format!("bad slider index in '{}'", text))?;
    let value: f64 = value.trim().parse().with_context(|| format!("bad slider value in '{}'", text))?;
    if index == 0 {
        bail!("slider indices start at 1");
    }
    Ok((index - 1, value))
}
