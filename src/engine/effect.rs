//! Effect instance
//!
//! [`Effect`] is owned by the audio role and drives the whole lifecycle:
//! load, compile, process and state transfer. The drawing role gets a
//! [`UiHandle`] that shares the same [`Shared`] block and can only run
//! `@gfx`, feed input events and drain slider notifications.
//!
//! ```text
//! Unloaded --load--> Loaded --compile--> Compiled --first cycle--> Initialized
//!     ^                 |                    |
//!     +----unload-------+--------------------+
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use num_traits::Float;
use walkdir::WalkDir;

use super::builtins::ScriptContext;
use super::compile::{find_singleton, CompiledCode};
use super::gfx::GfxBackend;
use super::midi::{MidiBuffer, MidiEvent};
use super::shared::{ScriptInfo, Shared};
use super::sync::{lock, try_lock, Role};
use super::transport::TimeInfo;
use super::vars::{AliasResolver, MAX_CHANNELS};
use crate::config::{CompileOptions, Config, LoadOptions, LogLevel};
use crate::error::{FxError, Result};
use crate::files::SerializeMode;
use crate::preset::{State, StateSlider};
use crate::source::imports::case_resolve;
use crate::source::{Header, ImportResolver, SectionKind, Slider, SourceUnit, MAX_SLIDERS};
use crate::vm::Vm;

/// Number of trigger bits a host can raise
pub const MAX_TRIGGERS: u32 = 10;

/// Main unit plus its imports in post-order
#[derive(Debug)]
struct LoadedSource {
    main: SourceUnit,
    imports: Vec<SourceUnit>,
}

/// A scripted audio effect
pub struct Effect {
    shared: Arc<Shared>,
    source: Option<LoadedSource>,
    info: Option<Arc<ScriptInfo>>,
    code: Option<CompiledCode>,
    bank_path: Option<PathBuf>,
    midi_in: MidiBuffer,
    midi_out: MidiBuffer,
    block_size: u32,
    sample_rate: f64,
    time_info: TimeInfo,
    triggers: u32,
    freshly_compiled: bool,
    must_compute_init: bool,
    must_compute_slider: bool,
}

impl Effect {
    /// Create an unloaded effect running on `vm`
    pub fn new(config: Config, vm: Box<dyn Vm>) -> Self {
        let midi_in = MidiBuffer::new(config.midi_capacity, true);
        let midi_out = MidiBuffer::new(config.midi_capacity, config.midi_output_extensible);
        Self {
            shared: Arc::new(Shared::new(config, vm)),
            source: None,
            info: None,
            code: None,
            bank_path: None,
            midi_in,
            midi_out,
            block_size: 128,
            sample_rate: 44100.0,
            time_info: TimeInfo::default(),
            triggers: 0,
            freshly_compiled: false,
            must_compute_init: false,
            must_compute_slider: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Handle for the drawing role
    pub fn ui(&self) -> UiHandle {
        UiHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    fn report(&self, level: LogLevel, message: &str) {
        self.shared.config.report(level, message);
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Parse the script at `path` and resolve its imports
    ///
    /// Any previously loaded script is unloaded first. On failure the effect
    /// is left unloaded.
    pub fn load(&mut self, path: &Path, options: LoadOptions) -> Result<()> {
        self.unload();

        let mut main = SourceUnit::load(path).map_err(|e| {
            let message = match &e {
                FxError::Parse { line, message } => {
                    format!("{}:{}: {}", path.display(), line, message)
                }
                other => other.to_string(),
            };
            self.report(LogLevel::Error, &message);
            e
        })?;

        if main.header.desc.is_empty() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            self.report(
                LogLevel::Warning,
                &format!("{}: the description is missing", name),
            );
            main.header.desc = name;
        }

        if options.contains(LoadOptions::IGNORE_IMPORTS) {
            main.header.imports.clear();
        }

        let imports = ImportResolver::new(self.shared.config.import_root())
            .resolve(&main)
            .map_err(|e| {
                self.report(LogLevel::Error, &e.to_string());
                e
            })?;

        let script_dir = main.directory().map(Path::to_path_buf);
        self.fill_path_sliders(&mut main.header, script_dir.as_deref());
        for warning in main.header.fix_invalid_enums() {
            self.report(LogLevel::Warning, &warning);
        }

        let vars = &self.shared.vars;
        for slider in main.header.existing_sliders() {
            vars.sliders[slider.id as usize].set(slider.default);
        }
        self.shared.masks.reset_visibility(&main.header);

        let mut info = ScriptInfo::from_unit(&main);
        info.gfx_size = find_singleton(&main, &imports, SectionKind::Gfx).map(|s| (s.width, s.height));
        let info = Arc::new(info);
        self.shared.set_script(Some(Arc::clone(&info)));
        self.info = Some(info);

        self.bank_path = main.directory().zip(path.file_name()).and_then(|(dir, name)| {
            let mut name = name.to_os_string();
            name.push(".rpl");
            case_resolve(dir, Path::new(&name))
        });

        log::info!(
            "loaded '{}' with {} import(s)",
            main.header.desc,
            imports.len()
        );
        self.source = Some(LoadedSource { main, imports });
        Ok(())
    }

    /// List the directory of each path slider into its enumeration
    fn fill_path_sliders(&self, header: &mut Header, script_dir: Option<&Path>) {
        let config = &self.shared.config;
        for slider in header.sliders.iter_mut().filter(|s| s.exists && s.is_path()) {
            let relative = Path::new(&slider.path);
            let Some(dir) = script_dir
                .into_iter()
                .chain(config.data_root())
                .map(|root| root.join(relative))
                .find(|dir| dir.is_dir())
            else {
                log::debug!("slider{}: no directory for '{}'", slider.id + 1, slider.path);
                continue;
            };

            slider.enum_names = WalkDir::new(&dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .filter(|entry| is_data_file(entry.path(), config))
                .map(|entry| entry.file_name().to_string_lossy().into_owned())
                .collect();
            if !slider.enum_names.is_empty() {
                slider.max = (slider.enum_names.len() - 1) as f64;
            }
        }
    }

    /// Compile the loaded script
    ///
    /// Previously compiled code is released first. On failure nothing stays
    /// compiled.
    pub fn compile(&mut self, options: CompileOptions) -> Result<()> {
        self.unload_code();

        let (Some(source), Some(info)) = (self.source.as_ref(), self.info.as_ref()) else {
            let err = FxError::load(PathBuf::new(), "no source is loaded, cannot compile");
            self.report(LogLevel::Error, &err.to_string());
            return Err(err);
        };

        let shared = &*self.shared;
        let resolver = AliasResolver {
            aliases: &info.aliases,
            vars: &shared.vars,
        };
        let compiled = {
            let mut vm = lock(&shared.vm);
            CompiledCode::compile(vm.as_mut(), &source.main, &source.imports, options, &resolver)
        };

        match compiled {
            Ok(mut code) => {
                // VM lock released above; the drawing lock comes first
                let stale = shared.gfx.install(code.gfx.take());
                if let Some(stale) = stale {
                    lock(&shared.vm).free_code(stale);
                }
                self.code = Some(code);
                self.freshly_compiled = true;
                self.must_compute_init = true;
                self.must_compute_slider = true;
                log::info!("compiled '{}'", info.header.desc);
                Ok(())
            }
            Err(e) => {
                self.report(LogLevel::Error, &e.to_string());
                Err(e)
            }
        }
    }

    /// Release compiled code, keeping the source
    pub fn unload_code(&mut self) {
        let gfx = self.shared.gfx.take();
        let mut vm = lock(&self.shared.vm);
        if let Some(gfx) = gfx {
            vm.free_code(gfx);
        }
        if let Some(code) = self.code.take() {
            code.release(vm.as_mut());
        }
        vm.reset();
        drop(vm);

        self.freshly_compiled = false;
        self.must_compute_init = false;
        self.must_compute_slider = false;
    }

    /// Release code and source
    pub fn unload(&mut self) {
        self.unload_code();
        self.source = None;
        self.info = None;
        self.bank_path = None;
        self.shared.set_script(None);
        self.shared.files.clear();
    }

    pub fn is_loaded(&self) -> bool {
        self.source.is_some()
    }

    pub fn is_compiled(&self) -> bool {
        self.code.is_some()
    }

    // ------------------------------------------------------------------
    // Script metadata
    // ------------------------------------------------------------------

    pub fn header(&self) -> Option<&Header> {
        self.info.as_deref().map(|info| &info.header)
    }

    pub fn name(&self) -> &str {
        self.header().map_or("", |h| h.desc.as_str())
    }

    pub fn author(&self) -> &str {
        self.header().map_or("", |h| h.author.as_str())
    }

    /// Path of the script file, if loaded from disk
    pub fn file_path(&self) -> Option<&Path> {
        self.source.as_ref().and_then(|s| s.main.path.as_deref())
    }

    /// Preset bank stored next to the script as `<file>.rpl`
    pub fn bank_path(&self) -> Option<&Path> {
        self.bank_path.as_deref()
    }

    pub fn num_inputs(&self) -> usize {
        self.header().map_or(0, |h| h.in_pins.count())
    }

    pub fn num_outputs(&self) -> usize {
        self.header().map_or(0, |h| h.out_pins.count())
    }

    pub fn input_name(&self, index: usize) -> Option<&str> {
        self.header()?.in_pins.names().get(index).map(String::as_str)
    }

    pub fn output_name(&self, index: usize) -> Option<&str> {
        self.header()?.out_pins.names().get(index).map(String::as_str)
    }

    pub fn has_section(&self, kind: SectionKind) -> bool {
        self.source
            .as_ref()
            .is_some_and(|s| find_singleton(&s.main, &s.imports, kind).is_some())
    }

    /// Whether the host should draw level meters
    pub fn wants_meters(&self) -> bool {
        self.header().is_some_and(|h| !h.options.no_meter)
    }

    /// Requested `@gfx` surface size
    pub fn gfx_size(&self) -> Option<(u32, u32)> {
        self.info.as_deref().and_then(|info| info.gfx_size)
    }

    // ------------------------------------------------------------------
    // Sliders
    // ------------------------------------------------------------------

    /// Declared slider at `index`
    pub fn slider(&self, index: usize) -> Option<&Slider> {
        self.header()?.sliders.get(index).filter(|s| s.exists)
    }

    /// Number of declared sliders
    pub fn slider_count(&self) -> usize {
        self.header().map_or(0, |h| h.existing_sliders().count())
    }

    pub fn slider_value(&self, index: usize) -> f64 {
        self.shared.vars.sliders.get(index).map_or(0.0, |var| var.get())
    }

    /// Write a slider and schedule `@slider`
    pub fn set_slider_value(&mut self, index: usize, value: f64) {
        if let Some(var) = self.shared.vars.sliders.get(index) {
            var.set(value);
            self.must_compute_slider = true;
        }
    }

    /// Fetch and clear the sliders changed by the script
    pub fn fetch_slider_changes(&self) -> u64 {
        self.shared.masks.changed.take()
    }

    /// Fetch and clear the sliders automated by the script
    pub fn fetch_slider_automations(&self) -> u64 {
        self.shared.masks.automated.take()
    }

    pub fn slider_visibility(&self) -> u64 {
        self.shared.masks.visible.load()
    }

    // ------------------------------------------------------------------
    // Timing and transport
    // ------------------------------------------------------------------

    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn set_block_size(&mut self, block_size: u32) {
        if self.block_size != block_size {
            self.block_size = block_size;
            if self.code.is_some() {
                self.must_compute_init = true;
            }
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        if self.sample_rate != sample_rate {
            self.sample_rate = sample_rate;
            if self.code.is_some() {
                self.must_compute_init = true;
            }
        }
    }

    /// Publish the host transport to the script
    pub fn set_time_info(&mut self, info: &TimeInfo) {
        let vars = &self.shared.vars;
        if info.starts_playback(&self.time_info) && vars.ext_noinit.get() == 0.0 && self.code.is_some() {
            log::debug!("transport started, scheduling @init");
            self.must_compute_init = true;
        }
        vars.apply_time_info(info);
        self.time_info = *info;
    }

    pub fn time_info(&self) -> &TimeInfo {
        &self.time_info
    }

    // ------------------------------------------------------------------
    // MIDI and triggers
    // ------------------------------------------------------------------

    /// Queue an event for the next cycle's input
    pub fn send_midi(&mut self, event: &MidiEvent<'_>) -> bool {
        self.midi_in.push(event)
    }

    /// Next event produced by the last cycle
    pub fn receive_midi(&mut self) -> Option<MidiEvent<'_>> {
        self.midi_out.next_event()
    }

    /// Next event produced on `bus` by the last cycle
    pub fn receive_midi_from_bus(&mut self, bus: u32) -> Option<MidiEvent<'_>> {
        self.midi_out.next_event_from_bus(bus)
    }

    /// Raise trigger `index` for the next cycle
    pub fn send_trigger(&mut self, index: u32) -> bool {
        if index >= MAX_TRIGGERS {
            return false;
        }
        self.triggers |= 1 << index;
        true
    }

    // ------------------------------------------------------------------
    // Latency
    // ------------------------------------------------------------------

    /// Latency reported through `pdc_delay`, in samples
    pub fn pdc_delay(&self) -> f64 {
        self.shared.vars.pdc_delay.get().max(0.0)
    }

    /// Channel range `[bottom, top)` the latency applies to
    pub fn pdc_channels(&self) -> (u32, u32) {
        let vars = &self.shared.vars;
        let clamp = |v: f64| v.clamp(0.0, MAX_CHANNELS as f64) as u32;
        let bottom = clamp(vars.pdc_bot_ch.get());
        (bottom, clamp(vars.pdc_top_ch.get()).max(bottom))
    }

    pub fn pdc_midi(&self) -> bool {
        self.shared.vars.pdc_midi.get() != 0.0
    }

    // ------------------------------------------------------------------
    // Processing
    // ------------------------------------------------------------------

    pub fn process_f32(&mut self, inputs: &[&[f32]], outputs: &mut [&mut [f32]], frames: usize) {
        self.process(inputs, outputs, frames);
    }

    pub fn process_f64(&mut self, inputs: &[&[f64]], outputs: &mut [&mut [f64]], frames: usize) {
        self.process(inputs, outputs, frames);
    }

    /// Run one processing cycle over `frames` samples
    ///
    /// Channels are negotiated against the declared pins; outputs beyond the
    /// negotiated count are zeroed. Without compiled code every output is
    /// silent.
    ///
    /// The audio role never waits for a drawing pass: when `@gfx` holds the
    /// VM, the block is bypassed (negotiated channels and MIDI input pass
    /// through) and pending init, slider and trigger work moves to the next
    /// cycle.
    pub fn process<T: Float>(&mut self, inputs: &[&[T]], outputs: &mut [&mut [T]], frames: usize) {
        let pending_triggers = self.triggers;
        self.midi_out.clear();
        self.midi_in.rewind();
        self.shared.masks.changed.store(0);
        self.shared.vars.trigger.set(pending_triggers as f64);
        self.triggers = 0;

        if self.code.is_none() {
            zero_channels(outputs, 0, frames);
            self.midi_in.clear();
            return;
        }

        let shared = Arc::clone(&self.shared);
        let Some(mut vm) = try_lock(&shared.vm) else {
            log::debug!("VM busy in a drawing pass, bypassing {} frame(s)", frames);
            self.triggers |= pending_triggers;
            self.bypass(inputs, outputs, frames);
            return;
        };

        if self.must_compute_init {
            self.run_init(&mut **vm);
        }
        if shared.slider_dirty.swap(false, Ordering::AcqRel) {
            self.must_compute_slider = true;
        }

        let (Some(code), Some(info)) = (self.code.as_ref(), self.info.as_deref()) else {
            return;
        };
        let vars = &shared.vars;

        let num_ins = inputs.len().min(info.header.in_pins.count());
        let num_outs = outputs.len().min(info.header.out_pins.count());
        let declared_ins = info.header.in_pins.count().min(MAX_CHANNELS);
        vars.samplesblock.set(frames as f64);
        vars.num_ch.set(num_ins as f64);

        let mut ctx = ScriptContext::new(Role::Audio, &shared, info)
            .with_midi(&mut self.midi_in, &mut self.midi_out);

        if self.must_compute_slider {
            if let Some(slider) = &code.slider {
                vm.execute(slider, &mut ctx);
            }
            self.must_compute_slider = false;
        }
        if let Some(block) = &code.block {
            vm.execute(block, &mut ctx);
        }

        match &code.sample {
            Some(sample) => {
                for frame in 0..frames {
                    for (ch, spl) in vars.spl.iter().enumerate().take(declared_ins) {
                        let value = match inputs.get(ch).filter(|_| ch < num_ins) {
                            Some(input) => input.get(frame).and_then(|s| s.to_f64()).unwrap_or(0.0),
                            None => 0.0,
                        };
                        spl.set(value);
                    }
                    vm.execute(sample, &mut ctx);
                    for (output, spl) in outputs.iter_mut().take(num_outs).zip(&vars.spl) {
                        if let Some(slot) = output.get_mut(frame) {
                            *slot = num_traits::cast(spl.get()).unwrap_or_else(T::zero);
                        }
                    }
                }
            }
            None => copy_channels(inputs, outputs, num_outs.min(num_ins), frames),
        }
        drop(ctx);
        drop(vm);

        let passed = if code.sample.is_some() { num_outs } else { num_outs.min(num_ins) };
        zero_channels(outputs, passed, frames);
        self.midi_in.clear();
    }

    /// Pass negotiated channels and MIDI input through untouched
    fn bypass<T: Float>(&mut self, inputs: &[&[T]], outputs: &mut [&mut [T]], frames: usize) {
        let channels = match self.info.as_deref() {
            Some(info) => inputs
                .len()
                .min(info.header.in_pins.count())
                .min(outputs.len().min(info.header.out_pins.count())),
            None => 0,
        };
        copy_channels(inputs, outputs, channels, frames);
        zero_channels(outputs, channels, frames);

        for event in self.midi_in.iter() {
            self.midi_out.push(&event);
        }
        self.midi_in.clear();
    }

    /// Run every `@init` handle, imports first
    fn run_init(&mut self, vm: &mut dyn Vm) {
        let (Some(code), Some(info)) = (self.code.as_ref(), self.info.as_deref()) else {
            return;
        };
        let shared = &*self.shared;
        let vars = &shared.vars;

        if self.freshly_compiled {
            vars.samplesblock.set(self.block_size as f64);
            vars.srate.set(self.sample_rate);
            shared.masks.clear();
            shared.masks.reset_visibility(&info.header);
            for var in [&vars.pdc_delay, &vars.pdc_bot_ch, &vars.pdc_top_ch, &vars.pdc_midi] {
                var.set(0.0);
            }
            self.freshly_compiled = false;
        } else {
            vars.srate.set(self.sample_rate);
        }

        shared.files.clear();
        {
            let mut ctx = ScriptContext::new(Role::Audio, shared, info)
                .with_midi(&mut self.midi_in, &mut self.midi_out);
            for handle in &code.init {
                vm.execute(handle, &mut ctx);
            }
        }
        self.must_compute_init = false;
        self.must_compute_slider = true;
        shared.gfx.request_init(vars.gfx.ext_retina.get() > 0.0);
    }

    /// Run `@serialize` against the serializer's current binding
    fn run_serialize(&mut self) {
        if self.code.as_ref().and_then(|c| c.serialize.as_ref()).is_none() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        let mut vm = lock(&shared.vm);
        if self.must_compute_init {
            self.run_init(&mut **vm);
        }
        let (Some(code), Some(info)) = (self.code.as_ref(), self.info.as_deref()) else {
            return;
        };
        if let Some(serialize) = &code.serialize {
            let mut ctx = ScriptContext::new(Role::Audio, &shared, info);
            vm.execute(serialize, &mut ctx);
        }
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// Capture slider values and the `@serialize` output
    pub fn save_state(&mut self) -> Option<State> {
        self.code.as_ref()?;

        self.shared.files.begin_serialize(SerializeMode::Write, Vec::new());
        self.run_serialize();
        let data = self.shared.files.end_serialize();

        let sliders = self
            .header()?
            .existing_sliders()
            .map(|slider| StateSlider {
                index: slider.id,
                value: self.slider_value(slider.id as usize),
            })
            .collect();
        Some(State { sliders, data })
    }

    /// Restore sliders and feed `state.data` to `@serialize`
    ///
    /// Sliders missing from `state` return to their defaults. Returns false
    /// when nothing is compiled.
    pub fn load_state(&mut self, state: &State) -> bool {
        let Some(info) = self.info.clone().filter(|_| self.code.is_some()) else {
            return false;
        };

        let vars = &self.shared.vars;
        for slider in info.header.existing_sliders() {
            vars.sliders[slider.id as usize].set(slider.default);
        }
        for entry in &state.sliders {
            let index = entry.index as usize;
            if index < MAX_SLIDERS && info.header.sliders[index].exists {
                vars.sliders[index].set(entry.value);
            }
        }
        self.must_compute_slider = true;

        self.shared.files.begin_serialize(SerializeMode::Read, state.data.clone());
        self.run_serialize();
        self.shared.files.end_serialize();
        true
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        self.unload_code();
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("name", &self.name())
            .field("compiled", &self.is_compiled())
            .field("block_size", &self.block_size)
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}

fn copy_channels<T: Float>(inputs: &[&[T]], outputs: &mut [&mut [T]], channels: usize, frames: usize) {
    for (input, output) in inputs.iter().zip(outputs.iter_mut()).take(channels) {
        let n = frames.min(output.len()).min(input.len());
        output[..n].copy_from_slice(&input[..n]);
    }
}

fn zero_channels<T: Float>(outputs: &mut [&mut [T]], from: usize, frames: usize) {
    for output in outputs.iter_mut().skip(from) {
        let n = frames.min(output.len());
        output[..n].fill(T::zero());
    }
}

/// Whether a path slider lists `path`: text, raw or a supported audio file
fn is_data_file(path: &Path, config: &Config) -> bool {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    matches!(extension.as_deref(), Some("txt") | Some("raw"))
        || config.audio_formats.iter().any(|format| format.can_handle(path))
}

/// Drawing-role access to an effect
#[derive(Clone)]
pub struct UiHandle {
    shared: Arc<Shared>,
}

impl UiHandle {
    /// Attach the rasterizer driven by `gfx_*` calls
    pub fn set_gfx_backend(&self, backend: Box<dyn GfxBackend>) {
        self.shared.gfx.set_backend(backend);
    }

    pub fn has_gfx(&self) -> bool {
        self.shared.gfx.has_code()
    }

    /// Whether the script asked for a high-density surface
    pub fn wants_retina(&self) -> bool {
        self.shared.gfx.wants_retina()
    }

    /// Requested `@gfx` surface size
    pub fn gfx_size(&self) -> Option<(u32, u32)> {
        self.shared.script().and_then(|info| info.gfx_size)
    }

    /// Run one `@gfx` pass; returns whether the surface changed
    ///
    /// The pass holds the VM throughout; audio blocks that arrive meanwhile
    /// are bypassed rather than waiting.
    pub fn run_gfx(&self) -> bool {
        let Some(info) = self.shared.script() else {
            return false;
        };
        let shared = &*self.shared;
        shared.gfx.run_pass(&shared.vars, |code, backend, keys| {
            let mut vm = lock(&shared.vm);
            let mut ctx = ScriptContext::new(Role::Drawing, shared, &info).with_gfx(backend, keys);
            vm.execute(code, &mut ctx);
        })
    }

    /// Publish the pointer state; see [`super::gfx::modifiers`] and [`super::gfx::buttons`]
    pub fn update_mouse(&self, mods: u32, position: (i32, i32), buttons: u32, wheel: (f64, f64)) {
        self.shared.gfx.update_mouse(&self.shared.vars, mods, position, buttons, wheel);
    }

    pub fn add_key(&self, key: u32, pressed: bool) {
        self.shared.gfx.add_key(key, pressed);
    }

    pub fn slider_value(&self, index: usize) -> f64 {
        self.shared.vars.sliders.get(index).map_or(0.0, |var| var.get())
    }

    /// Write a slider; `@slider` runs on the next cycle
    pub fn set_slider_value(&self, index: usize, value: f64) {
        if let Some(var) = self.shared.vars.sliders.get(index) {
            var.set(value);
            self.shared.slider_dirty.store(true, Ordering::Release);
        }
    }

    pub fn fetch_slider_changes(&self) -> u64 {
        self.shared.masks.changed.take()
    }

    pub fn fetch_slider_automations(&self) -> u64 {
        self.shared.masks.automated.take()
    }

    pub fn slider_visibility(&self) -> u64 {
        self.shared.masks.visible.load()
    }
}
