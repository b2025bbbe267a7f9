//! Runtime variable binding
//!
//! Well-known cells are registered with the VM once per effect instance:
//! audio channels (`spl0`..`spl63`), sliders (`slider1`..`slider64`),
//! transport, housekeeping, drawing and mouse state. After a load, sliders
//! declared with a custom variable name get an alias consulted before the
//! VM's own symbol lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::engine::transport::TimeInfo;
use crate::source::{Header, MAX_SLIDERS};
use crate::vm::{SymbolResolver, Var, Vm};

/// Number of audio channel cells
pub const MAX_CHANNELS: usize = 64;

/// Drawing state cells
#[derive(Debug)]
pub struct GfxVars {
    pub r: Var,
    pub g: Var,
    pub b: Var,
    pub a: Var,
    pub a2: Var,
    pub w: Var,
    pub h: Var,
    pub x: Var,
    pub y: Var,
    pub mode: Var,
    pub clear: Var,
    pub texth: Var,
    pub dest: Var,
    pub ext_retina: Var,
}

/// Mouse state cells
#[derive(Debug)]
pub struct MouseVars {
    pub x: Var,
    pub y: Var,
    pub cap: Var,
    pub wheel: Var,
    pub hwheel: Var,
}

/// Cells shared between the host and the VM
#[derive(Debug)]
pub struct RuntimeVars {
    pub spl: Vec<Var>,
    pub sliders: Vec<Var>,
    pub srate: Var,
    pub num_ch: Var,
    pub samplesblock: Var,
    pub trigger: Var,
    pub tempo: Var,
    pub play_state: Var,
    pub play_position: Var,
    pub beat_position: Var,
    pub ts_num: Var,
    pub ts_denom: Var,
    pub ext_noinit: Var,
    pub ext_nodenorm: Var,
    pub ext_midi_bus: Var,
    pub midi_bus: Var,
    pub pdc_delay: Var,
    pub pdc_bot_ch: Var,
    pub pdc_top_ch: Var,
    pub pdc_midi: Var,
    pub gfx: GfxVars,
    pub mouse: MouseVars,
}

impl RuntimeVars {
    /// Register every well-known cell with `vm` and apply defaults
    pub fn register(vm: &mut dyn Vm) -> Self {
        let mut reg = |name: &str| vm.register_variable(name);

        let spl = (0..MAX_CHANNELS).map(|i| reg(&format!("spl{}", i))).collect();
        let sliders = (0..MAX_SLIDERS).map(|i| reg(&format!("slider{}", i + 1))).collect();

        let vars = Self {
            spl,
            sliders,
            srate: reg("srate"),
            num_ch: reg("num_ch"),
            samplesblock: reg("samplesblock"),
            trigger: reg("trigger"),
            tempo: reg("tempo"),
            play_state: reg("play_state"),
            play_position: reg("play_position"),
            beat_position: reg("beat_position"),
            ts_num: reg("ts_num"),
            ts_denom: reg("ts_denom"),
            ext_noinit: reg("ext_noinit"),
            ext_nodenorm: reg("ext_nodenorm"),
            ext_midi_bus: reg("ext_midi_bus"),
            midi_bus: reg("midi_bus"),
            pdc_delay: reg("pdc_delay"),
            pdc_bot_ch: reg("pdc_bot_ch"),
            pdc_top_ch: reg("pdc_top_ch"),
            pdc_midi: reg("pdc_midi"),
            gfx: GfxVars {
                r: reg("gfx_r"),
                g: reg("gfx_g"),
                b: reg("gfx_b"),
                a: reg("gfx_a"),
                a2: reg("gfx_a2"),
                w: reg("gfx_w"),
                h: reg("gfx_h"),
                x: reg("gfx_x"),
                y: reg("gfx_y"),
                mode: reg("gfx_mode"),
                clear: reg("gfx_clear"),
                texth: reg("gfx_texth"),
                dest: reg("gfx_dest"),
                ext_retina: reg("gfx_ext_retina"),
            },
            mouse: MouseVars {
                x: reg("mouse_x"),
                y: reg("mouse_y"),
                cap: reg("mouse_cap"),
                wheel: reg("mouse_wheel"),
                hwheel: reg("mouse_hwheel"),
            },
        };
        vars.reset_defaults();
        vars
    }

    /// Restore the documented default values
    pub fn reset_defaults(&self) {
        for var in self.spl.iter().chain(&self.sliders) {
            var.set(0.0);
        }
        self.srate.set(44100.0);
        self.num_ch.set(0.0);
        self.samplesblock.set(128.0);
        self.trigger.set(0.0);
        self.apply_time_info(&TimeInfo::default());
        self.ext_noinit.set(0.0);
        self.ext_nodenorm.set(0.0);
        self.ext_midi_bus.set(0.0);
        self.midi_bus.set(0.0);
        self.pdc_delay.set(0.0);
        self.pdc_bot_ch.set(0.0);
        self.pdc_top_ch.set(0.0);
        self.pdc_midi.set(0.0);
        self.reset_gfx();
        self.mouse.x.set(0.0);
        self.mouse.y.set(0.0);
        self.mouse.cap.set(0.0);
        self.mouse.wheel.set(0.0);
        self.mouse.hwheel.set(0.0);
    }

    /// Restore drawing state defaults ahead of a fresh drawing context
    pub fn reset_gfx(&self) {
        let gfx = &self.gfx;
        for var in [&gfx.r, &gfx.g, &gfx.b, &gfx.a, &gfx.a2] {
            var.set(1.0);
        }
        for var in [&gfx.w, &gfx.h, &gfx.x, &gfx.y, &gfx.mode, &gfx.texth, &gfx.dest] {
            var.set(0.0);
        }
        gfx.clear.set(0.0);
        gfx.ext_retina.set(0.0);
    }

    pub fn apply_time_info(&self, info: &TimeInfo) {
        self.tempo.set(info.tempo);
        self.play_state.set(info.playback_state.as_value());
        self.play_position.set(info.time_position);
        self.beat_position.set(info.beat_position);
        self.ts_num.set(info.time_signature.0 as f64);
        self.ts_denom.set(info.time_signature.1 as f64);
    }

    /// Slider index bound to `var`, if it is a slider cell
    pub fn slider_index_of(&self, var: &Var) -> Option<usize> {
        self.sliders.iter().position(|s| Arc::ptr_eq(s, var))
    }
}

/// Ordered table mapping custom slider variable names to slider slots
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SliderAliases {
    entries: BTreeMap<String, usize>,
}

impl SliderAliases {
    /// Build the table from a loaded header
    pub fn from_header(header: &Header) -> Self {
        let entries = header
            .existing_sliders()
            .map(|slider| (slider.var.to_ascii_lowercase(), slider.id as usize))
            .collect();
        Self { entries }
    }

    /// Slider slot aliased by `name` (case-insensitive)
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.entries.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Symbol resolver placing slider aliases ahead of ordinary lookup
pub struct AliasResolver<'a> {
    pub aliases: &'a SliderAliases,
    pub vars: &'a RuntimeVars,
}

impl SymbolResolver for AliasResolver<'_> {
    fn resolve(&self, name: &str) -> Option<Var> {
        let index = self.aliases.lookup(name)?;
        self.vars.sliders.get(index).map(Arc::clone)
    }
}
