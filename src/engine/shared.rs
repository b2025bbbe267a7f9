//! State reachable from both calling roles

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use super::gfx::GfxEnvelope;
use super::sync::{lock, AtomicBitset};
use super::vars::{RuntimeVars, SliderAliases};
use crate::config::Config;
use crate::files::FileTable;
use crate::source::{Header, SourceUnit};
use crate::vm::Vm;

/// Slider notification masks, one bit per slider
#[derive(Debug, Default)]
pub struct SliderMasks {
    pub visible: AtomicBitset,
    pub changed: AtomicBitset,
    pub automated: AtomicBitset,
}

impl SliderMasks {
    pub fn clear(&self) {
        self.changed.store(0);
        self.automated.store(0);
    }

    /// Recompute visibility from the sliders' declared initial state
    pub fn reset_visibility(&self, header: &Header) {
        let visible = header
            .sliders
            .iter()
            .enumerate()
            .filter(|(_, slider)| slider.initially_visible)
            .fold(0u64, |mask, (i, _)| mask | (1 << i));
        self.visible.store(visible);
    }
}

/// Read-only facts about the loaded script
#[derive(Debug, Clone, Default)]
pub struct ScriptInfo {
    /// Header of the main unit
    pub header: Header,
    /// Directory of the main unit's file
    pub directory: Option<PathBuf>,
    pub aliases: SliderAliases,
    /// Requested `@gfx` surface size, if any unit has a drawing section
    pub gfx_size: Option<(u32, u32)>,
}

impl ScriptInfo {
    pub fn from_unit(unit: &SourceUnit) -> Self {
        Self {
            header: unit.header.clone(),
            directory: unit.directory().map(PathBuf::from),
            aliases: SliderAliases::from_header(&unit.header),
            gfx_size: unit.gfx.as_ref().map(|s| (s.width, s.height)),
        }
    }
}

/// Everything an effect shares between the audio and drawing roles
///
/// Lock order: drawing state, then VM. The script info and file table locks
/// are taken briefly and never held while calling into the VM. The audio
/// role only ever try-locks the VM while processing.
pub struct Shared {
    pub config: Config,
    pub vars: RuntimeVars,
    pub masks: SliderMasks,
    pub files: FileTable,
    pub vm: Mutex<Box<dyn Vm>>,
    pub gfx: GfxEnvelope,
    /// Set when a slider is written outside the audio role
    pub slider_dirty: AtomicBool,
    script: Mutex<Option<Arc<ScriptInfo>>>,
}

impl Shared {
    pub fn new(config: Config, mut vm: Box<dyn Vm>) -> Self {
        let vars = RuntimeVars::register(vm.as_mut());
        Self {
            config,
            vars,
            masks: SliderMasks::default(),
            files: FileTable::new(),
            vm: Mutex::new(vm),
            gfx: GfxEnvelope::default(),
            slider_dirty: AtomicBool::new(false),
            script: Mutex::new(None),
        }
    }

    /// Snapshot of the loaded script, if any
    pub fn script(&self) -> Option<Arc<ScriptInfo>> {
        lock(&self.script).clone()
    }

    pub fn set_script(&self, info: Option<Arc<ScriptInfo>>) {
        *lock(&self.script) = info;
    }
}
