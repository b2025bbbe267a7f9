//! scriptfx - effect script host
//!
//! Loads text effect scripts (header metadata plus `@init`, `@slider`,
//! `@block`, `@sample`, `@gfx` and `@serialize` sections), compiles them on a
//! pluggable [`vm::Vm`] and runs them against host audio and MIDI.
//!
//! # Architecture
//!
//! - `source`: script reader, header and slider grammar, import resolution
//! - `vm`: the VM interface and a small reference VM
//! - `engine`: the effect lifecycle, processing cycle, MIDI buses and the
//!   script-callable host functions
//! - `files`: file handles opened by scripts
//! - `preset`: state blobs and `.rpl` preset banks
//!
//! An [`Effect`] belongs to the audio role. The drawing role works through
//! the [`UiHandle`] returned by [`Effect::ui`].

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod files;
pub mod preset;
pub mod source;
pub mod vm;

pub use config::{CompileOptions, Config, LoadOptions, LogLevel};
pub use engine::{Effect, MidiEvent, PlaybackState, TimeInfo, UiHandle};
pub use error::{FxError, Result};
pub use preset::{load_bank, Bank, Preset, State, StateSlider};
