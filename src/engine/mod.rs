//! Effect runtime
//!
//! Core of the host:
//! - Effect lifecycle and the per-block processing cycle
//! - Compilation of source units into VM code
//! - Well-known variables, MIDI buses and transport
//! - Script-callable host functions and the drawing envelope

pub mod builtins;
pub mod compile;
pub mod effect;
pub mod gfx;
pub mod midi;
pub mod shared;
pub mod sync;
pub mod transport;
pub mod vars;

pub use builtins::{registry, ScriptContext};
pub use compile::CompiledCode;
pub use effect::{Effect, UiHandle, MAX_TRIGGERS};
pub use gfx::{buttons, modifiers, GfxBackend};
pub use midi::{MidiBuffer, MidiEvent, MAX_MIDI_BUSES};
pub use sync::Role;
pub use transport::{PlaybackState, TimeInfo};
