//! Host functions callable from scripts
//!
//! The table is built once per process by [`registry`]. Each call receives a
//! [`ScriptContext`] describing who is running the code: MIDI functions only
//! act for the audio role and drawing functions only during a drawing pass.
//! A call from the wrong role returns 0 and changes nothing.

use std::collections::HashMap;
use std::sync::OnceLock;

use super::gfx::{GfxBackend, KeyState};
use super::midi::{MidiBuffer, MidiEvent, MAX_MIDI_BUSES, MAX_MIDI_MESSAGE_SIZE};
use super::shared::{ScriptInfo, Shared};
use super::sync::Role;
use crate::files::{find_data_file, open_data_file};
use crate::source::MAX_SLIDERS;
use crate::vm::{ArgRef, ScriptHost, VmAccess, MAX_MEMORY_SLOTS};

/// Slots moved per step by `file_mem`
const FILE_MEM_CHUNK: usize = 4096;

/// Signature of a host function
pub type Builtin = fn(&mut ScriptContext<'_>, &[ArgRef], &mut dyn VmAccess) -> f64;

/// MIDI buffers visible to a processing cycle
pub struct MidiIo<'a> {
    pub input: &'a mut MidiBuffer,
    pub output: &'a mut MidiBuffer,
}

/// Caller-side state for one script execution
pub struct ScriptContext<'a> {
    pub role: Role,
    pub shared: &'a Shared,
    pub info: &'a ScriptInfo,
    pub midi: Option<MidiIo<'a>>,
    pub gfx: Option<&'a mut dyn GfxBackend>,
    pub keys: Option<&'a mut KeyState>,
}

impl<'a> ScriptContext<'a> {
    /// Context without MIDI or drawing access
    pub fn new(role: Role, shared: &'a Shared, info: &'a ScriptInfo) -> Self {
        Self {
            role,
            shared,
            info,
            midi: None,
            gfx: None,
            keys: None,
        }
    }

    pub fn with_midi(mut self, input: &'a mut MidiBuffer, output: &'a mut MidiBuffer) -> Self {
        self.midi = Some(MidiIo { input, output });
        self
    }

    pub fn with_gfx(mut self, backend: &'a mut dyn GfxBackend, keys: &'a mut KeyState) -> Self {
        self.gfx = Some(backend);
        self.keys = Some(keys);
        self
    }

    fn allows(&self, expected: Role) -> bool {
        match self.role.require(expected) {
            Ok(()) => true,
            Err(e) => {
                log::debug!("inert host call: {}", e);
                false
            }
        }
    }

    fn midi_io(&mut self) -> Option<&mut MidiIo<'a>> {
        if !self.allows(Role::Audio) {
            return None;
        }
        self.midi.as_mut()
    }

    /// Whether the script addresses buses through `midi_bus`
    fn extended_bus(&self) -> bool {
        self.shared.vars.ext_midi_bus.get() != 0.0
    }

    fn send_bus(&self) -> u32 {
        if !self.extended_bus() {
            return 0;
        }
        let bus = self.shared.vars.midi_bus.get().round();
        bus.clamp(0.0, (MAX_MIDI_BUSES - 1) as f64) as u32
    }
}

impl ScriptHost for ScriptContext<'_> {
    fn call(&mut self, name: &str, args: &[ArgRef], vm: &mut dyn VmAccess) -> Option<f64> {
        if let Some(builtin) = registry().get(name) {
            return Some(builtin(self, args, vm));
        }
        if name.starts_with("gfx_") {
            return Some(forward_gfx(self, name, args, vm));
        }
        None
    }
}

/// Host function table, built on first use
pub fn registry() -> &'static HashMap<&'static str, Builtin> {
    static REGISTRY: OnceLock<HashMap<&'static str, Builtin>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        let entries: [(&'static str, Builtin); 20] = [
            ("sliderchange", sliderchange),
            ("slider_automate", slider_automate),
            ("slider_show", slider_show),
            ("midisend", midisend),
            ("midisend_buf", midisend_buf),
            ("midisend_str", midisend_str),
            ("midisyx", midisyx),
            ("midirecv", midirecv),
            ("midirecv_buf", midirecv_buf),
            ("midirecv_str", midirecv_str),
            ("file_open", file_open),
            ("file_close", file_close),
            ("file_rewind", file_rewind),
            ("file_var", file_var),
            ("file_mem", file_mem),
            ("file_avail", file_avail),
            ("file_riff", file_riff),
            ("file_text", file_text),
            ("file_string", file_string),
            ("gfx_getchar", gfx_getchar),
        ];
        log::debug!("registered {} host functions", entries.len());
        entries.into_iter().collect()
    })
}

fn arg(args: &[ArgRef], index: usize) -> f64 {
    args.get(index).map_or(0.0, |a| a.value)
}

fn handle_arg(args: &[ArgRef]) -> i64 {
    arg(args, 0).round() as i64
}

fn offset_arg(value: f64) -> u32 {
    value.max(0.0) as u32
}

fn byte(value: f64) -> u8 {
    (value as i64 & 0xFF) as u8
}

/// Bytes of a script string, one per character
fn string_bytes(text: &str) -> Vec<u8> {
    text.chars().map(|c| c as u32 as u8).collect()
}

fn bytes_string(data: &[u8]) -> String {
    data.iter().map(|&b| char::from(b)).collect()
}

// Sliders

/// Mask addressed by a slider-or-mask argument
fn slider_mask(ctx: &ScriptContext<'_>, arg: Option<&ArgRef>) -> u64 {
    let Some(arg) = arg else {
        return 0;
    };
    if let Some(index) = arg.var.as_ref().and_then(|v| ctx.shared.vars.slider_index_of(v)) {
        return 1 << index;
    }
    if arg.value >= 1.0 {
        arg.value as u64
    } else {
        0
    }
}

fn sliderchange(ctx: &mut ScriptContext<'_>, args: &[ArgRef], _vm: &mut dyn VmAccess) -> f64 {
    let mask = slider_mask(ctx, args.first());
    ctx.shared.masks.changed.set(mask);
    0.0
}

fn slider_automate(ctx: &mut ScriptContext<'_>, args: &[ArgRef], _vm: &mut dyn VmAccess) -> f64 {
    let mask = slider_mask(ctx, args.first());
    ctx.shared.masks.automated.set(mask);
    ctx.shared.masks.changed.set(mask);
    0.0
}

fn slider_show(ctx: &mut ScriptContext<'_>, args: &[ArgRef], _vm: &mut dyn VmAccess) -> f64 {
    let mask = slider_mask(ctx, args.first());
    let visible = &ctx.shared.masks.visible;
    let mode = arg(args, 1);
    let previous = if mode < 0.0 {
        visible.toggle(mask)
    } else if mode == 0.0 {
        visible.clear(mask)
    } else {
        visible.set(mask)
    };
    let now = if mode < 0.0 {
        previous ^ mask
    } else if mode == 0.0 {
        previous & !mask
    } else {
        previous | mask
    };
    (now & mask) as f64
}

// MIDI output

fn midisend(ctx: &mut ScriptContext<'_>, args: &[ArgRef], _vm: &mut dyn VmAccess) -> f64 {
    let bus = ctx.send_bus();
    let Some(io) = ctx.midi_io() else {
        return 0.0;
    };
    let offset = offset_arg(arg(args, 0));
    let msg1 = byte(arg(args, 1));
    let (msg2, msg3) = if args.len() >= 4 {
        (byte(arg(args, 2)), byte(arg(args, 3)))
    } else {
        let msg23 = arg(args, 2) as i64;
        (byte(msg23 as f64), byte((msg23 >> 8) as f64))
    };
    if io.output.push(&MidiEvent::new(bus, offset, &[msg1, msg2, msg3])) {
        f64::from(msg1)
    } else {
        0.0
    }
}

fn read_bytes(vm: &dyn VmAccess, addr: f64, len: f64) -> Option<Vec<u8>> {
    if addr < 0.0 || len < 0.0 {
        return None;
    }
    let len = (len as usize).min(MAX_MIDI_MESSAGE_SIZE);
    let mut values = vec![0.0; len];
    vm.read_memory(addr as usize, &mut values);
    Some(values.into_iter().map(byte).collect())
}

fn midisend_buf(ctx: &mut ScriptContext<'_>, args: &[ArgRef], vm: &mut dyn VmAccess) -> f64 {
    let bus = ctx.send_bus();
    let Some(io) = ctx.midi_io() else {
        return 0.0;
    };
    let Some(data) = read_bytes(vm, arg(args, 1), arg(args, 2)) else {
        return 0.0;
    };
    let offset = offset_arg(arg(args, 0));
    if io.output.push(&MidiEvent::new(bus, offset, &data)) {
        data.len() as f64
    } else {
        0.0
    }
}

fn midisend_str(ctx: &mut ScriptContext<'_>, args: &[ArgRef], vm: &mut dyn VmAccess) -> f64 {
    let bus = ctx.send_bus();
    let Some(io) = ctx.midi_io() else {
        return 0.0;
    };
    let Some(text) = vm.string(arg(args, 1)) else {
        return 0.0;
    };
    let data = string_bytes(&text);
    let offset = offset_arg(arg(args, 0));
    if io.output.push(&MidiEvent::new(bus, offset, &data)) {
        data.len() as f64
    } else {
        0.0
    }
}

fn midisyx(ctx: &mut ScriptContext<'_>, args: &[ArgRef], vm: &mut dyn VmAccess) -> f64 {
    let bus = ctx.send_bus();
    let Some(io) = ctx.midi_io() else {
        return 0.0;
    };
    let Some(data) = read_bytes(vm, arg(args, 1), arg(args, 2)) else {
        return 0.0;
    };
    let offset = offset_arg(arg(args, 0));

    let mut push = io.output.push_begin(bus, offset);
    if data.first() != Some(&0xF0) {
        io.output.push_data(&mut push, &[0xF0]);
    }
    io.output.push_data(&mut push, &data);
    if data.last() != Some(&0xF7) {
        io.output.push_data(&mut push, &[0xF7]);
    }
    if io.output.push_end(push) {
        data.len() as f64
    } else {
        0.0
    }
}

// MIDI input

/// Pull input events until `accept` takes one; rejected events are passed
/// through to the output unchanged
fn receive<F>(ctx: &mut ScriptContext<'_>, mut accept: F) -> f64
where
    F: FnMut(&MidiEvent<'_>) -> Option<f64>,
{
    let extended = ctx.extended_bus();
    let midi_bus = std::sync::Arc::clone(&ctx.shared.vars.midi_bus);
    let Some(io) = ctx.midi_io() else {
        return 0.0;
    };
    loop {
        let event = if extended {
            io.input.next_event()
        } else {
            io.input.next_event_from_bus(0)
        };
        let Some(event) = event else {
            return 0.0;
        };
        match accept(&event) {
            Some(result) => {
                if extended {
                    midi_bus.set(f64::from(event.bus));
                }
                return result;
            }
            None => {
                if !io.output.push(&event) {
                    log::debug!("dropped {}-byte MIDI event, output full", event.data.len());
                }
            }
        }
    }
}

fn midirecv(ctx: &mut ScriptContext<'_>, args: &[ArgRef], _vm: &mut dyn VmAccess) -> f64 {
    receive(ctx, |event| {
        if event.data.len() > 3 {
            return None;
        }
        let msg = |i: usize| f64::from(event.data.get(i).copied().unwrap_or(0));
        if let Some(a) = args.first() {
            a.set(f64::from(event.offset));
        }
        if let Some(a) = args.get(1) {
            a.set(msg(0));
        }
        if args.len() >= 4 {
            args[2].set(msg(1));
            args[3].set(msg(2));
        } else if let Some(a) = args.get(2) {
            a.set(msg(1) + msg(2) * 256.0);
        }
        Some(msg(0).max(1.0))
    })
}

fn midirecv_buf(ctx: &mut ScriptContext<'_>, args: &[ArgRef], vm: &mut dyn VmAccess) -> f64 {
    let addr = arg(args, 1);
    let max_len = arg(args, 2);
    if addr < 0.0 || max_len < 0.0 {
        return 0.0;
    }
    receive(ctx, |event| {
        if event.data.len() > max_len as usize {
            return None;
        }
        let values: Vec<f64> = event.data.iter().map(|&b| f64::from(b)).collect();
        vm.write_memory(addr as usize, &values);
        if let Some(a) = args.first() {
            a.set(f64::from(event.offset));
        }
        Some(event.data.len() as f64)
    })
}

fn midirecv_str(ctx: &mut ScriptContext<'_>, args: &[ArgRef], vm: &mut dyn VmAccess) -> f64 {
    let id = arg(args, 1);
    receive(ctx, |event| {
        if !vm.set_string(id, &bytes_string(event.data)) {
            return None;
        }
        if let Some(a) = args.first() {
            a.set(f64::from(event.offset));
        }
        Some(event.data.len() as f64)
    })
}

// Files

/// Name and absolute-path policy for a `file_open` argument
fn file_target(ctx: &ScriptContext<'_>, target: &ArgRef, vm: &dyn VmAccess) -> Option<(String, bool)> {
    let header = &ctx.info.header;
    let slider_index = target
        .var
        .as_ref()
        .and_then(|v| ctx.shared.vars.slider_index_of(v))
        .filter(|&i| i < MAX_SLIDERS);

    if let Some(slider) = slider_index.map(|i| &header.sliders[i]).filter(|s| s.is_path()) {
        let choice = target.value.round();
        if choice < 0.0 {
            return None;
        }
        let name = slider.enum_names.get(choice as usize)?;
        return Some((format!("{}/{}", slider.path, name), false));
    }

    let index = target.value.round();
    if index >= 0.0 && (index as usize) < header.filenames.len() {
        return Some((header.filenames[index as usize].clone(), false));
    }

    vm.string(target.value).map(|text| (text, true))
}

fn file_open(ctx: &mut ScriptContext<'_>, args: &[ArgRef], vm: &mut dyn VmAccess) -> f64 {
    let Some(target) = args.first() else {
        return -1.0;
    };
    let Some((name, allow_absolute)) = file_target(ctx, target, vm) else {
        return -1.0;
    };
    let config = &ctx.shared.config;
    let Some(path) = find_data_file(&name, allow_absolute, ctx.info.directory.as_deref(), config) else {
        log::debug!("file_open: '{}' not found", name);
        return -1.0;
    };
    match open_data_file(&path, config).and_then(|file| ctx.shared.files.insert(file)) {
        Ok(handle) => handle as f64,
        Err(e) => {
            log::warn!("file_open: {}", e);
            -1.0
        }
    }
}

fn file_close(ctx: &mut ScriptContext<'_>, args: &[ArgRef], _vm: &mut dyn VmAccess) -> f64 {
    match ctx.shared.files.close(handle_arg(args)) {
        Ok(()) => 0.0,
        Err(_) => -1.0,
    }
}

fn file_rewind(ctx: &mut ScriptContext<'_>, args: &[ArgRef], _vm: &mut dyn VmAccess) -> f64 {
    let handle = handle_arg(args);
    match ctx.shared.files.with(handle, |file| file.rewind()) {
        Some(()) => handle as f64,
        None => -1.0,
    }
}

fn file_var(ctx: &mut ScriptContext<'_>, args: &[ArgRef], _vm: &mut dyn VmAccess) -> f64 {
    let Some(target) = args.get(1) else {
        return 0.0;
    };
    let done = ctx.shared.files.with(handle_arg(args), |file| {
        if file.is_writing() {
            file.write_value(target.value)
        } else {
            file.read_value().map(|value| target.set(value)).is_some()
        }
    });
    if done == Some(true) {
        1.0
    } else {
        0.0
    }
}

fn file_mem(ctx: &mut ScriptContext<'_>, args: &[ArgRef], vm: &mut dyn VmAccess) -> f64 {
    let handle = handle_arg(args);
    let (addr, len) = (arg(args, 1), arg(args, 2));
    if addr < 0.0 || len <= 0.0 {
        return 0.0;
    }
    // no script addresses more than the hard memory cap
    let (addr, len) = (addr as usize, (len as usize).min(MAX_MEMORY_SLOTS));
    let files = &ctx.shared.files;
    let Some(writing) = files.with(handle, |file| file.is_writing()) else {
        return 0.0;
    };

    let mut chunk = vec![0.0; len.min(FILE_MEM_CHUNK)];
    let mut done = 0;
    while done < len {
        let want = (len - done).min(FILE_MEM_CHUNK);
        let at = addr.saturating_add(done);
        let moved = if writing {
            let count = vm.read_memory(at, &mut chunk[..want]);
            let values = &chunk[..count];
            files
                .with(handle, |file| values.iter().take_while(|&&v| file.write_value(v)).count())
                .unwrap_or(0)
        } else {
            let count = files.with(handle, |file| file.read_values(&mut chunk[..want])).unwrap_or(0);
            vm.write_memory(at, &chunk[..count])
        };
        done += moved;
        if moved < want {
            break;
        }
    }
    done as f64
}

fn file_avail(ctx: &mut ScriptContext<'_>, args: &[ArgRef], _vm: &mut dyn VmAccess) -> f64 {
    ctx.shared.files.with(handle_arg(args), |file| file.avail()).unwrap_or(0.0)
}

fn file_riff(ctx: &mut ScriptContext<'_>, args: &[ArgRef], _vm: &mut dyn VmAccess) -> f64 {
    let handle = handle_arg(args);
    let Some(info) = ctx.shared.files.with(handle, |file| file.riff()) else {
        return -1.0;
    };
    let (channels, rate) = info.map_or((0.0, 0.0), |i| (f64::from(i.channels), i.sample_rate));
    if let Some(a) = args.get(1) {
        a.set(channels);
    }
    if let Some(a) = args.get(2) {
        a.set(rate);
    }
    handle as f64
}

fn file_text(ctx: &mut ScriptContext<'_>, args: &[ArgRef], _vm: &mut dyn VmAccess) -> f64 {
    match ctx.shared.files.with(handle_arg(args), |file| file.is_text()) {
        Some(true) => 1.0,
        _ => 0.0,
    }
}

fn file_string(ctx: &mut ScriptContext<'_>, args: &[ArgRef], vm: &mut dyn VmAccess) -> f64 {
    let handle = handle_arg(args);
    let id = arg(args, 1);
    let files = &ctx.shared.files;
    let Some(writing) = files.with(handle, |file| file.is_writing()) else {
        return 0.0;
    };

    let done = if writing {
        let text = vm.string(id).unwrap_or_default();
        files.with(handle, |file| file.write_string(&text)).unwrap_or(false)
    } else {
        files
            .with(handle, |file| file.read_string())
            .flatten()
            .is_some_and(|text| vm.set_string(id, &text))
    };
    if done {
        1.0
    } else {
        0.0
    }
}

// Drawing

fn gfx_getchar(ctx: &mut ScriptContext<'_>, args: &[ArgRef], _vm: &mut dyn VmAccess) -> f64 {
    if !ctx.allows(Role::Drawing) {
        return 0.0;
    }
    let Some(keys) = ctx.keys.as_mut() else {
        return 0.0;
    };
    let key = arg(args, 0);
    if key <= 0.0 {
        f64::from(keys.next_key())
    } else if keys.is_pressed(key as u32) {
        1.0
    } else {
        0.0
    }
}

fn forward_gfx(ctx: &mut ScriptContext<'_>, name: &str, args: &[ArgRef], vm: &mut dyn VmAccess) -> f64 {
    if !ctx.allows(Role::Drawing) {
        return 0.0;
    }
    match ctx.gfx.as_mut() {
        Some(backend) => backend.call(name, args, vm),
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::source::SourceUnit;
    use crate::vm::mini::MiniVm;
    use crate::vm::new_var;
    use std::sync::Arc;

    fn setup(script: &str) -> (Shared, ScriptInfo) {
        let shared = Shared::new(Config::default(), Box::new(MiniVm::new()));
        let unit = SourceUnit::parse_str(script).unwrap();
        (shared, ScriptInfo::from_unit(&unit))
    }

    #[test]
    fn test_registry_is_shared() {
        let first = registry() as *const _;
        let second = registry() as *const _;
        assert_eq!(first, second);
        assert!(registry().contains_key("midisend"));
    }

    #[test]
    fn test_midisend_requires_audio_role() {
        let (shared, info) = setup("desc:x\n");
        let mut input = MidiBuffer::new(64, true);
        let mut output = MidiBuffer::new(64, true);
        let mut vm = MiniVm::new();
        let args = [ArgRef::value(0.0), ArgRef::value(144.0), ArgRef::value(60.0 + 100.0 * 256.0)];

        let mut ctx = ScriptContext::new(Role::Drawing, &shared, &info).with_midi(&mut input, &mut output);
        assert_eq!(ctx.call("midisend", &args, &mut vm), Some(0.0));
        drop(ctx);
        assert!(output.is_empty());

        let mut ctx = ScriptContext::new(Role::Audio, &shared, &info).with_midi(&mut input, &mut output);
        assert_eq!(ctx.call("midisend", &args, &mut vm), Some(144.0));
        drop(ctx);
        let event = output.next_event().map(|e| e.data.to_vec());
        assert_eq!(event, Some(vec![144, 60, 100]));
    }

    #[test]
    fn test_midirecv_passes_sysex_through() {
        let (shared, info) = setup("desc:x\n");
        let mut input = MidiBuffer::new(64, true);
        let mut output = MidiBuffer::new(64, true);
        input.push(&MidiEvent::new(0, 1, &[0xF0, 1, 2, 0xF7]));
        input.push(&MidiEvent::new(0, 5, &[0x90, 64, 127]));
        let mut vm = MiniVm::new();

        let (offset, msg1, msg23) = (new_var(0.0), new_var(0.0), new_var(0.0));
        let args = [
            ArgRef::var(Arc::clone(&offset)),
            ArgRef::var(Arc::clone(&msg1)),
            ArgRef::var(Arc::clone(&msg23)),
        ];
        let mut ctx = ScriptContext::new(Role::Audio, &shared, &info).with_midi(&mut input, &mut output);
        assert_ne!(ctx.call("midirecv", &args, &mut vm), Some(0.0));
        assert_eq!(ctx.call("midirecv", &args, &mut vm), Some(0.0));
        drop(ctx);

        assert_eq!(offset.get(), 5.0);
        assert_eq!(msg1.get(), 144.0);
        assert_eq!(msg23.get(), 64.0 + 127.0 * 256.0);
        let passed = output.next_event().map(|e| e.data.to_vec());
        assert_eq!(passed, Some(vec![0xF0, 1, 2, 0xF7]));
    }

    #[test]
    fn test_midisyx_adds_framing() {
        let (shared, info) = setup("desc:x\n");
        let mut input = MidiBuffer::new(64, true);
        let mut output = MidiBuffer::new(64, true);
        let mut vm = MiniVm::new();
        vm.write_memory(10, &[0x7E as f64, 0x01 as f64]);

        let args = [ArgRef::value(0.0), ArgRef::value(10.0), ArgRef::value(2.0)];
        let mut ctx = ScriptContext::new(Role::Audio, &shared, &info).with_midi(&mut input, &mut output);
        assert_eq!(ctx.call("midisyx", &args, &mut vm), Some(2.0));
        drop(ctx);
        let event = output.next_event().map(|e| e.data.to_vec());
        assert_eq!(event, Some(vec![0xF0, 0x7E, 0x01, 0xF7]));
    }

    #[test]
    fn test_extended_bus_routing() {
        let (shared, info) = setup("desc:x\n");
        shared.vars.ext_midi_bus.set(1.0);
        shared.vars.midi_bus.set(3.0);
        let mut input = MidiBuffer::new(64, true);
        let mut output = MidiBuffer::new(64, true);
        input.push(&MidiEvent::new(7, 0, &[0x80, 1, 0]));
        let mut vm = MiniVm::new();

        let args = [ArgRef::value(0.0), ArgRef::value(0x90 as f64), ArgRef::value(1.0)];
        let mut ctx = ScriptContext::new(Role::Audio, &shared, &info).with_midi(&mut input, &mut output);
        ctx.call("midisend", &args, &mut vm);
        assert_ne!(ctx.call("midirecv", &args, &mut vm), Some(0.0));
        drop(ctx);

        assert_eq!(shared.vars.midi_bus.get(), 7.0);
        assert_eq!(output.next_event().map(|e| e.bus), Some(3));
    }

    #[test]
    fn test_slider_show_modes() {
        let (shared, info) = setup("slider1:0<0,1>A\nslider2:0<0,1>B\n");
        shared.masks.reset_visibility(&info.header);
        let mut vm = MiniVm::new();
        let slider2 = ArgRef::var(Arc::clone(&shared.vars.sliders[1]));
        let mut ctx = ScriptContext::new(Role::Audio, &shared, &info);

        assert_eq!(ctx.call("slider_show", &[slider2.clone(), ArgRef::value(0.0)], &mut vm), Some(0.0));
        assert_eq!(shared.masks.visible.load(), 0b01);
        assert_eq!(ctx.call("slider_show", &[slider2.clone(), ArgRef::value(-1.0)], &mut vm), Some(2.0));
        assert_eq!(shared.masks.visible.load(), 0b11);

        ctx.call("slider_automate", &[ArgRef::value(4.0)], &mut vm);
        assert_eq!(shared.masks.automated.load(), 4);
        assert_eq!(shared.masks.changed.load(), 4);
    }

    #[test]
    fn test_unknown_functions_fall_through() {
        let (shared, info) = setup("desc:x\n");
        let mut vm = MiniVm::new();
        let mut ctx = ScriptContext::new(Role::Audio, &shared, &info);
        assert_eq!(ctx.call("no_such_function", &[], &mut vm), None);
        assert_eq!(ctx.call("gfx_rect", &[], &mut vm), Some(0.0));
    }
}
