//! Integration Tests
//!
//! End-to-end tests driving scripts through the public effect API.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

use approx::assert_abs_diff_eq;
use tempfile::{tempdir, TempDir};
use test_case::test_case;

use scriptfx::engine::GfxBackend;
use scriptfx::vm::mini::MiniVm;
use scriptfx::vm::{ArgRef, VmAccess};
use scriptfx::{CompileOptions, Config, Effect, LoadOptions, LogLevel, MidiEvent, State};

/// Write `files` into a fresh directory, returning it with the first path
fn script_dir(files: &[(&str, &str)]) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    for (name, text) in files {
        fs::write(dir.path().join(name), text).unwrap();
    }
    let main = dir.path().join(files[0].0);
    (dir, main)
}

fn compiled(path: &Path) -> Effect {
    let mut fx = Effect::new(Config::default(), Box::new(MiniVm::new()));
    fx.load(path, LoadOptions::NONE).unwrap();
    fx.compile(CompileOptions::NONE).unwrap();
    fx
}

fn run_block(fx: &mut Effect) {
    let mut outs: [&mut [f64]; 0] = [];
    fx.process_f64(&[], &mut outs, 1);
}

// === Lifecycle ===

#[test]
fn test_unsupported_syntax_fails_compile() {
    let (_dir, path) = script_dir(&[(
        "gain.jsfx",
        "desc:Gain\nslider1:gain_db=-6<-60,12,0.1>Gain (dB)\n\
         @slider\ngain = 10 ^ 0;\nscale = 0.5;\n\
         @sample\nspl0 = spl0 * scale;\nspl1 = spl1 * scale;\n",
    )]);
    let mut fx = Effect::new(Config::default(), Box::new(MiniVm::new()));
    assert!(!fx.is_loaded());
    fx.load(&path, LoadOptions::NONE).unwrap();
    assert!(fx.is_loaded());
    assert!(!fx.is_compiled());

    // unsupported operator in @slider
    assert!(fx.compile(CompileOptions::NONE).is_err());
    assert!(!fx.is_compiled());
}

#[test]
fn test_stereo_processing_f32_and_f64() {
    let (_dir, path) = script_dir(&[(
        "mix.jsfx",
        "desc:Mix\nslider1:0.5<0,1>Amount\n@sample\nspl0 = spl0 * slider1;\nspl1 = spl1 + 1;\n",
    )]);
    let mut fx = compiled(&path);
    assert_eq!(fx.num_inputs(), 2);
    assert_eq!(fx.num_outputs(), 2);

    let left = [0.2f32, 0.4, 0.6, 0.8];
    let right = [0.0f32; 4];
    let mut out_l = [0.0f32; 4];
    let mut out_r = [0.0f32; 4];
    fx.process_f32(&[&left, &right], &mut [&mut out_l, &mut out_r], 4);
    for (o, i) in out_l.iter().zip(&left) {
        assert_abs_diff_eq!(*o, i * 0.5, epsilon = 1e-6);
    }
    assert_eq!(out_r, [1.0; 4]);

    let left = [1.0f64; 3];
    let mut out_l = [0.0f64; 3];
    let mut out_r = [0.0f64; 3];
    fx.process_f64(&[&left], &mut [&mut out_l, &mut out_r], 3);
    assert_eq!(out_l, [0.5; 3]);
    // second input not supplied, read as silence
    assert_eq!(out_r, [1.0; 3]);
}

#[test]
fn test_failed_compile_leaves_effect_silent() {
    let (_dir, path) = script_dir(&[(
        "broken.jsfx",
        "desc:Broken\n@init\nran = 1;\n@block\nslider1 = 5;\n@sample\nspl0 = ;\n",
    )]);
    let mut fx = Effect::new(Config::default(), Box::new(MiniVm::new()));
    fx.load(&path, LoadOptions::NONE).unwrap();
    let err = fx.compile(CompileOptions::NONE).unwrap_err();
    assert_eq!(err.error_code(), "COMPILE_ERROR");
    assert!(!fx.is_compiled());

    let input = [0.7f32; 8];
    let mut out_l = [1.0f32; 8];
    let mut out_r = [1.0f32; 8];
    fx.process_f32(&[&input, &input], &mut [&mut out_l, &mut out_r], 8);
    assert_eq!(out_l, [0.0; 8]);
    assert_eq!(out_r, [0.0; 8]);
    assert_eq!(fx.slider_value(0), 0.0);
}

#[test]
fn test_compile_error_is_reported() {
    let (_dir, path) = script_dir(&[("bad.jsfx", "desc:Bad\n@block\nx = (1;\n")]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let config = Config::new().with_log_reporter(move |level, msg| {
        sink.lock().unwrap().push((level, msg.to_string()));
    });
    let mut fx = Effect::new(config, Box::new(MiniVm::new()));
    fx.load(&path, LoadOptions::NONE).unwrap();
    assert!(fx.compile(CompileOptions::NONE).is_err());

    let seen = seen.lock().unwrap();
    assert!(seen.iter().any(|(level, msg)| *level == LogLevel::Error && msg.contains("@block")));
}

#[test]
fn test_parse_error_fails_load() {
    let (_dir, path) = script_dir(&[("dup.jsfx", "desc:Dup\n@block\n@block\n")]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let config = Config::new().with_log_reporter(move |_, msg| {
        sink.lock().unwrap().push(msg.to_string());
    });
    let mut fx = Effect::new(config, Box::new(MiniVm::new()));
    let err = fx.load(&path, LoadOptions::NONE).unwrap_err();
    assert_eq!(err.error_code(), "PARSE_ERROR");
    assert!(!fx.is_loaded());

    // lines are 1-based, counting the header
    let seen = seen.lock().unwrap();
    assert!(seen.iter().any(|msg| msg.ends_with("dup.jsfx:3: duplicate @block section")));
}

// === Pins ===

#[test_case("in_pin:none\nout_pin:none\n", 0, 0 ; "explicit none")]
#[test_case("", 2, 2 ; "default stereo")]
#[test_case("in_pin:mono\nout_pin:left\nout_pin:right\n", 1, 2 ; "named pins")]
fn test_pin_counts(pins: &str, inputs: usize, outputs: usize) {
    let text = format!("desc:Pins\n{}@sample\nspl0 = spl0;\n", pins);
    let (_dir, path) = script_dir(&[("pins.jsfx", &text)]);
    let fx = compiled(&path);
    assert_eq!(fx.num_inputs(), inputs);
    assert_eq!(fx.num_outputs(), outputs);
}

#[test]
fn test_extra_outputs_are_zeroed() {
    let (_dir, path) = script_dir(&[(
        "mono.jsfx",
        "desc:Mono\nin_pin:in\nout_pin:out\n@sample\nspl0 = spl0 * 2;\n",
    )]);
    let mut fx = compiled(&path);
    let input = [0.25f32; 4];
    let mut out0 = [9.0f32; 4];
    let mut out1 = [9.0f32; 4];
    fx.process_f32(&[&input, &input], &mut [&mut out0, &mut out1], 4);
    assert_eq!(out0, [0.5; 4]);
    assert_eq!(out1, [0.0; 4]);
}

#[test]
fn test_block_only_script_passes_declared_channels() {
    let (_dir, path) = script_dir(&[(
        "thru.jsfx",
        "desc:Thru\nin_pin:in\nout_pin:out\n@block\nslider1 = samplesblock;\n",
    )]);
    let mut fx = compiled(&path);
    let input = [0.3f32; 6];
    let mut out0 = [0.0f32; 6];
    let mut out1 = [5.0f32; 6];
    fx.process_f32(&[&input, &input], &mut [&mut out0, &mut out1], 6);
    assert_eq!(out0, input);
    assert_eq!(out1, [0.0; 6]);
    assert_eq!(fx.slider_value(0), 6.0);
}

// === Imports ===

#[test]
fn test_diamond_import_init_order() {
    let (_dir, path) = script_dir(&[
        ("a.jsfx", "desc:A\nimport b.jsfx-inc\nimport c.jsfx-inc\n@init\norder = order * 10 + 1;\n@block\nslider1 = order;\n"),
        ("b.jsfx-inc", "import d.jsfx-inc\n@init\norder = order * 10 + 2;\n"),
        ("c.jsfx-inc", "import d.jsfx-inc\n@init\norder = order * 10 + 3;\n"),
        ("d.jsfx-inc", "@init\norder = order * 10 + 4;\n@block\nslider1 = 99;\n"),
    ]);
    let mut fx = compiled(&path);
    run_block(&mut fx);
    // D runs once, before B and C, and A runs last; @block comes from A
    assert_eq!(fx.slider_value(0), 4231.0);
}

#[test]
fn test_ignore_imports() {
    let (_dir, path) = script_dir(&[(
        "solo.jsfx",
        "desc:Solo\nimport missing.jsfx-inc\n@block\nslider1 = 1;\n",
    )]);
    let mut fx = Effect::new(Config::default(), Box::new(MiniVm::new()));
    assert_eq!(fx.load(&path, LoadOptions::NONE).unwrap_err().error_code(), "LOAD_ERROR");
    fx.load(&path, LoadOptions::IGNORE_IMPORTS).unwrap();
    assert!(fx.header().unwrap().imports.is_empty());
}

#[test]
fn test_import_provides_singleton_section() {
    let (_dir, path) = script_dir(&[
        ("main.jsfx", "desc:Main\nimport lib.jsfx-inc\n@init\nk = 3;\n"),
        ("lib.jsfx-inc", "@block\nslider1 = k * 2;\n"),
    ]);
    let mut fx = compiled(&path);
    run_block(&mut fx);
    assert_eq!(fx.slider_value(0), 6.0);
}

// === Sliders ===

#[test]
fn test_enum_range_warning_reported() {
    let (_dir, path) = script_dir(&[(
        "enum.jsfx",
        "desc:Enum\nslider1:0<5,9,2{One,Two,Three}>Mode\n",
    )]);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let config = Config::new().with_log_reporter(move |level, msg| {
        sink.lock().unwrap().push((level, msg.to_string()));
    });
    let mut fx = Effect::new(config, Box::new(MiniVm::new()));
    fx.load(&path, LoadOptions::NONE).unwrap();

    let slider = fx.slider(0).unwrap();
    assert_eq!((slider.min, slider.max, slider.inc), (0.0, 2.0, 1.0));
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, LogLevel::Warning);
    assert!(seen[0].1.starts_with("slider1:"));
}

#[test]
fn test_slider_alias_and_notifications() {
    let (_dir, path) = script_dir(&[(
        "notify.jsfx",
        "desc:Notify\nslider1:cutoff=1000<20,20000>Cutoff\nslider2:0<0,1>-Hidden\n\
         @block\ncutoff = 500;\nsliderchange(cutoff);\nslider_automate(2);\nslider_show(slider2, 1);\n",
    )]);
    let mut fx = compiled(&path);
    assert_eq!(fx.slider_count(), 2);
    assert_eq!(fx.slider_visibility(), 0b01);

    run_block(&mut fx);
    assert_eq!(fx.slider_value(0), 500.0);
    let ui = fx.ui();
    assert_eq!(ui.fetch_slider_changes(), 0b11);
    assert_eq!(ui.fetch_slider_changes(), 0);
    assert_eq!(ui.fetch_slider_automations(), 0b10);
    assert_eq!(ui.slider_visibility(), 0b11);
}

// === MIDI ===

#[test]
fn test_midi_through_and_generation() {
    let (_dir, path) = script_dir(&[(
        "midi.jsfx",
        "desc:Midi\n@block\nr = midirecv(ofs, m1, m23);\nslider1 = r > 0;\nmidisend(ofs, m1, m23 + 1);\nmidisend(3, 176, 7);\n",
    )]);
    let mut fx = compiled(&path);
    assert!(fx.send_midi(&MidiEvent::new(0, 5, &[0x90, 60, 100])));
    run_block(&mut fx);

    assert_eq!(fx.slider_value(0), 1.0);
    let first = fx.receive_midi().map(|e| (e.offset, e.data.to_vec()));
    assert_eq!(first, Some((5, vec![0x90, 61, 100])));
    let second = fx.receive_midi().map(|e| (e.offset, e.data.to_vec()));
    assert_eq!(second, Some((3, vec![176, 7, 0])));
    assert!(fx.receive_midi().is_none());

    // input is consumed by the cycle; the variables keep their last values
    run_block(&mut fx);
    assert_eq!(fx.slider_value(0), 0.0);
    let repeated = fx.receive_midi().map(|e| e.data.to_vec());
    assert_eq!(repeated, Some(vec![0x90, 61, 100]));
}

#[derive(Default)]
struct Recorder {
    calls: Arc<Mutex<Vec<String>>>,
}

impl GfxBackend for Recorder {
    fn size(&self) -> (u32, u32) {
        (400, 300)
    }

    fn call(&mut self, name: &str, _args: &[ArgRef], _vm: &mut dyn VmAccess) -> f64 {
        self.calls.lock().unwrap().push(name.to_string());
        1.0
    }

    fn take_dirty(&mut self) -> bool {
        !self.calls.lock().unwrap().is_empty()
    }
}

#[test]
fn test_midi_from_drawing_role_is_inert() {
    let (_dir, path) = script_dir(&[(
        "draw.jsfx",
        "desc:Draw\n@block\nslider2 = midisend(0, 144, 15420);\n\
         @gfx 400 300\nslider1 = midisend(0, 144, 15420) + 10;\ngfx_rect(0, 0, gfx_w, gfx_h);\n",
    )]);
    let mut fx = compiled(&path);
    assert_eq!(fx.gfx_size(), Some((400, 300)));
    run_block(&mut fx);
    assert_eq!(fx.slider_value(1), 144.0);
    let before = fx.receive_midi().map(|e| e.data.to_vec());
    assert_eq!(before, Some(vec![144, 60, 60]));

    let recorder = Recorder::default();
    let calls = Arc::clone(&recorder.calls);
    let ui = fx.ui();
    ui.set_gfx_backend(Box::new(recorder));
    assert!(ui.run_gfx());

    assert_eq!(fx.slider_value(0), 10.0);
    assert_eq!(calls.lock().unwrap().as_slice(), ["gfx_rect".to_string()]);
    // nothing new was queued by the drawing pass
    assert!(fx.receive_midi().is_none());
}

#[test]
fn test_gfx_skipped_by_compile_option() {
    let (_dir, path) = script_dir(&[("g.jsfx", "desc:G\n@gfx\nslider1 = 1;\n")]);
    let mut fx = Effect::new(Config::default(), Box::new(MiniVm::new()));
    fx.load(&path, LoadOptions::NONE).unwrap();
    fx.compile(CompileOptions::SKIP_GFX).unwrap();

    let ui = fx.ui();
    ui.set_gfx_backend(Box::new(Recorder::default()));
    assert!(!ui.has_gfx());
    assert!(!ui.run_gfx());
    assert_eq!(fx.slider_value(0), 0.0);
}

/// Blocks inside its first drawing call until released
struct Parked {
    entered: mpsc::Sender<()>,
    release: mpsc::Receiver<()>,
}

impl GfxBackend for Parked {
    fn size(&self) -> (u32, u32) {
        (100, 100)
    }

    fn call(&mut self, _name: &str, _args: &[ArgRef], _vm: &mut dyn VmAccess) -> f64 {
        let _ = self.entered.send(());
        let _ = self.release.recv();
        1.0
    }

    fn take_dirty(&mut self) -> bool {
        true
    }
}

#[test]
fn test_audio_bypasses_while_drawing() {
    let (_dir, path) = script_dir(&[(
        "half.jsfx",
        "desc:Half\nin_pin:in\nout_pin:out\n@sample\nspl0 = spl0 * 0.5;\n\
         @gfx 100 100\ngfx_rect(0, 0, 1, 1);\n",
    )]);
    let mut fx = compiled(&path);
    let input = [1.0f32; 4];
    let mut out = [0.0f32; 4];
    fx.process_f32(&[&input], &mut [&mut out], 4);
    assert_eq!(out, [0.5; 4]);

    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let ui = fx.ui();
    ui.set_gfx_backend(Box::new(Parked {
        entered: entered_tx,
        release: release_rx,
    }));
    let drawing = thread::spawn(move || ui.run_gfx());
    entered_rx.recv().unwrap();

    // the drawing pass holds the VM: audio passes through without waiting
    assert!(fx.send_midi(&MidiEvent::new(0, 2, &[0x90, 60, 100])));
    fx.process_f32(&[&input], &mut [&mut out], 4);
    assert_eq!(out, [1.0; 4]);
    let forwarded = fx.receive_midi().map(|e| (e.offset, e.data.to_vec()));
    assert_eq!(forwarded, Some((2, vec![0x90, 60, 100])));

    release_tx.send(()).unwrap();
    assert!(drawing.join().unwrap());

    fx.process_f32(&[&input], &mut [&mut out], 4);
    assert_eq!(out, [0.5; 4]);
}

// === State ===

#[test]
fn test_state_roundtrip_law() {
    let (_dir, path) = script_dir(&[(
        "state.jsfx",
        "desc:State\nslider1:0.5<0,1>A\nslider2:3<0,10>B\nslider5:-1<-1,1>E\n\
         @init\na = 1.5;\nb = 42;\n@serialize\nfile_var(0, a);\nfile_var(0, b);\nfile_string(0, 7);\n",
    )]);
    let mut fx = compiled(&path);
    run_block(&mut fx);
    fx.set_slider_value(1, 8.0);

    let state = fx.save_state().unwrap();
    assert_eq!(state.sliders.len(), 3);
    let restored = State::from_bytes(&state.to_bytes()).unwrap();
    assert_eq!(restored, state);

    assert!(fx.load_state(&restored));
    assert_eq!(fx.save_state().unwrap(), state);
}

#[test]
fn test_state_survives_another_instance() {
    let (_dir, path) = script_dir(&[(
        "copy.jsfx",
        "desc:Copy\nslider1:0<0,10>A\n@serialize\nfile_var(0, stored);\n@block\nslider1 = stored;\n",
    )]);
    let mut source = compiled(&path);
    let mut target = compiled(&path);

    // write mode in source: stored is 0
    let mut state = source.save_state().unwrap();
    state.data = 6.0f32.to_le_bytes().to_vec();
    assert!(target.load_state(&state));
    run_block(&mut target);
    assert_eq!(target.slider_value(0), 6.0);
}

// === File I/O ===

#[test]
fn test_script_reads_data_files() {
    let (dir, path) = script_dir(&[
        (
            "reader.jsfx",
            "desc:Reader\nfilename:0,table.txt\n\
             @init\nh = file_open(0);\nn = file_avail(h);\nfile_var(h, first);\nfile_close(h);\n\
             bad = file_open(\"missing.txt\");\n\
             @block\nslider1 = n;\nslider2 = first;\nslider3 = bad;\n",
        ),
        ("table.txt", "1.5, 2 3 // comment\n4\n"),
    ]);
    let mut fx = compiled(&path);
    run_block(&mut fx);
    assert_eq!(fx.slider_value(0), 4.0);
    assert_eq!(fx.slider_value(1), 1.5);
    assert_eq!(fx.slider_value(2), -1.0);
    drop(dir);
}

#[test]
fn test_data_root_fallback() {
    let data = tempdir().unwrap();
    fs::write(data.path().join("coeffs.raw"), [0.25f32, 0.5].iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<u8>>()).unwrap();
    let (_dir, path) = script_dir(&[(
        "raw.jsfx",
        "desc:Raw\nfilename:0,coeffs.raw\n@init\nh = file_open(0);\nfile_mem(h, 10, 2);\n@block\nslider1 = 10[0] + 10[1];\n",
    )]);

    let config = Config::new().with_data_root(data.path());
    let mut fx = Effect::new(config, Box::new(MiniVm::new()));
    fx.load(&path, LoadOptions::NONE).unwrap();
    fx.compile(CompileOptions::NONE).unwrap();
    run_block(&mut fx);
    assert_abs_diff_eq!(fx.slider_value(0), 0.75);
}

#[test]
fn test_file_mem_oversized_length() {
    let (dir, path) = script_dir(&[(
        "raw.jsfx",
        "desc:Raw\nfilename:0,coeffs.raw\n\
         @init\nh = file_open(0);\nslider2 = file_mem(h, 10, 100000000000000000000);\n\
         @block\nslider1 = 10[0] + 10[1];\n",
    )]);
    let values: Vec<u8> = [0.25f32, 0.5].iter().flat_map(|v| v.to_le_bytes()).collect();
    fs::write(dir.path().join("coeffs.raw"), values).unwrap();

    let mut fx = compiled(&path);
    run_block(&mut fx);
    // only what the file holds is copied
    assert_eq!(fx.slider_value(1), 2.0);
    assert_abs_diff_eq!(fx.slider_value(0), 0.75);
}
