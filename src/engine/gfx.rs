//! Drawing envelope
//!
//! The drawing role runs `@gfx` through [`GfxEnvelope::run_pass`]. One mutex
//! covers the lazy re-initialization and the whole pass, so initialization,
//! drawing and teardown never interleave. The audio role requests a
//! re-initialization through an atomic flag, checked and cleared under that
//! mutex.

use std::collections::{BTreeSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::sync::lock;
use super::vars::RuntimeVars;
use crate::vm::{ArgRef, CodeHandle, VmAccess};

/// Keys kept in the input queue before the oldest are dropped
pub const MAX_QUEUED_KEYS: usize = 32;

/// Opaque rasterizer driven by `gfx_*` calls
pub trait GfxBackend: Send {
    /// Size of the drawing surface in pixels
    fn size(&self) -> (u32, u32);

    /// Device pixel ratio of the surface
    fn scale(&self) -> f64 {
        1.0
    }

    /// Drop images, fonts and other per-context state
    fn reset(&mut self) {}

    /// Run drawing function `name`; unknown names return 0
    fn call(&mut self, name: &str, args: &[ArgRef], vm: &mut dyn VmAccess) -> f64;

    /// Report whether the surface changed since the last call
    fn take_dirty(&mut self) -> bool;
}

/// Keyboard modifiers for [`GfxEnvelope::update_mouse`]
pub mod modifiers {
    pub const SHIFT: u32 = 1;
    pub const CTRL: u32 = 1 << 1;
    pub const ALT: u32 = 1 << 2;
    pub const SUPER: u32 = 1 << 3;
}

/// Mouse buttons for [`GfxEnvelope::update_mouse`]
pub mod buttons {
    pub const LEFT: u32 = 1;
    pub const MIDDLE: u32 = 1 << 1;
    pub const RIGHT: u32 = 1 << 2;
}

/// Keyboard state visible to `gfx_getchar`
#[derive(Debug, Default)]
pub struct KeyState {
    queue: VecDeque<u32>,
    pressed: BTreeSet<u32>,
}

impl KeyState {
    /// Pop the next queued key, 0 when empty
    pub fn next_key(&mut self) -> u32 {
        self.queue.pop_front().unwrap_or(0)
    }

    pub fn is_pressed(&self, key: u32) -> bool {
        self.pressed.contains(&key)
    }

    fn clear(&mut self) {
        self.queue.clear();
        self.pressed.clear();
    }
}

/// State guarded by the drawing mutex
pub struct GfxState {
    /// Compiled `@gfx`, moved in after a successful compile
    pub code: Option<CodeHandle>,
    pub backend: Option<Box<dyn GfxBackend>>,
    pub keys: KeyState,
    /// True once a context has been initialized for the current code
    pub ready: bool,
}

/// Synchronization envelope around the drawing pass
pub struct GfxEnvelope {
    state: Mutex<GfxState>,
    must_init: AtomicBool,
    wants_retina: AtomicBool,
}

impl Default for GfxEnvelope {
    fn default() -> Self {
        Self {
            state: Mutex::new(GfxState {
                code: None,
                backend: None,
                keys: KeyState::default(),
                ready: false,
            }),
            must_init: AtomicBool::new(false),
            wants_retina: AtomicBool::new(false),
        }
    }
}

impl GfxEnvelope {
    /// Install freshly compiled `@gfx` code, returning the previous code
    pub fn install(&self, code: Option<CodeHandle>) -> Option<CodeHandle> {
        let mut state = lock(&self.state);
        state.ready = false;
        std::mem::replace(&mut state.code, code)
    }

    /// Remove the installed code so it can be freed
    pub fn take(&self) -> Option<CodeHandle> {
        self.install(None)
    }

    /// Attach the rasterizer used by drawing passes
    pub fn set_backend(&self, backend: Box<dyn GfxBackend>) {
        let mut state = lock(&self.state);
        state.backend = Some(backend);
        state.ready = false;
        self.must_init.store(true, Ordering::Release);
    }

    /// Ask the next drawing pass to start from a fresh context
    pub fn request_init(&self, wants_retina: bool) {
        self.wants_retina.store(wants_retina, Ordering::Relaxed);
        self.must_init.store(true, Ordering::Release);
    }

    pub fn wants_retina(&self) -> bool {
        self.wants_retina.load(Ordering::Relaxed)
    }

    pub fn has_code(&self) -> bool {
        lock(&self.state).code.is_some()
    }

    /// Record a key press or release
    pub fn add_key(&self, key: u32, pressed: bool) {
        let mut state = lock(&self.state);
        if !state.ready || key == 0 {
            return;
        }
        let keys = &mut state.keys;
        if pressed {
            while keys.queue.len() >= MAX_QUEUED_KEYS {
                keys.queue.pop_front();
            }
            keys.queue.push_back(key);
            keys.pressed.insert(key);
        } else {
            keys.pressed.remove(&key);
        }
    }

    /// Publish pointer state to the mouse variables
    pub fn update_mouse(
        &self,
        vars: &RuntimeVars,
        mods: u32,
        position: (i32, i32),
        pressed: u32,
        wheel: (f64, f64),
    ) {
        let state = lock(&self.state);
        if !state.ready {
            return;
        }
        let mouse = &vars.mouse;
        mouse.x.set(f64::from(position.0));
        mouse.y.set(f64::from(position.1));
        mouse.wheel.set(mouse.wheel.get() + 120.0 * wheel.0);
        mouse.hwheel.set(mouse.hwheel.get() + 120.0 * wheel.1);

        let mut cap = 0u32;
        for (flag, bit) in [
            (mods & modifiers::SHIFT, 8),
            (mods & modifiers::CTRL, 4),
            (mods & modifiers::ALT, 16),
            (mods & modifiers::SUPER, 32),
            (pressed & buttons::LEFT, 1),
            (pressed & buttons::MIDDLE, 64),
            (pressed & buttons::RIGHT, 2),
        ] {
            if flag != 0 {
                cap |= bit;
            }
        }
        mouse.cap.set(f64::from(cap));
    }

    /// Run one drawing pass under the drawing mutex
    ///
    /// `run` receives the code, the backend and the key state once the
    /// context is ready. Returns whether the surface changed, or false when
    /// no code or backend is installed.
    pub fn run_pass<F>(&self, vars: &RuntimeVars, run: F) -> bool
    where
        F: FnOnce(&CodeHandle, &mut dyn GfxBackend, &mut KeyState),
    {
        let mut guard = lock(&self.state);
        let state = &mut *guard;
        let (Some(code), Some(backend)) = (state.code.as_ref(), state.backend.as_mut()) else {
            return false;
        };

        if self.must_init.swap(false, Ordering::Acquire) || !state.ready {
            vars.reset_gfx();
            vars.gfx.dest.set(-1.0);
            vars.mouse.wheel.set(0.0);
            vars.mouse.hwheel.set(0.0);
            vars.mouse.cap.set(0.0);
            state.keys.clear();
            backend.reset();
            state.ready = true;
            log::debug!("drawing context initialized");
        }

        let (width, height) = backend.size();
        let scale = if self.wants_retina() { backend.scale() } else { 1.0 };
        let (mut w, mut h) = (f64::from(width), f64::from(height));
        if scale > 1.0 {
            w *= scale;
            h *= scale;
            vars.gfx.ext_retina.set(scale);
        }
        vars.gfx.w.set(w);
        vars.gfx.h.set(h);

        run(code, backend.as_mut(), &mut state.keys);
        backend.take_dirty()
    }
}
