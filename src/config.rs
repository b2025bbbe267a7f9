//! Host configuration
//!
//! Search roots, injected audio formats, the message reporter and the
//! load/compile option flags.

use std::fmt;
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::files::audio::{AudioFormat, WavFormat};

/// Severity of a message forwarded to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Callback receiving user-visible messages
pub type LogReporter = Arc<dyn Fn(LogLevel, &str) + Send + Sync>;

/// Default initial reservation of each MIDI buffer, in bytes
pub const DEFAULT_MIDI_CAPACITY: usize = 4096;

/// Configuration shared by every effect created from it
#[derive(Clone)]
pub struct Config {
    /// Extra root searched when resolving `import` directives
    pub import_root: Option<PathBuf>,
    /// Extra root searched when scripts open data files
    pub data_root: Option<PathBuf>,
    /// Audio file readers, consulted in order
    pub audio_formats: Vec<Arc<dyn AudioFormat>>,
    /// Receiver for user-visible messages
    pub log_reporter: Option<LogReporter>,
    /// Initial reservation of each MIDI buffer, in bytes
    pub midi_capacity: usize,
    /// Whether the MIDI output buffer may grow past `midi_capacity`
    pub midi_output_extensible: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            import_root: None,
            data_root: None,
            audio_formats: vec![Arc::new(WavFormat)],
            log_reporter: None,
            midi_capacity: DEFAULT_MIDI_CAPACITY,
            midi_output_extensible: true,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("import_root", &self.import_root)
            .field("data_root", &self.data_root)
            .field("audio_formats", &self.audio_formats.len())
            .field("log_reporter", &self.log_reporter.is_some())
            .field("midi_capacity", &self.midi_capacity)
            .field("midi_output_extensible", &self.midi_output_extensible)
            .finish()
    }
}

impl Config {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_import_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.import_root = Some(root.into());
        self
    }

    pub fn with_data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.data_root = Some(root.into());
        self
    }

    /// Register an additional audio format ahead of the bundled ones
    pub fn with_audio_format(mut self, format: Arc<dyn AudioFormat>) -> Self {
        self.audio_formats.insert(0, format);
        self
    }

    pub fn with_log_reporter<F>(mut self, reporter: F) -> Self
    where
        F: Fn(LogLevel, &str) + Send + Sync + 'static,
    {
        self.log_reporter = Some(Arc::new(reporter));
        self
    }

    /// Fix the MIDI output buffer to `capacity` bytes
    pub fn with_fixed_midi_output(mut self, capacity: usize) -> Self {
        self.midi_capacity = capacity;
        self.midi_output_extensible = false;
        self
    }

    pub fn import_root(&self) -> Option<&Path> {
        self.import_root.as_deref()
    }

    pub fn data_root(&self) -> Option<&Path> {
        self.data_root.as_deref()
    }

    /// Emit a message on the log facade and forward it to the reporter
    pub fn report(&self, level: LogLevel, message: &str) {
        match level {
            LogLevel::Info => log::info!("{}", message),
            LogLevel::Warning => log::warn!("{}", message),
            LogLevel::Error => log::error!("{}", message),
        }
        if let Some(reporter) = &self.log_reporter {
            reporter(level, message);
        }
    }
}

macro_rules! option_flags {
    ($(#[$meta:meta])* $name:ident { $($(#[$fmeta:meta])* $flag:ident = $bit:expr),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
        pub struct $name(u32);

        impl $name {
            pub const NONE: Self = Self(0);
            $($(#[$fmeta])* pub const $flag: Self = Self($bit);)*

            pub fn bits(self) -> u32 {
                self.0
            }

            pub fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }
        }

        impl BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }
    };
}

option_flags! {
    /// Flags accepted by `Effect::load`
    LoadOptions {
        /// Do not resolve `import` directives
        IGNORE_IMPORTS = 1,
    }
}

option_flags! {
    /// Flags accepted by `Effect::compile`
    CompileOptions {
        /// Leave `@gfx` uncompiled
        SKIP_GFX = 1,
        /// Leave `@serialize` uncompiled
        SKIP_SERIALIZE = 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_option_flags() {
        let opts = CompileOptions::SKIP_GFX | CompileOptions::SKIP_SERIALIZE;
        assert!(opts.contains(CompileOptions::SKIP_GFX));
        assert!(opts.contains(CompileOptions::SKIP_SERIALIZE));
        assert!(!CompileOptions::NONE.contains(CompileOptions::SKIP_GFX));
        assert_eq!(LoadOptions::default(), LoadOptions::NONE);
    }

    #[test]
    fn test_reporter_receives_messages() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let config = Config::new().with_log_reporter(move |level, msg| {
            sink.lock().unwrap().push((level, msg.to_string()));
        });

        config.report(LogLevel::Warning, "careful");
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (LogLevel::Warning, "careful".to_string()));
    }

    #[test]
    fn test_report_without_reporter_is_silent() {
        Config::default().report(LogLevel::Error, "nobody listens");
    }
}
