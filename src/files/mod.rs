//! Script file I/O
//!
//! Open files live in a table of up to [`MAX_FILE_HANDLES`] slots. Slot 0
//! always holds the serializer used by `@serialize`; other slots are reused
//! first-fit after a close.
//!
//! The table and each file have their own lock. A caller takes the table
//! lock only long enough to fetch the file, then locks the file for the
//! duration of one operation.

pub mod audio;
pub mod handle;

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::config::Config;
use crate::engine::sync::lock;
use crate::error::{FxError, Result};
use crate::source::imports::case_resolve;

pub use audio::{AudioFormat, AudioInfo, AudioReader, WavFormat};
pub use handle::{FileHandle, SerializeMode, Serializer};

/// Capacity of the file table, serializer included
pub const MAX_FILE_HANDLES: usize = 64;

/// Shared reference to one open file
pub type SharedFile = Arc<Mutex<FileHandle>>;

/// Table of files opened by a script
#[derive(Debug)]
pub struct FileTable {
    list: Mutex<Vec<Option<SharedFile>>>,
}

impl Default for FileTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FileTable {
    pub fn new() -> Self {
        let serializer = Arc::new(Mutex::new(FileHandle::Serializer(Serializer::default())));
        Self {
            list: Mutex::new(vec![Some(serializer)]),
        }
    }

    /// Store `file` in the first free slot, returning its handle
    pub fn insert(&self, file: FileHandle) -> Result<usize> {
        let mut list = lock(&self.list);
        let file = Arc::new(Mutex::new(file));
        if let Some(index) = list.iter().position(Option::is_none) {
            list[index] = Some(file);
            return Ok(index);
        }
        if list.len() >= MAX_FILE_HANDLES {
            return Err(FxError::ResourceExhausted {
                resource: format!("file handles (limit {})", MAX_FILE_HANDLES),
            });
        }
        list.push(Some(file));
        Ok(list.len() - 1)
    }

    /// Fetch an open file; the table lock is released on return
    pub fn get(&self, handle: i64) -> Option<SharedFile> {
        let list = lock(&self.list);
        let index = usize::try_from(handle).ok()?;
        list.get(index)?.as_ref().map(Arc::clone)
    }

    /// Run `op` on an open file while holding its lock
    pub fn with<R>(&self, handle: i64, op: impl FnOnce(&mut FileHandle) -> R) -> Option<R> {
        let file = self.get(handle)?;
        let mut guard = lock(&file);
        Some(op(&mut guard))
    }

    /// Close `handle`; the serializer cannot be closed
    pub fn close(&self, handle: i64) -> Result<()> {
        let mut list = lock(&self.list);
        let slot = usize::try_from(handle)
            .ok()
            .filter(|&i| i > 0)
            .and_then(|i| list.get_mut(i))
            .filter(|slot| slot.is_some())
            .ok_or(FxError::InvalidHandle { kind: "file", index: handle })?;
        if let Some(file) = slot.take() {
            // Wait for any operation in flight on this file
            drop(lock(&file));
        }
        while list.len() > 1 && list.last().is_some_and(Option::is_none) {
            list.pop();
        }
        Ok(())
    }

    /// Close every file except the serializer
    pub fn clear(&self) {
        let mut list = lock(&self.list);
        while list.len() > 1 {
            if let Some(Some(file)) = list.pop() {
                drop(lock(&file));
            }
        }
    }

    /// Number of open files, serializer included
    pub fn open_count(&self) -> usize {
        lock(&self.list).iter().filter(|slot| slot.is_some()).count()
    }

    /// Bind the serializer to `data` for one `@serialize` pass
    pub fn begin_serialize(&self, mode: SerializeMode, data: Vec<u8>) {
        self.with(0, |file| {
            if let FileHandle::Serializer(s) = file {
                s.begin(mode, data);
            }
        });
    }

    /// Unbind the serializer, returning what was written
    pub fn end_serialize(&self) -> Vec<u8> {
        self.with(0, |file| match file {
            FileHandle::Serializer(s) => s.end(),
            _ => Vec::new(),
        })
        .unwrap_or_default()
    }
}

/// Locate a data file referenced by a script
///
/// Absolute paths are accepted only when `allow_absolute` is set (literal
/// string names). Relative names are tried next to the script, then under
/// the configured data root.
pub fn find_data_file(
    name: &str,
    allow_absolute: bool,
    script_dir: Option<&Path>,
    config: &Config,
) -> Option<PathBuf> {
    let path = Path::new(name);
    if path.is_absolute() {
        return (allow_absolute && path.is_file()).then(|| path.to_path_buf());
    }
    script_dir
        .into_iter()
        .chain(config.data_root())
        .find_map(|dir| case_resolve(dir, path))
}

/// Open `path` as the variant its name calls for
///
/// `.txt` opens as text and `.raw` as raw floats; otherwise the first audio
/// format that claims the file is used.
pub fn open_data_file(path: &Path, config: &Config) -> Result<FileHandle> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("txt") => FileHandle::open_text(path),
        Some("raw") => FileHandle::open_raw(path),
        _ => {
            let format = config
                .audio_formats
                .iter()
                .find(|format| format.can_handle(path))
                .ok_or_else(|| FxError::load(path, "unrecognized file type"))?;
            Ok(FileHandle::Audio(format.open(path)?))
        }
    }
}
