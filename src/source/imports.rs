//! Import resolution
//!
//! Imports are searched next to the importing file, then under the
//! configured import root: first as a direct (case-insensitive) match, then
//! by walking the import root. Files are deduplicated by identity, so cyclic
//! and diamond import graphs terminate.
//!
//! Resolved units are stored in post-order: a unit's own imports come before
//! the unit itself.

use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use super::SourceUnit;
use crate::error::{FxError, Result};

/// Maximum import nesting depth
pub const MAX_IMPORT_DEPTH: usize = 32;

/// Stable identity of a file, independent of the path used to reach it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileIdentity {
    Inode { device: u64, inode: u64 },
    Canonical(PathBuf),
}

impl FileIdentity {
    #[cfg(unix)]
    pub fn of(path: &Path) -> std::io::Result<Self> {
        use std::os::unix::fs::MetadataExt;

        let meta = fs::metadata(path)?;
        Ok(FileIdentity::Inode {
            device: meta.dev(),
            inode: meta.ino(),
        })
    }

    #[cfg(not(unix))]
    pub fn of(path: &Path) -> std::io::Result<Self> {
        Ok(FileIdentity::Canonical(fs::canonicalize(path)?))
    }
}

/// Find the file an `import` directive refers to
pub fn resolve_import(name: &str, importing_dir: Option<&Path>, import_root: Option<&Path>) -> Option<PathBuf> {
    let relative = Path::new(name);
    if relative.is_absolute() {
        return relative.is_file().then(|| relative.to_path_buf());
    }

    for dir in importing_dir.into_iter().chain(import_root) {
        if let Some(found) = case_resolve(dir, relative) {
            return Some(found);
        }
    }

    let wanted = relative.file_name()?.to_string_lossy().to_lowercase();
    let root = import_root?;
    WalkDir::new(root)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .find(|entry| {
            entry.file_type().is_file() && entry.file_name().to_string_lossy().to_lowercase() == wanted
        })
        .map(|entry| entry.into_path())
}

/// Resolve `relative` under `dir`, matching each component case-insensitively
pub fn case_resolve(dir: &Path, relative: &Path) -> Option<PathBuf> {
    let direct = dir.join(relative);
    if direct.is_file() {
        return Some(direct);
    }

    let mut current = dir.to_path_buf();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                let wanted = part.to_string_lossy().to_lowercase();
                let entry = fs::read_dir(&current)
                    .ok()?
                    .filter_map(|entry| entry.ok())
                    .find(|entry| entry.file_name().to_string_lossy().to_lowercase() == wanted)?;
                current = entry.path();
            }
            Component::CurDir => {}
            Component::ParentDir => current = current.parent()?.to_path_buf(),
            _ => return None,
        }
    }
    current.is_file().then_some(current)
}

/// Recursive, cycle-safe loader of imported units
pub struct ImportResolver<'a> {
    import_root: Option<&'a Path>,
    seen: HashSet<FileIdentity>,
    units: Vec<SourceUnit>,
}

impl<'a> ImportResolver<'a> {
    pub fn new(import_root: Option<&'a Path>) -> Self {
        Self {
            import_root,
            seen: HashSet::new(),
            units: Vec::new(),
        }
    }

    /// Resolve every import reachable from `main`
    ///
    /// Returns the imported units in post-order; `main` itself is not
    /// included.
    pub fn resolve(mut self, main: &SourceUnit) -> Result<Vec<SourceUnit>> {
        if let Some(path) = &main.path {
            if let Ok(identity) = FileIdentity::of(path) {
                self.seen.insert(identity);
            }
        }
        self.visit(main, 0)?;
        Ok(self.units)
    }

    fn visit(&mut self, unit: &SourceUnit, depth: usize) -> Result<()> {
        if unit.header.imports.is_empty() {
            return Ok(());
        }
        let origin = unit.path.clone().unwrap_or_default();
        if depth >= MAX_IMPORT_DEPTH {
            return Err(FxError::load(origin, "too many import levels"));
        }

        for name in &unit.header.imports {
            let path = resolve_import(name, unit.directory(), self.import_root)
                .ok_or_else(|| FxError::load(&origin, format!("cannot find import '{}'", name)))?;
            let identity = FileIdentity::of(&path).map_err(|e| FxError::load_io(&path, e))?;
            if !self.seen.insert(identity) {
                log::debug!("import '{}' already loaded, skipping", name);
                continue;
            }

            let imported = SourceUnit::load(&path)?;
            self.visit(&imported, depth + 1)?;
            log::debug!("imported {}", path.display());
            self.units.push(imported);
        }
        Ok(())
    }
}
