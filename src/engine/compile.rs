//! Compilation pipeline
//!
//! Turns the loaded source units into VM code handles. `@init` compiles to a
//! list (imports in load order, main last). Every other section is a
//! singleton taken from the first unit that has it, searching main first and
//! then the imports in the same order.

use crate::config::CompileOptions;
use crate::error::{FxError, Result};
use crate::source::{Section, SectionKind, SourceUnit};
use crate::vm::{CodeHandle, SymbolResolver, Vm, DEFAULT_MEMORY_SLOTS, MAX_MEMORY_SLOTS};

/// Code handles of a fully compiled effect
#[derive(Debug, Default)]
pub struct CompiledCode {
    pub init: Vec<CodeHandle>,
    pub slider: Option<CodeHandle>,
    pub block: Option<CodeHandle>,
    pub sample: Option<CodeHandle>,
    pub gfx: Option<CodeHandle>,
    pub serialize: Option<CodeHandle>,
}

impl CompiledCode {
    /// Compile `main` and its `imports` (post-order)
    ///
    /// On failure every handle produced so far is freed before the error is
    /// returned.
    pub fn compile(
        vm: &mut dyn Vm,
        main: &SourceUnit,
        imports: &[SourceUnit],
        options: CompileOptions,
        symbols: &dyn SymbolResolver,
    ) -> Result<Self> {
        let header_options = &main.header.options;
        let slots = header_options
            .maxmem
            .map_or(DEFAULT_MEMORY_SLOTS, |m| m as usize)
            .min(MAX_MEMORY_SLOTS);
        vm.set_memory_limit(slots);
        vm.set_global_memory_name(header_options.gmem.as_deref());

        let mut code = CompiledCode::default();
        if let Err(e) = code.compile_all(vm, main, imports, options, symbols) {
            code.release(vm);
            return Err(e);
        }
        vm.update_named_strings();
        Ok(code)
    }

    fn compile_all(
        &mut self,
        vm: &mut dyn Vm,
        main: &SourceUnit,
        imports: &[SourceUnit],
        options: CompileOptions,
        symbols: &dyn SymbolResolver,
    ) -> Result<()> {
        for unit in imports.iter().chain(std::iter::once(main)) {
            if let Some(section) = &unit.init {
                let handle = compile_section(vm, section, symbols)?;
                self.init.push(handle);
            }
        }

        for kind in SectionKind::SINGLETONS {
            let skipped = match kind {
                SectionKind::Gfx => options.contains(CompileOptions::SKIP_GFX),
                SectionKind::Serialize => options.contains(CompileOptions::SKIP_SERIALIZE),
                _ => false,
            };
            if skipped {
                continue;
            }
            let Some(section) = find_singleton(main, imports, kind) else {
                continue;
            };
            let Some(slot) = self.slot_mut(kind) else {
                continue;
            };
            *slot = Some(compile_section(vm, section, symbols)?);
        }
        Ok(())
    }

    /// Handle slot of a singleton section; `@init` has none
    fn slot_mut(&mut self, kind: SectionKind) -> Option<&mut Option<CodeHandle>> {
        match kind {
            SectionKind::Init => None,
            SectionKind::Slider => Some(&mut self.slider),
            SectionKind::Block => Some(&mut self.block),
            SectionKind::Sample => Some(&mut self.sample),
            SectionKind::Gfx => Some(&mut self.gfx),
            SectionKind::Serialize => Some(&mut self.serialize),
        }
    }

    /// Return every handle to `vm`
    pub fn release(self, vm: &mut dyn Vm) {
        let singletons = [self.slider, self.block, self.sample, self.gfx, self.serialize];
        for handle in self.init.into_iter().chain(singletons.into_iter().flatten()) {
            vm.free_code(handle);
        }
    }
}

/// First unit with a `kind` section, searching `main` then `imports`
pub fn find_singleton<'a>(
    main: &'a SourceUnit,
    imports: &'a [SourceUnit],
    kind: SectionKind,
) -> Option<&'a Section> {
    std::iter::once(main)
        .chain(imports)
        .find_map(|unit| unit.section(kind))
}

fn compile_section(
    vm: &mut dyn Vm,
    section: &Section,
    symbols: &dyn SymbolResolver,
) -> Result<CodeHandle> {
    vm.compile(&section.text, section.line_offset, symbols)
        .map_err(|message| {
            let line = error_line(&message).unwrap_or(section.line_offset + 1);
            log::debug!("@{} failed to compile: {}", section.kind, message);
            FxError::Compile {
                section: section.kind,
                line,
                message,
            }
        })
}

/// Line number from a VM message of the form `line N: ...`
fn error_line(message: &str) -> Option<usize> {
    let rest = message.strip_prefix("line ")?;
    let end = rest.find(|c: char| !c.is_ascii_digit())?;
    rest[..end].parse().ok()
}
