//! Expression VM interface
//!
//! The host never interprets script code itself. It drives an external VM
//! through the [`Vm`] trait: compile section text into [`CodeHandle`]s,
//! execute them, and share variables with the VM through [`Var`] cells.
//! While code runs, the VM calls back into the host through [`ScriptHost`]
//! for every host-provided function.
//!
//! [`mini::MiniVm`] is a small reference implementation used by the tests and
//! the command-line tool.

pub mod mini;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Default VM memory size in slots
pub const DEFAULT_MEMORY_SLOTS: usize = 8 * 1024 * 1024;

/// Upper bound on VM memory size in slots
pub const MAX_MEMORY_SLOTS: usize = 32 * 1024 * 1024;

/// A variable cell shared between the VM and the host
///
/// Reads and writes are relaxed: scripts have no memory ordering guarantees
/// between the audio and drawing roles, and neither does the host.
pub struct VarCell(AtomicU64);

impl VarCell {
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl fmt::Debug for VarCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarCell({})", self.get())
    }
}

/// Shared handle to a variable cell
pub type Var = Arc<VarCell>;

/// Create a fresh variable holding `value`
pub fn new_var(value: f64) -> Var {
    Arc::new(VarCell::new(value))
}

/// Opaque reference to code compiled by a [`Vm`]
///
/// Handles are not `Clone`: each one must be returned to the VM that created
/// it through [`Vm::free_code`].
#[derive(Debug, PartialEq, Eq)]
pub struct CodeHandle(u64);

impl CodeHandle {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Host lookup consulted by the VM before its own symbol table
pub trait SymbolResolver {
    fn resolve(&self, name: &str) -> Option<Var>;
}

/// Resolver that never matches
pub struct NoSymbols;

impl SymbolResolver for NoSymbols {
    fn resolve(&self, _name: &str) -> Option<Var> {
        None
    }
}

/// One argument of a host function call
///
/// `var` is set when the script passed a plain variable, so the host can
/// write results back through it.
#[derive(Debug, Clone)]
pub struct ArgRef {
    pub value: f64,
    pub var: Option<Var>,
}

impl ArgRef {
    pub fn value(value: f64) -> Self {
        Self { value, var: None }
    }

    pub fn var(var: Var) -> Self {
        Self {
            value: var.get(),
            var: Some(var),
        }
    }

    /// Write through to the argument's variable, if it has one
    pub fn set(&self, value: f64) {
        if let Some(var) = &self.var {
            var.set(value);
        }
    }

    /// Check whether this argument is exactly `var`
    pub fn is(&self, var: &Var) -> bool {
        self.var.as_ref().is_some_and(|v| Arc::ptr_eq(v, var))
    }
}

/// Linear memory and string storage of a VM
pub trait VmAccess {
    /// Copy memory starting at `addr` into `out`, returning the count copied
    fn read_memory(&self, addr: usize, out: &mut [f64]) -> usize;

    /// Copy `values` into memory starting at `addr`, returning the count stored
    fn write_memory(&mut self, addr: usize, values: &[f64]) -> usize;

    /// Contents of the string identified by `id`
    fn string(&self, id: f64) -> Option<String>;

    /// Replace the string identified by `id`; false if `id` is not a string
    fn set_string(&mut self, id: f64, value: &str) -> bool;
}

/// Callbacks from running code into the host
pub trait ScriptHost {
    /// Invoke host function `name`; `None` if the host does not provide it
    fn call(&mut self, name: &str, args: &[ArgRef], vm: &mut dyn VmAccess) -> Option<f64>;
}

/// An expression-language VM
pub trait Vm: VmAccess + Send {
    /// Cap the addressable memory, in slots
    fn set_memory_limit(&mut self, slots: usize);

    /// Attach the VM to a named memory region shared between instances
    fn set_global_memory_name(&mut self, _name: Option<&str>) {}

    /// Create (or fetch) the host-owned variable `name`
    fn register_variable(&mut self, name: &str) -> Var;

    /// Compile `source`, whose first line is line `line_offset` of its file
    fn compile(
        &mut self,
        source: &str,
        line_offset: usize,
        symbols: &dyn SymbolResolver,
    ) -> Result<CodeHandle, String>;

    fn execute(&mut self, code: &CodeHandle, host: &mut dyn ScriptHost);

    fn free_code(&mut self, code: CodeHandle);

    /// Drop script-created variables and clear memory
    fn reset(&mut self);

    /// Rebuild the table of named string variables after a compile
    fn update_named_strings(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_cell_roundtrip() {
        let var = new_var(1.5);
        assert_eq!(var.get(), 1.5);
        var.set(-0.25);
        assert_eq!(var.get(), -0.25);
    }

    #[test]
    fn test_arg_ref_writes_through() {
        let var = new_var(0.0);
        let arg = ArgRef::var(Arc::clone(&var));
        arg.set(7.0);
        assert_eq!(var.get(), 7.0);
        assert!(arg.is(&var));

        let plain = ArgRef::value(3.0);
        plain.set(9.0);
        assert_eq!(plain.value, 3.0);
        assert!(!plain.is(&var));
    }
}
