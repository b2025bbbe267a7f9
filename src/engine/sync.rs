//! Calling roles and lock-free signalling
//!
//! The host drives an effect from at most two roles: the audio role (load,
//! compile, process, MIDI, state) and the drawing role (drawing passes).
//! Role-restricted operations check the caller's role first and turn a
//! mismatch into an inert result instead of an error.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use crate::error::FxError;

/// Logical calling context of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    None,
    /// Drives load/compile/process/MIDI/state calls
    Audio,
    /// Drives drawing passes
    Drawing,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::None => write!(f, "none"),
            Role::Audio => write!(f, "audio"),
            Role::Drawing => write!(f, "drawing"),
        }
    }
}

impl Role {
    /// Check that `self` is the `expected` role
    pub fn require(self, expected: Role) -> Result<(), FxError> {
        if self == expected {
            Ok(())
        } else {
            Err(FxError::RoleViolation {
                expected,
                actual: self,
            })
        }
    }
}

/// 64-bit mask updated with atomic read-modify-write operations
///
/// Used for slider change/automation/visibility notifications. These are
/// best-effort signals, not a synchronization barrier.
#[derive(Debug, Default)]
pub struct AtomicBitset(AtomicU64);

impl AtomicBitset {
    pub const fn new(bits: u64) -> Self {
        Self(AtomicU64::new(bits))
    }

    pub fn load(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    pub fn store(&self, bits: u64) {
        self.0.store(bits, Ordering::Release);
    }

    /// Set `bits`, returning the previous mask
    pub fn set(&self, bits: u64) -> u64 {
        self.0.fetch_or(bits, Ordering::AcqRel)
    }

    /// Clear `bits`, returning the previous mask
    pub fn clear(&self, bits: u64) -> u64 {
        self.0.fetch_and(!bits, Ordering::AcqRel)
    }

    /// Flip `bits`, returning the previous mask
    pub fn toggle(&self, bits: u64) -> u64 {
        self.0.fetch_xor(bits, Ordering::AcqRel)
    }

    /// Replace the mask with zero and return what it held
    pub fn take(&self) -> u64 {
        self.0.swap(0, Ordering::AcqRel)
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Lock a mutex only if nobody holds it
pub(crate) fn try_lock<T: ?Sized>(mutex: &Mutex<T>) -> Option<MutexGuard<'_, T>> {
    match mutex.try_lock() {
        Ok(guard) => Some(guard),
        Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
        Err(TryLockError::WouldBlock) => None,
    }
}
