//! A minimal ELF64 dynamic linker for x86_64 Linux.
//!
//! Exposes a `dlopen`-shaped façade — [`load`], [`lookup`], [`unload`],
//! [`last_error`] — backed by its own ELF parser, segment mapper, dynamic
//! section walker, symbol resolver, relocation engine, and init/fini
//! dispatcher rather than the platform's own loader.
//!
//! ```no_run
//! use elflinker::{load, lookup, unload, Handle};
//!
//! let handle = load("./libexample.so", elflinker::flags::NOW).unwrap();
//! let addr = lookup(Handle::Module(handle), "add").unwrap();
//! let add: unsafe extern "C" fn(i32, i32) -> i32 = unsafe { std::mem::transmute(addr) };
//! assert_eq!(unsafe { add(1, 2) }, 3);
//! unload(handle).unwrap();
//! ```

pub mod flags;
mod registry;

use std::path::Path;

pub use elflinker_shared::{DlOpenFlags, Error, ModuleHandle};

/// Either a real module handle, or one of the `dlopen` search sentinels.
#[derive(Debug, Clone, Copy)]
pub enum Handle {
    Module(ModuleHandle),
    /// Search every `GLOBAL`-flagged loaded module, then the platform
    /// loader's default scope.
    Default,
    /// The next library after the caller's own in platform search order.
    /// Not implemented by this linker.
    Next,
}

/// Load a shared object, map and relocate it, and run its constructors.
///
/// `flags` is a bitwise-OR of the constants in [`flags`]; `LAZY` degrades to
/// `NOW` since there is no lazy PLT trampoline, and `LOCAL`/`GLOBAL`
/// determine whether the module participates in `lookup(Handle::Default, ..)`.
pub fn load(path: impl AsRef<Path>, raw_flags: u32) -> Result<ModuleHandle, Error> {
    let bits = DlOpenFlags::from_bits_truncate(raw_flags);
    registry::load(path.as_ref(), bits.contains(DlOpenFlags::GLOBAL))
}

/// Resolve `name` against `handle`.
pub fn lookup(handle: Handle, name: &str) -> Result<usize, Error> {
    match handle {
        Handle::Module(h) => registry::lookup_in(h, name),
        Handle::Default => registry::lookup_default(name),
        Handle::Next => Err(Error::NotImplemented { what: "RTLD_NEXT" }),
    }
}

/// Decrement `handle`'s reference count; at zero, run destructors and
/// release the module's mapping.
pub fn unload(handle: ModuleHandle) -> Result<(), Error> {
    registry::unload(handle)
}

/// Read and clear the process-wide one-shot error slot.
pub fn last_error() -> Option<String> {
    registry::last_error()
}
