//! The flag and sentinel-handle constants the façade recognises, mirroring
//! the platform's own `RTLD_*` numeric conventions.

pub use elflinker_shared::DlOpenFlags;

/// Defer symbol binding. This linker has no lazy PLT trampoline, so `LAZY`
/// degrades to [`NOW`].
pub const LAZY: u32 = DlOpenFlags::LAZY.bits();
/// Bind every symbol before `load` returns.
pub const NOW: u32 = DlOpenFlags::NOW.bits();
/// Symbols are not visible to other modules' global lookups (the default).
pub const LOCAL: u32 = DlOpenFlags::LOCAL.bits();
/// Symbols participate in [`lookup(DEFAULT, ...)`](crate::lookup) search.
pub const GLOBAL: u32 = DlOpenFlags::GLOBAL.bits();
