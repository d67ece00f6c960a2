//! Types shared between the linker core and the top-level façade: the error
//! taxonomy, the `dlopen`-style flag bits, and the handle sentinels.

use std::path::PathBuf;

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Flags accepted by [`load`](crate), mirroring the platform's own
    /// `RTLD_*` numeric conventions so the values are familiar to anyone
    /// who has used `dlopen`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DlOpenFlags: u32 {
        /// Defer symbol binding. This implementation has no lazy PLT
        /// trampoline, so `LAZY` degrades to `NOW`.
        const LAZY = 0x1;
        /// Bind every symbol before `load` returns. The only binding mode
        /// this linker actually implements.
        const NOW = 0x2;
        /// Symbols are not visible to other modules' global lookups.
        const LOCAL = 0x0;
        /// Symbols participate in `lookup(DEFAULT, name)` global search.
        const GLOBAL = 0x100;
    }
}

impl Default for DlOpenFlags {
    fn default() -> Self {
        DlOpenFlags::NOW | DlOpenFlags::LOCAL
    }
}

/// Opaque identifier returned by `load` and accepted by `lookup`/`unload`.
///
/// Wraps the module's slot index in the registry plus a generation counter
/// so that a handle from a since-unloaded module is never mistaken for a
/// later module reusing the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle {
    pub slot: usize,
    pub generation: u64,
}

/// The linker's typed error taxonomy, one variant per failure kind the
/// façade can produce. Every variant carries enough context to render the
/// human-readable message written into the one-shot error slot.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot open {path}: {source}")]
    InvalidPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {reason}")]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("{path}: no loadable segments")]
    UnsupportedSegment { path: PathBuf },

    #[error("{path}: failed to map memory: {reason}")]
    MmapFailed { path: PathBuf, reason: String },

    #[error("{path}: dynamic section is missing {table}")]
    MissingSymbolTable { path: PathBuf, table: &'static str },

    #[error("symbol not found in {module}: {symbol}")]
    SymbolNotFound { module: String, symbol: String },

    #[error("{what} is not implemented")]
    NotImplemented { what: &'static str },

    #[error("operation attempted on a null handle")]
    NullHandle,
}

pub type Result<T> = std::result::Result<T, Error>;
